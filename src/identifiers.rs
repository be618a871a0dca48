// src/identifiers.rs
//! Canonical identifier formats for the four identifier axes.
//!
//! All identifiers are stored canonicalized: MEI and LEI uppercased, EIN in
//! `NN-NNNNNNN` form. An MEI whose country prefix is not a recognized
//! ISO-3166-1 alpha-2 code is kept but demoted to half confidence.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::country;

static MEI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}\d{8}$").unwrap());
static LEI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{20}$").unwrap());
static EIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}-\d{7}$").unwrap());
static EIN_BARE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{9}$").unwrap());
static DEBT_DOMAIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{6,12}$").unwrap());

/// The identifier axes searched by the identifier matcher, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IdentifierKind {
    Mei,
    Lei,
    Ein,
    DebtDomainId,
}

impl IdentifierKind {
    /// All kinds in strict search priority order.
    pub const ALL: [IdentifierKind; 4] = [
        IdentifierKind::Mei,
        IdentifierKind::Lei,
        IdentifierKind::Ein,
        IdentifierKind::DebtDomainId,
    ];

    /// Base score assigned when this identifier seeds a new candidate.
    pub fn base_score(self) -> f64 {
        match self {
            IdentifierKind::Mei => 40.0,
            IdentifierKind::Lei => 35.0,
            IdentifierKind::Ein => 30.0,
            IdentifierKind::DebtDomainId => 25.0,
        }
    }

    /// Corroboration boost when this identifier also matches a candidate
    /// that an earlier axis already seeded.
    pub fn boost_score(self) -> f64 {
        match self {
            IdentifierKind::Mei => 20.0,
            IdentifierKind::Lei => 20.0,
            IdentifierKind::Ein => 15.0,
            IdentifierKind::DebtDomainId => 10.0,
        }
    }

    /// Display label used in evidence strings, e.g. "MEI exact match: ...".
    pub fn label(self) -> &'static str {
        match self {
            IdentifierKind::Mei => "MEI",
            IdentifierKind::Lei => "LEI",
            IdentifierKind::Ein => "EIN",
            IdentifierKind::DebtDomainId => "Debt Domain ID",
        }
    }

    /// Snake-case key used in score-component names.
    pub fn key(self) -> &'static str {
        match self {
            IdentifierKind::Mei => "mei",
            IdentifierKind::Lei => "lei",
            IdentifierKind::Ein => "ein",
            IdentifierKind::DebtDomainId => "debt_domain_id",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of canonicalizing a raw identifier value.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalIdentifier {
    pub value: String,
    /// Confidence in [0,1]. Demoted to 0.5 for an MEI with an unrecognized
    /// country prefix; 1.0 otherwise.
    pub confidence: f64,
}

impl CanonicalIdentifier {
    fn full(value: String) -> Self {
        Self { value, confidence: 1.0 }
    }
}

/// Canonicalize an MEI: uppercase, `CC` + 8 digits. An invalid country
/// prefix demotes confidence to 0.5 but does not reject the value.
pub fn canonicalize_mei(raw: &str) -> Option<CanonicalIdentifier> {
    let value = raw.trim().to_uppercase();
    if !MEI_RE.is_match(&value) {
        return None;
    }
    let prefix = &value[..2];
    if country::is_valid_country_code(prefix) {
        Some(CanonicalIdentifier::full(value))
    } else {
        Some(CanonicalIdentifier { value, confidence: 0.5 })
    }
}

/// Canonicalize an LEI: uppercase, 20 alphanumerics.
pub fn canonicalize_lei(raw: &str) -> Option<CanonicalIdentifier> {
    let value = raw.trim().to_uppercase();
    if LEI_RE.is_match(&value) {
        Some(CanonicalIdentifier::full(value))
    } else {
        None
    }
}

/// Canonicalize an EIN to `NN-NNNNNNN`; a bare 9-digit value is rewritten.
pub fn canonicalize_ein(raw: &str) -> Option<CanonicalIdentifier> {
    let value = raw.trim().to_string();
    if EIN_RE.is_match(&value) {
        return Some(CanonicalIdentifier::full(value));
    }
    if EIN_BARE_RE.is_match(&value) {
        return Some(CanonicalIdentifier::full(format!("{}-{}", &value[..2], &value[2..])));
    }
    None
}

/// Canonicalize a Debt Domain ID: uppercase, 6-12 alphanumerics.
pub fn canonicalize_debt_domain_id(raw: &str) -> Option<CanonicalIdentifier> {
    let value = raw.trim().to_uppercase();
    if DEBT_DOMAIN_RE.is_match(&value) {
        Some(CanonicalIdentifier::full(value))
    } else {
        None
    }
}

/// EIN equality ignoring hyphens, used everywhere EINs are compared.
pub fn ein_equal(a: &str, b: &str) -> bool {
    a.replace('-', "") == b.replace('-', "")
}

/// Country prefix of a canonical MEI.
pub fn mei_country(mei: &str) -> Option<&str> {
    if mei.len() >= 2 {
        Some(&mei[..2])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mei_canonicalization() {
        let id = canonicalize_mei("us12345678").unwrap();
        assert_eq!(id.value, "US12345678");
        assert_eq!(id.confidence, 1.0);

        assert!(canonicalize_mei("US1234567").is_none());
        assert!(canonicalize_mei("USA2345678").is_none());
    }

    #[test]
    fn test_mei_invalid_country_demotes_confidence() {
        // "XX" is not an ISO-3166 code; value is kept with half confidence.
        let id = canonicalize_mei("XX12345678").unwrap();
        assert_eq!(id.value, "XX12345678");
        assert_eq!(id.confidence, 0.5);
    }

    #[test]
    fn test_ein_rewrite() {
        assert_eq!(canonicalize_ein("12-3456789").unwrap().value, "12-3456789");
        assert_eq!(canonicalize_ein("123456789").unwrap().value, "12-3456789");
        assert!(canonicalize_ein("12-345678").is_none());
        assert!(canonicalize_ein("1234567890").is_none());
    }

    #[test]
    fn test_ein_equality_ignores_hyphens() {
        assert!(ein_equal("12-3456789", "123456789"));
        assert!(!ein_equal("12-3456789", "98-7654321"));
    }

    #[test]
    fn test_lei_and_debt_domain() {
        assert_eq!(
            canonicalize_lei("529900t8bm49aursdo55").unwrap().value,
            "529900T8BM49AURSDO55"
        );
        assert!(canonicalize_lei("TOOSHORT").is_none());
        assert_eq!(canonicalize_debt_domain_id("dd1234").unwrap().value, "DD1234");
        assert!(canonicalize_debt_domain_id("abc").is_none());
    }

    #[test]
    fn test_identifier_priority_order() {
        let bases: Vec<f64> = IdentifierKind::ALL.iter().map(|k| k.base_score()).collect();
        assert_eq!(bases, vec![40.0, 35.0, 30.0, 25.0]);
    }
}
