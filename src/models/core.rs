// src/models/core.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::identifiers;

/// Whether a participant trades through a fund manager or directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    ManagedFund,
    Standalone,
    #[default]
    Unknown,
}

/// An entity record parsed out of a participant form (administrative detail
/// form or tax form). Immutable once extraction completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub legal_name: Option<String>,
    pub fund_manager: Option<String>,
    pub mei: Option<String>,
    pub lei: Option<String>,
    pub ein: Option<String>,
    pub debt_domain_id: Option<String>,
    pub email_domain: Option<String>,
    pub dba: Option<String>,
    pub country_code: Option<String>,
    pub tax_country_code: Option<String>,
    #[serde(default)]
    pub contact_emails: Vec<String>,
    #[serde(default)]
    pub raw_fields: HashMap<String, String>,
    /// Per-field extraction confidence in [0,1].
    #[serde(default)]
    pub field_confidence: HashMap<String, f64>,
    /// Overall extraction confidence in [0,1].
    #[serde(default)]
    pub extraction_confidence: f64,
}

impl ExtractedEntity {
    /// Canonicalize all identifiers in place: MEI/LEI uppercased, EIN
    /// rewritten to `NN-NNNNNNN`. An MEI with an unrecognized country prefix
    /// is kept but its field confidence drops to 0.5. Values that fail their
    /// canonical pattern entirely are dropped.
    pub fn canonicalize_identifiers(&mut self) {
        if let Some(raw) = self.mei.take() {
            match identifiers::canonicalize_mei(&raw) {
                Some(id) => {
                    self.field_confidence.insert("mei".to_string(), id.confidence);
                    self.mei = Some(id.value);
                }
                None => {
                    self.field_confidence.insert("mei".to_string(), 0.0);
                }
            }
        }
        if let Some(raw) = self.lei.take() {
            self.lei = identifiers::canonicalize_lei(&raw).map(|id| id.value);
        }
        if let Some(raw) = self.ein.take() {
            self.ein = identifiers::canonicalize_ein(&raw).map(|id| id.value);
        }
        if let Some(raw) = self.debt_domain_id.take() {
            self.debt_domain_id = identifiers::canonicalize_debt_domain_id(&raw).map(|id| id.value);
        }
    }

    pub fn has_any_identifier(&self) -> bool {
        self.mei.is_some()
            || self.lei.is_some()
            || self.ein.is_some()
            || self.debt_domain_id.is_some()
    }

    /// Short human label for log lines and audit entries.
    pub fn display_name(&self) -> &str {
        self.legal_name.as_deref().unwrap_or("Unknown")
    }
}

/// A record from the LoanIQ system of record. Read-only to this system.
///
/// `fund_manager` is the repurposed ultimate-parent column; when populated it
/// holds the fund manager of a managed-fund participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreEntity {
    pub entity_id: i64,
    pub full_name: String,
    pub short_name: Option<String>,
    pub fund_manager: Option<String>,
    pub mei: Option<String>,
    pub lei: Option<String>,
    pub ein: Option<String>,
    pub debt_domain_id: Option<String>,
    pub country_code: Option<String>,
    pub legal_address: Option<String>,
    pub tax_address: Option<String>,
    /// True when this row is a location sub-entity of a main customer.
    #[serde(default)]
    pub is_location: bool,
    pub parent_customer_id: Option<i64>,
    pub last_modified: Option<NaiveDateTime>,
}

impl StoreEntity {
    /// Short name with everything but letters and digits stripped,
    /// lowercased. The key used for duplicate detection.
    pub fn cleaned_short_name(&self) -> Option<String> {
        self.short_name.as_deref().map(clean_short_name)
    }
}

/// Lowercase alphanumeric projection of a short name.
pub fn clean_short_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_identifiers() {
        let mut entity = ExtractedEntity {
            mei: Some("us12345678".to_string()),
            lei: Some("529900t8bm49aursdo55".to_string()),
            ein: Some("123456789".to_string()),
            debt_domain_id: Some("dd99887".to_string()),
            ..Default::default()
        };
        entity.canonicalize_identifiers();

        assert_eq!(entity.mei.as_deref(), Some("US12345678"));
        assert_eq!(entity.lei.as_deref(), Some("529900T8BM49AURSDO55"));
        assert_eq!(entity.ein.as_deref(), Some("12-3456789"));
        assert_eq!(entity.debt_domain_id.as_deref(), Some("DD99887"));
        assert_eq!(entity.field_confidence.get("mei"), Some(&1.0));
    }

    #[test]
    fn test_canonicalize_demotes_bad_mei_country() {
        let mut entity = ExtractedEntity {
            mei: Some("ZZ12345678".to_string()),
            ..Default::default()
        };
        entity.canonicalize_identifiers();
        assert_eq!(entity.mei.as_deref(), Some("ZZ12345678"));
        assert_eq!(entity.field_confidence.get("mei"), Some(&0.5));
    }

    #[test]
    fn test_cleaned_short_name() {
        let entity = StoreEntity {
            short_name: Some("ACME. Corp".to_string()),
            ..Default::default()
        };
        assert_eq!(entity.cleaned_short_name().as_deref(), Some("acmecorp"));
    }
}
