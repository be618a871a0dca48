// src/models/matching.rs
//! Match results and their supporting vocabulary: confidence bands, score
//! components, and the closed discrepancy taxonomy.

use chrono::{NaiveDateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::identifiers::IdentifierKind;
use crate::models::core::StoreEntity;

/// Which search strategy introduced a candidate into the result pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStrategy {
    Identifier,
    FuzzyName,
    EmailDomain,
}

/// Categorical confidence band, a pure function of the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    High,
    MediumHigh,
    Medium,
    Review,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            ConfidenceLevel::High
        } else if score >= 85.0 {
            ConfidenceLevel::MediumHigh
        } else if score >= 70.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Review
        }
    }

    pub fn requires_review(self) -> bool {
        self == ConfidenceLevel::Review
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::MediumHigh => "MEDIUM_HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Review => "REVIEW",
        };
        f.write_str(name)
    }
}

/// A typed score component. Identifier axes keep separate match and boost
/// entries so the scorer can distinguish a seeding axis from corroboration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScoreComponent {
    IdentifierMatch(IdentifierKind),
    IdentifierBoost(IdentifierKind),
    LegalNameFuzzy,
    FundManagerFuzzy,
    EmailDomainBoost,
    TaxFormValidation,
}

impl fmt::Display for ScoreComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreComponent::IdentifierMatch(kind) => write!(f, "{}_match", kind.key()),
            ScoreComponent::IdentifierBoost(kind) => write!(f, "{}_boost", kind.key()),
            ScoreComponent::LegalNameFuzzy => f.write_str("legal_name_fuzzy"),
            ScoreComponent::FundManagerFuzzy => f.write_str("fund_manager_fuzzy"),
            ScoreComponent::EmailDomainBoost => f.write_str("email_domain_boost"),
            ScoreComponent::TaxFormValidation => f.write_str("tax_form_validation"),
        }
    }
}

/// Per-candidate map from score component to its numeric contribution.
#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    components: BTreeMap<ScoreComponent, f64>,
}

impl ScoreBreakdown {
    pub fn set(&mut self, component: ScoreComponent, value: f64) {
        self.components.insert(component, value);
    }

    /// Accumulates into an existing entry (used for repeated adjustments
    /// such as successive tax-form validations).
    pub fn add(&mut self, component: ScoreComponent, value: f64) {
        *self.components.entry(component).or_insert(0.0) += value;
    }

    pub fn get(&self, component: ScoreComponent) -> Option<f64> {
        self.components.get(&component).copied()
    }

    pub fn contains(&self, component: ScoreComponent) -> bool {
        self.components.contains_key(&component)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScoreComponent, &f64)> {
        self.components.iter()
    }

    /// Number of identifier axes with either a match or a boost entry.
    pub fn identifier_axes_matched(&self) -> usize {
        IdentifierKind::ALL
            .iter()
            .filter(|&&kind| {
                self.contains(ScoreComponent::IdentifierMatch(kind))
                    || self.contains(ScoreComponent::IdentifierBoost(kind))
            })
            .count()
    }
}

impl Serialize for ScoreBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.components.len()))?;
        for (component, value) in &self.components {
            map.serialize_entry(&component.to_string(), value)?;
        }
        map.end()
    }
}

/// Severity of a discrepancy, with its fixed score penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancySeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl DiscrepancySeverity {
    pub fn penalty(self) -> f64 {
        match self {
            DiscrepancySeverity::Critical => 25.0,
            DiscrepancySeverity::High => 15.0,
            DiscrepancySeverity::Medium => 10.0,
            DiscrepancySeverity::Low => 5.0,
        }
    }
}

impl fmt::Display for DiscrepancySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscrepancySeverity::Critical => "CRITICAL",
            DiscrepancySeverity::High => "HIGH",
            DiscrepancySeverity::Medium => "MEDIUM",
            DiscrepancySeverity::Low => "LOW",
        };
        f.write_str(name)
    }
}

/// Which check surfaced a discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyAxis {
    IdentifierCheck,
    GeographicCheck,
    NameCheck,
    CrossSourceCheck,
    InternalCheck,
}

/// The closed discrepancy vocabulary. Each variant carries exactly the
/// details that finding needs; severity and axis derive from the variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "details", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyKind {
    MeiMismatch { form_mei: String, loaniq_mei: String },
    MeiMissingLoaniq { form_mei: String },
    LeiMismatch { form_lei: String, loaniq_lei: String },
    EinMismatch { form_ein: String, loaniq_ein: String },
    DebtDomainIdMismatch { form_id: String, loaniq_id: String },
    CountryMismatchMeiAddress { mei_country: String, address_country: String },
    CountryMismatchFormLoaniq { form_country: String, loaniq_country: String },
    CountryMismatchTaxLegal { tax_country: String, legal_country: String },
    DbaNotInLoaniq { form_dba: String },
    FundManagerMismatch { form_manager: String, loaniq_manager: String, similarity: f64 },
    FundManagerMissingLoaniq { form_manager: String },
    UnexpectedFundManagerLoaniq { loaniq_manager: String },
    EntityTypeMismatch,
    EinMismatchCrossForm { primary_ein: String, tax_ein: String },
    LegalNameMismatchCrossForm { primary_name: String, tax_name: String, similarity: f64 },
    CountryMismatchCrossForm { primary_country: String, tax_country: String },
    MeiMismatchCrossForm { primary_mei: String, tax_mei: String },
    EinMismatchTaxLoaniq { tax_ein: String, loaniq_ein: String },
    PotentialDuplicateShortName { short_name: String, similar_count: usize },
    OrphanedLocationRecord { entity_id: i64 },
    InternalCountryMismatch { mei_country: String, stored_country: String },
}

impl DiscrepancyKind {
    pub fn severity(&self) -> DiscrepancySeverity {
        use DiscrepancyKind::*;
        match self {
            MeiMismatch { .. } | EinMismatchCrossForm { .. } | MeiMismatchCrossForm { .. } => {
                DiscrepancySeverity::Critical
            }
            MeiMissingLoaniq { .. }
            | LeiMismatch { .. }
            | EinMismatch { .. }
            | LegalNameMismatchCrossForm { .. }
            | EinMismatchTaxLoaniq { .. } => DiscrepancySeverity::High,
            DebtDomainIdMismatch { .. }
            | CountryMismatchMeiAddress { .. }
            | CountryMismatchFormLoaniq { .. }
            | FundManagerMismatch { .. }
            | FundManagerMissingLoaniq { .. }
            | UnexpectedFundManagerLoaniq { .. }
            | EntityTypeMismatch
            | CountryMismatchCrossForm { .. }
            | OrphanedLocationRecord { .. }
            | InternalCountryMismatch { .. } => DiscrepancySeverity::Medium,
            CountryMismatchTaxLegal { .. }
            | DbaNotInLoaniq { .. }
            | PotentialDuplicateShortName { .. } => DiscrepancySeverity::Low,
        }
    }

    pub fn axis(&self) -> DiscrepancyAxis {
        use DiscrepancyKind::*;
        match self {
            MeiMismatch { .. }
            | MeiMissingLoaniq { .. }
            | LeiMismatch { .. }
            | EinMismatch { .. }
            | DebtDomainIdMismatch { .. } => DiscrepancyAxis::IdentifierCheck,
            CountryMismatchMeiAddress { .. }
            | CountryMismatchFormLoaniq { .. }
            | CountryMismatchTaxLegal { .. } => DiscrepancyAxis::GeographicCheck,
            DbaNotInLoaniq { .. }
            | FundManagerMismatch { .. }
            | FundManagerMissingLoaniq { .. }
            | UnexpectedFundManagerLoaniq { .. }
            | EntityTypeMismatch => DiscrepancyAxis::NameCheck,
            EinMismatchCrossForm { .. }
            | LegalNameMismatchCrossForm { .. }
            | CountryMismatchCrossForm { .. }
            | MeiMismatchCrossForm { .. }
            | EinMismatchTaxLoaniq { .. } => DiscrepancyAxis::CrossSourceCheck,
            PotentialDuplicateShortName { .. }
            | OrphanedLocationRecord { .. }
            | InternalCountryMismatch { .. } => DiscrepancyAxis::InternalCheck,
        }
    }

    /// Stable wire label for the discrepancy type.
    pub fn label(&self) -> &'static str {
        use DiscrepancyKind::*;
        match self {
            MeiMismatch { .. } => "MEI_MISMATCH",
            MeiMissingLoaniq { .. } => "MEI_MISSING_LOANIQ",
            LeiMismatch { .. } => "LEI_MISMATCH",
            EinMismatch { .. } => "EIN_MISMATCH",
            DebtDomainIdMismatch { .. } => "DEBT_DOMAIN_ID_MISMATCH",
            CountryMismatchMeiAddress { .. } => "COUNTRY_MISMATCH_MEI_ADDRESS",
            CountryMismatchFormLoaniq { .. } => "COUNTRY_MISMATCH_FORM_LOANIQ",
            CountryMismatchTaxLegal { .. } => "COUNTRY_MISMATCH_TAX_LEGAL",
            DbaNotInLoaniq { .. } => "DBA_NOT_IN_LOANIQ",
            FundManagerMismatch { .. } => "FUND_MANAGER_MISMATCH",
            FundManagerMissingLoaniq { .. } => "FUND_MANAGER_MISSING_LOANIQ",
            UnexpectedFundManagerLoaniq { .. } => "UNEXPECTED_FUND_MANAGER_LOANIQ",
            EntityTypeMismatch => "ENTITY_TYPE_MISMATCH",
            EinMismatchCrossForm { .. } => "EIN_MISMATCH_CROSS_FORM",
            LegalNameMismatchCrossForm { .. } => "LEGAL_NAME_MISMATCH_CROSS_FORM",
            CountryMismatchCrossForm { .. } => "COUNTRY_MISMATCH_CROSS_FORM",
            MeiMismatchCrossForm { .. } => "MEI_MISMATCH_CROSS_FORM",
            EinMismatchTaxLoaniq { .. } => "EIN_MISMATCH_TAX_LOANIQ",
            PotentialDuplicateShortName { .. } => "POTENTIAL_DUPLICATE_SHORT_NAME",
            OrphanedLocationRecord { .. } => "ORPHANED_LOCATION_RECORD",
            InternalCountryMismatch { .. } => "INTERNAL_COUNTRY_MISMATCH",
        }
    }

    pub fn description(&self) -> String {
        use DiscrepancyKind::*;
        match self {
            MeiMismatch { .. } => "MEI in form differs from LoanIQ".to_string(),
            MeiMissingLoaniq { .. } => "MEI present in form but missing in LoanIQ".to_string(),
            LeiMismatch { .. } => "LEI in form differs from LoanIQ".to_string(),
            EinMismatch { .. } => "EIN in form differs from LoanIQ".to_string(),
            DebtDomainIdMismatch { .. } => "Debt Domain ID in form differs from LoanIQ".to_string(),
            CountryMismatchMeiAddress { .. } => {
                "MEI country code doesn't match address country".to_string()
            }
            CountryMismatchFormLoaniq { .. } => {
                "Form country differs from LoanIQ country".to_string()
            }
            CountryMismatchTaxLegal { .. } => {
                "Tax country differs from legal address country".to_string()
            }
            DbaNotInLoaniq { .. } => "Form contains DBA but LoanIQ doesn't".to_string(),
            FundManagerMismatch { similarity, .. } => {
                format!("Fund manager name differs significantly (similarity {:.2})", similarity)
            }
            FundManagerMissingLoaniq { .. } => "Fund manager in form but not in LoanIQ".to_string(),
            UnexpectedFundManagerLoaniq { .. } => {
                "LoanIQ has fund manager but form doesn't".to_string()
            }
            EntityTypeMismatch => "Entity type mismatch (managed vs standalone)".to_string(),
            EinMismatchCrossForm { primary_ein, tax_ein } => {
                format!("EIN differs between forms: primary={}, tax={}", primary_ein, tax_ein)
            }
            LegalNameMismatchCrossForm { similarity, .. } => {
                format!("Legal name differs between forms (similarity {:.2})", similarity)
            }
            CountryMismatchCrossForm { primary_country, tax_country } => {
                format!("Country differs between forms: primary={}, tax={}", primary_country, tax_country)
            }
            MeiMismatchCrossForm { primary_mei, tax_mei } => {
                format!("MEI differs between forms: primary={}, tax={}", primary_mei, tax_mei)
            }
            EinMismatchTaxLoaniq { .. } => "Tax form EIN doesn't match LoanIQ".to_string(),
            PotentialDuplicateShortName { similar_count, .. } => {
                format!("{} entities share a cleaned short name", similar_count)
            }
            OrphanedLocationRecord { .. } => "Location record without parent customer".to_string(),
            InternalCountryMismatch { .. } => {
                "LoanIQ MEI country doesn't match stored country code".to_string()
            }
        }
    }
}

/// A discrepancy finding attached to a match.
#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    #[serde(flatten)]
    pub kind: DiscrepancyKind,
    pub severity: DiscrepancySeverity,
    pub source: DiscrepancyAxis,
    pub description: String,
    pub detected_at: NaiveDateTime,
}

impl Discrepancy {
    pub fn new(kind: DiscrepancyKind) -> Self {
        let severity = kind.severity();
        let source = kind.axis();
        let description = kind.description();
        Self {
            kind,
            severity,
            source,
            description,
            detected_at: Utc::now().naive_utc(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

/// One ranked candidate produced by the matching engine.
///
/// The confidence band is a derived accessor over the score, never stored,
/// so it can't go stale across score adjustments.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub entity: StoreEntity,
    score: f64,
    pub strategy: MatchStrategy,
    pub composite_match: bool,
    pub evidence: Vec<String>,
    pub discrepancies: Vec<Discrepancy>,
    pub score_breakdown: ScoreBreakdown,
    pub potential_duplicates: Vec<StoreEntity>,
}

impl MatchResult {
    pub fn new(entity: StoreEntity, strategy: MatchStrategy) -> Self {
        Self {
            entity,
            score: 0.0,
            strategy,
            composite_match: false,
            evidence: Vec::new(),
            discrepancies: Vec::new(),
            score_breakdown: ScoreBreakdown::default(),
            potential_duplicates: Vec::new(),
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Sets the score, clamped to [0,100].
    pub fn set_score(&mut self, score: f64) {
        self.score = score.clamp(0.0, 100.0);
    }

    /// Adjusts the score by a delta, clamped to [0,100].
    pub fn adjust_score(&mut self, delta: f64) {
        self.set_score(self.score + delta);
    }

    pub fn confidence(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.score)
    }

    pub fn add_evidence(&mut self, evidence: impl Into<String>) {
        self.evidence.push(evidence.into());
    }

    pub fn add_discrepancy(&mut self, kind: DiscrepancyKind) {
        self.discrepancies.push(Discrepancy::new(kind));
    }

    /// Whether a discrepancy with the same type label is already attached.
    pub fn has_discrepancy(&self, label: &str) -> bool {
        self.discrepancies.iter().any(|d| d.label() == label)
    }

    pub fn has_critical_discrepancies(&self) -> bool {
        self.discrepancies
            .iter()
            .any(|d| d.severity == DiscrepancySeverity::Critical)
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MatchResult{{entity={}, score={:.2}, confidence={}, strategy={:?}, discrepancies={}}}",
            self.entity.full_name,
            self.score,
            self.confidence(),
            self.strategy,
            self.discrepancies.len()
        )
    }
}
