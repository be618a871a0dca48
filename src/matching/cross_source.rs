// src/matching/cross_source.rs
//! Cross-source validation against the secondary (tax form) extraction.
//!
//! Two forms describing the same entity should agree. Agreement earns
//! boosts, disagreement costs points and raises cross-source discrepancies,
//! and identifiers that only the tax form carries are checked against the
//! candidate directly.

use log::{debug, warn};
use strsim::jaro_winkler;

use crate::config::MatchingConfig;
use crate::identifiers::ein_equal;
use crate::models::core::ExtractedEntity;
use crate::models::matching::{DiscrepancyKind, MatchResult, ScoreComponent};

pub struct CrossSourceValidator {
    config: MatchingConfig,
}

impl CrossSourceValidator {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Adjust a candidate using the secondary extraction. The net adjustment
    /// is applied to the score and recorded as `tax_form_validation`.
    pub fn validate(
        &self,
        result: &mut MatchResult,
        primary: &ExtractedEntity,
        tax_form: &ExtractedEntity,
    ) {
        let mut boost = 0.0;

        boost += self.validate_ein(result, primary, tax_form);
        boost += self.validate_legal_name(result, primary, tax_form);
        boost += self.validate_country(result, primary, tax_form);
        boost += self.validate_additional_identifiers(result, primary, tax_form);

        if boost != 0.0 {
            result.adjust_score(boost);
            result
                .score_breakdown
                .set(ScoreComponent::TaxFormValidation, boost);
            debug!(
                "Cross-source validation adjusted score by {} to {}",
                boost,
                result.score()
            );
        }
    }

    fn validate_ein(
        &self,
        result: &mut MatchResult,
        primary: &ExtractedEntity,
        tax_form: &ExtractedEntity,
    ) -> f64 {
        let mut boost = 0.0;

        match (primary.ein.as_deref(), tax_form.ein.as_deref()) {
            (Some(primary_ein), Some(tax_ein)) => {
                if ein_equal(primary_ein, tax_ein) {
                    boost += 10.0;
                    result.add_evidence("EIN consistent between forms");
                } else {
                    boost -= 15.0;
                    result.add_discrepancy(DiscrepancyKind::EinMismatchCrossForm {
                        primary_ein: primary_ein.to_string(),
                        tax_ein: tax_ein.to_string(),
                    });
                    warn!("EIN mismatch between forms: {} vs {}", primary_ein, tax_ein);
                }
            }
            (None, Some(tax_ein)) => {
                // The tax form EIN is authoritative when the primary lacks one.
                boost += 5.0;
                result.add_evidence(format!("EIN from tax form used for validation: {}", tax_ein));

                if let Some(candidate_ein) = result.entity.ein.clone() {
                    if ein_equal(&candidate_ein, tax_ein) {
                        boost += 10.0;
                        result.add_evidence("Tax form EIN matches LoanIQ");
                    } else {
                        boost -= 10.0;
                        result.add_discrepancy(DiscrepancyKind::EinMismatchTaxLoaniq {
                            tax_ein: tax_ein.to_string(),
                            loaniq_ein: candidate_ein,
                        });
                    }
                }
            }
            _ => {}
        }

        boost
    }

    fn validate_legal_name(
        &self,
        result: &mut MatchResult,
        primary: &ExtractedEntity,
        tax_form: &ExtractedEntity,
    ) -> f64 {
        let (Some(primary_name), Some(tax_name)) =
            (primary.legal_name.as_deref(), tax_form.legal_name.as_deref())
        else {
            return 0.0;
        };

        let mut boost = 0.0;
        let similarity = jaro_winkler(tax_name, primary_name);

        if similarity > 0.9 {
            boost += 8.0;
            result.add_evidence("Legal name highly consistent across forms");
        } else if similarity > 0.8 {
            boost += 3.0;
            result.add_evidence("Legal name consistent across forms");
        } else if similarity < 0.7 {
            boost -= 10.0;
            result.add_discrepancy(DiscrepancyKind::LegalNameMismatchCrossForm {
                primary_name: primary_name.to_string(),
                tax_name: tax_name.to_string(),
                similarity,
            });
            warn!(
                "Legal name mismatch between forms: similarity={:.2}",
                similarity
            );
        }

        let candidate_similarity = jaro_winkler(tax_name, &result.entity.full_name);
        if candidate_similarity > self.config.cross_source_name_threshold {
            boost += 5.0;
            result.add_evidence("Tax form name matches LoanIQ");
        }

        boost
    }

    fn validate_country(
        &self,
        result: &mut MatchResult,
        primary: &ExtractedEntity,
        tax_form: &ExtractedEntity,
    ) -> f64 {
        let mut boost = 0.0;

        if let (Some(primary_country), Some(tax_country)) =
            (primary.country_code.as_deref(), tax_form.country_code.as_deref())
        {
            if primary_country != tax_country {
                boost -= 5.0;
                result.add_discrepancy(DiscrepancyKind::CountryMismatchCrossForm {
                    primary_country: primary_country.to_string(),
                    tax_country: tax_country.to_string(),
                });
            } else {
                boost += 2.0;
                result.add_evidence("Country consistent across forms");
            }
        }

        if let Some(tax_country) = tax_form.tax_country_code.as_deref() {
            if tax_form.country_code.as_deref() != Some(tax_country) {
                result.add_evidence(format!(
                    "Tax country differs from legal country: {}",
                    tax_country
                ));
            }
        }

        boost
    }

    fn validate_additional_identifiers(
        &self,
        result: &mut MatchResult,
        primary: &ExtractedEntity,
        tax_form: &ExtractedEntity,
    ) -> f64 {
        let mut boost = 0.0;

        if let (Some(tax_lei), None) = (tax_form.lei.as_deref(), primary.lei.as_deref()) {
            result.add_evidence(format!("Additional LEI from tax form: {}", tax_lei));
            if result.entity.lei.as_deref() == Some(tax_lei) {
                boost += 15.0;
                result.add_evidence("Tax form LEI matches LoanIQ");
            }
        }

        if let (Some(tax_dd), None) =
            (tax_form.debt_domain_id.as_deref(), primary.debt_domain_id.as_deref())
        {
            result.add_evidence(format!("Additional Debt Domain ID from tax form: {}", tax_dd));
            if result.entity.debt_domain_id.as_deref() == Some(tax_dd) {
                boost += 10.0;
                result.add_evidence("Tax form Debt Domain ID matches LoanIQ");
            }
        }

        boost
    }
}
