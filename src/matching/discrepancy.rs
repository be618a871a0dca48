// src/matching/discrepancy.rs
//! Typed discrepancy detection across four axes: identifiers, geography,
//! names, cross-source agreement, plus internal LoanIQ consistency checks
//! on the candidate itself.

use log::info;
use std::sync::Arc;
use strsim::jaro_winkler;

use crate::identifiers::{ein_equal, mei_country};
use crate::models::core::{ExtractedEntity, StoreEntity};
use crate::models::matching::{Discrepancy, DiscrepancyKind};
use crate::normalize::normalize_fund_manager;
use crate::store::{or_empty, RecordStore};

pub struct DiscrepancyDetector {
    store: Arc<dyn RecordStore>,
}

impl DiscrepancyDetector {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Detect all discrepancies for a candidate.
    pub async fn detect(
        &self,
        extracted: &ExtractedEntity,
        tax_form: Option<&ExtractedEntity>,
        candidate: &StoreEntity,
    ) -> Vec<Discrepancy> {
        let mut found = Vec::new();

        detect_identifier_discrepancies(extracted, candidate, &mut found);
        detect_geographic_discrepancies(extracted, candidate, &mut found);
        detect_name_discrepancies(extracted, candidate, &mut found);
        if let Some(tax_form) = tax_form {
            detect_cross_source_discrepancies(extracted, tax_form, &mut found);
        }
        self.detect_internal_inconsistencies(candidate, &mut found).await;

        info!(
            "Detected {} discrepancies for entity {}",
            found.len(),
            candidate.entity_id
        );
        found
    }

    async fn detect_internal_inconsistencies(
        &self,
        candidate: &StoreEntity,
        found: &mut Vec<Discrepancy>,
    ) {
        // Multiple records collapsing to the same cleaned short name hint at
        // store-side duplicates.
        if let (Some(short_name), Some(cleaned)) =
            (candidate.short_name.as_deref(), candidate.cleaned_short_name())
        {
            let similar = or_empty(
                "find_by_cleaned_short_name",
                self.store.find_by_cleaned_short_name(&cleaned).await,
            );
            if similar.len() > 1 {
                found.push(Discrepancy::new(DiscrepancyKind::PotentialDuplicateShortName {
                    short_name: short_name.to_string(),
                    similar_count: similar.len(),
                }));
            }
        }

        if candidate.is_location && candidate.parent_customer_id.is_none() {
            found.push(Discrepancy::new(DiscrepancyKind::OrphanedLocationRecord {
                entity_id: candidate.entity_id,
            }));
        }

        if let (Some(mei), Some(stored_country)) =
            (candidate.mei.as_deref(), candidate.country_code.as_deref())
        {
            if let Some(mei_cc) = mei_country(mei) {
                if mei_cc != stored_country {
                    found.push(Discrepancy::new(DiscrepancyKind::InternalCountryMismatch {
                        mei_country: mei_cc.to_string(),
                        stored_country: stored_country.to_string(),
                    }));
                }
            }
        }
    }
}

fn detect_identifier_discrepancies(
    extracted: &ExtractedEntity,
    candidate: &StoreEntity,
    found: &mut Vec<Discrepancy>,
) {
    match (extracted.mei.as_deref(), candidate.mei.as_deref()) {
        (Some(form_mei), Some(store_mei)) if form_mei != store_mei => {
            found.push(Discrepancy::new(DiscrepancyKind::MeiMismatch {
                form_mei: form_mei.to_string(),
                loaniq_mei: store_mei.to_string(),
            }));
        }
        (Some(form_mei), None) => {
            found.push(Discrepancy::new(DiscrepancyKind::MeiMissingLoaniq {
                form_mei: form_mei.to_string(),
            }));
        }
        _ => {}
    }

    if let (Some(form_lei), Some(store_lei)) = (extracted.lei.as_deref(), candidate.lei.as_deref())
    {
        if form_lei != store_lei {
            found.push(Discrepancy::new(DiscrepancyKind::LeiMismatch {
                form_lei: form_lei.to_string(),
                loaniq_lei: store_lei.to_string(),
            }));
        }
    }

    if let (Some(form_ein), Some(store_ein)) = (extracted.ein.as_deref(), candidate.ein.as_deref())
    {
        if !ein_equal(form_ein, store_ein) {
            found.push(Discrepancy::new(DiscrepancyKind::EinMismatch {
                form_ein: form_ein.to_string(),
                loaniq_ein: store_ein.to_string(),
            }));
        }
    }

    if let (Some(form_id), Some(store_id)) = (
        extracted.debt_domain_id.as_deref(),
        candidate.debt_domain_id.as_deref(),
    ) {
        if form_id != store_id {
            found.push(Discrepancy::new(DiscrepancyKind::DebtDomainIdMismatch {
                form_id: form_id.to_string(),
                loaniq_id: store_id.to_string(),
            }));
        }
    }
}

fn detect_geographic_discrepancies(
    extracted: &ExtractedEntity,
    candidate: &StoreEntity,
    found: &mut Vec<Discrepancy>,
) {
    if let (Some(mei), Some(address_country)) =
        (extracted.mei.as_deref(), extracted.country_code.as_deref())
    {
        if let Some(mei_cc) = mei_country(mei) {
            if mei_cc != address_country {
                found.push(Discrepancy::new(DiscrepancyKind::CountryMismatchMeiAddress {
                    mei_country: mei_cc.to_string(),
                    address_country: address_country.to_string(),
                }));
            }
        }
    }

    if let (Some(form_country), Some(store_country)) =
        (extracted.country_code.as_deref(), candidate.country_code.as_deref())
    {
        if form_country != store_country {
            found.push(Discrepancy::new(DiscrepancyKind::CountryMismatchFormLoaniq {
                form_country: form_country.to_string(),
                loaniq_country: store_country.to_string(),
            }));
        }
    }

    if let (Some(tax_country), Some(legal_country)) =
        (extracted.tax_country_code.as_deref(), extracted.country_code.as_deref())
    {
        if tax_country != legal_country {
            found.push(Discrepancy::new(DiscrepancyKind::CountryMismatchTaxLegal {
                tax_country: tax_country.to_string(),
                legal_country: legal_country.to_string(),
            }));
        }
    }
}

fn detect_name_discrepancies(
    extracted: &ExtractedEntity,
    candidate: &StoreEntity,
    found: &mut Vec<Discrepancy>,
) {
    if let Some(form_dba) = extracted.dba.as_deref() {
        let candidate_upper = candidate.full_name.to_uppercase();
        if !candidate_upper.contains("DBA") && !candidate_upper.contains("D/B/A") {
            found.push(Discrepancy::new(DiscrepancyKind::DbaNotInLoaniq {
                form_dba: form_dba.to_string(),
            }));
        }
    }

    match (extracted.fund_manager.as_deref(), candidate.fund_manager.as_deref()) {
        (Some(form_manager), Some(store_manager)) => {
            let similarity = jaro_winkler(
                &normalize_fund_manager(form_manager),
                &normalize_fund_manager(store_manager),
            );
            if similarity < 0.7 {
                found.push(Discrepancy::new(DiscrepancyKind::FundManagerMismatch {
                    form_manager: form_manager.to_string(),
                    loaniq_manager: store_manager.to_string(),
                    similarity,
                }));
            }
        }
        (Some(form_manager), None) => {
            found.push(Discrepancy::new(DiscrepancyKind::FundManagerMissingLoaniq {
                form_manager: form_manager.to_string(),
            }));
        }
        (None, Some(store_manager)) => {
            found.push(Discrepancy::new(DiscrepancyKind::UnexpectedFundManagerLoaniq {
                loaniq_manager: store_manager.to_string(),
            }));
        }
        (None, None) => {}
    }
}

fn detect_cross_source_discrepancies(
    primary: &ExtractedEntity,
    tax_form: &ExtractedEntity,
    found: &mut Vec<Discrepancy>,
) {
    if let (Some(primary_ein), Some(tax_ein)) = (primary.ein.as_deref(), tax_form.ein.as_deref()) {
        if !ein_equal(primary_ein, tax_ein) {
            found.push(Discrepancy::new(DiscrepancyKind::EinMismatchCrossForm {
                primary_ein: primary_ein.to_string(),
                tax_ein: tax_ein.to_string(),
            }));
        }
    }

    if let (Some(primary_name), Some(tax_name)) =
        (primary.legal_name.as_deref(), tax_form.legal_name.as_deref())
    {
        let similarity = jaro_winkler(primary_name, tax_name);
        if similarity < 0.85 {
            found.push(Discrepancy::new(DiscrepancyKind::LegalNameMismatchCrossForm {
                primary_name: primary_name.to_string(),
                tax_name: tax_name.to_string(),
                similarity,
            }));
        }
    }

    if let (Some(primary_country), Some(tax_country)) =
        (primary.country_code.as_deref(), tax_form.country_code.as_deref())
    {
        if primary_country != tax_country {
            found.push(Discrepancy::new(DiscrepancyKind::CountryMismatchCrossForm {
                primary_country: primary_country.to_string(),
                tax_country: tax_country.to_string(),
            }));
        }
    }

    if let (Some(primary_mei), Some(tax_mei)) = (primary.mei.as_deref(), tax_form.mei.as_deref()) {
        if primary_mei != tax_mei {
            found.push(Discrepancy::new(DiscrepancyKind::MeiMismatchCrossForm {
                primary_mei: primary_mei.to_string(),
                tax_mei: tax_mei.to_string(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::{DiscrepancyAxis, DiscrepancySeverity};
    use crate::store::InMemoryStore;

    fn detector(records: Vec<StoreEntity>) -> DiscrepancyDetector {
        DiscrepancyDetector::new(Arc::new(InMemoryStore::new(records)))
    }

    fn labels(discrepancies: &[Discrepancy]) -> Vec<&'static str> {
        discrepancies.iter().map(|d| d.label()).collect()
    }

    #[tokio::test]
    async fn test_mei_mismatch_is_critical() {
        let extracted = ExtractedEntity {
            mei: Some("US12345678".to_string()),
            ..Default::default()
        };
        let candidate = StoreEntity {
            entity_id: 1,
            full_name: "Acme".to_string(),
            mei: Some("US87654321".to_string()),
            ..Default::default()
        };

        let found = detector(vec![]).detect(&extracted, None, &candidate).await;
        assert_eq!(labels(&found), vec!["MEI_MISMATCH"]);
        assert_eq!(found[0].severity, DiscrepancySeverity::Critical);
        assert_eq!(found[0].source, DiscrepancyAxis::IdentifierCheck);
    }

    #[tokio::test]
    async fn test_mei_missing_in_store() {
        let extracted = ExtractedEntity {
            mei: Some("US12345678".to_string()),
            ..Default::default()
        };
        let candidate = StoreEntity {
            entity_id: 1,
            full_name: "Acme".to_string(),
            ..Default::default()
        };

        let found = detector(vec![]).detect(&extracted, None, &candidate).await;
        assert_eq!(labels(&found), vec!["MEI_MISSING_LOANIQ"]);
        assert_eq!(found[0].severity, DiscrepancySeverity::High);
    }

    #[tokio::test]
    async fn test_ein_mismatch_ignores_hyphens() {
        let extracted = ExtractedEntity {
            ein: Some("12-3456789".to_string()),
            ..Default::default()
        };
        let candidate = StoreEntity {
            entity_id: 1,
            full_name: "Acme".to_string(),
            ein: Some("123456789".to_string()),
            ..Default::default()
        };

        let found = detector(vec![]).detect(&extracted, None, &candidate).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_geographic_axes() {
        let extracted = ExtractedEntity {
            mei: Some("GB12345678".to_string()),
            country_code: Some("US".to_string()),
            tax_country_code: Some("KY".to_string()),
            ..Default::default()
        };
        let candidate = StoreEntity {
            entity_id: 1,
            full_name: "Acme".to_string(),
            country_code: Some("FR".to_string()),
            ..Default::default()
        };

        let found = detector(vec![]).detect(&extracted, None, &candidate).await;
        let found_labels = labels(&found);
        assert!(found_labels.contains(&"COUNTRY_MISMATCH_MEI_ADDRESS"));
        assert!(found_labels.contains(&"COUNTRY_MISMATCH_FORM_LOANIQ"));
        assert!(found_labels.contains(&"COUNTRY_MISMATCH_TAX_LEGAL"));
    }

    #[tokio::test]
    async fn test_fund_manager_axes() {
        let extracted = ExtractedEntity {
            fund_manager: Some("Pacific Investment Management Company".to_string()),
            ..Default::default()
        };
        let candidate = StoreEntity {
            entity_id: 1,
            full_name: "Acme".to_string(),
            fund_manager: Some("Wellington Management".to_string()),
            ..Default::default()
        };
        let found = detector(vec![]).detect(&extracted, None, &candidate).await;
        assert!(labels(&found).contains(&"FUND_MANAGER_MISMATCH"));

        // Alias-equivalent managers raise nothing.
        let extracted = ExtractedEntity {
            fund_manager: Some("GSAM".to_string()),
            ..Default::default()
        };
        let candidate = StoreEntity {
            entity_id: 1,
            full_name: "Acme".to_string(),
            fund_manager: Some("Goldman Sachs Asset Management".to_string()),
            ..Default::default()
        };
        let found = detector(vec![]).detect(&extracted, None, &candidate).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_cross_source_axes() {
        let primary = ExtractedEntity {
            legal_name: Some("Acme Fund".to_string()),
            ein: Some("12-3456789".to_string()),
            mei: Some("US11111111".to_string()),
            country_code: Some("US".to_string()),
            ..Default::default()
        };
        let tax_form = ExtractedEntity {
            legal_name: Some("Zenith Holdings".to_string()),
            ein: Some("98-7654321".to_string()),
            mei: Some("US22222222".to_string()),
            country_code: Some("GB".to_string()),
            ..Default::default()
        };
        let candidate = StoreEntity {
            entity_id: 1,
            full_name: "Acme Fund".to_string(),
            mei: Some("US11111111".to_string()),
            country_code: Some("US".to_string()),
            ..Default::default()
        };

        let found = detector(vec![])
            .detect(&primary, Some(&tax_form), &candidate)
            .await;
        let found_labels = labels(&found);
        assert!(found_labels.contains(&"EIN_MISMATCH_CROSS_FORM"));
        assert!(found_labels.contains(&"LEGAL_NAME_MISMATCH_CROSS_FORM"));
        assert!(found_labels.contains(&"COUNTRY_MISMATCH_CROSS_FORM"));
        assert!(found_labels.contains(&"MEI_MISMATCH_CROSS_FORM"));
    }

    #[tokio::test]
    async fn test_internal_checks() {
        let candidate = StoreEntity {
            entity_id: 1,
            full_name: "ACME Corp".to_string(),
            short_name: Some("ACME".to_string()),
            mei: Some("GB99999999".to_string()),
            country_code: Some("US".to_string()),
            ..Default::default()
        };
        let sibling = StoreEntity {
            entity_id: 2,
            full_name: "ACME Corporation".to_string(),
            short_name: Some("ACME.".to_string()),
            ..Default::default()
        };

        let found = detector(vec![candidate.clone(), sibling])
            .detect(&ExtractedEntity::default(), None, &candidate)
            .await;
        let found_labels = labels(&found);
        assert!(found_labels.contains(&"POTENTIAL_DUPLICATE_SHORT_NAME"));
        assert!(found_labels.contains(&"INTERNAL_COUNTRY_MISMATCH"));
    }

    #[tokio::test]
    async fn test_orphaned_location() {
        let candidate = StoreEntity {
            entity_id: 900,
            full_name: "Branch Office".to_string(),
            is_location: true,
            parent_customer_id: None,
            ..Default::default()
        };
        let found = detector(vec![])
            .detect(&ExtractedEntity::default(), None, &candidate)
            .await;
        assert!(labels(&found).contains(&"ORPHANED_LOCATION_RECORD"));
    }
}
