// tests/engine_scenarios.rs
//! End-to-end matching scenarios over an in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use counterparty_matching::config::MatchingConfig;
use counterparty_matching::matching::engine::{determine_decision, MatchingEngine};
use counterparty_matching::models::core::{ExtractedEntity, StoreEntity};
use counterparty_matching::models::matching::{ConfidenceLevel, DiscrepancySeverity, MatchStrategy};
use counterparty_matching::models::processing::Decision;
use counterparty_matching::orchestrator::{
    DocumentPair, FieldPresenceTypeDetector, FormExtractor, JsonExtractor, MatchingOrchestrator,
};
use counterparty_matching::store::{InMemoryStore, RecordStore};

fn engine(records: Vec<StoreEntity>) -> MatchingEngine {
    MatchingEngine::new(
        Arc::new(InMemoryStore::new(records)),
        MatchingConfig::default(),
    )
}

fn store_entity(entity_id: i64, full_name: &str) -> StoreEntity {
    StoreEntity {
        entity_id,
        full_name: full_name.to_string(),
        ..Default::default()
    }
}

fn extraction(legal_name: &str) -> ExtractedEntity {
    ExtractedEntity {
        legal_name: Some(legal_name.to_string()),
        ..Default::default()
    }
}

// Scenario: a single exact MEI match with an agreeing name.
#[tokio::test]
async fn perfect_mei_match() {
    let mut record = store_entity(1, "Acme Fund");
    record.mei = Some("US12345678".to_string());
    record.country_code = Some("US".to_string());

    let mut extracted = extraction("Acme Fund");
    extracted.mei = Some("US12345678".to_string());

    let matches = engine(vec![record]).find_matches(&extracted, None).await;

    assert_eq!(matches.len(), 1);
    let best = &matches[0];
    assert_eq!(best.entity.entity_id, 1);
    assert!(best.score() >= 85.0, "score was {}", best.score());
    assert!(matches!(
        best.confidence(),
        ConfidenceLevel::MediumHigh | ConfidenceLevel::High
    ));
    assert_eq!(best.strategy, MatchStrategy::Identifier);
    assert!(!best.has_critical_discrepancies());
    assert_eq!(determine_decision(Some(best)), Decision::Match);
}

// Scenario: a corroborating LEI never lowers the score and lands in the
// HIGH band once the total clears 95.
#[tokio::test]
async fn corroborating_lei_boosts() {
    let mut record = store_entity(1, "Acme Fund");
    record.mei = Some("US12345678".to_string());
    record.lei = Some("529900T8BM49AURSDO55".to_string());
    record.country_code = Some("US".to_string());

    let mut mei_only = extraction("Acme Fund");
    mei_only.mei = Some("US12345678".to_string());

    let mut both = mei_only.clone();
    both.lei = Some("529900T8BM49AURSDO55".to_string());

    let engine = engine(vec![record]);
    let baseline = engine.find_matches(&mei_only, None).await;
    let corroborated = engine.find_matches(&both, None).await;

    let baseline_score = baseline[0].score();
    let corroborated_score = corroborated[0].score();
    assert!(corroborated_score >= baseline_score);
    assert!(corroborated_score <= 100.0);
    assert_eq!(corroborated[0].score_breakdown.identifier_axes_matched(), 2);
    assert!(corroborated[0]
        .evidence
        .contains(&"2 identifiers matched".to_string()));
    if corroborated_score >= 95.0 {
        assert_eq!(corroborated[0].confidence(), ConfidenceLevel::High);
    }
}

// Scenario: a name-found candidate whose identifiers contradict the form.
// Accumulated penalties (25 + 15 + 10) push an 0.85 name under the
// NO_MATCH line.
#[tokio::test]
async fn identifier_mismatch_sinks_candidate() {
    let mut record = store_entity(2, "Acme Fund Group");
    record.mei = Some("GB87654321".to_string());
    record.lei = Some("AAAAAAAAAAAAAAAAAA11".to_string());
    record.country_code = Some("GB".to_string());

    let mut extracted = extraction("Acme Fund");
    extracted.mei = Some("US12345678".to_string());
    extracted.lei = Some("BBBBBBBBBBBBBBBBBB22".to_string());
    extracted.country_code = Some("US".to_string());

    let matches = engine(vec![record]).find_matches(&extracted, None).await;

    assert_eq!(matches.len(), 1);
    let best = &matches[0];
    assert_eq!(best.strategy, MatchStrategy::FuzzyName);

    let mei_mismatch = best
        .discrepancies
        .iter()
        .find(|d| d.label() == "MEI_MISMATCH")
        .expect("MEI_MISMATCH expected");
    assert_eq!(mei_mismatch.severity, DiscrepancySeverity::Critical);
    assert!(best.discrepancies.iter().any(|d| d.label() == "LEI_MISMATCH"));
    assert!(best
        .discrepancies
        .iter()
        .any(|d| d.label() == "COUNTRY_MISMATCH_FORM_LOANIQ"));

    // Subset-floor name score, no geographic bonus, minus the 50-point
    // penalty cap: well under the NO_MATCH line.
    assert!(best.score() < 50.0, "score was {}", best.score());
    assert_eq!(determine_decision(Some(best)), Decision::NoMatch);
}

// Scenario: composite managed fund where the store spells the manager as an
// acronym.
#[tokio::test]
async fn composite_managed_fund_with_alias() {
    let mut record = store_entity(3, "ABC Pension Plan");
    record.fund_manager = Some("GSAM".to_string());

    let mut extracted = extraction("ABC Pension Plan");
    extracted.fund_manager = Some("Goldman Sachs Asset Management".to_string());

    let matches = engine(vec![record]).find_matches(&extracted, None).await;

    assert_eq!(matches.len(), 1);
    let best = &matches[0];
    assert!(best.composite_match);
    assert!(best.score() >= 85.0, "score was {}", best.score());
    assert_eq!(determine_decision(Some(best)), Decision::Match);
    assert!(!best
        .discrepancies
        .iter()
        .any(|d| d.label() == "FUND_MANAGER_MISMATCH"));
}

// Scenario: the two forms disagree on EIN. One critical cross-form
// discrepancy (validator and detector never double-report), the -15
// validator adjustment, and a forced manual review.
#[tokio::test]
async fn cross_form_ein_conflict() {
    let record = store_entity(4, "Acme Fund");

    let mut primary = extraction("Acme Fund");
    primary.ein = Some("12-3456789".to_string());
    let mut tax_form = extraction("Acme Fund");
    tax_form.ein = Some("98-7654321".to_string());

    let matches = engine(vec![record])
        .find_matches(&primary, Some(&tax_form))
        .await;

    assert_eq!(matches.len(), 1);
    let best = &matches[0];

    let ein_conflicts: Vec<_> = best
        .discrepancies
        .iter()
        .filter(|d| d.label() == "EIN_MISMATCH_CROSS_FORM")
        .collect();
    assert_eq!(ein_conflicts.len(), 1, "cross-form EIN conflict reported once");
    assert_eq!(ein_conflicts[0].severity, DiscrepancySeverity::Critical);

    // -15 EIN conflict, +8 consistent names, +5 tax name matches the candidate.
    assert_eq!(
        best.score_breakdown.get(
            counterparty_matching::models::matching::ScoreComponent::TaxFormValidation
        ),
        Some(-2.0)
    );

    // name 100 + geo 10 - 25 critical - 2 validation = 83: review band.
    assert!(best.score() >= 70.0 && best.score() < 85.0, "score was {}", best.score());
    assert_eq!(determine_decision(Some(best)), Decision::ManualReview);
}

// Scenario: two store rows differing only in short-name punctuation. The
// winner carries the other as a potential duplicate and pays for it.
#[tokio::test]
async fn store_duplicates_detected() {
    let mut first = store_entity(5, "Acme Industrial Holdings");
    first.short_name = Some("ACME".to_string());
    let mut second = store_entity(6, "Acme Industrial Holdings Inc");
    second.short_name = Some("ACME.".to_string());

    let extracted = extraction("Acme Ind");

    let matches = engine(vec![first, second]).find_matches(&extracted, None).await;

    assert!(!matches.is_empty());
    let best = &matches[0];
    assert_eq!(best.entity.entity_id, 5);
    assert!(best
        .potential_duplicates
        .iter()
        .any(|d| d.entity_id == 6));

    let dup_disc = best
        .discrepancies
        .iter()
        .find(|d| d.label() == "POTENTIAL_DUPLICATE_SHORT_NAME")
        .expect("duplicate short-name discrepancy expected");
    assert_eq!(dup_disc.severity, DiscrepancySeverity::Low);

    // 85 subset name + 10 geo - 5 low discrepancy - 5 duplicate deduction.
    assert!((best.score() - 85.0).abs() < 1.0, "score was {}", best.score());
}

// Scenario: no identifiers and no usable legal name, only an email domain.
// The domain search seeds a baseline candidate.
#[tokio::test]
async fn email_domain_seeds_baseline_candidate() {
    let record = store_entity(7, "Blackrock Global Allocation Fund");

    let extracted = ExtractedEntity {
        email_domain: Some("blackrock.com".to_string()),
        ..Default::default()
    };

    let matches = engine(vec![record]).find_matches(&extracted, None).await;

    assert_eq!(matches.len(), 1);
    let best = &matches[0];
    assert_eq!(best.strategy, MatchStrategy::EmailDomain);
    assert!(best
        .evidence
        .contains(&"Email domain match: blackrock.com".to_string()));
    // 60 baseline + 10 geographic (nothing contradicts).
    assert!((best.score() - 70.0).abs() < 1e-9, "score was {}", best.score());
}

// Invariant: every returned score is in [0,100] and entity ids are unique.
#[tokio::test]
async fn scores_bounded_and_unique() {
    let mut record_a = store_entity(1, "Acme Fund");
    record_a.mei = Some("US12345678".to_string());
    record_a.lei = Some("529900T8BM49AURSDO55".to_string());
    record_a.ein = Some("12-3456789".to_string());
    record_a.country_code = Some("US".to_string());
    let record_b = store_entity(2, "Acme Fund Partners");
    let record_c = store_entity(3, "Acme Fund Global");

    let mut extracted = extraction("Acme Fund");
    extracted.mei = Some("US12345678".to_string());
    extracted.lei = Some("529900T8BM49AURSDO55".to_string());
    extracted.ein = Some("12-3456789".to_string());

    let matches = engine(vec![record_a, record_b, record_c])
        .find_matches(&extracted, None)
        .await;

    assert!(matches.len() <= 5);
    let mut seen = std::collections::HashSet::new();
    for result in &matches {
        assert!(result.score() >= 0.0 && result.score() <= 100.0);
        assert!(seen.insert(result.entity.entity_id), "duplicate entity in top-K");
        assert_eq!(result.confidence(), ConfidenceLevel::from_score(result.score()));
    }
    // Sorted descending.
    for pair in matches.windows(2) {
        assert!(pair[0].score() >= pair[1].score());
    }
}

// Invariant: adding a higher-priority identifier never lowers the top score.
#[tokio::test]
async fn identifier_priority_monotonicity() {
    let mut record = store_entity(1, "Meridian Structured Credit");
    record.mei = Some("US12345678".to_string());
    record.ein = Some("12-3456789".to_string());
    record.country_code = Some("US".to_string());

    let mut ein_only = extraction("Meridian Structured");
    ein_only.ein = Some("12-3456789".to_string());
    let mut with_mei = ein_only.clone();
    with_mei.mei = Some("US12345678".to_string());

    let engine = engine(vec![record]);
    let baseline = engine.find_matches(&ein_only, None).await;
    let upgraded = engine.find_matches(&with_mei, None).await;

    assert!(upgraded[0].score() >= baseline[0].score());
}

// A store whose name search fails transiently: identifier strategies still
// produce results and the failure never surfaces to the caller.
struct FlakyNameStore {
    inner: InMemoryStore,
}

#[async_trait]
impl RecordStore for FlakyNameStore {
    async fn find_by_mei(&self, mei: &str) -> Result<Vec<StoreEntity>> {
        self.inner.find_by_mei(mei).await
    }
    async fn find_by_lei(&self, lei: &str) -> Result<Vec<StoreEntity>> {
        self.inner.find_by_lei(lei).await
    }
    async fn find_by_ein(&self, ein: &str) -> Result<Vec<StoreEntity>> {
        self.inner.find_by_ein(ein).await
    }
    async fn find_by_debt_domain_id(&self, id: &str) -> Result<Vec<StoreEntity>> {
        self.inner.find_by_debt_domain_id(id).await
    }
    async fn find_candidates_by_name(
        &self,
        _legal_name: &str,
        _fund_manager: Option<&str>,
    ) -> Result<Vec<StoreEntity>> {
        anyhow::bail!("replica connection reset")
    }
    async fn find_by_email_domain(&self, domain: &str) -> Result<Vec<StoreEntity>> {
        self.inner.find_by_email_domain(domain).await
    }
    async fn find_by_cleaned_short_name(&self, cleaned: &str) -> Result<Vec<StoreEntity>> {
        self.inner.find_by_cleaned_short_name(cleaned).await
    }
    async fn find_by_id(&self, entity_id: i64) -> Result<Option<StoreEntity>> {
        self.inner.find_by_id(entity_id).await
    }
}

#[tokio::test]
async fn transient_store_failure_degrades_gracefully() {
    let mut record = store_entity(1, "Acme Fund");
    record.mei = Some("US12345678".to_string());

    let store = FlakyNameStore {
        inner: InMemoryStore::new(vec![record]),
    };
    let engine = MatchingEngine::new(Arc::new(store), MatchingConfig::default());

    let mut extracted = extraction("Acme Fund");
    extracted.mei = Some("US12345678".to_string());

    let matches = engine.find_matches(&extracted, None).await;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].strategy, MatchStrategy::Identifier);
}

// Orchestrator: full document-pair processing over JSON payloads.
#[tokio::test]
async fn orchestrator_processes_pair() {
    let mut record = store_entity(1, "Acme Fund");
    record.mei = Some("US12345678".to_string());
    record.country_code = Some("US".to_string());

    let orchestrator = Arc::new(MatchingOrchestrator::new(
        Arc::new(InMemoryStore::new(vec![record])),
        Arc::new(JsonExtractor),
        Arc::new(FieldPresenceTypeDetector),
        MatchingConfig::default(),
    ));

    let primary = serde_json::json!({
        "legal_name": "Acme Fund",
        "mei": "us12345678",
        "extraction_confidence": 0.9
    });
    let tax = serde_json::json!({
        "legal_name": "Acme Fund",
        "ein": "12-3456789",
        "extraction_confidence": 0.8
    });

    let result = orchestrator
        .process_documents(DocumentPair {
            reference_id: "ref-1".to_string(),
            primary_content: primary.to_string().into_bytes(),
            primary_filename: "acme.json".to_string(),
            tax_content: Some(tax.to_string().into_bytes()),
            tax_filename: Some("acme_tax.json".to_string()),
        })
        .await;

    assert_eq!(result.decision, Decision::Match);
    let selected = result.selected_match.as_ref().expect("selected match");
    assert_eq!(selected.entity.entity_id, 1);
    // The lowercase MEI was canonicalized before matching.
    assert_eq!(
        result.extracted_data.as_ref().unwrap().mei.as_deref(),
        Some("US12345678")
    );
    assert!(result.tax_form_data.is_some());
    assert!(!result.audit_trail.is_empty());
    assert_eq!(
        result.metadata.get("reference_id").and_then(|v| v.as_str()),
        Some("ref-1")
    );
}

// Orchestrator: a malformed record yields an ERROR envelope while the rest
// of the batch completes.
#[tokio::test]
async fn batch_isolates_record_failures() {
    let mut record = store_entity(1, "Acme Fund");
    record.mei = Some("US12345678".to_string());

    let orchestrator = Arc::new(MatchingOrchestrator::new(
        Arc::new(InMemoryStore::new(vec![record])),
        Arc::new(JsonExtractor),
        Arc::new(FieldPresenceTypeDetector),
        MatchingConfig::default(),
    ));

    let good = serde_json::json!({"legal_name": "Acme Fund", "mei": "US12345678"});
    let pairs = vec![
        DocumentPair {
            reference_id: "good".to_string(),
            primary_content: good.to_string().into_bytes(),
            primary_filename: "good.json".to_string(),
            tax_content: None,
            tax_filename: None,
        },
        DocumentPair {
            reference_id: "bad".to_string(),
            primary_content: b"{not json".to_vec(),
            primary_filename: "bad.json".to_string(),
            tax_content: None,
            tax_filename: None,
        },
    ];

    let results = orchestrator.process_batch(pairs, None).await;
    assert_eq!(results.len(), 2);

    let by_ref = |name: &str| {
        results
            .iter()
            .find(|r| r.metadata.get("reference_id").and_then(|v| v.as_str()) == Some(name))
            .unwrap()
    };
    assert_eq!(by_ref("good").decision, Decision::Match);
    assert_eq!(by_ref("bad").decision, Decision::Error);
    assert!(by_ref("bad").metadata.contains_key("error"));
}

// Orchestrator: a hanging tax-form extraction is dropped at the timeout and
// noted in the audit trail without failing the primary.
struct SlowTaxExtractor;

#[async_trait]
impl FormExtractor for SlowTaxExtractor {
    async fn extract(&self, content: &[u8], filename: &str) -> Result<ExtractedEntity> {
        if filename.contains("tax") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        JsonExtractor.extract(content, filename).await
    }
}

#[tokio::test]
async fn secondary_extraction_timeout_is_tolerated() {
    let mut record = store_entity(1, "Acme Fund");
    record.mei = Some("US12345678".to_string());

    let mut config = MatchingConfig::default();
    config.secondary_extraction_timeout = Duration::from_millis(50);

    let orchestrator = Arc::new(MatchingOrchestrator::new(
        Arc::new(InMemoryStore::new(vec![record])),
        Arc::new(SlowTaxExtractor),
        Arc::new(FieldPresenceTypeDetector),
        config,
    ));

    let payload = serde_json::json!({"legal_name": "Acme Fund", "mei": "US12345678"});
    let result = orchestrator
        .process_documents(DocumentPair {
            reference_id: "slow".to_string(),
            primary_content: payload.to_string().into_bytes(),
            primary_filename: "acme.json".to_string(),
            tax_content: Some(payload.to_string().into_bytes()),
            tax_filename: Some("acme_tax.json".to_string()),
        })
        .await;

    assert_eq!(result.decision, Decision::Match);
    assert!(result.tax_form_data.is_none());
    assert!(result
        .audit_trail
        .iter()
        .any(|entry| entry.contains("Tax form extraction timed out")));
}
