// src/orchestrator/mod.rs
//! Document-pair processing and batch scheduling.
//!
//! Each record is a primary form plus an optional tax form. The two
//! extractions run in parallel; the consumer waits on the secondary with a
//! bounded timeout and proceeds without it rather than failing the record.
//! Batches run on a bounded worker pool with a hard per-record deadline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use indicatif::ProgressBar;
use log::{error, info, warn};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::MatchingConfig;
use crate::matching::engine::{determine_decision, MatchingEngine};
use crate::models::core::{EntityType, ExtractedEntity};
use crate::models::matching::{DiscrepancySeverity, MatchResult};
use crate::models::processing::{Decision, ProcessingResult};
use crate::store::RecordStore;
use crate::utils::country;
use crate::utils::service_provider;

/// Extraction collaborator: turns raw form bytes into an entity record.
/// Document parsing itself (PDF/OCR/field regexes) lives behind this trait.
#[async_trait]
pub trait FormExtractor: Send + Sync {
    async fn extract(&self, content: &[u8], filename: &str) -> Result<ExtractedEntity>;
}

/// Entity-type inference collaborator; the orchestrator only consumes its
/// output.
pub trait TypeDetector: Send + Sync {
    fn detect(&self, entity: &ExtractedEntity) -> EntityType;
}

/// Minimal detector for wiring: the fund-manager field decides.
pub struct FieldPresenceTypeDetector;

impl TypeDetector for FieldPresenceTypeDetector {
    fn detect(&self, entity: &ExtractedEntity) -> EntityType {
        if entity.fund_manager.is_some() {
            EntityType::ManagedFund
        } else if entity.legal_name.is_some() {
            EntityType::Standalone
        } else {
            EntityType::Unknown
        }
    }
}

/// Extractor for pre-extracted records serialized as JSON. Used by the
/// batch CLI and fixtures; real document extraction is a separate service.
pub struct JsonExtractor;

#[async_trait]
impl FormExtractor for JsonExtractor {
    async fn extract(&self, content: &[u8], filename: &str) -> Result<ExtractedEntity> {
        serde_json::from_slice(content)
            .with_context(|| format!("Failed to parse extracted entity from {}", filename))
    }
}

/// One unit of batch work: the primary form and an optional tax form.
pub struct DocumentPair {
    pub reference_id: String,
    pub primary_content: Vec<u8>,
    pub primary_filename: String,
    pub tax_content: Option<Vec<u8>>,
    pub tax_filename: Option<String>,
}

pub struct MatchingOrchestrator {
    extractor: Arc<dyn FormExtractor>,
    type_detector: Arc<dyn TypeDetector>,
    engine: Arc<MatchingEngine>,
    config: MatchingConfig,
    workers: Arc<Semaphore>,
}

impl MatchingOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        extractor: Arc<dyn FormExtractor>,
        type_detector: Arc<dyn TypeDetector>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            extractor,
            type_detector,
            engine: Arc::new(MatchingEngine::new(store, config.clone())),
            workers: Arc::new(Semaphore::new(config.worker_pool_size)),
            config,
        }
    }

    /// Process a single document pair end to end.
    pub async fn process_documents(&self, pair: DocumentPair) -> ProcessingResult {
        let started = Instant::now();
        let mut result = ProcessingResult::new();
        result.add_metadata("reference_id", pair.reference_id.clone());

        match self.run_pipeline(&pair, &mut result).await {
            Ok(()) => {}
            Err(e) => {
                error!("Processing failed for {}: {:#}", pair.reference_id, e);
                result.add_audit_entry(format!("Processing failed: {:#}", e));
                result.decision = Decision::Error;
                result.add_metadata("error", format!("{:#}", e));
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        result.processing_time_ms = elapsed_ms;
        result.add_audit_entry(format!("Processing completed in {} ms", elapsed_ms));
        result.add_metadata("processing_time_ms", elapsed_ms);
        result
    }

    async fn run_pipeline(
        &self,
        pair: &DocumentPair,
        result: &mut ProcessingResult,
    ) -> Result<()> {
        // Stage 1: primary extraction.
        result.add_audit_entry(format!("Starting primary extraction from: {}", pair.primary_filename));
        let mut primary = self
            .extractor
            .extract(&pair.primary_content, &pair.primary_filename)
            .await
            .context("Primary form extraction failed")?;
        prepare_extraction(&mut primary);
        result.add_audit_entry(format!(
            "Primary extraction complete. Confidence: {:.2}",
            primary.extraction_confidence
        ));
        log_extracted_identifiers(&primary, result);

        // Stage 2: tax form extraction runs in parallel with type detection.
        let tax_task = pair.tax_content.as_ref().map(|content| {
            let extractor = Arc::clone(&self.extractor);
            let content = content.clone();
            let filename = pair
                .tax_filename
                .clone()
                .unwrap_or_else(|| "tax_form".to_string());
            result.add_audit_entry(format!("Starting tax form extraction from: {}", filename));
            tokio::spawn(async move { extractor.extract(&content, &filename).await })
        });

        // Stage 3: entity type.
        let entity_type = self.type_detector.detect(&primary);
        result.entity_type = entity_type;
        result.add_audit_entry(format!("Entity type detected: {:?}", entity_type));
        result.add_metadata("entity_type", json!(entity_type));

        // Collect the tax extraction, bounded; a slow or failed secondary
        // never fails the primary.
        let mut tax_form: Option<ExtractedEntity> = None;
        if let Some(task) = tax_task {
            match timeout(self.config.secondary_extraction_timeout, task).await {
                Ok(Ok(Ok(mut extracted))) => {
                    prepare_extraction(&mut extracted);
                    result.add_audit_entry(format!(
                        "Tax form extraction complete. Confidence: {:.2}",
                        extracted.extraction_confidence
                    ));
                    log_extracted_identifiers(&extracted, result);
                    tax_form = Some(extracted);
                }
                Ok(Ok(Err(e))) => {
                    warn!("Tax form extraction failed: {:#}", e);
                    result.add_audit_entry(format!("Tax form extraction failed: {:#}", e));
                }
                Ok(Err(join_error)) => {
                    warn!("Tax form extraction task panicked: {}", join_error);
                    result.add_audit_entry("Tax form extraction failed unexpectedly");
                }
                Err(_) => {
                    result.add_audit_entry("Tax form extraction timed out");
                }
            }
        }

        // Stage 4: matching.
        result.add_audit_entry("Starting entity matching");
        let matches = self.engine.find_matches(&primary, tax_form.as_ref()).await;

        for (rank, matched) in matches.iter().enumerate() {
            result.add_audit_entry(format!(
                "Match {}: {} (Score: {:.2}, Strategy: {:?})",
                rank + 1,
                matched.entity.full_name,
                matched.score(),
                matched.strategy
            ));
        }

        // Stage 5: selection and decision.
        if let Some(best) = matches.first() {
            let decision = determine_decision(Some(best));
            result.add_audit_entry(format!(
                "Best match selected: {} (ID: {}, Score: {:.2}, Confidence: {}, Decision: {:?})",
                best.entity.full_name,
                best.entity.entity_id,
                best.score(),
                best.confidence(),
                decision
            ));
            log_discrepancies(best, result);
            if !best.potential_duplicates.is_empty() {
                result.add_audit_entry(format!(
                    "Potential duplicates detected: {}",
                    best.potential_duplicates.len()
                ));
                result.add_metadata("duplicate_count", best.potential_duplicates.len());
            }
            result.selected_match = Some(best.clone());
            result.decision = decision;
        } else {
            result.decision = Decision::NoMatch;
            result.add_audit_entry("No matches found - new entity");
        }

        result.extracted_data = Some(primary);
        result.tax_form_data = tax_form;
        result.top_matches = matches;
        Ok(())
    }

    /// Process a batch on the bounded worker pool. Each record has a hard
    /// deadline; a record that exceeds it is reported as an error envelope
    /// and the batch continues. Records cancelled by shutdown are dropped.
    pub async fn process_batch(
        self: Arc<Self>,
        documents: Vec<DocumentPair>,
        progress: Option<ProgressBar>,
    ) -> Vec<ProcessingResult> {
        let batch_id = Uuid::new_v4();
        info!("Starting batch {} with {} documents", batch_id, documents.len());

        let mut tasks = Vec::with_capacity(documents.len());
        for pair in documents {
            let orchestrator = Arc::clone(&self);
            let progress = progress.clone();
            let record_timeout = self.config.record_timeout;

            tasks.push(tokio::spawn(async move {
                let permit = match orchestrator.workers.acquire().await {
                    Ok(permit) => permit,
                    // Pool closed by shutdown: the record is cancelled, not reported.
                    Err(_) => return None,
                };
                let reference_id = pair.reference_id.clone();

                let outcome = timeout(record_timeout, orchestrator.process_documents(pair)).await;
                drop(permit);
                if let Some(pb) = progress {
                    pb.inc(1);
                }

                Some(match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        error!("Record {} exceeded the processing deadline", reference_id);
                        let mut failed = ProcessingResult::new();
                        failed.decision = Decision::Error;
                        failed.add_audit_entry(format!(
                            "Processing exceeded the {}s deadline",
                            record_timeout.as_secs()
                        ));
                        failed.add_metadata("reference_id", reference_id);
                        failed.add_metadata("error", "record timeout");
                        failed
                    }
                })
            }));
        }

        let results: Vec<ProcessingResult> = join_all(tasks)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(result) => result,
                Err(join_error) => {
                    error!("Batch worker panicked: {}", join_error);
                    let mut failed = ProcessingResult::new();
                    failed.decision = Decision::Error;
                    failed.add_audit_entry("Batch worker failed unexpectedly");
                    failed.add_metadata("error", join_error.to_string());
                    Some(failed)
                }
            })
            .collect();

        info!("Batch {} complete. Processed {} documents", batch_id, results.len());
        results
    }

    /// Drain workers: stop admitting new records, then wait up to the grace
    /// period for in-flight ones to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down orchestrator");
        self.workers.close();

        let deadline = Instant::now() + self.config.shutdown_grace;
        while self.workers.available_permits() < self.config.worker_pool_size {
            if Instant::now() >= deadline {
                warn!("Shutdown grace period elapsed with workers still busy");
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        info!("Orchestrator shutdown complete");
    }
}

/// Post-extraction enforcement shared by all extractors: canonical
/// identifiers, normalized country codes, and a primary email domain chosen
/// from contact addresses when the extraction didn't pick one.
fn prepare_extraction(entity: &mut ExtractedEntity) {
    entity.canonicalize_identifiers();
    if let Some(code) = entity.country_code.take() {
        entity.country_code = Some(country::normalize_country(&code));
    }
    if let Some(code) = entity.tax_country_code.take() {
        entity.tax_country_code = Some(country::normalize_country(&code));
    }
    if entity.email_domain.is_none() && !entity.contact_emails.is_empty() {
        entity.email_domain = service_provider::primary_entity_domain(&entity.contact_emails);
    }
}

fn log_extracted_identifiers(entity: &ExtractedEntity, result: &mut ProcessingResult) {
    if let Some(mei) = entity.mei.as_deref() {
        result.add_audit_entry(format!("  MEI: {}", mei));
    }
    if let Some(lei) = entity.lei.as_deref() {
        result.add_audit_entry(format!("  LEI: {}", lei));
    }
    if let Some(ein) = entity.ein.as_deref() {
        result.add_audit_entry(format!("  EIN: {}", ein));
    }
    if let Some(debt_domain_id) = entity.debt_domain_id.as_deref() {
        result.add_audit_entry(format!("  Debt Domain ID: {}", debt_domain_id));
    }
    if let Some(email_domain) = entity.email_domain.as_deref() {
        result.add_audit_entry(format!("  Email Domain: {}", email_domain));
    }
}

fn log_discrepancies(matched: &MatchResult, result: &mut ProcessingResult) {
    if matched.discrepancies.is_empty() {
        return;
    }

    result.add_audit_entry(format!("Found {} discrepancies:", matched.discrepancies.len()));

    let mut severity_counts: HashMap<String, usize> = HashMap::new();
    for discrepancy in &matched.discrepancies {
        *severity_counts
            .entry(discrepancy.severity.to_string())
            .or_insert(0) += 1;

        if matches!(
            discrepancy.severity,
            DiscrepancySeverity::Critical | DiscrepancySeverity::High
        ) {
            result.add_audit_entry(format!(
                "  - [{}] {}: {}",
                discrepancy.severity,
                discrepancy.label(),
                discrepancy.description
            ));
        }
    }

    result.add_metadata("discrepancy_counts", json!(severity_counts));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_presence_type_detector() {
        let detector = FieldPresenceTypeDetector;

        let managed = ExtractedEntity {
            legal_name: Some("ABC Pension Plan".to_string()),
            fund_manager: Some("GSAM".to_string()),
            ..Default::default()
        };
        assert_eq!(detector.detect(&managed), EntityType::ManagedFund);

        let standalone = ExtractedEntity {
            legal_name: Some("Acme Corp".to_string()),
            ..Default::default()
        };
        assert_eq!(detector.detect(&standalone), EntityType::Standalone);

        assert_eq!(detector.detect(&ExtractedEntity::default()), EntityType::Unknown);
    }

    #[test]
    fn test_prepare_extraction() {
        let mut entity = ExtractedEntity {
            mei: Some("us12345678".to_string()),
            country_code: Some("United States".to_string()),
            contact_emails: vec![
                "ops@acmefund.com".to_string(),
                "counsel@kirkland.com".to_string(),
            ],
            ..Default::default()
        };
        prepare_extraction(&mut entity);

        assert_eq!(entity.mei.as_deref(), Some("US12345678"));
        assert_eq!(entity.country_code.as_deref(), Some("US"));
        assert_eq!(entity.email_domain.as_deref(), Some("acmefund.com"));
    }

    #[tokio::test]
    async fn test_json_extractor_roundtrip() {
        let payload = serde_json::json!({
            "legal_name": "Acme Fund",
            "mei": "US12345678",
            "extraction_confidence": 0.92
        });
        let entity = JsonExtractor
            .extract(payload.to_string().as_bytes(), "acme.json")
            .await
            .unwrap();
        assert_eq!(entity.legal_name.as_deref(), Some("Acme Fund"));
        assert_eq!(entity.extraction_confidence, 0.92);

        let err = JsonExtractor.extract(b"not json", "bad.json").await;
        assert!(err.is_err());
    }
}
