// src/models/processing.rs
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::core::{EntityType, ExtractedEntity};
use crate::models::matching::MatchResult;

/// Final categorical outcome for a processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Match,
    ManualReview,
    NoMatch,
    Error,
}

/// Per-record envelope: extractions, ranked matches, decision and audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub extracted_data: Option<ExtractedEntity>,
    pub tax_form_data: Option<ExtractedEntity>,
    pub entity_type: EntityType,
    pub top_matches: Vec<MatchResult>,
    pub selected_match: Option<MatchResult>,
    pub decision: Decision,
    pub audit_trail: Vec<String>,
    pub processed_at: NaiveDateTime,
    pub processing_time_ms: u64,
    pub metadata: HashMap<String, Value>,
}

impl Default for ProcessingResult {
    fn default() -> Self {
        Self {
            extracted_data: None,
            tax_form_data: None,
            entity_type: EntityType::Unknown,
            top_matches: Vec::new(),
            selected_match: None,
            decision: Decision::NoMatch,
            audit_trail: Vec::new(),
            processed_at: Utc::now().naive_utc(),
            processing_time_ms: 0,
            metadata: HashMap::new(),
        }
    }
}

impl ProcessingResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a timestamped entry to the audit trail.
    pub fn add_audit_entry(&mut self, entry: impl AsRef<str>) {
        self.audit_trail.push(format!(
            "[{}] {}",
            Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.3f"),
            entry.as_ref()
        ));
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn is_successful(&self) -> bool {
        self.decision != Decision::Error
    }

    pub fn requires_review(&self) -> bool {
        self.decision == Decision::ManualReview
    }
}
