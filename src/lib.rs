//! Counterparty matching engine for trading-participant onboarding.
//!
//! Takes entity records extracted from participant forms (administrative
//! detail forms plus optional tax forms), searches the LoanIQ system of
//! record through a layered strategy (identifiers, composite fuzzy names,
//! email domains), and produces ranked match candidates with evidence,
//! discrepancies, duplicate warnings and a categorical decision.

pub mod config;
pub mod identifiers;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod store;
pub mod utils;

pub use config::MatchingConfig;
pub use matching::engine::MatchingEngine;
pub use models::core::{EntityType, ExtractedEntity, StoreEntity};
pub use models::matching::{ConfidenceLevel, Discrepancy, MatchResult, MatchStrategy};
pub use models::processing::{Decision, ProcessingResult};
pub use orchestrator::{DocumentPair, MatchingOrchestrator};
pub use store::RecordStore;
