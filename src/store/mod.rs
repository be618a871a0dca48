// src/store/mod.rs
//! Read-only query surface over the LoanIQ system of record.
//!
//! Matching components depend only on the [`RecordStore`] trait so they can
//! be tested against in-memory fakes. Store failures are transient by
//! contract: callers log them and continue with an empty candidate list.

pub mod cache;
pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use log::warn;

use crate::models::core::StoreEntity;

pub use memory::InMemoryStore;
pub use postgres::LoanIqStore;

/// Lookup operations against the system of record. Identifier lookups match
/// either a primary record's field or a location sub-entity's field; EIN
/// comparison is hyphen-insensitive.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_mei(&self, mei: &str) -> Result<Vec<StoreEntity>>;

    async fn find_by_lei(&self, lei: &str) -> Result<Vec<StoreEntity>>;

    async fn find_by_ein(&self, ein: &str) -> Result<Vec<StoreEntity>>;

    async fn find_by_debt_domain_id(&self, debt_domain_id: &str) -> Result<Vec<StoreEntity>>;

    /// Case-insensitive substring search over full name, short name and the
    /// fund-manager field, ordered by match exactness, capped at 100 rows.
    async fn find_candidates_by_name(
        &self,
        legal_name: &str,
        fund_manager: Option<&str>,
    ) -> Result<Vec<StoreEntity>>;

    /// Exact domain match, or domain-root substring of the name fields.
    async fn find_by_email_domain(&self, email_domain: &str) -> Result<Vec<StoreEntity>>;

    /// Match on the alphanumeric-only, lowercased short name.
    async fn find_by_cleaned_short_name(&self, cleaned: &str) -> Result<Vec<StoreEntity>>;

    async fn find_by_id(&self, entity_id: i64) -> Result<Option<StoreEntity>>;
}

/// Collapses a transient store failure into an empty result, logging it.
/// Matching components use this for every lookup so a flaky replica darkens
/// one strategy instead of failing the record.
pub fn or_empty(context: &str, result: Result<Vec<StoreEntity>>) -> Vec<StoreEntity> {
    match result {
        Ok(entities) => entities,
        Err(e) => {
            warn!("Store lookup failed ({}): {:#}", context, e);
            Vec::new()
        }
    }
}
