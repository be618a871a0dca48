// src/store/memory.rs
use anyhow::Result;
use async_trait::async_trait;

use crate::models::core::{clean_short_name, StoreEntity};
use crate::store::RecordStore;

/// In-memory record store mirroring the LoanIQ query semantics.
///
/// Backs the offline fixture mode of the CLI and the test suites. Lookups
/// follow the same rules as the SQL implementation: identifier matches hit
/// main records and location sub-entities, EIN comparison ignores hyphens,
/// name search is a case-insensitive substring scan ordered by exactness.
pub struct InMemoryStore {
    records: Vec<StoreEntity>,
}

impl InMemoryStore {
    pub fn new(records: Vec<StoreEntity>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect<F: Fn(&StoreEntity) -> bool>(&self, predicate: F) -> Vec<StoreEntity> {
        self.records.iter().filter(|e| predicate(e)).cloned().collect()
    }
}

fn eq_ignore_case(field: &Option<String>, value: &str) -> bool {
    field
        .as_deref()
        .map(|f| f.eq_ignore_ascii_case(value))
        .unwrap_or(false)
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn find_by_mei(&self, mei: &str) -> Result<Vec<StoreEntity>> {
        Ok(self.collect(|e| eq_ignore_case(&e.mei, mei)))
    }

    async fn find_by_lei(&self, lei: &str) -> Result<Vec<StoreEntity>> {
        Ok(self.collect(|e| eq_ignore_case(&e.lei, lei)))
    }

    async fn find_by_ein(&self, ein: &str) -> Result<Vec<StoreEntity>> {
        let wanted = ein.replace('-', "");
        Ok(self.collect(|e| {
            e.ein
                .as_deref()
                .map(|f| f.replace('-', "") == wanted)
                .unwrap_or(false)
        }))
    }

    async fn find_by_debt_domain_id(&self, debt_domain_id: &str) -> Result<Vec<StoreEntity>> {
        Ok(self.collect(|e| !e.is_location && eq_ignore_case(&e.debt_domain_id, debt_domain_id)))
    }

    async fn find_candidates_by_name(
        &self,
        legal_name: &str,
        fund_manager: Option<&str>,
    ) -> Result<Vec<StoreEntity>> {
        let name_needle = legal_name.to_lowercase();
        let fm_needle = fund_manager.map(|f| f.to_lowercase());

        let mut candidates = self.collect(|e| {
            if e.is_location {
                return false;
            }
            let full = e.full_name.to_lowercase();
            let short = e.short_name.as_deref().unwrap_or("").to_lowercase();
            let manager = e.fund_manager.as_deref().unwrap_or("").to_lowercase();
            full.contains(&name_needle)
                || (!short.is_empty() && short.contains(&name_needle))
                || match &fm_needle {
                    Some(fm) => !manager.is_empty() && manager.contains(fm),
                    None => !manager.is_empty() && manager.contains(&name_needle),
                }
        });

        candidates.sort_by_key(|e| {
            if e.full_name.eq_ignore_ascii_case(legal_name) {
                0
            } else if eq_ignore_case(&e.short_name, legal_name) {
                1
            } else {
                2
            }
        });
        candidates.truncate(100);
        Ok(candidates)
    }

    async fn find_by_email_domain(&self, email_domain: &str) -> Result<Vec<StoreEntity>> {
        let root = email_domain
            .split('.')
            .next()
            .unwrap_or(email_domain)
            .to_lowercase();
        Ok(self.collect(|e| {
            if e.is_location {
                return false;
            }
            e.full_name.to_lowercase().contains(&root)
                || e.fund_manager
                    .as_deref()
                    .map(|fm| fm.to_lowercase().contains(&root))
                    .unwrap_or(false)
        }))
    }

    async fn find_by_cleaned_short_name(&self, cleaned: &str) -> Result<Vec<StoreEntity>> {
        Ok(self.collect(|e| {
            e.short_name
                .as_deref()
                .map(|s| clean_short_name(s) == cleaned)
                .unwrap_or(false)
        }))
    }

    async fn find_by_id(&self, entity_id: i64) -> Result<Option<StoreEntity>> {
        Ok(self.records.iter().find(|e| e.entity_id == entity_id).cloned())
    }
}
