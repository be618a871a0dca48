// src/matching/duplicate.rs
//! Opportunistic duplicate detection around a matched record.
//!
//! Runs strictly after candidate selection, never during it, so the scan
//! cannot feed back into the candidate pool. Collects store records that
//! share an identifier, a cleaned short name, or a near-identical full name
//! with the matched entity.

use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::core::{clean_short_name, StoreEntity};
use crate::store::{or_empty, RecordStore};

pub struct DuplicateDetector {
    store: Arc<dyn RecordStore>,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Find potential store-internal duplicates of a matched entity,
    /// deduplicated by entity id and excluding the entity itself.
    pub async fn find_potential_duplicates(&self, entity: &StoreEntity) -> Vec<StoreEntity> {
        let mut seen: HashSet<i64> = HashSet::new();
        seen.insert(entity.entity_id);
        let mut duplicates = Vec::new();

        if let Some(mei) = entity.mei.as_deref() {
            let hits = or_empty("duplicate MEI", self.store.find_by_mei(mei).await);
            collect(&mut duplicates, &mut seen, hits, "MEI");
        }
        if let Some(lei) = entity.lei.as_deref() {
            let hits = or_empty("duplicate LEI", self.store.find_by_lei(lei).await);
            collect(&mut duplicates, &mut seen, hits, "LEI");
        }
        if let Some(ein) = entity.ein.as_deref() {
            let hits = or_empty("duplicate EIN", self.store.find_by_ein(ein).await);
            collect(&mut duplicates, &mut seen, hits, "EIN");
        }

        // Short-name variations that differ only in punctuation.
        if let Some(cleaned) = entity.cleaned_short_name() {
            let hits = or_empty(
                "duplicate short name",
                self.store.find_by_cleaned_short_name(&cleaned).await,
            );
            for hit in hits {
                let same_key = hit
                    .short_name
                    .as_deref()
                    .map(|s| clean_short_name(s).eq_ignore_ascii_case(&cleaned))
                    .unwrap_or(false);
                if same_key && seen.insert(hit.entity_id) {
                    debug!(
                        "Found duplicate by short name variation: {:?} vs {:?} (ID: {})",
                        entity.short_name, hit.short_name, hit.entity_id
                    );
                    duplicates.push(hit);
                }
            }
        }

        // Very similar full names.
        let hits = or_empty(
            "duplicate name scan",
            self.store
                .find_candidates_by_name(&entity.full_name, entity.fund_manager.as_deref())
                .await,
        );
        for hit in hits {
            if !seen.contains(&hit.entity_id) && are_names_similar(&entity.full_name, &hit.full_name)
            {
                seen.insert(hit.entity_id);
                debug!(
                    "Found duplicate by similar name: {} vs {} (ID: {})",
                    entity.full_name, hit.full_name, hit.entity_id
                );
                duplicates.push(hit);
            }
        }

        info!(
            "Found {} potential duplicates for entity {}",
            duplicates.len(),
            entity.entity_id
        );
        duplicates
    }
}

fn collect(
    duplicates: &mut Vec<StoreEntity>,
    seen: &mut HashSet<i64>,
    hits: Vec<StoreEntity>,
    axis: &str,
) {
    for hit in hits {
        if seen.insert(hit.entity_id) {
            debug!(
                "Found duplicate by {}: {} (ID: {})",
                axis, hit.full_name, hit.entity_id
            );
            duplicates.push(hit);
        }
    }
}

/// Two full names count as potential duplicates when they are equal after a
/// light normalization, one contains the other, or they are the same words
/// in a different order.
fn are_names_similar(name_a: &str, name_b: &str) -> bool {
    let norm_a = simple_normalize(name_a);
    let norm_b = simple_normalize(name_b);
    if norm_a.is_empty() || norm_b.is_empty() {
        return false;
    }

    if norm_a == norm_b {
        return true;
    }

    if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
        return true;
    }

    let words_a: HashSet<&str> = norm_a.split_whitespace().collect();
    let words_b: HashSet<&str> = norm_b.split_whitespace().collect();
    words_a.len() > 1 && words_a.len() == words_b.len() && words_a == words_b
}

fn simple_normalize(name: &str) -> String {
    let lowered: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn entity(id: i64, full_name: &str, short_name: Option<&str>) -> StoreEntity {
        StoreEntity {
            entity_id: id,
            full_name: full_name.to_string(),
            short_name: short_name.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_names_similar_rules() {
        assert!(are_names_similar("Acme Corp.", "ACME Corp"));
        assert!(are_names_similar("Acme Global Fund", "Acme Global Fund II"));
        assert!(are_names_similar("Global Acme Fund", "Fund Acme Global"));
        assert!(!are_names_similar("Acme Fund", "Zenith Fund"));
        assert!(!are_names_similar("", "Acme"));
    }

    #[tokio::test]
    async fn test_shared_identifier_duplicates() {
        let matched = StoreEntity {
            entity_id: 1,
            full_name: "Acme Fund".to_string(),
            mei: Some("US12345678".to_string()),
            ..Default::default()
        };
        let twin = StoreEntity {
            entity_id: 2,
            full_name: "Acme Fund (Legacy)".to_string(),
            mei: Some("US12345678".to_string()),
            ..Default::default()
        };

        let detector = DuplicateDetector::new(Arc::new(InMemoryStore::new(vec![
            matched.clone(),
            twin,
        ])));
        let duplicates = detector.find_potential_duplicates(&matched).await;
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].entity_id, 2);
    }

    #[tokio::test]
    async fn test_short_name_variation_duplicates() {
        let matched = entity(1, "Acme Corporation", Some("ACME"));
        let variant = entity(2, "Acme Worldwide", Some("ACME."));
        let unrelated = entity(3, "Zenith Ltd", Some("ZEN"));

        let detector = DuplicateDetector::new(Arc::new(InMemoryStore::new(vec![
            matched.clone(),
            variant,
            unrelated,
        ])));
        let duplicates = detector.find_potential_duplicates(&matched).await;
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].entity_id, 2);
    }

    #[tokio::test]
    async fn test_dedup_across_axes() {
        // Same record shares MEI and short name; it must appear once.
        let matched = StoreEntity {
            entity_id: 1,
            full_name: "Acme Fund".to_string(),
            short_name: Some("ACME".to_string()),
            mei: Some("US12345678".to_string()),
            ..Default::default()
        };
        let twin = StoreEntity {
            entity_id: 2,
            full_name: "Acme Fund".to_string(),
            short_name: Some("A.C.M.E".to_string()),
            mei: Some("US12345678".to_string()),
            ..Default::default()
        };

        let detector = DuplicateDetector::new(Arc::new(InMemoryStore::new(vec![
            matched.clone(),
            twin,
        ])));
        let duplicates = detector.find_potential_duplicates(&matched).await;
        assert_eq!(duplicates.len(), 1);
    }
}
