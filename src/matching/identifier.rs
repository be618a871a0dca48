// src/matching/identifier.rs
//! Identifier-based candidate seeding.
//!
//! Identifiers are searched in strict priority order (MEI, LEI, EIN, Debt
//! Domain ID). The first axis that hits a candidate assigns its base score;
//! later axes hitting the same candidate corroborate it with a capped boost,
//! while new candidates from lower-priority axes enter at that axis's base.

use log::{debug, info};
use std::sync::Arc;

use crate::identifiers::IdentifierKind;
use crate::models::core::{ExtractedEntity, StoreEntity};
use crate::models::matching::{MatchResult, MatchStrategy, ScoreComponent};
use crate::store::{or_empty, RecordStore};

pub struct IdentifierMatcher {
    store: Arc<dyn RecordStore>,
}

impl IdentifierMatcher {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Seed candidates from the extraction's identifiers.
    pub async fn find_matches(&self, extracted: &ExtractedEntity) -> Vec<MatchResult> {
        let mut matches: Vec<MatchResult> = Vec::new();

        for kind in IdentifierKind::ALL {
            let Some(value) = identifier_value(extracted, kind) else {
                continue;
            };
            debug!("Searching by {}: {}", kind.label(), value);

            let hits = or_empty(kind.label(), self.lookup(kind, value).await);
            for entity in hits {
                match matches.iter_mut().find(|m| m.entity.entity_id == entity.entity_id) {
                    Some(existing) => enhance_match(existing, kind),
                    None => matches.push(new_identifier_match(entity, kind, value)),
                }
            }
        }

        info!("Identifier matching found {} results", matches.len());
        matches
    }

    async fn lookup(
        &self,
        kind: IdentifierKind,
        value: &str,
    ) -> anyhow::Result<Vec<StoreEntity>> {
        match kind {
            IdentifierKind::Mei => self.store.find_by_mei(value).await,
            IdentifierKind::Lei => self.store.find_by_lei(value).await,
            IdentifierKind::Ein => self.store.find_by_ein(value).await,
            IdentifierKind::DebtDomainId => self.store.find_by_debt_domain_id(value).await,
        }
    }
}

fn identifier_value(extracted: &ExtractedEntity, kind: IdentifierKind) -> Option<&str> {
    match kind {
        IdentifierKind::Mei => extracted.mei.as_deref(),
        IdentifierKind::Lei => extracted.lei.as_deref(),
        IdentifierKind::Ein => extracted.ein.as_deref(),
        IdentifierKind::DebtDomainId => extracted.debt_domain_id.as_deref(),
    }
}

fn new_identifier_match(entity: StoreEntity, kind: IdentifierKind, value: &str) -> MatchResult {
    let is_location = entity.is_location;
    let mut result = MatchResult::new(entity, MatchStrategy::Identifier);
    result.set_score(kind.base_score());
    result.add_evidence(format!("{} exact match: {}", kind.label(), value));
    result
        .score_breakdown
        .set(ScoreComponent::IdentifierMatch(kind), kind.base_score());
    if is_location {
        result.add_evidence("Match is a location sub-entity");
    }
    result
}

fn enhance_match(existing: &mut MatchResult, kind: IdentifierKind) {
    let boost = kind.boost_score();
    existing.adjust_score(boost);
    existing.add_evidence(format!("Additional {} match", kind.label()));
    existing
        .score_breakdown
        .set(ScoreComponent::IdentifierBoost(kind), boost);
    debug!(
        "Enhanced match for entity {} with {} (new score: {})",
        existing.entity.entity_id,
        kind.label(),
        existing.score()
    );
}
