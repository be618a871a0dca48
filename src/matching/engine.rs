// src/matching/engine.rs
//! The matching pipeline: identifier seeds, fuzzy name scoring, email
//! corroboration, cross-source validation, discrepancy and duplicate scans,
//! then final scoring and ranking.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::MatchingConfig;
use crate::matching::cross_source::CrossSourceValidator;
use crate::matching::discrepancy::DiscrepancyDetector;
use crate::matching::duplicate::DuplicateDetector;
use crate::matching::email::EmailDomainMatcher;
use crate::matching::identifier::IdentifierMatcher;
use crate::matching::name::{annotate, FuzzyNameMatcher};
use crate::matching::scoring::ConfidenceScorer;
use crate::models::core::ExtractedEntity;
use crate::models::matching::{MatchResult, MatchStrategy};
use crate::models::processing::Decision;
use crate::store::{or_empty, RecordStore};

/// Minimum candidate-pool size below which the email-domain search
/// introduces baseline candidates.
const EMAIL_SEED_POOL_FLOOR: usize = 3;

pub struct MatchingEngine {
    store: Arc<dyn RecordStore>,
    config: MatchingConfig,
    identifier_matcher: IdentifierMatcher,
    fuzzy_matcher: FuzzyNameMatcher,
    email_matcher: EmailDomainMatcher,
    cross_source_validator: CrossSourceValidator,
    discrepancy_detector: DiscrepancyDetector,
    duplicate_detector: DuplicateDetector,
    scorer: ConfidenceScorer,
}

impl MatchingEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: MatchingConfig) -> Self {
        Self {
            identifier_matcher: IdentifierMatcher::new(Arc::clone(&store)),
            fuzzy_matcher: FuzzyNameMatcher::new(config.clone()),
            email_matcher: EmailDomainMatcher::new(),
            cross_source_validator: CrossSourceValidator::new(config.clone()),
            discrepancy_detector: DiscrepancyDetector::new(Arc::clone(&store)),
            duplicate_detector: DuplicateDetector::new(Arc::clone(&store)),
            scorer: ConfidenceScorer::new(config.clone()),
            store,
            config,
        }
    }

    /// Run the full pipeline for one extraction, returning at most `top_k`
    /// results sorted by score descending. Ties keep pipeline order, so
    /// identifier matches rank ahead of equal-scoring fuzzy matches.
    pub async fn find_matches(
        &self,
        extracted: &ExtractedEntity,
        tax_form: Option<&ExtractedEntity>,
    ) -> Vec<MatchResult> {
        info!("Starting matching process for entity: {}", extracted.display_name());

        // Step 1: identifier seeds.
        let mut matches = self.identifier_matcher.find_matches(extracted).await;
        let mut processed: HashSet<i64> =
            matches.iter().map(|m| m.entity.entity_id).collect();

        // Step 2: fuzzy name scoring. Seeded candidates are scored in place;
        // the name search only introduces new candidates when the pool is
        // still short.
        if extracted.legal_name.is_some() {
            for existing in matches.iter_mut() {
                let evaluation = self.fuzzy_matcher.evaluate(extracted, &existing.entity);
                annotate(existing, &evaluation);
            }
        }

        if matches.len() < self.config.top_k {
            self.add_fuzzy_candidates(extracted, &mut matches, &mut processed).await;
        }

        // Step 3: email-domain corroboration, plus baseline seeding when the
        // pool is thin.
        if let Some(email_domain) = extracted.email_domain.as_deref() {
            debug!("Enhancing matches with email domain: {}", email_domain);
            for existing in matches.iter_mut() {
                self.email_matcher.enhance(existing, email_domain);
            }

            if matches.len() < EMAIL_SEED_POOL_FLOOR {
                self.add_email_candidates(email_domain, &mut matches, &mut processed).await;
            }
        }

        // Step 4: cross-source validation.
        if let Some(tax_form) = tax_form {
            debug!("Cross-validating with tax form data");
            for existing in matches.iter_mut() {
                self.cross_source_validator.validate(existing, extracted, tax_form);
            }
        }

        // Step 5: discrepancy and duplicate scans. Duplicates are looked up
        // only now, against a frozen candidate pool.
        for existing in matches.iter_mut() {
            let found = self
                .discrepancy_detector
                .detect(extracted, tax_form, &existing.entity)
                .await;
            for discrepancy in found {
                // Cross-source findings may already be attached by the
                // validator; a label appears on a match at most once.
                if !existing.has_discrepancy(discrepancy.label()) {
                    existing.discrepancies.push(discrepancy);
                }
            }

            let duplicates = self
                .duplicate_detector
                .find_potential_duplicates(&existing.entity)
                .await;
            if !duplicates.is_empty() {
                warn!(
                    "Found {} potential duplicates for entity {}",
                    duplicates.len(),
                    existing.entity.entity_id
                );
            }
            existing.potential_duplicates.extend(duplicates);
        }

        // Step 6: final scoring.
        for existing in matches.iter_mut() {
            self.scorer.calculate_final_score(existing, extracted);
        }

        // Step 7: rank and cut. The sort is stable, preserving insertion
        // order across equal scores.
        matches.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(self.config.top_k);

        info!("Found {} potential matches, returning top {}", matches.len(), self.config.top_k);
        matches
    }

    async fn add_fuzzy_candidates(
        &self,
        extracted: &ExtractedEntity,
        matches: &mut Vec<MatchResult>,
        processed: &mut HashSet<i64>,
    ) {
        let Some(legal_name) = extracted.legal_name.as_deref() else {
            return;
        };

        let candidates = or_empty(
            "find_candidates_by_name",
            self.store
                .find_candidates_by_name(legal_name, extracted.fund_manager.as_deref())
                .await,
        );
        debug!("Found {} name-based candidates", candidates.len());

        for candidate in candidates {
            if processed.contains(&candidate.entity_id) {
                continue;
            }
            let fuzzy_match = self.fuzzy_matcher.match_candidate(extracted, &candidate);
            if fuzzy_match.score() > self.config.fuzzy_admit_score {
                debug!(
                    "Added fuzzy match: {} (score: {})",
                    candidate.full_name,
                    fuzzy_match.score()
                );
                processed.insert(candidate.entity_id);
                matches.push(fuzzy_match);
            }
        }
    }

    async fn add_email_candidates(
        &self,
        email_domain: &str,
        matches: &mut Vec<MatchResult>,
        processed: &mut HashSet<i64>,
    ) {
        let candidates = or_empty(
            "find_by_email_domain",
            self.store.find_by_email_domain(email_domain).await,
        );

        for candidate in candidates {
            if processed.insert(candidate.entity_id) {
                let mut email_match = MatchResult::new(candidate, MatchStrategy::EmailDomain);
                email_match.set_score(60.0);
                email_match.add_evidence(format!("Email domain match: {}", email_domain));
                matches.push(email_match);
            }
        }
    }
}

/// Derive the categorical decision from the top-ranked candidate.
pub fn determine_decision(best_match: Option<&MatchResult>) -> Decision {
    let Some(best) = best_match else {
        return Decision::NoMatch;
    };

    let score = best.score();
    if score >= 85.0 {
        Decision::Match
    } else if score >= 70.0 {
        if best.has_critical_discrepancies() {
            Decision::ManualReview
        } else {
            Decision::Match
        }
    } else if score >= 50.0 {
        Decision::ManualReview
    } else {
        Decision::NoMatch
    }
}
