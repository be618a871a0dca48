// src/matching/scoring.rs
//! Final confidence assembly.
//!
//! Rebuilds each candidate's score from its typed component breakdown:
//! identifier base + corroboration boosts, the composite name score, the
//! email-domain boost, a geographic consistency bonus, discrepancy
//! penalties (capped), cross-source adjustment, a multi-identifier bonus,
//! and a duplicate deduction. The result is clamped to [0,100] and the
//! confidence band derives from it.

use log::debug;

use crate::config::MatchingConfig;
use crate::identifiers::{mei_country, IdentifierKind};
use crate::models::core::{ExtractedEntity, StoreEntity};
use crate::models::matching::{MatchResult, MatchStrategy, ScoreComponent};

/// Baseline score for candidates introduced by the email-domain search,
/// which carry no identifier or name components of their own.
const EMAIL_SEED_BASELINE: f64 = 60.0;

const GEOGRAPHIC_CONSISTENCY_BONUS: f64 = 10.0;
const ADDITIONAL_IDENTIFIER_BONUS: f64 = 5.0;
const DUPLICATE_PENALTY: f64 = 5.0;
const MAX_DISCREPANCY_PENALTY: f64 = 50.0;

pub struct ConfidenceScorer {
    config: MatchingConfig,
}

impl ConfidenceScorer {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Compute and set the final score for a match.
    pub fn calculate_final_score(&self, result: &mut MatchResult, extracted: &ExtractedEntity) {
        let identifier_score = identifier_component(result);
        let name_score = self.name_component(result);

        let mut score = identifier_score + name_score;

        // Email-seeded candidates have no identifier or name components;
        // their search baseline stands in for both.
        if result.strategy == MatchStrategy::EmailDomain && score == 0.0 {
            score = EMAIL_SEED_BASELINE;
        }

        if let Some(email_boost) = result.score_breakdown.get(ScoreComponent::EmailDomainBoost) {
            score += email_boost;
        }

        if has_geographic_consistency(extracted, &result.entity) {
            score += GEOGRAPHIC_CONSISTENCY_BONUS;
            result.add_evidence("Geographic data consistent");
        }

        let penalty = discrepancy_penalty(result);
        score -= penalty;

        if let Some(tax_adjustment) = result.score_breakdown.get(ScoreComponent::TaxFormValidation)
        {
            score += tax_adjustment;
        }

        let identifier_count = result.score_breakdown.identifier_axes_matched();
        if identifier_count > 1 {
            score += (identifier_count - 1) as f64 * ADDITIONAL_IDENTIFIER_BONUS;
            result.add_evidence(format!("{} identifiers matched", identifier_count));
        }

        if !result.potential_duplicates.is_empty() {
            score -= DUPLICATE_PENALTY;
            result.add_evidence(format!(
                "Score penalized due to {} potential duplicates",
                result.potential_duplicates.len()
            ));
        }

        result.set_score(score);
        debug!(
            "Final score for {}: {:.2} (identifier: {:.1}, name: {:.1}, penalty: {:.1})",
            result.entity.full_name,
            result.score(),
            identifier_score,
            name_score,
            penalty
        );
    }

    /// Name component on the 0-100 scale: the composite weighting of the
    /// stored legal and fund-manager contributions, with the asymmetric
    /// failure override for composite pairs.
    fn name_component(&self, result: &MatchResult) -> f64 {
        let legal_contribution = result.score_breakdown.get(ScoreComponent::LegalNameFuzzy);
        let Some(legal_contribution) = legal_contribution else {
            return 0.0;
        };
        let fm_contribution = result.score_breakdown.get(ScoreComponent::FundManagerFuzzy);

        let legal = legal_contribution / 70.0;
        let fund_manager = fm_contribution.map(|c| c / 30.0).unwrap_or(0.0);

        if result.composite_match {
            if legal < self.config.composite_legal_floor
                || fund_manager < self.config.composite_fm_floor
            {
                legal.min(fund_manager) * 0.5 * 100.0
            } else {
                legal * 70.0 + fund_manager * 30.0
            }
        } else {
            legal * 100.0
        }
    }
}

fn identifier_component(result: &MatchResult) -> f64 {
    let breakdown = &result.score_breakdown;

    let mut score = IdentifierKind::ALL
        .iter()
        .find(|&&kind| breakdown.contains(ScoreComponent::IdentifierMatch(kind)))
        .map(|&kind| kind.base_score())
        .unwrap_or(0.0);

    for kind in IdentifierKind::ALL {
        if let Some(boost) = breakdown.get(ScoreComponent::IdentifierBoost(kind)) {
            score += boost;
        }
    }

    score
}

fn discrepancy_penalty(result: &MatchResult) -> f64 {
    let total: f64 = result
        .discrepancies
        .iter()
        .map(|d| d.severity.penalty())
        .sum();
    total.min(MAX_DISCREPANCY_PENALTY)
}

/// Geographic data is consistent when nothing contradicts: a missing country
/// on either side passes, matching MEI prefixes pass, matching stored
/// country codes pass.
fn has_geographic_consistency(extracted: &ExtractedEntity, candidate: &StoreEntity) -> bool {
    let (Some(extracted_country), Some(candidate_country)) =
        (extracted.country_code.as_deref(), candidate.country_code.as_deref())
    else {
        return true;
    };

    if let (Some(extracted_mei), Some(candidate_mei)) =
        (extracted.mei.as_deref(), candidate.mei.as_deref())
    {
        return mei_country(extracted_mei) == mei_country(candidate_mei);
    }

    extracted_country == candidate_country
}
