// src/matching/name.rs
//! Composite fuzzy name matching.
//!
//! A candidate is evaluated as a (legal entity, fund manager) pair. Managed
//! funds must match well on both components; a strong legal name cannot
//! carry a fund manager that points somewhere else.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use strsim::jaro_winkler;

use crate::config::MatchingConfig;
use crate::models::core::{ExtractedEntity, StoreEntity};
use crate::models::matching::{DiscrepancyKind, MatchResult, MatchStrategy, ScoreComponent};
use crate::normalize::{normalize_fund_manager, normalize_name};

/// Store-side DBA split. Narrower than the general DBA extraction on
/// purpose: LoanIQ full names only ever carry the `DBA` / `d/b/a` markers,
/// so "trading as" and friends fall through to plain name comparison.
static CANDIDATE_DBA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+(?:DBA|d/b/a)\s+(.+)$").unwrap());

/// Outcome of evaluating one candidate's names against an extraction.
#[derive(Debug, Clone)]
pub struct NameEvaluation {
    /// Legal-name similarity in [0,1].
    pub legal_score: f64,
    /// Fund-manager similarity in [0,1]; 1.0 for a standalone pair.
    pub fund_manager_score: f64,
    /// Whether the pair was scored as a composite (legal + fund manager).
    pub composite: bool,
    /// Combined similarity in [0,1] after composite weighting.
    pub final_score: f64,
    pub evidence: Vec<String>,
    /// One side has a fund manager and the other doesn't.
    pub entity_type_mismatch: bool,
}

pub struct FuzzyNameMatcher {
    config: MatchingConfig,
}

impl FuzzyNameMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Score a candidate's names against the extraction without touching a
    /// match result. Pure computation; never yields.
    pub fn evaluate(&self, extracted: &ExtractedEntity, candidate: &StoreEntity) -> NameEvaluation {
        let mut evidence = Vec::new();
        let mut entity_type_mismatch = false;

        let legal_score = match extracted.legal_name.as_deref() {
            Some(legal) if !candidate.full_name.is_empty() => {
                self.match_legal_name(legal, extracted, candidate, &mut evidence)
            }
            _ => 0.0,
        };

        let (fund_manager_score, composite) =
            match (extracted.fund_manager.as_deref(), candidate.fund_manager.as_deref()) {
                (Some(extracted_fm), Some(candidate_fm)) => {
                    (self.match_fund_manager(extracted_fm, candidate_fm, &mut evidence), true)
                }
                (None, None) => (1.0, false),
                // Managed-vs-standalone disagreement: penalized fund-manager
                // score, and composite weighting still applies.
                _ => {
                    entity_type_mismatch = true;
                    (0.3, true)
                }
            };

        let final_score = composite_score(
            legal_score,
            fund_manager_score,
            composite,
            self.config.composite_legal_floor,
            self.config.composite_fm_floor,
        );

        debug!(
            "Fuzzy name evaluation for {}: legal={:.3}, fm={:.3}, composite={}, final={:.3}",
            candidate.full_name, legal_score, fund_manager_score, composite, final_score
        );

        NameEvaluation {
            legal_score,
            fund_manager_score,
            composite,
            final_score,
            evidence,
            entity_type_mismatch,
        }
    }

    /// Evaluate a candidate and build a fuzzy-name match result from it.
    pub fn match_candidate(
        &self,
        extracted: &ExtractedEntity,
        candidate: &StoreEntity,
    ) -> MatchResult {
        let evaluation = self.evaluate(extracted, candidate);
        let mut result = MatchResult::new(candidate.clone(), MatchStrategy::FuzzyName);
        result.set_score(evaluation.final_score * 100.0);
        annotate(&mut result, &evaluation);
        result
    }

    fn match_legal_name(
        &self,
        extracted_legal: &str,
        extracted: &ExtractedEntity,
        candidate: &StoreEntity,
        evidence: &mut Vec<String>,
    ) -> f64 {
        let normalized_extracted = normalize_name(extracted_legal);
        let normalized_candidate = normalize_name(&candidate.full_name);
        if normalized_extracted.is_empty() || normalized_candidate.is_empty() {
            return 0.0;
        }

        // DBA handling first: candidate names like "Legal Name DBA Trade Name".
        let dba_score = self.match_dba(extracted, candidate);
        if dba_score > 0.85 {
            evidence.push("DBA match detected".to_string());
            return dba_score;
        }

        let jw_score = jaro_winkler(&normalized_extracted, &normalized_candidate);

        if normalized_extracted == normalized_candidate {
            evidence.push("Legal name exact match after normalization".to_string());
            return 1.0;
        }

        if normalized_extracted.contains(&normalized_candidate)
            || normalized_candidate.contains(&normalized_extracted)
        {
            evidence.push("Legal name subset match".to_string());
            return jw_score.max(0.85);
        }

        if words_reordered(&normalized_extracted, &normalized_candidate) {
            evidence.push("Legal name match with word reordering".to_string());
            return jw_score.max(0.80);
        }

        if jw_score > self.config.legal_name_threshold {
            evidence.push(format!("Legal name fuzzy match ({:.2})", jw_score));
        } else if jw_score > 0.7 {
            evidence.push(format!("Legal name partial match ({:.2})", jw_score));
        }

        jw_score
    }

    fn match_fund_manager(
        &self,
        extracted_fm: &str,
        candidate_fm: &str,
        evidence: &mut Vec<String>,
    ) -> f64 {
        let normalized_extracted = normalize_fund_manager(extracted_fm);
        let normalized_candidate = normalize_fund_manager(candidate_fm);
        if normalized_extracted.is_empty() || normalized_candidate.is_empty() {
            return 0.0;
        }

        let mut fm_score = jaro_winkler(&normalized_extracted, &normalized_candidate);

        if is_acronym_pair(&normalized_extracted, &normalized_candidate) {
            fm_score = fm_score.max(0.9);
            evidence.push("Fund manager abbreviation match".to_string());
        }

        if normalized_extracted.contains(&normalized_candidate)
            || normalized_candidate.contains(&normalized_extracted)
        {
            fm_score = fm_score.max(0.85);
            evidence.push("Fund manager subset match".to_string());
        }

        if fm_score > self.config.fund_manager_threshold {
            evidence.push(format!("Fund manager fuzzy match ({:.2})", fm_score));
        }

        fm_score
    }

    fn match_dba(&self, extracted: &ExtractedEntity, candidate: &StoreEntity) -> f64 {
        let Some(caps) = CANDIDATE_DBA_RE.captures(&candidate.full_name) else {
            return 0.0;
        };
        let candidate_legal = normalize_name(&caps[1]);
        let candidate_dba = normalize_name(&caps[2]);

        if let Some(extracted_dba) = extracted.dba.as_deref() {
            let dba_match = jaro_winkler(&normalize_name(extracted_dba), &candidate_dba);
            if dba_match > 0.85 {
                return 0.95;
            }
        }

        if let Some(extracted_legal) = extracted.legal_name.as_deref() {
            let extracted_norm = normalize_name(extracted_legal);
            let legal_match = jaro_winkler(&extracted_norm, &candidate_legal);
            let dba_match = jaro_winkler(&extracted_norm, &candidate_dba);
            return legal_match.max(dba_match);
        }

        0.0
    }
}

/// Copy an evaluation's findings onto a match result: score components
/// (legal weighted 70, fund manager 30), evidence, the composite flag, and
/// the entity-type discrepancy when one fired.
pub fn annotate(result: &mut MatchResult, evaluation: &NameEvaluation) {
    result.composite_match = evaluation.composite;
    result
        .score_breakdown
        .set(ScoreComponent::LegalNameFuzzy, evaluation.legal_score * 70.0);
    result.score_breakdown.set(
        ScoreComponent::FundManagerFuzzy,
        evaluation.fund_manager_score * 30.0,
    );
    for entry in &evaluation.evidence {
        result.add_evidence(entry.clone());
    }
    if evaluation.entity_type_mismatch {
        result.add_discrepancy(DiscrepancyKind::EntityTypeMismatch);
    }
}

fn composite_score(
    legal: f64,
    fund_manager: f64,
    composite: bool,
    legal_floor: f64,
    fm_floor: f64,
) -> f64 {
    if composite {
        if legal < legal_floor || fund_manager < fm_floor {
            // Asymmetric failure on a managed fund is punished hard.
            legal.min(fund_manager) * 0.5
        } else {
            legal * 0.7 + fund_manager * 0.3
        }
    } else {
        legal
    }
}

fn words_reordered(a: &str, b: &str) -> bool {
    let mut words_a: Vec<&str> = a.split_whitespace().collect();
    let mut words_b: Vec<&str> = b.split_whitespace().collect();
    if words_a.len() != words_b.len() {
        return false;
    }
    words_a.sort_unstable();
    words_b.sort_unstable();
    words_a == words_b
}

fn is_acronym_pair(a: &str, b: &str) -> bool {
    fn acronym_of(words: &[&str]) -> String {
        words.iter().filter_map(|w| w.chars().next()).collect()
    }

    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();

    if words_a.len() == 1 && words_b.len() > 1 {
        return words_a[0].eq_ignore_ascii_case(&acronym_of(&words_b));
    }
    if words_b.len() == 1 && words_a.len() > 1 {
        return words_b[0].eq_ignore_ascii_case(&acronym_of(&words_a));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> FuzzyNameMatcher {
        FuzzyNameMatcher::new(MatchingConfig::default())
    }

    fn extraction(legal: &str, fm: Option<&str>) -> ExtractedEntity {
        ExtractedEntity {
            legal_name: Some(legal.to_string()),
            fund_manager: fm.map(String::from),
            ..Default::default()
        }
    }

    fn candidate(full_name: &str, fm: Option<&str>) -> StoreEntity {
        StoreEntity {
            entity_id: 1,
            full_name: full_name.to_string(),
            fund_manager: fm.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_standalone_match() {
        let result = matcher().match_candidate(
            &extraction("Acme Fund", None),
            &candidate("Acme Fund", None),
        );
        assert_eq!(result.score(), 100.0);
        assert!(!result.composite_match);
        assert_eq!(
            result.score_breakdown.get(ScoreComponent::LegalNameFuzzy),
            Some(70.0)
        );
        assert_eq!(
            result.score_breakdown.get(ScoreComponent::FundManagerFuzzy),
            Some(30.0)
        );
    }

    #[test]
    fn test_composite_with_alias_resolution() {
        // "GSAM" and "Goldman Sachs Asset Management" resolve to the same
        // canonical fund manager, so both components score perfect.
        let result = matcher().match_candidate(
            &extraction("ABC Pension Plan", Some("Goldman Sachs Asset Management")),
            &candidate("ABC Pension Plan", Some("GSAM")),
        );
        assert!(result.composite_match);
        assert!(result.score() >= 99.0, "score was {}", result.score());
    }

    #[test]
    fn test_composite_floor_penalty() {
        // Strong legal name, unrelated fund manager: composite floors kick
        // in and the pair collapses to min * 0.5.
        let evaluation = matcher().evaluate(
            &extraction("ABC Pension Plan", Some("Pacific Investment Management Company")),
            &candidate("ABC Pension Plan", Some("Wellington Management")),
        );
        assert!(evaluation.composite);
        assert!(evaluation.fund_manager_score < 0.6);
        assert!(
            (evaluation.final_score
                - evaluation.legal_score.min(evaluation.fund_manager_score) * 0.5)
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_entity_type_mismatch() {
        let evaluation = matcher().evaluate(
            &extraction("Acme Fund", Some("Blue Ridge Advisors")),
            &candidate("Acme Fund", None),
        );
        assert!(evaluation.entity_type_mismatch);
        assert!(evaluation.composite);
        assert_eq!(evaluation.fund_manager_score, 0.3);
        // 0.3 is under the fund-manager floor, so the heavy penalty applies.
        assert!((evaluation.final_score - 0.15).abs() < 1e-9);

        let result = matcher().match_candidate(
            &extraction("Acme Fund", Some("Blue Ridge Advisors")),
            &candidate("Acme Fund", None),
        );
        assert!(result.has_discrepancy("ENTITY_TYPE_MISMATCH"));
    }

    #[test]
    fn test_subset_match_floor() {
        let evaluation = matcher().evaluate(
            &extraction("Acme Global Opportunities", None),
            &candidate("Acme Global Opportunities Master", None),
        );
        assert!(evaluation.legal_score >= 0.85);
        assert!(evaluation.evidence.iter().any(|e| e.contains("subset")));
    }

    #[test]
    fn test_word_reordering_floor() {
        let evaluation = matcher().evaluate(
            &extraction("Global Acme Opportunities", None),
            &candidate("Opportunities Acme Global", None),
        );
        assert!(evaluation.legal_score >= 0.80);
        assert!(evaluation.evidence.iter().any(|e| e.contains("reordering")));
    }

    #[test]
    fn test_dba_candidate_name() {
        let extracted = ExtractedEntity {
            legal_name: Some("Real Company".to_string()),
            dba: Some("Fake Company".to_string()),
            ..Default::default()
        };
        let evaluation = matcher().evaluate(
            &extracted,
            &candidate("Real Company Inc. DBA Fake Company", None),
        );
        assert!(evaluation.legal_score >= 0.95);
        assert!(evaluation.evidence.iter().any(|e| e.contains("DBA")));
    }

    #[test]
    fn test_trading_as_candidate_skips_dba_branch() {
        // Only DBA / d/b/a markers gate the store-side DBA sub-routine;
        // other trade-name spellings compare as plain names.
        let extracted = ExtractedEntity {
            legal_name: Some("Omega Partners".to_string()),
            dba: Some("Omega".to_string()),
            ..Default::default()
        };
        let evaluation = matcher().evaluate(
            &extracted,
            &candidate("Omega Partners trading as Omega", None),
        );
        assert!(!evaluation.evidence.iter().any(|e| e.contains("DBA")));
        assert!(evaluation.legal_score < 0.95);
    }

    #[test]
    fn test_acronym_fund_manager() {
        let mut evidence = Vec::new();
        let score = matcher().match_fund_manager("bgf", "Bravo Gamma Foxtrot", &mut evidence);
        assert!(score >= 0.9);
        assert!(evidence.iter().any(|e| e.contains("abbreviation")));
    }

    #[test]
    fn test_missing_legal_name_scores_zero() {
        let evaluation = matcher().evaluate(
            &ExtractedEntity::default(),
            &candidate("Acme Fund", None),
        );
        assert_eq!(evaluation.legal_score, 0.0);
        assert_eq!(evaluation.final_score, 0.0);
    }
}
