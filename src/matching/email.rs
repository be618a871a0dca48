// src/matching/email.rs
//! Email-domain corroboration.
//!
//! A boost-only signal: a candidate whose name fields echo the extraction's
//! email domain gains points, with weaker fallbacks through the corporate
//! family map, ccTLD geography and financial-keyword overlap. Never
//! penalizes.

use log::debug;

use crate::models::core::StoreEntity;
use crate::models::matching::{MatchResult, ScoreComponent};
use crate::normalize::tables::{CORPORATE_DOMAINS, FINANCIAL_KEYWORDS};
use crate::utils::country;

pub struct EmailDomainMatcher;

impl EmailDomainMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Apply the domain boost to a match, recording the score component.
    pub fn enhance(&self, result: &mut MatchResult, email_domain: &str) {
        let boost = self.calculate_boost(email_domain, &result.entity);
        if boost > 0.0 {
            result.adjust_score(boost);
            result
                .score_breakdown
                .set(ScoreComponent::EmailDomainBoost, boost);
            debug!(
                "Email domain boost for {}: {} via {}",
                result.entity.full_name, boost, email_domain
            );
        }
    }

    fn calculate_boost(&self, email_domain: &str, entity: &StoreEntity) -> f64 {
        let entity_name = entity.full_name.to_lowercase();
        let fund_manager = entity
            .fund_manager
            .as_deref()
            .unwrap_or("")
            .to_lowercase();

        // Direct hit: the domain root shows up in a name field.
        let domain_root = extract_domain_root(email_domain);
        if !domain_root.is_empty()
            && (entity_name.contains(&domain_root) || fund_manager.contains(&domain_root))
        {
            return 20.0;
        }

        // Corporate family: a known domain whose synonyms appear in a name field.
        if let Some(corporate_names) = CORPORATE_DOMAINS.get(email_domain) {
            for corp_name in corporate_names {
                if entity_name.contains(corp_name) || fund_manager.contains(corp_name) {
                    return 15.0;
                }
            }
        }

        // Soft signals accumulate.
        let mut boost = 0.0;
        if let Some(country_code) = entity.country_code.as_deref() {
            if country::domain_matches_country(email_domain, country_code) {
                boost += 5.0;
            }
        }
        if is_financial_domain(email_domain)
            && (is_financial_domain(&entity_name) || is_financial_domain(&fund_manager))
        {
            boost += 3.0;
        }

        boost
    }
}

impl Default for EmailDomainMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip TLD and subdomain: `mail.blackrock.com` yields `blackrock`.
fn extract_domain_root(email_domain: &str) -> String {
    let domain = email_domain.to_lowercase();
    let Some(last_dot) = domain.rfind('.') else {
        return domain;
    };
    let without_tld = &domain[..last_dot];
    match without_tld.rfind('.') {
        Some(second_last) => without_tld[second_last + 1..].to_string(),
        None => without_tld.to_string(),
    }
}

fn is_financial_domain(text: &str) -> bool {
    let lower = text.to_lowercase();
    FINANCIAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
