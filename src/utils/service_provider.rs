// src/utils/service_provider.rs
//! Service-provider email domain filtering.
//!
//! Participant forms routinely carry contact addresses belonging to law
//! firms, fund administrators, custodians and accountants rather than the
//! entity itself. Those domains must never drive domain-based matching, so
//! the extraction side filters them out before choosing a primary domain.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static SERVICE_PROVIDER_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Generic mailbox providers
        "gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "aol.com",
        "protonmail.com", "mail.com", "yandex.com", "icloud.com", "msn.com",
        "live.com", "me.com", "qq.com", "163.com", "126.com", "yeah.net",
        // Law firms
        "shearman.com", "davispolk.com", "sullcrom.com", "weil.com",
        "skadden.com", "lw.com", "kirkland.com", "paulweiss.com",
        "cooley.com", "wilmerhale.com", "mayerbrown.com", "whitecase.com",
        "cliffordchance.com", "linklaters.com", "allenovery.com",
        "freshfields.com", "hoganlovells.com", "nortonrosefulbright.com",
        "dechert.com", "sidley.com", "morganlewis.com", "jonesday.com",
        "gibsondunn.com", "cravath.com", "wachtell.com", "simpson.com",
        // Fund administrators
        "citco.com", "sscinc.com", "maples.com", "intertrust.com",
        "alterdomus.com", "apexgroup.com", "aztecgroup.com", "tmf-group.com",
        "vistra.com", "tridenttrust.com", "iqeq.com", "jcftrust.com",
        "harneys.com", "ogier.com", "walkers.global", "mourant.com",
        // Custodians
        "bnymellon.com", "statestreet.com", "northerntrust.com",
        // Accounting firms
        "pwc.com", "deloitte.com", "ey.com", "kpmg.com",
        "bdo.com", "grantthornton.com", "rsm.com", "mazars.com",
        "bakertilly.com", "crowe.com", "mossadams.com", "marcumllp.com",
        // Generic service indicators
        "lawfirm.com", "legal.com", "attorneys.com", "lawyers.com",
        "admin.com", "administration.com", "fundadmin.com",
        "custodian.com", "trustee.com", "fiduciary.com",
    ]
    .into_iter()
    .collect()
});

static SERVICE_PROVIDER_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "law", "legal", "attorney", "counsel", "llp", "solicitor",
        "admin", "administrator", "custody", "custodian",
        "trustee", "fiduciary", "accounting", "audit", "tax",
    ]
});

static LAW_FIRM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r".*law\.com$",
        r".*legal\.com$",
        r".*llp\.com$",
        r".*attorneys\.com$",
        r".*solicitors\..*",
        r".*barristers\..*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Whether a domain belongs to a service provider rather than the entity.
pub fn is_service_provider_domain(domain: &str) -> bool {
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        return false;
    }

    if SERVICE_PROVIDER_DOMAINS.contains(domain.as_str()) {
        return true;
    }

    if SERVICE_PROVIDER_KEYWORDS.iter().any(|kw| domain.contains(kw)) {
        return true;
    }

    is_law_firm_domain(&domain)
}

fn is_law_firm_domain(domain: &str) -> bool {
    if LAW_FIRM_PATTERNS.iter().any(|p| p.is_match(domain)) {
        return true;
    }

    // Ampersand or multi-name domains read like partner-name law firms.
    if domain.contains('&') || domain.contains("and") {
        let parts: Vec<&str> = domain
            .split(|c| c == '.' || c == '&')
            .flat_map(|s| s.split("and"))
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() >= 3 {
            return true;
        }
    }

    false
}

fn extract_domain(email: &str) -> Option<String> {
    email
        .split_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .filter(|d| !d.is_empty())
}

/// Pick the most likely entity-owned domain from a set of contact emails:
/// the most frequent domain that is not a service provider.
pub fn primary_entity_domain(emails: &[String]) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for email in emails {
        if let Some(domain) = extract_domain(email) {
            if !is_service_provider_domain(&domain) {
                *counts.entry(domain).or_insert(0) += 1;
            }
        }
    }

    let picked = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(domain, _)| domain);

    if let Some(ref d) = picked {
        debug!("Primary entity domain selected: {}", d);
    }
    picked
}
