// src/normalize/mod.rs
//! Name canonicalization for comparison.
//!
//! The general pipeline handles character-level noise first (diacritics,
//! smart punctuation, stray control characters), then applies the business
//! rules for entity names: abbreviation expansion, corporate-form removal,
//! stopword removal. Fund manager names additionally go through the alias
//! map so "GSAM" and "Goldman Sachs Asset Management" compare equal.

pub mod tables;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use tables::{
    ABBREVIATION_RES, CORPORATE_FORMS_RE, FUND_MANAGER_ALIASES, FUND_MANAGER_ALIAS_MAP,
    STOPWORDS_RE,
};

static NAME_CHARSET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s\-']").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static DBA_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["DBA", "d/b/a", "d\\.b\\.a\\.", "trading as", "t/a"]
        .iter()
        .map(|marker| Regex::new(&format!(r"(?i)^(.+?)\s+{}\s+(.+)$", marker)).unwrap())
        .collect()
});

/// Character-level normalization: diacritics to ASCII approximations, smart
/// quotes and exotic dashes folded, control and zero-width codepoints
/// removed, whitespace collapsed. No business rules applied.
pub fn normalize_characters(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    // NFKD then drop combining marks, leaving the base letters.
    for c in text.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            '\u{201C}' | '\u{201D}' => folded.push('"'),
            '\u{2018}' | '\u{2019}' | '`' | '\u{00B4}' => folded.push('\''),
            '\u{2014}' | '\u{2013}' | '\u{2012}' | '\u{2015}' => folded.push('-'),
            '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => {
                folded.push(' ')
            }
            '\u{200B}'..='\u{200D}' | '\u{FEFF}' => {}
            c if c.is_control() => {}
            c => folded.push(c),
        }
    }
    WHITESPACE_RE.replace_all(&folded, " ").trim().to_string()
}

/// Normalize a legal entity name for fuzzy comparison.
///
/// The step order is the contract: character folding, lowercase, charset
/// filter, abbreviation expansion, corporate-form removal, stopword removal,
/// whitespace cleanup. The result is idempotent under re-normalization.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = normalize_characters(name).to_lowercase();

    normalized = NAME_CHARSET_RE.replace_all(&normalized, " ").into_owned();

    for (re, full) in ABBREVIATION_RES.iter() {
        normalized = re.replace_all(&normalized, *full).into_owned();
    }

    normalized = CORPORATE_FORMS_RE.replace_all(&normalized, "").into_owned();
    normalized = STOPWORDS_RE.replace_all(&normalized, "").into_owned();

    WHITESPACE_RE.replace_all(&normalized, " ").trim().to_string()
}

/// Normalize a fund manager name, consulting the alias map.
///
/// An exact alias hit returns the canonical form. Otherwise the first
/// canonical form that contains the normalized input (or is contained by it)
/// wins; failing that the normalized input passes through.
pub fn normalize_fund_manager(name: &str) -> String {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return normalized;
    }

    if let Some(canonical) = FUND_MANAGER_ALIAS_MAP.get(normalized.as_str()) {
        return canonical.to_string();
    }

    for (_, canonical) in FUND_MANAGER_ALIASES.iter() {
        if normalized.contains(canonical) || canonical.contains(normalized.as_str()) {
            return canonical.to_string();
        }
    }

    normalized
}

/// Legal name and trade name split out of a "X DBA Y" style string.
#[derive(Debug, Clone, PartialEq)]
pub struct DbaComponents {
    pub legal_name: String,
    pub trade_name: Option<String>,
}

impl DbaComponents {
    pub fn has_dba(&self) -> bool {
        self.trade_name.is_some()
    }
}

/// Split a name on the first DBA marker (`DBA`, `d/b/a`, `d.b.a.`,
/// `trading as`, `t/a`, case-insensitive, word-bounded). Without a marker
/// the whole input is the legal name.
pub fn extract_dba(full_name: &str) -> DbaComponents {
    for re in DBA_RES.iter() {
        if let Some(caps) = re.captures(full_name) {
            return DbaComponents {
                legal_name: caps[1].trim().to_string(),
                trade_name: Some(caps[2].trim().to_string()),
            };
        }
    }
    DbaComponents {
        legal_name: full_name.trim().to_string(),
        trade_name: None,
    }
}
