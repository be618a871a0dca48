// src/normalize/tables.rs
//! Frozen normalization tables. These are part of the matching contract:
//! changing an entry changes scores, so additions go through test review.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Corporate-form words removed from names before comparison. Covers US
/// forms, international forms, and investment-vehicle forms.
pub const CORPORATE_FORMS: [&str; 69] = [
    // US forms
    "inc", "incorporated", "corp", "corporation", "llc", "llp", "lp",
    "ltd", "limited", "co", "company", "holding", "holdings",
    "enterprises", "ent", "industries", "ind",
    // International forms
    "plc", "sa", "ag", "gmbh", "bv", "nv", "spa", "srl", "sarl",
    "ab", "as", "oy", "pty", "pte", "bhd", "sdn", "tbk", "pt",
    "kk", "kg", "kft", "sp zoo", "doo", "ad", "ead", "ooo", "zao",
    "ltda", "cv", "sas", "scs", "snc", "kgaa", "gmbh co kg",
    // Investment vehicles
    "fund", "funds", "trust", "reit", "sicav", "sicaf", "fcp",
    "partners", "partnership", "investments", "capital", "ventures",
    "equity", "credit", "asset", "management", "advisors", "advisers",
];

pub static CORPORATE_FORMS_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = CORPORATE_FORMS.join("|");
    Regex::new(&format!(r"\b({})\b", alternation)).unwrap()
});

/// Stopword articles and prepositions removed from names.
pub static STOPWORDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(the|a|an|and|of|in|for|by|with|from)\b").unwrap());

/// Common abbreviations expanded before corporate-form removal.
/// Applied in declaration order.
pub const ABBREVIATIONS: [(&str, &str); 23] = [
    ("intl", "international"),
    ("natl", "national"),
    ("mgmt", "management"),
    ("invt", "investment"),
    ("svcs", "services"),
    ("svc", "service"),
    ("tech", "technology"),
    ("assoc", "associates"),
    ("bros", "brothers"),
    ("dept", "department"),
    ("div", "division"),
    ("govt", "government"),
    ("univ", "university"),
    ("mfg", "manufacturing"),
    ("ins", "insurance"),
    ("fin", "financial"),
    ("grp", "group"),
    ("sys", "systems"),
    ("amer", "american"),
    ("euro", "european"),
    ("asia", "asian"),
    ("pac", "pacific"),
    ("atl", "atlantic"),
];

pub static ABBREVIATION_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ABBREVIATIONS
        .iter()
        .map(|(abbr, full)| (Regex::new(&format!(r"\b{}\b", abbr)).unwrap(), *full))
        .collect()
});

/// Well-known fund manager aliases, keyed by normalized short form. Lookup
/// order matters for the substring fallback, so this stays a Vec.
pub const FUND_MANAGER_ALIASES: [(&str, &str); 23] = [
    ("gsam", "goldman sachs asset management"),
    ("gs", "goldman sachs"),
    ("jpm", "jp morgan"),
    ("jpmc", "jp morgan chase"),
    ("ms", "morgan stanley"),
    ("msim", "morgan stanley investment management"),
    ("baml", "bank of america merrill lynch"),
    ("bofa", "bank of america"),
    ("ubs", "ubs asset management"),
    ("cs", "credit suisse"),
    ("db", "deutsche bank"),
    ("dws", "deutsche wealth management"),
    ("ssga", "state street global advisors"),
    ("bny", "bank of new york"),
    ("bnym", "bank of new york mellon"),
    ("citi", "citigroup"),
    ("hsbc", "hsbc global"),
    ("bnp", "bnp paribas"),
    ("axa", "axa investment"),
    ("ab", "alliancebernstein"),
    ("pimco", "pacific investment management company"),
    ("blackrock", "blackrock inc"),
    ("vanguard", "vanguard group"),
];

pub static FUND_MANAGER_ALIAS_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| FUND_MANAGER_ALIASES.into_iter().collect());

/// Corporate-family map: email domain to name synonyms used by the
/// email-domain booster's second path.
pub static CORPORATE_DOMAINS: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        "blackrock.com",
        vec!["blackrock", "blackrock inc", "blackrock asset management", "blackrock fund"],
    );
    map.insert("vanguard.com", vec!["vanguard", "vanguard group", "vanguard investments"]);
    map.insert(
        "fidelity.com",
        vec!["fidelity", "fidelity investments", "fidelity management", "fmr"],
    );
    map.insert(
        "goldmansachs.com",
        vec!["goldman sachs", "gs", "gsam", "goldman sachs asset management"],
    );
    map.insert(
        "jpmorgan.com",
        vec!["jp morgan", "jpmorgan", "jpmc", "jp morgan asset management", "jpm"],
    );
    map.insert(
        "morganstanley.com",
        vec!["morgan stanley", "ms", "morgan stanley investment management", "msim"],
    );
    map.insert("ubs.com", vec!["ubs", "ubs asset management", "ubs global", "ubs ag"]);
    map.insert(
        "credit-suisse.com",
        vec!["credit suisse", "cs", "credit suisse asset management"],
    );
    map.insert("db.com", vec!["deutsche bank", "db", "deutsche asset management", "dws"]);
    map.insert("barclays.com", vec!["barclays", "barclays capital", "barclays investment"]);
    map.insert("citi.com", vec!["citigroup", "citi", "citibank", "citigroup global"]);
    map.insert("hsbc.com", vec!["hsbc", "hsbc global", "hsbc asset management"]);
    map.insert("statestreet.com", vec!["state street", "state street global", "ssga"]);
    map.insert(
        "bnymellon.com",
        vec!["bny mellon", "bank of new york mellon", "bnym"],
    );
    map.insert("pimco.com", vec!["pimco", "pacific investment management"]);
    map
});

/// Keywords that mark a domain or entity name as financial-industry.
pub const FINANCIAL_KEYWORDS: [&str; 11] = [
    "bank", "capital", "asset", "invest", "fund", "wealth",
    "securities", "financial", "equity", "credit", "trading",
];
