// src/utils/country.rs
//! Country code validation and normalization.
//!
//! Recognizes the ISO-3166-1 alpha-2 set plus a frozen alias map covering
//! the English country names that show up on participant forms. Also hosts
//! the ccTLD table used for email-domain geographic consistency checks.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static ISO_COUNTRY_CODES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT",
        "AU", "AW", "AX", "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI",
        "BJ", "BL", "BM", "BN", "BO", "BQ", "BR", "BS", "BT", "BV", "BW", "BY",
        "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK", "CL", "CM", "CN",
        "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM",
        "DO", "DZ", "EC", "EE", "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK",
        "FM", "FO", "FR", "GA", "GB", "GD", "GE", "GF", "GG", "GH", "GI", "GL",
        "GM", "GN", "GP", "GQ", "GR", "GS", "GT", "GU", "GW", "GY", "HK", "HM",
        "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN", "IO", "IQ", "IR",
        "IS", "IT", "JE", "JM", "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN",
        "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC", "LI", "LK", "LR", "LS",
        "LT", "LU", "LV", "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK",
        "ML", "MM", "MN", "MO", "MP", "MQ", "MR", "MS", "MT", "MU", "MV", "MW",
        "MX", "MY", "MZ", "NA", "NC", "NE", "NF", "NG", "NI", "NL", "NO", "NP",
        "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG", "PH", "PK", "PL", "PM",
        "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW",
        "SA", "SB", "SC", "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM",
        "SN", "SO", "SR", "SS", "ST", "SV", "SX", "SY", "SZ", "TC", "TD", "TF",
        "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO", "TR", "TT", "TV", "TW",
        "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
        "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
    ]
    .into_iter()
    .collect()
});

static COUNTRY_NAME_TO_CODE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("UNITED STATES", "US"),
        ("USA", "US"),
        ("AMERICA", "US"),
        ("UNITED STATES OF AMERICA", "US"),
        ("UNITED KINGDOM", "GB"),
        ("UK", "GB"),
        ("ENGLAND", "GB"),
        ("GREAT BRITAIN", "GB"),
        ("CANADA", "CA"),
        ("GERMANY", "DE"),
        ("FRANCE", "FR"),
        ("JAPAN", "JP"),
        ("CHINA", "CN"),
        ("PEOPLE'S REPUBLIC OF CHINA", "CN"),
        ("AUSTRALIA", "AU"),
        ("NETHERLANDS", "NL"),
        ("HOLLAND", "NL"),
        ("SWITZERLAND", "CH"),
        ("SINGAPORE", "SG"),
        ("HONG KONG", "HK"),
        ("IRELAND", "IE"),
        ("LUXEMBOURG", "LU"),
        ("CAYMAN ISLANDS", "KY"),
        ("BERMUDA", "BM"),
        ("BRITISH VIRGIN ISLANDS", "VG"),
        ("ISLE OF MAN", "IM"),
        ("JERSEY", "JE"),
        ("GUERNSEY", "GG"),
        ("SOUTH KOREA", "KR"),
        ("KOREA", "KR"),
        ("INDIA", "IN"),
        ("BRAZIL", "BR"),
        ("MEXICO", "MX"),
        ("SPAIN", "ES"),
        ("ITALY", "IT"),
        ("SWEDEN", "SE"),
        ("NORWAY", "NO"),
        ("DENMARK", "DK"),
        ("FINLAND", "FI"),
        ("BELGIUM", "BE"),
        ("AUSTRIA", "AT"),
        ("PORTUGAL", "PT"),
    ]
    .into_iter()
    .collect()
});

/// ccTLD suffix to ISO country. `.com` counts as US by convention.
static CCTLD_TO_COUNTRY: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        (".uk", "GB"),
        (".ca", "CA"),
        (".de", "DE"),
        (".fr", "FR"),
        (".au", "AU"),
        (".jp", "JP"),
        (".cn", "CN"),
        (".sg", "SG"),
        (".hk", "HK"),
        (".ch", "CH"),
        (".nl", "NL"),
        (".ie", "IE"),
        (".lu", "LU"),
        (".com", "US"),
    ]
});

pub fn is_valid_country_code(code: &str) -> bool {
    ISO_COUNTRY_CODES.contains(code.to_uppercase().as_str())
}

/// Normalize a country name or code to an ISO alpha-2 code. Unrecognized
/// inputs pass through uppercased.
pub fn normalize_country(country: &str) -> String {
    let upper = country.trim().to_uppercase();
    if upper.len() == 2 && ISO_COUNTRY_CODES.contains(upper.as_str()) {
        return upper;
    }
    COUNTRY_NAME_TO_CODE
        .get(upper.as_str())
        .map(|c| c.to_string())
        .unwrap_or(upper)
}

/// Whether an email domain's TLD is consistent with a country code.
pub fn domain_matches_country(domain: &str, country_code: &str) -> bool {
    let domain = domain.to_lowercase();
    CCTLD_TO_COUNTRY
        .iter()
        .any(|(tld, code)| domain.ends_with(tld) && *code == country_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_codes() {
        assert!(is_valid_country_code("US"));
        assert!(is_valid_country_code("gb"));
        assert!(!is_valid_country_code("XX"));
        assert!(!is_valid_country_code("USA"));
    }

    #[test]
    fn test_normalize_country() {
        assert_eq!(normalize_country("United States"), "US");
        assert_eq!(normalize_country("UK"), "GB");
        assert_eq!(normalize_country("de"), "DE");
        assert_eq!(normalize_country("Atlantis"), "ATLANTIS");
    }

    #[test]
    fn test_domain_country_consistency() {
        assert!(domain_matches_country("lloyds.co.uk", "GB"));
        assert!(domain_matches_country("acme.com", "US"));
        assert!(!domain_matches_country("acme.com", "GB"));
        assert!(!domain_matches_country("acme.fr", "DE"));
    }
}
