//! University name to slug mapping.
//!
//! The schedule scraper is keyed by short slugs; users type whatever they
//! call their university. Exact match first, then substring match, then an
//! input that already looks like a slug is accepted as-is.

use lazy_static::lazy_static;
use regex::Regex;

/// Common spellings and abbreviations, lowercased.
const UNIVERSITY_MAPPING: &[(&str, &str)] = &[
    ("тогу", "togu"),
    ("togu", "togu"),
    ("тогу дв", "togu"),
    ("тогу-дв", "togu"),
    ("тихоокеанский государственный университет", "togu"),
    ("мгу", "msu"),
    ("msu", "msu"),
    ("московский государственный университет", "msu"),
    ("мгу им. ломоносова", "msu"),
    ("псковгу", "pskovgu"),
    ("pskovgu", "pskovgu"),
    ("псковский государственный университет", "pskovgu"),
    ("петргу", "petrsu"),
    ("petrsu", "petrsu"),
    ("петрозаводский государственный университет", "petrsu"),
    ("мгимо", "mgimo"),
    ("mgimo", "mgimo"),
    ("мгту", "bmstu"),
    ("bmstu", "bmstu"),
    ("бауманка", "bmstu"),
    ("мгту им. баумана", "bmstu"),
    ("спбгу", "spbu"),
    ("spbu", "spbu"),
    ("санкт-петербургский государственный университет", "spbu"),
    ("мифи", "mephi"),
    ("mephi", "mephi"),
    ("мфти", "mipt"),
    ("mipt", "mipt"),
    ("физтех", "mipt"),
    ("вшэ", "hse"),
    ("hse", "hse"),
    ("высшая школа экономики", "hse"),
    ("тпу", "tpu"),
    ("tpu", "tpu"),
    ("томский политехнический университет", "tpu"),
    ("нгу", "nsu"),
    ("nsu", "nsu"),
    ("новосибирский государственный университет", "nsu"),
    ("урфу", "urfu"),
    ("urfu", "urfu"),
    ("уральский федеральный университет", "urfu"),
    ("кфу", "kfu"),
    ("kfu", "kfu"),
    ("казанский федеральный университет", "kfu"),
    ("сфу", "sibfu"),
    ("sibfu", "sibfu"),
    ("сибирский федеральный университет", "sibfu"),
];

lazy_static! {
    static ref SLUG_SHAPED: Regex = Regex::new(r"^[a-z]{3,}$").expect("valid pattern");
}

/// Resolve a user-typed university name to a scraper slug.
pub fn name_to_slug(name: &str) -> Option<String> {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some((_, slug)) = UNIVERSITY_MAPPING.iter().find(|(key, _)| *key == normalized) {
        return Some((*slug).to_string());
    }

    for (key, slug) in UNIVERSITY_MAPPING {
        if normalized.contains(key) || key.contains(normalized.as_str()) {
            return Some((*slug).to_string());
        }
    }

    // Already a slug? Pass it through and let the scraper judge.
    if SLUG_SHAPED.is_match(&normalized) {
        return Some(normalized);
    }

    None
}

/// Short list shown during onboarding.
pub fn popular_universities() -> &'static [(&'static str, &'static str)] {
    &[
        ("ТОГУ", "togu"),
        ("МГУ", "msu"),
        ("ПсковГУ", "pskovgu"),
        ("ПетрГУ", "petrsu"),
        ("МГИМО", "mgimo"),
        ("МГТУ им. Баумана", "bmstu"),
        ("СПбГУ", "spbu"),
        ("ТПУ", "tpu"),
        ("НГУ", "nsu"),
        ("УрФУ", "urfu"),
    ]
}

/// Up to five human-readable names resembling the query.
pub fn find_similar(query: &str) -> Vec<(&'static str, &'static str)> {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<(&str, &str)> = Vec::new();
    for (key, slug) in UNIVERSITY_MAPPING {
        if key.contains(normalized.as_str()) || normalized.contains(key) {
            if let Some(popular) = popular_universities().iter().find(|(_, s)| s == slug) {
                if !results.iter().any(|(_, s)| s == slug) {
                    results.push(*popular);
                }
            }
        }
    }
    results.truncate(5);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        assert_eq!(name_to_slug("ТОГУ").as_deref(), Some("togu"));
        assert_eq!(name_to_slug("  мгу  ").as_deref(), Some("msu"));
        assert_eq!(name_to_slug("Бауманка").as_deref(), Some("bmstu"));
    }

    #[test]
    fn partial_names_resolve() {
        assert_eq!(
            name_to_slug("Московский государственный университет им. Ломоносова").as_deref(),
            Some("msu")
        );
    }

    #[test]
    fn slug_shaped_input_passes_through() {
        assert_eq!(name_to_slug("narfu").as_deref(), Some("narfu"));
        assert_eq!(name_to_slug("ab"), None);
    }

    #[test]
    fn unknown_name_gives_nothing() {
        assert_eq!(name_to_slug("Хогвартс"), None);
        assert_eq!(name_to_slug(""), None);
    }

    #[test]
    fn similar_search_is_capped_and_unique() {
        let results = find_similar("государственный университет");
        assert!(results.len() <= 5);
        let mut slugs: Vec<&str> = results.iter().map(|(_, s)| *s).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), results.len());
    }
}
