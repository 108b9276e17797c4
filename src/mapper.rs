//! Metadata key mapping and type-aware value conversion.
//!
//! Mappings copy a source key's value to a target key. The target key's
//! NAME decides the conversion: keys that look date-like get `YYYY-MM-DD`
//! strings converted to local-midnight epoch milliseconds, keys that look
//! priority-like get priority words converted to a 1..=5 scale. Key-name
//! sniffing is a deliberate heuristic carried over from the original
//! design; the pattern tables are data so they stay testable and
//! extensible.

use crate::types::{MetadataMapping, MetaMap};
use chrono::{Local, NaiveDate, TimeZone};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Key-name fragments that mark a target key as date-like.
pub const DATE_KEY_PATTERNS: &[&str] = &[
    "due",
    "dueDate",
    "deadline",
    "start",
    "startDate",
    "started",
    "scheduled",
    "scheduledDate",
    "scheduled_for",
    "completed",
    "completedDate",
    "finished",
    "created",
    "createdDate",
    "created_at",
];

/// Key-name fragments that mark a target key as priority-like.
pub const PRIORITY_KEY_PATTERNS: &[&str] = &["priority", "urgency", "importance"];

/// Priority words mapped to the standard 1..=5 scale.
const PRIORITY_WORDS: &[(&str, i64)] = &[
    ("highest", 5),
    ("urgent", 5),
    ("critical", 5),
    ("high", 4),
    ("important", 4),
    ("medium", 3),
    ("normal", 3),
    ("moderate", 3),
    ("low", 2),
    ("minor", 2),
    ("lowest", 1),
    ("trivial", 1),
];

static ISO_DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

/// Date formats tried by [`parse_local_date`].
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Applies metadata mappings with type-aware conversion.
#[derive(Debug, Clone)]
pub struct MetadataMapper {
    mappings: Vec<MetadataMapping>,
    date_patterns: Vec<String>,
    priority_patterns: Vec<String>,
}

impl MetadataMapper {
    /// Create a mapper with the standard pattern tables.
    pub fn new(mappings: Vec<MetadataMapping>) -> Self {
        Self::with_patterns(
            mappings,
            DATE_KEY_PATTERNS.iter().map(|s| s.to_string()).collect(),
            PRIORITY_KEY_PATTERNS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Create a mapper with custom pattern tables.
    pub fn with_patterns(
        mappings: Vec<MetadataMapping>,
        date_patterns: Vec<String>,
        priority_patterns: Vec<String>,
    ) -> Self {
        Self {
            mappings,
            date_patterns,
            priority_patterns,
        }
    }

    /// Apply all enabled mappings as a non-destructive overlay: for each
    /// mapping whose source key is present, the converted value is written
    /// under the target key; every other key is untouched.
    pub fn apply(&self, metadata: &MetaMap) -> MetaMap {
        let mut result = metadata.clone();

        for mapping in &self.mappings {
            if !mapping.enabled {
                continue;
            }
            if let Some(source_value) = metadata.get(&mapping.source_key) {
                result.insert(
                    mapping.target_key.clone(),
                    self.convert_value(&mapping.target_key, source_value),
                );
            }
        }

        result
    }

    /// Convert a value based on the target key's name. Values that don't
    /// fit a known conversion pass through unchanged.
    pub fn convert_value(&self, target_key: &str, value: &Value) -> Value {
        let key_lower = target_key.to_lowercase();

        let is_date = self
            .date_patterns
            .iter()
            .any(|p| key_lower.contains(&p.to_lowercase()));
        let is_priority = self
            .priority_patterns
            .iter()
            .any(|p| key_lower.contains(&p.to_lowercase()));

        if is_date {
            if let Value::String(s) = value {
                if ISO_DATE_PREFIX.is_match(s) {
                    if let Some(ts) = parse_local_date(s) {
                        return Value::Number(ts.into());
                    }
                }
            }
        } else if is_priority {
            if let Value::String(s) = value {
                if let Ok(n) = s.trim().parse::<i64>() {
                    return Value::Number(n.into());
                }
                let word = s.to_lowercase();
                if let Some((_, level)) = PRIORITY_WORDS.iter().find(|(w, _)| *w == word) {
                    return Value::Number((*level).into());
                }
            }
        }

        value.clone()
    }
}

/// Parse a date string to local-midnight epoch milliseconds.
///
/// Template placeholder strings (`{{...}}`) are rejected. Returns `None`
/// when no format matches, so callers keep the original value.
pub fn parse_local_date(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() || input.contains("{{") || input.contains("}}") {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            return Local
                .from_local_datetime(&midnight)
                .earliest()
                .map(|dt| dt.timestamp_millis());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(source: &str, target: &str) -> MetadataMapping {
        MetadataMapping {
            source_key: source.to_string(),
            target_key: target.to_string(),
            enabled: true,
        }
    }

    fn meta(pairs: &[(&str, Value)]) -> MetaMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn local_midnight_ms(y: i32, m: u32, d: u32) -> i64 {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        Local
            .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_date_key_converts_iso_string() {
        let mapper = MetadataMapper::new(vec![mapping("deadline", "due")]);
        let result = mapper.apply(&meta(&[("deadline", json!("2024-01-01"))]));

        assert_eq!(result["due"], json!(local_midnight_ms(2024, 1, 1)));
        // Source key untouched.
        assert_eq!(result["deadline"], json!("2024-01-01"));
    }

    #[test]
    fn test_unparseable_date_keeps_original() {
        let mapper = MetadataMapper::new(vec![mapping("deadline", "due")]);
        let result = mapper.apply(&meta(&[("deadline", json!("2024-99-99"))]));
        assert_eq!(result["due"], json!("2024-99-99"));
    }

    #[test]
    fn test_non_iso_date_string_passes_through() {
        let mapper = MetadataMapper::new(vec![mapping("deadline", "due")]);
        let result = mapper.apply(&meta(&[("deadline", json!("next tuesday"))]));
        assert_eq!(result["due"], json!("next tuesday"));
    }

    #[test]
    fn test_priority_word_maps_to_scale() {
        let mapper = MetadataMapper::new(vec![mapping("importance", "priority")]);

        for (word, level) in [("high", 4), ("URGENT", 5), ("trivial", 1), ("Normal", 3)] {
            let result = mapper.apply(&meta(&[("importance", json!(word))]));
            assert_eq!(result["priority"], json!(level), "word: {word}");
        }
    }

    #[test]
    fn test_priority_numeric_string_parses() {
        let mapper = MetadataMapper::new(vec![mapping("importance", "priority")]);
        let result = mapper.apply(&meta(&[("importance", json!("4"))]));
        assert_eq!(result["priority"], json!(4));
    }

    #[test]
    fn test_unknown_priority_word_passes_through() {
        let mapper = MetadataMapper::new(vec![mapping("importance", "priority")]);
        let result = mapper.apply(&meta(&[("importance", json!("whenever"))]));
        assert_eq!(result["priority"], json!("whenever"));
    }

    #[test]
    fn test_disabled_mapping_is_skipped() {
        let mut m = mapping("a", "due");
        m.enabled = false;
        let mapper = MetadataMapper::new(vec![m]);
        let result = mapper.apply(&meta(&[("a", json!("2024-01-01"))]));
        assert!(!result.contains_key("due"));
    }

    #[test]
    fn test_missing_source_key_is_skipped() {
        let mapper = MetadataMapper::new(vec![mapping("absent", "due")]);
        let result = mapper.apply(&meta(&[("other", json!(1))]));
        assert!(!result.contains_key("due"));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_key_matching_is_substring_and_case_insensitive() {
        let mapper = MetadataMapper::new(vec![
            mapping("a", "DueDate"),
            mapping("b", "taskUrgency"),
        ]);
        let result = mapper.apply(&meta(&[
            ("a", json!("2024-06-15")),
            ("b", json!("low")),
        ]));

        assert_eq!(result["DueDate"], json!(local_midnight_ms(2024, 6, 15)));
        assert_eq!(result["taskUrgency"], json!(2));
    }

    #[test]
    fn test_non_string_values_pass_through() {
        let mapper = MetadataMapper::new(vec![mapping("a", "due"), mapping("b", "priority")]);
        let result = mapper.apply(&meta(&[("a", json!(12345)), ("b", json!(2))]));
        assert_eq!(result["due"], json!(12345));
        assert_eq!(result["priority"], json!(2));
    }

    #[test]
    fn test_custom_pattern_tables() {
        let mapper = MetadataMapper::with_patterns(
            vec![mapping("a", "fälligkeit")],
            vec!["fällig".to_string()],
            vec![],
        );
        let result = mapper.apply(&meta(&[("a", json!("2024-01-01"))]));
        assert_eq!(result["fälligkeit"], json!(local_midnight_ms(2024, 1, 1)));
    }

    #[test]
    fn test_parse_local_date_formats() {
        let expected = local_midnight_ms(2024, 3, 5);
        assert_eq!(parse_local_date("2024-03-05"), Some(expected));
        assert_eq!(parse_local_date("2024/03/05"), Some(expected));
        assert_eq!(parse_local_date("2024.03.05"), Some(expected));
        assert_eq!(parse_local_date(" 2024-03-05 "), Some(expected));
    }

    #[test]
    fn test_parse_local_date_rejects_templates() {
        assert_eq!(parse_local_date("{{date}}"), None);
        assert_eq!(parse_local_date(""), None);
        assert_eq!(parse_local_date("not a date"), None);
    }
}
