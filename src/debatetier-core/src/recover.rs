//! Structured result recovery.
//!
//! The analysis call asks for one JSON object but models wrap it in fences,
//! chat around it, or leave trailing commas. Recovery peels those layers off
//! in a fixed order and then normalizes whatever object it found into the
//! ten canonical sections. If no object can be parsed it fails outright.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::analysis::{AnalysisResult, AnalysisSection, SECTION_IDS, humanize_section_id};
use crate::config::TierConfig;
use crate::error::DebateError;

/// Raw analysis output plus what is needed to normalize it.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryInput<'a> {
    pub topic: &'a str,
    pub raw_model_text: &'a str,
    /// Model that produced the text; defaults to the expensive tier's id.
    pub model_used: Option<&'a str>,
}

/// Recover an [`AnalysisResult`] stamped with the current time.
pub fn recover(input: RecoveryInput<'_>, tiers: &TierConfig) -> Result<AnalysisResult, DebateError> {
    recover_at(input, tiers, Utc::now())
}

/// Recover an [`AnalysisResult`] stamped with `generated_at`.
pub fn recover_at(
    input: RecoveryInput<'_>,
    tiers: &TierConfig,
    generated_at: DateTime<Utc>,
) -> Result<AnalysisResult, DebateError> {
    let parsed = extract_object(input.raw_model_text)?;
    let model = input.model_used.unwrap_or(&tiers.expensive_model);
    Ok(normalize(parsed, input.topic, model, generated_at))
}

/// Pull the first JSON object out of free-form model text.
pub fn extract_object(raw: &str) -> Result<Map<String, Value>, DebateError> {
    let unfenced = strip_fences(raw);
    let trimmed = trim_to_braces(unfenced);

    if let Some(obj) = parse_object(trimmed) {
        debug!("analysis parsed directly");
        return Ok(obj);
    }

    let candidate = balanced_object(trimmed).unwrap_or(trimmed);
    if let Some(obj) = parse_object(candidate) {
        debug!("analysis parsed from balanced object scan");
        return Ok(obj);
    }

    let repaired = remove_trailing_commas(candidate);
    if let Some(obj) = parse_object(&repaired) {
        debug!("analysis parsed after trailing comma repair");
        return Ok(obj);
    }

    Err(DebateError::MalformedResponse(format!(
        "no JSON object could be recovered from {} characters of model output",
        raw.chars().count()
    )))
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

/// Drop a leading ```lang fence line and a trailing ``` fence.
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
            .unwrap_or(rest.len());
        text = rest[tag_len..].trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text
}

/// Cut anything before the first `{` and after the last `}`.
fn trim_to_braces(text: &str) -> &str {
    let Some(start) = text.find('{') else {
        return text;
    };
    match text.rfind('}') {
        Some(end) if end > start => &text[start..=end],
        _ => &text[start..],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InString(char),
    Escaped(char),
}

impl ScanState {
    fn step(self, ch: char) -> Self {
        match self {
            ScanState::Normal if ch == '"' || ch == '\'' => ScanState::InString(ch),
            ScanState::Normal => ScanState::Normal,
            ScanState::InString(quote) if ch == '\\' => ScanState::Escaped(quote),
            ScanState::InString(quote) if ch == quote => ScanState::Normal,
            ScanState::InString(quote) => ScanState::InString(quote),
            ScanState::Escaped(quote) => ScanState::InString(quote),
        }
    }
}

/// The first `{ ... }` whose braces balance, ignoring braces inside
/// quoted strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut state = ScanState::Normal;
    let mut depth = 0usize;

    for (offset, ch) in text[start..].char_indices() {
        if state == ScanState::Normal {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=start + offset]);
                    }
                }
                _ => {}
            }
        }
        state = state.step(ch);
    }
    None
}

/// Remove commas that sit directly before a closing `}` or `]`.
fn remove_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Normal;

    for ch in text.chars() {
        if state == ScanState::Normal && (ch == '}' || ch == ']') {
            let kept = out.trim_end().len();
            if out[..kept].ends_with(',') {
                out.truncate(kept - 1);
            }
        }
        out.push(ch);
        state = state.step(ch);
    }
    out
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Find a section by id, whether `sections` is an array or an object keyed
/// by id. The first match wins.
fn find_section<'a>(sections: Option<&'a Value>, id: &str) -> Option<&'a Map<String, Value>> {
    match sections? {
        Value::Array(list) => list
            .iter()
            .filter_map(Value::as_object)
            .find(|s| s.get("id").and_then(Value::as_str).map(str::trim) == Some(id)),
        Value::Object(by_id) => by_id.get(id).and_then(Value::as_object),
        _ => None,
    }
}

fn normalize(
    parsed: Map<String, Value>,
    topic: &str,
    model: &str,
    generated_at: DateTime<Utc>,
) -> AnalysisResult {
    let raw_sections = parsed.get("sections");
    let mut synthesized = 0;

    let sections: Vec<AnalysisSection> = SECTION_IDS
        .iter()
        .map(|&id| {
            let found = find_section(raw_sections, id);
            if found.is_none() {
                synthesized += 1;
            }
            let heading = non_blank_str(found.and_then(|s| s.get("heading")))
                .map(str::to_string)
                .unwrap_or_else(|| humanize_section_id(id));
            let items = found
                .and_then(|s| s.get("items"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            AnalysisSection {
                id: id.to_string(),
                heading,
                items,
            }
        })
        .collect();

    debug!(synthesized, "normalized analysis sections");

    let title = non_blank_str(parsed.get("title")).unwrap_or(topic).to_string();
    let topic = non_blank_str(parsed.get("topic")).unwrap_or(topic).to_string();

    let mut meta = match parsed.get("meta") {
        Some(Value::Object(meta)) => meta.clone(),
        _ => Map::new(),
    };
    meta.insert("model".to_string(), Value::String(model.to_string()));
    meta.insert(
        "generatedAt".to_string(),
        Value::String(generated_at.to_rfc3339()),
    );

    AnalysisResult {
        title,
        topic,
        meta,
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn full_object() -> Value {
        let sections: Vec<Value> = SECTION_IDS
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "heading": format!("Heading for {}", id),
                    "items": [{"text": format!("{} item", id)}],
                })
            })
            .collect();
        json!({"title": "Cars Downtown", "topic": "Ban cars downtown", "sections": sections})
    }

    fn run(raw: &str) -> Result<AnalysisResult, DebateError> {
        recover_at(
            RecoveryInput {
                topic: "Ban cars downtown",
                raw_model_text: raw,
                model_used: Some("tier-expensive"),
            },
            &TierConfig::default(),
            stamp(),
        )
    }

    #[test]
    fn test_valid_object_round_trips_sections() {
        let input = full_object();
        let result = run(&input.to_string()).unwrap();
        let expected: Vec<AnalysisSection> =
            serde_json::from_value(input["sections"].clone()).unwrap();
        assert_eq!(result.sections, expected);
        assert_eq!(result.title, "Cars Downtown");
    }

    #[test]
    fn test_fenced_with_prose_matches_unwrapped() {
        let body = serde_json::to_string_pretty(&full_object()).unwrap();
        let wrapped = format!(
            "Sure! Here is the analysis you asked for:\n```json\n{}\n```\nLet me know if you need more.",
            body
        );
        assert_eq!(run(&wrapped).unwrap(), run(&body).unwrap());

        let fenced_only = format!("```json\n{}\n```", body);
        assert_eq!(run(&fenced_only).unwrap(), run(&body).unwrap());
    }

    #[test]
    fn test_trailing_comma_recovered_and_sections_synthesized() {
        let raw = r#"{"title":"X","sections":[{"id":"definitions","heading":"D","items":[{"text":"a"}]}],}"#;
        let result = run(raw).unwrap();
        assert_eq!(result.title, "X");
        assert_eq!(result.sections.len(), 10);
        assert_eq!(result.sections[0].heading, "D");
        assert_eq!(result.sections[0].items, vec![json!({"text": "a"})]);

        let synthesized: Vec<&AnalysisSection> = result.sections[1..].iter().collect();
        assert_eq!(synthesized.len(), 9);
        for section in synthesized {
            assert!(section.items.is_empty());
            assert_eq!(section.heading, humanize_section_id(&section.id));
        }
        assert_eq!(result.sections[2].heading, "Argument Map");
    }

    #[test]
    fn test_prose_without_braces_fails() {
        let result = run("I'm sorry, I cannot produce an analysis for that motion.");
        assert!(matches!(result, Err(DebateError::MalformedResponse(_))));
    }

    #[test]
    fn test_unparseable_object_fails() {
        let result = run("{ this is not json at all }");
        assert!(matches!(result, Err(DebateError::MalformedResponse(_))));
    }

    #[test]
    fn test_non_object_json_fails() {
        assert!(matches!(run("[1, 2, 3]"), Err(DebateError::MalformedResponse(_))));
    }

    #[test]
    fn test_braces_inside_strings_do_not_close_object() {
        let raw = r#"{"title":"Use } and { freely","sections":[]} trailing {"junk": true}"#;
        let result = run(raw).unwrap();
        assert_eq!(result.title, "Use } and { freely");
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let raw = r#"Result: {"title":"He said \"}\" twice","sections":[]} and then {"#;
        let result = run(raw).unwrap();
        assert_eq!(result.title, "He said \"}\" twice");
    }

    #[test]
    fn test_trailing_comma_inside_string_untouched() {
        let raw = r#"{"title":"a,}","sections":[{"id":"media","items":[{"kind":"Film"},],},],}"#;
        let result = run(raw).unwrap();
        assert_eq!(result.title, "a,}");
        assert_eq!(result.section("media").unwrap().items.len(), 1);
    }

    #[test]
    fn test_reordered_duplicated_and_unknown_sections() {
        let raw = json!({
            "sections": [
                {"id": "media", "heading": "Media", "items": [{"kind": "Book"}]},
                {"id": "bonus", "heading": "Bonus", "items": [1]},
                {"id": "definitions", "heading": "First", "items": [1]},
                {"id": "definitions", "heading": "Second", "items": [2]},
                {"id": "clashes", "heading": "", "items": "not an array"},
            ]
        });
        let result = run(&raw.to_string()).unwrap();
        let ids: Vec<&str> = result.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, SECTION_IDS.to_vec());
        assert_eq!(result.section("definitions").unwrap().heading, "First");
        assert_eq!(result.section("media").unwrap().items.len(), 1);
        let clashes = result.section("clashes").unwrap();
        assert_eq!(clashes.heading, "Clashes");
        assert!(clashes.items.is_empty());
        assert!(result.section("bonus").is_none());
    }

    #[test]
    fn test_sections_keyed_by_id() {
        let raw = json!({
            "sections": {"evidence": {"heading": "Evidence", "items": [{"text": "x"}]}}
        });
        let result = run(&raw.to_string()).unwrap();
        assert_eq!(result.section("evidence").unwrap().items.len(), 1);
    }

    #[test]
    fn test_title_topic_fallback_and_meta() {
        let raw = json!({"title": 42, "meta": {"lang": "en"}, "sections": []});
        let result = run(&raw.to_string()).unwrap();
        assert_eq!(result.title, "Ban cars downtown");
        assert_eq!(result.topic, "Ban cars downtown");
        assert_eq!(result.meta["lang"], json!("en"));
        assert_eq!(result.meta["model"], json!("tier-expensive"));
        assert_eq!(result.meta["generatedAt"], json!("2026-03-01T12:00:00+00:00"));
    }

    #[test]
    fn test_model_defaults_to_expensive_tier() {
        let tiers = TierConfig {
            expensive_model: "analysis-model".to_string(),
            ..TierConfig::default()
        };
        let result = recover(
            RecoveryInput {
                topic: "t",
                raw_model_text: "{}",
                model_used: None,
            },
            &tiers,
        )
        .unwrap();
        assert_eq!(result.meta["model"], json!("analysis-model"));
        assert_eq!(result.sections.len(), 10);
    }

    #[test]
    fn test_strip_fences_variants() {
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {}  "), "{}");
        assert_eq!(strip_fences("```json {\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_balanced_object_scan() {
        assert_eq!(balanced_object(r#"{"a":{"b":1}} {"c":2}"#), Some(r#"{"a":{"b":1}}"#));
        assert_eq!(balanced_object(r#"{'x':'}'}"#), Some(r#"{'x':'}'}"#));
        assert_eq!(balanced_object("{ unterminated"), None);
        assert_eq!(balanced_object("no braces"), None);
    }

    #[test]
    fn test_remove_trailing_commas() {
        assert_eq!(remove_trailing_commas(r#"{"a":[1,2,],}"#), r#"{"a":[1,2]}"#);
        assert_eq!(remove_trailing_commas("{\"a\":1,\n}"), "{\"a\":1}");
        assert_eq!(remove_trailing_commas(r#"{"a":",]"}"#), r#"{"a":",]"}"#);
    }
}
