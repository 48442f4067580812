//! Topic analysis: the ten-section breakdown of a debate motion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Section ids in canonical order. Every [`AnalysisResult`] has exactly
/// these sections, in this order.
pub const SECTION_IDS: [&str; 10] = [
    "definitions",
    "key_questions",
    "argument_map",
    "clashes",
    "evidence",
    "stakeholders",
    "value_conflicts",
    "literature",
    "media",
    "verdict_criteria",
];

/// One section of an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSection {
    pub id: String,
    pub heading: String,
    /// Loosely typed records; the shape varies per section.
    pub items: Vec<Value>,
}

/// Normalized analysis of a motion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub title: String,
    pub topic: String,
    /// Free-form metadata; always carries `model` and `generatedAt`.
    pub meta: Map<String, Value>,
    pub sections: Vec<AnalysisSection>,
}

impl AnalysisResult {
    pub fn section(&self, id: &str) -> Option<&AnalysisSection> {
        self.sections.iter().find(|s| s.id == id)
    }
}

/// `argument_map` -> `Argument Map`.
pub fn humanize_section_id(id: &str) -> String {
    id.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// System instruction for the analysis request.
pub fn system_prompt() -> String {
    let ids = SECTION_IDS
        .iter()
        .map(|id| format!("\"{}\"", id))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a debate analyst. Produce a structured breakdown of the motion you are given.

OUTPUT FORMAT:
Return exactly ONE JSON object and nothing else: no prose, no markdown fences.
The object has the keys "title", "topic" and "sections".
"sections" is an array of exactly ten objects, in this order, with these ids:
{ids}
Each section object has "id", "heading" and "items" (an array).

ITEM SHAPES:
- definitions: {{"term": string, "text": string}}
- key_questions: {{"text": string}}
- argument_map: {{"id": string, "claim": string, "side": "pro" | "con", "parent": string | null}}
- clashes: {{"pro": string, "con": string, "crux": string}}
- evidence: {{"text": string, "side": "pro" | "con"}}
- stakeholders: {{"name": string, "interest": string}}
- value_conflicts: {{"text": string}}
- literature: {{"author": string, "title": string, "year": number (optional), "url": string (optional)}}
- media: {{"kind": "Book" | "Film" | "Music" | "Game", "title": string, "creator": string, "note": string}}
- verdict_criteria: {{"text": string}}

Use double quotes for every key and string. Do not add trailing commas."#
    )
}

/// User message carrying the motion.
pub fn user_prompt(topic: &str) -> String {
    format!("MOTION: {}\n\nReturn the JSON object now.", topic.trim())
}
