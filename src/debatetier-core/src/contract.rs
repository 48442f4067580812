//! Validator contracts: the structural rules a turn's text must satisfy.

use serde::{Deserialize, Serialize};

use crate::config::ContractConfig;
use crate::turn::{GenerationContext, RoleType, TurnDescriptor};

/// Structural constraints for one turn.
///
/// Exactly one of `exact_sentences` or the `min_sentences`/`max_sentences`
/// pair is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorContract {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_sentences: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_sentences: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sentences: Option<u32>,
    pub max_questions: u32,
    pub must_hook: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_line: Option<String>,
    pub forbidden_phrases: Vec<String>,
    pub banned_stems: Vec<String>,
    pub banned_words_speaker: Vec<String>,
    pub english_only: bool,
    pub no_stage_directions: bool,
}

/// Caller-supplied values layered over the derived contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContractOverrides {
    pub exact_sentences: Option<u32>,
    pub min_sentences: Option<u32>,
    pub max_sentences: Option<u32>,
    pub max_questions: Option<u32>,
    pub forbidden_phrases: Vec<String>,
    pub banned_stems: Vec<String>,
    pub banned_words_speaker: Vec<String>,
}

/// Derive the contract for a turn.
pub fn build(
    turn: &TurnDescriptor,
    ctx: &GenerationContext,
    overrides: &ContractOverrides,
    config: &ContractConfig,
) -> ValidatorContract {
    let exact_sentences = if turn.requires_exact_sentence() {
        Some(1)
    } else {
        overrides.exact_sentences
    };

    let (min_sentences, max_sentences) = match exact_sentences {
        Some(_) => (None, None),
        None => {
            let (default_min, default_max) = if turn.role_type == RoleType::Chair {
                (config.chair_min_sentences, config.chair_max_sentences)
            } else {
                (config.min_sentences, config.max_sentences)
            };
            let min = overrides.min_sentences.unwrap_or(default_min);
            let max = overrides.max_sentences.unwrap_or(default_max).max(min);
            (Some(min), Some(max))
        }
    };

    // A hook needs something to hook into.
    let opponent_line = tail_chars(ctx.previous_opponent_text.trim(), config.opponent_line_chars);
    let opponent_line = (!opponent_line.is_empty()).then(|| opponent_line.to_string());
    let must_hook = turn.is_hook_family() && opponent_line.is_some();

    ValidatorContract {
        exact_sentences,
        min_sentences,
        max_sentences,
        max_questions: overrides.max_questions.unwrap_or(config.max_questions),
        must_hook,
        opponent_line,
        forbidden_phrases: overrides.forbidden_phrases.clone(),
        banned_stems: overrides.banned_stems.clone(),
        banned_words_speaker: overrides.banned_words_speaker.clone(),
        english_only: true,
        no_stage_directions: true,
    }
}

/// First `max` characters of `text`.
pub(crate) fn head_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `max` characters of `text`.
pub(crate) fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
