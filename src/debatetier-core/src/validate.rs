//! Turn text checks.
//!
//! Cleans raw model output and checks it against a [`ValidatorContract`],
//! producing the failure list a repair prompt is built from.

use regex::Regex;

use crate::contract::ValidatorContract;
use crate::repair::RepairFailure;

/// Words too common to count as a hook into the opponent's line.
const HOOK_STOPWORDS: &[&str] = &[
    "that", "this", "with", "have", "they", "there", "their", "what", "would", "about", "which",
    "from", "been", "were", "will", "your", "just", "than", "then", "them", "when", "very",
];

/// Reasoning blocks some models emit before the spoken turn.
const REASONING_TAGS: &str = "think|thinking|thought|reasoning|reflection|scratchpad|analysis|plan";

/// Clean raw model output into a speakable turn.
///
/// Drops reasoning blocks and stray markup tags, a leading speaker label
/// (`Pro:`, `Chair:`), and quotes wrapping the whole turn, then collapses
/// whitespace. Asterisk asides are left in place so the validator can
/// flag them as stage directions.
pub fn sanitize_response(response: &str) -> String {
    let mut text = response.to_string();

    let block = format!(r"(?is)<(?:{REASONING_TAGS})\b[^>]*>.*?</(?:{REASONING_TAGS})\s*>");
    if let Ok(re) = Regex::new(&block) {
        text = re.replace_all(&text, " ").into_owned();
    }
    if let Ok(re) = Regex::new(r"</?[A-Za-z][\w-]*[^>]*>") {
        text = re.replace_all(&text, " ").into_owned();
    }
    if let Ok(re) = Regex::new(r"\s+") {
        text = re.replace_all(&text, " ").into_owned();
    }

    let mut text = text.trim();
    if let Ok(re) = Regex::new(r"(?i)^(?:chair|moderator|judge|pro|con|debater)\s*:\s*")
        && let Some(m) = re.find(text)
    {
        text = &text[m.end()..];
    }
    for (open, close) in [('"', '"'), ('\u{201C}', '\u{201D}')] {
        if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close))
            && !inner.contains(open)
            && !inner.contains(close)
        {
            text = inner.trim();
        }
    }
    text.to_string()
}

/// Split text into sentences on runs of `.`, `!` or `?`. A trailing
/// fragment without a terminator still counts.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let mut end = idx + ch.len_utf8();
            while let Some(&(next_idx, next)) = chars.peek() {
                if matches!(next, '.' | '!' | '?' | '"' | '\'' | ')') {
                    end = next_idx + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let sentence = text[start..end].trim();
            if sentence.chars().any(|c| c.is_alphanumeric()) {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if rest.chars().any(|c| c.is_alphanumeric()) {
        sentences.push(rest);
    }
    sentences
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(|w| w.trim_matches('\'').to_lowercase())
}

fn hook_words(text: &str) -> Vec<String> {
    words(text)
        .filter(|w| w.chars().filter(|c| c.is_alphabetic()).count() >= 4)
        .filter(|w| !HOOK_STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Check `text` against `contract`. Failures come back in rule order;
/// an empty list means the text is acceptable.
pub fn validate(text: &str, contract: &ValidatorContract) -> Vec<RepairFailure> {
    let mut failures = Vec::new();
    let sentences = split_sentences(text);
    let count = sentences.len() as u32;

    match (contract.exact_sentences, contract.min_sentences, contract.max_sentences) {
        (Some(n), _, _) if count != n => failures.push(RepairFailure::with_detail(
            "sentence_count",
            format!("found {} sentences, need exactly {}", count, n),
        )),
        (None, min, max) => {
            let min = min.unwrap_or(1);
            let max = max.unwrap_or(u32::MAX);
            if count < min || count > max {
                failures.push(RepairFailure::with_detail(
                    "sentence_count",
                    format!("found {} sentences, allowed {}-{}", count, min, max),
                ));
            }
        }
        _ => {}
    }

    let questions = text.matches('?').count() as u32;
    if questions > contract.max_questions {
        failures.push(RepairFailure::with_detail(
            "max_questions",
            format!("found {} question marks, allowed {}", questions, contract.max_questions),
        ));
    }

    if contract.must_hook
        && let Some(line) = contract.opponent_line.as_deref()
    {
        let anchors = hook_words(line);
        let first = sentences.first().copied().unwrap_or("");
        let hooked = hook_words(first).iter().any(|w| anchors.contains(w));
        if !hooked {
            failures.push(RepairFailure::with_detail(
                "hook",
                "first sentence does not pick up anything the opponent said",
            ));
        }
    }

    let lowered = text.to_lowercase();
    for phrase in &contract.forbidden_phrases {
        if !phrase.trim().is_empty() && lowered.contains(&phrase.to_lowercase()) {
            failures.push(RepairFailure::with_detail("forbidden_phrase", phrase.clone()));
        }
    }

    let text_words: Vec<String> = words(text).collect();
    for stem in &contract.banned_stems {
        let stem = stem.to_lowercase();
        if stem.is_empty() {
            continue;
        }
        if let Some(word) = text_words.iter().find(|w| w.starts_with(&stem)) {
            failures.push(RepairFailure::with_detail(
                "banned_stem",
                format!("'{}' uses banned stem '{}'", word, stem),
            ));
        }
    }

    for banned in &contract.banned_words_speaker {
        let banned = banned.to_lowercase();
        if text_words.iter().any(|w| *w == banned) {
            failures.push(RepairFailure::with_detail("banned_word_speaker", banned));
        }
    }

    if contract.english_only && text.chars().any(|c| c.is_alphabetic() && c as u32 > 0x024F) {
        failures.push(RepairFailure::with_detail(
            "english_only",
            "contains non-Latin script",
        ));
    }

    if contract.no_stage_directions
        && let Ok(re) = Regex::new(r"\([^)]*\)|\[[^\]]*\]|\*[^*]+\*")
        && let Some(m) = re.find(text)
    {
        failures.push(RepairFailure::with_detail("no_stage_directions", m.as_str()));
    }

    failures
}
