//! Repair prompts.
//!
//! When a turn fails validation the caller gets one corrective request.
//! This module only writes that request; it never loops.

use serde::{Deserialize, Serialize};

use crate::config::ContractConfig;
use crate::contract::{ValidatorContract, head_chars};

/// One violated contract clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepairFailure {
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RepairFailure {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            detail: None,
        }
    }

    pub fn with_detail(rule: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Build the single corrective instruction for a rejected draft.
pub fn build_prompt(
    contract: &ValidatorContract,
    opponent_line: &str,
    failures: &[RepairFailure],
    current_text: &str,
    config: &ContractConfig,
) -> String {
    let mut out = String::from(
        "Your previous draft broke its output contract. Rewrite it so that every rule below holds.\n\nCONTRACT:\n",
    );

    out.push_str(&match (contract.exact_sentences, contract.min_sentences, contract.max_sentences) {
        (Some(n), _, _) => format!("- Exactly {} sentence{}.\n", n, if n == 1 { "" } else { "s" }),
        (None, min, max) => format!(
            "- Between {} and {} sentences.\n",
            min.unwrap_or(1),
            max.unwrap_or_else(|| min.unwrap_or(1))
        ),
    });
    out.push_str(&format!("- At most {} question mark(s).\n", contract.max_questions));
    if contract.must_hook {
        out.push_str("- Your first sentence must respond directly to the opponent's line.\n");
    }
    for (label, list) in [
        ("Never use these phrases", &contract.forbidden_phrases),
        ("Never use words starting with", &contract.banned_stems),
        ("Never use these words", &contract.banned_words_speaker),
    ] {
        if !list.is_empty() {
            out.push_str(&format!("- {}: {}.\n", label, list.join(", ")));
        }
    }
    if contract.english_only {
        out.push_str("- English only.\n");
    }
    if contract.no_stage_directions {
        out.push_str("- No stage directions, parentheticals, narration or markdown.\n");
    }

    let opponent = head_chars(opponent_line.trim(), config.repair_opponent_chars);
    if !opponent.is_empty() {
        out.push_str(&format!("\nOPPONENT LINE:\n\"{}\"\n", opponent));
    }

    out.push_str("\nFAILURES TO FIX:\n");
    for (i, failure) in failures.iter().enumerate() {
        out.push_str(&match &failure.detail {
            Some(detail) => format!("{}. {}: {}\n", i + 1, failure.rule, detail),
            None => format!("{}. {}\n", i + 1, failure.rule),
        });
    }

    let draft = head_chars(current_text.trim(), config.repair_draft_chars);
    out.push_str(&format!("\nDRAFT:\n\"{}\"\n", draft));

    out.push_str("\nOutput ONLY the corrected text, with no commentary.");
    out
}
