//! Strictness scoring.
//!
//! A 0..=max_score estimate of how likely a turn is to break its output
//! contract. Each signal adds a configured weight; the sum is clamped.

use serde::{Deserialize, Serialize};

use crate::config::StrictnessConfig;
use crate::turn::{ContextLength, GenerationContext, QualityMode, TurnDescriptor};

/// Signals the score is built from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StrictnessSignals {
    pub exact_sentence_required: bool,
    pub must_hook: bool,
    pub banlist_size: usize,
    pub context_length: ContextLength,
    pub quality_mode: QualityMode,
}

impl StrictnessSignals {
    pub fn derive(turn: &TurnDescriptor, ctx: &GenerationContext, config: &StrictnessConfig) -> Self {
        Self {
            exact_sentence_required: turn.requires_exact_sentence(),
            must_hook: turn.is_hook_family(),
            banlist_size: ctx.banlist_size,
            context_length: ctx.context_length(config),
            quality_mode: ctx.quality_mode(),
        }
    }
}

/// Weighted sum of the active signals, clamped to `max_score`.
pub fn score(signals: &StrictnessSignals, config: &StrictnessConfig) -> u8 {
    let mut total: u32 = 0;
    if signals.exact_sentence_required {
        total += u32::from(config.exact_sentence_weight);
    }
    if signals.must_hook {
        total += u32::from(config.must_hook_weight);
    }
    if signals.banlist_size >= config.banlist_threshold {
        total += u32::from(config.banlist_weight);
    }
    if signals.context_length == ContextLength::Long {
        total += u32::from(config.long_context_weight);
    }
    if signals.quality_mode == QualityMode::Final {
        total += u32::from(config.final_quality_weight);
    }
    total.min(u32::from(config.max_score)) as u8
}

/// Score a turn directly from its descriptor and context.
pub fn score_turn(turn: &TurnDescriptor, ctx: &GenerationContext, config: &StrictnessConfig) -> u8 {
    score(&StrictnessSignals::derive(turn, ctx, config), config)
}
