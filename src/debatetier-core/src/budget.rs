//! Token and temperature budgets, and the top-level tier selection call.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RoutingConfig;
use crate::stage::{self, StageKey};
use crate::strictness::{self, StrictnessSignals};
use crate::tier::{self, Tier, TierOverrides};
use crate::turn::{GenerationContext, TurnDescriptor};

/// Token ceiling and sampling temperature for one call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Everything the caller needs to issue a turn's generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TierBudget {
    /// Model identifier to call.
    pub model: String,
    pub tier: Tier,
    pub max_tokens: u32,
    pub temperature: f32,
    pub strictness: u8,
    pub stage: StageKey,
    /// Cheaper attempts should be skipped for this turn.
    pub upgrade_immediately: bool,
}

impl TierBudget {
    pub fn budget(&self) -> Budget {
        Budget {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Flags for callers that budget without a full turn/context pair.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetFlags {
    pub exact_sentence_required: bool,
    pub banlist_size: usize,
    /// The turn's subtype forces the expensive tier (`judge_verdict`, `closingChair`).
    pub escalated: bool,
}

impl BudgetFlags {
    pub fn for_turn(turn: &TurnDescriptor, ctx: &GenerationContext) -> Self {
        Self {
            exact_sentence_required: turn.requires_exact_sentence(),
            banlist_size: ctx.banlist_size,
            escalated: tier::is_escalated_sub_type(&turn.role_sub_type),
        }
    }
}

/// Budget for a stage/tier pair. The exact-sentence cap only ever lowers
/// the stage ceiling.
pub fn compute(
    stage: StageKey,
    exact_sentence_required: bool,
    tier: Tier,
    banlist_size: usize,
    config: &RoutingConfig,
) -> Budget {
    let ceiling = config.stages.ceiling(stage);
    let max_tokens = if exact_sentence_required {
        ceiling.min(config.budget.exact_sentence_cap)
    } else {
        ceiling
    };

    let temperature =
        if exact_sentence_required || banlist_size >= config.strictness.banlist_threshold {
            config.budget.compliance_temperature
        } else {
            config.tiers.temperature(tier)
        };

    Budget {
        max_tokens,
        temperature,
    }
}

/// Budget from stage and strictness alone. Uses the same tables and the
/// same tier rules as [`select_tier`], with subtype escalation carried in
/// `flags.escalated`.
pub fn budget_for_stage(
    stage: StageKey,
    strictness: u8,
    flags: BudgetFlags,
    config: &RoutingConfig,
) -> Budget {
    let tier = tier::select_escalated(stage, flags.escalated, strictness, &config.strictness);
    compute(
        stage,
        flags.exact_sentence_required,
        tier,
        flags.banlist_size,
        config,
    )
}

/// Classify, score, pick a tier and size the budget for one turn.
pub fn select_tier(
    turn: &TurnDescriptor,
    ctx: &GenerationContext,
    overrides: &TierOverrides,
    config: &RoutingConfig,
) -> TierBudget {
    let stage = stage::classify(turn);
    let signals = StrictnessSignals::derive(turn, ctx, &config.strictness);
    let strictness = strictness::score(&signals, &config.strictness);
    let sub = Some(turn.role_sub_type.as_str());
    let tier = tier::select(stage, sub, strictness, &config.strictness);
    let upgrade_immediately =
        tier::should_upgrade_immediately(stage, sub, strictness, &config.strictness);
    let budget = compute(
        stage,
        signals.exact_sentence_required,
        tier,
        ctx.banlist_size,
        config,
    );
    let model = overrides.resolve(tier, &config.tiers).to_string();

    debug!(
        role = turn.role_type.display_name(),
        sub_type = %turn.role_sub_type,
        %stage,
        strictness,
        %tier,
        model = %model,
        max_tokens = budget.max_tokens,
        temperature = budget.temperature,
        "selected generation tier"
    );

    TierBudget {
        model,
        tier,
        max_tokens: budget.max_tokens,
        temperature: budget.temperature,
        strictness,
        stage,
        upgrade_immediately,
    }
}
