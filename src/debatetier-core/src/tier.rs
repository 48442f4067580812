//! Generation tier selection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{StrictnessConfig, TierConfig};
use crate::stage::StageKey;

/// Cost/quality level of a generation call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cheap,
    Mid,
    Expensive,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Cheap => "cheap",
            Tier::Mid => "mid",
            Tier::Expensive => "expensive",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call replacements for the configured tier identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierOverrides {
    pub cheap: Option<String>,
    pub mid: Option<String>,
    pub expensive: Option<String>,
}

impl TierOverrides {
    /// Model identifier for a tier, falling back to the configured one.
    pub fn resolve<'a>(&'a self, tier: Tier, tiers: &'a TierConfig) -> &'a str {
        let chosen = match tier {
            Tier::Cheap => self.cheap.as_deref(),
            Tier::Mid => self.mid.as_deref(),
            Tier::Expensive => self.expensive.as_deref(),
        };
        chosen.unwrap_or_else(|| tiers.model(tier))
    }
}

/// Subtypes that always run on the expensive tier, whatever their score.
pub fn is_escalated_sub_type(role_sub_type: &str) -> bool {
    matches!(role_sub_type, "judge_verdict" | "closingChair")
}

fn is_escalated(stage: StageKey, sub_type_escalated: bool) -> bool {
    sub_type_escalated || stage == StageKey::Closing
}

/// True when the caller should skip cheaper attempts and go straight to
/// the expensive tier.
pub fn should_upgrade_immediately(
    stage: StageKey,
    role_sub_type: Option<&str>,
    strictness: u8,
    config: &StrictnessConfig,
) -> bool {
    let escalated = role_sub_type.is_some_and(is_escalated_sub_type);
    is_escalated(stage, escalated) || strictness >= config.expensive_band
}

/// Pick a tier: escalation overrides first, then strictness bands.
/// The cheap tier is only reachable from procedural stages.
pub fn select(
    stage: StageKey,
    role_sub_type: Option<&str>,
    strictness: u8,
    config: &StrictnessConfig,
) -> Tier {
    let escalated = role_sub_type.is_some_and(is_escalated_sub_type);
    select_escalated(stage, escalated, strictness, config)
}

/// Same as [`select`] for callers that only know whether the subtype
/// escalates, not the subtype itself.
pub fn select_escalated(
    stage: StageKey,
    sub_type_escalated: bool,
    strictness: u8,
    config: &StrictnessConfig,
) -> Tier {
    if is_escalated(stage, sub_type_escalated) || strictness >= config.expensive_band {
        Tier::Expensive
    } else if strictness >= config.mid_band {
        Tier::Mid
    } else if stage.is_procedural() {
        Tier::Cheap
    } else {
        Tier::Mid
    }
}
