//! Routing configuration: the read-only tables every component consults.
//!
//! A `RoutingConfig` is built once (from defaults or a TOML file) and passed
//! by reference into the classifier, scorer, selector and builders. Nothing
//! in this crate keeps a global copy, so tests can hand in alternate tables.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::DebateError;
use crate::stage::StageKey;
use crate::tier::Tier;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub tiers: TierConfig,
    pub stages: StageCeilings,
    pub budget: BudgetConfig,
    pub strictness: StrictnessConfig,
    pub contract: ContractConfig,
}

/// Model identifiers and sampling temperatures per tier.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub cheap_model: String,
    pub mid_model: String,
    pub expensive_model: String,
    pub cheap_temperature: f32,
    pub mid_temperature: f32,
    pub expensive_temperature: f32,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            cheap_model: "tier-cheap".to_string(),
            mid_model: "tier-mid".to_string(),
            expensive_model: "tier-expensive".to_string(),
            cheap_temperature: 0.85,
            mid_temperature: 0.7,
            expensive_temperature: 0.55,
        }
    }
}

impl TierConfig {
    /// Default model identifier for a tier.
    pub fn model(&self, tier: Tier) -> &str {
        match tier {
            Tier::Cheap => &self.cheap_model,
            Tier::Mid => &self.mid_model,
            Tier::Expensive => &self.expensive_model,
        }
    }

    pub fn temperature(&self, tier: Tier) -> f32 {
        match tier {
            Tier::Cheap => self.cheap_temperature,
            Tier::Mid => self.mid_temperature,
            Tier::Expensive => self.expensive_temperature,
        }
    }
}

/// Token ceiling per stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageCeilings {
    pub chair_procedural: u32,
    pub interjection: u32,
    pub opening_statement: u32,
    pub rebuttal: u32,
    pub closing: u32,
    pub transition: u32,
    pub definition_request: u32,
}

impl Default for StageCeilings {
    fn default() -> Self {
        Self {
            chair_procedural: 180,
            interjection: 160,
            opening_statement: 520,
            rebuttal: 480,
            closing: 700,
            transition: 160,
            definition_request: 260,
        }
    }
}

impl StageCeilings {
    pub fn ceiling(&self, stage: StageKey) -> u32 {
        match stage {
            StageKey::ChairProcedural => self.chair_procedural,
            StageKey::Interjection => self.interjection,
            StageKey::OpeningStatement => self.opening_statement,
            StageKey::Rebuttal => self.rebuttal,
            StageKey::Closing => self.closing,
            StageKey::Transition => self.transition,
            StageKey::DefinitionRequest => self.definition_request,
        }
    }
}

/// Caps and fixed temperatures applied on top of the stage/tier tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Ceiling for turns that must be exactly N sentences long.
    pub exact_sentence_cap: u32,
    /// Temperature used when the turn carries compliance risk.
    pub compliance_temperature: f32,
    /// Token budget for the standalone topic analysis request.
    pub analysis_max_tokens: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            exact_sentence_cap: 220,
            compliance_temperature: 0.3,
            analysis_max_tokens: 3000,
        }
    }
}

/// Strictness weights, signal thresholds and tier bands.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrictnessConfig {
    pub exact_sentence_weight: u8,
    pub must_hook_weight: u8,
    pub banlist_weight: u8,
    pub long_context_weight: u8,
    pub final_quality_weight: u8,
    pub max_score: u8,
    /// Banlist size at which a turn counts as heavily constrained.
    pub banlist_threshold: usize,
    /// Recent-turn count above which context is "long".
    pub long_context_turns: usize,
    /// Recent-turn count above which context is "medium".
    pub medium_context_turns: usize,
    /// Lowest score routed to the expensive tier.
    pub expensive_band: u8,
    /// Lowest score routed to the mid tier.
    pub mid_band: u8,
}

impl Default for StrictnessConfig {
    fn default() -> Self {
        Self {
            exact_sentence_weight: 3,
            must_hook_weight: 2,
            banlist_weight: 2,
            long_context_weight: 2,
            final_quality_weight: 1,
            max_score: 10,
            banlist_threshold: 20,
            long_context_turns: 12,
            medium_context_turns: 6,
            expensive_band: 8,
            mid_band: 5,
        }
    }
}

/// Defaults and truncation limits for validator contracts and repair prompts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub opponent_line_chars: usize,
    pub repair_opponent_chars: usize,
    pub repair_draft_chars: usize,
    pub max_questions: u32,
    pub chair_min_sentences: u32,
    pub chair_max_sentences: u32,
    pub min_sentences: u32,
    pub max_sentences: u32,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            opponent_line_chars: 600,
            repair_opponent_chars: 400,
            repair_draft_chars: 800,
            max_questions: 1,
            chair_min_sentences: 1,
            chair_max_sentences: 2,
            min_sentences: 1,
            max_sentences: 6,
        }
    }
}

impl RoutingConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Reject tables that would break the selector's ordering assumptions.
    fn check(&self) -> Result<(), DebateError> {
        let s = &self.strictness;
        if s.max_score > 10 {
            return Err(DebateError::ConfigError(format!(
                "max_score must be at most 10, got {}",
                s.max_score
            )));
        }
        if s.mid_band > s.expensive_band {
            return Err(DebateError::ConfigError(format!(
                "mid_band ({}) must not exceed expensive_band ({})",
                s.mid_band, s.expensive_band
            )));
        }
        if s.medium_context_turns > s.long_context_turns {
            return Err(DebateError::ConfigError(format!(
                "medium_context_turns ({}) must not exceed long_context_turns ({})",
                s.medium_context_turns, s.long_context_turns
            )));
        }
        for (name, t) in [
            ("cheap_temperature", self.tiers.cheap_temperature),
            ("mid_temperature", self.tiers.mid_temperature),
            ("expensive_temperature", self.tiers.expensive_temperature),
            ("compliance_temperature", self.budget.compliance_temperature),
        ] {
            if !(0.0..=1.0).contains(&t) {
                return Err(DebateError::ConfigError(format!(
                    "{} must be within [0, 1], got {}",
                    name, t
                )));
            }
        }
        Ok(())
    }
}
