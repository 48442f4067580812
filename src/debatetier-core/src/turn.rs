//! Turn descriptors and the conversational context around a turn.

use serde::{Deserialize, Serialize};

use crate::config::StrictnessConfig;

/// Role of the speaker producing a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// Moderates the debate and handles procedure.
    Chair,
    /// Argues one side of the motion.
    Debater,
    /// Delivers verdicts and scoring.
    Judge,
}

impl RoleType {
    pub fn display_name(&self) -> &str {
        match self {
            RoleType::Chair => "chair",
            RoleType::Debater => "debater",
            RoleType::Judge => "judge",
        }
    }

    /// Parse a role name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "chair" => Some(RoleType::Chair),
            "debater" => Some(RoleType::Debater),
            "judge" => Some(RoleType::Judge),
            _ => None,
        }
    }
}

/// Who speaks and in what capacity. Supplied per turn, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TurnDescriptor {
    pub role_type: RoleType,
    /// Free-form tag such as "pro_rebuttal", "judge_verdict" or "closingChair".
    pub role_sub_type: String,
}

impl TurnDescriptor {
    pub fn new(role_type: RoleType, role_sub_type: impl Into<String>) -> Self {
        Self {
            role_type,
            role_sub_type: role_sub_type.into(),
        }
    }

    /// Interjections and the chair's closing must be exactly one sentence.
    pub fn requires_exact_sentence(&self) -> bool {
        matches!(self.role_sub_type.as_str(), "interjection" | "closingChair")
    }

    /// Rebuttals, summaries and statements answer the opponent's last line.
    pub fn is_hook_family(&self) -> bool {
        let sub = self.role_sub_type.as_str();
        sub.ends_with("rebuttal") || sub.ends_with("summary") || sub.ends_with("statement")
    }
}

/// Presentation quality the caller is producing for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    Show,
    Final,
    Draft,
}

/// Coarse length of the recent conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContextLength {
    Short,
    Medium,
    Long,
}

/// Flags describing the state around the turn being generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub stream_mode: bool,
    pub detail_mode: bool,
    /// Number of words currently forbidden to the speaker.
    pub banlist_size: usize,
    pub recent_turns_count: usize,
    /// What the opponent said last; may be empty.
    pub previous_opponent_text: String,
}

impl GenerationContext {
    /// Detail mode is the polished output; streaming without detail is
    /// the live show; anything else is a draft.
    pub fn quality_mode(&self) -> QualityMode {
        if self.detail_mode {
            QualityMode::Final
        } else if self.stream_mode {
            QualityMode::Show
        } else {
            QualityMode::Draft
        }
    }

    pub fn context_length(&self, config: &StrictnessConfig) -> ContextLength {
        if self.recent_turns_count > config.long_context_turns {
            ContextLength::Long
        } else if self.recent_turns_count > config.medium_context_turns {
            ContextLength::Medium
        } else {
            ContextLength::Short
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_sentence_subtypes() {
        assert!(TurnDescriptor::new(RoleType::Debater, "interjection").requires_exact_sentence());
        assert!(TurnDescriptor::new(RoleType::Chair, "closingChair").requires_exact_sentence());
        assert!(!TurnDescriptor::new(RoleType::Debater, "pro_rebuttal").requires_exact_sentence());
    }

    #[test]
    fn test_hook_family() {
        for sub in ["pro_rebuttal", "con_summary", "pro_statement"] {
            assert!(TurnDescriptor::new(RoleType::Debater, sub).is_hook_family(), "{}", sub);
        }
        for sub in ["interjection", "closingChair", "judge_verdict"] {
            assert!(!TurnDescriptor::new(RoleType::Debater, sub).is_hook_family(), "{}", sub);
        }
    }

    #[test]
    fn test_context_length_thresholds() {
        let config = StrictnessConfig::default();
        let mut ctx = GenerationContext::default();
        ctx.recent_turns_count = 6;
        assert_eq!(ctx.context_length(&config), ContextLength::Short);
        ctx.recent_turns_count = 7;
        assert_eq!(ctx.context_length(&config), ContextLength::Medium);
        ctx.recent_turns_count = 12;
        assert_eq!(ctx.context_length(&config), ContextLength::Medium);
        ctx.recent_turns_count = 13;
        assert_eq!(ctx.context_length(&config), ContextLength::Long);
    }

    #[test]
    fn test_quality_mode() {
        let mut ctx = GenerationContext::default();
        assert_eq!(ctx.quality_mode(), QualityMode::Draft);
        ctx.stream_mode = true;
        assert_eq!(ctx.quality_mode(), QualityMode::Show);
        ctx.detail_mode = true;
        assert_eq!(ctx.quality_mode(), QualityMode::Final);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(RoleType::parse("Chair"), Some(RoleType::Chair));
        assert_eq!(RoleType::parse("debater"), Some(RoleType::Debater));
        assert_eq!(RoleType::parse("audience"), None);
    }
}
