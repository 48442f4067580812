//! Stage classification.
//!
//! Every turn falls into exactly one stage. The stage picks the token
//! ceiling and, for procedural stages, allows the cheap tier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::turn::{RoleType, TurnDescriptor};

/// Coarse category of a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKey {
    ChairProcedural,
    Interjection,
    OpeningStatement,
    Rebuttal,
    Closing,
    Transition,
    DefinitionRequest,
}

impl StageKey {
    pub const ALL: [StageKey; 7] = [
        StageKey::ChairProcedural,
        StageKey::Interjection,
        StageKey::OpeningStatement,
        StageKey::Rebuttal,
        StageKey::Closing,
        StageKey::Transition,
        StageKey::DefinitionRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKey::ChairProcedural => "chair_procedural",
            StageKey::Interjection => "interjection",
            StageKey::OpeningStatement => "opening_statement",
            StageKey::Rebuttal => "rebuttal",
            StageKey::Closing => "closing",
            StageKey::Transition => "transition",
            StageKey::DefinitionRequest => "definition_request",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Stages light enough to run on the cheap tier.
    pub fn is_procedural(&self) -> bool {
        matches!(
            self,
            StageKey::Transition | StageKey::DefinitionRequest | StageKey::ChairProcedural
        )
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a turn to its stage. First match wins:
/// chair role, interjection, `*_statement`, `*_rebuttal`, `*_summary`,
/// then rebuttal as the fallback.
pub fn classify(turn: &TurnDescriptor) -> StageKey {
    let sub = turn.role_sub_type.as_str();
    match turn.role_type {
        RoleType::Chair => StageKey::ChairProcedural,
        _ if sub == "interjection" => StageKey::Interjection,
        _ if sub.ends_with("_statement") => StageKey::OpeningStatement,
        _ if sub.ends_with("_rebuttal") => StageKey::Rebuttal,
        _ if sub.ends_with("_summary") => StageKey::Closing,
        _ => StageKey::Rebuttal,
    }
}
