//! DebateTier Core Library
//!
//! Decides how each debate turn is generated (stage, strictness, tier and
//! budget), what its text must satisfy, how a failed draft is repaired, and
//! how a structured topic analysis is recovered from free-form model output.

pub mod analysis;
pub mod budget;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod recover;
pub mod repair;
pub mod runner;
pub mod stage;
pub mod strictness;
pub mod tier;
pub mod turn;
pub mod validate;

pub use analysis::{AnalysisResult, AnalysisSection, SECTION_IDS};
pub use budget::{Budget, BudgetFlags, TierBudget, budget_for_stage, select_tier};
pub use client::{ClientConfig, GenerationClient, GenerationRequest, OpenAiClient};
pub use config::RoutingConfig;
pub use contract::{ContractOverrides, ValidatorContract};
pub use error::DebateError;
pub use recover::{RecoveryInput, recover};
pub use repair::RepairFailure;
pub use runner::{TurnEvent, TurnOutcome, TurnRequest, TurnRunner};
pub use stage::StageKey;
pub use tier::{Tier, TierOverrides, should_upgrade_immediately};
pub use turn::{GenerationContext, RoleType, TurnDescriptor};
