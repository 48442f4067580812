//! Turn runner.
//!
//! Ties the decision core to a [`GenerationClient`]: pick the tier, generate
//! once, validate, and if needed issue exactly one repair round. Whatever
//! the repair produces is returned with its remaining failures; deciding
//! whether to accept a still-failing turn is left to the caller.

use tracing::{info, warn};

use crate::analysis::{self, AnalysisResult};
use crate::budget::{self, Budget, TierBudget};
use crate::client::{GenerationClient, GenerationRequest};
use crate::config::RoutingConfig;
use crate::contract::{self, ContractOverrides, ValidatorContract};
use crate::error::DebateError;
use crate::recover::{self, RecoveryInput};
use crate::repair::{self, RepairFailure};
use crate::tier::{Tier, TierOverrides};
use crate::turn::{GenerationContext, TurnDescriptor};
use crate::validate;

/// Everything needed to generate one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub turn: TurnDescriptor,
    pub context: GenerationContext,
    pub system_prompt: String,
    pub user_prompt: String,
    pub tier_overrides: TierOverrides,
    pub contract_overrides: ContractOverrides,
}

impl TurnRequest {
    pub fn new(
        turn: TurnDescriptor,
        context: GenerationContext,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            turn,
            context,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            tier_overrides: TierOverrides::default(),
            contract_overrides: ContractOverrides::default(),
        }
    }

    pub fn with_tier_overrides(mut self, overrides: TierOverrides) -> Self {
        self.tier_overrides = overrides;
        self
    }

    pub fn with_contract_overrides(mut self, overrides: ContractOverrides) -> Self {
        self.contract_overrides = overrides;
        self
    }
}

/// Result of one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub budget: TierBudget,
    pub contract: ValidatorContract,
    /// A repair round was issued.
    pub repaired: bool,
    /// Failures left in `text`; empty when the turn passed.
    pub failures: Vec<RepairFailure>,
}

impl TurnOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Callback for turn events.
pub type TurnCallback = Box<dyn Fn(TurnEvent) + Send + Sync>;

/// Events emitted while a turn is produced.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// The tier and budget were chosen.
    TierSelected { budget: TierBudget },
    /// The first draft failed validation and a repair round is starting.
    RepairStarted { failures: Vec<RepairFailure> },
    /// The turn is finished.
    TurnFinished { passed: bool, repaired: bool },
}

/// Generates turns and analyses through a [`GenerationClient`].
pub struct TurnRunner<C> {
    client: C,
    config: RoutingConfig,
    callback: Option<TurnCallback>,
}

impl<C: GenerationClient> TurnRunner<C> {
    pub fn new(client: C, config: RoutingConfig) -> Self {
        Self {
            client,
            config,
            callback: None,
        }
    }

    /// Set a callback for turn events.
    pub fn with_callback(mut self, callback: TurnCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Generate one turn, with at most one repair round.
    pub async fn run_turn(&self, request: &TurnRequest) -> Result<TurnOutcome, DebateError> {
        let budget = budget::select_tier(
            &request.turn,
            &request.context,
            &request.tier_overrides,
            &self.config,
        );
        if budget.upgrade_immediately {
            info!(stage = %budget.stage, strictness = budget.strictness, "skipping straight to expensive tier");
        }
        self.emit_event(TurnEvent::TierSelected {
            budget: budget.clone(),
        });

        let contract = contract::build(
            &request.turn,
            &request.context,
            &request.contract_overrides,
            &self.config.contract,
        );

        let draft = self
            .generate(&budget.model, budget.budget(), &request.system_prompt, &request.user_prompt)
            .await?;
        if draft.is_empty() {
            return Err(DebateError::EmptyResponse {
                model: budget.model.clone(),
            });
        }

        let failures = validate::validate(&draft, &contract);
        if failures.is_empty() {
            self.emit_event(TurnEvent::TurnFinished {
                passed: true,
                repaired: false,
            });
            return Ok(TurnOutcome {
                text: draft,
                budget,
                contract,
                repaired: false,
                failures,
            });
        }

        info!(
            failures = failures.len(),
            sub_type = %request.turn.role_sub_type,
            "draft failed validation, issuing repair round"
        );
        self.emit_event(TurnEvent::RepairStarted {
            failures: failures.clone(),
        });

        let opponent_line = contract.opponent_line.as_deref().unwrap_or("");
        let repair_prompt = repair::build_prompt(
            &contract,
            opponent_line,
            &failures,
            &draft,
            &self.config.contract,
        );
        let repaired_text = self
            .generate(&budget.model, budget.budget(), &request.system_prompt, &repair_prompt)
            .await?;

        let (text, failures) = if repaired_text.is_empty() {
            warn!("repair round returned nothing, keeping the first draft");
            (draft, failures)
        } else {
            let remaining = validate::validate(&repaired_text, &contract);
            (repaired_text, remaining)
        };

        if !failures.is_empty() {
            warn!(
                rules = ?failures.iter().map(|f| f.rule.as_str()).collect::<Vec<_>>(),
                "turn still fails validation after repair"
            );
        }
        self.emit_event(TurnEvent::TurnFinished {
            passed: failures.is_empty(),
            repaired: true,
        });

        Ok(TurnOutcome {
            text,
            budget,
            contract,
            repaired: true,
            failures,
        })
    }

    /// Request a topic analysis on the expensive tier and recover it.
    pub async fn run_analysis(
        &self,
        topic: &str,
        overrides: &TierOverrides,
    ) -> Result<AnalysisResult, DebateError> {
        let model = overrides.resolve(Tier::Expensive, &self.config.tiers).to_string();
        let budget = Budget {
            max_tokens: self.config.budget.analysis_max_tokens,
            temperature: self.config.tiers.temperature(Tier::Expensive),
        };
        let request = GenerationRequest {
            model: model.clone(),
            budget,
            system: analysis::system_prompt(),
            user: analysis::user_prompt(topic),
        };

        let raw = self.client.complete(request).await?;
        let result = recover::recover(
            RecoveryInput {
                topic,
                raw_model_text: &raw,
                model_used: Some(&model),
            },
            &self.config.tiers,
        )?;
        info!(%model, title = %result.title, "analysis recovered");
        Ok(result)
    }

    async fn generate(
        &self,
        model: &str,
        budget: Budget,
        system: &str,
        user: &str,
    ) -> Result<String, DebateError> {
        let raw = self
            .client
            .complete(GenerationRequest {
                model: model.to_string(),
                budget,
                system: system.to_string(),
                user: user.to_string(),
            })
            .await?;
        Ok(validate::sanitize_response(&raw))
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: TurnEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::RoleType;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned responses and records every request.
    #[derive(Clone, Default)]
    struct ScriptedClient {
        responses: Arc<Mutex<VecDeque<String>>>,
        requests: Arc<Mutex<Vec<GenerationRequest>>>,
    }

    impl ScriptedClient {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Arc::new(Mutex::new(
                    responses.iter().map(|s| s.to_string()).collect(),
                )),
                requests: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn complete(&self, request: GenerationRequest) -> Result<String, DebateError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn rebuttal_request() -> TurnRequest {
        TurnRequest::new(
            TurnDescriptor::new(RoleType::Debater, "con_rebuttal"),
            GenerationContext {
                previous_opponent_text: "Rent control protects tenants.".to_string(),
                ..GenerationContext::default()
            },
            "You argue against the motion.",
            "Give your rebuttal.",
        )
    }

    #[tokio::test]
    async fn test_clean_draft_needs_no_repair() {
        let client = ScriptedClient::new(&["Rent control shrinks supply. Tenants pay later."]);
        let runner = TurnRunner::new(client.clone(), RoutingConfig::default());
        let outcome = runner.run_turn(&rebuttal_request()).await.unwrap();

        assert!(outcome.passed());
        assert!(!outcome.repaired);
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, outcome.budget.model);
        assert_eq!(requests[0].budget, outcome.budget.budget());
    }

    #[tokio::test]
    async fn test_single_repair_round() {
        let client = ScriptedClient::new(&[
            "<thinking>plan</thinking>Let me change the subject. Housing is complex.",
            "Rent control sounds kind to tenants. It shrinks supply.",
        ]);
        let runner = TurnRunner::new(client.clone(), RoutingConfig::default());
        let outcome = runner.run_turn(&rebuttal_request()).await.unwrap();

        assert!(outcome.repaired);
        assert!(outcome.passed(), "{:?}", outcome.failures);
        assert_eq!(outcome.text, "Rent control sounds kind to tenants. It shrinks supply.");

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].user.contains("FAILURES TO FIX:"));
        assert!(requests[1].user.contains("1. hook"));
        assert!(requests[1].user.contains("\"Let me change the subject. Housing is complex.\""));
    }

    #[tokio::test]
    async fn test_asterisk_aside_is_repaired() {
        let client = ScriptedClient::new(&[
            "*leans in* Rent control hurts tenants.",
            "Rent control hurts tenants.",
        ]);
        let runner = TurnRunner::new(client.clone(), RoutingConfig::default());
        let outcome = runner.run_turn(&rebuttal_request()).await.unwrap();

        assert!(outcome.repaired);
        assert!(outcome.passed(), "{:?}", outcome.failures);
        assert_eq!(outcome.text, "Rent control hurts tenants.");

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].user.contains("1. no_stage_directions: *leans in*"));
        assert!(requests[1].user.contains("\"*leans in* Rent control hurts tenants.\""));
    }

    #[tokio::test]
    async fn test_never_repairs_twice() {
        let client = ScriptedClient::new(&[
            "Off topic. Completely.",
            "Still off topic. Again.",
            "Never requested.",
        ]);
        let runner = TurnRunner::new(client.clone(), RoutingConfig::default());
        let outcome = runner.run_turn(&rebuttal_request()).await.unwrap();

        assert!(outcome.repaired);
        assert!(!outcome.passed());
        assert_eq!(outcome.failures[0].rule, "hook");
        assert_eq!(outcome.text, "Still off topic. Again.");
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_repair_keeps_draft() {
        let client = ScriptedClient::new(&["Off topic. Completely.", "<think>nothing</think>"]);
        let runner = TurnRunner::new(client, RoutingConfig::default());
        let outcome = runner.run_turn(&rebuttal_request()).await.unwrap();
        assert_eq!(outcome.text, "Off topic. Completely.");
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_draft_is_error() {
        let client = ScriptedClient::new(&["   "]);
        let runner = TurnRunner::new(client, RoutingConfig::default());
        let result = runner.run_turn(&rebuttal_request()).await;
        assert!(matches!(result, Err(DebateError::EmptyResponse { .. })));
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let client = ScriptedClient::new(&["Off topic. Completely.", "Rent control hurts tenants."]);
        let runner = TurnRunner::new(client, RoutingConfig::default()).with_callback(Box::new(
            move |event: TurnEvent| {
                let name = match event {
                    TurnEvent::TierSelected { .. } => "tier",
                    TurnEvent::RepairStarted { .. } => "repair",
                    TurnEvent::TurnFinished { .. } => "finished",
                };
                sink.lock().unwrap().push(name);
            },
        ));
        runner.run_turn(&rebuttal_request()).await.unwrap();
        assert_eq!(*events.lock().unwrap(), vec!["tier", "repair", "finished"]);
    }

    #[tokio::test]
    async fn test_analysis_uses_expensive_tier() {
        let client = ScriptedClient::new(&[
            "```json\n{\"title\":\"Rent\",\"sections\":[{\"id\":\"clashes\",\"items\":[{\"pro\":\"a\",\"con\":\"b\",\"crux\":\"c\"}]},]}\n```",
        ]);
        let runner = TurnRunner::new(client.clone(), RoutingConfig::default());
        let result = runner
            .run_analysis("Rent control", &TierOverrides::default())
            .await
            .unwrap();

        assert_eq!(result.title, "Rent");
        assert_eq!(result.topic, "Rent control");
        assert_eq!(result.sections.len(), 10);
        assert_eq!(result.section("clashes").unwrap().items.len(), 1);
        assert_eq!(result.meta["model"], serde_json::json!("tier-expensive"));

        let requests = client.requests();
        assert_eq!(requests[0].model, "tier-expensive");
        assert_eq!(requests[0].budget.max_tokens, 3000);
        assert!(requests[0].system.contains("exactly ONE JSON object"));
    }

    #[tokio::test]
    async fn test_analysis_garbage_is_malformed() {
        let client = ScriptedClient::new(&["I cannot help with that."]);
        let runner = TurnRunner::new(client, RoutingConfig::default());
        let result = runner.run_analysis("Rent control", &TierOverrides::default()).await;
        assert!(matches!(result, Err(DebateError::MalformedResponse(_))));
    }
}
