//! DebateTier CLI
//!
//! Inspect tier routing and validator contracts for debate turns, generate
//! single turns, and request or recover structured topic analyses.

use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use debatetier_core::{
    AnalysisResult, ClientConfig, ContractOverrides, GenerationContext, OpenAiClient,
    RecoveryInput, RoleType, RoutingConfig, TierBudget, TierOverrides, TurnDescriptor, TurnEvent,
    TurnRequest, TurnRunner, contract, recover, select_tier,
};
use std::env;
use std::fs;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "debatetier",
    version,
    about = "Tier routing, contracts and analysis recovery for AI debate turns",
    long_about = "A CLI for choosing generation tiers and budgets for debate turns, checking their output contracts, and recovering structured topic analyses from OpenAI-compatible APIs."
)]
struct Cli {
    /// Routing configuration file (TOML); built-in tables when omitted
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the tier and budget chosen for a turn
    Route {
        #[command(flatten)]
        turn: TurnArgs,
        #[command(flatten)]
        tiers: TierArgs,
    },
    /// Show the validator contract for a turn
    Contract {
        #[command(flatten)]
        turn: TurnArgs,
        #[command(flatten)]
        bans: BanArgs,
    },
    /// Generate one turn, with at most one repair round
    Turn {
        #[command(flatten)]
        turn: TurnArgs,
        #[command(flatten)]
        tiers: TierArgs,
        #[command(flatten)]
        bans: BanArgs,
        /// System prompt for the speaker
        #[arg(long, value_name = "TEXT")]
        system: String,
        /// Instruction for this turn
        #[arg(long, value_name = "TEXT")]
        prompt: String,
    },
    /// Request a ten-section analysis of a motion
    Analyze {
        /// The motion to analyze
        #[arg(value_name = "TOPIC")]
        topic: String,
        #[command(flatten)]
        tiers: TierArgs,
    },
    /// Recover an analysis from a file of raw model output
    Recover {
        /// File holding the raw model text
        #[arg(value_name = "FILE")]
        file: String,
        /// The motion the analysis was requested for
        #[arg(long, value_name = "TOPIC")]
        topic: String,
        /// Model that produced the text
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,
    },
}

#[derive(Args)]
struct TurnArgs {
    /// Speaker role: chair, debater or judge
    #[arg(long, default_value = "debater", value_name = "ROLE")]
    role: String,
    /// Role subtype, e.g. pro_rebuttal, interjection, judge_verdict
    #[arg(long, value_name = "SUBTYPE")]
    sub_type: String,
    /// Output is streamed live
    #[arg(long)]
    stream: bool,
    /// Output is the polished detail view
    #[arg(long)]
    detail: bool,
    /// Number of words currently banned for the speaker
    #[arg(long, default_value = "0", value_name = "N")]
    banlist_size: usize,
    /// Number of recent turns in context
    #[arg(long, default_value = "0", value_name = "N")]
    recent_turns: usize,
    /// What the opponent said last
    #[arg(long, default_value = "", value_name = "TEXT")]
    opponent: String,
}

impl TurnArgs {
    fn descriptor(&self) -> Result<TurnDescriptor, String> {
        let role = RoleType::parse(&self.role).ok_or_else(|| {
            format!(
                "Unknown role: '{}'. Available roles: chair, debater, judge",
                self.role
            )
        })?;
        Ok(TurnDescriptor::new(role, self.sub_type.clone()))
    }

    fn context(&self) -> GenerationContext {
        GenerationContext {
            stream_mode: self.stream,
            detail_mode: self.detail,
            banlist_size: self.banlist_size,
            recent_turns_count: self.recent_turns,
            previous_opponent_text: self.opponent.clone(),
        }
    }
}

#[derive(Args)]
struct TierArgs {
    /// Model id for the cheap tier
    #[arg(long, value_name = "MODEL")]
    cheap_model: Option<String>,
    /// Model id for the mid tier
    #[arg(long, value_name = "MODEL")]
    mid_model: Option<String>,
    /// Model id for the expensive tier
    #[arg(long, value_name = "MODEL")]
    expensive_model: Option<String>,
}

impl TierArgs {
    fn overrides(&self) -> TierOverrides {
        TierOverrides {
            cheap: self.cheap_model.clone(),
            mid: self.mid_model.clone(),
            expensive: self.expensive_model.clone(),
        }
    }
}

#[derive(Args)]
struct BanArgs {
    /// Phrase the turn must not contain (repeatable)
    #[arg(long = "forbid", action = ArgAction::Append, value_name = "PHRASE")]
    forbidden_phrases: Vec<String>,
    /// Word stem the turn must not use (repeatable)
    #[arg(long = "stem", action = ArgAction::Append, value_name = "STEM")]
    banned_stems: Vec<String>,
    /// Word banned for this speaker (repeatable)
    #[arg(long = "ban", action = ArgAction::Append, value_name = "WORD")]
    banned_words: Vec<String>,
}

impl BanArgs {
    fn overrides(&self) -> ContractOverrides {
        ContractOverrides {
            forbidden_phrases: self.forbidden_phrases.clone(),
            banned_stems: self.banned_stems.clone(),
            banned_words_speaker: self.banned_words.clone(),
            ..ContractOverrides::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            info!(%path, "loading routing config");
            RoutingConfig::load(path)?
        }
        None => RoutingConfig::default(),
    };

    match cli.command {
        Command::Route { turn, tiers } => {
            let budget = select_tier(&turn.descriptor()?, &turn.context(), &tiers.overrides(), &config);
            print_budget(&budget);
        }
        Command::Contract { turn, bans } => {
            let contract =
                contract::build(&turn.descriptor()?, &turn.context(), &bans.overrides(), &config.contract);
            println!("{}", serde_json::to_string_pretty(&contract)?);
        }
        Command::Turn {
            turn,
            tiers,
            bans,
            system,
            prompt,
        } => {
            let request = TurnRequest::new(turn.descriptor()?, turn.context(), system, prompt)
                .with_tier_overrides(tiers.overrides())
                .with_contract_overrides(bans.overrides());
            let runner = TurnRunner::new(OpenAiClient::new(&client_config())?, config)
                .with_callback(create_console_callback());

            let outcome = runner.run_turn(&request).await?;

            println!();
            for line in wrap_lines(&outcome.text, 66) {
                println!("  {}", line);
            }
            println!();
            if outcome.passed() {
                println!("{}", "  Turn passed its contract.".bright_green().bold());
            } else {
                println!("{}", "  Turn still breaks its contract:".yellow().bold());
                for failure in &outcome.failures {
                    match &failure.detail {
                        Some(detail) => println!("    - {}: {}", failure.rule, detail),
                        None => println!("    - {}", failure.rule),
                    }
                }
            }
        }
        Command::Analyze { topic, tiers } => {
            let runner = TurnRunner::new(OpenAiClient::new(&client_config())?, config);
            let result = runner.run_analysis(&topic, &tiers.overrides()).await?;
            print_analysis(&result);
        }
        Command::Recover { file, topic, model } => {
            let raw = fs::read_to_string(&file)
                .map_err(|e| format!("Failed to read '{}': {}", file, e))?;
            let result = recover(
                RecoveryInput {
                    topic: &topic,
                    raw_model_text: &raw,
                    model_used: model.as_deref(),
                },
                &config.tiers,
            )?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

/// API settings from the environment.
fn client_config() -> ClientConfig {
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    ClientConfig::new(api_base, api_key)
}

fn print_budget(budget: &TierBudget) {
    println!();
    println!("{}", "═".repeat(50).bright_blue());
    println!("  {} {}", "Stage:".bold(), budget.stage.to_string().bright_white());
    println!("  {} {}", "Strictness:".bold(), budget.strictness);
    println!(
        "  {} {} ({})",
        "Tier:".bold(),
        budget.tier.to_string().bright_cyan(),
        budget.model.dimmed()
    );
    println!("  {} {}", "Max tokens:".bold(), budget.max_tokens);
    println!("  {} {:.2}", "Temperature:".bold(), budget.temperature);
    if budget.upgrade_immediately {
        println!("  {}", "Skip cheaper tiers: yes".yellow());
    }
    println!("{}", "═".repeat(50).bright_blue());
    println!();
}

fn print_analysis(result: &AnalysisResult) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", format!("  {}", result.title).bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    for section in &result.sections {
        println!();
        println!(
            "{} {}",
            section.heading.bright_magenta().bold(),
            format!("({} items)", section.items.len()).dimmed()
        );
        for item in &section.items {
            let line = match item {
                serde_json::Value::Object(map) => map
                    .values()
                    .filter_map(|v| match v {
                        serde_json::Value::String(s) => Some(s.clone()),
                        serde_json::Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" | "),
                other => other.to_string(),
            };
            for (i, wrapped) in wrap_lines(&line, 64).iter().enumerate() {
                let bullet = if i == 0 { "•" } else { " " };
                println!("  {} {}", bullet, wrapped);
            }
        }
    }
    println!();
}

/// Create a callback that prints turn events to the console.
fn create_console_callback() -> Box<dyn Fn(TurnEvent) + Send + Sync> {
    Box::new(move |event: TurnEvent| match event {
        TurnEvent::TierSelected { budget } => {
            println!(
                "{} {} {}",
                "▶".bright_cyan(),
                format!("{} / {}", budget.stage, budget.tier).bright_cyan().bold(),
                format!("({}, {} tokens)", budget.model, budget.max_tokens).dimmed()
            );
        }
        TurnEvent::RepairStarted { failures } => {
            let rules = failures
                .iter()
                .map(|f| f.rule.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            println!("{} {}", "↻ repairing:".yellow(), rules);
        }
        TurnEvent::TurnFinished { .. } => {
            // Reported by the caller
        }
    })
}

/// Break `text` into lines of at most `width` characters, splitting only
/// at whitespace. A single word longer than `width` gets its own line.
fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_chars = 0;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        if line_chars > 0 && line_chars + 1 + word_chars > width {
            lines.push(std::mem::take(&mut line));
            line_chars = 0;
        }
        if line_chars > 0 {
            line.push(' ');
            line_chars += 1;
        }
        line.push_str(word);
        line_chars += word_chars;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
