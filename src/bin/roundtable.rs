use async_trait::async_trait;
use clap::Parser;
use roundtable::clients::openai::OpenAIClient;
use roundtable::config::{DiscussionConfig, Variant};
use roundtable::event::{DiscussionEvent, EventHandler};
use roundtable::report::write_artifacts;
use roundtable::resilience::RetryPolicy;
use roundtable::scenario::Scenario;
use roundtable::{Discussion, Marker};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const MODEL_VAR: &str = "ROUNDTABLE_MODEL";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Run a scripted multi-participant discussion and write its transcript and statistics.
#[derive(Parser)]
#[command(name = "roundtable", about = "Run a multi-agent discussion experiment")]
struct CliArgs {
    /// Loop variant: simple or phased
    #[arg(long, default_value = "phased")]
    variant: Variant,

    /// Number of rounds (defaults to the variant preset)
    #[arg(long)]
    rounds: Option<usize>,

    /// JSON scenario file (defaults to the built-in scenario for the variant)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Directory for the output files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Model name (falls back to ROUNDTABLE_MODEL, then gpt-4o-mini)
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature (defaults to the variant preset)
    #[arg(long)]
    temperature: Option<f32>,

    /// Recent transcript entries sent as context; 0 sends the whole transcript
    #[arg(long)]
    window: Option<usize>,

    /// Attempts per call including the first; 1 disables retries
    #[arg(long, default_value_t = 1)]
    retries: usize,

    /// Skip the fallback delay and the pause between rounds
    #[arg(long)]
    no_delay: bool,
}

/// Prints per-round progress to stdout.
struct ConsoleProgress;

#[async_trait]
impl EventHandler for ConsoleProgress {
    async fn on_discussion_event(&self, event: &DiscussionEvent) {
        let rule = "=".repeat(70);
        match event {
            DiscussionEvent::RunStarted {
                run_id,
                title,
                topic,
                model,
                temperature,
                ..
            } => {
                println!("{}", rule);
                println!("{}", title);
                println!("Run ID: {}", run_id);
                println!("Model: {} (Temperature: {})", model, temperature);
                println!("{}", rule);
                println!("\nTopic: {}\n", topic);
            }
            DiscussionEvent::PhaseEntered { phase_name, .. } => {
                println!("\n{}", rule);
                println!("Entering phase: {}", phase_name);
                println!("{}", rule);
            }
            DiscussionEvent::TurnStarted {
                round,
                total_rounds,
                participant_name,
                ..
            } => {
                println!(
                    "\nRound {}/{} - {} is speaking...",
                    round, total_rounds, participant_name
                );
            }
            DiscussionEvent::TurnFailed { error, .. } => {
                println!("   call failed: {}", error);
            }
            DiscussionEvent::TurnCompleted {
                participant_name,
                text,
                tokens_used,
                tags,
                ..
            } => {
                if let Some(tokens) = tokens_used {
                    let search = if tags.contains(&Marker::ToolUse) {
                        " (searched)"
                    } else {
                        ""
                    };
                    println!("   [Tokens: {}]{}", tokens, search);
                }
                println!("{}: {}", participant_name, text);
                println!("{}", "-".repeat(70));
            }
            DiscussionEvent::RunCompleted {
                total_tokens,
                fallback_turns,
                ..
            } => {
                println!("\n{}", rule);
                println!(
                    "Discussion complete: {} tokens, {} placeholder turns",
                    total_tokens, fallback_turns
                );
                println!("{}", rule);
            }
        }
    }
}

fn build_config(args: &CliArgs, model: &str) -> DiscussionConfig {
    let mut config = DiscussionConfig::for_variant(args.variant).with_model_label(model);
    if let Some(rounds) = args.rounds {
        config = config.with_total_rounds(rounds);
    }
    if let Some(temperature) = args.temperature {
        config = config.with_temperature(temperature);
    }
    if let Some(window) = args.window {
        config = config.with_context_window(if window == 0 { None } else { Some(window) });
    }
    if args.retries > 1 {
        config = config.with_retry(RetryPolicy::exponential(
            args.retries,
            Duration::from_secs(1),
            Duration::from_secs(30),
        ));
    }
    if args.no_delay {
        config = config.without_delays();
    }
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    roundtable::init_logger();
    let args = CliArgs::parse();

    let model = args
        .model
        .clone()
        .or_else(|| std::env::var(MODEL_VAR).ok())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let scenario = match &args.scenario {
        Some(path) => Scenario::from_json_file(path)?,
        None => match args.variant {
            Variant::Simple => Scenario::landslide_simple(),
            Variant::Phased => Scenario::landslide_phased(),
        },
    };

    let config = build_config(&args, &model);
    let client = Arc::new(OpenAIClient::from_env(&model)?);
    let discussion =
        Discussion::new(scenario, config, client)?.with_event_handler(Arc::new(ConsoleProgress));

    let outcome = discussion.run().await;
    let artifacts = write_artifacts(&outcome, &args.out_dir)?;

    println!("\nTranscript: {}", artifacts.transcript_markdown.display());
    println!("Statistics: {}", artifacts.statistics_markdown.display());
    println!("Record:     {}", artifacts.transcript_json.display());
    println!(
        "\nSearches: {}  Disagreements: {}  Questions: {}",
        outcome.statistics.count(Marker::ToolUse),
        outcome.statistics.count(Marker::Disagreement),
        outcome.statistics.count(Marker::Question)
    );
    Ok(())
}
