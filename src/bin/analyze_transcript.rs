use clap::Parser;
use roundtable::analysis::{analyze, deep_report_path, load_transcript, render_deep_report, run_id_from_path};
use roundtable::clients::openai::OpenAIClient;
use roundtable::ClientWrapper;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

const MODEL_VAR: &str = "ROUNDTABLE_MODEL";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Deep analysis of a discussion transcript.
#[derive(Parser)]
#[command(name = "analyze_transcript", about = "Deep analysis of a discussion transcript")]
struct CliArgs {
    /// Transcript file (experiment_log_<id>.md or transcript_<id>.json)
    transcript: PathBuf,
}

fn usage() {
    eprintln!("Usage: analyze_transcript <transcript file>");
    eprintln!("Example: analyze_transcript experiment_log_20260202_092459.md");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    roundtable::init_logger();

    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) {
                let _ = err.print();
                return Ok(());
            }
            usage();
            process::exit(1);
        }
    };

    if !args.transcript.is_file() {
        eprintln!("File not found: {}", args.transcript.display());
        process::exit(1);
    }

    let run_id = run_id_from_path(&args.transcript);
    println!("Reading transcript: {}", args.transcript.display());
    let turns = load_transcript(&args.transcript)?;
    println!("Parsed {} turns", turns.len());

    let model = std::env::var(MODEL_VAR).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let client = OpenAIClient::from_env(&model)?;

    println!("Running deep analysis with {}...", client.model_name());
    let result = analyze(&client, &turns).await?;

    let out_dir = args
        .transcript
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let output = deep_report_path(out_dir, &run_id);
    std::fs::write(&output, render_deep_report(&result, &run_id, client.model_name()))?;

    println!("Deep analysis report saved: {}", output.display());
    Ok(())
}
