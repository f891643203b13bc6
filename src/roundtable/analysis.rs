//! Post-run deep analysis of a transcript.
//!
//! The analysis tool reconstructs `(round, participant, text)` records from a finished run,
//! sends them to a completion service with a structured analysis request, and renders the
//! JSON answer as `deep_analysis_report_<run_id>.md`.
//!
//! Input is read from the structured `transcript_<run_id>.json` record whenever it exists.
//! Markdown transcripts are parsed best-effort: a turn starts at a `###` heading containing
//! `Round <n> - <name>` and collects the `>` quote lines that follow. Anything else is
//! skipped silently, so a drifted format yields fewer turns rather than an error.
//!
//! ```rust
//! use roundtable::analysis::parse_markdown_transcript;
//!
//! let md = "### System: Slopes\n\n### Round 1 - Engineer\n\n> Walls work.\n\n";
//! let turns = parse_markdown_transcript(md);
//! assert_eq!(turns.len(), 1);
//! assert_eq!(turns[0].participant, "Engineer");
//! assert_eq!(turns[0].text, "Walls work.");
//! ```
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::roundtable::client_wrapper::{ClientError, ClientWrapper, CompletionRequest, Message};
use crate::roundtable::report::{new_run_id, TranscriptRecord};

/// Sampling temperature for the analysis call.
pub const ANALYSIS_TEMPERATURE: f32 = 0.3;

lazy_static! {
    static ref ROUND_HEADING: Regex =
        Regex::new(r"Round (\d+) - (.+?)\s*$").expect("valid round heading pattern");
    static ref RUN_ID: Regex = Regex::new(r"(\d{8}_\d{6})").expect("valid run id pattern");
}

/// One turn recovered from a transcript file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedTurn {
    pub round: usize,
    pub participant: String,
    pub text: String,
}

#[derive(Debug)]
pub enum AnalysisError {
    FileNotFound(PathBuf),
    Io(std::io::Error),
    /// The input held no recognisable turns.
    NoTurns(PathBuf),
    Client(ClientError),
    InvalidResponse(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            AnalysisError::Io(err) => write!(f, "I/O error: {}", err),
            AnalysisError::NoTurns(path) => {
                write!(f, "No turns could be parsed from {}", path.display())
            }
            AnalysisError::Client(err) => write!(f, "Analysis call failed: {}", err),
            AnalysisError::InvalidResponse(msg) => write!(f, "Invalid analysis response: {}", msg),
        }
    }
}

impl Error for AnalysisError {}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        AnalysisError::Io(err)
    }
}

impl From<ClientError> for AnalysisError {
    fn from(err: ClientError) -> Self {
        AnalysisError::Client(err)
    }
}

/// Rebuild turns from a Markdown transcript.
pub fn parse_markdown_transcript(content: &str) -> Vec<ReconstructedTurn> {
    let mut turns = Vec::new();
    let mut current: Option<(usize, String, Vec<String>)> = None;

    fn flush(
        current: &mut Option<(usize, String, Vec<String>)>,
        turns: &mut Vec<ReconstructedTurn>,
    ) {
        if let Some((round, participant, lines)) = current.take() {
            if !lines.is_empty() {
                turns.push(ReconstructedTurn {
                    round,
                    participant,
                    text: lines.join("\n"),
                });
            }
        }
    }

    // Split on '\n' only; a '\r' inside a turn is part of its text.
    for line in content.split('\n') {
        if line.starts_with('#') {
            flush(&mut current, &mut turns);
            if !line.starts_with("###") {
                continue;
            }
            if let Some(caps) = ROUND_HEADING.captures(line) {
                if let Ok(round) = caps[1].parse::<usize>() {
                    current = Some((round, caps[2].to_string(), Vec::new()));
                }
            }
        } else if let Some(rest) = line.strip_prefix('>') {
            if let Some((_, _, lines)) = current.as_mut() {
                let text = rest.strip_prefix(' ').unwrap_or(rest);
                lines.push(text.to_string());
            }
        }
    }
    flush(&mut current, &mut turns);
    turns
}

/// Run id embedded in a file name, or a fresh one when there is none.
pub fn run_id_from_path(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| RUN_ID.captures(name))
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(new_run_id)
}

fn record_turns(record: TranscriptRecord) -> Vec<ReconstructedTurn> {
    record
        .turns
        .into_iter()
        .map(|turn| ReconstructedTurn {
            round: turn.round_number,
            participant: turn.participant_name,
            text: turn.text,
        })
        .collect()
}

fn read_record(path: &Path) -> Result<Vec<ReconstructedTurn>, AnalysisError> {
    let raw = fs::read_to_string(path)?;
    let record: TranscriptRecord = serde_json::from_str(&raw)
        .map_err(|err| AnalysisError::InvalidResponse(format!("{}: {}", path.display(), err)))?;
    Ok(record_turns(record))
}

/// Load turns from `path`.
///
/// A `.json` path is read as a transcript record. For a Markdown path, a sibling
/// `transcript_<run_id>.json` is preferred when present; otherwise the Markdown is parsed.
pub fn load_transcript(path: &Path) -> Result<Vec<ReconstructedTurn>, AnalysisError> {
    if !path.is_file() {
        return Err(AnalysisError::FileNotFound(path.to_path_buf()));
    }

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let turns = if is_json {
        read_record(path)?
    } else {
        let sibling = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| RUN_ID.captures(name))
            .map(|caps| path.with_file_name(format!("transcript_{}.json", &caps[1])))
            .filter(|candidate| candidate.is_file());
        match sibling {
            Some(json_path) => {
                log::info!("using structured record {}", json_path.display());
                read_record(&json_path)?
            }
            None => parse_markdown_transcript(&fs::read_to_string(path)?),
        }
    };

    if turns.is_empty() {
        return Err(AnalysisError::NoTurns(path.to_path_buf()));
    }
    Ok(turns)
}

pub fn build_analysis_prompt(turns: &[ReconstructedTurn]) -> String {
    let conversation = turns
        .iter()
        .map(|turn| format!("Round {} - {}:\n{}", turn.round, turn.participant, turn.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are an AI researcher who specialises in hallucination and polarization in multi-agent systems.

Analyse the following {count} turns carefully:

{conversation}

Cover these angles:

1. Model collapse and looping
   - Does the mediator or facilitator open with the same phrase every time?
   - From which round does mechanical repetition start, and what does it indicate?

2. Hallucination, classified precisely
   a) Self-reinforcement: a participant repeating its own figures (stubbornness, not propagation).
   b) Fabricated citations: journals, books or studies that look invented. Did anyone question them?

3. Dialogue deadlock
   - From which round do the sides stop answering each other and only restate their positions?
   - Estimate each participant's new-idea rate between 0 and 1.

4. Polarization trajectory
   - How does the tone evolve from early to middle to late rounds?
   - Quote the most extreme sentences.

Answer with a JSON object of exactly this shape:
{{
  "model_collapse": {{
    "detected": true,
    "mediator_opening_phrase": "the repeated phrase",
    "repetition_count": 0,
    "start_round": 0,
    "interpretation": "what it means"
  }},
  "hallucination_analysis": {{
    "self_reinforcement": [{{"agent": "name", "claim": "claim", "rounds": [1, 4]}}],
    "fabricated_citations": [{{"round": 5, "agent": "name", "citation": "title", "analysis": "why it looks suspicious"}}]
  }},
  "dialogue_deadlock": {{
    "deadlock_round": 0,
    "evidence": "evidence",
    "new_idea_rate": {{"name": 0.5}}
  }},
  "polarization_trajectory": {{
    "early_phase": {{"rounds": "1-5", "tone": "tone"}},
    "middle_phase": {{"rounds": "6-12", "tone": "tone"}},
    "late_phase": {{"rounds": "13-20", "tone": "tone"}},
    "most_extreme_quotes": ["quote"]
  }}
}}"#,
        count = turns.len(),
        conversation = conversation
    )
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCollapse {
    pub detected: bool,
    pub mediator_opening_phrase: Option<String>,
    pub repetition_count: Option<Value>,
    pub start_round: Option<Value>,
    pub interpretation: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfReinforcement {
    pub agent: String,
    pub claim: String,
    pub rounds: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricatedCitation {
    pub round: Option<Value>,
    pub agent: String,
    pub citation: String,
    pub analysis: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HallucinationAnalysis {
    pub self_reinforcement: Vec<SelfReinforcement>,
    pub fabricated_citations: Vec<FabricatedCitation>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueDeadlock {
    pub deadlock_round: Option<Value>,
    pub evidence: Option<String>,
    pub new_idea_rate: BTreeMap<String, Value>,
}

impl DialogueDeadlock {
    /// Numeric new-idea rates; non-numeric entries are skipped.
    pub fn idea_rates(&self) -> Vec<(&str, f64)> {
        self.new_idea_rate
            .iter()
            .filter_map(|(name, rate)| rate.as_f64().map(|rate| (name.as_str(), rate)))
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTone {
    pub rounds: Option<Value>,
    pub tone: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarizationTrajectory {
    pub early_phase: PhaseTone,
    pub middle_phase: PhaseTone,
    pub late_phase: PhaseTone,
    pub most_extreme_quotes: Vec<String>,
}

/// Structured answer of the analysis call. Missing sections default to empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub model_collapse: ModelCollapse,
    pub hallucination_analysis: HallucinationAnalysis,
    pub dialogue_deadlock: DialogueDeadlock,
    pub polarization_trajectory: PolarizationTrajectory,
}

/// The span from the first `{` to the last `}`, tolerating prose or code fences around it.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let json = extract_json(text)
        .ok_or_else(|| AnalysisError::InvalidResponse("no JSON object in response".into()))?;
    serde_json::from_str(json).map_err(|err| AnalysisError::InvalidResponse(err.to_string()))
}

/// Ask `client` for the structured analysis of `turns`.
pub async fn analyze(
    client: &dyn ClientWrapper,
    turns: &[ReconstructedTurn],
) -> Result<AnalysisResult, AnalysisError> {
    let request = CompletionRequest::new(vec![
        Message::system(
            "You are a rigorous AI research analyst who finds deep patterns in dialogue. \
             Analyse with scientific care.",
        ),
        Message::user(build_analysis_prompt(turns)),
    ])
    .with_temperature(ANALYSIS_TEMPERATURE)
    .with_json_output(true);

    let completion = client.complete(&request).await?;
    parse_analysis(&completion.content)
}

/// Verbal rating of a new-idea rate.
pub fn idea_rate_rating(rate: f64) -> &'static str {
    if rate < 0.2 {
        "near-zero output, stuck in a loop"
    } else if rate < 0.5 {
        "low output, heavy repetition"
    } else {
        "still producing new ideas"
    }
}

fn value_text(value: &Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn deep_report_path(dir: &Path, run_id: &str) -> PathBuf {
    dir.join(format!("deep_analysis_report_{}.md", run_id))
}

pub fn render_deep_report(result: &AnalysisResult, run_id: &str, model_label: &str) -> String {
    let mut md = String::new();
    md.push_str("# Deep analysis report\n\n## Run information\n\n");
    let _ = writeln!(md, "- **Run ID**: `{}`", run_id);
    let _ = writeln!(
        md,
        "- **Analysed at**: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(
        md,
        "- **Analysis model**: {} (Temperature: {})",
        model_label, ANALYSIS_TEMPERATURE
    );
    md.push_str("\n---\n\n## 1. Model collapse\n\n");

    let mc = &result.model_collapse;
    if mc.detected {
        md.push_str("### Model collapse detected\n\n");
        let _ = writeln!(
            md,
            "**Repeated phrase**: \"{}\"\n",
            mc.mediator_opening_phrase.as_deref().unwrap_or("N/A")
        );
        let _ = writeln!(md, "**Repetitions**: {}\n", value_text(&mc.repetition_count));
        let _ = writeln!(md, "**Starting round**: Round {}\n", value_text(&mc.start_round));
        let _ = writeln!(
            md,
            "**Interpretation**:\n{}\n",
            mc.interpretation.as_deref().unwrap_or("None")
        );
    } else {
        md.push_str("*No clear model collapse detected*\n\n");
    }

    md.push_str("---\n\n## 2. Hallucination classification\n\n### A. Self-reinforcement\n\n");
    let ha = &result.hallucination_analysis;
    if ha.self_reinforcement.is_empty() {
        md.push_str("*None reported*\n\n");
    }
    for item in &ha.self_reinforcement {
        let rounds = item
            .rounds
            .iter()
            .map(|round| format!("Round {}", value_text(&Some(round.clone()))))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(md, "- **{}**: keeps asserting \"{}\"", item.agent, item.claim);
        let _ = writeln!(md, "  - Rounds: {}\n", rounds);
    }

    md.push_str("### B. Fabricated citations\n\n");
    if ha.fabricated_citations.is_empty() {
        md.push_str("*None reported*\n\n");
    }
    for item in &ha.fabricated_citations {
        let _ = writeln!(md, "**Round {}** - {}", value_text(&item.round), item.agent);
        let _ = writeln!(md, "> Citation: {}", item.citation);
        let _ = writeln!(md, "> Analysis: {}\n", item.analysis);
    }

    let dd = &result.dialogue_deadlock;
    md.push_str("---\n\n## 3. Dialogue deadlock\n\n");
    let _ = writeln!(md, "### Deadlock from round {}\n", value_text(&dd.deadlock_round));
    let _ = writeln!(md, "{}\n", dd.evidence.as_deref().unwrap_or("No evidence given"));
    md.push_str("### New-idea rate\n\n| Participant | Rate | Rating |\n|-------------|------|--------|\n");
    for (name, rate) in dd.idea_rates() {
        let _ = writeln!(
            md,
            "| {} | {:.1}% | {} |",
            name,
            rate * 100.0,
            idea_rate_rating(rate)
        );
    }

    let pt = &result.polarization_trajectory;
    md.push_str("\n---\n\n## 4. Polarization trajectory\n\n");
    for (label, phase) in [
        ("Early", &pt.early_phase),
        ("Middle", &pt.middle_phase),
        ("Late", &pt.late_phase),
    ]
    .iter()
    {
        let _ = writeln!(md, "### {} rounds ({})", label, value_text(&phase.rounds));
        let _ = writeln!(md, "**Tone**: {}\n", phase.tone.as_deref().unwrap_or("None"));
    }
    md.push_str("### Most extreme statements\n\n");
    for (index, quote) in pt.most_extreme_quotes.iter().enumerate() {
        let _ = writeln!(md, "{}. > {}\n", index + 1, quote);
    }
    md
}
