//! Output artifacts of a run.
//!
//! Three files are written once the round budget is exhausted, all keyed by the run id:
//!
//! - `experiment_log_<id>.md`: the transcript, grouped under phase headings.
//! - `analysis_report_<id>.md`: counts and tables per classification marker.
//! - `transcript_<id>.json`: the structured record the analysis tool reads first.
//!
//! The Markdown transcript is presentation. Its turn layout (`### Round <n> - <name>`
//! followed by `>` quote lines) is still parseable by
//! [`analysis::parse_markdown_transcript`](crate::analysis::parse_markdown_transcript).
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::roundtable::classifier::Marker;
use crate::roundtable::config::Variant;
use crate::roundtable::discussion::DiscussionOutcome;
use crate::roundtable::statistics::Observation;
use crate::roundtable::transcript::{Turn, TOPIC_SPEAKER};

/// Timestamp-derived run identifier, `YYYYMMDD_HHMMSS` in local time.
pub fn new_run_id() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(err) => write!(f, "Failed to write report: {}", err),
            ReportError::Serialize(err) => write!(f, "Failed to serialize transcript: {}", err),
        }
    }
}

impl Error for ReportError {}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialize(err)
    }
}

/// Structured interchange form of a finished run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub run_id: String,
    pub title: String,
    pub topic: String,
    pub variant: Variant,
    pub model: String,
    pub temperature: f32,
    pub total_rounds: usize,
    #[serde(default)]
    pub total_tokens: usize,
    pub turns: Vec<Turn>,
}

impl TranscriptRecord {
    pub fn from_outcome(outcome: &DiscussionOutcome) -> Self {
        TranscriptRecord {
            run_id: outcome.run_id.clone(),
            title: outcome.title.clone(),
            topic: outcome.topic.clone(),
            variant: outcome.variant,
            model: outcome.model_label.clone(),
            temperature: outcome.temperature,
            total_rounds: outcome.total_rounds,
            total_tokens: outcome.token_usage.total_tokens,
            turns: outcome.turns().cloned().collect(),
        }
    }
}

/// Paths of the files written by [`write_artifacts`].
#[derive(Clone, Debug)]
pub struct RunArtifacts {
    pub transcript_markdown: PathBuf,
    pub statistics_markdown: PathBuf,
    pub transcript_json: PathBuf,
}

/// Quote every line of `text` so multi-line turns stay inside one block.
fn quote(text: &str, out: &mut String) {
    for line in text.split('\n') {
        if line.is_empty() {
            out.push_str(">\n");
        } else {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn table_cell(text: &str) -> String {
    text.replace('\n', " ").replace('|', "\\|")
}

pub fn render_transcript_markdown(outcome: &DiscussionOutcome) -> String {
    let stats = &outcome.statistics;
    let mut md = String::new();
    let _ = writeln!(md, "# {}\n", outcome.title);
    md.push_str("## Run information\n\n");
    let _ = writeln!(md, "- **Run ID**: `{}`", outcome.run_id);
    let _ = writeln!(md, "- **Variant**: {}", outcome.variant.as_str());
    let _ = writeln!(
        md,
        "- **Model**: {} (Temperature: {})",
        outcome.model_label, outcome.temperature
    );
    let _ = writeln!(md, "- **Total rounds**: {}", outcome.total_rounds);
    let _ = writeln!(md, "- **Topic**: {}", outcome.topic);
    if outcome.tool_use {
        let _ = writeln!(md, "- **Search tool uses**: {}", stats.count(Marker::ToolUse));
    }
    let _ = writeln!(md, "- **Disagreements**: {}", stats.count(Marker::Disagreement));
    let _ = writeln!(md, "- **Questions**: {}", stats.count(Marker::Question));
    let _ = writeln!(md, "- **Tokens used**: {}", outcome.token_usage.total_tokens);
    if outcome.fallback_turns > 0 {
        let _ = writeln!(md, "- **Placeholder turns**: {}", outcome.fallback_turns);
    }
    md.push_str("\n---\n\n## Conversation\n\n");
    let _ = writeln!(md, "### {}: {}\n", TOPIC_SPEAKER, outcome.topic);

    let mut current_phase: Option<&str> = None;
    for turn in outcome.turns() {
        if let Some(phase) = turn.phase_name.as_deref() {
            if current_phase != Some(phase) {
                current_phase = Some(phase);
                let _ = writeln!(md, "---\n\n## Phase: {}\n", phase);
            }
        }
        let _ = writeln!(
            md,
            "### Round {} - {}\n",
            turn.round_number, turn.participant_name
        );
        if turn.used_tool {
            md.push_str("*Search tool used*\n\n");
        }
        quote(&turn.text, &mut md);
        md.push('\n');
    }
    md
}

fn write_round_list(md: &mut String, observations: &[Observation], suffix: &str, empty: &str) {
    if observations.is_empty() {
        let _ = writeln!(md, "- {}", empty);
        return;
    }
    for obs in observations {
        let _ = writeln!(md, "- Round {}: {}{}", obs.round_number, obs.participant_name, suffix);
    }
}

pub fn render_statistics_markdown(outcome: &DiscussionOutcome) -> String {
    let stats = &outcome.statistics;
    let mut md = String::new();
    md.push_str("# Discussion statistics\n\n");
    let _ = writeln!(md, "- **Run ID**: `{}`", outcome.run_id);
    let _ = writeln!(
        md,
        "- **Model**: {} (Temperature: {})",
        outcome.model_label, outcome.temperature
    );
    let _ = writeln!(md, "- **Total rounds**: {}\n", outcome.total_rounds);

    md.push_str("## Summary\n\n| Marker | Count |\n|--------|-------|\n");
    for marker in Marker::ALL.iter() {
        let _ = writeln!(md, "| {} | {} |", marker.label(), stats.count(*marker));
    }

    md.push_str("\n---\n\n## Evidentiary claims\n\n");
    let evidence = stats.observations(Marker::EvidentiaryClaim);
    if evidence.is_empty() {
        md.push_str("*No citation-like claims detected*\n");
    } else {
        md.push_str("| Round | Participant | Excerpt |\n|-------|-------------|---------|\n");
        for obs in evidence {
            let _ = writeln!(
                md,
                "| Round {} | {} | {}... |",
                obs.round_number,
                obs.participant_name,
                table_cell(obs.excerpt.as_deref().unwrap_or(""))
            );
        }
    }

    md.push_str("\n---\n\n## Extreme language\n\n");
    let extreme = stats.observations(Marker::ExtremeLanguage);
    if extreme.is_empty() {
        md.push_str("*No extreme language detected*\n");
    } else {
        md.push_str("| Round | Participant |\n|-------|-------------|\n");
        for obs in extreme {
            let _ = writeln!(md, "| Round {} | {} |", obs.round_number, obs.participant_name);
        }
        md.push_str("\n### By participant\n\n| Participant | Count |\n|-------------|-------|\n");
        for (name, count) in stats.counts_by_participant(Marker::ExtremeLanguage) {
            let _ = writeln!(md, "| {} | {} |", name, count);
        }
    }

    md.push_str("\n---\n\n## Mediator compromises\n\n");
    let compromises = stats.observations(Marker::Compromise);
    if compromises.is_empty() {
        md.push_str("*No compromise proposals detected*\n");
    } else {
        for obs in compromises {
            let excerpt = obs.excerpt.as_deref().unwrap_or("").replace('\n', " ");
            let _ = writeln!(
                md,
                "**Round {} - {}**\n> {}...\n",
                obs.round_number, obs.participant_name, excerpt
            );
        }
    }

    md.push_str("\n---\n\n## Search tool use\n\n");
    write_round_list(
        &mut md,
        stats.observations(Marker::ToolUse),
        " searched",
        "No searches recorded",
    );

    md.push_str("\n## Disagreements\n\n");
    write_round_list(
        &mut md,
        stats.observations(Marker::Disagreement),
        " disagreed",
        "No disagreements recorded",
    );

    md.push_str("\n## Questions\n\n");
    write_round_list(
        &mut md,
        stats.observations(Marker::Question),
        " asked a question",
        "No questions recorded",
    );

    md.push_str("\n---\n\n## Review suggestions\n\n");
    md.push_str("1. **Anchoring**: find the first concrete figure and follow how later turns treat it as fact.\n");
    md.push_str("2. **Polarization**: compare the tone of the first rounds with the last rounds.\n");
    md.push_str("3. **Mediation**: check whether the mediator invented techniques or contradictory plans.\n");
    md.push_str("4. **Echo chamber**: watch how unverified claims get reinforced inside the closed loop.\n");
    md
}

/// Write the transcript, statistics and JSON record into `dir`, creating it if needed.
pub fn write_artifacts<P: AsRef<Path>>(
    outcome: &DiscussionOutcome,
    dir: P,
) -> Result<RunArtifacts, ReportError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let artifacts = RunArtifacts {
        transcript_markdown: dir.join(format!("experiment_log_{}.md", outcome.run_id)),
        statistics_markdown: dir.join(format!("analysis_report_{}.md", outcome.run_id)),
        transcript_json: dir.join(format!("transcript_{}.json", outcome.run_id)),
    };

    fs::write(
        &artifacts.transcript_markdown,
        render_transcript_markdown(outcome),
    )?;
    fs::write(
        &artifacts.statistics_markdown,
        render_statistics_markdown(outcome),
    )?;
    let record = TranscriptRecord::from_outcome(outcome);
    fs::write(
        &artifacts.transcript_json,
        serde_json::to_string_pretty(&record)?,
    )?;

    log::info!(
        "wrote {}, {} and {}",
        artifacts.transcript_markdown.display(),
        artifacts.statistics_markdown.display(),
        artifacts.transcript_json.display()
    );
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_shape() {
        let id = new_run_id();
        assert_eq!(id.len(), 15);
        assert_eq!(&id[8..9], "_");
        assert!(id.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_quote_keeps_blank_lines_inside_block() {
        let mut out = String::new();
        quote("first\n\nthird", &mut out);
        assert_eq!(out, "> first\n>\n> third\n");
    }

    #[test]
    fn test_table_cell_escapes_pipes_and_newlines() {
        assert_eq!(table_cell("a|b\nc"), "a\\|b c");
    }
}
