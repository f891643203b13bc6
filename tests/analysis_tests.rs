use async_trait::async_trait;
use roundtable::analysis::{
    analyze, deep_report_path, load_transcript, render_deep_report, run_id_from_path,
    AnalysisError, ReconstructedTurn, ANALYSIS_TEMPERATURE,
};
use roundtable::client_wrapper::{ClientError, ClientWrapper, Completion, CompletionRequest};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Returns one canned reply and keeps the request it was sent.
struct CannedClient {
    reply: Result<String, ClientError>,
    seen: Mutex<Option<CompletionRequest>>,
}

impl CannedClient {
    fn replying(text: &str) -> Self {
        CannedClient {
            reply: Ok(text.to_string()),
            seen: Mutex::new(None),
        }
    }

    fn failing(err: ClientError) -> Self {
        CannedClient {
            reply: Err(err),
            seen: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ClientWrapper for CannedClient {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ClientError> {
        *self.seen.lock().unwrap() = Some(request.clone());
        self.reply.clone().map(Completion::text)
    }
}

const ANALYSIS_JSON: &str = r#"```json
{
  "model_collapse": {
    "detected": true,
    "mediator_opening_phrase": "Let us find common ground",
    "repetition_count": 5,
    "start_round": "9",
    "interpretation": "The mediator fell into a template."
  },
  "hallucination_analysis": {
    "self_reinforcement": [
      {"agent": "Engineer", "claim": "walls last 50 years", "rounds": [2, 5, 8]}
    ],
    "fabricated_citations": [
      {"round": 4, "agent": "Ecologist", "citation": "2019 Tokyo study", "analysis": "No such study."}
    ]
  },
  "dialogue_deadlock": {
    "deadlock_round": 12,
    "evidence": "Same arguments repeated.",
    "new_idea_rate": {"Engineer": 0.1, "Ecologist": 0.35, "Mediator": 0.8}
  },
  "polarization_trajectory": {
    "early_phase": {"rounds": "1-6", "tone": "curious"},
    "middle_phase": {"rounds": "7-14", "tone": "entrenched"},
    "late_phase": {"rounds": "15-20", "tone": "weary"},
    "most_extreme_quotes": ["We must act now."]
  }
}
```"#;

fn turns() -> Vec<ReconstructedTurn> {
    vec![
        ReconstructedTurn {
            round: 1,
            participant: "Engineer".to_string(),
            text: "Walls work.".to_string(),
        },
        ReconstructedTurn {
            round: 2,
            participant: "Ecologist".to_string(),
            text: "Trees work too.".to_string(),
        },
    ]
}

#[tokio::test]
async fn test_analyze_sends_json_request_and_parses_reply() {
    let client = CannedClient::replying(ANALYSIS_JSON);
    let result = analyze(&client, &turns()).await.unwrap();

    let request = client.seen.lock().unwrap().clone().unwrap();
    assert!(request.json_output);
    assert!((request.temperature - ANALYSIS_TEMPERATURE).abs() < f32::EPSILON);
    assert!(!request.tool_use);
    let prompt = &request.messages[1].content;
    assert!(prompt.contains("Round 1 - Engineer"));
    assert!(prompt.contains("Trees work too."));

    assert!(result.model_collapse.detected);
    assert_eq!(
        result.model_collapse.mediator_opening_phrase.as_deref(),
        Some("Let us find common ground")
    );
    assert_eq!(result.hallucination_analysis.self_reinforcement.len(), 1);
    assert_eq!(
        result.hallucination_analysis.fabricated_citations[0].citation,
        "2019 Tokyo study"
    );
    let rates = result.dialogue_deadlock.idea_rates();
    assert_eq!(rates.len(), 3);
    assert_eq!(
        result.polarization_trajectory.most_extreme_quotes,
        vec!["We must act now.".to_string()]
    );

    let report = render_deep_report(&result, "20260202_092459", "canned");
    assert!(report.contains("- **Run ID**: `20260202_092459`"));
    assert!(report.contains("**Repetitions**: 5"));
    assert!(report.contains("**Starting round**: Round 9"));
    assert!(report.contains("| Engineer | 10.0% | near-zero output, stuck in a loop |"));
    assert!(report.contains("| Ecologist | 35.0% | low output, heavy repetition |"));
    assert!(report.contains("| Mediator | 80.0% | still producing new ideas |"));
}

#[tokio::test]
async fn test_sparse_reply_uses_defaults() {
    let client = CannedClient::replying(r#"{"model_collapse": {"detected": false}}"#);
    let result = analyze(&client, &turns()).await.unwrap();
    assert!(!result.model_collapse.detected);
    assert!(result.hallucination_analysis.fabricated_citations.is_empty());

    let report = render_deep_report(&result, "20260202_092459", "canned");
    assert!(report.contains("*No clear model collapse detected*"));
}

#[tokio::test]
async fn test_analysis_errors_surface() {
    let client = CannedClient::failing(ClientError::Api {
        status: 401,
        message: "bad key".to_string(),
    });
    assert!(matches!(
        analyze(&client, &turns()).await,
        Err(AnalysisError::Client(ClientError::Api { status: 401, .. }))
    ));

    let client = CannedClient::replying("I cannot help with that.");
    assert!(matches!(
        analyze(&client, &turns()).await,
        Err(AnalysisError::InvalidResponse(_))
    ));
}

#[test]
fn test_load_transcript_rejects_missing_and_empty_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("experiment_log_20260202_092459.md");
    assert!(matches!(
        load_transcript(&missing),
        Err(AnalysisError::FileNotFound(path)) if path == missing
    ));

    let empty = dir.path().join("experiment_log_20260202_092500.md");
    fs::write(&empty, "# Title\n\nNo turns here.\n").unwrap();
    assert!(matches!(
        load_transcript(&empty),
        Err(AnalysisError::NoTurns(_))
    ));
}

#[test]
fn test_load_hand_written_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.md");
    fs::write(
        &path,
        "# Notes\n\n### System: topic\n\n### Round 1 - Engineer\n\n> Walls.\n\n\
         ---\n\n## Phase: Debate\n\n### Round 2 - Ecologist\n\n> Trees.\n> Roots hold soil.\n",
    )
    .unwrap();

    let turns = load_transcript(&path).unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].participant, "Engineer");
    assert_eq!(turns[1].text, "Trees.\nRoots hold soil.");
}

#[test]
fn test_report_path_follows_run_id() {
    let id = run_id_from_path(Path::new("/tmp/experiment_log_20260202_092459.md"));
    assert_eq!(id, "20260202_092459");
    assert_eq!(
        deep_report_path(Path::new("/tmp"), &id),
        Path::new("/tmp/deep_analysis_report_20260202_092459.md")
    );
}
