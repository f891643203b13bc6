use async_trait::async_trait;
use roundtable::client_wrapper::{
    ClientError, ClientWrapper, Completion, CompletionRequest, Role, TokenUsage,
};
use roundtable::config::DiscussionConfig;
use roundtable::discussion::{fallback_utterance, Discussion, DiscussionError};
use roundtable::event::{DiscussionEvent, EventHandler};
use roundtable::participant::{Participant, ParticipantRole};
use roundtable::phase::{Phase, PhaseOverflow};
use roundtable::resilience::RetryPolicy;
use roundtable::scenario::Scenario;
use roundtable::Marker;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays scripted results in order and records every request it receives.
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<Completion, ClientError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<Completion, ClientError>>) -> Arc<Self> {
        Arc::new(ScriptedClient {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn texts(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok(Completion::text(*t))).collect())
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn user_content(&self, index: usize) -> String {
        let requests = self.requests();
        requests[index]
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl ClientWrapper for ScriptedClient {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Completion::text("default reply")))
    }
}

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<DiscussionEvent>>,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_discussion_event(&self, event: &DiscussionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn three_participants() -> Vec<Participant> {
    vec![
        Participant::new("A", "You are A."),
        Participant::new("B", "You are B."),
        Participant::new("C", "You are C.").with_role(ParticipantRole::Mediator),
    ]
}

fn scenario(phases: Vec<Phase>) -> Scenario {
    Scenario {
        title: "Test".to_string(),
        topic: "Walls or trees?".to_string(),
        participants: three_participants(),
        phases,
        vocabulary: Default::default(),
    }
}

fn phased(rounds: usize) -> DiscussionConfig {
    DiscussionConfig::phased()
        .with_total_rounds(rounds)
        .without_delays()
}

fn simple(rounds: usize) -> DiscussionConfig {
    DiscussionConfig::simple()
        .with_total_rounds(rounds)
        .without_delays()
}

#[tokio::test]
async fn test_rotation_is_strict_across_phases() {
    let client = ScriptedClient::texts(&[]);
    let discussion = Discussion::new(
        scenario(vec![
            Phase::new("first", 2, "one"),
            Phase::new("second", 2, "two"),
        ]),
        phased(7),
        client,
    )
    .unwrap();

    let outcome = discussion.run().await;
    let speakers: Vec<&str> = outcome
        .turns()
        .map(|t| t.participant_name.as_str())
        .collect();
    assert_eq!(speakers, vec!["A", "B", "C", "A", "B", "C", "A"]);

    for round in 1..=7 {
        let expected = ["A", "B", "C"][(round - 1) % 3];
        assert_eq!(discussion.participant_for_round(round).name, expected);
    }

    let phases: Vec<&str> = outcome
        .turns()
        .map(|t| t.phase_name.as_deref().unwrap())
        .collect();
    assert_eq!(
        phases,
        vec!["first", "first", "second", "second", "second", "second", "second"]
    );
}

#[tokio::test]
async fn test_failed_call_becomes_placeholder_turn() {
    let client = ScriptedClient::new(vec![
        Ok(Completion {
            content: "R1 text".to_string(),
            used_tool: true,
            usage: None,
        }),
        Err(ClientError::Http("connection reset".to_string())),
        Ok(Completion::text("R3 text")),
    ]);
    let handler = Arc::new(RecordingHandler::default());
    let discussion = Discussion::new(scenario(vec![Phase::new("only", 3, "")]), phased(3), client)
        .unwrap()
        .with_event_handler(handler.clone());

    let outcome = discussion.run().await;
    let turns: Vec<_> = outcome.turns().collect();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[1].text, fallback_utterance("B"));
    assert_eq!(turns[1].text, "[B is temporarily silent due to a technical issue]");
    assert!(!turns[1].used_tool);
    assert!(turns[1].fallback);
    assert!(turns[0].used_tool);
    assert_eq!(turns[2].text, "R3 text");
    assert_eq!(outcome.fallback_turns, 1);

    let events = handler.events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        DiscussionEvent::TurnFailed { round: 2, participant_name, .. } if participant_name == "B"
    )));
}

#[tokio::test]
async fn test_repetition_constraint_starts_at_round_two() {
    let client = ScriptedClient::texts(&["R1 text", "R2 text", "R3 text"]);
    let discussion = Discussion::new(
        scenario(vec![Phase::new("only", 3, "Argue.")]),
        phased(3),
        client.clone(),
    )
    .unwrap();
    discussion.run().await;

    let first = client.user_content(0);
    let second = client.user_content(1);
    let third = client.user_content(2);

    assert!(!first.contains("Already said"));
    assert!(second.contains("Already said: R1 text"));
    assert!(!second.contains("Already said: R2 text"));
    assert!(third.contains("Already said: R1 text"));
    assert!(third.contains("Already said: R2 text"));
    assert!(!third.contains("Already said: R3 text"));
    assert!(third.contains("[Current phase instruction]\nArgue."));
}

#[tokio::test]
async fn test_simple_variant_window_is_recent_suffix() {
    let client = ScriptedClient::texts(&["R1 text", "R2 text", "R3 text", "R4 text", "R5 text"]);
    let discussion = Discussion::new(
        scenario(Vec::new()),
        simple(5).with_context_window(Some(2)),
        client.clone(),
    )
    .unwrap();
    discussion.run().await;

    let requests = client.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[4].messages[0].role, Role::System);
    assert_eq!(&*requests[4].messages[0].content, "You are B.");
    assert_eq!(
        client.user_content(4),
        "Conversation so far:\nC: R3 text\nA: R4 text\n\nSpeak as B:"
    );
    assert_eq!(
        client.user_content(0),
        "Conversation so far:\nSystem: Walls or trees?\n\nSpeak as A:"
    );
    assert!(requests.iter().all(|r| (r.temperature - 0.9).abs() < f32::EPSILON));
    assert!(requests.iter().all(|r| !r.tool_use));
}

#[tokio::test]
async fn test_simple_variant_sends_whole_transcript_by_default() {
    let client = ScriptedClient::texts(&["R1 text", "R2 text", "R3 text", "R4 text"]);
    let discussion =
        Discussion::new(scenario(Vec::new()), simple(4), client.clone()).unwrap();
    let outcome = discussion.run().await;

    let last = client.user_content(3);
    assert!(last.contains("System: Walls or trees?\nA: R1 text\nB: R2 text\nC: R3 text"));
    assert!(outcome.turns().all(|t| t.phase_name.is_none()));
}

#[tokio::test]
async fn test_phase_events_and_tool_use_statistics() {
    let client = ScriptedClient::new(vec![
        Ok(Completion::text("Plain.")),
        Ok(Completion {
            content: "Searched and found 2019 data.".to_string(),
            used_tool: true,
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            }),
        }),
        Ok(Completion::text("However, is it enough?")),
        Ok(Completion {
            content: "More.".to_string(),
            used_tool: false,
            usage: Some(TokenUsage {
                input_tokens: 1,
                output_tokens: 1,
                total_tokens: 2,
            }),
        }),
    ]);
    let handler = Arc::new(RecordingHandler::default());
    let discussion = Discussion::new(
        scenario(vec![
            Phase::new("facts", 2, "Find facts."),
            Phase::new("debate", 2, "Debate."),
        ]),
        phased(4),
        client,
    )
    .unwrap()
    .with_event_handler(handler.clone());

    let outcome = discussion.run().await;

    let tool_rounds: Vec<usize> = outcome
        .statistics
        .observations(Marker::ToolUse)
        .iter()
        .map(|o| o.round_number)
        .collect();
    assert_eq!(tool_rounds, vec![2]);
    assert_eq!(outcome.statistics.count(Marker::Question), 1);
    assert_eq!(outcome.statistics.count(Marker::Disagreement), 1);
    assert_eq!(outcome.statistics.count(Marker::EvidentiaryClaim), 1);
    assert_eq!(outcome.token_usage.total_tokens, 17);

    let events = handler.events.lock().unwrap();
    assert!(matches!(events.first(), Some(DiscussionEvent::RunStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(DiscussionEvent::RunCompleted { rounds: 4, total_tokens: 17, .. })
    ));
    let entered: Vec<(usize, String)> = events
        .iter()
        .filter_map(|e| match e {
            DiscussionEvent::PhaseEntered {
                round, phase_name, ..
            } => Some((*round, phase_name.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        entered,
        vec![(1, "facts".to_string()), (3, "debate".to_string())]
    );
}

#[tokio::test]
async fn test_compromise_tracked_for_mediator_in_simple_variant() {
    let client = ScriptedClient::texts(&[
        "We could compromise.",
        "Never compromise.",
        "Perhaps we can compromise and combine both.",
    ]);
    let outcome = Discussion::new(scenario(Vec::new()), simple(3), client)
        .unwrap()
        .run()
        .await;

    let compromises = outcome.statistics.observations(Marker::Compromise);
    assert_eq!(compromises.len(), 1);
    assert_eq!(compromises[0].round_number, 3);
    assert_eq!(compromises[0].participant_name, "C");
    assert!(compromises[0].excerpt.as_ref().unwrap().starts_with("Perhaps"));
}

#[tokio::test]
async fn test_overflow_policy() {
    let phases = vec![Phase::new("one", 3, ""), Phase::new("two", 2, "")];

    let err = Discussion::new(
        scenario(phases.clone()),
        phased(7).with_phase_overflow(PhaseOverflow::Reject),
        ScriptedClient::texts(&[]),
    )
    .err()
    .unwrap();
    assert_eq!(
        err,
        DiscussionError::PhaseBudgetExceeded {
            rounds: 7,
            phase_rounds: 5
        }
    );

    let discussion =
        Discussion::new(scenario(phases), phased(7), ScriptedClient::texts(&[])).unwrap();
    assert_eq!(discussion.phase_for_round(6).name, "two");
    assert_eq!(discussion.phase_for_round(7).name, "two");
    let outcome = discussion.run().await;
    assert_eq!(outcome.turn_count(), 7);
}

#[tokio::test]
async fn test_configuration_errors_fail_fast() {
    let client = ScriptedClient::texts(&[]);

    let mut empty = scenario(Vec::new());
    empty.participants.clear();
    assert_eq!(
        Discussion::new(empty, simple(3), client.clone()).err(),
        Some(DiscussionError::NoParticipants)
    );

    assert_eq!(
        Discussion::new(scenario(Vec::new()), phased(3), client.clone()).err(),
        Some(DiscussionError::EmptyPhaseSchedule)
    );

    assert!(matches!(
        Discussion::new(scenario(Vec::new()), simple(0), client.clone()).err(),
        Some(DiscussionError::InvalidConfig(_))
    ));

    let mut duplicate = scenario(Vec::new());
    duplicate.participants.push(Participant::new("A", "again"));
    assert_eq!(
        Discussion::new(duplicate, simple(3), client.clone()).err(),
        Some(DiscussionError::DuplicateParticipant("A".to_string()))
    );

    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn test_retry_policy_recovers_before_fallback() {
    let client = ScriptedClient::new(vec![
        Err(ClientError::Http("timeout".to_string())),
        Ok(Completion::text("recovered")),
    ]);
    let config = simple(1).with_retry(
        RetryPolicy::exponential(3, Duration::from_millis(0), Duration::from_millis(0))
            .with_jitter(false),
    );
    let outcome = Discussion::new(scenario(Vec::new()), config, client.clone())
        .unwrap()
        .run()
        .await;

    let turn = outcome.turns().next().unwrap();
    assert_eq!(turn.text, "recovered");
    assert!(!turn.fallback);
    assert_eq!(client.requests().len(), 2);
}

#[tokio::test]
async fn test_adjacent_phases_with_same_name_are_one_boundary() {
    let handler = Arc::new(RecordingHandler::default());
    let outcome = Discussion::new(
        scenario(vec![
            Phase::new("Debate", 1, "one"),
            Phase::new("Debate", 1, "two"),
        ]),
        phased(2),
        ScriptedClient::texts(&["R1 text", "R2 text"]),
    )
    .unwrap()
    .with_event_handler(handler.clone())
    .run()
    .await;

    let entered = handler
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, DiscussionEvent::PhaseEntered { .. }))
        .count();
    assert_eq!(entered, 1);

    let markdown = roundtable::report::render_transcript_markdown(&outcome);
    assert_eq!(markdown.matches("## Phase: Debate").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_timing_pauses_after_rounds_and_before_placeholder() {
    let client = ScriptedClient::new(vec![
        Ok(Completion::text("R1 text")),
        Err(ClientError::Http("connection reset".to_string())),
        Ok(Completion::text("R3 text")),
    ]);
    let config = DiscussionConfig::phased().with_total_rounds(3);
    assert_eq!(config.fallback_delay, Duration::from_secs(5));

    let discussion =
        Discussion::new(scenario(vec![Phase::new("only", 3, "")]), config, client).unwrap();

    let started = tokio::time::Instant::now();
    let outcome = discussion.run().await;
    let elapsed = started.elapsed();

    assert_eq!(outcome.turn_count(), 3);
    assert_eq!(outcome.fallback_turns, 1);
    // 2 s after each of the 3 rounds plus 5 s before the placeholder.
    assert!(elapsed >= Duration::from_secs(11), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(11_100), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_without_delays_takes_no_time() {
    let client = ScriptedClient::new(vec![Err(ClientError::Http("down".to_string()))]);
    let discussion = Discussion::new(scenario(Vec::new()), simple(3), client).unwrap();

    let started = tokio::time::Instant::now();
    discussion.run().await;
    assert_eq!(started.elapsed(), Duration::from_secs(0));
}
