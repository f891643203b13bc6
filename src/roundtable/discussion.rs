//! The round-robin discussion loop.
//!
//! A [`Discussion`] is built from a [`Scenario`], a [`DiscussionConfig`] and a
//! [`ClientWrapper`]. Construction validates everything that could make the loop
//! ill-defined, so [`Discussion::run`] itself never fails: a failed completion call is
//! recorded as a placeholder utterance and the run continues.
//!
//! Each round:
//!
//! 1. picks `participants[(round - 1) % count]`,
//! 2. resolves the active phase and reports phase boundaries,
//! 3. renders the context window,
//! 4. builds the anti-repetition block (phased variant),
//! 5. assembles the prompt,
//! 6. calls the client, falling back to a placeholder after `fallback_delay` on failure,
//! 7. classifies the turn,
//! 8. records its fingerprint and statistics,
//! 9. appends it to the transcript,
//! 10. waits according to the pacing policy.
//!
//! All mutable state lives in a [`DiscussionState`] owned by one call to `run`.
//!
//! # Example
//!
//! ```rust,no_run
//! use roundtable::clients::openai::OpenAIClient;
//! use roundtable::config::DiscussionConfig;
//! use roundtable::discussion::Discussion;
//! use roundtable::scenario::Scenario;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(OpenAIClient::from_env("gpt-4o-mini")?);
//!     let discussion = Discussion::new(
//!         Scenario::landslide_phased(),
//!         DiscussionConfig::phased(),
//!         client,
//!     )?;
//!     let outcome = discussion.run().await;
//!     println!("{} turns, {} tokens", outcome.turn_count(), outcome.token_usage.total_tokens);
//!     Ok(())
//! }
//! ```
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tokio::time::sleep;

use crate::roundtable::classifier::{Marker, TurnClassifier};
use crate::roundtable::client_wrapper::{ClientWrapper, CompletionRequest, TokenUsage};
use crate::roundtable::config::{DiscussionConfig, Variant};
use crate::roundtable::event::{DiscussionEvent, EventHandler};
use crate::roundtable::participant::{Participant, ParticipantRegistry};
use crate::roundtable::phase::{Phase, PhaseOverflow, PhaseSchedule};
use crate::roundtable::prompt::{phased_messages, simple_messages, TurnPrompt};
use crate::roundtable::repetition::RepetitionTracker;
use crate::roundtable::report::new_run_id;
use crate::roundtable::resilience::{Pacer, ResilientClient};
use crate::roundtable::scenario::Scenario;
use crate::roundtable::statistics::RunStatistics;
use crate::roundtable::transcript::{Transcript, Turn};

/// Configuration problems detected before any round runs.
///
/// ```rust
/// use roundtable::discussion::DiscussionError;
///
/// let err = DiscussionError::PhaseBudgetExceeded { rounds: 25, phase_rounds: 20 };
/// assert_eq!(err.to_string(), "25 rounds requested but phases only cover 20");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum DiscussionError {
    NoParticipants,
    DuplicateParticipant(String),
    EmptyPhaseSchedule,
    /// More rounds than the phases cover while the overflow policy is `Reject`.
    PhaseBudgetExceeded { rounds: usize, phase_rounds: usize },
    InvalidConfig(String),
}

impl fmt::Display for DiscussionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscussionError::NoParticipants => write!(f, "No participants in discussion"),
            DiscussionError::DuplicateParticipant(name) => {
                write!(f, "Duplicate participant: {}", name)
            }
            DiscussionError::EmptyPhaseSchedule => write!(f, "Phase schedule is empty"),
            DiscussionError::PhaseBudgetExceeded {
                rounds,
                phase_rounds,
            } => write!(
                f,
                "{} rounds requested but phases only cover {}",
                rounds, phase_rounds
            ),
            DiscussionError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl Error for DiscussionError {}

/// Text recorded in place of a turn whose completion call failed.
pub fn fallback_utterance(participant_name: &str) -> String {
    format!(
        "[{} is temporarily silent due to a technical issue]",
        participant_name
    )
}

/// Result of one full run.
#[derive(Clone, Debug)]
pub struct DiscussionOutcome {
    pub run_id: String,
    pub title: String,
    pub topic: String,
    pub variant: Variant,
    pub model_label: String,
    pub temperature: f32,
    pub total_rounds: usize,
    pub tool_use: bool,
    pub transcript: Transcript,
    pub statistics: RunStatistics,
    /// Every fingerprint recorded, oldest first.
    pub discussed_points: Vec<String>,
    pub token_usage: TokenUsage,
    pub fallback_turns: usize,
}

impl DiscussionOutcome {
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.transcript.turns()
    }

    pub fn turn_count(&self) -> usize {
        self.transcript.turns().count()
    }
}

/// Mutable state threaded through the rounds of one run.
pub struct DiscussionState {
    pub transcript: Transcript,
    pub repetition: RepetitionTracker,
    pub statistics: RunStatistics,
    pub token_usage: TokenUsage,
    pub fallback_turns: usize,
    /// Name of the phase the previous round ran in. Boundaries are name changes.
    current_phase: Option<String>,
}

impl DiscussionState {
    fn new(topic: &str, fingerprint_chars: usize) -> Self {
        DiscussionState {
            transcript: Transcript::with_topic(topic),
            repetition: RepetitionTracker::new(fingerprint_chars),
            statistics: RunStatistics::new(),
            token_usage: TokenUsage::default(),
            fallback_turns: 0,
            current_phase: None,
        }
    }
}

pub struct Discussion {
    title: String,
    topic: String,
    registry: ParticipantRegistry,
    schedule: PhaseSchedule,
    /// `false` when the scenario declared no phases and the run uses one implicit span.
    phased: bool,
    classifier: TurnClassifier,
    config: DiscussionConfig,
    client: Arc<dyn ClientWrapper>,
    event_handler: Option<Arc<dyn EventHandler>>,
    run_id: String,
}

impl Discussion {
    /// Validate the scenario against the configuration and build the discussion.
    pub fn new(
        scenario: Scenario,
        config: DiscussionConfig,
        client: Arc<dyn ClientWrapper>,
    ) -> Result<Self, DiscussionError> {
        if config.total_rounds == 0 {
            return Err(DiscussionError::InvalidConfig(
                "total_rounds must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(DiscussionError::InvalidConfig(format!(
                "temperature {} is outside 0.0..=2.0",
                config.temperature
            )));
        }
        if config.context_window == Some(0) {
            return Err(DiscussionError::InvalidConfig(
                "context_window must be at least 1".to_string(),
            ));
        }

        let registry = ParticipantRegistry::new(scenario.participants)?;

        let phased = !scenario.phases.is_empty();
        let schedule = if phased {
            PhaseSchedule::new(scenario.phases)?
        } else if config.variant == Variant::Phased {
            return Err(DiscussionError::EmptyPhaseSchedule);
        } else {
            PhaseSchedule::single("Discussion", config.total_rounds)
        };

        if phased
            && config.phase_overflow == PhaseOverflow::Reject
            && config.total_rounds > schedule.total_span()
        {
            return Err(DiscussionError::PhaseBudgetExceeded {
                rounds: config.total_rounds,
                phase_rounds: schedule.total_span(),
            });
        }

        let client: Arc<dyn ClientWrapper> = if config.retry.retries_enabled() {
            Arc::new(ResilientClient::new(client, config.retry.clone()))
        } else {
            client
        };

        Ok(Discussion {
            title: scenario.title,
            topic: scenario.topic,
            registry,
            schedule,
            phased,
            classifier: TurnClassifier::new(scenario.vocabulary),
            config,
            client,
            event_handler: None,
            run_id: new_run_id(),
        })
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &DiscussionConfig {
        &self.config
    }

    pub fn participant_for_round(&self, round_number: usize) -> &Participant {
        self.registry.for_round(round_number)
    }

    pub fn phase_for_round(&self, round_number: usize) -> &Phase {
        self.schedule.phase_for(round_number)
    }

    fn model_label(&self) -> String {
        self.config
            .model_label
            .clone()
            .unwrap_or_else(|| self.client.model_name().to_string())
    }

    async fn emit(&self, event: DiscussionEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_discussion_event(&event).await;
        }
    }

    /// Run every round and return the transcript with its statistics.
    pub async fn run(&self) -> DiscussionOutcome {
        let model_label = self.model_label();
        let total_rounds = self.config.total_rounds;
        log::info!(
            "discussion {}: {} rounds, {} participants, model {}",
            self.run_id,
            total_rounds,
            self.registry.count(),
            model_label
        );

        self.emit(DiscussionEvent::RunStarted {
            run_id: self.run_id.clone(),
            title: self.title.clone(),
            topic: self.topic.clone(),
            model: model_label.clone(),
            temperature: self.config.temperature,
            total_rounds,
            participant_count: self.registry.count(),
        })
        .await;

        let mut state = DiscussionState::new(&self.topic, self.config.fingerprint_chars);
        let mut pacer = Pacer::new(self.config.pacing.clone());

        for round in 1..=total_rounds {
            self.play_round(round, &mut state, &mut pacer).await;
        }

        self.emit(DiscussionEvent::RunCompleted {
            run_id: self.run_id.clone(),
            rounds: total_rounds,
            total_tokens: state.token_usage.total_tokens,
            fallback_turns: state.fallback_turns,
        })
        .await;

        DiscussionOutcome {
            run_id: self.run_id.clone(),
            title: self.title.clone(),
            topic: self.topic.clone(),
            variant: self.config.variant,
            model_label,
            temperature: self.config.temperature,
            total_rounds,
            tool_use: self.config.tool_use,
            discussed_points: state.repetition.points().to_vec(),
            transcript: state.transcript,
            statistics: state.statistics,
            token_usage: state.token_usage,
            fallback_turns: state.fallback_turns,
        }
    }

    async fn play_round(&self, round: usize, state: &mut DiscussionState, pacer: &mut Pacer) {
        let participant = self.registry.for_round(round);

        let phase_index = self.schedule.index_for(round);
        let phase = self.schedule.phase_for(round);
        if self.phased && state.current_phase.as_deref() != Some(phase.name.as_str()) {
            log::info!("round {}: entering phase '{}'", round, phase.name);
            self.emit(DiscussionEvent::PhaseEntered {
                round,
                phase_index,
                phase_name: phase.name.clone(),
            })
            .await;
            state.current_phase = Some(phase.name.clone());
        }

        let context = state.transcript.render_window(self.config.context_window);
        let constraint = if self.config.anti_repetition() {
            state
                .repetition
                .render_constraint(round, self.config.repetition_limit)
        } else {
            String::new()
        };

        let prompt = TurnPrompt {
            participant,
            context: &context,
            constraint: &constraint,
            phase_instruction: if self.phased { &phase.instruction } else { "" },
        };
        let messages = match self.config.variant {
            Variant::Simple => simple_messages(&prompt),
            Variant::Phased => phased_messages(&prompt),
        };
        let prompt_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        log::debug!(
            "round {}: prompt for {} is {} chars",
            round,
            participant.name,
            prompt_chars
        );

        let request = CompletionRequest::new(messages)
            .with_speaker(participant.name.clone())
            .with_temperature(self.config.temperature)
            .with_tool_use(self.config.tool_use)
            .with_max_tokens(self.config.max_tokens);

        self.emit(DiscussionEvent::TurnStarted {
            round,
            total_rounds: self.config.total_rounds,
            participant_name: participant.name.clone(),
            prompt_chars,
        })
        .await;

        pacer.before_call().await;
        let (text, used_tool, tokens_used, fallback) = match self.client.complete(&request).await
        {
            Ok(completion) => {
                let tokens = completion.usage.as_ref().map(|usage| {
                    state.token_usage.add(usage);
                    usage.total_tokens
                });
                (completion.content, completion.used_tool, tokens, false)
            }
            Err(err) => {
                log::warn!(
                    "round {}: completion for {} failed: {}",
                    round,
                    participant.name,
                    err
                );
                self.emit(DiscussionEvent::TurnFailed {
                    round,
                    participant_name: participant.name.clone(),
                    error: err.to_string(),
                })
                .await;
                if self.config.fallback_delay.as_millis() > 0 {
                    sleep(self.config.fallback_delay).await;
                }
                state.fallback_turns += 1;
                (fallback_utterance(&participant.name), false, None, true)
            }
        };

        let tags = self.classifier.classify_turn(
            &text,
            used_tool,
            self.config.variant == Variant::Simple && participant.is_mediator(),
        );

        let turn = Turn {
            round_number: round,
            participant_name: participant.name.clone(),
            phase_name: if self.phased {
                Some(phase.name.clone())
            } else {
                None
            },
            text,
            used_tool,
            tags,
            fallback,
        };

        state.repetition.record(&turn.text);
        state.statistics.record_turn(&turn);
        if turn.has(Marker::ToolUse) {
            log::debug!("round {}: {} used the search tool", round, participant.name);
        }

        self.emit(DiscussionEvent::TurnCompleted {
            round,
            participant_name: turn.participant_name.clone(),
            text: turn.text.clone(),
            tokens_used,
            used_tool: turn.used_tool,
            tags: turn.tags.clone(),
        })
        .await;
        state.transcript.push(turn);

        pacer.after_round().await;
    }
}
