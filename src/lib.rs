//! # roundtable
//!
//! roundtable is an experiment harness for scripted multi-party conversations between
//! simulated participants. It drives a round-robin discussion through repeated calls to a
//! language-model completion service, records everything that was said, tags each turn
//! with keyword heuristics, and writes a transcript plus a statistics report. A separate
//! analysis step re-reads a transcript and asks a model for a structured deep analysis.
//!
//! The crate provides:
//!
//! * **Discussion loop**: [`Discussion`] sequences turns by strict rotation, resolves the
//!   active [`phase`], renders a bounded context window from the [`transcript`], injects an
//!   anti-repetition block built by the [`repetition`] tracker, and falls back to a placeholder
//!   utterance when a call fails
//! * **Classification**: [`classifier`] applies a swappable keyword [`classifier::RuleTable`]
//!   and [`statistics`] accumulates the observations for reporting
//! * **Resilience**: [`resilience`] wraps clients with retry/backoff and paces calls with a
//!   fixed delay or a token bucket
//! * **Reports**: [`report`] renders Markdown and a structured JSON record; [`analysis`]
//!   reconstructs turns and renders the deep analysis report
//! * **Provider seam**: [`ClientWrapper`] with an OpenAI implementation in [`clients`]
//!
//! ## Running a discussion
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roundtable::clients::openai::OpenAIClient;
//! use roundtable::config::DiscussionConfig;
//! use roundtable::report::write_artifacts;
//! use roundtable::scenario::Scenario;
//! use roundtable::Discussion;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     roundtable::init_logger();
//!     let client = Arc::new(OpenAIClient::from_env("gpt-4o-mini")?);
//!
//!     let discussion = Discussion::new(
//!         Scenario::landslide_simple(),
//!         DiscussionConfig::simple().with_total_rounds(9),
//!         client,
//!     )?;
//!
//!     let outcome = discussion.run().await;
//!     let artifacts = write_artifacts(&outcome, ".")?;
//!     println!("transcript: {}", artifacts.transcript_markdown.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Testing against a scripted client
//!
//! Anything implementing [`ClientWrapper`] can drive a discussion, which is how the tests
//! exercise the loop without network access:
//!
//! ```rust
//! use async_trait::async_trait;
//! use roundtable::client_wrapper::{ClientError, ClientWrapper, Completion, CompletionRequest};
//! use roundtable::config::DiscussionConfig;
//! use roundtable::participant::Participant;
//! use roundtable::scenario::Scenario;
//! use roundtable::Discussion;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ClientWrapper for Echo {
//!     fn model_name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ClientError> {
//!         let speaker = request.speaker_name.clone().unwrap_or_default();
//!         Ok(Completion::text(format!("{} has spoken.", speaker)))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scenario = Scenario {
//!     title: "Doc".into(),
//!     topic: "Walls or trees?".into(),
//!     participants: vec![Participant::new("A", "a"), Participant::new("B", "b")],
//!     phases: Vec::new(),
//!     vocabulary: Default::default(),
//! };
//! let config = DiscussionConfig::simple().with_total_rounds(3).without_delays();
//! let outcome = Discussion::new(scenario, config, Arc::new(Echo)).unwrap().run().await;
//!
//! let speakers: Vec<_> = outcome.turns().map(|t| t.participant_name.as_str()).collect();
//! assert_eq!(speakers, vec!["A", "B", "A"]);
//! # }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Library code only talks to the `log` facade; binaries and tests opt in to `RUST_LOG`
/// driven output by calling this helper.
///
/// ```rust
/// roundtable::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `roundtable` module.
pub mod roundtable;

// Re-exporting key items for easier external access.
pub use crate::roundtable::analysis;
pub use crate::roundtable::classifier;
pub use crate::roundtable::classifier::{Marker, RuleTable, TurnClassifier};
pub use crate::roundtable::client_wrapper;
pub use crate::roundtable::client_wrapper::{
    ClientError, ClientWrapper, Completion, CompletionRequest, Message, Role, TokenUsage,
};
pub use crate::roundtable::clients;
pub use crate::roundtable::config;
pub use crate::roundtable::config::{DiscussionConfig, Variant};
pub use crate::roundtable::discussion;
pub use crate::roundtable::discussion::{Discussion, DiscussionError, DiscussionOutcome};
pub use crate::roundtable::event;
pub use crate::roundtable::event::{DiscussionEvent, EventHandler};
pub use crate::roundtable::participant;
pub use crate::roundtable::participant::{Participant, ParticipantRegistry, ParticipantRole};
pub use crate::roundtable::phase;
pub use crate::roundtable::phase::{Phase, PhaseOverflow, PhaseSchedule};
pub use crate::roundtable::prompt;
pub use crate::roundtable::repetition;
pub use crate::roundtable::report;
pub use crate::roundtable::resilience;
pub use crate::roundtable::scenario;
pub use crate::roundtable::scenario::Scenario;
pub use crate::roundtable::statistics;
pub use crate::roundtable::transcript;
pub use crate::roundtable::transcript::{Transcript, Turn};
