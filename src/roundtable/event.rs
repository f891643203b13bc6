//! Discussion event system.
//!
//! Implement [`EventHandler`] to follow a run as it happens: run start and end, phase
//! boundaries, each turn being requested and recorded, and collaborator failures that were
//! replaced by a placeholder. The handler has a default no-op implementation, so only
//! override what you need. Register it with
//! [`Discussion::with_event_handler`](crate::discussion::Discussion::with_event_handler).
//!
//! # Example
//!
//! ```rust,no_run
//! use roundtable::event::{DiscussionEvent, EventHandler};
//! use async_trait::async_trait;
//!
//! struct Progress;
//!
//! #[async_trait]
//! impl EventHandler for Progress {
//!     async fn on_discussion_event(&self, event: &DiscussionEvent) {
//!         if let DiscussionEvent::TurnStarted { round, total_rounds, participant_name, .. } = event {
//!             println!("Round {}/{} - {} is speaking...", round, total_rounds, participant_name);
//!         }
//!     }
//! }
//! ```
use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::roundtable::classifier::Marker;

/// Events emitted by [`Discussion::run`](crate::discussion::Discussion::run).
///
/// ```text
/// RunStarted
///   └─ PhaseEntered            (round 1, then whenever the phase name changes)
///   └─ TurnStarted
///   └─ TurnFailed              (only when the call failed)
///   └─ TurnCompleted           (also for the placeholder turn)
///   └─ ...                     (repeated for every round)
/// RunCompleted
/// ```
#[derive(Debug, Clone)]
pub enum DiscussionEvent {
    RunStarted {
        run_id: String,
        title: String,
        topic: String,
        model: String,
        temperature: f32,
        total_rounds: usize,
        participant_count: usize,
    },
    /// The active phase changed (always emitted for the first round).
    PhaseEntered {
        round: usize,
        phase_index: usize,
        phase_name: String,
    },
    TurnStarted {
        round: usize,
        total_rounds: usize,
        participant_name: String,
        /// Characters in the assembled prompt.
        prompt_chars: usize,
    },
    TurnCompleted {
        round: usize,
        participant_name: String,
        text: String,
        tokens_used: Option<usize>,
        used_tool: bool,
        tags: BTreeSet<Marker>,
    },
    /// The call failed and a placeholder utterance was recorded instead.
    TurnFailed {
        round: usize,
        participant_name: String,
        error: String,
    },
    RunCompleted {
        run_id: String,
        rounds: usize,
        total_tokens: usize,
        fallback_turns: usize,
    },
}

/// Receives [`DiscussionEvent`]s. Shared as `Arc<dyn EventHandler>`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_discussion_event(&self, _event: &DiscussionEvent) {}
}
