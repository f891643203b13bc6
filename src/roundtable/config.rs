//! Run configuration for a discussion.
//!
//! [`DiscussionConfig`] is a plain struct; build it from one of the presets and adjust with
//! the `with_*` methods. No config-file format is involved (scenarios, which carry the
//! content of a run, are loaded separately by [`crate::scenario`]).
//!
//! ```rust
//! use roundtable::config::{DiscussionConfig, Variant};
//!
//! let config = DiscussionConfig::phased()
//!     .with_total_rounds(12)
//!     .without_delays();
//!
//! assert_eq!(config.variant, Variant::Phased);
//! assert_eq!(config.context_window, Some(8));
//! assert!(config.tool_use);
//! ```
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::roundtable::phase::PhaseOverflow;
use crate::roundtable::repetition::{DEFAULT_FINGERPRINT_CHARS, DEFAULT_SURFACED_POINTS};
use crate::roundtable::resilience::{PacingPolicy, RetryPolicy};

/// Which orchestration loop to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Persona as system message, whole transcript as context, no phases or
    /// anti-repetition, compromise tracking for the mediator.
    Simple,
    /// Recent-window context, phase instructions, anti-repetition constraint, search tool.
    Phased,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Simple => "simple",
            Variant::Phased => "phased",
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Variant::Simple),
            "phased" => Ok(Variant::Phased),
            other => Err(format!("unknown variant '{}', expected simple or phased", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiscussionConfig {
    pub variant: Variant,
    pub total_rounds: usize,
    /// Sampling temperature, fixed for the whole run.
    pub temperature: f32,
    /// Ask the completion service to expose its search tool.
    pub tool_use: bool,
    /// Entries of recent transcript sent as context; `None` sends everything.
    pub context_window: Option<usize>,
    /// Fingerprints surfaced in the anti-repetition block (phased variant only).
    pub repetition_limit: usize,
    pub fingerprint_chars: usize,
    /// Upper bound on completion length, passed through to the service.
    pub max_tokens: Option<u32>,
    /// Wait after a failed call before the placeholder utterance is recorded.
    pub fallback_delay: Duration,
    pub pacing: PacingPolicy,
    pub retry: RetryPolicy,
    pub phase_overflow: PhaseOverflow,
    /// Label written into report headers. Defaults to the client's model name when `None`.
    pub model_label: Option<String>,
}

impl DiscussionConfig {
    /// High-variability loop over the whole transcript.
    pub fn simple() -> Self {
        DiscussionConfig {
            variant: Variant::Simple,
            total_rounds: 20,
            temperature: 0.9,
            tool_use: false,
            context_window: None,
            repetition_limit: 0,
            fingerprint_chars: DEFAULT_FINGERPRINT_CHARS,
            max_tokens: Some(500),
            fallback_delay: Duration::from_secs(5),
            pacing: PacingPolicy::default(),
            retry: RetryPolicy::none(),
            phase_overflow: PhaseOverflow::ExtendLast,
            model_label: None,
        }
    }

    /// Phase-driven loop with search and anti-repetition.
    pub fn phased() -> Self {
        DiscussionConfig {
            variant: Variant::Phased,
            temperature: 0.5,
            tool_use: true,
            context_window: Some(8),
            repetition_limit: DEFAULT_SURFACED_POINTS,
            max_tokens: None,
            ..DiscussionConfig::simple()
        }
    }

    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Simple => DiscussionConfig::simple(),
            Variant::Phased => DiscussionConfig::phased(),
        }
    }

    pub fn with_total_rounds(mut self, total_rounds: usize) -> Self {
        self.total_rounds = total_rounds;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tool_use(mut self, tool_use: bool) -> Self {
        self.tool_use = tool_use;
        self
    }

    pub fn with_context_window(mut self, context_window: Option<usize>) -> Self {
        self.context_window = context_window;
        self
    }

    pub fn with_repetition_limit(mut self, limit: usize) -> Self {
        self.repetition_limit = limit;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_phase_overflow(mut self, overflow: PhaseOverflow) -> Self {
        self.phase_overflow = overflow;
        self
    }

    pub fn with_model_label(mut self, label: impl Into<String>) -> Self {
        self.model_label = Some(label.into());
        self
    }

    /// Zero the fallback delay and disable pacing. Used by tests and dry runs.
    pub fn without_delays(mut self) -> Self {
        self.fallback_delay = Duration::from_millis(0);
        self.pacing = PacingPolicy::None;
        self
    }

    /// Whether the anti-repetition block is assembled for this run.
    pub fn anti_repetition(&self) -> bool {
        self.variant == Variant::Phased && self.repetition_limit > 0
    }
}

impl Default for DiscussionConfig {
    fn default() -> Self {
        DiscussionConfig::phased()
    }
}
