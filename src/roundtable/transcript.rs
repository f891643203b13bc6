//! The append-only record of a discussion and its bounded prompt view.
//!
//! A [`Transcript`] starts with one synthetic topic entry and grows by one [`Turn`] per
//! round. Nothing is ever mutated or removed. Prompt context is a *view*: [`window`] returns
//! a contiguous suffix of the entries and [`render_entries`] turns it into
//! `Speaker: text` lines.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::roundtable::classifier::Marker;

/// Speaker label used for the synthetic topic entry.
pub const TOPIC_SPEAKER: &str = "System";

/// One utterance produced in one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub round_number: usize,
    pub participant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_name: Option<String>,
    pub text: String,
    #[serde(default)]
    pub used_tool: bool,
    #[serde(default)]
    pub tags: BTreeSet<Marker>,
    /// `true` when `text` is the placeholder substituted after a failed call.
    #[serde(default)]
    pub fallback: bool,
}

impl Turn {
    pub fn has(&self, marker: Marker) -> bool {
        self.tags.contains(&marker)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Topic { text: String },
    Turn(Turn),
}

impl TranscriptEntry {
    pub fn speaker(&self) -> &str {
        match self {
            TranscriptEntry::Topic { .. } => TOPIC_SPEAKER,
            TranscriptEntry::Turn(turn) => &turn.participant_name,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            TranscriptEntry::Topic { text } => text,
            TranscriptEntry::Turn(turn) => &turn.text,
        }
    }

    /// `Speaker: text`, the line format used for prompt context.
    pub fn render_line(&self) -> String {
        format!("{}: {}", self.speaker(), self.text())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Transcript::default()
    }

    pub fn with_topic(topic: impl Into<String>) -> Self {
        Transcript {
            entries: vec![TranscriptEntry::Topic { text: topic.into() }],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.entries.push(TranscriptEntry::Turn(turn));
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.entries.iter().filter_map(|entry| match entry {
            TranscriptEntry::Turn(turn) => Some(turn),
            TranscriptEntry::Topic { .. } => None,
        })
    }

    pub fn topic(&self) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            TranscriptEntry::Topic { text } => Some(text.as_str()),
            TranscriptEntry::Turn(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the last `max_size` entries, or everything when `None`.
    pub fn render_window(&self, max_size: Option<usize>) -> String {
        match max_size {
            Some(max_size) => render_entries(window(&self.entries, max_size)),
            None => render_entries(&self.entries),
        }
    }
}

/// The last `max_size` entries in original order, or all of them if there are fewer.
pub fn window(entries: &[TranscriptEntry], max_size: usize) -> &[TranscriptEntry] {
    let start = entries.len().saturating_sub(max_size);
    &entries[start..]
}

pub fn render_entries(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(TranscriptEntry::render_line)
        .collect::<Vec<_>>()
        .join("\n")
}
