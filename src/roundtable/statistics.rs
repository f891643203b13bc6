//! Per-marker observations accumulated over a run. Reporting only.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::roundtable::classifier::Marker;
use crate::roundtable::transcript::Turn;

/// Characters of turn text kept as an excerpt for evidentiary and compromise observations.
pub const EXCERPT_CHARS: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub round_number: usize,
    pub participant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    observations: BTreeMap<Marker, Vec<Observation>>,
}

fn keeps_excerpt(marker: Marker) -> bool {
    matches!(marker, Marker::EvidentiaryClaim | Marker::Compromise)
}

impl RunStatistics {
    pub fn new() -> Self {
        RunStatistics::default()
    }

    /// Add one observation per tag on `turn`, in recording order.
    pub fn record_turn(&mut self, turn: &Turn) {
        for marker in &turn.tags {
            let excerpt = if keeps_excerpt(*marker) {
                Some(turn.text.chars().take(EXCERPT_CHARS).collect())
            } else {
                None
            };
            self.observations
                .entry(*marker)
                .or_insert_with(Vec::new)
                .push(Observation {
                    round_number: turn.round_number,
                    participant_name: turn.participant_name.clone(),
                    excerpt,
                });
        }
    }

    pub fn observations(&self, marker: Marker) -> &[Observation] {
        self.observations
            .get(&marker)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count(&self, marker: Marker) -> usize {
        self.observations(marker).len()
    }

    /// Observation counts per participant for `marker`, highest first, ties by name.
    pub fn counts_by_participant(&self, marker: Marker) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for observation in self.observations(marker) {
            *counts.entry(observation.participant_name.as_str()).or_insert(0) += 1;
        }
        let mut sorted: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted
    }
}
