//! Ordered discussion phases mapped onto absolute round numbers.
//!
//! Each [`Phase`] owns a contiguous span of rounds. [`PhaseSchedule::phase_for`] walks the
//! cumulative spans in declared order and returns the first phase whose upper bound covers
//! the round. Rounds past the final bound resolve to the last phase; whether a run may rely
//! on that is decided by [`PhaseOverflow`] when the discussion is constructed.
//!
//! ```rust
//! use roundtable::phase::{Phase, PhaseSchedule};
//!
//! let schedule = PhaseSchedule::new(vec![
//!     Phase::new("Facts", 2, "Establish the facts."),
//!     Phase::new("Debate", 3, "Argue your position."),
//! ])
//! .unwrap();
//!
//! assert_eq!(schedule.phase_for(2).name, "Facts");
//! assert_eq!(schedule.phase_for(3).name, "Debate");
//! assert_eq!(schedule.phase_for(9).name, "Debate");
//! ```
use serde::{Deserialize, Serialize};

use crate::roundtable::discussion::DiscussionError;

/// A contiguous span of rounds sharing one discussion-goal instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub round_span: usize,
    pub instruction: String,
}

impl Phase {
    pub fn new(name: impl Into<String>, round_span: usize, instruction: impl Into<String>) -> Self {
        Phase {
            name: name.into(),
            round_span,
            instruction: instruction.into(),
        }
    }
}

/// What to do when a run has more rounds than the phases cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOverflow {
    /// The last phase absorbs every extra round.
    ExtendLast,
    /// Refuse to build the discussion.
    Reject,
}

impl Default for PhaseOverflow {
    fn default() -> Self {
        PhaseOverflow::ExtendLast
    }
}

#[derive(Clone, Debug)]
pub struct PhaseSchedule {
    phases: Vec<Phase>,
}

impl PhaseSchedule {
    pub fn new(phases: Vec<Phase>) -> Result<Self, DiscussionError> {
        if phases.is_empty() {
            return Err(DiscussionError::EmptyPhaseSchedule);
        }
        if let Some(phase) = phases.iter().find(|phase| phase.round_span == 0) {
            return Err(DiscussionError::InvalidConfig(format!(
                "phase '{}' has a round span of zero",
                phase.name
            )));
        }
        Ok(PhaseSchedule { phases })
    }

    /// A single phase with no instruction, covering every round.
    pub fn single(name: impl Into<String>, total_rounds: usize) -> Self {
        PhaseSchedule {
            phases: vec![Phase::new(name, total_rounds.max(1), "")],
        }
    }

    /// Zero-based index of the phase active in the given 1-based round.
    pub fn index_for(&self, round_number: usize) -> usize {
        let mut upper = 0;
        for (index, phase) in self.phases.iter().enumerate() {
            upper += phase.round_span;
            if round_number <= upper {
                return index;
            }
        }
        self.phases.len() - 1
    }

    pub fn phase_for(&self, round_number: usize) -> &Phase {
        &self.phases[self.index_for(round_number)]
    }

    /// Sum of all declared round spans.
    pub fn total_span(&self) -> usize {
        self.phases.iter().map(|phase| phase.round_span).sum()
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}
