//! Role-bound participants and the fixed rotation that decides who speaks.
//!
//! A [`Participant`] carries a stable name and an immutable persona block. The
//! [`ParticipantRegistry`] owns the roster for a run and answers "who speaks in round N"
//! by strict rotation: `registry[(round - 1) % count]`.
//!
//! ```rust
//! use roundtable::participant::{Participant, ParticipantRegistry, ParticipantRole};
//!
//! let registry = ParticipantRegistry::new(vec![
//!     Participant::new("Engineer", "You are a geotechnical engineer."),
//!     Participant::new("Ecologist", "You are an ecologist."),
//!     Participant::new("Mediator", "You are a project manager.").with_role(ParticipantRole::Mediator),
//! ])
//! .unwrap();
//!
//! assert_eq!(registry.for_round(1).name, "Engineer");
//! assert_eq!(registry.for_round(6).name, "Mediator");
//! ```
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::roundtable::discussion::DiscussionError;

/// Whether a participant argues a position or tries to broker agreement.
///
/// Mediators are the only participants checked for compromise language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Panelist,
    Mediator,
}

impl Default for ParticipantRole {
    fn default() -> Self {
        ParticipantRole::Panelist
    }
}

/// A role-bound identity with fixed persona instructions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique display name, also used as the lookup key.
    pub name: String,
    /// Character background, stylistic directives and task rules.
    pub persona_instructions: String,
    #[serde(default)]
    pub role: ParticipantRole,
    /// Topics this participant is expected to look up when search is available.
    #[serde(default)]
    pub search_affinity: Vec<String>,
}

impl Participant {
    pub fn new(name: impl Into<String>, persona_instructions: impl Into<String>) -> Self {
        Participant {
            name: name.into(),
            persona_instructions: persona_instructions.into(),
            role: ParticipantRole::Panelist,
            search_affinity: Vec::new(),
        }
    }

    /// Compile a persona block from a short description and a speaking style.
    pub fn from_profile(name: &str, description: &str, style: &str) -> Self {
        let persona = format!(
            "You are now {name}.\n\n\
             Persona and background: {description}\n\n\
             Speaking style: {style}\n\n\
             Task rules:\n\
             1. Respond to the conversation so far with your own view\n\
             2. Do not repeat what others said; rebut or extend it with your expertise\n\
             3. You may cite concrete figures, and sound certain even when you are not\n\
             4. Stay in character and do not compromise\n\
             5. Keep your reply within 3-5 sentences",
            name = name,
            description = description,
            style = style
        );
        Participant::new(name, persona)
    }

    pub fn with_role(mut self, role: ParticipantRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_search_affinity<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_affinity = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_mediator(&self) -> bool {
        self.role == ParticipantRole::Mediator
    }
}

/// The fixed roster of a run, read-only once constructed.
#[derive(Clone, Debug)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    /// Build a registry, rejecting an empty roster and duplicate names.
    pub fn new(participants: Vec<Participant>) -> Result<Self, DiscussionError> {
        if participants.is_empty() {
            return Err(DiscussionError::NoParticipants);
        }
        let mut seen = HashSet::new();
        for participant in &participants {
            if !seen.insert(participant.name.as_str()) {
                return Err(DiscussionError::DuplicateParticipant(
                    participant.name.clone(),
                ));
            }
        }
        Ok(ParticipantRegistry { participants })
    }

    /// Participant at rotation position `index`, wrapping around the roster.
    pub fn get(&self, index: usize) -> &Participant {
        &self.participants[index % self.participants.len()]
    }

    pub fn count(&self) -> usize {
        self.participants.len()
    }

    /// The participant who speaks in the given 1-based round.
    pub fn for_round(&self, round_number: usize) -> &Participant {
        self.get(round_number.saturating_sub(1))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Participant> {
        vec![
            Participant::new("A", "a"),
            Participant::new("B", "b"),
            Participant::new("C", "c"),
        ]
    }

    #[test]
    fn test_rotation_is_strict() {
        let registry = ParticipantRegistry::new(roster()).unwrap();
        let names: Vec<&str> = (1..=7)
            .map(|round| registry.for_round(round).name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "C", "A", "B", "C", "A"]);
    }

    #[test]
    fn test_empty_roster_is_rejected() {
        let err = ParticipantRegistry::new(Vec::new()).unwrap_err();
        assert!(matches!(err, DiscussionError::NoParticipants));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut participants = roster();
        participants.push(Participant::new("B", "again"));
        let err = ParticipantRegistry::new(participants).unwrap_err();
        assert!(matches!(err, DiscussionError::DuplicateParticipant(name) if name == "B"));
    }

    #[test]
    fn test_profile_persona_mentions_name_and_style() {
        let p = Participant::from_profile("Engineer", "Veteran engineer.", "Assertive.");
        assert!(p.persona_instructions.starts_with("You are now Engineer."));
        assert!(p.persona_instructions.contains("Speaking style: Assertive."));
        assert!(!p.is_mediator());
    }
}
