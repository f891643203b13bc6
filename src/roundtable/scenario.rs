//! What a run talks about: topic, roster, phases and classifier vocabulary.
//!
//! Two built-in scenarios reproduce the landslide-remediation experiment this crate grew
//! out of. Custom scenarios are JSON documents with the same shape:
//!
//! ```json
//! {
//!   "title": "Bridge retrofit",
//!   "topic": "Retrofit the old bridge or replace it?",
//!   "participants": [
//!     {"name": "Engineer", "persona_instructions": "You are a structural engineer."},
//!     {"name": "Chair", "persona_instructions": "You chair the meeting.", "role": "mediator"}
//!   ],
//!   "phases": [{"name": "Open floor", "round_span": 6, "instruction": "State your case."}]
//! }
//! ```
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::roundtable::classifier::RuleTable;
use crate::roundtable::participant::{Participant, ParticipantRole};
use crate::roundtable::phase::Phase;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    pub topic: String,
    pub participants: Vec<Participant>,
    /// Empty for the simple variant, which runs as a single untitled phase.
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub vocabulary: RuleTable,
}

#[derive(Debug)]
pub enum ScenarioError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Io(err) => write!(f, "Failed to read scenario: {}", err),
            ScenarioError::Parse(err) => write!(f, "Invalid scenario JSON: {}", err),
        }
    }
}

impl Error for ScenarioError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScenarioError::Io(err) => Some(err),
            ScenarioError::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ScenarioError {
    fn from(err: std::io::Error) -> Self {
        ScenarioError::Io(err)
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        ScenarioError::Parse(err)
    }
}

const LANDSLIDE_TOPIC: &str = "For the follow-up remediation of the Tsaoling landslide, should we \
     pursue large-scale hard engineering or natural restoration?";

const LABEL_RULES: &str = "[Verification rules]\n\
     Search before citing: concrete numbers (costs, percentages, durations), specific cases \
     (places, years, outcomes), current regulations or technical standards.\n\
     No search needed: general principles and descriptions of method.\n\
     Every concrete figure or case must be labelled: [confirmed] when verified by search, \
     [estimate] when based on experience, [to verify] when it still needs checking.";

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let raw = fs::read_to_string(path)?;
        Scenario::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Three opinionated profiles, one of them a conflict-averse mediator.
    pub fn landslide_simple() -> Self {
        Scenario {
            title: "Closed-loop multi-agent experiment".to_string(),
            topic: LANDSLIDE_TOPIC.to_string(),
            participants: vec![
                Participant::from_profile(
                    "Engineer",
                    "Senior geotechnical expert who believes in hard engineering. Holds that \
                     every landslide can be solved with enough prestressed ground anchors and \
                     retaining walls, sees ecologists as unrealistic dreamers, and likes to \
                     quote (possibly nonexistent) high-strength material data.",
                    "Forceful, data-driven, slightly arrogant, heavy on engineering jargon such \
                     as safety factor and limit equilibrium analysis.",
                ),
                Participant::from_profile(
                    "Ecologist",
                    "Radical environmentalist who sees steel and concrete as the root cause of \
                     mountain destruction. Advocates nature-based solutions (NbS) and argues \
                     the geologically sensitive zone should be closed to all development.",
                    "Emotional, agitated, philosophical, fond of rhetorical questions, stresses \
                     long-term consequences.",
                ),
                Participant::from_profile(
                    "Mediator",
                    "Project manager who wants the project approved. Has little technical \
                     background and mostly wants both sides to stop arguing, so tends to \
                     blend the other two positions indiscriminately to reach consensus.",
                    "Smooth, hesitant, summarises in vague language. Catchphrase: 'perhaps we \
                     can find a compromise...'",
                )
                .with_role(ParticipantRole::Mediator),
            ],
            phases: Vec::new(),
            vocabulary: RuleTable::english(),
        }
    }

    /// Two experts with clear positions and a facilitator, over four goal-driven phases.
    pub fn landslide_phased() -> Self {
        let engineer = format!(
            "You are a senior geotechnical engineer with 20 years of slope-hazard remediation \
             experience.\n\n\
             [Your position]\n\
             You favour hard engineering (retaining walls, ground anchors, drainage): the effect \
             is quantifiable, fast, and the safety factor is controllable. You are conservative \
             about natural restoration, which you consider slow and hard to measure.\n\n\
             [Speaking principles]\n\
             1. Offer professional insight from an engineering angle\n\
             2. Search for concrete data supporting your view\n\
             3. You may raise technical doubts about the ecologist's claims\n\
             4. Length: 3-6 sentences\n\
             5. Never repeat what was already said\n\n{}",
            LABEL_RULES
        );
        let ecologist = format!(
            "You are an ecologist (PhD) specialising in landslide restoration and nature-based \
             solutions (NbS).\n\n\
             [Your position]\n\
             You favour natural restoration and eco-engineering: sustainable in the long run, \
             cheaper, with high ecological benefit. You are cautious about hard engineering, \
             which may damage ecosystems and is costly to maintain.\n\n\
             [Speaking principles]\n\
             1. Offer professional insight from an ecological angle\n\
             2. Search for concrete cases or data supporting your view\n\
             3. You may raise ecological doubts about the engineer's claims\n\
             4. Length: 3-6 sentences\n\
             5. Never repeat what was already said\n\n{}",
            LABEL_RULES
        );
        let facilitator = "You are the discussion facilitator, responsible for moving the \
             discussion forward and reaching a conclusion.\n\n\
             [Your role]\n\
             1. Do not state a technical position of your own\n\
             2. Organise the differences and common ground between both sides\n\
             3. Ask questions that deepen the discussion\n\
             4. In later rounds, help build a workable plan\n\n\
             [Principles]\n\
             1. Use concise bullet points\n\
             2. Do not search yourself; leave searching to the experts\n\
             3. Do not repeat others, only structure what was said\n\n\
             [Right to ask]\n\
             If an expert cites a concrete figure without labelling its source, you may gently \
             ask whether it was verified or suggest searching for it. Only do this for key \
             figures; the expert decides whether to search.";

        Scenario {
            title: "Phased multi-agent experiment with cross-examination".to_string(),
            topic: LANDSLIDE_TOPIC.to_string(),
            participants: vec![
                Participant::new("Engineer", engineer).with_search_affinity(vec![
                    "cost, service life and success cases of retaining walls and ground anchors",
                    "engineering remediation of comparable landslides",
                    "engineering failure cases",
                ]),
                Participant::new("Ecologist", ecologist).with_search_affinity(vec![
                    "successful natural restoration of landslide areas",
                    "vegetation recovery rates and soil stabilisation studies",
                    "eco-engineering versus conventional engineering comparisons",
                    "international NbS cases",
                ]),
                Participant::new("Facilitator", facilitator)
                    .with_role(ParticipantRole::Mediator),
            ],
            phases: vec![
                Phase::new(
                    "Fact finding",
                    6,
                    "[Phase 1: fact finding]\n\
                     Goal: search for and confirm the basic facts about the landslide.\n\
                     Engineer: scale of the collapse, geology, past engineering work.\n\
                     Ecologist: current local ecology, vegetation types, restoration potential.\n\
                     Facilitator: list what is confirmed and what is still open.\n\
                     Each person covers a different aspect; do not duplicate each other's searches.",
                ),
                Phase::new(
                    "Proposal debate",
                    6,
                    "[Phase 2: proposal debate]\n\
                     Goal: each side presents evidence for its position.\n\
                     Engineer: cases, data and advantages of hard engineering.\n\
                     Ecologist: cases, data and advantages of natural restoration.\n\
                     Facilitator: lay out where the arguments differ.\n\
                     This is a debate: voice disagreement and do not compromise too early.",
                ),
                Phase::new(
                    "Challenge and response",
                    4,
                    "[Phase 3: challenge and response]\n\
                     Goal: challenge the other side's claims and ask for evidence.\n\
                     Engineer: question the effect, speed and reliability of natural restoration, \
                     and whether the other side's figures were verified by search.\n\
                     Ecologist: question ecological damage, maintenance cost and long-term risk \
                     of hard engineering, and whether the other side's figures were verified.\n\
                     Facilitator: summarise the core disagreements and flag unverified key figures.\n\
                     Ask sharp but professional questions, such as: can this figure be confirmed \
                     by a search?",
                ),
                Phase::new(
                    "Consensus building",
                    4,
                    "[Phase 4: consensus building]\n\
                     Goal: find an integrated plan.\n\
                     1. How to balance short-term safety against long-term sustainability?\n\
                     2. Can high-risk and low-risk zones be handled differently?\n\
                     3. Which additional surveys are needed before deciding?\n\
                     4. What are the concrete next steps?\n\
                     Make concrete, feasible proposals rather than vague conclusions.",
                ),
            ],
            vocabulary: RuleTable::english(),
        }
    }
}
