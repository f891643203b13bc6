//! Keyword heuristics that tag each turn for end-of-run reporting.
//!
//! Vocabulary lives in a [`RuleTable`] (category to trigger terms), so a run in another
//! language swaps the table without touching the discussion loop. Tags never influence
//! control flow.
//!
//! ```rust
//! use roundtable::classifier::{Marker, TurnClassifier};
//!
//! let classifier = TurnClassifier::default();
//! let tags = classifier.classify("However, who pays for maintenance?");
//! assert!(tags.contains(&Marker::Disagreement));
//! assert!(tags.contains(&Marker::Question));
//! assert_eq!(tags.len(), 2);
//! ```
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Observational label attached to a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    /// Citation-like phrasing ("according to", a year, "measured").
    EvidentiaryClaim,
    ExtremeLanguage,
    Disagreement,
    Question,
    /// The completion service reported using its search tool.
    ToolUse,
    /// A mediator reached for compromise wording.
    Compromise,
}

impl Marker {
    pub const ALL: [Marker; 6] = [
        Marker::EvidentiaryClaim,
        Marker::ExtremeLanguage,
        Marker::Disagreement,
        Marker::Question,
        Marker::ToolUse,
        Marker::Compromise,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Marker::EvidentiaryClaim => "Evidentiary claims",
            Marker::ExtremeLanguage => "Extreme language",
            Marker::Disagreement => "Disagreements",
            Marker::Question => "Questions",
            Marker::ToolUse => "Search tool use",
            Marker::Compromise => "Mediator compromises",
        }
    }
}

/// Trigger terms per category. Matching is case-insensitive substring membership.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTable {
    pub evidentiary: Vec<String>,
    pub extreme: Vec<String>,
    pub disagreement: Vec<String>,
    pub question: Vec<String>,
    pub compromise: Vec<String>,
    /// Treat a standalone four-digit year (19xx or 20xx) as an evidentiary claim.
    pub detect_years: bool,
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|term| term.to_string()).collect()
}

impl RuleTable {
    /// English vocabulary. Terms match as substrings, not whole words, so "but" also fires
    /// on "about" and "must" on "mustard".
    pub fn english() -> Self {
        RuleTable {
            evidentiary: terms(&[
                "according to",
                "data shows",
                "study indicates",
                "research shows",
                "measured",
            ]),
            extreme: terms(&["must", "absolutely", "completely", "thoroughly", "definitely"]),
            disagreement: terms(&[
                "but",
                "however",
                "disagree",
                "question",
                "the problem is",
                "overlooks",
                "don't think",
                "worried",
                "risk",
            ]),
            question: terms(&["?", "？"]),
            compromise: terms(&["compromise", "combine", "at the same time"]),
            detect_years: true,
        }
    }

    pub fn traditional_chinese() -> Self {
        RuleTable {
            evidentiary: terms(&["根據", "數據顯示", "研究指出", "1999年", "測量"]),
            extreme: terms(&["必須", "絕對", "完全", "徹底", "一定"]),
            disagreement: terms(&[
                "但是", "然而", "不同意", "質疑", "問題是", "忽略了", "不認為", "擔心", "風險",
            ]),
            question: terms(&["？", "?"]),
            compromise: terms(&["折衷", "結合", "同時"]),
            detect_years: false,
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        RuleTable::english()
    }
}

/// Applies a [`RuleTable`] to turn text. Pure and idempotent.
#[derive(Clone, Debug)]
pub struct TurnClassifier {
    rules: RuleTable,
    lowered: LoweredRules,
}

#[derive(Clone, Debug)]
struct LoweredRules {
    evidentiary: Vec<String>,
    extreme: Vec<String>,
    disagreement: Vec<String>,
    question: Vec<String>,
    compromise: Vec<String>,
}

fn lower_all(list: &[String]) -> Vec<String> {
    list.iter()
        .filter(|term| !term.is_empty())
        .map(|term| term.to_lowercase())
        .collect()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

/// Whether `text` holds a four-digit run starting with 19 or 20 that is not part of a
/// longer number.
fn contains_year(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4 {
                let lead: String = chars[start..start + 2].iter().collect();
                if lead == "19" || lead == "20" {
                    return true;
                }
            }
        } else {
            i += 1;
        }
    }
    false
}

impl TurnClassifier {
    pub fn new(rules: RuleTable) -> Self {
        let lowered = LoweredRules {
            evidentiary: lower_all(&rules.evidentiary),
            extreme: lower_all(&rules.extreme),
            disagreement: lower_all(&rules.disagreement),
            question: lower_all(&rules.question),
            compromise: lower_all(&rules.compromise),
        };
        TurnClassifier { rules, lowered }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Text-derived markers only.
    pub fn classify(&self, text: &str) -> BTreeSet<Marker> {
        let lowered = text.to_lowercase();
        let mut tags = BTreeSet::new();
        if contains_any(&lowered, &self.lowered.evidentiary)
            || (self.rules.detect_years && contains_year(text))
        {
            tags.insert(Marker::EvidentiaryClaim);
        }
        if contains_any(&lowered, &self.lowered.extreme) {
            tags.insert(Marker::ExtremeLanguage);
        }
        if contains_any(&lowered, &self.lowered.disagreement) {
            tags.insert(Marker::Disagreement);
        }
        if contains_any(&lowered, &self.lowered.question) {
            tags.insert(Marker::Question);
        }
        tags
    }

    /// Full tag set for a turn: text markers, the reported tool flag, and compromise
    /// wording when the speaker is a mediator.
    pub fn classify_turn(&self, text: &str, used_tool: bool, is_mediator: bool) -> BTreeSet<Marker> {
        let mut tags = self.classify(text);
        if used_tool {
            tags.insert(Marker::ToolUse);
        }
        if is_mediator && contains_any(&text.to_lowercase(), &self.lowered.compromise) {
            tags.insert(Marker::Compromise);
        }
        tags
    }
}

impl Default for TurnClassifier {
    fn default() -> Self {
        TurnClassifier::new(RuleTable::default())
    }
}
