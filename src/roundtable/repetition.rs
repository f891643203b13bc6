//! Rolling memory of what has already been said.
//!
//! Each recorded turn contributes a short fingerprint (its lead excerpt on one line). The
//! most recent ones are rendered into a "do not repeat" block for the next prompt. This is
//! a nudge only: nothing checks whether the model complied.
use std::collections::HashSet;

/// Characters kept from the start of a turn.
pub const DEFAULT_FINGERPRINT_CHARS: usize = 60;
/// Fingerprints surfaced in the constraint block.
pub const DEFAULT_SURFACED_POINTS: usize = 8;

/// Lead excerpt of `text`: first `max_chars` characters, newlines folded to spaces, trimmed,
/// with `...` appended when the text was longer.
pub fn fingerprint(text: &str, max_chars: usize) -> String {
    let mut summary: String = text
        .chars()
        .take(max_chars)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string();
    if text.chars().count() > max_chars {
        summary.push_str("...");
    }
    summary
}

#[derive(Clone, Debug)]
pub struct RepetitionTracker {
    fingerprint_chars: usize,
    points: Vec<String>,
    seen: HashSet<String>,
}

impl Default for RepetitionTracker {
    fn default() -> Self {
        RepetitionTracker::new(DEFAULT_FINGERPRINT_CHARS)
    }
}

impl RepetitionTracker {
    pub fn new(fingerprint_chars: usize) -> Self {
        RepetitionTracker {
            fingerprint_chars: fingerprint_chars.max(1),
            points: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Remember `text`. Returns `true` when a new fingerprint was added.
    pub fn record(&mut self, text: &str) -> bool {
        let point = fingerprint(text, self.fingerprint_chars);
        if point.is_empty() || point == "..." || self.seen.contains(&point) {
            return false;
        }
        self.seen.insert(point.clone());
        self.points.push(point);
        true
    }

    /// The last `limit` fingerprints in recording order.
    pub fn recent(&self, limit: usize) -> &[String] {
        let start = self.points.len().saturating_sub(limit);
        &self.points[start..]
    }

    /// Every fingerprint in recording order.
    pub fn points(&self) -> &[String] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The constraint block for `round_number`, or an empty string when there is nothing
    /// to forbid yet. Round 1 never receives one.
    pub fn render_constraint(&self, round_number: usize, limit: usize) -> String {
        if self.points.is_empty() || round_number <= 1 || limit == 0 {
            return String::new();
        }
        let mut block = String::from(
            "[No repetition] The points below were already made. \
             Bring something entirely different:\n",
        );
        for point in self.recent(limit) {
            block.push_str("  ✗ Already said: ");
            block.push_str(point);
            block.push('\n');
        }
        block.push_str("\nRepeating any of the above makes your turn invalid.");
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_truncates_on_chars() {
        let text = "é".repeat(70);
        let fp = fingerprint(&text, 60);
        assert_eq!(fp.chars().count(), 63);
        assert!(fp.ends_with("..."));
        assert_eq!(fingerprint("short\nline", 60), "short line");
    }

    #[test]
    fn test_record_deduplicates_and_skips_empty() {
        let mut tracker = RepetitionTracker::default();
        assert!(tracker.record("Walls are cheap."));
        assert!(!tracker.record("Walls are cheap."));
        assert!(!tracker.record("   \n "));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_constraint_surfaces_only_recent_points() {
        let mut tracker = RepetitionTracker::default();
        for i in 0..10 {
            tracker.record(&format!("point number {}", i));
        }
        let block = tracker.render_constraint(11, 8);
        assert!(!block.contains("point number 1\n"));
        assert!(block.contains("point number 2\n"));
        assert!(block.contains("point number 9\n"));
        assert_eq!(block.matches("Already said").count(), 8);
    }

    #[test]
    fn test_constraint_empty_in_first_round_or_without_memory() {
        let mut tracker = RepetitionTracker::default();
        assert_eq!(tracker.render_constraint(3, 8), "");
        tracker.record("something");
        assert_eq!(tracker.render_constraint(1, 8), "");
        assert_eq!(tracker.render_constraint(2, 0), "");
        assert!(!tracker.render_constraint(2, 8).is_empty());
    }
}
