//! Farthest-failure tracking
//!
//! Atomic matchers report every attempt. Only attempts whose outcome equals
//! the inversion flag count as failures: outside a negative lookahead that is
//! a failed match, inside one it is a successful match (prefixed with `!`).
//! A farther failure replaces the expected set, an equal one joins it, a
//! nearer one is ignored.
//!
//! Only the byte offset is kept; the line and column are worked out once,
//! when the failure is reported.

use std::collections::BTreeSet;

/// Descriptor recorded when any-char succeeds under a negative lookahead
const NOT_ANY: &str = "!.";

/// Per-parse farthest-failure record
#[derive(Debug, Clone, Default)]
pub struct FailureTracker {
    farthest: usize,
    expected: BTreeSet<String>,
    inverted: bool,
}

impl FailureTracker {
    /// Create an empty tracker positioned at the start of input
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an atomic match attempt at byte `offset`
    pub fn record(&mut self, matched: bool, offset: usize, descriptor: &str) {
        if matched != self.inverted {
            return;
        }
        if offset < self.farthest {
            return;
        }
        if offset > self.farthest {
            self.farthest = offset;
            self.expected.clear();
        }

        if self.inverted {
            self.expected.insert(format!("!{}", descriptor));
        } else if !self.expected.contains(descriptor) {
            self.expected.insert(descriptor.to_string());
        }
    }

    /// Toggle inversion; called on entry to and exit from a negative lookahead
    #[inline]
    pub fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    /// Whether expectations are currently inverted
    #[inline]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Byte offset of the farthest failure
    #[inline]
    pub fn farthest(&self) -> usize {
        self.farthest
    }

    /// Expected descriptors at the farthest failure: sorted, with the
    /// end-of-input expectation rendered as `EOF` and moved last
    pub fn expected(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .expected
            .iter()
            .filter(|d| d.as_str() != NOT_ANY)
            .cloned()
            .collect();
        if self.expected.contains(NOT_ANY) {
            out.push("EOF".to_string());
        }
        out
    }
}

/// Join items as `a, b or c`
pub fn list_join(items: &[String], sep: &str, last_sep: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} {} {}", init.join(sep), last_sep, last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_farther_replaces_equal_unions_nearer_ignored() {
        let mut tracker = FailureTracker::new();
        tracker.record(false, 2, "\"a\"");
        tracker.record(false, 2, "\"b\"");
        assert_eq!(tracker.expected(), vec!["\"a\"", "\"b\""]);

        tracker.record(false, 1, "\"c\"");
        assert_eq!(tracker.expected(), vec!["\"a\"", "\"b\""]);

        tracker.record(false, 5, "[0-9]");
        assert_eq!(tracker.farthest(), 5);
        assert_eq!(tracker.expected(), vec!["[0-9]"]);
    }

    #[test]
    fn test_successes_ignored_outside_inversion() {
        let mut tracker = FailureTracker::new();
        tracker.record(true, 3, "\"a\"");
        assert!(tracker.expected().is_empty());
        assert_eq!(tracker.farthest(), 0);
    }

    #[test]
    fn test_inverted_records_successes() {
        let mut tracker = FailureTracker::new();
        tracker.invert();
        tracker.record(false, 1, "\"x\"");
        tracker.record(true, 1, "\"y\"");
        tracker.invert();
        assert!(!tracker.is_inverted());
        assert_eq!(tracker.expected(), vec!["!\"y\""]);
    }

    #[test]
    fn test_eof_goes_last() {
        let mut tracker = FailureTracker::new();
        tracker.record(false, 4, "\"z\"");
        tracker.invert();
        tracker.record(true, 4, ".");
        tracker.invert();
        tracker.record(false, 4, "\"a\"");
        assert_eq!(tracker.expected(), vec!["\"a\"", "\"z\"", "EOF"]);
    }

    #[test]
    fn test_list_join() {
        let items = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(list_join(&items(&[]), ", ", "or"), "");
        assert_eq!(list_join(&items(&["a"]), ", ", "or"), "a");
        assert_eq!(list_join(&items(&["a", "b"]), ", ", "or"), "a or b");
        assert_eq!(list_join(&items(&["a", "b", "c"]), ", ", "or"), "a, b or c");
    }
}
