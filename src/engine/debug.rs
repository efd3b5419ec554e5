//! Parse tracing
//!
//! With [`ParseOptions::debug`](super::parser::ParseOptions) set, the parser
//! records every rule and expression it enters, and how each attempt ended.
//! The trace is returned with the parse output; [`ParseTrace::format`] renders
//! it as an indented listing.

use super::grammar::{ExprId, Grammar};
use super::source_location::SourcePosition;
use serde::Serialize;
use std::fmt::Write;

/// What a trace entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraceTarget {
    /// A rule, by index
    Rule(usize),
    /// An expression node, by id
    Expr(ExprId),
}

/// Trace action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraceAction {
    /// Started evaluating
    Enter,
    /// Successfully matched
    Match {
        /// The length of the matched input in bytes
        length: usize,
    },
    /// Failed to match
    Fail,
    /// Answered from the memo table
    CacheHit,
}

/// A single trace entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// Cursor position when the entry was recorded
    pub position: SourcePosition,
    /// Rule or expression involved
    pub target: TraceTarget,
    /// What happened
    pub action: TraceAction,
    /// Nesting depth
    pub depth: usize,
}

/// Debug trace for parsing
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseTrace {
    /// Trace entries
    pub entries: Vec<TraceEntry>,
}

impl ParseTrace {
    /// Create a new empty trace
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an entry
    pub fn add(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the trace is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count entries with a given action
    pub fn count(&self, action: TraceAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// Format as a readable string
    pub fn format<T>(&self, grammar: &Grammar<T>) -> String {
        let mut output = String::new();
        for entry in &self.entries {
            let indent = "  ".repeat(entry.depth);
            match entry.action {
                TraceAction::Enter => {
                    let _ = writeln!(
                        output,
                        "{}-> {} at {}",
                        indent,
                        describe(grammar, entry.target),
                        entry.position
                    );
                }
                TraceAction::Match { length } => {
                    let _ = writeln!(output, "{}   MATCH {} bytes", indent, length);
                }
                TraceAction::Fail => {
                    let _ = writeln!(output, "{}   FAIL", indent);
                }
                TraceAction::CacheHit => {
                    let _ = writeln!(
                        output,
                        "{}   cache hit: {}",
                        indent,
                        describe(grammar, entry.target)
                    );
                }
            }
        }
        output
    }
}

fn describe<T>(grammar: &Grammar<T>, target: TraceTarget) -> String {
    match target {
        TraceTarget::Rule(index) => match grammar.rule(index) {
            Some(rule) => format!("rule {}", rule.name),
            None => format!("rule #{}", index),
        },
        TraceTarget::Expr(id) => match grammar.node(id) {
            Some(node) => format!("{} #{}", node.expr.kind_name(), id),
            None => format!("expr #{}", id),
        },
    }
}
