//! Error types
//!
//! Ordinary match failure never appears here: it only drives backtracking.
//! What does reach the caller is a [`ParserError`] per reportable fault,
//! collected in an [`ErrorList`]. Each renders as
//!
//! ```text
//! source:line:col (offset): rule "display name": message
//! ```
//!
//! with the source name and rule context omitted when unknown.

use super::grammar::ExprId;
use super::source_location::SourcePosition;
use std::fmt;
use thiserror::Error;

/// Fault returned by a semantic action or predicate callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
}

impl ActionError {
    /// Create an action error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Unexpected runtime fault raised during evaluation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// A rule reference without a name, at its grammar-source position
    #[error("{0}: invalid rule: missing name")]
    MissingRuleName(SourcePosition),

    /// An expression id outside the grammar
    #[error("unknown expression {0}")]
    UnknownExpr(ExprId),

    /// A rule index outside the grammar
    #[error("unknown rule {0}")]
    UnknownRule(usize),

    /// An action, predicate or class node with nothing bound to it
    #[error("{pos}: no callback bound to expression {id}")]
    UnboundCallback {
        /// The node
        id: ExprId,
        /// Its grammar-source position
        pos: SourcePosition,
    },

    /// Rule nesting exceeded the configured limit
    #[error("maximum recursion depth exceeded: {depth} > {max_depth}")]
    RecursionLimit {
        /// Depth reached
        depth: usize,
        /// Configured limit
        max_depth: usize,
    },

    /// A callback panicked
    #[error("{0}")]
    Panic(String),
}

/// Kind of a reportable fault
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Total match failure with no other fault recorded
    #[error("no match found, expected: {}", super::failure::list_join(.expected, ", ", "or"))]
    NoMatch {
        /// Descriptors expected at the farthest failure
        expected: Vec<String>,
    },

    /// Reference to a rule the grammar does not define
    #[error("undefined rule: {0}")]
    UndefinedRule(String),

    /// Malformed UTF-8 in the input
    #[error("invalid encoding")]
    InvalidEncoding,

    /// A semantic action or predicate returned an error
    #[error("{0}")]
    SemanticAction(ActionError),

    /// The grammar has no rules
    #[error("grammar has no rule")]
    NoRules,

    /// Unexpected runtime fault, recovered
    #[error("{0}")]
    Internal(Fault),
}

/// A positioned, reportable fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserError {
    /// Name of the parsed source (may be empty)
    pub source_name: String,
    /// Where the fault was detected
    pub position: SourcePosition,
    /// Display name of the innermost rule being evaluated, if any
    pub rule: Option<String>,
    /// What went wrong
    pub kind: ErrorKind,
}

impl ParserError {
    /// Create a new error
    pub fn new(
        source_name: impl Into<String>,
        position: SourcePosition,
        rule: Option<String>,
        kind: ErrorKind,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            position,
            rule,
            kind,
        }
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.source_name.is_empty() {
            write!(f, "{}:", self.source_name)?;
        }
        write!(f, "{}", self.position)?;
        if let Some(rule) = &self.rule {
            write!(f, ": rule \"{}\"", rule)?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl std::error::Error for ParserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Ordered, deduplicated list of reportable faults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList {
    errors: Vec<ParserError>,
}

impl ErrorList {
    /// Build a list, dropping errors whose rendered message repeats an
    /// earlier one
    pub fn new(errors: Vec<ParserError>) -> Self {
        let mut seen = hashbrown::HashSet::with_hasher(ahash::RandomState::new());
        let errors = errors
            .into_iter()
            .filter(|e| seen.insert(e.to_string()))
            .collect();
        Self { errors }
    }

    /// Check if no fault was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of faults
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over faults in the order they were recorded
    pub fn iter(&self) -> std::slice::Iter<'_, ParserError> {
        self.errors.iter()
    }

    /// Rendered messages, one per fault
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Take the faults
    pub fn into_vec(self) -> Vec<ParserError> {
        self.errors
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a ParserError;
    type IntoIter = std::slice::Iter<'a, ParserError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl IntoIterator for ErrorList {
    type Item = ParserError;
    type IntoIter = std::vec::IntoIter<ParserError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Grammar construction error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// A node or rule refers to an expression id past the end of the arena
    #[error("expression {parent} refers to missing expression {child}")]
    DanglingExpr {
        /// Referring node (or rule index for rule bodies)
        parent: String,
        /// Missing id
        child: ExprId,
    },

    /// Two rules share a name
    #[error("duplicate rule: {0}")]
    DuplicateRule(String),

    /// An expression contains itself without passing through a rule
    #[error("expression {0} contains itself")]
    CyclicExpr(ExprId),

    /// An action node names an action that was not supplied
    #[error("unbound action: {0}")]
    UnboundAction(String),

    /// A predicate node names a predicate that was not supplied
    #[error("unbound predicate: {0}")]
    UnboundPredicate(String),

    /// A character class names an unknown Unicode category
    #[error("unknown character category: {0}")]
    UnknownCategory(String),

    /// A character class range with bounds out of order
    #[error("invalid character range: {lo:?}-{hi:?}")]
    InvalidRange {
        /// Lower bound
        lo: char,
        /// Upper bound
        hi: char,
    },

    /// Grammar definition JSON could not be read or written
    #[error("grammar definition: {0}")]
    Json(String),
}

impl From<serde_json::Error> for GrammarError {
    fn from(err: serde_json::Error) -> Self {
        GrammarError::Json(err.to_string())
    }
}
