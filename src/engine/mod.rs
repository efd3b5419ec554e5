//! Grammar interpreter core
//!
//! # Module Organization
//!
//! ## Grammar
//! - [`grammar`] - Expression arena, rules, callback binding, JSON form
//! - [`parser_dsl`] - Combinator DSL for building grammars in Rust
//! - [`char_class`] - Character classes and their compiled matchers
//!
//! ## Evaluation
//! - [`parser`] - Evaluator and parse driver
//! - [`cursor`] - UTF-8 input cursor with savepoints
//! - [`scope`] - Label binding frames
//! - [`cache`] - Packrat memo table
//! - [`failure`] - Farthest-failure tracking
//!
//! ## Results
//! - [`value`] - Semantic values and label bindings
//! - [`error`] - Positioned errors and grammar construction errors
//! - [`source_location`] - Line/column tracking
//! - [`debug`] - Evaluation traces
//!
//! ## Batch Parsing
//! - [`parallel`] - Many inputs against one grammar

// ============================================================================
// Module Declarations
// ============================================================================

pub mod cache;
pub mod char_class;
pub mod cursor;
pub mod debug;
pub mod error;
pub mod failure;
pub mod grammar;
pub mod parser;
pub mod parser_dsl;
pub mod regex_cache;
pub mod scope;
pub mod source_location;
pub mod value;

// Parallel parsing (always available, uses rayon when feature is enabled)
pub mod parallel;

// ============================================================================
// Core Types
// ============================================================================

pub use char_class::CharClass;
pub use grammar::{
    ActionContext, ActionFn, Actions, Expr, ExprId, Grammar, GrammarDef, Node, PredicateFn,
    RuleDef,
};
pub use parser::{
    parse, parse_file, parse_reader, ParseOptions, ParseOutput, Parser,
    DEFAULT_MAX_RECURSION_DEPTH,
};
pub use value::{Bindings, Value};

// ============================================================================
// Errors
// ============================================================================

pub use error::{ActionError, ErrorKind, ErrorList, Fault, GrammarError, ParserError};

// ============================================================================
// Caching, Tracing, Positions
// ============================================================================

pub use cache::MemoStats;
pub use debug::{ParseTrace, TraceAction, TraceEntry, TraceTarget};
pub use source_location::SourcePosition;

// ============================================================================
// Batch Parsing
// ============================================================================

pub use parallel::{parse_batch, parse_batch_owned};
