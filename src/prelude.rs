//! Prelude module for convenient imports
//!
//! ```
//! use pegterp::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Grammar`] - Validated grammar
//! - [`GrammarDef`] - Serializable grammar definition
//! - [`ParseOptions`] - Per-parse options
//! - [`ParseOutput`] - Value, errors and trace of a parse
//! - [`Value`] - Semantic value
//!
//! ## Parser DSL
//! - [`lit()`] / [`lit_i()`] - Match literal text
//! - [`class()`] - Match a character class
//! - [`any()`] / [`eof()`] - Match any character / end of input
//! - [`rule_ref()`] - Reference another rule
//! - [`seq()`] / [`choice()`] - Sequence / ordered choice
//! - [`and_pred()`] / [`not_pred()`] - Code predicates
//! - [`GrammarBuilder`], [`Parslet`], [`ParsletExt`]
//!
//! ## Callbacks and Errors
//! - [`Actions`], [`ActionContext`], [`ActionError`]
//! - [`ErrorList`], [`ParserError`], [`GrammarError`]

// ============================================================================
// Core Types
// ============================================================================

pub use crate::engine::{
    parse, CharClass, Grammar, GrammarDef, ParseOptions, ParseOutput, SourcePosition, Value,
};

// ============================================================================
// Parser DSL
// ============================================================================

pub use crate::engine::parser_dsl::{
    and_pred, any, choice, class, dynamic, eof, lit, lit_i, not_pred, rule_ref, seq,
    GrammarBuilder, Parslet, ParsletExt,
};

// ============================================================================
// Callbacks and Errors
// ============================================================================

pub use crate::engine::{
    ActionContext, ActionError, Actions, ErrorList, GrammarError, ParserError,
};
