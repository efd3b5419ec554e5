//! Pegterp - PEG Grammar Interpreter
//!
//! Executes a parsing expression grammar held as data against a byte input.
//! It provides:
//! - Ordered choice with full backtracking and scoped label bindings
//! - Optional packrat memoization keyed by expression identity and offset
//! - Farthest-failure tracking with "expected ..." diagnostics
//! - Semantic actions and code predicates bound by name
//! - Positioned, deduplicated error reporting with rule context
//! - Parser DSL for idiomatic grammar definition
//! - Evaluation traces for grammar debugging
//!
//! ## Quick Start
//!
//! ```rust
//! use pegterp::{Actions, Grammar, ParseOptions, Value};
//!
//! // Define grammar via JSON
//! let grammar_json = r#"{
//!     "rules": [ { "name": "Greeting", "expr": 0 } ],
//!     "nodes": [
//!         { "expr": { "Literal": { "text": "hello" } } }
//!     ]
//! }"#;
//!
//! let grammar: Grammar<()> = Grammar::from_json(grammar_json, Actions::new()).unwrap();
//! let out = grammar.parse("greeting.txt", b"hello", &ParseOptions::default());
//! assert_eq!(out.value, Some(Value::Text("hello".to_string())));
//! assert!(out.errors.is_empty());
//! ```
//!
//! ## Using the Parser DSL
//!
//! ```rust
//! use pegterp::prelude::*;
//!
//! let grammar = GrammarBuilder::<u32>::new()
//!     .rule("Number", class(CharClass::new().range('0', '9')).many1().map("number"))
//!     .action("number", |ctx| {
//!         ctx.text()
//!             .parse::<u32>()
//!             .map(Value::Node)
//!             .map_err(|e| ActionError::new(e.to_string()))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let out = grammar.parse("", b"42", &ParseOptions::default().with_memoize(true));
//! assert_eq!(out.value, Some(Value::Node(42)));
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Parse batches of inputs on a rayon thread pool

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]

// Prelude module for convenient imports
pub mod prelude;

pub mod engine;

/// Re-export commonly used types for convenience
pub use engine::{
    // Parser DSL
    parser_dsl::{
        and_pred, any, choice, class, dynamic, eof, lit, lit_i, not_pred, rule_ref, seq,
        GrammarBuilder, Parslet, ParsletExt,
    },
    parse, parse_batch, parse_file, parse_reader, ActionContext, ActionError, Actions, CharClass,
    ErrorKind, ErrorList, Expr, ExprId, Fault, Grammar, GrammarDef, GrammarError, MemoStats,
    ParseOptions, ParseOutput, ParseTrace, ParserError, SourcePosition, TraceAction, Value,
};
