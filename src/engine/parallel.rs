//! Parallel parsing support
//!
//! A [`Grammar`] is immutable once built and every parse owns its own state,
//! so independent inputs can be parsed concurrently against one grammar.
//!
//! # Feature Flag
//!
//! Work is spread over a rayon thread pool when the `parallel` feature is
//! enabled; otherwise the inputs are parsed one after another.
//!
//! ```toml
//! [dependencies]
//! pegterp = { version = "0.1", features = ["parallel"] }
//! ```

use super::grammar::Grammar;
use super::parser::{ParseOptions, ParseOutput};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Parse multiple named inputs in parallel
///
/// Results are in the same order as `inputs`.
#[cfg(feature = "rayon")]
pub fn parse_batch<T: Clone + Send>(
    grammar: &Grammar<T>,
    inputs: &[(&str, &[u8])],
    options: &ParseOptions,
) -> Vec<ParseOutput<T>> {
    inputs
        .par_iter()
        .map(|(name, input)| grammar.parse(name, input, options))
        .collect()
}

/// Parse multiple named inputs sequentially (fallback when rayon is not available)
#[cfg(not(feature = "rayon"))]
pub fn parse_batch<T: Clone + Send>(
    grammar: &Grammar<T>,
    inputs: &[(&str, &[u8])],
    options: &ParseOptions,
) -> Vec<ParseOutput<T>> {
    inputs
        .iter()
        .map(|(name, input)| grammar.parse(name, input, options))
        .collect()
}

/// Parse multiple owned inputs in parallel, naming each `name#index`
#[cfg(feature = "rayon")]
pub fn parse_batch_owned<T: Clone + Send>(
    grammar: &Grammar<T>,
    name: &str,
    inputs: Vec<Vec<u8>>,
    options: &ParseOptions,
) -> Vec<ParseOutput<T>> {
    inputs
        .into_par_iter()
        .enumerate()
        .map(|(i, input)| grammar.parse(&format!("{}#{}", name, i), &input, options))
        .collect()
}

/// Parse multiple owned inputs sequentially (fallback)
#[cfg(not(feature = "rayon"))]
pub fn parse_batch_owned<T: Clone + Send>(
    grammar: &Grammar<T>,
    name: &str,
    inputs: Vec<Vec<u8>>,
    options: &ParseOptions,
) -> Vec<ParseOutput<T>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| grammar.parse(&format!("{}#{}", name, i), &input, options))
        .collect()
}
