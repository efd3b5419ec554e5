//! Parser DSL - Idiomatic Rust Grammar Definition
//!
//! A fluent, composable API for building grammars without writing the node
//! arena by hand. Every combinator is a [`Parslet`] that appends its nodes to
//! a [`GrammarDef`] and returns the id of its top node.
//!
//! # Example
//!
//! ```rust
//! use pegterp::engine::parser_dsl::*;
//! use pegterp::{CharClass, ParseOptions};
//!
//! let grammar = GrammarBuilder::<()>::new()
//!     .rule("Greeting", seq(vec![
//!         dynamic(lit("hello")),
//!         dynamic(lit(" ")),
//!         dynamic(rule_ref("Name")),
//!     ]))
//!     .rule("Name", class(CharClass::new().range('a', 'z')).many1())
//!     .build()
//!     .unwrap();
//!
//! let out = grammar.parse("", b"hello world", &ParseOptions::default());
//! assert!(out.is_success());
//! ```

use super::char_class::CharClass;
use super::error::{ActionError, GrammarError};
use super::grammar::{ActionContext, Actions, Expr, ExprId, Grammar, GrammarDef};
use super::source_location::SourcePosition;
use super::value::Value;

/// Parslet trait - implemented by all parser combinators
pub trait Parslet {
    /// Append this parslet's nodes, returning the id of its top node
    fn build(self, def: &mut GrammarDef) -> ExprId;
}

/// Grammar builder for constructing grammars
///
/// The first rule added is the start rule.
pub struct GrammarBuilder<T> {
    def: GrammarDef,
    actions: Actions<T>,
}

impl<T> GrammarBuilder<T> {
    /// Create a new grammar builder
    pub fn new() -> Self {
        Self {
            def: GrammarDef::new(),
            actions: Actions::new(),
        }
    }

    /// Add a rule to the grammar
    pub fn rule(mut self, name: &str, parslet: impl Parslet) -> Self {
        let expr = parslet.build(&mut self.def);
        self.def.add_rule(name, None, expr);
        self
    }

    /// Add a rule with a display name used in diagnostics
    pub fn rule_as(mut self, name: &str, display_name: &str, parslet: impl Parslet) -> Self {
        let expr = parslet.build(&mut self.def);
        self.def.add_rule(name, Some(display_name), expr);
        self
    }

    /// Register a semantic action referenced by [`ParsletExt::map`]
    pub fn action<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&ActionContext<'_, T>) -> Result<Value<T>, ActionError> + Send + Sync + 'static,
    {
        self.actions.add_action(name, f);
        self
    }

    /// Register a code predicate referenced by [`and_pred`] or [`not_pred`]
    pub fn predicate<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&ActionContext<'_, T>) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        self.actions.add_predicate(name, f);
        self
    }

    /// The definition built so far
    pub fn def(&self) -> &GrammarDef {
        &self.def
    }

    /// Validate and build the final grammar
    pub fn build(self) -> Result<Grammar<T>, GrammarError> {
        Grammar::new(self.def, self.actions)
    }
}

impl<T> Default for GrammarBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Atoms
// ============================================================================

/// Literal text
#[derive(Debug, Clone)]
pub struct Str {
    text: String,
    ignore_case: bool,
}

impl Parslet for Str {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        def.push(Expr::Literal {
            text: self.text,
            ignore_case: self.ignore_case,
        })
    }
}

/// Character class
#[derive(Debug, Clone)]
pub struct Class(pub CharClass);

impl Parslet for Class {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        def.push(Expr::CharClass(self.0))
    }
}

/// Any single character
#[derive(Debug, Clone, Copy, Default)]
pub struct Any;

impl Parslet for Any {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        def.push(Expr::AnyChar)
    }
}

/// Reference to a rule by name, resolved at parse time
#[derive(Debug, Clone)]
pub struct Ref(pub String);

impl Parslet for Ref {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        def.push(Expr::RuleRef { name: self.0 })
    }
}

/// Code predicate
#[derive(Debug, Clone)]
pub struct Predicate {
    name: String,
    positive: bool,
}

impl Parslet for Predicate {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let predicate = self.name;
        if self.positive {
            def.push(Expr::AndPredicate { predicate })
        } else {
            def.push(Expr::NotPredicate { predicate })
        }
    }
}

// ============================================================================
// Compound parslets
// ============================================================================

/// Sequence of two parslets
#[derive(Clone, Copy)]
pub struct Sequence2<A, B> {
    first: A,
    second: B,
}

impl<A: Parslet, B: Parslet> Parslet for Sequence2<A, B> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let exprs = vec![self.first.build(def), self.second.build(def)];
        def.push(Expr::Sequence { exprs })
    }
}

/// Ordered choice of two parslets
#[derive(Clone, Copy)]
pub struct Alternative2<A, B> {
    first: A,
    second: B,
}

impl<A: Parslet, B: Parslet> Parslet for Alternative2<A, B> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let alternatives = vec![self.first.build(def), self.second.build(def)];
        def.push(Expr::Choice { alternatives })
    }
}

/// A sequence of multiple parslets
pub struct Sequence<P>(pub Vec<P>);

impl<P: Parslet> Parslet for Sequence<P> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let exprs = self.0.into_iter().map(|p| p.build(def)).collect();
        def.push(Expr::Sequence { exprs })
    }
}

/// A choice of multiple parslets
pub struct Choice<P>(pub Vec<P>);

impl<P: Parslet> Parslet for Choice<P> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let alternatives = self.0.into_iter().map(|p| p.build(def)).collect();
        def.push(Expr::Choice { alternatives })
    }
}

/// How a [`Repeat`] repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatKind {
    /// Zero or more
    Many,
    /// One or more
    Many1,
    /// Zero or one
    Optional,
}

/// Repetition
#[derive(Clone, Copy)]
pub struct Repeat<P> {
    inner: P,
    kind: RepeatKind,
}

impl<P: Parslet> Parslet for Repeat<P> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let expr = self.inner.build(def);
        def.push(match self.kind {
            RepeatKind::Many => Expr::ZeroOrMore { expr },
            RepeatKind::Many1 => Expr::OneOrMore { expr },
            RepeatKind::Optional => Expr::Optional { expr },
        })
    }
}

/// Lookahead (doesn't consume input)
#[derive(Clone, Copy)]
pub struct Lookahead<P> {
    inner: P,
    positive: bool,
}

impl<P: Parslet> Parslet for Lookahead<P> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let expr = self.inner.build(def);
        if self.positive {
            def.push(Expr::And { expr })
        } else {
            def.push(Expr::Not { expr })
        }
    }
}

/// Labeled result, visible to enclosing actions
#[derive(Clone)]
pub struct Labeled<P> {
    inner: P,
    label: String,
}

impl<P: Parslet> Parslet for Labeled<P> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let expr = self.inner.build(def);
        def.push(Expr::Labeled {
            label: self.label,
            expr,
        })
    }
}

/// Semantic action applied to a match
#[derive(Clone)]
pub struct Map<P> {
    inner: P,
    action: String,
}

impl<P: Parslet> Parslet for Map<P> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let expr = self.inner.build(def);
        def.push(Expr::Action {
            expr,
            action: self.action,
        })
    }
}

/// Parslet whose top node carries a grammar-source position
#[derive(Clone, Copy)]
pub struct At<P> {
    inner: P,
    pos: SourcePosition,
}

impl<P: Parslet> Parslet for At<P> {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        let id = self.inner.build(def);
        if let Some(node) = def.nodes.get_mut(id) {
            node.pos = self.pos;
        }
        id
    }
}

/// A type-erased parslet (for heterogeneous sequences/choices)
pub struct Dynamic(Box<dyn DynParslet>);

/// Trait for type-erased parslets
pub trait DynParslet {
    /// Build this parslet into a definition
    fn build_boxed(self: Box<Self>, def: &mut GrammarDef) -> ExprId;
}

impl<P: Parslet> DynParslet for P {
    fn build_boxed(self: Box<Self>, def: &mut GrammarDef) -> ExprId {
        (*self).build(def)
    }
}

impl Parslet for Dynamic {
    fn build(self, def: &mut GrammarDef) -> ExprId {
        self.0.build_boxed(def)
    }
}

/// Convert any parslet to a dynamic one
pub fn dynamic<P: Parslet + 'static>(p: P) -> Dynamic {
    Dynamic(Box::new(p))
}

// ============================================================================
// Extension trait for Parslet
// ============================================================================

/// Extension trait for Parslet with builder methods
pub trait ParsletExt: Parslet + Sized {
    /// Bind the result to a label in the enclosing scope
    fn label(self, label: &str) -> Labeled<Self> {
        Labeled {
            inner: self,
            label: label.to_string(),
        }
    }

    /// Match zero or more times
    fn many(self) -> Repeat<Self> {
        Repeat {
            inner: self,
            kind: RepeatKind::Many,
        }
    }

    /// Match one or more times
    fn many1(self) -> Repeat<Self> {
        Repeat {
            inner: self,
            kind: RepeatKind::Many1,
        }
    }

    /// Match zero or one time
    fn optional(self) -> Repeat<Self> {
        Repeat {
            inner: self,
            kind: RepeatKind::Optional,
        }
    }

    /// Positive lookahead (must match, doesn't consume)
    fn lookahead(self) -> Lookahead<Self> {
        Lookahead {
            inner: self,
            positive: true,
        }
    }

    /// Negative lookahead (must NOT match, doesn't consume)
    fn not_ahead(self) -> Lookahead<Self> {
        Lookahead {
            inner: self,
            positive: false,
        }
    }

    /// Run the named semantic action on a successful match
    fn map(self, action: &str) -> Map<Self> {
        Map {
            inner: self,
            action: action.to_string(),
        }
    }

    /// Sequence of two
    fn then<B: Parslet>(self, other: B) -> Sequence2<Self, B> {
        Sequence2 {
            first: self,
            second: other,
        }
    }

    /// Ordered choice of two
    fn or<B: Parslet>(self, other: B) -> Alternative2<Self, B> {
        Alternative2 {
            first: self,
            second: other,
        }
    }

    /// Attach a grammar-source position
    fn at(self, line: usize, column: usize, offset: usize) -> At<Self> {
        At {
            inner: self,
            pos: SourcePosition::new(offset, line, column),
        }
    }
}

impl<P: Parslet + Sized> ParsletExt for P {}

// ============================================================================
// Helper Functions
// ============================================================================

/// Match literal text
pub fn lit(text: &str) -> Str {
    Str {
        text: text.to_string(),
        ignore_case: false,
    }
}

/// Match literal text, ignoring case
pub fn lit_i(text: &str) -> Str {
    Str {
        text: text.to_string(),
        ignore_case: true,
    }
}

/// Match one character from a class
pub fn class(class: CharClass) -> Class {
    Class(class)
}

/// Match any single character
pub fn any() -> Any {
    Any
}

/// Match end of input
pub fn eof() -> Lookahead<Any> {
    any().not_ahead()
}

/// Reference a rule by name
pub fn rule_ref(name: &str) -> Ref {
    Ref(name.to_string())
}

/// Succeed when the named predicate holds
pub fn and_pred(name: &str) -> Predicate {
    Predicate {
        name: name.to_string(),
        positive: true,
    }
}

/// Succeed when the named predicate does not hold
pub fn not_pred(name: &str) -> Predicate {
    Predicate {
        name: name.to_string(),
        positive: false,
    }
}

/// Create a sequence from multiple parslets
pub fn seq<I, P>(items: I) -> Sequence<P>
where
    I: IntoIterator<Item = P>,
{
    Sequence(items.into_iter().collect())
}

/// Create a choice from multiple parslets
pub fn choice<I, P>(items: I) -> Choice<P>
where
    I: IntoIterator<Item = P>,
{
    Choice(items.into_iter().collect())
}
