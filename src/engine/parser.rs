//! Grammar evaluator and parse driver
//!
//! [`Parser`] holds all mutable state of one parse: cursor, scope stack,
//! memo table, failure tracker and the recorded faults. The [`Grammar`] is
//! only ever read, so any number of parsers may share one.
//!
//! Evaluation returns `Result<Option<Value<T>>, Fault>`:
//! - `Ok(Some(value))`: the expression matched and the cursor moved past it
//! - `Ok(None)`: the expression did not match and the cursor is where it was
//! - `Err(fault)`: something unexpected happened; the parse is abandoned

use super::{
    cache::{MemoKey, MemoStats, MemoTable, Memoized},
    char_class::fold_case,
    cursor::{Cursor, Decoded, Savepoint},
    debug::{ParseTrace, TraceAction, TraceEntry, TraceTarget},
    error::{ErrorKind, ErrorList, Fault, ParserError},
    failure::FailureTracker,
    grammar::{ActionContext, Expr, ExprId, Grammar},
    scope::ScopeStack,
    source_location::SourcePosition,
    value::Value,
};
use ahash::RandomState;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

/// Default maximum rule nesting depth
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Stack left before a rule evaluation moves to a fresh segment; covers the
/// frames between two nested rules in unoptimized builds
const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each stack segment allocated for nested rules
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Options for a single parse
///
/// ```rust
/// use pegterp::ParseOptions;
///
/// let options = ParseOptions::new().with_memoize(true).with_debug(true);
/// assert!(options.recover);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Record a trace of every rule and expression evaluated
    pub debug: bool,

    /// Enable packrat memoization
    pub memoize: bool,

    /// Turn internal faults and panicking callbacks into reported errors
    /// instead of propagating them
    pub recover: bool,

    /// Maximum rule nesting depth (0 = unlimited)
    pub max_recursion_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            debug: false,
            memoize: false,
            recover: true,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable tracing
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable memoization
    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// Enable or disable fault recovery
    pub fn with_recover(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    /// Set the maximum rule nesting depth (0 = unlimited)
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }
}

/// Result of a parse
#[derive(Debug)]
pub struct ParseOutput<T> {
    /// Value of the start rule; `None` if it did not match or the parse was
    /// abandoned
    pub value: Option<Value<T>>,
    /// Reportable faults, in the order they were recorded
    pub errors: ErrorList,
    /// Evaluation trace, when requested
    pub trace: Option<ParseTrace>,
    /// Memo table statistics (all zero without memoization)
    pub stats: MemoStats,
}

impl<T> ParseOutput<T> {
    /// Whether the start rule matched and no fault was recorded
    pub fn is_success(&self) -> bool {
        self.value.is_some() && self.errors.is_empty()
    }

    /// The value if the parse was clean, otherwise the recorded faults
    pub fn into_result(self) -> Result<Value<T>, ErrorList> {
        match self.value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(self.errors),
        }
    }
}

type Outcome<T> = Result<Option<Value<T>>, Fault>;

/// Per-parse evaluation context
pub struct Parser<'g, 'i, T> {
    grammar: &'g Grammar<T>,
    source_name: String,
    cursor: Cursor<'i>,
    options: ParseOptions,

    /// Rule name -> rule index, built when the parse starts
    rules: HashMap<&'g str, usize, RandomState>,
    /// Rules being evaluated, innermost last
    rule_stack: Vec<usize>,
    scope: ScopeStack<'g, T>,
    memo: Option<MemoTable<'g, T>>,
    failures: FailureTracker,
    errors: Vec<ParserError>,

    /// Undefined rule names already reported
    undefined: HashSet<&'g str, RandomState>,
    /// Offsets of malformed input already reported
    bad_offsets: HashSet<usize, RandomState>,

    trace: Option<ParseTrace>,
    trace_depth: usize,
    /// Current rule nesting depth
    depth: usize,
}

impl<'g, 'i, T: Clone> Parser<'g, 'i, T> {
    /// Create a parser for one input
    pub fn new(
        grammar: &'g Grammar<T>,
        source_name: &str,
        input: &'i [u8],
        options: ParseOptions,
    ) -> Self {
        let memo = options
            .memoize
            .then(|| MemoTable::for_input(input.len(), grammar.node_count()));
        let trace = options.debug.then(ParseTrace::new);

        Self {
            grammar,
            source_name: source_name.to_string(),
            cursor: Cursor::new(input),
            options,
            rules: HashMap::with_hasher(RandomState::new()),
            rule_stack: Vec::new(),
            scope: ScopeStack::new(),
            memo,
            failures: FailureTracker::new(),
            errors: Vec::new(),
            undefined: HashSet::with_hasher(RandomState::new()),
            bad_offsets: HashSet::with_hasher(RandomState::new()),
            trace,
            trace_depth: 0,
            depth: 0,
        }
    }

    /// Run the parse from the start rule
    ///
    /// # Panics
    ///
    /// With [`ParseOptions::recover`] disabled, an internal fault is raised
    /// as a panic carrying the [`Fault`], and panics from callbacks propagate.
    pub fn parse(mut self) -> ParseOutput<T> {
        log_debug!(
            "parsing {:?}: {} bytes, memoize={}",
            self.source_name,
            self.cursor.input().len(),
            self.options.memoize
        );

        if self.grammar.rule_count() == 0 {
            self.record_error(ErrorKind::NoRules);
            return self.finish(None);
        }

        let grammar = self.grammar;
        self.rules = grammar
            .rules()
            .iter()
            .enumerate()
            .map(|(index, rule)| (rule.name.as_str(), index))
            .collect();

        if self.cursor.current() == Decoded::Invalid {
            self.invalid_encoding();
        }

        let outcome = if self.options.recover {
            match panic::catch_unwind(AssertUnwindSafe(|| self.eval_rule(0))) {
                Ok(outcome) => outcome,
                Err(payload) => Err(Fault::Panic(panic_message(payload.as_ref()))),
            }
        } else {
            self.eval_rule(0)
        };

        let value = match outcome {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                if self.errors.is_empty() {
                    let expected = self.failures.expected();
                    let position =
                        SourcePosition::from_offset(self.cursor.input(), self.failures.farthest());
                    self.record_error_at(position, ErrorKind::NoMatch { expected });
                }
                None
            }
            Err(fault) => {
                if !self.options.recover {
                    panic::panic_any(fault);
                }
                log_debug!("recovered internal fault: {}", fault);
                self.record_error(ErrorKind::Internal(fault));
                None
            }
        };

        self.finish(value)
    }

    fn finish(self, value: Option<Value<T>>) -> ParseOutput<T> {
        let stats = self.memo.as_ref().map(MemoTable::stats).unwrap_or_default();
        log_debug!(
            "parsed {:?}: matched={}, errors={}, memo hits={} misses={}",
            self.source_name,
            value.is_some(),
            self.errors.len(),
            stats.hits,
            stats.misses
        );

        ParseOutput {
            value,
            errors: ErrorList::new(self.errors),
            trace: self.trace,
            stats,
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Evaluate a rule, growing the stack first if nesting has used it up;
    /// the recursion limit, not the thread's stack, bounds rule depth
    fn eval_rule(&mut self, index: usize) -> Outcome<T> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.enter_rule(index))
    }

    fn enter_rule(&mut self, index: usize) -> Outcome<T> {
        let grammar = self.grammar;
        let rule = grammar.rule(index).ok_or(Fault::UnknownRule(index))?;
        let key = MemoKey::new(grammar.node_count() + index, self.failures.is_inverted());
        let target = TraceTarget::Rule(index);
        if let Some(outcome) = self.recall(key, target) {
            return Ok(outcome);
        }

        self.depth += 1;
        let max_depth = self.options.max_recursion_depth;
        if max_depth > 0 && self.depth > max_depth {
            return Err(Fault::RecursionLimit {
                depth: self.depth,
                max_depth,
            });
        }

        let start = self.cursor.savepoint();
        let mark = self.scope.mark();
        self.trace_enter(target);

        self.rule_stack.push(index);
        let outcome = self.scoped(|p| p.eval(rule.expr))?;
        self.rule_stack.pop();
        self.depth -= 1;

        self.trace_exit(target, &start, &outcome);
        self.memorize(key, &start, mark, &outcome);
        Ok(outcome)
    }

    fn eval(&mut self, id: ExprId) -> Outcome<T> {
        let key = MemoKey::new(id, self.failures.is_inverted());
        let target = TraceTarget::Expr(id);
        if let Some(outcome) = self.recall(key, target) {
            return Ok(outcome);
        }

        let grammar = self.grammar;
        let node = grammar.node(id).ok_or(Fault::UnknownExpr(id))?;
        let start = self.cursor.savepoint();
        let mark = self.scope.mark();
        self.trace_enter(target);

        let outcome = match &node.expr {
            Expr::Literal { text, ignore_case } => self.eval_literal(id, text, *ignore_case),
            Expr::CharClass(_) => self.eval_class(id, node.pos)?,
            Expr::AnyChar => self.eval_any(id),
            Expr::RuleRef { name } => self.eval_rule_ref(name, node.pos)?,
            Expr::Sequence { exprs } => self.eval_sequence(exprs)?,
            Expr::Choice { alternatives } => self.eval_choice(alternatives)?,
            Expr::ZeroOrMore { expr } => self.eval_repeat(*expr, 0)?,
            Expr::OneOrMore { expr } => self.eval_repeat(*expr, 1)?,
            Expr::Optional { expr } => {
                let inner = self.scoped(|p| p.eval(*expr))?;
                Some(inner.unwrap_or_default())
            }
            Expr::And { expr } => self.eval_lookahead(*expr, true)?,
            Expr::Not { expr } => self.eval_lookahead(*expr, false)?,
            Expr::Labeled { label, expr } => self.eval_labeled(label, *expr)?,
            Expr::Action { expr, .. } => self.eval_action(id, node.pos, *expr)?,
            Expr::AndPredicate { .. } => self.eval_predicate(id, node.pos, true)?,
            Expr::NotPredicate { .. } => self.eval_predicate(id, node.pos, false)?,
        };

        self.trace_exit(target, &start, &outcome);
        self.memorize(key, &start, mark, &outcome);
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Atomic matchers
    // ------------------------------------------------------------------------

    fn eval_literal(&mut self, id: ExprId, text: &str, ignore_case: bool) -> Option<Value<T>> {
        let start = self.cursor.savepoint();
        for want in text.chars() {
            let matched = match self.cursor.current() {
                Decoded::Char(c) => c == want || (ignore_case && fold_case(c) == fold_case(want)),
                Decoded::Invalid | Decoded::Eof => false,
            };
            if !matched {
                self.fail_at(false, &start, id);
                self.cursor.restore(start);
                return None;
            }
            self.advance();
        }
        self.fail_at(true, &start, id);
        Some(self.text_from(&start))
    }

    fn eval_class(&mut self, id: ExprId, pos: SourcePosition) -> Outcome<T> {
        let grammar = self.grammar;
        let matcher = grammar.class(id).ok_or(Fault::UnboundCallback { id, pos })?;
        let start = self.cursor.savepoint();

        // EOF and malformed input never match, inverted or not
        let matched = match self.cursor.current() {
            Decoded::Char(c) => matcher.matches(c),
            Decoded::Invalid | Decoded::Eof => false,
        };
        if !matched {
            self.fail_at(false, &start, id);
            return Ok(None);
        }
        self.advance();
        self.fail_at(true, &start, id);
        Ok(Some(self.text_from(&start)))
    }

    fn eval_any(&mut self, id: ExprId) -> Option<Value<T>> {
        let start = self.cursor.savepoint();
        if !matches!(self.cursor.current(), Decoded::Char(_)) {
            self.fail_at(false, &start, id);
            return None;
        }
        self.advance();
        self.fail_at(true, &start, id);
        Some(self.text_from(&start))
    }

    // ------------------------------------------------------------------------
    // Compound expressions
    // ------------------------------------------------------------------------

    fn eval_rule_ref(&mut self, name: &'g str, pos: SourcePosition) -> Outcome<T> {
        if name.is_empty() {
            return Err(Fault::MissingRuleName(pos));
        }
        match self.rules.get(name).copied() {
            Some(index) => self.eval_rule(index),
            None => {
                if self.undefined.insert(name) {
                    self.record_error(ErrorKind::UndefinedRule(name.to_string()));
                }
                Ok(None)
            }
        }
    }

    fn eval_sequence(&mut self, exprs: &'g [ExprId]) -> Outcome<T> {
        let start = self.cursor.savepoint();
        let mark = self.scope.mark();
        let mut values = Vec::with_capacity(exprs.len());

        for &child in exprs {
            match self.eval(child)? {
                Some(value) => values.push(value),
                None => {
                    self.cursor.restore(start);
                    self.scope.truncate(mark);
                    return Ok(None);
                }
            }
        }
        Ok(Some(Value::List(values)))
    }

    fn eval_choice(&mut self, alternatives: &'g [ExprId]) -> Outcome<T> {
        for &alt in alternatives {
            if let Some(value) = self.scoped(|p| p.eval(alt))? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn eval_repeat(&mut self, child: ExprId, min: usize) -> Outcome<T> {
        let mut values = Vec::new();
        loop {
            let before = self.cursor.offset();
            match self.scoped(|p| p.eval(child))? {
                Some(value) => {
                    values.push(value);
                    // an empty match would repeat forever
                    if self.cursor.offset() == before {
                        break;
                    }
                }
                None => break,
            }
        }

        if values.len() < min {
            return Ok(None);
        }
        Ok(Some(Value::List(values)))
    }

    fn eval_lookahead(&mut self, child: ExprId, positive: bool) -> Outcome<T> {
        let start = self.cursor.savepoint();
        if !positive {
            self.failures.invert();
        }
        let outcome = self.scoped(|p| p.eval(child));
        if !positive {
            self.failures.invert();
        }
        self.cursor.restore(start);

        let matched = outcome?.is_some();
        Ok((matched == positive).then_some(Value::Nil))
    }

    fn eval_labeled(&mut self, label: &'g str, child: ExprId) -> Outcome<T> {
        let outcome = self.scoped(|p| p.eval(child))?;
        if let Some(value) = &outcome {
            if !label.is_empty() {
                self.scope.bind(label, value.clone());
            }
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Callbacks
    // ------------------------------------------------------------------------

    fn eval_action(&mut self, id: ExprId, pos: SourcePosition, child: ExprId) -> Outcome<T> {
        let start = self.cursor.savepoint();
        if self.eval(child)?.is_none() {
            return Ok(None);
        }

        let grammar = self.grammar;
        let action = grammar.action(id).ok_or(Fault::UnboundCallback { id, pos })?;
        let result = {
            let ctx = ActionContext::new(
                self.cursor.slice_from(&start),
                start.position,
                self.scope.current(),
            );
            (**action)(&ctx)
        };

        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                log_debug!("action fault at {}: {}", start.position, err);
                self.record_error_at(start.position, ErrorKind::SemanticAction(err));
                // the match stands; only its value is lost
                Ok(Some(Value::Nil))
            }
        }
    }

    fn eval_predicate(&mut self, id: ExprId, pos: SourcePosition, positive: bool) -> Outcome<T> {
        let grammar = self.grammar;
        let predicate = grammar.predicate(id).ok_or(Fault::UnboundCallback { id, pos })?;
        let result = {
            let ctx = ActionContext::new(&[], self.cursor.position(), self.scope.current());
            (**predicate)(&ctx)
        };

        let holds = match result {
            Ok(holds) => holds,
            Err(err) => {
                self.record_error(ErrorKind::SemanticAction(err));
                false
            }
        };
        Ok((holds == positive).then_some(Value::Nil))
    }

    // ------------------------------------------------------------------------
    // State helpers
    // ------------------------------------------------------------------------

    /// Run `f` inside a fresh scope frame, popping it on every exit path
    #[inline]
    fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.scope.push();
        let result = f(self);
        self.scope.pop();
        result
    }

    #[inline]
    fn advance(&mut self) {
        if self.cursor.advance() == Decoded::Invalid {
            self.invalid_encoding();
        }
    }

    fn invalid_encoding(&mut self) {
        if self.bad_offsets.insert(self.cursor.offset()) {
            self.record_error(ErrorKind::InvalidEncoding);
        }
    }

    #[inline]
    fn fail_at(&mut self, matched: bool, start: &Savepoint, id: ExprId) {
        let grammar = self.grammar;
        self.failures.record(matched, start.offset(), grammar.descriptor(id));
    }

    #[inline]
    fn text_from(&self, start: &Savepoint) -> Value<T> {
        Value::Text(String::from_utf8_lossy(self.cursor.slice_from(start)).into_owned())
    }

    fn record_error(&mut self, kind: ErrorKind) {
        let position = self.cursor.position();
        self.record_error_at(position, kind);
    }

    fn record_error_at(&mut self, position: SourcePosition, kind: ErrorKind) {
        let grammar = self.grammar;
        let rule = self
            .rule_stack
            .last()
            .and_then(|&index| grammar.rule(index))
            .map(|rule| rule.label().to_string());
        self.errors
            .push(ParserError::new(self.source_name.as_str(), position, rule, kind));
    }

    // ------------------------------------------------------------------------
    // Memoization
    // ------------------------------------------------------------------------

    fn recall(&mut self, key: MemoKey, target: TraceTarget) -> Option<Option<Value<T>>> {
        let offset = self.cursor.offset();
        let hit = self.memo.as_mut()?.get(offset, key)?;
        let outcome = hit.outcome.clone();
        let end = hit.end;
        let bindings = hit.bindings.clone();

        self.cursor.restore(end);
        for (label, value) in bindings {
            self.scope.bind(label, value);
        }
        self.trace_event(target, TraceAction::CacheHit);
        Some(outcome)
    }

    fn memorize(
        &mut self,
        key: MemoKey,
        start: &Savepoint,
        mark: usize,
        outcome: &Option<Value<T>>,
    ) {
        let Some(memo) = self.memo.as_mut() else {
            return;
        };
        memo.insert(
            start.offset(),
            key,
            Memoized {
                outcome: outcome.clone(),
                end: self.cursor.savepoint(),
                bindings: self.scope.since(mark).to_vec(),
            },
        );
    }

    // ------------------------------------------------------------------------
    // Tracing
    // ------------------------------------------------------------------------

    fn trace_enter(&mut self, target: TraceTarget) {
        if self.trace.is_none() {
            return;
        }
        log_debug!("{}enter {:?} at {}", "  ".repeat(self.trace_depth), target, self.cursor.position());
        self.trace_event(target, TraceAction::Enter);
        self.trace_depth += 1;
    }

    fn trace_exit(&mut self, target: TraceTarget, start: &Savepoint, outcome: &Option<Value<T>>) {
        if self.trace.is_none() {
            return;
        }
        self.trace_depth = self.trace_depth.saturating_sub(1);
        let action = match outcome {
            Some(_) => TraceAction::Match {
                length: self.cursor.offset() - start.offset(),
            },
            None => TraceAction::Fail,
        };
        self.trace_event(target, action);
    }

    fn trace_event(&mut self, target: TraceTarget, action: TraceAction) {
        if let Some(trace) = self.trace.as_mut() {
            trace.add(TraceEntry {
                position: self.cursor.position(),
                target,
                action,
                depth: self.trace_depth,
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(fault) = payload.downcast_ref::<Fault>() {
        fault.to_string()
    } else {
        "panic during evaluation".to_string()
    }
}

impl<T: Clone> Grammar<T> {
    /// Parse `input` from the start rule
    ///
    /// See [`parse`].
    pub fn parse(&self, source_name: &str, input: &[u8], options: &ParseOptions) -> ParseOutput<T> {
        Parser::new(self, source_name, input, options.clone()).parse()
    }
}

/// Parse `input` with `grammar`, starting from its first rule
///
/// `source_name` prefixes every error message; it may be empty. The returned
/// value is `None` when the start rule did not match. Errors are empty on a
/// clean parse; note that a semantic action may report an error while its
/// match still succeeds, so both can be present.
pub fn parse<T: Clone>(
    grammar: &Grammar<T>,
    source_name: &str,
    input: &[u8],
    options: &ParseOptions,
) -> ParseOutput<T> {
    grammar.parse(source_name, input, options)
}

/// Read all of `reader` and parse it
pub fn parse_reader<T: Clone, R: Read>(
    grammar: &Grammar<T>,
    source_name: &str,
    mut reader: R,
    options: &ParseOptions,
) -> io::Result<ParseOutput<T>> {
    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;
    Ok(grammar.parse(source_name, &input, options))
}

/// Read a file and parse it, using its path as the source name
pub fn parse_file<T: Clone>(
    grammar: &Grammar<T>,
    path: impl AsRef<Path>,
    options: &ParseOptions,
) -> io::Result<ParseOutput<T>> {
    let path = path.as_ref();
    let input = std::fs::read(path)?;
    Ok(grammar.parse(&path.display().to_string(), &input, options))
}
