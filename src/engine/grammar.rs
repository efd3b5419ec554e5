//! Grammar model
//!
//! A grammar is stored as a flat arena of expression nodes, each referring to
//! its children by [`ExprId`]. The index of a node is its stable identity:
//! the memo table keys on it, so two structurally identical nodes at
//! different places in the grammar never share cache entries.
//!
//! [`GrammarDef`] is the plain, serializable definition. [`Grammar`] is the
//! validated, immutable form used for parsing: it binds action and predicate
//! callbacks by name, compiles character classes and precomputes failure
//! descriptors. A `Grammar` can be shared by any number of concurrent parses.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "rules": [
//!     { "name": "Greeting", "display_name": "greeting", "expr": 2 }
//!   ],
//!   "nodes": [
//!     { "expr": { "Literal": { "text": "hello", "ignore_case": false } } },
//!     { "expr": { "RuleRef": { "name": "Name" } } },
//!     { "expr": { "Sequence": { "exprs": [0, 1] } } }
//!   ]
//! }
//! ```

use super::char_class::{CharClass, ClassMatcher};
use super::error::{ActionError, GrammarError};
use super::source_location::SourcePosition;
use super::value::{Bindings, Value};
use ahash::RandomState;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Index of an expression node in the grammar arena
pub type ExprId = usize;

/// Expression variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal text, optionally case-insensitive
    Literal {
        /// Text to match
        text: String,
        /// Compare case-insensitively
        #[serde(default)]
        ignore_case: bool,
    },

    /// Single code point from a class
    CharClass(CharClass),

    /// Any single code point
    AnyChar,

    /// Reference to a rule by name
    RuleRef {
        /// Rule name
        name: String,
    },

    /// All children in order
    Sequence {
        /// Children
        exprs: Vec<ExprId>,
    },

    /// First alternative that matches
    Choice {
        /// Alternatives, tried in order
        alternatives: Vec<ExprId>,
    },

    /// Zero or more repetitions
    ZeroOrMore {
        /// Repeated expression
        expr: ExprId,
    },

    /// One or more repetitions
    OneOrMore {
        /// Repeated expression
        expr: ExprId,
    },

    /// Zero or one occurrence
    Optional {
        /// Optional expression
        expr: ExprId,
    },

    /// Positive lookahead: `&e`
    And {
        /// Asserted expression
        expr: ExprId,
    },

    /// Negative lookahead: `!e`
    Not {
        /// Refuted expression
        expr: ExprId,
    },

    /// Bind the child's value to a label in the enclosing frame
    Labeled {
        /// Label name
        label: String,
        /// Labeled expression
        expr: ExprId,
    },

    /// Run a semantic action on the child's match
    Action {
        /// Matched expression
        expr: ExprId,
        /// Name of the bound action
        action: String,
    },

    /// Code predicate: `&{ ... }`
    AndPredicate {
        /// Name of the bound predicate
        predicate: String,
    },

    /// Negated code predicate: `!{ ... }`
    NotPredicate {
        /// Name of the bound predicate
        predicate: String,
    },
}

impl Expr {
    /// Child expression ids
    pub fn children(&self) -> &[ExprId] {
        match self {
            Expr::Sequence { exprs } => exprs,
            Expr::Choice { alternatives } => alternatives,
            Expr::ZeroOrMore { expr }
            | Expr::OneOrMore { expr }
            | Expr::Optional { expr }
            | Expr::And { expr }
            | Expr::Not { expr }
            | Expr::Labeled { expr, .. }
            | Expr::Action { expr, .. } => std::slice::from_ref(expr),
            Expr::Literal { .. }
            | Expr::CharClass(_)
            | Expr::AnyChar
            | Expr::RuleRef { .. }
            | Expr::AndPredicate { .. }
            | Expr::NotPredicate { .. } => &[],
        }
    }

    /// Short variant name, used in traces
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Literal { .. } => "literal",
            Expr::CharClass(_) => "char class",
            Expr::AnyChar => "any char",
            Expr::RuleRef { .. } => "rule ref",
            Expr::Sequence { .. } => "sequence",
            Expr::Choice { .. } => "choice",
            Expr::ZeroOrMore { .. } => "zero or more",
            Expr::OneOrMore { .. } => "one or more",
            Expr::Optional { .. } => "optional",
            Expr::And { .. } => "and",
            Expr::Not { .. } => "not",
            Expr::Labeled { .. } => "labeled",
            Expr::Action { .. } => "action",
            Expr::AndPredicate { .. } => "and predicate",
            Expr::NotPredicate { .. } => "not predicate",
        }
    }
}

/// An expression with the grammar-source position it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Position in the grammar source
    #[serde(default)]
    pub pos: SourcePosition,
    /// The expression
    pub expr: Expr,
}

/// A named rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDef {
    /// Unique rule name
    pub name: String,
    /// Name shown in diagnostics
    #[serde(default)]
    pub display_name: Option<String>,
    /// Position in the grammar source
    #[serde(default)]
    pub pos: SourcePosition,
    /// Rule body
    pub expr: ExprId,
}

impl RuleDef {
    /// Name shown in diagnostics: the display name if set, else the name
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Serializable grammar definition; the rule at index 0 is the start rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarDef {
    /// Rules, start rule first
    #[serde(default)]
    pub rules: Vec<RuleDef>,
    /// Expression arena
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl GrammarDef {
    /// Create an empty definition
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an expression node, returning its id
    pub fn push(&mut self, expr: Expr) -> ExprId {
        self.push_at(SourcePosition::default(), expr)
    }

    /// Append an expression node with a grammar-source position
    pub fn push_at(&mut self, pos: SourcePosition, expr: Expr) -> ExprId {
        let id = self.nodes.len();
        self.nodes.push(Node { pos, expr });
        id
    }

    /// Append a rule
    pub fn add_rule(&mut self, name: &str, display_name: Option<&str>, expr: ExprId) -> &mut Self {
        self.rules.push(RuleDef {
            name: name.to_string(),
            display_name: display_name.map(String::from),
            pos: SourcePosition::default(),
            expr,
        });
        self
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, GrammarError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, GrammarError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What an action or predicate callback sees
pub struct ActionContext<'a, T> {
    text: &'a [u8],
    position: SourcePosition,
    bindings: Bindings<'a, T>,
}

impl<'a, T> ActionContext<'a, T> {
    /// Create a context
    pub fn new(text: &'a [u8], position: SourcePosition, bindings: Bindings<'a, T>) -> Self {
        Self {
            text,
            position,
            bindings,
        }
    }

    /// Matched text, lossily decoded
    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.text)
    }

    /// Matched raw bytes
    pub fn bytes(&self) -> &'a [u8] {
        self.text
    }

    /// Start of the match
    pub fn position(&self) -> SourcePosition {
        self.position
    }

    /// Label bindings of the current frame
    pub fn bindings(&self) -> Bindings<'a, T> {
        self.bindings
    }

    /// Look up a label binding
    pub fn get(&self, label: &str) -> Option<&'a Value<T>> {
        self.bindings.get(label)
    }
}

/// Semantic action callback
pub type ActionFn<T> =
    Arc<dyn Fn(&ActionContext<'_, T>) -> Result<Value<T>, ActionError> + Send + Sync>;

/// Code predicate callback
pub type PredicateFn<T> =
    Arc<dyn Fn(&ActionContext<'_, T>) -> Result<bool, ActionError> + Send + Sync>;

/// Callbacks to bind into a grammar, by name
pub struct Actions<T> {
    actions: HashMap<String, ActionFn<T>, RandomState>,
    predicates: HashMap<String, PredicateFn<T>, RandomState>,
}

impl<T> Actions<T> {
    /// Create an empty set of callbacks
    pub fn new() -> Self {
        Self {
            actions: HashMap::with_hasher(RandomState::new()),
            predicates: HashMap::with_hasher(RandomState::new()),
        }
    }

    /// Add a semantic action
    pub fn action<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&ActionContext<'_, T>) -> Result<Value<T>, ActionError> + Send + Sync + 'static,
    {
        self.add_action(name, f);
        self
    }

    /// Add a code predicate
    pub fn predicate<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&ActionContext<'_, T>) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        self.add_predicate(name, f);
        self
    }

    /// Add a semantic action in place
    pub fn add_action<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&ActionContext<'_, T>) -> Result<Value<T>, ActionError> + Send + Sync + 'static,
    {
        self.actions.insert(name.to_string(), Arc::new(f));
    }

    /// Add a code predicate in place
    pub fn add_predicate<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&ActionContext<'_, T>) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        self.predicates.insert(name.to_string(), Arc::new(f));
    }
}

impl<T> Default for Actions<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated, immutable grammar
pub struct Grammar<T> {
    def: GrammarDef,
    actions: HashMap<ExprId, ActionFn<T>, RandomState>,
    predicates: HashMap<ExprId, PredicateFn<T>, RandomState>,
    classes: HashMap<ExprId, ClassMatcher, RandomState>,
    /// Failure descriptor per node; empty for non-atomic nodes
    descriptors: Vec<String>,
}

impl<T> Grammar<T> {
    /// Validate a definition and bind its callbacks
    ///
    /// Rule references are resolved at parse time; referring to an undefined
    /// rule is reported by the parse, not here.
    pub fn new(def: GrammarDef, callbacks: Actions<T>) -> Result<Self, GrammarError> {
        check_ids(&def)?;
        check_acyclic(&def.nodes)?;
        check_unique_rules(&def.rules)?;

        let mut actions = HashMap::with_hasher(RandomState::new());
        let mut predicates = HashMap::with_hasher(RandomState::new());
        let mut classes = HashMap::with_hasher(RandomState::new());
        let mut descriptors = Vec::with_capacity(def.nodes.len());

        for (id, node) in def.nodes.iter().enumerate() {
            let descriptor = match &node.expr {
                Expr::Literal { text, ignore_case } => {
                    format!("{:?}{}", text, if *ignore_case { "i" } else { "" })
                }
                Expr::CharClass(class) => {
                    if let Some(&(lo, hi)) = class.ranges.iter().find(|(lo, hi)| lo > hi) {
                        return Err(GrammarError::InvalidRange { lo, hi });
                    }
                    let matcher =
                        ClassMatcher::compile(class).map_err(GrammarError::UnknownCategory)?;
                    classes.insert(id, matcher);
                    class.describe()
                }
                Expr::AnyChar => ".".to_string(),
                Expr::Action { action, .. } => {
                    let f = callbacks
                        .actions
                        .get(action)
                        .ok_or_else(|| GrammarError::UnboundAction(action.clone()))?;
                    actions.insert(id, Arc::clone(f));
                    String::new()
                }
                Expr::AndPredicate { predicate } | Expr::NotPredicate { predicate } => {
                    let f = callbacks
                        .predicates
                        .get(predicate)
                        .ok_or_else(|| GrammarError::UnboundPredicate(predicate.clone()))?;
                    predicates.insert(id, Arc::clone(f));
                    String::new()
                }
                _ => String::new(),
            };
            descriptors.push(descriptor);
        }

        Ok(Self {
            def,
            actions,
            predicates,
            classes,
            descriptors,
        })
    }

    /// Load a definition from JSON and bind its callbacks
    pub fn from_json(json: &str, callbacks: Actions<T>) -> Result<Self, GrammarError> {
        Self::new(GrammarDef::from_json(json)?, callbacks)
    }

    /// Serialize the definition to JSON (callbacks are referenced by name)
    pub fn to_json(&self) -> Result<String, GrammarError> {
        self.def.to_json()
    }

    /// The underlying definition
    pub fn def(&self) -> &GrammarDef {
        &self.def
    }

    /// All rules, start rule first
    pub fn rules(&self) -> &[RuleDef] {
        &self.def.rules
    }

    /// Get a rule by index
    #[inline]
    pub fn rule(&self, index: usize) -> Option<&RuleDef> {
        self.def.rules.get(index)
    }

    /// Get a node by id
    #[inline]
    pub fn node(&self, id: ExprId) -> Option<&Node> {
        self.def.nodes.get(id)
    }

    /// Number of expression nodes
    #[inline]
    pub fn node_count(&self) -> usize {
        self.def.nodes.len()
    }

    /// Number of rules
    #[inline]
    pub fn rule_count(&self) -> usize {
        self.def.rules.len()
    }

    #[inline]
    pub(crate) fn action(&self, id: ExprId) -> Option<&ActionFn<T>> {
        self.actions.get(&id)
    }

    #[inline]
    pub(crate) fn predicate(&self, id: ExprId) -> Option<&PredicateFn<T>> {
        self.predicates.get(&id)
    }

    #[inline]
    pub(crate) fn class(&self, id: ExprId) -> Option<&ClassMatcher> {
        self.classes.get(&id)
    }

    #[inline]
    pub(crate) fn descriptor(&self, id: ExprId) -> &str {
        self.descriptors.get(id).map(String::as_str).unwrap_or("")
    }
}

impl<T> Clone for Grammar<T> {
    fn clone(&self) -> Self {
        Self {
            def: self.def.clone(),
            actions: self.actions.clone(),
            predicates: self.predicates.clone(),
            classes: self.classes.clone(),
            descriptors: self.descriptors.clone(),
        }
    }
}

impl<T> fmt::Debug for Grammar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("rules", &self.def.rules.len())
            .field("nodes", &self.def.nodes.len())
            .field("actions", &self.actions.len())
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

fn check_ids(def: &GrammarDef) -> Result<(), GrammarError> {
    let len = def.nodes.len();
    for rule in &def.rules {
        if rule.expr >= len {
            return Err(GrammarError::DanglingExpr {
                parent: format!("rule {}", rule.name),
                child: rule.expr,
            });
        }
    }
    for (id, node) in def.nodes.iter().enumerate() {
        if let Some(&child) = node.expr.children().iter().find(|&&c| c >= len) {
            return Err(GrammarError::DanglingExpr {
                parent: id.to_string(),
                child,
            });
        }
    }
    Ok(())
}

fn check_unique_rules(rules: &[RuleDef]) -> Result<(), GrammarError> {
    let mut names = HashSet::with_capacity_and_hasher(rules.len(), RandomState::new());
    for rule in rules {
        if !names.insert(rule.name.as_str()) {
            return Err(GrammarError::DuplicateRule(rule.name.clone()));
        }
    }
    Ok(())
}

/// Reject expressions that contain themselves without passing through a
/// rule reference (iterative DFS, white/grey/black)
fn check_acyclic(nodes: &[Node]) -> Result<(), GrammarError> {
    const WHITE: u8 = 0;
    const GREY: u8 = 1;
    const BLACK: u8 = 2;

    let mut state = vec![WHITE; nodes.len()];
    let mut stack: Vec<(ExprId, usize)> = Vec::new();

    for root in 0..nodes.len() {
        if state[root] != WHITE {
            continue;
        }
        state[root] = GREY;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (id, next) = *top;
            let children = nodes[id].expr.children();
            if next < children.len() {
                top.1 += 1;
                let child = children[next];
                let seen = state[child];
                match seen {
                    GREY => return Err(GrammarError::CyclicExpr(child)),
                    WHITE => {
                        state[child] = GREY;
                        stack.push((child, 0));
                    }
                    _ => {}
                }
            } else {
                state[id] = BLACK;
                stack.pop();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(text: &str) -> Expr {
        Expr::Literal {
            text: text.to_string(),
            ignore_case: false,
        }
    }

    #[test]
    fn test_build_and_lookup() {
        let mut def = GrammarDef::new();
        let a = def.push(literal("a"));
        let b = def.push(literal("b"));
        let seq = def.push(Expr::Sequence { exprs: vec![a, b] });
        def.add_rule("Start", Some("start"), seq);

        let grammar: Grammar<()> = Grammar::new(def, Actions::new()).unwrap();
        assert_eq!(grammar.rule_count(), 1);
        assert_eq!(grammar.node_count(), 3);
        assert_eq!(grammar.rule(0).unwrap().label(), "start");
        assert_eq!(grammar.descriptor(a), "\"a\"");
        assert_eq!(grammar.descriptor(seq), "");
    }

    #[test]
    fn test_dangling_child() {
        let mut def = GrammarDef::new();
        let seq = def.push(Expr::Sequence { exprs: vec![7] });
        def.add_rule("Start", None, seq);

        let err = Grammar::<()>::new(def, Actions::new()).unwrap_err();
        assert_eq!(
            err,
            GrammarError::DanglingExpr {
                parent: "0".into(),
                child: 7
            }
        );
    }

    #[test]
    fn test_dangling_rule_body() {
        let mut def = GrammarDef::new();
        def.add_rule("Start", None, 0);
        let err = Grammar::<()>::new(def, Actions::new()).unwrap_err();
        assert!(matches!(err, GrammarError::DanglingExpr { child: 0, .. }));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut def = GrammarDef::new();
        def.push(Expr::Optional { expr: 1 });
        def.push(Expr::Sequence { exprs: vec![0] });
        def.add_rule("Start", None, 0);

        let err = Grammar::<()>::new(def, Actions::new()).unwrap_err();
        assert!(matches!(err, GrammarError::CyclicExpr(_)));
    }

    #[test]
    fn test_shared_child_is_not_a_cycle() {
        let mut def = GrammarDef::new();
        let a = def.push(literal("a"));
        let seq = def.push(Expr::Sequence { exprs: vec![a, a] });
        def.add_rule("Start", None, seq);
        assert!(Grammar::<()>::new(def, Actions::new()).is_ok());
    }

    #[test]
    fn test_duplicate_rule() {
        let mut def = GrammarDef::new();
        let a = def.push(literal("a"));
        def.add_rule("A", None, a);
        def.add_rule("A", None, a);
        let err = Grammar::<()>::new(def, Actions::new()).unwrap_err();
        assert_eq!(err, GrammarError::DuplicateRule("A".into()));
    }

    #[test]
    fn test_unbound_callbacks() {
        let mut def = GrammarDef::new();
        let a = def.push(literal("a"));
        let act = def.push(Expr::Action {
            expr: a,
            action: "make".into(),
        });
        def.add_rule("A", None, act);

        let err = Grammar::<u8>::new(def.clone(), Actions::new()).unwrap_err();
        assert_eq!(err, GrammarError::UnboundAction("make".into()));

        let actions = Actions::new().action("make", |_| Ok(Value::Node(1u8)));
        let grammar = Grammar::new(def, actions).unwrap();
        assert!(grammar.action(act).is_some());
        assert!(grammar.action(a).is_none());

        let mut def = GrammarDef::new();
        let p = def.push(Expr::NotPredicate {
            predicate: "check".into(),
        });
        def.add_rule("P", None, p);
        let err = Grammar::<u8>::new(def, Actions::new()).unwrap_err();
        assert_eq!(err, GrammarError::UnboundPredicate("check".into()));
    }

    #[test]
    fn test_bad_class() {
        let mut def = GrammarDef::new();
        let c = def.push(Expr::CharClass(CharClass::new().category("Nope")));
        def.add_rule("C", None, c);
        let err = Grammar::<()>::new(def, Actions::new()).unwrap_err();
        assert_eq!(err, GrammarError::UnknownCategory("Nope".into()));

        let mut def = GrammarDef::new();
        let c = def.push(Expr::CharClass(CharClass::new().range('z', 'a')));
        def.add_rule("C", None, c);
        let err = Grammar::<()>::new(def, Actions::new()).unwrap_err();
        assert_eq!(err, GrammarError::InvalidRange { lo: 'z', hi: 'a' });
    }

    #[test]
    fn test_undefined_rule_ref_is_accepted() {
        let mut def = GrammarDef::new();
        let r = def.push(Expr::RuleRef {
            name: "Missing".into(),
        });
        def.add_rule("Start", None, r);
        assert!(Grammar::<()>::new(def, Actions::new()).is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "rules": [ { "name": "Greeting", "display_name": "greeting", "expr": 2 } ],
            "nodes": [
                { "expr": { "Literal": { "text": "hello", "ignore_case": true } } },
                { "expr": { "CharClass": { "ranges": [["a", "z"]] } } },
                { "expr": { "Sequence": { "exprs": [0, 1] } } }
            ]
        }"#;
        let grammar: Grammar<()> = Grammar::from_json(json, Actions::new()).unwrap();
        assert_eq!(grammar.descriptor(0), "\"hello\"i");
        assert_eq!(grammar.descriptor(1), "[a-z]");

        let reloaded: Grammar<()> =
            Grammar::from_json(&grammar.to_json().unwrap(), Actions::new()).unwrap();
        assert_eq!(reloaded.def(), grammar.def());
    }

    #[test]
    fn test_bad_json() {
        let err = GrammarDef::from_json("{ \"rules\": 3 }").unwrap_err();
        assert!(matches!(err, GrammarError::Json(_)));
    }
}
