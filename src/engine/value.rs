//! Values produced by evaluation
//!
//! The engine never builds trees on its own: matchers yield the text they
//! consumed, compound expressions yield lists, and semantic actions turn
//! those into caller-defined nodes of type `T`.

use std::fmt;

/// A value produced by an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value<T> {
    /// No value (absent optional, lookahead, failed action)
    Nil,
    /// Matched input text (lossily decoded)
    Text(String),
    /// Ordered child values (sequences, repetitions)
    List(Vec<Value<T>>),
    /// A caller-defined node produced by an action
    Node(T),
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Nil
    }
}

impl<T> Value<T> {
    /// Check if this is the "no value" sentinel
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Get matched text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get child values
    pub fn as_list(&self) -> Option<&[Value<T>]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the caller-defined node
    pub fn as_node(&self) -> Option<&T> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Take the caller-defined node
    pub fn into_node(self) -> Option<T> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Take child values
    pub fn into_list(self) -> Option<Vec<Value<T>>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Iterate over every node in this value, depth first
    pub fn nodes(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_nodes(&mut out);
        out
    }

    fn collect_nodes<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            Value::Node(node) => out.push(node),
            Value::List(items) => items.iter().for_each(|item| item.collect_nodes(out)),
            Value::Nil | Value::Text(_) => {}
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Node(node) => write!(f, "{:?}", node),
        }
    }
}

/// Label bindings visible to an action or predicate
///
/// A later binding of the same label shadows an earlier one.
#[derive(Debug)]
pub struct Bindings<'a, T> {
    entries: &'a [(&'a str, Value<T>)],
}

impl<T> Clone for Bindings<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Bindings<'_, T> {}

impl<'a, T> Bindings<'a, T> {
    /// Wrap a slice of bindings
    pub fn new(entries: &'a [(&'a str, Value<T>)]) -> Self {
        Self { entries }
    }

    /// Look up a label
    pub fn get(&self, label: &str) -> Option<&'a Value<T>> {
        self.entries
            .iter()
            .rev()
            .find(|(name, _)| *name == label)
            .map(|(_, value)| value)
    }

    /// Check whether a label is bound
    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Number of bindings (shadowed ones included)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over bindings in the order they were made
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value<T>)> {
        self.entries.iter().map(|(name, value)| (*name, value))
    }
}
