//! Label scope stack
//!
//! Frames are stored flat: one vector of `(label, value)` pairs plus the
//! start index of every open frame. Popping a frame truncates the vector, so
//! bindings written inside it disappear together with it.

use super::value::{Bindings, Value};

/// Per-parse stack of label frames
#[derive(Debug)]
pub struct ScopeStack<'g, T> {
    bindings: Vec<(&'g str, Value<T>)>,
    frames: Vec<usize>,
}

impl<'g, T> ScopeStack<'g, T> {
    /// Create a stack with a single root frame
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            frames: vec![0],
        }
    }

    /// Open a new, empty frame
    #[inline]
    pub fn push(&mut self) {
        self.frames.push(self.bindings.len());
    }

    /// Close the innermost frame, discarding its bindings
    ///
    /// The root frame is never removed.
    #[inline]
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            if let Some(start) = self.frames.pop() {
                self.bindings.truncate(start);
            }
        }
    }

    /// Number of open frames, root included
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind a label in the innermost frame
    #[inline]
    pub fn bind(&mut self, label: &'g str, value: Value<T>) {
        self.bindings.push((label, value));
    }

    /// Bindings of the innermost frame
    #[inline]
    pub fn current(&self) -> Bindings<'_, T> {
        let start = self.frames.last().copied().unwrap_or(0);
        Bindings::new(&self.bindings[start..])
    }

    /// Marker for the bindings written so far
    #[inline]
    pub fn mark(&self) -> usize {
        self.bindings.len()
    }

    /// Drop bindings written after `mark`
    #[inline]
    pub fn truncate(&mut self, mark: usize) {
        self.bindings.truncate(mark);
    }

    /// Bindings written after `mark`
    #[inline]
    pub fn since(&self, mark: usize) -> &[(&'g str, Value<T>)] {
        self.bindings.get(mark..).unwrap_or(&[])
    }
}

impl<T> Default for ScopeStack<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
