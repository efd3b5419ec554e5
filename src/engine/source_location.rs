//! Source Location Utilities
//!
//! Positions are tracked incrementally by the cursor while it decodes input,
//! and carried by grammar nodes so diagnostics can point back at the grammar
//! source that produced them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in code points)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Create a position at the start of input
    #[inline]
    pub fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Position of the code point following `ch`, which starts at `self`
    /// and occupies `width` bytes.
    #[inline]
    pub fn advanced(self, ch: Option<char>, width: usize) -> Self {
        if ch == Some('\n') {
            Self {
                offset: self.offset + width,
                line: self.line + 1,
                column: 1,
            }
        } else {
            Self {
                offset: self.offset + width,
                line: self.line,
                column: self.column + 1,
            }
        }
    }

    /// Calculate position from a byte offset in the input
    ///
    /// Malformed units count as one column each, matching how the cursor
    /// steps over them.
    pub fn from_offset(input: &[u8], offset: usize) -> Self {
        let offset = offset.min(input.len());
        let before = &input[..offset];

        // newline bytes never occur inside a multi-byte sequence
        let mut pos = match memchr::memrchr(b'\n', before) {
            Some(nl) => Self::new(nl + 1, memchr::memchr_iter(b'\n', before).count() + 1, 1),
            None => Self::start(),
        };

        while pos.offset < offset {
            let (ch, width) = super::cursor::decode(input, pos.offset);
            pos = pos.advanced(ch.as_char(), width.max(1));
        }

        pos
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.line, self.column, self.offset)
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::start()
    }
}
