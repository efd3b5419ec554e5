//! Input cursor and savepoints
//!
//! The cursor decodes exactly one UTF-8 code point per step. Malformed units
//! are stepped over one byte at a time and surface as [`Decoded::Invalid`];
//! the end of input is the [`Decoded::Eof`] sentinel.

use super::char_class::utf8_char_len;
use super::source_location::SourcePosition;

/// The unit under the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A well-formed code point
    Char(char),
    /// A malformed byte (always one byte wide)
    Invalid,
    /// End of input
    Eof,
}

impl Decoded {
    /// The decoded code point, if any
    #[inline]
    pub fn as_char(self) -> Option<char> {
        match self {
            Decoded::Char(c) => Some(c),
            _ => None,
        }
    }
}

/// Decode the unit starting at `offset`, returning it with its byte width
#[inline]
pub fn decode(input: &[u8], offset: usize) -> (Decoded, usize) {
    let Some(&first) = input.get(offset) else {
        return (Decoded::Eof, 0);
    };
    if first < 0x80 {
        return (Decoded::Char(first as char), 1);
    }

    let width = utf8_char_len(first);
    let ch = input
        .get(offset..offset + width)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .and_then(|s| s.chars().next());

    match ch {
        Some(c) => (Decoded::Char(c), width),
        None => (Decoded::Invalid, 1),
    }
}

/// Snapshot of the cursor; restoring one is exact and O(1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint {
    /// Position of the current unit
    pub position: SourcePosition,
    /// The current unit
    pub current: Decoded,
    /// Byte width of the current unit
    pub width: usize,
}

impl Savepoint {
    /// Byte offset of the current unit
    #[inline]
    pub fn offset(&self) -> usize {
        self.position.offset
    }
}

/// Cursor over a byte buffer
#[derive(Debug, Clone)]
pub struct Cursor<'i> {
    input: &'i [u8],
    pt: Savepoint,
}

impl<'i> Cursor<'i> {
    /// Create a cursor primed with the first unit of `input`
    pub fn new(input: &'i [u8]) -> Self {
        let (current, width) = decode(input, 0);
        Self {
            input,
            pt: Savepoint {
                position: SourcePosition::start(),
                current,
                width,
            },
        }
    }

    /// The unit under the cursor
    #[inline]
    pub fn current(&self) -> Decoded {
        self.pt.current
    }

    /// Position of the unit under the cursor
    #[inline]
    pub fn position(&self) -> SourcePosition {
        self.pt.position
    }

    /// Byte offset of the unit under the cursor
    #[inline]
    pub fn offset(&self) -> usize {
        self.pt.position.offset
    }

    /// Whether the cursor sits on the end-of-input sentinel
    #[inline]
    pub fn at_eof(&self) -> bool {
        self.pt.current == Decoded::Eof
    }

    /// Step past the current unit and decode the next one
    ///
    /// Returns the newly current unit. Advancing at end of input is a no-op.
    #[inline]
    pub fn advance(&mut self) -> Decoded {
        if self.at_eof() {
            return Decoded::Eof;
        }
        let position = self
            .pt
            .position
            .advanced(self.pt.current.as_char(), self.pt.width);
        let (current, width) = decode(self.input, position.offset);
        self.pt = Savepoint {
            position,
            current,
            width,
        };
        current
    }

    /// Take a snapshot of the cursor
    #[inline]
    pub fn savepoint(&self) -> Savepoint {
        self.pt
    }

    /// Restore a snapshot taken on this cursor
    #[inline]
    pub fn restore(&mut self, pt: Savepoint) {
        self.pt = pt;
    }

    /// Raw bytes consumed since `start`
    #[inline]
    pub fn slice_from(&self, start: &Savepoint) -> &'i [u8] {
        let input: &'i [u8] = self.input;
        &input[start.offset().min(self.offset())..self.offset()]
    }

    /// The whole input buffer
    #[inline]
    pub fn input(&self) -> &'i [u8] {
        self.input
    }
}
