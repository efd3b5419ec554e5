//! Character classes
//!
//! A [`CharClass`] is the serializable description carried by the grammar;
//! [`ClassMatcher`] is its compiled form. Compilation pre-computes a 128-bit
//! bitmap for ASCII so the common case is a single bit test. Non-ASCII code
//! points fall back to the explicit sets, then to named Unicode categories,
//! which are matched with compiled `\p{..}` regexes.

use super::regex_cache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Character class description: `[abc]`, `[a-z]`, `[\pL]`, `[^...]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharClass {
    /// Individual characters
    #[serde(default)]
    pub chars: Vec<char>,
    /// Inclusive ranges
    #[serde(default)]
    pub ranges: Vec<(char, char)>,
    /// Unicode general categories or scripts (`L`, `Nd`, `Greek`, ...)
    #[serde(default)]
    pub categories: Vec<String>,
    /// Match any code point NOT in the class
    #[serde(default)]
    pub inverted: bool,
    /// Compare case-insensitively
    #[serde(default)]
    pub ignore_case: bool,
}

impl CharClass {
    /// Create an empty class
    pub fn new() -> Self {
        Self::default()
    }

    /// Add individual characters
    pub fn chars(mut self, chars: &str) -> Self {
        self.chars.extend(chars.chars());
        self
    }

    /// Add an inclusive range
    pub fn range(mut self, lo: char, hi: char) -> Self {
        self.ranges.push((lo, hi));
        self
    }

    /// Add a named Unicode category
    pub fn category(mut self, name: &str) -> Self {
        self.categories.push(name.to_string());
        self
    }

    /// Invert the class
    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    /// Match case-insensitively
    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Render the class the way it would be written in a grammar,
    /// e.g. `[^{} \t\r\n]` or `[a-z]i`
    pub fn describe(&self) -> String {
        let mut out = String::from("[");
        if self.inverted {
            out.push('^');
        }
        for &c in &self.chars {
            push_escaped(&mut out, c);
        }
        for &(lo, hi) in &self.ranges {
            push_escaped(&mut out, lo);
            out.push('-');
            push_escaped(&mut out, hi);
        }
        for name in &self.categories {
            if name.chars().count() == 1 {
                let _ = write!(out, "\\p{}", name);
            } else {
                let _ = write!(out, "\\p{{{}}}", name);
            }
        }
        out.push(']');
        if self.ignore_case {
            out.push('i');
        }
        out
    }
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '\t' => out.push_str("\\t"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\\' | ']' | '-' | '^' => {
            out.push('\\');
            out.push(c);
        }
        c if c.is_control() => {
            let _ = write!(out, "\\u{{{:x}}}", c as u32);
        }
        c => out.push(c),
    }
}

/// Lowercase a single code point, leaving multi-char expansions alone
#[inline]
pub fn fold_case(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

#[inline]
fn upper_case(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// Compiled character class
#[derive(Debug, Clone)]
pub struct ClassMatcher {
    /// Membership bitmap for ASCII, inversion not applied
    ascii: u128,
    chars: Vec<char>,
    ranges: Vec<(char, char)>,
    categories: Vec<Regex>,
    inverted: bool,
    ignore_case: bool,
}

impl ClassMatcher {
    /// Compile a class, returning the name of the first category the
    /// regex engine does not know
    pub fn compile(class: &CharClass) -> Result<Self, String> {
        let categories = class
            .categories
            .iter()
            .map(|name| regex_cache::category(name).ok_or_else(|| name.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut matcher = Self {
            ascii: 0,
            chars: class.chars.clone(),
            ranges: class.ranges.clone(),
            categories,
            inverted: class.inverted,
            ignore_case: class.ignore_case,
        };

        let mut ascii = 0u128;
        for b in 0u8..128 {
            if matcher.contains_slow(b as char) {
                ascii |= 1u128 << b;
            }
        }
        matcher.ascii = ascii;
        Ok(matcher)
    }

    /// Test a code point, inversion applied
    #[inline]
    pub fn matches(&self, c: char) -> bool {
        self.contains(c) != self.inverted
    }

    /// Test membership, ignoring inversion
    #[inline]
    pub fn contains(&self, c: char) -> bool {
        if c.is_ascii() {
            return self.ascii & (1u128 << (c as u32)) != 0;
        }
        self.contains_slow(c)
    }

    fn contains_slow(&self, c: char) -> bool {
        if self.contains_exact(c) {
            return true;
        }
        if self.ignore_case {
            let lower = fold_case(c);
            let upper = upper_case(c);
            return (lower != c && self.contains_exact(lower))
                || (upper != c && self.contains_exact(upper));
        }
        false
    }

    fn contains_exact(&self, c: char) -> bool {
        if self.chars.contains(&c) {
            return true;
        }
        if self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) {
            return true;
        }
        self.categories
            .iter()
            .any(|matcher| regex_cache::is_in(matcher, c))
    }
}

/// Get the UTF-8 character length from the first byte
///
/// Returns the number of bytes in the UTF-8 encoded character.
/// For ASCII (0x00-0x7F), returns 1.
/// For multi-byte sequences, returns 2, 3, or 4.
#[inline(always)]
pub fn utf8_char_len(first_byte: u8) -> usize {
    if first_byte & 0x80 == 0 {
        1 // ASCII: 0xxxxxxx
    } else if first_byte & 0xE0 == 0xC0 {
        2 // 2-byte: 110xxxxx
    } else if first_byte & 0xF0 == 0xE0 {
        3 // 3-byte: 1110xxxx
    } else if first_byte & 0xF8 == 0xF0 {
        4 // 4-byte: 11110xxx
    } else {
        1 // Invalid UTF-8, treat as single byte
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(class: CharClass) -> ClassMatcher {
        ClassMatcher::compile(&class).unwrap()
    }

    #[test]
    fn test_chars_and_ranges() {
        let m = compile(CharClass::new().chars("_").range('a', 'z').range('0', '9'));
        assert!(m.matches('a'));
        assert!(m.matches('q'));
        assert!(m.matches('_'));
        assert!(m.matches('7'));
        assert!(!m.matches('A'));
        assert!(!m.matches('-'));
    }

    #[test]
    fn test_inverted() {
        let m = compile(CharClass::new().chars("{} \t\r\n").inverted());
        assert!(m.matches('a'));
        assert!(m.matches('é'));
        assert!(!m.matches('{'));
        assert!(!m.matches('\n'));
    }

    #[test]
    fn test_categories() {
        let m = compile(CharClass::new().category("Lu").category("Greek"));
        assert!(m.matches('A'));
        assert!(m.matches('Ω'));
        assert!(m.matches('λ'));
        assert!(!m.matches('a'));
        assert!(!m.matches('1'));
    }

    #[test]
    fn test_unknown_category() {
        let err = ClassMatcher::compile(&CharClass::new().category("NotACategory")).unwrap_err();
        assert_eq!(err, "NotACategory");
    }

    #[test]
    fn test_ignore_case() {
        let m = compile(CharClass::new().range('a', 'f').ignore_case());
        assert!(m.matches('c'));
        assert!(m.matches('C'));
        assert!(!m.matches('G'));

        let m = compile(CharClass::new().chars("É").ignore_case());
        assert!(m.matches('é'));
    }

    #[test]
    fn test_describe() {
        let class = CharClass::new().chars("{} \t\r\n").inverted();
        assert_eq!(class.describe(), "[^{} \\t\\r\\n]");

        let class = CharClass::new().range('a', 'z').category("L").category("Greek").ignore_case();
        assert_eq!(class.describe(), "[a-z\\pL\\p{Greek}]i");
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_case('A'), 'a');
        assert_eq!(fold_case('a'), 'a');
        assert_eq!(fold_case('Σ'), 'σ');
        // 'İ' lowercases to two code points and is left unchanged
        assert_eq!(fold_case('İ'), 'İ');
    }

    #[test]
    fn test_utf8_char_len() {
        assert_eq!(utf8_char_len(b'a'), 1);
        assert_eq!(utf8_char_len(0xC3), 2);
        assert_eq!(utf8_char_len(0xE4), 3);
        assert_eq!(utf8_char_len(0xF0), 4);
        assert_eq!(utf8_char_len(0xFF), 1);
    }
}
