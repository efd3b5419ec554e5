//! Thread-local cache of compiled Unicode category matchers
//!
//! Character classes name categories (`L`, `Nd`, `Greek`, ...) rather than
//! patterns. Each name is compiled once per thread into an anchored
//! single-character regex; unknown names are remembered as misses so a
//! grammar naming a bad category fails fast on every rebuild.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    /// Category name -> matcher, `None` for names the regex engine rejects
    static CATEGORIES: RefCell<HashMap<String, Option<Regex>>> = RefCell::new(HashMap::new());
}

/// Matcher for a single code point of the named category or script
///
/// Returns `None` if the regex engine does not know `name`.
pub fn category(name: &str) -> Option<Regex> {
    CATEGORIES.with(|cache| {
        if let Some(entry) = cache.borrow().get(name) {
            return entry.clone();
        }

        let compiled = Regex::new(&format!(r"\A\p{{{}}}\z", name)).ok();
        cache
            .borrow_mut()
            .insert(name.to_string(), compiled.clone());
        compiled
    })
}

/// Test a code point against a compiled category matcher
#[inline]
pub fn is_in(matcher: &Regex, c: char) -> bool {
    let mut buf = [0u8; 4];
    matcher.is_match(c.encode_utf8(&mut buf))
}
