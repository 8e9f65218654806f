//! Freeze/thaw protection for fragile substrings
//!
//! Game text arrives full of markup the upstream model must not touch:
//! `{{placeholders}}`, HTML/ruby tags, escaped and literal line breaks.
//! Before a snippet is sent upstream every such fragment is swapped for a
//! short `[T_n]` token, and the originals are restored verbatim after the
//! translated text comes back.

use std::collections::HashMap;

use regex::Regex;

/// Per-attempt mapping from `[T_n]` token to the original substring.
///
/// A map lives only for the duration of a single upstream attempt and is
/// never shared between attempts or clients.
#[derive(Debug, Default)]
pub struct EscapeMap {
    slots: HashMap<String, String>,
}

impl EscapeMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.slots.get(key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Swaps fragile substrings for stable tokens and back.
pub struct EscapeProtector {
    /// Matches `{{...}}`, `<...>` tags, two-character escape sequences and
    /// literal control characters, in scan order.
    fragile: Regex,
    /// Matches a `[T_n]` token together with any surrounding whitespace.
    token: Regex,
}

impl EscapeProtector {
    pub fn new() -> Self {
        Self {
            fragile: Regex::new(r"\{\{.*?\}\}|<[^>]+>|\\r\\n|\\n|\\r|\\t|\r\n|\n|\r|\t")
                .expect("fragile pattern is valid"),
            token: Regex::new(r"\s*\[T_(\d+)\]\s*").expect("token pattern is valid"),
        }
    }

    /// Replace every fragile fragment with ` [T_k] ` (k counted from 0 in
    /// scan order) and record the original in the returned map.
    ///
    /// The single-space padding around each token is load-bearing: without
    /// it models tend to absorb adjacent tokens into surrounding words.
    pub fn freeze(&self, input: &str) -> (String, EscapeMap) {
        let mut map = EscapeMap::default();
        let mut out = String::with_capacity(input.len());
        let mut last = 0;

        for (k, m) in self.fragile.find_iter(input).enumerate() {
            out.push_str(&input[last..m.start()]);

            let key = format!("[T_{k}]");
            out.push(' ');
            out.push_str(&key);
            out.push(' ');

            map.slots.insert(key, m.as_str().to_string());
            last = m.end();
        }

        out.push_str(&input[last..]);
        (out, map)
    }

    /// Restore the original substrings, consuming the whitespace the freeze
    /// step (or the model) put around each token. Tokens with no map entry
    /// are re-emitted bare, without the surrounding whitespace.
    pub fn thaw(&self, input: &str, map: &EscapeMap) -> String {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;

        for caps in self.token.captures_iter(input) {
            let whole = caps.get(0).expect("group 0 always present");
            out.push_str(&input[last..whole.start()]);

            let key = format!("[T_{}]", &caps[1]);
            match map.get(&key) {
                Some(original) => out.push_str(original),
                None => out.push_str(&key),
            }

            last = whole.end();
        }

        out.push_str(&input[last..]);
        out
    }
}

impl Default for EscapeProtector {
    fn default() -> Self {
        Self::new()
    }
}
