//! Round-robin rotation over the configured API keys

use std::sync::Mutex;

#[derive(Debug, Default)]
struct RotatorState {
    keys: Vec<String>,
    next: usize,
}

/// Thread-safe round-robin selector over the comma-split key list.
///
/// `set_keys` replaces the whole keyset and rewinds the cursor, so a config
/// reload always restarts rotation from the first declared key.
#[derive(Debug, Default)]
pub struct KeyRotator {
    inner: Mutex<RotatorState>,
}

impl KeyRotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the keyset atomically and reset the cursor to 0.
    pub fn set_keys(&self, keys: Vec<String>) {
        let mut state = self.inner.lock().unwrap();
        state.keys = keys;
        state.next = 0;
    }

    /// Return the current key and advance the cursor modulo the keyset size.
    /// `None` when no keys are configured.
    pub fn next_key(&self) -> Option<String> {
        let mut state = self.inner.lock().unwrap();
        if state.keys.is_empty() {
            return None;
        }
        let key = state.keys[state.next].clone();
        state.next = (state.next + 1) % state.keys.len();
        Some(key)
    }
}

/// Split a raw comma-separated key string into trimmed, non-empty keys.
pub fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_cycling() {
        let rotator = KeyRotator::new();
        rotator.set_keys(vec!["k1".into(), "k2".into()]);

        assert_eq!(rotator.next_key().as_deref(), Some("k1"));
        assert_eq!(rotator.next_key().as_deref(), Some("k2"));
        assert_eq!(rotator.next_key().as_deref(), Some("k1"));
    }

    #[test]
    fn test_single_key() {
        let rotator = KeyRotator::new();
        rotator.set_keys(vec!["only".into()]);

        assert_eq!(rotator.next_key().as_deref(), Some("only"));
        assert_eq!(rotator.next_key().as_deref(), Some("only"));
    }

    #[test]
    fn test_empty_keyset_unavailable() {
        let rotator = KeyRotator::new();
        assert_eq!(rotator.next_key(), None);

        rotator.set_keys(Vec::new());
        assert_eq!(rotator.next_key(), None);
    }

    #[test]
    fn test_set_keys_resets_cursor() {
        let rotator = KeyRotator::new();
        rotator.set_keys(vec!["a".into(), "b".into()]);
        rotator.next_key();

        rotator.set_keys(vec!["x".into(), "y".into()]);
        assert_eq!(rotator.next_key().as_deref(), Some("x"));
    }

    #[test]
    fn test_split_keys_trims_and_skips_empty() {
        assert_eq!(split_keys("k1, k2 ,,k3"), vec!["k1", "k2", "k3"]);
        assert_eq!(split_keys(""), Vec::<String>::new());
        assert_eq!(split_keys(" , "), Vec::<String>::new());
    }
}
