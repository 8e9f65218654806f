//! Per-client rolling conversation memory
//!
//! Each remote caller gets a bounded FIFO of (user, assistant) turn pairs
//! keyed by a short fingerprint of its IP address. History lives for the
//! server process only; nothing is persisted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One completed exchange: the user content that was sent upstream and the
/// assistant content that came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub user: String,
    pub assistant: String,
}

#[derive(Debug, Default)]
struct ClientHistory {
    history: VecDeque<ContextEntry>,
    max_len: usize,
}

impl ClientHistory {
    fn trim(&mut self) {
        while self.history.len() > self.max_len {
            self.history.pop_front();
        }
    }

    /// Adopt a new bound, dropping the oldest entries if it shrank.
    fn resize(&mut self, max_len: usize) {
        if self.max_len != max_len {
            self.max_len = max_len;
        }
        self.trim();
    }
}

/// Conversation store for all clients, guarded by a single lock.
///
/// Critical sections are O(max_len); the lock is never held across I/O.
#[derive(Debug, Default)]
pub struct ContextStore {
    inner: Mutex<HashMap<String, ClientHistory>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a client's history pairs in chronological order, after
    /// trimming it to the currently configured bound.
    pub fn read(&self, client_id: &str, max_len: usize) -> Vec<ContextEntry> {
        let mut store = self.inner.lock().unwrap();
        let ctx = store.entry(client_id.to_string()).or_default();
        ctx.resize(max_len);
        ctx.history.iter().cloned().collect()
    }

    /// Push a completed exchange, keeping at most `max_len` pairs.
    pub fn append(&self, client_id: &str, user: String, assistant: String, max_len: usize) {
        let mut store = self.inner.lock().unwrap();
        let ctx = store.entry(client_id.to_string()).or_default();
        ctx.resize(max_len);
        ctx.history.push_back(ContextEntry { user, assistant });
        ctx.trim();
    }

    /// Drop every client's history wholesale.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    /// Number of clients currently tracked.
    pub fn client_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Derive the client fingerprint: first 8 hex characters of the MD5 of the
/// remote IP string. Not a security primitive; collisions in this
/// low-cardinality namespace are accepted.
pub fn client_id(remote_ip: &str) -> String {
    let digest = md5::compute(remote_ip.as_bytes());
    format!("{digest:x}")[..8].to_string()
}
