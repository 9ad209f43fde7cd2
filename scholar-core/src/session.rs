//! Bounded conversation history, keyed by session id.
//!
//! Each session keeps the last few (query, answer) exchanges. The history
//! of one session sits behind its own async mutex; the chat manager holds
//! that lock for the whole of a query so two requests for the same session
//! are answered one after the other and never interleave their updates.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// One resolved question and its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub query: String,
    pub answer: String,
}

/// The capped exchange window of a single session.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    exchanges: VecDeque<Exchange>,
    cap: usize,
}

impl SessionHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            exchanges: VecDeque::with_capacity(cap + 1),
            cap,
        }
    }

    /// Appends an exchange, evicting the oldest ones beyond the cap.
    pub fn push(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.exchanges.push_back(Exchange {
            query: query.into(),
            answer: answer.into(),
        });
        while self.exchanges.len() > self.cap {
            self.exchanges.pop_front();
        }
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

/// Renders exchanges as `User: ...` / `Assistant: ...` lines.
pub fn format_exchanges(exchanges: &[Exchange]) -> Option<String> {
    if exchanges.is_empty() {
        return None;
    }

    let lines: Vec<String> = exchanges
        .iter()
        .flat_map(|exchange| {
            [
                format!("User: {}", exchange.query),
                format!("Assistant: {}", exchange.answer),
            ]
        })
        .collect();
    Some(lines.join("\n"))
}

/// Shared store of every session's history.
///
/// Any id passed to [`lock`](Self::lock) or [`append`](Self::append) gets a
/// session. Sessions are kept until [`clear`](Self::clear) removes them;
/// nothing is evicted on its own.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionHistory>>>>,
    max_history: usize,
    counter: AtomicU64,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
            counter: AtomicU64::new(0),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Creates an empty session and returns its id (`session_1`, `session_2`, ...).
    pub async fn create_session(&self) -> String {
        let id = format!("session_{}", self.counter.fetch_add(1, Ordering::Relaxed) + 1);
        self.slot(&id).await;
        id
    }

    /// Exclusive access to a session's history, created on first use.
    ///
    /// Holding the guard serializes every other reader and writer of the
    /// same session.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<SessionHistory> {
        self.slot(session_id).await.lock_owned().await
    }

    /// Exchanges remembered for `session_id`, oldest first. Unknown ids yield nothing.
    pub async fn get_history(&self, session_id: &str) -> Vec<Exchange> {
        let slot = self.sessions.read().await.get(session_id).cloned();
        match slot {
            Some(slot) => slot.lock().await.exchanges(),
            None => Vec::new(),
        }
    }

    /// Records an exchange, evicting the oldest ones beyond the cap.
    pub async fn append(&self, session_id: &str, query: &str, answer: &str) {
        self.lock(session_id).await.push(query, answer);
    }

    /// History rendered for inclusion in a prompt.
    pub async fn format_history(&self, session_id: &str) -> Option<String> {
        format_exchanges(&self.get_history(session_id).await)
    }

    /// Forgets a session. Its id starts over empty if it is used again.
    pub async fn clear(&self, session_id: &str) {
        let slot = self.sessions.write().await.remove(session_id);
        if let Some(slot) = slot {
            slot.lock().await.clear();
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn slot(&self, session_id: &str) -> Arc<Mutex<SessionHistory>> {
        if let Some(slot) = self.sessions.read().await.get(session_id) {
            return Arc::clone(slot);
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionHistory::new(self.max_history)))),
        )
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(2)
    }
}
