//! Per-key session queues
//!
//! The outer map is locked only to find or create a key's entry. Each key's
//! queue has its own lock, and each key has an async guard that serializes
//! dispatch-and-enqueue so concurrent callers cannot overfill the queue or
//! send duplicate dispatch requests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use pocket_core::{PocketError, Result, Session};

use crate::Queue;

/// What the store holds for a session key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No session was ever enqueued for the key
    Missing,
    /// The key is known but its queue has been drained
    Empty,
    /// Front of the queue
    Current(Session),
}

type SharedQueue = Arc<Mutex<Queue<Session>>>;

pub struct SessionStore {
    max_sessions: usize,
    queues: RwLock<HashMap<String, SharedQueue>>,
    dispatch_guards: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionStore {
    /// `max_sessions` bounds each key's queue (0 = unbounded)
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            queues: RwLock::new(HashMap::new()),
            dispatch_guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.queues.read().contains_key(key)
    }

    pub fn peek(&self, key: &str) -> Lookup {
        let Some(queue) = self.queue(key) else {
            return Lookup::Missing;
        };
        let queue = queue.lock();
        match queue.peek_front() {
            Some(session) => Lookup::Current(session.clone()),
            None => Lookup::Empty,
        }
    }

    /// Append a session, re-checking capacity under the key's lock.
    ///
    /// Returns the queue length after insertion.
    pub fn enqueue(&self, key: &str, session: Session) -> Result<usize> {
        let queue = self.queue_or_insert(key);
        let mut queue = queue.lock();
        if self.max_sessions > 0 && queue.len() >= self.max_sessions {
            return Err(PocketError::MaxSessionsReached);
        }
        queue.enqueue(session);
        Ok(queue.len())
    }

    /// Remove the oldest session for the key
    pub fn dequeue(&self, key: &str) -> Option<Session> {
        self.queue(key)?.lock().dequeue()
    }

    /// Remove the oldest session only if it is the one named `session_key`
    pub fn dequeue_if(&self, key: &str, session_key: &str) -> Option<Session> {
        let queue = self.queue(key)?;
        let mut queue = queue.lock();
        match queue.peek_front() {
            Some(front) if front.key == session_key => queue.dequeue(),
            _ => None,
        }
    }

    pub fn len(&self, key: &str) -> usize {
        self.queue(key).map(|q| q.lock().len()).unwrap_or(0)
    }

    /// Sessions for the key, oldest first
    pub fn snapshot(&self, key: &str) -> Vec<Session> {
        self.queue(key)
            .map(|q| q.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Apply `f` to the current session, if any
    pub fn update_current<R>(&self, key: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let queue = self.queue(key)?;
        let mut queue = queue.lock();
        queue.peek_front_mut().map(f)
    }

    /// Apply `f` to the current session only if it is the one named `session_key`
    pub fn update_current_if<R>(
        &self,
        key: &str,
        session_key: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let queue = self.queue(key)?;
        let mut queue = queue.lock();
        queue
            .peek_front_mut()
            .filter(|front| front.key == session_key)
            .map(f)
    }

    pub fn keys(&self) -> Vec<String> {
        self.queues.read().keys().cloned().collect()
    }

    /// Guard serializing dispatch-and-enqueue for one key
    pub fn dispatch_guard(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.dispatch_guards
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    pub fn clear(&self) {
        self.queues.write().clear();
    }

    fn queue(&self, key: &str) -> Option<SharedQueue> {
        self.queues.read().get(key).cloned()
    }

    fn queue_or_insert(&self, key: &str) -> SharedQueue {
        if let Some(queue) = self.queue(key) {
            return queue;
        }
        self.queues
            .write()
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}
