//! Session acquisition
//!
//! Looks up the current session for an (AAT, chain) pair and, when there is
//! none, asks a dispatcher for one. Staleness is reported by
//! [`Session::is_stale`]; eviction is an explicit [`SessionManager::destroy_session`].
//! No retries happen here.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use pocket_core::{
    now_millis, session_key, Aat, Configuration, DispatchRequest, KeyValueStore, KeyValueStoreExt,
    PocketError, Result, Session, SessionHeader,
};
use pocket_routing::NodeRegistry;
use pocket_rpc::RelayDispatcher;

use crate::{Lookup, SessionStore};

/// Store key of the persisted session map (`session key -> [Session]`)
pub const SESSIONS_KEY: &str = "SESSIONS";

const EVENT_CHANNEL_SIZE: usize = 64;

/// Notifications about session lifecycle and persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Created { session_key: String, chain: String },
    Destroyed { session_key: String },
    PersistFailed { session_key: String, error: String },
}

pub struct SessionManager {
    config: Configuration,
    registry: Arc<NodeRegistry>,
    dispatcher: Arc<RelayDispatcher>,
    store: Arc<dyn KeyValueStore>,
    sessions: Arc<SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    /// Serializes read-modify-write of the persisted session map
    persist_lock: Arc<Mutex<()>>,
}

impl SessionManager {
    pub fn new(
        config: Configuration,
        registry: Arc<NodeRegistry>,
        dispatcher: Arc<RelayDispatcher>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            sessions: Arc::new(SessionStore::new(config.max_sessions)),
            config,
            registry,
            dispatcher,
            store,
            events,
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn session_key(&self, aat: &Aat, chain: &str) -> Result<String> {
        session_key(aat, chain)
    }

    /// Current session for the pair, dispatching for one if none was ever held.
    ///
    /// A drained queue yields `SessionNotFound`; callers re-request explicitly.
    pub async fn get_current_session(&self, aat: &Aat, chain: &str) -> Result<Session> {
        let key = self.session_key(aat, chain)?;
        if let Some(current) = self.current(&key)? {
            return Ok(current);
        }

        let guard = self.sessions.dispatch_guard(&key);
        let _held = guard.lock().await;

        // Another caller may have dispatched while we waited
        match self.current(&key)? {
            Some(current) => Ok(current),
            None => {
                let dispatcher = self.registry.random_dispatcher()?;
                self.dispatch_and_enqueue(&key, &dispatcher, aat, chain, 0)
                    .await
            }
        }
    }

    /// Dispatch for a new session through a random dispatcher and queue it
    pub async fn request_current_session(
        &self,
        aat: &Aat,
        chain: &str,
        session_block_height: u64,
    ) -> Result<Session> {
        let dispatcher = self.registry.random_dispatcher()?;
        self.request_current_session_via(&dispatcher, aat, chain, session_block_height)
            .await
    }

    /// Dispatch for a new session through a specific dispatcher and queue it
    pub async fn request_current_session_via(
        &self,
        dispatcher: &Url,
        aat: &Aat,
        chain: &str,
        session_block_height: u64,
    ) -> Result<Session> {
        let key = self.session_key(aat, chain)?;
        let guard = self.sessions.dispatch_guard(&key);
        let _held = guard.lock().await;
        self.dispatch_and_enqueue(&key, dispatcher, aat, chain, session_block_height)
            .await
    }

    /// Replace the session named `stale` (or fill an empty queue) through `dispatcher`.
    ///
    /// Runs under the key's dispatch guard. The stale session is removed only
    /// while it is still current, and a dispatch is sent only when the queue
    /// holds nothing afterwards, so concurrent refreshes of the same session
    /// share one replacement.
    pub async fn refresh_session_via(
        &self,
        dispatcher: &Url,
        aat: &Aat,
        chain: &str,
        stale: Option<&str>,
    ) -> Result<Session> {
        let key = self.session_key(aat, chain)?;
        let guard = self.sessions.dispatch_guard(&key);
        let _held = guard.lock().await;

        if let Some(stale) = stale {
            if let Some(removed) = self.sessions.dequeue_if(&key, stale) {
                self.destroyed(&key, chain, &removed).await;
            }
        }
        if let Lookup::Current(current) = self.sessions.peek(&key) {
            debug!("Session for chain {} already replaced ({})", chain, short(&key));
            return Ok(current);
        }
        self.dispatch_and_enqueue(&key, dispatcher, aat, chain, 0)
            .await
    }

    /// Discard the oldest session for the pair
    pub async fn destroy_session(&self, aat: &Aat, chain: &str) -> Result<Option<Session>> {
        let key = self.session_key(aat, chain)?;
        let removed = self.sessions.dequeue(&key);
        if let Some(session) = &removed {
            self.destroyed(&key, chain, session).await;
        }
        Ok(removed)
    }

    /// Count a relay against the current session; returns the new count
    pub async fn record_relay(&self, aat: &Aat, chain: &str) -> Result<u64> {
        let key = self.session_key(aat, chain)?;
        let count = self
            .sessions
            .update_current(&key, count_relay)
            .ok_or(PocketError::SessionNotFound)?;
        self.persist(&key).await;
        Ok(count)
    }

    /// Count a relay against the session named `session_key`.
    ///
    /// Fails with `SessionNotFound` once that session is no longer current.
    pub async fn record_relay_for(&self, aat: &Aat, chain: &str, session_key: &str) -> Result<u64> {
        let key = self.session_key(aat, chain)?;
        let count = self
            .sessions
            .update_current_if(&key, session_key, count_relay)
            .ok_or(PocketError::SessionNotFound)?;
        self.persist(&key).await;
        Ok(count)
    }

    pub fn queue_len(&self, aat: &Aat, chain: &str) -> Result<usize> {
        Ok(self.sessions.len(&self.session_key(aat, chain)?))
    }

    /// Reload persisted sessions into empty queues.
    ///
    /// Keeps the most recent `max_sessions` per key. Returns how many were restored.
    pub fn restore(&self) -> Result<usize> {
        let persisted: BTreeMap<String, Vec<Session>> =
            self.store.load(SESSIONS_KEY)?.unwrap_or_default();

        let mut restored = 0;
        for (key, sessions) in persisted {
            if self.sessions.len(&key) > 0 {
                continue;
            }
            let max = self.config.max_sessions;
            let skip = if max > 0 { sessions.len().saturating_sub(max) } else { 0 };
            for session in sessions.into_iter().skip(skip) {
                self.sessions.enqueue(&key, session)?;
                restored += 1;
            }
        }
        info!("Restored {} persisted sessions", restored);
        Ok(restored)
    }

    fn current(&self, key: &str) -> Result<Option<Session>> {
        match self.sessions.peek(key) {
            Lookup::Current(session) => Ok(Some(session)),
            Lookup::Empty => Err(PocketError::SessionNotFound),
            Lookup::Missing => Ok(None),
        }
    }

    /// Must be called with the key's dispatch guard held
    async fn dispatch_and_enqueue(
        &self,
        key: &str,
        dispatcher: &Url,
        aat: &Aat,
        chain: &str,
        session_block_height: u64,
    ) -> Result<Session> {
        let header = SessionHeader::new(&aat.app_pub_key, chain, session_block_height)?;
        let request = DispatchRequest::from(&header);

        debug!(
            "Requesting session for chain {} at height {} from {}",
            chain, session_block_height, dispatcher
        );
        let response = self
            .dispatcher
            .dispatch(dispatcher, &request, self.config.request_timeout())
            .await?;

        let session = Session::from_dispatch(response, &self.config, now_millis())?;
        let node_count = session.nodes.len();
        let queued = self.sessions.enqueue(key, session)?;
        info!(
            "Session for chain {} created with {} nodes ({} queued, {})",
            chain,
            node_count,
            queued,
            short(key)
        );

        self.persist(key).await;
        let _ = self.events.send(SessionEvent::Created {
            session_key: key.to_string(),
            chain: chain.to_string(),
        });

        self.current(key)?.ok_or(PocketError::SessionNotFound)
    }

    async fn destroyed(&self, key: &str, chain: &str, session: &Session) {
        info!(
            "Destroyed session {} for chain {} ({})",
            short(&session.key),
            chain,
            short(key)
        );
        self.persist(key).await;
        let _ = self.events.send(SessionEvent::Destroyed {
            session_key: key.to_string(),
        });
    }

    /// Write the key's queue to the durable map. Failures are reported, never returned.
    ///
    /// Store I/O runs on the blocking pool. The queue is read under the persist
    /// lock, so the last write always carries the newest state.
    async fn persist(&self, key: &str) {
        let sessions = self.sessions.clone();
        let store = self.store.clone();
        let lock = self.persist_lock.clone();
        let owned = key.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let _guard = lock.lock();
            write_persisted(store.as_ref(), &owned, sessions.snapshot(&owned))
        })
        .await
        .unwrap_or_else(|e| Err(PocketError::Storage(format!("persist task failed: {}", e))));

        if let Err(e) = result {
            warn!("Failed to persist sessions for {}: {}", short(key), e);
            let _ = self.events.send(SessionEvent::PersistFailed {
                session_key: key.to_string(),
                error: e.to_string(),
            });
        }
    }
}

fn write_persisted(store: &dyn KeyValueStore, key: &str, snapshot: Vec<Session>) -> Result<()> {
    let mut persisted: BTreeMap<String, Vec<Session>> =
        store.load(SESSIONS_KEY)?.unwrap_or_default();
    if snapshot.is_empty() {
        persisted.remove(key);
    } else {
        persisted.insert(key.to_string(), snapshot);
    }
    store.save(SESSIONS_KEY, &persisted)
}

fn count_relay(session: &mut Session) -> u64 {
    session.relay_count += 1;
    session.relay_count
}

fn short(key: &str) -> &str {
    &key[..key.len().min(8)]
}
