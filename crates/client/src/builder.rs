//! Builder for fluent `Pocket` initialization

use std::sync::Arc;

use parking_lot::Mutex;
use rand::RngCore;
use reqwest::Url;
use tracing::info;

use pocket_core::{
    default_rng, seeded_rng, BoxedRng, Configuration, KeyValueStore, Keybase, MemoryStore,
    PocketError, Result,
};
use pocket_routing::NodeRegistry;
use pocket_rpc::RelayDispatcher;
use pocket_session::SessionManager;

use crate::Pocket;

pub struct PocketBuilder {
    dispatchers: Vec<Url>,
    config: Option<Configuration>,
    store: Option<Arc<dyn KeyValueStore>>,
    keybase: Option<Arc<dyn Keybase>>,
    rng: Option<BoxedRng>,
    http_client: Option<reqwest::Client>,
    restore_sessions: bool,
}

impl PocketBuilder {
    pub fn new() -> Self {
        Self {
            dispatchers: Vec::new(),
            config: None,
            store: None,
            keybase: None,
            rng: None,
            http_client: None,
            restore_sessions: false,
        }
    }

    /// Starting dispatcher set
    pub fn dispatchers(mut self, dispatchers: Vec<Url>) -> Self {
        self.dispatchers = dispatchers;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Url) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    pub fn configuration(mut self, config: Configuration) -> Self {
        self.config = Some(config);
        self
    }

    /// Shared store for the dispatcher list and session history (in-memory if unset)
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn keybase(mut self, keybase: Arc<dyn Keybase>) -> Self {
        self.keybase = Some(keybase);
        self
    }

    /// Random source for dispatcher and node selection and proof entropy
    pub fn rng(mut self, rng: BoxedRng) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Reload sessions persisted in the store before the first relay
    pub fn restore_sessions(mut self, restore: bool) -> Self {
        self.restore_sessions = restore;
        self
    }

    pub fn build(self) -> Result<Pocket> {
        let keybase = self
            .keybase
            .ok_or_else(|| PocketError::Configuration("a keybase is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);

        // the registry draws from its own generator, seeded from ours
        let mut rng = self.rng.unwrap_or_else(default_rng);
        let registry = Arc::new(NodeRegistry::new(
            self.dispatchers,
            config.max_dispatchers,
            store.clone(),
            seeded_rng(rng.next_u64()),
        )?);

        let dispatcher = Arc::new(match self.http_client {
            Some(client) => RelayDispatcher::with_client(client),
            None => RelayDispatcher::new()?,
        });

        let sessions = Arc::new(SessionManager::new(
            config.clone(),
            registry.clone(),
            dispatcher.clone(),
            store,
        ));
        if self.restore_sessions {
            sessions.restore()?;
        }

        info!(
            "Pocket client ready with {} dispatchers (client {})",
            registry.len(),
            keybase.client_public_key()
        );

        Ok(Pocket {
            config,
            registry,
            dispatcher,
            sessions,
            keybase,
            rng: Mutex::new(rng),
        })
    }
}

impl Default for PocketBuilder {
    fn default() -> Self {
        Self::new()
    }
}
