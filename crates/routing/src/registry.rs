//! Dispatcher registry
//!
//! Bounded, ordered set of dispatcher URLs. The list lives in the shared
//! key-value store under [`DISPATCHERS_KEY`]; the registry only holds the lock
//! that serializes read-modify-write cycles on it and the random source used
//! for selection.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use reqwest::Url;
use tracing::{debug, info, warn};

use pocket_core::{BoxedRng, KeyValueStore, KeyValueStoreExt, PocketError, Result};

/// Store key holding the dispatcher list
pub const DISPATCHERS_KEY: &str = "DISPATCHERS";

pub struct NodeRegistry {
    store: Arc<dyn KeyValueStore>,
    max_dispatchers: usize,
    /// Guards the stored list and the random source
    rng: Mutex<BoxedRng>,
}

impl NodeRegistry {
    /// Initialize the registry with its starting dispatchers.
    ///
    /// Fails when the list is empty or exceeds `max_dispatchers` (0 = unbounded).
    /// Duplicate URLs collapse to one entry.
    pub fn new(
        dispatchers: Vec<Url>,
        max_dispatchers: usize,
        store: Arc<dyn KeyValueStore>,
        rng: BoxedRng,
    ) -> Result<Self> {
        if dispatchers.is_empty() {
            return Err(PocketError::Configuration(
                "Routing table must be initialized with at least one Dispatch node.".to_string(),
            ));
        }

        let mut list: Vec<String> = Vec::with_capacity(dispatchers.len());
        for url in &dispatchers {
            let normalized = normalize(url);
            if !list.contains(&normalized) {
                list.push(normalized);
            }
        }

        if max_dispatchers > 0 && list.len() > max_dispatchers {
            return Err(PocketError::Configuration(format!(
                "Routing table cannot hold {} dispatchers, the maximum is {}",
                list.len(),
                max_dispatchers
            )));
        }

        store.save(DISPATCHERS_KEY, &list)?;
        info!("Routing table initialized with {} dispatchers", list.len());

        Ok(Self {
            store,
            max_dispatchers,
            rng: Mutex::new(rng),
        })
    }

    pub fn max_dispatchers(&self) -> usize {
        self.max_dispatchers
    }

    /// Current dispatchers, oldest first
    pub fn dispatchers(&self) -> Result<Vec<Url>> {
        let _guard = self.rng.lock();
        self.read()
    }

    pub fn len(&self) -> usize {
        let _guard = self.rng.lock();
        self.read_raw().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Uniformly random dispatcher
    pub fn random_dispatcher(&self) -> Result<Url> {
        let mut rng = self.rng.lock();
        let list = self.read()?;
        list.choose(&mut **rng)
            .cloned()
            .ok_or(PocketError::NoDispatcherAvailable)
    }

    /// Up to `count` distinct dispatchers in random order
    pub fn random_dispatchers(&self, count: usize) -> Result<Vec<Url>> {
        let mut rng = self.rng.lock();
        let mut list = self.read()?;
        if list.is_empty() {
            return Err(PocketError::NoDispatcherAvailable);
        }
        list.shuffle(&mut **rng);
        list.truncate(count.min(list.len()));
        Ok(list)
    }

    /// Add a dispatcher, evicting the oldest when over capacity.
    ///
    /// Returns false if the URL was already known.
    pub fn add_dispatcher(&self, url: &Url) -> Result<bool> {
        let _guard = self.rng.lock();
        let mut list = self.read_raw()?;
        let normalized = normalize(url);
        if list.contains(&normalized) {
            return Ok(false);
        }

        list.push(normalized);
        if self.max_dispatchers > 0 && list.len() > self.max_dispatchers {
            let evicted = list.remove(0);
            debug!("Evicted dispatcher {} to admit {}", evicted, url);
        }
        self.store.save(DISPATCHERS_KEY, &list)?;
        Ok(true)
    }

    /// Remove a dispatcher; returns whether it was present
    pub fn remove_dispatcher(&self, url: &Url) -> Result<bool> {
        let _guard = self.rng.lock();
        let mut list = self.read_raw()?;
        let normalized = normalize(url);
        let before = list.len();
        list.retain(|u| *u != normalized);
        if list.len() == before {
            return Ok(false);
        }
        self.store.save(DISPATCHERS_KEY, &list)?;
        Ok(true)
    }

    /// Exact lookup by normalized URL
    pub fn lookup_dispatcher(&self, url: &Url) -> Result<Url> {
        let _guard = self.rng.lock();
        let normalized = normalize(url);
        self.read()?
            .into_iter()
            .find(|u| normalize(u) == normalized)
            .ok_or_else(|| PocketError::NotFound(format!("dispatcher {}", url)))
    }

    fn read_raw(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .load::<Vec<String>>(DISPATCHERS_KEY)?
            .unwrap_or_default())
    }

    fn read(&self) -> Result<Vec<Url>> {
        Ok(self
            .read_raw()?
            .into_iter()
            .filter_map(|raw| match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Ignoring malformed dispatcher '{}': {}", raw, e);
                    None
                }
            })
            .collect())
    }
}

/// Canonical string form used for duplicate detection
pub fn normalize(url: &Url) -> String {
    url.as_str().to_string()
}
