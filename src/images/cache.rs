//! Bounded LRU store of decoded images keyed by URL.
//!
//! Each miss starts one load task per URL; every concurrent `get` for that
//! URL waits on the same task. A caller may pass a [`CancellationToken`]: a
//! cancelled caller only stops waiting. The load keeps going (and is stored)
//! while anyone else still waits for it, and is aborted once nobody does.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use lru::LruCache;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::hints::PreloadHints;
use super::loader::{DecodedImage, ImageLoader};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const DEFAULT_CAPACITY: usize = 100;

type LoadOutcome = std::result::Result<Arc<DecodedImage>, String>;

struct CacheEntry {
    image: Arc<DecodedImage>,
}

struct InFlight {
    id: u64,
    /// Callers still waiting for this load.
    waiters: usize,
    outcome: watch::Receiver<Option<LoadOutcome>>,
    task: JoinHandle<()>,
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    next_load_id: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    /// Percentage of capacity in use.
    pub utilization: f64,
}

pub struct ImageCache<L: ImageLoader> {
    loader: Arc<L>,
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
}

impl<L: ImageLoader> Clone for ImageCache<L> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
        }
    }
}

impl<L: ImageLoader> ImageCache<L> {
    pub fn new(loader: L, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            loader: Arc::new(loader),
            inner: Arc::new(Mutex::new(CacheInner {
                entries: LruCache::new(cap),
                in_flight: HashMap::new(),
                next_load_id: 0,
            })),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached image on a hit (promoted to most recently used); otherwise load,
    /// insert and return it.
    pub async fn get(&self, url: &str) -> Result<Arc<DecodedImage>> {
        self.fetch(url, None)
            .await?
            .ok_or_else(|| anyhow!("load of {url} was cancelled"))
    }

    /// Like [`get`](Self::get) but gives up when `token` is cancelled.
    /// `Ok(None)` means cancelled; nothing was inserted on behalf of this call.
    pub async fn get_cancellable(
        &self,
        url: &str,
        token: &CancellationToken,
    ) -> Result<Option<Arc<DecodedImage>>> {
        self.fetch(url, Some(token)).await
    }

    /// Membership check that leaves recency untouched.
    pub fn has(&self, url: &str) -> bool {
        self.lock().entries.contains(url)
    }

    pub fn is_loading(&self, url: &str) -> bool {
        self.lock().in_flight.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.lock();
        let mut keys: Vec<String> = inner.entries.iter().map(|(k, _)| k.clone()).collect();
        keys.reverse();
        keys
    }

    /// Load every URL concurrently. Failures are logged, never returned;
    /// the result is how many images ended up available.
    pub async fn preload_many<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = JoinSet::new();
        for url in urls {
            let url: String = url.into();
            let cache = self.clone();
            set.spawn(async move {
                let outcome = cache.get(&url).await;
                (url, outcome)
            });
        }

        let mut loaded = 0;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(_))) => loaded += 1,
                Ok((url, Err(err))) => log_warn!("Failed to preload {}: {:#}", url, err),
                Err(err) => log_error!("Preload worker failed: {}", err),
            }
        }
        loaded
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.in_flight.clear();
        log_info!("Image cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.len();
        CacheStats {
            size,
            capacity: self.capacity,
            utilization: size as f64 / self.capacity as f64 * 100.0,
        }
    }

    /// Persist the cached keys as a hint for the next start.
    pub fn save_hints(&self, hints: &PreloadHints) -> Result<()> {
        hints.save(&self.keys())
    }

    /// Best-effort warm-up from a previous session's hints.
    pub async fn restore_hints(&self, hints: &PreloadHints) -> usize {
        let urls = hints.load();
        if urls.is_empty() {
            return 0;
        }
        log_info!("Restoring {} images from preload hints", urls.len());
        self.preload_many(urls).await
    }

    async fn fetch(
        &self,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<Arc<DecodedImage>>> {
        let (id, mut outcome_rx) = {
            let mut inner = self.lock();
            if let Some(entry) = inner.entries.get(url) {
                log_debug!("Cache hit: {}", url);
                return Ok(Some(Arc::clone(&entry.image)));
            }

            match inner.in_flight.get_mut(url) {
                Some(load) => {
                    load.waiters += 1;
                    (load.id, load.outcome.clone())
                }
                None => {
                    log_debug!("Cache miss, loading: {}", url);
                    let id = inner.next_load_id;
                    inner.next_load_id += 1;
                    let (task, outcome) = self.spawn_load(url, id);
                    inner.in_flight.insert(
                        url.to_string(),
                        InFlight {
                            id,
                            waiters: 1,
                            outcome: outcome.clone(),
                            task,
                        },
                    );
                    (id, outcome)
                }
            }
        };
        let _waiter = Waiter {
            cache: self,
            url,
            id,
        };

        let wait = async {
            match outcome_rx.wait_for(Option::is_some).await {
                Ok(outcome) => outcome
                    .clone()
                    .unwrap_or_else(|| Err(format!("load of {url} produced no result"))),
                Err(_) => Err(format!("load of {url} was abandoned")),
            }
        };

        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log_debug!("Stopped waiting for {}", url);
                    return Ok(None);
                }
                outcome = wait => outcome,
            },
            None => wait.await,
        };

        outcome.map(Some).map_err(|message| anyhow!(message))
    }

    /// The load runs detached from its callers and stores its own result.
    fn spawn_load(
        &self,
        url: &str,
        id: u64,
    ) -> (JoinHandle<()>, watch::Receiver<Option<LoadOutcome>>) {
        let (tx, rx) = watch::channel(None);
        let cache = self.clone();
        let url = url.to_string();
        let task = tokio::spawn(async move {
            let outcome = cache
                .loader
                .load(&url)
                .await
                .map(Arc::new)
                .map_err(|err| format!("{err:#}"));
            cache.complete(&url, id, &outcome);
            tx.send_replace(Some(outcome));
        });
        (task, rx)
    }

    fn complete(&self, url: &str, id: u64, outcome: &LoadOutcome) {
        let mut inner = self.lock();
        // cleared or abandoned while loading: hand the result out, keep nothing
        if !inner.in_flight.get(url).is_some_and(|load| load.id == id) {
            return;
        }
        inner.in_flight.remove(url);
        if let Ok(image) = outcome {
            Self::insert(&mut inner, url, Arc::clone(image));
        }
    }

    fn leave(&self, url: &str, id: u64) {
        let mut inner = self.lock();
        let Some(load) = inner.in_flight.get_mut(url) else {
            return;
        };
        if load.id != id {
            return;
        }
        load.waiters = load.waiters.saturating_sub(1);
        if load.waiters == 0 {
            if let Some(load) = inner.in_flight.remove(url) {
                load.task.abort();
            }
            log_debug!("Load abandoned: {}", url);
        }
    }

    fn insert(inner: &mut CacheInner, url: &str, image: Arc<DecodedImage>) {
        if inner.entries.contains(url) {
            inner.entries.promote(url);
            return;
        }

        // LruCache keeps access order; simultaneous inserts fall back to
        // insertion order.
        if let Some((evicted, _)) = inner.entries.push(url.to_string(), CacheEntry { image }) {
            log_debug!("Evicted from cache (LRU): {}", evicted);
        }
        log_debug!(
            "Added to cache: {} ({}/{})",
            url,
            inner.entries.len(),
            inner.entries.cap()
        );
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One caller's interest in an in-flight load. Dropping it (finished,
/// cancelled or abandoned) releases that interest.
struct Waiter<'a, L: ImageLoader> {
    cache: &'a ImageCache<L>,
    url: &'a str,
    id: u64,
}

impl<L: ImageLoader> Drop for Waiter<'_, L> {
    fn drop(&mut self) {
        self.cache.leave(self.url, self.id);
    }
}
