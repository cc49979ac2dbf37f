//! Time-boxed cache of fully rendered pages.
//!
//! Entries expire `ttl` after they are stored. Writes elsewhere never evict
//! them, so a write is only visible once the cached page has expired or the
//! cache is cleared. Every insert sweeps expired entries, and a full cache
//! drops its oldest third, so the map stays bounded whatever keys it is fed.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::debug;

/// Entries kept before the oldest are culled.
pub const DEFAULT_MAX_ENTRIES: usize = 300;
/// A full cache keeps `1 - 1/CULL_FREQUENCY` of its entries.
const CULL_FREQUENCY: usize = 3;

/// Source of the current time for cache expiry.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    stored_at: Instant,
}

#[derive(Clone)]
pub struct PageCache {
    prefix: String,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("len", &self.len())
            .finish()
    }
}

impl PageCache {
    pub fn new(prefix: impl Into<String>, ttl: Duration) -> Self {
        Self::with_clock(prefix, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(prefix: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            prefix: prefix.into(),
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            clock,
            entries: Arc::default(),
        }
    }

    /// Keep at most `max_entries` pages (at least one).
    pub fn with_max_entries(self, max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            ..self
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache key for `path` as seen by `viewer` (`None` for anonymous).
    pub fn key(&self, path: &str, viewer: Option<i32>) -> String {
        match viewer {
            Some(id) => format!("{}:{path}:user-{id}", self.prefix),
            None => format!("{}:{path}:anonymous", self.prefix),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if now < entry.stored_at + self.ttl => {
                debug!("page cache hit: {key}");
                Some(entry.body.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, body: String) {
        let now = self.clock.now();
        let ttl = self.ttl;
        let mut entries = self.lock();
        entries.retain(|_, entry| now < entry.stored_at + ttl);

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let mut by_age: Vec<(Instant, String)> = entries
                .iter()
                .map(|(key, entry)| (entry.stored_at, key.clone()))
                .collect();
            by_age.sort_unstable();
            let culled = (entries.len() / CULL_FREQUENCY).max(1);
            for (_, key) in by_age.into_iter().take(culled) {
                entries.remove(&key);
            }
            debug!("page cache full, culled {culled} entries");
        }

        entries.insert(key, CacheEntry { body, stored_at: now });
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cache(ttl: u64) -> (PageCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = PageCache::with_clock("index_page", Duration::from_secs(ttl), clock.clone());
        (cache, clock)
    }

    #[test]
    fn serves_until_expiry() {
        let (cache, clock) = cache(20);
        let key = cache.key("/", None);
        cache.insert(key.clone(), "first".to_owned());

        clock.advance(Duration::from_secs(19));
        assert_eq!(cache.get(&key).as_deref(), Some("first"));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_prefixed_and_per_viewer() {
        let (cache, _) = cache(20);
        assert_eq!(cache.key("/?page=2", None), "index_page:/?page=2:anonymous");
        assert_eq!(cache.key("/", Some(7)), "index_page:/:user-7");

        cache.insert(cache.key("/", None), "anon".to_owned());
        assert_eq!(cache.get(&cache.key("/", Some(7))), None);
    }

    #[test]
    fn insert_sweeps_expired_entries() {
        let (cache, clock) = cache(20);
        for i in 0..50 {
            cache.insert(cache.key(&format!("/?page={i}"), None), "old".to_owned());
        }
        assert_eq!(cache.len(), 50);

        clock.advance(Duration::from_secs(3600));
        cache.insert(cache.key("/", None), "new".to_owned());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&cache.key("/", None)).as_deref(), Some("new"));
    }

    #[test]
    fn full_cache_culls_oldest() {
        let (cache, clock) = cache(20);
        let cache = cache.with_max_entries(6);
        for i in 0..6 {
            cache.insert(format!("k{i}"), i.to_string());
            clock.advance(Duration::from_millis(10));
        }
        assert_eq!(cache.len(), 6);

        cache.insert("k6".to_owned(), "6".to_owned());
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.get("k0"), None);
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k2").as_deref(), Some("2"));
        assert_eq!(cache.get("k6").as_deref(), Some("6"));

        // overwriting a present key never culls
        cache.insert("k6".to_owned(), "six".to_owned());
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn clear_drops_everything() {
        let (cache, _) = cache(20);
        cache.insert("a".to_owned(), "1".to_owned());
        cache.insert("b".to_owned(), "2".to_owned());
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }
}
