//! Unlocked key cache with one shared sliding deadline.
//!
//! Two mappings share a single deadline: unlocked keys by longid, and parsed
//! keys by their exact armored text. Any get or set on either mapping moves
//! the deadline to `now + ttl`. When it passes without access, both mappings
//! are cleared in full.
//!
//! A background reaper performs the wipe on time. The same check also runs
//! under the lock on every access, so an access racing a due wipe always
//! sees an empty cache.

use crate::domain::config::MAX_KEY_CACHE_TTL;
use cl_crypto::{Key, UnlockedKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How the cache forgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryMode {
    /// Wipe everything after `ttl` without access
    Sliding(Duration),
    /// No time-based eviction; only [`KeyCache::flush`] clears
    FlushOnly,
}

/// Counters and sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyCacheStats {
    /// Unlocked keys held
    pub unlocked_entries: usize,
    /// Parsed keys held
    pub parsed_entries: usize,
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Time-based wipes
    pub wipes: u64,
    /// Explicit flushes
    pub flushes: u64,
}

#[derive(Default)]
struct CacheState {
    unlocked: HashMap<String, Arc<UnlockedKey>>,
    parsed: HashMap<String, Arc<Key>>,
    deadline: Option<Instant>,
}

impl CacheState {
    fn clear(&mut self) {
        self.unlocked.clear();
        self.parsed.clear();
        self.deadline = None;
    }
}

/// Process-wide key cache, shared through `Arc`
pub struct KeyCache {
    mode: ExpiryMode,
    state: Mutex<CacheState>,
    reaper: Arc<Notify>,
    hits: AtomicU64,
    misses: AtomicU64,
    wipes: AtomicU64,
    flushes: AtomicU64,
}

impl KeyCache {
    /// Create a cache. In sliding mode the reaper is spawned on the current
    /// Tokio runtime; without one, expiry is only applied on access.
    ///
    /// A sliding TTL above [`MAX_KEY_CACHE_TTL`] is clamped to it.
    pub fn new(mode: ExpiryMode) -> Arc<Self> {
        let mode = match mode {
            ExpiryMode::Sliding(ttl) if ttl > MAX_KEY_CACHE_TTL => {
                warn!(
                    ttl_ms = ttl.as_millis() as u64,
                    "Key cache ttl too long; clamping to 24h"
                );
                ExpiryMode::Sliding(MAX_KEY_CACHE_TTL)
            }
            mode => mode,
        };
        let cache = Arc::new(Self {
            mode,
            state: Mutex::new(CacheState::default()),
            reaper: Arc::new(Notify::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            wipes: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        });

        match mode {
            ExpiryMode::Sliding(ttl) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(reap(Arc::downgrade(&cache), Arc::clone(&cache.reaper)));
                    info!(ttl_ms = ttl.as_millis() as u64, "Key cache using sliding expiry");
                }
                Err(_) => {
                    warn!(
                        ttl_ms = ttl.as_millis() as u64,
                        "No runtime for key cache reaper; expiry applies on access only"
                    );
                }
            },
            ExpiryMode::FlushOnly => {
                info!("Key cache in flush-only mode; entries never expire by time");
            }
        }

        cache
    }

    /// Expiry mode
    pub fn mode(&self) -> ExpiryMode {
        self.mode
    }

    /// Look up an unlocked key by longid.
    pub fn get_unlocked(&self, longid: &str) -> Option<Arc<UnlockedKey>> {
        let mut state = self.state.lock();
        self.touch(&mut state);
        let found = state.unlocked.get(longid).cloned();
        self.count(found.is_some());
        found
    }

    /// Store an unlocked key under its longid.
    pub fn put_unlocked(&self, longid: impl Into<String>, key: Arc<UnlockedKey>) {
        let mut state = self.state.lock();
        self.touch(&mut state);
        state.unlocked.insert(longid.into(), key);
    }

    /// Look up a parsed key by its exact armored text.
    pub fn get_parsed(&self, armored: &str) -> Option<Arc<Key>> {
        let mut state = self.state.lock();
        self.touch(&mut state);
        let found = state.parsed.get(armored).cloned();
        self.count(found.is_some());
        found
    }

    /// Store a parsed key under its exact armored text.
    pub fn put_parsed(&self, armored: impl Into<String>, key: Arc<Key>) {
        let mut state = self.state.lock();
        self.touch(&mut state);
        state.parsed.insert(armored.into(), key);
    }

    /// Clear both mappings now and cancel the pending deadline.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        let dropped = state.unlocked.len() + state.parsed.len();
        state.clear();
        drop(state);
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.reaper.notify_one();
        info!(entries = dropped, "Key cache flushed");
    }

    /// Snapshot of sizes and counters. Does not renew the deadline.
    pub fn stats(&self) -> KeyCacheStats {
        let state = self.state.lock();
        KeyCacheStats {
            unlocked_entries: state.unlocked.len(),
            parsed_entries: state.parsed.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            wipes: self.wipes.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    /// Apply a due wipe, then renew the shared deadline.
    fn touch(&self, state: &mut CacheState) {
        let ExpiryMode::Sliding(ttl) = self.mode else {
            return;
        };
        let now = Instant::now();
        self.expire_locked(state, now);
        let was_idle = state.deadline.is_none();
        let Some(deadline) = now.checked_add(ttl) else {
            return;
        };
        state.deadline = Some(deadline);
        if was_idle {
            self.reaper.notify_one();
        }
    }

    fn expire_locked(&self, state: &mut CacheState, now: Instant) -> bool {
        match state.deadline {
            Some(deadline) if deadline <= now => {
                let dropped = state.unlocked.len() + state.parsed.len();
                state.clear();
                self.wipes.fetch_add(1, Ordering::Relaxed);
                debug!(entries = dropped, "Key cache expired");
                true
            }
            _ => false,
        }
    }

    fn count(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for KeyCache {
    fn drop(&mut self) {
        self.reaper.notify_one();
    }
}

/// Sleeps until the shared deadline and wipes if it has not moved.
async fn reap(cache: Weak<KeyCache>, wake: Arc<Notify>) {
    loop {
        let deadline = match cache.upgrade() {
            Some(cache) => cache.state.lock().deadline,
            None => return,
        };

        match deadline {
            None => wake.notified().await,
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        let Some(cache) = cache.upgrade() else { return };
                        let mut state = cache.state.lock();
                        cache.expire_locked(&mut state, Instant::now());
                    }
                    _ = wake.notified() => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(120);

    fn unlocked() -> (String, Arc<UnlockedKey>) {
        let key = Key::generate(vec!["cache <c@c>".into()]);
        let longid = key.key_id().to_hex();
        (longid, Arc::new(key.unlock(None).unwrap()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_renews_shared_deadline() {
        let cache = KeyCache::new(ExpiryMode::Sliding(TTL));
        let (longid, key) = unlocked();
        cache.put_unlocked(longid.clone(), key);

        tokio::time::sleep(Duration::from_secs(100)).await;
        // access to the other mapping also renews
        assert!(cache.get_parsed("not cached").is_none());
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(cache.get_unlocked(&longid).is_some());

        let stats = cache.stats();
        assert_eq!(stats.wipes, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_wipes_both_maps_after_idle_ttl() {
        let cache = KeyCache::new(ExpiryMode::Sliding(TTL));
        let (longid, key) = unlocked();
        cache.put_unlocked(longid.clone(), key);
        cache.put_parsed("armored", Arc::new(Key::generate(vec![])));

        tokio::time::sleep(TTL + Duration::from_secs(1)).await;

        let stats = cache.stats();
        assert_eq!(stats.wipes, 1);
        assert_eq!(stats.unlocked_entries, 0);
        assert_eq!(stats.parsed_entries, 0);
        assert!(cache.get_unlocked(&longid).is_none());
    }

    #[test]
    fn test_lazy_wipe_without_runtime() {
        let cache = KeyCache::new(ExpiryMode::Sliding(Duration::from_millis(20)));
        let (longid, key) = unlocked();
        cache.put_unlocked(longid.clone(), key);
        assert!(cache.get_unlocked(&longid).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get_unlocked(&longid).is_none());
        assert_eq!(cache.stats().wipes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_clears_and_cancels_deadline() {
        let cache = KeyCache::new(ExpiryMode::Sliding(TTL));
        let (longid, key) = unlocked();
        cache.put_unlocked(longid.clone(), key);

        cache.flush();
        assert_eq!(cache.stats().unlocked_entries, 0);

        tokio::time::sleep(TTL * 2).await;
        let stats = cache.stats();
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.wipes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_only_never_expires_by_time() {
        let cache = KeyCache::new(ExpiryMode::FlushOnly);
        let (longid, key) = unlocked();
        cache.put_unlocked(longid.clone(), key);

        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        assert!(cache.get_unlocked(&longid).is_some());
        assert_eq!(cache.stats().wipes, 0);

        cache.flush();
        assert!(cache.get_unlocked(&longid).is_none());
    }

    #[test]
    fn test_oversized_ttl_is_clamped() {
        let cache = KeyCache::new(ExpiryMode::Sliding(Duration::from_secs(u64::MAX)));
        assert_eq!(cache.mode(), ExpiryMode::Sliding(MAX_KEY_CACHE_TTL));

        let (longid, key) = unlocked();
        assert!(cache.get_parsed("x").is_none());
        cache.put_unlocked(longid.clone(), key);
        assert!(cache.get_unlocked(&longid).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_usable_after_wipe() {
        let cache = KeyCache::new(ExpiryMode::Sliding(TTL));
        let (longid, key) = unlocked();
        cache.put_unlocked(longid.clone(), Arc::clone(&key));
        tokio::time::sleep(TTL * 2).await;

        cache.put_unlocked(longid.clone(), key);
        tokio::time::sleep(TTL / 2).await;
        assert!(cache.get_unlocked(&longid).is_some());
        assert_eq!(cache.stats().wipes, 1);
    }
}
