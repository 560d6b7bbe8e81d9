//! Request deduplication cache
//!
//! Coalesces identical reads: callers asking for the same key while a fetch
//! is running wait for that fetch instead of issuing their own, and a
//! completed result is reused until it is older than `max_age`. Failed
//! fetches leave nothing behind, so the next caller retries.
//!
//! Time comes from an injected [`Clock`] so staleness is testable.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex as StdMutex},
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, OnceCell};

/// Source of monotonic time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall clock used in production
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<StdMutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(StdMutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

type Slot<V> = Arc<OnceCell<(V, Instant)>>;

/// Keyed cache of in-flight and recent results
pub struct RequestCache<V, C = SystemClock> {
    clock: C,
    max_age: Duration,
    slots: Mutex<HashMap<String, Slot<V>>>,
}

impl<V> RequestCache<V, SystemClock>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_age: Duration) -> Self {
        Self::with_clock(max_age, SystemClock)
    }
}

impl<V, C> RequestCache<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    pub fn with_clock(max_age: Duration, clock: C) -> Self {
        Self {
            clock,
            max_age,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, joining a running fetch or starting
    /// a new one when there is nothing fresh.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            self.sweep(&mut slots);
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = slot
            .get_or_try_init(move || async move {
                let value = fetch().await?;
                Ok::<_, E>((value, self.clock.now()))
            })
            .await;

        match result {
            Ok((value, _)) => Ok(value.clone()),
            Err(e) => {
                // Leave nothing behind unless another caller filled the slot
                let mut slots = self.slots.lock().await;
                let empty = slots
                    .get(key)
                    .map(|current| Arc::ptr_eq(current, &slot) && current.get().is_none())
                    .unwrap_or(false);
                if empty {
                    slots.remove(key);
                }
                Err(e)
            }
        }
    }

    /// Drop every completed entry that is `max_age` old or older.
    /// In-flight slots are kept.
    fn sweep(&self, slots: &mut HashMap<String, Slot<V>>) {
        let now = self.clock.now();
        let before = slots.len();
        slots.retain(|_, slot| match slot.get() {
            Some((_, fetched_at)) => now.saturating_duration_since(*fetched_at) < self.max_age,
            None => true,
        });
        let evicted = before - slots.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} stale cache entries", evicted);
        }
    }

    /// Drop the entry for `key`
    pub async fn invalidate(&self, key: &str) {
        self.slots.lock().await.remove(key);
    }

    /// Drop every entry whose key starts with `prefix`
    pub async fn invalidate_prefix(&self, prefix: &str) {
        self.slots.lock().await.retain(|key, _| !key.starts_with(prefix));
    }

    pub async fn clear(&self) {
        self.slots.lock().await.clear();
    }

    /// Number of keys currently tracked (in flight or completed)
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(clock: &ManualClock) -> RequestCache<String, ManualClock> {
        RequestCache::with_clock(Duration::from_secs(30), clock.clone())
    }

    async fn counted(calls: &AtomicUsize, value: &str) -> Result<String, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(value.to_string())
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let clock = ManualClock::new();
        let cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        let (a, b) = tokio::join!(
            cache.get_or_fetch("/api/assets", || counted(&calls, "first")),
            cache.get_or_fetch("/api/assets", || counted(&calls, "second")),
        );

        assert_eq!(a.unwrap(), "first");
        assert_eq!(b.unwrap(), "first");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let clock = ManualClock::new();
        let cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        let a = cache.get_or_fetch("/api/assets", || counted(&calls, "assets")).await;
        let b = cache.get_or_fetch("/api/tickets", || counted(&calls, "tickets")).await;

        assert_eq!(a.unwrap(), "assets");
        assert_eq!(b.unwrap(), "tickets");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_fresh_entry_reused_stale_entry_refetched() {
        let clock = ManualClock::new();
        let cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("k", || counted(&calls, "v1")).await.unwrap();
        clock.advance(Duration::from_secs(29));
        let again = cache.get_or_fetch("k", || counted(&calls, "v2")).await.unwrap();
        assert_eq!(again, "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(1));
        let refreshed = cache.get_or_fetch("k", || counted(&calls, "v2")).await.unwrap();
        assert_eq!(refreshed, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let clock = ManualClock::new();
        let cache = cache(&clock);

        let failed: Result<String, String> = cache
            .get_or_fetch("k", || async { Err("boom".to_string()) })
            .await;
        assert_eq!(failed.unwrap_err(), "boom");

        let ok: Result<String, String> = cache
            .get_or_fetch("k", || async { Ok("recovered".to_string()) })
            .await;
        assert_eq!(ok.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_stale_and_failed_entries_are_evicted() {
        let clock = ManualClock::new();
        let cache = cache(&clock);

        for i in 0..200 {
            let key = format!("/assets?search=q{}", i);
            cache
                .get_or_fetch(&key, || async { Ok::<_, String>("v".to_string()) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len().await, 200);

        clock.advance(Duration::from_secs(3600));
        for i in 0..20 {
            let key = format!("/tickets?page={}", i);
            let failed = cache
                .get_or_fetch(&key, || async { Err::<String, _>("down".to_string()) })
                .await;
            assert!(failed.is_err());
        }
        // Expired entries went with the first sweep, failures left no slot
        assert!(cache.is_empty().await);

        cache
            .get_or_fetch("/tickets/priorities", || async { Ok::<_, String>("p".to_string()) })
            .await
            .unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidation() {
        let clock = ManualClock::new();
        let cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("/assets?page=1", || counted(&calls, "a")).await.unwrap();
        cache.get_or_fetch("/assets?page=2", || counted(&calls, "b")).await.unwrap();
        cache.get_or_fetch("/tickets", || counted(&calls, "c")).await.unwrap();

        cache.invalidate_prefix("/assets").await;
        assert_eq!(cache.len().await, 1);

        cache.invalidate("/tickets").await;
        assert!(cache.is_empty().await);

        cache.get_or_fetch("/tickets", || counted(&calls, "c2")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
