//! Bounded token counter store with LRU eviction and a fixed time-to-live.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use tracing::debug;

/// Request count for a single token within its current window.
#[derive(Debug, Clone)]
pub struct TokenCounter {
    /// Requests observed since the counter was created
    count: u64,
    /// When the counter was created; expiry is measured from here
    created_at: Instant,
    /// Position in the recency index
    recency: u64,
    /// Position in the creation index
    generation: u64,
}

impl TokenCounter {
    fn new(created_at: Instant, seq: u64) -> Self {
        Self {
            count: 0,
            created_at,
            recency: seq,
            generation: seq,
        }
    }

    /// Increment the counter by one and return the new value.
    pub fn increment(&mut self) -> u64 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Time elapsed since the counter was created.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        self.age(now) >= window
    }
}

/// Initial slots reserved for counters; the map grows on demand up to capacity.
const INITIAL_SLOTS: usize = 1024;

/// Token counters bounded by count and by age.
///
/// Two ordered indexes sit beside the counter map: one by last access, used
/// to pick the least-recently-used token when the store is full, and one by
/// creation, used to purge expired counters from the front. Expired counters
/// are always purged before capacity eviction runs, so lazily checked expiry
/// is indistinguishable from an eager sweep.
#[derive(Debug)]
pub struct TokenStore {
    capacity: NonZeroUsize,
    window: Duration,
    counters: HashMap<String, TokenCounter>,
    by_recency: BTreeMap<u64, String>,
    by_creation: BTreeMap<u64, String>,
    next_seq: u64,
}

impl TokenStore {
    /// Create an empty store.
    pub fn new(capacity: NonZeroUsize, window: Duration) -> Self {
        Self {
            capacity,
            window,
            counters: HashMap::with_capacity(capacity.get().min(INITIAL_SLOTS)),
            by_recency: BTreeMap::new(),
            by_creation: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Look up the counter for `token`, creating it at zero when absent.
    ///
    /// The token becomes the most recently used. When a new counter would
    /// exceed capacity, the least recently used token is evicted first.
    pub fn touch(&mut self, token: &str, now: Instant) -> &mut TokenCounter {
        self.purge_expired(now);

        // Instants passed out of order can leave an expired counter behind a
        // live one in the creation index.
        let stale = self
            .counters
            .get(token)
            .is_some_and(|c| c.is_expired(now, self.window));
        if stale {
            self.remove(token);
        }

        let present = self.counters.contains_key(token);
        if !present && self.counters.len() >= self.capacity.get() {
            self.evict_lru();
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let counter = self
            .counters
            .entry(token.to_owned())
            .or_insert_with(|| TokenCounter::new(now, seq));

        if present {
            self.by_recency.remove(&counter.recency);
            counter.recency = seq;
        } else {
            debug!(token = %token, "Creating new token counter");
            self.by_creation.insert(seq, token.to_owned());
        }
        self.by_recency.insert(seq, token.to_owned());

        counter
    }

    /// Current count for `token` without changing its recency.
    ///
    /// Returns `None` when the token is unknown or its counter has expired.
    pub fn peek(&self, token: &str, now: Instant) -> Option<u64> {
        self.counters
            .get(token)
            .filter(|c| !c.is_expired(now, self.window))
            .map(TokenCounter::count)
    }

    /// Number of counters held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the store holds no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop every counter.
    pub fn clear(&mut self) {
        self.counters.clear();
        self.by_recency.clear();
        self.by_creation.clear();
    }

    /// Maximum number of counters held at once.
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Time-to-live of a counter.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Remove every counter whose age has reached the window.
    ///
    /// Creation order is also expiry order, so this stops at the first
    /// counter that is still live.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let mut purged = 0;

        while let Some((&generation, token)) = self.by_creation.first_key_value() {
            let expired = self
                .counters
                .get(token)
                .map_or(true, |c| c.is_expired(now, self.window));
            if !expired {
                break;
            }

            let token = token.clone();
            self.by_creation.remove(&generation);
            if let Some(counter) = self.counters.remove(&token) {
                self.by_recency.remove(&counter.recency);
            }
            purged += 1;
        }

        if purged > 0 {
            debug!(purged = purged, "Purged expired token counters");
        }
        purged
    }

    fn remove(&mut self, token: &str) -> Option<TokenCounter> {
        let counter = self.counters.remove(token)?;
        self.by_recency.remove(&counter.recency);
        self.by_creation.remove(&counter.generation);
        Some(counter)
    }

    fn evict_lru(&mut self) {
        let Some((_, token)) = self.by_recency.pop_first() else {
            return;
        };

        if let Some(counter) = self.counters.remove(&token) {
            self.by_creation.remove(&counter.generation);
            debug!(
                token = %token,
                count = counter.count,
                capacity = self.capacity.get(),
                "Evicted least recently used token counter"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn store(capacity: usize) -> TokenStore {
        TokenStore::new(NonZeroUsize::new(capacity).unwrap(), WINDOW)
    }

    #[test]
    fn test_touch_creates_counter_at_zero() {
        let mut store = store(4);
        let now = Instant::now();

        let counter = store.touch("a", now);

        assert_eq!(counter.count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_touch_returns_existing_counter() {
        let mut store = store(4);
        let now = Instant::now();

        store.touch("a", now).increment();
        store.touch("a", now).increment();

        assert_eq!(store.peek("a", now), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut store = store(2);
        let now = Instant::now();

        store.touch("a", now).increment();
        store.touch("b", now).increment();
        store.touch("c", now).increment();

        assert_eq!(store.len(), 2);
        assert_eq!(store.peek("a", now), None);
        assert_eq!(store.peek("b", now), Some(1));
        assert_eq!(store.peek("c", now), Some(1));
    }

    #[test]
    fn test_touch_refreshes_recency() {
        let mut store = store(2);
        let now = Instant::now();

        store.touch("a", now);
        store.touch("b", now);
        store.touch("a", now);
        store.touch("c", now);

        assert!(store.peek("a", now).is_some());
        assert_eq!(store.peek("b", now), None);
    }

    #[test]
    fn test_peek_does_not_refresh_recency() {
        let mut store = store(2);
        let now = Instant::now();

        store.touch("a", now);
        store.touch("b", now);
        assert!(store.peek("a", now).is_some());
        store.touch("c", now);

        assert_eq!(store.peek("a", now), None);
        assert!(store.peek("b", now).is_some());
    }

    #[test]
    fn test_counter_expires_at_window() {
        let mut store = store(4);
        let start = Instant::now();

        store.touch("a", start).increment();
        assert_eq!(store.peek("a", start + WINDOW - Duration::from_millis(1)), Some(1));
        assert_eq!(store.peek("a", start + WINDOW), None);

        let counter = store.touch("a", start + WINDOW);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_expiry_measured_from_creation_not_access() {
        let mut store = store(4);
        let start = Instant::now();

        store.touch("a", start).increment();
        store.touch("a", start + Duration::from_secs(50)).increment();

        let counter = store.touch("a", start + Duration::from_secs(61));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_expired_counters_purged_before_eviction() {
        let mut store = store(2);
        let start = Instant::now();

        store.touch("old", start);
        let later = start + Duration::from_secs(30);
        store.touch("live", later);
        // Make "old" the most recently used so plain LRU would evict "live".
        store.touch("old", later);

        let now = start + WINDOW;
        store.touch("new", now);

        assert_eq!(store.peek("live", now), Some(0));
        assert_eq!(store.peek("old", now), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut store = store(3);
        let now = Instant::now();

        for i in 0..100 {
            store.touch(&format!("token-{i}"), now).increment();
            assert!(store.len() <= 3);
        }
        assert_eq!(store.by_recency.len(), 3);
        assert_eq!(store.by_creation.len(), 3);
    }

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        let mut store = TokenStore::new(NonZeroUsize::MAX, WINDOW);
        let now = Instant::now();

        store.touch("a", now).increment();

        assert_eq!(store.peek("a", now), Some(1));
        assert_eq!(store.capacity(), NonZeroUsize::MAX);
    }

    #[test]
    fn test_touch_resets_expired_counter_with_out_of_order_instants() {
        let mut store = store(4);
        let start = Instant::now();
        let later = start + Duration::from_secs(30);

        // "live" is created first but at the later instant, so it sits in
        // front of "old" in creation order and stops the purge.
        store.touch("live", later).increment();
        store.touch("old", start).increment();
        store.touch("old", start).increment();

        let now = start + WINDOW;
        let counter = store.touch("old", now);
        assert_eq!(counter.count(), 0);
        assert_eq!(store.peek("live", now), Some(1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.by_recency.len(), 2);
        assert_eq!(store.by_creation.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut store = store(3);
        let now = Instant::now();

        store.touch("a", now);
        store.touch("b", now);
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.peek("a", now), None);
    }
}
