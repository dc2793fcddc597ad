use parking_lot::Mutex;
use std::collections::HashMap;

use crate::{CounterStore, StoreError, SystemClock, TimeSource};

#[derive(Clone, Copy, Debug)]
struct Entry {
    value: u64,
    expires_at: Option<u64>,
}

/// An in-process [`CounterStore`] backed by a mutex-guarded map.
///
/// Entries expire lazily: a key whose TTL has elapsed reads as absent on its
/// next access. Expiry is measured with the same kind of [`TimeSource`] the
/// allocator uses, so tests can drive both from one fixed clock.
///
/// Uniqueness only holds among allocators sharing this instance, which makes
/// it suitable for tests and single-process deployments.
///
/// ```
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// use scdid::{CounterStore, MemoryCounterStore};
///
/// let store = MemoryCounterStore::new();
/// assert_eq!(store.increment_by("k", 5).await.unwrap(), 5);
/// assert_eq!(store.increment_by("k", 2).await.unwrap(), 7);
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryCounterStore<T = SystemClock>
where
    T: TimeSource,
{
    entries: Mutex<HashMap<String, Entry>>,
    time: T,
}

impl MemoryCounterStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_time(SystemClock)
    }
}

impl Default for MemoryCounterStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryCounterStore<T>
where
    T: TimeSource,
{
    pub fn with_time(time: T) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            time,
        }
    }

    /// Overwrites `key` with `value` and clears its TTL.
    pub fn set(&self, key: &str, value: u64) {
        self.entries.lock().insert(
            key.to_owned(),
            Entry {
                value,
                expires_at: None,
            },
        );
    }

    /// Current value of `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<u64> {
        let now = self.time.current_secs();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| !Self::is_expired(e, now))
            .map(|e| e.value)
    }

    /// Seconds until `key` expires. `None` if the key is absent, expired, or
    /// has no TTL.
    pub fn ttl(&self, key: &str) -> Option<u64> {
        let now = self.time.current_secs();
        let entries = self.entries.lock();
        let entry = entries.get(key).filter(|e| !Self::is_expired(e, now))?;
        entry.expires_at.map(|at| at - now)
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.time.current_secs();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !Self::is_expired(e, now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(entry: &Entry, now: u64) -> bool {
        entry.expires_at.is_some_and(|at| at <= now)
    }

    fn increment_sync(&self, key: &str, delta: u64) -> u64 {
        let now = self.time.current_secs();
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_owned()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        if Self::is_expired(entry, now) {
            *entry = Entry {
                value: 0,
                expires_at: None,
            };
        }
        entry.value = entry.value.saturating_add(delta);
        entry.value
    }

    fn set_ttl_sync(&self, key: &str, seconds: u64) {
        let now = self.time.current_secs();
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key).filter(|e| !Self::is_expired(e, now)) {
            entry.expires_at = Some(now.saturating_add(seconds));
        }
    }
}

impl<T> CounterStore for MemoryCounterStore<T>
where
    T: TimeSource + Send + Sync,
{
    async fn increment_by(&self, key: &str, delta: u64) -> Result<u64, StoreError> {
        Ok(self.increment_sync(key, delta))
    }

    async fn set_ttl(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        self.set_ttl_sync(key, seconds);
        Ok(())
    }
}
