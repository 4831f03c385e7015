use super::store::CounterStore;
use crate::error::{QuotaError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Minimum time between full sweeps of expired entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process counter store.
///
/// Expiry follows `tokio::time`, so tests can drive windows with
/// `tokio::time::pause` and `advance`. Expired entries are dropped when
/// read, and writes sweep the whole map at most once per `SWEEP_INTERVAL`.
#[derive(Debug, Clone)]
pub struct MemoryCounterStore {
    entries: Arc<DashMap<String, Entry>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCounterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Swept {} expired counters", removed);
        }
        removed
    }

    fn maybe_sweep(&self, now: Instant) {
        let due = match self.last_sweep.try_lock() {
            Ok(mut last) if now.saturating_duration_since(*last) >= SWEEP_INTERVAL => {
                *last = now;
                true
            }
            _ => false,
        };
        if due {
            self.sweep_expired();
        }
    }

    /// Force `key` to expire immediately
    pub fn expire(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self, key: &str, now: Instant) -> Option<Entry> {
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            debug!("Dropped expired counter {}", key);
            None
        } else {
            Some(entry)
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live(key, Instant::now()).map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let now = Instant::now();
        self.maybe_sweep(now);

        let deadline = now
            .checked_add(Duration::from_secs(ttl_secs))
            .ok_or_else(|| {
                QuotaError::InvalidConfiguration(format!("ttl of {} seconds is out of range", ttl_secs))
            })?;
        let entry = Entry {
            value: value.to_string(),
            expires_at: Some(deadline),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let now = Instant::now();
        self.maybe_sweep(now);

        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });

        if entry.is_expired(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }

        let current: i64 = entry.value.parse().map_err(|_| QuotaError::CorruptCounter {
            key: key.to_string(),
            value: entry.value.clone(),
        })?;
        let next = current + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let now = Instant::now();
        let remaining = self
            .live(key, now)
            .and_then(|e| e.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now));

        // Round up so a key written this instant reports its full window
        Ok(remaining.map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert_eq!(store.ttl("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get_and_ttl() {
        tokio::time::pause();
        let store = MemoryCounterStore::new();
        store.set("k", "1", 60).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.ttl("k").await.unwrap(), Some(60));

        tokio::time::advance(Duration::from_millis(10_500)).await;
        assert_eq!(store.ttl("k").await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn test_increment_keeps_expiry() {
        tokio::time::pause();
        let store = MemoryCounterStore::new();
        store.set("k", "1", 30).await.unwrap();

        assert_eq!(store.increment("k").await.unwrap(), 2);
        assert_eq!(store.increment("k").await.unwrap(), 3);
        assert_eq!(store.ttl("k").await.unwrap(), Some(30));
    }

    #[tokio::test]
    async fn test_increment_missing_key_has_no_expiry() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment("fresh").await.unwrap(), 1);
        assert_eq!(store.get("fresh").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.ttl("fresh").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        tokio::time::pause();
        let store = MemoryCounterStore::new();
        store.set("k", "7", 5).await.unwrap();
        assert_eq!(store.len(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_increment_non_numeric_value() {
        let store = MemoryCounterStore::new();
        store.set("k", "abc", 60).await.unwrap();
        assert!(matches!(
            store.increment("k").await,
            Err(QuotaError::CorruptCounter { .. })
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_rejected() {
        let store = MemoryCounterStore::new();
        assert!(matches!(
            store.set("k", "1", u64::MAX).await,
            Err(QuotaError::InvalidConfiguration(_))
        ));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_sweep_expired_entries() {
        tokio::time::pause();
        let store = MemoryCounterStore::new();
        for i in 0..10_000 {
            store.set(&format!("ip:{}", i), "1", 1).await.unwrap();
        }
        assert_eq!(store.entries.len(), 10_000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store.set("fresh", "1", 60).await.unwrap();

        assert_eq!(store.entries.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_entries() {
        tokio::time::pause();
        let store = MemoryCounterStore::new();
        store.set("short", "1", 1).await.unwrap();
        store.set("long", "1", 600).await.unwrap();
        store.increment("no_ttl").await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.entries.len(), 2);
        assert_eq!(store.get("long").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_force_expire() {
        let store = MemoryCounterStore::new();
        store.set("k", "3", 60).await.unwrap();
        store.expire("k");
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
