use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Key-value store with atomic increment and per-key expiry.
///
/// Absent keys are reported as `None`, never as errors. Any failure to reach
/// the store surfaces as `QuotaError::StoreUnavailable`; a command the store
/// rejects surfaces as `QuotaError::StoreCommand`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the raw value stored at `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` at `key`, expiring after `ttl_secs`
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Atomically increment the integer at `key` and return the new value.
    /// A missing key is created with value 1 and no expiry.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Seconds until `key` expires; `None` if the key is absent or has no expiry
    async fn ttl(&self, key: &str) -> Result<Option<u64>>;
}

#[async_trait]
impl<S: CounterStore + ?Sized> CounterStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        (**self).set(key, value, ttl_secs).await
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        (**self).increment(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        (**self).ttl(key).await
    }
}
