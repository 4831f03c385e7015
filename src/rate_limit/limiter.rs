use super::store::CounterStore;
use super::types::{Decision, RateLimitKey, DEFAULT_KEY_PREFIX, MAX_WINDOW_SECS};
use crate::error::{QuotaError, Result};
use tracing::{debug, warn};

/// Fixed-window rate limiter over a [`CounterStore`].
///
/// The window is anchored at the first write for a key and resets entirely
/// once the store expires the counter. A burst straddling the boundary can
/// therefore admit up to twice `max_requests`.
///
/// There is no compare-and-set on window start: two first requests racing
/// for the same key both take the "absent" path, so with `max_requests == 1`
/// one extra request may be admitted. Per-key increments are linearized by
/// the store. Budget consumed by a request is never refunded.
pub struct FixedWindowLimiter<S> {
    store: S,
    key_prefix: String,
}

impl<S: CounterStore> FixedWindowLimiter<S> {
    /// Create a limiter using the default key prefix
    pub fn new(store: S) -> Self {
        Self::with_prefix(store, DEFAULT_KEY_PREFIX)
    }

    /// Create a limiter that namespaces its counters under `prefix`
    pub fn with_prefix(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: prefix.into(),
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Check and count one request for `key`.
    ///
    /// Denied requests do not consume budget. Store failures are returned
    /// as `StoreUnavailable` and are not retried here.
    pub async fn check(
        &self,
        key: &RateLimitKey,
        max_requests: u32,
        window_seconds: u64,
    ) -> Result<Decision> {
        if max_requests == 0 {
            return Err(QuotaError::InvalidConfiguration(format!(
                "max_requests must be > 0 for scope {}",
                key.scope
            )));
        }
        if window_seconds == 0 || window_seconds > MAX_WINDOW_SECS {
            return Err(QuotaError::InvalidConfiguration(format!(
                "window_seconds must be in 1..={} for scope {}, got {}",
                MAX_WINDOW_SECS, key.scope, window_seconds
            )));
        }

        let store_key = key.to_store_key(&self.key_prefix);

        let count = match self.store.get(&store_key).await? {
            Some(raw) => parse_count(&store_key, &raw)?,
            None => return self.start_window(&store_key, max_requests, window_seconds).await,
        };

        if count >= i64::from(max_requests) {
            return match self.store.ttl(&store_key).await? {
                Some(ttl) => {
                    warn!("Rate limit exceeded for key: {} (fixed window)", store_key);
                    Ok(Decision::denied(max_requests, ttl.min(window_seconds)))
                }
                None => {
                    debug!("Counter {} expired between reads, starting new window", store_key);
                    self.start_window(&store_key, max_requests, window_seconds).await
                }
            };
        }

        let count = self.store.increment(&store_key).await?;
        let reset_seconds = match self.store.ttl(&store_key).await? {
            Some(ttl) => ttl.min(window_seconds),
            None => {
                // The increment recreated an expired key without a TTL
                self.store
                    .set(&store_key, &count.to_string(), window_seconds)
                    .await?;
                window_seconds
            }
        };

        let remaining = (i64::from(max_requests) - count).max(0) as u32;
        debug!(
            "Fixed window check for key {}: allowed=true, remaining={}, reset_after={}",
            store_key, remaining, reset_seconds
        );
        Ok(Decision::allowed(max_requests, remaining, reset_seconds))
    }

    async fn start_window(
        &self,
        store_key: &str,
        max_requests: u32,
        window_seconds: u64,
    ) -> Result<Decision> {
        self.store.set(store_key, "1", window_seconds).await?;
        debug!("Started {}s window for key {}", window_seconds, store_key);
        Ok(Decision::allowed(
            max_requests,
            max_requests - 1,
            window_seconds,
        ))
    }
}

fn parse_count(key: &str, raw: &str) -> Result<i64> {
    raw.trim().parse().map_err(|_| QuotaError::CorruptCounter {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
