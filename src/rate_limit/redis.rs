use super::store::CounterStore;
use crate::error::{QuotaError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Redis-backed counter store
#[derive(Clone)]
pub struct RedisCounterStore {
    /// Redis connection manager
    connection: ConnectionManager,
    /// Upper bound on any single store call
    timeout: Duration,
}

impl RedisCounterStore {
    /// Connect to Redis at `redis_url`
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QuotaError::Config(format!("Invalid Redis URL: {}", e)))?;

        let connection = match tokio::time::timeout(timeout, ConnectionManager::new(client)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                error!("Redis connection failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                error!("Redis connection timed out after {:?}", timeout);
                return Err(QuotaError::StoreUnavailable(format!(
                    "connect timed out after {:?}",
                    timeout
                )));
            }
        };

        info!("Redis counter store connected");
        Ok(Self {
            connection,
            timeout,
        })
    }

    /// Test Redis connection
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        self.bounded(redis::cmd("PING").query_async::<_, ()>(&mut conn))
            .await
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        with_timeout(self.timeout, fut).await
    }
}

/// Run one Redis command, failing with `StoreUnavailable` once `timeout`
/// elapses
async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(|e| {
            error!("Redis command failed: {}", e);
            QuotaError::from(e)
        }),
        Err(_) => {
            error!("Redis command timed out after {:?}", timeout);
            Err(QuotaError::StoreUnavailable(format!(
                "command timed out after {:?}",
                timeout
            )))
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection.clone();
        self.bounded(conn.set_ex::<_, _, ()>(key, value, ttl_secs))
            .await
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut conn = self.connection.clone();
        self.bounded(conn.incr::<_, _, i64>(key, 1)).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.connection.clone();
        let ttl = self.bounded(conn.ttl::<_, i64>(key)).await?;

        // -2: key missing, -1: key has no expiry
        Ok(u64::try_from(ttl).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // They are ignored by default. Run with: cargo test -- --ignored

    async fn create_test_store() -> RedisCounterStore {
        RedisCounterStore::connect("redis://127.0.0.1:6379", Duration::from_secs(2))
            .await
            .expect("Failed to connect to Redis")
    }

    fn test_key(tag: &str) -> String {
        format!("quotaguard:test:{}:{}", tag, rand::random::<u32>())
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_connection() {
        let store = create_test_store().await;
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_set_increment_ttl() {
        let store = create_test_store().await;
        let key = test_key("incr");

        assert_eq!(store.get(&key).await.unwrap(), None);
        store.set(&key, "1", 60).await.unwrap();
        assert_eq!(store.increment(&key).await.unwrap(), 2);

        let ttl = store.ttl(&key).await.unwrap().expect("key should expire");
        assert!(ttl <= 60);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_ttl_missing_key() {
        let store = create_test_store().await;
        assert_eq!(store.ttl(&test_key("missing")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_slow_command_times_out_as_unavailable() {
        tokio::time::pause();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            RedisResult::Ok(Some("1".to_string()))
        };

        let started = tokio::time::Instant::now();
        let result = with_timeout(Duration::from_millis(200), slow).await;

        assert!(matches!(result, Err(QuotaError::StoreUnavailable(_))));
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_command_error_is_not_unavailable() {
        let rejected = async {
            RedisResult::<i64>::Err(redis::RedisError::from((
                redis::ErrorKind::ResponseError,
                "invalid expire time in 'set' command",
            )))
        };
        let result = with_timeout(Duration::from_millis(200), rejected).await;
        assert!(matches!(result, Err(QuotaError::StoreCommand(_))));
    }

    #[tokio::test]
    async fn test_silent_server_is_unavailable_within_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // Accept and hold connections without ever replying
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeout = Duration::from_millis(200);
        let started = std::time::Instant::now();
        let url = format!("redis://{}", addr);
        let result = match RedisCounterStore::connect(&url, timeout).await {
            Ok(store) => store.get("quotaguard:test:silent").await.map(|_| ()),
            Err(e) => Err(e),
        };

        assert!(matches!(result, Err(QuotaError::StoreUnavailable(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_unavailable() {
        let result =
            RedisCounterStore::connect("redis://127.0.0.1:1", Duration::from_millis(200)).await;
        assert!(matches!(result, Err(QuotaError::StoreUnavailable(_))));
    }
}
