//! Rate limiting module
//!
//! Fixed-window counters kept in an external [`CounterStore`], keyed by
//! caller identifier and action scope.
//!
//! # Features
//!
//! - Redis-backed store for multi-process deployments, in-memory store for
//!   tests and single-node setups
//! - Per-scope store failure policy (fail-open or fail-closed)
//! - Plan-derived limits for AI messages and tool uses
//! - Rate limit headers in responses (`X-RateLimit-*`, `Retry-After`)
//!
//! # Example
//!
//! ```rust,no_run
//! use quotaguard::rate_limit::{FixedWindowLimiter, MemoryCounterStore, RateLimitKey, RateLimitScope};
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = FixedWindowLimiter::new(MemoryCounterStore::new());
//!     let key = RateLimitKey::new("ip:1.2.3.4", RateLimitScope::Login);
//!
//!     let decision = limiter.check(&key, 10, 900).await.unwrap();
//!     assert!(decision.allowed);
//!
//!     // Or against Redis
//!     // let store = RedisCounterStore::connect("redis://localhost:6379", Duration::from_secs(2)).await?;
//! }
//! ```

pub mod limiter;
pub mod memory;
pub mod redis;
pub mod response;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use limiter::FixedWindowLimiter;
pub use memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;
pub use response::{add_rate_limit_headers, rate_limit_response};
pub use service::RateLimiterService;
pub use store::CounterStore;
pub use types::{Decision, FailurePolicy, RateLimitKey, RateLimitRule, RateLimitScope};
