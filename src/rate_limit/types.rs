use crate::error::{QuotaError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Default namespace for counter keys in the store
pub const DEFAULT_KEY_PREFIX: &str = "rate_limit";

/// Longest accepted window (366 days)
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

/// Action class a counter belongs to.
///
/// Scopes compare by name, so `Custom("login")` is the same scope as `Login`.
#[derive(Debug, Clone)]
pub enum RateLimitScope {
    Login,
    Signup,
    Refresh,
    AiMessage,
    ToolUse,
    /// Any other action class, by name
    Custom(String),
}

impl RateLimitScope {
    /// Canonical name used in store keys and configuration
    pub fn as_str(&self) -> &str {
        match self {
            RateLimitScope::Login => "login",
            RateLimitScope::Signup => "signup",
            RateLimitScope::Refresh => "refresh",
            RateLimitScope::AiMessage => "ai_message",
            RateLimitScope::ToolUse => "tool_use",
            RateLimitScope::Custom(name) => name,
        }
    }

    /// Parse a scope name; names that are not built in become `Custom`.
    ///
    /// Empty names and names containing `:` are rejected.
    pub fn from_name(name: &str) -> Result<Self> {
        let scope = match name {
            "login" => RateLimitScope::Login,
            "signup" => RateLimitScope::Signup,
            "refresh" => RateLimitScope::Refresh,
            "ai_message" => RateLimitScope::AiMessage,
            "tool_use" => RateLimitScope::ToolUse,
            other => RateLimitScope::Custom(other.to_string()),
        };
        scope.validate()?;
        Ok(scope)
    }

    /// Check that the name can be used as a key segment
    pub fn validate(&self) -> Result<()> {
        let name = self.as_str();
        if name.is_empty() {
            return Err(QuotaError::InvalidConfiguration(
                "scope name must not be empty".to_string(),
            ));
        }
        if name.contains(':') {
            return Err(QuotaError::InvalidConfiguration(format!(
                "scope name '{}' must not contain ':'",
                name
            )));
        }
        Ok(())
    }
}

impl PartialEq for RateLimitScope {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RateLimitScope {}

impl Hash for RateLimitScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RateLimitScope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RateLimitScope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        RateLimitScope::from_name(&name).map_err(serde::de::Error::custom)
    }
}

/// Rate limit key components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The caller identifier (e.g., "ip:1.2.3.4", a user ID, an API key)
    pub identifier: String,
    /// The action class being limited
    pub scope: RateLimitScope,
}

impl RateLimitKey {
    /// Create a new rate limit key
    pub fn new(identifier: impl Into<String>, scope: RateLimitScope) -> Self {
        Self {
            identifier: identifier.into(),
            scope,
        }
    }

    /// Convert to a counter store key: `<prefix>:<scope>:<identifier>`.
    ///
    /// `%` and `:` in the scope segment are percent-encoded, so the first `:`
    /// after the prefix always ends the scope and distinct keys never share
    /// a counter.
    pub fn to_store_key(&self, prefix: &str) -> String {
        format!(
            "{}:{}:{}",
            prefix,
            escape_segment(self.scope.as_str()),
            self.identifier
        )
    }
}

fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains(|c| c == ':' || c == '%') {
        return Cow::Borrowed(segment);
    }
    let mut escaped = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// What to do when the counter store cannot be reached
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit the request and log loudly
    FailOpen,
    /// Deny the request
    FailClosed,
}

/// Limit applied to one action scope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Maximum number of requests allowed per window
    pub requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
    /// Behaviour on counter store failure
    pub on_store_error: FailurePolicy,
}

impl RateLimitRule {
    pub fn new(requests: u32, window_secs: u64, on_store_error: FailurePolicy) -> Self {
        Self {
            requests,
            window_secs,
            on_store_error,
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Total limit for the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Seconds until the window resets
    pub reset_seconds: u64,
}

impl Decision {
    /// Create an allowed decision
    pub fn allowed(limit: u32, remaining: u32, reset_seconds: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_seconds,
        }
    }

    /// Create a denied decision
    pub fn denied(limit: u32, reset_seconds: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_seconds,
        }
    }

    /// Seconds the caller should wait before retrying, if denied
    pub fn retry_after(&self) -> Option<u64> {
        if self.allowed {
            None
        } else {
            Some(self.reset_seconds)
        }
    }

    /// Turn a denial into a `QuotaExceeded` error
    pub fn into_result(self, scope: &RateLimitScope) -> Result<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(QuotaError::QuotaExceeded {
                scope: scope.to_string(),
                retry_after: self.reset_seconds,
            })
        }
    }
}
