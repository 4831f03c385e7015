use crate::error::{QuotaError, Result};
use crate::plans::PlanAction;
use crate::rate_limit::types::{
    FailurePolicy, RateLimitRule, RateLimitScope, DEFAULT_KEY_PREFIX, MAX_WINDOW_SECS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Environment variable overriding `store.url`
pub const REDIS_URL_ENV: &str = "QUOTAGUARD_REDIS_URL";

/// Main quota service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Per-scope action limits, merged over the built-in defaults
    #[serde(default)]
    pub actions: HashMap<RateLimitScope, RateLimitRule>,
    /// Store failure policy per plan-metered action, merged over the
    /// built-in defaults. An entry must name its policy.
    #[serde(default)]
    pub plan_actions: HashMap<PlanAction, FailurePolicy>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which counter store backs the limiter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Namespace for counter keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Upper bound on a single store call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            actions: HashMap::new(),
            plan_actions: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Built-in limits for the authentication endpoints. Brute-force protection
/// must hold during a store outage, so all of them fail closed.
pub fn default_action_rules() -> HashMap<RateLimitScope, RateLimitRule> {
    HashMap::from([
        (
            RateLimitScope::Login,
            RateLimitRule::new(10, 900, FailurePolicy::FailClosed),
        ),
        (
            RateLimitScope::Signup,
            RateLimitRule::new(5, 3600, FailurePolicy::FailClosed),
        ),
        (
            RateLimitScope::Refresh,
            RateLimitRule::new(20, 3600, FailurePolicy::FailClosed),
        ),
    ])
}

/// Built-in store failure policies for plan-metered actions. A store
/// outage must not block paying users from the product, so both fail open.
pub fn default_plan_policies() -> HashMap<PlanAction, FailurePolicy> {
    HashMap::from([
        (PlanAction::AiMessage, FailurePolicy::FailOpen),
        (PlanAction::ToolUse, FailurePolicy::FailOpen),
    ])
}

impl QuotaConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QuotaError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| QuotaError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(REDIS_URL_ENV).filter(|u| !u.is_empty()) {
            self.store.url = url;
        }
    }

    /// Configured action rules layered over [`default_action_rules`]
    pub fn action_rules(&self) -> HashMap<RateLimitScope, RateLimitRule> {
        let mut rules = default_action_rules();
        rules.extend(self.actions.iter().map(|(k, v)| (k.clone(), v.clone())));
        rules
    }

    /// Configured plan action policies layered over [`default_plan_policies`]
    pub fn plan_policies(&self) -> HashMap<PlanAction, FailurePolicy> {
        let mut policies = default_plan_policies();
        policies.extend(self.plan_actions.iter().map(|(k, v)| (*k, *v)));
        policies
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Redis && self.store.url.is_empty() {
            return Err(QuotaError::Config("Redis URL cannot be empty".to_string()));
        }

        if self.store.key_prefix.is_empty() {
            return Err(QuotaError::Config("Key prefix cannot be empty".to_string()));
        }

        if self.store.timeout_ms == 0 {
            return Err(QuotaError::Config("Store timeout must be > 0".to_string()));
        }

        for (scope, rule) in &self.actions {
            scope
                .validate()
                .map_err(|e| QuotaError::Config(e.to_string()))?;
            if rule.requests == 0 {
                return Err(QuotaError::Config(format!(
                    "Rate limit requests must be > 0 for scope: {}",
                    scope
                )));
            }
            if rule.window_secs == 0 || rule.window_secs > MAX_WINDOW_SECS {
                return Err(QuotaError::Config(format!(
                    "Rate limit window must be in 1..={} seconds for scope: {}",
                    MAX_WINDOW_SECS, scope
                )));
            }
        }

        Ok(())
    }
}
