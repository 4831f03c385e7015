use super::limiter::FixedWindowLimiter;
use super::memory::MemoryCounterStore;
use super::redis::RedisCounterStore;
use super::store::CounterStore;
use super::types::{Decision, FailurePolicy, RateLimitKey, RateLimitRule, RateLimitScope};
use crate::config::{QuotaConfig, StoreBackend};
use crate::error::{QuotaError, Result};
use crate::plans::{self, PlanAction, PlanTier};
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Admission checks for named actions and plan-metered actions.
///
/// Each rule carries its own store failure policy; the service applies it
/// when the counter store is unavailable and propagates every other error.
pub struct RateLimiterService {
    limiter: FixedWindowLimiter<Arc<dyn CounterStore>>,
    rules: HashMap<RateLimitScope, RateLimitRule>,
    plan_policies: HashMap<PlanAction, FailurePolicy>,
}

impl RateLimiterService {
    /// Create a service over an explicit store
    pub fn new(
        store: Arc<dyn CounterStore>,
        key_prefix: &str,
        rules: HashMap<RateLimitScope, RateLimitRule>,
        plan_policies: HashMap<PlanAction, FailurePolicy>,
    ) -> Self {
        Self {
            limiter: FixedWindowLimiter::with_prefix(store, key_prefix),
            rules,
            plan_policies,
        }
    }

    /// Build the store named in `config` and a service over it
    pub async fn from_config(config: &QuotaConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn CounterStore> = match config.store.backend {
            StoreBackend::Redis => {
                info!("Initializing rate limiter with Redis backend");
                let timeout = Duration::from_millis(config.store.timeout_ms);
                Arc::new(RedisCounterStore::connect(&config.store.url, timeout).await?)
            }
            StoreBackend::Memory => {
                info!("Initializing rate limiter with in-memory backend");
                Arc::new(MemoryCounterStore::new())
            }
        };

        Ok(Self::new(
            store,
            &config.store.key_prefix,
            config.action_rules(),
            config.plan_policies(),
        ))
    }

    /// The underlying limiter
    pub fn limiter(&self) -> &FixedWindowLimiter<Arc<dyn CounterStore>> {
        &self.limiter
    }

    /// Rule configured for `scope`
    pub fn rule(&self, scope: &RateLimitScope) -> Option<&RateLimitRule> {
        self.rules.get(scope)
    }

    /// Rule derived from the plan table for `action` under `tier`
    pub fn plan_rule(&self, tier: PlanTier, action: PlanAction) -> Result<RateLimitRule> {
        let policy = self.plan_policies.get(&action).copied().ok_or_else(|| {
            QuotaError::InvalidConfiguration(format!(
                "No store failure policy for plan action: {}",
                action.scope()
            ))
        })?;
        let quota = plans::quota_for(tier, action);
        Ok(RateLimitRule::new(quota.max_requests, quota.window_secs, policy))
    }

    /// Check a named action (login, signup, ...) against its configured rule
    pub async fn check_action(&self, scope: &RateLimitScope, identifier: &str) -> Result<Decision> {
        let rule = self.rules.get(scope).ok_or_else(|| {
            QuotaError::InvalidConfiguration(format!("No rate limit rule for scope: {}", scope))
        })?;

        let key = RateLimitKey::new(identifier, scope.clone());
        self.check_with_rule(&key, rule).await
    }

    /// Check a plan-metered action using the limits of `tier`
    pub async fn check_plan_action(
        &self,
        identifier: &str,
        tier: PlanTier,
        action: PlanAction,
    ) -> Result<Decision> {
        let rule = self.plan_rule(tier, action)?;
        let key = RateLimitKey::new(identifier, action.scope());
        debug!(
            "Plan {} allows {} {} per {}s",
            tier, rule.requests, key.scope, rule.window_secs
        );
        self.check_with_rule(&key, &rule).await
    }

    /// Check `key` against `rule`, applying the rule's store failure policy
    pub async fn check_with_rule(&self, key: &RateLimitKey, rule: &RateLimitRule) -> Result<Decision> {
        let decision = match self
            .limiter
            .check(key, rule.requests, rule.window_secs)
            .await
        {
            Ok(decision) => decision,
            Err(QuotaError::StoreUnavailable(reason)) => {
                counter!("quotaguard_store_errors_total", "scope" => key.scope.to_string())
                    .increment(1);
                store_failure_decision(key, rule, &reason)
            }
            Err(e) => return Err(e),
        };

        let outcome = if decision.allowed { "allowed" } else { "denied" };
        counter!(
            "quotaguard_rate_limit_decisions_total",
            "scope" => key.scope.to_string(),
            "outcome" => outcome
        )
        .increment(1);

        Ok(decision)
    }
}

fn store_failure_decision(key: &RateLimitKey, rule: &RateLimitRule, reason: &str) -> Decision {
    match rule.on_store_error {
        FailurePolicy::FailOpen => {
            error!(
                scope = %key.scope,
                identifier = %key.identifier,
                reason,
                "Counter store unavailable, admitting request without counting"
            );
            Decision::allowed(
                rule.requests,
                rule.requests.saturating_sub(1),
                rule.window_secs,
            )
        }
        FailurePolicy::FailClosed => {
            warn!(
                scope = %key.scope,
                identifier = %key.identifier,
                reason,
                "Counter store unavailable, denying request"
            );
            Decision::denied(rule.requests, rule.window_secs)
        }
    }
}
