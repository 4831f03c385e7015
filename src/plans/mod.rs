//! Subscription plans and their quotas
//!
//! Every tier maps to one immutable [`PlanLimits`] record held in a static
//! table. Lookups never fail: unknown tier names resolve to [`PlanTier::Free`]
//! and unknown feature names are simply not enabled.
//!
//! | tier     | AI messages     | tool uses       | max file | files/session |
//! |----------|-----------------|-----------------|----------|---------------|
//! | Free     | 10 / 30 days    | 4 / 12 hours    | 5 MB     | 5             |
//! | Pro      | 3000 / 30 days  | 3000 / 30 days  | 50 MB    | 10            |
//! | ProPlus  | 10000 / 30 days | 10000 / 30 days | 100 MB   | 15            |

pub mod subscription;

use crate::error::{QuotaError, Result};
use crate::rate_limit::types::RateLimitScope;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use subscription::{Subscription, SubscriptionStatus};

const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Subscription tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlanTier {
    #[default]
    Free = 0,
    Pro = 1,
    ProPlus = 2,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Free, PlanTier::Pro, PlanTier::ProPlus];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::ProPlus => "pro_plus",
        }
    }

    /// Parse a tier name. Marketing names ("premium", "premium plus") are
    /// accepted; anything unrecognised is `Free`.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "pro" | "premium" => PlanTier::Pro,
            "pro_plus" | "premium_plus" => PlanTier::ProPlus,
            _ => PlanTier::Free,
        }
    }

    /// Limits that apply to this tier
    pub fn limits(self) -> &'static PlanLimits {
        &PLAN_TABLE[self as usize]
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlanTier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PlanTier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(PlanTier::from_name(&name))
    }
}

/// Unit of a quota period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Hours,
    Days,
}

impl PeriodUnit {
    pub fn seconds(self) -> u64 {
        match self {
            PeriodUnit::Hours => SECS_PER_HOUR,
            PeriodUnit::Days => SECS_PER_DAY,
        }
    }
}

/// Metered action governed by a plan quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// AI chat message
    AiMessage,
    /// Tool invocation (cleaning, pivots, formula generation, ...)
    ToolUse,
}

impl PlanAction {
    /// Counter scope used for this action
    pub fn scope(self) -> RateLimitScope {
        match self {
            PlanAction::AiMessage => RateLimitScope::AiMessage,
            PlanAction::ToolUse => RateLimitScope::ToolUse,
        }
    }

    pub fn from_scope(scope: &RateLimitScope) -> Option<Self> {
        match scope {
            RateLimitScope::AiMessage => Some(PlanAction::AiMessage),
            RateLimitScope::ToolUse => Some(PlanAction::ToolUse),
            _ => None,
        }
    }
}

/// Numeric quota for one action: `max_requests` per `window_secs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionQuota {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Usage limits and feature access for a tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub messages_per_period: u32,
    pub messages_period_days: u32,
    pub tool_uses_per_period: u32,
    pub tool_uses_period_unit: PeriodUnit,
    pub tool_uses_period_value: u32,
    pub max_file_size_mb: u32,
    pub max_files_per_session: u32,
    pub enabled_features: &'static [&'static str],
}

impl PlanLimits {
    /// AI message period in seconds
    pub fn messages_window_secs(&self) -> u64 {
        u64::from(self.messages_period_days) * SECS_PER_DAY
    }

    /// Tool use period in seconds
    pub fn tool_uses_window_secs(&self) -> u64 {
        u64::from(self.tool_uses_period_value) * self.tool_uses_period_unit.seconds()
    }

    /// Limit and window for a metered action
    pub fn quota(&self, action: PlanAction) -> ActionQuota {
        match action {
            PlanAction::AiMessage => ActionQuota {
                max_requests: self.messages_per_period,
                window_secs: self.messages_window_secs(),
            },
            PlanAction::ToolUse => ActionQuota {
                max_requests: self.tool_uses_per_period,
                window_secs: self.tool_uses_window_secs(),
            },
        }
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.enabled_features.contains(&feature)
    }
}

/// Features shared by every tier; paid tiers differ only in limits
const STANDARD_FEATURES: &[&str] = &[
    "data_cleaning",
    "pivot_tables",
    "formula_assistant",
    "script_assistant",
    "sql_assistant",
    "regex_assistant",
    "template_generator",
];

/// Indexed by `PlanTier as usize`
static PLAN_TABLE: [PlanLimits; 3] = [
    PlanLimits {
        messages_per_period: 10,
        messages_period_days: 30,
        tool_uses_per_period: 4,
        tool_uses_period_unit: PeriodUnit::Hours,
        tool_uses_period_value: 12,
        max_file_size_mb: 5,
        max_files_per_session: 5,
        enabled_features: STANDARD_FEATURES,
    },
    PlanLimits {
        messages_per_period: 3000,
        messages_period_days: 30,
        tool_uses_per_period: 3000,
        tool_uses_period_unit: PeriodUnit::Days,
        tool_uses_period_value: 30,
        max_file_size_mb: 50,
        max_files_per_session: 10,
        enabled_features: STANDARD_FEATURES,
    },
    PlanLimits {
        messages_per_period: 10000,
        messages_period_days: 30,
        tool_uses_per_period: 10000,
        tool_uses_period_unit: PeriodUnit::Days,
        tool_uses_period_value: 30,
        max_file_size_mb: 100,
        max_files_per_session: 15,
        enabled_features: STANDARD_FEATURES,
    },
];

/// Limits for `tier`
pub fn limits_for(tier: PlanTier) -> &'static PlanLimits {
    tier.limits()
}

/// Whether `feature` is enabled for `tier`
pub fn has_feature(tier: PlanTier, feature: &str) -> bool {
    tier.limits().has_feature(feature)
}

/// All features enabled for `tier`
pub fn all_features(tier: PlanTier) -> &'static [&'static str] {
    tier.limits().enabled_features
}

/// Limit and window for `action` under `tier`
pub fn quota_for(tier: PlanTier, action: PlanAction) -> ActionQuota {
    tier.limits().quota(action)
}

/// Feature gate: `FeatureNotAvailable` when `tier` lacks `feature`
pub fn require_feature(tier: PlanTier, feature: &str) -> Result<()> {
    if has_feature(tier, feature) {
        Ok(())
    } else {
        Err(QuotaError::FeatureNotAvailable(feature.to_string()))
    }
}

/// Check an upload against the tier's file size and per-session file count.
/// `files_in_session` includes the file being uploaded.
pub fn check_file_upload(tier: PlanTier, size_mb: u64, files_in_session: u32) -> Result<()> {
    let limits = tier.limits();
    if size_mb > u64::from(limits.max_file_size_mb) {
        return Err(QuotaError::FileTooLarge {
            size_mb,
            max_mb: limits.max_file_size_mb,
        });
    }
    if files_in_session > limits.max_files_per_session {
        return Err(QuotaError::TooManyFiles {
            count: files_in_session,
            max: limits.max_files_per_session,
        });
    }
    Ok(())
}
