use super::PlanTier;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Billing state of a subscription
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
}

/// A user's current subscription.
///
/// Created on signup as an active Free plan. Billing moves it between tiers
/// and statuses; it is never deleted, only canceled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub user_id: String,
    tier: PlanTier,
    status: SubscriptionStatus,
}

impl Subscription {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tier: PlanTier::Free,
            status: SubscriptionStatus::Active,
        }
    }

    /// Tier on record, regardless of status
    pub fn tier(&self) -> PlanTier {
        self.tier
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    /// Tier whose quotas apply right now. A canceled subscription gets Free
    /// limits; a past-due one keeps its tier until billing cancels it.
    pub fn effective_tier(&self) -> PlanTier {
        match self.status {
            SubscriptionStatus::Canceled => PlanTier::Free,
            SubscriptionStatus::Active | SubscriptionStatus::PastDue => self.tier,
        }
    }

    /// Upgrade or downgrade; reactivates a canceled or past-due subscription
    pub fn change_tier(&mut self, tier: PlanTier) {
        info!(user_id = %self.user_id, from = %self.tier, to = %tier, "Subscription tier changed");
        self.tier = tier;
        self.status = SubscriptionStatus::Active;
    }

    pub fn mark_past_due(&mut self) {
        if self.status == SubscriptionStatus::Active {
            self.status = SubscriptionStatus::PastDue;
        }
    }

    pub fn cancel(&mut self) {
        info!(user_id = %self.user_id, tier = %self.tier, "Subscription canceled");
        self.status = SubscriptionStatus::Canceled;
    }
}
