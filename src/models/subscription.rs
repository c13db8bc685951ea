use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::common::BillingCycle;
use crate::models::payment::Payment;
use crate::models::plan::FeatureSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    /// Derived once `now > end_date`; the client never stores it on its own.
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan_type: String,
    pub billing_cycle: BillingCycle,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub features: FeatureSet,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl Subscription {
    /// Builds the subscription a successful payment grants.
    ///
    /// Returns `None` for payments that are not `Success` or lack period dates.
    pub fn from_payment(payment: &Payment) -> Option<Self> {
        if !payment.is_success() {
            return None;
        }
        Some(Self {
            plan_type: payment.plan_type.clone(),
            billing_cycle: payment.billing_cycle,
            start_date: payment.subscription_start_date?,
            end_date: payment.subscription_end_date?,
            features: payment.features.clone().unwrap_or_default(),
            status: SubscriptionStatus::Active,
            transaction_id: payment.transaction_id.clone(),
        })
    }

    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        if now > self.end_date {
            SubscriptionStatus::Expired
        } else {
            self.status
        }
    }

    /// Cancelled subscriptions keep their features until `end_date`.
    pub fn grants_access(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.effective_status(now),
            SubscriptionStatus::Active | SubscriptionStatus::Cancelled
        )
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        self.end_date.signed_duration_since(now).num_days().max(0)
    }

    pub fn cancel(&mut self) {
        if self.status == SubscriptionStatus::Active {
            self.status = SubscriptionStatus::Cancelled;
        }
    }
}

/// Result of `GET /api/payments/subscription/active`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSubscriptionCheck {
    pub has_active: bool,
    pub subscription: Option<Subscription>,
}

impl ActiveSubscriptionCheck {
    pub fn none() -> Self {
        Self {
            has_active: false,
            subscription: None,
        }
    }

    /// An active flag with an already expired record does not count.
    pub fn blocking_subscription(&self, now: DateTime<Utc>) -> Option<&Subscription> {
        if !self.has_active {
            return None;
        }
        self.subscription.as_ref().filter(|sub| sub.grants_access(now))
    }
}
