//! Subscription guard: one active subscription per account.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::billing::store::BillingStore;
use crate::error::BillingError;
use crate::models::subscription::{ActiveSubscriptionCheck, Subscription};
use crate::services::api::BillingApi;

/// What to do when the active-subscription check itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardFailurePolicy {
    /// Let the purchase continue; the server still has the final say.
    FailOpen,
    /// Stop the purchase and surface the error.
    #[default]
    FailClosed,
}

impl GuardFailurePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_open" | "open" => Some(GuardFailurePolicy::FailOpen),
            "fail_closed" | "closed" => Some(GuardFailurePolicy::FailClosed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    Clear,
    Blocked(Subscription),
}

#[derive(Clone)]
pub struct SubscriptionGuard {
    api: Arc<dyn BillingApi>,
    store: BillingStore,
    policy: GuardFailurePolicy,
}

impl SubscriptionGuard {
    pub fn new(api: Arc<dyn BillingApi>, store: BillingStore, policy: GuardFailurePolicy) -> Self {
        Self { api, store, policy }
    }

    pub fn policy(&self) -> GuardFailurePolicy {
        self.policy
    }

    /// Asks the server for the actor's active subscription and stores the answer.
    pub async fn check_active(&self) -> Result<ActiveSubscriptionCheck, BillingError> {
        let check = self.api.active_subscription().await?;
        let current = if check.has_active {
            check.subscription.clone()
        } else {
            None
        };
        self.store.reconcile_subscription(current);
        Ok(check)
    }

    /// Applies the failure policy on top of [`Self::check_active`].
    pub async fn evaluate(&self, now: DateTime<Utc>) -> Result<GuardDecision, BillingError> {
        match self.check_active().await {
            Ok(check) => Ok(match check.blocking_subscription(now) {
                Some(sub) => {
                    log::info!(
                        "Purchase blocked: {} subscription active until {}",
                        sub.plan_type,
                        sub.end_date
                    );
                    GuardDecision::Blocked(sub.clone())
                }
                None => GuardDecision::Clear,
            }),
            Err(err) => match self.policy {
                GuardFailurePolicy::FailOpen => {
                    log::warn!("Subscription check failed, continuing: {}", err);
                    Ok(GuardDecision::Clear)
                }
                GuardFailurePolicy::FailClosed => {
                    log::error!("Subscription check failed, blocking purchase: {}", err);
                    Err(err)
                }
            },
        }
    }

    /// Like [`Self::evaluate`] but reports a block as `SubscriptionConflict`.
    pub async fn ensure_clear(&self, now: DateTime<Utc>) -> Result<(), BillingError> {
        match self.evaluate(now).await? {
            GuardDecision::Clear => Ok(()),
            GuardDecision::Blocked(sub) => Err(BillingError::SubscriptionConflict {
                plan_type: sub.plan_type,
                end_date: sub.end_date,
            }),
        }
    }
}
