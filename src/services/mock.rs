//! In-memory `BillingApi` / `AnalyticsApi` for unit tests.
//!
//! Supports configured responses, per-method error injection and call tracking.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::BillingError;
use crate::models::common::BillingCycle;
use crate::models::payment::{InitializePaymentRequest, Payment, PaymentStatus};
use crate::models::plan::{FeatureSet, PlatformSettings};
use crate::models::revenue::{RevenueRecord, UserGrowthPoint};
use crate::models::subscription::{ActiveSubscriptionCheck, Subscription, SubscriptionStatus};
use crate::services::api::{AnalyticsApi, BillingApi};

#[derive(Default)]
pub struct MockBillingApi {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    active: Option<Subscription>,
    initialized: Option<Payment>,
    last_request: Option<InitializePaymentRequest>,
    process_status: Option<PaymentStatus>,
    process_delay: Option<Duration>,
    transaction_id: Option<String>,
    verified: Option<Payment>,
    history: Vec<Payment>,
    settings: PlatformSettings,
    membership_revenue: Vec<RevenueRecord>,
    consultation_revenue: Vec<RevenueRecord>,
    subscriptions: Vec<RevenueRecord>,
    revenue_analytics: Vec<RevenueRecord>,
    user_growth: Vec<UserGrowthPoint>,
    method_errors: HashMap<String, String>,
    call_log: Vec<String>,
}

impl MockBillingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active subscription with `days_remaining` days left.
    pub fn subscription(plan_type: &str, days_remaining: i64) -> Subscription {
        let now = Utc::now();
        Subscription {
            plan_type: plan_type.to_string(),
            billing_cycle: BillingCycle::Monthly,
            start_date: now - chrono::Duration::days(30 - days_remaining.min(30)),
            end_date: now + chrono::Duration::days(days_remaining),
            features: FeatureSet::default(),
            status: SubscriptionStatus::Active,
            transaction_id: None,
        }
    }

    pub fn set_active(&self, subscription: Option<Subscription>) {
        self.inner.lock().unwrap().active = subscription;
    }

    /// Status `process_payment` reports. Defaults to `Success`.
    pub fn set_process_status(&self, status: PaymentStatus) {
        self.inner.lock().unwrap().process_status = Some(status);
    }

    /// Makes `process_payment` take a while, to observe in-flight state.
    pub fn set_process_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().process_delay = Some(delay);
    }

    pub fn set_transaction_id(&self, transaction_id: &str) {
        self.inner.lock().unwrap().transaction_id = Some(transaction_id.to_string());
    }

    pub fn set_verified(&self, payment: Payment) {
        self.inner.lock().unwrap().verified = Some(payment);
    }

    pub fn set_history(&self, payments: Vec<Payment>) {
        self.inner.lock().unwrap().history = payments;
    }

    pub fn set_settings(&self, settings: PlatformSettings) {
        self.inner.lock().unwrap().settings = settings;
    }

    pub fn set_membership_revenue(&self, records: Vec<RevenueRecord>) {
        self.inner.lock().unwrap().membership_revenue = records;
    }

    pub fn set_consultation_revenue(&self, records: Vec<RevenueRecord>) {
        self.inner.lock().unwrap().consultation_revenue = records;
    }

    pub fn set_subscriptions(&self, records: Vec<RevenueRecord>) {
        self.inner.lock().unwrap().subscriptions = records;
    }

    pub fn set_revenue_analytics(&self, records: Vec<RevenueRecord>) {
        self.inner.lock().unwrap().revenue_analytics = records;
    }

    pub fn set_user_growth(&self, points: Vec<UserGrowthPoint>) {
        self.inner.lock().unwrap().user_growth = points;
    }

    /// Every later call to `method` fails with `message`.
    pub fn fail(&self, method: &str, message: &str) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), message.to_string());
    }

    pub fn clear_failure(&self, method: &str) {
        self.inner.lock().unwrap().method_errors.remove(method);
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    pub fn last_request(&self) -> Option<InitializePaymentRequest> {
        self.inner.lock().unwrap().last_request.clone()
    }

    fn record(&self, method: &str) -> Result<(), BillingError> {
        let mut state = self.inner.lock().unwrap();
        state.call_log.push(method.to_string());
        match state.method_errors.get(method) {
            Some(message) => Err(BillingError::remote(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BillingApi for MockBillingApi {
    async fn active_subscription(&self) -> Result<ActiveSubscriptionCheck, BillingError> {
        self.record("active_subscription")?;
        let active = self.inner.lock().unwrap().active.clone();
        Ok(ActiveSubscriptionCheck {
            has_active: active.is_some(),
            subscription: active,
        })
    }

    async fn initialize_payment(
        &self,
        request: &InitializePaymentRequest,
    ) -> Result<Payment, BillingError> {
        self.record("initialize_payment")?;
        let mut state = self.inner.lock().unwrap();
        let number = state.call_log.len();
        let payment = Payment {
            id: format!("pay_{}", number),
            transaction_id: Some(
                state
                    .transaction_id
                    .clone()
                    .unwrap_or_else(|| format!("TXN{}", number)),
            ),
            order_id: Some(format!("order_{}", number)),
            plan_type: request.plan_type.clone(),
            billing_cycle: request.billing_cycle,
            amount: request.amount,
            payment_method: request.payment_method,
            status: PaymentStatus::Initializing,
            subscription_start_date: None,
            subscription_end_date: None,
            features: None,
            created_at: Some(Utc::now()),
        };
        state.initialized = Some(payment.clone());
        state.last_request = Some(request.clone());
        Ok(payment)
    }

    async fn process_payment(&self, payment_id: &str) -> Result<Payment, BillingError> {
        let delay = self.inner.lock().unwrap().process_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record("process_payment")?;

        let state = self.inner.lock().unwrap();
        let mut payment = state
            .initialized
            .clone()
            .filter(|p| p.id == payment_id)
            .ok_or_else(|| BillingError::remote("Payment not found"))?;
        payment.status = state.process_status.unwrap_or(PaymentStatus::Success);
        if payment.is_success() {
            let start = Utc::now();
            let days = 30 * i64::from(payment.billing_cycle.months());
            payment.subscription_start_date = Some(start);
            payment.subscription_end_date = Some(start + chrono::Duration::days(days));
        }
        Ok(payment)
    }

    async fn verify_payment(&self, transaction_id: &str) -> Result<Payment, BillingError> {
        self.record("verify_payment")?;
        self.inner
            .lock()
            .unwrap()
            .verified
            .clone()
            .filter(|p| p.transaction_id.as_deref() == Some(transaction_id))
            .ok_or_else(|| BillingError::remote("Payment not found"))
    }

    async fn payment_history(&self, limit: u32) -> Result<Vec<Payment>, BillingError> {
        self.record("payment_history")?;
        let history = self.inner.lock().unwrap().history.clone();
        Ok(history.into_iter().take(limit as usize).collect())
    }

    async fn cancel_subscription(&self) -> Result<(), BillingError> {
        self.record("cancel_subscription")?;
        if let Some(active) = self.inner.lock().unwrap().active.as_mut() {
            active.cancel();
        }
        Ok(())
    }

    async fn settings(&self) -> Result<PlatformSettings, BillingError> {
        self.record("settings")?;
        Ok(self.inner.lock().unwrap().settings.clone())
    }
}

#[async_trait]
impl AnalyticsApi for MockBillingApi {
    async fn membership_revenue(&self) -> Result<Vec<RevenueRecord>, BillingError> {
        self.record("membership_revenue")?;
        Ok(self.inner.lock().unwrap().membership_revenue.clone())
    }

    async fn consultation_revenue(&self) -> Result<Vec<RevenueRecord>, BillingError> {
        self.record("consultation_revenue")?;
        Ok(self.inner.lock().unwrap().consultation_revenue.clone())
    }

    async fn subscriptions(&self) -> Result<Vec<RevenueRecord>, BillingError> {
        self.record("subscriptions")?;
        Ok(self.inner.lock().unwrap().subscriptions.clone())
    }

    async fn revenue_analytics(&self) -> Result<Vec<RevenueRecord>, BillingError> {
        self.record("revenue_analytics")?;
        Ok(self.inner.lock().unwrap().revenue_analytics.clone())
    }

    async fn user_growth(&self) -> Result<Vec<UserGrowthPoint>, BillingError> {
        self.record("user_growth")?;
        Ok(self.inner.lock().unwrap().user_growth.clone())
    }
}
