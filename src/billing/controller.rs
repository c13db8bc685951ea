//! Payment orchestration.
//!
//! `PaymentController` is the only caller that moves the payment state
//! machine. A purchase runs validation, then the subscription guard, then
//! initialize and process, publishing every step through the store.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::billing::guard::{GuardDecision, SubscriptionGuard};
use crate::billing::state::PaymentState;
use crate::billing::store::BillingStore;
use crate::billing::validation::{validate_purchase, ValidationContext};
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::models::payment::{Payment, PaymentMethod, PurchaseRequest, UpiDetails, VerifiedToken};
use crate::models::subscription::Subscription;
use crate::services::api::BillingApi;
use crate::services::verifier::{PaymentVerifier, VerificationRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Completed {
        payment: Payment,
        subscription: Option<Subscription>,
    },
    /// Interrupted by an existing subscription; state stays `Idle`.
    Blocked(Subscription),
}

pub struct PaymentController {
    api: Arc<dyn BillingApi>,
    store: BillingStore,
    guard: SubscriptionGuard,
    config: BillingConfig,
    attempt: Mutex<()>,
}

impl PaymentController {
    pub fn new(api: Arc<dyn BillingApi>, store: BillingStore, config: BillingConfig) -> Self {
        let guard = SubscriptionGuard::new(api.clone(), store.clone(), config.guard_failure_policy);
        Self {
            api,
            store,
            guard,
            config,
            attempt: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &BillingStore {
        &self.store
    }

    pub fn guard(&self) -> &SubscriptionGuard {
        &self.guard
    }

    fn validation_context(&self) -> ValidationContext {
        ValidationContext::now().require_bank_verification(self.config.require_bank_verification)
    }

    /// Runs one purchase attempt from `Idle` to `Success` or `Failed`.
    ///
    /// Finished attempts have to be [`reset`](Self::reset) first.
    pub async fn submit(&self, request: PurchaseRequest) -> Result<PaymentOutcome, BillingError> {
        let _attempt = self.attempt.try_lock().map_err(|_| BillingError::PaymentInFlight)?;

        let state = self.store.payment_state();
        if state.is_in_flight() {
            return Err(BillingError::PaymentInFlight);
        }
        if state.is_terminal() {
            return Err(BillingError::InvalidTransition {
                from: state,
                to: PaymentState::Initializing,
            });
        }

        validate_purchase(&request, &self.validation_context()).map_err(BillingError::Validation)?;

        match self.guard.evaluate(Utc::now()).await {
            Ok(GuardDecision::Clear) => {}
            Ok(GuardDecision::Blocked(subscription)) => {
                self.store.record_blocked(subscription.clone());
                return Ok(PaymentOutcome::Blocked(subscription));
            }
            Err(err) => {
                self.store.record_error(err.user_message());
                return Err(err);
            }
        }

        self.store.begin_attempt()?;
        log::info!(
            "Initializing {} {} payment via {}",
            request.plan_type,
            request.billing_cycle,
            request.method.kind()
        );

        let initialized = match self.api.initialize_payment(&request.to_initialize_body()).await {
            Ok(payment) => payment,
            Err(err) => return Err(self.fail(err)),
        };
        let payment_id = initialized.id.clone();
        self.store.record_initialized(initialized)?;
        self.store.begin_processing()?;

        let processed = match self.api.process_payment(&payment_id).await {
            Ok(payment) => payment,
            Err(err) => return Err(self.fail(err)),
        };
        if !processed.is_success() {
            let err = BillingError::remote(format!("Payment {} was not completed", payment_id));
            return Err(self.fail(err));
        }

        let subscription = Subscription::from_payment(&processed);
        if subscription.is_none() {
            log::warn!("Payment {} succeeded without subscription dates", processed.id);
        }
        self.store.record_success(processed.clone(), subscription.clone())?;
        log::info!(
            "Payment {} succeeded (transaction {:?})",
            processed.id,
            processed.transaction_id
        );

        Ok(PaymentOutcome::Completed {
            payment: processed,
            subscription,
        })
    }

    fn fail(&self, err: BillingError) -> BillingError {
        let message = err.user_message();
        log::error!("Payment attempt failed: {}", message);
        if let Err(transition) = self.store.record_failure(message) {
            log::error!("Could not record payment failure: {}", transition);
        }
        err
    }

    /// "Try again".
    pub fn reset(&self) -> Result<(), BillingError> {
        self.store.reset()
    }

    /// Runs the external verification step and attaches its token to `method`.
    ///
    /// Returns `None` for methods that need no verification.
    pub async fn verify_method(
        &self,
        verifier: &dyn PaymentVerifier,
        method: &mut PaymentMethod,
    ) -> Result<Option<VerifiedToken>, BillingError> {
        let request = match &*method {
            PaymentMethod::Upi(UpiDetails::Id { id, .. }) => VerificationRequest::Upi { id: id.trim().to_string() },
            PaymentMethod::NetBanking(bank) => VerificationRequest::NetBanking {
                bank: bank.bank.clone(),
                username: bank.username.clone(),
                password: bank.password.clone(),
            },
            _ => return Ok(None),
        };

        log::info!("Verifying {}", request.describe());
        let token = verifier.verify(&request).await?;
        match method {
            PaymentMethod::Upi(UpiDetails::Id { verified, .. }) => *verified = Some(token.clone()),
            PaymentMethod::NetBanking(bank) => bank.verified = Some(token.clone()),
            _ => {}
        }
        Ok(Some(token))
    }

    /// Cancels the persisted subscription; the in-flight attempt is untouched.
    pub async fn cancel_subscription(&self) -> Result<(), BillingError> {
        match self.api.cancel_subscription().await {
            Ok(()) => {
                self.store.mark_cancelled();
                Ok(())
            }
            Err(err) => {
                self.store.record_error(err.user_message());
                Err(err)
            }
        }
    }

    /// Server record of a transaction; a successful one becomes the active subscription.
    pub async fn verify_payment(&self, transaction_id: &str) -> Result<Payment, BillingError> {
        let payment = self.api.verify_payment(transaction_id).await?;
        if let Some(subscription) = Subscription::from_payment(&payment) {
            self.store.reconcile_subscription(Some(subscription));
        }
        Ok(payment)
    }

    pub async fn refresh_active_subscription(&self) -> Result<Option<Subscription>, BillingError> {
        self.guard.check_active().await?;
        Ok(self.store.active_subscription())
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<Payment>, BillingError> {
        self.api.payment_history(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::guard::GuardFailurePolicy;
    use crate::models::common::BillingCycle;
    use crate::models::payment::{CardDetails, EmiDetails, NetBankingDetails, PaymentStatus};
    use crate::models::subscription::SubscriptionStatus;
    use crate::services::mock::MockBillingApi;
    use crate::services::verifier::testing::StaticVerifier;
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn controller(api: &Arc<MockBillingApi>) -> PaymentController {
        let dyn_api: Arc<dyn BillingApi> = api.clone();
        PaymentController::new(dyn_api, BillingStore::new(), BillingConfig::default())
    }

    fn card_purchase() -> PurchaseRequest {
        PurchaseRequest {
            plan_type: "Premium".to_string(),
            billing_cycle: BillingCycle::Monthly,
            amount: Decimal::new(899, 0),
            method: PaymentMethod::Card(CardDetails {
                number: "4111 1111 1111 1111".to_string(),
                expiry: "12/39".to_string(),
                cvv: "123".to_string(),
                holder_name: "Asha Rao".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_active_subscription_short_circuits_before_initialize() {
        let api = Arc::new(MockBillingApi::new());
        let existing = MockBillingApi::subscription("Basic", 12);
        api.set_active(Some(existing.clone()));
        let controller = controller(&api);

        let outcome = controller.submit(card_purchase()).await.unwrap();

        assert_eq!(outcome, PaymentOutcome::Blocked(existing.clone()));
        assert_eq!(api.call_count("initialize_payment"), 0);
        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.payment_state, PaymentState::Idle);
        assert_eq!(snapshot.last_error, None);
        assert_eq!(snapshot.blocked_by, Some(existing));
    }

    #[tokio::test]
    async fn test_initialize_failure_ends_failed_with_message() {
        let api = Arc::new(MockBillingApi::new());
        api.fail("initialize_payment", "Network Error");
        let controller = controller(&api);

        let err = controller.submit(card_purchase()).await.unwrap_err();

        assert_eq!(err.to_string(), "Network Error");
        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.payment_state, PaymentState::Failed);
        assert_eq!(snapshot.last_error.as_deref(), Some("Network Error"));
        assert_eq!(snapshot.current_payment, None);
        assert_eq!(api.call_count("process_payment"), 0);
    }

    #[tokio::test]
    async fn test_success_updates_active_subscription_without_refetch() {
        let api = Arc::new(MockBillingApi::new());
        api.set_transaction_id("TXN123");
        let controller = controller(&api);

        let outcome = controller.submit(card_purchase()).await.unwrap();

        let PaymentOutcome::Completed { payment, subscription } = outcome else {
            panic!("expected a completed payment");
        };
        assert_eq!(payment.transaction_id.as_deref(), Some("TXN123"));
        let subscription = subscription.unwrap();
        assert_eq!(subscription.plan_type, "Premium");
        assert_eq!(subscription.status, SubscriptionStatus::Active);

        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.payment_state, PaymentState::Success);
        assert_eq!(snapshot.active_subscription, Some(subscription));
        assert_eq!(api.call_count("active_subscription"), 1);
    }

    #[tokio::test]
    async fn test_validation_errors_stop_before_network() {
        let api = Arc::new(MockBillingApi::new());
        let controller = controller(&api);
        let mut request = card_purchase();
        request.method = PaymentMethod::Emi(EmiDetails {
            bank: String::new(),
            tenure_months: 5,
        });

        let err = controller.submit(request).await.unwrap_err();

        let BillingError::Validation(fields) = err else {
            panic!("expected validation errors");
        };
        assert!(fields.contains("tenure"));
        assert!(api.calls().is_empty());
        assert_eq!(controller.store().payment_state(), PaymentState::Idle);
    }

    #[tokio::test]
    async fn test_declined_payment_fails_and_keeps_initialized_record() {
        let api = Arc::new(MockBillingApi::new());
        api.set_process_status(PaymentStatus::Failed);
        let controller = controller(&api);

        assert!(controller.submit(card_purchase()).await.is_err());

        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.payment_state, PaymentState::Failed);
        assert!(snapshot.current_payment.is_some());
        assert_eq!(snapshot.active_subscription, None);
    }

    #[tokio::test]
    async fn test_finished_attempt_needs_reset() {
        let api = Arc::new(MockBillingApi::new());
        api.fail("initialize_payment", "Network Error");
        let controller = controller(&api);
        assert!(controller.submit(card_purchase()).await.is_err());

        let err = controller.submit(card_purchase()).await.unwrap_err();
        assert!(matches!(err, BillingError::InvalidTransition { from: PaymentState::Failed, .. }));

        api.clear_failure("initialize_payment");
        controller.reset().unwrap();
        assert!(controller.submit(card_purchase()).await.is_ok());
    }

    #[tokio::test]
    async fn test_second_submit_while_processing_is_rejected() {
        let api = Arc::new(MockBillingApi::new());
        api.set_process_delay(Duration::from_millis(200));
        let controller = Arc::new(controller(&api));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit(card_purchase()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = controller.submit(card_purchase()).await.unwrap_err();
        assert!(matches!(err, BillingError::PaymentInFlight));
        assert!(first.await.unwrap().is_ok());
        assert_eq!(api.call_count("initialize_payment"), 1);
    }

    #[tokio::test]
    async fn test_guard_failure_is_fail_closed_by_default() {
        let api = Arc::new(MockBillingApi::new());
        api.fail("active_subscription", "Service unavailable");
        let controller = controller(&api);

        let err = controller.submit(card_purchase()).await.unwrap_err();

        assert_eq!(err.to_string(), "Service unavailable");
        assert_eq!(api.call_count("initialize_payment"), 0);
        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.payment_state, PaymentState::Idle);
        assert_eq!(snapshot.last_error.as_deref(), Some("Service unavailable"));
    }

    #[tokio::test]
    async fn test_fail_open_policy_proceeds() {
        let api = Arc::new(MockBillingApi::new());
        api.fail("active_subscription", "Service unavailable");
        let config = BillingConfig {
            guard_failure_policy: GuardFailurePolicy::FailOpen,
            ..BillingConfig::default()
        };
        let dyn_api: Arc<dyn BillingApi> = api.clone();
        let controller = PaymentController::new(dyn_api, BillingStore::new(), config);

        assert!(controller.submit(card_purchase()).await.is_ok());
    }

    #[tokio::test]
    async fn test_net_banking_needs_verification_then_pays() {
        let api = Arc::new(MockBillingApi::new());
        let controller = controller(&api);
        let mut method = PaymentMethod::NetBanking(NetBankingDetails {
            bank: "SBI".to_string(),
            username: "asha".to_string(),
            password: "secret1".to_string(),
            verified: None,
        });
        let mut request = card_purchase();
        request.method = method.clone();

        let err = controller.submit(request.clone()).await.unwrap_err();
        assert!(matches!(err, BillingError::Validation(ref f) if f.contains("verification")));

        let verifier = StaticVerifier::default();
        let token = controller.verify_method(&verifier, &mut method).await.unwrap();
        assert!(token.is_some());

        request.method = method;
        assert!(controller.submit(request.clone()).await.is_ok());
        let sent = api.last_request().unwrap();
        assert!(!sent.payment_details.to_string().contains("secret1"));
    }

    #[tokio::test]
    async fn test_card_needs_no_verification() {
        let api = Arc::new(MockBillingApi::new());
        let controller = controller(&api);
        let mut method = card_purchase().method;
        let verifier = StaticVerifier::default();

        assert_eq!(controller.verify_method(&verifier, &mut method).await.unwrap(), None);
        assert!(verifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_and_refresh() {
        let api = Arc::new(MockBillingApi::new());
        api.set_active(Some(MockBillingApi::subscription("Premium", 20)));
        let controller = controller(&api);

        let active = controller.refresh_active_subscription().await.unwrap().unwrap();
        assert_eq!(active.plan_type, "Premium");

        controller.cancel_subscription().await.unwrap();
        assert_eq!(
            controller.store().active_subscription().unwrap().status,
            SubscriptionStatus::Cancelled
        );
        assert_eq!(controller.store().payment_state(), PaymentState::Idle);
    }

    #[tokio::test]
    async fn test_verify_payment_reconciles_store() {
        let api = Arc::new(MockBillingApi::new());
        let controller = controller(&api);
        let now = Utc::now();
        api.set_verified(Payment {
            id: "pay_9".to_string(),
            transaction_id: Some("TXN9".to_string()),
            order_id: None,
            plan_type: "Basic".to_string(),
            billing_cycle: BillingCycle::Yearly,
            amount: Decimal::new(4999, 0),
            payment_method: crate::models::payment::PaymentMethodKind::Upi,
            status: PaymentStatus::Success,
            subscription_start_date: Some(now),
            subscription_end_date: Some(now + chrono::Duration::days(365)),
            features: None,
            created_at: Some(now),
        });

        let payment = controller.verify_payment("TXN9").await.unwrap();
        assert!(payment.is_success());
        assert_eq!(controller.store().active_subscription().unwrap().plan_type, "Basic");
        assert!(controller.verify_payment("TXN0").await.is_err());
    }
}
