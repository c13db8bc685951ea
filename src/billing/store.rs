//! Single owner of payment and subscription client state.
//!
//! Every mutation goes through [`BillingStore`]; views subscribe to a
//! `watch` channel and re-render on change.

use std::sync::Arc;

use tokio::sync::watch;

use crate::billing::state::{PaymentState, StateMachine};
use crate::error::BillingError;
use crate::models::payment::Payment;
use crate::models::subscription::Subscription;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillingSnapshot {
    pub payment_state: PaymentState,
    /// Last payment the server returned for the current attempt.
    pub current_payment: Option<Payment>,
    pub active_subscription: Option<Subscription>,
    /// Shown to the user as-is.
    pub last_error: Option<String>,
    /// Set when the guard stopped a purchase because of this subscription.
    pub blocked_by: Option<Subscription>,
}

#[derive(Clone)]
pub struct BillingStore {
    tx: Arc<watch::Sender<BillingSnapshot>>,
}

impl BillingStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(BillingSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> BillingSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BillingSnapshot> {
        self.tx.subscribe()
    }

    pub fn payment_state(&self) -> PaymentState {
        self.tx.borrow().payment_state
    }

    pub fn active_subscription(&self) -> Option<Subscription> {
        self.tx.borrow().active_subscription.clone()
    }

    pub fn current_payment(&self) -> Option<Payment> {
        self.tx.borrow().current_payment.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.tx.borrow().last_error.clone()
    }

    /// Validated state change; `apply` runs only if the edge exists.
    fn transition<F>(&self, to: PaymentState, apply: F) -> Result<(), BillingError>
    where
        F: FnOnce(&mut BillingSnapshot),
    {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|snapshot| {
            match snapshot.payment_state.transition_to(to) {
                Ok(next) => {
                    log::debug!("Payment state {:?} -> {:?}", snapshot.payment_state, next);
                    snapshot.payment_state = next;
                    apply(snapshot);
                    true
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });
        outcome
    }

    pub(crate) fn begin_attempt(&self) -> Result<(), BillingError> {
        self.transition(PaymentState::Initializing, |s| {
            s.last_error = None;
            s.blocked_by = None;
        })
    }

    pub(crate) fn record_initialized(&self, payment: Payment) -> Result<(), BillingError> {
        self.transition(PaymentState::Initialized, |s| {
            s.current_payment = Some(payment);
        })
    }

    pub(crate) fn begin_processing(&self) -> Result<(), BillingError> {
        self.transition(PaymentState::Processing, |_| {})
    }

    /// Optimistically installs the new subscription so no re-fetch is needed.
    pub(crate) fn record_success(
        &self,
        payment: Payment,
        subscription: Option<Subscription>,
    ) -> Result<(), BillingError> {
        self.transition(PaymentState::Success, |s| {
            s.current_payment = Some(payment);
            if subscription.is_some() {
                s.active_subscription = subscription;
            }
        })
    }

    /// Leaves `current_payment` as it was.
    pub(crate) fn record_failure(&self, message: impl Into<String>) -> Result<(), BillingError> {
        let message = message.into();
        self.transition(PaymentState::Failed, |s| {
            s.last_error = Some(message);
        })
    }

    /// Error that did not move the state machine (guard check, cancellation).
    pub(crate) fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|s| s.last_error = Some(message));
    }

    pub(crate) fn record_blocked(&self, subscription: Subscription) {
        self.tx.send_modify(|s| {
            s.active_subscription = Some(subscription.clone());
            s.blocked_by = Some(subscription);
        });
    }

    /// Server view of the active subscription replaces the local one.
    pub(crate) fn reconcile_subscription(&self, subscription: Option<Subscription>) {
        self.tx.send_if_modified(|s| {
            if s.active_subscription == subscription {
                return false;
            }
            if s.active_subscription.is_some() {
                log::info!("Local active subscription replaced by server record");
            }
            s.active_subscription = subscription;
            true
        });
    }

    pub(crate) fn mark_cancelled(&self) {
        self.tx.send_if_modified(|s| match s.active_subscription.as_mut() {
            Some(sub) => {
                sub.cancel();
                true
            }
            None => false,
        });
    }

    /// "Try again": back to `Idle` from a finished attempt. No-op when idle.
    pub fn reset(&self) -> Result<(), BillingError> {
        if self.payment_state() == PaymentState::Idle {
            self.tx.send_modify(|s| {
                s.last_error = None;
                s.blocked_by = None;
            });
            return Ok(());
        }
        self.transition(PaymentState::Idle, |s| {
            s.last_error = None;
            s.blocked_by = None;
        })
    }
}

impl Default for BillingStore {
    fn default() -> Self {
        Self::new()
    }
}
