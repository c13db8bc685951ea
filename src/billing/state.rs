//! Payment attempt state machine.

use serde::{Deserialize, Serialize};

use crate::error::BillingError;

/// Status enums that only move along declared edges.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    fn can_transition_to(&self, target: &Self) -> bool;

    fn valid_transitions(&self) -> Vec<Self>;

    fn transition_to(&self, target: Self) -> Result<Self, BillingError>;
}

/// Where the current payment attempt stands.
///
/// `Success` and `Failed` end an attempt; both go back to `Idle` only
/// through an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Idle,
    Initializing,
    Initialized,
    Processing,
    Success,
    Failed,
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentState::Success | PaymentState::Failed)
    }

    /// The submit action is disabled while a remote call is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            PaymentState::Initializing | PaymentState::Initialized | PaymentState::Processing
        )
    }
}

impl StateMachine for PaymentState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentState::*;
        matches!(
            (self, target),
            (Idle, Initializing)
                | (Initializing, Initialized)
                | (Initializing, Failed)
                | (Initialized, Processing)
                | (Initialized, Failed)
                | (Processing, Success)
                | (Processing, Failed)
                | (Success, Idle)
                | (Failed, Idle)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentState::*;
        match self {
            Idle => vec![Initializing],
            Initializing => vec![Initialized, Failed],
            Initialized => vec![Processing, Failed],
            Processing => vec![Success, Failed],
            Success => vec![Idle],
            Failed => vec![Idle],
        }
    }

    fn transition_to(&self, target: Self) -> Result<Self, BillingError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(BillingError::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }
}
