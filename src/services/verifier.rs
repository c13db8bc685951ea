use async_trait::async_trait;

use crate::error::BillingError;
use crate::models::payment::VerifiedToken;

/// Credentials the gateway has to accept before a UPI or net-banking payment.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationRequest {
    Upi {
        id: String,
    },
    NetBanking {
        bank: String,
        username: String,
        password: String,
    },
}

impl VerificationRequest {
    /// Never includes the password.
    pub fn describe(&self) -> String {
        match self {
            VerificationRequest::Upi { id } => format!("UPI id {}", id),
            VerificationRequest::NetBanking { bank, username, .. } => {
                format!("{} net banking user {}", bank, username)
            }
        }
    }
}

/// External verification step (gateway redirect, OTP screen, ...).
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerifiedToken, BillingError>;
}
