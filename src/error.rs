use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::billing::state::PaymentState;

/// Field name to human readable message, reported all at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field`. The first message per field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(field, message);
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            if let Some(err) = errs.first() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                fields.add(field, message);
            }
        }
        fields
    }
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("authentication required: {0}")]
    Authentication(String),

    #[error("an active {plan_type} subscription already exists until {end_date}")]
    SubscriptionConflict {
        plan_type: String,
        end_date: DateTime<Utc>,
    },

    /// Server-side failure. `message` is the server's own text when it sent one.
    #[error("{message}")]
    Remote { message: String, status: Option<u16> },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("cannot move payment from {from:?} to {to:?}")]
    InvalidTransition { from: PaymentState, to: PaymentState },

    #[error("a payment attempt is already in progress")]
    PaymentInFlight,

    #[error("configuration error: {0}")]
    Config(String),
}

impl BillingError {
    pub fn remote(message: impl Into<String>) -> Self {
        BillingError::Remote {
            message: message.into(),
            status: None,
        }
    }

    pub fn decode(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        BillingError::Decode {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Transient failures that an idempotent read may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Transport(err) => !err.is_builder() && !err.is_decode(),
            BillingError::Remote {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Message suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            BillingError::Remote { message, .. } => message.clone(),
            BillingError::Transport(_) => "Unable to reach the payment service".to_string(),
            other => other.to_string(),
        }
    }
}
