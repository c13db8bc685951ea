//! Subscription payments and revenue analytics for the wellness platform.
//!
//! [`PaymentController`] drives a purchase through validation, the
//! subscription guard and the remote initialize/process calls, keeping all
//! client state in a [`BillingStore`]. [`DashboardFeed`] loads the analytics
//! sources and [`billing::analytics::aggregate`] turns them into a
//! [`RevenueReport`].

pub mod billing;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use billing::analytics::RevenueReport;
pub use billing::controller::{PaymentController, PaymentOutcome};
pub use billing::guard::{GuardFailurePolicy, SubscriptionGuard};
pub use billing::state::{PaymentState, StateMachine};
pub use billing::store::{BillingSnapshot, BillingStore};
pub use config::{ApiConfig, BillingConfig, Config};
pub use error::{BillingError, FieldErrors};
pub use services::api::{AnalyticsApi, BillingApi, BillingClient};
pub use services::dashboard::{DashboardFeed, DashboardSnapshot, SourceState};
pub use services::poller::{PollHandle, Poller};
pub use services::verifier::{PaymentVerifier, VerificationRequest};
