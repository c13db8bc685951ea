pub mod analytics;
pub mod bucketing;
pub mod commission;
pub mod controller;
pub mod emi;
pub mod guard;
pub mod state;
pub mod store;
pub mod validation;
