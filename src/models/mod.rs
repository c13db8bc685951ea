pub mod common;
pub mod payment;
pub mod plan;
pub mod revenue;
pub mod subscription;
