pub mod api;
pub mod dashboard;
#[cfg(test)]
pub(crate) mod mock;
pub mod poller;
pub mod retry;
pub mod verifier;
