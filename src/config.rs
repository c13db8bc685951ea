use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::billing::guard::GuardFailurePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub guard_failure_policy: GuardFailurePolicy,
    pub require_bank_verification: bool,
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            api: ApiConfig {
                base_url: env::var("BILLING_API_URL")?,
                auth_token: env::var("BILLING_API_TOKEN")
                    .ok()
                    .filter(|token| !token.trim().is_empty()),
                timeout_secs: parse_or("BILLING_HTTP_TIMEOUT_SECS", 30),
                retry_attempts: parse_or("BILLING_RETRY_ATTEMPTS", 3),
                retry_base_delay_ms: parse_or("BILLING_RETRY_BASE_DELAY_MS", 250),
            },

            billing: BillingConfig {
                guard_failure_policy: env::var("BILLING_GUARD_POLICY")
                    .ok()
                    .and_then(|s| GuardFailurePolicy::parse(&s))
                    .unwrap_or_default(),
                require_bank_verification: env::var("BILLING_REQUIRE_BANK_VERIFICATION")
                    .ok()
                    .and_then(|s| parse_bool(&s))
                    .unwrap_or(true),
                poll_interval_secs: parse_or("BILLING_POLL_INTERVAL_SECS", 30),
            },
        })
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl BillingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            auth_token: None,
            timeout_secs: 30,
            retry_attempts: 3,
            retry_base_delay_ms: 250,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            guard_failure_policy: GuardFailurePolicy::FailClosed,
            require_bank_verification: true,
            poll_interval_secs: 30,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
