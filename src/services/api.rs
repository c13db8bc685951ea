//! REST collaborators and their reqwest implementation.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::BillingError;
use crate::models::common::{ApiAck, ApiErrorBody, ListEnvelope};
use crate::models::payment::{InitializePaymentRequest, Payment};
use crate::models::plan::PlatformSettings;
use crate::models::revenue::{RevenueRecord, UserGrowthPoint};
use crate::models::subscription::{ActiveSubscriptionCheck, Subscription};
use crate::services::retry::RetryPolicy;

/// Payment and subscription endpoints, scoped to the authenticated actor.
#[async_trait]
pub trait BillingApi: Send + Sync {
    async fn active_subscription(&self) -> Result<ActiveSubscriptionCheck, BillingError>;

    async fn initialize_payment(
        &self,
        request: &InitializePaymentRequest,
    ) -> Result<Payment, BillingError>;

    async fn process_payment(&self, payment_id: &str) -> Result<Payment, BillingError>;

    async fn verify_payment(&self, transaction_id: &str) -> Result<Payment, BillingError>;

    async fn payment_history(&self, limit: u32) -> Result<Vec<Payment>, BillingError>;

    async fn cancel_subscription(&self) -> Result<(), BillingError>;

    /// Plan catalogue and commission rates. Needs no token.
    async fn settings(&self) -> Result<PlatformSettings, BillingError>;
}

/// Read-only dashboard sources.
#[async_trait]
pub trait AnalyticsApi: BillingApi {
    async fn membership_revenue(&self) -> Result<Vec<RevenueRecord>, BillingError>;

    async fn consultation_revenue(&self) -> Result<Vec<RevenueRecord>, BillingError>;

    async fn subscriptions(&self) -> Result<Vec<RevenueRecord>, BillingError>;

    async fn revenue_analytics(&self) -> Result<Vec<RevenueRecord>, BillingError>;

    async fn user_growth(&self) -> Result<Vec<UserGrowthPoint>, BillingError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveSubscriptionResponse {
    #[serde(default)]
    has_active_subscription: bool,
    #[serde(default)]
    subscription: Option<Subscription>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    payment: Payment,
}

#[derive(Debug, Deserialize)]
struct PaymentHistoryResponse {
    #[serde(default)]
    payments: Vec<Payment>,
}

#[derive(Clone)]
pub struct BillingClient {
    client: Client,
    config: ApiConfig,
    token: Arc<RwLock<Option<String>>>,
    retry: RetryPolicy,
}

impl BillingClient {
    pub fn new(config: ApiConfig) -> Result<Self, BillingError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_base_delay());
        let token = config.auth_token.clone();

        Ok(Self {
            client,
            config,
            token: Arc::new(RwLock::new(token)),
            retry,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Swaps the bearer token, e.g. after a re-login. `None` logs out.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    async fn bearer(&self) -> Result<String, BillingError> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| BillingError::Authentication("Please log in to continue".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, BillingError> {
        let token = self.bearer().await?;
        Ok(builder.header("Authorization", format!("Bearer {}", token)))
    }

    /// GET with bounded retries.
    async fn get<T: DeserializeOwned>(&self, path: &str, authenticated: bool) -> Result<T, BillingError> {
        self.retry
            .run(path, || async move {
                let mut builder = self.client.get(self.url(path)).header("Accept", "application/json");
                if authenticated {
                    builder = self.authorized(builder).await?;
                }
                log::debug!("GET {}", path);
                let response = builder.send().await?;
                read_response(path, response).await
            })
            .await
    }

    /// POST without retries; carries an idempotency key so the server can dedupe.
    async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<&Value>) -> Result<T, BillingError> {
        let idempotency_key = Uuid::new_v4().to_string();
        let mut builder = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .header("Idempotency-Key", &idempotency_key);
        builder = match body {
            Some(body) => builder.json(body),
            None => builder.json(&serde_json::json!({})),
        };
        let builder = self.authorized(builder).await?;

        log::info!("POST {} (idempotency key {})", path, idempotency_key);
        let response = builder.send().await?;
        read_response(path, response).await
    }

    /// `GET /api/<name>-list`.
    pub async fn resource_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, BillingError> {
        let path = format!("/api/{}-list", name);
        let list: ListEnvelope<T> = self.get(&path, true).await?;
        Ok(list.into_vec())
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, BillingError> {
        let list: ListEnvelope<T> = self.get(path, true).await?;
        Ok(list.into_vec())
    }
}

/// Turns a response into `T`, surfacing the server's own message on failure.
async fn read_response<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, BillingError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(ApiErrorBody::into_message);
        log::warn!("{} returned {}: {:?}", endpoint, status, message);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BillingError::Authentication(
                message.unwrap_or_else(|| "Session expired, please log in again".to_string()),
            ));
        }
        return Err(BillingError::Remote {
            message: message.unwrap_or_else(|| format!("Request failed with status {}", status.as_u16())),
            status: Some(status.as_u16()),
        });
    }

    let value: Value = if text.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&text).map_err(|e| BillingError::decode(endpoint, e.to_string()))?
    };
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Request was not successful")
            .to_string();
        return Err(BillingError::Remote {
            message,
            status: Some(status.as_u16()),
        });
    }

    serde_json::from_value(value).map_err(|e| BillingError::decode(endpoint, e.to_string()))
}

#[async_trait]
impl BillingApi for BillingClient {
    async fn active_subscription(&self) -> Result<ActiveSubscriptionCheck, BillingError> {
        let endpoint = "/api/payments/subscription/active";
        let response: ActiveSubscriptionResponse = self.get(endpoint, true).await?;

        match (response.has_active_subscription, response.subscription) {
            (true, None) => Err(BillingError::decode(
                endpoint,
                "hasActiveSubscription is true but no subscription was returned",
            )),
            (true, Some(subscription)) => Ok(ActiveSubscriptionCheck {
                has_active: true,
                subscription: Some(subscription),
            }),
            (false, _) => Ok(ActiveSubscriptionCheck::none()),
        }
    }

    async fn initialize_payment(
        &self,
        request: &InitializePaymentRequest,
    ) -> Result<Payment, BillingError> {
        let body = serde_json::to_value(request)
            .map_err(|e| BillingError::decode("/api/payments/initialize", e.to_string()))?;
        let response: PaymentResponse = self.post("/api/payments/initialize", Some(&body)).await?;
        log::info!("Initialized payment {}", response.payment.id);
        Ok(response.payment)
    }

    async fn process_payment(&self, payment_id: &str) -> Result<Payment, BillingError> {
        let path = format!("/api/payments/process/{}", payment_id);
        let response: PaymentResponse = self.post(&path, None).await?;
        log::info!(
            "Processed payment {} with status {:?}",
            response.payment.id,
            response.payment.status
        );
        Ok(response.payment)
    }

    async fn verify_payment(&self, transaction_id: &str) -> Result<Payment, BillingError> {
        let path = format!("/api/payments/verify/{}", transaction_id);
        let response: PaymentResponse = self.get(&path, true).await?;
        Ok(response.payment)
    }

    async fn payment_history(&self, limit: u32) -> Result<Vec<Payment>, BillingError> {
        let path = format!("/api/payments/history?limit={}", limit);
        let response: PaymentHistoryResponse = self.get(&path, true).await?;
        Ok(response.payments)
    }

    async fn cancel_subscription(&self) -> Result<(), BillingError> {
        let ack: ApiAck = self.post("/api/payments/subscription/cancel", None).await?;
        log::info!(
            "Subscription cancelled: {}",
            ack.message.as_deref().unwrap_or("no message")
        );
        Ok(())
    }

    async fn settings(&self) -> Result<PlatformSettings, BillingError> {
        let settings: PlatformSettings = self.get("/api/settings", false).await?;
        settings.validate()?;
        Ok(settings)
    }
}

#[async_trait]
impl AnalyticsApi for BillingClient {
    async fn membership_revenue(&self) -> Result<Vec<RevenueRecord>, BillingError> {
        self.get_list("/api/membership-revenue").await
    }

    async fn consultation_revenue(&self) -> Result<Vec<RevenueRecord>, BillingError> {
        self.get_list("/api/consultation-revenue").await
    }

    async fn subscriptions(&self) -> Result<Vec<RevenueRecord>, BillingError> {
        self.get_list("/api/subscriptions").await
    }

    async fn revenue_analytics(&self) -> Result<Vec<RevenueRecord>, BillingError> {
        self.get_list("/api/revenue-analytics").await
    }

    async fn user_growth(&self) -> Result<Vec<UserGrowthPoint>, BillingError> {
        self.get_list("/api/user-growth").await
    }
}
