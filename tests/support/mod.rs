#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use wellness_billing::billing::store::BillingStore;
use wellness_billing::config::{ApiConfig, BillingConfig};
use wellness_billing::models::common::BillingCycle;
use wellness_billing::models::payment::{CardDetails, PaymentMethod, PurchaseRequest};
use wellness_billing::services::api::{BillingApi, BillingClient};
use wellness_billing::services::retry::RetryPolicy;
use wellness_billing::PaymentController;
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn client(server: &MockServer) -> BillingClient {
    BillingClient::new(ApiConfig::new(server.uri()).with_token(TOKEN))
        .expect("client builds")
        .with_retry(RetryPolicy::new(3, std::time::Duration::from_millis(1)))
}

pub fn controller(server: &MockServer) -> PaymentController {
    let api: Arc<dyn BillingApi> = Arc::new(client(server));
    PaymentController::new(api, BillingStore::new(), BillingConfig::default())
}

pub fn card_purchase() -> PurchaseRequest {
    PurchaseRequest {
        plan_type: "Premium".to_string(),
        billing_cycle: BillingCycle::Monthly,
        amount: Decimal::new(899, 0),
        method: PaymentMethod::Card(CardDetails {
            number: "4111 1111 1111 1111".to_string(),
            expiry: "12/39".to_string(),
            cvv: "123".to_string(),
            holder_name: "Asha Rao".to_string(),
        }),
    }
}

pub fn subscription_json(plan: &str, days_remaining: i64) -> Value {
    let now = Utc::now();
    json!({
        "planType": plan,
        "billingCycle": "monthly",
        "startDate": (now - Duration::days(5)).to_rfc3339(),
        "endDate": (now + Duration::days(days_remaining)).to_rfc3339(),
        "features": { "consultationsPerMonth": 4, "chatbotQueriesPerDay": -1 },
        "status": "active"
    })
}

pub fn payment_json(id: &str, status: &str, transaction_id: Option<&str>) -> Value {
    let now = Utc::now();
    let mut payment = json!({
        "_id": id,
        "planType": "Premium",
        "billingCycle": "monthly",
        "amount": 899,
        "paymentMethod": "card",
        "status": status,
        "createdAt": now.to_rfc3339()
    });
    if let Some(txn) = transaction_id {
        payment["transactionId"] = json!(txn);
        payment["subscriptionStartDate"] = json!(now.to_rfc3339());
        payment["subscriptionEndDate"] = json!((now + Duration::days(30)).to_rfc3339());
        payment["features"] = json!({ "consultationsPerMonth": -1 });
    }
    payment
}
