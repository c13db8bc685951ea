use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::billing::emi::{EmiQuote, EmiTenure};
use crate::models::common::{lenient_decimal, BillingCycle};
use crate::models::plan::{FeatureSet, PlanTier};

/// Proof from the payment gateway that bank or UPI credentials were accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedToken(pub String);

impl VerifiedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethodKind {
    #[serde(rename = "card")]
    Card,
    #[serde(rename = "netbanking", alias = "net_banking")]
    NetBanking,
    #[serde(rename = "upi")]
    Upi,
    #[serde(rename = "emi")]
    Emi,
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethodKind::Card => write!(f, "card"),
            PaymentMethodKind::NetBanking => write!(f, "netbanking"),
            PaymentMethodKind::Upi => write!(f, "upi"),
            PaymentMethodKind::Emi => write!(f, "emi"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct CardDetails {
    #[validate(custom = "crate::billing::validation::card_number_rule")]
    pub number: String,
    /// `YYYY-MM` or `MM/YY`.
    pub expiry: String,
    #[validate(custom = "crate::billing::validation::cvv_rule")]
    pub cvv: String,
    #[validate(custom = "crate::billing::validation::holder_name_rule")]
    pub holder_name: String,
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NetBankingDetails {
    #[validate(length(min = 1, message = "Please select your bank"))]
    pub bank: String,
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub verified: Option<VerifiedToken>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpiDetails {
    /// A raw UPI id that has to be verified before paying.
    Id {
        id: String,
        verified: Option<VerifiedToken>,
    },
    /// Payment handed off to a UPI app.
    App(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmiDetails {
    pub bank: String,
    /// Months; only 3, 6 and 12 are offered.
    pub tenure_months: u32,
}

impl EmiDetails {
    pub fn tenure(&self) -> Option<EmiTenure> {
        EmiTenure::from_months(self.tenure_months)
    }
}

/// Exactly one method per payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentMethod {
    Card(CardDetails),
    NetBanking(NetBankingDetails),
    Upi(UpiDetails),
    Emi(EmiDetails),
}

impl PaymentMethod {
    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            PaymentMethod::Card(_) => PaymentMethodKind::Card,
            PaymentMethod::NetBanking(_) => PaymentMethodKind::NetBanking,
            PaymentMethod::Upi(_) => PaymentMethodKind::Upi,
            PaymentMethod::Emi(_) => PaymentMethodKind::Emi,
        }
    }

    /// Details safe to send to the backend. CVV and bank passwords never leave the client.
    pub fn public_details(&self, amount: Decimal) -> Value {
        match self {
            PaymentMethod::Card(card) => {
                let digits: String = card.number.chars().filter(|c| !c.is_whitespace()).collect();
                let last4 = digits
                    .char_indices()
                    .rev()
                    .nth(3)
                    .map(|(i, _)| digits[i..].to_string())
                    .unwrap_or_default();
                json!({
                    "cardLast4": last4,
                    "cardholderName": card.holder_name.trim(),
                    "expiry": card.expiry.trim(),
                })
            }
            PaymentMethod::NetBanking(bank) => json!({
                "bank": bank.bank,
                "verificationToken": bank.verified.as_ref().map(VerifiedToken::as_str),
            }),
            PaymentMethod::Upi(UpiDetails::Id { id, verified }) => json!({
                "upiId": id.trim(),
                "verificationToken": verified.as_ref().map(VerifiedToken::as_str),
            }),
            PaymentMethod::Upi(UpiDetails::App(app)) => json!({ "upiApp": app }),
            PaymentMethod::Emi(emi) => {
                let quote = emi.tenure().map(|tenure| EmiQuote::compute(amount, tenure));
                json!({
                    "bank": emi.bank,
                    "tenure": emi.tenure_months,
                    "emiAmount": quote.as_ref().map(|q| q.monthly_instalment),
                    "totalAmount": quote.as_ref().map(|q| q.total_amount),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[serde(alias = "pending", alias = "initiated")]
    Initializing,
    Processing,
    #[serde(alias = "completed", alias = "succeeded")]
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    pub plan_type: String,
    pub billing_cycle: BillingCycle,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Decimal,
    pub payment_method: PaymentMethodKind,
    pub status: PaymentStatus,
    #[serde(default)]
    pub subscription_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub features: Option<FeatureSet>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_success(&self) -> bool {
        self.status == PaymentStatus::Success
    }
}

/// What the user asked to buy and how they want to pay.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRequest {
    pub plan_type: String,
    pub billing_cycle: BillingCycle,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

impl PurchaseRequest {
    pub fn for_tier(tier: &PlanTier, method: PaymentMethod) -> Self {
        Self {
            plan_type: tier.name.clone(),
            billing_cycle: tier.billing_cycle,
            amount: tier.price,
            method,
        }
    }

    pub fn to_initialize_body(&self) -> InitializePaymentRequest {
        InitializePaymentRequest {
            plan_type: self.plan_type.clone(),
            billing_cycle: self.billing_cycle,
            amount: self.amount,
            payment_method: self.method.kind(),
            payment_details: self.method.public_details(self.amount),
        }
    }
}

/// Body of `POST /api/payments/initialize`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    pub plan_type: String,
    pub billing_cycle: BillingCycle,
    pub amount: Decimal,
    pub payment_method: PaymentMethodKind,
    pub payment_details: Value,
}
