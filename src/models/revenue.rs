use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::common::decimal_from_json;
use crate::models::payment::Payment;

/// A time-stamped amount as the analytics endpoints return it.
///
/// The timestamp is kept raw; records whose date cannot be read are
/// skipped by bucketing instead of failing the whole report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRevenueRecord")]
pub struct RevenueRecord {
    pub date: Option<String>,
    pub amount: Decimal,
}

/// Wire shape of a record. Backends name the same facts differently and
/// sometimes send several names at once.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRevenueRecord {
    #[serde(default)]
    date: Option<Value>,
    #[serde(default)]
    created_at: Option<Value>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    payment_date: Option<Value>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    revenue: Option<Value>,
}

impl From<RawRevenueRecord> for RevenueRecord {
    fn from(raw: RawRevenueRecord) -> Self {
        let date = [raw.date, raw.created_at, raw.timestamp, raw.payment_date]
            .into_iter()
            .flatten()
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            });
        let amount = [raw.amount, raw.revenue]
            .iter()
            .flatten()
            .find_map(decimal_from_json)
            .unwrap_or(Decimal::ZERO);

        Self { date, amount }
    }
}

impl RevenueRecord {
    pub fn new(date: impl Into<String>, amount: Decimal) -> Self {
        Self {
            date: Some(date.into()),
            amount,
        }
    }

    /// Calendar date of the record in the zone of `tz`.
    ///
    /// RFC 3339 timestamps are converted; bare dates and offset-less
    /// date-times are taken as already local.
    pub fn local_date<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDate> {
        let raw = self.date.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(tz).date_naive());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.date());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }

    /// Successful payments count as membership revenue on their creation date.
    pub fn from_payment(payment: &Payment) -> Option<Self> {
        if !payment.is_success() {
            return None;
        }
        let at = payment.created_at.or(payment.subscription_start_date)?;
        Some(Self::new(at.to_rfc3339(), payment.amount))
    }
}

/// One period of a bucketed series. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueBucket {
    pub label: String,
    pub revenue: Decimal,
}

/// Consultation-model split: `platform_earnings + dietitian_earnings == gross_revenue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSplit {
    pub gross_revenue: Decimal,
    pub platform_earnings: Decimal,
    pub dietitian_earnings: Decimal,
}

/// A bucket after commission has been applied.
///
/// `provider_earnings` is only set for consultation revenue; membership
/// revenue keeps the remainder implicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsBucket {
    pub label: String,
    pub revenue: Decimal,
    pub platform_earnings: Decimal,
    pub provider_earnings: Option<Decimal>,
}

/// One point of the user growth series. Only displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUserGrowthPoint")]
pub struct UserGrowthPoint {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct RawUserGrowthPoint {
    #[serde(default)]
    label: Option<Value>,
    #[serde(default)]
    month: Option<Value>,
    #[serde(default)]
    date: Option<Value>,
    #[serde(default)]
    count: Option<Value>,
    #[serde(default)]
    users: Option<Value>,
    #[serde(default)]
    total: Option<Value>,
}

impl From<RawUserGrowthPoint> for UserGrowthPoint {
    fn from(raw: RawUserGrowthPoint) -> Self {
        let label = [raw.label, raw.month, raw.date]
            .into_iter()
            .flatten()
            .find_map(|value| match value {
                Value::String(s) => Some(s),
                _ => None,
            })
            .unwrap_or_default();
        let count = [raw.count, raw.users, raw.total]
            .iter()
            .flatten()
            .find_map(Value::as_u64)
            .unwrap_or(0);

        Self { label, count }
    }
}
