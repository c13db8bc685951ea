//! Instalment pricing for EMI payments.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmiTenure {
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl EmiTenure {
    pub const OFFERED: [EmiTenure; 3] = [
        EmiTenure::ThreeMonths,
        EmiTenure::SixMonths,
        EmiTenure::TwelveMonths,
    ];

    pub fn from_months(months: u32) -> Option<Self> {
        match months {
            3 => Some(EmiTenure::ThreeMonths),
            6 => Some(EmiTenure::SixMonths),
            12 => Some(EmiTenure::TwelveMonths),
            _ => None,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            EmiTenure::ThreeMonths => 3,
            EmiTenure::SixMonths => 6,
            EmiTenure::TwelveMonths => 12,
        }
    }

    /// Annual interest in percent.
    pub fn annual_rate(&self) -> Decimal {
        match self {
            EmiTenure::ThreeMonths => Decimal::from(12),
            EmiTenure::SixMonths => Decimal::from(14),
            EmiTenure::TwelveMonths => Decimal::from(16),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiQuote {
    pub tenure_months: u32,
    pub annual_rate: Decimal,
    pub total_interest: Decimal,
    pub total_amount: Decimal,
    pub monthly_instalment: Decimal,
}

impl EmiQuote {
    /// Simple interest over the tenure, with interest and instalment
    /// rounded to whole currency units.
    pub fn compute(amount: Decimal, tenure: EmiTenure) -> Self {
        let months = Decimal::from(tenure.months());
        let rate = tenure.annual_rate();

        let total_interest = round_unit(amount * rate * months / Decimal::from(12 * 100));
        let total_amount = amount + total_interest;
        let monthly_instalment = round_unit(total_amount / months);

        Self {
            tenure_months: tenure.months(),
            annual_rate: rate,
            total_interest,
            total_amount,
            monthly_instalment,
        }
    }
}

fn round_unit(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
