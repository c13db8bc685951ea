use std::str::FromStr;

use rust_decimal::Decimal;

use crate::models::revenue::CommissionSplit;

/// Parses a configured percentage such as `"15%"` into the fraction `0.15`.
///
/// Missing, malformed or out-of-range (`< 0` or `> 100`) rates are zero.
pub fn parse_rate(raw: Option<&str>) -> Decimal {
    let Some(raw) = raw else {
        return Decimal::ZERO;
    };
    let number = raw.trim().trim_end_matches('%').trim();

    match Decimal::from_str(number) {
        Ok(percent) if percent >= Decimal::ZERO && percent <= Decimal::ONE_HUNDRED => {
            percent / Decimal::ONE_HUNDRED
        }
        _ => {
            log::warn!("Ignoring malformed commission rate {:?}", raw);
            Decimal::ZERO
        }
    }
}

/// Consultation model: the platform keeps `rate`, the dietitian the rest.
pub fn split(gross_revenue: Decimal, rate: Decimal) -> CommissionSplit {
    let platform_earnings = apply_rate(gross_revenue, rate);
    let dietitian_earnings = gross_revenue.checked_sub(platform_earnings).unwrap_or_else(|| {
        log::warn!("Dietitian earnings overflowed for gross {}", gross_revenue);
        gross_revenue.saturating_sub(platform_earnings)
    });
    CommissionSplit {
        gross_revenue,
        platform_earnings,
        dietitian_earnings,
    }
}

/// Subscription model: only the platform's share is computed.
pub fn platform_share(gross_revenue: Decimal, rate: Decimal) -> Decimal {
    apply_rate(gross_revenue, rate)
}

fn apply_rate(gross_revenue: Decimal, rate: Decimal) -> Decimal {
    gross_revenue.checked_mul(rate).unwrap_or_else(|| {
        log::warn!("Commission overflowed for gross {} at rate {}", gross_revenue, rate);
        gross_revenue.saturating_mul(rate)
    })
}
