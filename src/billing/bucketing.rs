//! Fixed-width revenue buckets ending at "now".
//!
//! Output is always `window` entries long, oldest period first, with
//! zero revenue for periods that saw no records. Reverse the vector for a
//! newest-first table.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::revenue::{RevenueBucket, RevenueRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    /// Dashboard windows: a week of days, half a year of months, four years.
    pub fn default_window(&self) -> usize {
        match self {
            Granularity::Day => 7,
            Granularity::Month => 6,
            Granularity::Year => 4,
        }
    }

    fn key(&self, date: NaiveDate) -> PeriodKey {
        match self {
            Granularity::Day => PeriodKey::Day(date),
            Granularity::Month => PeriodKey::Month(date.year(), date.month()),
            Granularity::Year => PeriodKey::Year(date.year()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PeriodKey {
    Day(NaiveDate),
    Month(i32, u32),
    Year(i32),
}

impl PeriodKey {
    fn label(&self) -> String {
        match self {
            PeriodKey::Day(date) => date.format("%B %-d").to_string(),
            PeriodKey::Month(year, month) => NaiveDate::from_ymd_opt(*year, *month, 1)
                .map(|d| d.format("%b %y").to_string())
                .unwrap_or_else(|| format!("{:02}/{:02}", month, year.rem_euclid(100))),
            PeriodKey::Year(year) => year.to_string(),
        }
    }
}

/// Period keys for the window, oldest first.
fn periods(granularity: Granularity, window: usize, today: NaiveDate) -> Vec<PeriodKey> {
    let mut keys: Vec<PeriodKey> = (0..window)
        .filter_map(|back| {
            let back_i64 = i64::try_from(back).ok()?;
            match granularity {
                Granularity::Day => today
                    .checked_sub_signed(Duration::days(back_i64))
                    .map(PeriodKey::Day),
                Granularity::Month => {
                    let first = today.with_day(1)?;
                    let back_u32 = u32::try_from(back).ok()?;
                    first
                        .checked_sub_months(Months::new(back_u32))
                        .map(|d| PeriodKey::Month(d.year(), d.month()))
                }
                Granularity::Year => {
                    let back_i32 = i32::try_from(back).ok()?;
                    Some(PeriodKey::Year(today.year() - back_i32))
                }
            }
        })
        .collect();
    keys.reverse();
    keys
}

/// Sums `records` into `window` periods of `granularity` ending at `now`.
///
/// Dates are read in the time zone of `now`. Records without a readable
/// date are ignored.
pub fn bucket<Tz: TimeZone>(
    records: &[RevenueRecord],
    granularity: Granularity,
    window: usize,
    now: &DateTime<Tz>,
) -> Vec<RevenueBucket> {
    let tz = now.timezone();
    let today = now.date_naive();

    let mut sums: HashMap<PeriodKey, Decimal> = HashMap::new();
    let mut skipped = 0usize;
    for record in records {
        match record.local_date(&tz) {
            Some(date) => {
                let sum = sums.entry(granularity.key(date)).or_default();
                *sum = add_amounts(*sum, record.amount);
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        log::debug!("Skipped {} revenue records with unreadable dates", skipped);
    }

    periods(granularity, window, today)
        .into_iter()
        .map(|key| RevenueBucket {
            label: key.label(),
            revenue: sums.get(&key).copied().unwrap_or(Decimal::ZERO),
        })
        .collect()
}

pub fn total(buckets: &[RevenueBucket]) -> Decimal {
    sum_amounts(buckets.iter().map(|b| b.revenue))
}

/// Adds two amounts, saturating at the `Decimal` bounds instead of panicking.
pub fn add_amounts(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or_else(|| {
        log::warn!("Revenue sum overflowed adding {} to {}, saturating", b, a);
        a.saturating_add(b)
    })
}

pub fn sum_amounts(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts.into_iter().fold(Decimal::ZERO, add_amounts)
}
