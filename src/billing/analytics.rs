//! Revenue analytics aggregator.
//!
//! Buckets each revenue source per granularity and applies the commission
//! rate of that source to every bucket sum. Missing inputs are empty
//! slices, never errors.

use chrono::{DateTime, TimeZone};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::billing::bucketing::{self, add_amounts, sum_amounts, Granularity};
use crate::billing::commission;
use crate::models::plan::CommissionRates;
use crate::models::revenue::{EarningsBucket, RevenueBucket, RevenueRecord};

pub const BREAKDOWN_MONTHS: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GranularSeries {
    pub daily: Vec<EarningsBucket>,
    pub monthly: Vec<EarningsBucket>,
    pub yearly: Vec<EarningsBucket>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedTotals {
    pub consultation_revenue: Decimal,
    pub consultation_commission: Decimal,
    pub dietitian_earnings: Decimal,
    pub membership_revenue: Decimal,
    pub membership_share: Decimal,
    pub total_revenue: Decimal,
    pub total_platform_earnings: Decimal,
}

/// One month of the trailing twelve, raw and post-commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBreakdown {
    pub label: String,
    pub consultation_revenue: Decimal,
    pub consultation_commission: Decimal,
    pub membership_revenue: Decimal,
    pub membership_share: Decimal,
    pub total_revenue: Decimal,
    pub total_platform_earnings: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub by_consultation: GranularSeries,
    pub by_membership: GranularSeries,
    pub combined_totals: CombinedTotals,
    pub monthly_breakdown: Vec<MonthlyBreakdown>,
}

#[derive(Clone, Copy)]
enum Source {
    /// Commission split with the dietitian.
    Consultation,
    /// Platform share only.
    Membership,
}

impl Source {
    fn earnings(self, bucket: RevenueBucket, rates: &CommissionRates) -> EarningsBucket {
        match self {
            Source::Consultation => {
                let split = commission::split(bucket.revenue, rates.consultation);
                EarningsBucket {
                    label: bucket.label,
                    revenue: split.gross_revenue,
                    platform_earnings: split.platform_earnings,
                    provider_earnings: Some(split.dietitian_earnings),
                }
            }
            Source::Membership => EarningsBucket {
                label: bucket.label,
                revenue: bucket.revenue,
                platform_earnings: commission::platform_share(bucket.revenue, rates.platform_share),
                provider_earnings: None,
            },
        }
    }
}

fn series<Tz: TimeZone>(
    records: &[RevenueRecord],
    source: Source,
    rates: &CommissionRates,
    now: &DateTime<Tz>,
) -> GranularSeries {
    let run = |granularity: Granularity| -> Vec<EarningsBucket> {
        bucketing::bucket(records, granularity, granularity.default_window(), now)
            .into_iter()
            .map(|bucket| source.earnings(bucket, rates))
            .collect()
    };

    GranularSeries {
        daily: run(Granularity::Day),
        monthly: run(Granularity::Month),
        yearly: run(Granularity::Year),
    }
}

/// Sum of every record whose date can be read, regardless of window.
fn readable_total<Tz: TimeZone>(records: &[RevenueRecord], tz: &Tz) -> Decimal {
    sum_amounts(
        records
            .iter()
            .filter(|record| record.local_date(tz).is_some())
            .map(|record| record.amount),
    )
}

pub fn aggregate<Tz: TimeZone>(
    subscription_records: &[RevenueRecord],
    consultation_records: &[RevenueRecord],
    rates: &CommissionRates,
    now: &DateTime<Tz>,
) -> RevenueReport {
    let tz = now.timezone();

    let consultation = commission::split(readable_total(consultation_records, &tz), rates.consultation);
    let membership_revenue = readable_total(subscription_records, &tz);
    let membership_share = commission::platform_share(membership_revenue, rates.platform_share);

    let combined_totals = CombinedTotals {
        consultation_revenue: consultation.gross_revenue,
        consultation_commission: consultation.platform_earnings,
        dietitian_earnings: consultation.dietitian_earnings,
        membership_revenue,
        membership_share,
        total_revenue: add_amounts(consultation.gross_revenue, membership_revenue),
        total_platform_earnings: add_amounts(consultation.platform_earnings, membership_share),
    };

    let consultation_months =
        bucketing::bucket(consultation_records, Granularity::Month, BREAKDOWN_MONTHS, now);
    let membership_months =
        bucketing::bucket(subscription_records, Granularity::Month, BREAKDOWN_MONTHS, now);

    let monthly_breakdown = consultation_months
        .into_iter()
        .zip(membership_months)
        .map(|(consult, member)| {
            let consultation_commission =
                commission::split(consult.revenue, rates.consultation).platform_earnings;
            let share = commission::platform_share(member.revenue, rates.platform_share);
            MonthlyBreakdown {
                label: consult.label,
                consultation_revenue: consult.revenue,
                consultation_commission,
                membership_revenue: member.revenue,
                membership_share: share,
                total_revenue: add_amounts(consult.revenue, member.revenue),
                total_platform_earnings: add_amounts(consultation_commission, share),
            }
        })
        .collect();

    log::debug!(
        "Aggregated {} consultation and {} membership records",
        consultation_records.len(),
        subscription_records.len()
    );

    RevenueReport {
        by_consultation: series(consultation_records, Source::Consultation, rates, now),
        by_membership: series(subscription_records, Source::Membership, rates, now),
        combined_totals,
        monthly_breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rates() -> CommissionRates {
        CommissionRates {
            consultation: Decimal::new(15, 2),
            platform_share: Decimal::new(20, 2),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_consultations_still_report() {
        let subscriptions = vec![RevenueRecord::new("2026-10-18T09:00:00Z", Decimal::new(1000, 0))];
        let report = aggregate(&subscriptions, &[], &rates(), &now());

        assert_eq!(report.by_consultation.daily.len(), 7);
        assert!(report.by_consultation.daily.iter().all(|b| b.revenue.is_zero()));
        assert_eq!(report.combined_totals.consultation_revenue, Decimal::ZERO);

        let today = report.by_membership.daily.last().unwrap();
        assert_eq!(today.label, "October 18");
        assert_eq!(today.revenue, Decimal::new(1000, 0));
        assert_eq!(today.platform_earnings, Decimal::new(200, 0));
        assert_eq!(today.provider_earnings, None);

        assert_eq!(report.combined_totals.membership_revenue, Decimal::new(1000, 0));
        assert_eq!(report.combined_totals.total_revenue, Decimal::new(1000, 0));
        assert_eq!(report.combined_totals.total_platform_earnings, Decimal::new(200, 0));
    }

    #[test]
    fn test_consultation_split_sums_to_gross() {
        let consultations = vec![
            RevenueRecord::new("2026-10-17", Decimal::new(1200, 0)),
            RevenueRecord::new("2026-09-02", Decimal::new(333, 0)),
        ];
        let report = aggregate(&[], &consultations, &rates(), &now());

        for bucket in report.by_consultation.monthly.iter() {
            let provider = bucket.provider_earnings.unwrap();
            assert_eq!(bucket.platform_earnings + provider, bucket.revenue);
        }
        let totals = report.combined_totals;
        assert_eq!(totals.consultation_revenue, Decimal::new(1533, 0));
        assert_eq!(
            totals.consultation_commission + totals.dietitian_earnings,
            totals.consultation_revenue
        );
    }

    #[test]
    fn test_monthly_breakdown_covers_trailing_year() {
        let consultations = vec![RevenueRecord::new("2026-10-01", Decimal::new(100, 0))];
        let subscriptions = vec![
            RevenueRecord::new("2026-10-05", Decimal::new(500, 0)),
            RevenueRecord::new("2025-11-05", Decimal::new(50, 0)),
            RevenueRecord::new("2025-10-05", Decimal::new(7, 0)),
        ];
        let report = aggregate(&subscriptions, &consultations, &rates(), &now());

        assert_eq!(report.monthly_breakdown.len(), BREAKDOWN_MONTHS);
        let first = &report.monthly_breakdown[0];
        assert_eq!(first.label, "Nov 25");
        assert_eq!(first.membership_revenue, Decimal::new(50, 0));

        let last = report.monthly_breakdown.last().unwrap();
        assert_eq!(last.label, "Oct 26");
        assert_eq!(last.total_revenue, Decimal::new(600, 0));
        assert_eq!(last.consultation_commission, Decimal::new(15, 0));
        assert_eq!(last.membership_share, Decimal::new(100, 0));
        assert_eq!(last.total_platform_earnings, Decimal::new(115, 0));

        // Outside the window but still part of the all-time totals.
        assert_eq!(report.combined_totals.membership_revenue, Decimal::new(557, 0));
    }

    #[test]
    fn test_unreadable_records_are_ignored() {
        let subscriptions = vec![
            RevenueRecord::new("not a date", Decimal::new(999, 0)),
            RevenueRecord::new("2026-10-18", Decimal::new(10, 0)),
        ];
        let report = aggregate(&subscriptions, &[], &CommissionRates::default(), &now());
        assert_eq!(report.combined_totals.membership_revenue, Decimal::new(10, 0));
        assert_eq!(report.combined_totals.total_platform_earnings, Decimal::ZERO);
    }

    #[test]
    fn test_huge_amounts_saturate_instead_of_panicking() {
        let subscriptions = vec![
            RevenueRecord::new("2026-10-18", Decimal::MAX),
            RevenueRecord::new("2026-10-18", Decimal::MAX),
        ];
        let consultations = vec![RevenueRecord::new("2026-10-18", Decimal::MAX)];
        let report = aggregate(&subscriptions, &consultations, &rates(), &now());

        let totals = report.combined_totals;
        assert_eq!(totals.membership_revenue, Decimal::MAX);
        assert_eq!(totals.total_revenue, Decimal::MAX);
        assert_eq!(report.by_membership.daily.last().unwrap().revenue, Decimal::MAX);
        assert_eq!(report.monthly_breakdown.last().unwrap().total_revenue, Decimal::MAX);
    }
}
