use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::billing::commission::parse_rate;
use crate::error::BillingError;
use crate::models::common::{lenient_decimal, BillingCycle};

/// Per-plan usage limit. `-1` on the wire means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureCap {
    Limited(u32),
    Unlimited,
}

impl FeatureCap {
    pub const UNLIMITED_SENTINEL: i64 = -1;

    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            Self::UNLIMITED_SENTINEL => Some(FeatureCap::Unlimited),
            n if n >= 0 => u32::try_from(n).ok().map(FeatureCap::Limited),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            FeatureCap::Limited(n) => i64::from(*n),
            FeatureCap::Unlimited => Self::UNLIMITED_SENTINEL,
        }
    }

    pub fn allows(&self, used: u32) -> bool {
        match self {
            FeatureCap::Limited(limit) => used < *limit,
            FeatureCap::Unlimited => true,
        }
    }

    /// `None` when unlimited.
    pub fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            FeatureCap::Limited(limit) => Some(limit.saturating_sub(used)),
            FeatureCap::Unlimited => None,
        }
    }
}

impl Default for FeatureCap {
    fn default() -> Self {
        FeatureCap::Limited(0)
    }
}

impl Serialize for FeatureCap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_raw())
    }
}

impl<'de> Deserialize<'de> for FeatureCap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        FeatureCap::from_raw(raw).ok_or_else(|| {
            de::Error::custom(format!(
                "feature cap {} is negative; only -1 (unlimited) is allowed",
                raw
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Consultations,
    AdvanceBookingDays,
    MealPlans,
    ProgressPlans,
    ChatbotQueries,
    BlogPosts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureSet {
    /// Bookings per month.
    pub consultations_per_month: FeatureCap,
    pub advance_booking_days: FeatureCap,
    pub meal_plans_per_month: FeatureCap,
    pub progress_plans_per_month: FeatureCap,
    pub chatbot_queries_per_day: FeatureCap,
    pub blog_posts_per_month: FeatureCap,
    pub support_tier: Option<String>,
}

impl FeatureSet {
    pub fn cap(&self, feature: Feature) -> FeatureCap {
        match feature {
            Feature::Consultations => self.consultations_per_month,
            Feature::AdvanceBookingDays => self.advance_booking_days,
            Feature::MealPlans => self.meal_plans_per_month,
            Feature::ProgressPlans => self.progress_plans_per_month,
            Feature::ChatbotQueries => self.chatbot_queries_per_day,
            Feature::BlogPosts => self.blog_posts_per_month,
        }
    }

    pub fn allows(&self, feature: Feature, used: u32) -> bool {
        self.cap(feature).allows(used)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTier {
    pub name: String,
    #[serde(deserialize_with = "lenient_decimal")]
    pub price: Decimal,
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub features: FeatureSet,
}

impl PlanTier {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.price <= Decimal::ZERO {
            return Err(BillingError::decode(
                "/api/settings",
                format!("plan {} has non-positive price {}", self.name, self.price),
            ));
        }
        Ok(())
    }
}

/// Parsed commission percentages as fractions (15% -> 0.15).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommissionRates {
    pub consultation: Decimal,
    pub platform_share: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSettings {
    #[serde(default)]
    pub monthly_tiers: Vec<PlanTier>,
    #[serde(default)]
    pub yearly_tiers: Vec<PlanTier>,
    #[serde(default)]
    pub consultation_commission: Option<String>,
    #[serde(default)]
    pub platform_share: Option<String>,
}

impl PlatformSettings {
    pub fn validate(&self) -> Result<(), BillingError> {
        self.monthly_tiers
            .iter()
            .chain(self.yearly_tiers.iter())
            .try_for_each(PlanTier::validate)
    }

    pub fn tiers(&self, cycle: BillingCycle) -> &[PlanTier] {
        match cycle {
            BillingCycle::Monthly => &self.monthly_tiers,
            BillingCycle::Yearly => &self.yearly_tiers,
        }
    }

    pub fn find_tier(&self, name: &str, cycle: BillingCycle) -> Option<&PlanTier> {
        self.tiers(cycle)
            .iter()
            .find(|tier| tier.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn commission_rates(&self) -> CommissionRates {
        CommissionRates {
            consultation: parse_rate(self.consultation_commission.as_deref()),
            platform_share: parse_rate(self.platform_share.as_deref()),
        }
    }
}
