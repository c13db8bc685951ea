//! Dashboard data sources, loaded independently.
//!
//! Each source resolves on its own task and is published as soon as it
//! arrives; one failing source never hides the others.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::billing::analytics::{self, RevenueReport};
use crate::error::BillingError;
use crate::models::payment::Payment;
use crate::models::plan::PlatformSettings;
use crate::models::revenue::{RevenueRecord, UserGrowthPoint};
use crate::services::api::AnalyticsApi;
use crate::services::poller::{PollHandle, Poller};

pub const HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SourceState<T> {
    #[default]
    Pending,
    Ready(T),
    /// Fetch failed; rendered as empty.
    Degraded(String),
}

impl<T> SourceState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            SourceState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SourceState::Pending)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SourceState::Degraded(_))
    }
}

impl<T: Clone + Default> SourceState<T> {
    pub fn value_or_default(&self) -> T {
        self.ready().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub settings: SourceState<PlatformSettings>,
    pub membership_revenue: SourceState<Vec<RevenueRecord>>,
    pub consultation_revenue: SourceState<Vec<RevenueRecord>>,
    pub subscriptions: SourceState<Vec<RevenueRecord>>,
    /// Server-side revenue series. Displayed as is, not re-aggregated.
    pub revenue_analytics: SourceState<Vec<RevenueRecord>>,
    pub user_growth: SourceState<Vec<UserGrowthPoint>>,
    pub payment_history: SourceState<Vec<Payment>>,
}

impl DashboardSnapshot {
    pub fn is_settled(&self) -> bool {
        !(self.settings.is_pending()
            || self.membership_revenue.is_pending()
            || self.consultation_revenue.is_pending()
            || self.subscriptions.is_pending()
            || self.revenue_analytics.is_pending()
            || self.user_growth.is_pending()
            || self.payment_history.is_pending())
    }

    /// Membership revenue, or successful payments from history when that
    /// source is not available.
    pub fn membership_records(&self) -> Vec<RevenueRecord> {
        if let Some(records) = self.membership_revenue.ready() {
            return records.clone();
        }
        self.payment_history
            .ready()
            .map(|payments| payments.iter().filter_map(RevenueRecord::from_payment).collect())
            .unwrap_or_default()
    }

    pub fn report<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> RevenueReport {
        let rates = self
            .settings
            .ready()
            .map(PlatformSettings::commission_rates)
            .unwrap_or_default();
        analytics::aggregate(
            &self.membership_records(),
            &self.consultation_revenue.value_or_default(),
            &rates,
            now,
        )
    }
}

#[derive(Clone)]
pub struct DashboardFeed {
    api: Arc<dyn AnalyticsApi>,
    tx: Arc<watch::Sender<DashboardSnapshot>>,
}

impl DashboardFeed {
    pub fn new(api: Arc<dyn AnalyticsApi>) -> Self {
        let (tx, _rx) = watch::channel(DashboardSnapshot::default());
        Self {
            api,
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.tx.borrow().clone()
    }

    pub fn report<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> RevenueReport {
        self.tx.borrow().report(now)
    }

    fn spawn_source<T, F, Fut>(
        &self,
        name: &'static str,
        fetch: F,
        publish: fn(&mut DashboardSnapshot, SourceState<T>),
    ) -> JoinHandle<()>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn AnalyticsApi>) -> Fut,
        Fut: Future<Output = Result<T, BillingError>> + Send + 'static,
    {
        let pending = fetch(self.api.clone());
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let state = match pending.await {
                Ok(value) => SourceState::Ready(value),
                Err(err) => {
                    log::warn!("Dashboard source {} degraded: {}", name, err);
                    SourceState::Degraded(err.user_message())
                }
            };
            tx.send_modify(|snapshot| publish(snapshot, state));
        })
    }

    /// Starts every source fetch; results land in the snapshot as they resolve.
    pub fn load_all(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.spawn_source(
                "settings",
                |api| async move { api.settings().await },
                |s, v| s.settings = v,
            ),
            self.spawn_source(
                "membership_revenue",
                |api| async move { api.membership_revenue().await },
                |s, v| s.membership_revenue = v,
            ),
            self.spawn_source(
                "consultation_revenue",
                |api| async move { api.consultation_revenue().await },
                |s, v| s.consultation_revenue = v,
            ),
            self.spawn_source(
                "subscriptions",
                |api| async move { api.subscriptions().await },
                |s, v| s.subscriptions = v,
            ),
            self.spawn_source(
                "revenue_analytics",
                |api| async move { api.revenue_analytics().await },
                |s, v| s.revenue_analytics = v,
            ),
            self.spawn_source(
                "user_growth",
                |api| async move { api.user_growth().await },
                |s, v| s.user_growth = v,
            ),
            self.spawn_source(
                "payment_history",
                |api| async move { api.payment_history(HISTORY_LIMIT).await },
                |s, v| s.payment_history = v,
            ),
        ]
    }

    /// Loads every source and waits until all of them have settled.
    pub async fn refresh(&self) {
        for handle in self.load_all() {
            if let Err(e) = handle.await {
                log::error!("Dashboard source task failed: {}", e);
            }
        }
    }

    pub fn start_polling(&self, interval: Duration) -> PollHandle {
        let feed = self.clone();
        Poller::spawn("dashboard", interval, move || {
            let feed = feed.clone();
            async move { feed.refresh().await }
        })
    }
}
