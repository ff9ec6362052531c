//! Minute-tick maintenance coordinator.
//!
//! One task wakes every minute and dispatches: hourly rollup
//! materialization, nightly retention purge, weekly and monthly recap
//! emails, the per-minute fleet convergence pass, and the periodic cache
//! refreshes.

use std::sync::Arc;

use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveTime, TimeZone,
    Timelike, Utc, Weekday,
};
use sqlx::PgPool;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::catalog::ClassCatalog;
use crate::directory::{ActiveViolations, CameraDirectory};
use crate::error::Result;
use crate::notify::service::{MONTHLY_RECAP_TEMPLATE_KEY, WEEKLY_RECAP_TEMPLATE_KEY};
use crate::notify::NotificationService;
use crate::repo;
use crate::storage::EvidenceStore;
use crate::supervise::FleetSupervisor;

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub retention_days: u32,
    pub recap_hour: u32,
    pub recap_minute: u32,
    pub directory_refresh_minutes: u32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            retention_days: 32,
            recap_hour: 7,
            recap_minute: 30,
            directory_refresh_minutes: 10,
        }
    }
}

/// What one tick must do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickActions {
    pub rollup: bool,
    pub purge: bool,
    pub weekly_recap: bool,
    pub monthly_recap: bool,
    pub refresh_caches: bool,
}

/// Decide the actions for a local wall-clock minute. Monthly takes
/// precedence over weekly when the 1st falls on a Monday.
pub fn actions_for(now: DateTime<FixedOffset>, config: &MaintenanceConfig) -> TickActions {
    let at_recap_time = now.hour() == config.recap_hour && now.minute() == config.recap_minute;
    let monthly = at_recap_time && now.day() == 1;
    let weekly = at_recap_time && now.weekday() == Weekday::Mon && now.day() != 1;

    TickActions {
        rollup: now.minute() == 0,
        purge: now.hour() == 0 && now.minute() == 5,
        weekly_recap: weekly,
        monthly_recap: monthly,
        refresh_caches: now.minute() % config.directory_refresh_minutes.max(1) == 0,
    }
}

fn at_local_midnight(tz: FixedOffset, date: NaiveDate) -> DateTime<FixedOffset> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&(naive - ChronoDuration::seconds(tz.local_minus_utc() as i64))))
}

/// `[last Monday 00:00, this Monday 00:00)` for a Monday-morning `now`.
pub fn weekly_window(now: DateTime<FixedOffset>) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let days_from_monday = now.weekday().num_days_from_monday() as i64;
    let this_monday = now.date_naive() - ChronoDuration::days(days_from_monday);
    let last_monday = this_monday - ChronoDuration::days(7);
    (
        at_local_midnight(*now.offset(), last_monday),
        at_local_midnight(*now.offset(), this_monday),
    )
}

/// `[first of previous month 00:00, first of this month 00:00)`.
pub fn monthly_window(now: DateTime<FixedOffset>) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let first_of_this = now
        .date_naive()
        .with_day(1)
        .unwrap_or_else(|| now.date_naive());
    let first_of_previous = {
        let (year, month) = if first_of_this.month() == 1 {
            (first_of_this.year() - 1, 12)
        } else {
            (first_of_this.year(), first_of_this.month() - 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(first_of_this)
    };
    (
        at_local_midnight(*now.offset(), first_of_previous),
        at_local_midnight(*now.offset(), first_of_this),
    )
}

/// Local-day bounds for the rollup job.
pub fn day_window(
    now: DateTime<FixedOffset>,
) -> (NaiveDate, DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let date = now.date_naive();
    let start = at_local_midnight(*now.offset(), date);
    let end = start + ChronoDuration::days(1);
    (date, start, end)
}

pub struct Maintenance {
    pool: PgPool,
    store: Arc<dyn EvidenceStore>,
    notifier: Option<Arc<NotificationService>>,
    fleet: Arc<FleetSupervisor>,
    directory: Arc<CameraDirectory>,
    active: Arc<ActiveViolations>,
    catalog: Arc<ClassCatalog>,
    tz: FixedOffset,
    config: MaintenanceConfig,
}

impl std::fmt::Debug for Maintenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Maintenance").finish_non_exhaustive()
    }
}

impl Maintenance {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        store: Arc<dyn EvidenceStore>,
        notifier: Option<Arc<NotificationService>>,
        fleet: Arc<FleetSupervisor>,
        directory: Arc<CameraDirectory>,
        active: Arc<ActiveViolations>,
        catalog: Arc<ClassCatalog>,
        tz: FixedOffset,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            pool,
            store,
            notifier,
            fleet,
            directory,
            active,
            catalog,
            tz,
            config,
        }
    }

    /// Run forever; each action failure is logged and the loop continues.
    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_minute: Option<DateTime<FixedOffset>> = None;

        info!("Maintenance scheduler started");
        loop {
            ticker.tick().await;
            let now = Utc::now().with_timezone(&self.tz);

            // Never dispatch the same wall-clock minute twice.
            let minute_key = now
                .with_second(0)
                .and_then(|n| n.with_nanosecond(0))
                .unwrap_or(now);
            if last_minute == Some(minute_key) {
                continue;
            }
            last_minute = Some(minute_key);

            let actions = actions_for(now, &self.config);

            if actions.rollup {
                if let Err(e) = self.materialize_rollup(now).await {
                    error!("Daily rollup materialization failed: {e}");
                }
            }
            if actions.purge {
                if let Err(e) = self.purge_expired(now).await {
                    error!("Retention purge failed: {e}");
                }
            }
            if actions.monthly_recap {
                self.send_recap(MONTHLY_RECAP_TEMPLATE_KEY, monthly_window(now))
                    .await;
            } else if actions.weekly_recap {
                self.send_recap(WEEKLY_RECAP_TEMPLATE_KEY, weekly_window(now))
                    .await;
            }
            if actions.refresh_caches {
                self.refresh_caches().await;
            }

            self.fleet.refresh_scheduler_state().await;
        }
    }

    async fn materialize_rollup(&self, now: DateTime<FixedOffset>) -> Result<()> {
        let (date, start, end) = day_window(now);
        let changed =
            repo::violations::materialize_daily_rollup(&self.pool, date, start, end, now).await?;
        info!("Daily rollup for {date}: {changed} rows touched");
        Ok(())
    }

    /// Delete events past retention: evidence object first, row second.
    async fn purge_expired(&self, now: DateTime<FixedOffset>) -> Result<()> {
        let cutoff = now - ChronoDuration::days(self.config.retention_days as i64);
        let expired = repo::violations::fetch_expired(&self.pool, cutoff).await?;
        if expired.is_empty() {
            return Ok(());
        }

        let mut deletable = Vec::with_capacity(expired.len());
        for (id, image_url) in &expired {
            match self.store.delete_by_url(image_url).await {
                Ok(()) => deletable.push(*id),
                Err(e) => warn!("Evidence delete for event {id} failed, row kept: {e}"),
            }
        }

        let removed = repo::violations::delete_events(&self.pool, &deletable).await?;
        info!(
            "Retention purge: {removed} events older than {} days removed",
            self.config.retention_days
        );
        Ok(())
    }

    async fn send_recap(
        &self,
        template_key: &str,
        (start, end): (DateTime<FixedOffset>, DateTime<FixedOffset>),
    ) {
        let Some(notifier) = &self.notifier else {
            warn!("No notifier configured; recap '{template_key}' skipped");
            return;
        };
        match notifier
            .send_recap_emails(start, end, template_key, None, None)
            .await
        {
            Ok(sent) => info!("Recap '{template_key}': {sent} emails"),
            Err(e) => error!("Recap '{template_key}' failed: {e}"),
        }
    }

    async fn refresh_caches(&self) {
        if let Err(e) = self.directory.refresh(&self.pool, Some(&*self.store)).await {
            warn!("Camera directory refresh failed: {e}");
        }
        if let Err(e) = self.active.refresh(&self.pool).await {
            warn!("Active-violation cache refresh failed: {e}");
        }
        if let Err(e) = self.catalog.refresh_if_stale(&self.pool).await {
            warn!("Class catalog refresh failed: {e}");
        }
    }
}
