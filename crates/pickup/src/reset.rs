//! Full cache resets: the startup staleness check and the daily wipe.

use std::time::Duration;

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use pickup_db::{DbError, OrderCache};
use tracing::{error, info, warn};

use crate::shutdown::ShutdownSignal;
use crate::snapshot::ViewProjector;

/// Cache contents older than this are wiped at startup.
pub const DEFAULT_STALE_AFTER_HOURS: i64 = 6;

/// Longest single sleep of the daily timer. Sleeping in short steps and
/// rechecking the wall clock keeps the timer honest across clock adjustments.
const MAX_TIMER_STEP: Duration = Duration::from_secs(60);

/// What the startup check did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupAction {
    /// No table existed; an empty one was created.
    Created,
    /// The cache was wiped. `last_seen` is `None` for an empty or unreadable cache.
    Reset { last_seen: Option<DateTime<Utc>> },
    /// Recent data was found and kept.
    Kept { last_seen: DateTime<Utc> },
}

/// Prepare the cache for a new process.
///
/// Creates the table when missing and wipes it when its newest write is older
/// than `stale_after` (or when it holds no rows at all).
pub async fn startup_check(
    cache: &OrderCache,
    stale_after: chrono::Duration,
    now: DateTime<Utc>,
) -> pickup_db::Result<StartupAction> {
    if !cache.table_exists().await? {
        cache.ensure_table().await?;
        info!("Created order cache table");
        return Ok(StartupAction::Created);
    }

    let last_seen = match cache.latest_timestamp().await {
        Ok(latest) => latest,
        Err(DbError::InvalidState(msg)) => {
            warn!("Unreadable cache timestamp, treating cache as stale: {}", msg);
            None
        }
        Err(e) => return Err(e),
    };

    match last_seen {
        Some(ts) if now.signed_duration_since(ts) <= stale_after => {
            info!(last_seen = %ts, "Recent data found. Skipping cache reset");
            Ok(StartupAction::Kept { last_seen: ts })
        }
        _ => {
            cache.reset_all().await?;
            Ok(StartupAction::Reset { last_seen })
        }
    }
}

/// A fixed local wall-clock time, every day, in one timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    tz: Tz,
}

impl DailySchedule {
    pub fn new(at: NaiveTime, tz: Tz) -> Self {
        Self { at, tz }
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// First firing time strictly after `now`.
    ///
    /// On a daylight-saving fold the earlier instant is used; when the time
    /// falls in a gap the timer fires one hour later on the local clock.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();
        (0..=2)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter_map(|date| self.fire_time_on(date))
            .find(|fire| *fire > now)
            .unwrap_or_else(|| now + chrono::Duration::days(1))
    }

    fn fire_time_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_time(self.at);
        let fire = match self.tz.from_local_datetime(&local) {
            LocalResult::Single(t) => Some(t),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => self
                .tz
                .from_local_datetime(&(local + chrono::Duration::hours(1)))
                .earliest(),
        };
        fire.map(|t| t.with_timezone(&Utc))
    }
}

/// Wipes the cache once a day.
pub struct DailyReset {
    cache: OrderCache,
    projector: ViewProjector,
    schedule: DailySchedule,
}

impl DailyReset {
    pub fn new(cache: OrderCache, projector: ViewProjector, schedule: DailySchedule) -> Self {
        Self {
            cache,
            projector,
            schedule,
        }
    }

    /// Reset the cache now. Failures are logged; the next trigger retries.
    ///
    /// Returns whether the reset succeeded.
    pub async fn fire(&self) -> bool {
        if let Err(e) = self.cache.reset_all().await {
            error!("Scheduled cache reset failed: {}", e);
            return false;
        }
        if let Err(e) = self.projector.refresh().await {
            warn!("Failed to rebuild snapshot after reset: {}", e);
        }
        true
    }

    /// Fire at every scheduled time until `shutdown`.
    pub async fn run(self, shutdown: ShutdownSignal) {
        let mut next = self.schedule.next_after(Utc::now());
        info!(
            next = %next,
            timezone = self.schedule.timezone().name(),
            "Daily cache reset scheduled"
        );

        loop {
            let now = Utc::now();
            if now >= next {
                self.fire().await;
                next = self.schedule.next_after(Utc::now());
                info!(next = %next, "Next daily cache reset scheduled");
                continue;
            }

            let step = (next - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(MAX_TIMER_STEP);

            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(step) => {}
            }
        }

        info!("Daily cache reset stopped");
    }
}
