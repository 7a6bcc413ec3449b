//! Per-day timetable cache.
//!
//! Schedules are keyed by local calendar date and shared as `Arc`s; a refresh
//! swaps in a new value and never edits one in place. All provider calls go
//! through a single lock and re-check the cache once inside it, so concurrent
//! refresh triggers for the same day cost one computation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::error::{EngineError, Result};
use crate::models::{DailySchedule, PrayerName, ScheduleSnapshot};
use crate::prayer_times::provider::{Convention, EphemerisProvider, LocationProvider};
use crate::traits::Clock;

/// Delay before retrying a failed midnight refresh.
const RETRY_DELAY: StdDuration = StdDuration::from_secs(5 * 60);

pub struct ScheduleCache {
    ephemeris: Arc<dyn EphemerisProvider>,
    location: Arc<dyn LocationProvider>,
    convention: Convention,
    offset: FixedOffset,
    entries: RwLock<BTreeMap<NaiveDate, Arc<DailySchedule>>>,
    today: RwLock<Option<Arc<DailySchedule>>>,
    refresh_lock: Mutex<()>,
}

impl ScheduleCache {
    pub fn new(
        ephemeris: Arc<dyn EphemerisProvider>,
        location: Arc<dyn LocationProvider>,
        convention: Convention,
        offset: FixedOffset,
    ) -> Self {
        Self {
            ephemeris,
            location,
            convention,
            offset,
            entries: RwLock::new(BTreeMap::new()),
            today: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local calendar date of `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Schedule for `date`, computing it on first access.
    pub fn schedule_for(&self, date: NaiveDate) -> Result<Arc<DailySchedule>> {
        if let Some(hit) = self.cached(date) {
            return Ok(hit);
        }
        let _guard = self.lock_refresh();
        if let Some(hit) = self.cached(date) {
            return Ok(hit);
        }
        let schedule = Arc::new(self.compute(date)?);
        write(&self.entries).insert(date, Arc::clone(&schedule));
        Ok(schedule)
    }

    /// Make sure the cache holds `now`'s day and mark it as today.
    ///
    /// On failure the previous today-schedule stays in place.
    pub fn refresh_if_stale(&self, now: DateTime<Utc>) -> Result<Arc<DailySchedule>> {
        let date = self.local_date(now);
        let current = read(&self.today).clone();
        if let Some(current) = current.filter(|s| s.date == date) {
            return Ok(current);
        }

        let schedule = self.schedule_for(date)?;
        let previous = write(&self.today).replace(Arc::clone(&schedule));
        if previous.as_ref().map(|p| p.date) != Some(date) {
            info!("Prayer schedule refreshed for {}", date);
        }
        self.prune_before(date.pred_opt().unwrap_or(date));
        Ok(schedule)
    }

    /// Recompute today's schedule even when one is cached, e.g. after the
    /// location or calculation settings changed.
    pub fn force_refresh(&self, now: DateTime<Utc>) -> Result<Arc<DailySchedule>> {
        let date = self.local_date(now);
        let _guard = self.lock_refresh();
        let schedule = Arc::new(self.compute(date)?);
        {
            let mut entries = write(&self.entries);
            entries.clear();
            entries.insert(date, Arc::clone(&schedule));
        }
        *write(&self.today) = Some(Arc::clone(&schedule));
        info!("Prayer schedule recomputed for {}", date);
        Ok(schedule)
    }

    /// Last successfully computed today-schedule, flagged stale when it does
    /// not belong to `now`'s date.
    pub fn last_known(&self, now: DateTime<Utc>) -> Option<ScheduleSnapshot> {
        let date = self.local_date(now);
        read(&self.today).as_ref().map(|s| ScheduleSnapshot {
            stale: s.date != date,
            schedule: Arc::clone(s),
        })
    }

    /// The prayer whose window contains `now`, or `None` before Fajr.
    pub fn current_prayer(&self, now: DateTime<Utc>) -> Result<Option<PrayerName>> {
        let today = self.refresh_if_stale(now)?;
        Ok(today
            .prayers()
            .into_iter()
            .rev()
            .find(|(_, at)| *at <= now)
            .map(|(p, _)| p))
    }

    /// First prayer strictly after `now`, rolling over to tomorrow's Fajr.
    pub fn next_prayer(&self, now: DateTime<Utc>) -> Result<(PrayerName, DateTime<Utc>)> {
        let today = self.refresh_if_stale(now)?;
        if let Some(next) = today.prayers().into_iter().find(|(_, at)| *at > now) {
            return Ok(next);
        }
        let tomorrow_date = today
            .date
            .succ_opt()
            .ok_or_else(|| EngineError::EphemerisFailure("date out of range".to_string()))?;
        let tomorrow = self.schedule_for(tomorrow_date)?;
        Ok((PrayerName::Fajr, tomorrow.fajr))
    }

    /// Time from `now` until just past the next local midnight.
    pub fn until_next_midnight(&self, now: DateTime<Utc>) -> StdDuration {
        let local = now.with_timezone(&self.offset);
        let next_midnight = local
            .date_naive()
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|naive| self.offset.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now + Duration::days(1));
        (next_midnight - now + Duration::seconds(1))
            .to_std()
            .unwrap_or(StdDuration::from_secs(1))
    }

    /// Arm a timer that refreshes the cache right after each local midnight
    /// and hands the new schedule to `on_refresh`. Dropping the returned
    /// handle cancels the timer.
    pub fn spawn_midnight_refresh<F>(
        self: &Arc<Self>,
        clock: Arc<dyn Clock>,
        on_refresh: F,
    ) -> MidnightRefresh
    where
        F: Fn(Arc<DailySchedule>) + Send + Sync + 'static,
    {
        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut retrying = false;
            loop {
                let wait = if retrying {
                    RETRY_DELAY
                } else {
                    cache.until_next_midnight(clock.now())
                };
                debug!("Next schedule refresh in {}s", wait.as_secs());
                tokio::time::sleep(wait).await;

                match cache.refresh_if_stale(clock.now()) {
                    Ok(schedule) => {
                        retrying = false;
                        on_refresh(schedule);
                    }
                    Err(e) => {
                        warn!("Midnight schedule refresh failed: {}", e);
                        retrying = e.is_retryable();
                    }
                }
            }
        });
        MidnightRefresh { handle }
    }

    fn cached(&self, date: NaiveDate) -> Option<Arc<DailySchedule>> {
        read(&self.entries).get(&date).cloned()
    }

    fn prune_before(&self, keep_from: NaiveDate) {
        write(&self.entries).retain(|d, _| *d >= keep_from);
    }

    fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn compute(&self, date: NaiveDate) -> Result<DailySchedule> {
        let coords = self.location.locate()?;
        let times = self.ephemeris.compute(coords, date, &self.convention)?;

        let ordered = times.fajr < times.sunrise
            && times.sunrise <= times.zuhr
            && times.zuhr < times.asr
            && times.asr < times.maghrib
            && times.maghrib < times.isha;
        if !ordered {
            return Err(EngineError::EphemerisFailure(format!(
                "prayer times for {} are out of order",
                date
            )));
        }

        Ok(DailySchedule {
            date,
            fajr: times.fajr,
            sunrise: times.sunrise,
            zuhr: times.zuhr,
            asr: times.asr,
            maghrib: times.maghrib,
            isha: times.isha,
            qibla_bearing: times.qibla_bearing,
        })
    }
}

/// Handle to the midnight refresh task.
pub struct MidnightRefresh {
    handle: JoinHandle<()>,
}

impl MidnightRefresh {
    /// Stop the timer. Dropping the handle does the same.
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for MidnightRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
