//! The tracking engine: one owned handle per component, injected at
//! construction, with the operations a front-end needs.

use std::sync::{Arc, Weak};

use chrono::{DateTime, NaiveDate, Utc};
use log::{error, warn};

use crate::analytics;
use crate::db::{keys, Store};
use crate::error::Result;
use crate::models::{
    DailySchedule, NotificationSettings, PrayerName, PrayerNotificationSettings, PrayerStatus,
    QuietHours, ScheduleSnapshot, Streak, UndoEntry,
};
use crate::notifications::{NotificationPlatform, ReconcileReport, ReminderScheduler};
use crate::prayer_times::{classify_in_schedule, MidnightRefresh, ScheduleCache};
use crate::tracker::{LogState, PrayerLogStore, DEFAULT_UNDO_DEPTH};
use crate::traits::Clock;

/// Defaults applied when the store holds no user preference.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub undo_depth: usize,
    pub notification_defaults: NotificationSettings,
    pub quiet_hours_default: Option<QuietHours>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            undo_depth: DEFAULT_UNDO_DEPTH,
            notification_defaults: NotificationSettings::default(),
            quiet_hours_default: None,
        }
    }
}

pub struct Engine {
    clock: Arc<dyn Clock>,
    cache: Arc<ScheduleCache>,
    log: PrayerLogStore,
    scheduler: ReminderScheduler,
    store: Arc<dyn Store>,
    options: EngineOptions,
}

impl Engine {
    /// Build the engine, restoring the prayer log from `store`.
    pub fn new(
        clock: Arc<dyn Clock>,
        cache: Arc<ScheduleCache>,
        store: Arc<dyn Store>,
        platform: Arc<dyn NotificationPlatform>,
        options: EngineOptions,
    ) -> Result<Self> {
        let log = PrayerLogStore::load(Arc::clone(&store), options.undo_depth)?;
        let scheduler = ReminderScheduler::new(platform, Arc::clone(&store), cache.offset());
        Ok(Self {
            clock,
            cache,
            log,
            scheduler,
            store,
            options,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Local calendar date of the current instant.
    pub fn today(&self) -> NaiveDate {
        self.cache.local_date(self.now())
    }

    pub fn cache(&self) -> &Arc<ScheduleCache> {
        &self.cache
    }

    // ─── Schedule ───────────────────────────────────────────────────────────

    /// Today's schedule. When a refresh fails but an older schedule is known,
    /// that one is returned flagged `stale` instead of an error.
    pub fn today_schedule(&self) -> Result<ScheduleSnapshot> {
        let now = self.now();
        match self.cache.refresh_if_stale(now) {
            Ok(schedule) => Ok(ScheduleSnapshot {
                schedule,
                stale: false,
            }),
            Err(e) => match self.cache.last_known(now) {
                Some(snapshot) => {
                    warn!("Showing last known schedule: {}", e);
                    Ok(snapshot)
                }
                None => Err(e),
            },
        }
    }

    /// Recompute today's schedule on demand.
    pub fn refresh_schedule(&self) -> Result<Arc<DailySchedule>> {
        self.cache.force_refresh(self.now())
    }

    pub fn current_prayer(&self) -> Result<Option<PrayerName>> {
        self.cache.current_prayer(self.now())
    }

    pub fn next_prayer(&self) -> Result<(PrayerName, DateTime<Utc>)> {
        self.cache.next_prayer(self.now())
    }

    // ─── Status ─────────────────────────────────────────────────────────────

    /// Effective status of one prayer: the recorded decision if any,
    /// otherwise the classification against the clock.
    pub fn status(&self, date: NaiveDate, prayer: PrayerName) -> Result<PrayerStatus> {
        let recorded = self.log.recorded(date, prayer);
        if let Some(status) = recorded {
            return Ok(status);
        }
        let schedule = self.cache.schedule_for(date)?;
        let tomorrow = self.tomorrow_if_needed(&schedule, prayer);
        Ok(classify_in_schedule(
            self.now(),
            &schedule,
            tomorrow.as_deref(),
            prayer,
            recorded,
        ))
    }

    /// Effective status of all five prayers for `date`.
    pub fn day_statuses(&self, date: NaiveDate) -> Result<Vec<(PrayerName, PrayerStatus)>> {
        let snapshot = self.log.snapshot();
        let needs_clock = PrayerName::ALL
            .iter()
            .any(|p| snapshot.recorded(date, *p).is_none());
        if !needs_clock {
            return Ok(PrayerName::ALL
                .iter()
                .filter_map(|p| snapshot.recorded(date, *p).map(|s| (*p, s)))
                .collect());
        }

        let schedule = self.cache.schedule_for(date)?;
        let now = self.now();
        Ok(PrayerName::ALL
            .into_iter()
            .map(|p| {
                let tomorrow = self.tomorrow_if_needed(&schedule, p);
                let status = classify_in_schedule(
                    now,
                    &schedule,
                    tomorrow.as_deref(),
                    p,
                    snapshot.recorded(date, p),
                );
                (p, status)
            })
            .collect())
    }

    /// Isha's missed boundary is the next day's Fajr; only look it up once
    /// Isha has started and is unrecorded.
    fn tomorrow_if_needed(
        &self,
        schedule: &DailySchedule,
        prayer: PrayerName,
    ) -> Option<Arc<DailySchedule>> {
        if prayer.next_in_day().is_some() || self.now() < schedule.time_of(prayer) {
            return None;
        }
        let next_date = schedule.date.succ_opt()?;
        match self.cache.schedule_for(next_date) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("No schedule for {}; Isha stays late: {}", next_date, e);
                None
            }
        }
    }

    // ─── Log ────────────────────────────────────────────────────────────────

    pub fn log_prayer(
        &self,
        date: NaiveDate,
        prayer: PrayerName,
        status: PrayerStatus,
    ) -> Result<()> {
        self.log.log_prayer(date, prayer, status, self.now())
    }

    pub fn undo(&self) -> Result<Option<UndoEntry>> {
        self.log.undo(self.now())
    }

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn undo_depth(&self) -> usize {
        self.log.depth()
    }

    pub fn reset_today(&self) -> Result<()> {
        self.log.reset_today(self.today())
    }

    pub fn reset_history(&self) -> Result<()> {
        self.log.reset_history()
    }

    pub fn log_snapshot(&self) -> Arc<LogState> {
        self.log.snapshot()
    }

    // ─── Analytics ──────────────────────────────────────────────────────────

    pub fn current_streak(&self) -> u32 {
        analytics::current_streak(&analytics::prayer_day_records(&self.log.snapshot()))
    }

    pub fn streak(&self) -> Streak {
        analytics::streak(&analytics::prayer_day_records(&self.log.snapshot()))
    }

    pub fn on_time_percentage(&self, window_days: usize) -> u32 {
        analytics::on_time_percentage(
            &analytics::prayer_day_records(&self.log.snapshot()),
            window_days,
        )
    }

    // ─── Notification preferences ───────────────────────────────────────────

    pub fn notification_settings(&self) -> Result<NotificationSettings> {
        match self.store.get(keys::NOTIFICATION_PREFS)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(self.options.notification_defaults.clone()),
        }
    }

    pub fn set_prayer_notification(
        &self,
        prayer: PrayerName,
        settings: PrayerNotificationSettings,
    ) -> Result<()> {
        let mut all = self.notification_settings()?;
        all.set(prayer, settings);
        self.store
            .set(keys::NOTIFICATION_PREFS, &serde_json::to_string(&all)?)
    }

    pub fn quiet_hours(&self) -> Result<Option<QuietHours>> {
        match self.store.get(keys::QUIET_HOURS)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(self.options.quiet_hours_default),
        }
    }

    /// `None` turns quiet hours off, overriding any configured default.
    pub fn set_quiet_hours(&self, quiet: Option<QuietHours>) -> Result<()> {
        self.store
            .set(keys::QUIET_HOURS, &serde_json::to_string(&quiet)?)
    }

    // ─── Reminders ──────────────────────────────────────────────────────────

    /// Reconcile platform reminders against today's schedule and the stored
    /// preferences.
    pub fn reconcile_reminders(&self) -> Result<ReconcileReport> {
        let schedule = self.cache.refresh_if_stale(self.now())?;
        self.reconcile_with(&schedule)
    }

    fn reconcile_with(&self, schedule: &DailySchedule) -> Result<ReconcileReport> {
        let settings = self.notification_settings()?;
        let quiet = self.quiet_hours()?;
        self.scheduler
            .reconcile(schedule, &settings, quiet.as_ref(), self.now())
    }

    /// Refresh the schedule after every local midnight and reconcile
    /// reminders against it. Dropping the handle stops the timer.
    pub fn spawn_midnight_refresh(self: &Arc<Self>) -> MidnightRefresh {
        let engine: Weak<Engine> = Arc::downgrade(self);
        self.cache
            .spawn_midnight_refresh(Arc::clone(&self.clock), move |schedule| {
                let Some(engine) = engine.upgrade() else {
                    return;
                };
                if let Err(e) = engine.reconcile_with(&schedule) {
                    error!("Reminder reconciliation after refresh failed: {}", e);
                }
            })
    }
}
