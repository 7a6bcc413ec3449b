//! Reminder reconciliation.
//!
//! Every run cancels all prayer reminders installed by the previous run and
//! installs a freshly computed set, so repeating a run with the same inputs
//! leaves the platform in the same state. Runs are serialized; a run never
//! interleaves its cancel and install phases with another run.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use log::{debug, info, warn};

use crate::db::{keys, Store};
use crate::error::{EngineError, Result};
use crate::models::{
    DailySchedule, NotificationSettings, PrayerName, QuietHours, ReminderKind, ScheduledReminder,
    SoundKind,
};
use crate::notifications::platform::{NotificationPlatform, ReminderId};

/// A reminder that a run intends to install.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderPlan {
    pub prayer: PrayerName,
    pub kind: ReminderKind,
    pub fires_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub sound: SoundKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub scheduled: Vec<ScheduledReminder>,
    pub cancelled: usize,
    /// Candidates dropped because they fell inside quiet hours.
    pub suppressed: usize,
    /// Per-reminder failures; none of them aborted the run.
    pub warnings: Vec<EngineError>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Future reminders for `schedule`, before quiet-hour filtering.
fn candidates(
    schedule: &DailySchedule,
    settings: &NotificationSettings,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<ReminderPlan> {
    let mut plans = Vec::new();

    for (prayer, at) in schedule.prayers() {
        let prefs = settings.get(prayer);
        if prefs.sound == SoundKind::Off {
            continue;
        }

        if at > now {
            let body = match prefs.sound {
                SoundKind::Primary => format!("It's time for {}. The adhan will play.", prayer),
                _ => format!("It's time for {}.", prayer),
            };
            plans.push(ReminderPlan {
                prayer,
                kind: ReminderKind::Main,
                fires_at: at,
                title: prayer.display_name().to_string(),
                body,
                sound: prefs.sound,
            });
        }

        let minutes = prefs.pre_notification.minutes();
        if minutes > 0 {
            let pre_at = at - Duration::minutes(i64::from(minutes));
            if pre_at > now {
                plans.push(ReminderPlan {
                    prayer,
                    kind: ReminderKind::Pre,
                    fires_at: pre_at,
                    title: format!("{} in {} min", prayer, minutes),
                    body: format!(
                        "{} begins at {}.",
                        prayer,
                        at.with_timezone(&offset).format("%H:%M")
                    ),
                    sound: SoundKind::Simple,
                });
            }
        }
    }

    plans.sort_by_key(|p| p.fires_at);
    plans
}

fn is_quiet(quiet: Option<&QuietHours>, at: DateTime<Utc>, offset: FixedOffset) -> bool {
    quiet.is_some_and(|q| q.contains(at.with_timezone(&offset).time()))
}

/// The reminders a run would install: future instants only, with anything
/// inside quiet hours dropped. Pure.
pub fn plan_reminders(
    schedule: &DailySchedule,
    settings: &NotificationSettings,
    quiet: Option<&QuietHours>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<ReminderPlan> {
    candidates(schedule, settings, now, offset)
        .into_iter()
        .filter(|p| !is_quiet(quiet, p.fires_at, offset))
        .collect()
}

pub struct ReminderScheduler {
    platform: Arc<dyn NotificationPlatform>,
    store: Arc<dyn Store>,
    offset: FixedOffset,
    run_lock: Mutex<()>,
}

impl ReminderScheduler {
    pub fn new(
        platform: Arc<dyn NotificationPlatform>,
        store: Arc<dyn Store>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            platform,
            store,
            offset,
            run_lock: Mutex::new(()),
        }
    }

    /// Ids of the prayer reminders installed by the last run.
    pub fn installed_ids(&self) -> Result<Vec<ReminderId>> {
        match self.store.get(keys::REMINDER_TRACE)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Ids the cancel phase must remove: the recorded ids still live on the
    /// platform plus any live id missing from the record, which happens when
    /// a previous run installed reminders but could not save its record.
    /// Falls back to the record alone when the platform cannot be listed.
    fn stale_ids(&self, previous: Vec<ReminderId>) -> Vec<ReminderId> {
        let live = match self.platform.list_scheduled() {
            Ok(live) => live,
            Err(e) => {
                debug!("Could not list scheduled reminders: {:#}", e);
                return previous;
            }
        };
        let mut ids: Vec<ReminderId> = previous
            .into_iter()
            .filter(|id| live.contains(id))
            .collect();
        for id in live {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Cancel the previous run's reminders and install the current plan.
    ///
    /// Fails only when the record of previously installed reminders cannot be
    /// read, in which case nothing is touched. Individual platform failures
    /// are collected in the report.
    pub fn reconcile(
        &self,
        schedule: &DailySchedule,
        settings: &NotificationSettings,
        quiet: Option<&QuietHours>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileReport> {
        let _run = self.run_lock.lock().unwrap_or_else(|e| e.into_inner());
        let previous = self.installed_ids()?;
        let mut report = ReconcileReport::default();

        // Ids we could not cancel stay on record so the next run retries them.
        let mut trace: Vec<ReminderId> = Vec::new();
        for id in self.stale_ids(previous) {
            match self.platform.cancel(&id) {
                Ok(()) => report.cancelled += 1,
                Err(e) => {
                    warn!("Could not cancel reminder {}: {:#}", id, e);
                    report.warnings.push(EngineError::SchedulingFailure(format!(
                        "cancel {}: {:#}",
                        id, e
                    )));
                    trace.push(id);
                }
            }
        }

        for plan in candidates(schedule, settings, now, self.offset) {
            if is_quiet(quiet, plan.fires_at, self.offset) {
                debug!(
                    "Suppressed {:?} reminder for {} at {} (quiet hours)",
                    plan.kind, plan.prayer, plan.fires_at
                );
                report.suppressed += 1;
                continue;
            }
            match self
                .platform
                .schedule_at(plan.fires_at, &plan.title, &plan.body, plan.sound)
            {
                Ok(id) => {
                    trace.push(id.clone());
                    report.scheduled.push(ScheduledReminder {
                        id,
                        prayer: plan.prayer,
                        kind: plan.kind,
                        fires_at: plan.fires_at,
                        title: plan.title,
                        body: plan.body,
                    });
                }
                Err(e) => {
                    warn!(
                        "Could not schedule {:?} reminder for {}: {:#}",
                        plan.kind, plan.prayer, e
                    );
                    report.warnings.push(EngineError::SchedulingFailure(format!(
                        "{} {:?} at {}: {:#}",
                        plan.prayer, plan.kind, plan.fires_at, e
                    )));
                }
            }
        }

        if let Err(e) = serde_json::to_string(&trace)
            .map_err(EngineError::from)
            .and_then(|raw| self.store.set(keys::REMINDER_TRACE, &raw))
        {
            warn!("Could not record installed reminders: {}", e);
            report.warnings.push(e);
        }

        info!(
            "Reminders reconciled for {}: {} scheduled, {} cancelled, {} suppressed, {} warning(s)",
            schedule.date,
            report.scheduled.len(),
            report.cancelled,
            report.suppressed,
            report.warnings.len()
        );
        Ok(report)
    }
}
