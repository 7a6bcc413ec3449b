//! Integration tests for the engine using mock dependencies.
//!
//! A fixed-timetable ephemeris, MockClock, MemoryStore and MockPlatform make
//! every scenario deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use muwaqqit::{
    ConfiguredLocation, Convention, Coordinates, Engine, EngineError, EngineOptions,
    EphemerisProvider, EphemerisTimes, MockClock, PreNotification, PrayerName,
    PrayerNotificationSettings, PrayerStatus, QuietHours, ScheduleCache, SoundKind,
};
use muwaqqit::db::MemoryStore;
use muwaqqit::models::ReminderKind;
use muwaqqit::notifications::MockPlatform;

/// Default timetable: dawn 05:00, sunrise 06:20, midday 12:10,
/// afternoon 15:40, sunset 18:20, night 19:50 (UTC).
const TIMETABLE: [(u32, u32); 6] = [(5, 0), (6, 20), (12, 10), (15, 40), (18, 20), (19, 50)];

struct FixedEphemeris {
    timetable: [(u32, u32); 6],
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FixedEphemeris {
    fn new(timetable: [(u32, u32); 6]) -> Self {
        Self {
            timetable,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EphemerisProvider for FixedEphemeris {
    fn compute(
        &self,
        _coordinates: Coordinates,
        date: NaiveDate,
        _convention: &Convention,
    ) -> muwaqqit::Result<EphemerisTimes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::EphemerisFailure("solar position unavailable".to_string()));
        }
        let at = |i: usize| {
            let (h, m) = self.timetable[i];
            Utc.from_utc_datetime(&date.and_hms_opt(h, m, 0).unwrap())
        };
        Ok(EphemerisTimes {
            fajr: at(0),
            sunrise: at(1),
            zuhr: at(2),
            asr: at(3),
            maghrib: at(4),
            isha: at(5),
            qibla_bearing: 255.0,
        })
    }
}

struct Harness {
    engine: Arc<Engine>,
    clock: MockClock,
    store: MemoryStore,
    platform: MockPlatform,
    ephemeris: Arc<FixedEphemeris>,
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, d, h, m, 0).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn build(
    now: DateTime<Utc>,
    timetable: [(u32, u32); 6],
    location: ConfiguredLocation,
    options: EngineOptions,
    store: MemoryStore,
) -> Harness {
    let clock = MockClock::new(now);
    let platform = MockPlatform::new();
    let ephemeris = Arc::new(FixedEphemeris::new(timetable));
    let cache = Arc::new(ScheduleCache::new(
        Arc::clone(&ephemeris) as Arc<dyn EphemerisProvider>,
        Arc::new(location),
        Convention::default(),
        FixedOffset::east_opt(0).unwrap(),
    ));
    let engine = Engine::new(
        Arc::new(clock.clone()),
        cache,
        Arc::new(store.clone()),
        Arc::new(platform.clone()),
        options,
    )
    .unwrap();
    Harness {
        engine: Arc::new(engine),
        clock,
        store,
        platform,
        ephemeris,
    }
}

fn harness_at(now: DateTime<Utc>) -> Harness {
    build(
        now,
        TIMETABLE,
        ConfiguredLocation::new(Some(33.7), Some(73.0)),
        EngineOptions::default(),
        MemoryStore::new(),
    )
}

fn log_full_day(engine: &Engine, date: NaiveDate) {
    for prayer in PrayerName::ALL {
        engine.log_prayer(date, prayer, PrayerStatus::OnTime).unwrap();
    }
}

// ==================== Status Tests ====================

/// Midday past its start but before the afternoon prayer is late; a recorded
/// dawn keeps its recorded status.
#[test]
fn test_midday_late_and_recorded_dawn_wins() {
    let h = harness_at(at(1, 12, 30));
    h.engine
        .log_prayer(day(1), PrayerName::Fajr, PrayerStatus::OnTime)
        .unwrap();

    assert_eq!(h.engine.status(day(1), PrayerName::Zuhr).unwrap(), PrayerStatus::Late);
    assert_eq!(h.engine.status(day(1), PrayerName::Fajr).unwrap(), PrayerStatus::OnTime);
    assert_eq!(h.engine.status(day(1), PrayerName::Asr).unwrap(), PrayerStatus::Unmarked);
}

/// An unrecorded prayer becomes missed once the next prayer starts.
#[test]
fn test_unrecorded_prayer_missed_after_next_starts() {
    let h = harness_at(at(1, 16, 0));
    let statuses = h.engine.day_statuses(day(1)).unwrap();
    assert_eq!(
        statuses,
        vec![
            (PrayerName::Fajr, PrayerStatus::Missed),
            (PrayerName::Zuhr, PrayerStatus::Missed),
            (PrayerName::Asr, PrayerStatus::Late),
            (PrayerName::Maghrib, PrayerStatus::Unmarked),
            (PrayerName::Isha, PrayerStatus::Unmarked),
        ]
    );
}

/// Night prayer stays late until the next day's dawn, then counts as missed.
#[test]
fn test_isha_missed_only_after_tomorrow_fajr() {
    let h = harness_at(at(1, 23, 30));
    assert_eq!(h.engine.status(day(1), PrayerName::Isha).unwrap(), PrayerStatus::Late);

    h.clock.set_time(at(2, 4, 59));
    assert_eq!(h.engine.status(day(1), PrayerName::Isha).unwrap(), PrayerStatus::Late);

    h.clock.set_time(at(2, 5, 0));
    assert_eq!(h.engine.status(day(1), PrayerName::Isha).unwrap(), PrayerStatus::Missed);
}

/// Without tomorrow's timetable the night prayer cannot be judged missed.
#[test]
fn test_isha_stays_late_when_tomorrow_unavailable() {
    let h = harness_at(at(1, 21, 0));
    h.engine.today_schedule().unwrap();
    h.ephemeris.set_failing(true);

    h.clock.set_time(at(2, 6, 0));
    assert_eq!(h.engine.status(day(1), PrayerName::Isha).unwrap(), PrayerStatus::Late);
}

/// With no location, recorded statuses are still readable but nothing can
/// be derived from the clock.
#[test]
fn test_location_unavailable() {
    let h = build(
        at(1, 12, 30),
        TIMETABLE,
        ConfiguredLocation::default(),
        EngineOptions::default(),
        MemoryStore::new(),
    );

    assert!(matches!(
        h.engine.today_schedule(),
        Err(EngineError::LocationUnavailable(_))
    ));
    assert!(matches!(
        h.engine.status(day(1), PrayerName::Zuhr),
        Err(EngineError::LocationUnavailable(_))
    ));

    h.engine
        .log_prayer(day(1), PrayerName::Fajr, PrayerStatus::Late)
        .unwrap();
    assert_eq!(h.engine.status(day(1), PrayerName::Fajr).unwrap(), PrayerStatus::Late);
    assert_eq!(h.ephemeris.calls(), 0);
}

// ==================== Schedule Tests ====================

/// A failed refresh keeps serving yesterday's timetable, flagged stale.
#[test]
fn test_failed_refresh_returns_stale_schedule() {
    let h = harness_at(at(1, 12, 0));
    let fresh = h.engine.today_schedule().unwrap();
    assert!(!fresh.stale);

    h.ephemeris.set_failing(true);
    h.clock.set_time(at(2, 1, 0));
    let snapshot = h.engine.today_schedule().unwrap();
    assert!(snapshot.stale);
    assert_eq!(snapshot.schedule.date, day(1));

    h.ephemeris.set_failing(false);
    let recovered = h.engine.today_schedule().unwrap();
    assert!(!recovered.stale);
    assert_eq!(recovered.schedule.date, day(2));
}

#[test]
fn test_current_and_next_prayer() {
    let h = harness_at(at(1, 3, 0));
    assert_eq!(h.engine.current_prayer().unwrap(), None);
    assert_eq!(h.engine.next_prayer().unwrap(), (PrayerName::Fajr, at(1, 5, 0)));

    h.clock.set_time(at(1, 20, 30));
    assert_eq!(h.engine.current_prayer().unwrap(), Some(PrayerName::Isha));
    assert_eq!(h.engine.next_prayer().unwrap(), (PrayerName::Fajr, at(2, 5, 0)));
}

/// Repeated reads within one day cost a single ephemeris computation.
#[test]
fn test_schedule_computed_once_per_day() {
    let h = harness_at(at(1, 8, 0));
    for _ in 0..5 {
        h.engine.today_schedule().unwrap();
        h.engine.current_prayer().unwrap();
        h.engine.status(day(1), PrayerName::Asr).unwrap();
    }
    assert_eq!(h.ephemeris.calls(), 1);
}

// ==================== Undo Tests ====================

/// More than N changes leave only the last N undoable.
#[test]
fn test_undo_bound() {
    let h = build(
        at(1, 21, 0),
        TIMETABLE,
        ConfiguredLocation::new(Some(33.7), Some(73.0)),
        EngineOptions {
            undo_depth: 3,
            ..EngineOptions::default()
        },
        MemoryStore::new(),
    );
    assert_eq!(h.engine.undo_depth(), 3);

    for prayer in [PrayerName::Fajr, PrayerName::Zuhr, PrayerName::Asr, PrayerName::Maghrib] {
        h.engine
            .log_prayer(day(1), prayer, PrayerStatus::OnTime)
            .unwrap();
    }

    for _ in 0..4 {
        h.engine.undo().unwrap();
    }
    assert!(!h.engine.can_undo());

    let log = h.engine.log_snapshot();
    assert_eq!(log.recorded(day(1), PrayerName::Fajr), Some(PrayerStatus::OnTime));
    assert_eq!(log.recorded(day(1), PrayerName::Zuhr), None);
    assert_eq!(log.recorded(day(1), PrayerName::Maghrib), None);
}

/// Undoing every change of a sequence restores the starting state.
#[test]
fn test_undo_round_trip() {
    let h = harness_at(at(2, 21, 0));
    h.engine
        .log_prayer(day(1), PrayerName::Isha, PrayerStatus::Late)
        .unwrap();
    let before = h.engine.log_snapshot().logs.clone();

    let steps = [
        (day(2), PrayerName::Fajr, PrayerStatus::OnTime),
        (day(2), PrayerName::Fajr, PrayerStatus::Missed),
        (day(1), PrayerName::Isha, PrayerStatus::OnTime),
        (day(2), PrayerName::Asr, PrayerStatus::Late),
        (day(1), PrayerName::Isha, PrayerStatus::Unmarked),
    ];
    for (date, prayer, status) in steps {
        h.engine.log_prayer(date, prayer, status).unwrap();
    }
    for _ in 0..steps.len() {
        assert!(h.engine.undo().unwrap().is_some());
    }

    let after = h.engine.log_snapshot();
    assert_eq!(after.recorded(day(1), PrayerName::Isha), Some(PrayerStatus::Late));
    assert_eq!(after.recorded(day(2), PrayerName::Fajr), None);
    assert_eq!(after.recorded(day(2), PrayerName::Asr), None);
    assert_eq!(after.logs.keys().collect::<Vec<_>>(), before.keys().collect::<Vec<_>>());
}

#[test]
fn test_undo_on_empty_stack_is_inert() {
    let h = harness_at(at(1, 9, 0));
    assert!(!h.engine.can_undo());
    assert_eq!(h.engine.undo().unwrap(), None);
    assert!(h.engine.log_snapshot().logs.is_empty());
}

#[test]
fn test_reset_today_is_not_undoable() {
    let h = harness_at(at(2, 21, 0));
    h.engine
        .log_prayer(day(1), PrayerName::Fajr, PrayerStatus::OnTime)
        .unwrap();
    h.engine
        .log_prayer(day(2), PrayerName::Fajr, PrayerStatus::OnTime)
        .unwrap();

    h.engine.reset_today().unwrap();
    assert!(h.engine.log_snapshot().log_for(day(2)).is_none());

    // Only the entry for the earlier day survives.
    let undone = h.engine.undo().unwrap().unwrap();
    assert_eq!(undone.date, day(1));
    assert!(!h.engine.can_undo());
}

// ==================== Analytics Tests ====================

/// A fully on-time today extends yesterday's streak by one.
#[test]
fn test_streak_extends_by_one() {
    let h = harness_at(at(4, 21, 0));
    for d in 1..=3 {
        log_full_day(&h.engine, day(d));
    }
    assert_eq!(h.engine.current_streak(), 3);

    log_full_day(&h.engine, day(4));
    assert_eq!(h.engine.current_streak(), 4);
    assert_eq!(h.engine.streak().best, 4);
}

/// A partial most recent day breaks the current streak.
#[test]
fn test_streak_zero_when_latest_day_incomplete() {
    let h = harness_at(at(3, 21, 0));
    log_full_day(&h.engine, day(1));
    log_full_day(&h.engine, day(2));
    h.engine
        .log_prayer(day(3), PrayerName::Fajr, PrayerStatus::Late)
        .unwrap();

    assert_eq!(h.engine.current_streak(), 0);
    assert_eq!(h.engine.streak().best, 2);
}

#[test]
fn test_percentage_on_empty_log_is_zero() {
    let h = harness_at(at(1, 9, 0));
    assert_eq!(h.engine.on_time_percentage(7), 0);
}

#[test]
fn test_percentage_counts_recorded_days() {
    let h = harness_at(at(3, 21, 0));
    log_full_day(&h.engine, day(1));
    h.engine
        .log_prayer(day(2), PrayerName::Fajr, PrayerStatus::Missed)
        .unwrap();
    log_full_day(&h.engine, day(3));
    // 10 of 11 recorded prayers on time
    assert_eq!(h.engine.on_time_percentage(7), 91);
}

// ==================== Reminder Tests ====================

fn midday_with_pre(h: &Harness, minutes: u32) {
    h.engine
        .set_prayer_notification(
            PrayerName::Zuhr,
            PrayerNotificationSettings {
                sound: SoundKind::Simple,
                pre_notification: PreNotification::try_from(minutes).unwrap(),
            },
        )
        .unwrap();
}

fn fired(platform: &MockPlatform) -> Vec<(DateTime<Utc>, String)> {
    platform
        .scheduled()
        .into_iter()
        .map(|r| (r.fires_at, r.body))
        .collect()
}

/// Reconciling twice with the same inputs leaves the same reminders.
#[test]
fn test_reconcile_is_idempotent() {
    let h = harness_at(at(1, 11, 50));
    midday_with_pre(&h, 15);

    let first = h.engine.reconcile_reminders().unwrap();
    let after_first = fired(&h.platform);
    let second = h.engine.reconcile_reminders().unwrap();
    let after_second = fired(&h.platform);

    assert_eq!(after_first, after_second);
    assert_eq!(first.scheduled.len(), second.scheduled.len());
    assert_eq!(second.cancelled, first.scheduled.len());
    assert!(second.is_clean());
}

/// A pre-reminder whose instant has passed is not installed again.
#[test]
fn test_past_pre_reminder_not_rescheduled() {
    let h = harness_at(at(1, 11, 50));
    midday_with_pre(&h, 15);

    let report = h.engine.reconcile_reminders().unwrap();
    assert!(report
        .scheduled
        .iter()
        .any(|r| r.kind == ReminderKind::Pre && r.fires_at == at(1, 11, 55)));

    h.clock.set_time(at(1, 12, 0));
    let report = h.engine.reconcile_reminders().unwrap();
    assert!(!report.scheduled.iter().any(|r| r.kind == ReminderKind::Pre));
    assert!(h
        .platform
        .scheduled()
        .iter()
        .any(|r| r.fires_at == at(1, 12, 10)));
    assert!(!h
        .platform
        .scheduled()
        .iter()
        .any(|r| r.fires_at == at(1, 11, 55)));
}

/// A reminder inside quiet hours is dropped, not moved to the end of them.
#[test]
fn test_quiet_hours_drop_night_reminder() {
    let mut timetable = TIMETABLE;
    timetable[5] = (23, 0);
    let h = build(
        at(1, 20, 0),
        timetable,
        ConfiguredLocation::new(Some(33.7), Some(73.0)),
        EngineOptions::default(),
        MemoryStore::new(),
    );
    h.engine
        .set_quiet_hours(Some(QuietHours::new(hm(22, 0), hm(6, 0))))
        .unwrap();

    let report = h.engine.reconcile_reminders().unwrap();
    assert!(report.scheduled.is_empty());
    assert_eq!(report.suppressed, 1);
    assert!(h.platform.scheduled().is_empty());
}

/// One rejected reminder does not stop the others.
#[test]
fn test_reconcile_partial_failure_is_a_warning() {
    let h = harness_at(at(1, 4, 0));
    h.platform.fail_at(at(1, 12, 10));

    let report = h.engine.reconcile_reminders().unwrap();
    assert_eq!(report.scheduled.len(), 4);
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(report.warnings[0], EngineError::SchedulingFailure(_)));
}

#[test]
fn test_sound_off_schedules_nothing_for_that_prayer() {
    let h = harness_at(at(1, 4, 0));
    h.engine
        .set_prayer_notification(
            PrayerName::Asr,
            PrayerNotificationSettings {
                sound: SoundKind::Off,
                pre_notification: PreNotification::Ten,
            },
        )
        .unwrap();

    let report = h.engine.reconcile_reminders().unwrap();
    assert_eq!(report.scheduled.len(), 4);
    assert!(report.scheduled.iter().all(|r| r.prayer != PrayerName::Asr));
}

// ==================== Persistence Tests ====================

/// Log, undo history and preferences survive a restart on the same store.
#[test]
fn test_state_survives_restart() {
    let h = harness_at(at(1, 13, 0));
    h.engine
        .log_prayer(day(1), PrayerName::Zuhr, PrayerStatus::OnTime)
        .unwrap();
    h.engine
        .set_quiet_hours(Some(QuietHours::new(hm(22, 0), hm(6, 0))))
        .unwrap();
    midday_with_pre(&h, 20);

    let restarted = build(
        at(1, 13, 5),
        TIMETABLE,
        ConfiguredLocation::new(Some(33.7), Some(73.0)),
        EngineOptions::default(),
        h.store.clone(),
    );
    let engine = &restarted.engine;
    assert_eq!(engine.status(day(1), PrayerName::Zuhr).unwrap(), PrayerStatus::OnTime);
    assert!(engine.can_undo());
    assert_eq!(
        engine.quiet_hours().unwrap(),
        Some(QuietHours::new(hm(22, 0), hm(6, 0)))
    );
    assert_eq!(
        engine
            .notification_settings()
            .unwrap()
            .get(PrayerName::Zuhr)
            .pre_notification,
        PreNotification::Twenty
    );
}

/// A failed write is reported but the change stays visible in memory.
#[test]
fn test_persistence_failure_keeps_memory_state() {
    let h = harness_at(at(1, 13, 0));
    h.store.set_failing(true);

    let err = h
        .engine
        .log_prayer(day(1), PrayerName::Zuhr, PrayerStatus::Late)
        .unwrap_err();
    assert!(matches!(err, EngineError::PersistenceFailure(_)));
    assert_eq!(h.engine.status(day(1), PrayerName::Zuhr).unwrap(), PrayerStatus::Late);
}

#[test]
fn test_quiet_hours_off_overrides_configured_default() {
    let h = build(
        at(1, 9, 0),
        TIMETABLE,
        ConfiguredLocation::new(Some(33.7), Some(73.0)),
        EngineOptions {
            quiet_hours_default: Some(QuietHours::new(hm(22, 0), hm(6, 0))),
            ..EngineOptions::default()
        },
        MemoryStore::new(),
    );
    assert!(h.engine.quiet_hours().unwrap().is_some());

    h.engine.set_quiet_hours(None).unwrap();
    assert_eq!(h.engine.quiet_hours().unwrap(), None);
}

// ==================== Midnight Refresh Tests ====================

/// Crossing midnight refreshes the timetable and installs the new day's
/// reminders.
#[tokio::test(start_paused = true)]
async fn test_midnight_refresh_reconciles_new_day() {
    let h = harness_at(at(1, 23, 59));
    let handle = h.engine.spawn_midnight_refresh();

    // Let the timer task arm itself before the clock jumps.
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    h.clock.advance(ChronoDuration::minutes(2));
    tokio::time::sleep(std::time::Duration::from_secs(120)).await;

    let scheduled = h.platform.scheduled();
    assert_eq!(scheduled.len(), 5);
    assert!(scheduled.iter().all(|r| r.fires_at.date_naive() == day(2)));
    assert_eq!(h.engine.today_schedule().unwrap().schedule.date, day(2));

    drop(handle);
}
