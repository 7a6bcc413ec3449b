use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use muwaqqit::analytics::status_tally;
use muwaqqit::config::settings::{parse_hhmm, parse_tz_offset};
use muwaqqit::config::AppConfig;
use muwaqqit::notifications::SqlitePlatform;
use muwaqqit::prayer_times::calculator::{parse_madhab, parse_method, CALC_METHODS};
use muwaqqit::{
    Engine, EngineError, PreNotification, PrayerName, PrayerStatus, QuietHours, ReconcileReport,
    SoundKind,
};

use crate::utils::format::{format_duration_secs, format_local_time, format_tz_offset, progress_bar};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GOLD: &str = "\x1b[38;2;196;160;68m";

fn status_color(status: PrayerStatus) -> &'static str {
    match status {
        PrayerStatus::OnTime => GREEN,
        PrayerStatus::Late => AMBER,
        PrayerStatus::Missed => RED,
        PrayerStatus::Unmarked => DIM,
    }
}

fn status_icon(status: PrayerStatus) -> &'static str {
    match status {
        PrayerStatus::OnTime => "✓",
        PrayerStatus::Late => "◑",
        PrayerStatus::Missed => "✗",
        PrayerStatus::Unmarked => "○",
    }
}

/// Print an engine error the way a user should see it; storage failures
/// still leave the in-memory change applied.
fn report_engine_error(e: &EngineError) {
    println_colored!(RED, "  {}", e.user_message());
    println_colored!(DIM, "  {}", e);
}

fn parse_date(engine: &Engine, date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| anyhow!("Bad date '{}': {} (use YYYY-MM-DD)", s, e)),
        None => Ok(engine.today()),
    }
}

// ─── Setup ───────────────────────────────────────────────────────────────────

pub fn handle_setup(
    config: &mut AppConfig,
    lat: f64,
    lng: f64,
    name: Option<String>,
    method: Option<String>,
    madhab: Option<String>,
    tz: Option<String>,
) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(anyhow!("Coordinates out of range: {}, {}", lat, lng));
    }
    if let Some(method) = &method {
        parse_method(method)
            .map_err(|_| anyhow!("Unknown method '{}'. Use one of: {}", method, CALC_METHODS.join(", ")))?;
        config.salah.calc_method = method.clone();
    }
    if let Some(madhab) = &madhab {
        parse_madhab(madhab)?;
        config.salah.madhab = madhab.clone();
    }
    if let Some(tz) = &tz {
        config.salah.timezone_offset = parse_tz_offset(tz)?;
        config.salah.offset()?;
    }
    if let Some(name) = name {
        config.salah.location_name = name;
    }
    config.salah.latitude = Some(lat);
    config.salah.longitude = Some(lng);
    config.save()?;

    println_colored!(GREEN, "  ✓ Saved {} ({:.4}, {:.4})", config.salah.location_name, lat, lng);
    println_colored!(
        DIM,
        "  {} · {} · UTC{}",
        config.salah.calc_method,
        config.salah.madhab,
        format_tz_offset(config.salah.timezone_offset)
    );
    Ok(())
}

// ─── Times ───────────────────────────────────────────────────────────────────

pub fn handle_times(engine: &Engine, config: &AppConfig, refresh: bool) -> Result<()> {
    if refresh {
        engine.refresh_schedule()?;
    }
    let snapshot = engine.today_schedule()?;
    let schedule = &snapshot.schedule;
    let offset = engine.cache().offset();
    let now = engine.now();

    println!();
    println_colored!(
        GOLD,
        "  Prayer Times · {} ({})",
        config.salah.location_name,
        schedule.date
    );
    if snapshot.stale {
        println_colored!(AMBER, "  Showing last known times; could not compute today's");
    }
    println!();

    let rows = [
        ("Fajr", schedule.fajr),
        ("Sunrise", schedule.sunrise),
        ("Zuhr", schedule.zuhr),
        ("Asr", schedule.asr),
        ("Maghrib", schedule.maghrib),
        ("Isha", schedule.isha),
    ];
    for (name, at) in &rows {
        let time_str = format_local_time(*at, offset);
        if *at < now {
            println_colored!(DIM, "  {:<10}  {}", name, time_str);
        } else {
            println_colored!(BOLD, "  {:<10}  {}", name, time_str);
        }
    }
    println_colored!(DIM, "  {:<10}  {:.1}°", "Qibla", schedule.qibla_bearing);

    if !snapshot.stale {
        if let Some(current) = engine.current_prayer()? {
            println!();
            println_colored!(DIM, "  Current: {}", current.display_name());
        }
        let (next, at) = engine.next_prayer()?;
        println_colored!(
            AMBER,
            "  Next: {} in {}",
            next.display_name(),
            format_duration_secs((at - now).num_seconds())
        );
    }
    println!();
    Ok(())
}

// ─── Status ──────────────────────────────────────────────────────────────────

pub fn handle_status(engine: &Engine, date: Option<&str>) -> Result<()> {
    let date = parse_date(engine, date)?;
    let statuses = engine.day_statuses(date)?;

    println!();
    println_colored!(GOLD, "  Prayers · {}", date);
    println!();
    for (prayer, status) in statuses {
        println_colored!(
            status_color(status),
            "  {} {:<10}  {}",
            status_icon(status),
            prayer.display_name(),
            status.label()
        );
    }
    if engine.can_undo() {
        println!();
        println_colored!(DIM, "  `muwaqqit undo` reverts the last change");
    }
    println!();
    Ok(())
}

// ─── Mark / undo / reset ─────────────────────────────────────────────────────

pub fn handle_mark(
    engine: &Engine,
    prayer_str: &str,
    late: bool,
    missed: bool,
    clear: bool,
    date: Option<&str>,
) -> Result<()> {
    let prayer = PrayerName::from_str(prayer_str)?;
    let date = parse_date(engine, date)?;
    let status = if clear {
        PrayerStatus::Unmarked
    } else if missed {
        PrayerStatus::Missed
    } else if late {
        PrayerStatus::Late
    } else {
        PrayerStatus::OnTime
    };

    match engine.log_prayer(date, prayer, status) {
        Ok(()) => {}
        Err(e @ EngineError::PersistenceFailure(_)) => report_engine_error(&e),
        Err(e) => return Err(e.into()),
    }

    if clear {
        println_colored!(DIM, "  ○ {} cleared for {}", prayer.display_name(), date);
    } else {
        println_colored!(
            status_color(status),
            "  {} {} marked {}",
            status_icon(status),
            prayer.display_name(),
            status.label()
        );
    }
    Ok(())
}

pub fn handle_undo(engine: &Engine) -> Result<()> {
    match engine.undo() {
        Ok(Some(entry)) => {
            let restored = entry.previous_status.unwrap_or(PrayerStatus::Unmarked);
            println_colored!(
                GREEN,
                "  ↶ {} on {} restored to {}",
                entry.prayer.display_name(),
                entry.date,
                restored.label()
            );
        }
        Ok(None) => println_colored!(DIM, "  Nothing to undo"),
        Err(e) => report_engine_error(&e),
    }
    Ok(())
}

pub fn handle_reset(engine: &Engine, today: bool, all: bool) -> Result<()> {
    let result = if all {
        engine.reset_history()
    } else if today {
        engine.reset_today()
    } else {
        return Err(anyhow!("Choose --today or --all"));
    };
    match result {
        Ok(()) if all => println_colored!(AMBER, "  History cleared"),
        Ok(()) => println_colored!(AMBER, "  Today's log cleared"),
        Err(e) => report_engine_error(&e),
    }
    Ok(())
}

// ─── Stats ───────────────────────────────────────────────────────────────────

pub fn handle_stats(engine: &Engine, days: usize) -> Result<()> {
    let streak = engine.streak();
    let percentage = engine.on_time_percentage(days);
    let tally = status_tally(&engine.log_snapshot());

    println!();
    println_colored!(GOLD, "  Statistics");
    println!();
    println_colored!(
        BOLD,
        "  Streak:      {} days current  |  {} days best",
        streak.current,
        streak.best
    );
    println!(
        "  On time:     {:>3}%  {}  (last {} days)",
        percentage,
        progress_bar(percentage, 100, 20),
        days
    );
    println_colored!(
        DIM,
        "  Recorded:    {} on time · {} late · {} missed",
        tally.on_time,
        tally.late,
        tally.missed
    );

    let snapshot = engine.log_snapshot();
    let today = engine.today();
    let week_start = today - chrono::Duration::days(6);
    println!();
    println_colored!(DIM, "  Last 7 days  (● = 5/5 on time, ◑ = some, ○ = none)");
    print!("  ");
    for date in week_start.iter_days().take_while(|d| *d <= today) {
        let icon = match snapshot.log_for(date) {
            Some(log) if log.is_fully_on_time() => format!("{}●\x1b[0m ", GREEN),
            Some(log) if !log.is_empty() => format!("{}◑\x1b[0m ", AMBER),
            _ => format!("{}○\x1b[0m ", DIM),
        };
        print!("{}", icon);
    }
    println!();
    println!();
    Ok(())
}

// ─── Reminders ───────────────────────────────────────────────────────────────

fn print_report(engine: &Engine, report: &ReconcileReport) {
    let offset = engine.cache().offset();
    println!();
    println_colored!(GOLD, "  Reminders");
    println!();
    if report.scheduled.is_empty() {
        println_colored!(DIM, "  No reminders left for today");
    }
    for r in &report.scheduled {
        println!("  {}  {:<18}  {}", format_local_time(r.fires_at, offset), r.title, r.body);
    }
    if report.suppressed > 0 {
        println_colored!(DIM, "  {} silenced by quiet hours", report.suppressed);
    }
    for w in &report.warnings {
        println_colored!(AMBER, "  ! {}", w);
    }
    println!();
}

pub fn handle_remind(engine: &Engine) -> Result<()> {
    let report = engine.reconcile_reminders()?;
    print_report(engine, &report);
    Ok(())
}

pub fn handle_notify_set(
    engine: &Engine,
    prayer_str: &str,
    sound: Option<&str>,
    pre: Option<u32>,
) -> Result<()> {
    let prayer = PrayerName::from_str(prayer_str)?;
    let mut prefs = engine.notification_settings()?.get(prayer);
    if let Some(sound) = sound {
        prefs.sound = SoundKind::from_str(sound)?;
    }
    if let Some(pre) = pre {
        prefs.pre_notification = PreNotification::try_from(pre)?;
    }
    engine.set_prayer_notification(prayer, prefs)?;
    println_colored!(
        GREEN,
        "  ✓ {}: sound {}, {} min before",
        prayer.display_name(),
        prefs.sound.as_str(),
        prefs.pre_notification.minutes()
    );
    refresh_reminders(engine);
    Ok(())
}

pub fn handle_notify_quiet(
    engine: &Engine,
    start: Option<&str>,
    end: Option<&str>,
    off: bool,
) -> Result<()> {
    if off {
        engine.set_quiet_hours(None)?;
        println_colored!(GREEN, "  ✓ Quiet hours off");
    } else {
        let (start, end) = start
            .zip(end)
            .ok_or_else(|| anyhow!("Give both start and end, e.g. 22:00 06:00"))?;
        let quiet = QuietHours::new(parse_hhmm(start)?, parse_hhmm(end)?);
        engine.set_quiet_hours(Some(quiet))?;
        println_colored!(
            GREEN,
            "  ✓ Quiet hours {}–{}",
            quiet.start.format("%H:%M"),
            quiet.end.format("%H:%M")
        );
    }
    refresh_reminders(engine);
    Ok(())
}

pub fn handle_notify_show(engine: &Engine) -> Result<()> {
    let settings = engine.notification_settings()?;
    println!();
    println_colored!(GOLD, "  Reminder preferences");
    println!();
    for prayer in PrayerName::ALL {
        let prefs = settings.get(prayer);
        let pre = match prefs.pre_notification.minutes() {
            0 => "no early reminder".to_string(),
            m => format!("{} min before", m),
        };
        println!("  {:<10}  {:<8}  {}", prayer.display_name(), prefs.sound.as_str(), pre);
    }
    match engine.quiet_hours()? {
        Some(q) => println_colored!(
            DIM,
            "  Quiet hours {}–{}",
            q.start.format("%H:%M"),
            q.end.format("%H:%M")
        ),
        None => println_colored!(DIM, "  Quiet hours off"),
    }
    println!();
    Ok(())
}

/// Preference changes take effect immediately; a missing location only
/// postpones that until the next `remind`.
fn refresh_reminders(engine: &Engine) {
    if let Err(e) = engine.reconcile_reminders() {
        log::warn!("Reminders not refreshed: {}", e);
    }
}

// ─── Watch ───────────────────────────────────────────────────────────────────

const DELIVERY_POLL: Duration = Duration::from_secs(30);

pub fn handle_watch(engine: Arc<Engine>, platform: Arc<SqlitePlatform>) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async move {
        log::info!("Watching prayer times");
        match engine.reconcile_reminders() {
            Ok(report) => print_report(&engine, &report),
            Err(e) => report_engine_error(&e),
        }
        let _midnight = engine.spawn_midnight_refresh();

        let mut interval = tokio::time::interval(DELIVERY_POLL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let offset = engine.cache().offset();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match platform.take_due(Utc::now()) {
                        Ok(due) => {
                            for r in due {
                                let bell = if r.sound == SoundKind::Off { "" } else { "\x07" };
                                println_colored!(
                                    GOLD,
                                    "{}  {}  {} · {}",
                                    bell,
                                    format_local_time(r.fires_at, offset),
                                    r.title,
                                    r.body
                                );
                            }
                        }
                        Err(e) => log::error!("Failed to read due reminders: {:#}", e),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Stopping watch");
                    break;
                }
            }
        }
        Ok(())
    })
}
