//! Streak and consistency metrics.
//!
//! The core functions work on any per-day series (`DayRecord` keyed by date)
//! so prayer history and yes/no habits share the same date-walking logic.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{DayRecord, PrayerStatus, Streak};
use crate::tracker::LogState;

/// Number of complete days counted back from the most recent recorded date.
///
/// Dates are walked in descending key order; days without any record at the
/// head are skipped, and the first day that is not complete ends the streak.
/// Calendar gaps between stored dates do not break the chain.
pub fn current_streak(days: &BTreeMap<NaiveDate, DayRecord>) -> u32 {
    days.values()
        .rev()
        .skip_while(|d| !d.has_record())
        .take_while(|d| d.complete)
        .count() as u32
}

/// Share of compliant entries among recorded ones over the `window_days` most
/// recent dates that have at least one record, as a rounded percentage.
/// Returns 0 when nothing is recorded.
pub fn on_time_percentage(days: &BTreeMap<NaiveDate, DayRecord>, window_days: usize) -> u32 {
    let (hits, recorded) = days
        .values()
        .rev()
        .filter(|d| d.has_record())
        .take(window_days)
        .fold((0u32, 0u32), |(h, r), d| (h + d.hits, r + d.recorded));

    if recorded == 0 {
        return 0;
    }
    (hits as f64 * 100.0 / recorded as f64).round() as u32
}

/// Longest run of calendar-consecutive dates. Input order and duplicates do
/// not matter.
pub fn longest_streak(dates: &[NaiveDate]) -> u32 {
    let mut sorted = dates.to_vec();
    sorted.sort();
    sorted.dedup();

    let Some(first) = sorted.first() else {
        return 0;
    };

    let mut best = 1u32;
    let mut current = 1u32;
    let mut prev = *first;
    for &date in &sorted[1..] {
        if prev.succ_opt() == Some(date) {
            current += 1;
        } else {
            current = 1;
        }
        best = best.max(current);
        prev = date;
    }
    best
}

/// Per-day prayer records: a day is complete when all five prayers were
/// logged on time; hits are on-time entries among recorded ones.
pub fn prayer_day_records(state: &LogState) -> BTreeMap<NaiveDate, DayRecord> {
    state
        .logs
        .iter()
        .map(|(date, log)| {
            let record = DayRecord {
                recorded: log.recorded_count() as u32,
                hits: log.on_time_count() as u32,
                complete: log.is_fully_on_time(),
            };
            (*date, record)
        })
        .collect()
}

/// Per-day records for a yes/no habit (adhkar, tahajjud, ...).
pub fn habit_day_records<I>(days: I) -> BTreeMap<NaiveDate, DayRecord>
where
    I: IntoIterator<Item = (NaiveDate, bool)>,
{
    days.into_iter()
        .map(|(date, done)| (date, DayRecord::from_bool(done)))
        .collect()
}

/// Dates that satisfied their series' full-compliance rule.
pub fn completed_dates(days: &BTreeMap<NaiveDate, DayRecord>) -> Vec<NaiveDate> {
    days.iter()
        .filter(|(_, d)| d.complete)
        .map(|(date, _)| *date)
        .collect()
}

pub fn streak(days: &BTreeMap<NaiveDate, DayRecord>) -> Streak {
    Streak {
        current: current_streak(days),
        best: longest_streak(&completed_dates(days)),
    }
}

/// Counts of each recorded status in a log snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusTally {
    pub on_time: u32,
    pub late: u32,
    pub missed: u32,
}

pub fn status_tally(state: &LogState) -> StatusTally {
    let mut tally = StatusTally::default();
    for status in state.logs.values().flat_map(|log| log.statuses().flatten()) {
        match status {
            PrayerStatus::OnTime => tally.on_time += 1,
            PrayerStatus::Late => tally.late += 1,
            PrayerStatus::Missed => tally.missed += 1,
            PrayerStatus::Unmarked => {}
        }
    }
    tally
}
