//! Compliance classification of a single prayer against the clock.

use chrono::{DateTime, Utc};

use crate::models::{DailySchedule, PrayerName, PrayerStatus};

/// Classify one prayer.
///
/// A recorded status always wins. Otherwise the prayer is `Unmarked` until its
/// instant, `Late` while the next prayer has not begun, and `Missed` once it
/// has. Without a known next instant the prayer can only be `Late`.
pub fn classify(
    now: DateTime<Utc>,
    prayer_instant: DateTime<Utc>,
    next_prayer_instant: Option<DateTime<Utc>>,
    recorded: Option<PrayerStatus>,
) -> PrayerStatus {
    if let Some(status) = recorded {
        return status;
    }
    if now < prayer_instant {
        return PrayerStatus::Unmarked;
    }
    match next_prayer_instant {
        Some(next) if now >= next => PrayerStatus::Missed,
        _ => PrayerStatus::Late,
    }
}

/// The instant at which `prayer`'s window closes. Isha closes at the
/// following day's Fajr, so `tomorrow` is needed for it.
pub fn next_boundary(
    today: &DailySchedule,
    tomorrow: Option<&DailySchedule>,
    prayer: PrayerName,
) -> Option<DateTime<Utc>> {
    match prayer.next_in_day() {
        Some(next) => Some(today.time_of(next)),
        None => tomorrow.map(|t| t.fajr),
    }
}

/// Classify `prayer` on `today`'s schedule.
pub fn classify_in_schedule(
    now: DateTime<Utc>,
    today: &DailySchedule,
    tomorrow: Option<&DailySchedule>,
    prayer: PrayerName,
    recorded: Option<PrayerStatus>,
) -> PrayerStatus {
    classify(
        now,
        today.time_of(prayer),
        next_boundary(today, tomorrow, prayer),
        recorded,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;

    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn schedule() -> DailySchedule {
        DailySchedule {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            fajr: at(5, 0),
            sunrise: at(6, 20),
            zuhr: at(12, 10),
            asr: at(15, 40),
            maghrib: at(18, 20),
            isha: at(19, 50),
            qibla_bearing: 0.0,
        }
    }

    fn tomorrow() -> DailySchedule {
        let mut s = schedule();
        s.date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        s.fajr = Utc.with_ymd_and_hms(2024, 5, 2, 4, 59, 0).unwrap();
        s
    }

    #[test]
    fn test_midday_unrecorded_after_start_is_late() {
        let s = schedule();
        let status = classify_in_schedule(at(12, 30), &s, None, PrayerName::Zuhr, None);
        assert_eq!(status, PrayerStatus::Late);
    }

    #[test]
    fn test_recorded_dawn_wins_over_clock() {
        let s = schedule();
        let status = classify_in_schedule(
            at(12, 30),
            &s,
            None,
            PrayerName::Fajr,
            Some(PrayerStatus::OnTime),
        );
        assert_eq!(status, PrayerStatus::OnTime);
    }

    #[test]
    fn test_dawn_unrecorded_after_midday_is_missed() {
        let s = schedule();
        let status = classify_in_schedule(at(12, 30), &s, None, PrayerName::Fajr, None);
        assert_eq!(status, PrayerStatus::Missed);
    }

    #[test]
    fn test_isha_missed_only_after_tomorrows_fajr() {
        let s = schedule();
        let t = tomorrow();
        let before = Utc.with_ymd_and_hms(2024, 5, 2, 4, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 2, 5, 0, 0).unwrap();

        assert_eq!(
            classify_in_schedule(before, &s, Some(&t), PrayerName::Isha, None),
            PrayerStatus::Late
        );
        assert_eq!(
            classify_in_schedule(after, &s, Some(&t), PrayerName::Isha, None),
            PrayerStatus::Missed
        );
    }

    #[test]
    fn test_isha_without_tomorrow_stays_late() {
        let s = schedule();
        let late_night = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        assert_eq!(
            classify_in_schedule(late_night, &s, None, PrayerName::Isha, None),
            PrayerStatus::Late
        );
    }

    #[test]
    fn test_exactly_at_next_instant_is_missed() {
        assert_eq!(
            classify(at(15, 40), at(12, 10), Some(at(15, 40)), None),
            PrayerStatus::Missed
        );
    }

    fn any_status() -> impl Strategy<Value = PrayerStatus> {
        prop_oneof![
            Just(PrayerStatus::OnTime),
            Just(PrayerStatus::Late),
            Just(PrayerStatus::Missed),
            Just(PrayerStatus::Unmarked),
        ]
    }

    proptest! {
        #[test]
        fn prop_not_yet_due_is_unmarked(
            now in 0i64..1_000_000,
            gap in 1i64..1_000_000,
            next in proptest::option::of(0i64..3_000_000),
        ) {
            let now_t = Utc.timestamp_opt(now, 0).unwrap();
            let prayer_t = Utc.timestamp_opt(now + gap, 0).unwrap();
            let next_t = next.map(|n| Utc.timestamp_opt(n, 0).unwrap());
            prop_assert_eq!(classify(now_t, prayer_t, next_t, None), PrayerStatus::Unmarked);
        }

        #[test]
        fn prop_recorded_status_always_wins(
            now in 0i64..3_000_000,
            prayer in 0i64..3_000_000,
            next in proptest::option::of(0i64..3_000_000),
            status in any_status(),
        ) {
            let now_t = Utc.timestamp_opt(now, 0).unwrap();
            let prayer_t = Utc.timestamp_opt(prayer, 0).unwrap();
            let next_t = next.map(|n| Utc.timestamp_opt(n, 0).unwrap());
            prop_assert_eq!(classify(now_t, prayer_t, next_t, Some(status)), status);
        }
    }
}
