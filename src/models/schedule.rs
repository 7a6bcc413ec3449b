use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PrayerName;

/// One day's timetable at one location. Never mutated; a refresh replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub date: NaiveDate,
    pub fajr: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub zuhr: DateTime<Utc>,
    pub asr: DateTime<Utc>,
    pub maghrib: DateTime<Utc>,
    pub isha: DateTime<Utc>,
    /// Degrees clockwise from true north.
    pub qibla_bearing: f64,
}

impl DailySchedule {
    pub fn time_of(&self, prayer: PrayerName) -> DateTime<Utc> {
        match prayer {
            PrayerName::Fajr => self.fajr,
            PrayerName::Zuhr => self.zuhr,
            PrayerName::Asr => self.asr,
            PrayerName::Maghrib => self.maghrib,
            PrayerName::Isha => self.isha,
        }
    }

    /// The five prayers paired with their instants, in daily order.
    pub fn prayers(&self) -> [(PrayerName, DateTime<Utc>); 5] {
        PrayerName::ALL.map(|p| (p, self.time_of(p)))
    }
}

/// A schedule as presented to callers, flagged when it is not today's.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSnapshot {
    pub schedule: std::sync::Arc<DailySchedule>,
    pub stale: bool,
}
