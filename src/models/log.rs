use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{PrayerName, PrayerStatus};

/// Recorded decisions for one calendar date. `None` means the user has not
/// decided; the displayed status is then derived from the clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrayerLog {
    pub date: NaiveDate,
    pub fajr: Option<PrayerStatus>,
    pub zuhr: Option<PrayerStatus>,
    pub asr: Option<PrayerStatus>,
    pub maghrib: Option<PrayerStatus>,
    pub isha: Option<PrayerStatus>,
    pub updated_at: DateTime<Utc>,
}

impl DailyPrayerLog {
    pub fn empty(date: NaiveDate, updated_at: DateTime<Utc>) -> Self {
        Self {
            date,
            fajr: None,
            zuhr: None,
            asr: None,
            maghrib: None,
            isha: None,
            updated_at,
        }
    }

    pub fn get(&self, prayer: PrayerName) -> Option<PrayerStatus> {
        match prayer {
            PrayerName::Fajr => self.fajr,
            PrayerName::Zuhr => self.zuhr,
            PrayerName::Asr => self.asr,
            PrayerName::Maghrib => self.maghrib,
            PrayerName::Isha => self.isha,
        }
    }

    pub fn set(&mut self, prayer: PrayerName, status: Option<PrayerStatus>) {
        let slot = match prayer {
            PrayerName::Fajr => &mut self.fajr,
            PrayerName::Zuhr => &mut self.zuhr,
            PrayerName::Asr => &mut self.asr,
            PrayerName::Maghrib => &mut self.maghrib,
            PrayerName::Isha => &mut self.isha,
        };
        *slot = status;
    }

    pub fn statuses(&self) -> impl Iterator<Item = Option<PrayerStatus>> + '_ {
        PrayerName::ALL.into_iter().map(|p| self.get(p))
    }

    pub fn recorded_count(&self) -> usize {
        self.statuses().flatten().count()
    }

    pub fn on_time_count(&self) -> usize {
        self.statuses()
            .filter(|s| *s == Some(PrayerStatus::OnTime))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded_count() == 0
    }

    /// All five prayers recorded as on time.
    pub fn is_fully_on_time(&self) -> bool {
        self.on_time_count() == PrayerName::ALL.len()
    }
}

/// Inverse of one `log_prayer` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub date: NaiveDate,
    pub prayer: PrayerName,
    pub previous_status: Option<PrayerStatus>,
}
