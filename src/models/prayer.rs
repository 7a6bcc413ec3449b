use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EngineError;

/// The five obligatory prayers, in daily order. Sunrise is a boundary of the
/// timetable but never a loggable prayer, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerName {
    Fajr,
    Zuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    pub const ALL: [PrayerName; 5] = [
        PrayerName::Fajr,
        PrayerName::Zuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "fajr",
            PrayerName::Zuhr => "zuhr",
            PrayerName::Asr => "asr",
            PrayerName::Maghrib => "maghrib",
            PrayerName::Isha => "isha",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "Fajr",
            PrayerName::Zuhr => "Zuhr",
            PrayerName::Asr => "Asr",
            PrayerName::Maghrib => "Maghrib",
            PrayerName::Isha => "Isha",
        }
    }

    /// The prayer that follows within the same day; `None` for Isha.
    pub fn next_in_day(&self) -> Option<PrayerName> {
        match self {
            PrayerName::Fajr => Some(PrayerName::Zuhr),
            PrayerName::Zuhr => Some(PrayerName::Asr),
            PrayerName::Asr => Some(PrayerName::Maghrib),
            PrayerName::Maghrib => Some(PrayerName::Isha),
            PrayerName::Isha => None,
        }
    }
}

impl std::fmt::Display for PrayerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PrayerName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fajr" | "dawn" => Ok(PrayerName::Fajr),
            "zuhr" | "dhuhr" | "dhuhur" | "midday" => Ok(PrayerName::Zuhr),
            "asr" | "afternoon" => Ok(PrayerName::Asr),
            "maghrib" | "sunset" => Ok(PrayerName::Maghrib),
            "isha" | "night" => Ok(PrayerName::Isha),
            _ => Err(EngineError::InvalidInput(format!(
                "Unknown prayer '{}'. Use: fajr, zuhr, asr, maghrib, isha",
                s
            ))),
        }
    }
}

/// Compliance state of one prayer.
///
/// `Unmarked` means no decision exists and the prayer is not yet due. It is
/// never persisted by the clock; only an explicit user action stores a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrayerStatus {
    OnTime,
    Late,
    Missed,
    Unmarked,
}

impl PrayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerStatus::OnTime => "onTime",
            PrayerStatus::Late => "late",
            PrayerStatus::Missed => "missed",
            PrayerStatus::Unmarked => "unmarked",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PrayerStatus::OnTime => "on time",
            PrayerStatus::Late => "late",
            PrayerStatus::Missed => "missed",
            PrayerStatus::Unmarked => "unmarked",
        }
    }
}

impl std::fmt::Display for PrayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for PrayerStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "ontime" | "done" => Ok(PrayerStatus::OnTime),
            "late" => Ok(PrayerStatus::Late),
            "missed" => Ok(PrayerStatus::Missed),
            "unmarked" => Ok(PrayerStatus::Unmarked),
            _ => Err(EngineError::InvalidInput(format!(
                "Unknown prayer status: {}",
                s
            ))),
        }
    }
}
