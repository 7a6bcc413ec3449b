use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::EngineError;
use crate::models::PrayerName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    /// Full call to prayer.
    Primary,
    /// Plain alert tone.
    Simple,
    Off,
}

impl SoundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundKind::Primary => "primary",
            SoundKind::Simple => "simple",
            SoundKind::Off => "off",
        }
    }
}

impl FromStr for SoundKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" | "adhan" => Ok(SoundKind::Primary),
            "simple" | "tone" => Ok(SoundKind::Simple),
            "off" | "none" => Ok(SoundKind::Off),
            _ => Err(EngineError::InvalidInput(format!(
                "Unknown sound '{}'. Use: primary, simple, off",
                s
            ))),
        }
    }
}

/// Lead time for the optional pre-reminder. Only these values are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PreNotification {
    #[default]
    None,
    Ten,
    Fifteen,
    Twenty,
    Thirty,
}

impl PreNotification {
    pub fn minutes(&self) -> u32 {
        match self {
            PreNotification::None => 0,
            PreNotification::Ten => 10,
            PreNotification::Fifteen => 15,
            PreNotification::Twenty => 20,
            PreNotification::Thirty => 30,
        }
    }
}

impl TryFrom<u32> for PreNotification {
    type Error = EngineError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            0 => Ok(PreNotification::None),
            10 => Ok(PreNotification::Ten),
            15 => Ok(PreNotification::Fifteen),
            20 => Ok(PreNotification::Twenty),
            30 => Ok(PreNotification::Thirty),
            other => Err(EngineError::InvalidInput(format!(
                "Pre-notification must be 0, 10, 15, 20 or 30 minutes, got {}",
                other
            ))),
        }
    }
}

impl From<PreNotification> for u32 {
    fn from(p: PreNotification) -> u32 {
        p.minutes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerNotificationSettings {
    pub sound: SoundKind,
    #[serde(default)]
    pub pre_notification: PreNotification,
}

impl Default for PrayerNotificationSettings {
    fn default() -> Self {
        Self {
            sound: SoundKind::Primary,
            pre_notification: PreNotification::None,
        }
    }
}

/// Settings for all five prayers. Missing prayers fall back to the default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub prayers: BTreeMap<PrayerName, PrayerNotificationSettings>,
}

impl NotificationSettings {
    pub fn uniform(settings: PrayerNotificationSettings) -> Self {
        Self {
            prayers: PrayerName::ALL.into_iter().map(|p| (p, settings)).collect(),
        }
    }

    pub fn get(&self, prayer: PrayerName) -> PrayerNotificationSettings {
        self.prayers.get(&prayer).copied().unwrap_or_default()
    }

    pub fn set(&mut self, prayer: PrayerName, settings: PrayerNotificationSettings) {
        self.prayers.insert(prayer, settings);
    }
}

/// Daily local wall-clock window in which reminders are dropped.
/// `start > end` wraps midnight; `start == end` is an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            t >= self.start && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Main,
    Pre,
}

/// A reminder computed for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledReminder {
    pub id: String,
    pub prayer: PrayerName,
    pub kind: ReminderKind,
    pub fires_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_quiet_hours_wrapping_midnight() {
        let quiet = QuietHours::new(t(22, 0), t(6, 0));
        assert!(quiet.contains(t(23, 0)));
        assert!(quiet.contains(t(2, 30)));
        assert!(!quiet.contains(t(6, 0)));
        assert!(!quiet.contains(t(12, 0)));
    }

    #[test]
    fn test_quiet_hours_same_day_and_empty() {
        let quiet = QuietHours::new(t(13, 0), t(14, 0));
        assert!(quiet.contains(t(13, 30)));
        assert!(!quiet.contains(t(14, 0)));

        let empty = QuietHours::new(t(9, 0), t(9, 0));
        assert!(!empty.contains(t(9, 0)));
    }

    #[test]
    fn test_pre_notification_rejects_unsupported_minutes() {
        assert_eq!(PreNotification::try_from(15).unwrap().minutes(), 15);
        assert!(PreNotification::try_from(5).is_err());
        assert!(serde_json::from_str::<PreNotification>("25").is_err());
    }

    #[test]
    fn test_missing_prayer_settings_fall_back_to_default() {
        let settings = NotificationSettings::default();
        assert_eq!(settings.get(PrayerName::Asr).sound, SoundKind::Primary);
    }
}
