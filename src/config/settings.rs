use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, NaiveTime};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{
    NotificationSettings, PreNotification, PrayerNotificationSettings, QuietHours, SoundKind,
};
use crate::prayer_times::Convention;
use crate::tracker::DEFAULT_UNDO_DEPTH;

fn default_location_name() -> String {
    "Unknown".to_string()
}
fn default_calc_method() -> String {
    "MuslimWorldLeague".to_string()
}
fn default_madhab() -> String {
    "Hanafi".to_string()
}
fn default_sound() -> SoundKind {
    SoundKind::Primary
}
fn default_undo_depth() -> usize {
    DEFAULT_UNDO_DEPTH
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalahConfig {
    #[serde(default = "default_location_name")]
    pub location_name: String,
    /// No coordinates means no schedule until `setup` is run.
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_calc_method")]
    pub calc_method: String,
    #[serde(default = "default_madhab")]
    pub madhab: String,
    #[serde(default)]
    pub timezone_offset: i32, // minutes from UTC
}

impl Default for SalahConfig {
    fn default() -> Self {
        Self {
            location_name: default_location_name(),
            latitude: None,
            longitude: None,
            calc_method: default_calc_method(),
            madhab: default_madhab(),
            timezone_offset: 0,
        }
    }
}

impl SalahConfig {
    pub fn convention(&self) -> Convention {
        Convention {
            method: self.calc_method.clone(),
            madhab: self.madhab.clone(),
        }
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.timezone_offset * 60)
            .ok_or_else(|| anyhow!("Invalid timezone offset: {}", self.timezone_offset))
    }
}

/// Defaults for reminders; changes made from the CLI are stored in the
/// database and take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_sound")]
    pub sound: SoundKind,
    #[serde(default)]
    pub pre_minutes: u32,
    /// "HH:MM"
    #[serde(default)]
    pub quiet_start: Option<String>,
    #[serde(default)]
    pub quiet_end: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sound: default_sound(),
            pre_minutes: 0,
            quiet_start: None,
            quiet_end: None,
        }
    }
}

impl NotificationConfig {
    pub fn default_settings(&self) -> Result<NotificationSettings> {
        let pre_notification = PreNotification::try_from(self.pre_minutes)?;
        Ok(NotificationSettings::uniform(PrayerNotificationSettings {
            sound: self.sound,
            pre_notification,
        }))
    }

    pub fn quiet_hours(&self) -> Result<Option<QuietHours>> {
        match (&self.quiet_start, &self.quiet_end) {
            (Some(start), Some(end)) => Ok(Some(QuietHours::new(
                parse_hhmm(start)?,
                parse_hhmm(end)?,
            ))),
            (None, None) => Ok(None),
            _ => Err(anyhow!("Both quiet_start and quiet_end must be set")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_undo_depth")]
    pub undo_depth: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            undo_depth: default_undo_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub salah: SalahConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl AppConfig {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "muwaqqit")
            .context("Could not determine project directories")
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn db_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("muwaqqit.db"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(&path).with_context(|| format!("Reading {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Parsing config.toml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Serializing config")?;
        std::fs::write(&path, content).with_context(|| format!("Writing {:?}", path))?;
        Ok(())
    }

    pub fn ensure_data_dir() -> Result<PathBuf> {
        let dir = Self::data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| anyhow!("Bad time '{}': {}", s, e))
}

/// Parse a UTC offset string into total minutes.
/// Accepts: "5:30", "+5:30", "-5:30", "5", "+5", "5.5"
pub fn parse_tz_offset(s: &str) -> Result<i32> {
    let s = s.trim_start_matches('+');
    let negative = s.starts_with('-');
    let s = s.trim_start_matches('-');
    let sign = if negative { -1 } else { 1 };

    let minutes = if s.contains(':') {
        let mut parts = s.splitn(2, ':');
        let hours: i32 = parts.next().unwrap_or("0").parse()?;
        let mins: i32 = parts.next().unwrap_or("0").parse()?;
        hours * 60 + mins
    } else if s.contains('.') {
        let hours: f64 = s.parse()?;
        (hours * 60.0).round() as i32
    } else {
        let hours: i32 = s.parse()?;
        hours * 60
    };

    Ok(sign * minutes)
}
