//! Muwaqqit library
//!
//! Prayer schedule caching, status classification, the prayer log with
//! bounded undo, streak analytics and reminder reconciliation. The CLI in
//! `main.rs` is one front-end over [`Engine`].

pub mod analytics;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod notifications;
pub mod prayer_times;
pub mod tracker;
pub mod traits;

// Re-export commonly used types
pub use engine::{Engine, EngineOptions};
pub use error::{EngineError, Result};
pub use models::{
    DailyPrayerLog, DailySchedule, NotificationSettings, PreNotification, PrayerName,
    PrayerNotificationSettings, PrayerStatus, QuietHours, ScheduleSnapshot, SoundKind, Streak,
    UndoEntry,
};
pub use notifications::{NotificationPlatform, ReconcileReport, ReminderScheduler};
pub use prayer_times::{
    ConfiguredLocation, Convention, Coordinates, EphemerisProvider, EphemerisTimes,
    LocationProvider, SalahEphemeris, ScheduleCache,
};
pub use traits::{Clock, MockClock, SystemClock};
