pub mod log;
pub mod notification;
pub mod prayer;
pub mod schedule;
pub mod stats;

pub use self::log::{DailyPrayerLog, UndoEntry};
pub use notification::{
    NotificationSettings, PreNotification, PrayerNotificationSettings, QuietHours, ReminderKind,
    ScheduledReminder, SoundKind,
};
pub use prayer::{PrayerName, PrayerStatus};
pub use schedule::{DailySchedule, ScheduleSnapshot};
pub use stats::{DayRecord, Streak};
