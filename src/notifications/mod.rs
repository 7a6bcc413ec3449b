pub mod platform;
pub mod scheduler;

pub use platform::{MockPlatform, NotificationPlatform, PlatformReminder, ReminderId, SqlitePlatform};
pub use scheduler::{plan_reminders, ReconcileReport, ReminderPlan, ReminderScheduler};
