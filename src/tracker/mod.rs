pub mod log_store;

pub use log_store::{LogState, PrayerLogStore, DEFAULT_UNDO_DEPTH};
