use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::{EngineError, Result};

/// Key-addressed durable storage. No multi-key atomicity is assumed.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    /// All keys starting with `prefix`, sorted. Only used to rebuild state
    /// at start-up.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Well-known keys.
pub mod keys {
    use chrono::NaiveDate;

    pub const LOG_PREFIX: &str = "log:";
    pub const UNDO_STACK: &str = "undo_stack";
    pub const NOTIFICATION_PREFS: &str = "prefs:notifications";
    pub const QUIET_HOURS: &str = "prefs:quiet_hours";
    pub const REMINDER_TRACE: &str = "reminders:prayer";

    pub fn log(date: NaiveDate) -> String {
        format!("{}{}", LOG_PREFIX, date.format("%Y-%m-%d"))
    }
}

/// In-memory store for tests and ephemeral sessions. Writes can be made to
/// fail to exercise persistence error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<BTreeMap<String, String>>>,
    failing: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(EngineError::PersistenceFailure(
                "store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.check()?;
        Ok(self
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
