//! Persistent per-date prayer log with a bounded undo history.
//!
//! The whole state lives behind one `Arc`. Writers clone it, apply their
//! change and swap the new `Arc` in, so a reader holding a snapshot never sees
//! a half-applied mutation. Writers are serialized, which keeps the undo
//! history in call order.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};

use crate::db::{keys, Store};
use crate::error::Result;
use crate::models::{DailyPrayerLog, PrayerName, PrayerStatus, UndoEntry};

pub const DEFAULT_UNDO_DEPTH: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogState {
    pub logs: BTreeMap<NaiveDate, DailyPrayerLog>,
    /// Oldest first; the back is the next entry to undo.
    pub undo: VecDeque<UndoEntry>,
}

impl LogState {
    pub fn recorded(&self, date: NaiveDate, prayer: PrayerName) -> Option<PrayerStatus> {
        self.logs.get(&date).and_then(|log| log.get(prayer))
    }

    pub fn log_for(&self, date: NaiveDate) -> Option<&DailyPrayerLog> {
        self.logs.get(&date)
    }
}

/// Keys touched by a mutation that must be written through.
enum Dirty {
    Log(NaiveDate),
    AllLogs,
    Undo,
}

pub struct PrayerLogStore {
    state: RwLock<Arc<LogState>>,
    writer: Mutex<()>,
    store: Arc<dyn Store>,
    depth: usize,
}

impl PrayerLogStore {
    /// Empty log that writes through to `store`.
    pub fn new(store: Arc<dyn Store>, depth: usize) -> Self {
        Self::with_state(store, depth, LogState::default())
    }

    /// Rebuild the log and undo history from `store`. Unreadable entries are
    /// skipped with a warning.
    pub fn load(store: Arc<dyn Store>, depth: usize) -> Result<Self> {
        let mut state = LogState::default();

        for key in store.keys(keys::LOG_PREFIX)? {
            let Some(raw) = store.get(&key)? else {
                continue;
            };
            match serde_json::from_str::<DailyPrayerLog>(&raw) {
                Ok(log) if !log.is_empty() => {
                    state.logs.insert(log.date, log);
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable prayer log {}: {}", key, e),
            }
        }

        if let Some(raw) = store.get(keys::UNDO_STACK)? {
            match serde_json::from_str::<VecDeque<UndoEntry>>(&raw) {
                Ok(mut undo) => {
                    while undo.len() > depth {
                        undo.pop_front();
                    }
                    state.undo = undo;
                }
                Err(e) => warn!("Discarding unreadable undo history: {}", e),
            }
        }

        info!(
            "Loaded {} prayer log day(s), {} undo entr(ies)",
            state.logs.len(),
            state.undo.len()
        );
        Ok(Self::with_state(store, depth, state))
    }

    fn with_state(store: Arc<dyn Store>, depth: usize, state: LogState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            store,
            depth: depth.max(1),
        }
    }

    /// Consistent view of the whole log.
    pub fn snapshot(&self) -> Arc<LogState> {
        Arc::clone(&self.state.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn recorded(&self, date: NaiveDate, prayer: PrayerName) -> Option<PrayerStatus> {
        self.snapshot().recorded(date, prayer)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshot().undo.is_empty()
    }

    /// Record `status` for `(date, prayer)`. `Unmarked` clears the decision.
    ///
    /// The in-memory change is kept even when the durable write fails; the
    /// failure is returned so the caller can surface it.
    pub fn log_prayer(
        &self,
        date: NaiveDate,
        prayer: PrayerName,
        status: PrayerStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let new_status = match status {
            PrayerStatus::Unmarked => None,
            other => Some(other),
        };
        let depth = self.depth;

        self.commit(|state| {
            let previous = state.recorded(date, prayer);
            state.undo.push_back(UndoEntry {
                date,
                prayer,
                previous_status: previous,
            });
            while state.undo.len() > depth {
                state.undo.pop_front();
            }
            write_status(state, date, prayer, new_status, now);
            debug!(
                "Logged {} on {}: {:?} -> {:?}",
                prayer, date, previous, new_status
            );
            ((), vec![Dirty::Log(date), Dirty::Undo])
        })
    }

    /// Revert the most recent `log_prayer`. Returns `None`, with no effect,
    /// when there is nothing to undo.
    pub fn undo(&self, now: DateTime<Utc>) -> Result<Option<UndoEntry>> {
        if !self.can_undo() {
            return Ok(None);
        }
        self.commit(|state| match state.undo.pop_back() {
            None => (None, Vec::new()),
            Some(entry) => {
                write_status(state, entry.date, entry.prayer, entry.previous_status, now);
                debug!("Undid {} on {}", entry.prayer, entry.date);
                let dirty = vec![Dirty::Log(entry.date), Dirty::Undo];
                (Some(entry), dirty)
            }
        })
    }

    /// Delete `today`'s log. Undo entries for that date go with it so an
    /// undo cannot bring the day back: prayers logged for `today` before a
    /// reset are no longer undoable, while entries for other dates keep
    /// their place on the stack.
    pub fn reset_today(&self, today: NaiveDate) -> Result<()> {
        self.commit(|state| {
            state.logs.remove(&today);
            state.undo.retain(|e| e.date != today);
            info!("Reset prayer log for {}", today);
            ((), vec![Dirty::Log(today), Dirty::Undo])
        })
    }

    /// Delete every log entry and the undo history. Irreversible.
    pub fn reset_history(&self) -> Result<()> {
        self.commit(|state| {
            state.logs.clear();
            state.undo.clear();
            info!("Reset entire prayer history");
            ((), vec![Dirty::AllLogs, Dirty::Undo])
        })
    }

    fn commit<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut LogState) -> (R, Vec<Dirty>),
    {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let mut next = (*self.snapshot()).clone();
        let (result, dirty) = f(&mut next);
        let next = Arc::new(next);
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&next);

        let mut first_error = None;
        for d in dirty {
            if let Err(e) = self.persist(&next, d) {
                warn!("Prayer log write failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    fn persist(&self, state: &LogState, dirty: Dirty) -> Result<()> {
        match dirty {
            Dirty::Log(date) => {
                let key = keys::log(date);
                match state.logs.get(&date) {
                    Some(log) => self.store.set(&key, &serde_json::to_string(log)?),
                    None => self.store.delete(&key),
                }
            }
            Dirty::AllLogs => {
                let mut result = Ok(());
                for key in self.store.keys(keys::LOG_PREFIX)? {
                    if let Err(e) = self.store.delete(&key) {
                        result = Err(e);
                    }
                }
                result
            }
            Dirty::Undo => {
                let raw = serde_json::to_string(&state.undo)?;
                self.store.set(keys::UNDO_STACK, &raw)
            }
        }
    }
}

/// Write one slot, creating the day lazily and dropping it again once every
/// slot is empty, since an absent day and an all-empty day are equivalent.
fn write_status(
    state: &mut LogState,
    date: NaiveDate,
    prayer: PrayerName,
    status: Option<PrayerStatus>,
    now: DateTime<Utc>,
) {
    let log = state
        .logs
        .entry(date)
        .or_insert_with(|| DailyPrayerLog::empty(date, now));
    log.set(prayer, status);
    log.updated_at = now;
    if log.is_empty() {
        state.logs.remove(&date);
    }
}

impl std::fmt::Debug for PrayerLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrayerLogStore")
            .field("depth", &self.depth)
            .field("state", &self.snapshot())
            .finish()
    }
}
