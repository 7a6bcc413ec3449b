use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use crate::db::migrations::run_migrations;
use crate::models::SoundKind;

pub type ReminderId = String;

/// Device-level reminder service. The reminder scheduler is its only user
/// for prayer reminders.
pub trait NotificationPlatform: Send + Sync {
    fn schedule_at(
        &self,
        at: DateTime<Utc>,
        title: &str,
        body: &str,
        sound: SoundKind,
    ) -> Result<ReminderId>;

    fn cancel(&self, id: &str) -> Result<()>;

    fn list_scheduled(&self) -> Result<Vec<ReminderId>>;
}

/// A reminder as held by a platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformReminder {
    pub id: ReminderId,
    pub fires_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub sound: SoundKind,
}

// ─── SQLite-backed platform ─────────────────────────────────────────────────

/// Keeps pending reminders in the `platform_reminders` table; the `watch`
/// loop delivers them when due.
pub struct SqlitePlatform {
    conn: Mutex<Connection>,
}

impl SqlitePlatform {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Opening reminder database at {:?}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All pending reminders, earliest first.
    pub fn pending(&self) -> Result<Vec<PlatformReminder>> {
        self.query("SELECT id, fires_at, title, body, sound FROM platform_reminders ORDER BY fires_at, id", None)
    }

    /// Remove and return every reminder due at or before `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<PlatformReminder>> {
        let due = self.query(
            "SELECT id, fires_at, title, body, sound FROM platform_reminders
             WHERE fires_at <= ?1 ORDER BY fires_at, id",
            Some(now),
        )?;
        let conn = self.conn();
        for r in &due {
            let id: i64 = r.id.parse()?;
            conn.execute("DELETE FROM platform_reminders WHERE id = ?1", params![id])?;
        }
        Ok(due)
    }

    fn query(&self, sql: &str, until: Option<DateTime<Utc>>) -> Result<Vec<PlatformReminder>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, String, String, String, String)> {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        };
        let rows = match until {
            Some(t) => stmt
                .query_map(params![format_instant(t)], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };

        let mut result = Vec::new();
        for (id, fires_at, title, body, sound) in rows {
            result.push(PlatformReminder {
                id: id.to_string(),
                fires_at: DateTime::parse_from_rfc3339(&fires_at)
                    .map_err(|e| anyhow!("Bad reminder time '{}': {}", fires_at, e))?
                    .with_timezone(&Utc),
                title,
                body,
                sound: SoundKind::from_str(&sound)?,
            });
        }
        Ok(result)
    }
}

impl NotificationPlatform for SqlitePlatform {
    fn schedule_at(
        &self,
        at: DateTime<Utc>,
        title: &str,
        body: &str,
        sound: SoundKind,
    ) -> Result<ReminderId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO platform_reminders (fires_at, title, body, sound) VALUES (?1, ?2, ?3, ?4)",
            params![format_instant(at), title, body, sound.as_str()],
        )?;
        Ok(conn.last_insert_rowid().to_string())
    }

    fn cancel(&self, id: &str) -> Result<()> {
        let id: i64 = id.parse().with_context(|| format!("Bad reminder id '{}'", id))?;
        self.conn()
            .execute("DELETE FROM platform_reminders WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_scheduled(&self) -> Result<Vec<ReminderId>> {
        Ok(self.pending()?.into_iter().map(|r| r.id).collect())
    }
}

fn format_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ─── Mock platform ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    scheduled: BTreeMap<ReminderId, PlatformReminder>,
    cancelled: Vec<ReminderId>,
    fail_at: HashSet<DateTime<Utc>>,
    fail_cancel: bool,
}

/// In-memory platform for tests. Can be told to reject specific instants.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reject any `schedule_at` for this instant.
    pub fn fail_at(&self, at: DateTime<Utc>) {
        self.state().fail_at.insert(at);
    }

    pub fn set_fail_cancel(&self, fail: bool) {
        self.state().fail_cancel = fail;
    }

    /// Currently installed reminders, earliest first.
    pub fn scheduled(&self) -> Vec<PlatformReminder> {
        let mut all: Vec<_> = self.state().scheduled.values().cloned().collect();
        all.sort_by(|a, b| a.fires_at.cmp(&b.fires_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn cancelled(&self) -> Vec<ReminderId> {
        self.state().cancelled.clone()
    }
}

impl NotificationPlatform for MockPlatform {
    fn schedule_at(
        &self,
        at: DateTime<Utc>,
        title: &str,
        body: &str,
        sound: SoundKind,
    ) -> Result<ReminderId> {
        let mut state = self.state();
        if state.fail_at.contains(&at) {
            return Err(anyhow!("platform rejected reminder at {}", at));
        }
        state.next_id += 1;
        let id = format!("mock-{}", state.next_id);
        state.scheduled.insert(
            id.clone(),
            PlatformReminder {
                id: id.clone(),
                fires_at: at,
                title: title.to_string(),
                body: body.to_string(),
                sound,
            },
        );
        Ok(id)
    }

    fn cancel(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_cancel {
            return Err(anyhow!("platform refused to cancel {}", id));
        }
        state.scheduled.remove(id);
        state.cancelled.push(id.to_string());
        Ok(())
    }

    fn list_scheduled(&self) -> Result<Vec<ReminderId>> {
        Ok(self.state().scheduled.keys().cloned().collect())
    }
}
