use rusqlite::Connection;

use crate::error::Result;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS kv_store (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS platform_reminders (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            fires_at  TEXT NOT NULL,
            title     TEXT NOT NULL,
            body      TEXT NOT NULL,
            sound     TEXT NOT NULL CHECK(sound IN ('primary','simple','off')),
            created_at TEXT DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_platform_reminders_fires_at
            ON platform_reminders(fires_at);
    ")?;
    Ok(())
}
