// 💾 Snapshot store - durable mirror of the roster
//
// One key-value slot: key = STORE_KEY, value = the JSON-serialized attendee
// array. Every save overwrites the whole slot; there is no diffing and no
// schema version, so any layout change breaks existing rosters.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::registry::Attendee;

/// Fixed key the roster snapshot lives under
pub const STORE_KEY: &str = "eventAttendees";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The stored value exists but is not a valid attendee array
    #[error("stored roster is not a valid snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The snapshot parsed, but an entry breaks the roster rules
    #[error("roster entry {index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },

    /// The underlying storage rejected a read or write
    #[error("roster storage failed: {0}")]
    Storage(#[from] rusqlite::Error),
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Durable mirror of the roster.
///
/// `load` runs once at startup; `save` runs after every successful mutation
/// and rewrites the full snapshot. Implementations hold no attendee data of
/// their own beyond the serialized slot.
pub trait SnapshotStore {
    /// Read the stored snapshot. A missing slot is an empty roster, never an
    /// error; a present but unparseable slot is.
    fn load(&self) -> Result<Vec<Attendee>, SnapshotError>;

    /// Overwrite the slot with the full current roster
    fn save(&mut self, attendees: &[Attendee]) -> Result<(), SnapshotError>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// Roster snapshot in a single-row SQLite key-value table
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open roster store at {}", path.display()))?;
        Self::setup(conn)
    }

    /// Throwaway store for tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        Self::setup(conn)
    }

    fn setup(conn: Connection) -> Result<Self> {
        // WAL for crash recovery, same as every other store we run
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL mode")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create store table")?;

        Ok(SqliteStore { conn })
    }
}

impl SnapshotStore for SqliteStore {
    fn load(&self) -> Result<Vec<Attendee>, SnapshotError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM store WHERE key = ?1",
                params![STORE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, attendees: &[Attendee]) -> Result<(), SnapshotError> {
        let json = serde_json::to_string(attendees)?;

        self.conn.execute(
            "INSERT INTO store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![STORE_KEY, json],
        )?;

        Ok(())
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-process slot holding the same serialized snapshot a durable store
/// would. Clones share the slot, so a test can hand one clone to a registry
/// and watch writes arrive through another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slot: Arc<RwLock<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw serialized slot contents (None until the first save)
    pub fn raw(&self) -> Option<String> {
        self.slot.read().unwrap().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Vec<Attendee>, SnapshotError> {
        match self.slot.read().unwrap().as_deref() {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, attendees: &[Attendee]) -> Result<(), SnapshotError> {
        let json = serde_json::to_string(attendees)?;
        *self.slot.write().unwrap() = Some(json);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn attendee(id: u64, first: &str, last: &str, code: &str) -> Attendee {
        Attendee {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            code: code.to_string(),
            checked_in: true,
            check_in_time: Some("09:15".to_string()),
        }
    }

    #[test]
    fn test_missing_slot_loads_empty_roster() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let roster = vec![
            attendee(1, "Somchai", "Dee", "660610001"),
            attendee(2, "Suda", "Chai", "660610002"),
        ];

        store.save(&roster).unwrap();
        assert_eq!(store.load().unwrap(), roster);

        // Empty roster round-trips too (and overwrites the old slot)
        store.save(&[]).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        store.save(&[attendee(1, "Somchai", "Dee", "660610001")]).unwrap();
        let roster = vec![
            attendee(1, "Somchai", "Dee", "660610001"),
            attendee(2, "Suda", "Chai", "660610002"),
        ];
        store.save(&roster).unwrap();

        assert_eq!(store.load().unwrap(), roster);

        // Exactly one row under the fixed key
        let rows: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendees.db");

        let roster = vec![attendee(1, "Somchai", "Dee", "660610001")];

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.save(&roster).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), roster);
    }

    #[test]
    fn test_stored_layout_is_pinned() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save(&[attendee(1, "Somchai", "Dee", "660610001")]).unwrap();

        let json: String = store
            .conn
            .query_row(
                "SELECT value FROM store WHERE key = ?1",
                params![STORE_KEY],
                |row| row.get(0),
            )
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entry = &parsed[0];

        assert_eq!(entry["id"], 1);
        assert_eq!(entry["firstName"], "Somchai");
        assert_eq!(entry["lastName"], "Dee");
        assert_eq!(entry["code"], "660610001");
        assert_eq!(entry["checkedIn"], true);
        assert_eq!(entry["checkInTime"], "09:15");
    }

    #[test]
    fn test_garbage_slot_fails_load() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .conn
            .execute(
                "INSERT INTO store (key, value) VALUES (?1, ?2)",
                params![STORE_KEY, "{not json"],
            )
            .unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            SnapshotError::Malformed(_)
        ));
    }

    #[test]
    fn test_memory_store_clones_share_the_slot() {
        let mut store = MemoryStore::new();
        let handle = store.clone();

        assert!(handle.raw().is_none());

        store.save(&[attendee(1, "Somchai", "Dee", "660610001")]).unwrap();

        assert!(handle.raw().is_some());
        assert_eq!(handle.load().unwrap(), store.load().unwrap());
    }
}
