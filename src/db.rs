//src/db.rs
use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use strum_macros::{AsRefStr, IntoStaticStr};
use thiserror::Error;

const DB_FILE_NAME: &str = "workout_session.sqlite";
const APP_DATA_DIR: &str = "workout-session"; // Same dir name as config
const DB_ENV_VAR: &str = "WORKOUT_SESSION_DB";

/// The logical records kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr)]
pub enum RecordKey {
    #[strum(serialize = "workout_plans")]
    WorkoutPlans,
    #[strum(serialize = "active_workout")]
    ActiveWorkout,
    #[strum(serialize = "workout_history")]
    WorkoutHistory,
    #[strum(serialize = "user_workout_preferences")]
    Preferences,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database write failed: {0}")]
    WriteFailed(rusqlite::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence for serialized records. No business logic lives here.
pub trait Store {
    /// # Errors
    /// Returns `Error` if the underlying storage cannot be read.
    fn get(&self, key: RecordKey) -> Result<Option<String>, Error>;
    /// # Errors
    /// Returns `Error` if the underlying storage cannot be written.
    fn set(&self, key: RecordKey, value: &str) -> Result<(), Error>;
    /// # Errors
    /// Returns `Error` if the underlying storage cannot be written.
    fn remove(&self, key: RecordKey) -> Result<(), Error>;
}

/// Gets the path to the SQLite database file within the app's data directory.
/// Exposed at crate root as `get_db_path_util`
pub fn get_db_path() -> Result<PathBuf, Error> {
    if let Ok(path) = std::env::var(DB_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let data_dir = dirs::data_dir().ok_or(Error::DataDir)?;
    let app_dir = data_dir.join(APP_DATA_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and ensures the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(Error::Connection)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(Error::Connection)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, Error> {
        init_db(&conn)?;
        Ok(Self { conn })
    }
}

/// Initializes the records table if it doesn't exist.
pub fn init_db(conn: &Connection) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL -- RFC3339
        )",
        [],
    )
    .map_err(Error::Connection)?;
    Ok(())
}

impl Store for SqliteStore {
    fn get(&self, key: RecordKey) -> Result<Option<String>, Error> {
        self.conn
            .query_row(
                "SELECT value FROM records WHERE key = :key",
                named_params! { ":key": key.as_ref() },
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::QueryFailed)
    }

    fn set(&self, key: RecordKey, value: &str) -> Result<(), Error> {
        self.conn
            .execute(
                "INSERT INTO records (key, value, updated_at) VALUES (:key, :value, :ts)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                named_params! {
                    ":key": key.as_ref(),
                    ":value": value,
                    ":ts": Utc::now().to_rfc3339(),
                },
            )
            .map_err(Error::WriteFailed)?;
        Ok(())
    }

    fn remove(&self, key: RecordKey) -> Result<(), Error> {
        self.conn
            .execute(
                "DELETE FROM records WHERE key = :key",
                named_params! { ":key": key.as_ref() },
            )
            .map_err(Error::WriteFailed)?;
        Ok(())
    }
}

/// Process-local store. Reads and writes can be made to fail on demand,
/// which is how storage faults are exercised in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<HashMap<RecordKey, String>>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Raw access for seeding or inspecting records.
    pub fn raw(&self, key: RecordKey) -> Option<String> {
        self.records.borrow().get(&key).cloned()
    }

    pub fn put_raw(&self, key: RecordKey, value: &str) {
        self.records.borrow_mut().insert(key, value.to_string());
    }
}

impl Store for MemoryStore {
    fn get(&self, key: RecordKey) -> Result<Option<String>, Error> {
        if self.fail_reads.get() {
            return Err(Error::Unavailable(format!("read of '{}' failed", key.as_ref())));
        }
        Ok(self.records.borrow().get(&key).cloned())
    }

    fn set(&self, key: RecordKey, value: &str) -> Result<(), Error> {
        if self.fail_writes.get() {
            return Err(Error::Unavailable(format!("write of '{}' failed", key.as_ref())));
        }
        self.records.borrow_mut().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: RecordKey) -> Result<(), Error> {
        if self.fail_writes.get() {
            return Err(Error::Unavailable(format!("removal of '{}' failed", key.as_ref())));
        }
        self.records.borrow_mut().remove(&key);
        Ok(())
    }
}

// Lets a caller keep a handle on a store it lends to the service.
impl<S: Store + ?Sized> Store for std::rc::Rc<S> {
    fn get(&self, key: RecordKey) -> Result<Option<String>, Error> {
        (**self).get(key)
    }

    fn set(&self, key: RecordKey, value: &str) -> Result<(), Error> {
        (**self).set(key, value)
    }

    fn remove(&self, key: RecordKey) -> Result<(), Error> {
        (**self).remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_store_set_get_remove() -> Result<(), Error> {
        let store = SqliteStore::open_in_memory()?;
        assert_eq!(store.get(RecordKey::ActiveWorkout)?, None);

        store.set(RecordKey::ActiveWorkout, "{\"a\":1}")?;
        store.set(RecordKey::ActiveWorkout, "{\"a\":2}")?; // upsert
        assert_eq!(store.get(RecordKey::ActiveWorkout)?.as_deref(), Some("{\"a\":2}"));

        store.remove(RecordKey::ActiveWorkout)?;
        assert_eq!(store.get(RecordKey::ActiveWorkout)?, None);
        Ok(())
    }

    #[test]
    fn sqlite_store_persists_across_connections() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("records.sqlite");
        {
            let store = SqliteStore::open(&path)?;
            store.set(RecordKey::WorkoutHistory, "[]")?;
        }
        let reopened = SqliteStore::open(&path)?;
        assert_eq!(reopened.get(RecordKey::WorkoutHistory)?.as_deref(), Some("[]"));
        Ok(())
    }

    #[test]
    fn memory_store_failure_injection() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.set(RecordKey::Preferences, "{}").is_err());
        store.set_fail_writes(false);
        assert!(store.set(RecordKey::Preferences, "{}").is_ok());
        store.set_fail_reads(true);
        assert!(store.get(RecordKey::Preferences).is_err());
    }
}
