use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::services::phrases::Phrase;

/// Namespace key of the saved phrase list
pub const PHRASES_KEY: &str = "savedPhrases";
/// Namespace key of the saved document library
pub const TEXTS_KEY: &str = "savedTexts";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("could not determine data directory")]
    NoDataDir,
    #[error("could not create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage is unavailable")]
    Unavailable,
}

/// Durable string values under fixed namespace keys, backed by SQLite.
#[derive(Debug)]
pub struct KeyValueStore {
    conn: Connection,
}

impl KeyValueStore {
    /// Opens the database at `path`, creating it and its directory if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        debug!("opened key-value store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let path = config
            .resolved_database_path()
            .ok_or(StorageError::NoDataDir)?;
        Self::open(&path)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Replaces the value under `key` in a single statement
    pub fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Reads a JSON array under `key`. Missing or corrupt data is an empty
    /// list; a failed read is an error, so callers never write back over
    /// records they could not see.
    pub fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        let Some(raw) = self.get(key)? else {
            return Ok(Vec::new());
        };

        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("discarding corrupt {} data: {}", key, e);
            Vec::new()
        }))
    }

    /// Like [`KeyValueStore::read_list`], with a failed read also treated
    /// as an empty list
    pub fn load_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.read_list(key).unwrap_or_else(|e| {
            warn!("could not read {}: {}", key, e);
            Vec::new()
        })
    }

    pub fn save_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items)?;
        self.put(key, &raw)
    }
}

/// Durable home of the saved phrase list
pub trait PhraseStorage {
    /// Corrupt or missing data loads as an empty list; only a failed read
    /// is an error
    fn load(&self) -> Result<Vec<Phrase>, StorageError>;
    fn save_all(&self, phrases: &[Phrase]) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct SqlitePhraseStorage {
    kv: Rc<KeyValueStore>,
}

impl SqlitePhraseStorage {
    pub fn new(kv: Rc<KeyValueStore>) -> Self {
        Self { kv }
    }
}

impl PhraseStorage for SqlitePhraseStorage {
    fn load(&self) -> Result<Vec<Phrase>, StorageError> {
        self.kv.read_list(PHRASES_KEY)
    }

    fn save_all(&self, phrases: &[Phrase]) -> Result<(), StorageError> {
        self.kv.save_list(PHRASES_KEY, phrases)
    }
}

/// In-process storage; reads and writes can be made to fail
#[derive(Debug, Default)]
pub struct MemoryPhraseStorage {
    saved: RefCell<Vec<Phrase>>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl MemoryPhraseStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phrases(phrases: Vec<Phrase>) -> Self {
        Self {
            saved: RefCell::new(phrases),
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// What was last written successfully
    pub fn saved(&self) -> Vec<Phrase> {
        self.saved.borrow().clone()
    }
}

impl PhraseStorage for MemoryPhraseStorage {
    fn load(&self) -> Result<Vec<Phrase>, StorageError> {
        if self.fail_reads.get() {
            return Err(StorageError::Unavailable);
        }
        Ok(self.saved())
    }

    fn save_all(&self, phrases: &[Phrase]) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Unavailable);
        }
        *self.saved.borrow_mut() = phrases.to_vec();
        Ok(())
    }
}
