//! Lazily opened, resettable SQLite connection
//!
//! The store holds exactly one connection. It is opened on first use,
//! cached, and handed out for the duration of a single operation through
//! [`ConnectionHandle::with_connection`]. [`ConnectionHandle::reset`]
//! closes it; the next operation opens a fresh one.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::schema::{get_schema_version, init_schema, needs_init, SCHEMA_VERSION};

/// Where the recipe database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// A SQLite file, created on first open
    File(PathBuf),
    /// A private in-memory database. Its contents are lost on reset.
    Memory,
}

impl StorageLocation {
    /// The database file path, if file-backed
    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageLocation::File(path) => Some(path),
            StorageLocation::Memory => None,
        }
    }
}

/// Cached connection guarded by a mutex
pub struct ConnectionHandle {
    location: StorageLocation,
    conn: Mutex<Option<Connection>>,
}

impl ConnectionHandle {
    /// Create a handle. Nothing is opened until the first operation.
    pub fn new(location: StorageLocation) -> Self {
        Self {
            location,
            conn: Mutex::new(None),
        }
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    /// Whether a connection is currently cached
    pub fn is_open(&self) -> bool {
        self.conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run `f` with the connection, opening it first if needed
    ///
    /// The connection is held exclusively until `f` returns, so operations
    /// never interleave.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;

        let conn = match guard.take() {
            Some(conn) => conn,
            None => open_connection(&self.location)?,
        };
        let conn = guard.insert(conn);

        f(conn)
    }

    /// Close and discard the cached connection
    ///
    /// Also recovers a handle whose lock was poisoned by a panicking
    /// operation; later operations start from a fresh connection.
    pub fn reset(&self) -> StoreResult<()> {
        let cached = {
            let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            guard.take()
        };
        if self.conn.is_poisoned() {
            self.conn.clear_poison();
            warn!("Recovered recipe database connection after a panic");
        }

        if let Some(conn) = cached {
            conn.close().map_err(|(_, e)| StoreError::Database(e))?;
            info!("Closed recipe database connection");
        }
        Ok(())
    }
}

/// Open the database and make sure the schema is in place
fn open_connection(location: &StorageLocation) -> StoreResult<Connection> {
    let conn = match location {
        StorageLocation::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            Connection::open(path).map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?
        }
        StorageLocation::Memory => Connection::open_in_memory()?,
    };

    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    if needs_init(&conn) {
        init_schema(&conn)?;
        debug!(?location, "Initialized recipe schema");
    } else if let Some(found) = get_schema_version(&conn)? {
        if found > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }
    }

    debug!(?location, "Opened recipe database connection");
    Ok(conn)
}
