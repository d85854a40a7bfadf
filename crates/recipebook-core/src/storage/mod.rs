//! Storage layer
//!
//! Handles the SQLite recipe database and backup files.
//!
//! ## Architecture
//!
//! - **connection**: one lazily opened, resettable connection
//! - **schema**: tables and secondary indexes, created on first open
//! - **records**: row-level reads and transactional writes
//! - **backup**: dated export files written atomically

pub mod backup;
pub mod connection;
pub mod error;
pub(crate) mod records;
pub mod schema;

pub use connection::{ConnectionHandle, StorageLocation};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
