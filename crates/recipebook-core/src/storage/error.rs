//! Storage error handling
//!
//! Provides typed errors for recipe store operations with descriptive
//! messages and recovery suggestions. Every variant belongs to one
//! [`ErrorKind`], which is what callers usually branch on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Underlying storage could not be opened, read or written
    Persistence,
    /// The targeted recipe does not exist
    NotFound,
    /// An import payload is malformed
    Format,
    /// The caller supplied a record that would break an invariant
    InvalidInput,
}

/// Errors that can occur during recipe store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to open the database file
    #[error("Failed to open recipe database at '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database was written by a newer schema
    #[error("Unsupported database schema version {found} (this build supports {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },

    /// A stored row cannot be turned back into a recipe
    #[error("Stored recipe '{id}' is corrupted: {details}")]
    CorruptRecord { id: String, details: String },

    /// The connection lock was poisoned by a panicking thread
    #[error("Recipe database connection is unavailable: lock poisoned")]
    LockPoisoned,

    /// No recipe with the given id
    #[error("Recipe not found: '{id}'")]
    RecipeNotFound { id: String },

    /// Recipe payload violates a record invariant
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    /// Import payload is malformed
    #[error("Invalid import format: {details}")]
    Format { details: String },

    /// Export payload could not be serialized
    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File not found (when expected to exist)
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },
}

impl StoreError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StoreError::FileNotFound { path },
            _ if is_disk_full_error(&error) => StoreError::DiskFull {
                path,
                source: error,
            },
            _ => StoreError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Shorthand for a format error
    pub fn format(details: impl Into<String>) -> Self {
        StoreError::Format {
            details: details.into(),
        }
    }

    /// Shorthand for a missing recipe
    pub fn not_found(id: impl Into<String>) -> Self {
        StoreError::RecipeNotFound { id: id.into() }
    }

    /// Which class of failure this is
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::RecipeNotFound { .. } => ErrorKind::NotFound,
            StoreError::Format { .. } => ErrorKind::Format,
            StoreError::InvalidRecipe(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::Persistence,
        }
    }

    /// Check if this error is recoverable by user action
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::DiskFull { .. }
                | StoreError::PermissionDenied { .. }
                | StoreError::Format { .. }
                | StoreError::InvalidRecipe(_)
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::DiskFull { .. } => Some("Free up disk space and try again."),
            StoreError::PermissionDenied { .. } => {
                Some("Check file and directory permissions. You may need to change ownership of the data directory.")
            }
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::Format { .. } => {
                Some("Check that the file is a recipe backup created by the export function.")
            }
            StoreError::LockPoisoned => {
                Some("Reset the store to reopen the database connection.")
            }
            StoreError::UnsupportedSchema { .. } => {
                Some("This database was created by a newer version. Upgrade before opening it.")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
