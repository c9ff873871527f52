//! Store error types.

use thiserror::Error;

use crate::inode::Ino;

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Inode or named child not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Directory still has children.
    #[error("directory not empty: inode {0}")]
    NotEmpty(Ino),

    /// A sibling with the same name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Parent id does not name an existing directory.
    #[error("invalid parent: inode {0}")]
    InvalidParent(Ino),

    /// Write would grow a file past the maximum content length.
    #[error("file too large: {0} bytes")]
    TooLarge(u64),

    /// Backing store failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Create a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;
