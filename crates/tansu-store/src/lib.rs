//! Inode table and file content store for tansu.
//!
//! The namespace is a single SQLite table of inode rows: files carry their
//! content inline as a BLOB, directories are rows with NULL content. The
//! root directory (ino 0, self-parented) is created on first open. All tree
//! invariants live in [`store::InodeDb`]; transport layers stay thin.

pub mod error;
pub mod inode;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use inode::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DirEntry, Ino, Inode, InodeKind, ROOT_INO};
pub use store::{InodeDb, MAX_CONTENT_LEN};
