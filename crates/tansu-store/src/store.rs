//! SQLite persistence for the inode namespace.
//!
//! One table of inode rows keyed by the auto-assigned `ino`. File content
//! lives inline as a BLOB and is replaced wholesale on every write;
//! directories are rows with NULL content.

use std::path::Path;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::error::{StoreError, StoreResult};
use crate::inode::{DEFAULT_DIR_MODE, DirEntry, Ino, Inode, InodeKind, ROOT_INO};

/// Database handle for the inode namespace.
pub struct InodeDb {
    conn: Connection,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inodes (
    ino        INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    parent_ino INTEGER NOT NULL,
    kind       TEXT NOT NULL,
    content    BLOB,
    mode       INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_inodes_sibling ON inodes(parent_ino, name);
"#;

/// Maximum length in bytes a file's content may reach. Content lives inline
/// as a single BLOB row and a sparse write materializes the whole gap, so
/// writes whose end passes this limit fail with [`StoreError::TooLarge`].
pub const MAX_CONTENT_LEN: u64 = 16 * 1024 * 1024;

impl InodeDb {
    /// Open or create a database at the given path.
    ///
    /// Idempotent: the schema and the root inode are only created when
    /// absent, so reopening an existing database changes nothing.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        tracing::debug!("opened inode db at {}", path.as_ref().display());
        Self::bootstrap(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    /// Ensure the table and the root inode exist.
    fn bootstrap(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;

        let root: Option<Ino> = conn
            .query_row(
                "SELECT ino FROM inodes WHERE ino = ?1",
                params![ROOT_INO],
                |row| row.get(0),
            )
            .optional()?;
        if root.is_none() {
            conn.execute(
                "INSERT INTO inodes (ino, name, parent_ino, kind, content, mode)
                 VALUES (?1, '/', ?1, 'dir', NULL, ?2)",
                params![ROOT_INO, DEFAULT_DIR_MODE],
            )?;
            tracing::debug!("created root inode");
        }

        Ok(Self { conn })
    }

    // =========================================================================
    // Namespace operations
    // =========================================================================

    /// List the direct children of a directory.
    ///
    /// A nonexistent or non-directory `parent_ino` yields an empty list, not
    /// an error. The root is its own parent, so `list(ROOT_INO)` includes the
    /// root row itself. Order is store-native; callers must not rely on it.
    pub fn list(&self, parent_ino: Ino) -> StoreResult<Vec<DirEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ino, name, kind FROM inodes WHERE parent_ino = ?1")?;

        let rows = stmt.query_map(params![parent_ino], |row| {
            let ino: Ino = row.get(0)?;
            let kind_str: String = row.get(2)?;
            Ok(DirEntry {
                ino,
                name: row.get(1)?,
                kind: kind_or_file(ino, &kind_str),
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Look up a single child by exact name under a parent.
    pub fn lookup(&self, parent_ino: Ino, name: &str) -> StoreResult<Inode> {
        let row = self
            .conn
            .query_row(
                "SELECT ino, name, parent_ino, kind, mode FROM inodes
                 WHERE parent_ino = ?1 AND name = ?2",
                params![parent_ino, name],
                |row| {
                    let ino: Ino = row.get(0)?;
                    let kind_str: String = row.get(3)?;
                    Ok(Inode {
                        ino,
                        name: row.get(1)?,
                        parent_ino: row.get(2)?,
                        kind: kind_or_file(ino, &kind_str),
                        mode: row.get(4)?,
                    })
                },
            )
            .optional()?;

        row.ok_or_else(|| StoreError::not_found(format!("{name:?} under inode {parent_ino}")))
    }

    /// Create a new file inode with empty content. Returns the assigned id.
    pub fn create(&mut self, parent_ino: Ino, name: &str, mode: u32) -> StoreResult<Ino> {
        self.insert_inode(parent_ino, name, InodeKind::File, Some(&[]), mode)
    }

    /// Create a new directory inode. Returns the assigned id.
    pub fn mkdir(&mut self, parent_ino: Ino, name: &str, mode: u32) -> StoreResult<Ino> {
        self.insert_inode(parent_ino, name, InodeKind::Directory, None, mode)
    }

    /// Delete a file inode. Deleting a missing id (or a directory id) is a
    /// successful no-op; directories only go away through [`Self::rmdir`].
    pub fn unlink(&mut self, ino: Ino) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM inodes WHERE ino = ?1 AND kind = 'file'",
            params![ino],
        )?;
        Ok(())
    }

    /// Delete a directory inode, failing with [`StoreError::NotEmpty`] while
    /// any child still references it. Deleting a missing id is a successful
    /// no-op. The root counts itself as a child and can never be removed.
    pub fn rmdir(&mut self, ino: Ino) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        let children: i64 = tx.query_row(
            "SELECT COUNT(*) FROM inodes WHERE parent_ino = ?1",
            params![ino],
            |row| row.get(0),
        )?;
        if children > 0 {
            return Err(StoreError::NotEmpty(ino));
        }

        tx.execute(
            "DELETE FROM inodes WHERE ino = ?1 AND kind = 'dir'",
            params![ino],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Insert an inode row after checking the parent is an existing
    /// directory. Check and insert share one transaction.
    fn insert_inode(
        &mut self,
        parent_ino: Ino,
        name: &str,
        kind: InodeKind,
        content: Option<&[u8]>,
        mode: u32,
    ) -> StoreResult<Ino> {
        let tx = self.conn.transaction()?;

        let parent_kind: Option<String> = tx
            .query_row(
                "SELECT kind FROM inodes WHERE ino = ?1",
                params![parent_ino],
                |row| row.get(0),
            )
            .optional()?;
        match parent_kind.as_deref().and_then(InodeKind::from_str) {
            Some(InodeKind::Directory) => {}
            _ => return Err(StoreError::InvalidParent(parent_ino)),
        }

        let inserted = tx.execute(
            "INSERT INTO inodes (name, parent_ino, kind, content, mode)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, parent_ino, kind.as_str(), content, mode],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::already_exists(format!(
                    "{name:?} under inode {parent_ino}"
                )));
            }
            Err(err) => return Err(err.into()),
        }

        let ino = tx.last_insert_rowid();
        tx.commit()?;
        Ok(ino)
    }

    // =========================================================================
    // File content operations
    // =========================================================================

    /// Read up to `size` bytes of a file's content starting at `offset`.
    ///
    /// Reading at or past end of file returns an empty vector, never an
    /// error. The result is clamped to the stored length; content is never
    /// extended by a read.
    pub fn read(&self, ino: Ino, offset: u64, size: u32) -> StoreResult<Vec<u8>> {
        let row: Option<Option<Vec<u8>>> = self
            .conn
            .query_row(
                "SELECT content FROM inodes WHERE ino = ?1 AND kind = 'file'",
                params![ino],
                |row| row.get(0),
            )
            .optional()?;
        let data = match row {
            Some(content) => content.unwrap_or_default(),
            None => return Err(StoreError::not_found(format!("file inode {ino}"))),
        };

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(size as usize).min(data.len());
        Ok(data[start..end].to_vec())
    }

    /// Write `data` into a file's content at `offset`, zero-filling any gap
    /// past the current end of file and preserving trailing bytes beyond the
    /// written range. The whole content value is replaced in one
    /// transaction; there is no partial-write state. An end
    /// (`offset + data.len()`) past [`MAX_CONTENT_LEN`], or one that
    /// overflows, fails with [`StoreError::TooLarge`] before anything is
    /// touched.
    ///
    /// The replace is a read-modify-write: two connections writing the same
    /// inode concurrently can lose one of the updates. Callers needing
    /// stronger guarantees must serialize writes per inode themselves.
    pub fn write(&mut self, ino: Ino, offset: u64, data: &[u8]) -> StoreResult<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|&end| end <= MAX_CONTENT_LEN)
            .ok_or_else(|| StoreError::TooLarge(offset.saturating_add(data.len() as u64)))?;

        let tx = self.conn.transaction()?;

        let row: Option<Option<Vec<u8>>> = tx
            .query_row(
                "SELECT content FROM inodes WHERE ino = ?1 AND kind = 'file'",
                params![ino],
                |row| row.get(0),
            )
            .optional()?;
        let mut content = match row {
            Some(content) => content.unwrap_or_default(),
            None => return Err(StoreError::not_found(format!("file inode {ino}"))),
        };

        let offset = offset as usize;
        let end = end as usize;
        if end > content.len() {
            content.resize(end, 0);
        }
        content[offset..end].copy_from_slice(data);

        tx.execute(
            "UPDATE inodes SET content = ?1 WHERE ino = ?2",
            params![content, ino],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Map a stored kind string, logging and falling back to file when the
/// column holds a value no [`InodeKind`] matches.
fn kind_or_file(ino: Ino, raw: &str) -> InodeKind {
    InodeKind::from_str(raw).unwrap_or_else(|| {
        tracing::warn!("inode {ino} has unknown kind {raw:?}, treating it as a file");
        InodeKind::File
    })
}
