//! Core inode types.

/// Inode identifier. Ids are assigned by the store, monotonically, and never
/// reused within a database's lifetime.
pub type Ino = i64;

/// The root directory's inode id. The root is its own parent.
pub const ROOT_INO: Ino = 0;

/// Default mode for new files.
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Default mode for new directories (the root included).
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Kind of namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File,
    Directory,
}

impl InodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InodeKind::File => "file",
            InodeKind::Directory => "dir",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file" => Some(InodeKind::File),
            "dir" => Some(InodeKind::Directory),
            _ => None,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, InodeKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, InodeKind::Directory)
    }
}

/// A full inode row, minus any file content.
#[derive(Debug, Clone)]
pub struct Inode {
    pub ino: Ino,
    pub name: String,
    pub parent_ino: Ino,
    pub kind: InodeKind,
    pub mode: u32,
}

/// A single directory listing entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub ino: Ino,
    pub name: String,
    pub kind: InodeKind,
}
