use std::fs;
use std::time::SystemTime;

/// Kind of entry reported by [`MetaData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// A regular file.
    Regular,
    /// A directory.
    Directory,
    /// A symbolic link (only reported when the link is not dereferenced).
    Symlink,
    /// Anything else: sockets, fifos, devices.
    Other,
}

/// Stat record for an entry.
///
/// Always produced on demand from the backing store; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaData {
    /// Kind of entry.
    pub file_type: FileType,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time, if known.
    pub modified: Option<SystemTime>,
    /// Creation time, if known.
    pub created: Option<SystemTime>,
    /// Last access time, if known.
    pub accessed: Option<SystemTime>,
    /// Whether the entry cannot be written through its archive.
    pub read_only: bool,
}

impl MetaData {
    /// A directory with no timestamps.
    pub fn directory(read_only: bool) -> Self {
        Self {
            file_type: FileType::Directory,
            size: 0,
            modified: None,
            created: None,
            accessed: None,
            read_only,
        }
    }

    /// A regular file of `size` bytes modified at `modified`.
    pub fn file(size: u64, modified: Option<SystemTime>, read_only: bool) -> Self {
        Self {
            file_type: FileType::Regular,
            size,
            modified,
            created: modified,
            accessed: modified,
            read_only,
        }
    }

    /// Convert native filesystem metadata.
    pub fn from_fs(meta: &fs::Metadata) -> Self {
        let ft = meta.file_type();
        let file_type = if ft.is_symlink() {
            FileType::Symlink
        } else if ft.is_dir() {
            FileType::Directory
        } else if ft.is_file() {
            FileType::Regular
        } else {
            FileType::Other
        };

        Self {
            file_type,
            size: if file_type == FileType::Directory {
                0
            } else {
                meta.len()
            },
            modified: meta.modified().ok(),
            created: meta.created().ok(),
            accessed: meta.accessed().ok(),
            read_only: meta.permissions().readonly(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }
}
