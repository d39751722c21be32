use std::sync::Arc;

use crate::{Allocator, ArchiveError, ArchiveResult, MetaData, Source};

/// Static description of an archive format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Format tag used to look the archiver up (e.g. `"ZIP"`).
    pub extension: String,
    /// Human-readable description.
    pub description: String,
    /// Author of the archiver.
    pub author: String,
    /// Where to find more about the archiver.
    pub url: String,
    /// Whether archives of this type accept writes.
    pub supports_writing: bool,
    /// Whether archives of this type can contain symbolic links.
    pub supports_symlinks: bool,
}

/// How a file inside an archive is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create or truncate.
    Write,
    /// Create or extend, positioned at the end.
    Append,
}

impl OpenMode {
    pub fn is_write(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// Parameters handed to [`Archiver::open`].
#[derive(Clone)]
pub struct OpenContext {
    /// Open the source for mutation (write directory) rather than reading.
    pub for_writing: bool,
    /// Buffer provider for in-memory entry data.
    pub allocator: Arc<dyn Allocator>,
}

impl OpenContext {
    pub fn new(allocator: Arc<dyn Allocator>) -> Self {
        Self {
            for_writing: false,
            allocator,
        }
    }

    pub fn writing(mut self) -> Self {
        self.for_writing = true;
        self
    }
}

/// A pluggable backend that treats a physical location as a file hierarchy.
///
/// Archivers are registered once and consulted at mount time: the first one
/// whose [`probe`](Archiver::probe) claims the source opens it.
pub trait Archiver: Send + Sync {
    fn info(&self) -> &ArchiveInfo;

    /// Whether `source` looks like something this archiver can open.
    fn probe(&self, source: &Source) -> bool;

    /// Open `source` for the lifetime of a mount.
    fn open(&self, source: &Source, ctx: &OpenContext) -> ArchiveResult<Arc<dyn Archive>>;
}

/// An opened archive bound to a mounted source.
///
/// Paths are already normalised by the caller: `/` separated, no leading or
/// trailing slash, no `.` or `..` segments. The empty path is the archive
/// root.
pub trait Archive: Send + Sync {
    /// Stat an entry. With `follow_links` false, symbolic links are reported
    /// as [`FileType::Symlink`](crate::FileType::Symlink).
    fn stat(&self, path: &str, follow_links: bool) -> ArchiveResult<MetaData>;

    /// Names of the immediate children of a directory.
    fn enumerate(&self, dir: &str) -> ArchiveResult<Vec<String>>;

    fn open_file(&self, path: &str, mode: OpenMode) -> ArchiveResult<Box<dyn ArchiveFile>>;

    /// Create a directory and any missing parents.
    fn mkdir(&self, _path: &str) -> ArchiveResult<()> {
        Err(ArchiveError::ReadOnly)
    }

    /// Remove a file or an empty directory.
    fn remove(&self, _path: &str) -> ArchiveResult<()> {
        Err(ArchiveError::ReadOnly)
    }

    /// Release archive-wide resources. Called once on unmount.
    fn close(&self) -> ArchiveResult<()> {
        Ok(())
    }
}

/// A native file opened through an archive.
pub trait ArchiveFile: Send {
    fn read(&mut self, buf: &mut [u8]) -> ArchiveResult<usize>;

    fn write(&mut self, _buf: &[u8]) -> ArchiveResult<usize> {
        Err(ArchiveError::ReadOnly)
    }

    /// Move to an absolute position.
    fn seek(&mut self, position: u64) -> ArchiveResult<()>;

    fn tell(&self) -> u64;

    /// Current total size of the file.
    fn length(&mut self) -> ArchiveResult<u64>;

    fn flush(&mut self) -> ArchiveResult<()> {
        Ok(())
    }

    /// Flush and release the native resource.
    fn close(self: Box<Self>) -> ArchiveResult<()>;
}
