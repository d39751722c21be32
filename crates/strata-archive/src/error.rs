use thiserror::Error;

/// Errors reported by archivers and the files they open.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The requested entry does not exist in the archive.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// A path component that must be a directory is a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// The entry is a directory and cannot be opened as a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// The backing store refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The archive or file does not support writing.
    #[error("archive is read-only")]
    ReadOnly,

    /// The source is not in a format this archiver understands.
    #[error("unsupported source: {0}")]
    Unsupported(String),

    /// The archive structure could not be decoded.
    #[error("corrupt archive: {0}")]
    Corrupt(String),

    /// A seek target lies beyond the end of a file that cannot grow.
    #[error("position {position} out of range (length {length})")]
    OutOfRange {
        /// Requested position.
        position: u64,
        /// Length of the backing file.
        length: u64,
    },

    /// The allocator refused a buffer request.
    #[error("allocation of {0} bytes failed")]
    OutOfMemory(usize),

    /// Error from the zip library.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl ArchiveError {
    /// Classify an I/O error against the entry that caused it.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ArchiveError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                ArchiveError::PermissionDenied(path.to_string())
            }
            _ => ArchiveError::Io(err),
        }
    }

    /// Whether this error means "not present in this archive".
    ///
    /// The resolver moves on to the next source on these.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ArchiveError::NotFound(_) | ArchiveError::NotADirectory(_)
        ) || matches!(self, ArchiveError::Zip(zip::result::ZipError::FileNotFound))
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ArchiveError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => ArchiveError::PermissionDenied(err.to_string()),
            _ => ArchiveError::Io(err),
        }
    }
}

/// Result type for archiver operations.
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;
