use std::cell::Cell;
use strata_archive::ArchiveError;
use thiserror::Error;

/// Errors that can occur during virtual filesystem operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation was attempted before `init` or after `deinit`.
    #[error("filesystem is not initialised")]
    NotInitialised,

    /// `init` was called twice.
    #[error("filesystem is already initialised")]
    AlreadyInitialised,

    /// No mounted source contains the path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The source is not in the search path.
    #[error("not mounted: {0}")]
    NotMounted(String),

    /// The source is already in the search path.
    #[error("already mounted: {0}")]
    DuplicateMount(String),

    /// An archiver with the same identifier is already registered.
    #[error("archiver already registered: {0}")]
    DuplicateFormat(String),

    /// No archiver is registered under the identifier.
    #[error("unknown archive format: {0}")]
    UnknownFormat(String),

    /// No registered archiver claims the source.
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// The archiver still backs a mounted source.
    #[error("archiver {0} is in use by a mounted source")]
    ArchiverInUse(String),

    /// The path is malformed or escapes the virtual root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A mutating operation was attempted with no write directory set.
    #[error("no write directory is set")]
    NoWriteDirectory,

    /// The handle is missing or has already been released.
    #[error("invalid file handle")]
    InvalidHandle,

    /// The handle's source has been unmounted or replaced.
    #[error("file handle refers to a source that is no longer mounted")]
    StaleHandle,

    /// Seek beyond the end of a file that cannot grow.
    #[error("position {position} out of range (length {length})")]
    OutOfRange {
        /// Requested position.
        position: u64,
        /// Length of the file.
        length: u64,
    },

    /// The backing store refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The file or archive does not accept writes.
    #[error("read-only: {0}")]
    ReadOnly(String),

    /// Opening a file failed; carries the archiver's cause.
    #[error("failed to open {path}: {cause}")]
    OpenError {
        /// Logical path that was opened.
        path: String,
        /// Underlying archiver failure.
        #[source]
        cause: ArchiveError,
    },

    /// Flushing a file on close failed.
    #[error("failed to close file: {0}")]
    CloseError(#[source] ArchiveError),

    /// Any other archiver failure.
    #[error("archive error: {0}")]
    Archive(#[source] ArchiveError),

    /// An enumeration callback asked to abort.
    #[error("enumeration of {0} aborted by callback")]
    Callback(String),

    /// Configuration could not be parsed or applied.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error outside any archive.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify an archiver failure for `path`.
    pub(crate) fn from_archive(err: ArchiveError, path: &str) -> Self {
        match err {
            ArchiveError::NotFound(_) | ArchiveError::NotADirectory(_) => {
                Error::NotFound(path.to_string())
            }
            ArchiveError::PermissionDenied(_) => Error::PermissionDenied(path.to_string()),
            ArchiveError::ReadOnly => Error::ReadOnly(path.to_string()),
            ArchiveError::OutOfRange { position, length } => {
                Error::OutOfRange { position, length }
            }
            other => Error::Archive(other),
        }
    }

    /// Status code for callers using the status-return style.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotInitialised => ErrorCode::NotInitialised,
            Error::AlreadyInitialised => ErrorCode::AlreadyInitialised,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::NotMounted(_) => ErrorCode::NotMounted,
            Error::DuplicateMount(_) => ErrorCode::DuplicateMount,
            Error::DuplicateFormat(_) => ErrorCode::DuplicateFormat,
            Error::UnknownFormat(_) => ErrorCode::UnknownFormat,
            Error::UnsupportedFormat(_) => ErrorCode::UnsupportedFormat,
            Error::ArchiverInUse(_) => ErrorCode::ArchiverInUse,
            Error::InvalidPath(_) => ErrorCode::InvalidPath,
            Error::NoWriteDirectory => ErrorCode::NoWriteDirectory,
            Error::InvalidHandle => ErrorCode::InvalidHandle,
            Error::StaleHandle => ErrorCode::StaleHandle,
            Error::OutOfRange { .. } => ErrorCode::OutOfRange,
            Error::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Error::ReadOnly(_) => ErrorCode::ReadOnly,
            Error::OpenError { .. } => ErrorCode::OpenError,
            Error::CloseError(_) => ErrorCode::CloseError,
            Error::Archive(ArchiveError::Corrupt(_)) | Error::Archive(ArchiveError::Zip(_)) => {
                ErrorCode::Corrupt
            }
            Error::Archive(ArchiveError::OutOfMemory(_)) => ErrorCode::OutOfMemory,
            Error::Archive(_) | Error::Io(_) => ErrorCode::Io,
            Error::Callback(_) => ErrorCode::AppCallback,
            Error::Config(_) => ErrorCode::Config,
        }
    }
}

/// Flat status codes mirroring [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCode {
    #[default]
    Ok,
    NotInitialised,
    AlreadyInitialised,
    NotFound,
    NotMounted,
    DuplicateMount,
    DuplicateFormat,
    UnknownFormat,
    UnsupportedFormat,
    ArchiverInUse,
    InvalidPath,
    NoWriteDirectory,
    InvalidHandle,
    StaleHandle,
    OutOfRange,
    PermissionDenied,
    ReadOnly,
    OpenError,
    CloseError,
    Corrupt,
    OutOfMemory,
    Io,
    AppCallback,
    Config,
}

thread_local! {
    static LAST_ERROR: Cell<ErrorCode> = const { Cell::new(ErrorCode::Ok) };
}

/// Code of the most recent failing call on this thread.
///
/// Reading the code resets it to [`ErrorCode::Ok`].
pub fn last_error_code() -> ErrorCode {
    LAST_ERROR.with(|code| code.replace(ErrorCode::Ok))
}

/// Record the outcome of a public operation in the thread's last-error slot.
pub(crate) fn record<T>(result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        LAST_ERROR.with(|code| code.set(err.code()));
    }
    result
}

/// Result type for strata-fs operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_errors_are_classified() {
        let err = Error::from_archive(ArchiveError::NotADirectory("a".into()), "x/a");
        assert!(matches!(err, Error::NotFound(ref p) if p == "x/a"));

        let err = Error::from_archive(ArchiveError::ReadOnly, "x");
        assert_eq!(err.code(), ErrorCode::ReadOnly);

        let err = Error::from_archive(ArchiveError::Corrupt("bad".into()), "x");
        assert_eq!(err.code(), ErrorCode::Corrupt);
    }

    #[test]
    fn last_error_is_reset_on_read() {
        let _ = record::<()>(Err(Error::NoWriteDirectory));
        assert_eq!(last_error_code(), ErrorCode::NoWriteDirectory);
        assert_eq!(last_error_code(), ErrorCode::Ok);
    }

    #[test]
    fn success_does_not_clear_last_error() {
        let _ = record::<()>(Err(Error::InvalidHandle));
        let _ = record(Ok(1));
        assert_eq!(last_error_code(), ErrorCode::InvalidHandle);
    }
}
