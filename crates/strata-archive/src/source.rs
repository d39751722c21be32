use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ArchiveResult;

/// Anything an archiver can decode from.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A physical location that can be mounted.
#[derive(Clone)]
pub enum Source {
    /// A directory or container file on the native filesystem.
    Path(PathBuf),
    /// An archive image held in memory, identified by name.
    Memory {
        /// Name under which the image appears in the search path.
        name: String,
        /// Archive bytes.
        data: Arc<[u8]>,
    },
}

impl Source {
    pub fn path<P: Into<PathBuf>>(path: P) -> Self {
        Source::Path(path.into())
    }

    pub fn memory(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Source::Memory {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Human-readable location, as listed in the search path.
    pub fn location(&self) -> String {
        match self {
            Source::Path(path) => path.to_string_lossy().to_string(),
            Source::Memory { name, .. } => name.clone(),
        }
    }

    /// The native path, if this source lives on the filesystem.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Source::Path(path) => Some(path),
            Source::Memory { .. } => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.as_path().map(|p| p.is_dir()).unwrap_or(false)
    }

    /// Open a fresh byte stream over the source.
    ///
    /// Directories cannot be streamed and yield [`ArchiveError::Unsupported`](crate::ArchiveError::Unsupported).
    pub fn reader(&self) -> ArchiveResult<Box<dyn ReadSeek>> {
        match self {
            Source::Path(path) => {
                if path.is_dir() {
                    return Err(crate::ArchiveError::Unsupported(self.location()));
                }
                Ok(Box::new(File::open(path)?))
            }
            Source::Memory { data, .. } => Ok(Box::new(Cursor::new(SharedBytes(data.clone())))),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Source::Memory { name, data } => f
                .debug_struct("Memory")
                .field("name", name)
                .field("len", &data.len())
                .finish(),
        }
    }
}

struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
