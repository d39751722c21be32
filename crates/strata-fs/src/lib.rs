//! # strata-fs
//!
//! A virtual filesystem assembled from directories and archives.
//!
//! This crate provides:
//! - A prioritised search path of mounted sources, each visible under its
//!   own mount point
//! - Read resolution across that search path (first source wins) and merged
//!   directory listings
//! - A single write directory that receives every mutation
//! - Owned [`FileHandle`]s with endian-aware integer I/O
//! - An opt-in symbolic-link policy
//! - Pluggable archive formats through [`strata_archive::Archiver`]
//!
//! ## Example
//!
//! ```ignore
//! use strata_fs::{OpenMode, Vfs};
//!
//! let vfs = Vfs::new();
//! vfs.init(None)?;
//! vfs.mount("game/base.zip", "/", true)?;
//! vfs.mount("game/patch", "/", false)?; // shadows base.zip
//! vfs.set_write_dir(Some("saves".as_ref()))?;
//!
//! let mut level = vfs.open("maps/e1m1.bsp", OpenMode::Read)?;
//! let magic = level.read_ule32()?;
//!
//! let mut save = vfs.open("slot1.sav", OpenMode::Write)?;
//! save.write_ule32(magic)?;
//! vfs.close(Some(save))?;
//! vfs.deinit()?;
//! ```
//!
//! ## Status codes
//!
//! Every failing operation also records an [`ErrorCode`] for the calling
//! thread, retrievable (and cleared) with [`last_error_code`].

mod config;
mod error;
mod handle;
pub mod path;
mod platform;
mod registry;
mod resolver;
mod search_path;
pub mod util;
mod vfs;

pub use config::{AppSection, MountConfig, VfsConfig};
pub use error::{last_error_code, Error, ErrorCode, Result};
pub use handle::FileHandle;
pub use platform::{cdrom_dirs, cdrom_dirs_with, dir_separator, linked_version, Version};
pub use registry::Registry;
pub use vfs::{EnumerateControl, Vfs};

// Re-export the archiver contract for implementors and callers
pub use strata_archive::{
    Allocator, Archive, ArchiveError, ArchiveFile, ArchiveInfo, Archiver, FileType, MetaData,
    OpenContext, OpenMode, Source, SystemAllocator,
};
