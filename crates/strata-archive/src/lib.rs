//! # strata-archive
//!
//! The archiver capability contract used by `strata-fs`.
//!
//! This crate provides:
//! - The [`Archiver`] / [`Archive`] / [`ArchiveFile`] traits every container
//!   format implements
//! - [`ArchiveInfo`] and [`MetaData`] records
//! - A pluggable [`Allocator`] for entry buffers
//! - Built-in archivers for plain directories ([`DirArchiver`]) and ZIP
//!   containers ([`ZipArchiver`])
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata_archive::{Archiver, OpenContext, OpenMode, Source, SystemAllocator, ZipArchiver};
//!
//! let source = Source::path("base.zip");
//! let archiver = ZipArchiver::new();
//! assert!(archiver.probe(&source));
//!
//! let archive = archiver.open(&source, &OpenContext::new(Arc::new(SystemAllocator)))?;
//! for name in archive.enumerate("")? {
//!     println!("{name}");
//! }
//! let mut file = archive.open_file("readme.txt", OpenMode::Read)?;
//! ```

mod alloc;
mod archiver;
mod dir;
mod error;
mod meta;
mod source;
mod zip_archive;

pub use alloc::{Allocator, SystemAllocator};
pub use archiver::{Archive, ArchiveFile, ArchiveInfo, Archiver, OpenContext, OpenMode};
pub use dir::{DirArchive, DirArchiver, DirFile};
pub use error::{ArchiveError, ArchiveResult};
pub use meta::{FileType, MetaData};
pub use source::{ReadSeek, Source};
pub use zip_archive::{MemoryFile, ZipArchive, ZipArchiver};
