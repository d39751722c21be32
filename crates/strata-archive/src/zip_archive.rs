//! Read-only archiver for ZIP containers.
//!
//! Decoding is delegated to the `zip` crate. The central directory is indexed
//! once at mount time; entries are decompressed into a buffer from the
//! configured [`Allocator`] when opened. The buffer grows as data arrives, up
//! to the size the central directory declares.

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::time::SystemTime;

use crate::{
    Allocator, Archive, ArchiveError, ArchiveFile, ArchiveInfo, ArchiveResult, Archiver, MetaData,
    OpenContext, OpenMode, ReadSeek, Source,
};

/// Archiver for `.zip` files (and anything else in ZIP container format).
#[derive(Debug)]
pub struct ZipArchiver {
    info: ArchiveInfo,
}

impl ZipArchiver {
    pub fn new() -> Self {
        Self {
            info: ArchiveInfo {
                extension: "ZIP".to_string(),
                description: "PkZip/WinZip/Info-Zip compatible".to_string(),
                author: "strata contributors".to_string(),
                url: "https://crates.io/crates/zip".to_string(),
                supports_writing: false,
                supports_symlinks: false,
            },
        }
    }
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for ZipArchiver {
    fn info(&self) -> &ArchiveInfo {
        &self.info
    }

    fn probe(&self, source: &Source) -> bool {
        if source.is_dir() {
            return false;
        }
        match source.reader() {
            Ok(reader) => zip::ZipArchive::new(reader).is_ok(),
            Err(_) => false,
        }
    }

    fn open(&self, source: &Source, ctx: &OpenContext) -> ArchiveResult<Arc<dyn Archive>> {
        if ctx.for_writing {
            return Err(ArchiveError::ReadOnly);
        }

        let reader = source.reader()?;
        let mut zip = zip::ZipArchive::new(reader)?;
        let modified = source
            .as_path()
            .and_then(|p| fs::metadata(p).ok())
            .and_then(|m| m.modified().ok());

        let index = ZipIndex::build(&mut zip)?;
        debug!(
            "zip archive {} indexed: {} entries",
            source.location(),
            index.entries.len()
        );

        Ok(Arc::new(ZipArchive {
            zip: Mutex::new(zip),
            index,
            modified,
            allocator: ctx.allocator.clone(),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
struct ZipNode {
    index: Option<usize>,
    is_dir: bool,
    size: u64,
}

#[derive(Debug, Default)]
struct ZipIndex {
    entries: HashMap<String, ZipNode>,
    children: HashMap<String, BTreeSet<String>>,
}

impl ZipIndex {
    fn build(zip: &mut zip::ZipArchive<Box<dyn ReadSeek>>) -> ArchiveResult<Self> {
        let mut index = ZipIndex::default();

        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            let name = normalize_entry_name(file.name());
            if name.is_empty() {
                continue;
            }
            if name.split('/').any(|s| s == "..") {
                warn!("skipping zip entry with parent reference: {}", file.name());
                continue;
            }

            index.add_parents(&name);
            index.entries.insert(
                name,
                ZipNode {
                    index: Some(i),
                    is_dir: file.is_dir(),
                    size: if file.is_dir() { 0 } else { file.size() },
                },
            );
        }

        Ok(index)
    }

    fn add_parents(&mut self, name: &str) {
        let mut parent = String::new();
        for segment in name.split('/') {
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(segment.to_string());
            if !parent.is_empty() {
                parent.push('/');
            }
            parent.push_str(segment);
            if parent != name {
                self.entries.entry(parent.clone()).or_insert(ZipNode {
                    index: None,
                    is_dir: true,
                    size: 0,
                });
            }
        }
    }
}

fn normalize_entry_name(name: &str) -> String {
    name.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// An opened ZIP container.
pub struct ZipArchive {
    zip: Mutex<zip::ZipArchive<Box<dyn ReadSeek>>>,
    index: ZipIndex,
    modified: Option<SystemTime>,
    allocator: Arc<dyn Allocator>,
}

impl ZipArchive {
    fn node(&self, path: &str) -> ArchiveResult<ZipNode> {
        if path.is_empty() {
            return Ok(ZipNode {
                index: None,
                is_dir: true,
                size: 0,
            });
        }
        self.index
            .entries
            .get(path)
            .copied()
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))
    }
}

impl Archive for ZipArchive {
    fn stat(&self, path: &str, _follow_links: bool) -> ArchiveResult<MetaData> {
        let node = self.node(path)?;
        let mut meta = if node.is_dir {
            MetaData::directory(true)
        } else {
            MetaData::file(node.size, self.modified, true)
        };
        meta.modified = self.modified;
        Ok(meta)
    }

    fn enumerate(&self, dir: &str) -> ArchiveResult<Vec<String>> {
        let node = self.node(dir)?;
        if !node.is_dir {
            return Err(ArchiveError::NotADirectory(dir.to_string()));
        }
        Ok(self
            .index
            .children
            .get(dir)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn open_file(&self, path: &str, mode: OpenMode) -> ArchiveResult<Box<dyn ArchiveFile>> {
        if mode.is_write() {
            return Err(ArchiveError::ReadOnly);
        }

        let node = self.node(path)?;
        let index = match node.index {
            Some(index) if !node.is_dir => index,
            _ => return Err(ArchiveError::IsADirectory(path.to_string())),
        };

        let size = usize::try_from(node.size).map_err(|_| ArchiveError::OutOfMemory(usize::MAX))?;
        let mut zip = self.zip.lock();
        let entry = zip.by_index(index)?;
        let data = read_entry(entry, size, self.allocator.as_ref(), path)?;

        Ok(Box::new(MemoryFile {
            data,
            position: 0,
            allocator: self.allocator.clone(),
        }))
    }
}

const READ_CHUNK: usize = 64 * 1024;

fn read_entry(
    mut entry: impl Read,
    declared: usize,
    allocator: &dyn Allocator,
    path: &str,
) -> ArchiveResult<Vec<u8>> {
    let mut data = allocator.allocate(0)?;
    let mut filled = 0;

    while filled < declared {
        if filled == data.len() {
            let next = filled.saturating_add(READ_CHUNK).min(declared);
            data = allocator.reallocate(data, next)?;
        }
        match entry.read(&mut data[filled..]) {
            Ok(0) => {
                allocator.free(data);
                return Err(ArchiveError::Corrupt(format!(
                    "{path}: entry ends after {filled} of {declared} declared bytes"
                )));
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => {
                allocator.free(data);
                return Err(ArchiveError::Corrupt(format!("{path}: {err}")));
            }
        }
    }

    Ok(data)
}

/// A decompressed entry held in an allocator-provided buffer.
pub struct MemoryFile {
    data: Vec<u8>,
    position: u64,
    allocator: Arc<dyn Allocator>,
}

impl ArchiveFile for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> ArchiveResult<usize> {
        let start = (self.position as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, position: u64) -> ArchiveResult<()> {
        let length = self.data.len() as u64;
        if position > length {
            return Err(ArchiveError::OutOfRange { position, length });
        }
        self.position = position;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn length(&mut self) -> ArchiveResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn close(self: Box<Self>) -> ArchiveResult<()> {
        let MemoryFile {
            data, allocator, ..
        } = *self;
        allocator.free(data);
        Ok(())
    }
}
