//! Archiver for plain directories on the native filesystem.
//!
//! This is the only archiver that can back the write directory and the only
//! built-in one that can contain symbolic links.

use log::{debug, trace};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    Archive, ArchiveError, ArchiveFile, ArchiveInfo, ArchiveResult, Archiver, MetaData,
    OpenContext, OpenMode, Source,
};

/// Treats a real directory as an archive.
#[derive(Debug)]
pub struct DirArchiver {
    info: ArchiveInfo,
}

impl DirArchiver {
    pub fn new() -> Self {
        Self {
            info: ArchiveInfo {
                extension: String::new(),
                description: "Non-archive, direct filesystem I/O".to_string(),
                author: "strata contributors".to_string(),
                url: String::new(),
                supports_writing: true,
                supports_symlinks: true,
            },
        }
    }
}

impl Default for DirArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for DirArchiver {
    fn info(&self) -> &ArchiveInfo {
        &self.info
    }

    fn probe(&self, source: &Source) -> bool {
        source.is_dir()
    }

    fn open(&self, source: &Source, ctx: &OpenContext) -> ArchiveResult<Arc<dyn Archive>> {
        let root = source
            .as_path()
            .filter(|p| p.is_dir())
            .ok_or_else(|| ArchiveError::Unsupported(source.location()))?
            .to_path_buf();

        if ctx.for_writing {
            tempfile::tempfile_in(&root).map_err(|e| {
                debug!("write check in {:?} failed: {}", root, e);
                ArchiveError::PermissionDenied(source.location())
            })?;
        }

        debug!("dir archive opened at {:?} (writable: {})", root, ctx.for_writing);
        Ok(Arc::new(DirArchive {
            root,
            writable: ctx.for_writing,
        }))
    }
}

/// An opened directory.
#[derive(Debug)]
pub struct DirArchive {
    root: PathBuf,
    writable: bool,
}

impl DirArchive {
    fn native(&self, path: &str) -> PathBuf {
        let mut native = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            native.push(segment);
        }
        native
    }

    fn ensure_writable(&self) -> ArchiveResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(ArchiveError::ReadOnly)
        }
    }
}

impl Archive for DirArchive {
    fn stat(&self, path: &str, follow_links: bool) -> ArchiveResult<MetaData> {
        let native = self.native(path);
        let meta = if follow_links {
            fs::metadata(&native)
        } else {
            fs::symlink_metadata(&native)
        }
        .map_err(|e| ArchiveError::from_io(e, path))?;
        Ok(MetaData::from_fs(&meta))
    }

    fn enumerate(&self, dir: &str) -> ArchiveResult<Vec<String>> {
        let native = self.native(dir);
        let meta = fs::metadata(&native).map_err(|e| ArchiveError::from_io(e, dir))?;
        if !meta.is_dir() {
            return Err(ArchiveError::NotADirectory(dir.to_string()));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&native).map_err(|e| ArchiveError::from_io(e, dir))? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        trace!("enumerate({:?}) -> {} entries", native, names.len());
        Ok(names)
    }

    fn open_file(&self, path: &str, mode: OpenMode) -> ArchiveResult<Box<dyn ArchiveFile>> {
        let native = self.native(path);
        if native.is_dir() {
            return Err(ArchiveError::IsADirectory(path.to_string()));
        }

        let file = match mode {
            OpenMode::Read => {
                let file = File::open(&native).map_err(|e| ArchiveError::from_io(e, path))?;
                return Ok(Box::new(DirFile::reader(file, path)));
            }
            OpenMode::Write => {
                self.ensure_writable()?;
                File::create(&native)
            }
            OpenMode::Append => {
                self.ensure_writable()?;
                OpenOptions::new().create(true).append(true).open(&native)
            }
        }
        .map_err(|e| ArchiveError::from_io(e, path))?;

        let append_end = match mode {
            OpenMode::Append => Some(file.metadata()?.len()),
            _ => None,
        };
        Ok(Box::new(DirFile::writer(file, path, append_end)))
    }

    fn mkdir(&self, path: &str) -> ArchiveResult<()> {
        self.ensure_writable()?;
        fs::create_dir_all(self.native(path)).map_err(|e| ArchiveError::from_io(e, path))
    }

    fn remove(&self, path: &str) -> ArchiveResult<()> {
        self.ensure_writable()?;
        let native = self.native(path);
        let meta = fs::symlink_metadata(&native).map_err(|e| ArchiveError::from_io(e, path))?;
        if meta.is_dir() {
            fs::remove_dir(&native)
        } else {
            fs::remove_file(&native)
        }
        .map_err(|e| ArchiveError::from_io(e, path))
    }
}

#[derive(Debug)]
enum DirStream {
    Reader(File),
    Writer(BufWriter<File>),
}

/// A native file opened through a [`DirArchive`].
#[derive(Debug)]
pub struct DirFile {
    stream: DirStream,
    path: String,
    position: u64,
    /// End of file for append handles; every write lands there.
    append_end: Option<u64>,
}

impl DirFile {
    fn reader(file: File, path: &str) -> Self {
        Self {
            stream: DirStream::Reader(file),
            path: path.to_string(),
            position: 0,
            append_end: None,
        }
    }

    fn writer(file: File, path: &str, append_end: Option<u64>) -> Self {
        Self {
            stream: DirStream::Writer(BufWriter::new(file)),
            path: path.to_string(),
            position: append_end.unwrap_or(0),
            append_end,
        }
    }
}

impl ArchiveFile for DirFile {
    fn read(&mut self, buf: &mut [u8]) -> ArchiveResult<usize> {
        match &mut self.stream {
            DirStream::Reader(file) => {
                let n = file.read(buf)?;
                self.position += n as u64;
                Ok(n)
            }
            DirStream::Writer(_) => Err(ArchiveError::PermissionDenied(format!(
                "{} is open for writing",
                self.path
            ))),
        }
    }

    fn write(&mut self, buf: &[u8]) -> ArchiveResult<usize> {
        match &mut self.stream {
            DirStream::Writer(writer) => {
                writer.write_all(buf)?;
                let written = buf.len() as u64;
                self.position = match &mut self.append_end {
                    Some(end) => {
                        *end += written;
                        *end
                    }
                    None => self.position + written,
                };
                Ok(buf.len())
            }
            DirStream::Reader(_) => Err(ArchiveError::ReadOnly),
        }
    }

    fn seek(&mut self, position: u64) -> ArchiveResult<()> {
        match &mut self.stream {
            DirStream::Reader(file) => {
                let length = file.metadata()?.len();
                if position > length {
                    return Err(ArchiveError::OutOfRange { position, length });
                }
                file.seek(SeekFrom::Start(position))?;
            }
            DirStream::Writer(writer) => {
                writer.seek(SeekFrom::Start(position))?;
            }
        }
        self.position = position;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn length(&mut self) -> ArchiveResult<u64> {
        match &mut self.stream {
            DirStream::Reader(file) => Ok(file.metadata()?.len()),
            DirStream::Writer(writer) => {
                writer.flush()?;
                Ok(writer.get_ref().metadata()?.len())
            }
        }
    }

    fn flush(&mut self) -> ArchiveResult<()> {
        if let DirStream::Writer(writer) = &mut self.stream {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> ArchiveResult<()> {
        match self.stream {
            DirStream::Reader(_) => Ok(()),
            DirStream::Writer(writer) => {
                let file = writer.into_inner().map_err(|e| ArchiveError::Io(e.into_error()))?;
                file.sync_data()?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemAllocator;
    use tempfile::TempDir;

    fn open_dir(dir: &TempDir, writable: bool) -> Arc<dyn Archive> {
        let mut ctx = OpenContext::new(Arc::new(SystemAllocator));
        ctx.for_writing = writable;
        DirArchiver::new()
            .open(&Source::path(dir.path()), &ctx)
            .unwrap()
    }

    #[test]
    fn probe_accepts_directories_only() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let archiver = DirArchiver::new();
        assert!(archiver.probe(&Source::path(dir.path())));
        assert!(!archiver.probe(&Source::path(&file)));
        assert!(!archiver.probe(&Source::memory("mem", b"x".to_vec())));
    }

    #[test]
    fn stat_and_enumerate() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/a.txt"), b"hello").unwrap();

        let archive = open_dir(&dir, false);
        let meta = archive.stat("sub/a.txt", true).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.size, 5);
        assert!(archive.stat("sub", true).unwrap().is_dir());
        assert!(archive.stat("missing", true).unwrap_err().is_not_found());

        assert_eq!(archive.enumerate("sub").unwrap(), vec!["a.txt".to_string()]);
        assert!(matches!(
            archive.enumerate("sub/a.txt"),
            Err(ArchiveError::NotADirectory(_))
        ));
    }

    #[test]
    fn read_only_archive_refuses_writes() {
        let dir = TempDir::new().unwrap();
        let archive = open_dir(&dir, false);
        assert!(matches!(
            archive.open_file("new.txt", OpenMode::Write),
            Err(ArchiveError::ReadOnly)
        ));
        assert!(matches!(archive.mkdir("d"), Err(ArchiveError::ReadOnly)));
    }

    #[test]
    fn write_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let archive = open_dir(&dir, true);

        let mut file = archive.open_file("log.txt", OpenMode::Write).unwrap();
        file.write(b"one").unwrap();
        file.close().unwrap();

        let mut file = archive.open_file("log.txt", OpenMode::Append).unwrap();
        assert_eq!(file.tell(), 3);
        file.write(b"two").unwrap();
        assert_eq!(file.length().unwrap(), 6);
        file.close().unwrap();

        let mut file = archive.open_file("log.txt", OpenMode::Read).unwrap();
        let mut buf = [0u8; 16];
        let n = file.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"onetwo");
        assert!(matches!(
            file.seek(7),
            Err(ArchiveError::OutOfRange {
                position: 7,
                length: 6
            })
        ));
    }

    #[test]
    fn mkdir_and_remove() {
        let dir = TempDir::new().unwrap();
        let archive = open_dir(&dir, true);

        archive.mkdir("a/b").unwrap();
        assert!(dir.path().join("a/b").is_dir());
        archive.remove("a/b").unwrap();
        assert!(!dir.path().join("a/b").exists());
        assert!(archive.remove("a/b").unwrap_err().is_not_found());
    }

    #[test]
    fn opening_a_directory_fails() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let archive = open_dir(&dir, false);
        assert!(matches!(
            archive.open_file("sub", OpenMode::Read),
            Err(ArchiveError::IsADirectory(_))
        ));
    }

    #[test]
    fn append_writes_report_the_end_of_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("log.txt"), b"head").unwrap();
        let archive = open_dir(&dir, true);

        let mut file = archive.open_file("log.txt", OpenMode::Append).unwrap();
        file.seek(0).unwrap();
        assert_eq!(file.tell(), 0);
        file.write(b"tail").unwrap();
        assert_eq!(file.tell(), 8);
        file.close().unwrap();

        assert_eq!(fs::read(dir.path().join("log.txt")).unwrap(), b"headtail");
    }

    #[cfg(unix)]
    #[test]
    fn write_access_is_checked_on_the_filesystem() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users can still create files here.
        let can_write = tempfile::tempfile_in(dir.path()).is_ok();

        let ctx = OpenContext::new(Arc::new(SystemAllocator)).writing();
        let result = DirArchiver::new().open(&Source::path(dir.path()), &ctx);
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();

        match result {
            Ok(_) => assert!(can_write),
            Err(err) => {
                assert!(!can_write);
                assert!(matches!(err, ArchiveError::PermissionDenied(_)));
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn stat_distinguishes_symlinks() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("target.txt"), b"data").unwrap();
        std::os::unix::fs::symlink(dir.path().join("target.txt"), dir.path().join("link.txt"))
            .unwrap();

        let archive = open_dir(&dir, false);
        assert!(archive.stat("link.txt", false).unwrap().is_symlink());
        assert!(archive.stat("link.txt", true).unwrap().is_file());
    }
}
