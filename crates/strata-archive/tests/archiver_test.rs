use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_archive::{
    Allocator, ArchiveError, ArchiveResult, Archiver, DirArchiver, OpenContext, OpenMode, Source,
    SystemAllocator, ZipArchiver,
};
use tempfile::TempDir;
use zip::{write::FileOptions, ZipWriter};

fn create_test_zip(dir: &Path) -> PathBuf {
    let path = dir.join("assets.zip");
    let file = File::create(&path).unwrap();
    let mut zip = ZipWriter::new(file);

    let stored: FileOptions<()> =
        FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated: FileOptions<()> =
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.add_directory("textures/", stored).unwrap();
    zip.start_file("textures/brick.png", stored).unwrap();
    zip.write_all(b"not really a png").unwrap();

    zip.start_file("config.toml", deflated).unwrap();
    zip.write_all("volume = 11\n".repeat(64).as_bytes()).unwrap();

    zip.finish().unwrap();
    path
}

#[derive(Default)]
struct CountingAllocator {
    allocations: AtomicUsize,
    frees: AtomicUsize,
    largest: AtomicUsize,
}

impl Allocator for CountingAllocator {
    fn allocate(&self, len: usize) -> ArchiveResult<Vec<u8>> {
        self.allocations.fetch_add(1, Ordering::SeqCst);
        self.largest.fetch_max(len, Ordering::SeqCst);
        SystemAllocator.allocate(len)
    }

    fn reallocate(&self, buf: Vec<u8>, len: usize) -> ArchiveResult<Vec<u8>> {
        self.largest.fetch_max(len, Ordering::SeqCst);
        SystemAllocator.reallocate(buf, len)
    }

    fn free(&self, _buf: Vec<u8>) {
        self.frees.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn zip_on_disk_is_probed_and_read() {
    let temp = TempDir::new().unwrap();
    let path = create_test_zip(temp.path());
    let source = Source::path(&path);

    assert!(ZipArchiver::new().probe(&source));
    assert!(!DirArchiver::new().probe(&source));

    let ctx = OpenContext::new(Arc::new(SystemAllocator));
    let archive = ZipArchiver::new().open(&source, &ctx).unwrap();

    let meta = archive.stat("config.toml", false).unwrap();
    assert_eq!(meta.size, 12 * 64);
    assert!(meta.read_only);
    assert!(meta.modified.is_some());

    let mut file = archive.open_file("config.toml", OpenMode::Read).unwrap();
    let mut buf = vec![0u8; 12];
    assert_eq!(file.read(&mut buf).unwrap(), 12);
    assert_eq!(&buf, b"volume = 11\n");
    file.close().unwrap();

    assert_eq!(
        archive.enumerate("").unwrap(),
        vec!["config.toml".to_string(), "textures".to_string()]
    );
}

#[test]
fn zip_entries_use_the_configured_allocator() {
    let temp = TempDir::new().unwrap();
    let path = create_test_zip(temp.path());

    let allocator = Arc::new(CountingAllocator::default());
    let ctx = OpenContext::new(allocator.clone());
    let archive = ZipArchiver::new().open(&Source::path(&path), &ctx).unwrap();

    let file = archive
        .open_file("textures/brick.png", OpenMode::Read)
        .unwrap();
    assert_eq!(allocator.allocations.load(Ordering::SeqCst), 1);
    file.close().unwrap();
    assert_eq!(allocator.frees.load(Ordering::SeqCst), 1);
}

// Rewrites the uncompressed size of every central directory record.
fn patch_declared_size(mut bytes: Vec<u8>, size: u32) -> Vec<u8> {
    let signature = [0x50, 0x4b, 0x01, 0x02];
    let starts: Vec<usize> = bytes
        .windows(4)
        .enumerate()
        .filter(|(_, w)| *w == signature)
        .map(|(i, _)| i)
        .collect();
    for start in starts {
        bytes[start + 24..start + 28].copy_from_slice(&size.to_le_bytes());
    }
    bytes
}

#[test]
fn inflated_size_field_does_not_drive_allocation() {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let stored: FileOptions<()> =
        FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file("big.bin", stored).unwrap();
    zip.write_all(b"tiny").unwrap();
    let bytes = patch_declared_size(zip.finish().unwrap().into_inner(), 3 << 30);

    let allocator = Arc::new(CountingAllocator::default());
    let ctx = OpenContext::new(allocator.clone());
    let archive = ZipArchiver::new()
        .open(&Source::memory("big.zip", bytes), &ctx)
        .unwrap();
    assert_eq!(archive.stat("big.bin", false).unwrap().size, 3 << 30);

    assert!(matches!(
        archive.open_file("big.bin", OpenMode::Read),
        Err(ArchiveError::Corrupt(_))
    ));
    assert!(allocator.largest.load(Ordering::SeqCst) <= 64 * 1024);
    assert_eq!(allocator.frees.load(Ordering::SeqCst), 1);
}

#[test]
fn large_entries_are_read_in_full() {
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let deflated: FileOptions<()> =
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("blob.bin", deflated).unwrap();
    zip.write_all(&payload).unwrap();
    let bytes = zip.finish().unwrap().into_inner();

    let ctx = OpenContext::new(Arc::new(SystemAllocator));
    let archive = ZipArchiver::new()
        .open(&Source::memory("blob.zip", bytes), &ctx)
        .unwrap();
    let mut file = archive.open_file("blob.bin", OpenMode::Read).unwrap();
    assert_eq!(file.length().unwrap(), payload.len() as u64);

    let mut read = vec![0u8; payload.len()];
    let mut filled = 0;
    while filled < read.len() {
        let n = file.read(&mut read[filled..]).unwrap();
        assert!(n > 0);
        filled += n;
    }
    assert_eq!(read, payload);
}

#[test]
fn zip_cannot_back_a_write_directory() {
    let temp = TempDir::new().unwrap();
    let path = create_test_zip(temp.path());

    let ctx = OpenContext::new(Arc::new(SystemAllocator)).writing();
    let result = ZipArchiver::new().open(&Source::path(&path), &ctx);
    assert!(matches!(result, Err(ArchiveError::ReadOnly)));
}

#[test]
fn directory_archiver_opens_nested_paths() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("a/b")).unwrap();
    std::fs::write(temp.path().join("a/b/c.txt"), b"deep").unwrap();

    let ctx = OpenContext::new(Arc::new(SystemAllocator));
    let archive = DirArchiver::new()
        .open(&Source::path(temp.path()), &ctx)
        .unwrap();

    let mut file = archive.open_file("a/b/c.txt", OpenMode::Read).unwrap();
    let mut buf = [0u8; 8];
    let n = file.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"deep");
    assert!(matches!(
        archive.open_file("a/b/missing.txt", OpenMode::Read),
        Err(ArchiveError::NotFound(_))
    ));
}
