//! Open file handles.
//!
//! A [`FileHandle`] owns the archive-provided native file. The native file
//! lives in a slot shared with the handle table so that `deinit` can release
//! every handle still open, and the slot carries the liveness token of the
//! source the file was opened through so that unmounting turns the handle
//! stale without touching it.

use log::{trace, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::sync::{Arc, Weak};
use strata_archive::{ArchiveFile, ArchiveResult, OpenMode};

use crate::search_path::SourceToken;
use crate::{Error, Result};

pub(crate) struct HandleSlot {
    native: Mutex<Option<Box<dyn ArchiveFile>>>,
    token: SourceToken,
}

/// Every handle currently open through one filesystem instance.
#[derive(Default)]
pub(crate) struct HandleTable {
    next_id: u64,
    open: HashMap<u64, Weak<HandleSlot>>,
}

impl HandleTable {
    fn track(&mut self, slot: &Arc<HandleSlot>) -> u64 {
        self.next_id += 1;
        self.open.insert(self.next_id, Arc::downgrade(slot));
        self.next_id
    }

    fn untrack(&mut self, id: u64) {
        self.open.remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn open_count(&self) -> usize {
        self.open.values().filter(|w| w.strong_count() > 0).count()
    }

    /// Release every tracked native file. Handles stay with their owners
    /// and report [`Error::InvalidHandle`] afterwards.
    pub(crate) fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for (id, slot) in self.open.drain() {
            let Some(slot) = slot.upgrade() else {
                continue;
            };
            let native = slot.native.lock().take();
            if let Some(native) = native {
                if let Err(err) = native.close() {
                    warn!("handle {} failed to close cleanly: {}", id, err);
                }
                closed += 1;
            }
        }
        closed
    }
}

/// An open file in the virtual filesystem.
///
/// Exclusively owned by whoever opened it. Dropping the handle releases the
/// native file; use [`close`](FileHandle::close) to observe flush failures.
pub struct FileHandle {
    id: u64,
    mode: OpenMode,
    path: String,
    slot: Arc<HandleSlot>,
    table: Weak<Mutex<HandleTable>>,
}

impl FileHandle {
    pub(crate) fn new(
        native: Box<dyn ArchiveFile>,
        mode: OpenMode,
        path: String,
        token: SourceToken,
        table: &Arc<Mutex<HandleTable>>,
    ) -> Self {
        let slot = Arc::new(HandleSlot {
            native: Mutex::new(Some(native)),
            token,
        });
        let id = table.lock().track(&slot);
        trace!("handle {} opened for {:?} ({:?})", id, path, mode);
        Self {
            id,
            mode,
            path,
            slot,
            table: Arc::downgrade(table),
        }
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Logical path the handle was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the source this handle was opened through is gone.
    pub fn is_stale(&self) -> bool {
        !self.slot.token.is_live()
    }

    fn with_native<T>(
        &self,
        op: impl FnOnce(&mut Box<dyn ArchiveFile>) -> ArchiveResult<T>,
    ) -> Result<T> {
        let mut native = self.slot.native.lock();
        let native = native.as_mut().ok_or(Error::InvalidHandle)?;
        if !self.slot.token.is_live() {
            return Err(Error::StaleHandle);
        }
        op(native).map_err(|err| Error::from_archive(err, &self.path))
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.with_native(|f| f.read(buf))
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<usize> {
        if self.mode == OpenMode::Read {
            return Err(Error::ReadOnly(self.path.clone()));
        }
        self.with_native(|f| f.write(buf))
    }

    /// Move to an absolute position.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.with_native(|f| f.seek(position))
    }

    pub fn tell(&self) -> Result<u64> {
        self.with_native(|f| Ok(f.tell()))
    }

    /// Current total size of the file.
    pub fn length(&mut self) -> Result<u64> {
        self.with_native(|f| f.length())
    }

    pub fn eof(&mut self) -> Result<bool> {
        self.with_native(|f| Ok(f.tell() >= f.length()?))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.with_native(|f| f.flush())
    }

    /// Flush and release the native file.
    ///
    /// Closing a handle that was already released by `deinit` succeeds.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if let Some(table) = self.table.upgrade() {
            table.lock().untrack(self.id);
        }
        let native = self.slot.native.lock().take();
        match native {
            Some(native) => {
                trace!("handle {} closed", self.id);
                native.close().map_err(Error::CloseError)
            }
            None => Ok(()),
        }
    }

    fn read_exact_bytes(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.read_bytes(buf)?;
            if n == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{}: unexpected end of file", self.path),
                )));
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    fn write_all_bytes(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write_bytes(buf)?;
            if n == 0 {
                return Err(Error::Io(io::ErrorKind::WriteZero.into()));
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("dropping handle for {}: {}", self.path, err);
        }
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("path", &self.path)
            .field("stale", &self.is_stale())
            .finish()
    }
}

// Fixed-width integers in an explicit byte order, named after the
// signedness/endianness/width they transfer (`sle16` = signed little-endian 16).
macro_rules! endian_io {
    ($($read:ident, $write:ident, $ty:ty, $from:ident, $to:ident;)*) => {
        impl FileHandle {
            $(
                pub fn $read(&mut self) -> Result<$ty> {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    self.read_exact_bytes(&mut buf)?;
                    Ok(<$ty>::$from(buf))
                }

                pub fn $write(&mut self, value: $ty) -> Result<()> {
                    self.write_all_bytes(&value.$to())
                }
            )*
        }
    };
}

endian_io! {
    read_sle16, write_sle16, i16, from_le_bytes, to_le_bytes;
    read_ule16, write_ule16, u16, from_le_bytes, to_le_bytes;
    read_sbe16, write_sbe16, i16, from_be_bytes, to_be_bytes;
    read_ube16, write_ube16, u16, from_be_bytes, to_be_bytes;
    read_sle32, write_sle32, i32, from_le_bytes, to_le_bytes;
    read_ule32, write_ule32, u32, from_le_bytes, to_le_bytes;
    read_sbe32, write_sbe32, i32, from_be_bytes, to_be_bytes;
    read_ube32, write_ube32, u32, from_be_bytes, to_be_bytes;
    read_sle64, write_sle64, i64, from_le_bytes, to_le_bytes;
    read_ule64, write_ule64, u64, from_le_bytes, to_le_bytes;
    read_sbe64, write_sbe64, i64, from_be_bytes, to_be_bytes;
    read_ube64, write_ube64, u64, from_be_bytes, to_be_bytes;
}

fn to_io(err: Error) -> io::Error {
    match err {
        Error::Io(err) => err,
        Error::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
        Error::PermissionDenied(_) | Error::ReadOnly(_) => {
            io::Error::new(io::ErrorKind::PermissionDenied, err)
        }
        Error::OutOfRange { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

impl io::Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(to_io)
    }
}

impl io::Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(to_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        FileHandle::flush(self).map_err(to_io)
    }
}

impl io::Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => {
                let len = self.length().map_err(to_io)?;
                len.checked_add_signed(delta)
            }
            SeekFrom::Current(delta) => {
                let current = self.tell().map_err(to_io)?;
                current.checked_add_signed(delta)
            }
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        FileHandle::seek(self, target).map_err(to_io)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_archive::{ArchiveError, ArchiveResult};

    /// In-memory native file for exercising the handle wrapper.
    struct VecFile {
        data: Vec<u8>,
        position: usize,
        fail_close: bool,
    }

    impl ArchiveFile for VecFile {
        fn read(&mut self, buf: &mut [u8]) -> ArchiveResult<usize> {
            let n = buf.len().min(self.data.len() - self.position);
            buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
            self.position += n;
            Ok(n)
        }

        fn write(&mut self, buf: &[u8]) -> ArchiveResult<usize> {
            self.data.truncate(self.position);
            self.data.extend_from_slice(buf);
            self.position += buf.len();
            Ok(buf.len())
        }

        fn seek(&mut self, position: u64) -> ArchiveResult<()> {
            if position as usize > self.data.len() {
                return Err(ArchiveError::OutOfRange {
                    position,
                    length: self.data.len() as u64,
                });
            }
            self.position = position as usize;
            Ok(())
        }

        fn tell(&self) -> u64 {
            self.position as u64
        }

        fn length(&mut self) -> ArchiveResult<u64> {
            Ok(self.data.len() as u64)
        }

        fn close(self: Box<Self>) -> ArchiveResult<()> {
            if self.fail_close {
                Err(ArchiveError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "disk full",
                )))
            } else {
                Ok(())
            }
        }
    }

    fn handle(
        data: &[u8],
        mode: OpenMode,
        fail_close: bool,
    ) -> (FileHandle, SourceToken, Arc<Mutex<HandleTable>>) {
        let table = Arc::new(Mutex::new(HandleTable::default()));
        let token = SourceToken::new();
        let native = Box::new(VecFile {
            data: data.to_vec(),
            position: 0,
            fail_close,
        });
        let handle = FileHandle::new(native, mode, "test.bin".to_string(), token.clone(), &table);
        (handle, token, table)
    }

    #[test]
    fn endian_round_trip() {
        let (mut h, _token, _table) = handle(b"", OpenMode::Write, false);
        h.write_ube32(0x0102_0304).unwrap();
        h.write_sle16(-2).unwrap();
        h.seek(0).unwrap();
        assert_eq!(h.read_ule32().unwrap(), 0x0403_0201);
        assert_eq!(h.read_sle16().unwrap(), -2);
        assert!(matches!(h.read_ule64(), Err(Error::Io(_))));
    }

    #[test]
    fn stale_after_token_invalidated() {
        let (mut h, token, _table) = handle(b"abc", OpenMode::Read, false);
        token.invalidate();
        assert!(h.is_stale());
        let mut buf = [0u8; 3];
        assert!(matches!(h.read_bytes(&mut buf), Err(Error::StaleHandle)));
        assert!(h.close().is_ok());
    }

    #[test]
    fn close_reports_flush_failure() {
        let (h, _token, _table) = handle(b"", OpenMode::Write, true);
        assert!(matches!(h.close(), Err(Error::CloseError(_))));
    }

    #[test]
    fn close_all_releases_tracked_handles() {
        let (mut h, _token, table) = handle(b"abc", OpenMode::Read, false);
        assert_eq!(table.lock().open_count(), 1);
        assert_eq!(table.lock().close_all(), 1);
        assert!(matches!(h.length(), Err(Error::InvalidHandle)));
        assert!(h.close().is_ok());
    }

    #[test]
    fn drop_untracks() {
        let (h, _token, table) = handle(b"abc", OpenMode::Read, false);
        drop(h);
        assert_eq!(table.lock().open_count(), 0);
    }

    #[test]
    fn read_handle_refuses_writes() {
        let (mut h, _token, _table) = handle(b"abc", OpenMode::Read, false);
        assert!(matches!(h.write_bytes(b"x"), Err(Error::ReadOnly(_))));
    }

    #[test]
    fn std_io_seek_from_end() {
        use std::io::{Read, Seek};
        let (mut h, _token, _table) = handle(b"abcdef", OpenMode::Read, false);
        assert_eq!(Seek::seek(&mut h, SeekFrom::End(-2)).unwrap(), 4);
        let mut rest = String::new();
        h.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "ef");
        assert!(Seek::seek(&mut h, SeekFrom::Current(-10)).is_err());
    }
}
