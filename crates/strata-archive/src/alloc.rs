//! Pluggable buffer provider.
//!
//! Archivers that materialise entries in memory request their buffers here
//! instead of allocating directly, so an embedder can cap or account for the
//! memory the filesystem uses. The provider must be installed before the
//! filesystem is initialised and stays in place until it is deinitialised.

use crate::{ArchiveError, ArchiveResult};

/// Swappable resource provider for archive buffers.
pub trait Allocator: Send + Sync {
    /// Called once when the filesystem initialises. Returning `false` aborts
    /// initialisation.
    fn init(&self) -> bool {
        true
    }

    /// Called once when the filesystem shuts down.
    fn deinit(&self) {}

    /// Provide a zeroed buffer of exactly `len` bytes.
    fn allocate(&self, len: usize) -> ArchiveResult<Vec<u8>>;

    /// Resize a buffer previously handed out by [`allocate`](Allocator::allocate).
    fn reallocate(&self, mut buf: Vec<u8>, len: usize) -> ArchiveResult<Vec<u8>> {
        buf.resize(len, 0);
        Ok(buf)
    }

    /// Return a buffer to the provider.
    fn free(&self, buf: Vec<u8>) {
        drop(buf);
    }
}

/// Default provider backed by the global heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, len: usize) -> ArchiveResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| ArchiveError::OutOfMemory(len))?;
        buf.resize(len, 0);
        Ok(buf)
    }
}
