use log::{debug, trace};
use std::sync::Arc;
use strata_archive::{ArchiveInfo, Archiver, DirArchiver, Source, ZipArchiver};

use crate::{Error, Result};

/// Ordered set of archivers consulted at mount time.
///
/// The directory archiver is always available and always probed first; it is
/// not listed among the supported archive types.
pub struct Registry {
    dir: Arc<dyn Archiver>,
    archivers: Vec<Arc<dyn Archiver>>,
}

impl Registry {
    /// An empty registry: directories only.
    pub fn new() -> Self {
        Self {
            dir: Arc::new(DirArchiver::new()),
            archivers: Vec::new(),
        }
    }

    /// A registry with the built-in container formats.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.archivers.push(Arc::new(ZipArchiver::new()));
        registry
    }

    pub fn register(&mut self, archiver: Arc<dyn Archiver>) -> Result<()> {
        let ext = archiver.info().extension.clone();
        if ext.is_empty() || self.position(&ext).is_some() {
            return Err(Error::DuplicateFormat(ext));
        }
        debug!("registered archiver {}", ext);
        self.archivers.push(archiver);
        Ok(())
    }

    pub fn deregister(&mut self, ext: &str) -> Result<Arc<dyn Archiver>> {
        let idx = self
            .position(ext)
            .ok_or_else(|| Error::UnknownFormat(ext.to_string()))?;
        debug!("deregistered archiver {}", ext);
        Ok(self.archivers.remove(idx))
    }

    pub fn lookup(&self, ext: &str) -> Result<Arc<dyn Archiver>> {
        self.position(ext)
            .map(|idx| self.archivers[idx].clone())
            .ok_or_else(|| Error::UnknownFormat(ext.to_string()))
    }

    /// Info records in registration order.
    pub fn supported(&self) -> Vec<ArchiveInfo> {
        self.archivers.iter().map(|a| a.info().clone()).collect()
    }

    /// First archiver whose probe claims `source`.
    pub fn detect(&self, source: &Source) -> Result<Arc<dyn Archiver>> {
        if self.dir.probe(source) {
            return Ok(self.dir.clone());
        }
        for archiver in &self.archivers {
            trace!("probing {} with {}", source.location(), archiver.info().extension);
            if archiver.probe(source) {
                return Ok(archiver.clone());
            }
        }
        Err(Error::UnsupportedFormat(source.location()))
    }

    /// The archiver backing write directories.
    pub fn dir_archiver(&self) -> Arc<dyn Archiver> {
        self.dir.clone()
    }

    fn position(&self, ext: &str) -> Option<usize> {
        self.archivers
            .iter()
            .position(|a| a.info().extension.eq_ignore_ascii_case(ext))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
