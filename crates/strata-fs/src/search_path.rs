use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_archive::{Archive, Archiver, Source};

use crate::{Error, Result};

/// Liveness flag shared between a mounted source and every handle opened
/// through it.
#[derive(Debug, Clone)]
pub(crate) struct SourceToken(Arc<AtomicBool>);

impl SourceToken {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub(crate) fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn invalidate(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One entry of the search path.
pub(crate) struct MountedSource {
    pub(crate) source: Source,
    /// Identity used for duplicate detection: canonical path or blob name.
    pub(crate) identity: String,
    /// Normalised mount point; empty for the root.
    pub(crate) mount_point: String,
    pub(crate) archiver: Arc<dyn Archiver>,
    pub(crate) archive: Arc<dyn Archive>,
    pub(crate) token: SourceToken,
}

impl MountedSource {
    pub(crate) fn location(&self) -> String {
        self.source.location()
    }

    pub(crate) fn supports_symlinks(&self) -> bool {
        self.archiver.info().supports_symlinks
    }
}

/// Identity of a source for duplicate detection.
pub(crate) fn identity_of(source: &Source) -> String {
    match source {
        Source::Path(path) => canonical(path).to_string_lossy().to_string(),
        Source::Memory { name, .. } => format!("memory:{name}"),
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Ordered list of mounted sources; earlier entries win.
#[derive(Default)]
pub(crate) struct SearchPath {
    entries: Vec<MountedSource>,
}

impl SearchPath {
    pub(crate) fn iter(&self) -> impl Iterator<Item = &MountedSource> {
        self.entries.iter()
    }

    pub(crate) fn contains(&self, identity: &str) -> bool {
        self.entries.iter().any(|m| m.identity == identity)
    }

    pub(crate) fn insert(&mut self, mounted: MountedSource, append: bool) -> Result<()> {
        if self.contains(&mounted.identity) {
            return Err(Error::DuplicateMount(mounted.location()));
        }
        if append {
            self.entries.push(mounted);
        } else {
            self.entries.insert(0, mounted);
        }
        Ok(())
    }

    /// Find by location as given at mount time, falling back to identity.
    pub(crate) fn find(&self, location: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|m| m.location() == location)
            .or_else(|| {
                let identity = identity_of(&Source::path(location));
                self.entries.iter().position(|m| m.identity == identity)
            })
            .or_else(|| {
                let identity = format!("memory:{location}");
                self.entries.iter().position(|m| m.identity == identity)
            })
    }

    pub(crate) fn get(&self, location: &str) -> Result<&MountedSource> {
        self.find(location)
            .map(|idx| &self.entries[idx])
            .ok_or_else(|| Error::NotMounted(location.to_string()))
    }

    pub(crate) fn remove(&mut self, location: &str) -> Result<MountedSource> {
        let idx = self
            .find(location)
            .ok_or_else(|| Error::NotMounted(location.to_string()))?;
        Ok(self.entries.remove(idx))
    }

    pub(crate) fn drain(&mut self) -> Vec<MountedSource> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn locations(&self) -> Vec<String> {
        self.entries.iter().map(|m| m.location()).collect()
    }

    pub(crate) fn uses_archiver(&self, ext: &str) -> bool {
        self.entries
            .iter()
            .any(|m| m.archiver.info().extension.eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_archive::{DirArchiver, OpenContext, SystemAllocator};
    use tempfile::TempDir;

    fn mounted(dir: &TempDir) -> MountedSource {
        let source = Source::path(dir.path());
        let archiver: Arc<dyn Archiver> = Arc::new(DirArchiver::new());
        let archive = archiver
            .open(&source, &OpenContext::new(Arc::new(SystemAllocator)))
            .unwrap();
        MountedSource {
            identity: identity_of(&source),
            source,
            mount_point: String::new(),
            archiver,
            archive,
            token: SourceToken::new(),
        }
    }

    #[test]
    fn prepend_and_append_order() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let c = TempDir::new().unwrap();

        let mut path = SearchPath::default();
        path.insert(mounted(&a), true).unwrap();
        path.insert(mounted(&b), true).unwrap();
        path.insert(mounted(&c), false).unwrap();

        let expected: Vec<String> = [&c, &a, &b]
            .iter()
            .map(|d| d.path().to_string_lossy().to_string())
            .collect();
        assert_eq!(path.locations(), expected);
    }

    #[test]
    fn same_physical_location_is_a_duplicate() {
        let a = TempDir::new().unwrap();
        let mut path = SearchPath::default();
        path.insert(mounted(&a), true).unwrap();

        let mut again = mounted(&a);
        again.source = Source::path(a.path().join("."));
        again.identity = identity_of(&again.source);
        assert!(matches!(
            path.insert(again, false),
            Err(Error::DuplicateMount(_))
        ));
    }

    #[test]
    fn remove_unknown_is_not_mounted() {
        let mut path = SearchPath::default();
        assert!(matches!(path.remove("/nowhere"), Err(Error::NotMounted(_))));
    }

    #[test]
    fn token_invalidation() {
        let token = SourceToken::new();
        let clone = token.clone();
        assert!(clone.is_live());
        token.invalidate();
        assert!(!clone.is_live());
    }
}
