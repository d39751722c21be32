//! The filesystem context.
//!
//! A [`Vfs`] owns one search path, one write directory, one archiver
//! registry and one symlink policy behind a single lock. Clones share the
//! same state; independent instances do not.

use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use strata_archive::{
    Allocator, Archive, ArchiveError, ArchiveInfo, Archiver, MetaData, OpenContext, OpenMode,
    Source, SystemAllocator,
};

use crate::config::VfsConfig;
use crate::error::record;
use crate::handle::{FileHandle, HandleTable};
use crate::path::{normalize, normalize_non_root};
use crate::platform;
use crate::registry::Registry;
use crate::resolver::{self, Resolution};
use crate::search_path::{identity_of, MountedSource, SearchPath, SourceToken};
use crate::{Error, Result};

/// What an [`enumerate_with`](Vfs::enumerate_with) callback wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerateControl {
    Continue,
    Stop,
    /// Abort; the enumeration fails with [`Error::Callback`].
    Error,
}

struct WriteDir {
    path: PathBuf,
    archive: Arc<dyn Archive>,
    token: SourceToken,
}

struct State {
    initialised: bool,
    base_dir: Option<PathBuf>,
    registry: Registry,
    search_path: SearchPath,
    write_dir: Option<WriteDir>,
    permit_symlinks: bool,
    allocator: Arc<dyn Allocator>,
}

struct Shared {
    state: RwLock<State>,
    handles: Arc<Mutex<HandleTable>>,
}

/// A virtual filesystem instance.
#[derive(Clone)]
pub struct Vfs {
    shared: Arc<Shared>,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    /// Create an uninitialised filesystem. Call [`init`](Self::init) before
    /// mounting anything.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(State {
                    initialised: false,
                    base_dir: None,
                    registry: Registry::new(),
                    search_path: SearchPath::default(),
                    write_dir: None,
                    permit_symlinks: false,
                    allocator: Arc::new(SystemAllocator),
                }),
                handles: Arc::new(Mutex::new(HandleTable::default())),
            }),
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, State>> {
        let state = self.shared.state.read();
        if !state.initialised {
            return Err(Error::NotInitialised);
        }
        Ok(state)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>> {
        let state = self.shared.state.write();
        if !state.initialised {
            return Err(Error::NotInitialised);
        }
        Ok(state)
    }

    // ---- lifecycle -------------------------------------------------------

    /// Initialise the filesystem and register the built-in archivers.
    ///
    /// `argv0` is used to find the base directory when the running
    /// executable cannot be located.
    pub fn init(&self, argv0: Option<&str>) -> Result<()> {
        record(self.init_inner(argv0))
    }

    fn init_inner(&self, argv0: Option<&str>) -> Result<()> {
        let mut state = self.shared.state.write();
        if state.initialised {
            return Err(Error::AlreadyInitialised);
        }
        if !state.allocator.init() {
            return Err(Error::Archive(ArchiveError::Unsupported(
                "allocator failed to initialise".to_string(),
            )));
        }

        state.base_dir = Some(platform::base_dir(argv0)?);
        state.registry = Registry::with_builtins();
        state.initialised = true;
        info!("filesystem initialised (base dir {:?})", state.base_dir);
        Ok(())
    }

    /// Shut down: close every tracked handle, unmount everything, clear the
    /// write directory and reset the registry and symlink policy.
    pub fn deinit(&self) -> Result<()> {
        record(self.deinit_inner())
    }

    fn deinit_inner(&self) -> Result<()> {
        let mut state = self.write_state()?;

        let closed = self.shared.handles.lock().close_all();
        if closed > 0 {
            warn!("deinit closed {} open handle(s)", closed);
        }

        for mounted in state.search_path.drain() {
            release_source(&mounted);
        }
        if let Some(write_dir) = state.write_dir.take() {
            write_dir.token.invalidate();
        }

        state.registry = Registry::new();
        state.permit_symlinks = false;
        state.base_dir = None;
        state.allocator.deinit();
        state.initialised = false;
        info!("filesystem deinitialised");
        Ok(())
    }

    pub fn is_initialised(&self) -> bool {
        self.shared.state.read().initialised
    }

    /// Install the buffer provider handed to archivers. Only allowed before
    /// [`init`](Self::init).
    pub fn set_allocator(&self, allocator: Arc<dyn Allocator>) -> Result<()> {
        let mut state = self.shared.state.write();
        if state.initialised {
            return record(Err(Error::AlreadyInitialised));
        }
        state.allocator = allocator;
        Ok(())
    }

    // ---- archivers -------------------------------------------------------

    pub fn register_archiver(&self, archiver: Arc<dyn Archiver>) -> Result<()> {
        record(self.write_state().and_then(|mut s| s.registry.register(archiver)))
    }

    /// Remove an archiver. Fails while a mounted source still uses it.
    pub fn deregister_archiver(&self, extension: &str) -> Result<()> {
        record(self.write_state().and_then(|mut state| {
            state.registry.lookup(extension)?;
            if state.search_path.uses_archiver(extension) {
                return Err(Error::ArchiverInUse(extension.to_string()));
            }
            state.registry.deregister(extension).map(|_| ())
        }))
    }

    pub fn archiver(&self, extension: &str) -> Result<Arc<dyn Archiver>> {
        record(self.read_state().and_then(|s| s.registry.lookup(extension)))
    }

    /// Registered archive formats in registration order.
    pub fn supported_archive_types(&self) -> Result<Vec<ArchiveInfo>> {
        record(self.read_state().map(|s| s.registry.supported()))
    }

    // ---- search path -----------------------------------------------------

    /// Add a directory or archive to the search path.
    ///
    /// `mount_point` is where its root appears (`""` or `"/"` for the
    /// virtual root). With `append` false the source takes priority over
    /// everything already mounted.
    pub fn mount(&self, source: impl AsRef<Path>, mount_point: &str, append: bool) -> Result<()> {
        record(self.mount_path(source.as_ref(), mount_point, append))
    }

    fn mount_path(&self, source: &Path, mount_point: &str, append: bool) -> Result<()> {
        if !self.is_initialised() {
            return Err(Error::NotInitialised);
        }
        if !source.exists() {
            return Err(Error::NotFound(source.display().to_string()));
        }
        self.mount_source(Source::path(source), mount_point, append)
    }

    /// Mount an archive image held in memory under `name`.
    pub fn mount_memory(
        &self,
        name: &str,
        data: impl Into<Arc<[u8]>>,
        mount_point: &str,
        append: bool,
    ) -> Result<()> {
        record(self.mount_source(Source::memory(name, data), mount_point, append))
    }

    /// Read the rest of `handle` into memory and mount it as an archive.
    pub fn mount_handle(
        &self,
        handle: &mut FileHandle,
        name: &str,
        mount_point: &str,
        append: bool,
    ) -> Result<()> {
        record(drain(handle).and_then(|data| {
            self.mount_source(Source::memory(name, data), mount_point, append)
        }))
    }

    fn mount_source(&self, source: Source, mount_point: &str, append: bool) -> Result<()> {
        let mut state = self.write_state()?;
        let mount_point = normalize(mount_point)?;

        let identity = identity_of(&source);
        if state.search_path.contains(&identity) {
            return Err(Error::DuplicateMount(source.location()));
        }

        let archiver = state.registry.detect(&source)?;
        let ctx = OpenContext::new(state.allocator.clone());
        let archive = archiver
            .open(&source, &ctx)
            .map_err(|e| Error::from_archive(e, &source.location()))?;

        debug!(
            "mounted {} at /{} ({}, {})",
            source.location(),
            mount_point,
            kind_of(archiver.as_ref()),
            if append { "appended" } else { "prepended" }
        );
        state.search_path.insert(
            MountedSource {
                source,
                identity,
                mount_point,
                archiver,
                archive,
                token: SourceToken::new(),
            },
            append,
        )
    }

    /// Remove a source from the search path.
    ///
    /// Handles opened through it stay with their owners and fail with
    /// [`Error::StaleHandle`] from then on.
    pub fn unmount(&self, source: impl AsRef<Path>) -> Result<()> {
        let location = source.as_ref().to_string_lossy().to_string();
        record(self.write_state().and_then(|mut state| {
            let mounted = state.search_path.remove(&location)?;
            release_source(&mounted);
            debug!("unmounted {}", mounted.location());
            Ok(())
        }))
    }

    /// Mounted locations in priority order.
    pub fn search_path(&self) -> Result<Vec<String>> {
        record(self.read_state().map(|s| s.search_path.locations()))
    }

    /// Callback form of [`search_path`](Self::search_path).
    pub fn search_path_with(&self, mut callback: impl FnMut(&str)) -> Result<()> {
        for location in self.search_path()? {
            callback(&location);
        }
        Ok(())
    }

    /// Where a mounted source appears: `"/"` or `"/a/b"`.
    pub fn mount_point(&self, source: impl AsRef<Path>) -> Result<String> {
        let location = source.as_ref().to_string_lossy().to_string();
        record(self.read_state().and_then(|state| {
            let mounted = state.search_path.get(&location)?;
            Ok(format!("/{}", mounted.mount_point))
        }))
    }

    /// Location of the source that provides `path`.
    pub fn real_dir(&self, path: &str) -> Result<String> {
        record(self.real_dir_inner(path))
    }

    fn real_dir_inner(&self, path: &str) -> Result<String> {
        let path = normalize(path)?;
        let state = self.read_state()?;
        match resolver::locate(&state.search_path, &path, state.permit_symlinks)? {
            Resolution::Entry(hit) => Ok(hit.mounted.location()),
            Resolution::Virtual(Some(mounted)) => Ok(mounted.location()),
            Resolution::Virtual(None) => Err(Error::NotFound(path)),
        }
    }

    // ---- write directory -------------------------------------------------

    /// Set or clear the directory that receives every mutation.
    ///
    /// The new directory must exist and be writable. Handles opened for
    /// writing under the previous one become stale.
    pub fn set_write_dir(&self, dir: Option<&Path>) -> Result<()> {
        record(self.set_write_dir_inner(dir))
    }

    fn set_write_dir_inner(&self, dir: Option<&Path>) -> Result<()> {
        let mut state = self.write_state()?;

        let replacement = match dir {
            Some(path) => {
                let source = Source::path(path);
                if !source.is_dir() {
                    return Err(Error::InvalidPath(path.display().to_string()));
                }
                let ctx = OpenContext::new(state.allocator.clone()).writing();
                let archive = state
                    .registry
                    .dir_archiver()
                    .open(&source, &ctx)
                    .map_err(|e| {
                        debug!("write dir {} rejected: {}", path.display(), e);
                        Error::InvalidPath(path.display().to_string())
                    })?;
                Some(WriteDir {
                    path: path.to_path_buf(),
                    archive,
                    token: SourceToken::new(),
                })
            }
            None => None,
        };

        if let Some(old) = state.write_dir.take() {
            old.token.invalidate();
            if let Err(err) = old.archive.close() {
                warn!("closing write dir {}: {}", old.path.display(), err);
            }
        }
        debug!("write dir set to {:?}", replacement.as_ref().map(|w| &w.path));
        state.write_dir = replacement;
        Ok(())
    }

    pub fn write_dir(&self) -> Result<Option<PathBuf>> {
        record(
            self.read_state()
                .map(|s| s.write_dir.as_ref().map(|w| w.path.clone())),
        )
    }

    // ---- files -----------------------------------------------------------

    /// Open a file. Reads resolve through the search path; writes and
    /// appends go to the write directory.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        record(self.open_inner(path, mode))
    }

    fn open_inner(&self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        let path = normalize_non_root(path)?;
        let open_error = |cause| Error::OpenError {
            path: path.clone(),
            cause,
        };

        let (native, token) = if mode.is_write() {
            let (archive, token) = self.write_target(&path)?;
            (archive.open_file(&path, mode).map_err(open_error)?, token)
        } else {
            let (archive, rel, token) = {
                let state = self.read_state()?;
                match resolver::locate(&state.search_path, &path, state.permit_symlinks)? {
                    Resolution::Entry(hit) if !hit.meta.is_dir() => (
                        hit.mounted.archive.clone(),
                        hit.rel,
                        hit.mounted.token.clone(),
                    ),
                    _ => return Err(open_error(ArchiveError::IsADirectory(path.clone()))),
                }
            };
            (archive.open_file(&rel, mode).map_err(open_error)?, token)
        };

        Ok(FileHandle::new(
            native,
            mode,
            path,
            token,
            &self.shared.handles,
        ))
    }

    /// The write directory's archive, checked against the symlink policy
    /// for `path`.
    fn write_target(&self, path: &str) -> Result<(Arc<dyn Archive>, SourceToken)> {
        let state = self.read_state()?;
        let write_dir = state.write_dir.as_ref().ok_or(Error::NoWriteDirectory)?;
        if !state.permit_symlinks && resolver::crosses_symlink(&write_dir.archive, path) {
            return Err(Error::PermissionDenied(format!(
                "{path}: crosses a symbolic link"
            )));
        }
        Ok((write_dir.archive.clone(), write_dir.token.clone()))
    }

    /// Close a handle. Closing nothing succeeds.
    pub fn close(&self, handle: Option<FileHandle>) -> Result<()> {
        match handle {
            Some(handle) => record(handle.close()),
            None => Ok(()),
        }
    }

    /// Read into `buf`; returns the number of bytes read (0 at end of file).
    pub fn read_bytes(&self, handle: Option<&mut FileHandle>, buf: &mut [u8]) -> Result<usize> {
        record(
            handle
                .ok_or(Error::InvalidHandle)
                .and_then(|h| h.read_bytes(buf)),
        )
    }

    /// Write `buf`; writing through no handle writes nothing.
    pub fn write_bytes(&self, handle: Option<&mut FileHandle>, buf: &[u8]) -> Result<usize> {
        match handle {
            Some(handle) => record(handle.write_bytes(buf)),
            None => Ok(0),
        }
    }

    pub fn seek(&self, handle: &mut FileHandle, position: u64) -> Result<()> {
        record(handle.seek(position))
    }

    pub fn tell(&self, handle: &FileHandle) -> Result<u64> {
        record(handle.tell())
    }

    pub fn length(&self, handle: &mut FileHandle) -> Result<u64> {
        record(handle.length())
    }

    pub fn eof(&self, handle: &mut FileHandle) -> Result<bool> {
        record(handle.eof())
    }

    pub fn flush(&self, handle: &mut FileHandle) -> Result<()> {
        record(handle.flush())
    }

    // ---- queries ---------------------------------------------------------

    pub fn exists(&self, path: &str) -> bool {
        self.metadata(path).is_ok()
    }

    /// Stat a path. Symbolic links are dereferenced when permitted.
    pub fn metadata(&self, path: &str) -> Result<MetaData> {
        record(self.metadata_inner(path))
    }

    fn metadata_inner(&self, path: &str) -> Result<MetaData> {
        let path = normalize(path)?;
        let state = self.read_state()?;
        match resolver::locate(&state.search_path, &path, state.permit_symlinks)? {
            Resolution::Entry(hit) => Ok(hit.meta),
            Resolution::Virtual(_) => Ok(MetaData::directory(true)),
        }
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Whether `path` is itself a symbolic link. Always false while links
    /// are not permitted, since such paths do not resolve.
    pub fn is_symbolic_link(&self, path: &str) -> bool {
        record(self.is_symbolic_link_inner(path)).unwrap_or(false)
    }

    fn is_symbolic_link_inner(&self, path: &str) -> Result<bool> {
        let path = normalize(path)?;
        let state = self.read_state()?;
        match resolver::locate(&state.search_path, &path, state.permit_symlinks)? {
            Resolution::Entry(hit) => Ok(hit
                .mounted
                .archive
                .stat(&hit.rel, false)
                .map(|meta| meta.is_symlink())
                .unwrap_or(false)),
            Resolution::Virtual(_) => Ok(false),
        }
    }

    pub fn last_mod_time(&self, path: &str) -> Result<Option<SystemTime>> {
        self.metadata(path).map(|m| m.modified)
    }

    /// Sorted names of the children of `dir`, merged across every source.
    pub fn enumerate(&self, dir: &str) -> Result<Vec<String>> {
        record(self.enumerate_inner(dir))
    }

    fn enumerate_inner(&self, dir: &str) -> Result<Vec<String>> {
        let dir = normalize(dir)?;
        let state = self.read_state()?;
        resolver::enumerate(&state.search_path, &dir, state.permit_symlinks)
    }

    /// Callback form of [`enumerate`](Self::enumerate); the callback gets
    /// the directory as given and each child name.
    ///
    /// The listing is taken before the first callback, so the callback may
    /// call back into this filesystem.
    pub fn enumerate_with(
        &self,
        dir: &str,
        mut callback: impl FnMut(&str, &str) -> EnumerateControl,
    ) -> Result<()> {
        let names = self.enumerate(dir)?;
        for name in &names {
            match callback(dir, name) {
                EnumerateControl::Continue => {}
                EnumerateControl::Stop => break,
                EnumerateControl::Error => return record(Err(Error::Callback(dir.to_string()))),
            }
        }
        Ok(())
    }

    // ---- mutation --------------------------------------------------------

    /// Create a directory and any missing parents in the write directory.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        record(self.mutate(path, |archive, path| archive.mkdir(path)))
    }

    /// Delete a file or empty directory from the write directory.
    pub fn delete(&self, path: &str) -> Result<()> {
        record(self.mutate(path, |archive, path| archive.remove(path)))
    }

    fn mutate(
        &self,
        path: &str,
        op: impl FnOnce(&dyn Archive, &str) -> strata_archive::ArchiveResult<()>,
    ) -> Result<()> {
        let path = normalize_non_root(path)?;
        let (archive, _token) = self.write_target(&path)?;
        trace!("mutating {:?} in write dir", path);
        op(archive.as_ref(), &path).map_err(|e| Error::from_archive(e, &path))
    }

    // ---- policy ----------------------------------------------------------

    /// Allow or forbid following symbolic links. Takes effect for the next
    /// resolution; open handles are unaffected.
    pub fn permit_symbolic_links(&self, allow: bool) {
        self.shared.state.write().permit_symlinks = allow;
        debug!("symbolic links {}", if allow { "permitted" } else { "forbidden" });
    }

    pub fn symbolic_links_permitted(&self) -> bool {
        self.shared.state.read().permit_symlinks
    }

    // ---- platform --------------------------------------------------------

    /// Directory the application was started from.
    pub fn base_dir(&self) -> Result<PathBuf> {
        record(self.read_state().and_then(|state| {
            state
                .base_dir
                .clone()
                .ok_or_else(|| Error::NotFound("base directory".to_string()))
        }))
    }

    /// Per-user writable directory for the application, created if missing.
    pub fn pref_dir(&self, organization: &str, app: &str) -> Result<PathBuf> {
        record(self.read_state().and_then(|_| platform::pref_dir(organization, app)))
    }

    /// Conventional layout for an application:
    ///
    /// 1. the pref dir becomes the write directory and is mounted first
    /// 2. the base dir is appended
    /// 3. optical media are appended when `include_cdroms` is set
    /// 4. every root-level file ending in `.archive_ext` is mounted, ahead of
    ///    everything when `archives_first` is set and appended otherwise
    ///
    /// Failures in steps 2 to 4 are logged and skipped.
    pub fn set_sane_config(
        &self,
        organization: &str,
        app: &str,
        archive_ext: Option<&str>,
        include_cdroms: bool,
        archives_first: bool,
    ) -> Result<()> {
        record(self.sane_config_inner(organization, app, archive_ext, include_cdroms, archives_first))
    }

    fn sane_config_inner(
        &self,
        organization: &str,
        app: &str,
        archive_ext: Option<&str>,
        include_cdroms: bool,
        archives_first: bool,
    ) -> Result<()> {
        let pref = self.pref_dir(organization, app)?;
        self.set_write_dir(Some(pref.as_path()))?;
        self.mount(&pref, "", false)?;

        let base = self.base_dir()?;
        if let Err(err) = self.mount(&base, "", true) {
            warn!("base dir {} not mounted: {}", base.display(), err);
        }

        if include_cdroms {
            for dir in platform::cdrom_dirs() {
                if let Err(err) = self.mount(&dir, "", true) {
                    warn!("cdrom {} not mounted: {}", dir.display(), err);
                }
            }
        }

        let Some(ext) = archive_ext else {
            return Ok(());
        };
        let suffix = format!(".{}", ext.trim_start_matches('.')).to_lowercase();
        for name in self.enumerate("")? {
            if name.len() <= suffix.len() || !name.to_lowercase().ends_with(&suffix) {
                continue;
            }
            let Ok(dir) = self.real_dir(&name) else {
                continue;
            };
            let archive = Path::new(&dir).join(&name);
            match self.mount(&archive, "", !archives_first) {
                Ok(()) => debug!("sane config mounted {}", archive.display()),
                Err(err) => warn!("archive {} not mounted: {}", archive.display(), err),
            }
        }
        Ok(())
    }

    /// Apply a loaded configuration to an initialised filesystem.
    pub fn apply_config(&self, config: &VfsConfig) -> Result<()> {
        self.permit_symbolic_links(config.permit_symlinks);

        if let Some(app) = &config.app {
            self.set_sane_config(
                &app.organization,
                &app.name,
                app.archive_ext.as_deref(),
                app.include_cdroms,
                app.archives_first,
            )?;
        }
        for mount in &config.mounts {
            self.mount(&mount.source, &mount.mount_point, mount.append)?;
        }
        if let Some(dir) = &config.write_dir {
            self.set_write_dir(Some(dir.as_path()))?;
        }
        Ok(())
    }
}

fn release_source(mounted: &MountedSource) {
    mounted.token.invalidate();
    if let Err(err) = mounted.archive.close() {
        warn!("closing {}: {}", mounted.location(), err);
    }
}

fn kind_of(archiver: &dyn Archiver) -> &str {
    let ext = archiver.info().extension.as_str();
    if ext.is_empty() {
        "directory"
    } else {
        ext
    }
}

/// Read everything left in `handle`.
fn drain(handle: &mut FileHandle) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = handle.read_bytes(&mut chunk)?;
        if n == 0 {
            return Ok(data);
        }
        data.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vfs() -> Vfs {
        let vfs = Vfs::new();
        vfs.init(None).unwrap();
        vfs
    }

    #[test]
    fn init_twice_fails() {
        let vfs = vfs();
        assert!(matches!(vfs.init(None), Err(Error::AlreadyInitialised)));
        vfs.deinit().unwrap();
        assert!(!vfs.is_initialised());
        assert!(matches!(vfs.deinit(), Err(Error::NotInitialised)));
    }

    #[test]
    fn allocator_locked_after_init() {
        let vfs = vfs();
        assert!(matches!(
            vfs.set_allocator(Arc::new(SystemAllocator)),
            Err(Error::AlreadyInitialised)
        ));
    }

    #[test]
    fn mount_point_reporting() {
        let vfs = vfs();
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        vfs.mount(a.path(), "", true).unwrap();
        vfs.mount(b.path(), "/mods//extra/", true).unwrap();

        assert_eq!(vfs.mount_point(a.path()).unwrap(), "/");
        assert_eq!(vfs.mount_point(b.path()).unwrap(), "/mods/extra");
        assert!(matches!(
            vfs.mount_point("/not/mounted"),
            Err(Error::NotMounted(_))
        ));
    }

    #[test]
    fn real_dir_names_providing_source() {
        let vfs = vfs();
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(b.path().join("only_b.txt"), b"b").unwrap();
        vfs.mount(a.path(), "", true).unwrap();
        vfs.mount(b.path(), "", true).unwrap();

        assert_eq!(
            vfs.real_dir("only_b.txt").unwrap(),
            b.path().to_string_lossy()
        );
        assert!(matches!(vfs.real_dir("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn write_dir_must_exist() {
        let vfs = vfs();
        let a = TempDir::new().unwrap();
        let missing = a.path().join("missing");
        assert!(matches!(
            vfs.set_write_dir(Some(missing.as_path())),
            Err(Error::InvalidPath(_))
        ));
        assert_eq!(vfs.write_dir().unwrap(), None);

        vfs.set_write_dir(Some(a.path())).unwrap();
        assert_eq!(vfs.write_dir().unwrap(), Some(a.path().to_path_buf()));
        vfs.set_write_dir(None).unwrap();
        assert_eq!(vfs.write_dir().unwrap(), None);
    }

    #[test]
    fn open_directory_for_reading_fails() {
        let vfs = vfs();
        let a = TempDir::new().unwrap();
        fs::create_dir(a.path().join("sub")).unwrap();
        vfs.mount(a.path(), "", true).unwrap();
        assert!(matches!(
            vfs.open("sub", OpenMode::Read),
            Err(Error::OpenError { .. })
        ));
        assert!(matches!(
            vfs.open("", OpenMode::Read),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn enumerate_with_stops_and_aborts() {
        let vfs = vfs();
        let a = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            fs::write(a.path().join(name), b"").unwrap();
        }
        vfs.mount(a.path(), "", true).unwrap();

        let mut seen = Vec::new();
        vfs.enumerate_with("/", |dir, name| {
            assert_eq!(dir, "/");
            seen.push(name.to_string());
            if name == "b" {
                EnumerateControl::Stop
            } else {
                EnumerateControl::Continue
            }
        })
        .unwrap();
        assert_eq!(seen, vec!["a", "b"]);

        assert!(matches!(
            vfs.enumerate_with("", |_, _| EnumerateControl::Error),
            Err(Error::Callback(_))
        ));
    }

    #[test]
    fn search_path_callback() {
        let vfs = vfs();
        let a = TempDir::new().unwrap();
        vfs.mount(a.path(), "", true).unwrap();
        let mut seen = Vec::new();
        vfs.search_path_with(|loc| seen.push(loc.to_string())).unwrap();
        assert_eq!(seen, vec![a.path().to_string_lossy().to_string()]);
    }

    #[test]
    fn clones_share_state() {
        let vfs = vfs();
        let other = vfs.clone();
        let a = TempDir::new().unwrap();
        other.mount(a.path(), "", true).unwrap();
        assert_eq!(vfs.search_path().unwrap().len(), 1);

        let independent = Vfs::new();
        independent.init(None).unwrap();
        assert!(independent.search_path().unwrap().is_empty());
    }
}
