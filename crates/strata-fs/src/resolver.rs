//! Logical path resolution against the search path.
//!
//! Resolution walks the mounted sources in priority order and stops at the
//! first one that has the path. Paths that are strict ancestors of a mount
//! point exist as virtual, read-only directories even when no source has
//! them.

use log::{debug, trace};
use std::collections::BTreeSet;
use std::sync::Arc;
use strata_archive::{Archive, ArchiveError, MetaData};

use crate::path::{join, match_mount, prefixes, MountMatch};
use crate::search_path::{MountedSource, SearchPath};
use crate::{Error, Result};

/// A path found inside a mounted source.
pub(crate) struct Hit<'a> {
    pub(crate) mounted: &'a MountedSource,
    /// Path relative to the source's root.
    pub(crate) rel: String,
    pub(crate) meta: MetaData,
}

pub(crate) enum Resolution<'a> {
    Entry(Hit<'a>),
    /// A directory implied by a mount point; carries the source whose mount
    /// point implies it, or none for the empty root.
    Virtual(Option<&'a MountedSource>),
}

/// Whether any component of `rel` is a symbolic link in `archive`.
pub(crate) fn crosses_symlink(archive: &Arc<dyn Archive>, rel: &str) -> bool {
    for prefix in prefixes(rel) {
        match archive.stat(prefix, false) {
            Ok(meta) if meta.is_symlink() => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

fn is_miss(err: &ArchiveError) -> bool {
    err.is_not_found()
}

/// Find the source that provides `path` (already normalised).
pub(crate) fn locate<'a>(
    search_path: &'a SearchPath,
    path: &str,
    permit_symlinks: bool,
) -> Result<Resolution<'a>> {
    for mounted in search_path.iter() {
        match match_mount(path, &mounted.mount_point) {
            MountMatch::Inside(rel) => {
                if !permit_symlinks && mounted.supports_symlinks() && crosses_symlink(&mounted.archive, rel) {
                    debug!("{:?} crosses a symlink in {}; skipped", path, mounted.location());
                    continue;
                }
                match mounted.archive.stat(rel, permit_symlinks) {
                    Ok(meta) => {
                        trace!("{:?} resolved in {}", path, mounted.location());
                        return Ok(Resolution::Entry(Hit {
                            mounted,
                            rel: rel.to_string(),
                            meta,
                        }));
                    }
                    Err(err) if is_miss(&err) => continue,
                    Err(err) => return Err(Error::from_archive(err, path)),
                }
            }
            MountMatch::Ancestor(_) => return Ok(Resolution::Virtual(Some(mounted))),
            MountMatch::Outside => {}
        }
    }

    if path.is_empty() {
        return Ok(Resolution::Virtual(None));
    }
    Err(Error::NotFound(path.to_string()))
}

/// Merged, sorted listing of `dir` (already normalised) across every source.
pub(crate) fn enumerate(
    search_path: &SearchPath,
    dir: &str,
    permit_symlinks: bool,
) -> Result<Vec<String>> {
    let mut names = BTreeSet::new();
    let mut found = dir.is_empty();

    for mounted in search_path.iter() {
        match match_mount(dir, &mounted.mount_point) {
            MountMatch::Inside(rel) => {
                let hide_links = !permit_symlinks && mounted.supports_symlinks();
                if hide_links && crosses_symlink(&mounted.archive, rel) {
                    continue;
                }
                let listing = match mounted.archive.enumerate(rel) {
                    Ok(listing) => listing,
                    Err(err) if is_miss(&err) => continue,
                    Err(err) => return Err(Error::from_archive(err, dir)),
                };
                found = true;
                for name in listing {
                    if hide_links {
                        let is_link = mounted
                            .archive
                            .stat(&join(rel, &name), false)
                            .map(|meta| meta.is_symlink())
                            .unwrap_or(false);
                        if is_link {
                            continue;
                        }
                    }
                    names.insert(name);
                }
            }
            MountMatch::Ancestor(next) => {
                found = true;
                names.insert(next.to_string());
            }
            MountMatch::Outside => {}
        }
    }

    if !found {
        return Err(Error::NotFound(dir.to_string()));
    }
    trace!("enumerate({:?}) -> {} names", dir, names.len());
    Ok(names.into_iter().collect())
}
