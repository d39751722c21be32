//! Logical path handling.
//!
//! Every path entering the filesystem is normalised here before it reaches
//! the resolver or an archive.

use crate::{Error, Result};

/// Normalise a logical path.
///
/// - Accepts both `/` and `\` as separators
/// - Collapses redundant separators and drops `.` segments
/// - Strips leading and trailing slashes
/// - Rejects `..` segments and segments containing `:` or NUL
///
/// The empty string (and `/`) normalise to the empty path, the virtual root.
pub fn normalize(path: &str) -> Result<String> {
    let replaced = path.replace('\\', "/");
    let mut segments = Vec::new();

    for segment in replaced.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(Error::InvalidPath(format!(
                "{path}: parent references are not allowed"
            )));
        }
        if segment.contains(':') || segment.contains('\0') {
            return Err(Error::InvalidPath(format!(
                "{path}: illegal character in segment {segment:?}"
            )));
        }
        segments.push(segment);
    }

    Ok(segments.join("/"))
}

/// Normalise a path that must name something other than the root.
pub fn normalize_non_root(path: &str) -> Result<String> {
    let normalized = normalize(path)?;
    if normalized.is_empty() {
        return Err(Error::InvalidPath(format!("{path}: refers to the root")));
    }
    Ok(normalized)
}

/// Where a normalised path falls relative to a normalised mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MountMatch<'a> {
    /// The path is inside the mount; carries the archive-relative path.
    Inside(&'a str),
    /// The path is a strict ancestor of the mount point; carries the next
    /// segment of the mount point below the path.
    Ancestor(&'a str),
    Outside,
}

pub(crate) fn match_mount<'a>(path: &'a str, mount_point: &'a str) -> MountMatch<'a> {
    if mount_point.is_empty() {
        return MountMatch::Inside(path);
    }
    if path == mount_point {
        return MountMatch::Inside("");
    }
    if let Some(rest) = path.strip_prefix(mount_point) {
        if let Some(rel) = rest.strip_prefix('/') {
            return MountMatch::Inside(rel);
        }
        return MountMatch::Outside;
    }

    let below = if path.is_empty() {
        Some(mount_point)
    } else {
        mount_point
            .strip_prefix(path)
            .and_then(|rest| rest.strip_prefix('/'))
    };
    match below {
        Some(rest) => MountMatch::Ancestor(rest.split('/').next().unwrap_or(rest)),
        None => MountMatch::Outside,
    }
}

/// Each proper prefix of a normalised path, shortest first, then the path.
pub(crate) fn prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(move |(i, _)| &path[..i])
        .chain(std::iter::once(path).filter(|p| !p.is_empty()))
}

/// Join a directory and a child name into a logical path.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_path() {
        assert_eq!(normalize("maps/e1m1.bsp").unwrap(), "maps/e1m1.bsp");
    }

    #[test]
    fn leading_and_trailing_slashes() {
        assert_eq!(normalize("/maps/").unwrap(), "maps");
    }

    #[test]
    fn redundant_slashes_and_dots() {
        assert_eq!(normalize("maps//./e1m1.bsp").unwrap(), "maps/e1m1.bsp");
    }

    #[test]
    fn backslashes() {
        assert_eq!(normalize("maps\\e1m1.bsp").unwrap(), "maps/e1m1.bsp");
    }

    #[test]
    fn root_forms() {
        assert_eq!(normalize("").unwrap(), "");
        assert_eq!(normalize("/").unwrap(), "");
        assert_eq!(normalize("./.").unwrap(), "");
        assert!(normalize_non_root("/").is_err());
    }

    #[test]
    fn reject_parent_references() {
        assert!(matches!(normalize("maps/../../etc"), Err(Error::InvalidPath(_))));
        assert!(normalize("..").is_err());
    }

    #[test]
    fn reject_drive_letters() {
        assert!(normalize("C:/windows").is_err());
    }

    #[test]
    fn mount_matching() {
        assert_eq!(match_mount("a/b", ""), MountMatch::Inside("a/b"));
        assert_eq!(match_mount("data", "data"), MountMatch::Inside(""));
        assert_eq!(match_mount("data/x.txt", "data"), MountMatch::Inside("x.txt"));
        assert_eq!(match_mount("database", "data"), MountMatch::Outside);
        assert_eq!(match_mount("", "mods/extra"), MountMatch::Ancestor("mods"));
        assert_eq!(match_mount("mods", "mods/extra"), MountMatch::Ancestor("extra"));
        assert_eq!(match_mount("mo", "mods/extra"), MountMatch::Outside);
        assert_eq!(match_mount("other", "mods"), MountMatch::Outside);
    }

    #[test]
    fn prefixes_shortest_first() {
        let all: Vec<_> = prefixes("a/b/c").collect();
        assert_eq!(all, vec!["a", "a/b", "a/b/c"]);
        assert_eq!(prefixes("").count(), 0);
    }
}
