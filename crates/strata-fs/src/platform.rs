//! Host-specific directory discovery.

use directories::BaseDirs;
use log::debug;
use std::env;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

use crate::{Error, Result};

/// Version of this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Version of the library actually linked.
pub fn linked_version() -> Version {
    Version {
        major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
    }
}

/// Native directory separator.
pub fn dir_separator() -> &'static str {
    MAIN_SEPARATOR_STR
}

/// Directory the application was started from.
///
/// Prefers the running executable's location; falls back to the parent of
/// `argv0`, then the current directory.
pub(crate) fn base_dir(argv0: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        return Ok(dir);
    }

    if let Some(dir) = argv0
        .map(Path::new)
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
    {
        return Ok(dir.to_path_buf());
    }

    Ok(env::current_dir()?)
}

/// Per-user writable directory for `org`/`app`, created if missing.
pub(crate) fn pref_dir(org: &str, app: &str) -> Result<PathBuf> {
    if org.is_empty() || app.is_empty() || [org, app].iter().any(|s| s.contains(['/', '\\'])) {
        return Err(Error::InvalidPath(format!("{org}/{app}")));
    }

    // Linux keeps per-app data directly under the XDG data dir.
    let base = user_data_dir()?;
    let dir = if cfg!(any(target_os = "windows", target_os = "macos")) {
        base.join(org).join(app)
    } else {
        base.join(app)
    };
    fs::create_dir_all(&dir)?;
    debug!("pref dir for {}/{}: {:?}", org, app, dir);
    Ok(dir)
}

fn user_data_dir() -> Result<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| Error::NotFound("user data directory".to_string()))
}

/// Mount points of optical media currently present.
///
/// Only Linux reports anything; elsewhere the list is empty.
pub fn cdrom_dirs() -> Vec<PathBuf> {
    if cfg!(target_os = "linux") {
        fs::read_to_string("/proc/mounts")
            .map(|table| parse_optical_mounts(&table))
            .unwrap_or_default()
    } else {
        Vec::new()
    }
}

/// Callback form of [`cdrom_dirs`].
pub fn cdrom_dirs_with(mut callback: impl FnMut(&Path)) {
    for dir in cdrom_dirs() {
        callback(&dir);
    }
}

fn parse_optical_mounts(table: &str) -> Vec<PathBuf> {
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            matches!(fs_type, "iso9660" | "udf").then(|| PathBuf::from(unescape_mount(mount_point)))
        })
        .collect()
}

// /proc/mounts escapes whitespace and backslashes as three-digit octal.
fn unescape_mount(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or("");
            if let Ok(v) = u8::from_str_radix(digits, 8) {
                out.push(v);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).to_string()
}
