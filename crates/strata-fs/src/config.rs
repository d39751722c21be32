use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// The `[app]` section: conventional layout for a game or application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSection {
    /// Organisation name used for the per-user directory.
    pub organization: String,
    /// Application name used for the per-user directory.
    pub name: String,
    /// Extension of archives in the search path to mount automatically
    /// (without the dot, e.g. "pak").
    #[serde(default)]
    pub archive_ext: Option<String>,
    /// Also mount optical media.
    #[serde(default)]
    pub include_cdroms: bool,
    /// Put discovered archives ahead of directories.
    #[serde(default)]
    pub archives_first: bool,
}

/// One `[[mount]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Directory or archive on the native filesystem.
    pub source: PathBuf,
    /// Logical location of the source's root; `/` when omitted.
    #[serde(default)]
    pub mount_point: String,
    /// Append to the search path instead of prepending.
    #[serde(default = "default_append")]
    pub append: bool,
}

fn default_append() -> bool {
    true
}

/// Filesystem setup loaded from TOML.
///
/// ```toml
/// permit_symlinks = false
/// write_dir = "/home/me/.local/share/game"
///
/// [app]
/// organization = "acme"
/// name = "game"
/// archive_ext = "pak"
///
/// [[mount]]
/// source = "/opt/game/base.pak"
/// mount_point = "/data"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfsConfig {
    #[serde(default)]
    pub permit_symlinks: bool,
    /// Explicit write directory; overrides the one `[app]` selects.
    #[serde(default)]
    pub write_dir: Option<PathBuf>,
    #[serde(default)]
    pub app: Option<AppSection>,
    /// Mounted in order after the `[app]` layout.
    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountConfig>,
}

impl VfsConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
