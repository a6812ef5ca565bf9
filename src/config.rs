// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that Dotstash uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.

use crate::path::{default_backup_dir, default_store_dir, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Default maximum number of retained snapshots per managed entry.
pub const DEFAULT_RETENTION_LIMIT: usize = 7;

/// Engine settings layout.
///
/// One explicit configuration struct holding every anchor point the engine
/// needs: the store root, the backup root, and the snapshot retention limit.
/// Constructed once per run and passed into every component, so no component
/// ever reaches for hidden global state.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Absolute path to the managed store root.
    pub store_root: PathBuf,

    /// Absolute path to the backup root, sibling of the store.
    pub backup_root: PathBuf,

    /// Maximum number of snapshots retained per managed entry.
    #[serde(default = "default_retention_limit")]
    pub retention_limit: usize,
}

impl Settings {
    /// Construct settings from XDG default locations.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if home directory path cannot be determined.
    pub fn try_default() -> Result<Self, NoWayHome> {
        Ok(Self {
            store_root: default_store_dir()?,
            backup_root: default_backup_dir()?,
            retention_limit: DEFAULT_RETENTION_LIMIT,
        })
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on both root paths.
        settings.store_root = expand_path(settings.store_root)?;
        settings.backup_root = expand_path(settings.backup_root)?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn default_retention_limit() -> usize {
    DEFAULT_RETENTION_LIMIT
}

fn expand_path(path: PathBuf) -> Result<PathBuf, ConfigError> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Suggestion catalog layout.
///
/// The static, OS-family-keyed list of well-known configuration paths that
/// discovery intersects with the actual file system. The catalog is plain
/// data supplied by configuration; the engine never derives it.
///
/// # General Layout
///
/// A catalog is a flat listing of `[[suggestion]]` tables. Each suggestion
/// names one application, an optional hint about what kind of path it keeps
/// its configuration in, and one path list per supported OS family:
///
/// ```toml
/// [[suggestion]]
/// name = "vim"
/// kind = "file"
/// linux = ["~/.vimrc"]
/// macos = ["~/.vimrc"]
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SuggestionCatalog {
    /// Well-known path listing per application.
    #[serde(rename = "suggestion", default)]
    pub suggestions: Vec<Suggestion>,
}

impl SuggestionCatalog {
    /// Catalog of well-known paths shipped with the crate.
    ///
    /// Small seed set so discovery works out of the box. Operators can feed
    /// a richer catalog through configuration.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Deserialize`] if the builtin data fails to
    ///   parse, which would be a packaging defect.
    pub fn builtin() -> Result<Self, ConfigError> {
        BUILTIN_CATALOG.parse()
    }
}

impl FromStr for SuggestionCatalog {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut catalog: SuggestionCatalog =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every listed path.
        for suggestion in &mut catalog.suggestions {
            for path in suggestion
                .linux
                .iter_mut()
                .chain(suggestion.macos.iter_mut())
            {
                *path = shellexpand::full(path.as_str())
                    .map_err(ConfigError::ShellExpansion)?
                    .into_owned();
            }
        }

        Ok(catalog)
    }
}

impl Display for SuggestionCatalog {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// One well-known application entry of a suggestion catalog.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Suggestion {
    /// Name of the application the paths belong to.
    pub name: String,

    /// Hint about what kind of path the application keeps.
    pub kind: Option<PathKind>,

    /// Candidate paths on Linux systems.
    #[serde(default)]
    pub linux: Vec<String>,

    /// Candidate paths on macOS systems.
    #[serde(default)]
    pub macos: Vec<String>,
}

impl Suggestion {
    /// Candidate paths applying to the given OS family.
    pub fn paths_for(&self, os_family: OsFamily) -> &[String] {
        match os_family {
            OsFamily::Linux => &self.linux,
            OsFamily::MacOs => &self.macos,
        }
    }
}

/// Kind hint for a suggested path.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    /// A single configuration file.
    File,

    /// An opaque configuration directory.
    Directory,
}

/// OS family the current process runs under.
///
/// Used only to select which candidate list entries of a suggestion catalog
/// apply. Nothing else in the engine branches on the platform.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    MacOs,
}

impl OsFamily {
    /// Determine OS family of the current process.
    ///
    /// Returns [`None`] on platforms no suggestion catalog covers.
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else {
            None
        }
    }
}

impl Display for OsFamily {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Linux => fmt.write_str("linux"),
            Self::MacOs => fmt.write_str("macos"),
        }
    }
}

const BUILTIN_CATALOG: &str = r#"
[[suggestion]]
name = "bash"
kind = "file"
linux = ["~/.bashrc", "~/.bash_profile"]
macos = ["~/.bashrc", "~/.bash_profile"]

[[suggestion]]
name = "zsh"
kind = "file"
linux = ["~/.zshrc", "~/.zprofile"]
macos = ["~/.zshrc", "~/.zprofile"]

[[suggestion]]
name = "vim"
kind = "file"
linux = ["~/.vimrc"]
macos = ["~/.vimrc"]

[[suggestion]]
name = "neovim"
kind = "directory"
linux = ["~/.config/nvim"]
macos = ["~/.config/nvim"]

[[suggestion]]
name = "git"
kind = "file"
linux = ["~/.gitconfig", "~/.config/git/config"]
macos = ["~/.gitconfig", "~/.config/git/config"]

[[suggestion]]
name = "tmux"
kind = "file"
linux = ["~/.tmux.conf", "~/.config/tmux/tmux.conf"]
macos = ["~/.tmux.conf", "~/.config/tmux/tmux.conf"]

[[suggestion]]
name = "ssh"
kind = "file"
linux = ["~/.ssh/config"]
macos = ["~/.ssh/config"]

[[suggestion]]
name = "alacritty"
kind = "directory"
linux = ["~/.config/alacritty"]
macos = ["~/.config/alacritty"]
"#;

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
