// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way. The centerpiece is the
//! [`StoreLayout`] type, which performs the loss-free translation between a
//! real path on the file system and its canonical location inside the
//! dotfile store.
//!
//! # Store Layout
//!
//! The store mirrors an arbitrary subset of the file system tree. Paths that
//! live under the user's home directory get their home prefix rewritten to
//! the reserved marker segment [`HOME_MARKER`], so the mapping stays
//! reversible without consulting environment state at read time. Any other
//! absolute path is mirrored by stripping its leading separator and nesting
//! it under the store root. For example, with a store root of
//! `~/.local/share/dotstash/store`:
//!
//! ```text
//! ~/.vimrc        <->  <store root>/__home__/.vimrc
//! /etc/fstab      <->  <store root>/etc/fstab
//! ```
//!
//! Translation in both directions is a pure string transformation. No method
//! on [`StoreLayout`] touches the file system.

use std::path::{Path, PathBuf};

/// Reserved marker segment standing in for the user's home directory.
///
/// Chosen to be an unlikely leading path component on every supported
/// platform, so a mirrored absolute path can never collide with it.
pub const HOME_MARKER: &str = "__home__";

/// Bidirectional mapping between system paths and store paths.
///
/// Holds the two anchor points the translation needs: the store root, and
/// the absolute path of the user's home directory. Construct one per run and
/// pass it by reference into every component that needs translation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreLayout {
    store_root: PathBuf,
    home: PathBuf,
}

impl StoreLayout {
    /// Construct new store layout from explicit anchor points.
    pub fn new(store_root: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            home: home.into(),
        }
    }

    /// Construct new store layout anchored at the real home directory.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if home directory path cannot be determined.
    pub fn try_new(store_root: impl Into<PathBuf>) -> Result<Self, NoWayHome> {
        Ok(Self::new(store_root, home_dir()?))
    }

    /// Absolute path of the store root.
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    /// Absolute path of the home directory this layout is anchored to.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Translate a system path to its canonical location inside the store.
    ///
    /// Pure string transformation. Does not check that either side exists.
    pub fn store_path(&self, system_path: impl AsRef<Path>) -> PathBuf {
        let system_path = system_path.as_ref();
        if let Ok(rel) = system_path.strip_prefix(&self.home) {
            return self.store_root.join(HOME_MARKER).join(rel);
        }

        let mirrored = system_path.strip_prefix("/").unwrap_or(system_path);
        self.store_root.join(mirrored)
    }

    /// Translate a store path back to the system path it mirrors.
    ///
    /// Exact inverse of [`StoreLayout::store_path`]. Paths outside the store
    /// root pass through unchanged.
    pub fn system_path(&self, store_path: impl AsRef<Path>) -> PathBuf {
        let store_path = store_path.as_ref();
        let rel = match store_path.strip_prefix(&self.store_root) {
            Ok(rel) => rel,
            Err(_) => return store_path.to_path_buf(),
        };

        if let Ok(under_home) = rel.strip_prefix(HOME_MARKER) {
            return self.home.join(under_home);
        }

        Path::new("/").join(rel)
    }

    /// Store-relative key of a store path.
    ///
    /// The key is the stable identity of a managed entry across its
    /// lifetime, e.g. `__home__/.vimrc`. Used to address backup snapshots.
    pub fn relative_key(&self, store_path: impl AsRef<Path>) -> String {
        store_path
            .as_ref()
            .strip_prefix(&self.store_root)
            .unwrap_or(store_path.as_ref())
            .to_string_lossy()
            .into_owned()
    }

    /// Human-readable form of a store or system path.
    ///
    /// Strips the marker segment and renders the home prefix as `~`. For
    /// presentation only; never feed the result to file system operations.
    pub fn display(&self, path: impl AsRef<Path>) -> String {
        let system_path = self.system_path(path);
        match system_path.strip_prefix(&self.home) {
            Ok(rel) => Path::new("~").join(rel).to_string_lossy().into_owned(),
            Err(_) => system_path.to_string_lossy().into_owned(),
        }
    }
}

/// Resolve operator-supplied input to an absolute system path.
///
/// Performs shell expansion (`~`, `$VAR`) first, then resolves a leading
/// [`HOME_MARKER`] segment against the given home directory. Remaining
/// relative paths are operator shorthand for home-relative ones, so
/// `.vimrc` means `~/.vimrc`. Absolute paths pass through unchanged.
///
/// # Errors
///
/// - Return [`PathError::ShellExpansion`] if shell expansion fails.
pub fn expand(input: impl AsRef<str>, home: impl AsRef<Path>) -> Result<PathBuf> {
    let expanded = shellexpand::full(input.as_ref())
        .map_err(PathError::ShellExpansion)?
        .into_owned();

    let path = Path::new(&expanded);
    if let Ok(rel) = path.strip_prefix(HOME_MARKER) {
        return Ok(home.as_ref().join(rel));
    }

    if path.is_relative() {
        return Ok(home.as_ref().join(path));
    }

    Ok(path.to_path_buf())
}

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf, NoWayHome> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to the dotfile store root.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/dotstash/store` as the
/// default absolute path for the store. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_store_dir() -> Result<PathBuf, NoWayHome> {
    dirs::data_dir()
        .map(|path| path.join("dotstash").join("store"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to the backup root.
///
/// Sibling of the default store root: `$XDG_DATA_HOME/dotstash/backups`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_backup_dir() -> Result<PathBuf, NoWayHome> {
    dirs::data_dir()
        .map(|path| path.join("dotstash").join("backups"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Home directory cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Shell expansion of operator input fails.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
