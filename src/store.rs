// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Store enumeration and audit.
//!
//! The store is the single managed directory holding the canonical copy of
//! every tracked configuration file. Dotstash never persists an explicit
//! registry of what it manages. The set of managed entries is always derived
//! fresh by walking the store tree, so the store itself stays the one source
//! of truth and the operator can prune it with plain file operations.
//!
//! # Candidacy
//!
//! The store mirrors an arbitrary subset of the file system, which poses a
//! grouping question during the walk: is a given store directory one opaque
//! link target, e.g. an application's whole configuration directory, or a
//! container to recurse into? Dotstash decides with a small heuristic:
//!
//! - An empty directory is a link target. Some applications start with an
//!   empty configuration directory.
//! - A directory containing only files is a link target, e.g. a flat
//!   snippets folder.
//! - A directory containing at least one subdirectory is a container.
//!
//! The heuristic is necessarily a guess about application layout. A
//! genuinely empty container directory will be misclassified as a link
//! target. This is a known limitation, deliberately left visible rather
//! than silently patched over; what matters is that enumeration and
//! discovery apply the exact same test so entry boundaries stay stable.
//!
//! The [`HOME_MARKER`] directory is exempt: it represents the home
//! directory itself and is always a container. Top-level dot entries, like
//! the `.git` directory of a version-controlled store, belong to the store
//! rather than to managed content and are skipped entirely.

use crate::{
    config::{OsFamily, SuggestionCatalog},
    path::{StoreLayout, HOME_MARKER},
    sync::link,
};

use std::{
    collections::{HashSet, VecDeque},
    fmt::{Display, Formatter, Result as FmtResult},
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// One unit the engine keeps synchronized.
///
/// A pair of the real location applications read, and its canonical mirror
/// inside the store. Exactly one entry exists per distinct system path
/// under management; entries are discovered by scanning the store, never
/// persisted as a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEntry {
    /// Absolute path applications actually read.
    pub system_path: PathBuf,

    /// Mirrored location under the store root.
    pub store_path: PathBuf,
}

impl ManagedEntry {
    /// Construct entry from both sides of the pair.
    pub fn new(system_path: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            system_path: system_path.into(),
            store_path: store_path.into(),
        }
    }

    /// Construct entry for a system path by translating its store side.
    pub fn for_system_path(layout: &StoreLayout, system_path: impl Into<PathBuf>) -> Self {
        let system_path = system_path.into();
        let store_path = layout.store_path(&system_path);

        Self {
            system_path,
            store_path,
        }
    }

    /// Stable store-relative identity of this entry.
    pub fn relative_key(&self, layout: &StoreLayout) -> String {
        layout.relative_key(&self.store_path)
    }
}

/// Classification of one store subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidacy {
    /// One opaque link target: a file, or a directory linked as a whole.
    LinkTarget,

    /// A container directory whose children are classified one by one.
    Container,
}

/// Classify a store directory as link target or container.
///
/// See the module documentation for the heuristic and its known limitation.
pub fn classify(dir: impl AsRef<Path>) -> io::Result<Candidacy> {
    for entry in fs::read_dir(dir.as_ref())? {
        if entry?.file_type()?.is_dir() {
            return Ok(Candidacy::Container);
        }
    }

    Ok(Candidacy::LinkTarget)
}

/// Partition of managed entries by link verification result.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditReport {
    /// Entries whose system path links exactly to their store path.
    pub correct: Vec<ManagedEntry>,

    /// Entries needing repair: wrong link, plain content, or missing.
    pub incorrect: Vec<ManagedEntry>,
}

/// A well-known path present on disk but not yet under management.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCandidate {
    /// Name of the application the path belongs to.
    pub name: String,

    /// Absolute path found on the file system.
    pub system_path: PathBuf,

    /// Human-readable form of the path, for selection menus.
    pub display: String,
}

impl Display for DiscoveredCandidate {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} ({})", self.display, self.name)
    }
}

/// Read-only scans over the managed store.
#[derive(Debug, Clone)]
pub struct Store {
    layout: StoreLayout,
}

impl Store {
    /// Construct store facade over a layout.
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Layout used for path translation.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Enumerate every managed entry by walking the store tree.
    ///
    /// Files emit one entry each. Directories classified as link targets
    /// emit one entry without further descent; containers are descended
    /// into. A missing store root simply means nothing is managed yet.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Walk`] if a store subtree cannot be read.
    #[instrument(skip(self), level = "debug")]
    pub fn enumerate_managed(&self) -> Result<Vec<ManagedEntry>> {
        let root = self.layout.store_root().to_path_buf();
        if !root.is_dir() {
            debug!("store root {:?} does not exist yet", root.display());
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut containers = VecDeque::new();
        containers.push_front(root.clone());

        // Use DFS to traverse the store tree.
        while let Some(dir) = containers.pop_front() {
            for child in read_dir_sorted(&dir)? {
                let path = child.path();
                let name = child.file_name();

                // INVARIANT: Top-level dot entries belong to the store
                // itself, never to managed content.
                if dir == root && name.to_string_lossy().starts_with('.') {
                    continue;
                }

                let file_type = child.file_type().map_err(|err| StoreError::Walk {
                    source: err,
                    path: path.clone(),
                })?;
                if !file_type.is_dir() {
                    entries.push(self.entry_for(path));
                    continue;
                }

                // INVARIANT: The marker directory stands for the home
                // directory itself. It is always a container.
                if dir == root && name == HOME_MARKER {
                    containers.push_front(path);
                    continue;
                }

                match classify(&path).map_err(|err| StoreError::Walk {
                    source: err,
                    path: path.clone(),
                })? {
                    Candidacy::Container => containers.push_front(path),
                    Candidacy::LinkTarget => entries.push(self.entry_for(path)),
                }
            }
        }

        entries.sort_by(|a, b| a.store_path.cmp(&b.store_path));

        Ok(entries)
    }

    /// Partition entries by link verification result.
    pub fn check_all(&self, entries: impl IntoIterator<Item = ManagedEntry>) -> AuditReport {
        let mut report = AuditReport::default();
        for entry in entries {
            if link::is_correct(&entry.store_path, &entry.system_path) {
                report.correct.push(entry);
            } else {
                report.incorrect.push(entry);
            }
        }

        report
    }

    /// Find well-known paths present on disk but not yet under management.
    ///
    /// Intersects the catalog's candidate list for the given OS family with
    /// actual file system presence, then subtracts everything already
    /// managed by the store.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Walk`] if the store tree cannot be read.
    #[instrument(skip(self, catalog), level = "debug")]
    pub fn discover_candidates(
        &self,
        catalog: &SuggestionCatalog,
        os_family: OsFamily,
    ) -> Result<Vec<DiscoveredCandidate>> {
        let managed: HashSet<PathBuf> = self
            .enumerate_managed()?
            .into_iter()
            .map(|entry| entry.system_path)
            .collect();

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for suggestion in &catalog.suggestions {
            for path in suggestion.paths_for(os_family) {
                let system_path = PathBuf::from(path);
                if fs::symlink_metadata(&system_path).is_err() {
                    continue;
                }
                if managed.contains(&system_path) {
                    continue;
                }
                if fs::symlink_metadata(self.layout.store_path(&system_path)).is_ok() {
                    continue;
                }
                if !seen.insert(system_path.clone()) {
                    continue;
                }

                found.push(DiscoveredCandidate {
                    name: suggestion.name.clone(),
                    display: self.layout.display(&system_path),
                    system_path,
                });
            }
        }

        Ok(found)
    }

    fn entry_for(&self, store_path: PathBuf) -> ManagedEntry {
        ManagedEntry::new(self.layout.system_path(&store_path), store_path)
    }
}

/// Read a directory's children in stable name order.
///
/// `read_dir` order is platform arbitrary; sorting keeps enumeration
/// deterministic across runs and platforms.
fn read_dir_sorted(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut children = Vec::new();
    let reader = fs::read_dir(dir).map_err(|err| StoreError::Walk {
        source: err,
        path: dir.to_path_buf(),
    })?;
    for child in reader {
        children.push(child.map_err(|err| StoreError::Walk {
            source: err,
            path: dir.to_path_buf(),
        })?);
    }
    children.sort_by_key(|child| child.file_name());

    Ok(children)
}

/// Store scanning error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store subtree cannot be read during a walk.
    #[error("failed to walk store at {:?}", path.display())]
    Walk {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_fixture(temp: &TempDir) -> Store {
        Store::new(StoreLayout::new(
            temp.path().join("store"),
            temp.path().join("home"),
        ))
    }

    #[test]
    fn empty_directory_is_link_target() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("alacritty");
        fs::create_dir_all(&dir).unwrap();

        assert_eq!(classify(&dir).unwrap(), Candidacy::LinkTarget);
    }

    #[test]
    fn files_only_directory_is_link_target() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("snippets");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("rust.snip"), "").unwrap();
        fs::write(dir.join("toml.snip"), "").unwrap();

        assert_eq!(classify(&dir).unwrap(), Candidacy::LinkTarget);
    }

    #[test]
    fn directory_with_subdirectory_is_container() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".config");
        fs::create_dir_all(dir.join("nvim")).unwrap();
        fs::write(dir.join("stray.conf"), "").unwrap();

        assert_eq!(classify(&dir).unwrap(), Candidacy::Container);
    }

    #[test]
    fn enumerate_walks_containers_and_stops_at_link_targets() {
        let temp = TempDir::new().unwrap();
        let store = store_fixture(&temp);
        let root = temp.path().join("store");
        let home = temp.path().join("home");

        fs::create_dir_all(root.join("__home__/.config/nvim")).unwrap();
        fs::write(root.join("__home__/.config/nvim/init.lua"), "").unwrap();
        fs::create_dir_all(root.join("__home__/.config/alacritty")).unwrap();
        fs::write(root.join("__home__/.vimrc"), "").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "").unwrap();

        let result = store.enumerate_managed().unwrap();

        let expect = vec![
            ManagedEntry::new(
                home.join(".config/alacritty"),
                root.join("__home__/.config/alacritty"),
            ),
            ManagedEntry::new(
                home.join(".config/nvim"),
                root.join("__home__/.config/nvim"),
            ),
            ManagedEntry::new(home.join(".vimrc"), root.join("__home__/.vimrc")),
        ];
        assert_eq!(result, expect);
    }

    #[test]
    fn enumerate_on_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_fixture(&temp);

        assert!(store.enumerate_managed().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn check_all_partitions_by_link_state() {
        let temp = TempDir::new().unwrap();
        let store = store_fixture(&temp);
        let root = temp.path().join("store");
        let home = temp.path().join("home");

        fs::create_dir_all(root.join("__home__")).unwrap();
        fs::create_dir_all(&home).unwrap();
        fs::write(root.join("__home__/.vimrc"), "linked").unwrap();
        fs::write(root.join("__home__/.zshrc"), "unlinked").unwrap();
        std::os::unix::fs::symlink(root.join("__home__/.vimrc"), home.join(".vimrc")).unwrap();

        let report = store.check_all(store.enumerate_managed().unwrap());

        assert_eq!(
            report
                .correct
                .iter()
                .map(|entry| entry.system_path.clone())
                .collect::<Vec<_>>(),
            vec![home.join(".vimrc")]
        );
        assert_eq!(
            report
                .incorrect
                .iter()
                .map(|entry| entry.system_path.clone())
                .collect::<Vec<_>>(),
            vec![home.join(".zshrc")]
        );
    }

    #[test]
    fn discover_skips_absent_and_already_managed_paths() {
        let temp = TempDir::new().unwrap();
        let store = store_fixture(&temp);
        let root = temp.path().join("store");
        let home = temp.path().join("home");

        fs::create_dir_all(&home).unwrap();
        fs::write(home.join(".vimrc"), "present").unwrap();
        fs::write(home.join(".zshrc"), "managed already").unwrap();
        fs::create_dir_all(root.join("__home__")).unwrap();
        fs::write(root.join("__home__/.zshrc"), "managed already").unwrap();

        let catalog: SuggestionCatalog = format!(
            r#"
            [[suggestion]]
            name = "vim"
            linux = ["{home}/.vimrc"]
            macos = ["{home}/.vimrc"]

            [[suggestion]]
            name = "zsh"
            linux = ["{home}/.zshrc"]
            macos = ["{home}/.zshrc"]

            [[suggestion]]
            name = "tmux"
            linux = ["{home}/.tmux.conf"]
            macos = ["{home}/.tmux.conf"]
            "#,
            home = home.display()
        )
        .parse()
        .unwrap();

        let result = store
            .discover_candidates(&catalog, OsFamily::Linux)
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "vim");
        assert_eq!(result[0].system_path, home.join(".vimrc"));
    }
}
