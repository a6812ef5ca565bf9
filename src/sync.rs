// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sync operation.
//!
//! The single entry point that drives one managed entry to the converged
//! __linked__ state: the system path is a symlink resolving exactly to the
//! entry's store path, and the store path holds the canonical content.
//!
//! # State Machine
//!
//! The operation keys off two facts: whether the system path currently has
//! effective content behind it, and whether the store path exists.
//!
//! - Content and no store entry: first-time migration. Snapshot the content
//!   if the daily rule allows, move it into the store, link.
//! - Content and a store entry, but the link is wrong: the system content is
//!   what the applications have been reading, so it wins. Snapshot it, move
//!   it over the store entry, link.
//! - No content but a store entry: recreate-from-store, e.g. right after the
//!   managed store was cloned onto a fresh machine. No snapshot, no move,
//!   straight to link creation.
//! - Neither: nothing to synchronize. The only caller-correctable error.
//!
//! A system path that is itself a symlink to unrelated content is resolved
//! to its real target first, and that target's content is what gets
//! snapshotted and migrated, never the link itself.
//!
//! # Convergence
//!
//! The final step of every successful non-trivial path is identical and
//! unconditional: ensure parent directories exist, remove whatever sits at
//! the system path, create the symlink. Destructive steps are ordered
//! backup, then move, then unlink, then link, so an interrupted run leaves
//! an entry that the next run finishes off from wherever it stopped.

pub mod backup;
pub mod link;

use crate::{
    path::StoreLayout,
    store::ManagedEntry,
    sync::backup::{copy_all, remove_all, BackupManager, Clock, SystemClock},
};

use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// What a successful sync operation did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// System path already linked to the store. Nothing was touched.
    AlreadyLinked,

    /// Existing content was migrated into the store, then linked.
    Migrated {
        /// Whether a snapshot was taken, or the daily rule skipped it.
        backed_up: bool,
    },

    /// Store already held canonical content. Link recreated from it.
    Recreated,
}

/// Decision the state machine reached for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Plan {
    /// Snapshot and move this effective content source into the store.
    Migrate { source: PathBuf },

    /// Store content is canonical; only the link needs creating.
    Relink,
}

/// Drive managed entries to the converged linked state.
///
/// Owns the path translation anchors and the backup manager. Generic over
/// the [`Clock`] so scenario tests can simulate days passing between runs.
#[derive(Debug)]
pub struct Syncer<C = SystemClock>
where
    C: Clock,
{
    layout: StoreLayout,
    backups: BackupManager<C>,
}

impl<C> Syncer<C>
where
    C: Clock,
{
    /// Construct new syncer from its collaborators.
    pub fn new(layout: StoreLayout, backups: BackupManager<C>) -> Self {
        Self { layout, backups }
    }

    /// Layout used for path translation.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Backup manager, for snapshot listing and recovery flows.
    pub fn backups(&self) -> &BackupManager<C> {
        &self.backups
    }

    /// Drive one managed entry to the converged linked state.
    ///
    /// Idempotent: an entry that is already correctly linked is reported as
    /// [`SyncOutcome::AlreadyLinked`] without touching the file system or
    /// producing a snapshot.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::NeitherPathExists`] if there is no content on
    ///   either side. Callers iterating a batch should skip and continue.
    /// - Return [`SyncError::Backup`] if the pre-move snapshot fails, in
    ///   which case nothing has been mutated.
    /// - Return other variants for I/O failures mid-operation; re-running
    ///   the entry resumes from wherever the failure left it.
    #[instrument(skip(self, entry), level = "debug")]
    pub fn sync_one(&mut self, entry: &ManagedEntry) -> Result<SyncOutcome> {
        if link::is_correct(&entry.store_path, &entry.system_path) {
            debug!("already linked: {:?}", entry.system_path.display());
            return Ok(SyncOutcome::AlreadyLinked);
        }

        let source = resolve_source(&entry.system_path);
        let store_exists = fs::symlink_metadata(&entry.store_path).is_ok();
        let plan = plan(source, store_exists, &entry.system_path)?;

        let outcome = match plan {
            // INVARIANT: A link that already resolves into the store has
            // nothing left to migrate. Only its spelling needs converging.
            Plan::Migrate { source } if source != entry.store_path => {
                let backed_up = self.backup_if_due(entry, &source)?;
                self.relocate_into_store(entry, &source)?;
                SyncOutcome::Migrated { backed_up }
            }
            _ => SyncOutcome::Recreated,
        };

        self.link_into_place(entry)?;
        info!(
            "linked {:?} -> {:?}",
            entry.system_path.display(),
            entry.store_path.display()
        );

        Ok(outcome)
    }

    /// Sync a batch of entries, isolating failures per entry.
    ///
    /// Every entry is attempted; an entry that fails is reported in the
    /// result listing and the batch continues with the rest.
    pub fn sync_all<'a>(
        &mut self,
        entries: impl IntoIterator<Item = &'a ManagedEntry>,
    ) -> Vec<(&'a ManagedEntry, Result<SyncOutcome>)> {
        let mut results = Vec::new();
        for entry in entries {
            let result = self.sync_one(entry);
            if let Err(err) = &result {
                warn!("cannot sync {:?}: {err}", entry.system_path.display());
            }
            results.push((entry, result));
        }

        results
    }

    fn backup_if_due(&mut self, entry: &ManagedEntry, source: &Path) -> Result<bool> {
        let key = self.layout.relative_key(&entry.store_path);
        if !self.backups.should_backup_today(&key) {
            debug!("snapshot already taken today for {key}");
            return Ok(false);
        }

        // INVARIANT: A failed snapshot aborts the sync before any mutation,
        // so a failed backup never costs content.
        self.backups.snapshot(&key, source)?;

        Ok(true)
    }

    fn relocate_into_store(&self, entry: &ManagedEntry, source: &Path) -> Result<()> {
        if let Some(parent) = entry.store_path.parent() {
            let _ = mkdirp::mkdirp(parent).map_err(|err| SyncError::CreateDirectory {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        if fs::symlink_metadata(&entry.store_path).is_ok() {
            remove_all(&entry.store_path).map_err(|err| SyncError::Remove {
                source: err,
                path: entry.store_path.clone(),
            })?;
        }

        relocate(source, &entry.store_path).map_err(|err| SyncError::Relocate {
            source: err,
            from: source.to_path_buf(),
            to: entry.store_path.clone(),
        })?;

        Ok(())
    }

    fn link_into_place(&self, entry: &ManagedEntry) -> Result<()> {
        for target in [&entry.store_path, &entry.system_path] {
            if let Some(parent) = target.parent() {
                let _ = mkdirp::mkdirp(parent).map_err(|err| SyncError::CreateDirectory {
                    source: err,
                    path: parent.to_path_buf(),
                })?;
            }
        }

        // INVARIANT: Whatever sits at the system path, plain file, directory,
        // or stale symlink, must give way to the link.
        if fs::symlink_metadata(&entry.system_path).is_ok() {
            remove_all(&entry.system_path).map_err(|err| SyncError::Remove {
                source: err,
                path: entry.system_path.clone(),
            })?;
        }

        symlink(&entry.store_path, &entry.system_path).map_err(|err| SyncError::Link {
            source: err,
            system_path: entry.system_path.clone(),
            store_path: entry.store_path.clone(),
        })?;

        Ok(())
    }
}

/// Effective content source behind a system path.
///
/// A plain file or directory is its own source. A symlinked system path
/// resolves to its real target, so migration moves the content, not the
/// link. A missing path or dangling symlink has no source.
pub(crate) fn resolve_source(system_path: &Path) -> Option<PathBuf> {
    let metadata = fs::symlink_metadata(system_path).ok()?;
    if metadata.file_type().is_symlink() {
        return fs::canonicalize(system_path).ok();
    }

    Some(system_path.to_path_buf())
}

/// Pure decision over what the sync operation should do.
pub(crate) fn plan(
    source: Option<PathBuf>,
    store_exists: bool,
    system_path: &Path,
) -> Result<Plan> {
    match (source, store_exists) {
        (Some(source), _) => Ok(Plan::Migrate { source }),
        (None, true) => Ok(Plan::Relink),
        (None, false) => Err(SyncError::NeitherPathExists {
            system_path: system_path.to_path_buf(),
        }),
    }
}

/// Move content across the file system.
///
/// Rename when possible; fall back to copy-then-delete when the rename
/// fails, which covers moves across devices.
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    copy_all(from, to)?;
    remove_all(from)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}
#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

/// Sync operation error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Neither the system path nor its store entry exists.
    #[error("nothing to synchronize: neither {:?} nor its store entry exists", system_path.display())]
    NeitherPathExists { system_path: PathBuf },

    /// Pre-move snapshot fails. Nothing has been mutated yet.
    #[error(transparent)]
    Backup(#[from] backup::BackupError),

    /// Parent directory creation fails.
    #[error("failed to create directory {:?}", path.display())]
    CreateDirectory {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Stale content cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Content cannot be moved into the store.
    #[error("failed to relocate {:?} into {:?}", from.display(), to.display())]
    Relocate {
        #[source]
        source: io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Symlink creation fails.
    #[error("failed to link {:?} to {:?}", system_path.display(), store_path.display())]
    Link {
        #[source]
        source: io::Error,
        system_path: PathBuf,
        store_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
