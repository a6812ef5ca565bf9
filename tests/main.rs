// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod integration;

use dotstash::{
    config::Settings,
    path::StoreLayout,
    store::{ManagedEntry, Store},
    sync::{backup::BackupManager, backup::Snapshot, Syncer},
};

use anyhow::Result;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Self-contained store, backup root, and fake home inside a tempdir.
///
/// Every component takes its anchor paths explicitly, so scenarios never
/// touch the real home directory or any environment state.
pub(crate) struct StoreFixture {
    _temp: TempDir,
    settings: Settings,
    layout: StoreLayout,
}

impl StoreFixture {
    pub(crate) fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let home = temp.path().join("home");
        fs::create_dir_all(&home)?;

        let settings = Settings {
            store_root: temp.path().join("store"),
            backup_root: temp.path().join("backups"),
            retention_limit: 7,
        };
        let layout = StoreLayout::new(settings.store_root.clone(), home);

        Ok(Self {
            _temp: temp,
            settings,
            layout,
        })
    }

    pub(crate) fn home(&self) -> &Path {
        self.layout.home()
    }

    pub(crate) fn syncer(&self) -> Result<Syncer> {
        let backups = BackupManager::load(
            self.settings.backup_root.clone(),
            self.settings.retention_limit,
        )?;

        Ok(Syncer::new(self.layout.clone(), backups))
    }

    pub(crate) fn store(&self) -> Store {
        Store::new(self.layout.clone())
    }

    /// Managed entry for a home-relative path like `.testrc`.
    pub(crate) fn entry(&self, name: &str) -> ManagedEntry {
        ManagedEntry::for_system_path(&self.layout, self.home().join(name))
    }

    pub(crate) fn write_home(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.home().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;

        Ok(path)
    }

    pub(crate) fn write_store(&self, key: &str, contents: &str) -> Result<PathBuf> {
        let path = self.settings.store_root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;

        Ok(path)
    }

    pub(crate) fn snapshots_for(&self, entry: &ManagedEntry) -> Result<Vec<Snapshot>> {
        let backups = BackupManager::load(
            self.settings.backup_root.clone(),
            self.settings.retention_limit,
        )?;

        Ok(backups.list_snapshots(&entry.relative_key(&self.layout))?)
    }
}
