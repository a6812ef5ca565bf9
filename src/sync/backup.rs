// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup snapshot management.
//!
//! Produce timestamped, content-complete snapshots of a managed entry before
//! the sync operation mutates it, and enforce the retention policy that
//! bounds how many snapshots stay around.
//!
//! # Snapshot Layout
//!
//! The backup root mirrors the store's relative layout. A snapshot of the
//! entry keyed `__home__/.vimrc` lands at
//! `<backup root>/__home__/.vimrc.<stamp>.bak`, where `<stamp>` is a
//! 17-digit zero-padded local timestamp. Zero padding makes lexicographic
//! descending order of snapshot names equal newest-first order, so rotation
//! never has to parse dates.
//!
//! # Retention Policy
//!
//! Two rules apply per relative key. At most one snapshot is created per
//! calendar day, tracked through a small ledger file persisted at the backup
//! root. And at most [`retention limit`](crate::config::Settings) snapshots
//! are retained, oldest deleted first. The ledger is written only after the
//! physical snapshot copy succeeds, so a crash in between costs at most one
//! extra snapshot on the next run, never content.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info, instrument, warn};

/// Fixed marker suffix identifying snapshot files in the backup root.
pub const BACKUP_MARKER: &str = "bak";

/// File name of the last-backup ledger at the backup root.
pub const LEDGER_FILE_NAME: &str = "lastbackup.toml";

/// Snapshot timestamp layout, 17 zero-padded digits down to milliseconds.
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Source of the current time.
///
/// Seam for the once-per-day rule and snapshot stamps, so tests can simulate
/// the passage of days without waiting for them.
pub trait Clock {
    /// Current local time.
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock of the running system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// One timestamped snapshot of a managed entry's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Store-relative key of the entry the snapshot belongs to.
    pub relative_key: String,

    /// Zero-padded timestamp embedded in the snapshot file name.
    pub stamp: String,

    /// Full copy of the content at backup time. Never mutated.
    pub content_path: PathBuf,
}

/// Persisted map from relative key to the instant of its last snapshot.
///
/// Implements only the once-per-day rule; the snapshot set itself is always
/// derived from the backup root directly. Serialized as TOML with RFC 3339
/// timestamps, file I/O left to [`BackupManager`].
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackupLedger {
    /// Last snapshot instant per relative key.
    #[serde(rename = "last_backup", default)]
    stamps: BTreeMap<String, DateTime<Local>>,
}

impl BackupLedger {
    /// Recorded instant of the last snapshot for a key, if any.
    pub fn recorded(&self, key: &str) -> Option<&DateTime<Local>> {
        self.stamps.get(key)
    }

    /// Record the instant of a freshly written snapshot.
    pub fn record(&mut self, key: impl Into<String>, stamp: DateTime<Local>) {
        self.stamps.insert(key.into(), stamp);
    }
}

impl FromStr for BackupLedger {
    type Err = BackupError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(toml::de::from_str(data).map_err(BackupError::ParseLedger)?)
    }
}

impl Display for BackupLedger {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(|_| FmtError)?
                .as_str(),
        )
    }
}

/// Snapshot creation, listing, and retention enforcement.
///
/// Owns the backup root, the retention limit, and the last-backup ledger.
/// Generic over the [`Clock`] so the calendar-day rule can be exercised with
/// simulated days.
#[derive(Debug)]
pub struct BackupManager<C = SystemClock>
where
    C: Clock,
{
    backup_root: PathBuf,
    retention_limit: usize,
    ledger: BackupLedger,
    clock: C,
}

impl BackupManager<SystemClock> {
    /// Open the backup root with the system wall clock.
    ///
    /// Reads the ledger file when one exists; a missing ledger means no
    /// entry was ever backed up.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::ReadLedger`] if the ledger exists but cannot
    ///   be read.
    /// - Return [`BackupError::ParseLedger`] if the ledger fails to parse.
    pub fn load(backup_root: impl Into<PathBuf>, retention_limit: usize) -> Result<Self> {
        Self::load_with_clock(backup_root, retention_limit, SystemClock)
    }
}

impl<C> BackupManager<C>
where
    C: Clock,
{
    /// Open the backup root with an explicit clock.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::ReadLedger`] if the ledger exists but cannot
    ///   be read.
    /// - Return [`BackupError::ParseLedger`] if the ledger fails to parse.
    pub fn load_with_clock(
        backup_root: impl Into<PathBuf>,
        retention_limit: usize,
        clock: C,
    ) -> Result<Self> {
        let backup_root = backup_root.into();
        let ledger_path = backup_root.join(LEDGER_FILE_NAME);
        let ledger = match fs::read_to_string(&ledger_path) {
            Ok(content) => content.parse()?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BackupLedger::default(),
            Err(err) => {
                return Err(BackupError::ReadLedger {
                    source: err,
                    ledger_path,
                })
            }
        };

        Ok(Self {
            backup_root,
            retention_limit,
            ledger,
            clock,
        })
    }

    /// Absolute path of the backup root.
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Check whether the once-per-day rule permits a snapshot for a key.
    ///
    /// True if no snapshot instant is recorded for the key, or the recorded
    /// instant falls on a different calendar day than today.
    pub fn should_backup_today(&self, key: &str) -> bool {
        match self.ledger.recorded(key) {
            Some(stamp) => stamp.date_naive() != self.clock.now().date_naive(),
            None => true,
        }
    }

    /// Write a content-complete snapshot for a key.
    ///
    /// Copies the content (file directly, directory recursively) into the
    /// backup root, rotates snapshots past the retention limit, then records
    /// the new instant in the ledger. Rotation failures only cost disk
    /// space, so they are logged and swallowed; the ledger is written only
    /// once the physical copy has succeeded.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::InvalidKey`] if the key has no file name.
    /// - Return [`BackupError::WriteSnapshot`] if the content copy fails.
    /// - Return [`BackupError::WriteLedger`] if the ledger cannot be
    ///   persisted afterwards.
    #[instrument(skip(self, content_path), level = "debug")]
    pub fn snapshot(&mut self, key: &str, content_path: impl AsRef<Path>) -> Result<Snapshot> {
        let content_path = content_path.as_ref();
        let now = self.clock.now();
        let (dir, name) = self.split_key(key)?;
        let stamp = now.format(STAMP_FORMAT).to_string();
        let snapshot_path = dir.join(format!("{name}.{stamp}.{BACKUP_MARKER}"));

        let _ = mkdirp::mkdirp(&dir).map_err(|err| BackupError::WriteSnapshot {
            source: err,
            content_path: content_path.to_path_buf(),
            snapshot_path: snapshot_path.clone(),
        })?;
        copy_all(content_path, &snapshot_path).map_err(|err| BackupError::WriteSnapshot {
            source: err,
            content_path: content_path.to_path_buf(),
            snapshot_path: snapshot_path.clone(),
        })?;
        info!("snapshot {key} at {:?}", snapshot_path.display());

        self.rotate(key)?;

        // INVARIANT: Record the ledger only after the copy has succeeded.
        self.ledger.record(key, now);
        self.save_ledger()?;

        Ok(Snapshot {
            relative_key: key.to_owned(),
            stamp,
            content_path: snapshot_path,
        })
    }

    /// List all snapshots recorded for a key, newest first.
    ///
    /// Used both by rotation and by recovery flows that want to restore
    /// prior content.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::ListSnapshots`] if the backup directory
    ///   exists but cannot be read.
    pub fn list_snapshots(&self, key: &str) -> Result<Vec<Snapshot>> {
        let (dir, name) = self.split_key(key)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(BackupError::ListSnapshots {
                    source: err,
                    backup_dir: dir,
                })
            }
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| BackupError::ListSnapshots {
                source: err,
                backup_dir: dir.clone(),
            })?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stamp) = parse_stamp(&name, &file_name) {
                snapshots.push(Snapshot {
                    relative_key: key.to_owned(),
                    stamp,
                    content_path: entry.path(),
                });
            }
        }

        // INVARIANT: Zero-padded stamps sort lexicographically, newest first
        // when descending.
        snapshots.sort_by(|a, b| b.stamp.cmp(&a.stamp));

        Ok(snapshots)
    }

    fn rotate(&mut self, key: &str) -> Result<()> {
        let snapshots = self.list_snapshots(key)?;
        for stale in snapshots.iter().skip(self.retention_limit) {
            debug!("rotate out snapshot {:?}", stale.content_path.display());
            if let Err(err) = remove_all(&stale.content_path) {
                warn!(
                    "cannot remove stale snapshot {:?}: {err}",
                    stale.content_path.display()
                );
            }
        }

        Ok(())
    }

    fn save_ledger(&self) -> Result<()> {
        let ledger_path = self.backup_root.join(LEDGER_FILE_NAME);
        let content =
            toml::ser::to_string_pretty(&self.ledger).map_err(BackupError::SerializeLedger)?;
        let _ = mkdirp::mkdirp(&self.backup_root).map_err(|err| BackupError::WriteLedger {
            source: err,
            ledger_path: ledger_path.clone(),
        })?;
        fs::write(&ledger_path, content).map_err(|err| BackupError::WriteLedger {
            source: err,
            ledger_path,
        })?;

        Ok(())
    }

    fn split_key(&self, key: &str) -> Result<(PathBuf, String)> {
        let rel = Path::new(key);
        let name = match rel.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                return Err(BackupError::InvalidKey {
                    key: key.to_owned(),
                })
            }
        };
        let dir = match rel.parent() {
            Some(parent) => self.backup_root.join(parent),
            None => self.backup_root.clone(),
        };

        Ok((dir, name))
    }
}

/// Extract the stamp from a snapshot file name belonging to `name`.
///
/// A snapshot name is `<name>.<14-to-17-digit-stamp>.bak`. Anything else in
/// the backup directory, including snapshots of sibling keys, is ignored.
fn parse_stamp(name: &str, file_name: &str) -> Option<String> {
    let rest = file_name.strip_prefix(name)?.strip_prefix('.')?;
    let stamp = rest.strip_suffix(BACKUP_MARKER)?.strip_suffix('.')?;
    if (14..=17).contains(&stamp.len()) && stamp.bytes().all(|byte| byte.is_ascii_digit()) {
        return Some(stamp.to_owned());
    }

    None
}

/// Copy a file directly, or a directory recursively preserving structure.
pub(crate) fn copy_all(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_all(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        fs::copy(src, dst)?;
    }

    Ok(())
}

/// Remove whatever sits at a path: file, symlink, or directory tree.
pub(crate) fn remove_all(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Backup management error types.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Relative key carries no file name to derive a snapshot name from.
    #[error("invalid backup key {key:?}")]
    InvalidKey { key: String },

    /// Ledger file cannot be read.
    #[error("failed to read backup ledger at {:?}", ledger_path.display())]
    ReadLedger {
        #[source]
        source: io::Error,
        ledger_path: PathBuf,
    },

    /// Ledger file cannot be written.
    #[error("failed to write backup ledger at {:?}", ledger_path.display())]
    WriteLedger {
        #[source]
        source: io::Error,
        ledger_path: PathBuf,
    },

    /// Ledger content fails to parse.
    #[error(transparent)]
    ParseLedger(#[from] toml::de::Error),

    /// Ledger content fails to serialize.
    #[error(transparent)]
    SerializeLedger(#[from] toml::ser::Error),

    /// Snapshot content copy fails.
    #[error("failed to snapshot {:?} to {:?}", content_path.display(), snapshot_path.display())]
    WriteSnapshot {
        #[source]
        source: io::Error,
        content_path: PathBuf,
        snapshot_path: PathBuf,
    },

    /// Backup directory cannot be enumerated.
    #[error("failed to list snapshots under {:?}", backup_dir.display())]
    ListSnapshots {
        #[source]
        source: io::Error,
        backup_dir: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = BackupError> = std::result::Result<T, E>;
