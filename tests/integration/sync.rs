// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! End-to-end scenarios for the sync operation.

use crate::StoreFixture;

use dotstash::sync::{link, SyncError, SyncOutcome};

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn first_time_migration_moves_content_and_links() -> Result<()> {
    let fixture = StoreFixture::new()?;
    let system_path = fixture.write_home(".testrc", "hello")?;
    let entry = fixture.entry(".testrc");
    let mut syncer = fixture.syncer()?;

    let outcome = syncer.sync_one(&entry)?;

    assert_eq!(outcome, SyncOutcome::Migrated { backed_up: true });
    assert_eq!(fs::read_to_string(&entry.store_path)?, "hello");
    assert!(fs::symlink_metadata(&system_path)?.file_type().is_symlink());
    assert!(link::is_correct(&entry.store_path, &system_path));

    let snapshots = fixture.snapshots_for(&entry)?;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(fs::read_to_string(&snapshots[0].content_path)?, "hello");

    Ok(())
}

#[test]
fn second_sync_is_a_no_op() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_home(".testrc", "hello")?;
    let entry = fixture.entry(".testrc");
    let mut syncer = fixture.syncer()?;
    syncer.sync_one(&entry)?;
    let target_before = fs::read_link(&entry.system_path)?;

    let outcome = syncer.sync_one(&entry)?;

    assert_eq!(outcome, SyncOutcome::AlreadyLinked);
    assert_eq!(fs::read_link(&entry.system_path)?, target_before);
    assert_eq!(fixture.snapshots_for(&entry)?.len(), 1);

    Ok(())
}

#[cfg(unix)]
#[test]
fn repair_replaces_broken_link_with_store_content() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_store("__home__/.testrc", "correct")?;
    let entry = fixture.entry(".testrc");
    std::os::unix::fs::symlink(fixture.home().join("gone"), &entry.system_path)?;
    let mut syncer = fixture.syncer()?;

    let outcome = syncer.sync_one(&entry)?;

    assert_eq!(outcome, SyncOutcome::Recreated);
    assert_eq!(fs::read_to_string(&entry.system_path)?, "correct");
    assert!(link::is_correct(&entry.store_path, &entry.system_path));
    assert!(fixture.snapshots_for(&entry)?.is_empty());

    Ok(())
}

#[test]
fn recreate_from_store_takes_no_backup() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_store("__home__/.testrc", "preserved")?;
    let entry = fixture.entry(".testrc");
    let mut syncer = fixture.syncer()?;

    let outcome = syncer.sync_one(&entry)?;

    assert_eq!(outcome, SyncOutcome::Recreated);
    assert_eq!(fs::read_to_string(&entry.system_path)?, "preserved");
    assert!(fixture.snapshots_for(&entry)?.is_empty());

    Ok(())
}

#[test]
fn neither_side_existing_fails_and_mutates_nothing() -> Result<()> {
    let fixture = StoreFixture::new()?;
    let entry = fixture.entry(".testrc");
    let mut syncer = fixture.syncer()?;

    let result = syncer.sync_one(&entry);

    assert!(matches!(result, Err(SyncError::NeitherPathExists { .. })));
    assert!(fs::symlink_metadata(&entry.system_path).is_err());
    assert!(fs::symlink_metadata(&entry.store_path).is_err());

    Ok(())
}

#[test]
fn same_day_resync_skips_second_snapshot() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_home(".testrc", "first")?;
    let entry = fixture.entry(".testrc");
    let mut syncer = fixture.syncer()?;
    syncer.sync_one(&entry)?;

    // Entry drifts again the same day: link clobbered by a fresh file.
    fs::remove_file(&entry.system_path)?;
    fixture.write_home(".testrc", "second")?;

    let outcome = syncer.sync_one(&entry)?;

    assert_eq!(outcome, SyncOutcome::Migrated { backed_up: false });
    assert_eq!(fs::read_to_string(&entry.store_path)?, "second");
    assert_eq!(fixture.snapshots_for(&entry)?.len(), 1);

    Ok(())
}

#[cfg(unix)]
#[test]
fn migration_follows_symlinked_system_path_to_real_content() -> Result<()> {
    let fixture = StoreFixture::new()?;
    let real = fixture.write_home("real.conf", "real stuff")?;
    let entry = fixture.entry(".testrc");
    std::os::unix::fs::symlink(&real, &entry.system_path)?;
    let mut syncer = fixture.syncer()?;

    let outcome = syncer.sync_one(&entry)?;

    assert_eq!(outcome, SyncOutcome::Migrated { backed_up: true });
    assert_eq!(fs::read_to_string(&entry.store_path)?, "real stuff");
    assert!(!real.exists());
    assert!(link::is_correct(&entry.store_path, &entry.system_path));

    Ok(())
}

#[test]
fn directory_entries_migrate_recursively() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_home(".config/nvim/init.lua", "-- init")?;
    fixture.write_home(".config/nvim/colors.lua", "-- colors")?;
    let entry = fixture.entry(".config/nvim");
    let mut syncer = fixture.syncer()?;

    let outcome = syncer.sync_one(&entry)?;

    assert_eq!(outcome, SyncOutcome::Migrated { backed_up: true });
    assert_eq!(
        fs::read_to_string(entry.store_path.join("init.lua"))?,
        "-- init"
    );
    assert!(fs::symlink_metadata(&entry.system_path)?
        .file_type()
        .is_symlink());
    assert_eq!(
        fs::read_to_string(entry.system_path.join("colors.lua"))?,
        "-- colors"
    );

    let snapshots = fixture.snapshots_for(&entry)?;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        fs::read_to_string(snapshots[0].content_path.join("init.lua"))?,
        "-- init"
    );

    Ok(())
}

#[test]
fn batch_continues_past_failing_entries() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_home(".testrc", "hello")?;
    let missing = fixture.entry(".does-not-exist");
    let good = fixture.entry(".testrc");
    let mut syncer = fixture.syncer()?;

    let results = syncer.sync_all([&missing, &good]);

    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[0].1,
        Err(SyncError::NeitherPathExists { .. })
    ));
    assert!(results[1].1.is_ok());
    assert!(link::is_correct(&good.store_path, &good.system_path));

    Ok(())
}
