// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! End-to-end scenarios for enumeration, audit, and bulk repair.

use crate::StoreFixture;

use dotstash::{config::OsFamily, sync::SyncOutcome};

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn fresh_machine_bulk_repair_recreates_every_link() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_store("__home__/.vimrc", "vim config")?;
    fixture.write_store("__home__/.config/nvim/init.lua", "-- init")?;
    let store = fixture.store();
    let mut syncer = fixture.syncer()?;

    // Freshly cloned store: everything enumerates, nothing is linked yet.
    let report = store.check_all(store.enumerate_managed()?);
    assert!(report.correct.is_empty());
    assert_eq!(report.incorrect.len(), 2);

    let results = syncer.sync_all(&report.incorrect);
    for (_, result) in &results {
        assert_eq!(*result.as_ref().unwrap(), SyncOutcome::Recreated);
    }

    let report = store.check_all(store.enumerate_managed()?);
    assert_eq!(report.correct.len(), 2);
    assert!(report.incorrect.is_empty());
    assert_eq!(
        fs::read_to_string(fixture.home().join(".vimrc"))?,
        "vim config"
    );

    Ok(())
}

#[test]
fn managed_entries_survive_store_round_trip() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_home(".zshrc", "zsh config")?;
    let entry = fixture.entry(".zshrc");
    let mut syncer = fixture.syncer()?;
    syncer.sync_one(&entry)?;

    let enumerated = fixture.store().enumerate_managed()?;

    assert_eq!(enumerated, vec![entry]);

    Ok(())
}

#[test]
fn discovery_excludes_entries_once_adopted() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.write_home(".vimrc", "vim config")?;
    let store = fixture.store();
    let catalog = format!(
        r#"
        [[suggestion]]
        name = "vim"
        linux = ["{home}/.vimrc"]
        macos = ["{home}/.vimrc"]
        "#,
        home = fixture.home().display()
    )
    .parse()?;
    let os_family = OsFamily::current().unwrap_or(OsFamily::Linux);

    let candidates = store.discover_candidates(&catalog, os_family)?;
    assert_eq!(candidates.len(), 1);

    let mut syncer = fixture.syncer()?;
    syncer.sync_one(&fixture.entry(".vimrc"))?;

    let candidates = store.discover_candidates(&catalog, os_family)?;
    assert!(candidates.is_empty());

    Ok(())
}
