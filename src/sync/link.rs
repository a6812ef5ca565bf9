// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link verification.
//!
//! Decide whether a system path currently is the correct symlink to its
//! expected store location. The check is derived fresh on every call, and is
//! never cached or persisted anywhere.
//!
//! # Known Limitation
//!
//! Comparison is exact equality of the resolved link target against the
//! expected store path. A symlink pointing to an equivalent but differently
//! spelled path, e.g. one that takes a detour through `..`, is treated as
//! incorrect. The sync operation converges such links to the canonical
//! spelling instead of trying to prove them equivalent.

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Check whether a system path is the correct link to its store location.
///
/// False if the system path is missing entirely, or exists as anything other
/// than a symlink. Otherwise the link target is read back, resolved against
/// the link's own parent directory when relative, and compared for exact
/// equality against the store path.
///
/// Inspects the link itself rather than what it points at, so a dangling
/// symlink is still examined instead of being mistaken for a missing path.
pub fn is_correct(store_path: impl AsRef<Path>, system_path: impl AsRef<Path>) -> bool {
    let system_path = system_path.as_ref();
    let metadata = match fs::symlink_metadata(system_path) {
        Ok(metadata) => metadata,
        Err(_) => return false,
    };

    if !metadata.file_type().is_symlink() {
        return false;
    }

    let target = match fs::read_link(system_path) {
        Ok(target) => target,
        Err(_) => return false,
    };

    resolve_target(system_path, target) == store_path.as_ref()
}

/// Resolve a link target against the directory holding the link.
///
/// Absolute targets stand on their own. Relative targets are interpreted the
/// way the OS interprets them when following the link.
fn resolve_target(system_path: &Path, target: PathBuf) -> PathBuf {
    if target.is_absolute() {
        return target;
    }

    match system_path.parent() {
        Some(parent) => parent.join(target),
        None => target,
    }
}
