// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotstash core engine.
//!
//! Dotstash manages a user's configuration files by relocating their real
//! content into a single managed store, and replacing the original
//! locations with symlinks. The store can then be version-controlled while
//! the rest of the system keeps reading its configuration unmodified.
//!
//! # Engine Components
//!
//! - [`path`] translates between real system paths and their canonical
//!   locations inside the store, in both directions, without loss.
//! - [`sync::link`] decides whether a system path currently is the correct
//!   link to its store location.
//! - [`sync::backup`] snapshots content before any mutating operation and
//!   enforces the retention policy that bounds snapshot history.
//! - [`sync`] drives a managed entry to the converged linked state without
//!   ever losing content.
//! - [`store`] derives the set of managed entries by walking the store
//!   tree, audits their link state, and discovers well-known candidate
//!   paths not yet under management.
//! - [`config`] specifies the layout of every configuration file the tool
//!   reads or writes; file I/O stays with the caller.
//!
//! All operations are synchronous, single-threaded, and explicit. One
//! invocation performs one logical operation or one batch loop; there is no
//! background process and no cross-process locking to worry about.

pub mod config;
pub mod path;
pub mod store;
pub mod sync;
