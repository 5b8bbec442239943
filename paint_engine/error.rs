/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Error taxonomy (spec.md §7). No `thiserror`/`anyhow` dependency appears
//! anywhere in the teacher's workspace manifest, so `PaintError` follows the
//! manual-impl style seen in e.g. `hashglobe::FailedAllocationError`.
//! *Invalid input* and *resource exhaustion* are not represented here —
//! per §7 those remain `assert!`/allocation-failure traps, not recoverable
//! results.

use std::fmt;

/// A recoverable failure from a fallible engine operation.
#[derive(Debug)]
pub enum PaintError {
    /// A command could not be applied to the current history state
    /// (spec.md §7's "malformed command for current history state").
    HistoryApply(String),
    /// A snapshot save-point request failed.
    SnapshotRequest(String),
}

impl fmt::Display for PaintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaintError::HistoryApply(reason) => write!(f, "history apply failed: {reason}"),
            PaintError::SnapshotRequest(reason) => write!(f, "snapshot request failed: {reason}"),
        }
    }
}

impl std::error::Error for PaintError {}
