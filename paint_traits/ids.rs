/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Id newtypes shared across the intake, history, and rendering boundary.

/// Identifies a connected user (local or remote) whose drawing commands and
/// cursor/laser presence are tracked by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u32);

/// Identifies the authoring context of a drawing operation. Distinct from
/// `UserId` because a single user session may paint through more than one
/// context (e.g. a brush context versus a laser-pointer context). Bounded to
/// 256 live values at any time by the meta buffers (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub u8);

impl ContextId {
    pub const MAX_COUNT: usize = 256;

    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// Identifies a layer (content or group) within a canvas state's layer tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub i32);

impl LayerId {
    /// Synthetic id used by the inspect overlay for its injected censor
    /// sublayer (spec.md §4.6).
    pub const INSPECT_OVERLAY: LayerId = LayerId(-200);
}

/// Identifies an annotation attached to the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnnotationId(pub i32);
