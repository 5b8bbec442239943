/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Shared types at the boundary between the paint engine and its external
//! collaborators: the wire codec, the ACL policy evaluator, and the
//! presentation layer. None of those collaborators are implemented here —
//! only the traits and plain data they exchange with `paint_engine`.

pub mod acl;
pub mod callbacks;
pub mod ids;
pub mod messages;

pub use acl::{AclChangeFlags, AclPolicy, PermissiveAcl};
pub use callbacks::{IntakeCallbacks, RenderCallbacks, TickCallbacks};
pub use ids::{AnnotationId, ContextId, LayerId, UserId};
pub use messages::{CanvasCommand, ControlRequest, Dab, DabSize, DrawDabs, IncomingMessage, Rgba8};

/// Fixed square tile edge length, in pixels, used by both the diff module and
/// the tile renderer. Owned here because it is the one piece of "tile pixel
/// format" information (per spec.md §1, out of scope in its generality) that
/// both collaborating crates must agree on.
pub const TILE_SIZE: u32 = 64;
