/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Callback seams into the presentation layer (spec.md §1's "UI/presentation
//! consumer", out of scope). Trait objects rather than closures: intake,
//! tick, and render each call back from different threads and at different
//! points in their own lifecycle, and a concrete host type typically wants
//! to implement all three against shared state.

use crate::acl::AclChangeFlags;
use crate::ids::{ContextId, LayerId};
use crate::messages::Rgba8;

/// Delivered synchronously at the end of `handle_inc` (spec.md §4.1).
pub trait IntakeCallbacks {
    fn acls_changed(&mut self, _flags: AclChangeFlags) {}
    fn laser_trail(&mut self, _ctx: ContextId, _persistence: u8, _color: Rgba8) {}
    fn move_pointer(&mut self, _ctx: ContextId, _x: f64, _y: f64) {}
    fn default_layer_set(&mut self, _layer: LayerId) {}
}

/// Delivered from `tick` (spec.md §4.5, §4.7), always on the frame thread.
pub trait TickCallbacks {
    fn catchup(&mut self, _progress: u32) {}
    fn resized(&mut self, _dx: i32, _dy: i32, _prev_w: u32, _prev_h: u32) {}
    fn tile_changed(&mut self, _x: u32, _y: u32) {}
    fn layer_props_changed(&mut self) {}
    fn annotations_changed(&mut self) {}
    fn document_metadata_changed(&mut self) {}
    fn timeline_changed(&mut self) {}
    fn cursor_moved(&mut self, _ctx: ContextId, _layer: LayerId, _x: f64, _y: f64) {}
}

/// Delivered from render worker threads (spec.md §4.8). May be invoked from
/// any worker thread concurrently with other tiles' callbacks; the only
/// synchronization guarantee is that two calls never share a scratch
/// buffer (each carries its own `tid`-indexed slice).
pub trait RenderCallbacks: Send + Sync {
    fn render_size(&self, _width: u32, _height: u32) {}
    fn tile_rendered(&self, x: u32, y: u32, pixels: &[Rgba8], tid: usize);
}
