/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-call aggregation of non-drawing user-presence messages (spec.md §3,
//! §4.1): ACL change flags, laser-trail updates, cursor moves, and the
//! default-layer setting. `FxHashMap` and `SmallVec` here mirror
//! `painter.rs`'s use of the same crates for per-context bookkeeping.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use paint_traits::{AclChangeFlags, ContextId, IntakeCallbacks, LayerId, Rgba8};

/// First-seen-order, at-most-once-per-context aggregation (spec.md §4.1's
/// folding rules): the first occurrence of a context id in a batch appends
/// it to a dense list; later occurrences only overwrite the stored value.
pub(crate) struct Aggregator<T> {
    active: Box<[bool; ContextId::MAX_COUNT]>,
    order: SmallVec<[ContextId; 8]>,
    values: FxHashMap<ContextId, T>,
}

impl<T> Aggregator<T> {
    pub(crate) fn new() -> Self {
        Aggregator {
            active: Box::new([false; ContextId::MAX_COUNT]),
            order: SmallVec::new(),
            values: FxHashMap::default(),
        }
    }

    pub(crate) fn record(&mut self, ctx: ContextId, value: T) {
        let idx = ctx.as_index();
        if !self.active[idx] {
            self.active[idx] = true;
            self.order.push(ctx);
        }
        self.values.insert(ctx, value);
    }

    /// Removes and returns every aggregated entry, in first-seen order,
    /// each with its most recently recorded value.
    pub(crate) fn take(&mut self) -> Vec<(ContextId, T)> {
        let mut out = Vec::with_capacity(self.order.len());
        for ctx in self.order.drain(..) {
            self.active[ctx.as_index()] = false;
            if let Some(value) = self.values.remove(&ctx) {
                out.push((ctx, value));
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug)]
struct LaserUpdate {
    persistence: u8,
    color: Rgba8,
}

/// Scratch state accumulated across one `handle_inc` call and flushed to
/// the caller's callbacks at its end (spec.md §3's Meta Buffers, §4.1).
pub struct MetaBuffers {
    acl_flags: AclChangeFlags,
    laser: Aggregator<LaserUpdate>,
    cursors: Aggregator<(f64, f64)>,
    default_layer: Option<LayerId>,
}

impl MetaBuffers {
    pub fn new() -> Self {
        MetaBuffers {
            acl_flags: AclChangeFlags::empty(),
            laser: Aggregator::new(),
            cursors: Aggregator::new(),
            default_layer: None,
        }
    }

    pub fn record_acl_flags(&mut self, flags: AclChangeFlags) {
        self.acl_flags |= flags;
    }

    pub fn record_laser_trail(&mut self, ctx: ContextId, persistence: u8, color: Rgba8) {
        self.laser.record(ctx, LaserUpdate { persistence, color });
    }

    pub fn record_cursor(&mut self, ctx: ContextId, x: f64, y: f64) {
        self.cursors.record(ctx, (x, y));
    }

    /// Last-write-wins within the batch (spec.md §4.1).
    pub fn set_default_layer(&mut self, layer: LayerId) {
        self.default_layer = Some(layer);
    }

    /// Delivers and clears every pending aggregate (spec.md §4.1's "After
    /// the push phase" step).
    pub fn flush(&mut self, callbacks: &mut dyn IntakeCallbacks) {
        if !self.acl_flags.is_empty() {
            callbacks.acls_changed(self.acl_flags);
            self.acl_flags = AclChangeFlags::empty();
        }
        for (ctx, update) in self.laser.take() {
            callbacks.laser_trail(ctx, update.persistence, update.color);
        }
        for (ctx, (x, y)) in self.cursors.take() {
            callbacks.move_pointer(ctx, x, y);
        }
        if let Some(layer) = self.default_layer.take() {
            callbacks.default_layer_set(layer);
        }
    }
}

impl Default for MetaBuffers {
    fn default() -> Self {
        MetaBuffers::new()
    }
}
