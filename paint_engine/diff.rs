/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tile-level diffing between two view states (spec.md §4.7). `CanvasDiff`
//! is a reusable scratch object, the same idiom as `compositing_traits`'s
//! dirty-rect bookkeeping: its changed-tile set is cleared and refilled on
//! every tick rather than reallocated.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use paint_traits::LayerId;

use crate::canvas_state::{CanvasState, LayerNode, TileContent};

fn flatten_content<'a>(
    nodes: &'a [LayerNode],
    out: &mut FxHashMap<LayerId, &'a Arc<TileContent>>,
) {
    for node in nodes {
        match node {
            LayerNode::Content { id, tiles } => {
                out.insert(*id, tiles);
            }
            LayerNode::Group { children, .. } => flatten_content(children, out),
        }
    }
}

fn diff_tile_maps(prev: &TileContent, new: &TileContent, changed: &mut Vec<(u32, u32)>) {
    for (coord, new_tile) in new {
        match prev.get(coord) {
            Some(prev_tile) if prev_tile == new_tile => {}
            _ => changed.push(*coord),
        }
    }
    for coord in prev.keys() {
        if !new.contains_key(coord) {
            changed.push(*coord);
        }
    }
}

/// Everything the engine needs to know changed between two successive view
/// states, as computed in `tick()` (spec.md §4.7).
pub struct CanvasDiff {
    resized: bool,
    changed_tiles: Vec<(u32, u32)>,
    layer_props_changed: bool,
    annotations_changed: bool,
    metadata_changed: bool,
    timeline_changed: bool,
}

impl CanvasDiff {
    pub fn new() -> Self {
        CanvasDiff {
            resized: false,
            changed_tiles: Vec::new(),
            layer_props_changed: false,
            annotations_changed: false,
            metadata_changed: false,
            timeline_changed: false,
        }
    }

    /// Recomputes every field against `prev`/`new`, reusing this diff's
    /// internal buffers (spec.md §4.7 steps 1-4).
    pub fn compute(&mut self, prev: &CanvasState, new: &CanvasState) {
        self.changed_tiles.clear();

        self.resized = prev.width() != new.width() || prev.height() != new.height();

        let mut prev_content = FxHashMap::default();
        flatten_content(prev.layers(), &mut prev_content);
        let mut new_content = FxHashMap::default();
        flatten_content(new.layers(), &mut new_content);

        for (id, new_tiles) in &new_content {
            match prev_content.get(id) {
                Some(prev_tiles) if Arc::ptr_eq(prev_tiles, new_tiles) => {}
                Some(prev_tiles) => diff_tile_maps(prev_tiles, new_tiles, &mut self.changed_tiles),
                None => self.changed_tiles.extend(new_tiles.keys().copied()),
            }
        }
        for (id, prev_tiles) in &prev_content {
            if !new_content.contains_key(id) {
                self.changed_tiles.extend(prev_tiles.keys().copied());
            }
        }

        // Pointer equality is an acceptable proxy for value equality here:
        // every write path replaces these roots wholesale rather than
        // mutating them in place (spec.md §3, §4.7 point 4).
        self.layer_props_changed = !Arc::ptr_eq(prev.layer_props(), new.layer_props());
        self.annotations_changed = !Arc::ptr_eq(prev.annotations(), new.annotations());
        self.metadata_changed = !Arc::ptr_eq(prev.metadata(), new.metadata());
        self.timeline_changed = !Arc::ptr_eq(prev.timeline(), new.timeline());
    }

    pub fn resized(&self) -> bool {
        self.resized
    }

    pub fn changed_tiles(&self) -> &[(u32, u32)] {
        &self.changed_tiles
    }

    pub fn layer_props_changed(&self) -> bool {
        self.layer_props_changed
    }

    pub fn annotations_changed(&self) -> bool {
        self.annotations_changed
    }

    pub fn metadata_changed(&self) -> bool {
        self.metadata_changed
    }

    pub fn timeline_changed(&self) -> bool {
        self.timeline_changed
    }
}

impl Default for CanvasDiff {
    fn default() -> Self {
        CanvasDiff::new()
    }
}
