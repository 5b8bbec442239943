/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Local view projection (spec.md §3, §4.6): view-mode, hidden-layer list,
//! censor reveal, and the projected-layer-props cache, all owned
//! exclusively by the tick/frame thread.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use paint_traits::{ContextId, LayerId};

use crate::canvas_state::{CanvasState, LayerPropsList, LayerPropsNode};

/// spec.md §4.6. `Frame` and `OnionSkin` are recognized by the
/// invalidation logic but the projection walker defers to `Normal`
/// behavior (spec.md §9's Open Question: "a stub returning normal
/// projection and a hook point for the future per-frame filter").
/// TODO: once per-frame filtering is specified, give `Frame`/`OnionSkin`
/// their own arm in `project_node` keyed on `active_frame_index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Normal,
    Solo,
    Frame,
    OnionSkin,
}

/// How many distinct projections to remember per committed root (invariant
/// 8: toggling a setting back and forth must restore the same `Arc`, even
/// with other toggles happening in between, not just the immediately prior
/// one).
const RECENT_PROJECTIONS_CAP: usize = 8;

/// Owned exclusively by the frame thread (spec.md §5). Not `Send`/`Sync`
/// by convention of single-threaded access, enforced by the engine never
/// handing a reference to it across threads.
pub struct LocalViewState {
    pub active_layer_id: LayerId,
    pub active_frame_index: u32,
    pub view_mode: ViewMode,
    pub reveal_censored: bool,
    pub inspect_context_id: Option<ContextId>,
    pub hidden_layer_ids: FxHashSet<LayerId>,
    /// True when a local-view setting changed since the last `apply`
    /// (spec.md §4.5 step 4), forcing a recompute even if the committed
    /// root is unchanged.
    dirty: bool,
    /// The committed root `apply` last ran against. Cleared independently
    /// of `dirty` so a settings-only toggle doesn't throw away `recent`.
    cached_for_root: Option<LayerPropsList>,
    /// Distinct projections computed for `cached_for_root`, most recent
    /// last, so restoring an earlier settings combination reuses its Arc
    /// instead of minting a new one.
    recent: Vec<LayerPropsList>,
}

impl LocalViewState {
    pub fn new() -> Self {
        LocalViewState {
            active_layer_id: LayerId(0),
            active_frame_index: 0,
            view_mode: ViewMode::Normal,
            reveal_censored: false,
            inspect_context_id: None,
            hidden_layer_ids: FxHashSet::default(),
            dirty: true,
            cached_for_root: None,
            recent: Vec::new(),
        }
    }

    fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn set_active_layer_id(&mut self, id: LayerId) {
        if self.active_layer_id != id {
            self.active_layer_id = id;
            self.invalidate();
        }
    }

    pub fn set_active_frame_index(&mut self, index: u32) {
        if self.active_frame_index != index {
            self.active_frame_index = index;
            self.invalidate();
        }
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.view_mode != mode {
            self.view_mode = mode;
            self.invalidate();
        }
    }

    pub fn set_reveal_censored(&mut self, reveal: bool) {
        if self.reveal_censored != reveal {
            self.reveal_censored = reveal;
            self.invalidate();
        }
    }

    pub fn set_inspect_context_id(&mut self, id: Option<ContextId>) {
        if self.inspect_context_id != id {
            self.inspect_context_id = id;
            self.invalidate();
        }
    }

    pub fn set_layer_hidden(&mut self, id: LayerId, hidden: bool) {
        let changed = if hidden {
            self.hidden_layer_ids.insert(id)
        } else {
            self.hidden_layer_ids.remove(&id)
        };
        if changed {
            self.invalidate();
        }
    }

    /// True iff a local-view mutation invalidated the cache since the last
    /// successful projection (spec.md §4.5 step 4).
    pub fn changed_since_last_tick(&self) -> bool {
        self.dirty
    }

    /// Applies view-mode visibility, censor reveal, and explicit
    /// user-hidden ids to `cs`'s root layer-props list (spec.md §4.6).
    pub fn apply(&mut self, cs: &CanvasState) -> LayerPropsList {
        let committed_root = cs.layer_props();
        let root_unchanged = self
            .cached_for_root
            .as_ref()
            .is_some_and(|cached| Arc::ptr_eq(cached, committed_root));

        if root_unchanged && !self.dirty {
            // Fast path: neither the committed root nor any local-view
            // setting changed since the last projection.
            return self
                .recent
                .last()
                .cloned()
                .expect("cached_for_root is only set alongside a recent projection");
        }

        if !root_unchanged {
            // A genuinely new committed root invalidates every cached
            // projection; they were all computed against the old one.
            self.recent.clear();
        }

        let mut matched_hidden_ids = FxHashSet::default();
        let mut path = Vec::new();
        let new_root: Vec<LayerPropsNode> = committed_root
            .iter()
            .enumerate()
            .map(|(i, node)| {
                path.push(i);
                let projected = self.project_node(node, &mut path, &mut matched_hidden_ids);
                path.pop();
                projected
            })
            .collect();

        // Prune stale hidden-layer ids that no longer resolve to a layer
        // (spec.md §4.6).
        self.hidden_layer_ids = matched_hidden_ids;

        // Invariant 8: toggling a setting back and forth must restore a
        // pointer-equal projection. Checking every recently computed
        // projection (not just the immediately prior one) means a toggle
        // sandwiched between other changes still restores the same Arc.
        let result = match self.recent.iter().find(|prev| prev.as_slice() == new_root.as_slice()) {
            Some(prev) => prev.clone(),
            None => {
                let arc: LayerPropsList = Arc::new(new_root);
                self.recent.push(arc.clone());
                if self.recent.len() > RECENT_PROJECTIONS_CAP {
                    self.recent.remove(0);
                }
                arc
            }
        };

        self.cached_for_root = Some(committed_root.clone());
        self.dirty = false;
        result
    }

    fn project_node(
        &self,
        node: &LayerPropsNode,
        path: &mut Vec<usize>,
        matched_hidden_ids: &mut FxHashSet<LayerId>,
    ) -> LayerPropsNode {
        let is_group = !node.children.is_empty() || node.origin_context.is_none() && node.opacity == 0;
        let _ = is_group; // path/is_group retained for readability of the recursion shape

        let mut hidden_by_view_mode = match self.view_mode {
            ViewMode::Normal | ViewMode::Frame | ViewMode::OnionSkin => false,
            ViewMode::Solo => node.children.is_empty() && node.id != self.active_layer_id,
        };

        if self.hidden_layer_ids.contains(&node.id) {
            hidden_by_view_mode = true;
            matched_hidden_ids.insert(node.id);
        }

        let censored = if self.reveal_censored {
            false
        } else {
            node.censored
        };

        let children: Vec<LayerPropsNode> = node
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                path.push(i);
                let projected = self.project_node(child, path, matched_hidden_ids);
                path.pop();
                projected
            })
            .collect();

        LayerPropsNode {
            id: node.id,
            opacity: node.opacity,
            blend_mode: node.blend_mode,
            hidden_by_view_mode,
            censored,
            origin_context: node.origin_context,
            children,
        }
    }
}

impl Default for LocalViewState {
    fn default() -> Self {
        LocalViewState::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::canvas_state::CanvasStateInner;

    fn layer(id: i32) -> LayerPropsNode {
        LayerPropsNode {
            id: LayerId(id),
            opacity: 32768,
            blend_mode: 0,
            hidden_by_view_mode: false,
            censored: false,
            origin_context: None,
            children: vec![],
        }
    }

    fn three_layer_canvas() -> CanvasState {
        let mut inner = CanvasStateInner::empty(10, 10);
        inner.layer_props = Arc::new(vec![layer(1), layer(2), layer(3)]);
        CanvasState::new(inner)
    }

    #[test]
    fn solo_mode_hides_every_layer_but_the_active_one() {
        // S5: layers {1,2,3}, solo on 2 -> 1 and 3 hidden, 2 not.
        let cs = three_layer_canvas();
        let mut view = LocalViewState::new();
        view.set_view_mode(ViewMode::Solo);
        view.set_active_layer_id(LayerId(2));

        let projected = view.apply(&cs);
        assert!(projected[0].hidden_by_view_mode);
        assert!(!projected[1].hidden_by_view_mode);
        assert!(projected[2].hidden_by_view_mode);
    }

    #[test]
    fn fast_path_reuses_projection_when_root_is_unchanged() {
        let cs = three_layer_canvas();
        let mut view = LocalViewState::new();
        let first = view.apply(&cs);
        let second = view.apply(&cs);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn toggling_visibility_back_restores_a_pointer_equal_projection() {
        // Invariant 8.
        let cs = three_layer_canvas();
        let mut view = LocalViewState::new();
        let baseline = view.apply(&cs);

        view.set_layer_hidden(LayerId(1), true);
        view.apply(&cs);
        view.set_layer_hidden(LayerId(1), false);
        let restored = view.apply(&cs);

        assert!(Arc::ptr_eq(&baseline, &restored));
    }

    #[test]
    fn stale_hidden_ids_are_pruned() {
        let cs = three_layer_canvas();
        let mut view = LocalViewState::new();
        view.set_layer_hidden(LayerId(99), true);
        view.apply(&cs);
        assert!(!view.hidden_layer_ids.contains(&LayerId(99)));
    }
}
