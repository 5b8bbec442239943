/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The per-frame tick (spec.md §4.5): the only place preview, the inspect
//! overlay, and local-view projection are layered atop committed state,
//! and the only place a `CanvasDiff` is computed and delivered.

use std::sync::Arc;

use paint_traits::{ContextId, LayerId, TickCallbacks};

use crate::canvas_state::{CanvasState, LayerNode, LayerPropsNode, TileContent, TransientCanvasState};
use crate::diff::CanvasDiff;
use crate::history::PublishedCanvas;
use crate::local_view::LocalViewState;
use crate::meta::Aggregator;
use crate::preview::{Handoff, Preview};
use crate::renderer::FULL_OPACITY_15;

fn preview_ptr_eq(a: &Option<Arc<Preview>>, b: &Option<Arc<Preview>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Injects a censored, contentless marker layer at `LayerId::INSPECT_OVERLAY`
/// when a context is being inspected (spec.md §4.6). Appended to both the
/// layer tree and the props tree in lockstep so `composite_layers`'
/// position-paired zip stays aligned.
fn apply_inspect(view: CanvasState, inspect_context: Option<ContextId>) -> CanvasState {
    let Some(ctx) = inspect_context else {
        return view;
    };

    let mut transient = TransientCanvasState::get_or_make_transient(view);
    let mut layers = (*transient.inner().layers).clone();
    layers.push(LayerNode::Content {
        id: LayerId::INSPECT_OVERLAY,
        tiles: Arc::new(TileContent::new()),
    });
    let mut props = (*transient.inner().layer_props).clone();
    props.push(LayerPropsNode {
        id: LayerId::INSPECT_OVERLAY,
        opacity: FULL_OPACITY_15,
        blend_mode: 0,
        hidden_by_view_mode: false,
        censored: true,
        origin_context: Some(ctx),
        children: Vec::new(),
    });
    transient.set_layers(layers);
    transient.set_layer_props(props);
    transient.publish()
}

/// Owned exclusively by the frame thread (spec.md §5): the last committed
/// state it observed, the last preview it rendered, the last fully
/// projected view it diffed from, and the local-view/diff scratch state.
pub struct Tick {
    published: PublishedCanvas,
    handoff: Arc<Handoff>,
    last_committed: CanvasState,
    last_preview: Option<Arc<Preview>>,
    prev_view: CanvasState,
    local_view: LocalViewState,
    diff: CanvasDiff,
    cursors: Aggregator<(LayerId, f64, f64)>,
}

impl Tick {
    pub fn new(published: PublishedCanvas, handoff: Arc<Handoff>) -> Self {
        let initial = published.get();
        let mut tick = Tick {
            published,
            handoff,
            last_committed: initial.clone(),
            last_preview: None,
            prev_view: initial.clone(),
            local_view: LocalViewState::new(),
            diff: CanvasDiff::new(),
            cursors: Aggregator::new(),
        };
        // Settle the initial projection up front, the same projection `run`
        // would otherwise be forced to build on its first call just because
        // `LocalViewState` starts dirty. Without this, the first `run`
        // compares an unprojected committed root against a freshly
        // projected one and reports a spurious `layer_props_changed` even
        // when nothing has actually happened yet.
        tick.prev_view = tick.rebuild_view(&initial, None);
        tick
    }

    pub fn local_view(&mut self) -> &mut LocalViewState {
        &mut self.local_view
    }

    /// The last fully projected view this tick computed — preview, inspect
    /// overlay, and local-view filtering already applied (spec.md §4.8's
    /// rendering input).
    pub fn current_view(&self) -> CanvasState {
        self.prev_view.clone()
    }

    /// Records a context's most recent drawing position for this tick's
    /// batch of `cursor_moved` deliveries (spec.md §4.5 step 5), at most
    /// one per context per tick, last value wins.
    pub fn record_cursor(&mut self, ctx: ContextId, layer: LayerId, x: f64, y: f64) {
        self.cursors.record(ctx, (layer, x, y));
    }

    /// Runs the five strictly-ordered steps (spec.md §4.5): catch-up
    /// delivery, compare-and-get, preview swap, local-view-changed check,
    /// and a conditional view-state rebuild with diff emission.
    pub fn run(&mut self, callbacks: &mut dyn TickCallbacks) {
        if let Some(progress) = self.handoff.take_catchup() {
            callbacks.catchup(progress);
        }

        let fresh_committed = self.published.compare_and_get(&self.last_committed);
        let committed_changed = fresh_committed.is_some();
        let committed = fresh_committed.unwrap_or_else(|| self.last_committed.clone());
        if committed_changed {
            self.last_committed = committed.clone();
        }

        let current_preview = self.handoff.current_preview();
        let preview_changed = !preview_ptr_eq(&current_preview, &self.last_preview);
        self.last_preview = current_preview.clone();

        let local_view_changed = self.local_view.changed_since_last_tick();

        if committed_changed || preview_changed || local_view_changed {
            let prev_view = self.prev_view.clone();
            let new_view = self.rebuild_view(&committed, current_preview);
            self.diff.compute(&prev_view, &new_view);
            self.emit_diff(&prev_view, callbacks);
            self.prev_view = new_view;
        }

        for (ctx, (layer, x, y)) in self.cursors.take() {
            callbacks.cursor_moved(ctx, layer, x, y);
        }
    }

    fn rebuild_view(&mut self, committed: &CanvasState, preview: Option<Arc<Preview>>) -> CanvasState {
        let mut view = match preview {
            Some(preview) => preview.render(committed),
            None => committed.clone(),
        };
        view = apply_inspect(view, self.local_view.inspect_context_id);

        let projected_props = self.local_view.apply(&view);
        let mut transient = TransientCanvasState::get_or_make_transient(view);
        transient.inner_mut().layer_props = projected_props;
        transient.publish()
    }

    fn emit_diff(&self, prev_view: &CanvasState, callbacks: &mut dyn TickCallbacks) {
        if self.diff.resized() {
            let (prev_x, prev_y) = prev_view.offset();
            let (new_x, new_y) = self.prev_view.offset();
            callbacks.resized(new_x - prev_x, new_y - prev_y, prev_view.width(), prev_view.height());
        }
        for &(x, y) in self.diff.changed_tiles() {
            callbacks.tile_changed(x, y);
        }
        if self.diff.layer_props_changed() {
            callbacks.layer_props_changed();
        }
        if self.diff.annotations_changed() {
            callbacks.annotations_changed();
        }
        if self.diff.metadata_changed() {
            callbacks.document_metadata_changed();
        }
        if self.diff.timeline_changed() {
            callbacks.timeline_changed();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::history::{CanvasHistory, SavePointCallback};
    use crate::local_view::ViewMode;
    use paint_traits::UserId;

    #[derive(Default)]
    struct RecordingCallbacks {
        tile_changed_calls: usize,
        layer_props_changed_calls: usize,
        catchup_calls: Vec<u32>,
        cursor_calls: Vec<(ContextId, LayerId)>,
    }

    impl TickCallbacks for RecordingCallbacks {
        fn catchup(&mut self, progress: u32) {
            self.catchup_calls.push(progress);
        }
        fn tile_changed(&mut self, _x: u32, _y: u32) {
            self.tile_changed_calls += 1;
        }
        fn layer_props_changed(&mut self) {
            self.layer_props_changed_calls += 1;
        }
        fn cursor_moved(&mut self, ctx: ContextId, layer: LayerId, _x: f64, _y: f64) {
            self.cursor_calls.push((ctx, layer));
        }
    }

    fn history_and_tick() -> (CanvasHistory, Tick) {
        let initial = CanvasState::empty(64, 64);
        let cb: SavePointCallback = Box::new(|_, _, _| {});
        let history = CanvasHistory::new(initial, cb, UserId(0));
        let handoff = Arc::new(Handoff::new());
        let tick = Tick::new(history.published_handle(), handoff);
        (history, tick)
    }

    #[test]
    fn a_tick_with_nothing_changed_emits_no_callbacks() {
        let (_history, mut tick) = history_and_tick();
        let mut cb = RecordingCallbacks::default();
        tick.run(&mut cb);
        assert_eq!(cb.tile_changed_calls, 0);
        assert_eq!(cb.layer_props_changed_calls, 0);
    }

    #[test]
    fn local_view_mutation_alone_triggers_a_rebuild() {
        let (_history, mut tick) = history_and_tick();
        let mut cb = RecordingCallbacks::default();
        tick.run(&mut cb); // settle the initial state

        tick.local_view().set_view_mode(ViewMode::Solo);
        tick.run(&mut cb);
        // No layer content exists yet, so no tiles changed, but the run
        // must not have early-exited (observable via no panic and a
        // consistent internal state on the next call).
        tick.run(&mut cb);
        assert_eq!(cb.tile_changed_calls, 0);
    }

    #[test]
    fn catchup_progress_is_delivered_once() {
        let (_history, mut tick) = history_and_tick();
        tick.handoff.set_catchup(42);
        let mut cb = RecordingCallbacks::default();
        tick.run(&mut cb);
        tick.run(&mut cb);
        assert_eq!(cb.catchup_calls, vec![42]);
    }

    #[test]
    fn aggregated_cursors_are_delivered_at_most_once_per_context() {
        let (_history, mut tick) = history_and_tick();
        tick.record_cursor(ContextId(1), LayerId(5), 1.0, 1.0);
        tick.record_cursor(ContextId(1), LayerId(5), 2.0, 2.0);
        let mut cb = RecordingCallbacks::default();
        tick.run(&mut cb);
        assert_eq!(cb.cursor_calls, vec![(ContextId(1), LayerId(5))]);
    }

    #[test]
    fn a_commit_is_observed_and_produces_a_tile_changed_callback() {
        let initial_tiles = {
            let mut tiles = std::collections::HashMap::new();
            tiles.insert((0, 0), crate::renderer::Tile15::transparent());
            tiles
        };
        let mut inner = crate::canvas_state::CanvasStateInner::empty(64, 64);
        inner.layers = Arc::new(vec![LayerNode::Content {
            id: LayerId(1),
            tiles: Arc::new(initial_tiles),
        }]);
        let cb: SavePointCallback = Box::new(|_, _, _| {});
        let mut history = CanvasHistory::new(CanvasState::new(inner), cb, UserId(0));
        let handoff = Arc::new(Handoff::new());
        let mut tick = Tick::new(history.published_handle(), handoff);

        let mut cb = RecordingCallbacks::default();
        tick.run(&mut cb);
        assert_eq!(cb.tile_changed_calls, 0, "first tick only settles the baseline");

        history
            .handle_multidab(
                UserId(1),
                LayerId(1),
                &[paint_traits::DrawDabs {
                    layer: LayerId(1),
                    dabs: Arc::from(vec![paint_traits::Dab {
                        x: 5.0,
                        y: 5.0,
                        size: paint_traits::DabSize::Pixel(4),
                    }]),
                }],
            )
            .unwrap();

        tick.run(&mut cb);
        assert_eq!(cb.tile_changed_calls, 1);
    }
}
