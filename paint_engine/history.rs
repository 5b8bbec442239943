/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Canvas history (spec.md §3, §4.3, §4.4): the single mutator of
//! committed canvas state, reachable only from the paint thread.

use std::sync::Arc;

use parking_lot::Mutex;

use paint_traits::{CanvasCommand, DrawDabs, LayerId, UserId};

use crate::canvas_state::{map_content_layer, CanvasState, TransientCanvasState};
use crate::error::PaintError;
use crate::kernel::stamp_dab;
use crate::renderer::FULL_OPACITY_15;

/// Invoked after every commit that changes history, with the user
/// attributed to the commit, the resulting state, and whether this save
/// point was forced by an explicit `SNAPSHOT` request rather than an
/// ordinary drawing/reset commit (spec.md §3's save point protocol).
pub type SavePointCallback = Box<dyn FnMut(UserId, CanvasState, bool) + Send>;

/// The read surface other threads (the tick thread, chiefly) use to
/// observe committed canvas state without touching `CanvasHistory` itself,
/// which only the paint thread may call into (spec.md §3, §5). Cloning is
/// cheap: it shares the same underlying lock, not a fresh one.
#[derive(Clone)]
pub struct PublishedCanvas(Arc<Mutex<CanvasState>>);

impl PublishedCanvas {
    fn new(initial: CanvasState) -> Self {
        PublishedCanvas(Arc::new(Mutex::new(initial)))
    }

    fn set(&self, cs: CanvasState) {
        *self.0.lock() = cs;
    }

    pub fn get(&self) -> CanvasState {
        self.0.lock().clone()
    }

    /// Returns the current state only if it differs from `prev` (spec.md
    /// §4.5 step 2), letting the tick thread skip rebuilding the view when
    /// nothing committed since the last tick.
    pub fn compare_and_get(&self, prev: &CanvasState) -> Option<CanvasState> {
        let current = self.0.lock();
        if current.ptr_eq(prev) {
            None
        } else {
            Some(current.clone())
        }
    }
}

/// The single mutator of committed canvas state (spec.md §3). Every write
/// path goes through `TransientCanvasState`, so a commit either replaces
/// `current` wholesale or not at all.
pub struct CanvasHistory {
    current: CanvasState,
    published: PublishedCanvas,
    /// Set for the duration of a `handle_local*` call, spec.md §4.4's flag
    /// letting the paint thread know a local stroke is still being
    /// committed when a teardown or reset races it.
    local_drawing_in_progress: bool,
    save_point_cb: SavePointCallback,
    save_point_user: UserId,
}

impl CanvasHistory {
    pub fn new(initial: CanvasState, save_point_cb: SavePointCallback, save_point_user: UserId) -> Self {
        CanvasHistory {
            published: PublishedCanvas::new(initial.clone()),
            current: initial,
            local_drawing_in_progress: false,
            save_point_cb,
            save_point_user,
        }
    }

    pub fn current(&self) -> CanvasState {
        self.current.clone()
    }

    /// A cheaply-cloneable handle other threads can use to read committed
    /// state (spec.md §4.5).
    pub fn published_handle(&self) -> PublishedCanvas {
        self.published.clone()
    }

    pub fn local_drawing_in_progress(&self) -> bool {
        self.local_drawing_in_progress
    }

    /// Replaces history wholesale with a blank canvas at the current
    /// dimensions (spec.md §4.3's `RESET`). Resizing the canvas itself is
    /// not something any internal message requests; it would arrive as an
    /// ordinary drawing command.
    pub fn reset(&mut self) {
        self.current = CanvasState::empty(self.current.width(), self.current.height());
        self.local_drawing_in_progress = false;
        self.emit_save_point(self.save_point_user, false);
    }

    /// Clears layer content but keeps dimensions, annotations, document
    /// metadata, and timeline (spec.md §4.3's `SOFT_RESET`; a full `RESET`
    /// additionally discards those, which is what distinguishes the two).
    pub fn soft_reset(&mut self) {
        let mut transient = TransientCanvasState::get_or_make_transient(self.current.clone());
        transient.set_layers(Vec::new());
        transient.set_layer_props(Vec::new());
        self.current = transient.publish();
        self.local_drawing_in_progress = false;
        self.emit_save_point(self.save_point_user, false);
    }

    /// Forces an out-of-band save point without otherwise touching history
    /// (spec.md §4.3's `SNAPSHOT`).
    pub fn snapshot(&mut self) {
        self.emit_save_point(self.save_point_user, true);
    }

    /// Drops in-progress bookkeeping at teardown (spec.md §5).
    pub fn cleanup(&mut self) {
        self.local_drawing_in_progress = false;
    }

    /// Applies one remote-originated command and emits a save point.
    pub fn handle(&mut self, user: UserId, command: &CanvasCommand) -> Result<(), PaintError> {
        self.apply(command)?;
        self.emit_save_point(user, false);
        Ok(())
    }

    /// Applies one locally-originated command, marking the local-drawing
    /// flag for the duration of the apply (spec.md §4.4).
    pub fn handle_local(&mut self, user: UserId, command: &CanvasCommand) -> Result<(), PaintError> {
        self.local_drawing_in_progress = true;
        let result = self.apply(command);
        self.local_drawing_in_progress = false;
        result?;
        self.emit_save_point(user, false);
        Ok(())
    }

    /// Applies an entire batched multidab run as a single commit (spec.md
    /// §4.4's batching heuristic lands here: the paint thread coalesces
    /// many `DrawDabs` messages into one call so history only forks and
    /// publishes once per batch, not once per message).
    pub fn handle_multidab(&mut self, user: UserId, layer: LayerId, batch: &[DrawDabs]) -> Result<(), PaintError> {
        self.apply_multidab(layer, batch)?;
        self.emit_save_point(user, false);
        Ok(())
    }

    pub fn handle_local_multidab(
        &mut self,
        user: UserId,
        layer: LayerId,
        batch: &[DrawDabs],
    ) -> Result<(), PaintError> {
        self.local_drawing_in_progress = true;
        let result = self.apply_multidab(layer, batch);
        self.local_drawing_in_progress = false;
        result?;
        self.emit_save_point(user, false);
        Ok(())
    }

    fn emit_save_point(&mut self, user: UserId, snapshot_requested: bool) {
        self.published.set(self.current.clone());
        (self.save_point_cb)(user, self.current.clone(), snapshot_requested);
    }

    fn apply(&mut self, command: &CanvasCommand) -> Result<(), PaintError> {
        match command {
            CanvasCommand::DrawDabs(draw) => self.apply_multidab(draw.layer, std::slice::from_ref(draw)),
            // Interpreting an opaque command's payload is the external
            // kernel's job (spec.md §1); history treats unknown kinds as
            // a no-op rather than a failure.
            CanvasCommand::Other(_) => Ok(()),
        }
    }

    fn apply_multidab(&mut self, layer: LayerId, batch: &[DrawDabs]) -> Result<(), PaintError> {
        if batch.iter().any(|draw| draw.layer != layer) {
            return Err(PaintError::HistoryApply(
                "multidab batch targets more than one layer".to_string(),
            ));
        }

        let mut transient = TransientCanvasState::get_or_make_transient(self.current.clone());
        let new_layers = map_content_layer(&transient.inner().layers.clone()[..], layer, &mut |tiles| {
            let mut out = tiles.clone();
            for draw in batch {
                for dab in draw.dabs.iter() {
                    stamp_dab(&mut out, dab, (0, 0, FULL_OPACITY_15));
                }
            }
            out
        });
        transient.set_layers(new_layers);
        self.current = transient.publish();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::canvas_state::{CanvasStateInner, LayerNode};
    use paint_traits::{Dab, DabSize};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn history_with_save_points() -> (CanvasHistory, Arc<Mutex<Vec<UserId>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorder = calls.clone();
        let cb: SavePointCallback = Box::new(move |user, _cs, _snapshot_requested| recorder.lock().unwrap().push(user));
        let mut tiles = HashMap::new();
        tiles.insert((0, 0), crate::renderer::Tile15::transparent());
        let mut inner = CanvasStateInner::empty(64, 64);
        inner.layers = Arc::new(vec![LayerNode::Content {
            id: LayerId(1),
            tiles: Arc::new(tiles),
        }]);
        let history = CanvasHistory::new(CanvasState::new(inner), cb, UserId(0));
        (history, calls)
    }

    fn dabs(n: usize) -> Vec<DrawDabs> {
        (0..n)
            .map(|i| DrawDabs {
                layer: LayerId(1),
                dabs: Arc::from(vec![Dab {
                    x: i as f32,
                    y: i as f32,
                    size: DabSize::Pixel(2),
                }]),
            })
            .collect()
    }

    #[test]
    fn compare_and_get_reports_no_change_until_a_commit_happens() {
        let (history, _calls) = history_with_save_points();
        let published = history.published_handle();
        let baseline = history.current();
        assert!(published.compare_and_get(&baseline).is_none());
    }

    #[test]
    fn handle_multidab_commits_once_for_the_whole_batch() {
        let (mut history, calls) = history_with_save_points();
        let published = history.published_handle();
        let baseline = history.current();
        history
            .handle_multidab(UserId(3), LayerId(1), &dabs(5))
            .unwrap();

        assert_eq!(calls.lock().unwrap().as_slice(), &[UserId(3)]);
        assert!(published.compare_and_get(&baseline).is_some());
    }

    #[test]
    fn local_drawing_flag_is_clear_before_and_after_a_local_commit() {
        let (mut history, _calls) = history_with_save_points();
        assert!(!history.local_drawing_in_progress());
        history
            .handle_local_multidab(UserId(1), LayerId(1), &dabs(1))
            .unwrap();
        assert!(!history.local_drawing_in_progress());
    }

    #[test]
    fn multidab_batch_spanning_layers_is_rejected() {
        let (mut history, _calls) = history_with_save_points();
        let mut batch = dabs(2);
        batch[1].layer = LayerId(2);
        let err = history.handle_multidab(UserId(1), LayerId(1), &batch);
        assert!(err.is_err());
    }

    #[test]
    fn reset_replaces_history_with_a_blank_canvas_and_emits_a_save_point() {
        let (mut history, calls) = history_with_save_points();
        let dims = (history.current().width(), history.current().height());
        history.reset();
        assert_eq!((history.current().width(), history.current().height()), dims);
        assert!(history.current().layers().is_empty());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn soft_reset_clears_layers_but_keeps_dimensions() {
        let (mut history, _calls) = history_with_save_points();
        let before = history.current();
        history.soft_reset();
        assert_eq!(history.current().width(), before.width());
        assert!(history.current().layers().is_empty());
    }

    #[test]
    fn snapshot_requested_is_only_true_for_an_explicit_snapshot() {
        let flags = Arc::new(Mutex::new(Vec::new()));
        let recorder = flags.clone();
        let cb: SavePointCallback = Box::new(move |_user, _cs, snapshot_requested| {
            recorder.lock().unwrap().push(snapshot_requested)
        });
        let mut tiles = HashMap::new();
        tiles.insert((0, 0), crate::renderer::Tile15::transparent());
        let mut inner = CanvasStateInner::empty(64, 64);
        inner.layers = Arc::new(vec![LayerNode::Content {
            id: LayerId(1),
            tiles: Arc::new(tiles),
        }]);
        let mut history = CanvasHistory::new(CanvasState::new(inner), cb, UserId(0));

        history.handle_multidab(UserId(1), LayerId(1), &dabs(1)).unwrap();
        history.snapshot();
        history.reset();

        assert_eq!(flags.lock().unwrap().as_slice(), &[false, true, false]);
    }
}
