/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The preview layer (spec.md §3, §4.4, §4.6): an ephemeral overlay applied
//! on top of committed state for rendering only, never written to history.

use std::sync::Arc;

use parking_lot::Mutex;

use paint_traits::{Dab, DrawDabs, LayerId};

use crate::canvas_state::{map_content_layer, CanvasState, TileContent, TransientCanvasState};
use crate::kernel::stamp_dab;

/// A preview of a rectangular cut, with an optional per-pixel alpha mask.
#[derive(Clone, Debug)]
pub struct CutPreview {
    pub layer: LayerId,
    /// (x, y, width, height), in canvas pixels, at the offset captured
    /// when the preview was created.
    pub rect: (i32, i32, u32, u32),
    /// Row-major, `width * height` long when present.
    pub alpha_mask: Option<Arc<[u8]>>,
    pub initial_offset: (i32, i32),
}

impl CutPreview {
    fn render(&self, cs: &CanvasState, dx: i32, dy: i32) -> CanvasState {
        let (x, y, w, h) = self.rect;
        let x = x + dx;
        let y = y + dy;
        let mask = self.alpha_mask.clone();
        let mut transient = TransientCanvasState::get_or_make_transient(cs.clone());
        let new_layers = map_content_layer(&transient.inner().layers.clone()[..], self.layer, &mut |tiles| {
            cut_rect(tiles, x, y, w, h, mask.as_deref())
        });
        transient.set_layers(new_layers);
        transient.publish()
    }
}

/// Clears (or, with a mask, partially fades) the rectangle `(x, y, w, h)`
/// out of a copy of `tiles`, standing in for the external kernel's actual
/// cut compositing.
fn cut_rect(tiles: &TileContent, x: i32, y: i32, w: u32, h: u32, mask: Option<&[u8]>) -> TileContent {
    use paint_traits::TILE_SIZE;
    let mut out = tiles.clone();
    for row in 0..h {
        for col in 0..w {
            let px = x + col as i32;
            let py = y + row as i32;
            if px < 0 || py < 0 {
                continue;
            }
            let keep = mask
                .map(|m| m[(row * w + col) as usize])
                .unwrap_or(0);
            if keep > 0 {
                continue;
            }
            let tx = px as u32 / TILE_SIZE;
            let ty = py as u32 / TILE_SIZE;
            if let Some(tile) = out.get_mut(&(tx, ty)) {
                let lx = px as u32 % TILE_SIZE;
                let ly = py as u32 % TILE_SIZE;
                let i = (ly as usize * TILE_SIZE as usize + lx as usize) * 4;
                tile.0[i] = 0;
                tile.0[i + 1] = 0;
                tile.0[i + 2] = 0;
                tile.0[i + 3] = 0;
            }
        }
    }
    out
}

/// A preview of an in-progress dab stroke, not yet committed to history.
#[derive(Clone, Debug)]
pub struct DabsPreview {
    pub layer: LayerId,
    pub dabs: Arc<Vec<DrawDabs>>,
    pub initial_offset: (i32, i32),
}

impl DabsPreview {
    fn render(&self, cs: &CanvasState, dx: i32, dy: i32) -> CanvasState {
        let dabs: Vec<Dab> = self
            .dabs
            .iter()
            .flat_map(|d| d.dabs.iter().copied())
            .map(|mut dab| {
                dab.x += dx as f32;
                dab.y += dy as f32;
                dab
            })
            .collect();
        let mut transient = TransientCanvasState::get_or_make_transient(cs.clone());
        let new_layers = map_content_layer(&transient.inner().layers.clone()[..], self.layer, &mut |tiles| {
            let mut out = tiles.clone();
            for dab in &dabs {
                stamp_dab(&mut out, dab, (0, 0, 32768));
            }
            out
        });
        transient.set_layers(new_layers);
        transient.publish()
    }
}

/// A polymorphic preview overlay (spec.md §3). Dispose is Rust's ordinary
/// `Drop`, not a stored function pointer: the engine's contract ("dispose
/// runs exactly once even under teardown races", spec.md §9) is exactly
/// what ownership already guarantees once a `Preview` has at most one
/// owner at a time, which the pending-preview slot's mutex-guarded handoff
/// ensures.
#[derive(Clone, Debug)]
pub enum Preview {
    Cut(CutPreview),
    Dabs(DabsPreview),
}

impl Preview {
    pub fn initial_offset(&self) -> (i32, i32) {
        match self {
            Preview::Cut(p) => p.initial_offset,
            Preview::Dabs(p) => p.initial_offset,
        }
    }

    /// Renders this preview atop `cs`, translating for any canvas offset
    /// change since the preview was created (spec.md §4.6).
    pub fn render(&self, cs: &CanvasState) -> CanvasState {
        let (cur_x, cur_y) = cs.offset();
        let (init_x, init_y) = self.initial_offset();
        let dx = init_x - cur_x;
        let dy = init_y - cur_y;
        match self {
            Preview::Cut(p) => p.render(cs, dx, dy),
            Preview::Dabs(p) => p.render(cs, dx, dy),
        }
    }
}

/// What the pending-preview slot should do at the next paint-thread
/// dispatch (spec.md §4.4): install a new preview, or clear the active one
/// (the `&null_preview` sentinel in the original design).
#[derive(Clone, Debug)]
pub enum PreviewUpdate {
    Install(Arc<Preview>),
    Clear,
}

/// The paint thread's handoff to the tick thread (spec.md §4.4, §4.5): the
/// currently-installed preview and the most recent catchup progress value,
/// each guarded by its own lock since they are written and read
/// independently. A stale preview in this slot is simply overwritten — its
/// `Drop` is the dispose the preview's contract promises (spec.md §9).
pub struct Handoff {
    preview: Mutex<Option<Arc<Preview>>>,
    catchup: Mutex<Option<u32>>,
}

impl Handoff {
    pub fn new() -> Self {
        Handoff {
            preview: Mutex::new(None),
            catchup: Mutex::new(None),
        }
    }

    pub fn install_preview(&self, preview: Arc<Preview>) {
        *self.preview.lock() = Some(preview);
    }

    pub fn clear_preview(&self) {
        *self.preview.lock() = None;
    }

    pub fn current_preview(&self) -> Option<Arc<Preview>> {
        self.preview.lock().clone()
    }

    pub fn set_catchup(&self, progress: u32) {
        *self.catchup.lock() = Some(progress);
    }

    /// Removes and returns the pending catchup progress, if any, so each
    /// value is delivered to `TickCallbacks::catchup` exactly once.
    pub fn take_catchup(&self) -> Option<u32> {
        self.catchup.lock().take()
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Handoff::new()
    }
}
