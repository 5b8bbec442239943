/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The multi-threaded tile renderer (spec.md §4.8). Compositing a content
//! layer's *painted* pixels is the out-of-scope kernel's job; what lives
//! here is flattening an already-painted layer stack for one tile, laying
//! it over the checker backdrop, and converting to 8-bit output.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use paint_traits::{RenderCallbacks, Rgba8, TILE_SIZE};

use crate::canvas_state::{CanvasState, LayerNode, LayerPropsNode};

const TILE_PIXELS: usize = (TILE_SIZE as usize) * (TILE_SIZE as usize);
/// 15-bit full scale, matching the "opacity = 15-bit full minus one
/// quarter" phrasing in spec.md §4.6.
pub const FULL_OPACITY_15: u16 = 32768;

/// One tile's worth of premultiplied RGBA at the compositor's internal
/// 15-bit precision.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile15(pub Box<[u16]>);

impl Tile15 {
    pub fn transparent() -> Self {
        Tile15(vec![0u16; TILE_PIXELS * 4].into_boxed_slice())
    }

    fn pixel(&self, i: usize) -> (u16, u16, u16, u16) {
        let o = i * 4;
        (self.0[o], self.0[o + 1], self.0[o + 2], self.0[o + 3])
    }

    fn set_pixel(&mut self, i: usize, rgba: (u16, u16, u16, u16)) {
        let o = i * 4;
        self.0[o] = rgba.0;
        self.0[o + 1] = rgba.1;
        self.0[o + 2] = rgba.2;
        self.0[o + 3] = rgba.3;
    }
}

/// One tile's worth of final 8-bit output, as handed to [`RenderCallbacks`].
pub struct Rgba8Tile(pub Vec<Rgba8>);

impl Rgba8Tile {
    fn new() -> Self {
        Rgba8Tile(vec![Rgba8::default(); TILE_PIXELS])
    }
}

/// Standard "source over" compositing at 15-bit precision. Channels are
/// premultiplied by their own pixel's alpha; `opacity` additionally scales
/// the source as a whole (a layer's opacity property).
fn over(dst: (u16, u16, u16, u16), src: (u16, u16, u16, u16), opacity: u16) -> (u16, u16, u16, u16) {
    let full = u32::from(FULL_OPACITY_15);
    let scale = u32::from(opacity);
    let scaled = |c: u16| (u32::from(c) * scale) / full;
    let src_a = scaled(src.3);
    let inv_src_a = full - src_a.min(full);
    let mix = |d: u16, s: u16| -> u16 {
        (scaled(s) + (u32::from(d) * inv_src_a) / full).min(full) as u16
    };
    (
        mix(dst.0, src.0),
        mix(dst.1, src.1),
        mix(dst.2, src.2),
        (src_a + (u32::from(dst.3) * inv_src_a) / full).min(full) as u16,
    )
}

/// Flattens the visible layer stack for tile `(tx, ty)` into `out`,
/// skipping layers hidden or censored by the current projection
/// (spec.md §4.6's `hidden_by_view_mode`/`censored` bits).
fn composite_layers(layers: &[LayerNode], props: &[LayerPropsNode], tx: u32, ty: u32, out: &mut Tile15) {
    for (node, prop) in layers.iter().zip(props.iter()) {
        if prop.hidden_by_view_mode || prop.censored {
            continue;
        }
        match node {
            LayerNode::Group { children, .. } => {
                composite_layers(children, &prop.children, tx, ty, out);
            }
            LayerNode::Content { tiles, .. } => {
                if let Some(tile) = tiles.get(&(tx, ty)) {
                    for i in 0..TILE_PIXELS {
                        let blended = over(out.pixel(i), tile.pixel(i), prop.opacity);
                        out.set_pixel(i, blended);
                    }
                }
            }
        }
    }
}

/// Composites view-state tile `(tx, ty)` (spec.md §4.8 step 1).
pub fn composite_tile(view: &CanvasState, tx: u32, ty: u32) -> Tile15 {
    let mut out = Tile15::transparent();
    composite_layers(&view.layers()[..], &view.layer_props()[..], tx, ty, &mut out);
    out
}

/// A static 2-tone checker pattern tile, shared by every worker.
pub fn checker_tile() -> Tile15 {
    let mut tile = Tile15::transparent();
    const SQUARE: usize = 8;
    for y in 0..TILE_SIZE as usize {
        for x in 0..TILE_SIZE as usize {
            let light = ((x / SQUARE) + (y / SQUARE)) % 2 == 0;
            let v: u16 = if light { 29000 } else { 21000 };
            tile.set_pixel(y * TILE_SIZE as usize + x, (v, v, v, FULL_OPACITY_15));
        }
    }
    tile
}

/// Blends `composite` with `backdrop` using the *behind* mode: the
/// backdrop shows through wherever `composite` is transparent, and is
/// otherwise fully occluded (spec.md §4.8 step 2).
pub fn blend_behind(composite: &Tile15, backdrop: &Tile15) -> Tile15 {
    let mut out = Tile15::transparent();
    for i in 0..TILE_PIXELS {
        out.set_pixel(i, over(backdrop.pixel(i), composite.pixel(i), FULL_OPACITY_15));
    }
    out
}

/// Converts a 15-bit tile to 8-bit RGBA (spec.md §4.8 step 3).
pub fn to_rgba8(tile: &Tile15, out: &mut Rgba8Tile) {
    for i in 0..TILE_PIXELS {
        let (r, g, b, a) = tile.pixel(i);
        out.0[i] = Rgba8 {
            r: (u32::from(r) * 255 / u32::from(FULL_OPACITY_15)) as u8,
            g: (u32::from(g) * 255 / u32::from(FULL_OPACITY_15)) as u8,
            b: (u32::from(b) * 255 / u32::from(FULL_OPACITY_15)) as u8,
            a: (u32::from(a) * 255 / u32::from(FULL_OPACITY_15)) as u8,
        };
    }
}

struct RenderJob {
    view: CanvasState,
    x: u32,
    y: u32,
    checker: Arc<Tile15>,
    callbacks: Arc<dyn RenderCallbacks>,
}

/// Worker pool of size ≈ host CPU count (spec.md §5), driven by a job
/// queue and a tiles-done counting wait, the same shape as the
/// `compositing` crate's `TimerThread` (named spawn, `crossbeam-channel`
/// feed, joined from `Drop`).
pub struct TileRenderer {
    job_tx: Option<Sender<RenderJob>>,
    workers: Vec<JoinHandle<()>>,
    tiles_waiting: Arc<Mutex<usize>>,
    tiles_done: Arc<Condvar>,
    checker: Arc<Tile15>,
}

impl TileRenderer {
    /// `thread_count == 0` means "no explicit count supplied", sized to the
    /// host's CPU count instead (spec.md §5), the same convention
    /// `config::prefs` uses for its own worker-pool sizing.
    pub fn new(thread_count: usize) -> Self {
        let thread_count = if thread_count == 0 { num_cpus::get() } else { thread_count }.max(1);
        let (job_tx, job_rx): (Sender<RenderJob>, Receiver<RenderJob>) = crossbeam_channel::unbounded();
        let tiles_waiting = Arc::new(Mutex::new(0usize));
        let tiles_done = Arc::new(Condvar::new());
        let checker = Arc::new(checker_tile());

        let workers = (0..thread_count)
            .map(|tid| {
                let job_rx = job_rx.clone();
                let tiles_waiting = tiles_waiting.clone();
                let tiles_done = tiles_done.clone();
                std::thread::Builder::new()
                    .name(format!("paint-render-worker-{tid}"))
                    .spawn(move || {
                        // Per-thread scratch (spec.md §3's Render Scratch):
                        // a local variable already guarantees no
                        // cross-worker aliasing, so it is never shared.
                        let mut out = Rgba8Tile::new();
                        for job in job_rx.iter() {
                            let composite = composite_tile(&job.view, job.x, job.y);
                            let blended = blend_behind(&composite, &job.checker);
                            to_rgba8(&blended, &mut out);
                            job.callbacks.tile_rendered(job.x, job.y, &out.0, tid);

                            let mut waiting = tiles_waiting.lock();
                            *waiting = waiting.saturating_sub(1);
                            tiles_done.notify_all();
                        }
                    })
                    .expect("failed to spawn paint render worker thread")
            })
            .collect();

        TileRenderer {
            job_tx: Some(job_tx),
            workers,
            tiles_waiting,
            tiles_done,
            checker,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Renders every tile position named by `positions` (spec.md §4.8):
    /// enqueues one job per position, then blocks until all have
    /// completed.
    pub fn render_tiles(
        &self,
        view: &CanvasState,
        positions: impl IntoIterator<Item = (u32, u32)>,
        callbacks: Arc<dyn RenderCallbacks>,
    ) {
        let mut count = 0;
        {
            let mut waiting = self.tiles_waiting.lock();
            for (x, y) in positions {
                self.job_tx
                    .as_ref()
                    .expect("job_tx is only cleared by Drop")
                    .send(RenderJob {
                        view: view.clone(),
                        x,
                        y,
                        checker: self.checker.clone(),
                        callbacks: callbacks.clone(),
                    })
                    .expect("render worker threads outlive the renderer");
                *waiting += 1;
                count += 1;
            }
            if count == 0 {
                return;
            }
        }

        let mut waiting = self.tiles_waiting.lock();
        self.tiles_done.wait_while(&mut waiting, |w| *w > 0);
    }
}

impl Drop for TileRenderer {
    fn drop(&mut self) {
        // Dropping the last sender closes the channel so workers' `for
        // job in job_rx.iter()` loops exit; this must happen before we
        // join them or they'd block forever on an empty, open channel.
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
