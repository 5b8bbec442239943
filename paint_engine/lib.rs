/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The paint-engine core: command intake and queueing, the single-mutator
//! canvas history, the preview/local-view layers atop committed state, the
//! multi-threaded tile renderer, and the per-tick diff emitter.
//!
//! The message codec, the ACL policy, the paint-pixel kernels, and the
//! presentation layer are external collaborators (see `paint_traits`) and
//! are not implemented in this crate.

mod canvas_state;
mod diff;
mod engine;
mod error;
mod history;
mod kernel;
mod local_view;
mod meta;
mod paint_thread;
mod preview;
mod queue;
mod renderer;
mod tick;

pub use canvas_state::{
    AnnotationList, CanvasState, DocumentMetadata, LayerNode, LayerPropsList, LayerPropsNode,
    TileContent, Timeline, TransientCanvasState,
};
pub use diff::CanvasDiff;
pub use engine::PaintEngine;
pub use error::PaintError;
pub use history::{CanvasHistory, PublishedCanvas, SavePointCallback};
pub use local_view::{LocalViewState, ViewMode};
pub use paint_thread::PaintThread;
pub use preview::{CutPreview, DabsPreview, Handoff, Preview, PreviewUpdate};
pub use queue::{InternalMessage, MessageQueue, QueuedMessage, Semaphore, StreamOrigin};
pub use renderer::{Rgba8Tile, Tile15, TileRenderer};
pub use tick::Tick;

/// Render-engine-wide limits (spec.md §4.3, §6).
pub const MAX_MULTIDAB_MESSAGES: usize = 1024;
pub const MAX_MULTIDAB_AREA: u64 = 256 * 256 * 16;

pub use paint_traits::TILE_SIZE;
