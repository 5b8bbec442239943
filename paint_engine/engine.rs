/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `PaintEngine` (spec.md §6): the public surface wiring intake, the paint
//! thread, the per-tick projection, and the tile renderer together. Nothing
//! in this module touches pixels directly; it only routes calls to the
//! collaborators that do.

use std::sync::Arc;

use paint_traits::{
    AclPolicy, CanvasCommand, ContextId, ControlRequest, IncomingMessage, IntakeCallbacks, LayerId,
    RenderCallbacks, TickCallbacks, UserId,
};

use crate::canvas_state::CanvasState;
use crate::history::{CanvasHistory, SavePointCallback};
use crate::local_view::ViewMode;
use crate::meta::MetaBuffers;
use crate::paint_thread::PaintThread;
use crate::preview::{Handoff, Preview, PreviewUpdate};
use crate::queue::{InternalMessage, MessageQueue, QueuedMessage};
use crate::renderer::TileRenderer;
use crate::tick::Tick;

impl From<ControlRequest> for InternalMessage {
    fn from(req: ControlRequest) -> Self {
        match req {
            ControlRequest::Reset => InternalMessage::Reset,
            ControlRequest::SoftReset => InternalMessage::SoftReset,
            ControlRequest::Snapshot => InternalMessage::Snapshot,
            ControlRequest::Catchup(progress) => InternalMessage::Catchup(progress),
        }
    }
}

/// Everything the rest of the crate exists to assemble (spec.md §6): the
/// intake/queue path, the paint thread and its single-mutator history, the
/// per-tick projection, and the tile renderer. One `PaintEngine` per
/// collaborative canvas.
pub struct PaintEngine {
    queue: Arc<MessageQueue>,
    acl: Arc<dyn AclPolicy>,
    tick: Tick,
    renderer: TileRenderer,
    /// `Option` so `Drop` can join it explicitly before draining whatever
    /// the join raced past, rather than relying on field-declaration order.
    paint_thread: Option<PaintThread>,
}

impl PaintEngine {
    /// Builds a running engine: spawns the paint thread and the tile
    /// renderer's worker pool immediately (spec.md §5 — both live for the
    /// engine's whole lifetime, not lazily on first use). `render_threads ==
    /// 0` defers to `TileRenderer`'s own CPU-count default.
    pub fn new(
        acl: Arc<dyn AclPolicy>,
        initial: Option<CanvasState>,
        save_point_cb: SavePointCallback,
        save_point_user: UserId,
        render_threads: usize,
    ) -> Self {
        let initial = initial.unwrap_or_else(|| CanvasState::empty(0, 0));
        let history = CanvasHistory::new(initial, save_point_cb, save_point_user);
        let published = history.published_handle();
        let queue = Arc::new(MessageQueue::new());
        let handoff = Arc::new(Handoff::new());
        let paint_thread = PaintThread::spawn(queue.clone(), history, handoff.clone());
        let tick = Tick::new(published, handoff);

        PaintEngine {
            queue,
            acl,
            tick,
            renderer: TileRenderer::new(render_threads),
            paint_thread: Some(paint_thread),
        }
    }

    /// Intake (spec.md §4.1): classifies, ACL-filters, and queues each
    /// message in `messages`, aggregating non-drawing presence updates into
    /// one flush to `callbacks` at the end of the call.
    pub fn handle_inc(
        &self,
        origin: ContextId,
        local: bool,
        messages: Vec<IncomingMessage>,
        callbacks: &mut dyn IntakeCallbacks,
    ) {
        let mut meta = MetaBuffers::new();
        let mut to_queue = Vec::new();

        for message in messages {
            let flags = self.acl.evaluate(origin, &message);
            meta.record_acl_flags(flags);
            if flags.contains(paint_traits::AclChangeFlags::FILTERED) {
                continue;
            }

            match message {
                IncomingMessage::Drawing { user, command } => {
                    to_queue.push(QueuedMessage::Drawing { user, command });
                }
                IncomingMessage::Control(req) => {
                    to_queue.push(QueuedMessage::Internal(req.into()));
                }
                IncomingMessage::LaserTrail { ctx, persistence, color } => {
                    meta.record_laser_trail(ctx, persistence, color);
                }
                IncomingMessage::MovePointer { ctx, x, y } => {
                    meta.record_cursor(ctx, x, y);
                }
                IncomingMessage::DefaultLayerSet { layer } => {
                    meta.set_default_layer(layer);
                }
                IncomingMessage::Other => {}
            }
        }

        self.queue.push(local, to_queue);
        meta.flush(callbacks);
    }

    /// Submits a single drawing command outside the wire intake path, for a
    /// host that already has a typed `CanvasCommand` in hand.
    pub fn submit_command(&self, local: bool, user: UserId, command: CanvasCommand) {
        self.queue.push(local, vec![QueuedMessage::Drawing { user, command }]);
    }

    pub fn request_reset(&self, local: bool) {
        self.queue.push(local, vec![QueuedMessage::Internal(InternalMessage::Reset)]);
    }

    pub fn request_soft_reset(&self, local: bool) {
        self.queue
            .push(local, vec![QueuedMessage::Internal(InternalMessage::SoftReset)]);
    }

    pub fn request_snapshot(&self, local: bool) {
        self.queue
            .push(local, vec![QueuedMessage::Internal(InternalMessage::Snapshot)]);
    }

    pub fn request_catchup(&self, local: bool, progress: u32) {
        self.queue.push(
            local,
            vec![QueuedMessage::Internal(InternalMessage::Catchup(progress))],
        );
    }

    /// Installs a new preview overlay (spec.md §4.4). Routed through the
    /// queue, not applied directly, so it lands in FIFO order relative to
    /// whatever drawing commands are already queued ahead of it.
    pub fn preview_install(&self, local: bool, preview: Preview) {
        self.queue.push(
            local,
            vec![QueuedMessage::Internal(InternalMessage::Preview(PreviewUpdate::Install(
                Arc::new(preview),
            )))],
        );
    }

    pub fn preview_clear(&self, local: bool) {
        self.queue.push(
            local,
            vec![QueuedMessage::Internal(InternalMessage::Preview(PreviewUpdate::Clear))],
        );
    }

    /// Records a context's drawing position for aggregation into the next
    /// tick's `cursor_moved` deliveries (spec.md §4.5 step 5), distinct from
    /// the wire-driven `MovePointer` path aggregated by `handle_inc`.
    pub fn cursor_moved(&mut self, ctx: ContextId, layer: LayerId, x: f64, y: f64) {
        self.tick.record_cursor(ctx, layer, x, y);
    }

    pub fn active_layer_id_set(&mut self, id: LayerId) {
        self.tick.local_view().set_active_layer_id(id);
    }

    pub fn active_frame_index_set(&mut self, index: u32) {
        self.tick.local_view().set_active_frame_index(index);
    }

    pub fn view_mode_set(&mut self, mode: ViewMode) {
        self.tick.local_view().set_view_mode(mode);
    }

    pub fn reveal_censored_set(&mut self, reveal: bool) {
        self.tick.local_view().set_reveal_censored(reveal);
    }

    pub fn inspect_context_id_set(&mut self, id: Option<ContextId>) {
        self.tick.local_view().set_inspect_context_id(id);
    }

    pub fn layer_visibility_set(&mut self, id: LayerId, hidden: bool) {
        self.tick.local_view().set_layer_hidden(id, hidden);
    }

    /// Runs the frame-thread tick (spec.md §4.5), delivering `callbacks` for
    /// whatever changed since the last call.
    pub fn tick(&mut self, callbacks: &mut dyn TickCallbacks) {
        self.tick.run(callbacks);
    }

    /// Renders the given tile positions of the last ticked view (spec.md
    /// §4.8). Call after `tick()`; rendering a view older than the last tick
    /// is not an error, just stale.
    pub fn render(&self, positions: impl IntoIterator<Item = (u32, u32)>, callbacks: Arc<dyn RenderCallbacks>) {
        let view = self.tick.current_view();
        self.renderer.render_tiles(&view, positions, callbacks);
    }

    pub fn render_thread_count(&self) -> usize {
        self.renderer.thread_count()
    }
}

impl Drop for PaintEngine {
    fn drop(&mut self) {
        // Shut down before joining: the paint thread only exits once it
        // observes `queue.is_running() == false` (spec.md §5). Anything left
        // in the queue after that race — a push that lands between the
        // paint thread's last drain and its exit check — is drained here so
        // a pending preview still gets its `Drop`-based dispose (spec.md §9)
        // instead of leaking inside an abandoned queue.
        self.queue.shutdown();
        self.paint_thread.take();
        self.queue.drain_all();
    }
}
