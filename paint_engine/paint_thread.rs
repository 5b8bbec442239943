/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The paint thread (spec.md §4.3, §4.4, §5): the sole reader of
//! `MessageQueue` and the sole caller into `CanvasHistory`, batching
//! drawing commands by estimated paint area before committing them.

use std::sync::Arc;
use std::thread::JoinHandle;

use paint_traits::{CanvasCommand, DrawDabs, LayerId, UserId};

use crate::history::CanvasHistory;
use crate::preview::{Handoff, PreviewUpdate};
use crate::queue::{InternalMessage, MessageQueue, QueuedMessage, StreamOrigin};
use crate::{MAX_MULTIDAB_AREA, MAX_MULTIDAB_MESSAGES};

/// Batching acceptance test (spec.md §4.3 step 2-3): peek for more only if
/// the first message's own area is at most half the budget — an oversized
/// first dab is always dispatched alone, regardless of how small the next
/// message is (boundary property 10) — then keep extending the batch while
/// under the message-count cap and the combined area stays within budget.
/// `QueuedMessage::dab_area` returns `u64::MAX` for anything that is not a
/// drawable dab, so a non-dab message at either end of a run always forces
/// a batch boundary without any special-casing here.
fn accept_more(next: &QueuedMessage, count: usize, area_total: u64) -> bool {
    if count == 1 && area_total > MAX_MULTIDAB_AREA / 2 {
        return false;
    }
    count < MAX_MULTIDAB_MESSAGES && area_total.saturating_add(next.dab_area()) < MAX_MULTIDAB_AREA
}

fn flush_run(history: &mut CanvasHistory, is_local: bool, run: Option<(UserId, LayerId, Vec<DrawDabs>)>) {
    let Some((user, layer, dabs)) = run else {
        return;
    };
    let result = if is_local {
        history.handle_local_multidab(user, layer, &dabs)
    } else {
        history.handle_multidab(user, layer, &dabs)
    };
    if let Err(err) = result {
        log::warn!("dropping multidab batch for layer {layer:?}: {err}");
    }
}

fn dispatch_internal(history: &mut CanvasHistory, handoff: &Handoff, msg: InternalMessage) {
    match msg {
        InternalMessage::Reset => history.reset(),
        InternalMessage::SoftReset => history.soft_reset(),
        InternalMessage::Snapshot => history.snapshot(),
        InternalMessage::Catchup(progress) => handoff.set_catchup(progress),
        InternalMessage::Preview(PreviewUpdate::Install(preview)) => handoff.install_preview(preview),
        InternalMessage::Preview(PreviewUpdate::Clear) => handoff.clear_preview(),
    }
}

/// Applies one shifted batch to history, coalescing consecutive same-user,
/// same-layer `DrawDabs` messages into a single `handle_multidab` commit
/// (spec.md §4.3).
fn dispatch_batch(history: &mut CanvasHistory, handoff: &Handoff, origin: StreamOrigin, batch: Vec<QueuedMessage>) {
    let is_local = origin == StreamOrigin::Local;
    let mut run: Option<(UserId, LayerId, Vec<DrawDabs>)> = None;

    for msg in batch {
        match msg {
            QueuedMessage::Drawing {
                user,
                command: CanvasCommand::DrawDabs(draw),
            } => match &mut run {
                Some((run_user, run_layer, dabs)) if *run_user == user && *run_layer == draw.layer => {
                    dabs.push(draw);
                }
                _ => {
                    flush_run(history, is_local, run.take());
                    run = Some((user, draw.layer, vec![draw]));
                }
            },
            QueuedMessage::Drawing { user, command } => {
                flush_run(history, is_local, run.take());
                let result = if is_local {
                    history.handle_local(user, &command)
                } else {
                    history.handle(user, &command)
                };
                if let Err(err) = result {
                    log::warn!("dropping command from {user:?}: {err}");
                }
            }
            QueuedMessage::Internal(internal) => {
                flush_run(history, is_local, run.take());
                dispatch_internal(history, handoff, internal);
            }
        }
    }
    flush_run(history, is_local, run.take());
}

/// Owns the background thread that drains `MessageQueue` into
/// `CanvasHistory`. Joined from `Drop`, the same lifecycle shape as
/// `TileRenderer`'s workers and `compositing`'s `TimerThread`.
pub struct PaintThread {
    handle: Option<JoinHandle<()>>,
}

impl PaintThread {
    pub fn spawn(queue: Arc<MessageQueue>, mut history: CanvasHistory, handoff: Arc<Handoff>) -> Self {
        let handle = std::thread::Builder::new()
            .name("paint-thread".to_string())
            .spawn(move || loop {
                queue.wait_for_activity();
                if let Some((origin, batch)) = queue.shift_batch(accept_more) {
                    dispatch_batch(&mut history, &handoff, origin, batch);
                }
                // Shutdown only guarantees the batch already shifted above
                // gets applied; anything still queued after this point is
                // the caller's responsibility to drain (spec.md §5) —
                // `MessageQueue::drain_all` exists for exactly that, so a
                // pending preview still gets its `Drop` even if a push
                // raced the shutdown signal.
                if !queue.is_running() {
                    break;
                }
            })
            .expect("failed to spawn paint thread");

        PaintThread { handle: Some(handle) }
    }
}

impl Drop for PaintThread {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
