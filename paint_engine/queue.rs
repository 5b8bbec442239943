/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The dual local/remote message queue (spec.md §3, §4.2): one shared
//! mutex, one shared counting semaphore, and a running flag for shutdown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

use paint_traits::{CanvasCommand, UserId};

use crate::preview::PreviewUpdate;

/// A hand-rolled counting semaphore. No off-the-shelf crate in the
/// teacher's dependency stack provides one for synchronous code, and §9
/// explicitly sanctions "a mutex-guarded cell" for primitives of this
/// shape, so this pairs `parking_lot::{Mutex, Condvar}` the same way
/// `compositing`'s timer thread pairs them.
pub struct Semaphore {
    count: Mutex<usize>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new() -> Self {
        Semaphore {
            count: Mutex::new(0),
            cv: Condvar::new(),
        }
    }

    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cv.notify_one();
    }

    /// Blocks until the count is non-zero, then consumes one unit.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cv.wait(&mut count);
        }
        *count -= 1;
    }

    /// Consumes one unit without blocking. Only valid when the caller
    /// already knows a producer posted for this exact unit (spec.md §4.2's
    /// "blocking-but-nonwaiting decrement" — the paint thread peeking extra
    /// messages under the held queue mutex).
    pub fn decrement_already_posted(&self) {
        let mut count = self.count.lock();
        debug_assert!(*count > 0, "decrementing a semaphore nobody posted to");
        *count = count.saturating_sub(1);
    }

    pub fn value(&self) -> usize {
        *self.count.lock()
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Semaphore::new()
    }
}

/// The five internal control-message kinds (spec.md §4.4, §6). `Preview`
/// carries the engine's own preview type rather than an opaque blob because
/// previews originate from the engine's own API, not the wire codec.
#[derive(Clone, Debug)]
pub enum InternalMessage {
    Reset,
    SoftReset,
    Snapshot,
    Catchup(u32),
    Preview(PreviewUpdate),
}

/// A message as it sits in the queue, ready for the paint thread.
#[derive(Clone, Debug)]
pub enum QueuedMessage {
    Drawing {
        user: UserId,
        command: CanvasCommand,
    },
    Internal(InternalMessage),
}

impl QueuedMessage {
    /// Batching cost estimate (spec.md §4.3 step 2). Internal messages are
    /// never batched with anything.
    pub fn dab_area(&self) -> u64 {
        match self {
            QueuedMessage::Drawing { command, .. } => command.dab_area(),
            QueuedMessage::Internal(_) => u64::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOrigin {
    Local,
    Remote,
}

#[derive(Default)]
struct QueueInner {
    local: VecDeque<QueuedMessage>,
    remote: VecDeque<QueuedMessage>,
}

/// Dual FIFO queue, one shared mutex, one shared counting semaphore
/// (spec.md §3). Invariant: `semaphore.value() == local.len() + remote.len()`
/// whenever no thread holds the mutex.
pub struct MessageQueue {
    inner: Mutex<QueueInner>,
    semaphore: Semaphore,
    running: AtomicBool,
}

impl MessageQueue {
    pub fn new() -> Self {
        MessageQueue {
            inner: Mutex::new(QueueInner::default()),
            semaphore: Semaphore::new(),
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signals the paint thread to exit at its next wake (spec.md §4.2, §5).
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.semaphore.post();
    }

    /// Blocks until there is at least one message to look at, or a
    /// shutdown post woke the thread with nothing queued.
    pub fn wait_for_activity(&self) {
        self.semaphore.wait();
    }

    /// Pushes `msgs` onto the chosen stream in one critical section,
    /// posting the semaphore once per message (spec.md §4.1's push
    /// discipline). Returns the number pushed.
    pub fn push(&self, local: bool, msgs: Vec<QueuedMessage>) -> usize {
        if msgs.is_empty() {
            return 0;
        }
        let n = msgs.len();
        let mut inner = self.inner.lock();
        let stream = if local {
            &mut inner.local
        } else {
            &mut inner.remote
        };
        for msg in msgs {
            stream.push_back(msg);
            self.semaphore.post();
        }
        n
    }

    /// Extracts the next batch for the paint thread: the first message,
    /// preferring the local stream over the remote stream (spec.md §4.3
    /// step 1), then as many more messages from that *same* stream as
    /// `accept_more` approves, each additional acceptance consuming one
    /// semaphore unit without blocking. Returns `None` if both streams are
    /// empty (a shutdown-only wake).
    ///
    /// `accept_more(next_message, already_taken_count, area_total_so_far)`.
    pub fn shift_batch(
        &self,
        mut accept_more: impl FnMut(&QueuedMessage, usize, u64) -> bool,
    ) -> Option<(StreamOrigin, Vec<QueuedMessage>)> {
        let mut inner = self.inner.lock();
        let origin = if !inner.local.is_empty() {
            StreamOrigin::Local
        } else if !inner.remote.is_empty() {
            StreamOrigin::Remote
        } else {
            return None;
        };

        let first = {
            let stream = match origin {
                StreamOrigin::Local => &mut inner.local,
                StreamOrigin::Remote => &mut inner.remote,
            };
            stream.pop_front().expect("checked non-empty above")
        };
        let mut area_total = first.dab_area();
        let mut batch = vec![first];

        loop {
            let stream = match origin {
                StreamOrigin::Local => &mut inner.local,
                StreamOrigin::Remote => &mut inner.remote,
            };
            let Some(next) = stream.front() else {
                break;
            };
            if !accept_more(next, batch.len(), area_total) {
                break;
            }
            let next = stream.pop_front().expect("front() just returned Some");
            area_total += next.dab_area();
            batch.push(next);
            self.semaphore.decrement_already_posted();
        }

        Some((origin, batch))
    }

    /// Drains every pending message in both streams without touching the
    /// semaphore (teardown only; spec.md §5 requires any pending preview
    /// among these to have `dispose` invoked by the caller).
    pub fn drain_all(&self) -> Vec<QueuedMessage> {
        let mut inner = self.inner.lock();
        let mut drained: Vec<QueuedMessage> = inner.local.drain(..).collect();
        drained.extend(inner.remote.drain(..));
        drained
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.local.len() + inner.remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn semaphore_value(&self) -> usize {
        self.semaphore.value()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        MessageQueue::new()
    }
}
