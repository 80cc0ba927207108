//! Cross-thread dispatch queue.
//!
//! Tool invocations must run on the host application's single logical
//! thread, because tools are expected to call host APIs that are not safe to
//! touch from anywhere else. Network reads, by contrast, must never block
//! that thread. Connection threads therefore parse requests off the wire and
//! enqueue the minimal "handle and reply" step here; the host's periodic
//! tick drains the queue and executes each step in order.
//!
//! The queue is the only mutable state shared between connection threads and
//! the host tick. Both operations are O(1) critical sections under one
//! mutex; no lock is held while an invocation runs. Because all invocations
//! funnel through the single consumer, no two tool bodies ever execute
//! concurrently, and tools need no synchronization of their own.

use crate::logging;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

/// A parsed request waiting for the host tick.
///
/// Created by a connection's read loop, consumed exactly once by
/// [`DispatchQueue::drain_once`].
pub(crate) type PendingInvocation = Box<dyn FnOnce() + Send>;

/// FIFO handoff from connection threads to the host tick.
pub(crate) struct DispatchQueue {
    pending: Mutex<VecDeque<PendingInvocation>>,
}

impl DispatchQueue {
    pub(crate) fn new() -> Self {
        DispatchQueue {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues an invocation. Safe to call from any number of threads.
    pub(crate) fn enqueue(&self, invocation: impl FnOnce() + Send + 'static) {
        self.pending.lock().unwrap().push_back(Box::new(invocation));
    }

    /// Dequeues and executes queued invocations in FIFO order.
    ///
    /// Returns the number of invocations executed. Never blocks waiting for
    /// new work: once the queue is observed empty, control returns to the
    /// host. A panicking invocation is logged and does not poison the queue
    /// or abort the drain.
    pub(crate) fn drain_once(&self) -> usize {
        let mut executed = 0;
        loop {
            let invocation = {
                let mut pending = self.pending.lock().unwrap();
                match pending.pop_front() {
                    Some(invocation) => invocation,
                    None => break,
                }
            };
            // lock released; the invocation may enqueue more work
            if std::panic::catch_unwind(AssertUnwindSafe(invocation)).is_err() {
                logging::log("gantry: queued invocation panicked");
            }
            executed += 1;
        }
        executed
    }
}
