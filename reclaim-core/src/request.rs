//! A Request: a callback paired with the vtime snapshot it is gated on.
//!
//! A Request exists from creation until its callback returns without
//! re-enqueueing, and freeing it decrements the owning queue's live count,
//! broadcasting once at most one Request remains. Rust's `Drop` expresses
//! that directly: a `Request` that is neither requeued nor explicitly kept
//! alive decrements the count and broadcasts when it goes out of scope, so
//! "freeing" falls out of normal ownership rather than needing a manual
//! call on every exit path.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::log::Event;
use crate::queue::QueueShared;
use crate::vtime::Snapshot;

pub(crate) type Callback = Box<dyn FnOnce(Request) + Send>;

/// A pending or in-flight reclamation request.
///
/// Holds a non-owning (`Weak`) back-reference to its queue: the queue
/// outlives every request it ever creates (the shutdown protocol guarantees
/// that), so a `Request` never needs to keep its queue alive, and using
/// `Weak` here keeps teardown simple — there is no cycle to break.
pub struct Request {
    pub(crate) queue: Weak<QueueShared>,
    pub(crate) callback: Option<Callback>,
    pub(crate) snapshot: Snapshot,
    arg: Option<Box<dyn Any + Send>>,
}

impl Request {
    pub(crate) fn new(queue: Weak<QueueShared>, callback: Callback, snapshot: Snapshot) -> Self {
        Request {
            queue,
            callback: Some(callback),
            snapshot,
            arg: None,
        }
    }

    /// Appends this request to the tail of its queue. Returns whether it
    /// became the head (informational only).
    pub fn enqueue(self) -> bool {
        let shared = self
            .queue
            .upgrade()
            .expect("request outlived its queue");
        shared.enqueue_request(self)
    }

    /// Overwrites the callback and re-enqueues at the tail.
    ///
    /// The snapshot is **not** refreshed: this path is for a callback that
    /// already observed progress and wants to run a further phase eagerly.
    /// The worker will still re-verify before invoking the new callback,
    /// but against the same (possibly already-emptied) snapshot. A callback
    /// that needs a fresh progress gate should create a new `Request`
    /// instead.
    pub fn requeue(mut self, new_callback: impl FnOnce(Request) + Send + 'static) -> bool {
        self.callback = Some(Box::new(new_callback));
        let shared = self
            .queue
            .upgrade()
            .expect("request outlived its queue");
        shared.logger.log(|| Event::RequestRequeued);
        shared.enqueue_request(self)
    }

    /// Frees the request immediately.
    ///
    /// Equivalent to simply dropping it; kept as an explicit method so
    /// callers used to `request_free` have something to call.
    pub fn free(self) {}

    /// Stashes an opaque value on the request, replacing whatever was
    /// stashed before. Not inspected by the engine; this is scratch space
    /// for a callback chain to pass state from one phase to the next across
    /// a `requeue`.
    pub fn set_arg<T: Any + Send>(&mut self, value: T) {
        self.arg = Some(Box::new(value));
    }

    /// Borrows the stashed value if one is present and its type matches.
    pub fn get_arg<T: Any + Send>(&self) -> Option<&T> {
        self.arg.as_ref().and_then(|a| a.downcast_ref::<T>())
    }

    /// Removes and returns the stashed value if one is present and its type
    /// matches, leaving the scratchpad empty.
    pub fn take_arg<T: Any + Send>(&mut self) -> Option<T> {
        self.arg.take().and_then(|a| a.downcast::<T>().ok()).map(|b| *b)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("snapshot_len", &self.snapshot.len())
            .finish()
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if let Some(shared) = self.queue.upgrade() {
            shared.on_request_freed();
        }
    }
}
