//! The Request Queue and its worker: a FIFO of pending requests gated on
//! the VTime observer, serviced by exactly one dedicated thread, plus the
//! non-blocking [`RequestQueue::step`] driver used when there is no worker
//! thread at all.
//!
//! See `DESIGN.md` for the grounding behind the worker loop, the deaf-mode
//! max-delay clamp, the short-sleep retry, and the shutdown sentinel dance.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::QueueConfig;
use crate::domain::DomainId;
use crate::lease::LeaseSweep;
use crate::log::{Event, Logger};
use crate::registry::{ThreadHandle, ThreadRegistry};
use crate::request::{Callback, Request};
use crate::vtime;

pub(crate) struct QueueState {
    pending: VecDeque<Request>,
    live_count: usize,
    terminate: bool,
}

pub(crate) struct QueueShared {
    pub(crate) domain: DomainId,
    registry: Arc<ThreadRegistry>,
    lease: Arc<dyn LeaseSweep>,
    pub(crate) logger: Logger,
    config: QueueConfig,
    deaf: AtomicBool,
    state: Mutex<QueueState>,
    cond: Condvar,
}

impl QueueShared {
    /// Appends `request` to the tail. Broadcasts if the queue was empty,
    /// so a waiting worker wakes on the first enqueue rather than its next
    /// timeout.
    pub(crate) fn enqueue_request(&self, request: Request) -> bool {
        let mut state = self.state.lock().unwrap();
        let became_head = state.pending.is_empty();
        state.pending.push_back(request);
        if became_head {
            self.cond.notify_all();
        }
        self.logger.log(|| Event::RequestEnqueued { became_head });
        became_head
    }

    /// Called from `Request::drop`: decrements `live_count` and broadcasts
    /// once at most one request remains (the threshold the shutdown
    /// protocol and `drain` both watch for).
    pub(crate) fn on_request_freed(&self) {
        let mut state = self.state.lock().unwrap();
        state.live_count -= 1;
        if state.live_count <= 1 {
            self.cond.notify_all();
        }
    }

    fn create_request(self: &Arc<Self>, callback: Callback, snapshot: crate::vtime::Snapshot) -> Request {
        let mut state = self.state.lock().unwrap();
        state.live_count += 1;
        let live_count = state.live_count;
        drop(state);
        self.logger.log(|| Event::RequestCreated { live_count });
        Request::new(Arc::downgrade(self), callback, snapshot)
    }
}

/// A FIFO queue of deferred-reclamation requests, serviced by at most one
/// dedicated worker thread.
///
/// Construct with [`crate::config::QueueBuilder`] (or [`RequestQueue::new`]
/// for the defaults), then call [`RequestQueue::start`] to spawn the
/// worker, or drive it yourself with [`RequestQueue::step`] if you'd rather
/// not have a background thread (test/fuzz harnesses).
pub struct RequestQueue {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_started: AtomicBool,
}

impl RequestQueue {
    /// Builds a queue with default configuration and no lease sweep.
    pub fn new(domain: DomainId, registry: Arc<ThreadRegistry>) -> RequestQueue {
        crate::config::QueueBuilder::new(domain, registry).build()
    }

    pub(crate) fn from_builder(
        domain: DomainId,
        registry: Arc<ThreadRegistry>,
        lease: Arc<dyn LeaseSweep>,
        logger: Logger,
        config: QueueConfig,
    ) -> RequestQueue {
        let shared = Arc::new(QueueShared {
            domain,
            registry,
            lease,
            logger,
            config,
            deaf: AtomicBool::new(false),
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                live_count: 0,
                terminate: false,
            }),
            cond: Condvar::new(),
        });
        RequestQueue {
            shared,
            worker: Mutex::new(None),
            shutdown_started: AtomicBool::new(false),
        }
    }

    /// Marks the domain as "deaf": the worker shortens its idle wait so the
    /// receive-side machinery still gets periodic wake-ups.
    pub fn set_deaf(&self, deaf: bool) {
        self.shared.deaf.store(deaf, Ordering::Relaxed);
    }

    /// Creates a request gated on the current snapshot of awake threads in
    /// this queue's domain. The request is not enqueued yet — call
    /// [`Request::enqueue`].
    pub fn new_request(&self, callback: impl FnOnce(Request) + Send + 'static) -> Request {
        let snapshot = vtime::gather(&self.shared.registry, self.shared.domain);
        self.shared.create_request(Box::new(callback), snapshot)
    }

    fn new_sentinel(&self) -> Request {
        self.shared.create_request(Box::new(|_req: Request| {}), Vec::new())
    }

    /// Spawns the worker thread if it hasn't been started yet. Returns
    /// `false` if thread creation failed, in which case the queue remains
    /// usable via [`RequestQueue::step`] only.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return true;
        }
        let shared = Arc::clone(&self.shared);
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.shared.config.thread_name {
            builder = builder.name(name.clone());
        }
        if let Some(stack_size) = self.shared.config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        match builder.spawn(move || worker_loop(shared)) {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(err) => {
                let reason = crate::error::StartError::from_spawn_failure(err).to_string();
                self.shared.logger.log(|| Event::StartFailure { reason });
                false
            }
        }
    }

    /// Blocks until `live_count == 0`, i.e. every request this queue has
    /// ever created has been freed. Does not terminate the worker.
    pub fn drain(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while state.live_count != 0 {
            state = self.shared.cond.wait(state).unwrap();
        }
    }

    /// Non-blocking single-pass driver for harnesses with no worker thread.
    ///
    /// `thread` is the calling thread's own registration — it is marked
    /// awake in this queue's domain for the duration of each callback it
    /// runs, the same as the worker thread marks itself, rather than a
    /// fresh registration being allocated per call.
    ///
    /// Pops and verifies requests in FIFO order, running callbacks for
    /// every one that is immediately eligible. Gives up the instant a head
    /// request is not ready — pushing it back at the head — rather than
    /// sleeping, so test/fuzz harnesses make deterministic progress or
    /// detect a stall. Returns whether the queue is non-empty afterwards.
    pub fn step(&self, thread: &ThreadHandle) -> bool {
        loop {
            let mut request = {
                let mut state = self.shared.state.lock().unwrap();
                match state.pending.pop_front() {
                    Some(r) => r,
                    None => return false,
                }
            };
            if vtime::verify(&self.shared.registry, self.shared.domain, &mut request.snapshot) {
                let callback = request.callback.take().expect("request has no callback");
                let guard = thread.enter(self.shared.domain);
                callback(request);
                drop(guard);
            } else {
                let mut state = self.shared.state.lock().unwrap();
                state.pending.push_front(request);
                return true;
            }
        }
    }

    fn shutdown_impl(&self) {
        if self.shutdown_started.swap(true, Ordering::AcqRel) {
            return;
        }
        let handle = self.worker.lock().unwrap().take();
        let handle = match handle {
            Some(h) => h,
            None => {
                self.shared.state.lock().unwrap().terminate = true;
                return;
            }
        };

        let sentinel = self.new_sentinel();
        {
            let mut state = self.shared.state.lock().unwrap();
            state.terminate = true;
            while state.live_count != 1 {
                state = self.shared.cond.wait(state).unwrap();
            }
        }
        // Wakes the worker, which verifies the empty snapshot trivially,
        // runs the no-op callback, drops the sentinel (live_count -> 0),
        // and exits because `terminate && live_count == 0` now holds.
        self.shared.enqueue_request(sentinel);
        let _ = handle.join();
        self.shared.logger.log(|| Event::WorkerTerminated);
    }

    /// Terminates the worker (if any) and releases the queue. Idempotent;
    /// also runs automatically on drop.
    pub fn shutdown(&self) {
        self.shutdown_impl();
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.shutdown_impl();
    }
}

fn worker_loop(shared: Arc<QueueShared>) {
    shared.logger.log(|| Event::WorkerStarted);

    // Registers this worker thread itself so the lease sweep and the
    // per-request callback invocation both have a thread-state slot to
    // publish awake/asleep transitions through, the same as every other
    // thread that might observe this domain.
    let registered = shared.registry.register();

    let mut current: Option<Request> = None;
    let mut trace_shortsleep = true;
    // Seeded to `short_sleep`, not zero, to force the lease sweep to be
    // evaluated promptly on the very first iteration.
    let mut delay = shared.config.short_sleep;

    let mut state = shared.state.lock().unwrap();
    loop {
        if current.is_none() {
            if state.pending.is_empty() {
                let deaf = shared.deaf.load(Ordering::Relaxed);
                let max_delay = if deaf {
                    shared.config.deaf_max_delay
                } else {
                    shared.config.default_max_delay
                };
                let wait_for = delay.min(max_delay);
                let (guard, _timeout) = shared.cond.wait_timeout(state, wait_for).unwrap();
                state = guard;
            }
            current = state.pending.pop_front();
        }
        drop(state);

        {
            let guard = registered.enter_fixed(shared.domain);
            delay = shared
                .lease
                .check_and_handle_expiration(shared.domain, Instant::now());
            drop(guard);
        }
        shared.logger.log(|| Event::LeaseSweepDelay {
            next_ms: delay.as_millis() as u64,
        });

        if let Some(mut request) = current.take() {
            if vtime::verify(&shared.registry, shared.domain, &mut request.snapshot) {
                let callback = request.callback.take().expect("request has no callback");
                let guard = registered.enter(shared.domain);
                callback(request);
                drop(guard);
                shared.logger.log(|| Event::RequestDispatched);
                trace_shortsleep = true;
            } else {
                if trace_shortsleep {
                    shared.logger.log(|| Event::StuckRequest {
                        remaining: request.snapshot.len(),
                    });
                    trace_shortsleep = false;
                }
                thread::sleep(shared.config.short_sleep);
                current = Some(request);
            }
        }

        state = shared.state.lock().unwrap();
        if current.is_none() && state.terminate && state.live_count == 0 {
            break;
        }
    }
    drop(state);
    drop(registered);
}
