//! Quiescent-state deferred reclamation: free shared state only after every
//! thread that might still be holding a reference to it has demonstrably
//! moved past the point where it took that reference.
//!
//! ```
//! use reclaim::{DomainId, RequestQueue, ThreadRegistry};
//! use std::sync::Arc;
//!
//! let registry = ThreadRegistry::new();
//! let domain = DomainId::new();
//! let queue = RequestQueue::new(domain, Arc::clone(&registry));
//! queue.start();
//!
//! let request = queue.new_request(|req| {
//!     // runs once every thread that was awake in `domain` at the time
//!     // this request was created has since made progress or departed.
//!     req.free();
//! });
//! request.enqueue();
//! queue.drain();
//! ```
//!
//! This crate is a thin re-export of `reclaim-core`, which holds the full
//! implementation and is kept separate so it can be depended on directly by
//! code that wants the engine without any facade-level conveniences added
//! later.

pub use reclaim_core::{
    DomainId, Event, LeaseSweep, Logger, NoopLeaseSweep, QueueBuilder, Request, RequestQueue,
    StartError, ThreadRegistry, DEAF_MAX_DELAY, DEFAULT_MAX_DELAY, SHORT_SLEEP,
};
