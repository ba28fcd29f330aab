//! The deferred-reclamation engine: a quiescent-state-based garbage
//! collector for domains of registered threads.
//!
//! A [`queue::RequestQueue`] holds [`request::Request`]s gated on a
//! snapshot of which threads in its [`domain::DomainId`] were awake at
//! creation time. A request becomes eligible once every thread in its
//! snapshot has either made further progress (its `vtime` counter
//! advanced) or left the domain; eligible requests run their callback on
//! the queue's single worker thread, in FIFO order with respect to other
//! eligible requests ahead of them.
//!
//! This crate is the engine; `reclaim` (the workspace root) is the public
//! facade most consumers should depend on instead.

mod config;
mod domain;
mod error;
mod lease;
mod log;
mod queue;
mod registry;
mod request;
mod vtime;

pub use config::{QueueBuilder, DEAF_MAX_DELAY, DEFAULT_MAX_DELAY, SHORT_SLEEP};
pub use domain::DomainId;
pub use error::StartError;
pub use lease::{LeaseSweep, NoopLeaseSweep};
pub use log::{Event, Logger};
pub use queue::RequestQueue;
pub use registry::{ThreadHandle, ThreadRegistry};
pub use request::Request;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn immediate_dispatch_with_empty_snapshot() {
        let registry = ThreadRegistry::new();
        let domain = DomainId::new();
        let queue = RequestQueue::new(domain, Arc::clone(&registry));
        assert!(queue.start());

        let flag = Arc::new(AtomicBool::new(false));
        let flag2 = Arc::clone(&flag);
        let request = queue.new_request(move |req| {
            flag2.store(true, Ordering::SeqCst);
            req.free();
        });
        request.enqueue();

        queue.drain();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn progress_gating_blocks_until_thread_advances() {
        let registry = ThreadRegistry::new();
        let domain = DomainId::new();
        let queue = RequestQueue::new(domain, Arc::clone(&registry));
        let stepper = registry.register();
        let handle = registry.register();
        let guard = handle.enter(domain);

        let flag = Arc::new(AtomicBool::new(false));
        let flag2 = Arc::clone(&flag);
        let request = queue.new_request(move |req| {
            flag2.store(true, Ordering::SeqCst);
            req.free();
        });
        request.enqueue();
        assert!(queue.step(&stepper));
        assert!(!flag.load(Ordering::SeqCst));

        drop(guard);
        drop(handle);
        while queue.step(&stepper) {}
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn fifo_under_pressure() {
        let registry = ThreadRegistry::new();
        let domain = DomainId::new();
        let queue = RequestQueue::new(domain, Arc::clone(&registry));
        let stepper = registry.register();

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            let request = queue.new_request(move |req| {
                order.lock().unwrap().push(i);
                req.free();
            });
            request.enqueue();
        }
        while queue.step(&stepper) {}
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn multi_phase_requeue_runs_both_phases() {
        let registry = ThreadRegistry::new();
        let domain = DomainId::new();
        let queue = RequestQueue::new(domain, Arc::clone(&registry));
        let stepper = registry.register();

        let log = Arc::new(std::sync::Mutex::new(String::new()));
        let log2 = Arc::clone(&log);
        let request = queue.new_request(move |req| {
            log2.lock().unwrap().push_str("P1");
            req.requeue(move |req2| {
                log2.lock().unwrap().push_str(" P2");
                req2.free();
            });
        });
        request.enqueue();

        while queue.step(&stepper) {}
        assert_eq!(*log.lock().unwrap(), "P1 P2");

        // live_count must settle back to 0 only once P2 has actually run and
        // freed the request, not merely once P1 has handed off via requeue.
        queue.drain();
    }

    #[test]
    fn multi_phase_requeue_carries_state_through_arg() {
        let registry = ThreadRegistry::new();
        let domain = DomainId::new();
        let queue = RequestQueue::new(domain, Arc::clone(&registry));
        let stepper = registry.register();

        let seen = Arc::new(AtomicBool::new(false));
        let seen2 = Arc::clone(&seen);
        let request = queue.new_request(move |mut req| {
            req.set_arg(41u32);
            assert_eq!(req.get_arg::<u32>(), Some(&41));
            req.requeue(move |mut req2| {
                let carried: u32 = req2.take_arg().expect("arg set by P1 must survive the requeue");
                assert!(req2.get_arg::<u32>().is_none(), "take_arg must empty the scratchpad");
                seen2.store(carried + 1 == 42, Ordering::SeqCst);
                req2.free();
            });
        });
        request.enqueue();

        while queue.step(&stepper) {}
        assert!(seen.load(Ordering::SeqCst));
        queue.drain();
    }

    #[test]
    fn step_on_empty_queue_returns_false() {
        let registry = ThreadRegistry::new();
        let domain = DomainId::new();
        let queue = RequestQueue::new(domain, Arc::clone(&registry));
        let stepper = registry.register();
        assert!(!queue.step(&stepper));
    }

    #[test]
    fn shutdown_waits_for_in_flight_chain() {
        let registry = ThreadRegistry::new();
        let domain = DomainId::new();
        let queue = Arc::new(RequestQueue::new(domain, Arc::clone(&registry)));
        assert!(queue.start());

        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = Arc::clone(&ran);
        let queue2 = Arc::clone(&queue);
        let r1 = queue.new_request(move |req| {
            let ran3 = Arc::clone(&ran2);
            let r2 = queue2.new_request(move |req2| {
                ran3.store(true, Ordering::SeqCst);
                req2.free();
            });
            r2.enqueue();
            req.free();
        });
        r1.enqueue();

        queue.shutdown();
        assert!(ran.load(Ordering::SeqCst));
    }
}
