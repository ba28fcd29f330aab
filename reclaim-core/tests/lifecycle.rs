use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use reclaim_core::{DomainId, QueueBuilder, RequestQueue, ThreadRegistry};

#[test]
fn progress_gating_waits_for_a_real_thread_to_advance() {
    let registry = ThreadRegistry::new();
    let domain = DomainId::new();
    let queue = RequestQueue::new(domain, Arc::clone(&registry));
    assert!(queue.start());

    let ran = Arc::new(AtomicUsize::new(0));
    let ran2 = Arc::clone(&ran);

    let handle = registry.register();
    let guard = handle.enter(domain);

    let request = queue.new_request(move |req| {
        ran2.fetch_add(1, Ordering::SeqCst);
        req.free();
    });
    request.enqueue();

    thread::sleep(Duration::from_millis(10));
    assert_eq!(ran.load(Ordering::SeqCst), 0, "must not dispatch while the thread is still awake");

    drop(guard);
    let guard = handle.enter(domain);
    drop(guard);
    drop(handle);

    queue.drain();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn worker_exits_after_shutdown_and_runs_no_further_callbacks() {
    let registry = ThreadRegistry::new();
    let domain = DomainId::new();
    let queue = RequestQueue::new(domain, Arc::clone(&registry));
    assert!(queue.start());

    let order = Arc::new(Mutex::new(Vec::new()));
    let order2 = Arc::clone(&order);
    let order3 = Arc::clone(&order);

    let r1 = queue.new_request(move |req| {
        order2.lock().unwrap().push(1);
        req.free();
    });
    r1.enqueue();
    let r2 = queue.new_request(move |req| {
        order3.lock().unwrap().push(2);
        req.free();
    });
    r2.enqueue();

    queue.shutdown();
    assert_eq!(*order.lock().unwrap(), vec![1, 2]);

    // A second shutdown call must be a no-op, not a hang or a panic.
    queue.shutdown();
}

#[test]
fn deaf_mode_wakes_worker_repeatedly_on_an_empty_queue() {
    let registry = ThreadRegistry::new();
    let domain = DomainId::new();
    let sweeps = Arc::new(AtomicUsize::new(0));
    let sweeps2 = Arc::clone(&sweeps);

    let queue = QueueBuilder::new(domain, Arc::clone(&registry))
        .deaf_max_delay(Duration::from_millis(20))
        .lease_sweep(move |_domain, _now| {
            sweeps2.fetch_add(1, Ordering::SeqCst);
            Duration::from_millis(20)
        })
        .build();
    queue.set_deaf(true);
    assert!(queue.start());

    thread::sleep(Duration::from_millis(150));
    queue.shutdown();

    assert!(
        sweeps.load(Ordering::SeqCst) >= 3,
        "deaf mode should wake the worker well under the non-deaf 1000s ceiling"
    );
}

#[test]
fn stepper_on_empty_queue_invokes_nothing() {
    let registry = ThreadRegistry::new();
    let domain = DomainId::new();
    let queue = RequestQueue::new(domain, Arc::clone(&registry));
    let stepper = registry.register();
    assert!(!queue.step(&stepper));
    assert!(!queue.step(&stepper));
}

#[test]
fn departed_thread_retires_request_without_progress() {
    let registry = ThreadRegistry::new();
    let domain = DomainId::new();
    let queue = RequestQueue::new(domain, Arc::clone(&registry));
    let stepper = registry.register();

    let handle = registry.register();
    let guard = handle.enter(domain);
    let request = queue.new_request(|req| req.free());
    request.enqueue();

    assert!(queue.step(&stepper), "request not yet eligible while thread is awake");

    drop(guard);
    drop(handle); // thread departs the registry entirely, no further vtime bump

    assert!(!queue.step(&stepper), "departure alone must retire the snapshot entry");
}
