//! The lease-expiry collaborator: a periodic sweep, invoked from the same
//! worker that drains the request queue, that converts expired liveness
//! leases into further reclamation requests.
//!
//! The sweep is a pure external callback from this engine's point of view
//! (`check_and_handle_expiration(domain, now) -> next_delay`); it may itself
//! enqueue requests on the same queue that calls it, so it must be
//! `Send + Sync` and is free to be fully reentrant with respect to the
//! worker.

use std::time::{Duration, Instant};

use crate::domain::DomainId;

/// Sweeps expired leases for a domain, returning the delay until the next
/// lease is due to expire. The worker clamps its idle wait to this value so
/// expiries fire on time.
pub trait LeaseSweep: Send + Sync {
    fn check_and_handle_expiration(&self, domain: DomainId, now: Instant) -> Duration;
}

impl<F> LeaseSweep for F
where
    F: Fn(DomainId, Instant) -> Duration + Send + Sync,
{
    fn check_and_handle_expiration(&self, domain: DomainId, now: Instant) -> Duration {
        self(domain, now)
    }
}

/// A lease sweep with nothing to expire; always reports the default
/// max-delay, i.e. "nothing due soon". Used when a queue has no lease
/// subsystem wired in, and by most tests.
pub struct NoopLeaseSweep;

impl LeaseSweep for NoopLeaseSweep {
    fn check_and_handle_expiration(&self, _domain: DomainId, _now: Instant) -> Duration {
        crate::config::DEFAULT_MAX_DELAY
    }
}
