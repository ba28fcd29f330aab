//! Compile-time-ish configuration, assembled through a builder that
//! accumulates settings and hands them to the queue constructor in one
//! shot.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::DomainId;
use crate::lease::{LeaseSweep, NoopLeaseSweep};
use crate::log::Logger;
use crate::queue::RequestQueue;
use crate::registry::ThreadRegistry;

/// Default idle-wait ceiling when the domain is not deaf.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);
/// Idle-wait ceiling while the domain is deaf, so the receive-side
/// subsystem still gets periodic wake-ups.
pub const DEAF_MAX_DELAY: Duration = Duration::from_millis(100);
/// Retry interval when a dequeued request's snapshot still has live
/// entries; there is no condition variable to wait on for vtime progress,
/// so a short poll is the only correct choice.
pub const SHORT_SLEEP: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub(crate) struct QueueConfig {
    pub(crate) default_max_delay: Duration,
    pub(crate) deaf_max_delay: Duration,
    pub(crate) short_sleep: Duration,
    pub(crate) thread_name: Option<String>,
    pub(crate) stack_size: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            default_max_delay: DEFAULT_MAX_DELAY,
            deaf_max_delay: DEAF_MAX_DELAY,
            short_sleep: SHORT_SLEEP,
            thread_name: None,
            stack_size: None,
        }
    }
}

/// Builds a [`RequestQueue`] for a domain against a given thread registry.
///
/// Configuration is accumulated by consuming `self` and returning it back
/// (so calls chain), then `build()` assembles the queue. This never spawns a
/// thread itself — that's a separate `RequestQueue::start()` call, keeping
/// "constructed" and "started" as distinct lifecycle steps.
pub struct QueueBuilder {
    domain: DomainId,
    registry: Arc<ThreadRegistry>,
    lease: Arc<dyn LeaseSweep>,
    logger: Logger,
    config: QueueConfig,
}

impl QueueBuilder {
    pub fn new(domain: DomainId, registry: Arc<ThreadRegistry>) -> Self {
        QueueBuilder {
            domain,
            registry,
            lease: Arc::new(NoopLeaseSweep),
            logger: Logger::default(),
            config: QueueConfig::default(),
        }
    }

    pub fn lease_sweep(mut self, lease: impl LeaseSweep + 'static) -> Self {
        self.lease = Arc::new(lease);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn default_max_delay(mut self, delay: Duration) -> Self {
        self.config.default_max_delay = delay;
        self
    }

    pub fn deaf_max_delay(mut self, delay: Duration) -> Self {
        self.config.deaf_max_delay = delay;
        self
    }

    pub fn short_sleep(mut self, delay: Duration) -> Self {
        self.config.short_sleep = delay;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = Some(name.into());
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    pub fn build(self) -> RequestQueue {
        RequestQueue::from_builder(self.domain, self.registry, self.lease, self.logger, self.config)
    }
}
