//! A zero-cost internal event stream: a closure is only evaluated if a sink
//! is installed, so `logger.log(|| Event::RequestCreated { .. })` costs
//! nothing when nobody is listening.

use std::fmt;
use std::sync::Arc;

/// Diagnostic events emitted by the engine. None of these are load-bearing
/// for correctness; they exist purely to give a host process visibility
/// into what the queue and worker are doing.
#[derive(Clone, Debug)]
pub enum Event {
    RequestCreated { live_count: usize },
    RequestEnqueued { became_head: bool },
    RequestRequeued,
    RequestDispatched,
    /// Emitted once per stuck request, not once per poll (a throttle on the
    /// short-sleep retry so a long stall produces one trace line, not one
    /// per millisecond).
    StuckRequest { remaining: usize },
    LeaseSweepDelay { next_ms: u64 },
    WorkerStarted,
    WorkerTerminated,
    StartFailure { reason: String },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::RequestCreated { live_count } => write!(f, "request created, live_count={live_count}"),
            Event::RequestEnqueued { became_head } => write!(f, "request enqueued, became_head={became_head}"),
            Event::RequestRequeued => write!(f, "request requeued"),
            Event::RequestDispatched => write!(f, "request dispatched"),
            Event::StuckRequest { remaining } => write!(f, "request not yet eligible, {remaining} threads remaining"),
            Event::LeaseSweepDelay { next_ms } => write!(f, "lease sweep next due in {next_ms}ms"),
            Event::WorkerStarted => write!(f, "worker started"),
            Event::WorkerTerminated => write!(f, "worker terminated"),
            Event::StartFailure { reason } => write!(f, "failed to start worker: {reason}"),
        }
    }
}

type Sink = Arc<dyn Fn(Event) + Send + Sync>;

/// A cloneable handle to an optional event sink.
#[derive(Clone, Default)]
pub struct Logger {
    sink: Option<Sink>,
}

impl Logger {
    pub fn new(sink: Option<Sink>) -> Self {
        Logger { sink }
    }

    /// The default sink: bridges events to the `log` crate's `trace!`, for
    /// consumers who just want `RUST_LOG`-style output without writing a
    /// sink of their own.
    #[cfg(feature = "log-bridge")]
    pub fn log_crate_bridge() -> Self {
        Logger::new(Some(Arc::new(|event: Event| {
            log::trace!("reclaim: {event}");
        })))
    }

    #[inline]
    pub(crate) fn log(&self, event: impl FnOnce() -> Event) {
        if let Some(sink) = &self.sink {
            sink(event());
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("installed", &self.sink.is_some())
            .finish()
    }
}
