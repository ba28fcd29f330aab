use std::sync::atomic::{AtomicUsize, Ordering};

/// Identifies the isolation boundary a set of threads and requests belong to.
///
/// A `DomainId` is an opaque, process-wide-unique, `Copy` token: it is what
/// gets stored in a thread-registry slot's domain field and compared against
/// when gathering and verifying a [`crate::request::Request`]'s snapshot.
/// `0` is reserved to mean "no domain" (a departed or never-registered
/// thread), so the first domain handed out is `1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DomainId(usize);

impl DomainId {
    /// Allocates a fresh, process-wide-unique domain id.
    pub fn new() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(1);
        DomainId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) const NONE: usize = 0;

    pub(crate) fn get(self) -> usize {
        self.0
    }
}

impl Default for DomainId {
    fn default() -> Self {
        Self::new()
    }
}
