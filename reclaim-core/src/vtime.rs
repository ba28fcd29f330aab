//! The VTime observer: gathering a snapshot of awake threads in a domain,
//! and verifying that every thread in a snapshot has since made progress or
//! left the domain.
//!
//! The ordering contract this module relies on: a thread publishes its
//! owning domain before raising its awake bit, so a reader that loads vtime
//! first and fences before loading the domain either sees the domain that
//! was current while the thread was awake, or observes a vtime that has
//! since strictly advanced.

use std::sync::atomic::{fence, Ordering};

use crate::domain::DomainId;
use crate::registry::ThreadRegistry;

/// A per-thread visit-time counter. The low bit encodes "awake"; the whole
/// counter strictly increases across one asleep->awake->asleep cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct VTime(u32);

impl VTime {
    fn is_awake(self) -> bool {
        self.0 & 1 == 1
    }
}

/// One entry of a snapshot: which slot, and the vtime it had when captured.
///
/// Stored as batch/slot indices rather than a reference so a `Request` can
/// hold its snapshot across an arbitrary delay without borrowing the
/// registry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SnapshotEntry {
    batch: usize,
    slot: usize,
    vtime: u32,
}

pub(crate) type Snapshot = Vec<SnapshotEntry>;

/// Captures `(thread, vtime)` for every thread currently awake in `domain`.
///
/// Sleeping threads are skipped outright: a sleeping thread cannot be
/// holding a transient reference. For awake threads, the vtime is read with
/// an acquire load and then an acquire fence is issued before reading the
/// domain id, so that either the domain read is the one this thread had
/// while awake, or the thread has since cycled asleep->awake and its vtime
/// will have strictly advanced, causing `verify` to drop it.
pub(crate) fn gather(registry: &ThreadRegistry, domain: DomainId) -> Snapshot {
    registry.with_read(|batches| {
        let mut out = Snapshot::new();
        for (bi, batch) in batches.iter().enumerate() {
            for (si, slot) in batch.slots.iter().enumerate() {
                let vtime = slot.vtime.load(Ordering::Acquire);
                if VTime(vtime).is_awake() {
                    fence(Ordering::Acquire);
                    if slot_in_domain(slot, domain) {
                        out.push(SnapshotEntry {
                            batch: bi,
                            slot: si,
                            vtime,
                        });
                    }
                }
            }
        }
        out
    })
}

/// Removes every entry whose thread has either advanced its vtime or left
/// the domain since it was captured. Returns `true` once the snapshot is
/// empty, i.e. the request is now eligible.
pub(crate) fn verify(registry: &ThreadRegistry, domain: DomainId, snapshot: &mut Snapshot) -> bool {
    registry.with_read(|batches| {
        let mut i = 0;
        while i < snapshot.len() {
            let entry = snapshot[i];
            let slot = &batches[entry.batch].slots[entry.slot];
            let current = slot.vtime.load(Ordering::Acquire);
            let still_waiting = current == entry.vtime && slot_in_domain(slot, domain);
            if still_waiting {
                i += 1;
            } else {
                snapshot.swap_remove(i);
            }
        }
        snapshot.is_empty()
    })
}

fn slot_in_domain(slot: &crate::registry::Slot, domain: DomainId) -> bool {
    let owner = slot.domain.load(Ordering::Relaxed);
    let this_domain = owner == domain.get();
    #[cfg(feature = "nested-domains")]
    let this_domain = this_domain || slot.nested_domain.load(Ordering::Relaxed) == domain.get();
    this_domain
}
