//! The thread registry: a read-only observation interface over per-thread
//! "visit time" atomics, plus the bookkeeping needed to register and
//! deregister threads.
//!
//! A real pub/sub middleware host owns this registry and the rest of its
//! thread-creation machinery. It is bundled here anyway because an engine
//! crate with nothing to observe isn't testable: [`ThreadRegistry`] is the
//! reference implementation a real host would otherwise supply.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::domain::DomainId;

const BATCH_SIZE: usize = 64;

pub(crate) struct Slot {
    pub(crate) vtime: CachePadded<AtomicU32>,
    pub(crate) domain: CachePadded<AtomicUsize>,
    #[cfg(feature = "nested-domains")]
    pub(crate) nested_domain: CachePadded<AtomicUsize>,
}

impl Slot {
    fn new() -> Self {
        Slot {
            vtime: CachePadded::new(AtomicU32::new(0)),
            domain: CachePadded::new(AtomicUsize::new(DomainId::NONE)),
            #[cfg(feature = "nested-domains")]
            nested_domain: CachePadded::new(AtomicUsize::new(DomainId::NONE)),
        }
    }
}

pub(crate) struct SlotBatch {
    pub(crate) slots: Vec<Slot>,
    used: Vec<bool>,
}

impl SlotBatch {
    fn new(size: usize) -> Self {
        let mut slots = Vec::with_capacity(size);
        for _ in 0..size {
            slots.push(Slot::new());
        }
        SlotBatch {
            slots,
            used: vec![false; size],
        }
    }
}

/// A growable registry of per-thread visit-time slots.
///
/// Batches are appended, never removed or moved in memory, so a slot
/// reference handed out by [`ThreadRegistry::register`] stays valid for the
/// lifetime of the registry. Registration takes the write side of the lock;
/// the VTime observer's `gather`/`verify` passes take the read side, so they
/// don't contend with each other beyond the rare case of a thread joining or
/// leaving mid-sweep.
pub struct ThreadRegistry {
    batches: RwLock<Vec<Box<SlotBatch>>>,
}

impl ThreadRegistry {
    /// Creates an empty registry, sized for roughly one batch per CPU to
    /// avoid the first few threads each forcing a new allocation.
    pub fn new() -> Arc<Self> {
        let hint = num_cpus::get().max(1);
        Arc::new(ThreadRegistry {
            batches: RwLock::new(Vec::with_capacity((hint + BATCH_SIZE - 1) / BATCH_SIZE)),
        })
    }

    /// Registers the calling thread, returning a guard that publishes its
    /// awake/asleep transitions until dropped.
    pub fn register(self: &Arc<Self>) -> ThreadHandle {
        let mut batches = self.batches.write().unwrap();
        for (bi, batch) in batches.iter_mut().enumerate() {
            if let Some(si) = batch.used.iter().position(|u| !u) {
                batch.used[si] = true;
                return ThreadHandle {
                    registry: Arc::clone(self),
                    batch: bi,
                    slot: si,
                };
            }
        }
        let bi = batches.len();
        let mut batch = Box::new(SlotBatch::new(BATCH_SIZE));
        batch.used[0] = true;
        batches.push(batch);
        ThreadHandle {
            registry: Arc::clone(self),
            batch: bi,
            slot: 0,
        }
    }

    fn release(&self, batch: usize, slot: usize) {
        let mut batches = self.batches.write().unwrap();
        batches[batch].used[slot] = false;
    }

    pub(crate) fn with_read<R>(&self, f: impl FnOnce(&[Box<SlotBatch>]) -> R) -> R {
        let batches = self.batches.read().unwrap();
        f(&batches)
    }
}

/// RAII registration of one thread in a [`ThreadRegistry`].
///
/// Dropping the handle clears the slot's domain id (modeling thread
/// departure: a thread that no longer belongs to this domain) and marks it
/// asleep, then returns the slot to the free list.
pub struct ThreadHandle {
    registry: Arc<ThreadRegistry>,
    batch: usize,
    slot: usize,
}

impl ThreadHandle {
    /// Publishes `domain` and raises the awake bit, ordered so that any
    /// observer reading the vtime with an acquire load and then fencing
    /// before reading the domain id sees a domain that was valid at the
    /// moment this thread became awake.
    pub fn enter(&self, domain: DomainId) -> AwakeGuard<'_> {
        self.publish_awake(domain)
    }

    /// Enters a domain-independent awake state, used around work (such as
    /// the lease sweep) that isn't gated on a specific domain's vtime
    /// protocol but still needs to mark the thread as making progress.
    pub fn enter_fixed(&self, domain: DomainId) -> AwakeGuard<'_> {
        self.publish_awake(domain)
    }

    /// Enters `domain` while also publishing `nested`, a secondary domain
    /// pointer a snapshot gathered for either `domain` or `nested` will
    /// match. Only meaningful with the `nested-domains` feature enabled;
    /// without it a thread belongs to exactly one domain.
    #[cfg(feature = "nested-domains")]
    pub fn enter_nested(&self, domain: DomainId, nested: DomainId) -> AwakeGuard<'_> {
        self.registry.with_read(|batches| {
            let slot = &batches[self.batch].slots[self.slot];
            slot.nested_domain.store(nested.get(), Ordering::Relaxed);
        });
        self.publish_awake(domain)
    }

    fn publish_awake(&self, domain: DomainId) -> AwakeGuard<'_> {
        self.registry.with_read(|batches| {
            let slot = &batches[self.batch].slots[self.slot];
            slot.domain.store(domain.get(), Ordering::Relaxed);
            let prev = slot.vtime.load(Ordering::Relaxed);
            slot.vtime.store(prev.wrapping_add(1) | 1, Ordering::Release);
        });
        AwakeGuard { handle: self }
    }

    fn publish_asleep(&self) {
        self.registry.with_read(|batches| {
            let slot = &batches[self.batch].slots[self.slot];
            let prev = slot.vtime.load(Ordering::Relaxed);
            slot.vtime
                .store(prev.wrapping_add(1) & !1, Ordering::Release);
        });
    }
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        self.registry.with_read(|batches| {
            let slot = &batches[self.batch].slots[self.slot];
            slot.domain.store(DomainId::NONE, Ordering::Relaxed);
            #[cfg(feature = "nested-domains")]
            slot.nested_domain.store(DomainId::NONE, Ordering::Relaxed);
        });
        self.publish_asleep();
        self.registry.release(self.batch, self.slot);
    }
}

/// Marks a thread asleep again when dropped.
///
/// Returned by [`ThreadHandle::enter`]/[`ThreadHandle::enter_fixed`]; holding
/// it is what it means for the thread to be "awake" in the target domain.
pub struct AwakeGuard<'a> {
    handle: &'a ThreadHandle,
}

impl Drop for AwakeGuard<'_> {
    fn drop(&mut self) {
        self.handle.publish_asleep();
    }
}
