//! Disk-buffer ring: fixed-size raw USB payload slots shared between the
//! transfer worker (producer) and the processing worker (consumer).
//!
//! Each slot carries its occupancy as a `SlotState` rather than a bare
//! boolean flag, modeling the producer-owned/consumer-owned/to-skip split
//! directly as a sum type. Wait/notify is built on `Condvar` instead of a
//! spinning atomic: the processing worker genuinely wants to block, not
//! poll, while a slot fills.
//!
//! FIFO ordering is a contract the two workers keep by visiting slot
//! indices `0, 1, .., N-1, 0, ..` in lockstep; the ring itself does not
//! reorder or skip slots.

use std::sync::{Condvar, Mutex, MutexGuard};

/// Occupancy of one ring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Producer-owned: safe to fill.
    Empty,
    /// Consumer-owned: holds a completed transfer.
    Full,
    /// Consumer-owned, but must be skipped without processing.
    Dumping,
}

struct SlotInner {
    state: SlotState,
    data: Vec<u8>,
}

struct Slot {
    inner: Mutex<SlotInner>,
    cond: Condvar,
}

impl Slot {
    fn new(len: usize) -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: SlotState::Empty,
                data: vec![0u8; len],
            }),
            cond: Condvar::new(),
        }
    }
}

/// A ring of fixed-size disk buffers.
pub struct DiskBufferRing {
    slots: Vec<Slot>,
    slot_len: usize,
}

impl DiskBufferRing {
    /// `slot_count` and `slot_len` are computed by the supervisor from the
    /// USB transfer queue byte budget, the disk buffer queue byte budget,
    /// and the small-transfer flag.
    pub fn new(slot_count: usize, slot_len: usize) -> Self {
        assert!(slot_count > 0, "disk buffer ring needs at least one slot");
        let slots = (0..slot_count).map(|_| Slot::new(slot_len)).collect();
        Self { slots, slot_len }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_len(&self) -> usize {
        self.slot_len
    }

    /// Block until slot `i` is `Empty`, then return a guard the producer
    /// can fill and mark full.
    pub fn acquire_empty(&self, i: usize) -> EmptySlotGuard<'_> {
        let slot = &self.slots[i];
        let mut guard = slot.inner.lock().unwrap();
        while guard.state != SlotState::Empty {
            guard = slot.cond.wait(guard).unwrap();
        }
        EmptySlotGuard { slot, guard: Some(guard) }
    }

    /// Block until slot `i` is `Full` or `Dumping`, then return a guard
    /// the consumer can read and clear.
    pub fn acquire_full(&self, i: usize) -> SlotGuard<'_> {
        let slot = &self.slots[i];
        let mut guard = slot.inner.lock().unwrap();
        while guard.state == SlotState::Empty {
            guard = slot.cond.wait(guard).unwrap();
        }
        SlotGuard { slot, guard: Some(guard) }
    }

    /// Lock every slot's buffer into physical memory so the OS can't page
    /// it out mid-transfer. Best-effort per slot: the first failure is
    /// returned, leaving earlier slots pinned.
    pub fn pin_all(&self, pinner: &dyn crate::platform::MemoryPinner) -> Result<(), crate::platform::PlatformError> {
        for slot in &self.slots {
            let guard = slot.inner.lock().unwrap();
            pinner.pin(guard.data.as_ptr(), guard.data.len())?;
        }
        Ok(())
    }

    /// Reverse of [`Self::pin_all`], called once at shutdown.
    pub fn unpin_all(&self, pinner: &dyn crate::platform::MemoryPinner) -> Result<(), crate::platform::PlatformError> {
        for slot in &self.slots {
            let guard = slot.inner.lock().unwrap();
            pinner.unpin(guard.data.as_ptr(), guard.data.len())?;
        }
        Ok(())
    }

    /// Forced-drain helper: mark slot `i` `Dumping` and wake its waiters,
    /// regardless of current state, unless it is already `Full` (in which
    /// case the consumer still owns real data and must process it).
    pub fn force_dump_if_not_full(&self, i: usize) {
        let slot = &self.slots[i];
        let mut guard = slot.inner.lock().unwrap();
        if guard.state == SlotState::Empty {
            guard.state = SlotState::Dumping;
            slot.cond.notify_all();
        }
    }
}

/// Producer-side handle to an `Empty` slot.
pub struct EmptySlotGuard<'a> {
    slot: &'a Slot,
    guard: Option<MutexGuard<'a, SlotInner>>,
}

impl<'a> EmptySlotGuard<'a> {
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.guard.as_mut().unwrap().data
    }

    /// Mark the slot `Full` and wake the consumer.
    pub fn mark_full(mut self) {
        let mut guard = self.guard.take().unwrap();
        guard.state = SlotState::Full;
        drop(guard);
        self.slot.cond.notify_all();
    }
}

/// Consumer-side handle to a `Full` or `Dumping` slot.
pub struct SlotGuard<'a> {
    slot: &'a Slot,
    guard: Option<MutexGuard<'a, SlotInner>>,
}

impl<'a> SlotGuard<'a> {
    pub fn is_dumping(&self) -> bool {
        self.guard.as_ref().unwrap().state == SlotState::Dumping
    }

    pub fn data(&self) -> &[u8] {
        &self.guard.as_ref().unwrap().data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.guard.as_mut().unwrap().data
    }

    /// Clear the slot back to `Empty` and wake the producer.
    pub fn mark_empty(mut self) {
        let mut guard = self.guard.take().unwrap();
        guard.state = SlotState::Empty;
        drop(guard);
        self.slot.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fill_and_drain_in_order() {
        let ring = DiskBufferRing::new(4, 16);
        for i in 0..4 {
            let mut g = ring.acquire_empty(i);
            g.data_mut()[0] = i as u8;
            g.mark_full();
        }
        for i in 0..4 {
            let g = ring.acquire_full(i);
            assert!(!g.is_dumping());
            assert_eq!(g.data()[0], i as u8);
            g.mark_empty();
        }
    }

    #[test]
    fn force_dump_unblocks_consumer() {
        let ring = Arc::new(DiskBufferRing::new(2, 8));
        ring.force_dump_if_not_full(0);
        let g = ring.acquire_full(0);
        assert!(g.is_dumping());
        g.mark_empty();
    }

    #[test]
    fn consumer_blocks_until_producer_fills() {
        let ring = Arc::new(DiskBufferRing::new(2, 8));
        let ring2 = ring.clone();
        let handle = thread::spawn(move || {
            let g = ring2.acquire_full(0);
            assert!(!g.is_dumping());
            g.mark_empty();
        });
        thread::sleep(std::time::Duration::from_millis(20));
        let mut g = ring.acquire_empty(0);
        g.data_mut()[0] = 42;
        g.mark_full();
        handle.join().unwrap();
    }
}
