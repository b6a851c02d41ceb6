//! Producer side of the disk-buffer ring: pulls bytes off the device as
//! fast as it can and publishes each one as a full slot.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::device::TransferSource;
use crate::ring::DiskBufferRing;
use crate::session::{Session, TransferResult};

pub fn run(session: Arc<Session>, ring: Arc<DiskBufferRing>, mut source: Box<dyn TransferSource>) {
    info!("transfer worker started");
    let mut slot = 0usize;

    loop {
        if session.usb_transfer_stop_requested.load(Ordering::Acquire) {
            break;
        }

        let mut guard = ring.acquire_empty(slot);
        session
            .telemetry
            .transfer_in_progress
            .store(true, Ordering::Relaxed);

        let len = match source.next_slot_len() {
            Ok(len) => len.min(ring.slot_len()),
            Err(e) => {
                error!("transfer source reported an error: {e}");
                session.result.latch(TransferResult::ConnectionFailure);
                session.request_stop();
                guard.mark_full();
                break;
            }
        };

        match source.fill(&mut guard.data_mut()[..len]) {
            Ok(_) => {
                session.telemetry.transfer_count.fetch_add(1, Ordering::Relaxed);
                guard.mark_full();
            }
            Err(e) => {
                error!("transfer fill failed: {e}");
                session.result.latch(TransferResult::ConnectionFailure);
                session.request_stop();
                guard.mark_full();
                break;
            }
        }

        session
            .telemetry
            .transfer_in_progress
            .store(false, Ordering::Relaxed);
        slot = (slot + 1) % ring.len();
    }

    // The processing worker may already be blocked waiting on the next
    // slot; wake it so it can notice the stop request instead of hanging.
    ring.force_dump_if_not_full(slot);
    debug!("transfer worker stopped at slot {slot}");
}
