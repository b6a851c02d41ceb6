//! Consumer side of the disk-buffer ring: demultiplexes each buffer's
//! audio, transcodes its RF content, and commits both to disk. This is
//! the hot loop the whole pipeline is sized and pinned around.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::demux::FrameDemux;
use crate::io::DiskWriteChannel;
use crate::platform::PriorityBooster;
use crate::ring::{ConversionBufferRing, DiskBufferRing};
use crate::session::{Session, TransferResult};
use crate::test_sequence::TestSequenceVerifier;
use crate::transcode;
use crate::wav::WavWriter;

pub struct ProcessingOutputs {
    pub rf_writer: Box<dyn DiskWriteChannel>,
    pub audio16: Option<WavWriter>,
    pub audio24: Option<WavWriter>,
}

pub fn run(
    session: Arc<Session>,
    ring: Arc<DiskBufferRing>,
    mut conversion: ConversionBufferRing,
    mut outputs: ProcessingOutputs,
    booster: Option<Arc<dyn PriorityBooster>>,
) -> TransferResult {
    info!("processing worker started");

    if let Some(booster) = &booster {
        if let Err(e) = booster.boost_current_thread() {
            warn!("priority boost failed, continuing at default priority: {e}");
        }
    }

    let mut demux = FrameDemux::new();
    let mut test_verifier = TestSequenceVerifier::new();
    let mut slot = 0usize;
    let mut conv_index = 0usize;

    loop {
        if session.processing_stop_requested.load(Ordering::Acquire) {
            break;
        }

        let guard = ring.acquire_full(slot);
        if guard.is_dumping() {
            guard.mark_empty();
            slot = (slot + 1) % ring.len();
            continue;
        }

        let mut samples: Vec<u16> = guard
            .data()
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        if let Some(len) = session.sample_request.take_pending() {
            let raw = guard.data();
            let n = len.min(raw.len());
            session.sample_request.fulfill(raw[..n].to_vec());
        }

        let outcome = {
            let mut state = session.sequence_state.lock().unwrap();
            demux.process(&mut samples, &mut state, session.config.sequence_number_check)
        };

        session.telemetry.update_sample_metrics(
            outcome.rf.min,
            outcome.rf.max,
            outcome.rf.clipped_min,
            outcome.rf.clipped_max,
            samples.len() as u64,
        );

        if session.config.test_mode {
            let verified = test_verifier.verify(&samples);
            if verified.mismatches > 0 {
                warn!("test sequence mismatch: {} bad samples", verified.mismatches);
                session.result.latch(TransferResult::VerificationError);
                session.request_stop();
            }
        }

        if let Some((expected, got)) = outcome.sequence_mismatch {
            warn!("frame sequence mismatch: expected {expected}, got {got}");
            session.result.latch(TransferResult::SequenceMismatch);
            session.request_stop();
        }

        if outcome.sync_lost {
            error!("sync lost after initial lock, ending capture");
            session.result.latch(TransferResult::VerificationError);
            session.request_stop();
        }

        let out_buf = conversion.get_mut(conv_index);
        let written = transcode::transcode(session.config.format, &samples, out_buf);
        if let Err(e) = outputs.rf_writer.write_buffer(&out_buf[..written]) {
            error!("RF write failed: {e}");
            session.result.latch(TransferResult::FileWriteError);
            session.request_stop();
        } else {
            session.telemetry.buffers_written.fetch_add(1, Ordering::Relaxed);
            session
                .telemetry
                .bytes_written
                .fetch_add(written as u64, Ordering::Relaxed);
        }

        if !outcome.adc128.is_empty() {
            if let Some(writer) = outputs.audio16.as_mut() {
                let mut bytes = Vec::with_capacity(outcome.adc128.len() * 4);
                for (left, right) in &outcome.adc128 {
                    bytes.extend_from_slice(&(*left as i16).to_le_bytes());
                    bytes.extend_from_slice(&(*right as i16).to_le_bytes());
                }
                if let Err(e) = writer.write_samples(&bytes) {
                    error!("audio.wav write failed: {e}");
                    session.result.latch(TransferResult::FileWriteError);
                    session.request_stop();
                } else {
                    session
                        .telemetry
                        .audio_frame_count
                        .fetch_add(outcome.adc128.len() as u64, Ordering::Relaxed);
                    session
                        .telemetry
                        .audio16_bytes_written
                        .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                }
            }
        }

        if !outcome.pcm1802.is_empty() {
            if let Some(writer) = outputs.audio24.as_mut() {
                let mut bytes = Vec::with_capacity(outcome.pcm1802.len() * 6);
                for (left, right) in &outcome.pcm1802 {
                    bytes.extend_from_slice(&left.to_le_bytes()[0..3]);
                    bytes.extend_from_slice(&right.to_le_bytes()[0..3]);
                }
                if let Err(e) = writer.write_samples(&bytes) {
                    error!("audio24.wav write failed: {e}");
                    session.result.latch(TransferResult::FileWriteError);
                    session.request_stop();
                } else {
                    session
                        .telemetry
                        .audio24_bytes_written
                        .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                }
            }
        }

        guard.mark_empty();

        slot = (slot + 1) % ring.len();
        conv_index = (conv_index + 1) % conversion.len();
    }

    session.result.latch(TransferResult::Success);

    if let Err(e) = outputs.rf_writer.finish() {
        error!("RF writer finalize failed: {e}");
        session.result.latch(TransferResult::FileWriteError);
    }
    if let Some(writer) = outputs.audio16 {
        if let Err(e) = writer.finalize() {
            error!("audio.wav finalize failed: {e}");
            session.result.latch(TransferResult::FileWriteError);
        }
    }
    if let Some(writer) = outputs.audio24 {
        if let Err(e) = writer.finalize() {
            error!("audio24.wav finalize failed: {e}");
            session.result.latch(TransferResult::FileWriteError);
        }
    }

    info!("processing worker stopped");
    session.result.get()
}
