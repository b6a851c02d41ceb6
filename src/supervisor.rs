//! Lifecycle owner for one capture session: opens the output files,
//! sizes the rings, pins their memory, and spawns the transfer and
//! processing workers. `Start` and `Stop` map directly onto
//! [`Supervisor::start`] and [`Supervisor::stop`].

use std::fs::File;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::demux::FRAME_LEN;
use crate::device::simulated::SimulatedDevice;
use crate::device::{DeviceDriver, DeviceError};
use crate::io;
use crate::platform::{CurrentPlatform, MemoryPinner, PriorityBooster};
use crate::ring::{ConversionBufferRing, DiskBufferRing};
use crate::session::{Session, SessionConfig, Telemetry, TransferResult};
use crate::wav::WavWriter;
use crate::workers::{processing, transfer};

/// WAV sample rate for both audio channels, matching the original
/// hardware's fixed audio frame rate.
pub const AUDIO_SAMPLE_RATE_HZ: u32 = 78_125;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to create RF output file: {0}")]
    RfFileCreation(#[source] std::io::Error),
    #[error("failed to create audio output file: {0}")]
    AudioFileCreation(#[source] std::io::Error),
    #[error("device setup failed: {0}")]
    Device(#[from] DeviceError),
}

pub struct Supervisor {
    session: Arc<Session>,
    ring: Arc<DiskBufferRing>,
    pinner: Arc<dyn MemoryPinner>,
    transfer_handle: JoinHandle<()>,
    processing_handle: JoinHandle<TransferResult>,
}

impl Supervisor {
    /// `Start`: create the RF and WAV output files, size and pin the
    /// rings, connect the device, and hand off to the two worker threads.
    /// `test_mode` only changes the device's sample source and
    /// configuration command, never the output file lifecycle.
    pub fn start(config: SessionConfig) -> Result<Self, SupervisorError> {
        let session = Arc::new(Session::new(config.clone()));

        let rf_file = File::create(&config.rf_path).map_err(SupervisorError::RfFileCreation)?;

        let audio16 = WavWriter::create(config.audio16_path(), 2, AUDIO_SAMPLE_RATE_HZ, 16)
            .map_err(SupervisorError::AudioFileCreation)?;
        let audio24 = WavWriter::create(config.audio24_path(), 2, AUDIO_SAMPLE_RATE_HZ, 24)
            .map_err(SupervisorError::AudioFileCreation)?;
        let (audio16, audio24) = (Some(audio16), Some(audio24));

        let min_slot_len = FRAME_LEN * 2;
        let slot_len = if config.use_small_usb_transfers {
            (config.usb_transfer_queue_bytes / 4).max(min_slot_len)
        } else {
            config.usb_transfer_queue_bytes.max(min_slot_len)
        };
        let slot_count = (config.disk_buffer_queue_bytes / slot_len).max(2);
        let ring = Arc::new(DiskBufferRing::new(slot_count, slot_len));

        let conversion_count = if config.use_async_file_io {
            slot_count.clamp(2, 4)
        } else {
            1
        };
        let conversion =
            ConversionBufferRing::new(conversion_count, slot_len, config.use_async_file_io);

        let pinner: Arc<dyn MemoryPinner> = Arc::new(CurrentPlatform::default());
        let booster: Arc<dyn PriorityBooster> = Arc::new(CurrentPlatform::default());

        if let Err(e) = ring.pin_all(pinner.as_ref()) {
            warn!("failed to pin disk buffer ring: {e}");
        }
        if let Err(e) = conversion.pin_all(pinner.as_ref()) {
            warn!("failed to pin conversion buffer ring: {e}");
        }

        let mut device = SimulatedDevice::new(slot_len, config.test_mode);
        device.connect(&config.device_path)?;
        device.send_configuration_command(config.test_mode)?;

        let transfer_session = session.clone();
        let transfer_ring = ring.clone();
        let transfer_handle = thread::Builder::new()
            .name("rfcapture-transfer".into())
            .spawn(move || transfer::run(transfer_session, transfer_ring, Box::new(device)))
            .expect("failed to spawn transfer worker thread");

        let processing_session = session.clone();
        let processing_ring = ring.clone();
        let rf_writer = io::open_channel(
            rf_file,
            config.use_async_file_io,
            conversion_count.saturating_sub(1).max(1),
        );
        let outputs = processing::ProcessingOutputs {
            rf_writer,
            audio16,
            audio24,
        };
        let processing_booster = Some(booster);
        let processing_handle = thread::Builder::new()
            .name("rfcapture-processing".into())
            .spawn(move || {
                processing::run(
                    processing_session,
                    processing_ring,
                    conversion,
                    outputs,
                    processing_booster,
                )
            })
            .expect("failed to spawn processing worker thread");

        info!(
            slot_count,
            slot_len, conversion_count, "capture session started"
        );

        Ok(Self {
            session,
            ring,
            pinner,
            transfer_handle,
            processing_handle,
        })
    }

    /// `Stop`: request both workers to wind down, wait for them, and
    /// return the session's latched outcome. The transfer worker force-
    /// dumps its current slot on the way out so the processing worker
    /// never blocks forever on a buffer that will never arrive.
    pub fn stop(self) -> TransferResult {
        self.session.request_stop();
        let _ = self.transfer_handle.join();
        let result = self
            .processing_handle
            .join()
            .unwrap_or(TransferResult::ProgramError);

        if let Err(e) = self.ring.unpin_all(self.pinner.as_ref()) {
            warn!("failed to unpin disk buffer ring: {e}");
        }

        result
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.session.telemetry
    }

    pub fn result(&self) -> TransferResult {
        self.session.result.get()
    }

    /// One-shot raw-buffer preview: ask the processing worker for the
    /// leading `len` bytes of the next disk buffer it sees, and block up
    /// to `timeout` for the answer. Returns `None` on timeout or if the
    /// capture stops before a buffer arrives.
    pub fn sample_preview(&self, len: usize, timeout: Duration) -> Option<Vec<u8>> {
        self.session.sample_request.request(len);
        self.session.sample_request.wait(timeout)
    }
}
