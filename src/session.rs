//! Session-wide state shared between the supervisor and both workers.
//!
//! A `Session` is created once per `Start`/`Stop` cycle and handed to the
//! transfer and processing workers by shared reference. There is no
//! process-wide singleton: a second capture session simply owns a second
//! `Session`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// RF sample packing format. Determines the transcode ratio applied to
/// every disk buffer before it is written to the RF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureFormat {
    /// Each 10-bit sample widened to a signed 16-bit little-endian word.
    #[default]
    Signed16Bit,
    /// Four 10-bit samples bit-packed into 5 bytes.
    Unsigned10Bit,
    /// `Unsigned10Bit` packing applied after 4:1 decimation.
    Unsigned10Bit4to1Decimation,
}

impl CaptureFormat {
    /// Output bytes produced per `n` raw 16-bit wire samples.
    pub fn output_len_for_samples(&self, n: usize) -> usize {
        match self {
            CaptureFormat::Signed16Bit => n * 2,
            CaptureFormat::Unsigned10Bit => (n / 4) * 5,
            CaptureFormat::Unsigned10Bit4to1Decimation => (n / 16) * 5,
        }
    }
}

/// Audio multiplex tracking state, carried across disk buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// No audio multiplex expected (legacy RF-only capture).
    Disabled,
    /// Searching for the first frame boundary.
    Sync,
    /// Locked onto the frame boundary; demuxing audio.
    Running,
    /// Sync lost after an initial lock. Terminal for the session.
    Failed,
}

/// Outcome latched for the session. The first non-`Running`, non-`Success`
/// value observed by either worker wins and is never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferResult {
    Running = 0,
    Success = 1,
    ConnectionFailure = 2,
    FileCreationError = 3,
    FileWriteError = 4,
    SequenceMismatch = 5,
    VerificationError = 6,
    ProgramError = 7,
}

impl TransferResult {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TransferResult::Running,
            1 => TransferResult::Success,
            2 => TransferResult::ConnectionFailure,
            3 => TransferResult::FileCreationError,
            4 => TransferResult::FileWriteError,
            5 => TransferResult::SequenceMismatch,
            6 => TransferResult::VerificationError,
            _ => TransferResult::ProgramError,
        }
    }
}

/// A latch that accepts exactly one non-`Running` value and ignores the rest.
///
/// `Success` only sticks if nothing else has latched first; any failure
/// variant always wins over `Success`.
#[derive(Debug)]
pub struct ResultLatch {
    value: AtomicU8Wrapper,
}

// Thin wrapper so the latch reads naturally as "an atomic enum".
#[derive(Debug)]
struct AtomicU8Wrapper(std::sync::atomic::AtomicU8);

impl ResultLatch {
    pub fn new() -> Self {
        Self {
            value: AtomicU8Wrapper(std::sync::atomic::AtomicU8::new(
                TransferResult::Running as u8,
            )),
        }
    }

    /// Attempt to latch `result`. No-op if the session already latched a
    /// terminal value other than `Success`, or if `result` is `Running`.
    pub fn latch(&self, result: TransferResult) {
        if result == TransferResult::Running {
            return;
        }
        loop {
            let current = TransferResult::from_u8(self.value.0.load(Ordering::Acquire));
            match current {
                TransferResult::Running => {
                    if self
                        .value
                        .0
                        .compare_exchange(
                            TransferResult::Running as u8,
                            result as u8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return;
                    }
                }
                TransferResult::Success if result != TransferResult::Success => {
                    if self
                        .value
                        .0
                        .compare_exchange(
                            TransferResult::Success as u8,
                            result as u8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    pub fn get(&self) -> TransferResult {
        TransferResult::from_u8(self.value.0.load(Ordering::Acquire))
    }
}

impl Default for ResultLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic and "recent" telemetry counters, single-writer (the
/// processing worker), many-reader (UI / tests). Readers get
/// eventually-consistent snapshots; no cross-counter consistency is
/// promised or needed.
#[derive(Debug, Default)]
pub struct Telemetry {
    pub transfer_count: AtomicU64,
    pub buffers_written: AtomicU64,
    pub bytes_written: AtomicU64,
    pub processed_sample_count: AtomicU64,

    pub min_sample_value: AtomicI64,
    pub max_sample_value: AtomicI64,
    pub clipped_min_count: AtomicU64,
    pub clipped_max_count: AtomicU64,

    pub recent_min_sample_value: AtomicI64,
    pub recent_max_sample_value: AtomicI64,

    pub audio_frame_count: AtomicU64,
    pub audio16_bytes_written: AtomicU64,
    pub audio24_bytes_written: AtomicU64,

    pub sequence_markers_present: AtomicBool,
    pub transfer_in_progress: AtomicBool,
}

impl Telemetry {
    pub fn new() -> Self {
        let t = Self::default();
        t.min_sample_value.store(i64::MAX, Ordering::Relaxed);
        t.max_sample_value.store(i64::MIN, Ordering::Relaxed);
        t
    }

    /// Fold one disk buffer's min/max/clip counts into the cumulative and
    /// "recent" telemetry fields.
    pub fn update_sample_metrics(
        &self,
        buf_min: i64,
        buf_max: i64,
        clipped_min: u64,
        clipped_max: u64,
        sample_count: u64,
    ) {
        self.min_sample_value.fetch_min(buf_min, Ordering::AcqRel);
        self.max_sample_value.fetch_max(buf_max, Ordering::AcqRel);
        self.clipped_min_count.fetch_add(clipped_min, Ordering::Relaxed);
        self.clipped_max_count.fetch_add(clipped_max, Ordering::Relaxed);
        self.processed_sample_count
            .fetch_add(sample_count, Ordering::Relaxed);
        self.recent_min_sample_value.store(buf_min, Ordering::Relaxed);
        self.recent_max_sample_value.store(buf_max, Ordering::Relaxed);
    }
}

/// One-shot request for a raw-buffer snapshot, used by a UI "preview"
/// feature: a caller asks for the leading `len` bytes of the next disk
/// buffer the processing worker sees, and blocks until they're copied out.
#[derive(Debug, Default)]
pub struct SampleRequest {
    state: Mutex<SampleRequestState>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct SampleRequestState {
    pending_len: Option<usize>,
    result: Option<Vec<u8>>,
}

impl SampleRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for the next buffer's leading `len` bytes. Overwrites any
    /// request still pending.
    pub fn request(&self, len: usize) {
        let mut state = self.state.lock().unwrap();
        state.pending_len = Some(len);
        state.result = None;
    }

    /// Called by the processing worker: take the pending length, if any,
    /// clearing it so it fires only once.
    pub fn take_pending(&self) -> Option<usize> {
        self.state.lock().unwrap().pending_len.take()
    }

    /// Called by the processing worker to hand back the copied bytes and
    /// wake any waiter.
    pub fn fulfill(&self, data: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.result = Some(data);
        self.cond.notify_all();
    }

    /// Block until a fulfilled result is available or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let (mut state, _) = self
            .cond
            .wait_timeout_while(state, timeout, |s| s.result.is_none())
            .unwrap();
        state.result.take()
    }
}

/// Configuration captured once at `Start` and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rf_path: PathBuf,
    pub format: CaptureFormat,
    pub device_path: String,
    pub test_mode: bool,
    pub use_small_usb_transfers: bool,
    pub use_async_file_io: bool,
    pub usb_transfer_queue_bytes: usize,
    pub disk_buffer_queue_bytes: usize,
    /// Option, default off: see the per-frame sequence mismatch note.
    pub sequence_number_check: bool,
}

impl SessionConfig {
    pub fn audio16_path(&self) -> PathBuf {
        sibling_with_suffix(&self.rf_path, "audio.wav")
    }

    pub fn audio24_path(&self) -> PathBuf {
        sibling_with_suffix(&self.rf_path, "audio24.wav")
    }
}

fn sibling_with_suffix(base: &PathBuf, suffix: &str) -> PathBuf {
    let mut name = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push('.');
    name.push_str(suffix);
    base.with_file_name(name)
}

/// Everything the two workers need, held behind shared references.
/// Owned exclusively by the supervisor.
pub struct Session {
    pub config: SessionConfig,
    pub result: ResultLatch,
    pub telemetry: Telemetry,
    pub usb_transfer_stop_requested: AtomicBool,
    pub processing_stop_requested: AtomicBool,
    pub dump_all_in_progress: AtomicBool,
    pub sequence_state: Mutex<SequenceState>,
    pub sample_request: SampleRequest,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let sequence_state = if config.test_mode {
            SequenceState::Disabled
        } else {
            SequenceState::Sync
        };
        Self {
            config,
            result: ResultLatch::new(),
            telemetry: Telemetry::new(),
            usb_transfer_stop_requested: AtomicBool::new(false),
            processing_stop_requested: AtomicBool::new(false),
            dump_all_in_progress: AtomicBool::new(false),
            sequence_state: Mutex::new(sequence_state),
            sample_request: SampleRequest::new(),
        }
    }

    pub fn request_stop(&self) {
        self.usb_transfer_stop_requested.store(true, Ordering::Release);
        self.processing_stop_requested.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_latch_first_failure_wins() {
        let latch = ResultLatch::new();
        latch.latch(TransferResult::Success);
        latch.latch(TransferResult::FileWriteError);
        assert_eq!(latch.get(), TransferResult::FileWriteError);
    }

    #[test]
    fn result_latch_ignores_second_failure() {
        let latch = ResultLatch::new();
        latch.latch(TransferResult::SequenceMismatch);
        latch.latch(TransferResult::VerificationError);
        assert_eq!(latch.get(), TransferResult::SequenceMismatch);
    }

    #[test]
    fn result_latch_success_only_if_nothing_else() {
        let latch = ResultLatch::new();
        latch.latch(TransferResult::Success);
        assert_eq!(latch.get(), TransferResult::Success);
    }

    #[test]
    fn sample_request_round_trips_through_fulfill() {
        let req = SampleRequest::new();
        assert!(req.take_pending().is_none());
        req.request(16);
        assert_eq!(req.take_pending(), Some(16));
        assert!(req.take_pending().is_none());
        req.fulfill(vec![1, 2, 3]);
        assert_eq!(req.wait(Duration::from_millis(10)), Some(vec![1, 2, 3]));
    }

    #[test]
    fn sample_request_wait_times_out_with_no_fulfill() {
        let req = SampleRequest::new();
        req.request(16);
        assert_eq!(req.wait(Duration::from_millis(10)), None);
    }

    #[test]
    fn capture_format_output_len() {
        assert_eq!(CaptureFormat::Signed16Bit.output_len_for_samples(512), 1024);
        assert_eq!(CaptureFormat::Unsigned10Bit.output_len_for_samples(4), 5);
        assert_eq!(
            CaptureFormat::Unsigned10Bit4to1Decimation.output_len_for_samples(16),
            5
        );
    }
}
