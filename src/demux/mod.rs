//! Audio/RF demultiplexing for one disk buffer's worth of wire samples.
//!
//! Each 16-bit wire sample multiplexes a 10-bit RF value in its low bits
//! with a 6-bit channel selector in its high bits. A 512-sample frame
//! opens with the doubled sync word (see [`sync`]), carries the ADC128
//! and PCM1802 audio channels at fixed offsets, and a frame sequence
//! number at sample 30. [`FrameDemux`] walks a stream of such frames,
//! re-verifying the sync word at every frame boundary once locked; a
//! boundary that stops matching is sync loss, terminal for the session.

pub mod audio;
pub mod sync;

use crate::session::SequenceState;

pub const FRAME_LEN: usize = 512;
const ADC128_LEFT: usize = 16;
const ADC128_RIGHT: usize = 18;
const PCM1802_LEFT: usize = 22;
const PCM1802_RIGHT: usize = 26;
const SEQUENCE_NUMBER_OFFSET: usize = 30;

#[derive(Debug, Default)]
pub struct RfMetrics {
    pub min: i64,
    pub max: i64,
    pub clipped_min: u64,
    pub clipped_max: u64,
}

#[derive(Debug, Default)]
pub struct DemuxOutcome {
    pub adc128: Vec<(i32, i32)>,
    pub pcm1802: Vec<(i32, i32)>,
    pub rf: RfMetrics,
    pub sync_lost: bool,
    pub sequence_mismatch: Option<(u8, u8)>,
}

/// Per-session frame alignment and sequence-number tracking, carried
/// across successive disk buffers.
pub struct FrameDemux {
    offset_in_frame: usize,
    adc_left: [u8; 2],
    adc_right: [u8; 2],
    pcm_left: [u8; 4],
    pcm_right: [u8; 4],
    last_sequence: Option<u8>,
}

impl FrameDemux {
    pub fn new() -> Self {
        Self {
            offset_in_frame: 0,
            adc_left: [0; 2],
            adc_right: [0; 2],
            pcm_left: [0; 4],
            pcm_right: [0; 4],
            last_sequence: None,
        }
    }

    /// Scrub every sample in `samples` to its 10-bit RF value in place,
    /// folding min/max/clip counts into the returned metrics. While
    /// `state` is `Sync`, search for the initial frame lock. While
    /// `Running`, demultiplex audio and the sequence number at each
    /// frame's fixed offsets, and re-verify the sync word at every frame
    /// boundary; a mismatch sets `state` to `Failed` and stops further
    /// demuxing for the rest of this buffer (RF scrubbing continues
    /// regardless).
    pub fn process(
        &mut self,
        samples: &mut [u16],
        state: &mut SequenceState,
        sequence_check: bool,
    ) -> DemuxOutcome {
        let mut outcome = DemuxOutcome {
            rf: RfMetrics {
                min: i64::MAX,
                max: i64::MIN,
                ..Default::default()
            },
            ..Default::default()
        };

        let already_locked = *state == SequenceState::Running;
        let mut lock_start = None;
        if *state == SequenceState::Sync {
            if let Some(found) = sync::find_sync(samples) {
                *state = SequenceState::Running;
                lock_start = Some(found);
            }
        }

        for i in 0..samples.len() {
            let raw = samples[i];

            let at_or_past_fresh_lock = lock_start.is_some_and(|start| i >= start);
            if lock_start == Some(i) {
                self.offset_in_frame = 0;
            }

            if *state == SequenceState::Running && (already_locked || at_or_past_fresh_lock) {
                let frame_pos = self.offset_in_frame;
                let mut sync_ok = true;

                if frame_pos == 0 && i + sync::FULL_LEN <= samples.len() {
                    let window: &[u16; sync::FULL_LEN] =
                        samples[i..i + sync::FULL_LEN].try_into().unwrap();
                    if !sync::matches(window) {
                        *state = SequenceState::Failed;
                        outcome.sync_lost = true;
                        sync_ok = false;
                    }
                }

                if sync_ok {
                    match frame_pos {
                        ADC128_LEFT => self.adc_left[0] = audio::extract6(raw),
                        n if n == ADC128_LEFT + 1 => self.adc_left[1] = audio::extract6(raw),
                        ADC128_RIGHT => self.adc_right[0] = audio::extract6(raw),
                        n if n == ADC128_RIGHT + 1 => {
                            self.adc_right[1] = audio::extract6(raw);
                            let l = audio::adc128_value(audio::combine12(self.adc_left));
                            let r = audio::adc128_value(audio::combine12(self.adc_right));
                            outcome.adc128.push((l, r));
                        }
                        n if (PCM1802_LEFT..PCM1802_LEFT + 4).contains(&n) => {
                            self.pcm_left[n - PCM1802_LEFT] = audio::extract6(raw);
                        }
                        n if (PCM1802_RIGHT..PCM1802_RIGHT + 4).contains(&n) => {
                            self.pcm_right[n - PCM1802_RIGHT] = audio::extract6(raw);
                            if n == PCM1802_RIGHT + 3 {
                                let l = audio::pcm1802_value(audio::combine24(self.pcm_left));
                                let r = audio::pcm1802_value(audio::combine24(self.pcm_right));
                                outcome.pcm1802.push((l, r));
                            }
                        }
                        SEQUENCE_NUMBER_OFFSET => {
                            let seq = audio::extract6(raw);
                            if sequence_check {
                                if let Some(prev) = self.last_sequence {
                                    let expected = (prev + 1) & 0x3F;
                                    if seq != expected {
                                        outcome.sequence_mismatch = Some((expected, seq));
                                    }
                                }
                            }
                            self.last_sequence = Some(seq);
                        }
                        _ => {}
                    }
                    self.offset_in_frame = (self.offset_in_frame + 1) % FRAME_LEN;
                }
            }

            let scrubbed = audio::rf_scrub(raw);
            samples[i] = scrubbed;
            let v = scrubbed as i64;
            outcome.rf.min = outcome.rf.min.min(v);
            outcome.rf.max = outcome.rf.max.max(v);
            if scrubbed == 0 {
                outcome.rf.clipped_min += 1;
            } else if scrubbed == 0x03FF {
                outcome.rf.clipped_max += 1;
            }
        }

        outcome
    }
}

impl Default for FrameDemux {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_bits6(b: u8) -> u16 {
        (b as u16) << 10
    }

    fn sync_word() -> Vec<u16> {
        let mut out = Vec::with_capacity(sync::FULL_LEN);
        for half in 0..2 {
            for i in 0..sync::HALF_LEN {
                let bits = ((sync::SYNC_PATTERN >> (6 * i)) & 0x3F) as u8;
                out.push(encode_bits6(bits));
                let _ = half;
            }
        }
        out
    }

    fn encode_adc128(raw12: u16) -> [u16; 4] {
        [
            encode_bits6(((raw12 >> 6) & 0x3F) as u8),
            encode_bits6((raw12 & 0x3F) as u8),
            0,
            0,
        ]
    }

    fn build_frame(adc_left: u16, adc_right: u16, seq: u8) -> Vec<u16> {
        let mut frame = vec![0u16; FRAME_LEN];
        frame[0..sync::FULL_LEN].copy_from_slice(&sync_word());
        let left = encode_adc128(adc_left);
        frame[ADC128_LEFT] = left[0];
        frame[ADC128_LEFT + 1] = left[1];
        let right = encode_adc128(adc_right);
        frame[ADC128_RIGHT] = right[0];
        frame[ADC128_RIGHT + 1] = right[1];
        frame[SEQUENCE_NUMBER_OFFSET] = encode_bits6(seq & 0x3F);
        frame
    }

    #[test]
    fn acquires_lock_and_demuxes_adc128_scenario() {
        let mut samples = build_frame(0x800, 0x400, 0);
        let mut state = SequenceState::Sync;
        let mut demux = FrameDemux::new();
        let outcome = demux.process(&mut samples, &mut state, false);
        assert_eq!(state, SequenceState::Running);
        assert_eq!(outcome.adc128, vec![(0, -16384)]);
    }

    #[test]
    fn rf_scrub_runs_on_every_sample_regardless_of_lock() {
        let mut samples = vec![0xFFFFu16; 4];
        let mut state = SequenceState::Disabled;
        let mut demux = FrameDemux::new();
        let outcome = demux.process(&mut samples, &mut state, false);
        assert!(samples.iter().all(|&s| s == 0x03FF));
        assert_eq!(outcome.rf.clipped_max, 4);
        assert_eq!(outcome.rf.clipped_min, 0);
    }

    #[test]
    fn locked_stream_survives_across_two_consecutive_frames() {
        let mut first = build_frame(0x800, 0x400, 10);
        let mut second = build_frame(0x900, 0x700, 11);
        let mut state = SequenceState::Sync;
        let mut demux = FrameDemux::new();
        demux.process(&mut first, &mut state, true);
        assert_eq!(state, SequenceState::Running);
        let outcome = demux.process(&mut second, &mut state, true);
        assert_eq!(state, SequenceState::Running);
        assert!(outcome.sequence_mismatch.is_none());
        assert_eq!(outcome.adc128, vec![(4096, -4096)]);
    }

    #[test]
    fn sequence_mismatch_is_reported_when_enabled() {
        let mut first = build_frame(0x800, 0x400, 10);
        let mut second = build_frame(0x800, 0x400, 50);
        let mut state = SequenceState::Sync;
        let mut demux = FrameDemux::new();
        demux.process(&mut first, &mut state, true);
        let outcome = demux.process(&mut second, &mut state, true);
        assert_eq!(outcome.sequence_mismatch, Some((11, 50)));
    }

    #[test]
    fn sequence_number_wraps_at_six_bits() {
        let mut first = build_frame(0x800, 0x400, 0x3F);
        let mut second = build_frame(0x800, 0x400, 0x00);
        let mut state = SequenceState::Sync;
        let mut demux = FrameDemux::new();
        demux.process(&mut first, &mut state, true);
        let outcome = demux.process(&mut second, &mut state, true);
        assert!(outcome.sequence_mismatch.is_none());
    }

    #[test]
    fn sync_loss_after_lock_is_terminal() {
        let mut first = build_frame(0x800, 0x400, 0);
        let mut corrupt = vec![0u16; FRAME_LEN];
        let mut state = SequenceState::Sync;
        let mut demux = FrameDemux::new();
        demux.process(&mut first, &mut state, false);
        assert_eq!(state, SequenceState::Running);
        let outcome = demux.process(&mut corrupt, &mut state, false);
        assert_eq!(state, SequenceState::Failed);
        assert!(outcome.sync_lost);
    }
}
