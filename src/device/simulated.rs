//! Stand-in for the USB hardware, used by test-mode captures and by the
//! integration tests that exercise the full worker pipeline without a
//! real duplicator attached.

use super::{DeviceDriver, DeviceError, TransferSource};
use crate::demux::sync::SYNC_PATTERN;

const FRAME_LEN: usize = 512;
const ADC128_LEFT: usize = 16;
const ADC128_RIGHT: usize = 18;
const PCM1802_LEFT: usize = 22;
const PCM1802_RIGHT: usize = 26;
const SEQUENCE_NUMBER_OFFSET: usize = 30;

const FIXED_ADC128_LEFT: u16 = 0x555;
const FIXED_ADC128_RIGHT: u16 = 0x2AA;
const FIXED_PCM1802_LEFT: u32 = 0x123456;
const FIXED_PCM1802_RIGHT: u32 = 0x654321;

fn bits6(value: u32, index: usize) -> u8 {
    ((value >> (6 * index)) & 0x3F) as u8
}

fn encode_bits6(b: u8) -> u16 {
    (b as u16) << 10
}

/// Generates either a free-running 10-bit test ramp, or a well-formed
/// frame train with sync word, fixed audio samples, and an incrementing
/// sequence number, depending on `test_mode`.
pub struct SimulatedDevice {
    slot_len: usize,
    test_mode: bool,
    connected: bool,
    next_test_sample: u16,
    frame_offset: usize,
    frame_sequence: u8,
}

impl SimulatedDevice {
    pub fn new(slot_len: usize, test_mode: bool) -> Self {
        Self {
            slot_len,
            test_mode,
            connected: false,
            next_test_sample: 0,
            frame_offset: 0,
            frame_sequence: 0,
        }
    }

    fn next_ramp_sample(&mut self) -> u16 {
        let s = self.next_test_sample;
        self.next_test_sample = (self.next_test_sample + 1) % 0x0400;
        s
    }

    fn next_frame_sample(&mut self) -> u16 {
        let offset = self.frame_offset;
        let sample = match offset {
            0..=15 => {
                let half = offset / 8;
                let idx = offset % 8;
                let bits = ((SYNC_PATTERN >> (6 * idx)) & 0x3F) as u8;
                let _ = half; // both halves of the doubled pattern are identical
                encode_bits6(bits)
            }
            ADC128_LEFT => encode_bits6(bits6(FIXED_ADC128_LEFT as u32, 1)),
            n if n == ADC128_LEFT + 1 => encode_bits6(bits6(FIXED_ADC128_LEFT as u32, 0)),
            ADC128_RIGHT => encode_bits6(bits6(FIXED_ADC128_RIGHT as u32, 1)),
            n if n == ADC128_RIGHT + 1 => encode_bits6(bits6(FIXED_ADC128_RIGHT as u32, 0)),
            n if (PCM1802_LEFT..PCM1802_LEFT + 4).contains(&n) => {
                encode_bits6(bits6(FIXED_PCM1802_LEFT, 3 - (n - PCM1802_LEFT)))
            }
            n if (PCM1802_RIGHT..PCM1802_RIGHT + 4).contains(&n) => {
                encode_bits6(bits6(FIXED_PCM1802_RIGHT, 3 - (n - PCM1802_RIGHT)))
            }
            SEQUENCE_NUMBER_OFFSET => encode_bits6(self.frame_sequence),
            _ => 0,
        };

        self.frame_offset += 1;
        if self.frame_offset == FRAME_LEN {
            self.frame_offset = 0;
            self.frame_sequence = (self.frame_sequence + 1) & 0x3F;
        }
        sample
    }
}

impl DeviceDriver for SimulatedDevice {
    fn connect(&mut self, _device_path: &str) -> Result<(), DeviceError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.connected = false;
        Ok(())
    }

    fn send_vendor_command(
        &mut self,
        _b_request: u8,
        _w_value: u16,
        _w_index: u16,
        _data: &[u8],
    ) -> Result<(), DeviceError> {
        if !self.connected {
            return Err(DeviceError::VendorCommand("device not connected".into()));
        }
        Ok(())
    }
}

impl TransferSource for SimulatedDevice {
    fn next_slot_len(&mut self) -> Result<usize, DeviceError> {
        Ok(self.slot_len)
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if !self.connected {
            return Err(DeviceError::Transfer("device not connected".into()));
        }
        let sample_count = buf.len() / 2;
        for i in 0..sample_count {
            let sample = if self.test_mode {
                self.next_ramp_sample()
            } else {
                self.next_frame_sample()
            };
            let bytes = sample.to_le_bytes();
            buf[i * 2] = bytes[0];
            buf[i * 2 + 1] = bytes[1];
        }
        Ok(sample_count * 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::FrameDemux;
    use crate::session::SequenceState;

    #[test]
    fn uncommanded_transfer_is_rejected() {
        let mut device = SimulatedDevice::new(1024, false);
        let mut buf = vec![0u8; 1024];
        assert!(device.fill(&mut buf).is_err());
    }

    #[test]
    fn test_mode_emits_a_continuous_ramp() {
        let mut device = SimulatedDevice::new(2048, true);
        device.connect("sim://0").unwrap();
        let mut buf = vec![0u8; 2048];
        device.fill(&mut buf).unwrap();
        let samples: Vec<u16> = buf
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        for pair in samples.windows(2) {
            assert_eq!(pair[1], (pair[0] + 1) % 0x0400);
        }
    }

    #[test]
    fn frame_mode_output_locks_and_demuxes_in_the_real_pipeline() {
        let mut device = SimulatedDevice::new(FRAME_LEN * 2 * 2, false);
        device.connect("sim://0").unwrap();
        let mut buf = vec![0u8; FRAME_LEN * 2 * 2];
        device.fill(&mut buf).unwrap();
        let mut samples: Vec<u16> = buf
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        let mut state = SequenceState::Sync;
        let mut demux = FrameDemux::new();
        let outcome = demux.process(&mut samples, &mut state, true);
        assert_eq!(state, SequenceState::Running);
        assert_eq!(outcome.adc128.len(), 2);
        assert_eq!(outcome.pcm1802.len(), 2);
        assert!(outcome.sequence_mismatch.is_none());
    }
}
