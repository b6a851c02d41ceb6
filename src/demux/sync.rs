//! 96-bit frame sync pattern search.
//!
//! Every wire sample carries a 6-bit multiplexed channel in its top bits
//! (`(sample >> 10) & 0x3F`). The sync marker is the 48-bit value
//! `0xDEAD_BEEF_CAFE` written twice back to back, six bits per sample, so
//! acquiring lock means finding 16 consecutive samples whose top-6-bit
//! stream matches the pattern twice.

/// Top 6 bits of a 16-bit wire sample.
pub fn extract6(sample: u16) -> u8 {
    ((sample >> 10) & 0x3F) as u8
}

/// The 48-bit sync word, little-endian across 8 six-bit groups.
pub const SYNC_PATTERN: u64 = 0xDEAD_BEEF_CAFE;
pub const HALF_LEN: usize = 8;
pub const FULL_LEN: usize = HALF_LEN * 2;

fn pack48(bits: &[u8; HALF_LEN]) -> u64 {
    bits.iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | ((b as u64) << (6 * i)))
}

/// Does `samples` (exactly 16 long) hold the doubled sync pattern?
pub fn matches(samples: &[u16; FULL_LEN]) -> bool {
    let mut first = [0u8; HALF_LEN];
    let mut second = [0u8; HALF_LEN];
    for i in 0..HALF_LEN {
        first[i] = extract6(samples[i]);
        second[i] = extract6(samples[HALF_LEN + i]);
    }
    pack48(&first) == SYNC_PATTERN && pack48(&second) == SYNC_PATTERN
}

/// Scan `samples` for the first offset at which the doubled sync pattern
/// appears, returning that offset. Used only to acquire the initial lock;
/// once locked, [`matches`] is used instead to confirm each successive
/// frame boundary without rescanning.
pub fn find_sync(samples: &[u16]) -> Option<usize> {
    if samples.len() < FULL_LEN {
        return None;
    }
    for start in 0..=(samples.len() - FULL_LEN) {
        let window: &[u16; FULL_LEN] = samples[start..start + FULL_LEN].try_into().unwrap();
        if matches(window) {
            return Some(start);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_bits6(b: u8) -> u16 {
        (b as u16) << 10
    }

    fn encode_sync_word() -> [u16; FULL_LEN] {
        let mut out = [0u16; FULL_LEN];
        for half in 0..2 {
            for i in 0..HALF_LEN {
                let bits = ((SYNC_PATTERN >> (6 * i)) & 0x3F) as u8;
                out[half * HALF_LEN + i] = encode_bits6(bits);
            }
        }
        out
    }

    #[test]
    fn extract6_takes_top_six_bits() {
        assert_eq!(extract6(0xFC00), 0x3F);
        assert_eq!(extract6(0x0000), 0x00);
        assert_eq!(extract6(encode_bits6(0x2A)), 0x2A);
    }

    #[test]
    fn matches_recognizes_encoded_sync_word() {
        assert!(matches(&encode_sync_word()));
    }

    #[test]
    fn matches_rejects_garbage() {
        let samples = [0u16; FULL_LEN];
        assert!(!matches(&samples));
    }

    #[test]
    fn find_sync_locates_pattern_after_preamble() {
        let mut buf = vec![0x1234u16; 7];
        buf.extend_from_slice(&encode_sync_word());
        buf.extend_from_slice(&[0x5678u16; 4]);
        assert_eq!(find_sync(&buf), Some(7));
    }

    #[test]
    fn find_sync_returns_none_without_a_match() {
        let buf = vec![0xABCDu16; 64];
        assert_eq!(find_sync(&buf), None);
    }
}
