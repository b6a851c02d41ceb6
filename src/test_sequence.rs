//! Verification of the device's self-test ramp.
//!
//! In test mode the device emits a free-running 10-bit counter instead of
//! real RF samples. The wrap point is firmware-dependent: some builds
//! wrap at 1021, others run the full 10-bit range and wrap at 1024. Which
//! one is in use isn't known up front — [`TestSequenceVerifier`] watches
//! for the first wrap and latches whichever modulus it actually observes.
//! A single bad sample resyncs off the value actually received rather than
//! cascading into a mismatch for the rest of the buffer: the point of the
//! check is to count discontinuities, not to drift out of lock after the
//! first one.

/// The only two wrap points the known firmware revisions use.
const CANDIDATE_LOW: u16 = 1021;
const CANDIDATE_HIGH: u16 = 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct TestSequenceOutcome {
    pub samples_checked: u64,
    pub mismatches: u64,
}

pub struct TestSequenceVerifier {
    expected_next: Option<u16>,
    modulus: Option<u16>,
}

impl TestSequenceVerifier {
    pub fn new() -> Self {
        Self {
            expected_next: None,
            modulus: None,
        }
    }

    /// Check `samples` (already RF-scrubbed, values `0..1024`) against the
    /// expected ramp, carrying both the expected next value and the
    /// latched wrap modulus across calls.
    pub fn verify(&mut self, samples: &[u16]) -> TestSequenceOutcome {
        let mut outcome = TestSequenceOutcome::default();
        for &s in samples {
            outcome.samples_checked += 1;

            if let Some(expected) = self.expected_next {
                if !self.matches_expected(expected, s) {
                    outcome.mismatches += 1;
                }
            }
            // else: first sample of the session latches the starting value.

            self.expected_next = Some(match self.modulus {
                Some(m) => (s + 1) % m,
                None => s + 1,
            });
        }
        outcome
    }

    /// Resolve whether `s` satisfies `expected`, latching the wrap modulus
    /// the first time a wrap is actually observed.
    fn matches_expected(&mut self, expected: u16, s: u16) -> bool {
        if self.modulus.is_some() {
            return s == expected;
        }

        if expected == CANDIDATE_LOW {
            if s == 0 {
                self.modulus = Some(CANDIDATE_LOW);
                true
            } else {
                // Not wrapping yet; still ambiguous between the two
                // candidate moduli until the next checkpoint.
                s == CANDIDATE_LOW
            }
        } else if expected == CANDIDATE_HIGH {
            if s == 0 {
                self.modulus = Some(CANDIDATE_HIGH);
                true
            } else {
                false
            }
        } else {
            s == expected
        }
    }
}

impl Default for TestSequenceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_ramp_has_no_mismatches() {
        let samples: Vec<u16> = (0..2048).map(|i| (i % 1024) as u16).collect();
        let mut v = TestSequenceVerifier::new();
        let outcome = v.verify(&samples);
        assert_eq!(outcome.mismatches, 0);
        assert_eq!(outcome.samples_checked, 2048);
    }

    #[test]
    fn wrap_at_1024_is_not_a_mismatch() {
        let samples: Vec<u16> = vec![1021, 1022, 1023, 0, 1];
        let mut v = TestSequenceVerifier::new();
        let outcome = v.verify(&samples);
        assert_eq!(outcome.mismatches, 0);
    }

    #[test]
    fn wrap_at_1021_is_not_a_mismatch() {
        let samples: Vec<u16> = vec![1019, 1020, 0, 1, 2];
        let mut v = TestSequenceVerifier::new();
        let outcome = v.verify(&samples);
        assert_eq!(outcome.mismatches, 0);
    }

    #[test]
    fn ramp_continues_correctly_across_two_buffers() {
        let mut v = TestSequenceVerifier::new();
        v.verify(&[0, 1, 2]);
        let outcome = v.verify(&[3, 4, 5]);
        assert_eq!(outcome.mismatches, 0);
    }

    #[test]
    fn single_glitch_counts_one_mismatch_and_resyncs() {
        let mut v = TestSequenceVerifier::new();
        v.verify(&[0, 1, 2]);
        // 99 is a glitch; 100 and 101 resync off it rather than off the
        // original expectation of 3.
        let outcome = v.verify(&[99, 100, 101]);
        assert_eq!(outcome.mismatches, 1);
    }

    #[test]
    fn modulus_learned_at_1021_persists_across_buffers() {
        let mut v = TestSequenceVerifier::new();
        v.verify(&[1019, 1020, 0]); // wraps at 1021, modulus latched
        let outcome = v.verify(&[1, 2, 3]);
        assert_eq!(outcome.mismatches, 0);
    }
}
