//! Conversion buffer ring: staging area for transcoded RF bytes before a
//! disk write. One buffer is enough for synchronous I/O; asynchronous I/O
//! needs at least two so a previous write can stay in flight while the
//! next buffer is being prepared.

/// A small fixed-count ring of transcode output buffers.
pub struct ConversionBufferRing {
    buffers: Vec<Vec<u8>>,
}

impl ConversionBufferRing {
    /// `count` must be 1 for synchronous disk I/O, or >= 2 for
    /// asynchronous/overlapped I/O. This invariant is enforced here rather
    /// than left to the caller, per the capture's construction-time
    /// contract.
    pub fn new(count: usize, buffer_len: usize, async_io: bool) -> Self {
        if async_io {
            assert!(
                count >= 2,
                "asynchronous disk I/O requires at least 2 conversion buffers, got {count}"
            );
        } else {
            assert_eq!(
                count, 1,
                "synchronous disk I/O requires exactly 1 conversion buffer, got {count}"
            );
        }
        let buffers = (0..count).map(|_| vec![0u8; buffer_len]).collect();
        Self { buffers }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Vec<u8> {
        let len = self.buffers.len();
        &mut self.buffers[index % len]
    }

    pub fn get(&self, index: usize) -> &Vec<u8> {
        &self.buffers[index % self.buffers.len()]
    }

    /// See `DiskBufferRing::pin_all`.
    pub fn pin_all(&self, pinner: &dyn crate::platform::MemoryPinner) -> Result<(), crate::platform::PlatformError> {
        for buf in &self.buffers {
            pinner.pin(buf.as_ptr(), buf.len())?;
        }
        Ok(())
    }

    pub fn unpin_all(&self, pinner: &dyn crate::platform::MemoryPinner) -> Result<(), crate::platform::PlatformError> {
        for buf in &self.buffers {
            pinner.unpin(buf.as_ptr(), buf.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_requires_exactly_one() {
        let ring = ConversionBufferRing::new(1, 64, false);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    #[should_panic(expected = "exactly 1 conversion buffer")]
    fn sync_rejects_more_than_one() {
        ConversionBufferRing::new(2, 64, false);
    }

    #[test]
    fn async_requires_at_least_two() {
        let ring = ConversionBufferRing::new(3, 64, true);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    #[should_panic(expected = "at least 2 conversion buffers")]
    fn async_rejects_one() {
        ConversionBufferRing::new(1, 64, true);
    }

    #[test]
    fn index_wraps_modulo_len() {
        let ring = ConversionBufferRing::new(2, 4, true);
        assert!(std::ptr::eq(ring.get(0), ring.get(2)));
        assert!(std::ptr::eq(ring.get(1), ring.get(3)));
    }
}
