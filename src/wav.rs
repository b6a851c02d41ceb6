//! Minimal canonical PCM WAV writer.
//!
//! The header's `data` and RIFF chunk sizes aren't known until the
//! capture finishes, so a placeholder header is written up front and
//! patched in place at finalize time by seeking back to the two size
//! fields. This is the whole of what's needed here, so no general-purpose
//! WAV crate is pulled in for it.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

const HEADER_LEN: u64 = 44;
const RIFF_SIZE_OFFSET: u64 = 4;
const DATA_SIZE_OFFSET: u64 = 40;

/// An open WAV file with the placeholder header already written.
/// `finalize` must be called to patch in the real sizes; dropping without
/// finalizing leaves a file whose header claims zero samples.
pub struct WavWriter {
    file: File,
    bytes_written: u64,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

impl WavWriter {
    pub fn create(
        path: impl AsRef<Path>,
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
    ) -> io::Result<Self> {
        let mut file = File::create(path)?;
        write_header(&mut file, channels, sample_rate, bits_per_sample, 0)?;
        Ok(Self {
            file,
            bytes_written: 0,
            channels,
            sample_rate,
            bits_per_sample,
        })
    }

    pub fn write_samples(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Patch the RIFF and data chunk sizes in place from the bytes
    /// actually written, then flush.
    pub fn finalize(mut self) -> io::Result<()> {
        let data_len = self.bytes_written as u32;
        let riff_len = (HEADER_LEN as u32 - 8) + data_len;

        self.file.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        self.file.write_all(&riff_len.to_le_bytes())?;
        self.file.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.file.write_all(&data_len.to_le_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }
}

fn write_header(
    file: &mut File,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_len: u32,
) -> io::Result<()> {
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let riff_len = (HEADER_LEN as u32 - 8) + data_len;

    file.write_all(b"RIFF")?;
    file.write_all(&riff_len.to_le_bytes())?;
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?; // fmt chunk size
    file.write_all(&1u16.to_le_bytes())?; // PCM
    file.write_all(&channels.to_le_bytes())?;
    file.write_all(&sample_rate.to_le_bytes())?;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&block_align.to_le_bytes())?;
    file.write_all(&bits_per_sample.to_le_bytes())?;
    file.write_all(b"data")?;
    file.write_all(&data_len.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_u32(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    fn read_u16(buf: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn header_is_44_bytes_and_describes_format() {
        let tmp = NamedTempFile::new().unwrap();
        let writer = WavWriter::create(tmp.path(), 2, 48_000, 16).unwrap();
        writer.finalize().unwrap();

        let buf = std::fs::read(tmp.path()).unwrap();
        assert_eq!(buf.len(), HEADER_LEN as usize);
        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(&buf[8..12], b"WAVE");
        assert_eq!(&buf[12..16], b"fmt ");
        assert_eq!(read_u16(&buf, 20), 1); // PCM
        assert_eq!(read_u16(&buf, 22), 2); // channels
        assert_eq!(read_u32(&buf, 24), 48_000); // sample rate
        assert_eq!(read_u16(&buf, 34), 16); // bits per sample
        assert_eq!(&buf[36..40], b"data");
    }

    #[test]
    fn finalize_patches_riff_and_data_sizes_from_bytes_written() {
        let tmp = NamedTempFile::new().unwrap();
        let mut writer = WavWriter::create(tmp.path(), 2, 48_000, 16).unwrap();
        writer.write_samples(&[0u8; 4000]).unwrap();
        writer.write_samples(&[0u8; 96]).unwrap();
        writer.finalize().unwrap();

        let buf = std::fs::read(tmp.path()).unwrap();
        assert_eq!(buf.len(), HEADER_LEN as usize + 4096);
        assert_eq!(read_u32(&buf, RIFF_SIZE_OFFSET as usize), 36 + 4096);
        assert_eq!(read_u32(&buf, DATA_SIZE_OFFSET as usize), 4096);
    }

    #[test]
    fn block_align_and_byte_rate_for_24_bit_stereo() {
        let tmp = NamedTempFile::new().unwrap();
        let writer = WavWriter::create(tmp.path(), 2, 48_000, 24).unwrap();
        writer.finalize().unwrap();

        let buf = std::fs::read(tmp.path()).unwrap();
        assert_eq!(read_u16(&buf, 32), 6); // block align = 2 * 24/8
        assert_eq!(read_u32(&buf, 28), 288_000); // byte rate = 48000 * 6
    }
}
