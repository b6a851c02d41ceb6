use super::DiskWriteChannel;
use std::fs::File;
use std::io::{self, Write};

/// Writes each buffer to disk on the calling thread before returning.
/// Correct for one conversion buffer: there's nothing to overlap with.
pub struct SyncDiskWriter {
    file: File,
}

impl SyncDiskWriter {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl DiskWriteChannel for SyncDiskWriter {
    fn write_buffer(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn writes_land_in_order() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let mut writer: Box<dyn DiskWriteChannel> = Box::new(SyncDiskWriter::new(file));
        writer.write_buffer(&[1, 2, 3]).unwrap();
        writer.write_buffer(&[4, 5]).unwrap();
        writer.finish().unwrap();

        let contents = std::fs::read(tmp.path()).unwrap();
        assert_eq!(contents, vec![1, 2, 3, 4, 5]);
    }
}
