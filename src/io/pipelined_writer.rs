use super::DiskWriteChannel;
use std::fs::File;
use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;

/// Hands buffers off to a dedicated writer thread over a bounded channel,
/// so the processing worker can start converting the next buffer while
/// this one is still landing on disk. The portable fallback for
/// `use_async_file_io` on platforms without `OVERLAPPED` I/O.
pub struct PipelinedDiskWriter {
    tx: Option<mpsc::SyncSender<Vec<u8>>>,
    handle: Option<thread::JoinHandle<io::Result<()>>>,
}

impl PipelinedDiskWriter {
    /// `queue_depth` bounds how many buffers may be in flight before
    /// `write_buffer` blocks; it should track the conversion buffer count.
    pub fn spawn(mut file: File, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(queue_depth.max(1));
        let handle = thread::Builder::new()
            .name("rfcapture-disk-writer".into())
            .spawn(move || -> io::Result<()> {
                while let Ok(buf) = rx.recv() {
                    file.write_all(&buf)?;
                }
                file.flush()
            })
            .expect("failed to spawn disk writer thread");
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }
}

impl DiskWriteChannel for PipelinedDiskWriter {
    fn write_buffer(&mut self, data: &[u8]) -> io::Result<()> {
        self.tx
            .as_ref()
            .expect("write_buffer called after finish")
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "disk writer thread exited"))
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.tx.take();
        match self
            .handle
            .take()
            .expect("finish called twice")
            .join()
        {
            Ok(result) => result,
            Err(_) => Err(io::Error::other("disk writer thread panicked")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn buffers_land_on_disk_in_order() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let mut writer: Box<dyn DiskWriteChannel> = Box::new(PipelinedDiskWriter::spawn(file, 2));
        for chunk in [[1u8, 2], [3, 4], [5, 6]] {
            writer.write_buffer(&chunk).unwrap();
        }
        writer.finish().unwrap();

        let contents = std::fs::read(tmp.path()).unwrap();
        assert_eq!(contents, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn finish_surfaces_a_write_error() {
        // Writing to a read-only file should surface through finish().
        let tmp = NamedTempFile::new().unwrap();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .open(tmp.path())
            .unwrap();
        let mut writer: Box<dyn DiskWriteChannel> = Box::new(PipelinedDiskWriter::spawn(file, 1));
        let _ = writer.write_buffer(&[1, 2, 3]);
        assert!(writer.finish().is_err());
    }
}
