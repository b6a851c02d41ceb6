//! Disk write back end. The processing worker hands each finished
//! conversion buffer to a [`DiskWriteChannel`] without caring whether the
//! write happens synchronously on the calling thread or is handed off to
//! overlap with the next buffer's conversion.

mod sync_writer;

#[cfg(not(target_os = "windows"))]
mod pipelined_writer;
#[cfg(target_os = "windows")]
mod windows_overlapped;

pub use sync_writer::SyncDiskWriter;

#[cfg(not(target_os = "windows"))]
pub use pipelined_writer::PipelinedDiskWriter;
#[cfg(target_os = "windows")]
pub use windows_overlapped::WindowsOverlappedWriter;

use std::io;

/// One sequential output stream (the RF file, or one of the two WAV
/// files). Implementations own the underlying file handle.
pub trait DiskWriteChannel: Send {
    /// Queue `data` for writing, in order. May block if the channel has
    /// no spare capacity to accept more in-flight writes.
    fn write_buffer(&mut self, data: &[u8]) -> io::Result<()>;

    /// Wait for all queued writes to land and release the file handle.
    /// The first write error encountered, if any, is returned here.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Build the disk writer a [`crate::session::SessionConfig`] asks for:
/// synchronous when `use_async_file_io` is false, pipelined/overlapped
/// otherwise. `queue_depth` should match the session's conversion buffer
/// count minus one, so the channel never outruns the buffers backing it.
pub fn open_channel(
    file: std::fs::File,
    use_async_file_io: bool,
    queue_depth: usize,
) -> Box<dyn DiskWriteChannel> {
    if !use_async_file_io {
        return Box::new(SyncDiskWriter::new(file));
    }
    #[cfg(target_os = "windows")]
    {
        Box::new(windows_overlapped::WindowsOverlappedWriter::spawn(file, queue_depth))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Box::new(pipelined_writer::PipelinedDiskWriter::spawn(file, queue_depth))
    }
}
