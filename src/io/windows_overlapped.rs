use super::DiskWriteChannel;
use std::fs::File;
use std::io;
use std::os::windows::io::AsRawHandle;
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, ERROR_IO_PENDING, HANDLE};
use windows_sys::Win32::Storage::FileSystem::WriteFile;
use windows_sys::Win32::System::IO::{GetOverlappedResult, OVERLAPPED};
use windows_sys::Win32::System::Threading::{CreateEventW, WaitForSingleObject, INFINITE};

/// Append-mode sentinel: `Offset`/`OffsetHigh` both `0xFFFFFFFF` tells
/// `WriteFile` to append at the current end of file rather than seek to
/// an explicit position, the way the original capture tool issues its
/// overlapped writes.
const APPEND_OFFSET_SENTINEL: u32 = 0xFFFF_FFFF;

struct InFlight {
    overlapped: Box<OVERLAPPED>,
    event: HANDLE,
    // Owned copy of the buffer WriteFile is reading from. WriteFile may
    // still be in progress when write_buffer returns, so this must
    // outlive the caller's borrow of the original conversion buffer.
    _buffer: Vec<u8>,
}

/// Queues writes through `WriteFile` with `OVERLAPPED`, letting up to
/// `queue_depth` writes sit in flight so the processing worker can
/// convert the next buffer while the disk catches up.
pub struct WindowsOverlappedWriter {
    handle: HANDLE,
    _file: File,
    slots: Vec<Option<InFlight>>,
    next_slot: usize,
}

// SAFETY: `handle` is an opaque HANDLE owned by `_file`; all access goes
// through the Win32 overlapped I/O calls below, which are thread-safe.
unsafe impl Send for WindowsOverlappedWriter {}

impl WindowsOverlappedWriter {
    pub fn spawn(file: File, queue_depth: usize) -> Self {
        let handle = file.as_raw_handle() as HANDLE;
        let depth = queue_depth.max(1);
        let slots = (0..depth).map(|_| None).collect();
        Self {
            handle,
            _file: file,
            slots,
            next_slot: 0,
        }
    }

    fn wait_slot(&mut self, index: usize) -> io::Result<()> {
        if let Some(in_flight) = self.slots[index].take() {
            unsafe {
                WaitForSingleObject(in_flight.event, INFINITE);
                let mut transferred = 0u32;
                let ok =
                    GetOverlappedResult(self.handle, &*in_flight.overlapped, &mut transferred, 0);
                CloseHandle(in_flight.event);
                if ok == 0 {
                    return Err(io::Error::last_os_error());
                }
            }
        }
        Ok(())
    }
}

impl DiskWriteChannel for WindowsOverlappedWriter {
    fn write_buffer(&mut self, data: &[u8]) -> io::Result<()> {
        let slot = self.next_slot;
        self.next_slot = (self.next_slot + 1) % self.slots.len();
        // Bound how far ahead of the disk this writer can run: reusing a
        // slot means waiting for whatever was previously queued there.
        self.wait_slot(slot)?;

        let buffer = data.to_vec();
        let mut overlapped: Box<OVERLAPPED> = Box::new(unsafe { std::mem::zeroed() });
        overlapped.Anonymous.Anonymous.Offset = APPEND_OFFSET_SENTINEL;
        overlapped.Anonymous.Anonymous.OffsetHigh = APPEND_OFFSET_SENTINEL;
        let event = unsafe { CreateEventW(std::ptr::null(), 1, 0, std::ptr::null()) };
        overlapped.hEvent = event;

        let ok = unsafe {
            WriteFile(
                self.handle,
                buffer.as_ptr(),
                buffer.len() as u32,
                std::ptr::null_mut(),
                overlapped.as_mut(),
            )
        };
        if ok == 0 {
            let err = unsafe { GetLastError() };
            if err != ERROR_IO_PENDING {
                unsafe { CloseHandle(event) };
                return Err(io::Error::from_raw_os_error(err as i32));
            }
        }

        self.slots[slot] = Some(InFlight {
            overlapped,
            event,
            _buffer: buffer,
        });
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        for i in 0..self.slots.len() {
            self.wait_slot(i)?;
        }
        Ok(())
    }
}
