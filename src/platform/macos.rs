use std::ptr::NonNull;

use nix::sys::mman::{mlock, munlock};

use super::{MemoryPinner, PlatformError, PriorityBooster};

#[derive(Debug, Default)]
pub struct MacOSPlatform;

impl MemoryPinner for MacOSPlatform {
    fn pin(&self, addr: *const u8, len: usize) -> Result<(), PlatformError> {
        let ptr = NonNull::new(addr as *mut std::ffi::c_void)
            .ok_or_else(|| PlatformError::Pin("null buffer pointer".into()))?;
        unsafe { mlock(ptr, len) }.map_err(|e| PlatformError::Pin(e.to_string()))
    }

    fn unpin(&self, addr: *const u8, len: usize) -> Result<(), PlatformError> {
        let ptr = NonNull::new(addr as *mut std::ffi::c_void)
            .ok_or_else(|| PlatformError::Pin("null buffer pointer".into()))?;
        unsafe { munlock(ptr, len) }.map_err(|e| PlatformError::Pin(e.to_string()))
    }
}

impl PriorityBooster for MacOSPlatform {
    /// macOS doesn't implement `sched_setscheduler`; `pthread_setschedparam`
    /// with `SCHED_RR` is the portable POSIX entry point it does support.
    fn boost_current_thread(&self) -> Result<(), PlatformError> {
        unsafe {
            let min = libc::sched_get_priority_min(libc::SCHED_RR);
            let max = libc::sched_get_priority_max(libc::SCHED_RR);
            if min < 0 || max < 0 {
                return Err(PlatformError::Priority(
                    std::io::Error::last_os_error().to_string(),
                ));
            }
            let param = libc::sched_param {
                sched_priority: (min + 3 * max) / 4,
            };
            let ret = libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_RR, &param);
            if ret == 0 {
                Ok(())
            } else {
                Err(PlatformError::Priority(
                    std::io::Error::from_raw_os_error(ret).to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_and_unpin_a_small_buffer() {
        let buf = vec![0u8; 4096];
        let platform = MacOSPlatform;
        if platform.pin(buf.as_ptr(), buf.len()).is_ok() {
            assert!(platform.unpin(buf.as_ptr(), buf.len()).is_ok());
        }
    }
}
