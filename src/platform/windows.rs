use super::{MemoryPinner, PlatformError, PriorityBooster};
use windows_sys::Win32::System::Memory::{VirtualLock, VirtualUnlock};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, GetCurrentThread, SetPriorityClass, SetThreadPriority,
    REALTIME_PRIORITY_CLASS, THREAD_PRIORITY_TIME_CRITICAL,
};

#[derive(Debug, Default)]
pub struct WindowsPlatform;

impl MemoryPinner for WindowsPlatform {
    fn pin(&self, addr: *const u8, len: usize) -> Result<(), PlatformError> {
        let ok = unsafe { VirtualLock(addr as *mut _, len) };
        if ok != 0 {
            Ok(())
        } else {
            Err(PlatformError::Pin(std::io::Error::last_os_error().to_string()))
        }
    }

    fn unpin(&self, addr: *const u8, len: usize) -> Result<(), PlatformError> {
        let ok = unsafe { VirtualUnlock(addr as *mut _, len) };
        if ok != 0 {
            Ok(())
        } else {
            Err(PlatformError::Pin(std::io::Error::last_os_error().to_string()))
        }
    }
}

impl PriorityBooster for WindowsPlatform {
    fn boost_current_thread(&self) -> Result<(), PlatformError> {
        unsafe {
            if SetPriorityClass(GetCurrentProcess(), REALTIME_PRIORITY_CLASS) == 0 {
                return Err(PlatformError::Priority(
                    std::io::Error::last_os_error().to_string(),
                ));
            }
            if SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) == 0 {
                return Err(PlatformError::Priority(
                    std::io::Error::last_os_error().to_string(),
                ));
            }
        }
        Ok(())
    }
}
