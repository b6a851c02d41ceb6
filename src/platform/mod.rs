//! Platform capability layer for the real-time capture path.
//!
//! Two concerns need OS-specific code: pinning the disk and conversion
//! buffers so they can't be paged out mid-transfer, and boosting the
//! processing worker's scheduling priority so it isn't starved by the
//! rest of the system. Both are best-effort: a platform that can't do
//! one falls back to a no-op rather than failing the capture.

#![allow(dead_code)]

use thiserror::Error;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
pub use linux::LinuxPlatform as CurrentPlatform;
#[cfg(target_os = "macos")]
pub use macos::MacOSPlatform as CurrentPlatform;
#[cfg(target_os = "windows")]
pub use windows::WindowsPlatform as CurrentPlatform;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub use fallback::FallbackPlatform as CurrentPlatform;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
mod fallback {
    use super::{MemoryPinner, PlatformError, PriorityBooster};

    #[derive(Debug, Default)]
    pub struct FallbackPlatform;

    impl MemoryPinner for FallbackPlatform {
        fn pin(&self, _addr: *const u8, _len: usize) -> Result<(), PlatformError> {
            Ok(())
        }

        fn unpin(&self, _addr: *const u8, _len: usize) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    impl PriorityBooster for FallbackPlatform {
        fn boost_current_thread(&self) -> Result<(), PlatformError> {
            Ok(())
        }
    }
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("memory pin error: {0}")]
    Pin(String),

    #[error("priority boost error: {0}")]
    Priority(String),
}

/// Locks buffer memory in place so it can't be swapped out while a
/// transfer is in flight. Implementations must tolerate `unpin` being
/// skipped (the process exiting) without leaking OS resources that
/// outlive it.
pub trait MemoryPinner: Send + Sync {
    fn pin(&self, addr: *const u8, len: usize) -> Result<(), PlatformError>;
    fn unpin(&self, addr: *const u8, len: usize) -> Result<(), PlatformError>;
}

/// Raises the calling thread to a real-time-ish scheduling class. Meant
/// to be called once, from the processing worker thread itself, before
/// it enters its hot loop.
pub trait PriorityBooster: Send + Sync {
    fn boost_current_thread(&self) -> Result<(), PlatformError>;
}
