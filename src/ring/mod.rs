//! Ring buffers shared between the transfer and processing workers.

mod conversion_buffer;
mod disk_buffer;

pub use conversion_buffer::ConversionBufferRing;
pub use disk_buffer::{DiskBufferRing, SlotGuard, SlotState};
