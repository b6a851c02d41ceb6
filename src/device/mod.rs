//! Device abstraction. The real USB hardware is out of scope here; the
//! traits exist so the transfer worker can run unmodified against
//! [`simulated::SimulatedDevice`] in tests and in test-mode captures.

pub mod simulated;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device connection failed: {0}")]
    Connection(String),

    #[error("vendor command failed: {0}")]
    VendorCommand(String),

    #[error("transfer failed: {0}")]
    Transfer(String),
}

/// `bRequest` value the device firmware expects for a configuration
/// vendor command.
pub const CONFIGURATION_BREQUEST: u8 = 0xB6;

/// `wValue` bit carrying the test-mode flag in a configuration command.
/// The remaining 4 of the 5 defined bits are reserved and always zero.
const TEST_MODE_BIT: u16 = 0x01;

/// USB control-transfer surface. `send_configuration_command` has a
/// default implementation so concrete drivers only need to provide the
/// raw vendor command primitive.
pub trait DeviceDriver: Send {
    fn connect(&mut self, device_path: &str) -> Result<(), DeviceError>;
    fn disconnect(&mut self) -> Result<(), DeviceError>;

    fn send_vendor_command(
        &mut self,
        b_request: u8,
        w_value: u16,
        w_index: u16,
        data: &[u8],
    ) -> Result<(), DeviceError>;

    fn send_configuration_command(&mut self, test_mode: bool) -> Result<(), DeviceError> {
        let flags = if test_mode { TEST_MODE_BIT } else { 0 };
        self.send_vendor_command(CONFIGURATION_BREQUEST, flags, 0, &[])
    }
}

/// Bulk transfer source feeding the disk-buffer ring. One call per slot:
/// `next_slot_len` reports how many bytes the next transfer will need
/// (so the transfer worker can size the target slot), `fill` performs the
/// transfer into the given buffer.
pub trait TransferSource: Send {
    fn next_slot_len(&mut self) -> Result<usize, DeviceError>;
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;
}
