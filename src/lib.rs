//! Library surface for the capture binary's integration tests.
//!
//! Re-exports the pieces an integration test or a future GUI front end
//! needs without reaching into module-private paths.

pub mod config;
pub mod demux;
pub mod device;
pub mod io;
pub mod panic_handler;
pub mod platform;
pub mod ring;
pub mod session;
pub mod supervisor;
pub mod test_sequence;
pub mod transcode;
pub mod wav;
pub mod workers;

pub use config::Config;
pub use session::{CaptureFormat, Session, SessionConfig, TransferResult};
pub use supervisor::{Supervisor, SupervisorError};
