//! Serial transport and port enumeration for rovlink.
//!
//! - [`SerialTransport`]: USB virtual COM ports and UART connections to the
//!   vehicle's microcontroller boards
//! - [`SerialOpener`]: the [`PortOpener`](rovlink_core::PortOpener) used by
//!   device identification
//! - [`list_candidate_ports`]: OS-specific discovery of openable serial ports

pub mod enumerate;
pub mod serial;

pub use enumerate::{Platform, list_candidate_ports, platform_candidates, probe_port};
pub use serial::{SerialConfig, SerialOpener, SerialTransport};
pub use tokio_serial::{DataBits, Parity, StopBits};
