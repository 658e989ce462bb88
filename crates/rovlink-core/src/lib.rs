//! rovlink-core: Core traits, name sets, and error definitions for rovlink.
//!
//! This crate defines the hardware-agnostic abstractions shared by the
//! serial transport, the identification handshake and the line dispatch
//! loop. Front ends depend on these types without pulling in a serial
//! backend.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel to one board
//! - [`PortOpener`] -- how a transport is opened for a port and baud rate
//! - [`ValidNames`] -- the command and sensor name sets
//! - [`frames`] -- the identification handshake frames
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod frames;
pub mod names;
pub mod transport;

pub use error::{Error, Result};
pub use frames::{DEVICE_NAME_FIELD, HANDSHAKE_REQUEST};
pub use names::{DEFAULT_COMMANDS, DEFAULT_SENSORS, META_TOKENS, ValidNames};
pub use transport::{PortOpener, Transport};
