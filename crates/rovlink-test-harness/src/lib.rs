//! rovlink-test-harness: mock transports and simulated boards for rovlink.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! line framing and dispatch without real hardware, and [`MockPortOpener`]
//! for driving the identification handshake against scripted ports.

pub mod mock_opener;
pub mod mock_serial;

pub use mock_opener::{MockPortOpener, OpenRecord};
pub use rovlink_core::frames::HANDSHAKE_REQUEST;
pub use mock_serial::{MockHandle, MockTransport};
