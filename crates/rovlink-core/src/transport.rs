//! Transport traits for device communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a
//! microcontroller board. [`PortOpener`] abstracts over how a transport is
//! obtained for a port path and baud rate, so the identification handshake
//! can run against real serial ports or against simulated devices from the
//! `rovlink-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a device.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Line framing and classification are handled by the consumers of
/// this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the device.
    ///
    /// Returns [`Error::WriteTimeout`](crate::error::Error::WriteTimeout)
    /// if the bytes could not be written within the transport's write timeout.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if no data is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any bytes the OS has buffered but not yet delivered.
    async fn clear_input(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Opens transports for a port path at a given baud rate.
#[async_trait]
pub trait PortOpener: Send + Sync {
    /// Open `port` at `baud_rate`.
    ///
    /// `write_timeout` bounds every subsequent `send()` on the returned
    /// transport.
    async fn open(
        &self,
        port: &str,
        baud_rate: u32,
        write_timeout: Duration,
    ) -> Result<Box<dyn Transport>>;
}
