//! Serial port transport for board communication.
//!
//! This module provides [`SerialTransport`], which implements the [`Transport`]
//! trait for USB virtual COM ports (Arduino, Teensy) and physical UARTs, and
//! [`SerialOpener`], the [`PortOpener`] used by device identification.
//!
//! Boards on the vehicle typically run at one of:
//! - 115200 baud (Teensy, most newer sketches)
//! - 57600 baud
//! - 9600 baud (Arduino defaults)
//!
//! # Example
//!
//! ```no_run
//! use rovlink_transport::SerialTransport;
//! use rovlink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> rovlink_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyACM0", 115_200).await?;
//!
//! transport.send(b"<request_name:0>").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use rovlink_core::error::{Error, Result};
use rovlink_core::transport::{PortOpener, Transport};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};

/// Line settings used when opening a board's port.
///
/// The boards all speak 8N1 with no flow control; only the baud rate
/// differs between sketches.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// Upper bound on a single `send()`.
    pub write_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            write_timeout: Duration::from_secs(2),
        }
    }
}

/// Serial port transport for one board.
pub struct SerialTransport {
    /// The underlying serial port stream
    port: Option<SerialStream>,
    /// Port name for logging/debugging
    port_name: String,
    write_timeout: Duration,
}

impl SerialTransport {
    /// Open a serial port with the given baud rate and default settings.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyACM0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - Baud rate (e.g., 9600, 57600, 115200)
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with full configuration control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            write_timeout_ms = config.write_timeout.as_millis(),
            "Opening serial port"
        );

        let serial_stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                tracing::debug!(port = %port, error = %e, "Failed to open serial port");
                Error::PortUnavailable {
                    port: port.to_string(),
                    reason: e.to_string(),
                }
            })?;

        tracing::debug!(port = %port, baud_rate = config.baud_rate, "Serial port opened");

        Ok(Self {
            port: Some(serial_stream),
            port_name: port.to_string(),
            write_timeout: config.write_timeout,
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// OS error codes a serial driver reports once the device node is gone.
#[cfg(unix)]
const DEVICE_GONE_CODES: &[i32] = &[
    5,  // EIO
    6,  // ENXIO
    19, // ENODEV
];

#[cfg(windows)]
const DEVICE_GONE_CODES: &[i32] = &[
    22,   // ERROR_BAD_COMMAND
    1167, // ERROR_DEVICE_NOT_CONNECTED
];

#[cfg(not(any(unix, windows)))]
const DEVICE_GONE_CODES: &[i32] = &[];

fn map_io_error(e: std::io::Error) -> Error {
    if e
        .raw_os_error()
        .is_some_and(|code| DEVICE_GONE_CODES.contains(&code))
    {
        return Error::ConnectionLost;
    }
    match e.kind() {
        std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::UnexpectedEof => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?String::from_utf8_lossy(data),
            "Sending data"
        );

        let write = async {
            port.write_all(data).await?;
            port.flush().await
        };

        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
                Err(map_io_error(e))
            }
            Err(_) => {
                tracing::debug!(
                    port = %self.port_name,
                    timeout_ms = self.write_timeout.as_millis(),
                    "Write timed out"
                );
                Err(Error::WriteTimeout(self.port_name.clone()))
            }
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            // A zero-length read on a serial stream means the device went away.
            Ok(Ok(0)) if !buf.is_empty() => {
                tracing::error!(port = %self.port_name, "Serial port returned EOF");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = ?String::from_utf8_lossy(&buf[..n]),
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Failed to receive data");
                Err(map_io_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        port.clear(ClearBuffer::Input).map_err(|e| {
            Error::Transport(format!(
                "failed to clear input on {}: {}",
                self.port_name, e
            ))
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }
            tracing::debug!(port = %self.port_name, "Serial port closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

/// [`PortOpener`] backed by real serial ports.
#[derive(Debug, Clone, Default)]
pub struct SerialOpener {
    template: SerialConfig,
}

impl SerialOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for everything except baud rate and write timeout,
    /// which are supplied per open.
    pub fn with_config(config: SerialConfig) -> Self {
        Self { template: config }
    }
}

#[async_trait]
impl PortOpener for SerialOpener {
    async fn open(
        &self,
        port: &str,
        baud_rate: u32,
        write_timeout: Duration,
    ) -> Result<Box<dyn Transport>> {
        let config = SerialConfig {
            baud_rate,
            write_timeout,
            ..self.template.clone()
        };
        let transport = SerialTransport::open_with_config(port, config).await?;
        Ok(Box::new(transport))
    }
}
