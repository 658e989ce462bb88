//! Simulated serial ports for identification and link tests.
//!
//! [`MockPortOpener`] implements [`PortOpener`] over a table of scripted
//! ports. Each port can host a board that answers the identification
//! handshake at specific baud rates, be busy, stay silent, or time out on
//! writes. Every open is logged so tests can assert which (port, baud)
//! combinations were tried.
//!
//! # Example
//!
//! ```
//! use rovlink_test_harness::MockPortOpener;
//!
//! let opener = MockPortOpener::new()
//!     .device("/dev/ttyACM0", "Teensy", &[57_600])
//!     .busy("/dev/ttyACM1");
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use rovlink_core::error::{Error, Result};
use rovlink_core::frames::{self, HANDSHAKE_REQUEST};
use rovlink_core::transport::{PortOpener, Transport};

use crate::mock_serial::{MockHandle, MockTransport};

#[derive(Debug, Clone)]
enum Behavior {
    Device {
        name: String,
        baud_rates: Vec<u32>,
        telemetry: Vec<String>,
    },
    Busy,
    Silent,
    WriteTimeout,
}

/// One recorded call to [`PortOpener::open`].
#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub port: String,
    pub baud_rate: u32,
    pub handle: Option<MockHandle>,
}

/// A [`PortOpener`] backed by scripted [`MockTransport`]s.
#[derive(Debug, Default)]
pub struct MockPortOpener {
    ports: HashMap<String, Behavior>,
    opens: Mutex<Vec<OpenRecord>>,
}

impl MockPortOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// A board on `port` that answers `device_name:<name>>` at any of
    /// `baud_rates` and stays silent at every other rate.
    pub fn device(mut self, port: &str, name: &str, baud_rates: &[u32]) -> Self {
        self.ports.insert(
            port.to_string(),
            Behavior::Device {
                name: name.to_string(),
                baud_rates: baud_rates.to_vec(),
                telemetry: Vec::new(),
            },
        );
        self
    }

    /// Lines the board on `port` streams whenever it is open at a baud rate
    /// it understands. Has no effect on ports without a board.
    pub fn telemetry(mut self, port: &str, lines: &[&str]) -> Self {
        if let Some(Behavior::Device { telemetry, .. }) = self.ports.get_mut(port) {
            telemetry.extend(lines.iter().map(|l| l.to_string()));
        }
        self
    }

    /// A port that fails to open, as if held by another process.
    pub fn busy(mut self, port: &str) -> Self {
        self.ports.insert(port.to_string(), Behavior::Busy);
        self
    }

    /// A port that opens but never answers.
    pub fn silent(mut self, port: &str) -> Self {
        self.ports.insert(port.to_string(), Behavior::Silent);
        self
    }

    /// A port whose writes never complete.
    pub fn write_timeout(mut self, port: &str) -> Self {
        self.ports.insert(port.to_string(), Behavior::WriteTimeout);
        self
    }

    /// All open attempts in call order, including failed ones.
    pub fn opens(&self) -> Vec<OpenRecord> {
        self.opens.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Baud rates `port` was opened at, in call order.
    pub fn bauds_tried(&self, port: &str) -> Vec<u32> {
        self.opens()
            .into_iter()
            .filter(|r| r.port == port)
            .map(|r| r.baud_rate)
            .collect()
    }

    fn record(&self, port: &str, baud_rate: u32, handle: Option<MockHandle>) {
        if let Ok(mut opens) = self.opens.lock() {
            opens.push(OpenRecord {
                port: port.to_string(),
                baud_rate,
                handle,
            });
        }
    }
}

#[async_trait]
impl PortOpener for MockPortOpener {
    async fn open(
        &self,
        port: &str,
        baud_rate: u32,
        _write_timeout: Duration,
    ) -> Result<Box<dyn Transport>> {
        let behavior = match self.ports.get(port) {
            Some(Behavior::Busy) | None => {
                self.record(port, baud_rate, None);
                return Err(Error::PortUnavailable {
                    port: port.to_string(),
                    reason: "device or resource busy".into(),
                });
            }
            Some(behavior) => behavior,
        };

        let mut mock = MockTransport::new();
        mock.allow_unexpected_sends();
        match behavior {
            Behavior::Device {
                name,
                baud_rates,
                telemetry,
            } if baud_rates.contains(&baud_rate) => {
                let response = format!("{}\r\n", frames::handshake_response(name));
                mock.expect(HANDSHAKE_REQUEST, response.as_bytes());
                for line in telemetry {
                    mock.push_inbound(format!("{line}\r\n").as_bytes());
                }
            }
            Behavior::WriteTimeout => mock.fail_writes_with_timeout(),
            _ => {}
        }

        self.record(port, baud_rate, Some(mock.handle()));
        Ok(Box::new(mock))
    }
}
