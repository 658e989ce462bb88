//! Mock transport for deterministic testing without boards attached.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs and queued unsolicited data. This lets you test
//! the identification handshake, line framing and dispatch without real
//! hardware.
//!
//! # Example
//!
//! ```
//! use rovlink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the handshake request is sent, answer with the board's name.
//! mock.expect(b"<request_name:0>", b"device_name:Teensy>\r\n");
//! // Telemetry the board streams on its own.
//! mock.push_inbound(b"depth:1.25\r\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rovlink_core::error::{Error, Result};
use rovlink_core::transport::Transport;

/// One scripted exchange: when `request` is sent, the board answers with
/// `response`.
#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    response: Vec<u8>,
}

/// Observable side effects of a [`MockTransport`].
///
/// Shared with [`MockHandle`] so tests can inspect a transport after it has
/// been boxed and handed to the code under test.
#[derive(Debug, Default)]
struct MockState {
    sent: Vec<Vec<u8>>,
    input_clears: usize,
    closed: bool,
}

/// Read-only view onto a [`MockTransport`] that outlives moving it.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// All data sent through the transport, one element per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.state.lock().map(|s| s.sent.clone()).unwrap_or_default()
    }

    /// How many times `clear_input()` was called.
    pub fn input_clears(&self) -> usize {
        self.state.lock().map(|s| s.input_clears).unwrap_or(0)
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(false)
    }
}

/// A mock [`Transport`] for testing without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation. The
/// corresponding response is then returned by the following `receive()`
/// calls, ahead of any unsolicited inbound data.
///
/// When nothing is pending, `receive()` waits out its timeout and returns
/// [`Error::Timeout`], like a quiet serial line.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    /// Answer to the last matched send, returned ahead of inbound data.
    pending_response: Option<Vec<u8>>,
    response_cursor: usize,
    /// Unsolicited chunks, delivered one per `receive()` once their delay
    /// has passed.
    inbound: VecDeque<(Duration, Vec<u8>)>,
    /// Accept sends that match no expectation.
    lenient: bool,
    /// Fail every send with [`Error::WriteTimeout`].
    write_timeout: bool,
    /// Return [`Error::ConnectionLost`] once inbound data is exhausted.
    lose_connection_when_drained: bool,
    /// Fail every read with this OS error once inbound data is exhausted.
    read_os_error: Option<i32>,
    connected: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending_response: None,
            response_cursor: 0,
            inbound: VecDeque::new(),
            lenient: false,
            write_timeout: false,
            lose_connection_when_drained: false,
            read_os_error: None,
            connected: true,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, the subsequent
    /// `receive()` calls will return `response`.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Queue bytes the device sends without being asked.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.push_back((Duration::ZERO, data.to_vec()));
    }

    /// Queue bytes that arrive `delay` after the previous chunk was read,
    /// as when a board stalls mid-line.
    pub fn push_inbound_after(&mut self, delay: Duration, data: &[u8]) {
        self.inbound.push_back((delay, data.to_vec()));
    }

    /// Accept (and record) sends that match no expectation instead of
    /// failing them.
    pub fn allow_unexpected_sends(&mut self) {
        self.lenient = true;
    }

    /// Make every `send()` fail with [`Error::WriteTimeout`].
    pub fn fail_writes_with_timeout(&mut self) {
        self.write_timeout = true;
    }

    /// Report [`Error::ConnectionLost`] after the last inbound chunk.
    pub fn lose_connection_when_drained(&mut self) {
        self.lose_connection_when_drained = true;
    }

    /// Fail every read with the OS error `code` after the last inbound
    /// chunk, as a serial driver does when the device node goes away.
    pub fn fail_reads_with_os_error(&mut self, code: i32) {
        self.read_os_error = Some(code);
    }

    /// A handle for inspecting this transport after it has been moved.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Return all data that has been sent through this transport.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.handle().sent_data()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn take_pending(&mut self, buf: &mut [u8]) -> Option<usize> {
        let response = self.pending_response.as_ref()?;
        let remaining = &response[self.response_cursor..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.response_cursor += n;
        if self.response_cursor >= response.len() {
            self.pending_response = None;
            self.response_cursor = 0;
        }
        Some(n)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if self.write_timeout {
            return Err(Error::WriteTimeout("mock".into()));
        }

        if let Ok(mut state) = self.state.lock() {
            state.sent.push(data.to_vec());
        }

        match self.expectations.pop_front() {
            Some(expectation) => {
                if data != expectation.request.as_slice() {
                    return Err(Error::Protocol(format!(
                        "unexpected send data: expected {:?}, got {:?}",
                        String::from_utf8_lossy(&expectation.request),
                        String::from_utf8_lossy(data)
                    )));
                }
                self.pending_response = Some(expectation.response);
                self.response_cursor = 0;
                Ok(())
            }
            None if self.lenient => Ok(()),
            None => Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            )),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if let Some(n) = self.take_pending(buf) {
            return Ok(n);
        }

        if let Some((delay, mut chunk)) = self.inbound.pop_front() {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                self.inbound.push_front((delay - timeout, chunk));
                return Err(Error::Timeout);
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.inbound.push_front((Duration::ZERO, chunk.split_off(n)));
            }
            return Ok(n);
        }

        if let Some(code) = self.read_os_error {
            return Err(Error::Io(std::io::Error::from_raw_os_error(code)));
        }

        if self.lose_connection_when_drained {
            self.connected = false;
            return Err(Error::ConnectionLost);
        }

        tokio::time::sleep(timeout).await;
        Err(Error::Timeout)
    }

    async fn clear_input(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.pending_response = None;
        self.response_cursor = 0;
        self.inbound.clear();
        if let Ok(mut state) = self.state.lock() {
            state.input_clears += 1;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.pending_response = None;
        self.response_cursor = 0;
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
