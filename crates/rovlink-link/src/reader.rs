//! Per-port line reader.
//!
//! One tokio task owns each identified board's transport, frames its byte
//! stream into lines and forwards them to the dispatch loop's inbound
//! queue. A lost connection is reported and ends the reader; there is no
//! mid-session reconnect.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use rovlink_core::error::Error;
use rovlink_core::transport::Transport;

use crate::dispatch::InboundLine;
use crate::protocol::{self, DecodeResult};

/// Maximum partial-line buffer before reset to prevent unbounded growth.
/// Lines are typically under 40 bytes; 4096 is generous headroom.
const MAX_BUF: usize = 4096;

/// Consecutive failed reads after which the port is treated as lost.
const MAX_CONSECUTIVE_ERRORS: u32 = 20;

/// Pause between reads after a failed one.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Why a reader task stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The cancellation token fired.
    Cancelled,
    /// The dispatch loop's queue is gone.
    QueueClosed,
    /// The transport failed.
    TransportFailed(String),
}

/// Handle to a running reader task.
pub struct ReaderHandle {
    pub port: String,
    pub cancel: CancellationToken,
    pub task: JoinHandle<ReaderExit>,
}

impl ReaderHandle {
    /// Stop the reader and wait for it to close its transport.
    pub async fn shutdown(self) -> ReaderExit {
        self.cancel.cancel();
        self.task
            .await
            .unwrap_or_else(|e| ReaderExit::TransportFailed(e.to_string()))
    }
}

/// Spawn a reader for `transport` on `port`.
pub fn spawn_line_reader(
    transport: Box<dyn Transport>,
    port: String,
    inbound: mpsc::Sender<InboundLine>,
    read_timeout: Duration,
    cancel: CancellationToken,
) -> ReaderHandle {
    let task = tokio::spawn(read_loop(
        transport,
        port.clone(),
        inbound,
        read_timeout,
        cancel.clone(),
    ));
    ReaderHandle { port, cancel, task }
}

/// The reader loop. Runs as a spawned Tokio task.
async fn read_loop(
    mut transport: Box<dyn Transport>,
    port: String,
    inbound: mpsc::Sender<InboundLine>,
    read_timeout: Duration,
    cancel: CancellationToken,
) -> ReaderExit {
    let mut line_buf = Vec::new();
    let mut recv_buf = [0u8; 256];
    let mut consecutive_errors = 0u32;

    let exit = loop {
        let received = tokio::select! {
            biased;

            _ = cancel.cancelled() => break ReaderExit::Cancelled,

            r = transport.receive(&mut recv_buf, read_timeout) => r,
        };

        match received {
            Ok(n) => {
                consecutive_errors = 0;
                line_buf.extend_from_slice(&recv_buf[..n]);
                if line_buf.len() > MAX_BUF {
                    warn!(port = %port, len = line_buf.len(), "line buffer overflow, resetting");
                    line_buf.clear();
                    continue;
                }
                if let Err(exit) = forward_lines(&mut line_buf, &port, &inbound, &cancel).await {
                    break exit;
                }
            }
            Err(Error::Timeout) => consecutive_errors = 0,
            Err(e @ (Error::ConnectionLost | Error::NotConnected)) => {
                error!(port = %port, error = %e, "serial connection lost");
                break ReaderExit::TransportFailed(e.to_string());
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!(
                        port = %port,
                        error = %e,
                        failures = consecutive_errors,
                        "serial port keeps failing, treating connection as lost"
                    );
                    break ReaderExit::TransportFailed(e.to_string());
                }
                warn!(port = %port, error = %e, "receive failed");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    };

    if let Err(e) = transport.close().await {
        debug!(port = %port, error = %e, "error closing transport");
    }
    debug!(port = %port, ?exit, "line reader stopped");
    exit
}

/// Decode every complete line in `buf` and forward it.
async fn forward_lines(
    buf: &mut Vec<u8>,
    port: &str,
    inbound: &mpsc::Sender<InboundLine>,
    cancel: &CancellationToken,
) -> Result<(), ReaderExit> {
    loop {
        match protocol::decode_line(buf) {
            DecodeResult::Line { line, consumed } => {
                buf.drain(..consumed);
                if line.trim().is_empty() {
                    continue;
                }
                trace!(port = %port, line = %line, "line received");
                let msg = InboundLine::new(port, line);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ReaderExit::Cancelled),
                    sent = inbound.send(msg) => {
                        if sent.is_err() {
                            return Err(ReaderExit::QueueClosed);
                        }
                    }
                }
            }
            DecodeResult::Invalid(consumed) => {
                buf.drain(..consumed);
                warn!(port = %port, "dropping non-UTF-8 line");
            }
            DecodeResult::Incomplete => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rovlink_test_harness::MockTransport;

    async fn collect(rx: &mut mpsc::Receiver<InboundLine>, n: usize) -> Vec<String> {
        let mut lines = Vec::new();
        for _ in 0..n {
            let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for line")
                .expect("queue closed");
            lines.push(msg.line);
        }
        lines
    }

    #[tokio::test(start_paused = true)]
    async fn frames_lines_across_chunks() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"depth:1.");
        mock.push_inbound(b"5\r\nroll:2\n\r\nreset:0\n");
        mock.push_inbound(b"partial");
        let handle = mock.handle();

        let (tx, mut rx) = mpsc::channel(16);
        let reader = spawn_line_reader(
            Box::new(mock),
            "/dev/ttyACM0".into(),
            tx,
            Duration::from_millis(100),
            CancellationToken::new(),
        );

        let lines = collect(&mut rx, 3).await;
        assert_eq!(lines, vec!["depth:1.5", "roll:2", "reset:0"]);

        assert_eq!(reader.shutdown().await, ReaderExit::Cancelled);
        assert!(handle.is_closed());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drops_invalid_utf8() {
        let mut mock = MockTransport::new();
        mock.push_inbound(&[0xFF, 0xFE, b'\n']);
        mock.push_inbound(b"pitch:3\n");

        let (tx, mut rx) = mpsc::channel(16);
        let reader = spawn_line_reader(
            Box::new(mock),
            "COM4".into(),
            tx,
            Duration::from_millis(100),
            CancellationToken::new(),
        );

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg, InboundLine::new("COM4", "pitch:3"));
        reader.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn connection_loss_ends_reader() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"heading:12\n");
        mock.lose_connection_when_drained();
        let handle = mock.handle();

        let (tx, mut rx) = mpsc::channel(16);
        let reader = spawn_line_reader(
            Box::new(mock),
            "/dev/ttyUSB0".into(),
            tx,
            Duration::from_millis(100),
            CancellationToken::new(),
        );

        assert_eq!(rx.recv().await.unwrap().line, "heading:12");
        let exit = reader.task.await.unwrap();
        assert!(matches!(exit, ReaderExit::TransportFailed(_)));
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_queue_ends_reader() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"depth:1\n");

        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let reader = spawn_line_reader(
            Box::new(mock),
            "COM7".into(),
            tx,
            Duration::from_millis(100),
            CancellationToken::new(),
        );
        assert_eq!(reader.task.await.unwrap(), ReaderExit::QueueClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_resets_buffer() {
        let mut mock = MockTransport::new();
        mock.push_inbound(&vec![b'x'; MAX_BUF + 1]);
        mock.push_inbound(b"\nroll:1\n");

        let (tx, mut rx) = mpsc::channel(16);
        let reader = spawn_line_reader(
            Box::new(mock),
            "COM8".into(),
            tx,
            Duration::from_millis(100),
            CancellationToken::new(),
        );

        assert_eq!(rx.recv().await.unwrap().line, "roll:1");
        reader.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_read_errors_end_reader() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"depth:0.5\n");
        // EIO, as from a USB adapter that was pulled.
        mock.fail_reads_with_os_error(5);
        let handle = mock.handle();

        let (tx, mut rx) = mpsc::channel(16);
        let reader = spawn_line_reader(
            Box::new(mock),
            "/dev/ttyUSB1".into(),
            tx,
            Duration::from_millis(100),
            CancellationToken::new(),
        );

        assert_eq!(rx.recv().await.unwrap().line, "depth:0.5");
        let exit = tokio::time::timeout(Duration::from_secs(10), reader.task)
            .await
            .expect("reader kept retrying a dead port")
            .unwrap();
        assert!(matches!(exit, ReaderExit::TransportFailed(_)));
        assert!(handle.is_closed());
    }
}
