//! Device identification handshake.
//!
//! Boards enumerate in whatever order the OS finds them, so the port a
//! board lands on is unknown until it is asked. Each candidate port is
//! opened, sent `<request_name:0>`, and given a short window to answer with
//! a `device_name:<name>` line. Baud rates are tried in order; a port that
//! answers is not probed again at slower rates.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use rovlink_link::identify::{self, IdentifyConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(opener: Arc<dyn rovlink_core::PortOpener>) -> rovlink_core::Result<()> {
//! let ports: BTreeSet<String> = ["/dev/ttyACM0".to_string()].into();
//! let map = identify::identify(opener, ports, &IdentifyConfig::default(), &CancellationToken::new()).await?;
//! for (port, name) in &map {
//!     println!("{port} -> {name}");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use rovlink_core::error::{Error, Result};
use rovlink_core::transport::{PortOpener, Transport};

use crate::protocol::{self, DecodeResult};

/// Baud rates tried when none are configured, fastest first.
pub const DEFAULT_BAUD_RATES: &[u32] = &[115_200, 57_600, 9_600];

/// Identification window per (port, baud) attempt.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest handshake response accepted before the buffer is discarded.
const MAX_RESPONSE_BUF: usize = 1024;

/// Configuration for the identification handshake.
#[derive(Debug, Clone)]
pub struct IdentifyConfig {
    /// Baud rates in the order they are tried.
    pub baud_rates: Vec<u32>,
    /// How long a port gets to answer at one baud rate.
    pub handshake_timeout: Duration,
    /// Longest single read while waiting for the answer.
    pub read_timeout: Duration,
    /// Upper bound on writing the request.
    pub write_timeout: Duration,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            baud_rates: DEFAULT_BAUD_RATES.to_vec(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_secs(2),
        }
    }
}

/// A board that answered the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// Port path the board answered on.
    pub port: String,
    /// The name the board reported.
    pub declared_name: String,
    /// Baud rate the board answered at.
    pub baud_rate: u32,
}

/// Identify the boards on `ports`, returning a port → declared name map.
///
/// Ports that never answer are absent from the map.
pub async fn identify<I>(
    opener: Arc<dyn PortOpener>,
    ports: I,
    config: &IdentifyConfig,
    cancel: &CancellationToken,
) -> Result<HashMap<String, String>>
where
    I: IntoIterator<Item = String>,
{
    let devices = identify_devices(opener, ports, config, cancel).await?;
    Ok(devices
        .into_iter()
        .map(|d| (d.port, d.declared_name))
        .collect())
}

/// Identify the boards on `ports`.
///
/// For each baud rate in order, every still-unidentified port is probed
/// concurrently. Per-port failures (busy port, no answer, write timeout,
/// transport error) are logged and leave that port for the next baud rate.
/// The only error returned is [`Error::InvalidParameter`] for an empty baud
/// list. If `cancel` fires, open ports are closed and the boards found so
/// far are returned.
///
/// The result is sorted by port.
pub async fn identify_devices<I>(
    opener: Arc<dyn PortOpener>,
    ports: I,
    config: &IdentifyConfig,
    cancel: &CancellationToken,
) -> Result<Vec<DeviceIdentity>>
where
    I: IntoIterator<Item = String>,
{
    if config.baud_rates.is_empty() {
        return Err(Error::InvalidParameter("no baud rates to try".into()));
    }

    let mut remaining: BTreeSet<String> = ports.into_iter().collect();
    let mut found = Vec::new();

    debug!(ports = ?remaining, baud_rates = ?config.baud_rates, "Identifying devices");

    for &baud_rate in &config.baud_rates {
        if remaining.is_empty() {
            break;
        }
        if cancel.is_cancelled() {
            debug!("identification cancelled");
            break;
        }

        let mut probes = JoinSet::new();
        for port in &remaining {
            probes.spawn(probe(
                Arc::clone(&opener),
                port.clone(),
                baud_rate,
                config.clone(),
                cancel.clone(),
            ));
        }

        while let Some(joined) = probes.join_next().await {
            let (port, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "identification probe panicked");
                    continue;
                }
            };
            match outcome {
                Ok(declared_name) => {
                    info!(port = %port, baud_rate, device = %declared_name, "Found device");
                    remaining.remove(&port);
                    found.push(DeviceIdentity {
                        port,
                        declared_name,
                        baud_rate,
                    });
                }
                Err(e @ Error::PortUnavailable { .. }) => {
                    debug!(port = %port, baud_rate, error = %e, "port unavailable");
                }
                Err(e @ Error::HandshakeTimeout { .. }) => {
                    debug!(port = %port, baud_rate, error = %e, "device did not respond");
                }
                Err(Error::Cancelled) => {}
                Err(e) => {
                    warn!(port = %port, baud_rate, error = %e, "identification failed");
                }
            }
        }
    }

    found.sort_by(|a, b| a.port.cmp(&b.port));
    debug!(found = found.len(), unidentified = ?remaining, "Device identification complete");
    Ok(found)
}

/// Probe one port at one baud rate. Always closes the port it opened.
async fn probe(
    opener: Arc<dyn PortOpener>,
    port: String,
    baud_rate: u32,
    config: IdentifyConfig,
    cancel: CancellationToken,
) -> (String, Result<String>) {
    let mut transport = match opener.open(&port, baud_rate, config.write_timeout).await {
        Ok(t) => t,
        Err(e) => return (port, Err(e)),
    };

    trace!(port = %port, baud_rate, "Checking port");

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        r = handshake(transport.as_mut(), &port, baud_rate, &config) => r,
    };

    if outcome.is_ok() {
        if let Err(e) = transport.clear_input().await {
            debug!(port = %port, error = %e, "failed to clear input after handshake");
        }
    }
    if let Err(e) = transport.close().await {
        debug!(port = %port, error = %e, "failed to close port after probe");
    }

    (port, outcome)
}

/// Send the request and wait for a handshake response line.
///
/// Lines that are not handshake responses (telemetry already streaming,
/// boot banners) are skipped until the window closes.
async fn handshake(
    transport: &mut dyn Transport,
    port: &str,
    baud_rate: u32,
    config: &IdentifyConfig,
) -> Result<String> {
    transport.send(protocol::HANDSHAKE_REQUEST).await?;

    let deadline = Instant::now() + config.handshake_timeout;
    let mut response_buf = Vec::new();
    let mut recv_buf = [0u8; 256];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::HandshakeTimeout {
                port: port.to_string(),
                baud_rate,
            });
        }

        match transport
            .receive(&mut recv_buf, remaining.min(config.read_timeout))
            .await
        {
            Ok(n) => {
                response_buf.extend_from_slice(&recv_buf[..n]);
                if response_buf.len() > MAX_RESPONSE_BUF {
                    // Wrong baud rate tends to produce a stream of garbage
                    // with no newline.
                    trace!(port = %port, baud_rate, "response buffer overflow, clearing");
                    response_buf.clear();
                    continue;
                }
                loop {
                    match protocol::decode_line(&response_buf) {
                        DecodeResult::Line { line, consumed } => {
                            response_buf.drain(..consumed);
                            if let Some(name) = protocol::parse_handshake_response(&line) {
                                return Ok(name);
                            }
                            trace!(port = %port, line = %line, "skipping non-handshake line");
                        }
                        DecodeResult::Invalid(consumed) => {
                            response_buf.drain(..consumed);
                        }
                        DecodeResult::Incomplete => break,
                    }
                }
            }
            Err(Error::Timeout) => {
                // Some sketches answer without a trailing newline. A quiet
                // line only completes the response once its closing `>` is
                // in; anything shorter may be a board stalled mid-name.
                if let Some(name) = unterminated_response(&response_buf) {
                    return Ok(name);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// A complete handshake response that arrived without its newline.
fn unterminated_response(buf: &[u8]) -> Option<String> {
    let partial = std::str::from_utf8(buf).ok()?.trim_end();
    if !partial.ends_with(protocol::RESPONSE_CLOSE) {
        return None;
    }
    protocol::parse_handshake_response(partial)
}
