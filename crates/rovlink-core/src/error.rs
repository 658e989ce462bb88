//! Error types for rovlink.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Enumeration, handshake, transport and
//! line-classification failures are all captured here.

/// The error type for all rovlink operations.
///
/// Most variants are recoverable and isolated to a single port or a single
/// line. Only [`Error::UnsupportedPlatform`] is surfaced as a hard failure
/// from device discovery.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, USB adapter).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (unexpected handshake frame, undecodable bytes).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for data on a transport.
    #[error("timeout waiting for data")]
    Timeout,

    /// An invalid parameter was passed to a builder or constructor.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No transport is open.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A queue was closed while a consumer was waiting on it.
    #[error("stream closed")]
    StreamClosed,

    /// The host OS has no known serial device namespace.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A candidate port could not be opened (missing, busy, no permission).
    #[error("port unavailable: {port}: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// A device did not answer the identification request in time.
    #[error("no handshake response from {port} at {baud_rate} baud")]
    HandshakeTimeout { port: String, baud_rate: u32 },

    /// Writing to a port did not complete within the write timeout.
    #[error("write timeout on {0}")]
    WriteTimeout(String),

    /// A line could not be split into a name and a value.
    #[error("malformed line: {0:?}")]
    MalformedLine(String),

    /// A sensor value could not be parsed as a floating-point number.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    /// A bounded queue rejected a push because it is full.
    #[error("queue full")]
    QueueFull,

    /// The operation was abandoned because its cancellation token fired.
    #[error("cancelled")]
    Cancelled,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
