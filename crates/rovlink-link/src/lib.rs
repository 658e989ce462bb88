//! Device identification, line classification and dispatch for rovlink.
//!
//! # Architecture
//!
//! - [`protocol`]: newline framing and the identification handshake frames
//! - [`identify`]: per-port, per-baud handshake returning the port map
//! - [`classify`]: command / telemetry / noise routing of one line
//! - [`sensors`]: the shared latest-value [`SensorTable`]
//! - [`relay`]: the FIFO [`CommandRelay`]
//! - [`reader`]: per-port tasks framing serial bytes into lines
//! - [`dispatch`]: the long-running loop feeding lines to the classifier

pub mod classify;
pub mod dispatch;
pub mod identify;
pub mod protocol;
pub mod reader;
pub mod relay;
pub mod sensors;

pub use classify::{Classification, Classifier, classify};
pub use dispatch::{
    DispatchConfig, DispatchHandle, DispatchStats, InboundLine, dispatch_line, run_dispatch_loop,
    spawn_dispatch,
};
pub use identify::{DeviceIdentity, IdentifyConfig, identify, identify_devices};
pub use reader::{ReaderExit, ReaderHandle, spawn_line_reader};
pub use relay::CommandRelay;
pub use sensors::SensorTable;
