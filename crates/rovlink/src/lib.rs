//! # rovlink -- serial link to a vehicle's microcontroller boards
//!
//! `rovlink` finds which serial port each board is attached to, then keeps
//! reading every board's `name:value` lines, routing telemetry into a shared
//! [`SensorTable`] and operator commands into a [`CommandRelay`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use rovlink::LinkBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let link = LinkBuilder::new()
//!         .baud_rates(&[115_200, 57_600, 9_600])
//!         .build()
//!         .await?;
//!
//!     for device in link.devices() {
//!         println!("{} on {} @ {}", device.declared_name, device.port, device.baud_rate);
//!     }
//!
//!     let command = link.commands().pop().await;
//!     println!("command: {command}");
//!     println!("sensors: {:?}", link.sensors().snapshot().await);
//!
//!     link.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                              |
//! |------------------------|------------------------------------------------------|
//! | `rovlink-core`         | [`Transport`] / [`PortOpener`] traits, name sets, errors |
//! | `rovlink-transport`    | Serial transport and port enumeration                |
//! | `rovlink-link`         | Handshake, classification, sensor table, dispatch    |
//! | `rovlink-test-harness` | Mock transports and simulated boards                 |
//! | **`rovlink`**          | This facade crate -- builder and running link        |
//!
//! ## Data flow
//!
//! port enumeration → identification handshake → one line reader per board →
//! inbound queue → dispatch loop → classifier → sensor table or command relay.

pub mod builder;
pub mod discover;
pub mod link;

pub use builder::{LinkBuilder, LinkConfig};
pub use discover::{candidate_ports, discover};
pub use link::Link;

pub use rovlink_core::{
    DEFAULT_COMMANDS, DEFAULT_SENSORS, Error, META_TOKENS, PortOpener, Result, Transport,
    ValidNames,
};
pub use rovlink_link::{
    Classification, Classifier, CommandRelay, DeviceIdentity, DispatchStats, IdentifyConfig,
    InboundLine, SensorTable, classify, identify, identify_devices,
};
pub use rovlink_transport::{Platform, SerialConfig, SerialOpener, SerialTransport};
