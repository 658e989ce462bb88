//! LinkBuilder -- fluent builder for constructing a running [`Link`].
//!
//! Separates configuration from construction so that callers can set baud
//! rates, timeouts and name sets before any port is touched.
//!
//! # Example
//!
//! ```no_run
//! use rovlink::LinkBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> rovlink::Result<()> {
//! let link = LinkBuilder::new()
//!     .baud_rates(&[115_200, 57_600])
//!     .handshake_timeout(Duration::from_secs(2))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rovlink_core::error::{Error, Result};
use rovlink_core::names::ValidNames;
use rovlink_core::transport::PortOpener;
use rovlink_link::classify::Classifier;
use rovlink_link::dispatch::{self, DispatchConfig};
use rovlink_link::identify::IdentifyConfig;
use rovlink_link::reader;
use rovlink_link::relay::CommandRelay;
use rovlink_link::sensors::SensorTable;
use rovlink_transport::SerialOpener;

use crate::discover;
use crate::link::Link;

/// Everything a [`Link`] needs before it starts.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Handshake baud rates and timeouts.
    pub identify: IdentifyConfig,
    /// Dispatch loop tuning.
    pub dispatch: DispatchConfig,
    /// Command and sensor name sets.
    pub names: ValidNames,
    /// Restrict probing to these ports instead of enumerating the host.
    pub ports: Option<BTreeSet<String>>,
    /// Capacity of the queue between line readers and the dispatch loop.
    pub inbound_capacity: usize,
    /// Capacity of the command relay; `None` for unbounded.
    pub command_capacity: Option<usize>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            identify: IdentifyConfig::default(),
            dispatch: DispatchConfig::default(),
            names: ValidNames::default(),
            ports: None,
            inbound_capacity: 256,
            command_capacity: None,
        }
    }
}

/// Fluent builder for [`Link`].
///
/// All configuration has working defaults, so the simplest usage is:
///
/// ```ignore
/// let link = LinkBuilder::new().build().await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct LinkBuilder {
    config: LinkConfig,
}

impl LinkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: LinkConfig) -> Self {
        Self { config }
    }

    /// Baud rates to try during identification, in order.
    pub fn baud_rates(mut self, rates: &[u32]) -> Self {
        self.config.identify.baud_rates = rates.to_vec();
        self
    }

    /// How long each port gets to answer at each baud rate (default: 2s).
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.identify.handshake_timeout = timeout;
        self
    }

    /// Longest single serial read (default: 100ms).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.identify.read_timeout = timeout;
        self
    }

    /// Upper bound on a single serial write (default: 2s).
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.identify.write_timeout = timeout;
        self
    }

    /// Longest wait on the inbound queue per dispatch iteration (default: 10ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.dispatch.poll_interval = interval;
        self
    }

    /// Replace the command and sensor name sets.
    pub fn valid_names(mut self, names: ValidNames) -> Self {
        self.config.names = names;
        self
    }

    /// Probe only these ports instead of enumerating the host.
    pub fn ports<I, S>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ports = Some(ports.into_iter().map(Into::into).collect());
        self
    }

    /// Capacity of the reader → dispatch queue (default: 256).
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.config.inbound_capacity = capacity;
        self
    }

    /// Bound the command relay (default: unbounded).
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.config.command_capacity = Some(capacity);
        self
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Discover boards on real serial ports and start the link.
    pub async fn build(self) -> Result<Link> {
        self.build_with_opener(Arc::new(SerialOpener::new())).await
    }

    /// Discover boards through `opener` and start the link.
    ///
    /// Each identified board is reopened at the baud rate it answered at and
    /// gets its own line reader. One dispatch loop serves all of them.
    pub async fn build_with_opener(self, opener: Arc<dyn PortOpener>) -> Result<Link> {
        let config = self.config;
        if config.inbound_capacity == 0 {
            return Err(Error::InvalidParameter(
                "inbound queue capacity must be non-zero".into(),
            ));
        }
        let commands = match config.command_capacity {
            Some(capacity) => CommandRelay::bounded(capacity)?,
            None => CommandRelay::unbounded(),
        };

        let cancel = CancellationToken::new();
        let identified = discover::discover(
            Arc::clone(&opener),
            config.ports.as_ref(),
            &config.identify,
            &cancel,
        )
        .await?;
        if identified.is_empty() {
            warn!("no devices identified");
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let mut devices = Vec::with_capacity(identified.len());
        let mut readers = Vec::with_capacity(identified.len());

        for device in identified {
            let transport = match opener
                .open(&device.port, device.baud_rate, config.identify.write_timeout)
                .await
            {
                Ok(t) => t,
                Err(e) => {
                    warn!(port = %device.port, error = %e, "failed to reopen identified device");
                    continue;
                }
            };
            info!(
                port = %device.port,
                device = %device.declared_name,
                baud_rate = device.baud_rate,
                "Device connected"
            );
            readers.push(reader::spawn_line_reader(
                transport,
                device.port.clone(),
                inbound_tx.clone(),
                config.identify.read_timeout,
                cancel.child_token(),
            ));
            devices.push(device);
        }
        drop(inbound_tx);

        let sensors = SensorTable::new();
        let dispatch = dispatch::spawn_dispatch(
            inbound_rx,
            Classifier::new(config.names),
            sensors.clone(),
            commands.clone(),
            config.dispatch,
            cancel.child_token(),
        );

        Ok(Link::new(devices, sensors, commands, readers, dispatch, cancel))
    }
}
