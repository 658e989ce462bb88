//! Port enumeration followed by identification.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use rovlink_core::error::{Error, Result};
use rovlink_core::transport::PortOpener;
use rovlink_link::identify::{self, DeviceIdentity, IdentifyConfig};

/// Enumerate this host's serial ports without blocking the runtime.
///
/// Fails with [`Error::UnsupportedPlatform`] on hosts with no known serial
/// device namespace.
pub async fn candidate_ports() -> Result<BTreeSet<String>> {
    tokio::task::spawn_blocking(rovlink_transport::list_candidate_ports)
        .await
        .map_err(|e| Error::Transport(format!("port enumeration task failed: {e}")))?
}

/// Identify every board reachable from this host.
///
/// When `ports` is `Some`, only those ports are probed and the host is not
/// enumerated. Otherwise all openable serial ports are probed. Enumeration
/// failure ([`Error::UnsupportedPlatform`]) is the only hard error; every
/// per-port failure just leaves that port out of the result.
pub async fn discover(
    opener: Arc<dyn PortOpener>,
    ports: Option<&BTreeSet<String>>,
    config: &IdentifyConfig,
    cancel: &CancellationToken,
) -> Result<Vec<DeviceIdentity>> {
    let ports = match ports {
        Some(ports) => ports.clone(),
        None => candidate_ports().await?,
    };
    tracing::info!(ports = ?ports, "Available ports");
    identify::identify_devices(opener, ports, config, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rovlink_test_harness::MockPortOpener;

    #[tokio::test(start_paused = true)]
    async fn explicit_ports_skip_enumeration() {
        let opener = Arc::new(MockPortOpener::new().device("/dev/ttyACM0", "Teensy", &[57_600]));
        let ports: BTreeSet<String> = ["/dev/ttyACM0".to_string()].into();

        let devices = discover(
            opener,
            Some(&ports),
            &IdentifyConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].declared_name, "Teensy");
        assert_eq!(devices[0].baud_rate, 57_600);
    }
}
