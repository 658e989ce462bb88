//! A running link to the vehicle's boards.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use rovlink_link::dispatch::{DispatchHandle, DispatchStats};
use rovlink_link::identify::DeviceIdentity;
use rovlink_link::reader::ReaderHandle;
use rovlink_link::relay::CommandRelay;
use rovlink_link::sensors::SensorTable;

/// Identified boards, their line readers and the dispatch loop.
///
/// Built by [`LinkBuilder`](crate::LinkBuilder). Consumers poll
/// [`sensors`](Link::sensors) and pop from [`commands`](Link::commands);
/// [`shutdown`](Link::shutdown) stops every task and closes every port.
pub struct Link {
    devices: Vec<DeviceIdentity>,
    sensors: SensorTable,
    commands: CommandRelay,
    readers: Vec<ReaderHandle>,
    dispatch: DispatchHandle,
    cancel: CancellationToken,
}

impl Link {
    pub(crate) fn new(
        devices: Vec<DeviceIdentity>,
        sensors: SensorTable,
        commands: CommandRelay,
        readers: Vec<ReaderHandle>,
        dispatch: DispatchHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            devices,
            sensors,
            commands,
            readers,
            dispatch,
            cancel,
        }
    }

    /// Boards with an open line reader, sorted by port.
    pub fn devices(&self) -> &[DeviceIdentity] {
        &self.devices
    }

    /// Port → declared name for every connected board.
    pub fn port_map(&self) -> HashMap<String, String> {
        self.devices
            .iter()
            .map(|d| (d.port.clone(), d.declared_name.clone()))
            .collect()
    }

    /// Handle to the shared sensor table.
    pub fn sensors(&self) -> SensorTable {
        self.sensors.clone()
    }

    /// Handle to the command relay.
    pub fn commands(&self) -> CommandRelay {
        self.commands.clone()
    }

    /// Token whose cancellation stops every task of this link.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop readers and dispatch, close every port, and report the
    /// dispatch counters.
    pub async fn shutdown(self) -> DispatchStats {
        self.cancel.cancel();
        for reader in self.readers {
            let port = reader.port.clone();
            let exit = reader.shutdown().await;
            debug!(port = %port, ?exit, "reader stopped");
        }
        self.dispatch.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rovlink_test_harness::MockPortOpener;

    use crate::LinkBuilder;

    async fn wait_for(sensors: &rovlink_link::SensorTable, name: &str) -> f64 {
        for _ in 0..500 {
            if let Some(v) = sensors.get(name).await {
                return v;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sensor {name} never reported");
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_with_mock_boards() {
        let opener = Arc::new(
            MockPortOpener::new()
                .device("/dev/ttyACM0", "SensorArduino", &[115_200])
                .telemetry(
                    "/dev/ttyACM0",
                    &["depth:4.25", "SensorArduino:ready", "unknown_sensor:9.9"],
                )
                .device("/dev/ttyACM1", "Teensy", &[57_600])
                .telemetry("/dev/ttyACM1", &["reset:0", "no_colon_here", "roll:-1.5"])
                .busy("/dev/ttyACM2"),
        );

        let link = LinkBuilder::new()
            .ports(["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyACM2"])
            .build_with_opener(opener.clone())
            .await
            .unwrap();

        let map = link.port_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["/dev/ttyACM0"], "SensorArduino");
        assert_eq!(map["/dev/ttyACM1"], "Teensy");

        // Each board was reopened at the rate it answered at.
        assert_eq!(opener.bauds_tried("/dev/ttyACM1"), vec![115_200, 57_600, 57_600]);

        let sensors = link.sensors();
        assert_eq!(wait_for(&sensors, "depth").await, 4.25);
        assert_eq!(wait_for(&sensors, "roll").await, -1.5);

        let command = tokio::time::timeout(Duration::from_secs(5), link.commands().pop())
            .await
            .unwrap();
        assert_eq!(command, "reset:0");

        let snapshot = sensors.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains_key("unknown_sensor"));

        // Let the readers drain the remaining queued lines.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let stats = link.shutdown().await;
        assert_eq!(stats.lines, 6);
        assert_eq!(stats.sensor_updates, 2);
        assert_eq!(stats.commands, 1);
        assert_eq!(stats.ignored, 2);
        assert_eq!(stats.dropped, 1);

        for record in opener.opens() {
            if let Some(handle) = record.handle {
                assert!(handle.is_closed(), "{} left open", record.port);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_devices_still_runs() {
        let opener = Arc::new(MockPortOpener::new().silent("COM1"));
        let link = LinkBuilder::new()
            .ports(["COM1"])
            .baud_rates(&[9_600])
            .build_with_opener(opener)
            .await
            .unwrap();

        assert!(link.devices().is_empty());
        assert!(link.sensors().is_empty().await);
        let stats = link.shutdown().await;
        assert_eq!(stats.lines, 0);
    }
}
