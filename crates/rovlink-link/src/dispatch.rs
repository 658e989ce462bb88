//! The message dispatch loop.
//!
//! One tokio task drains the inbound line queue for the lifetime of the link.
//! Each line is classified and routed to the [`SensorTable`] or the
//! [`CommandRelay`]. A bad line is logged and dropped; nothing but the
//! cancellation token stops the loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use rovlink_core::error::Result;

use crate::classify::{Classification, Classifier};
use crate::relay::CommandRelay;
use crate::sensors::SensorTable;

/// One framed line and the port it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundLine {
    pub port: String,
    pub line: String,
}

impl InboundLine {
    pub fn new(port: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            line: line.into(),
        }
    }
}

/// Configuration for the dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Longest single wait on the inbound queue before the loop re-checks
    /// for cancellation.
    pub poll_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Lines taken from the inbound queue.
    pub lines: u64,
    /// Lines applied to the sensor table.
    pub sensor_updates: u64,
    /// Lines pushed onto the command relay.
    pub commands: u64,
    /// Board identity frames and unknown names.
    pub ignored: u64,
    /// Malformed lines, unparseable values and rejected commands.
    pub dropped: u64,
}

/// Handle to a running dispatch task.
pub struct DispatchHandle {
    /// Cancelling this token stops the loop.
    pub cancel: CancellationToken,
    /// Join handle for the dispatch task.
    pub task: JoinHandle<DispatchStats>,
}

impl DispatchHandle {
    /// Stop the loop and wait for its final counters.
    pub async fn shutdown(self) -> DispatchStats {
        self.cancel.cancel();
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "dispatch task did not exit cleanly");
                DispatchStats::default()
            }
        }
    }
}

/// Spawn the dispatch loop on the current runtime.
///
/// The loop exits when `cancel` (or a parent token) is cancelled.
pub fn spawn_dispatch(
    inbound: mpsc::Receiver<InboundLine>,
    classifier: Classifier,
    sensors: SensorTable,
    commands: CommandRelay,
    config: DispatchConfig,
    cancel: CancellationToken,
) -> DispatchHandle {
    let task = tokio::spawn(run_dispatch_loop(
        inbound,
        classifier,
        sensors,
        commands,
        config,
        cancel.clone(),
    ));
    DispatchHandle { cancel, task }
}

/// Run the dispatch loop until `cancel` fires.
///
/// If every sender of `inbound` is dropped the loop logs it once and then
/// only waits for cancellation.
pub async fn run_dispatch_loop(
    mut inbound: mpsc::Receiver<InboundLine>,
    classifier: Classifier,
    sensors: SensorTable,
    commands: CommandRelay,
    config: DispatchConfig,
    cancel: CancellationToken,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    let mut open = true;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("dispatch loop cancelled");
                break;
            }

            next = tokio::time::timeout(config.poll_interval, inbound.recv()), if open => {
                match next {
                    Ok(Some(inbound_line)) => {
                        stats.lines += 1;
                        match dispatch_line(&inbound_line, &classifier, &sensors, &commands).await {
                            Ok(Classification::SensorUpdate { .. }) => stats.sensor_updates += 1,
                            Ok(Classification::Command(_)) => stats.commands += 1,
                            Ok(Classification::Ignored) => stats.ignored += 1,
                            Err(e) => {
                                warn!(
                                    port = %inbound_line.port,
                                    error = %e,
                                    "dropping line"
                                );
                                stats.dropped += 1;
                            }
                        }
                    }
                    Ok(None) => {
                        warn!("inbound queue closed, waiting for shutdown");
                        open = false;
                    }
                    // Idle: nothing arrived within the poll interval.
                    Err(_) => {}
                }
            }
        }
    }

    debug!(?stats, "dispatch loop stopped");
    stats
}

/// Classify one line and apply it.
///
/// Returns the classification that was applied, or the error that caused
/// the line to be dropped.
pub async fn dispatch_line(
    inbound: &InboundLine,
    classifier: &Classifier,
    sensors: &SensorTable,
    commands: &CommandRelay,
) -> Result<Classification> {
    let classification = classifier.classify(&inbound.line)?;
    match &classification {
        Classification::Command(command) => {
            debug!(port = %inbound.port, command = %command, "relaying command");
            commands.push(command.clone())?;
        }
        Classification::SensorUpdate { name, value } => {
            trace!(port = %inbound.port, sensor = %name, value, "sensor update");
            sensors.upsert(name, *value).await;
        }
        Classification::Ignored => {
            trace!(port = %inbound.port, line = %inbound.line, "ignoring line");
        }
    }
    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rovlink_core::error::Error;
    use rovlink_core::names::ValidNames;

    struct Fixture {
        tx: mpsc::Sender<InboundLine>,
        sensors: SensorTable,
        commands: CommandRelay,
        handle: DispatchHandle,
    }

    fn start() -> Fixture {
        let (tx, rx) = mpsc::channel(64);
        let sensors = SensorTable::new();
        let commands = CommandRelay::unbounded();
        let handle = spawn_dispatch(
            rx,
            Classifier::default(),
            sensors.clone(),
            commands.clone(),
            DispatchConfig::default(),
            CancellationToken::new(),
        );
        Fixture {
            tx,
            sensors,
            commands,
            handle,
        }
    }

    async fn send(fx: &Fixture, lines: &[&str]) {
        for line in lines {
            fx.tx.send(InboundLine::new("/dev/ttyACM0", *line)).await.unwrap();
        }
    }

    async fn settle(fx: &Fixture, expected_lines: usize) {
        // Wait until the queue is drained; the loop processes in order so an
        // empty queue plus one poll interval means everything was applied.
        for _ in 0..200 {
            if fx.tx.capacity() == fx.tx.max_capacity() {
                tokio::time::sleep(Duration::from_millis(20)).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("dispatch loop did not drain {expected_lines} lines");
    }

    #[tokio::test]
    async fn sensor_line_updates_table() {
        let fx = start();
        send(&fx, &["depth_rov_offset:3.5"]).await;
        settle(&fx, 1).await;

        assert_eq!(fx.sensors.get("depth_rov_offset").await, Some(3.5));
        let stats = fx.handle.shutdown().await;
        assert_eq!(stats.sensor_updates, 1);
    }

    #[tokio::test]
    async fn commands_are_relayed_in_order() {
        let fx = start();
        send(&fx, &["reset:0", "depth:1.0", "pid_depth_p:0.8", "emergency_surface:1"]).await;
        settle(&fx, 4).await;

        assert_eq!(fx.commands.pop().await, "reset:0");
        assert_eq!(fx.commands.pop().await, "pid_depth_p:0.8");
        assert_eq!(fx.commands.pop().await, "emergency_surface:1");
        assert!(fx.commands.is_empty());
        assert_eq!(fx.sensors.get("depth").await, Some(1.0));
    }

    #[tokio::test]
    async fn unknown_name_changes_nothing() {
        let fx = start();
        send(&fx, &["unknown_sensor:9.9"]).await;
        settle(&fx, 1).await;

        assert!(fx.sensors.is_empty().await);
        assert!(fx.commands.is_empty());
        let stats = fx.handle.shutdown().await;
        assert_eq!(stats.ignored, 1);
    }

    #[tokio::test]
    async fn table_keys_stay_within_sensor_names() {
        let fx = start();
        send(
            &fx,
            &[
                "depth:1.5",
                "SensorArduino:7",
                "IMU:0.1",
                "set_point_depth:2.0",
                "unknown_sensor:9.9",
                "heading:180",
            ],
        )
        .await;
        settle(&fx, 6).await;

        let names = ValidNames::default();
        let snapshot = fx.sensors.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.keys().all(|k| names.is_sensor(k)));
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn bad_lines_do_not_stop_the_loop() {
        let fx = start();
        send(&fx, &["no_colon_here", "depth:abc", "roll:4.5"]).await;
        settle(&fx, 3).await;

        assert_eq!(fx.sensors.get("roll").await, Some(4.5));
        assert_eq!(fx.sensors.get("depth").await, None);
        assert!(!fx.handle.task.is_finished());

        let stats = fx.handle.shutdown().await;
        assert_eq!(
            stats,
            DispatchStats {
                lines: 3,
                sensor_updates: 1,
                commands: 0,
                ignored: 0,
                dropped: 2,
            }
        );
    }

    #[tokio::test]
    async fn repeated_update_overwrites() {
        let fx = start();
        send(&fx, &["pitch:2.0", "pitch:2.0", "pitch:-3.25"]).await;
        settle(&fx, 3).await;
        assert_eq!(fx.sensors.snapshot().await.get("pitch"), Some(&-3.25));
    }

    #[tokio::test]
    async fn closed_queue_waits_for_cancel() {
        let fx = start();
        send(&fx, &["heading:90"]).await;
        drop(fx.tx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fx.handle.task.is_finished());
        assert_eq!(fx.sensors.get("heading").await, Some(90.0));

        let stats = fx.handle.shutdown().await;
        assert_eq!(stats.lines, 1);
    }

    #[tokio::test]
    async fn dispatch_line_reports_relay_full() {
        let commands = CommandRelay::bounded(1).unwrap();
        let classifier = Classifier::default();
        let sensors = SensorTable::new();
        let line = InboundLine::new("COM3", "reset:0");

        dispatch_line(&line, &classifier, &sensors, &commands).await.unwrap();
        let err = dispatch_line(&line, &classifier, &sensors, &commands)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueueFull));
    }
}
