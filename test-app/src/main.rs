// rovlink-app -- CLI tool for discovering the vehicle's boards and watching
// the telemetry and commands they send, against real serial ports or
// simulated boards.
//
// Usage:
//   rovlink-app ports
//   rovlink-app identify --baud 115200 --baud 57600
//   rovlink-app --port /dev/ttyACM0 --port /dev/ttyACM1 identify
//   rovlink-app classify "depth:1.5" "reset:0" "no_colon_here"
//   rovlink-app run --interval-ms 500
//   rovlink-app --mock run --duration 10

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rovlink::{
    Classification, DEFAULT_COMMANDS, DEFAULT_SENSORS, IdentifyConfig, LinkBuilder, PortOpener,
    SerialOpener, ValidNames,
};
use rovlink_test_harness::MockPortOpener;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// rovlink test application -- finds boards and routes their lines.
#[derive(Parser)]
#[command(name = "rovlink-app", version, about)]
struct Cli {
    /// Baud rate to try during identification. Repeat to set the fallback
    /// order (default: 115200, 57600, 9600).
    #[arg(long = "baud", global = true)]
    baud: Vec<u32>,

    /// Identification window per port and baud rate, in milliseconds.
    #[arg(long, global = true, default_value_t = 2000)]
    timeout_ms: u64,

    /// Probe only this port (repeatable). Skips host enumeration.
    #[arg(long = "port", global = true)]
    port: Vec<String>,

    /// Replace the sensor name set (repeatable).
    #[arg(long = "sensor", global = true)]
    sensor: Vec<String>,

    /// Replace the command name set (repeatable).
    #[arg(long = "command", global = true)]
    command_name: Vec<String>,

    /// Use simulated boards instead of real serial ports.
    #[arg(long, global = true)]
    mock: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports that can currently be opened.
    Ports,

    /// Run the identification handshake and print the port map.
    Identify,

    /// Classify lines offline, without opening any port.
    Classify {
        /// Lines in `name:value` form.
        #[arg(required = true)]
        lines: Vec<String>,
    },

    /// Connect to every identified board and print telemetry and commands.
    Run {
        /// Sensor snapshot interval in milliseconds.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MOCK_PORTS: &[&str] = &["/dev/ttyMOCK0", "/dev/ttyMOCK1", "/dev/ttyMOCK2"];

/// Simulated boards for `--mock`: a sensor board at 115200, a Teensy that
/// only answers at 57600, and a busy port.
fn mock_opener() -> MockPortOpener {
    MockPortOpener::new()
        .device("/dev/ttyMOCK0", "SensorArduino", &[115_200])
        .telemetry(
            "/dev/ttyMOCK0",
            &[
                "depth:1.82",
                "depth_rov_offset:0.35",
                "temperature:11.4",
                "SensorArduino:alive",
                "pressure:1.21",
            ],
        )
        .device("/dev/ttyMOCK1", "Teensy", &[57_600])
        .telemetry(
            "/dev/ttyMOCK1",
            &["roll:-2.5", "pitch:0.75", "set_point_depth:2.0", "auto_mode:1"],
        )
        .busy("/dev/ttyMOCK2")
}

fn opener(cli: &Cli) -> Arc<dyn PortOpener> {
    if cli.mock {
        Arc::new(mock_opener())
    } else {
        Arc::new(SerialOpener::new())
    }
}

/// Ports to probe: `--port` if given, the simulated ports under `--mock`,
/// otherwise `None` (enumerate the host).
fn explicit_ports(cli: &Cli) -> Option<BTreeSet<String>> {
    if !cli.port.is_empty() {
        Some(cli.port.iter().cloned().collect())
    } else if cli.mock {
        Some(MOCK_PORTS.iter().map(|p| p.to_string()).collect())
    } else {
        None
    }
}

fn valid_names(cli: &Cli) -> Result<ValidNames> {
    let commands: Vec<String> = if cli.command_name.is_empty() {
        DEFAULT_COMMANDS.iter().map(|s| s.to_string()).collect()
    } else {
        cli.command_name.clone()
    };
    let sensors: Vec<String> = if cli.sensor.is_empty() {
        DEFAULT_SENSORS.iter().map(|s| s.to_string()).collect()
    } else {
        cli.sensor.clone()
    };
    ValidNames::new(commands, sensors).context("invalid --command/--sensor names")
}

fn identify_config(cli: &Cli) -> Result<IdentifyConfig> {
    if cli.timeout_ms == 0 {
        bail!("--timeout-ms must be greater than zero");
    }
    let mut config = IdentifyConfig {
        handshake_timeout: Duration::from_millis(cli.timeout_ms),
        ..Default::default()
    };
    if !cli.baud.is_empty() {
        config.baud_rates = cli.baud.clone();
    }
    Ok(config)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_ports(cli: &Cli) -> Result<()> {
    let ports = match explicit_ports(cli) {
        Some(ports) if cli.mock => ports,
        _ => rovlink::candidate_ports()
            .await
            .context("failed to enumerate serial ports")?,
    };
    if ports.is_empty() {
        println!("No serial ports available.");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

async fn cmd_identify(cli: &Cli) -> Result<()> {
    let config = identify_config(cli)?;
    let ports = explicit_ports(cli);
    let started = Instant::now();

    let devices = rovlink::discover(
        opener(cli),
        ports.as_ref(),
        &config,
        &CancellationToken::new(),
    )
    .await
    .context("device discovery failed")?;

    if devices.is_empty() {
        println!("No devices identified.");
    }
    for device in &devices {
        println!(
            "{:<20} {:<16} {} baud",
            device.port, device.declared_name, device.baud_rate
        );
    }
    println!("Identification took {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn cmd_classify(cli: &Cli, lines: &[String]) -> Result<()> {
    let names = valid_names(cli)?;
    for line in lines {
        match rovlink::classify(&names, line) {
            Ok(Classification::Command(cmd)) => println!("{line:<32} command  {cmd}"),
            Ok(Classification::SensorUpdate { name, value }) => {
                println!("{line:<32} sensor   {name} = {value}")
            }
            Ok(Classification::Ignored) => println!("{line:<32} ignored"),
            Err(e) => println!("{line:<32} error    {e}"),
        }
    }
    Ok(())
}

async fn cmd_run(cli: &Cli, interval_ms: u64, duration_secs: u64) -> Result<()> {
    if interval_ms == 0 {
        bail!("--interval-ms must be greater than zero");
    }

    let mut builder = LinkBuilder::new().valid_names(valid_names(cli)?);
    let config = identify_config(cli)?;
    builder = builder
        .baud_rates(&config.baud_rates)
        .handshake_timeout(config.handshake_timeout);
    if let Some(ports) = explicit_ports(cli) {
        builder = builder.ports(ports);
    }

    let link = builder
        .build_with_opener(opener(cli))
        .await
        .context("failed to start link")?;

    if link.devices().is_empty() {
        println!("No devices identified; waiting anyway (Ctrl-C to stop).");
    }
    for device in link.devices() {
        println!(
            "Connected {} on {} @ {} baud",
            device.declared_name, device.port, device.baud_rate
        );
    }

    let sensors = link.sensors();
    let commands = link.commands();
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    let deadline = (duration_secs > 0)
        .then(|| tokio::time::Instant::now() + Duration::from_secs(duration_secs));

    loop {
        let until_deadline = async {
            match deadline {
                Some(dl) => tokio::time::sleep_until(dl).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                break;
            }
            _ = until_deadline => {
                println!("Run duration elapsed.");
                break;
            }
            command = commands.pop() => {
                println!("[command] {command}");
            }
            _ = ticker.tick() => {
                let snapshot = sensors.snapshot().await;
                let mut readings: Vec<_> = snapshot.into_iter().collect();
                readings.sort_by(|a, b| a.0.cmp(&b.0));
                let line = readings
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("  ");
                println!("[sensors] {line}");
            }
        }
    }

    let stats = link.shutdown().await;
    println!(
        "Lines: {}  sensor updates: {}  commands: {}  ignored: {}  dropped: {}",
        stats.lines, stats.sensor_updates, stats.commands, stats.ignored, stats.dropped
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Ports => cmd_ports(&cli).await,
        Command::Identify => cmd_identify(&cli).await,
        Command::Classify { lines } => cmd_classify(&cli, lines),
        Command::Run {
            interval_ms,
            duration,
        } => cmd_run(&cli, *interval_ms, *duration).await,
    }
}
