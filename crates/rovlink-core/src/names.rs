//! Valid command and sensor names.
//!
//! Boards emit `name:value` lines. Whether a line is an operator command,
//! telemetry, or noise is decided purely by which of two disjoint name sets
//! its `name` belongs to. The sets are fixed for the lifetime of a link.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Command identifiers recognized by default.
pub const DEFAULT_COMMANDS: &[&str] = &[
    "reset",
    "pid_depth_p",
    "pid_depth_i",
    "pid_depth_d",
    "pid_roll_p",
    "pid_roll_i",
    "pid_roll_d",
    "auto_mode",
    "manual_wing_pos",
    "set_point_depth",
    "emergency_surface",
];

/// Sensor names recognized by default.
pub const DEFAULT_SENSORS: &[&str] = &[
    "depth",
    "depth_rov_offset",
    "depth_beneath_rov_offset",
    "depth_beneath_rov",
    "roll",
    "pitch",
    "heading",
    "temperature",
    "pressure",
    "voltage",
    "current",
    "wing_pos_port",
    "wing_pos_starboard",
    "stepper_pos",
    "leakage",
];

/// Board identity tokens that appear inside handshake frames.
///
/// A name containing any of these is a handshake artifact, never telemetry.
pub const META_TOKENS: &[&str] = &["IMU", "SensorArduino", "StepperArduino"];

/// The two disjoint name sets used to route inbound lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidNames {
    commands: BTreeSet<String>,
    sensors: BTreeSet<String>,
}

impl ValidNames {
    /// Build a name set pair.
    ///
    /// Fails with [`Error::InvalidParameter`] if a name appears in both sets
    /// or if a name is empty or contains `:`.
    pub fn new<C, S>(commands: C, sensors: S) -> Result<Self>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let commands: BTreeSet<String> = commands.into_iter().map(Into::into).collect();
        let sensors: BTreeSet<String> = sensors.into_iter().map(Into::into).collect();

        if let Some(name) = commands
            .iter()
            .chain(sensors.iter())
            .find(|n| n.is_empty() || n.contains(':'))
        {
            return Err(Error::InvalidParameter(format!("invalid name {name:?}")));
        }

        let overlap: Vec<&str> = commands.intersection(&sensors).map(String::as_str).collect();
        if !overlap.is_empty() {
            return Err(Error::InvalidParameter(format!(
                "names in both command and sensor sets: {}",
                overlap.join(", ")
            )));
        }

        Ok(Self { commands, sensors })
    }

    /// Whether `name` is a known command identifier.
    pub fn is_command(&self, name: &str) -> bool {
        self.commands.contains(name)
    }

    /// Whether `name` is a known sensor name.
    pub fn is_sensor(&self, name: &str) -> bool {
        self.sensors.contains(name)
    }

    /// Whether `name` embeds one of the [`META_TOKENS`].
    pub fn is_meta(name: &str) -> bool {
        META_TOKENS.iter().any(|token| name.contains(token))
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }

    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(String::as_str)
    }
}

impl Default for ValidNames {
    fn default() -> Self {
        Self {
            commands: DEFAULT_COMMANDS.iter().map(|s| s.to_string()).collect(),
            sensors: DEFAULT_SENSORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
