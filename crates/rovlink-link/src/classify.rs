//! Three-way routing of inbound lines.
//!
//! Every framed line is either an operator/control command, a telemetry
//! reading for a known sensor, or noise. Noise includes board identity
//! frames that leak into the stream mid-message and names that belong to
//! neither set. Noise is dropped without an error.

use std::sync::Arc;

use rovlink_core::error::{Error, Result};
use rovlink_core::names::ValidNames;

use crate::protocol;

/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A recognized command. Carries the line exactly as received.
    Command(String),
    /// A reading for a known sensor.
    SensorUpdate { name: String, value: f64 },
    /// A board identity frame or an unknown name.
    Ignored,
}

/// Classify one line against `names`.
///
/// Fails with [`Error::MalformedLine`] if the line has no `name:value`
/// shape, and with [`Error::InvalidValue`] if a known sensor's value is not
/// a number. Unknown names are [`Classification::Ignored`], not errors.
pub fn classify(names: &ValidNames, line: &str) -> Result<Classification> {
    let (name, value) =
        protocol::split_line(line).ok_or_else(|| Error::MalformedLine(line.to_string()))?;

    if names.is_command(name) {
        return Ok(Classification::Command(line.to_string()));
    }

    if ValidNames::is_meta(name) {
        return Ok(Classification::Ignored);
    }

    if names.is_sensor(name) {
        let parsed: f64 = value.parse().map_err(|_| Error::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        return Ok(Classification::SensorUpdate {
            name: name.to_string(),
            value: parsed,
        });
    }

    Ok(Classification::Ignored)
}

/// A [`classify`] bound to a shared name set.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    names: Arc<ValidNames>,
}

impl Classifier {
    pub fn new(names: ValidNames) -> Self {
        Self {
            names: Arc::new(names),
        }
    }

    pub fn names(&self) -> &ValidNames {
        &self.names
    }

    pub fn classify(&self, line: &str) -> Result<Classification> {
        classify(&self.names, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::default()
    }

    #[test]
    fn sensor_line_yields_update() {
        assert_eq!(
            classifier().classify("depth_rov_offset:3.5").unwrap(),
            Classification::SensorUpdate {
                name: "depth_rov_offset".into(),
                value: 3.5,
            }
        );
    }

    #[test]
    fn sensor_value_forms() {
        let c = classifier();
        for (line, expected) in [("depth:-1", -1.0), ("roll:1e-3", 0.001), ("pitch: 7 ", 7.0)] {
            match c.classify(line).unwrap() {
                Classification::SensorUpdate { value, .. } => assert_eq!(value, expected),
                other => panic!("{line}: expected SensorUpdate, got {other:?}"),
            }
        }
    }

    #[test]
    fn command_line_is_passed_through_unmodified() {
        let line = "set_point_depth:2.75";
        assert_eq!(
            classifier().classify(line).unwrap(),
            Classification::Command(line.to_string())
        );
    }

    #[test]
    fn command_value_need_not_be_numeric() {
        assert_eq!(
            classifier().classify("auto_mode:on").unwrap(),
            Classification::Command("auto_mode:on".into())
        );
    }

    #[test]
    fn unknown_name_is_ignored() {
        assert_eq!(
            classifier().classify("unknown_sensor:9.9").unwrap(),
            Classification::Ignored
        );
    }

    #[test]
    fn meta_tokens_are_ignored() {
        let c = classifier();
        for line in ["IMU:1", "<SensorArduino:x", "StepperArduino:0", "IMU_heading:3"] {
            assert_eq!(c.classify(line).unwrap(), Classification::Ignored, "{line}");
        }
    }

    #[test]
    fn meta_token_wins_over_sensor_name() {
        // A sensor name that embeds a board token is still a handshake artifact.
        let names = ValidNames::new(["reset"], ["IMU_roll"]).unwrap();
        assert_eq!(classify(&names, "IMU_roll:4").unwrap(), Classification::Ignored);
    }

    #[test]
    fn missing_colon_is_malformed() {
        let err = classifier().classify("no_colon_here").unwrap_err();
        assert!(matches!(err, Error::MalformedLine(l) if l == "no_colon_here"));
    }

    #[test]
    fn empty_name_is_malformed() {
        assert!(matches!(
            classifier().classify(":1.0").unwrap_err(),
            Error::MalformedLine(_)
        ));
    }

    #[test]
    fn non_numeric_sensor_value_is_invalid() {
        let err = classifier().classify("depth:deep").unwrap_err();
        match err {
            Error::InvalidValue { name, value } => {
                assert_eq!(name, "depth");
                assert_eq!(value, "deep");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_unknown_value_is_ignored() {
        assert_eq!(
            classifier().classify("firmware:v1.2").unwrap(),
            Classification::Ignored
        );
    }
}
