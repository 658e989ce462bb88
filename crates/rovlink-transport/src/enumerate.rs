//! Serial port enumeration.
//!
//! Boards show up under different device names depending on the host OS and
//! on the order they were plugged in. [`list_candidate_ports`] lists every
//! device path the OS exposes for serial TTYs and keeps only those that can
//! currently be opened. Ports held by another process are expected and are
//! dropped silently.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use rovlink_core::error::{Error, Result};

/// Highest COM port number probed on Windows.
pub const MAX_COM_PORT: u32 = 256;

/// Device namespace scanned on Unix-like hosts.
const DEV_DIR: &str = "/dev";

/// Host platforms with a known serial device namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `COM1` .. `COM256`.
    Windows,
    /// `/dev/tty[A-Za-z]*` (also Cygwin).
    Linux,
    /// `/dev/tty.*`
    MacOs,
}

impl Platform {
    /// Detect the platform this process is running on.
    pub fn current() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS identifier (as in [`std::env::consts::OS`]) to a platform.
    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(Platform::Windows),
            "linux" | "cygwin" => Ok(Platform::Linux),
            "macos" => Ok(Platform::MacOs),
            other => Err(Error::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Whether a file name under `/dev` is a serial TTY candidate.
    ///
    /// Bare `/dev/tty` (the controlling terminal) never matches on Linux.
    pub fn matches_device_name(self, name: &str) -> bool {
        match self {
            Platform::Windows => false,
            Platform::Linux => name
                .strip_prefix("tty")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_alphabetic()),
            Platform::MacOs => name.starts_with("tty."),
        }
    }
}

/// List candidate port paths for `platform` without probing them.
pub fn platform_candidates(platform: Platform) -> Vec<String> {
    match platform {
        Platform::Windows => (1..=MAX_COM_PORT).map(|i| format!("COM{i}")).collect(),
        Platform::Linux | Platform::MacOs => scan_device_dir(platform, Path::new(DEV_DIR)),
    }
}

/// Matching device paths under `dir`, sorted.
///
/// An unreadable directory or entry only shrinks the result.
fn scan_device_dir(platform: Platform, dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot read device directory");
            return Vec::new();
        }
    };

    let mut ports = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::trace!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if platform.matches_device_name(name) {
            ports.push(dir.join(name).to_string_lossy().into_owned());
        }
    }
    ports.sort();
    ports
}

/// Open and immediately close `port` to check that it is accessible.
pub fn probe_port(port: &str) -> Result<()> {
    tokio_serial::new(port, 9600)
        .timeout(Duration::from_millis(100))
        .open()
        .map(drop)
        .map_err(|e| Error::PortUnavailable {
            port: port.to_string(),
            reason: e.to_string(),
        })
}

/// List every serial port on this host that can currently be opened.
///
/// Fails only with [`Error::UnsupportedPlatform`]. Busy or missing devices
/// and unreadable device directory entries are excluded.
///
/// This performs blocking opens; call it from `spawn_blocking` inside an
/// async context.
pub fn list_candidate_ports() -> Result<BTreeSet<String>> {
    let platform = Platform::current()?;
    let candidates = platform_candidates(platform);
    tracing::debug!(?platform, count = candidates.len(), "Probing candidate ports");

    let available: BTreeSet<String> = candidates
        .into_iter()
        .filter(|port| match probe_port(port) {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!(port = %port, error = %e, "Skipping port");
                false
            }
        })
        .collect();

    tracing::debug!(ports = ?available, "Available ports");
    Ok(available)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_from_os() {
        assert_eq!(Platform::from_os("windows").unwrap(), Platform::Windows);
        assert_eq!(Platform::from_os("linux").unwrap(), Platform::Linux);
        assert_eq!(Platform::from_os("cygwin").unwrap(), Platform::Linux);
        assert_eq!(Platform::from_os("macos").unwrap(), Platform::MacOs);
    }

    #[test]
    fn platform_unsupported() {
        let err = Platform::from_os("haiku").unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform(os) if os == "haiku"));
    }

    #[test]
    fn linux_device_names() {
        let p = Platform::Linux;
        assert!(p.matches_device_name("ttyACM0"));
        assert!(p.matches_device_name("ttyUSB1"));
        assert!(p.matches_device_name("ttyS0"));
        assert!(!p.matches_device_name("tty"));
        assert!(!p.matches_device_name("tty0"));
        assert!(!p.matches_device_name("null"));
    }

    #[test]
    fn macos_device_names() {
        let p = Platform::MacOs;
        assert!(p.matches_device_name("tty.usbmodem14101"));
        assert!(p.matches_device_name("tty.Bluetooth-Incoming-Port"));
        assert!(!p.matches_device_name("cu.usbmodem14101"));
        assert!(!p.matches_device_name("ttys000"));
    }

    #[test]
    fn windows_candidates_are_fixed_range() {
        let ports = platform_candidates(Platform::Windows);
        assert_eq!(ports.len(), MAX_COM_PORT as usize);
        assert_eq!(ports.first().map(String::as_str), Some("COM1"));
        assert_eq!(ports.last().map(String::as_str), Some("COM256"));
    }

    #[test]
    fn probe_missing_port_fails() {
        let err = probe_port("/dev/rovlink-does-not-exist").unwrap_err();
        assert!(matches!(err, Error::PortUnavailable { .. }));
    }

    #[test]
    fn scan_keeps_only_matching_devices() {
        let dir = std::env::temp_dir().join(format!("rovlink-dev-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["ttyUSB0", "ttyACM1", "tty", "tty0", "null"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let ports = scan_device_dir(Platform::Linux, &dir);
        std::fs::remove_dir_all(&dir).unwrap();

        let names: Vec<_> = ports
            .iter()
            .map(|p| Path::new(p).file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["ttyACM1", "ttyUSB0"]);
    }

    #[test]
    fn unreadable_device_dir_yields_no_candidates() {
        let missing = std::env::temp_dir().join("rovlink-no-such-dev-dir");
        assert!(scan_device_dir(Platform::Linux, &missing).is_empty());
    }
}
