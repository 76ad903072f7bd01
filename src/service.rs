//! Service control collaborator
//!
//! Thin wrappers around systemctl and the tuned active-profile file.
//! Consumed by the CLI layer only; the reconciliation engine never talks
//! to services itself.

use crate::error::{Result, TuneError};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// The conflicting tuning service that is disabled on daemon start
pub const SAPCONF_SERVICE: &str = "sapconf.service";

/// The daemon that re-applies tuning after reboot
pub const TUNED_SERVICE: &str = "tuned.service";

/// Profile name under which tuned invokes saptuner
pub const TUNED_PROFILE_NAME: &str = "saptuner";

const TUNED_ACTIVE_PROFILE: &str = "/etc/tuned/active_profile";

fn systemctl(args: &[&str], unit: &str) -> Result<()> {
    debug!(?args, "running systemctl");
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .map_err(|e| TuneError::Service {
            unit: unit.to_string(),
            message: e.to_string(),
        })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(TuneError::Service {
            unit: unit.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Enable a unit and start it
pub fn systemctl_enable_start(unit: &str) -> Result<()> {
    systemctl(&["enable", unit], unit)?;
    systemctl(&["start", unit], unit)
}

/// Disable a unit and stop it
pub fn systemctl_disable_stop(unit: &str) -> Result<()> {
    systemctl(&["disable", unit], unit)?;
    systemctl(&["stop", unit], unit)
}

/// Whether a unit is currently active
pub fn systemctl_is_running(unit: &str) -> bool {
    Command::new("systemctl")
        .args(["is-active", "--quiet", unit])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// The currently active tuned profile, empty when unavailable
pub fn tuned_profile() -> String {
    tuned_profile_from(Path::new(TUNED_ACTIVE_PROFILE))
}

fn tuned_profile_from(path: &Path) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Set the active tuned profile
pub fn write_tuned_profile(name: &str) -> Result<()> {
    write_tuned_profile_to(Path::new(TUNED_ACTIVE_PROFILE), name)
}

fn write_tuned_profile_to(path: &Path, name: &str) -> Result<()> {
    std::fs::write(path, format!("{name}\n")).map_err(|e| TuneError::io(path, e))
}
