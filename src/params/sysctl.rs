//! Kernel sysctl parameters, read and written through `/proc/sys`.

use super::TunableParameter;
use crate::error::{Result, TuneError};
use std::path::PathBuf;

/// A single sysctl knob, e.g. `vm.swappiness`
pub struct SysctlParam {
    key: String,
    sysctl_name: String,
    expected: String,
    root: PathBuf,
}

impl SysctlParam {
    /// Create a parameter for a dotted sysctl name and its expected value
    pub fn new(name: &str, expected: &str) -> Self {
        Self::with_root(name, expected, PathBuf::from("/proc/sys"))
    }

    /// Like [`SysctlParam::new`] but rooted somewhere else, for tests
    pub fn with_root(name: &str, expected: &str, root: PathBuf) -> Self {
        Self {
            key: format!("sysctl.{name}"),
            sysctl_name: name.to_string(),
            expected: expected.to_string(),
            root,
        }
    }

    fn path(&self) -> PathBuf {
        self.root.join(self.sysctl_name.replace('.', "/"))
    }
}

impl TunableParameter for SysctlParam {
    fn key(&self) -> &str {
        &self.key
    }

    fn expected(&self) -> &str {
        &self.expected
    }

    fn read(&self) -> Result<String> {
        std::fs::read_to_string(self.path())
            .map(|s| s.trim().to_string())
            .map_err(|e| TuneError::read(&self.key, e.to_string()))
    }

    fn write(&self, value: &str) -> Result<()> {
        std::fs::write(self.path(), format!("{value}\n"))
            .map_err(|e| TuneError::write(&self.key, e.to_string()))
    }
}
