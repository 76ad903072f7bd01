//! CPU-related parameters: frequency scaling governor and transparent
//! hugepages.

use super::{selected_token, TunableParameter};
use crate::error::{Result, TuneError};
use std::path::PathBuf;

const CPU_SYSFS_ROOT: &str = "/sys/devices/system/cpu";
const THP_SYSFS_FILE: &str = "/sys/kernel/mm/transparent_hugepage/enabled";

/// CPU frequency scaling governor, applied to every core.
///
/// Reads report the governor of cpu0; writes fan out to all cores so a
/// partially-governed system converges.
pub struct CpuGovernorParam {
    key: String,
    expected: String,
    root: PathBuf,
}

impl CpuGovernorParam {
    /// Governor parameter for the live system
    pub fn new(expected: &str) -> Self {
        Self::with_root(expected, PathBuf::from(CPU_SYSFS_ROOT))
    }

    /// Like [`CpuGovernorParam::new`] but rooted somewhere else, for tests
    pub fn with_root(expected: &str, root: PathBuf) -> Self {
        Self {
            key: "cpu.scaling_governor".to_string(),
            expected: expected.to_string(),
            root,
        }
    }

    fn governor_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| TuneError::read(&self.key, e.to_string()))?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // cpu0, cpu1, ... but not cpuidle/cpufreq
            if let Some(rest) = name.strip_prefix("cpu") {
                if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                    let path = entry.path().join("cpufreq/scaling_governor");
                    if path.exists() {
                        paths.push(path);
                    }
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl TunableParameter for CpuGovernorParam {
    fn key(&self) -> &str {
        &self.key
    }

    fn expected(&self) -> &str {
        &self.expected
    }

    fn read(&self) -> Result<String> {
        let paths = self.governor_paths()?;
        let first = paths.first().ok_or_else(|| {
            TuneError::read(&self.key, "no CPU exposes cpufreq scaling_governor")
        })?;
        std::fs::read_to_string(first)
            .map(|s| s.trim().to_string())
            .map_err(|e| TuneError::read(&self.key, e.to_string()))
    }

    fn write(&self, value: &str) -> Result<()> {
        let paths = self
            .governor_paths()
            .map_err(|e| TuneError::write(&self.key, e.to_string()))?;
        if paths.is_empty() {
            return Err(TuneError::write(
                &self.key,
                "no CPU exposes cpufreq scaling_governor",
            ));
        }
        for path in paths {
            std::fs::write(&path, format!("{value}\n"))
                .map_err(|e| TuneError::write(&self.key, e.to_string()))?;
        }
        Ok(())
    }
}

/// Transparent hugepage policy (`always`, `madvise` or `never`)
pub struct ThpParam {
    key: String,
    expected: String,
    file: PathBuf,
}

impl ThpParam {
    /// THP parameter for the live system
    pub fn new(expected: &str) -> Self {
        Self::with_file(expected, PathBuf::from(THP_SYSFS_FILE))
    }

    /// Like [`ThpParam::new`] but against another file, for tests
    pub fn with_file(expected: &str, file: PathBuf) -> Self {
        Self {
            key: "mm.transparent_hugepage".to_string(),
            expected: expected.to_string(),
            file,
        }
    }
}

impl TunableParameter for ThpParam {
    fn key(&self) -> &str {
        &self.key
    }

    fn expected(&self) -> &str {
        &self.expected
    }

    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.file)
            .map(|s| selected_token(&s))
            .map_err(|e| TuneError::read(&self.key, e.to_string()))
    }

    fn write(&self, value: &str) -> Result<()> {
        std::fs::write(&self.file, format!("{value}\n"))
            .map_err(|e| TuneError::write(&self.key, e.to_string()))
    }
}
