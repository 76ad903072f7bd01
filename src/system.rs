//! Hardware and platform facts
//!
//! Collects the live system facts that note definitions and the solution
//! catalog are evaluated against: total memory, the platform architecture
//! and whether the kernel carries the pagecache limit patch.

use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::System;

/// Kernel knob that only exists on kernels with the pagecache limit patch.
const PAGECACHE_LIMIT_KNOB: &str = "/proc/sys/vm/pagecache_limit_mb";

/// Live hardware/software facts used to evaluate note definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemFacts {
    /// Total physical memory in bytes
    pub total_memory_bytes: u64,
    /// CPU architecture (as compiled for)
    pub arch: String,
    /// Whether the kernel supports limiting the page cache size
    pub pagecache_limit_available: bool,
}

impl SystemFacts {
    /// Collect facts from the running system
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self {
            total_memory_bytes: sys.total_memory(),
            arch: std::env::consts::ARCH.to_string(),
            pagecache_limit_available: Path::new(PAGECACHE_LIMIT_KNOB).exists(),
        }
    }

    /// Platform key used to select solution definitions.
    ///
    /// The architecture, suffixed with `_PC` when the pagecache-size
    /// sensitive code path applies.
    pub fn platform_key(&self) -> String {
        if self.pagecache_limit_available {
            format!("{}_PC", self.arch)
        } else {
            self.arch.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_key_suffix() {
        let mut facts = SystemFacts {
            total_memory_bytes: 8 << 30,
            arch: "x86_64".to_string(),
            pagecache_limit_available: false,
        };
        assert_eq!(facts.platform_key(), "x86_64");
        facts.pagecache_limit_available = true;
        assert_eq!(facts.platform_key(), "x86_64_PC");
    }

    #[test]
    fn test_collect_reports_memory() {
        let facts = SystemFacts::collect();
        assert!(facts.total_memory_bytes > 0);
        assert!(!facts.arch.is_empty());
    }
}
