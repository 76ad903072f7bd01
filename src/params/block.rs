//! Block device queue parameters: I/O scheduler and request queue depth.

use super::{selected_token, TunableParameter};
use crate::error::{Result, TuneError};
use std::path::{Path, PathBuf};

const BLOCK_SYSFS_ROOT: &str = "/sys/block";

/// Which queue setting of a block device is tuned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockField {
    /// `queue/scheduler`, a bracketed-selection file
    Scheduler,
    /// `queue/nr_requests`
    NrRequests,
}

impl BlockField {
    fn file_name(&self) -> &'static str {
        match self {
            BlockField::Scheduler => "scheduler",
            BlockField::NrRequests => "nr_requests",
        }
    }
}

/// One queue setting of one block device, e.g. the scheduler of `sda`
pub struct BlockDeviceParam {
    key: String,
    device: String,
    field: BlockField,
    expected: String,
    root: PathBuf,
}

impl BlockDeviceParam {
    /// Parameter for a live block device
    pub fn new(device: &str, field: BlockField, expected: &str) -> Self {
        Self::with_root(device, field, expected, PathBuf::from(BLOCK_SYSFS_ROOT))
    }

    /// Like [`BlockDeviceParam::new`] but rooted somewhere else, for tests
    pub fn with_root(device: &str, field: BlockField, expected: &str, root: PathBuf) -> Self {
        Self {
            key: format!("block.{device}.{}", field.file_name()),
            device: device.to_string(),
            field,
            expected: expected.to_string(),
            root,
        }
    }

    fn path(&self) -> PathBuf {
        self.root
            .join(&self.device)
            .join("queue")
            .join(self.field.file_name())
    }
}

impl TunableParameter for BlockDeviceParam {
    fn key(&self) -> &str {
        &self.key
    }

    fn expected(&self) -> &str {
        &self.expected
    }

    fn read(&self) -> Result<String> {
        let raw = std::fs::read_to_string(self.path())
            .map_err(|e| TuneError::read(&self.key, e.to_string()))?;
        Ok(match self.field {
            BlockField::Scheduler => selected_token(&raw),
            BlockField::NrRequests => raw.trim().to_string(),
        })
    }

    fn write(&self, value: &str) -> Result<()> {
        std::fs::write(self.path(), format!("{value}\n"))
            .map_err(|e| TuneError::write(&self.key, e.to_string()))
    }
}

/// Enumerate tunable block devices, skipping virtual ones (loop, ram,
/// device-mapper and friends have no real queue to tune).
pub fn list_block_devices() -> Vec<String> {
    list_block_devices_in(Path::new(BLOCK_SYSFS_ROOT))
}

fn list_block_devices_in(root: &Path) -> Vec<String> {
    let mut devices = Vec::new();
    if let Ok(entries) = std::fs::read_dir(root) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("loop")
                || name.starts_with("ram")
                || name.starts_with("dm-")
                || name.starts_with("md")
                || name.starts_with("zram")
            {
                continue;
            }
            if entry.path().join("queue").is_dir() {
                devices.push(name);
            }
        }
    }
    devices.sort();
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scheduler_reads_selected_and_writes() {
        let root = tempdir().unwrap();
        let queue = root.path().join("sda/queue");
        std::fs::create_dir_all(&queue).unwrap();
        std::fs::write(queue.join("scheduler"), "[mq-deadline] none\n").unwrap();

        let param = BlockDeviceParam::with_root(
            "sda",
            BlockField::Scheduler,
            "none",
            root.path().to_path_buf(),
        );
        assert_eq!(param.key(), "block.sda.scheduler");
        assert_eq!(param.read().unwrap(), "mq-deadline");

        param.write("none").unwrap();
        assert_eq!(
            std::fs::read_to_string(queue.join("scheduler")).unwrap(),
            "none\n"
        );
    }

    #[test]
    fn test_device_listing_skips_virtual() {
        let root = tempdir().unwrap();
        for dev in ["sda", "nvme0n1", "loop0", "ram0", "dm-0"] {
            std::fs::create_dir_all(root.path().join(dev).join("queue")).unwrap();
        }
        let devices = list_block_devices_in(root.path());
        assert_eq!(devices, vec!["nvme0n1".to_string(), "sda".to_string()]);
    }
}
