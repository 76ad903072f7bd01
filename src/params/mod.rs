//! Tunable parameter primitives
//!
//! Every kind of system knob (sysctl, CPU governor, transparent hugepages,
//! block device queue settings) implements the same small capability set:
//! read the live value, write a value, and report the expected value the
//! owning note evaluated for it. The reconciliation engine only ever talks
//! to this trait and never branches on the concrete kind.

mod block;
mod cpu;
mod sysctl;

pub use block::{list_block_devices, BlockDeviceParam, BlockField};
pub use cpu::{CpuGovernorParam, ThpParam};
pub use sysctl::SysctlParam;

use crate::error::{Result, TuneError};
use std::sync::Arc;
use std::time::Duration;

/// Capability set shared by all tunable parameter kinds
pub trait TunableParameter: Send + Sync {
    /// Stable parameter identity, unique within a catalog
    /// (e.g. `sysctl.vm.swappiness`, `block.sda.scheduler`)
    fn key(&self) -> &str;

    /// Expected value, evaluated when the owning note was loaded
    fn expected(&self) -> &str;

    /// Read the current live value
    fn read(&self) -> Result<String>;

    /// Write a value to the live system
    fn write(&self, value: &str) -> Result<()>;
}

/// Shared handle to a parameter, as stored in notes
pub type ParamRef = Arc<dyn TunableParameter>;

/// Reads a parameter with a bounded timeout.
///
/// A stuck parameter source (e.g. an unresponsive sysfs entry) must not
/// hang a whole reconciliation run. The read happens on a worker thread
/// and expiry is reported as a read error for that parameter only.
pub fn read_with_timeout(param: &ParamRef, timeout: Duration) -> Result<String> {
    let (tx, rx) = crossbeam::channel::bounded(1);
    let worker_param = Arc::clone(param);
    std::thread::spawn(move || {
        // The receiver may be gone after a timeout.
        let _ = tx.send(worker_param.read());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(TuneError::read(
            param.key(),
            format!("read timed out after {timeout:?}"),
        )),
    }
}

/// Extracts the selected token from a bracketed kernel file,
/// e.g. `"noop [mq-deadline] none"` yields `"mq-deadline"`.
/// Files without brackets are returned trimmed.
pub(crate) fn selected_token(raw: &str) -> String {
    if let (Some(start), Some(end)) = (raw.find('['), raw.find(']')) {
        if start < end {
            return raw[start + 1..end].to_string();
        }
    }
    raw.trim().to_string()
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory parameters backing the engine and comparator tests.

    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Shared fake "live system": parameter key to current value
    pub type MockSystem = Arc<Mutex<BTreeMap<String, String>>>;

    /// Build a mock system pre-populated with current values
    pub fn mock_system(values: &[(&str, &str)]) -> MockSystem {
        Arc::new(Mutex::new(
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    /// In-memory parameter reading/writing a [`MockSystem`]
    pub struct MockParameter {
        key: String,
        expected: String,
        system: MockSystem,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl MockParameter {
        pub fn new(key: &str, expected: &str, system: &MockSystem) -> ParamRef {
            Arc::new(Self {
                key: key.to_string(),
                expected: expected.to_string(),
                system: Arc::clone(system),
                fail_reads: false,
                fail_writes: false,
            })
        }

        /// A parameter whose reads always fail, like an unsupported knob
        pub fn unreadable(key: &str, expected: &str, system: &MockSystem) -> ParamRef {
            Arc::new(Self {
                key: key.to_string(),
                expected: expected.to_string(),
                system: Arc::clone(system),
                fail_reads: true,
                fail_writes: false,
            })
        }

        /// A parameter whose writes always fail
        pub fn unwritable(key: &str, expected: &str, system: &MockSystem) -> ParamRef {
            Arc::new(Self {
                key: key.to_string(),
                expected: expected.to_string(),
                system: Arc::clone(system),
                fail_reads: false,
                fail_writes: true,
            })
        }
    }

    impl TunableParameter for MockParameter {
        fn key(&self) -> &str {
            &self.key
        }

        fn expected(&self) -> &str {
            &self.expected
        }

        fn read(&self) -> Result<String> {
            if self.fail_reads {
                return Err(TuneError::read(&self.key, "unsupported by this kernel"));
            }
            self.system
                .lock()
                .unwrap()
                .get(&self.key)
                .cloned()
                .ok_or_else(|| TuneError::read(&self.key, "no such parameter"))
        }

        fn write(&self, value: &str) -> Result<()> {
            if self.fail_writes {
                return Err(TuneError::write(&self.key, "read-only parameter"));
            }
            self.system
                .lock()
                .unwrap()
                .insert(self.key.clone(), value.to_string());
            Ok(())
        }
    }
}
