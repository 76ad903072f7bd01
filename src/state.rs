//! Persisted tuning state
//!
//! The tuning state is the single shared resource across saptuner
//! invocations: which notes are active standalone, which solutions are
//! active, and the saved original value of every overridden parameter,
//! reference-counted by owning note. It is loaded at operation start and
//! written atomically (write-to-temp-then-rename) at operation end under
//! an advisory file lock.

use crate::config::EngineConfig;
use crate::error::{Result, TuneError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

/// Saved original value of an overridden parameter, plus the set of
/// active notes that currently require it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedParameter {
    /// Value observed before the first override. Captured exactly once
    /// and never overwritten while any owner remains active.
    pub original: String,
    /// Identifiers of the active notes requiring this parameter
    pub owners: BTreeSet<String>,
}

/// The persisted record of everything saptuner has changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningState {
    /// On-disk format version
    pub version: u32,
    /// Notes applied individually, in application order
    pub active_notes: Vec<String>,
    /// Solutions applied, in application order
    pub active_solutions: Vec<String>,
    /// Saved originals keyed by parameter key
    pub parameters: BTreeMap<String, SavedParameter>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Default for TuningState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuningState {
    /// Empty state, as created on first run
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            active_notes: Vec::new(),
            active_solutions: Vec::new(),
            parameters: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Record `owner` as requiring `key`, saving `original` only when this
    /// is the very first override of the parameter. Returns true when the
    /// original was saved by this call.
    pub fn claim(&mut self, key: &str, owner: &str, original: &str) -> bool {
        match self.parameters.get_mut(key) {
            Some(record) => {
                record.owners.insert(owner.to_string());
                false
            }
            None => {
                let mut owners = BTreeSet::new();
                owners.insert(owner.to_string());
                self.parameters.insert(
                    key.to_string(),
                    SavedParameter {
                        original: original.to_string(),
                        owners,
                    },
                );
                true
            }
        }
    }

    /// Record `owner` as requiring an already-saved `key`. Returns false
    /// when no saved record exists (the caller must claim with an
    /// original instead).
    pub fn add_owner(&mut self, key: &str, owner: &str) -> bool {
        match self.parameters.get_mut(key) {
            Some(record) => {
                record.owners.insert(owner.to_string());
                true
            }
            None => false,
        }
    }

    /// Drop `owner` from `key`. When the last owner goes away the saved
    /// record is discarded and its original value returned, meaning the
    /// caller must now restore it.
    pub fn release(&mut self, key: &str, owner: &str) -> Option<String> {
        let remove = match self.parameters.get_mut(key) {
            Some(record) => {
                record.owners.remove(owner);
                record.owners.is_empty()
            }
            None => false,
        };
        if remove {
            self.parameters.remove(key).map(|record| record.original)
        } else {
            None
        }
    }

    /// Whether a note is active in any form: standalone, or owning at
    /// least one parameter (which includes solution-applied notes)
    pub fn note_is_active(&self, id: &str) -> bool {
        self.active_notes.iter().any(|n| n == id)
            || self
                .parameters
                .values()
                .any(|record| record.owners.contains(id))
    }
}

/// Accessor for the persisted state file, guarding it with an advisory
/// file lock against concurrent saptuner invocations
pub struct StateStore {
    state_file: PathBuf,
    lock_file: PathBuf,
    lock_timeout: Duration,
}

/// Exclusive handle on the tuning state; holds the advisory lock until
/// dropped
#[derive(Debug)]
pub struct StateGuard {
    /// The loaded state, mutated in place by the engine
    pub state: TuningState,
    state_file: PathBuf,
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<File>,
}

impl StateStore {
    /// Store for the locations named by the engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state_file: config.state_file.clone(),
            lock_file: config.lock_file.clone(),
            lock_timeout: config.lock_timeout,
        }
    }

    /// Load the state under the exclusive lock, for a mutating operation.
    /// The lock is held until the returned guard is dropped.
    pub fn exclusive(&self) -> Result<StateGuard> {
        #[cfg(unix)]
        let lock = self.acquire(true)?;
        let state = self.load()?;
        Ok(StateGuard {
            state,
            state_file: self.state_file.clone(),
            #[cfg(unix)]
            _lock: lock,
        })
    }

    /// Load the state under a shared lock, for verify/list operations.
    /// The lock is released before returning.
    pub fn load_shared(&self) -> Result<TuningState> {
        #[cfg(unix)]
        let _lock = self.acquire(false)?;
        self.load()
    }

    fn load(&self) -> Result<TuningState> {
        if !self.state_file.exists() {
            debug!(path = %self.state_file.display(), "no tuning state yet, starting empty");
            return Ok(TuningState::new());
        }
        let raw = std::fs::read_to_string(&self.state_file)
            .map_err(|e| TuneError::io(&self.state_file, e))?;
        serde_json::from_str(&raw).map_err(|e| TuneError::StateCorrupt {
            path: self.state_file.clone(),
            message: e.to_string(),
        })
    }

    #[cfg(unix)]
    fn acquire(&self, exclusive: bool) -> Result<nix::fcntl::Flock<File>> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        if let Some(parent) = self.lock_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TuneError::io(parent, e))?;
        }
        let arg = if exclusive {
            FlockArg::LockExclusiveNonblock
        } else {
            FlockArg::LockSharedNonblock
        };
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&self.lock_file)
                .map_err(|e| TuneError::io(&self.lock_file, e))?;
            match Flock::lock(file, arg) {
                Ok(lock) => return Ok(lock),
                Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                    if Instant::now() >= deadline {
                        return Err(TuneError::LockTimeout(self.lock_timeout));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err((_, errno)) => {
                    return Err(TuneError::io(&self.lock_file, errno.into()));
                }
            }
        }
    }
}

impl StateGuard {
    /// Persist the state atomically: write to a temp file next to the
    /// state file, then rename over it.
    pub fn save(&mut self) -> Result<()> {
        self.state.updated_at = Utc::now();
        write_state(&self.state_file, &self.state)
    }
}

fn write_state(path: &Path, state: &TuningState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TuneError::io(parent, e))?;
    }
    let temp_path = path.with_extension("tmp");
    let file = File::create(&temp_path).map_err(|e| TuneError::io(&temp_path, e))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, state).map_err(|e| TuneError::StateCorrupt {
        path: temp_path.clone(),
        message: e.to_string(),
    })?;
    std::fs::rename(&temp_path, path).map_err(|e| TuneError::io(path, e))?;
    Ok(())
}
