//! Note and solution catalogs
//!
//! A note is a named bundle of parameter settings recommended for an SAP
//! component; a solution is a platform-scoped ordered collection of notes
//! recommended for an SAP product. Both catalogs are read-only lookups:
//! built-in definitions first, then JSON tuning sheets from the extra
//! directory which extend or override the built-ins by identifier.

use crate::error::{Result, TuneError};
use crate::params::{
    list_block_devices, BlockDeviceParam, BlockField, CpuGovernorParam, ParamRef, SysctlParam,
    ThpParam,
};
use crate::system::SystemFacts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Internal note referenced by the ASE solution; hidden from listings.
pub const INTERNAL_BLOCK_NOTE: &str = "Block";

/// File in the extra directory that carries additional solution definitions.
const SOLUTIONS_SHEET: &str = "solutions.json";

/// An immutable tuning note: identifier, display name and the ordered
/// parameters it sets. A note is a specification, never state.
#[derive(Clone)]
pub struct Note {
    /// Globally unique identifier within the catalog (SAP note number
    /// or vendor-chosen id)
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Ordered parameter set, expected values already evaluated
    pub parameters: Vec<ParamRef>,
}

/// Expected value of a parameter, resolved against live hardware facts
/// when the catalog is loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    /// A fixed value
    Literal(String),
    /// A percentage of total physical memory, in bytes
    MemoryPercent {
        /// Percent of total RAM
        memory_percent: u64,
    },
}

impl ValueSpec {
    /// Resolve the spec into a concrete value string
    pub fn evaluate(&self, facts: &SystemFacts) -> String {
        match self {
            ValueSpec::Literal(v) => v.clone(),
            ValueSpec::MemoryPercent { memory_percent } => {
                (facts.total_memory_bytes / 100 * memory_percent).to_string()
            }
        }
    }
}

/// One parameter line of a tuning sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamSpec {
    /// A sysctl knob
    Sysctl {
        /// Dotted sysctl name
        key: String,
        /// Expected value
        value: ValueSpec,
    },
    /// CPU frequency scaling governor for all cores
    CpuGovernor {
        /// Governor name, e.g. `performance`
        value: String,
    },
    /// Transparent hugepage policy
    TransparentHugepage {
        /// `always`, `madvise` or `never`
        value: String,
    },
    /// I/O scheduler, expanded over every physical block device
    BlockScheduler {
        /// Scheduler name, e.g. `noop`
        value: String,
    },
    /// Request queue depth, expanded over every physical block device
    BlockNrRequests {
        /// Queue depth
        value: String,
    },
}

/// On-disk representation of a tuning sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSheet {
    /// Note identifier; defaults to the sheet's file stem
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable name
    pub name: String,
    /// Ordered parameter specifications
    pub parameters: Vec<ParamSpec>,
}

impl NoteSheet {
    /// Materialize the sheet into a note, evaluating expected values
    /// against the given facts
    pub fn into_note(self, id: String, facts: &SystemFacts) -> Note {
        let mut parameters: Vec<ParamRef> = Vec::new();
        for spec in self.parameters {
            match spec {
                ParamSpec::Sysctl { key, value } => {
                    parameters.push(Arc::new(SysctlParam::new(&key, &value.evaluate(facts))));
                }
                ParamSpec::CpuGovernor { value } => {
                    parameters.push(Arc::new(CpuGovernorParam::new(&value)));
                }
                ParamSpec::TransparentHugepage { value } => {
                    parameters.push(Arc::new(ThpParam::new(&value)));
                }
                ParamSpec::BlockScheduler { value } => {
                    for device in list_block_devices() {
                        parameters.push(Arc::new(BlockDeviceParam::new(
                            &device,
                            BlockField::Scheduler,
                            &value,
                        )));
                    }
                }
                ParamSpec::BlockNrRequests { value } => {
                    for device in list_block_devices() {
                        parameters.push(Arc::new(BlockDeviceParam::new(
                            &device,
                            BlockField::NrRequests,
                            &value,
                        )));
                    }
                }
            }
        }
        Note {
            id,
            name: self.name,
            parameters,
        }
    }
}

/// Read-only lookup from note identifier to note
pub struct NoteCatalog {
    notes: BTreeMap<String, Note>,
}

impl NoteCatalog {
    /// Load built-in notes plus the sheets found in the extra directory.
    ///
    /// Extra sheets override built-ins with the same identifier. A sheet
    /// that fails to parse is reported but does not prevent the rest of
    /// the catalog from loading.
    pub fn load(facts: &SystemFacts, extra_dir: &Path) -> Self {
        let mut notes = BTreeMap::new();
        for (id, sheet) in builtin_sheets() {
            notes.insert(id.to_string(), sheet.into_note(id.to_string(), facts));
        }

        for entry in walkdir::WalkDir::new(extra_dir)
            .max_depth(1)
            .into_iter()
            .flatten()
        {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false)
                && path.file_name().map(|n| n != SOLUTIONS_SHEET).unwrap_or(false)
            {
                match Self::load_sheet(path, facts) {
                    Ok(note) => {
                        debug!(id = %note.id, sheet = %path.display(), "loaded extra tuning sheet");
                        notes.insert(note.id.clone(), note);
                    }
                    Err(e) => warn!("skipping tuning sheet: {e}"),
                }
            }
        }

        Self { notes }
    }

    /// Build a catalog directly from notes, bypassing sheet loading
    pub fn from_notes(notes: Vec<Note>) -> Self {
        Self {
            notes: notes.into_iter().map(|n| (n.id.clone(), n)).collect(),
        }
    }

    fn load_sheet(path: &Path, facts: &SystemFacts) -> Result<Note> {
        let raw = std::fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;
        let sheet: NoteSheet =
            serde_json::from_str(&raw).map_err(|e| TuneError::InvalidSheet {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let id = sheet.id.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        });
        if id.is_empty() {
            return Err(TuneError::InvalidSheet {
                path: path.to_path_buf(),
                message: "sheet has neither an id field nor a usable file name".to_string(),
            });
        }
        Ok(sheet.into_note(id, facts))
    }

    /// Look a note up by identifier
    pub fn get(&self, id: &str) -> Result<&Note> {
        self.notes
            .get(id)
            .ok_or_else(|| TuneError::NotFound(id.to_string()))
    }

    /// Whether the catalog knows this identifier
    pub fn contains(&self, id: &str) -> bool {
        self.notes.contains_key(id)
    }

    /// All note identifiers in sorted order
    pub fn sorted_ids(&self) -> Vec<String> {
        self.notes.keys().cloned().collect()
    }
}

/// Read-only lookup from solution name to the ordered note list registered
/// for the current platform key
pub struct SolutionCatalog {
    platform: String,
    /// solution name -> platform key -> ordered note ids
    definitions: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl SolutionCatalog {
    /// Load built-in solutions plus `solutions.json` from the extra
    /// directory, selected by the platform key of the given facts
    pub fn load(facts: &SystemFacts, extra_dir: &Path) -> Self {
        let mut definitions = builtin_solutions();

        let extra_path = extra_dir.join(SOLUTIONS_SHEET);
        if extra_path.is_file() {
            match std::fs::read_to_string(&extra_path)
                .map_err(|e| TuneError::io(&extra_path, e))
                .and_then(|raw| {
                    serde_json::from_str::<BTreeMap<String, BTreeMap<String, Vec<String>>>>(&raw)
                        .map_err(|e| TuneError::InvalidSheet {
                            path: extra_path.clone(),
                            message: e.to_string(),
                        })
                }) {
                Ok(extra) => {
                    for (name, per_platform) in extra {
                        definitions.insert(name, per_platform);
                    }
                }
                Err(e) => warn!("skipping extra solutions: {e}"),
            }
        }

        Self {
            platform: facts.platform_key(),
            definitions,
        }
    }

    /// Build a catalog directly from definitions, for tests and embedding
    pub fn from_definitions(
        platform: &str,
        definitions: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    ) -> Self {
        Self {
            platform: platform.to_string(),
            definitions,
        }
    }

    /// Platform key this catalog resolves against
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Resolve the ordered note list of a solution for the current platform
    pub fn resolve(&self, name: &str) -> Result<&[String]> {
        let per_platform = self
            .definitions
            .get(name)
            .ok_or_else(|| TuneError::NotFound(name.to_string()))?;
        per_platform
            .get(&self.platform)
            .map(|ids| ids.as_slice())
            .ok_or_else(|| TuneError::UnsupportedPlatform {
                name: name.to_string(),
                platform: self.platform.clone(),
            })
    }

    /// Whether any platform defines this solution name
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Sorted names of the solutions available on the current platform
    pub fn sorted_names(&self) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|(_, per_platform)| per_platform.contains_key(&self.platform))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Built-in tuning sheets, shipped with the binary
fn builtin_sheets() -> Vec<(&'static str, NoteSheet)> {
    vec![
        (
            "1275776",
            NoteSheet {
                id: None,
                name: "Linux: Preparing SLES for SAP environments".to_string(),
                parameters: vec![
                    ParamSpec::Sysctl {
                        key: "kernel.shmmax".to_string(),
                        value: ValueSpec::MemoryPercent { memory_percent: 100 },
                    },
                    ParamSpec::Sysctl {
                        key: "kernel.sem".to_string(),
                        value: ValueSpec::Literal("1250 256000 100 8192".to_string()),
                    },
                    ParamSpec::Sysctl {
                        key: "vm.max_map_count".to_string(),
                        value: ValueSpec::Literal("2000000".to_string()),
                    },
                ],
            },
        ),
        (
            "1410736",
            NoteSheet {
                id: None,
                name: "TCP/IP: setting keepalive interval".to_string(),
                parameters: vec![
                    ParamSpec::Sysctl {
                        key: "net.ipv4.tcp_keepalive_time".to_string(),
                        value: ValueSpec::Literal("300".to_string()),
                    },
                    ParamSpec::Sysctl {
                        key: "net.ipv4.tcp_keepalive_intvl".to_string(),
                        value: ValueSpec::Literal("75".to_string()),
                    },
                ],
            },
        ),
        (
            "1557506",
            NoteSheet {
                id: None,
                name: "Linux paging improvements".to_string(),
                parameters: vec![
                    ParamSpec::Sysctl {
                        key: "vm.pagecache_limit_mb".to_string(),
                        value: ValueSpec::MemoryPercent { memory_percent: 2 },
                    },
                    ParamSpec::Sysctl {
                        key: "vm.pagecache_limit_ignore_dirty".to_string(),
                        value: ValueSpec::Literal("1".to_string()),
                    },
                ],
            },
        ),
        (
            "2205917",
            NoteSheet {
                id: None,
                name: "SAP HANA DB: Recommended OS settings".to_string(),
                parameters: vec![
                    ParamSpec::CpuGovernor {
                        value: "performance".to_string(),
                    },
                    ParamSpec::TransparentHugepage {
                        value: "never".to_string(),
                    },
                    ParamSpec::Sysctl {
                        key: "kernel.numa_balancing".to_string(),
                        value: ValueSpec::Literal("0".to_string()),
                    },
                ],
            },
        ),
        (
            INTERNAL_BLOCK_NOTE,
            NoteSheet {
                id: None,
                name: "Block device queue tuning for SAP ASE".to_string(),
                parameters: vec![
                    ParamSpec::BlockScheduler {
                        value: "noop".to_string(),
                    },
                    ParamSpec::BlockNrRequests {
                        value: "1024".to_string(),
                    },
                ],
            },
        ),
    ]
}

/// Built-in solution definitions, keyed by solution name then platform key
fn builtin_solutions() -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    let mut definitions: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();

    let mut hana = BTreeMap::new();
    hana.insert("x86_64".to_string(), ids(&["1275776", "1410736", "2205917"]));
    hana.insert(
        "x86_64_PC".to_string(),
        ids(&["1275776", "1410736", "2205917", "1557506"]),
    );
    hana.insert(
        "powerpc64".to_string(),
        ids(&["1275776", "1410736", "2205917"]),
    );
    definitions.insert("HANA".to_string(), hana);

    let mut netweaver = BTreeMap::new();
    netweaver.insert("x86_64".to_string(), ids(&["1275776", "1410736"]));
    netweaver.insert(
        "x86_64_PC".to_string(),
        ids(&["1275776", "1410736", "1557506"]),
    );
    netweaver.insert("powerpc64".to_string(), ids(&["1275776", "1410736"]));
    definitions.insert("NETWEAVER".to_string(), netweaver);

    let mut maxdb = BTreeMap::new();
    maxdb.insert("x86_64".to_string(), ids(&["1275776", "1410736"]));
    maxdb.insert(
        "x86_64_PC".to_string(),
        ids(&["1275776", "1410736", "1557506"]),
    );
    definitions.insert("MAXDB".to_string(), maxdb);

    let mut ase = BTreeMap::new();
    ase.insert(
        "x86_64".to_string(),
        ids(&["1275776", "1410736", INTERNAL_BLOCK_NOTE]),
    );
    ase.insert(
        "x86_64_PC".to_string(),
        ids(&["1275776", "1410736", "1557506", INTERNAL_BLOCK_NOTE]),
    );
    definitions.insert("ASE".to_string(), ase);

    definitions
}
