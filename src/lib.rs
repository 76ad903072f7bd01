//! # SapTuner - System Optimisation Management for SAP Workloads
//!
//! SapTuner applies, verifies and reverts named bundles of kernel and
//! system parameters ("notes") and platform-scoped collections of notes
//! ("solutions") recommended for SAP products. The core is a tuning
//! state-reconciliation engine: a layered, order-sensitive configuration
//! stack with save/restore semantics and partial-failure tolerance, not a
//! stateless one-shot script.
//!
//! ## Features
//!
//! - **Reference-counted ownership**: a parameter's original value is
//!   saved exactly once and restored only when its last owner is reverted
//! - **Absorption**: applying a solution takes over notes that were
//!   applied standalone without re-saving or disturbing their values
//! - **Drift verification**: per-field expected/actual comparison across
//!   overlapping notes, resilient to unreadable parameters
//! - **Crash recovery**: idempotent re-apply (`tune_all`) reconciles the
//!   persisted state with the live system after reboot or a killed run
//! - **Extensible catalog**: built-in SAP/SUSE notes, extended or
//!   overridden by JSON tuning sheets from an extra directory
//!
//! ## Quick Start
//!
//! ```no_run
//! use saptuner::catalog::{NoteCatalog, SolutionCatalog};
//! use saptuner::config::EngineConfig;
//! use saptuner::engine::TuneApp;
//! use saptuner::system::SystemFacts;
//!
//! let config = EngineConfig::default();
//! let facts = SystemFacts::collect();
//! let notes = NoteCatalog::load(&facts, &config.extra_sheets_dir);
//! let solutions = SolutionCatalog::load(&facts, &config.extra_sheets_dir);
//!
//! let app = TuneApp::new(config, notes, solutions);
//! let absorbed = app.tune_solution("HANA").unwrap();
//! println!("now tuned by the solution: {absorbed:?}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod params;
pub mod service;
pub mod state;
pub mod system;

// Re-export commonly used types
pub use compare::{NoteComparison, NoteFieldComparison};
pub use engine::TuneApp;
pub use error::{Result, TuneError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use saptuner::prelude::*;
    //! ```

    pub use crate::catalog::{Note, NoteCatalog, SolutionCatalog};
    pub use crate::compare::{NoteComparison, NoteFieldComparison};
    pub use crate::config::EngineConfig;
    pub use crate::engine::TuneApp;
    pub use crate::error::{Result, TuneError};
    pub use crate::params::TunableParameter;
    pub use crate::state::TuningState;
    pub use crate::system::SystemFacts;
}
