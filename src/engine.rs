//! Tuning state reconciliation engine
//!
//! The orchestrator behind every CLI action: applies, reverts and verifies
//! notes and solutions against the persisted tuning state. Parameter
//! ownership is reference-counted per parameter key; the original value is
//! saved on the first claim only and restored only when the last owner is
//! released. Absorbing a standalone note into a solution transfers that
//! bookkeeping without touching ownership counts or live values.

use crate::catalog::{Note, NoteCatalog, SolutionCatalog};
use crate::compare::{compare_note, conforms, NoteComparison};
use crate::config::EngineConfig;
use crate::error::{aggregate, Result, TuneError};
use crate::params::read_with_timeout;
use crate::state::{StateStore, TuningState};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Per-note comparison results keyed by note identifier
pub type SolutionComparison = BTreeMap<String, NoteComparison>;

/// The reconciliation engine: one instance per CLI invocation
pub struct TuneApp {
    config: EngineConfig,
    notes: NoteCatalog,
    solutions: SolutionCatalog,
    store: StateStore,
}

impl TuneApp {
    /// Build the engine from a configuration and loaded catalogs
    pub fn new(config: EngineConfig, notes: NoteCatalog, solutions: SolutionCatalog) -> Self {
        let store = StateStore::new(&config);
        Self {
            config,
            notes,
            solutions,
            store,
        }
    }

    /// The note catalog, for listings
    pub fn note_catalog(&self) -> &NoteCatalog {
        &self.notes
    }

    /// The solution catalog, for listings
    pub fn solution_catalog(&self) -> &SolutionCatalog {
        &self.solutions
    }

    /// Look a note up by identifier
    pub fn get_note_by_id(&self, id: &str) -> Result<&Note> {
        self.notes.get(id)
    }

    /// Read-only snapshot of the persisted tuning state
    pub fn state_snapshot(&self) -> Result<TuningState> {
        self.store.load_shared()
    }

    /// Apply a single note: save originals for parameters not yet owned,
    /// write the expected values, and record the note as active standalone
    /// unless an active solution already covers it.
    ///
    /// Idempotent: re-applying an active note performs no redundant saves
    /// and yields the same end state.
    pub fn tune_note(&self, id: &str) -> Result<()> {
        let note = self.notes.get(id)?;
        let mut guard = self.store.exclusive()?;
        let errors = self.apply_note(note, &mut guard.state);
        if !guard.state.active_notes.iter().any(|n| n == id)
            && !self.solution_covers(&guard.state, id)
        {
            guard.state.active_notes.push(id.to_string());
        }
        guard.save()?;
        info!(note = id, "note applied");
        aggregate(errors)
    }

    /// Revert a single note: restore the saved original of every parameter
    /// owned solely by this note, leave shared parameters untouched, and
    /// remove the note from the standalone list when `remove_from_state`
    /// is set (soft reverts during solution processing keep it).
    pub fn revert_note(&self, id: &str, remove_from_state: bool) -> Result<()> {
        let note = self.notes.get(id)?;
        let mut guard = self.store.exclusive()?;
        if !guard.state.note_is_active(id) {
            return Err(TuneError::NotActive(id.to_string()));
        }
        let errors = self.revert_note_values(note, &mut guard.state);
        if remove_from_state {
            guard.state.active_notes.retain(|n| n != id);
        }
        guard.save()?;
        info!(note = id, "note reverted");
        aggregate(errors)
    }

    /// Compare live values against a note regardless of activation state.
    /// Returns whether the system fully conforms plus the per-field
    /// comparison.
    pub fn verify_note(&self, id: &str) -> Result<(bool, NoteComparison)> {
        let note = self.notes.get(id)?;
        let comparison = compare_note(note, self.config.read_timeout);
        Ok((conforms(&comparison), comparison))
    }

    /// Apply every note of a solution for the current platform.
    ///
    /// Constituent notes that were active standalone are absorbed: removed
    /// from the standalone list without reverting their values (ownership
    /// transfers, it is not duplicated). Returns the absorbed note ids so
    /// the caller can report the change.
    pub fn tune_solution(&self, name: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = self.solutions.resolve(name)?.to_vec();
        let mut constituents = Vec::with_capacity(ids.len());
        for id in &ids {
            constituents.push(self.notes.get(id)?);
        }

        let mut guard = self.store.exclusive()?;
        let absorbed: Vec<String> = guard
            .state
            .active_notes
            .iter()
            .filter(|n| ids.contains(n))
            .cloned()
            .collect();
        guard.state.active_notes.retain(|n| !ids.contains(n));

        let mut errors = Vec::new();
        for note in &constituents {
            errors.extend(self.apply_note(note, &mut guard.state));
        }
        if !guard.state.active_solutions.iter().any(|s| s == name) {
            guard.state.active_solutions.push(name.to_string());
        }
        guard.save()?;
        info!(solution = name, absorbed = absorbed.len(), "solution applied");
        aggregate(errors)?;
        Ok(absorbed)
    }

    /// Revert a solution's notes, honoring shared ownership: a parameter
    /// is restored only when no other active note or solution still needs
    /// it, and a constituent note stays applied when it is still enabled
    /// standalone or through another active solution.
    pub fn revert_solution(&self, name: &str) -> Result<()> {
        let ids: Vec<String> = self.solutions.resolve(name)?.to_vec();
        let mut guard = self.store.exclusive()?;
        if !guard.state.active_solutions.iter().any(|s| s == name) {
            return Err(TuneError::NotActive(name.to_string()));
        }
        guard.state.active_solutions.retain(|s| s != name);
        let remaining = guard.state.active_solutions.clone();

        let mut errors = Vec::new();
        for id in ids.iter().rev() {
            if guard.state.active_notes.iter().any(|n| n == id) {
                debug!(note = %id, "still enabled standalone, keeping");
                continue;
            }
            let still_needed = remaining.iter().any(|sol| {
                self.solutions
                    .resolve(sol)
                    .map(|list| list.contains(id))
                    .unwrap_or(false)
            });
            if still_needed {
                debug!(note = %id, "still required by another solution, keeping");
                continue;
            }
            match self.notes.get(id) {
                Ok(note) => errors.extend(self.revert_note_values(note, &mut guard.state)),
                Err(e) => errors.push(e),
            }
        }
        guard.save()?;
        info!(solution = name, "solution reverted");
        aggregate(errors)
    }

    /// Compare live values against every note of a solution. Returns the
    /// non-conforming note ids plus per-note comparisons.
    pub fn verify_solution(&self, name: &str) -> Result<(Vec<String>, SolutionComparison)> {
        let ids: Vec<String> = self.solutions.resolve(name)?.to_vec();
        let mut unsatisfied = Vec::new();
        let mut comparisons = BTreeMap::new();
        for id in &ids {
            let note = self.notes.get(id)?;
            let comparison = compare_note(note, self.config.read_timeout);
            if !conforms(&comparison) {
                unsatisfied.push(id.clone());
            }
            comparisons.insert(id.clone(), comparison);
        }
        Ok((unsatisfied, comparisons))
    }

    /// Re-apply every enabled note, standalone and solution-derived. Used
    /// to restore the full tuning state after a reboot; never aborts on
    /// the first failing note, all failures are collected.
    pub fn tune_all(&self) -> Result<()> {
        let mut guard = self.store.exclusive()?;
        let mut errors = Vec::new();
        for sol in guard.state.active_solutions.clone() {
            if let Err(e) = self.solutions.resolve(&sol) {
                errors.push(e);
            }
        }
        for id in self.enabled_note_ids(&guard.state) {
            match self.notes.get(&id) {
                Ok(note) => errors.extend(self.apply_note(note, &mut guard.state)),
                Err(e) => errors.push(e),
            }
        }
        guard.save()?;
        aggregate(errors)
    }

    /// Revert every enabled note, in reverse application order. With
    /// `remove_from_state` unset the activation lists are kept, so a later
    /// `tune_all` (e.g. the daemon's post-reboot apply) restores tuning.
    pub fn revert_all(&self, remove_from_state: bool) -> Result<()> {
        let mut guard = self.store.exclusive()?;
        let mut errors = Vec::new();
        let ids = self.enabled_note_ids(&guard.state);
        for id in ids.iter().rev() {
            match self.notes.get(id) {
                Ok(note) => errors.extend(self.revert_note_values(note, &mut guard.state)),
                Err(e) => errors.push(e),
            }
        }
        if remove_from_state {
            guard.state.active_notes.clear();
            guard.state.active_solutions.clear();
        }
        guard.save()?;
        aggregate(errors)
    }

    /// Compute which enabled notes currently conform. Returns the
    /// non-conforming ids plus their comparisons.
    pub fn verify_all(&self) -> Result<(Vec<String>, SolutionComparison)> {
        let state = self.store.load_shared()?;
        let mut unsatisfied = Vec::new();
        let mut comparisons = BTreeMap::new();
        for id in self.enabled_note_ids(&state) {
            match self.notes.get(&id) {
                Ok(note) => {
                    let comparison = compare_note(note, self.config.read_timeout);
                    if !conforms(&comparison) {
                        unsatisfied.push(id.clone());
                    }
                    comparisons.insert(id, comparison);
                }
                Err(_) => {
                    warn!(note = %id, "enabled note is missing from the catalog");
                    unsatisfied.push(id.clone());
                    comparisons.insert(id, BTreeMap::new());
                }
            }
        }
        Ok((unsatisfied, comparisons))
    }

    /// Deduplicated, sorted note ids reachable from all active solutions.
    /// Used to distinguish "enabled by solution" from "enabled manually"
    /// when listing.
    pub fn sorted_solution_enabled_notes(&self) -> Result<Vec<String>> {
        let state = self.store.load_shared()?;
        let mut ids = BTreeSet::new();
        for sol in &state.active_solutions {
            if let Ok(list) = self.solutions.resolve(sol) {
                ids.extend(list.iter().cloned());
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Every enabled note id: solution-derived first in application
    /// order, then standalone, deduplicated keeping the first occurrence
    fn enabled_note_ids(&self, state: &TuningState) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for sol in &state.active_solutions {
            if let Ok(list) = self.solutions.resolve(sol) {
                for id in list {
                    if !ids.contains(id) {
                        ids.push(id.clone());
                    }
                }
            }
        }
        for id in &state.active_notes {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    fn solution_covers(&self, state: &TuningState, id: &str) -> bool {
        state.active_solutions.iter().any(|sol| {
            self.solutions
                .resolve(sol)
                .map(|list| list.iter().any(|n| n == id))
                .unwrap_or(false)
        })
    }

    /// Apply one note's parameters against the given state. Per-parameter
    /// failures are collected, never fatal; successfully changed
    /// parameters keep their new values.
    fn apply_note(&self, note: &Note, state: &mut TuningState) -> Vec<TuneError> {
        let mut errors = Vec::new();
        for param in &note.parameters {
            let key = param.key().to_string();
            let expected = param.expected().to_string();

            let current = match read_with_timeout(param, self.config.read_timeout) {
                Ok(value) => value,
                Err(e) => {
                    if state.add_owner(&key, &note.id) {
                        // Original already saved by an earlier owner;
                        // the apply can still go ahead.
                        if let Err(we) = param.write(&expected) {
                            errors.push(we);
                        }
                    } else {
                        // Without a saved original there would be nothing
                        // to restore on revert; skip this parameter.
                        errors.push(e);
                    }
                    continue;
                }
            };

            state.claim(&key, &note.id, &current);
            if current == expected {
                debug!(param = %key, "already at expected value");
                continue;
            }
            if let Err(e) = param.write(&expected) {
                errors.push(e);
            }
        }
        errors
    }

    /// Restore the parameters of one note whose ownership drops to zero,
    /// in reverse parameter order
    fn revert_note_values(&self, note: &Note, state: &mut TuningState) -> Vec<TuneError> {
        let mut errors = Vec::new();
        for param in note.parameters.iter().rev() {
            if let Some(original) = state.release(param.key(), &note.id) {
                if let Err(e) = param.write(&original) {
                    errors.push(e);
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::mock::{mock_system, MockParameter, MockSystem};
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const PLATFORM: &str = "x86_64";

    fn test_config(dir: &Path) -> EngineConfig {
        EngineConfig {
            state_file: dir.join("state.json"),
            lock_file: dir.join("state.lock"),
            extra_sheets_dir: dir.join("extra"),
            lock_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_secs(1),
        }
    }

    fn note(id: &str, params: Vec<crate::params::ParamRef>) -> Note {
        Note {
            id: id.to_string(),
            name: format!("Test note {id}"),
            parameters: params,
        }
    }

    struct Fixture {
        app: TuneApp,
        system: MockSystem,
        _dir: TempDir,
    }

    /// Catalog under test:
    ///   1001 -> governor performance
    ///   N1   -> swappiness 10
    ///   N2   -> swappiness 20, shmmax 5000
    ///   BAD  -> an unwritable knob
    /// Solutions (platform x86_64): S1 = [N1, N2], S2 = [N2],
    /// OTHER only exists for powerpc64.
    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let system = mock_system(&[
            ("cpu.scaling_governor", "powersave"),
            ("sysctl.vm.swappiness", "60"),
            ("sysctl.kernel.shmmax", "1000"),
            ("sysctl.kernel.locked", "0"),
        ]);

        let notes = NoteCatalog::from_notes(vec![
            note(
                "1001",
                vec![MockParameter::new(
                    "cpu.scaling_governor",
                    "performance",
                    &system,
                )],
            ),
            note(
                "N1",
                vec![MockParameter::new("sysctl.vm.swappiness", "10", &system)],
            ),
            note(
                "N2",
                vec![
                    MockParameter::new("sysctl.vm.swappiness", "20", &system),
                    MockParameter::new("sysctl.kernel.shmmax", "5000", &system),
                ],
            ),
            note(
                "BAD",
                vec![MockParameter::unwritable(
                    "sysctl.kernel.locked",
                    "1",
                    &system,
                )],
            ),
        ]);

        let mut definitions: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        let mut s1 = BTreeMap::new();
        s1.insert(
            PLATFORM.to_string(),
            vec!["N1".to_string(), "N2".to_string()],
        );
        definitions.insert("S1".to_string(), s1);
        let mut s2 = BTreeMap::new();
        s2.insert(PLATFORM.to_string(), vec!["N2".to_string()]);
        definitions.insert("S2".to_string(), s2);
        let mut other = BTreeMap::new();
        other.insert("powerpc64".to_string(), vec!["N1".to_string()]);
        definitions.insert("OTHER".to_string(), other);

        let solutions = SolutionCatalog::from_definitions(PLATFORM, definitions);
        let app = TuneApp::new(test_config(dir.path()), notes, solutions);
        Fixture {
            app,
            system,
            _dir: dir,
        }
    }

    fn live(fx: &Fixture, key: &str) -> String {
        fx.system.lock().unwrap().get(key).cloned().unwrap()
    }

    #[test]
    fn test_governor_scenario() {
        let fx = fixture();

        let (conforming, comparison) = fx.app.verify_note("1001").unwrap();
        assert!(!conforming);
        let field = &comparison["cpu.scaling_governor"];
        assert_eq!(field.expected, "performance");
        assert_eq!(field.actual, "powersave");

        fx.app.tune_note("1001").unwrap();
        assert_eq!(live(&fx, "cpu.scaling_governor"), "performance");
        let state = fx.app.state_snapshot().unwrap();
        assert_eq!(
            state.parameters["cpu.scaling_governor"].original,
            "powersave"
        );

        let (conforming, _) = fx.app.verify_note("1001").unwrap();
        assert!(conforming);

        fx.app.revert_note("1001", true).unwrap();
        assert_eq!(live(&fx, "cpu.scaling_governor"), "powersave");
        let state = fx.app.state_snapshot().unwrap();
        assert!(state.active_notes.is_empty());
        assert!(state.parameters.is_empty());
    }

    #[test]
    fn test_tune_note_is_idempotent() {
        let fx = fixture();
        fx.app.tune_note("N1").unwrap();
        let first = fx.app.state_snapshot().unwrap();

        fx.app.tune_note("N1").unwrap();
        let second = fx.app.state_snapshot().unwrap();

        assert_eq!(first.active_notes, second.active_notes);
        assert_eq!(second.active_notes, vec!["N1"]);
        assert_eq!(first.parameters.len(), second.parameters.len());
        assert_eq!(
            second.parameters["sysctl.vm.swappiness"].original,
            "60",
            "re-apply must not overwrite the saved original"
        );
    }

    #[test]
    fn test_shared_ownership_revert_order() {
        let fx = fixture();
        fx.app.tune_note("N1").unwrap();
        fx.app.tune_note("N2").unwrap();
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "20");

        // N2 still owns swappiness, so reverting N1 must not touch it
        fx.app.revert_note("N1", true).unwrap();
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "20");

        fx.app.revert_note("N2", true).unwrap();
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "60");
        assert_eq!(live(&fx, "sysctl.kernel.shmmax"), "1000");
    }

    #[test]
    fn test_solution_absorbs_standalone_note() {
        let fx = fixture();
        fx.app.tune_note("N1").unwrap();
        let before = fx.app.state_snapshot().unwrap();
        assert_eq!(before.parameters["sysctl.vm.swappiness"].original, "60");

        let absorbed = fx.app.tune_solution("S1").unwrap();
        assert_eq!(absorbed, vec!["N1"]);

        let state = fx.app.state_snapshot().unwrap();
        assert!(state.active_notes.is_empty());
        assert_eq!(state.active_solutions, vec!["S1"]);
        // Ownership transferred, not duplicated: the original survives
        assert_eq!(state.parameters["sysctl.vm.swappiness"].original, "60");
        // Both constituents applied, N2 wins the override
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "20");
        assert_eq!(live(&fx, "sysctl.kernel.shmmax"), "5000");
    }

    #[test]
    fn test_applying_covered_note_does_not_reenter_standalone_list() {
        let fx = fixture();
        fx.app.tune_solution("S1").unwrap();
        fx.app.tune_note("N1").unwrap();
        let state = fx.app.state_snapshot().unwrap();
        assert!(state.active_notes.is_empty());
    }

    #[test]
    fn test_solution_round_trip() {
        let fx = fixture();
        fx.app.tune_solution("S1").unwrap();
        fx.app.revert_solution("S1").unwrap();

        let state = fx.app.state_snapshot().unwrap();
        assert!(state.active_solutions.is_empty());
        assert!(state.parameters.is_empty());
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "60");
        assert_eq!(live(&fx, "sysctl.kernel.shmmax"), "1000");
    }

    #[test]
    fn test_overlapping_solutions_keep_shared_note() {
        let fx = fixture();
        fx.app.tune_solution("S1").unwrap();
        fx.app.tune_solution("S2").unwrap();

        // N2 is still required by S2; only N1 may be reverted
        fx.app.revert_solution("S1").unwrap();
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "20");
        assert_eq!(live(&fx, "sysctl.kernel.shmmax"), "5000");

        fx.app.revert_solution("S2").unwrap();
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "60");
        assert_eq!(live(&fx, "sysctl.kernel.shmmax"), "1000");
    }

    #[test]
    fn test_revert_solution_keeps_standalone_note() {
        let fx = fixture();
        fx.app.tune_note("N2").unwrap();
        fx.app.tune_solution("S1").unwrap(); // absorbs N2
        fx.app.revert_solution("S1").unwrap();
        // Absorption moved N2 under S1, so reverting S1 reverts it too
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "60");

        // But a note applied standalone after the solution stays applied
        fx.app.tune_solution("S2").unwrap();
        fx.app.tune_note("N1").unwrap();
        fx.app.revert_solution("S2").unwrap();
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "10");
        fx.app.revert_note("N1", true).unwrap();
    }

    #[test]
    fn test_revert_errors() {
        let fx = fixture();
        assert!(matches!(
            fx.app.revert_note("N1", true),
            Err(TuneError::NotActive(_))
        ));
        assert!(matches!(
            fx.app.revert_solution("S1"),
            Err(TuneError::NotActive(_))
        ));
        assert!(matches!(
            fx.app.tune_note("MISSING"),
            Err(TuneError::NotFound(_))
        ));
        assert!(matches!(
            fx.app.tune_solution("OTHER"),
            Err(TuneError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_partial_failure_keeps_applied_parameters() {
        let fx = fixture();
        let err = fx.app.tune_note("BAD").unwrap_err();
        assert!(matches!(err, TuneError::Write { .. }));

        // The note stays registered so a later revert can clean up
        let state = fx.app.state_snapshot().unwrap();
        assert_eq!(state.active_notes, vec!["BAD"]);
        assert!(state.parameters.contains_key("sysctl.kernel.locked"));
    }

    #[test]
    fn test_tune_all_reapplies_after_drift() {
        let fx = fixture();
        fx.app.tune_note("1001").unwrap();
        fx.app.tune_solution("S1").unwrap();

        // Simulate a reboot: live values drift back, state survives
        fx.system
            .lock()
            .unwrap()
            .insert("cpu.scaling_governor".to_string(), "powersave".to_string());
        fx.system
            .lock()
            .unwrap()
            .insert("sysctl.vm.swappiness".to_string(), "60".to_string());

        fx.app.tune_all().unwrap();
        assert_eq!(live(&fx, "cpu.scaling_governor"), "performance");
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "20");

        // No duplicate saves: originals are from the very first apply
        let state = fx.app.state_snapshot().unwrap();
        assert_eq!(
            state.parameters["cpu.scaling_governor"].original,
            "powersave"
        );
        assert_eq!(state.parameters["sysctl.vm.swappiness"].original, "60");
    }

    #[test]
    fn test_tune_all_collects_failures_and_continues() {
        let fx = fixture();
        // BAD fails on apply but is still recorded as active
        let _ = fx.app.tune_note("BAD");
        fx.app.tune_note("N1").unwrap();

        fx.system
            .lock()
            .unwrap()
            .insert("sysctl.vm.swappiness".to_string(), "60".to_string());

        let err = fx.app.tune_all().unwrap_err();
        assert!(matches!(err, TuneError::Write { .. }));
        // The failing note did not stop the rest
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "10");
    }

    #[test]
    fn test_revert_all_keep_state_then_reapply() {
        let fx = fixture();
        fx.app.tune_note("1001").unwrap();
        fx.app.tune_solution("S1").unwrap();

        fx.app.revert_all(false).unwrap();
        assert_eq!(live(&fx, "cpu.scaling_governor"), "powersave");
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "60");
        let state = fx.app.state_snapshot().unwrap();
        assert_eq!(state.active_notes, vec!["1001"]);
        assert_eq!(state.active_solutions, vec!["S1"]);
        assert!(state.parameters.is_empty());

        // The daemon's post-reboot apply restores everything
        fx.app.tune_all().unwrap();
        assert_eq!(live(&fx, "cpu.scaling_governor"), "performance");
        assert_eq!(live(&fx, "sysctl.vm.swappiness"), "20");

        fx.app.revert_all(true).unwrap();
        let state = fx.app.state_snapshot().unwrap();
        assert!(state.active_notes.is_empty());
        assert!(state.active_solutions.is_empty());
        assert!(state.parameters.is_empty());
    }

    #[test]
    fn test_verify_all_reports_nonconforming() {
        let fx = fixture();
        fx.app.tune_note("1001").unwrap();
        fx.app.tune_solution("S1").unwrap();

        let (unsatisfied, _) = fx.app.verify_all().unwrap();
        assert!(unsatisfied.is_empty());

        fx.system
            .lock()
            .unwrap()
            .insert("cpu.scaling_governor".to_string(), "schedutil".to_string());
        let (unsatisfied, comparisons) = fx.app.verify_all().unwrap();
        assert_eq!(unsatisfied, vec!["1001"]);
        assert!(!comparisons["1001"]["cpu.scaling_governor"].matches);
    }

    #[test]
    fn test_verify_solution_lists_unsatisfied_notes() {
        let fx = fixture();
        let (unsatisfied, comparisons) = fx.app.verify_solution("S1").unwrap();
        assert_eq!(unsatisfied, vec!["N1", "N2"]);
        assert_eq!(comparisons.len(), 2);

        fx.app.tune_solution("S1").unwrap();
        let (unsatisfied, _) = fx.app.verify_solution("S1").unwrap();
        // N1 expects swappiness 10 but N2's 20 won the override
        assert_eq!(unsatisfied, vec!["N1"]);
    }

    #[test]
    fn test_sorted_solution_enabled_notes() {
        let fx = fixture();
        assert!(fx.app.sorted_solution_enabled_notes().unwrap().is_empty());

        fx.app.tune_solution("S1").unwrap();
        fx.app.tune_note("1001").unwrap();
        let ids = fx.app.sorted_solution_enabled_notes().unwrap();
        // Only solution-derived ids, sorted and deduplicated
        assert_eq!(ids, vec!["N1", "N2"]);
    }

    proptest! {
        /// Applying the same note twice from any starting governor yields
        /// one saved original equal to that starting value.
        #[test]
        fn prop_reapply_never_resaves(initial in "[a-z]{1,12}") {
            let fx = fixture();
            fx.system
                .lock()
                .unwrap()
                .insert("cpu.scaling_governor".to_string(), initial.clone());

            fx.app.tune_note("1001").unwrap();
            fx.app.tune_note("1001").unwrap();

            let state = fx.app.state_snapshot().unwrap();
            prop_assert_eq!(state.active_notes.len(), 1);
            prop_assert_eq!(
                state.parameters["cpu.scaling_governor"].original.clone(),
                initial
            );
            prop_assert_eq!(live(&fx, "cpu.scaling_governor"), "performance".to_string());
        }
    }
}
