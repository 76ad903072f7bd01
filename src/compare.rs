//! Parameter comparator
//!
//! Produces a field-by-field comparison of a note's expected values
//! against the live system. Strictly read-only: an unreadable parameter
//! is reported as non-matching with a diagnostic instead of aborting the
//! whole comparison.

use crate::catalog::Note;
use crate::params::read_with_timeout;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Expected/observed pair for one parameter of one note. Ephemeral,
/// produced fresh on every verify or simulate call.
#[derive(Debug, Clone, Serialize)]
pub struct NoteFieldComparison {
    /// Value the note expects
    pub expected: String,
    /// Value observed on the live system, or a read diagnostic
    pub actual: String,
    /// Whether observed matches expected
    pub matches: bool,
}

/// Per-parameter comparison results of a single note
pub type NoteComparison = BTreeMap<String, NoteFieldComparison>;

/// Compare every parameter of a note against the live system.
///
/// Each read is bounded by `read_timeout` so one stuck knob cannot hang
/// the comparison.
pub fn compare_note(note: &Note, read_timeout: Duration) -> NoteComparison {
    let mut comparisons = BTreeMap::new();
    for param in &note.parameters {
        let expected = param.expected().to_string();
        let comparison = match read_with_timeout(param, read_timeout) {
            Ok(actual) => {
                let matches = actual == expected;
                NoteFieldComparison {
                    expected,
                    actual,
                    matches,
                }
            }
            Err(e) => NoteFieldComparison {
                expected,
                actual: format!("(unreadable: {e})"),
                matches: false,
            },
        };
        comparisons.insert(param.key().to_string(), comparison);
    }
    comparisons
}

/// Whether every field of a comparison matched
pub fn conforms(comparison: &NoteComparison) -> bool {
    comparison.values().all(|c| c.matches)
}
