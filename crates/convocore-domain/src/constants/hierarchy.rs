//! Hierarchy Reconstruction Engine tuning defaults.
//!
//! Overridable at startup via `HIERARCHY_MIN_PREFIX_LEN` and
//! `HIERARCHY_PROXIMITY_WINDOW_MS` (see [`crate::value_objects::config::CoreConfig`]).

/// Minimum matched-length for a tier-2 (`radix_tree_prefix`) match to be accepted.
pub const DEFAULT_MIN_PREFIX_LEN: usize = 32;

/// Default chronological proximity window for tier-3 fallback matching (10 minutes).
pub const DEFAULT_PROXIMITY_WINDOW_MS: i64 = 10 * 60 * 1000;

/// Clock-skew tolerance applied to every parent/child chronological constraint (1 second).
pub const CHRONOLOGICAL_TOLERANCE_MS: i64 = 1000;

/// Maximum code units a normalized instruction is clamped to before matching.
pub const NORMALIZE_MAX_LEN: usize = 200;

/// Lower bound of the confidence range for tier-2 prefix matches.
pub const PREFIX_CONFIDENCE_MIN: f64 = 0.5;

/// Upper bound of the confidence range for tier-2 prefix matches.
pub const PREFIX_CONFIDENCE_MAX: f64 = 0.95;

/// Fixed confidence assigned to tier-1 exact matches.
pub const EXACT_CONFIDENCE: f64 = 1.0;

/// Fixed confidence assigned to tier-3 chronological-proximity matches.
pub const PROXIMITY_CONFIDENCE: f64 = 0.3;

/// Upper bound on repeated cycle-breaking DFS passes before giving up
/// and surfacing an `invariant_violation`.
pub const MAX_CYCLE_BREAK_PASSES: usize = 64;
