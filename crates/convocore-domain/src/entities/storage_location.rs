//! Storage root location, as reported by the Storage Locator (component A).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One candidate root the storage locator probed, and what it found there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageLocation {
    /// Absolute path to the candidate root.
    pub path: String,
    /// Whether this root contains a `tasks/` sub-directory (and is
    /// therefore a real host-extension storage root, not just a
    /// configured candidate that doesn't exist on this machine).
    pub is_active: bool,
    /// Number of task directories found under `tasks/`.
    pub conversation_count: usize,
    /// Total size, in bytes, of every file under `tasks/`.
    pub total_size: u64,
    /// When this root was last probed.
    pub detected_at: DateTime<Utc>,
}

/// Aggregate storage statistics across every active root, returned by
/// `get_storage_stats`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageStats {
    /// Every candidate root probed, active or not.
    pub locations: Vec<StorageLocation>,
    /// Sum of `conversation_count` across all active locations.
    pub total_conversations: usize,
    /// Sum of `total_size` across all active locations.
    pub total_size: u64,
    /// Number of skeletons currently in the cache with a degraded parse
    /// (a parse error recovered locally rather than surfaced).
    pub degraded_skeleton_count: usize,
}
