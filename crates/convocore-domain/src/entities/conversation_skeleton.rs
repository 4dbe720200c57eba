//! The conversation skeleton entity.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::ids::TaskId;

/// How a skeleton's effective parent was determined.
///
/// Ordered roughly by descending trust; `Unresolved` means no parent could
/// be determined and the skeleton is a root (or an orphan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentResolutionMethod {
    /// The host's own task metadata named the parent directly.
    MetadataDirect,
    /// An exact radix-tree match on a normalized instruction prefix.
    RadixTreeExact,
    /// A radix-tree match on a prefix shorter than the full instruction.
    RadixTreePrefix,
    /// No textual match; fell back to nearest-in-time same-workspace root.
    ChronologicalProximity,
    /// No parent could be determined.
    Unresolved,
}

impl Default for ParentResolutionMethod {
    fn default() -> Self {
        Self::Unresolved
    }
}

/// One per task directory. The central record the whole core revolves
/// around: produced by the conversation parser, enriched in place by the
/// hierarchy engine (parent fields only) and by the vector indexer
/// (indexing-state side-channel, tracked out-of-band, never on this type).
///
/// Every other component receives `&ConversationSkeleton` or
/// `&mut ConversationSkeleton` and must only mutate the fields explicitly
/// delegated to it; see the cache's ownership note for the authoritative
/// list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSkeleton {
    /// Globally unique, opaque. Conventionally a UUID minted by the host
    /// extension, not by this crate.
    pub task_id: TaskId,
    /// Parent declared by the host's own metadata, if any.
    pub parent_task_id: Option<TaskId>,
    /// Parent inferred by the hierarchy engine; preferred over
    /// `parent_task_id` when present.
    pub reconstructed_parent_id: Option<TaskId>,
    /// Confidence in `reconstructed_parent_id`, in `[0, 1]`. Unset until the
    /// hierarchy engine runs.
    pub parent_confidence_score: Option<f64>,
    /// How `reconstructed_parent_id` was determined.
    pub parent_resolution_method: ParentResolutionMethod,
    /// Normalized absolute path to the project the task ran in, or `None`
    /// if it could not be determined.
    pub workspace: Option<String>,
    /// Earliest message or metadata timestamp found while parsing.
    pub created_at: DateTime<Utc>,
    /// Latest message or metadata timestamp found while parsing.
    pub last_activity: DateTime<Utc>,
    /// Number of messages parsed.
    pub message_count: u64,
    /// Total size, in bytes, of parsed message payloads.
    pub total_size: u64,
    /// The set of "modes" this task used, if the host records them.
    pub modes: BTreeSet<String>,
    /// Short, truncated summary.
    pub summary: String,
    /// Absolute path to the task directory this skeleton was parsed from.
    pub file_path: String,
    /// The first user-visible instruction, trimmed and length-bounded. The
    /// key used for parent matching.
    pub truncated_instruction: String,
    /// Normalized prefixes of every sub-task launch instruction this task
    /// issued to children. Populated only by pass 1 of the hierarchy
    /// engine; empty until then.
    pub child_task_instruction_prefixes: Vec<String>,
    /// Path or stable identifier of origin, for auditability.
    pub data_source: String,
    /// Stable hash of the concatenated, normalized message payloads. Drives
    /// the indexing decision service's idempotence gate.
    pub content_hash: String,
}

impl ConversationSkeleton {
    /// The effective parent: `reconstructed_parent_id` if set, else
    /// `parent_task_id`. Callers must treat the two fields symmetrically
    /// outside of audit/telemetry contexts; this is the one place that
    /// encodes the precedence.
    #[must_use]
    pub fn effective_parent(&self) -> Option<&TaskId> {
        self.reconstructed_parent_id
            .as_ref()
            .or(self.parent_task_id.as_ref())
    }

    /// Clears the reconstructed parent and resets the resolution method to
    /// `Unresolved`. Used when an invariant check (chronological ordering,
    /// cycle breaking) rejects a previously assigned parent.
    pub fn clear_reconstructed_parent(&mut self) {
        self.reconstructed_parent_id = None;
        self.parent_confidence_score = None;
        self.parent_resolution_method = ParentResolutionMethod::Unresolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skeleton(task_id: TaskId, parent: Option<TaskId>) -> ConversationSkeleton {
        let now = Utc::now();
        ConversationSkeleton {
            task_id,
            parent_task_id: parent,
            reconstructed_parent_id: None,
            parent_confidence_score: None,
            parent_resolution_method: ParentResolutionMethod::Unresolved,
            workspace: None,
            created_at: now,
            last_activity: now,
            message_count: 0,
            total_size: 0,
            modes: BTreeSet::new(),
            summary: String::new(),
            file_path: String::new(),
            truncated_instruction: String::new(),
            child_task_instruction_prefixes: Vec::new(),
            data_source: String::new(),
            content_hash: String::new(),
        }
    }

    #[test]
    fn effective_parent_prefers_reconstructed() {
        let metadata_parent = TaskId::new();
        let reconstructed_parent = TaskId::new();
        let mut s = skeleton(TaskId::new(), Some(metadata_parent));
        assert_eq!(s.effective_parent(), Some(&metadata_parent));

        s.reconstructed_parent_id = Some(reconstructed_parent);
        assert_eq!(s.effective_parent(), Some(&reconstructed_parent));
    }

    #[test]
    fn clear_reconstructed_parent_resets_method() {
        let mut s = skeleton(TaskId::new(), None);
        s.reconstructed_parent_id = Some(TaskId::new());
        s.parent_confidence_score = Some(0.9);
        s.parent_resolution_method = ParentResolutionMethod::RadixTreeExact;

        s.clear_reconstructed_parent();

        assert!(s.reconstructed_parent_id.is_none());
        assert!(s.parent_confidence_score.is_none());
        assert_eq!(
            s.parent_resolution_method,
            ParentResolutionMethod::Unresolved
        );
    }
}
