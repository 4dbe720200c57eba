//!
//! Core business entities with identity.

/// The conversation skeleton entity and its parent-resolution metadata.
pub mod conversation_skeleton;
/// Storage root location and aggregate storage statistics.
pub mod storage_location;

pub use conversation_skeleton::{ConversationSkeleton, ParentResolutionMethod};
pub use storage_location::{StorageLocation, StorageStats};
