//! Skeleton store port — the in-memory half of the skeleton cache
//! (component C). The persisted-manifest half is handled directly by
//! `convocore-application::skeleton_cache` over [`super::StorageIo`]; this
//! port exists only so the concrete in-memory map can be swapped (a bounded
//! `moka` cache in production, a plain synchronous map in tests) without
//! the application layer depending on `convocore-providers`.

use async_trait::async_trait;

use crate::entities::ConversationSkeleton;
use crate::value_objects::TaskId;

/// In-memory `taskId -> ConversationSkeleton` store.
///
/// Implementations are not required to evict entries (the cache holds one
/// skeleton per task directory on disk, typically a few thousand at most),
/// but may choose to (a bounded `moka` cache is the production adapter).
#[async_trait]
pub trait SkeletonStore: Send + Sync {
    /// Inserts or replaces the skeleton for `task_id`.
    async fn insert(&self, skeleton: ConversationSkeleton);

    /// Looks up one skeleton by id.
    async fn get(&self, task_id: &TaskId) -> Option<ConversationSkeleton>;

    /// Removes a skeleton, if present.
    async fn remove(&self, task_id: &TaskId);

    /// Returns every skeleton currently held, in unspecified order.
    async fn all(&self) -> Vec<ConversationSkeleton>;

    /// Number of skeletons currently held.
    async fn len(&self) -> usize;

    /// Removes every skeleton. Used before a forced full rebuild.
    async fn clear(&self);
}
