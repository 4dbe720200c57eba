//! Hierarchy Reconstruction Engine (component D).
//!
//! Assigns `reconstructedParentId` to every skeleton whose parent is unset
//! or invalidated, by matching each skeleton's first instruction against
//! the normalized child-instruction prefixes every other skeleton recorded
//! while parsing. Two passes over the skeleton cache: index, then resolve.

mod radix_tree;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use convocore_domain::constants::hierarchy::{
    CHRONOLOGICAL_TOLERANCE_MS, DEFAULT_MIN_PREFIX_LEN, DEFAULT_PROXIMITY_WINDOW_MS,
    EXACT_CONFIDENCE, MAX_CYCLE_BREAK_PASSES, PREFIX_CONFIDENCE_MAX, PREFIX_CONFIDENCE_MIN,
    PROXIMITY_CONFIDENCE,
};
use convocore_domain::entities::{ConversationSkeleton, ParentResolutionMethod};
use convocore_domain::error::Result;
use convocore_domain::normalize;
use convocore_domain::value_objects::TaskId;
use tracing::{info, warn};

use crate::skeleton_cache::SkeletonCache;
use radix_tree::{ParentCandidate, RadixTree};

/// Statistics returned by [`HierarchyEngine::reconstruct`].
#[derive(Debug, Clone, Default)]
pub struct HierarchyStats {
    /// Skeletons resolved by an exact radix-tree match.
    pub exact_matches: usize,
    /// Skeletons resolved by a prefix radix-tree match.
    pub prefix_matches: usize,
    /// Skeletons resolved by chronological proximity fallback.
    pub proximity_matches: usize,
    /// Skeletons that remain unresolved after this pass.
    pub unresolved: usize,
    /// Edges dropped by cycle-breaking.
    pub cycles_broken: usize,
}

/// Tuning knobs, overridable from `CoreConfig` at startup.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyEngineConfig {
    /// Minimum matched length for a tier-2 match to be accepted.
    pub min_prefix_len: usize,
    /// Chronological proximity window for tier-3 fallback, in milliseconds.
    pub proximity_window_ms: i64,
}

impl Default for HierarchyEngineConfig {
    fn default() -> Self {
        Self {
            min_prefix_len: DEFAULT_MIN_PREFIX_LEN,
            proximity_window_ms: DEFAULT_PROXIMITY_WINDOW_MS,
        }
    }
}

/// Reconstructs the task hierarchy over a [`SkeletonCache`].
pub struct HierarchyEngine {
    config: HierarchyEngineConfig,
}

impl HierarchyEngine {
    /// Builds an engine with the given tuning.
    #[must_use]
    pub fn new(config: HierarchyEngineConfig) -> Self {
        Self { config }
    }

    /// Runs both passes over every skeleton in `cache`, writing back
    /// `reconstructedParentId`/confidence/method on every skeleton whose
    /// parent was not already host-declared (`metadata_direct` is terminal
    /// unless invalidated by the chronological constraint).
    ///
    /// # Errors
    ///
    /// Only surfaces an error if the cache itself cannot be read; a single
    /// unresolvable skeleton never fails the whole pass.
    pub async fn reconstruct(&self, cache: &SkeletonCache) -> Result<HierarchyStats> {
        let mut skeletons = cache.get_all().await;
        let mut stats = HierarchyStats::default();

        // Pass 1: index every child-instruction prefix into the radix tree.
        let mut tree = RadixTree::new();
        for parent in &skeletons {
            for prefix in &parent.child_task_instruction_prefixes {
                tree.insert(
                    prefix,
                    ParentCandidate {
                        parent_task_id: parent.task_id,
                        parent_created_at: parent.created_at,
                        parent_workspace: parent.workspace.clone(),
                    },
                );
            }
        }

        // Pass 2: resolve each skeleton lacking a trusted parent.
        let created_at_by_id: HashMap<TaskId, DateTime<Utc>> =
            skeletons.iter().map(|s| (s.task_id, s.created_at)).collect();
        for skeleton in &mut skeletons {
            if skeleton.parent_task_id.is_some() {
                if self.metadata_parent_is_valid(skeleton, &created_at_by_id) {
                    continue;
                }
                // The host-declared parent fails the chronological
                // constraint (or no longer exists in the cache); invalidate
                // it so the skeleton falls through to radix-tree/proximity
                // resolution instead of keeping a bad edge via
                // `effective_parent`'s metadata fallback.
                skeleton.parent_task_id = None;
                skeleton.parent_resolution_method = ParentResolutionMethod::Unresolved;
            }
            self.resolve_one(skeleton, &tree, &mut stats);
        }
        resolve_proximity(&self.config, &mut skeletons, &mut stats);

        let by_id: HashMap<TaskId, usize> = skeletons
            .iter()
            .enumerate()
            .map(|(i, s)| (s.task_id, i))
            .collect();
        stats.cycles_broken = break_cycles(&mut skeletons, &by_id);

        stats.unresolved = skeletons
            .iter()
            .filter(|s| s.effective_parent().is_none())
            .count();

        for skeleton in skeletons {
            cache.put(skeleton).await;
        }

        info!(
            exact = stats.exact_matches,
            prefix = stats.prefix_matches,
            proximity = stats.proximity_matches,
            unresolved = stats.unresolved,
            cycles_broken = stats.cycles_broken,
            "hierarchy reconstruction pass complete"
        );
        Ok(stats)
    }

    /// A host-declared `parentTaskId` is terminal unless it fails the same
    /// chronological hard constraint tiers 1-3 are held to: the named
    /// parent must exist in the cache and must not have been created after
    /// the child (1s clock-skew tolerance). `created_at_by_id` is built once
    /// per `reconstruct` call from the same snapshot Pass 2 iterates.
    fn metadata_parent_is_valid(
        &self,
        skeleton: &ConversationSkeleton,
        created_at_by_id: &HashMap<TaskId, DateTime<Utc>>,
    ) -> bool {
        let Some(parent_id) = skeleton.parent_task_id else {
            return true;
        };
        let Some(&parent_created_at) = created_at_by_id.get(&parent_id) else {
            return false;
        };
        let tolerance = chrono::Duration::milliseconds(CHRONOLOGICAL_TOLERANCE_MS);
        parent_created_at <= skeleton.created_at + tolerance
    }

    fn resolve_one(
        &self,
        skeleton: &mut ConversationSkeleton,
        tree: &RadixTree,
        stats: &mut HierarchyStats,
    ) {
        let key = normalize(&skeleton.truncated_instruction);
        if key.is_empty() {
            return;
        }

        if let Some(candidates) = tree.exact(&key) {
            if let Some(candidate) = self.pick_best(skeleton, candidates, key.chars().count()) {
                if workspaces_known_and_differ(skeleton, candidate) {
                    // Downgrade one tier: exact -> prefix, using the full key
                    // length as the matched length (it matched exactly).
                    self.apply_downgraded_prefix(skeleton, candidate, key.chars().count(), key.chars().count(), stats);
                } else {
                    skeleton.reconstructed_parent_id = Some(candidate.parent_task_id);
                    skeleton.parent_confidence_score = Some(EXACT_CONFIDENCE);
                    skeleton.parent_resolution_method = ParentResolutionMethod::RadixTreeExact;
                    stats.exact_matches += 1;
                }
                return;
            }
        }

        if let Some((matched_len, candidates)) = tree.longest_prefix_match(&key, self.config.min_prefix_len) {
            if let Some(candidate) = self.pick_best(skeleton, &candidates, matched_len) {
                if workspaces_known_and_differ(skeleton, candidate) {
                    // Downgrade one tier: prefix -> chronological proximity.
                    // Only the time constraint is re-checked; if it fails,
                    // the edge is rejected outright (left unresolved) rather
                    // than falling further.
                    self.apply_downgraded_proximity(skeleton, candidate, stats);
                } else {
                    let key_len = key.chars().count();
                    let denom = key_len.max(matched_len) as f64;
                    let confidence = (matched_len as f64 / denom).clamp(PREFIX_CONFIDENCE_MIN, PREFIX_CONFIDENCE_MAX);
                    skeleton.reconstructed_parent_id = Some(candidate.parent_task_id);
                    skeleton.parent_confidence_score = Some(confidence);
                    skeleton.parent_resolution_method = ParentResolutionMethod::RadixTreePrefix;
                    stats.prefix_matches += 1;
                }
                return;
            }
        }

        // Neither tier matched; tier 3 (chronological proximity) is applied
        // afterwards across the whole batch by `resolve_proximity`, since it
        // needs every skeleton as a candidate, not just radix-tree hits.
    }

    /// Applies a tier-1-to-tier-2 workspace downgrade: same confidence
    /// formula tier 2 would use, computed from the already-matched length.
    fn apply_downgraded_prefix(
        &self,
        skeleton: &mut ConversationSkeleton,
        candidate: &ParentCandidate,
        matched_len: usize,
        key_len: usize,
        stats: &mut HierarchyStats,
    ) {
        let denom = key_len.max(matched_len) as f64;
        let confidence = (matched_len as f64 / denom).clamp(PREFIX_CONFIDENCE_MIN, PREFIX_CONFIDENCE_MAX);
        skeleton.reconstructed_parent_id = Some(candidate.parent_task_id);
        skeleton.parent_confidence_score = Some(confidence);
        skeleton.parent_resolution_method = ParentResolutionMethod::RadixTreePrefix;
        stats.prefix_matches += 1;
    }

    /// Applies a tier-2-to-tier-3 workspace downgrade: the matched candidate
    /// is kept, but only accepted if it also clears the chronological
    /// proximity window; otherwise the edge is rejected and the skeleton
    /// stays unresolved (tier 3's ordinary same-workspace search, run
    /// afterwards, cannot rescue it either since the workspaces differ).
    fn apply_downgraded_proximity(
        &self,
        skeleton: &mut ConversationSkeleton,
        candidate: &ParentCandidate,
        stats: &mut HierarchyStats,
    ) {
        let window = chrono::Duration::milliseconds(self.config.proximity_window_ms);
        if skeleton.created_at - candidate.parent_created_at > window {
            return;
        }
        skeleton.reconstructed_parent_id = Some(candidate.parent_task_id);
        skeleton.parent_confidence_score = Some(PROXIMITY_CONFIDENCE);
        skeleton.parent_resolution_method = ParentResolutionMethod::ChronologicalProximity;
        stats.proximity_matches += 1;
    }

    fn pick_best<'a>(
        &self,
        child: &ConversationSkeleton,
        candidates: &'a [ParentCandidate],
        _matched_len: usize,
    ) -> Option<&'a ParentCandidate> {
        candidates
            .iter()
            .filter(|candidate| self.satisfies_hard_constraints(child, candidate))
            .min_by(|a, b| self.tie_break(child, a, b))
    }

    fn satisfies_hard_constraints(&self, child: &ConversationSkeleton, candidate: &ParentCandidate) -> bool {
        if candidate.parent_task_id == child.task_id {
            return false;
        }
        let tolerance = chrono::Duration::milliseconds(CHRONOLOGICAL_TOLERANCE_MS);
        candidate.parent_created_at <= child.created_at + tolerance
    }

    fn tie_break(
        &self,
        child: &ConversationSkeleton,
        a: &ParentCandidate,
        b: &ParentCandidate,
    ) -> std::cmp::Ordering {
        let a_same_ws = workspace_matches(child, a);
        let b_same_ws = workspace_matches(child, b);
        b_same_ws.cmp(&a_same_ws).then_with(|| {
            let a_delta = (child.created_at - a.parent_created_at).num_milliseconds().abs();
            let b_delta = (child.created_at - b.parent_created_at).num_milliseconds().abs();
            a_delta.cmp(&b_delta)
        }).then_with(|| a.parent_task_id.cmp(&b.parent_task_id))
    }
}

fn workspace_matches(child: &ConversationSkeleton, candidate: &ParentCandidate) -> bool {
    match (&child.workspace, &candidate.parent_workspace) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// True when both sides have a known workspace and it differs — the
/// condition that triggers a one-tier match downgrade per spec.
fn workspaces_known_and_differ(child: &ConversationSkeleton, candidate: &ParentCandidate) -> bool {
    match (&child.workspace, &candidate.parent_workspace) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

/// Resolves tier 3 (chronological proximity) for every skeleton still
/// unresolved after tiers 1 and 2, given the full candidate pool. Kept
/// separate from [`HierarchyEngine::resolve_one`] since it needs every
/// other skeleton as a candidate set, not just radix-tree hits.
fn resolve_proximity(
    config: &HierarchyEngineConfig,
    skeletons: &mut [ConversationSkeleton],
    stats: &mut HierarchyStats,
) {
    let roots: Vec<(TaskId, DateTime<Utc>, Option<String>)> = skeletons
        .iter()
        .map(|s| (s.task_id, s.created_at, s.workspace.clone()))
        .collect();

    for skeleton in skeletons.iter_mut() {
        if skeleton.effective_parent().is_some() {
            continue;
        }
        let window = chrono::Duration::milliseconds(config.proximity_window_ms);
        let best = roots
            .iter()
            .filter(|(task_id, created_at, workspace)| {
                *task_id != skeleton.task_id
                    && *workspace == skeleton.workspace
                    && skeleton.workspace.is_some()
                    && *created_at <= skeleton.created_at
                    && skeleton.created_at - *created_at <= window
            })
            .max_by_key(|(_, created_at, _)| *created_at);

        if let Some((parent_id, _, _)) = best {
            skeleton.reconstructed_parent_id = Some(*parent_id);
            skeleton.parent_confidence_score = Some(PROXIMITY_CONFIDENCE);
            skeleton.parent_resolution_method = ParentResolutionMethod::ChronologicalProximity;
            stats.proximity_matches += 1;
        }
    }
}

/// Breaks cycles in the proposed parent graph by repeated DFS to a fixed
/// point. On each cycle found, drops the lowest-confidence edge on it
/// (ties broken by largest `createdAt`), clearing that skeleton back to
/// `unresolved`. Bounded by `MAX_CYCLE_BREAK_PASSES`; surfaces a warning
/// (not an error) if the bound is hit, since a remaining cycle just leaves
/// some skeletons unresolved rather than corrupting state.
fn break_cycles(skeletons: &mut [ConversationSkeleton], by_id: &HashMap<TaskId, usize>) -> usize {
    let mut broken = 0;
    for _ in 0..MAX_CYCLE_BREAK_PASSES {
        let Some(cycle) = find_cycle(skeletons, by_id) else {
            return broken;
        };
        let Some(&worst_idx) = cycle
            .iter()
            .min_by(|&&a, &&b| {
                let conf_a = skeletons[a].parent_confidence_score.unwrap_or(0.0);
                let conf_b = skeletons[b].parent_confidence_score.unwrap_or(0.0);
                conf_a
                    .partial_cmp(&conf_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| skeletons[b].created_at.cmp(&skeletons[a].created_at))
            })
            .as_ref()
        else {
            return broken;
        };
        skeletons[worst_idx].clear_reconstructed_parent();
        broken += 1;
    }
    warn!("cycle-breaking did not reach a fixed point within the configured pass budget");
    broken
}

/// Finds one cycle in the proposed parent graph, if any, returning the
/// indices of the skeletons on it.
fn find_cycle(skeletons: &[ConversationSkeleton], by_id: &HashMap<TaskId, usize>) -> Option<Vec<usize>> {
    let mut visited = vec![0u8; skeletons.len()]; // 0=unvisited, 1=in-progress, 2=done
    for start in 0..skeletons.len() {
        if visited[start] != 0 {
            continue;
        }
        let mut path = Vec::new();
        let mut current = start;
        loop {
            if visited[current] == 2 {
                break;
            }
            if visited[current] == 1 {
                let cycle_start = path.iter().position(|&i| i == current).unwrap_or(0);
                return Some(path[cycle_start..].to_vec());
            }
            visited[current] = 1;
            path.push(current);
            let Some(parent_id) = skeletons[current].effective_parent() else {
                break;
            };
            let Some(&next) = by_id.get(parent_id) else {
                break;
            };
            current = next;
        }
        for &i in &path {
            visited[i] = 2;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use convocore_providers::cache::InMemorySkeletonStore;
    use convocore_providers::fs::InMemoryStorageIo;
    use std::path::PathBuf;
    use std::sync::Arc;

    async fn new_cache() -> SkeletonCache {
        SkeletonCache::new(
            Arc::new(InMemorySkeletonStore::new()),
            Arc::new(InMemoryStorageIo::new()),
            PathBuf::from("/cache.json"),
            vec![],
        )
    }

    fn skeleton(
        task_id: TaskId,
        instruction: &str,
        prefixes: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> ConversationSkeleton {
        ConversationSkeleton {
            task_id,
            parent_task_id: None,
            reconstructed_parent_id: None,
            parent_confidence_score: None,
            parent_resolution_method: ParentResolutionMethod::Unresolved,
            workspace: Some("/repo".to_owned()),
            created_at,
            last_activity: created_at,
            message_count: 1,
            total_size: 0,
            modes: Default::default(),
            summary: instruction.to_owned(),
            file_path: String::new(),
            truncated_instruction: instruction.to_owned(),
            child_task_instruction_prefixes: prefixes,
            data_source: "test".to_owned(),
            content_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn exact_match_resolves_with_full_confidence() {
        let cache = new_cache().await;
        let parent_id = TaskId::new();
        let child_id = TaskId::new();
        let t0 = Utc::now();

        cache
            .put(skeleton(
                parent_id,
                "parent instruction",
                vec![normalize("fix the bug in auth")],
                t0,
            ))
            .await;
        cache
            .put(skeleton(
                child_id,
                "fix the bug in auth",
                vec![],
                t0 + chrono::Duration::seconds(5),
            ))
            .await;

        let engine = HierarchyEngine::new(HierarchyEngineConfig::default());
        let stats = engine.reconstruct(&cache).await.unwrap();
        assert_eq!(stats.exact_matches, 1);

        let resolved = cache.get_by_id(&child_id).await.unwrap();
        assert_eq!(resolved.reconstructed_parent_id, Some(parent_id));
        assert_eq!(resolved.parent_resolution_method, ParentResolutionMethod::RadixTreeExact);
    }

    #[tokio::test]
    async fn parent_created_after_child_is_rejected() {
        let cache = new_cache().await;
        let parent_id = TaskId::new();
        let child_id = TaskId::new();
        let t0 = Utc::now();

        cache
            .put(skeleton(
                parent_id,
                "parent",
                vec![normalize("do the thing")],
                t0 + chrono::Duration::hours(1),
            ))
            .await;
        cache
            .put(skeleton(child_id, "do the thing", vec![], t0))
            .await;

        let engine = HierarchyEngine::new(HierarchyEngineConfig::default());
        engine.reconstruct(&cache).await.unwrap();

        let resolved = cache.get_by_id(&child_id).await.unwrap();
        assert!(resolved.reconstructed_parent_id.is_none());
    }

    #[tokio::test]
    async fn differing_workspace_downgrades_exact_to_prefix() {
        let cache = new_cache().await;
        let parent_id = TaskId::new();
        let child_id = TaskId::new();
        let t0 = Utc::now();

        let mut parent = skeleton(
            parent_id,
            "parent instruction",
            vec![normalize("fix the bug in auth")],
            t0,
        );
        parent.workspace = Some("/repo-a".to_owned());
        cache.put(parent).await;

        let mut child = skeleton(
            child_id,
            "fix the bug in auth",
            vec![],
            t0 + chrono::Duration::seconds(5),
        );
        child.workspace = Some("/repo-b".to_owned());
        cache.put(child).await;

        let engine = HierarchyEngine::new(HierarchyEngineConfig::default());
        let stats = engine.reconstruct(&cache).await.unwrap();
        assert_eq!(stats.exact_matches, 0);
        assert_eq!(stats.prefix_matches, 1);

        let resolved = cache.get_by_id(&child_id).await.unwrap();
        assert_eq!(resolved.reconstructed_parent_id, Some(parent_id));
        assert_eq!(resolved.parent_resolution_method, ParentResolutionMethod::RadixTreePrefix);
    }

    #[tokio::test]
    async fn no_match_leaves_skeleton_unresolved() {
        let cache = new_cache().await;
        cache
            .put(skeleton(TaskId::new(), "nothing matches this", vec![], Utc::now()))
            .await;

        let engine = HierarchyEngine::new(HierarchyEngineConfig::default());
        let stats = engine.reconstruct(&cache).await.unwrap();
        assert_eq!(stats.unresolved, 1);
    }

    #[tokio::test]
    async fn metadata_parent_created_after_child_is_invalidated_and_re_resolved() {
        let cache = new_cache().await;
        let bad_metadata_parent = TaskId::new();
        let real_parent_id = TaskId::new();
        let child_id = TaskId::new();
        let t0 = Utc::now();

        // The host declared `bad_metadata_parent`, but it was created after
        // the child - it must be invalidated and fall through to tier-1
        // resolution, landing on `real_parent_id` instead.
        cache
            .put(skeleton(
                bad_metadata_parent,
                "unrelated",
                vec![],
                t0 + chrono::Duration::hours(1),
            ))
            .await;
        cache
            .put(skeleton(
                real_parent_id,
                "real parent",
                vec![normalize("fix the bug in auth")],
                t0,
            ))
            .await;
        let mut child = skeleton(
            child_id,
            "fix the bug in auth",
            vec![],
            t0 + chrono::Duration::seconds(5),
        );
        child.parent_task_id = Some(bad_metadata_parent);
        child.parent_resolution_method = ParentResolutionMethod::MetadataDirect;
        cache.put(child).await;

        let engine = HierarchyEngine::new(HierarchyEngineConfig::default());
        engine.reconstruct(&cache).await.unwrap();

        let resolved = cache.get_by_id(&child_id).await.unwrap();
        assert!(resolved.parent_task_id.is_none());
        assert_eq!(resolved.reconstructed_parent_id, Some(real_parent_id));
        assert_eq!(resolved.parent_resolution_method, ParentResolutionMethod::RadixTreeExact);
    }

    #[tokio::test]
    async fn metadata_parent_within_tolerance_stays_terminal() {
        let cache = new_cache().await;
        let parent_id = TaskId::new();
        let child_id = TaskId::new();
        let t0 = Utc::now();

        cache.put(skeleton(parent_id, "parent", vec![], t0)).await;
        let mut child = skeleton(child_id, "child", vec![], t0);
        child.parent_task_id = Some(parent_id);
        child.parent_resolution_method = ParentResolutionMethod::MetadataDirect;
        cache.put(child).await;

        let engine = HierarchyEngine::new(HierarchyEngineConfig::default());
        engine.reconstruct(&cache).await.unwrap();

        let resolved = cache.get_by_id(&child_id).await.unwrap();
        assert_eq!(resolved.parent_task_id, Some(parent_id));
        assert_eq!(resolved.parent_resolution_method, ParentResolutionMethod::MetadataDirect);
    }
}
