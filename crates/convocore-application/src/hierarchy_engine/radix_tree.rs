//! A compressed trie (PATRICIA-style radix tree) over normalized
//! instruction prefixes, from scratch: this is the core algorithmic
//! surface of hierarchy reconstruction, so it gets its own node/edge
//! structure and direct unit tests rather than being built on a generic
//! string-keyed map.
//!
//! Edges are labeled by (possibly multi-character) string spans so that a
//! long chain of single-child nodes collapses to one edge, same as a
//! textbook radix tree. Every normalized key from the corpus can end up
//! inserted here, so keeping nodes compressed matters once the instruction
//! set shares long common stems (it reliably does, in practice: "fix the
//! bug in...", "add support for...").

use chrono::{DateTime, Utc};
use convocore_domain::value_objects::TaskId;

/// One task that named `key` as (a normalized prefix of) a sub-task
/// instruction it launched.
#[derive(Debug, Clone)]
pub struct ParentCandidate {
    pub parent_task_id: TaskId,
    pub parent_created_at: DateTime<Utc>,
    pub parent_workspace: Option<String>,
}

struct Node {
    children: Vec<(String, Box<Node>)>,
    payloads: Vec<ParentCandidate>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: Vec::new(),
            payloads: Vec::new(),
        }
    }

    fn insert(&mut self, key: &str, payload: ParentCandidate) {
        if key.is_empty() {
            self.payloads.push(payload);
            return;
        }

        for idx in 0..self.children.len() {
            let cp = common_prefix_len(&self.children[idx].0, key);
            if cp == 0 {
                continue;
            }
            let edge_len = self.children[idx].0.chars().count();
            let key_len = key.chars().count();

            if cp == edge_len {
                self.children[idx].1.insert(char_suffix(key, cp), payload);
                return;
            }

            // Split the existing edge at `cp`.
            let (old_edge, old_child) = self.children.remove(idx);
            let common = char_prefix(&old_edge, cp).to_owned();
            let mut mid = Node::new();
            mid.children.push((char_suffix(&old_edge, cp).to_owned(), old_child));
            if cp == key_len {
                mid.payloads.push(payload);
            } else {
                let mut leaf = Node::new();
                leaf.payloads.push(payload);
                mid.children.push((char_suffix(key, cp).to_owned(), Box::new(leaf)));
            }
            self.children.insert(idx, (common, Box::new(mid)));
            return;
        }

        let mut leaf = Node::new();
        leaf.payloads.push(payload);
        self.children.push((key.to_owned(), Box::new(leaf)));
    }

    /// Walks `key` down the trie. Returns the node reached and how many
    /// characters of `key` were consumed when the walk stopped (either
    /// because `key` was exhausted, or because no edge continued to match).
    fn walk<'a>(&'a self, key: &str) -> (&'a Node, usize) {
        if key.is_empty() {
            return (self, 0);
        }
        for (edge, child) in &self.children {
            let cp = common_prefix_len(edge, key);
            if cp == 0 {
                continue;
            }
            let edge_len = edge.chars().count();
            if cp == edge_len {
                let (node, consumed) = child.walk(char_suffix(key, cp));
                return (node, cp + consumed);
            }
            // Partial edge match: key diverges mid-edge, or key is
            // exhausted before the edge ends.
            return (child, cp);
        }
        (self, 0)
    }

    /// The longest full key reachable from this node (inclusive of this
    /// node's own payloads), and the payloads at that key.
    fn longest_in_subtree(&self, depth_here: usize) -> Option<(usize, &[ParentCandidate])> {
        let mut best: Option<(usize, &[ParentCandidate])> = if self.payloads.is_empty() {
            None
        } else {
            Some((depth_here, &self.payloads))
        };
        for (edge, child) in &self.children {
            let child_depth = depth_here + edge.chars().count();
            if let Some(candidate) = child.longest_in_subtree(child_depth)
                && best.is_none_or(|(len, _)| candidate.0 > len)
            {
                best = Some(candidate);
            }
        }
        best
    }

    /// Walks `key` down the trie, recording the deepest node passed whose
    /// own (non-empty) payloads terminate a full existing key that `key`
    /// properly extends. Used for the "existing key is a prefix of the
    /// query" direction of tier 2.
    fn deepest_terminal_prefix_of<'a>(&'a self, key: &str) -> Option<(usize, &'a [ParentCandidate])> {
        let mut node = self;
        let mut consumed = 0usize;
        let mut best = None;
        let key_len = key.chars().count();

        loop {
            if !node.payloads.is_empty() && consumed > 0 {
                best = Some((consumed, node.payloads.as_slice()));
            }
            if consumed >= key_len {
                break;
            }
            let remaining = char_suffix(key, consumed);
            let Some((edge, child)) = node
                .children
                .iter()
                .find(|(edge, _)| common_prefix_len(edge, remaining) > 0)
            else {
                break;
            };
            let cp = common_prefix_len(edge, remaining);
            if cp < edge.chars().count() {
                break;
            }
            consumed += cp;
            node = child;
        }
        best
    }
}

/// A from-scratch compressed trie indexing normalized instruction prefixes
/// to the tasks that issued them.
pub struct RadixTree {
    root: Node,
}

impl RadixTree {
    #[must_use]
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    pub fn insert(&mut self, key: &str, payload: ParentCandidate) {
        self.root.insert(key, payload);
    }

    /// Tier 1: an exact match on the full normalized key.
    #[must_use]
    pub fn exact(&self, key: &str) -> Option<&[ParentCandidate]> {
        let (node, consumed) = self.root.walk(key);
        if consumed == key.chars().count() && !node.payloads.is_empty() {
            Some(&node.payloads)
        } else {
            None
        }
    }

    /// Tier 2: either the longest existing key of which `key` is a prefix
    /// (preferred, since it matches the query's full length), or, failing
    /// that, the longest existing key that is itself a prefix of `key`.
    /// Returns `None` if nothing clears `min_matched_len`.
    #[must_use]
    pub fn longest_prefix_match(
        &self,
        key: &str,
        min_matched_len: usize,
    ) -> Option<(usize, Vec<ParentCandidate>)> {
        let key_len = key.chars().count();
        if key_len == 0 {
            return None;
        }

        // Direction A: `key` is a prefix of some longer existing key
        // reachable below where the walk stops. Always yields
        // effective_matched == key_len, the maximum possible, so it wins
        // whenever both directions have a candidate.
        let (node, consumed) = self.root.walk(key);
        if consumed == key_len
            && let Some((_, payloads)) = node.longest_in_subtree(consumed)
        {
            if key_len >= min_matched_len {
                return Some((key_len, payloads.to_vec()));
            }
            return None;
        }

        // Direction B: an existing (shorter) key that `key` fully extends.
        let (matched_len, payloads) = self.root.deepest_terminal_prefix_of(key)?;
        if matched_len < min_matched_len {
            return None;
        }
        Some((matched_len, payloads.to_vec()))
    }
}

impl Default for RadixTree {
    fn default() -> Self {
        Self::new()
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn char_suffix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(task_id: TaskId) -> ParentCandidate {
        ParentCandidate {
            parent_task_id: task_id,
            parent_created_at: Utc::now(),
            parent_workspace: None,
        }
    }

    #[test]
    fn exact_match_finds_inserted_key() {
        let mut tree = RadixTree::new();
        let task_id = TaskId::new();
        tree.insert("fix the bug in auth", candidate(task_id));

        let hits = tree.exact("fix the bug in auth").unwrap();
        assert_eq!(hits[0].parent_task_id, task_id);
        assert!(tree.exact("fix the bug in aut").is_none());
    }

    #[test]
    fn shared_prefixes_compress_into_one_edge_chain() {
        let mut tree = RadixTree::new();
        tree.insert("fix the bug in auth", candidate(TaskId::new()));
        tree.insert("fix the bug in cache", candidate(TaskId::new()));
        tree.insert("fix the typo in docs", candidate(TaskId::new()));

        assert!(tree.exact("fix the bug in auth").is_some());
        assert!(tree.exact("fix the bug in cache").is_some());
        assert!(tree.exact("fix the typo in docs").is_some());
    }

    #[test]
    fn key_is_prefix_of_a_longer_existing_key() {
        let mut tree = RadixTree::new();
        let task_id = TaskId::new();
        tree.insert("implement the new caching layer for the api", candidate(task_id));

        let (matched_len, hits) = tree
            .longest_prefix_match("implement the new caching layer", 10)
            .unwrap();
        assert_eq!(matched_len, "implement the new caching layer".chars().count());
        assert_eq!(hits[0].parent_task_id, task_id);
    }

    #[test]
    fn existing_key_is_prefix_of_the_query() {
        let mut tree = RadixTree::new();
        let task_id = TaskId::new();
        tree.insert("refactor the parser", candidate(task_id));

        let (matched_len, hits) = tree
            .longest_prefix_match("refactor the parser module for speed", 10)
            .unwrap();
        assert_eq!(matched_len, "refactor the parser".chars().count());
        assert_eq!(hits[0].parent_task_id, task_id);
    }

    #[test]
    fn below_minimum_prefix_length_is_rejected() {
        let mut tree = RadixTree::new();
        tree.insert("fix bug", candidate(TaskId::new()));
        assert!(tree.longest_prefix_match("fix bug in the thing", 32).is_none());
    }

    #[test]
    fn unrelated_keys_never_match() {
        let mut tree = RadixTree::new();
        tree.insert("write unit tests for the parser", candidate(TaskId::new()));
        assert!(tree.exact("deploy the service to production").is_none());
        assert!(tree
            .longest_prefix_match("deploy the service to production", 5)
            .is_none());
    }
}
