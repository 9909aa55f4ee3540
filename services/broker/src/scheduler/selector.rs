//! Node selection policy.
//!
//! Candidates arrive in registry order and the policy is evaluated in order:
//!
//! 1. The first node with `current_users < users_limit`.
//! 2. Otherwise the node with the fewest users, first one wins on ties.
//! 3. No candidates, no node.
//!
//! Step 2 is the graceful-overload mode: when every node is saturated the
//! request is still placed on the least-bad node instead of being refused.
//! Earlier registry entries are always preferred, so operators control
//! fill order by ordering `servers.json`.

use super::aggregator::LoadSnapshot;

/// Which rule produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// The node is below its limit.
    WithinCapacity,
    /// Every candidate is at or over its limit; this one has the fewest users.
    Overloaded,
}

/// A chosen node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<'a> {
    pub node: &'a LoadSnapshot,
    pub mode: SelectionMode,
}

/// Pick a node from the available candidates.
pub fn select_node(candidates: &[LoadSnapshot]) -> Option<Selection<'_>> {
    if let Some(node) = candidates.iter().find(|n| n.has_capacity()) {
        return Some(Selection {
            node,
            mode: SelectionMode::WithinCapacity,
        });
    }

    // min_by_key keeps the first of equal minima.
    candidates
        .iter()
        .min_by_key(|n| n.current_users)
        .map(|node| Selection {
            node,
            mode: SelectionMode::Overloaded,
        })
}
