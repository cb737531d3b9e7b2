use crate::planning::objective::Cost;
use crate::planning::state::RealVectorState;
use num_traits::Float;
use std::collections::HashMap;

/// Stable identifier of a vertex in the search graph's arena. Identifiers
/// are never reused, so a stored id can never silently point at a different
/// state.
pub type VertexId = usize;

/// A sampled state together with its tree bookkeeping.
///
/// A vertex is either a free sample (disconnected, infinite cost-to-come) or
/// a tree vertex (connected to the root through its parent). The integrated
/// queue detects outdated entries through `queue_version`, which is bumped on
/// every mutation that changes this vertex's cost or its membership in the
/// graph.
pub struct Vertex<F: Float, const N: usize> {
    pub(crate) state: RealVectorState<F, N>,
    pub(crate) parent: Option<VertexId>,
    pub(crate) children: Vec<VertexId>,
    pub(crate) cost_to_come: Cost<F>,
    /// Cost of the edge from the parent. Infinite while disconnected.
    pub(crate) edge_cost: Cost<F>,
    pub(crate) is_root: bool,
    pub(crate) in_tree: bool,
    /// True for samples added in the current batch (and for vertices created
    /// from them); gates the generation of rewiring candidates.
    pub(crate) is_new: bool,
    pub(crate) expanded_to_samples: bool,
    pub(crate) expanded_to_vertices: bool,
    /// Tombstone: the vertex was pruned away entirely and must never be
    /// touched again.
    pub(crate) dropped: bool,
    /// Set while the vertex waits in the queue's unsorted set.
    pub(crate) unsorted: bool,
    pub(crate) queue_version: u64,
    /// Targets proven collision-infeasible from this vertex, each tagged
    /// with the target's queue version at the time of failure. A memo whose
    /// tag no longer matches is ignored.
    pub(crate) failed_children: HashMap<VertexId, u64>,
}

impl<F: Float, const N: usize> Vertex<F, N> {
    pub(crate) fn new(state: RealVectorState<F, N>, infinite_cost: Cost<F>) -> Self {
        Self {
            state,
            parent: None,
            children: Vec::new(),
            cost_to_come: infinite_cost,
            edge_cost: infinite_cost,
            is_root: false,
            in_tree: false,
            is_new: false,
            expanded_to_samples: false,
            expanded_to_vertices: false,
            dropped: false,
            unsorted: false,
            queue_version: 0,
            failed_children: HashMap::new(),
        }
    }

    pub fn state(&self) -> &RealVectorState<F, N> {
        &self.state
    }

    pub fn parent(&self) -> Option<VertexId> {
        self.parent
    }

    pub fn children(&self) -> &[VertexId] {
        &self.children
    }

    pub fn cost_to_come(&self) -> Cost<F> {
        self.cost_to_come
    }

    pub fn edge_cost_from_parent(&self) -> Cost<F> {
        self.edge_cost
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn is_in_tree(&self) -> bool {
        self.in_tree
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn bump_version(&mut self) {
        self.queue_version += 1;
    }

    pub(crate) fn add_child(&mut self, child: VertexId) {
        debug_assert!(!self.children.contains(&child));
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: VertexId) {
        match self.children.iter().position(|&c| c == child) {
            Some(index) => {
                self.children.swap_remove(index);
            }
            None => panic!("vertex {} is not a child of this vertex", child),
        }
    }

    /// Memoizes a failed connection to `target`, tagged with the target's
    /// current queue version.
    pub(crate) fn mark_failed_child(&mut self, target: VertexId, target_version: u64) {
        self.failed_children.insert(target, target_version);
    }

    /// True if a failure to reach `target` is memoized and still valid.
    pub(crate) fn has_failed_child(&self, target: VertexId, target_version: u64) -> bool {
        self.failed_children.get(&target) == Some(&target_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex() -> Vertex<f64, 2> {
        Vertex::new(RealVectorState::new([0.0, 0.0]), Cost::new(f64::INFINITY))
    }

    #[test]
    fn starts_disconnected() {
        let v = vertex();
        assert!(!v.is_in_tree());
        assert!(!v.is_root());
        assert_eq!(v.parent(), None);
        assert!(v.cost_to_come().value().is_infinite());
    }

    #[test]
    fn child_bookkeeping() {
        let mut v = vertex();
        v.add_child(3);
        v.add_child(5);
        v.remove_child(3);
        assert_eq!(v.children(), &[5]);
    }

    #[test]
    #[should_panic(expected = "not a child")]
    fn removing_an_unknown_child_panics() {
        let mut v = vertex();
        v.remove_child(42);
    }

    #[test]
    fn failed_child_memos_expire_with_the_version() {
        let mut v = vertex();
        v.mark_failed_child(7, 2);
        assert!(v.has_failed_child(7, 2));
        assert!(!v.has_failed_child(7, 3));
        assert!(!v.has_failed_child(8, 2));
    }
}
