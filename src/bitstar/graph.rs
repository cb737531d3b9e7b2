use crate::bitstar::rgg::ConnectionRule;
use crate::bitstar::vertex::{Vertex, VertexId};
use crate::planning::neighbors::NearestNeighbors;
use crate::planning::objective::{Cost, OptimizationObjective};
use crate::planning::state::RealVectorState;
use num_traits::Float;

/// The planner's search graph: the vertex arena plus the two nearest-neighbor
/// structures that partition it.
///
/// Every live vertex is in exactly one of the two structures: free samples in
/// `sample_nn`, tree vertices in `vertex_nn`. The arena owns the states; the
/// structures and all parent/child links store ids only. Arena slots of
/// dropped vertices are tombstoned, never reused.
pub struct SearchGraph<F: Float, const N: usize, NN: NearestNeighbors<F, N>> {
    vertices: Vec<Vertex<F, N>>,
    sample_nn: NN,
    vertex_nn: NN,
    start: VertexId,
    goal: VertexId,
    nearest_neighbor_calls: u64,
    vertices_added: u64,
}

impl<F: Float, const N: usize, NN: NearestNeighbors<F, N>> SearchGraph<F, N, NN> {
    /// Creates a graph holding the start (as the tree root) and the goal (as
    /// a free sample).
    pub fn new(
        start_state: RealVectorState<F, N>,
        goal_state: RealVectorState<F, N>,
        objective: &dyn OptimizationObjective<F, N>,
    ) -> Self {
        let mut start = Vertex::new(start_state, objective.infinite_cost());
        start.is_root = true;
        start.in_tree = true;
        start.cost_to_come = objective.identity_cost();

        let mut goal = Vertex::new(goal_state, objective.infinite_cost());
        goal.is_new = true;

        let mut graph = Self {
            vertices: vec![start, goal],
            sample_nn: NN::new(),
            vertex_nn: NN::new(),
            start: 0,
            goal: 1,
            nearest_neighbor_calls: 0,
            vertices_added: 1,
        };
        graph.vertex_nn.add(start_state, graph.start);
        graph.sample_nn.add(goal_state, graph.goal);
        graph
    }

    pub fn start(&self) -> VertexId {
        self.start
    }

    pub fn goal(&self) -> VertexId {
        self.goal
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex<F, N> {
        let vertex = &self.vertices[id];
        debug_assert!(!vertex.dropped, "vertex {} was dropped", id);
        vertex
    }

    /// Queue-version lookup that tolerates dropped vertices, for stale-entry
    /// detection.
    pub(crate) fn queue_version_of(&self, id: VertexId) -> u64 {
        self.vertices[id].queue_version
    }

    pub(crate) fn is_dropped(&self, id: VertexId) -> bool {
        self.vertices[id].dropped
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex<F, N> {
        let vertex = &mut self.vertices[id];
        debug_assert!(!vertex.dropped, "vertex {} was dropped", id);
        vertex
    }

    /// The number of vertices currently in the tree.
    pub fn num_vertices(&self) -> usize {
        self.vertex_nn.size()
    }

    /// The number of free samples.
    pub fn num_samples(&self) -> usize {
        self.sample_nn.size()
    }

    /// Total states known to the graph; the `n` of the connection rule.
    pub fn num_total_states(&self) -> usize {
        self.vertex_nn.size() + self.sample_nn.size()
    }

    /// Total vertices ever added to the tree.
    pub fn vertices_added(&self) -> u64 {
        self.vertices_added
    }

    pub fn nearest_neighbor_calls(&self) -> u64 {
        self.nearest_neighbor_calls
    }

    /// Ids of all vertices currently in the tree.
    pub fn in_tree_ids(&self) -> Vec<VertexId> {
        (0..self.vertices.len())
            .filter(|&id| !self.vertices[id].dropped && self.vertices[id].in_tree)
            .collect()
    }

    /// Ids of all free samples.
    pub fn sample_ids(&self) -> Vec<VertexId> {
        (0..self.vertices.len())
            .filter(|&id| !self.vertices[id].dropped && !self.vertices[id].in_tree)
            .collect()
    }

    /// Clears the new-sample flag of every live vertex; called at the start
    /// of a batch so only this batch's samples count as new.
    pub fn mark_all_old(&mut self) {
        for vertex in self.vertices.iter_mut() {
            if !vertex.dropped {
                vertex.is_new = false;
            }
        }
    }

    /// Adds a freshly sampled state as a new free sample.
    pub fn add_sample(&mut self, state: RealVectorState<F, N>, infinite_cost: Cost<F>) -> VertexId {
        let id = self.vertices.len();
        let mut vertex = Vertex::new(state, infinite_cost);
        vertex.is_new = true;
        self.vertices.push(vertex);
        self.sample_nn.add(state, id);
        id
    }

    /// Permanently removes a free sample that can no longer contribute.
    pub fn drop_sample(&mut self, id: VertexId) {
        debug_assert!(!self.vertices[id].in_tree);
        let state = self.vertices[id].state;
        self.sample_nn.remove(&state, id);
        let vertex = &mut self.vertices[id];
        vertex.dropped = true;
        vertex.failed_children.clear();
        vertex.bump_version();
    }

    /// Links `child` under `parent`, sets the incoming edge cost and
    /// recomputes the child's cost-to-come. With `propagate`, every
    /// descendant's cost-to-come is recomputed as well; each touched vertex
    /// has its queue version bumped so outdated queue entries die on pop.
    pub(crate) fn add_parent(
        &mut self,
        child: VertexId,
        parent: VertexId,
        edge_cost: Cost<F>,
        objective: &dyn OptimizationObjective<F, N>,
        propagate: bool,
    ) {
        debug_assert!(self.vertices[child].parent.is_none());
        debug_assert!(!self.vertices[child].is_root);
        let cost = objective.combine_costs(self.vertices[parent].cost_to_come, edge_cost);
        let vertex = &mut self.vertices[child];
        vertex.parent = Some(parent);
        vertex.edge_cost = edge_cost;
        vertex.cost_to_come = cost;
        vertex.bump_version();
        if propagate {
            self.propagate_cost_updates(child, objective);
        }
    }

    /// Unlinks `child` from its parent (the parent's child list included) and
    /// resets its cost-to-come to infinity.
    pub(crate) fn remove_parent(
        &mut self,
        child: VertexId,
        objective: &dyn OptimizationObjective<F, N>,
        propagate: bool,
    ) {
        let parent = self.vertices[child]
            .parent
            .expect("cannot remove the parent of an unparented vertex");
        self.vertices[parent].remove_child(child);
        let infinite = objective.infinite_cost();
        let vertex = &mut self.vertices[child];
        vertex.parent = None;
        vertex.edge_cost = infinite;
        vertex.cost_to_come = infinite;
        vertex.bump_version();
        if propagate {
            self.propagate_cost_updates(child, objective);
        }
    }

    /// Recomputes cost-to-come through the subtree below `root`, depth first
    /// with an explicit stack.
    fn propagate_cost_updates(
        &mut self,
        root: VertexId,
        objective: &dyn OptimizationObjective<F, N>,
    ) {
        let mut stack = self.vertices[root].children.clone();
        while let Some(id) = stack.pop() {
            let parent = self.vertices[id]
                .parent
                .expect("a child without a parent cannot be reached by propagation");
            let cost =
                objective.combine_costs(self.vertices[parent].cost_to_come, self.vertices[id].edge_cost);
            let vertex = &mut self.vertices[id];
            vertex.cost_to_come = cost;
            vertex.bump_version();
            stack.extend_from_slice(&vertex.children);
        }
    }

    /// Moves a connected sample into the tree: out of the sample structure,
    /// into the vertex structure.
    ///
    /// Panics if the vertex is neither the root nor parented; connecting
    /// first is a hard precondition of tree membership.
    pub(crate) fn promote_to_vertex(&mut self, id: VertexId) {
        if self.vertices[id].parent.is_none() && !self.vertices[id].is_root {
            panic!("vertex {} must be connected to the tree before being promoted", id);
        }
        debug_assert!(!self.vertices[id].in_tree);
        let state = self.vertices[id].state;
        self.sample_nn.remove(&state, id);
        self.vertex_nn.add(state, id);
        self.vertices[id].in_tree = true;
        self.vertices_added += 1;
    }

    /// Moves a disconnected tree vertex back into the sample structure. The
    /// caller has already detached it from its parent and children. The
    /// vertex counts as new again: if it is reconnected it must get another
    /// chance to generate rewiring candidates.
    pub(crate) fn demote_to_sample(&mut self, id: VertexId, objective: &dyn OptimizationObjective<F, N>) {
        debug_assert!(self.vertices[id].in_tree);
        debug_assert!(self.vertices[id].parent.is_none());
        debug_assert!(self.vertices[id].children.is_empty());
        let state = self.vertices[id].state;
        self.vertex_nn.remove(&state, id);
        self.sample_nn.add(state, id);
        let infinite = objective.infinite_cost();
        let vertex = &mut self.vertices[id];
        vertex.in_tree = false;
        vertex.cost_to_come = infinite;
        vertex.edge_cost = infinite;
        vertex.is_new = true;
        vertex.expanded_to_samples = false;
        vertex.expanded_to_vertices = false;
        vertex.failed_children.clear();
        vertex.bump_version();
    }

    /// Permanently removes a disconnected tree vertex that cannot contribute
    /// to any improving path.
    pub(crate) fn drop_vertex(&mut self, id: VertexId) {
        debug_assert!(self.vertices[id].in_tree);
        debug_assert!(self.vertices[id].parent.is_none());
        debug_assert!(self.vertices[id].children.is_empty());
        let state = self.vertices[id].state;
        self.vertex_nn.remove(&state, id);
        let vertex = &mut self.vertices[id];
        vertex.in_tree = false;
        vertex.dropped = true;
        vertex.failed_children.clear();
        vertex.bump_version();
    }

    /// Free samples near `vertex` under the current connection rule.
    pub(crate) fn nearest_samples(&mut self, vertex: VertexId, rule: ConnectionRule<F>) -> Vec<VertexId> {
        self.nearest_neighbor_calls += 1;
        let state = self.vertices[vertex].state;
        match rule {
            ConnectionRule::Radius(r) => self.sample_nn.within_radius(&state, r),
            ConnectionRule::KNearest(k) => self.sample_nn.nearest_k(&state, k),
        }
    }

    /// Tree vertices near `vertex` under the current connection rule.
    pub(crate) fn nearest_vertices(&mut self, vertex: VertexId, rule: ConnectionRule<F>) -> Vec<VertexId> {
        self.nearest_neighbor_calls += 1;
        let state = self.vertices[vertex].state;
        match rule {
            ConnectionRule::Radius(r) => self.vertex_nn.within_radius(&state, r),
            ConnectionRule::KNearest(k) => self.vertex_nn.nearest_k(&state, k),
        }
    }

    /// Number of tree edges between `id` and the root.
    pub(crate) fn depth(&self, id: VertexId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.vertices[current].parent {
            depth += 1;
            current = parent;
        }
        depth
    }
}
