//! The integrated vertex/edge queue driving the search.
//!
//! Two priority queues cooperate: the vertex queue holds tree vertices
//! awaiting expansion, ordered by the cost of the best solution through them;
//! the edge queue holds candidate edges, ordered by the cost of the best
//! solution through the edge with the cost-to-target as tie break. The edge
//! queue is filled lazily: a vertex is only expanded once no queued edge is
//! better than the best solution through that vertex.
//!
//! Re-keying a heap entry in place is expensive, so entries are versioned
//! instead: every entry records the queue version of the vertices it refers
//! to, and entries whose versions no longer match are discarded when they
//! surface. Tree mutations bump the versions of every affected vertex, which
//! retires their queued entries wholesale; the affected subtree is then
//! re-inserted by [`IntegratedQueue::resort`].

use crate::bitstar::graph::SearchGraph;
use crate::bitstar::heuristics;
use crate::bitstar::rgg::ConnectionRule;
use crate::bitstar::vertex::VertexId;
use crate::planning::neighbors::NearestNeighbors;
use crate::planning::objective::{Cost, OptimizationObjective};
use num_traits::Float;

/// A binary min-heap whose ordering is supplied per call, so that all
/// comparisons go through the objective's notion of "better".
struct CostHeap<T> {
    items: Vec<T>,
}

impl<T> CostHeap<T> {
    fn new() -> Self {
        Self { items: Vec::new() }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    fn push(&mut self, item: T, better: &impl Fn(&T, &T) -> bool) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1, better);
    }

    fn pop(&mut self, better: &impl Fn(&T, &T) -> bool) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let item = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0, better);
        }
        item
    }

    /// Keeps only the entries accepted by `keep` (which may amend an entry
    /// in place), then restores the heap property.
    fn retain(&mut self, mut keep: impl FnMut(&mut T) -> bool, better: &impl Fn(&T, &T) -> bool) {
        self.items.retain_mut(|item| keep(item));
        for index in (0..self.items.len() / 2).rev() {
            self.sift_down(index, better);
        }
    }

    fn sift_up(&mut self, mut index: usize, better: &impl Fn(&T, &T) -> bool) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if better(&self.items[index], &self.items[parent]) {
                self.items.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize, better: &impl Fn(&T, &T) -> bool) {
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut best = index;
            if left < self.items.len() && better(&self.items[left], &self.items[best]) {
                best = left;
            }
            if right < self.items.len() && better(&self.items[right], &self.items[best]) {
                best = right;
            }
            if best == index {
                return;
            }
            self.items.swap(index, best);
            index = best;
        }
    }
}

#[derive(Clone, Copy)]
struct VertexQueueEntry<F: Float> {
    /// g_T(v) + h_hat(v) at insertion time.
    key: Cost<F>,
    vertex: VertexId,
    version: u64,
}

/// An edge-queue sort key: the cost of the best solution through the edge,
/// then the cost to the edge's target as the lexicographic tie break.
pub type EdgeKey<F> = (Cost<F>, Cost<F>);

#[derive(Clone, Copy)]
struct EdgeQueueEntry<F: Float> {
    key: EdgeKey<F>,
    source: VertexId,
    target: VertexId,
    source_version: u64,
    target_version: u64,
}

fn vertex_entry_better<F: Float, const N: usize>(
    objective: &dyn OptimizationObjective<F, N>,
    a: &VertexQueueEntry<F>,
    b: &VertexQueueEntry<F>,
) -> bool {
    objective.is_cost_better_than(a.key, b.key)
}

fn edge_key_better<F: Float, const N: usize>(
    objective: &dyn OptimizationObjective<F, N>,
    a: &EdgeKey<F>,
    b: &EdgeKey<F>,
) -> bool {
    if objective.is_cost_better_than(a.0, b.0) {
        return true;
    }
    if objective.is_cost_better_than(b.0, a.0) {
        return false;
    }
    objective.is_cost_better_than(a.1, b.1)
}

fn edge_entry_better<F: Float, const N: usize>(
    objective: &dyn OptimizationObjective<F, N>,
    a: &EdgeQueueEntry<F>,
    b: &EdgeQueueEntry<F>,
) -> bool {
    edge_key_better(objective, &a.key, &b.key)
}

/// The two-level priority queue plus the pruning and re-sorting machinery
/// that keeps it consistent with the tree across batches.
pub struct IntegratedQueue<F: Float> {
    vertex_queue: CostHeap<VertexQueueEntry<F>>,
    edge_queue: CostHeap<EdgeQueueEntry<F>>,
    /// Cost of the current best solution; entries that cannot beat it are
    /// filtered on insertion and when drained for expansion.
    threshold: Cost<F>,
    /// Roots of subtrees whose costs changed since they were queued.
    resort_roots: Vec<VertexId>,
}

impl<F: Float> IntegratedQueue<F> {
    pub fn new(infinite_cost: Cost<F>) -> Self {
        Self {
            vertex_queue: CostHeap::new(),
            edge_queue: CostHeap::new(),
            threshold: infinite_cost,
            resort_roots: Vec::new(),
        }
    }

    /// Stores the new best cost. Future insertions and expansion drains
    /// discard anything that cannot beat it.
    pub fn set_threshold(&mut self, cost: Cost<F>) {
        self.threshold = cost;
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_queue.is_empty() && self.edge_queue.is_empty()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_queue.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_queue.len()
    }

    /// True when no tree mutation is waiting to be re-sorted.
    pub fn is_sorted(&self) -> bool {
        self.resort_roots.is_empty()
    }

    /// The vertices currently awaiting expansion (stale entries included).
    pub fn vertex_queue_ids(&self) -> Vec<VertexId> {
        self.vertex_queue.iter().map(|e| e.vertex).collect()
    }

    /// The queued candidate edges (stale entries included).
    pub fn edge_queue_pairs(&self) -> Vec<(VertexId, VertexId)> {
        self.edge_queue.iter().map(|e| (e.source, e.target)).collect()
    }

    /// Queues a tree vertex for expansion under its current key, clearing its
    /// expansion flags so its candidate edges are regenerated.
    pub fn insert_vertex<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        vertex: VertexId,
    ) {
        {
            let v = graph.vertex_mut(vertex);
            v.expanded_to_samples = false;
            v.expanded_to_vertices = false;
        }
        let key = heuristics::current_heuristic_vertex(graph, objective, vertex);
        if !objective.is_cost_better_than(key, self.threshold) {
            return;
        }
        let entry = VertexQueueEntry {
            key,
            vertex,
            version: graph.queue_version_of(vertex),
        };
        self.vertex_queue
            .push(entry, &|a, b| vertex_entry_better(objective, a, b));
    }

    /// Pops the best candidate edge, expanding vertices as needed to keep the
    /// edge queue ahead of the vertex queue. Returns None when the batch is
    /// exhausted.
    pub fn pop_front_edge<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        rule: ConnectionRule<F>,
    ) -> Option<(VertexId, VertexId)> {
        self.ensure_expanded(graph, objective, rule);
        self.clean_edge_front(graph, objective);
        self.edge_queue
            .pop(&|a, b| edge_entry_better(objective, a, b))
            .map(|entry| (entry.source, entry.target))
    }

    /// The best candidate edge without removing it.
    pub fn front_edge<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        rule: ConnectionRule<F>,
    ) -> Option<(VertexId, VertexId)> {
        self.ensure_expanded(graph, objective, rule);
        self.clean_edge_front(graph, objective);
        self.edge_queue.peek().map(|entry| (entry.source, entry.target))
    }

    /// The key of the best candidate edge without removing it.
    pub fn front_edge_key<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        rule: ConnectionRule<F>,
    ) -> Option<EdgeKey<F>> {
        self.ensure_expanded(graph, objective, rule);
        self.clean_edge_front(graph, objective);
        self.edge_queue.peek().map(|entry| entry.key)
    }

    /// Drops every queued edge into `target` that can no longer improve it:
    /// (s, target) is kept only while g_T(s) + c_hat(s, target) is better
    /// than g_T(target). Survivors are re-stamped with the target's current
    /// version, which the accepted edge has just bumped.
    pub fn prune_edges_to<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        target: VertexId,
    ) {
        let target_cost = graph.vertex(target).cost_to_come();
        let target_version = graph.queue_version_of(target);
        self.edge_queue.retain(
            |entry| {
                if entry.target != target {
                    return true;
                }
                if graph.is_dropped(entry.source)
                    || graph.queue_version_of(entry.source) != entry.source_version
                {
                    return false;
                }
                let through = heuristics::current_heuristic_edge_target(
                    graph,
                    objective,
                    entry.source,
                    target,
                );
                if objective.is_cost_worse_than_or_equivalent_to(through, target_cost) {
                    return false;
                }
                entry.target_version = target_version;
                true
            },
            &|a, b| edge_entry_better(objective, a, b),
        );
    }

    /// Records that `vertex` (and therefore its whole subtree) is queued
    /// under outdated keys.
    pub fn mark_vertex_unsorted<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        vertex: VertexId,
    ) {
        if !graph.vertex(vertex).unsorted {
            graph.vertex_mut(vertex).unsorted = true;
            self.resort_roots.push(vertex);
        }
    }

    /// Walks every marked subtree top down and either re-queues each vertex
    /// under its new key or, if it can no longer beat the threshold,
    /// disconnects it. Returns (vertices disconnected, states dropped).
    pub fn resort<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
    ) -> (u64, u64) {
        if self.resort_roots.is_empty() {
            return (0, 0);
        }
        let mut roots = std::mem::take(&mut self.resort_roots);
        // Parents first, so a nested mark is re-keyed at most once with its
        // final cost.
        roots.sort_by_key(|&v| graph.depth(v));

        let mut disconnected = 0;
        let mut dropped = 0;
        for root in roots {
            if graph.is_dropped(root) {
                continue;
            }
            if !graph.vertex(root).unsorted {
                continue;
            }
            if !graph.vertex(root).is_in_tree() {
                graph.vertex_mut(root).unsorted = false;
                continue;
            }
            let mut stack = vec![root];
            while let Some(vertex) = stack.pop() {
                graph.vertex_mut(vertex).unsorted = false;
                if self.vertex_prune_condition(graph, objective, vertex) {
                    let (d, p) = self.disconnect_branch(graph, objective, vertex);
                    disconnected += d;
                    dropped += p;
                } else {
                    stack.extend_from_slice(graph.vertex(vertex).children());
                    self.insert_vertex(graph, objective, vertex);
                }
            }
        }
        (disconnected, dropped)
    }

    /// Disconnects every tree vertex that can no longer contribute to a
    /// solution better than the threshold, demoting survivors of the sample
    /// test back to free samples and dropping the rest. Returns (vertices
    /// disconnected, states dropped).
    pub fn prune<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
    ) -> (u64, u64) {
        let mut disconnected = 0;
        let mut dropped = 0;
        for id in graph.in_tree_ids() {
            if graph.is_dropped(id) || !graph.vertex(id).is_in_tree() {
                continue;
            }
            if self.vertex_prune_condition(graph, objective, id) {
                let (d, p) = self.disconnect_branch(graph, objective, id);
                disconnected += d;
                dropped += p;
            }
        }
        (disconnected, dropped)
    }

    /// Clears both queues and forgets pending re-sorts; called when a new
    /// batch begins.
    pub fn reset<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
    ) {
        self.vertex_queue.clear();
        self.edge_queue.clear();
        for root in self.resort_roots.drain(..) {
            if !graph.is_dropped(root) {
                graph.vertex_mut(root).unsorted = false;
            }
        }
    }

    /// Declares the batch over: both queues are emptied. Pending re-sorts
    /// survive, since the affected costs stay valid into the next batch.
    pub fn finish(&mut self) {
        self.vertex_queue.clear();
        self.edge_queue.clear();
    }

    /// True if a free sample cannot be part of any solution better than the
    /// threshold.
    pub fn sample_prune_condition<const N: usize, NN: NearestNeighbors<F, N>>(
        &self,
        graph: &SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        sample: VertexId,
    ) -> bool {
        let lower_bound = heuristics::lower_bound_heuristic_vertex(graph, objective, sample);
        objective.is_cost_worse_than_or_equivalent_to(lower_bound, self.threshold)
    }

    /// True if a tree vertex should be removed: either no path through it
    /// can beat the threshold, or its current subtree certainly cannot. The
    /// tests are strict, so vertices on the best path itself (whose keys can
    /// equal the threshold exactly) always survive.
    fn vertex_prune_condition<const N: usize, NN: NearestNeighbors<F, N>>(
        &self,
        graph: &SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        vertex: VertexId,
    ) -> bool {
        let lower_bound = heuristics::lower_bound_heuristic_vertex(graph, objective, vertex);
        if objective.is_cost_worse_than(lower_bound, self.threshold) {
            return true;
        }
        let current = heuristics::current_heuristic_vertex(graph, objective, vertex);
        objective.is_cost_worse_than(current, self.threshold)
    }

    /// Removes the subtree rooted at `vertex` from the tree. Members passing
    /// the sample test return to the free samples; the rest are dropped for
    /// good.
    fn disconnect_branch<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        vertex: VertexId,
    ) -> (u64, u64) {
        graph.remove_parent(vertex, objective, false);

        let mut members = vec![vertex];
        let mut index = 0;
        while index < members.len() {
            members.extend_from_slice(graph.vertex(members[index]).children());
            index += 1;
        }

        let mut dropped = 0;
        for &member in &members {
            {
                let v = graph.vertex_mut(member);
                v.unsorted = false;
                v.parent = None;
                v.children.clear();
            }
            if self.sample_prune_condition(graph, objective, member) {
                graph.drop_vertex(member);
                dropped += 1;
            } else {
                graph.demote_to_sample(member, objective);
            }
        }
        (members.len() as u64, dropped)
    }

    /// Expands vertices until the best queued edge is better than the best
    /// unexpanded vertex (or the vertex queue runs dry).
    fn ensure_expanded<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        rule: ConnectionRule<F>,
    ) {
        loop {
            self.clean_vertex_front(graph, objective);
            let front = match self.vertex_queue.peek() {
                Some(front) => *front,
                None => return,
            };
            self.clean_edge_front(graph, objective);
            if let Some(edge_front) = self.edge_queue.peek() {
                if objective.is_cost_better_than(edge_front.key.0, front.key) {
                    return;
                }
            }
            self.vertex_queue
                .pop(&|a, b| vertex_entry_better(objective, a, b));
            // Threshold drain: a vertex that cannot beat the best solution
            // generates nothing worth queueing.
            if !objective.is_cost_better_than(front.key, self.threshold) {
                continue;
            }
            self.expand_vertex(graph, objective, rule, front.vertex);
        }
    }

    /// Generates the candidate edges of one vertex: edges to nearby free
    /// samples always, rewiring edges to nearby tree vertices only while the
    /// vertex itself came from the current batch.
    fn expand_vertex<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &mut SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        rule: ConnectionRule<F>,
        vertex: VertexId,
    ) {
        if !graph.vertex(vertex).expanded_to_samples {
            let samples = graph.nearest_samples(vertex, rule);
            for sample in samples {
                if graph
                    .vertex(vertex)
                    .has_failed_child(sample, graph.queue_version_of(sample))
                {
                    continue;
                }
                let lower_bound =
                    heuristics::lower_bound_heuristic_edge(graph, objective, vertex, sample);
                if objective.is_cost_better_than(lower_bound, self.threshold) {
                    self.push_edge(graph, objective, vertex, sample);
                }
            }
            graph.vertex_mut(vertex).expanded_to_samples = true;
        }

        if graph.vertex(vertex).is_new() && !graph.vertex(vertex).expanded_to_vertices {
            let vertices = graph.nearest_vertices(vertex, rule);
            for other in vertices {
                if other == vertex || graph.vertex(vertex).parent() == Some(other) {
                    continue;
                }
                if graph
                    .vertex(vertex)
                    .has_failed_child(other, graph.queue_version_of(other))
                {
                    continue;
                }
                // Only a rewiring that could actually lower the target's cost
                // is worth queueing.
                let through = objective.combine_costs(
                    graph.vertex(vertex).cost_to_come(),
                    heuristics::edge_cost_heuristic(graph, objective, vertex, other),
                );
                if !objective.is_cost_better_than(through, graph.vertex(other).cost_to_come()) {
                    continue;
                }
                let lower_bound =
                    heuristics::lower_bound_heuristic_edge(graph, objective, vertex, other);
                if objective.is_cost_better_than(lower_bound, self.threshold) {
                    self.push_edge(graph, objective, vertex, other);
                }
            }
            graph.vertex_mut(vertex).expanded_to_vertices = true;
        }
    }

    fn push_edge<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
        source: VertexId,
        target: VertexId,
    ) {
        let key = (
            heuristics::current_heuristic_edge(graph, objective, source, target),
            heuristics::current_heuristic_edge_target(graph, objective, source, target),
        );
        let entry = EdgeQueueEntry {
            key,
            source,
            target,
            source_version: graph.queue_version_of(source),
            target_version: graph.queue_version_of(target),
        };
        self.edge_queue
            .push(entry, &|a, b| edge_entry_better(objective, a, b));
    }

    fn clean_vertex_front<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
    ) {
        while let Some(front) = self.vertex_queue.peek() {
            if graph.queue_version_of(front.vertex) == front.version {
                return;
            }
            self.vertex_queue
                .pop(&|a, b| vertex_entry_better(objective, a, b));
        }
    }

    fn clean_edge_front<const N: usize, NN: NearestNeighbors<F, N>>(
        &mut self,
        graph: &SearchGraph<F, N, NN>,
        objective: &dyn OptimizationObjective<F, N>,
    ) {
        while let Some(front) = self.edge_queue.peek() {
            if graph.queue_version_of(front.source) == front.source_version
                && graph.queue_version_of(front.target) == front.target_version
            {
                return;
            }
            self.edge_queue
                .pop(&|a, b| edge_entry_better(objective, a, b));
        }
    }
}
