use crate::bitstar::graph::SearchGraph;
use crate::bitstar::heuristics;
use crate::bitstar::queue::IntegratedQueue;
use crate::bitstar::rgg::{self, ConnectionRule};
use crate::bitstar::status::{PlannerData, PlannerError, PlannerStatus};
use crate::bitstar::vertex::VertexId;
use crate::planning::neighbors::NearestNeighbors;
use crate::planning::objective::{Cost, OptimizationObjective};
use crate::planning::problem::ProblemDefinition;
use crate::planning::sampling::InformedSampler;
use crate::planning::state::RealVectorState;
use crate::planning::termination::TerminationCondition;
use crate::planning::validity_checker::ValidityChecker;
use log::{debug, info};
use num_traits::Float;
use std::collections::BTreeMap;

/// Batch Informed Trees (BIT*).
///
/// An anytime, asymptotically-optimal sampling-based planner. The search
/// interleaves batches of informed random samples with an ordered search over
/// the implicit random geometric graph they induce: candidate edges surface
/// in best-first order from the [`IntegratedQueue`], are vetted against ever
/// tighter cost bounds, and only then collision checked. Each new solution
/// shrinks both the sampled region and the queue's threshold; each new batch
/// restarts the ordered search over the denser graph.
///
/// Type parameters follow the rest of the crate: `F` is the scalar, `N` the
/// state dimension, `NN` the nearest-neighbor structure.
pub struct BITstar<F: Float, const N: usize, NN: NearestNeighbors<F, N>> {
    problem: ProblemDefinition<F, N>,
    objective: Box<dyn OptimizationObjective<F, N>>,
    validity_checker: Box<dyn ValidityChecker<F, N>>,
    sampler: Box<dyn InformedSampler<F, N>>,

    graph: SearchGraph<F, N, NN>,
    queue: IntegratedQueue<F>,
    connection_rule: ConnectionRule<F>,
    best_cost: Cost<F>,
    /// Best cost at the time of the last prune.
    pruned_cost: Cost<F>,
    /// The theoretical minimum: the heuristic cost from start to goal.
    min_cost: Cost<F>,
    /// Reserved for just-in-time sampling; full batches always sample the
    /// entire informed set.
    cost_sampled: Cost<F>,
    /// Reserved for just-in-time sampling.
    sample_density: F,
    has_solution: bool,
    is_setup: bool,

    // Parameters. These survive clear().
    use_strict_queue_ordering: bool,
    rewire_factor: F,
    samples_per_batch: usize,
    use_failure_tracking: bool,
    use_k_nearest: bool,
    use_graph_pruning: bool,
    prune_threshold_fraction: F,
    stop_on_solution_improvement: bool,

    // Statistics, exposed through progress_properties().
    num_iterations: u64,
    num_batches: u64,
    num_prunings: u64,
    num_samples: u64,
    num_free_states_pruned: u64,
    num_vertices_disconnected: u64,
    num_rewirings: u64,
    num_state_collision_checks: u64,
    num_edge_collision_checks: u64,
}

impl<F, const N: usize, NN> BITstar<F, N, NN>
where
    F: Float + std::fmt::Debug,
    NN: NearestNeighbors<F, N>,
{
    /// Creates a planner for the given problem. Call [`setup`](Self::setup)
    /// before [`solve`](Self::solve).
    pub fn new(
        problem: ProblemDefinition<F, N>,
        objective: Box<dyn OptimizationObjective<F, N>>,
        validity_checker: Box<dyn ValidityChecker<F, N>>,
        sampler: Box<dyn InformedSampler<F, N>>,
    ) -> Self {
        let start = problem.start_states()[0];
        let goal = *problem.goal();
        let graph = SearchGraph::new(start, goal, objective.as_ref());
        let queue = IntegratedQueue::new(objective.infinite_cost());
        let infinite = objective.infinite_cost();
        Self {
            problem,
            objective,
            validity_checker,
            sampler,
            graph,
            queue,
            connection_rule: ConnectionRule::Radius(F::zero()),
            best_cost: infinite,
            pruned_cost: infinite,
            min_cost: infinite,
            cost_sampled: infinite,
            sample_density: F::zero(),
            has_solution: false,
            is_setup: false,
            use_strict_queue_ordering: false,
            rewire_factor: F::from(1.1).unwrap(),
            samples_per_batch: 100,
            use_failure_tracking: false,
            use_k_nearest: false,
            use_graph_pruning: true,
            prune_threshold_fraction: F::from(0.01).unwrap(),
            stop_on_solution_improvement: false,
            num_iterations: 0,
            num_batches: 0,
            num_prunings: 0,
            num_samples: 0,
            num_free_states_pruned: 0,
            num_vertices_disconnected: 0,
            num_rewirings: 0,
            num_state_collision_checks: 0,
            num_edge_collision_checks: 0,
        }
    }

    /// Validates the problem and initializes the search state. On failure the
    /// planner refuses to solve until a successful setup.
    pub fn setup(&mut self) -> Result<(), PlannerError> {
        self.is_setup = false;

        if self.problem.start_states().len() != 1 {
            return Err(PlannerError::InvalidProblem(format!(
                "exactly one start state is required, got {}",
                self.problem.start_states().len()
            )));
        }
        if !self.problem.has_valid_bounds() {
            return Err(PlannerError::InvalidProblem(
                "every bound must be a non-empty interval".to_string(),
            ));
        }
        let start = self.problem.start_states()[0];
        let goal = *self.problem.goal();
        if !self.problem.contains(&start) || !self.validity_checker.is_state_valid(&start) {
            return Err(PlannerError::InvalidProblem(
                "the start state is out of bounds or in collision".to_string(),
            ));
        }
        if !self.problem.contains(&goal) || !self.validity_checker.is_state_valid(&goal) {
            return Err(PlannerError::InvalidProblem(
                "the goal state is out of bounds or in collision".to_string(),
            ));
        }

        self.graph = SearchGraph::new(start, goal, self.objective.as_ref());
        self.queue = IntegratedQueue::new(self.objective.infinite_cost());
        self.best_cost = self.objective.infinite_cost();
        self.pruned_cost = self.objective.infinite_cost();
        self.min_cost =
            heuristics::cost_to_come_heuristic(&self.graph, self.objective.as_ref(), self.graph.goal());
        // Start at the best cost so the bare start-goal graph is searched
        // before any sampling happens.
        self.cost_sampled = self.best_cost;
        self.sample_density = F::zero();
        self.has_solution = false;
        self.reset_statistics();

        let start_id = self.graph.start();
        self.queue
            .insert_vertex(&mut self.graph, self.objective.as_ref(), start_id);
        self.update_connection_rule();

        self.is_setup = true;
        Ok(())
    }

    /// Forgets all search state but keeps the problem and every parameter.
    pub fn clear(&mut self) {
        let start = self.problem.start_states()[0];
        let goal = *self.problem.goal();
        self.graph = SearchGraph::new(start, goal, self.objective.as_ref());
        self.queue = IntegratedQueue::new(self.objective.infinite_cost());
        self.connection_rule = ConnectionRule::Radius(F::zero());
        self.best_cost = self.objective.infinite_cost();
        self.pruned_cost = self.objective.infinite_cost();
        self.min_cost = self.objective.infinite_cost();
        self.cost_sampled = self.objective.infinite_cost();
        self.sample_density = F::zero();
        self.has_solution = false;
        self.is_setup = false;
        self.reset_statistics();
    }

    /// Searches until the objective is satisfied, the termination condition
    /// fires, or the solution cost reaches the theoretical minimum.
    pub fn solve<T: TerminationCondition>(
        &mut self,
        termination: &mut T,
    ) -> Result<PlannerStatus, PlannerError> {
        if !self.is_setup {
            return Err(PlannerError::NotSetup(
                "the last setup() did not succeed".to_string(),
            ));
        }
        debug!("starting the search");

        let mut stop_loop = false;
        while !self.objective.is_satisfied(self.best_cost)
            && !termination.evaluate()
            && self.objective.is_cost_better_than(self.min_cost, self.best_cost)
            && !stop_loop
        {
            self.num_iterations += 1;

            if self.use_strict_queue_ordering {
                self.resort();
            }

            if self.queue.is_empty() {
                self.new_batch();
            }

            let Some((source, target)) = self.queue.pop_front_edge(
                &mut self.graph,
                self.objective.as_ref(),
                self.connection_rule,
            ) else {
                // Only outdated entries were left; the batch is exhausted.
                self.queue.finish();
                continue;
            };

            // Gate 1: given the current tree, can this edge possibly improve
            // the solution? The queue is keyed on exactly this value, so a
            // failure here means nothing behind it can help either.
            let current_key = self.objective.combine_costs_3(
                self.graph.vertex(source).cost_to_come(),
                heuristics::edge_cost_heuristic(&self.graph, self.objective.as_ref(), source, target),
                heuristics::cost_to_go_heuristic(&self.graph, self.objective.as_ref(), target),
            );
            if !self
                .objective
                .is_cost_better_than(current_key, self.best_cost)
            {
                if !self.queue.is_sorted() {
                    // The verdict may be an artifact of outdated keys.
                    self.resort();
                } else {
                    debug!("batch {} exhausted, clearing the queue", self.num_batches);
                    self.queue.finish();
                }
                continue;
            }

            // Gate 2: with the true edge cost but the admissible cost-to-come,
            // can the edge ever be useful? If not, no future tree can redeem
            // it.
            let true_cost =
                heuristics::true_edge_cost(&self.graph, self.objective.as_ref(), source, target);
            let admissible_through = self.objective.combine_costs_3(
                heuristics::cost_to_come_heuristic(&self.graph, self.objective.as_ref(), source),
                true_cost,
                heuristics::cost_to_go_heuristic(&self.graph, self.objective.as_ref(), target),
            );
            if !self
                .objective
                .is_cost_better_than(admissible_through, self.best_cost)
            {
                self.record_edge_failure(source, target);
                continue;
            }

            // Gate 3: collision.
            if !self.check_motion(source, target) {
                self.record_edge_failure(source, target);
                continue;
            }

            // Gate 4: does it actually improve the tree?
            let through = self
                .objective
                .combine_costs(self.graph.vertex(source).cost_to_come(), true_cost);
            if self
                .objective
                .is_cost_better_than(through, self.graph.vertex(target).cost_to_come())
            {
                self.add_edge(source, target, true_cost);
                if self.update_solution() {
                    stop_loop = self.stop_on_solution_improvement;
                }
                self.queue
                    .prune_edges_to(&self.graph, self.objective.as_ref(), target);
            }
        }

        if self.has_solution {
            info!(
                "found a solution of cost {:?} from {} samples, {} iterations, {} vertices and {} rewirings",
                self.best_cost.value(),
                self.num_samples,
                self.num_iterations,
                self.graph.vertices_added(),
                self.num_rewirings
            );
            Ok(PlannerStatus::ExactSolution)
        } else {
            info!(
                "no solution from {} samples after {} iterations",
                self.num_samples, self.num_iterations
            );
            Ok(PlannerStatus::Unsolved)
        }
    }

    /// The states of the best known path, start first. None until a solution
    /// exists.
    pub fn solution_path(&self) -> Option<Vec<RealVectorState<F, N>>> {
        if !self.has_solution {
            return None;
        }
        let mut reverse_path = Vec::new();
        let mut current = Some(self.graph.goal());
        while let Some(id) = current {
            reverse_path.push(*self.graph.vertex(id).state());
            current = self.graph.vertex(id).parent();
        }
        reverse_path.reverse();
        Some(reverse_path)
    }

    /// A snapshot of the samples and the tree.
    pub fn planner_data(&self) -> PlannerData<F, N> {
        let samples = self
            .graph
            .sample_ids()
            .into_iter()
            .map(|id| *self.graph.vertex(id).state())
            .collect();
        let edges = self
            .graph
            .in_tree_ids()
            .into_iter()
            .filter_map(|id| {
                self.graph
                    .vertex(id)
                    .parent()
                    .map(|parent| (*self.graph.vertex(parent).state(), *self.graph.vertex(id).state()))
            })
            .collect();
        PlannerData {
            start: *self.graph.vertex(self.graph.start()).state(),
            goal: *self.graph.vertex(self.graph.goal()).state(),
            samples,
            edges,
            has_solution: self.has_solution,
        }
    }

    /// The states of the next edge the search would process.
    pub fn next_edge_in_queue(&mut self) -> Option<(RealVectorState<F, N>, RealVectorState<F, N>)> {
        let (source, target) = self.queue.front_edge(
            &mut self.graph,
            self.objective.as_ref(),
            self.connection_rule,
        )?;
        Some((
            *self.graph.vertex(source).state(),
            *self.graph.vertex(target).state(),
        ))
    }

    /// The key of the next edge the search would process.
    pub fn next_edge_value_in_queue(&mut self) -> Option<Cost<F>> {
        self.queue
            .front_edge_key(&mut self.graph, self.objective.as_ref(), self.connection_rule)
            .map(|key| key.0)
    }

    /// The queued candidate edges as state pairs, in no particular order.
    pub fn edge_queue(&self) -> Vec<(RealVectorState<F, N>, RealVectorState<F, N>)> {
        self.queue
            .edge_queue_pairs()
            .into_iter()
            .filter(|&(s, t)| !self.graph.is_dropped(s) && !self.graph.is_dropped(t))
            .map(|(s, t)| (*self.graph.vertex(s).state(), *self.graph.vertex(t).state()))
            .collect()
    }

    /// The vertices awaiting expansion, in no particular order.
    pub fn vertex_queue(&self) -> Vec<RealVectorState<F, N>> {
        self.queue
            .vertex_queue_ids()
            .into_iter()
            .filter(|&id| !self.graph.is_dropped(id))
            .map(|id| *self.graph.vertex(id).state())
            .collect()
    }

    pub fn num_batches(&self) -> u64 {
        self.num_batches
    }

    pub fn best_cost(&self) -> Cost<F> {
        self.best_cost
    }

    pub fn has_solution(&self) -> bool {
        self.has_solution
    }

    /// Cost of a connection across the current neighborhood; reserved for
    /// just-in-time sampling.
    pub fn neighborhood_cost(&self) -> Cost<F> {
        match self.connection_rule {
            ConnectionRule::Radius(r) => Cost::new(r + r),
            ConnectionRule::KNearest(_) => self.objective.infinite_cost(),
        }
    }

    /// The cost bound up to which the space has been sampled; reserved for
    /// just-in-time sampling, always infinite once a full batch is drawn.
    pub fn cost_sampled(&self) -> Cost<F> {
        self.cost_sampled
    }

    /// Samples per unit measure of the informed set in the latest batch;
    /// reserved for just-in-time sampling.
    pub fn sample_density(&self) -> F {
        self.sample_density
    }

    /// Read-only progress properties, stringified on demand.
    pub fn progress_properties(&self) -> BTreeMap<&'static str, String> {
        let mut properties = BTreeMap::new();
        properties.insert("best cost", format!("{:?}", self.best_cost.value()));
        properties.insert("current free states", self.graph.num_samples().to_string());
        properties.insert("current graph vertices", self.graph.num_vertices().to_string());
        properties.insert("vertex queue size", self.queue.num_vertices().to_string());
        properties.insert("edge queue size", self.queue.num_edges().to_string());
        properties.insert("iterations", self.num_iterations.to_string());
        properties.insert("batches", self.num_batches.to_string());
        properties.insert("graph prunings", self.num_prunings.to_string());
        properties.insert("total states generated", self.num_samples.to_string());
        properties.insert("vertices constructed", self.graph.vertices_added().to_string());
        properties.insert("states pruned", self.num_free_states_pruned.to_string());
        properties.insert(
            "graph vertices disconnected",
            self.num_vertices_disconnected.to_string(),
        );
        properties.insert("rewiring edges", self.num_rewirings.to_string());
        properties.insert(
            "state collision checks",
            self.num_state_collision_checks.to_string(),
        );
        properties.insert(
            "edge collision checks",
            self.num_edge_collision_checks.to_string(),
        );
        properties.insert(
            "nearest neighbour calls",
            self.graph.nearest_neighbor_calls().to_string(),
        );
        properties
    }

    // Parameters.

    /// Re-sort the queues before every pop instead of lazily on demand.
    pub fn set_strict_queue_ordering(&mut self, strict: bool) {
        self.use_strict_queue_ordering = strict;
    }

    pub fn strict_queue_ordering(&self) -> bool {
        self.use_strict_queue_ordering
    }

    /// Inflates the connection radius (or neighbor count) above the
    /// asymptotic minimum. Must lie in [1, 2].
    pub fn set_rewire_factor(&mut self, rewire_factor: F) -> Result<(), PlannerError> {
        if rewire_factor < F::one() || rewire_factor > F::from(2.0).unwrap() {
            return Err(PlannerError::InvalidParameter(format!(
                "rewire factor must lie in [1, 2], got {:?}",
                rewire_factor
            )));
        }
        self.rewire_factor = rewire_factor;
        if self.is_setup {
            self.update_connection_rule();
        }
        Ok(())
    }

    pub fn rewire_factor(&self) -> F {
        self.rewire_factor
    }

    pub fn set_samples_per_batch(&mut self, samples: usize) -> Result<(), PlannerError> {
        if samples == 0 {
            return Err(PlannerError::InvalidParameter(
                "at least one sample per batch is required".to_string(),
            ));
        }
        self.samples_per_batch = samples;
        Ok(())
    }

    pub fn samples_per_batch(&self) -> usize {
        self.samples_per_batch
    }

    /// Memoize per-vertex failed connections and skip them on re-expansion.
    pub fn set_failure_tracking(&mut self, track: bool) {
        self.use_failure_tracking = track;
    }

    pub fn failure_tracking(&self) -> bool {
        self.use_failure_tracking
    }

    /// Use the k-nearest connection rule instead of the radius rule.
    pub fn set_k_nearest(&mut self, use_k_nearest: bool) {
        self.use_k_nearest = use_k_nearest;
        if self.is_setup {
            self.update_connection_rule();
        }
    }

    pub fn k_nearest(&self) -> bool {
        self.use_k_nearest
    }

    /// Prune the graph and samples at batch boundaries.
    pub fn set_graph_pruning(&mut self, prune: bool) {
        self.use_graph_pruning = prune;
    }

    pub fn graph_pruning(&self) -> bool {
        self.use_graph_pruning
    }

    /// Minimum fractional improvement of the best cost since the last prune
    /// before pruning again. Must lie in [0, 1].
    pub fn set_prune_threshold_fraction(&mut self, fraction: F) -> Result<(), PlannerError> {
        if fraction < F::zero() || fraction > F::one() {
            return Err(PlannerError::InvalidParameter(format!(
                "prune threshold must lie in [0, 1], got {:?}",
                fraction
            )));
        }
        self.prune_threshold_fraction = fraction;
        Ok(())
    }

    pub fn prune_threshold_fraction(&self) -> F {
        self.prune_threshold_fraction
    }

    /// Return from solve() as soon as any new best solution is accepted.
    pub fn set_stop_on_solution_improvement(&mut self, stop: bool) {
        self.stop_on_solution_improvement = stop;
    }

    pub fn stop_on_solution_improvement(&self) -> bool {
        self.stop_on_solution_improvement
    }

    // The batch lifecycle.

    /// Starts a new batch: ages the old samples, resets the queue, prunes if
    /// worthwhile, draws the batch's samples, tightens the connection rule
    /// and queues the whole tree for expansion.
    fn new_batch(&mut self) {
        self.num_batches += 1;
        debug!("starting batch {}", self.num_batches);

        self.graph.mark_all_old();
        self.queue.reset(&mut self.graph);
        self.prune();

        self.num_samples += self.samples_per_batch as u64;
        for _ in 0..self.samples_per_batch {
            let state = self.sampler.sample_uniform(self.best_cost);
            self.num_state_collision_checks += 1;
            if self.validity_checker.is_state_valid(&state) {
                self.graph.add_sample(state, self.objective.infinite_cost());
            }
        }
        self.cost_sampled = self.objective.infinite_cost();
        let informed_measure = self.sampler.informed_measure(self.best_cost);
        if informed_measure > F::zero() {
            self.sample_density = F::from(self.samples_per_batch).unwrap() / informed_measure;
        }

        self.update_connection_rule();

        for id in self.graph.in_tree_ids() {
            self.queue
                .insert_vertex(&mut self.graph, self.objective.as_ref(), id);
        }
        debug_assert!(self.debug_check_tree_consistency());
        debug_assert!(self.debug_check_costs());
    }

    /// Prunes the samples and the graph when pruning is enabled, a solution
    /// exists, the solution improved enough since the last prune, and the
    /// informed subset is actually smaller than the whole space.
    fn prune(&mut self) {
        if !self.use_graph_pruning || !self.has_solution {
            return;
        }
        if !(self.fractional_cost_change().abs() > self.prune_threshold_fraction) {
            return;
        }
        if self.sampler.has_informed_measure()
            && !(self.sampler.informed_measure(self.best_cost) < self.problem.space_measure())
        {
            return;
        }

        info!(
            "pruning the problem from cost {:?} to {:?}",
            self.pruned_cost.value(),
            self.best_cost.value()
        );
        self.num_prunings += 1;

        self.prune_samples();
        let (disconnected, dropped) = self
            .queue
            .prune(&mut self.graph, self.objective.as_ref());
        self.num_vertices_disconnected += disconnected;
        self.num_free_states_pruned += dropped;

        self.pruned_cost = self.best_cost;
    }

    /// Drops every free sample that cannot be part of a better solution.
    fn prune_samples(&mut self) {
        for id in self.graph.sample_ids() {
            if self
                .queue
                .sample_prune_condition(&self.graph, self.objective.as_ref(), id)
            {
                self.num_free_states_pruned += 1;
                self.graph.drop_sample(id);
            }
        }
    }

    /// Relative improvement of the best cost since the last prune. Infinite
    /// while no prune has happened.
    fn fractional_cost_change(&self) -> F {
        if !self.objective.is_finite_cost(self.pruned_cost) {
            return F::infinity();
        }
        (self.best_cost.value() - self.pruned_cost.value()) / self.pruned_cost.value()
    }

    fn resort(&mut self) {
        let (disconnected, dropped) = self
            .queue
            .resort(&mut self.graph, self.objective.as_ref());
        self.num_vertices_disconnected += disconnected;
        self.num_free_states_pruned += dropped;
    }

    fn update_connection_rule(&mut self) {
        let n = self.graph.num_total_states();
        self.connection_rule = if self.use_k_nearest {
            ConnectionRule::KNearest(rgg::connection_k(n, N, self.rewire_factor))
        } else {
            let measure = if self.sampler.has_informed_measure() {
                self.sampler.informed_measure(self.best_cost)
            } else {
                self.problem.space_measure()
            };
            ConnectionRule::Radius(rgg::connection_radius(n, N, measure, self.rewire_factor))
        };
    }

    // Tree mutations.

    /// Applies an accepted edge: a rewiring when the target is already in the
    /// tree, otherwise a fresh connection that also promotes the sample.
    fn add_edge(&mut self, source: VertexId, target: VertexId, edge_cost: Cost<F>) {
        if self.graph.vertex(target).is_in_tree() {
            self.replace_parent(source, target, edge_cost);
        } else {
            self.graph.vertex_mut(source).add_child(target);
            self.graph
                .add_parent(target, source, edge_cost, self.objective.as_ref(), true);
            self.graph.promote_to_vertex(target);
            self.queue
                .insert_vertex(&mut self.graph, self.objective.as_ref(), target);
        }
    }

    /// Rewires `target` under a cheaper parent; the cost change cascades
    /// through its subtree and the queue is told to re-sort it.
    fn replace_parent(&mut self, source: VertexId, target: VertexId, edge_cost: Cost<F>) {
        self.num_rewirings += 1;
        self.graph
            .remove_parent(target, self.objective.as_ref(), false);
        self.graph.vertex_mut(source).add_child(target);
        self.graph
            .add_parent(target, source, edge_cost, self.objective.as_ref(), true);
        self.queue.mark_vertex_unsorted(&mut self.graph, target);
    }

    /// Records the goal's tree cost as the new best solution if it improved.
    fn update_solution(&mut self) -> bool {
        let goal = self.graph.goal();
        if !self.graph.vertex(goal).is_in_tree() {
            return false;
        }
        let goal_cost = self.graph.vertex(goal).cost_to_come();
        if !self.objective.is_cost_better_than(goal_cost, self.best_cost) {
            return false;
        }
        self.has_solution = true;
        self.best_cost = goal_cost;
        self.queue.set_threshold(goal_cost);
        info!(
            "improved the solution to cost {:?} in iteration {} ({} vertices, {} rewirings)",
            goal_cost.value(),
            self.num_iterations,
            self.graph.vertices_added(),
            self.num_rewirings
        );
        true
    }

    fn check_motion(&mut self, source: VertexId, target: VertexId) -> bool {
        self.num_edge_collision_checks += 1;
        self.validity_checker.is_motion_valid(
            self.graph.vertex(source).state(),
            self.graph.vertex(target).state(),
        )
    }

    fn record_edge_failure(&mut self, source: VertexId, target: VertexId) {
        if self.use_failure_tracking {
            let target_version = self.graph.queue_version_of(target);
            self.graph
                .vertex_mut(source)
                .mark_failed_child(target, target_version);
        }
    }

    fn reset_statistics(&mut self) {
        self.num_iterations = 0;
        self.num_batches = 0;
        self.num_prunings = 0;
        self.num_samples = 0;
        self.num_free_states_pruned = 0;
        self.num_vertices_disconnected = 0;
        self.num_rewirings = 0;
        self.num_state_collision_checks = 0;
        self.num_edge_collision_checks = 0;
    }

    // Consistency checks. Cheap enough to run at batch boundaries in debug
    // builds, and available to tests.

    /// Parent/child symmetry, acyclicity and reachability of the root for
    /// every tree vertex, plus disjointness of the two neighbor structures.
    pub fn debug_check_tree_consistency(&self) -> bool {
        let in_tree = self.graph.in_tree_ids();
        for &id in &in_tree {
            let vertex = self.graph.vertex(id);
            if vertex.is_root() {
                if vertex.parent().is_some() {
                    return false;
                }
            } else {
                let Some(parent) = vertex.parent() else {
                    return false;
                };
                if !self.graph.vertex(parent).children().contains(&id) {
                    return false;
                }
            }
            for &child in vertex.children() {
                if self.graph.vertex(child).parent() != Some(id) {
                    return false;
                }
            }
            // Walking up must reach the root within |tree| steps.
            let mut steps = 0;
            let mut current = id;
            while let Some(parent) = self.graph.vertex(current).parent() {
                current = parent;
                steps += 1;
                if steps > in_tree.len() {
                    return false;
                }
            }
            if !self.graph.vertex(current).is_root() {
                return false;
            }
        }
        for id in self.graph.sample_ids() {
            if self.graph.vertex(id).is_in_tree() {
                return false;
            }
        }
        true
    }

    /// Every non-root tree vertex's cost-to-come is its parent's combined
    /// with the incoming edge cost.
    pub fn debug_check_costs(&self) -> bool {
        for id in self.graph.in_tree_ids() {
            let vertex = self.graph.vertex(id);
            if let Some(parent) = vertex.parent() {
                let expected = self.objective.combine_costs(
                    self.graph.vertex(parent).cost_to_come(),
                    vertex.edge_cost_from_parent(),
                );
                if !self
                    .objective
                    .is_cost_equivalent_to(expected, vertex.cost_to_come())
                {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::neighbors::LinearNearestNeighbors;
    use crate::planning::objective::PathLengthObjective;
    use crate::planning::sampling::EllipsoidInformedSampler;
    use crate::planning::termination::MaxIterationsTermination;
    use crate::planning::validity_checker::AlwaysValid;

    type Planner = BITstar<f64, 2, LinearNearestNeighbors<f64, 2>>;

    fn planner_with(bounds: [(f64, f64); 2], cost_threshold: Option<f64>, seed: u64) -> Planner {
        let problem = ProblemDefinition::new(
            RealVectorState::new([0.0, 0.0]),
            RealVectorState::new([1.0, 0.0]),
            bounds,
        );
        let objective: Box<dyn OptimizationObjective<f64, 2>> = match cost_threshold {
            Some(threshold) => Box::new(PathLengthObjective::with_cost_threshold(threshold)),
            None => Box::new(PathLengthObjective::new()),
        };
        let sampler = EllipsoidInformedSampler::new(&problem, seed).unwrap();
        BITstar::new(problem, objective, Box::new(AlwaysValid), Box::new(sampler))
    }

    #[test]
    fn setup_requires_exactly_one_start() {
        let mut problem = ProblemDefinition::new(
            RealVectorState::new([0.0, 0.0]),
            RealVectorState::new([1.0, 0.0]),
            [(-0.5, 1.5), (-1.0, 1.0)],
        );
        problem.add_start_state(RealVectorState::new([0.1, 0.0]));
        let sampler = EllipsoidInformedSampler::new(&problem, 0).unwrap();
        let mut planner: Planner = BITstar::new(
            problem,
            Box::new(PathLengthObjective::new()),
            Box::new(AlwaysValid),
            Box::new(sampler),
        );
        assert!(matches!(
            planner.setup(),
            Err(PlannerError::InvalidProblem(_))
        ));
        // A failed setup leaves the planner refusing to solve.
        let mut termination = MaxIterationsTermination::new(10);
        assert!(matches!(
            planner.solve(&mut termination),
            Err(PlannerError::NotSetup(_))
        ));
    }

    #[test]
    fn parameters_are_validated() {
        let mut planner = planner_with([(-0.5, 1.5), (-1.0, 1.0)], None, 0);
        assert!(planner.set_rewire_factor(0.5).is_err());
        assert!(planner.set_rewire_factor(2.5).is_err());
        assert!(planner.set_rewire_factor(1.2).is_ok());
        assert!(planner.set_samples_per_batch(0).is_err());
        assert!(planner.set_samples_per_batch(10).is_ok());
        assert!(planner.set_prune_threshold_fraction(-0.1).is_err());
        assert!(planner.set_prune_threshold_fraction(1.1).is_err());
        assert!(planner.set_prune_threshold_fraction(0.2).is_ok());
    }

    /// In a small bounded space the first connection radius already spans the
    /// start-goal distance, so the very first iteration finds the direct edge
    /// without any sampling.
    #[test]
    fn finds_the_direct_edge_before_any_batch() {
        let mut planner = planner_with([(-0.2, 1.2), (-0.6, 0.6)], Some(1.05), 13);
        planner.setup().unwrap();
        let mut termination = MaxIterationsTermination::new(100);
        let status = planner.solve(&mut termination).unwrap();

        assert_eq!(status, PlannerStatus::ExactSolution);
        assert!((planner.best_cost().value() - 1.0).abs() < 1e-12);
        assert_eq!(planner.num_batches(), 0);
        assert_eq!(planner.num_samples, 0);
        assert_eq!(planner.num_edge_collision_checks, 1);

        let path = planner.solution_path().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(*path[0].values(), [0.0, 0.0]);
        assert_eq!(*path[1].values(), [1.0, 0.0]);

        assert!(planner.debug_check_tree_consistency());
        assert!(planner.debug_check_costs());
    }

    #[test]
    fn finds_the_direct_edge_with_k_nearest() {
        let mut planner = planner_with([(-0.2, 1.2), (-0.6, 0.6)], Some(1.05), 13);
        planner.set_k_nearest(true);
        planner.setup().unwrap();
        let mut termination = MaxIterationsTermination::new(100);
        let status = planner.solve(&mut termination).unwrap();
        assert_eq!(status, PlannerStatus::ExactSolution);
        assert!((planner.best_cost().value() - 1.0).abs() < 1e-12);
    }

    /// A cheaper route to an interior vertex must rewire it, cascade the
    /// improvement to its descendants and leave the queue marked unsorted.
    #[test]
    fn accepted_shortcuts_rewire_the_tree() {
        let mut planner = planner_with([(0.0, 1.0), (-0.5, 1.0)], None, 3);
        planner.setup().unwrap();
        let infinite = Cost::new(f64::INFINITY);
        let start = planner.graph.start();

        // start -> a -> b -> d, plus c on the axis.
        let a = planner.graph.add_sample(RealVectorState::new([0.3, 0.5]), infinite);
        let b = planner.graph.add_sample(RealVectorState::new([0.8, 0.5]), infinite);
        let d = planner.graph.add_sample(RealVectorState::new([0.9, 0.9]), infinite);
        let c = planner.graph.add_sample(RealVectorState::new([0.4, 0.0]), infinite);
        planner.add_edge(start, a, Cost::new(0.34f64.sqrt()));
        planner.add_edge(a, b, Cost::new(0.5));
        planner.add_edge(b, d, Cost::new(0.17f64.sqrt()));
        planner.add_edge(start, c, Cost::new(0.4));
        assert_eq!(planner.num_rewirings, 0);

        // c -> b is cheaper than the current route through a.
        planner.add_edge(c, b, Cost::new(0.41f64.sqrt()));

        assert_eq!(planner.num_rewirings, 1);
        assert_eq!(planner.graph.vertex(b).parent(), Some(c));
        let expected_b = 0.4 + 0.41f64.sqrt();
        assert!((planner.graph.vertex(b).cost_to_come().value() - expected_b).abs() < 1e-12);
        let expected_d = expected_b + 0.17f64.sqrt();
        assert!((planner.graph.vertex(d).cost_to_come().value() - expected_d).abs() < 1e-12);
        assert!(!planner.queue.is_sorted());

        planner.resort();
        assert!(planner.queue.is_sorted());
        assert!(planner.debug_check_tree_consistency());
        assert!(planner.debug_check_costs());
    }

    /// Two successive solutions with a generous improvement gap trigger
    /// exactly one prune between them, disconnecting or dropping everything
    /// that cannot beat the new bound.
    #[test]
    fn each_big_improvement_triggers_one_prune() {
        let mut planner = planner_with([(-1.0, 2.0), (-1.5, 1.5)], None, 5);
        planner.set_prune_threshold_fraction(0.1).unwrap();
        planner.set_samples_per_batch(1).unwrap();
        planner.setup().unwrap();
        let infinite = Cost::new(f64::INFINITY);
        let start = planner.graph.start();
        let goal = planner.graph.goal();

        // A sample that can never be part of anything cheaper than 1.8.
        let junk = planner.graph.add_sample(RealVectorState::new([0.0, 1.4]), infinite);

        // First solution: two legs of 0.9 through a high midpoint.
        let mid_high = planner
            .graph
            .add_sample(RealVectorState::new([0.5, 0.56f64.sqrt()]), infinite);
        planner.add_edge(start, mid_high, Cost::new(0.9));
        planner.add_edge(mid_high, goal, Cost::new(0.9));
        assert!(planner.update_solution());
        assert!((planner.best_cost().value() - 1.8).abs() < 1e-12);
        assert_eq!(planner.num_prunings, 0);

        planner.new_batch();
        assert_eq!(planner.num_prunings, 1);
        assert!(planner.graph.is_dropped(junk));
        assert!(planner.num_free_states_pruned >= 1);

        // Second solution: two legs of 0.6. The goal is rewired to the new
        // midpoint.
        let mid_low = planner
            .graph
            .add_sample(RealVectorState::new([0.5, 0.11f64.sqrt()]), infinite);
        planner.add_edge(start, mid_low, Cost::new(0.6));
        planner.add_edge(mid_low, goal, Cost::new(0.6));
        assert!(planner.update_solution());
        assert!((planner.best_cost().value() - 1.2).abs() < 1e-12);

        // Exactly one prune happened between the two solutions.
        assert_eq!(planner.num_prunings, 1);

        planner.new_batch();
        assert_eq!(planner.num_prunings, 2);
        // The old midpoint (lower bound 1.8) cannot contribute any more.
        assert!(planner.graph.is_dropped(mid_high));
        assert!(planner.num_vertices_disconnected + planner.num_free_states_pruned > 1);

        assert!(planner.has_solution());
        assert!(planner.graph.vertex(goal).is_in_tree());
        assert!(planner.debug_check_tree_consistency());
        assert!(planner.debug_check_costs());
    }
}
