//! Heuristic cost estimates used as queue keys.
//!
//! "Lower bound" estimates use the admissible cost-to-come heuristic from the
//! start; "current" estimates substitute the actual cost through the tree.
//! One set of definitions serves both the planner loop and the integrated
//! queue.

use crate::bitstar::graph::SearchGraph;
use crate::bitstar::vertex::VertexId;
use crate::planning::neighbors::NearestNeighbors;
use crate::planning::objective::{Cost, OptimizationObjective};
use num_traits::Float;

/// Admissible cost-to-come estimate: the heuristic motion cost from the
/// start.
pub fn cost_to_come_heuristic<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    vertex: VertexId,
) -> Cost<F> {
    objective.motion_cost_heuristic(graph.vertex(graph.start()).state(), graph.vertex(vertex).state())
}

/// Admissible cost-to-go estimate: the heuristic motion cost to the goal.
pub fn cost_to_go_heuristic<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    vertex: VertexId,
) -> Cost<F> {
    objective.motion_cost_heuristic(graph.vertex(vertex).state(), graph.vertex(graph.goal()).state())
}

/// Admissible estimate of the cost of the edge between two vertices.
pub fn edge_cost_heuristic<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    source: VertexId,
    target: VertexId,
) -> Cost<F> {
    objective.motion_cost_heuristic(graph.vertex(source).state(), graph.vertex(target).state())
}

/// The true cost of the edge between two vertices, assuming it is collision
/// free.
pub fn true_edge_cost<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    source: VertexId,
    target: VertexId,
) -> Cost<F> {
    objective.motion_cost(graph.vertex(source).state(), graph.vertex(target).state())
}

/// Lower bound on the cost of any solution through a vertex:
/// g_hat(v) + h_hat(v).
pub fn lower_bound_heuristic_vertex<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    vertex: VertexId,
) -> Cost<F> {
    objective.combine_costs(
        cost_to_come_heuristic(graph, objective, vertex),
        cost_to_go_heuristic(graph, objective, vertex),
    )
}

/// Cost of the best known solution through a vertex: g_T(v) + h_hat(v). The
/// expansion-queue key.
pub fn current_heuristic_vertex<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    vertex: VertexId,
) -> Cost<F> {
    objective.combine_costs(
        graph.vertex(vertex).cost_to_come(),
        cost_to_go_heuristic(graph, objective, vertex),
    )
}

/// Lower bound on the cost of any solution through an edge:
/// g_hat(u) + c_hat(u, v) + h_hat(v).
pub fn lower_bound_heuristic_edge<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    source: VertexId,
    target: VertexId,
) -> Cost<F> {
    objective.combine_costs_3(
        cost_to_come_heuristic(graph, objective, source),
        edge_cost_heuristic(graph, objective, source, target),
        cost_to_go_heuristic(graph, objective, target),
    )
}

/// Cost of the best known solution through an edge:
/// g_T(u) + c_hat(u, v) + h_hat(v). The primary edge-queue key.
pub fn current_heuristic_edge<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    source: VertexId,
    target: VertexId,
) -> Cost<F> {
    objective.combine_costs(
        current_heuristic_edge_target(graph, objective, source, target),
        cost_to_go_heuristic(graph, objective, target),
    )
}

/// Best known cost to the edge's target through the edge:
/// g_T(u) + c_hat(u, v). The edge-queue tie-break key.
pub fn current_heuristic_edge_target<F: Float, const N: usize, NN: NearestNeighbors<F, N>>(
    graph: &SearchGraph<F, N, NN>,
    objective: &dyn OptimizationObjective<F, N>,
    source: VertexId,
    target: VertexId,
) -> Cost<F> {
    objective.combine_costs(
        graph.vertex(source).cost_to_come(),
        edge_cost_heuristic(graph, objective, source, target),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::neighbors::LinearNearestNeighbors;
    use crate::planning::objective::PathLengthObjective;
    use crate::planning::state::RealVectorState;

    type Graph = SearchGraph<f64, 2, LinearNearestNeighbors<f64, 2>>;

    fn graph_with_detour() -> (Graph, PathLengthObjective<f64>, VertexId) {
        let objective = PathLengthObjective::new();
        let mut graph = Graph::new(
            RealVectorState::new([0.0, 0.0]),
            RealVectorState::new([1.0, 0.0]),
            &objective,
        );
        // A vertex off the straight line, reached through a detour costing
        // more than its admissible estimate.
        let v = graph.add_sample(RealVectorState::new([0.5, 0.5]), Cost::new(f64::INFINITY));
        let start = graph.start();
        graph.vertex_mut(start).add_child(v);
        graph.add_parent(v, start, Cost::new(1.0), &objective, false);
        graph.promote_to_vertex(v);
        (graph, objective, v)
    }

    #[test]
    fn edge_key_decomposes_into_target_key_plus_cost_to_go() {
        let (graph, objective, v) = graph_with_detour();
        let objective: &dyn OptimizationObjective<f64, 2> = &objective;
        let goal = graph.goal();
        let full = current_heuristic_edge(&graph, objective, v, goal);
        let target = current_heuristic_edge_target(&graph, objective, v, goal);
        let to_go = cost_to_go_heuristic(&graph, objective, goal);
        let recomposed = objective.combine_costs(target, to_go);
        assert!((full.value() - recomposed.value()).abs() < 1e-12);
    }

    #[test]
    fn lower_bound_never_exceeds_the_current_estimate() {
        let (graph, objective, v) = graph_with_detour();
        let objective: &dyn OptimizationObjective<f64, 2> = &objective;
        let goal = graph.goal();
        let lower_v = lower_bound_heuristic_vertex(&graph, objective, v);
        let current_v = current_heuristic_vertex(&graph, objective, v);
        assert!(objective.is_cost_better_than_or_equivalent_to(lower_v, current_v));

        let lower_e = lower_bound_heuristic_edge(&graph, objective, v, goal);
        let current_e = current_heuristic_edge(&graph, objective, v, goal);
        assert!(objective.is_cost_better_than_or_equivalent_to(lower_e, current_e));
    }

    #[test]
    fn vertex_lower_bound_is_the_two_point_heuristic() {
        let (graph, objective, v) = graph_with_detour();
        let objective: &dyn OptimizationObjective<f64, 2> = &objective;
        // g_hat + h_hat through (0.5, 0.5).
        let expected = 0.5f64.hypot(0.5) * 2.0;
        let key = lower_bound_heuristic_vertex(&graph, objective, v);
        assert!((key.value() - expected).abs() < 1e-12);
    }
}
