use crate::planning::state::RealVectorState;
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The outcome of a `solve` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlannerStatus {
    /// A path from the start to the goal was found.
    ExactSolution,
    /// A path ending near, but not at, the goal was found. Not produced by
    /// this planner; part of the status surface for callers that handle
    /// both.
    ApproximateSolution,
    /// The termination condition fired before any solution was found.
    Unsolved,
}

impl PlannerStatus {
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            PlannerStatus::ExactSolution | PlannerStatus::ApproximateSolution
        )
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, PlannerStatus::ApproximateSolution)
    }
}

impl fmt::Display for PlannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlannerStatus::ExactSolution => "ExactSolution",
            PlannerStatus::ApproximateSolution => "ApproximateSolution",
            PlannerStatus::Unsolved => "Unsolved",
        };
        write!(f, "{}", s)
    }
}

/// Configuration and usage errors. Search-time failures (a rejected edge, a
/// failed collision check, an exhausted batch) are normal control flow and
/// never surface here.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("invalid problem definition: {0}")]
    InvalidProblem(String),

    #[error("parameter out of range: {0}")]
    InvalidParameter(String),

    #[error("the planner is not set up; call setup() after fixing: {0}")]
    NotSetup(String),
}

/// A snapshot of the planner's graph for visualization and analysis: the
/// disconnected samples plus the tree as parent-to-child state pairs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerData<F: Float, const N: usize> {
    pub start: RealVectorState<F, N>,
    pub goal: RealVectorState<F, N>,
    pub samples: Vec<RealVectorState<F, N>>,
    pub edges: Vec<(RealVectorState<F, N>, RealVectorState<F, N>)>,
    pub has_solution: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_flags() {
        assert!(PlannerStatus::ExactSolution.has_solution());
        assert!(!PlannerStatus::ExactSolution.is_approximate());
        assert!(PlannerStatus::ApproximateSolution.is_approximate());
        assert!(!PlannerStatus::Unsolved.has_solution());
        assert_eq!(PlannerStatus::ExactSolution.to_string(), "ExactSolution");
    }
}
