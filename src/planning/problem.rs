use crate::planning::state::RealVectorState;
use num_traits::Float;

/// The definition of a planning query: where to start, where to go, and the
/// axis-aligned bounds of the space to search.
#[derive(Clone, Debug)]
pub struct ProblemDefinition<F: Float, const N: usize> {
    start_states: Vec<RealVectorState<F, N>>,
    goal: RealVectorState<F, N>,
    bounds: [(F, F); N],
}

impl<F: Float, const N: usize> ProblemDefinition<F, N> {
    /// Creates a problem with a single start state.
    pub fn new(
        start: RealVectorState<F, N>,
        goal: RealVectorState<F, N>,
        bounds: [(F, F); N],
    ) -> Self {
        Self {
            start_states: vec![start],
            goal,
            bounds,
        }
    }

    /// Adds an additional start state. The planner only supports exactly one
    /// start state and will refuse to set up with more.
    pub fn add_start_state(&mut self, start: RealVectorState<F, N>) {
        self.start_states.push(start);
    }

    pub fn start_states(&self) -> &[RealVectorState<F, N>] {
        &self.start_states
    }

    pub fn goal(&self) -> &RealVectorState<F, N> {
        &self.goal
    }

    pub fn bounds(&self) -> &[(F, F); N] {
        &self.bounds
    }

    /// The dimension of the state space.
    pub fn state_dimension(&self) -> usize {
        N
    }

    /// The Lebesgue measure of the bounded space.
    pub fn space_measure(&self) -> F {
        self.bounds
            .iter()
            .fold(F::one(), |acc, &(lo, hi)| acc * (hi - lo))
    }

    /// Checks that every bound is a non-empty interval.
    pub fn has_valid_bounds(&self) -> bool {
        self.bounds.iter().all(|&(lo, hi)| lo < hi)
    }

    /// Checks if a state lies within the bounds.
    pub fn contains(&self, state: &RealVectorState<F, N>) -> bool {
        (0..N).all(|i| state[i] >= self.bounds[i].0 && state[i] <= self.bounds[i].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_and_containment() {
        let problem = ProblemDefinition::new(
            RealVectorState::new([0.0f64, 0.0]),
            RealVectorState::new([1.0, 0.0]),
            [(0.0, 1.0), (-0.5, 0.5)],
        );
        assert!(problem.has_valid_bounds());
        assert!((problem.space_measure() - 1.0).abs() < 1e-12);
        assert!(problem.contains(&RealVectorState::new([0.5, 0.25])));
        assert!(!problem.contains(&RealVectorState::new([0.5, 0.75])));
    }
}
