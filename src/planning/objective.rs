use crate::planning::state::RealVectorState;
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// The cost of a motion or of a path through the tree.
///
/// Costs are opaque to the planner: they are only ever combined and compared
/// through an [`OptimizationObjective`], never through the native float
/// ordering. This keeps the planner correct for objectives whose costs are
/// not totally ordered.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Cost<F>(F);

impl<F: Float> Cost<F> {
    pub fn new(value: F) -> Self {
        Self(value)
    }

    pub fn value(&self) -> F {
        self.0
    }
}

/// Defines what "optimal" means for a planning problem.
///
/// The single ordering primitive is [`is_cost_better_than`]; every other
/// comparison is derived from it, so equality means "neither is better".
///
/// [`is_cost_better_than`]: OptimizationObjective::is_cost_better_than
pub trait OptimizationObjective<F: Float, const N: usize> {
    /// The cost of an unreachable state.
    fn infinite_cost(&self) -> Cost<F> {
        Cost::new(F::infinity())
    }

    /// The cost of the empty motion.
    fn identity_cost(&self) -> Cost<F> {
        Cost::new(F::zero())
    }

    /// The true cost of the motion between two states, assuming it is
    /// collision free.
    fn motion_cost(&self, a: &RealVectorState<F, N>, b: &RealVectorState<F, N>) -> Cost<F>;

    /// An admissible estimate of the motion cost between two states: never
    /// greater than [`motion_cost`](OptimizationObjective::motion_cost).
    fn motion_cost_heuristic(&self, a: &RealVectorState<F, N>, b: &RealVectorState<F, N>)
        -> Cost<F>;

    /// Composes the costs of two consecutive motions.
    fn combine_costs(&self, a: Cost<F>, b: Cost<F>) -> Cost<F>;

    /// Returns true if `a` is strictly better than `b`. This is the only
    /// ordering primitive.
    fn is_cost_better_than(&self, a: Cost<F>, b: Cost<F>) -> bool;

    /// Returns true if a solution of cost `cost` is good enough to stop
    /// searching.
    fn is_satisfied(&self, cost: Cost<F>) -> bool;

    /// Composes three consecutive motion costs.
    fn combine_costs_3(&self, a: Cost<F>, b: Cost<F>, c: Cost<F>) -> Cost<F> {
        self.combine_costs(self.combine_costs(a, b), c)
    }

    /// If `b` is better than `a`, then `a` is worse than `b`.
    fn is_cost_worse_than(&self, a: Cost<F>, b: Cost<F>) -> bool {
        self.is_cost_better_than(b, a)
    }

    /// If neither cost is better than the other, they are equivalent.
    fn is_cost_equivalent_to(&self, a: Cost<F>, b: Cost<F>) -> bool {
        !self.is_cost_better_than(a, b) && !self.is_cost_better_than(b, a)
    }

    /// If `b` is not better than `a`, then `a` is better than or equivalent
    /// to `b`.
    fn is_cost_better_than_or_equivalent_to(&self, a: Cost<F>, b: Cost<F>) -> bool {
        !self.is_cost_better_than(b, a)
    }

    /// If `a` is not better than `b`, then `a` is worse than or equivalent
    /// to `b`.
    fn is_cost_worse_than_or_equivalent_to(&self, a: Cost<F>, b: Cost<F>) -> bool {
        !self.is_cost_better_than(a, b)
    }

    /// Returns the better of the two costs.
    fn better_cost(&self, a: Cost<F>, b: Cost<F>) -> Cost<F> {
        if self.is_cost_better_than(b, a) {
            b
        } else {
            a
        }
    }

    /// A cost is finite if it is better than the infinite cost.
    fn is_finite_cost(&self, a: Cost<F>) -> bool {
        self.is_cost_better_than(a, self.infinite_cost())
    }
}

/// Minimizes Euclidean path length.
///
/// The motion cost heuristic is the straight-line distance, which is exact
/// for collision-free motions, so the heuristic is both admissible and tight.
pub struct PathLengthObjective<F: Float> {
    cost_threshold: F,
}

impl<F: Float> PathLengthObjective<F> {
    /// An objective that is never satisfied early: the planner refines the
    /// solution until its termination condition fires.
    pub fn new() -> Self {
        Self {
            cost_threshold: F::zero(),
        }
    }

    /// An objective that is satisfied by any solution no longer than
    /// `threshold`.
    pub fn with_cost_threshold(threshold: F) -> Self {
        Self {
            cost_threshold: threshold,
        }
    }
}

impl<F: Float> Default for PathLengthObjective<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float, const N: usize> OptimizationObjective<F, N> for PathLengthObjective<F> {
    fn motion_cost(&self, a: &RealVectorState<F, N>, b: &RealVectorState<F, N>) -> Cost<F> {
        Cost::new(a.euclidean_distance(b))
    }

    fn motion_cost_heuristic(
        &self,
        a: &RealVectorState<F, N>,
        b: &RealVectorState<F, N>,
    ) -> Cost<F> {
        Cost::new(a.euclidean_distance(b))
    }

    fn combine_costs(&self, a: Cost<F>, b: Cost<F>) -> Cost<F> {
        Cost::new(a.value() + b.value())
    }

    fn is_cost_better_than(&self, a: Cost<F>, b: Cost<F>) -> bool {
        a.value() < b.value()
    }

    fn is_satisfied(&self, cost: Cost<F>) -> bool {
        OptimizationObjective::<F, N>::is_cost_better_than_or_equivalent_to(
            self,
            cost,
            Cost::new(self.cost_threshold),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective() -> PathLengthObjective<f64> {
        PathLengthObjective::new()
    }

    #[test]
    fn derived_comparisons_follow_the_primitive() {
        let obj = objective();
        let obj: &dyn OptimizationObjective<f64, 2> = &obj;
        let a = Cost::new(1.0);
        let b = Cost::new(2.0);
        assert!(obj.is_cost_better_than(a, b));
        assert!(obj.is_cost_worse_than(b, a));
        assert!(obj.is_cost_equivalent_to(a, Cost::new(1.0)));
        assert!(!obj.is_cost_equivalent_to(a, b));
        assert!(obj.is_cost_better_than_or_equivalent_to(a, a));
        assert!(obj.is_cost_worse_than_or_equivalent_to(b, a));
        assert!((obj.better_cost(a, b).value() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn infinite_cost_is_not_finite() {
        let obj = objective();
        let obj: &dyn OptimizationObjective<f64, 2> = &obj;
        assert!(!obj.is_finite_cost(obj.infinite_cost()));
        assert!(obj.is_finite_cost(Cost::new(1e12)));
    }

    #[test]
    fn satisfaction_threshold() {
        let strict = PathLengthObjective::<f64>::new();
        let strict: &dyn OptimizationObjective<f64, 2> = &strict;
        assert!(!strict.is_satisfied(Cost::new(0.1)));

        let relaxed = PathLengthObjective::with_cost_threshold(1.5);
        let relaxed: &dyn OptimizationObjective<f64, 2> = &relaxed;
        assert!(relaxed.is_satisfied(Cost::new(1.5)));
        assert!(relaxed.is_satisfied(Cost::new(1.2)));
        assert!(!relaxed.is_satisfied(Cost::new(1.6)));
    }

    #[test]
    fn combine_costs_3_composes_left_to_right() {
        let obj = objective();
        let obj: &dyn OptimizationObjective<f64, 2> = &obj;
        let c = obj.combine_costs_3(Cost::new(1.0), Cost::new(2.0), Cost::new(3.0));
        assert!((c.value() - 6.0).abs() < 1e-12);
    }
}
