use crate::planning::state::RealVectorState;
use num_traits::Float;

/// Checks if a state or motion is valid (i.e., not in collision).
pub trait ValidityChecker<F: Float, const N: usize> {
    /// Checks if a state is collision free.
    fn is_state_valid(&self, state: &RealVectorState<F, N>) -> bool;

    /// Checks if the straight-line motion between two states is collision
    /// free.
    fn is_motion_valid(&self, a: &RealVectorState<F, N>, b: &RealVectorState<F, N>) -> bool;
}

/// A validity checker for obstacle-free spaces: every state and motion is
/// valid.
pub struct AlwaysValid;

impl<F: Float, const N: usize> ValidityChecker<F, N> for AlwaysValid {
    fn is_state_valid(&self, _state: &RealVectorState<F, N>) -> bool {
        true
    }

    fn is_motion_valid(&self, _a: &RealVectorState<F, N>, _b: &RealVectorState<F, N>) -> bool {
        true
    }
}
