//! Analytic obstacles for building validity checkers in scenarios and tests.

use crate::planning::state::RealVectorState;
use crate::planning::validity_checker::ValidityChecker;
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// An obstacle with exact containment and segment-intersection predicates.
pub trait AnalyticObstacle<F: Float, const N: usize> {
    fn contains(&self, state: &RealVectorState<F, N>) -> bool;
    fn intersects_segment(&self, a: &RealVectorState<F, N>, b: &RealVectorState<F, N>) -> bool;
}

/// An axis-aligned hyper-rectangle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HyperRect<F: Float, const N: usize> {
    min_corner: RealVectorState<F, N>,
    max_corner: RealVectorState<F, N>,
}

impl<F: Float, const N: usize> HyperRect<F, N> {
    pub fn new(min_corner: RealVectorState<F, N>, max_corner: RealVectorState<F, N>) -> Self {
        debug_assert!((0..N).all(|i| min_corner[i] <= max_corner[i]));
        Self {
            min_corner,
            max_corner,
        }
    }

    pub fn min_corner(&self) -> &RealVectorState<F, N> {
        &self.min_corner
    }

    pub fn max_corner(&self) -> &RealVectorState<F, N> {
        &self.max_corner
    }
}

impl<F: Float, const N: usize> AnalyticObstacle<F, N> for HyperRect<F, N> {
    fn contains(&self, state: &RealVectorState<F, N>) -> bool {
        (0..N).all(|i| state[i] >= self.min_corner[i] && state[i] <= self.max_corner[i])
    }

    /// Liang-Barsky slab clipping: intersect the parametric segment
    /// p(t) = a + t (b - a) with each axis slab and keep the common interval.
    fn intersects_segment(&self, a: &RealVectorState<F, N>, b: &RealVectorState<F, N>) -> bool {
        let direction = b - a;
        let mut t_min = F::zero();
        let mut t_max = F::one();

        for i in 0..N {
            let origin = a[i];
            let d = direction[i];
            if d == F::zero() {
                // Parallel to the slab: outside means no hit at all.
                if origin < self.min_corner[i] || origin > self.max_corner[i] {
                    return false;
                }
            } else {
                let inv_d = F::one() / d;
                let mut t1 = (self.min_corner[i] - origin) * inv_d;
                let mut t2 = (self.max_corner[i] - origin) * inv_d;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return false;
                }
            }
        }
        true
    }
}

/// A solid hyper-sphere.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HyperSphere<F: Float, const N: usize> {
    center: RealVectorState<F, N>,
    radius: F,
}

impl<F: Float, const N: usize> HyperSphere<F, N> {
    pub fn new(center: RealVectorState<F, N>, radius: F) -> Self {
        Self { center, radius }
    }

    pub fn center(&self) -> &RealVectorState<F, N> {
        &self.center
    }

    pub fn radius(&self) -> F {
        self.radius
    }
}

impl<F: Float, const N: usize> AnalyticObstacle<F, N> for HyperSphere<F, N> {
    fn contains(&self, state: &RealVectorState<F, N>) -> bool {
        self.center.euclidean_distance_squared(state) < self.radius * self.radius
    }

    /// Solves |a + t (b - a) - center|^2 = r^2 for t and checks for a root in
    /// [0, 1].
    fn intersects_segment(&self, a: &RealVectorState<F, N>, b: &RealVectorState<F, N>) -> bool {
        if self.contains(a) || self.contains(b) {
            return true;
        }
        let direction = b - a;
        let offset = a - &self.center;
        let two = F::from(2.0).unwrap();
        let qa = direction.dot(&direction);
        let qb = two * offset.dot(&direction);
        let qc = offset.dot(&offset) - self.radius * self.radius;
        let discriminant = qb * qb - two * two * qa * qc;
        if discriminant < F::zero() {
            return false;
        }
        let sqrt_discriminant = discriminant.sqrt();
        let t1 = (-qb - sqrt_discriminant) / (two * qa);
        let t2 = (-qb + sqrt_discriminant) / (two * qa);
        (t1 >= F::zero() && t1 <= F::one()) || (t2 >= F::zero() && t2 <= F::one())
    }
}

/// Rejects states inside any obstacle and motions crossing any obstacle.
pub struct ObstacleValidityChecker<F: Float, const N: usize, O: AnalyticObstacle<F, N>> {
    obstacles: Vec<O>,
    _phantom: std::marker::PhantomData<F>,
}

impl<F: Float, const N: usize, O: AnalyticObstacle<F, N>> ObstacleValidityChecker<F, N, O> {
    pub fn new(obstacles: Vec<O>) -> Self {
        Self {
            obstacles,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<F: Float, const N: usize, O: AnalyticObstacle<F, N>> ValidityChecker<F, N>
    for ObstacleValidityChecker<F, N, O>
{
    fn is_state_valid(&self, state: &RealVectorState<F, N>) -> bool {
        self.obstacles.iter().all(|o| !o.contains(state))
    }

    fn is_motion_valid(&self, a: &RealVectorState<F, N>, b: &RealVectorState<F, N>) -> bool {
        self.obstacles.iter().all(|o| !o.intersects_segment(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_containment_and_clipping() {
        let rect = HyperRect::new(
            RealVectorState::new([0.4, -0.1]),
            RealVectorState::new([0.6, 0.1]),
        );
        assert!(rect.contains(&RealVectorState::new([0.5, 0.0])));
        assert!(!rect.contains(&RealVectorState::new([0.5, 0.2])));

        // Straight through the middle.
        assert!(rect.intersects_segment(
            &RealVectorState::new([0.0, 0.0]),
            &RealVectorState::new([1.0, 0.0]),
        ));
        // Passing above.
        assert!(!rect.intersects_segment(
            &RealVectorState::new([0.0, 0.2]),
            &RealVectorState::new([1.0, 0.2]),
        ));
        // Vertical segment parallel to a slab, inside it.
        assert!(rect.intersects_segment(
            &RealVectorState::new([0.5, -1.0]),
            &RealVectorState::new([0.5, 1.0]),
        ));
        // Stopping short of the rectangle.
        assert!(!rect.intersects_segment(
            &RealVectorState::new([0.0, 0.0]),
            &RealVectorState::new([0.3, 0.0]),
        ));
    }

    #[test]
    fn sphere_containment_and_clipping() {
        let sphere = HyperSphere::new(RealVectorState::new([0.5, 0.0]), 0.2);
        assert!(sphere.contains(&RealVectorState::new([0.5, 0.1])));
        assert!(!sphere.contains(&RealVectorState::new([0.5, 0.3])));

        assert!(sphere.intersects_segment(
            &RealVectorState::new([0.0, 0.0]),
            &RealVectorState::new([1.0, 0.0]),
        ));
        assert!(!sphere.intersects_segment(
            &RealVectorState::new([0.0, 0.3]),
            &RealVectorState::new([1.0, 0.3]),
        ));
        // Both endpoints outside, segment ending before the sphere.
        assert!(!sphere.intersects_segment(
            &RealVectorState::new([0.0, 0.0]),
            &RealVectorState::new([0.2, 0.0]),
        ));
    }

    #[test]
    fn checker_combines_obstacles() {
        let checker = ObstacleValidityChecker::new(vec![
            HyperSphere::new(RealVectorState::new([0.3, 0.0]), 0.1),
            HyperSphere::new(RealVectorState::new([0.7, 0.0]), 0.1),
        ]);
        assert!(!checker.is_state_valid(&RealVectorState::new([0.3, 0.05])));
        assert!(checker.is_state_valid(&RealVectorState::new([0.5, 0.0])));
        assert!(!checker.is_motion_valid(
            &RealVectorState::new([0.0, 0.0]),
            &RealVectorState::new([1.0, 0.0]),
        ));
        assert!(checker.is_motion_valid(
            &RealVectorState::new([0.0, 0.2]),
            &RealVectorState::new([1.0, 0.2]),
        ));
    }
}
