use crate::planning::objective::Cost;
use crate::planning::problem::ProblemDefinition;
use crate::planning::state::RealVectorState;
use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws states from the subset of the space that could still improve the
/// current solution.
///
/// The current best cost is passed to every call instead of being shared
/// through the planner: the planner is the single writer and the sampler only
/// ever reads the value it is handed.
pub trait InformedSampler<F: Float, const N: usize> {
    /// Draws one state, uniformly over the informed subset for the given best
    /// cost (uniformly over the whole bounded space while no solution
    /// exists).
    fn sample_uniform(&mut self, best_cost: Cost<F>) -> RealVectorState<F, N>;

    /// Whether [`informed_measure`](InformedSampler::informed_measure)
    /// reports a genuine informed-subset measure rather than the measure of
    /// the whole space.
    fn has_informed_measure(&self) -> bool;

    /// The Lebesgue measure of the informed subset for the given best cost,
    /// never exceeding the measure of the bounded space.
    fn informed_measure(&self, best_cost: Cost<F>) -> F;
}

/// Samples the prolate hyperspheroid whose focii are the start and goal and
/// whose transverse diameter is the current best path length.
///
/// Sampling is direct: a point drawn uniformly in the unit ball is stretched
/// onto the hyperspheroid's axes and reflected so that the first axis aligns
/// with the start-goal direction (a Householder reflection, which needs no
/// general rotation matrix). Points falling outside the problem bounds are
/// redrawn.
pub struct EllipsoidInformedSampler<F: Float, const N: usize> {
    bounds: [(F, F); N],
    /// Distance between the focii: the theoretical minimum path cost.
    min_transverse_cost: F,
    centre: RealVectorState<F, N>,
    /// Householder vector mapping the first canonical axis onto the
    /// transverse axis. None when the two already coincide.
    householder: Option<[F; N]>,
    rng: StdRng,
}

/// Bounded retries before falling back to a plain uniform draw. The informed
/// set always intersects the bounds, so the fallback is a rare numerical
/// escape hatch.
const MAX_INFORMED_ATTEMPTS: usize = 100;

impl<F: Float, const N: usize> EllipsoidInformedSampler<F, N> {
    /// Creates a sampler for the given problem, seeded for reproducibility.
    pub fn new(problem: &ProblemDefinition<F, N>, seed: u64) -> Result<Self, String> {
        if !problem.has_valid_bounds() {
            return Err("every bound must be a non-empty interval".to_string());
        }
        let start = problem.start_states()[0];
        let goal = *problem.goal();
        if !problem.contains(&start) || !problem.contains(&goal) {
            return Err("start and goal must lie within the bounds".to_string());
        }

        let min_transverse_cost = start.euclidean_distance(&goal);
        let centre = (&start + &goal) / F::from(2.0).unwrap();

        // Householder vector w ∝ (e1 - a1), where a1 is the unit transverse
        // axis. The reflection I - 2wwᵀ maps e1 to a1.
        let householder = if min_transverse_cost > F::zero() {
            let axis = (&goal - &start) / min_transverse_cost;
            let mut w = [F::zero(); N];
            for i in 0..N {
                w[i] = -axis[i];
            }
            w[0] = w[0] + F::one();
            let norm = w
                .iter()
                .fold(F::zero(), |acc, &v| acc + v * v)
                .sqrt();
            if norm > F::from(1e-9).unwrap() {
                for v in w.iter_mut() {
                    *v = *v / norm;
                }
                Some(w)
            } else {
                None
            }
        } else {
            None
        };

        Ok(Self {
            bounds: *problem.bounds(),
            min_transverse_cost,
            centre,
            householder,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// The measure of the whole bounded space.
    pub fn space_measure(&self) -> F {
        self.bounds
            .iter()
            .fold(F::one(), |acc, &(lo, hi)| acc * (hi - lo))
    }

    /// The distance between the focii.
    pub fn minimum_transverse_cost(&self) -> F {
        self.min_transverse_cost
    }

    fn in_bounds(&self, state: &RealVectorState<F, N>) -> bool {
        (0..N).all(|i| state[i] >= self.bounds[i].0 && state[i] <= self.bounds[i].1)
    }

    fn uniform_in_bounds(&mut self) -> RealVectorState<F, N> {
        let mut values = [F::zero(); N];
        for i in 0..N {
            let u = F::from(self.rng.gen::<f64>()).unwrap();
            let (lo, hi) = self.bounds[i];
            values[i] = lo + (hi - lo) * u;
        }
        RealVectorState::new(values)
    }

    /// Uniform sample in the unit N-ball by rejection from the enclosing
    /// cube. Acceptance shrinks with dimension; fine for the low dimensions
    /// this planner targets.
    fn uniform_in_unit_ball(&mut self) -> [F; N] {
        loop {
            let mut values = [F::zero(); N];
            let mut norm_squared = 0.0f64;
            for value in values.iter_mut() {
                let u = self.rng.gen::<f64>() * 2.0 - 1.0;
                norm_squared += u * u;
                *value = F::from(u).unwrap();
            }
            if norm_squared <= 1.0 {
                return values;
            }
        }
    }

    fn sample_hyperspheroid(&mut self, transverse_diameter: F) -> RealVectorState<F, N> {
        let two = F::from(2.0).unwrap();
        let r_transverse = transverse_diameter / two;
        let r_conjugate = (transverse_diameter * transverse_diameter
            - self.min_transverse_cost * self.min_transverse_cost)
            .sqrt()
            / two;

        let ball = self.uniform_in_unit_ball();
        let mut stretched = [F::zero(); N];
        stretched[0] = ball[0] * r_transverse;
        for i in 1..N {
            stretched[i] = ball[i] * r_conjugate;
        }

        let rotated = match &self.householder {
            Some(w) => {
                let dot = (0..N).fold(F::zero(), |acc, i| acc + w[i] * stretched[i]);
                let mut values = [F::zero(); N];
                for i in 0..N {
                    values[i] = stretched[i] - two * w[i] * dot;
                }
                values
            }
            None => stretched,
        };

        &self.centre + &RealVectorState::new(rotated)
    }
}

impl<F: Float, const N: usize> InformedSampler<F, N> for EllipsoidInformedSampler<F, N> {
    fn sample_uniform(&mut self, best_cost: Cost<F>) -> RealVectorState<F, N> {
        let c = best_cost.value();
        if !c.is_finite() || c <= self.min_transverse_cost {
            return self.uniform_in_bounds();
        }
        for _ in 0..MAX_INFORMED_ATTEMPTS {
            let state = self.sample_hyperspheroid(c);
            if self.in_bounds(&state) {
                return state;
            }
        }
        self.uniform_in_bounds()
    }

    fn has_informed_measure(&self) -> bool {
        true
    }

    fn informed_measure(&self, best_cost: Cost<F>) -> F {
        let c = best_cost.value();
        if !c.is_finite() {
            return self.space_measure();
        }
        let c = c.to_f64().unwrap();
        let c_min = self.min_transverse_cost.to_f64().unwrap();
        if c <= c_min {
            return F::zero();
        }

        let dim = N as f64;
        let zeta = std::f64::consts::PI.powf(dim / 2.0)
            / special::Gamma::gamma(dim / 2.0 + 1.0);
        let r_transverse = c / 2.0;
        let r_conjugate = (c * c - c_min * c_min).sqrt() / 2.0;
        let measure = zeta * r_transverse * r_conjugate.powi(N as i32 - 1);

        let measure = F::from(measure).unwrap();
        let space = self.space_measure();
        if measure < space {
            measure
        } else {
            space
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> ProblemDefinition<f64, 2> {
        ProblemDefinition::new(
            RealVectorState::new([0.0, 0.0]),
            RealVectorState::new([1.0, 0.0]),
            [(-1.0, 2.0), (-1.5, 1.5)],
        )
    }

    #[test]
    fn uniform_draws_stay_in_bounds() {
        let problem = problem();
        let mut sampler = EllipsoidInformedSampler::new(&problem, 7).unwrap();
        for _ in 0..200 {
            let s = sampler.sample_uniform(Cost::new(f64::INFINITY));
            assert!(problem.contains(&s));
        }
    }

    #[test]
    fn informed_draws_stay_inside_the_hyperspheroid() {
        let problem = problem();
        let mut sampler = EllipsoidInformedSampler::new(&problem, 7).unwrap();
        let best = Cost::new(1.5);
        let start = RealVectorState::new([0.0, 0.0]);
        let goal = RealVectorState::new([1.0, 0.0]);
        for _ in 0..500 {
            let s = sampler.sample_uniform(best);
            let through = start.euclidean_distance(&s) + s.euclidean_distance(&goal);
            assert!(through <= 1.5 + 1e-9);
            assert!(problem.contains(&s));
        }
    }

    #[test]
    fn informed_measure_matches_the_ellipse_area() {
        let problem = problem();
        let sampler = EllipsoidInformedSampler::new(&problem, 7).unwrap();
        // Ellipse with transverse diameter 1.5 and focal distance 1.0:
        // semi-axes 0.75 and sqrt(1.5^2 - 1)/2.
        let expected = std::f64::consts::PI * 0.75 * (1.5f64 * 1.5 - 1.0).sqrt() / 2.0;
        let measure = sampler.informed_measure(Cost::new(1.5));
        assert!((measure - expected).abs() < 1e-9);
        // Without a solution, the informed set is the whole space.
        let unbounded = sampler.informed_measure(Cost::new(f64::INFINITY));
        assert!((unbounded - 9.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_degenerate_problems() {
        let bad_bounds = ProblemDefinition::new(
            RealVectorState::new([0.0, 0.0]),
            RealVectorState::new([1.0, 0.0]),
            [(0.0, 0.0), (-1.0, 1.0)],
        );
        assert!(EllipsoidInformedSampler::new(&bad_bounds, 0).is_err());

        let outside = ProblemDefinition::new(
            RealVectorState::new([-5.0, 0.0]),
            RealVectorState::new([1.0, 0.0]),
            [(-1.0, 2.0), (-1.0, 1.0)],
        );
        assert!(EllipsoidInformedSampler::new(&outside, 0).is_err());
    }
}
