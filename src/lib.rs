//! Batch Informed Trees (BIT*), an anytime, asymptotically-optimal
//! sampling-based motion planner.
//!
//! The search interleaves two activities: drawing batches of random samples
//! from the informed subset of the space (the region that could still hold a
//! better path), and running an ordered, lazily-evaluated search over the
//! random geometric graph those samples induce. Collision checks are delayed
//! until an edge is provably worth checking, and every new solution tightens
//! the sampled region, the search queue and (optionally) the graph itself.
//!
//! ```no_run
//! use bitstar::bitstar::BITstar;
//! use bitstar::planning::{
//!     EllipsoidInformedSampler, KdTreeNearestNeighbors, MaxIterationsTermination,
//!     PathLengthObjective, ProblemDefinition, RealVectorState,
//! };
//! use bitstar::planning::validity_checker::AlwaysValid;
//!
//! let problem = ProblemDefinition::new(
//!     RealVectorState::new([0.0f64, 0.0]),
//!     RealVectorState::new([1.0, 0.0]),
//!     [(-0.5, 1.5), (-1.0, 1.0)],
//! );
//! let sampler = EllipsoidInformedSampler::new(&problem, 42).unwrap();
//! let mut planner = BITstar::<f64, 2, KdTreeNearestNeighbors<f64, 2>>::new(
//!     problem,
//!     Box::new(PathLengthObjective::new()),
//!     Box::new(AlwaysValid),
//!     Box::new(sampler),
//! );
//! planner.setup().unwrap();
//! let mut termination = MaxIterationsTermination::new(10_000);
//! let status = planner.solve(&mut termination).unwrap();
//! if status.has_solution() {
//!     let path = planner.solution_path().unwrap();
//!     println!("cost {:?}, {} states", planner.best_cost().value(), path.len());
//! }
//! ```

pub mod bitstar;
pub mod obstacles;
pub mod planning;
pub mod util;
