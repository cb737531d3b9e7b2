pub mod neighbors;
pub mod objective;
pub mod problem;
pub mod sampling;
pub mod state;
pub mod termination;
pub mod validity_checker;

pub use neighbors::{KdTreeNearestNeighbors, LinearNearestNeighbors, NearestNeighbors};
pub use objective::{Cost, OptimizationObjective, PathLengthObjective};
pub use problem::ProblemDefinition;
pub use sampling::{EllipsoidInformedSampler, InformedSampler};
pub use state::RealVectorState;
pub use termination::{MaxIterationsTermination, NeverTerminate, TerminationCondition};
pub use validity_checker::{AlwaysValid, ValidityChecker};
