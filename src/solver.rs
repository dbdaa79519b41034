mod algorithm;
mod ccbs;
mod conflict;
mod heuristic;
mod symmetry;

pub use ccbs::CCBS;

use crate::common::{Solution, SolverError};

pub trait Solver {
    fn solve(&mut self) -> Result<Solution, SolverError>;
}
