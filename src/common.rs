mod highlevel;
mod lowlevel;

pub(crate) use highlevel::{
    gather_constraints, CardinalType, Conflict, Constraint, ConstraintList,
};
pub(crate) use lowlevel::{ConstraintTable, SafeInterval, SippNode};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::geometry;
use crate::map::Roadmap;

/// Shared tolerance for all strict/non-strict time and distance comparisons.
pub const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: usize,
    pub goal: usize,
}

impl Agent {
    pub fn verify(&self, map: &Roadmap) -> bool {
        map.contains(self.start) && map.contains(self.goal)
    }
}

/// One timed motion of an agent: traverse edge (from, to) during
/// [t_start, t_end). A wait has from == to; the final goal dwell has
/// t_end == +inf.
#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    pub from: usize,
    pub to: usize,
    pub t_start: f64,
    pub t_end: f64,
}

impl Move {
    pub fn new(from: usize, to: usize, t_start: f64, t_end: f64) -> Self {
        Move {
            from,
            to,
            t_start,
            t_end,
        }
    }

    pub fn is_wait(&self) -> bool {
        self.from == self.to
    }

    pub fn duration(&self) -> f64 {
        self.t_end - self.t_start
    }
}

pub type Path = Vec<Move>;

/// Finish time of a path; 0 for an empty one.
pub fn path_duration(path: &Path) -> f64 {
    path.iter()
        .filter(|mv| mv.t_end.is_finite())
        .map(|mv| mv.t_end)
        .fold(0.0, f64::max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsolvedReason {
    Timeout,
    StepLimit,
    Infeasible,
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal assertion failed: {0}")]
    InternalAssertionFailed(String),
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub found: bool,
    pub flowtime: f64,
    pub makespan: f64,
    pub time: f64,
    pub reason: Option<UnsolvedReason>,
    pub high_level_expanded: usize,
    pub low_level_expanded: usize,
    pub paths: Vec<Path>,
}

impl Solution {
    pub(crate) fn unsolved(reason: UnsolvedReason) -> Self {
        Solution {
            found: false,
            flowtime: 0.0,
            makespan: 0.0,
            time: 0.0,
            reason: Some(reason),
            high_level_expanded: 0,
            low_level_expanded: 0,
            paths: Vec::new(),
        }
    }

    pub fn verify(&self, map: &Roadmap, agents: &[Agent], radius: f64) -> bool {
        if !self.found {
            return true;
        }

        if self.paths.len() != agents.len() {
            error!("incomplete solution");
            return false;
        }

        for (path, agent) in self.paths.iter().zip(agents.iter()) {
            let Some(first) = path.first() else {
                error!("empty path for agent {}", agent.id);
                return false;
            };
            if first.from != agent.start || first.t_start.abs() > EPSILON {
                error!(
                    "agent {} must leave {} at t=0, path starts with {:?}",
                    agent.id, agent.start, first
                );
                return false;
            }
            if path.last().is_none_or(|last| last.to != agent.goal) {
                error!("agent {} does not end at goal {}", agent.id, agent.goal);
                return false;
            }

            for window in path.windows(2) {
                if let [prev, next] = window {
                    if prev.to != next.from || (prev.t_end - next.t_start).abs() > EPSILON {
                        error!("discontinuous move pair {prev:?} -> {next:?}");
                        return false;
                    }
                }
            }

            for mv in path {
                if !mv.is_wait() && !map.has_edge(mv.from, mv.to) {
                    error!("move over missing edge {mv:?}");
                    return false;
                }
                if mv.duration() < -EPSILON {
                    error!("negative duration move {mv:?}");
                    return false;
                }
            }
        }

        // Pairwise separation over every instant, goal dwells included.
        for i in 0..self.paths.len() {
            for j in (i + 1)..self.paths.len() {
                let moves_i = with_goal_dwell(&self.paths[i]);
                let moves_j = with_goal_dwell(&self.paths[j]);
                for move_i in &moves_i {
                    for move_j in &moves_j {
                        if geometry::moves_collide(move_i, move_j, map, radius) {
                            error!("agents {i} and {j} collide: {move_i:?} vs {move_j:?}");
                            return false;
                        }
                    }
                }
            }
        }

        true
    }

    /// One `<agent>` block per agent listing each move's vertex pair and
    /// half-open time window.
    pub fn log_solution(&self) {
        let mut formatted = String::new();
        for (index, path) in self.paths.iter().enumerate() {
            formatted.push_str(&format!("<agent id=\"{index}\">\n"));
            for mv in path {
                formatted.push_str(&format!(
                    "  {} -> {} [{:.6}, {:.6})\n",
                    mv.from, mv.to, mv.t_start, mv.t_end
                ));
            }
            formatted.push_str("</agent>\n");
        }
        debug!("solution:\n{}", formatted);
    }
}

/// Path extended with the infinite dwell at its last vertex; used wherever
/// "the agent parks at its goal forever" matters.
pub(crate) fn with_goal_dwell(path: &Path) -> Vec<Move> {
    let mut moves = path.clone();
    if let Some(last) = path.last() {
        moves.push(Move::new(last.to, last.to, last.t_end, f64::INFINITY));
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_duration_ignores_infinite_dwell() {
        let path = vec![
            Move::new(0, 1, 0.0, 1.0),
            Move::new(1, 1, 1.0, 2.5),
            Move::new(1, 2, 2.5, 3.5),
        ];
        assert!((path_duration(&path) - 3.5).abs() < EPSILON);
        let extended = with_goal_dwell(&path);
        assert_eq!(extended.len(), 4);
        assert!(extended.last().unwrap().t_end.is_infinite());
        assert!((path_duration(&extended) - 3.5).abs() < EPSILON);
    }

    #[test]
    fn test_verify_rejects_discontinuous_path() {
        let map = Roadmap::new(
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)],
            &[(0, 1), (1, 2)],
        )
        .unwrap();
        let agents = vec![Agent {
            id: 0,
            start: 0,
            goal: 2,
        }];
        let solution = Solution {
            found: true,
            flowtime: 2.0,
            makespan: 2.0,
            time: 0.0,
            reason: None,
            high_level_expanded: 1,
            low_level_expanded: 1,
            paths: vec![vec![Move::new(0, 1, 0.0, 1.0), Move::new(1, 2, 1.5, 2.5)]],
        };
        assert!(!solution.verify(&map, &agents, 0.3));
    }
}
