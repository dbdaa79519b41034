use std::cmp::Ordering;
use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::common::{Constraint, ConstraintList, EPSILON};

/// Half-open window [t_min, t_max) during which a vertex may be occupied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SafeInterval {
    pub(crate) t_min: f64,
    pub(crate) t_max: f64,
}

impl SafeInterval {
    pub(crate) fn contains(&self, t: f64) -> bool {
        t > self.t_min - EPSILON && t < self.t_max - EPSILON
    }

    pub(crate) fn unbounded(&self) -> bool {
        self.t_max.is_infinite()
    }
}

/// One agent's constraint set reshaped for SIPP: unsafe vertex windows,
/// forbidden edge-start windows and mandated landmark moves. Input windows
/// arrive merged and ordered from the aggregator; complements stay
/// disjoint and ordered (invariant on every safe-interval list).
#[derive(Debug, Default)]
pub(crate) struct ConstraintTable {
    vertex_unsafe: HashMap<usize, Vec<(f64, f64)>>,
    edge_blocked: HashMap<(usize, usize), Vec<(f64, f64)>>,
    landmarks: Vec<Constraint>,
}

impl ConstraintTable {
    pub(crate) fn build(constraints: &ConstraintList) -> Self {
        let mut table = ConstraintTable::default();
        for constraint in constraints {
            if constraint.positive {
                table.landmarks.push(constraint.clone());
            } else if constraint.from == constraint.to {
                table
                    .vertex_unsafe
                    .entry(constraint.from)
                    .or_default()
                    .push((constraint.t_min, constraint.t_max));
            } else {
                table
                    .edge_blocked
                    .entry((constraint.from, constraint.to))
                    .or_default()
                    .push((constraint.t_min, constraint.t_max));
            }
        }
        table
            .landmarks
            .sort_by(|a, b| a.t_min.partial_cmp(&b.t_min).unwrap());
        table
    }

    /// Complement of the unsafe windows in [0, inf).
    pub(crate) fn safe_intervals(&self, vertex: usize) -> Vec<SafeInterval> {
        let mut intervals = Vec::new();
        let mut cursor = 0.0;
        if let Some(unsafe_windows) = self.vertex_unsafe.get(&vertex) {
            for &(lo, hi) in unsafe_windows {
                if lo > cursor + EPSILON {
                    intervals.push(SafeInterval {
                        t_min: cursor,
                        t_max: lo,
                    });
                }
                cursor = cursor.max(hi);
            }
        }
        intervals.push(SafeInterval {
            t_min: cursor,
            t_max: f64::INFINITY,
        });
        intervals
    }

    /// Earliest departure in [earliest, latest) not inside a forbidden
    /// window of the directed edge.
    pub(crate) fn earliest_allowed_start(
        &self,
        from: usize,
        to: usize,
        earliest: f64,
        latest: f64,
    ) -> Option<f64> {
        let mut depart = earliest;
        if let Some(blocked) = self.edge_blocked.get(&(from, to)) {
            for &(lo, hi) in blocked {
                if depart > lo - EPSILON && depart < hi - EPSILON {
                    depart = hi;
                }
            }
        }
        if depart < latest - EPSILON {
            Some(depart)
        } else {
            None
        }
    }

    /// Mandated moves, ordered by start time. The aggregator guarantees
    /// they never overlap.
    pub(crate) fn landmarks(&self) -> &[Constraint] {
        &self.landmarks
    }
}

/// SIPP search state: a vertex paired with one of its safe intervals.
/// g is the arrival time at the vertex inside that interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SippNode {
    pub(crate) vertex: usize,
    pub(crate) interval: usize,
    pub(crate) f: OrderedFloat<f64>,
    pub(crate) g: OrderedFloat<f64>,
}

impl Ord for SippNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f
            .cmp(&other.f)
            // Later arrival first on equal f, as in time-expanded A*.
            .then_with(|| other.g.cmp(&self.g))
            .then_with(|| self.interval.cmp(&other.interval))
            .then_with(|| self.vertex.cmp(&other.vertex))
    }
}

impl PartialOrd for SippNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
