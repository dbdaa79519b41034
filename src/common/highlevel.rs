use crate::common::{Move, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum CardinalType {
    Cardinal,
    SemiCardinal,
    NonCardinal,
    Unknown,
}

impl CardinalType {
    /// Branching preference rank, lower first.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            CardinalType::Cardinal => 0,
            CardinalType::SemiCardinal => 1,
            CardinalType::NonCardinal => 2,
            CardinalType::Unknown => 3,
        }
    }
}

/// A single CCBS constraint.
///
/// Negative: the agent may not start traversing the directed edge
/// (from, to) at any time in [t_min, t_max). A wait edge (from == to)
/// forbids being at the vertex during the window.
/// Positive: the agent must start traversing (from, to) at exactly t_min,
/// arriving at t_max. Only real traversals are ever mandated.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Constraint {
    pub(crate) agent: usize,
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) t_min: f64,
    pub(crate) t_max: f64,
    pub(crate) positive: bool,
}

impl Constraint {
    pub(crate) fn negative(agent: usize, from: usize, to: usize, window: (f64, f64)) -> Self {
        Constraint {
            agent,
            from,
            to,
            t_min: window.0,
            t_max: window.1,
            positive: false,
        }
    }

    pub(crate) fn positive(agent: usize, mv: &Move) -> Self {
        Constraint {
            agent,
            from: mv.from,
            to: mv.to,
            t_min: mv.t_start,
            t_max: mv.t_end,
            positive: true,
        }
    }

    /// Does a negative constraint forbid this exact move?
    pub(crate) fn forbids(&self, mv: &Move) -> bool {
        !self.positive
            && self.from == mv.from
            && self.to == mv.to
            && mv.t_start > self.t_min - EPSILON
            && mv.t_start < self.t_max - EPSILON
    }
}

/// Geometric conflict between two timed moves, annotated lazily with its
/// classification and the replanning cost deltas of each side.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Conflict {
    pub(crate) agent_1: usize,
    pub(crate) agent_2: usize,
    pub(crate) move_1: Move,
    pub(crate) move_2: Move,
    /// Unsafe start-time window for move_1 while move_2 stays fixed.
    pub(crate) interval_1: (f64, f64),
    /// Unsafe start-time window for move_2 while move_1 stays fixed.
    pub(crate) interval_2: (f64, f64),
    pub(crate) cardinal_type: CardinalType,
    pub(crate) overcost_1: f64,
    pub(crate) overcost_2: f64,
}

impl Conflict {
    /// Start time of the earlier participating move.
    pub(crate) fn earliest_start(&self) -> f64 {
        self.move_1.t_start.min(self.move_2.t_start)
    }
}

pub(crate) type ConstraintList = Vec<Constraint>;

/// Collect one agent's constraints from the root-to-node chain of
/// per-node additions, merging overlapping negative windows per directed
/// edge. Returns None when the set is contradictory (two different
/// mandated moves overlapping in time, or a mandated start inside a
/// forbidden window), which marks the node infeasible.
pub(crate) fn gather_constraints<'a, I>(chain: I, agent: usize) -> Option<ConstraintList>
where
    I: Iterator<Item = &'a ConstraintList>,
{
    let mut negatives: Vec<Constraint> = Vec::new();
    let mut positives: Vec<Constraint> = Vec::new();

    for added in chain {
        for constraint in added.iter().filter(|c| c.agent == agent) {
            if constraint.positive {
                let duplicate = positives.iter().any(|existing| {
                    existing.from == constraint.from
                        && existing.to == constraint.to
                        && (existing.t_min - constraint.t_min).abs() <= EPSILON
                });
                if duplicate {
                    continue;
                }
                let contradictory = positives.iter().any(|existing| {
                    constraint.t_min < existing.t_max - EPSILON
                        && existing.t_min < constraint.t_max - EPSILON
                });
                if contradictory {
                    return None;
                }
                positives.push(constraint.clone());
            } else {
                negatives.push(constraint.clone());
            }
        }
    }

    let negatives = merge_negatives(negatives);

    for positive in &positives {
        let blocked = negatives.iter().any(|negative| {
            negative.from == positive.from
                && negative.to == positive.to
                && positive.t_min > negative.t_min - EPSILON
                && positive.t_min < negative.t_max - EPSILON
        });
        if blocked {
            return None;
        }
    }

    positives.sort_by(|a, b| a.t_min.partial_cmp(&b.t_min).unwrap());
    let mut all = negatives;
    all.extend(positives);
    Some(all)
}

/// Merge overlapping or adjacent negative windows on the same directed
/// edge into disjoint ordered windows.
fn merge_negatives(mut negatives: Vec<Constraint>) -> Vec<Constraint> {
    negatives.sort_by(|a, b| {
        (a.from, a.to)
            .cmp(&(b.from, b.to))
            .then_with(|| a.t_min.partial_cmp(&b.t_min).unwrap())
    });

    let mut merged: Vec<Constraint> = Vec::with_capacity(negatives.len());
    for constraint in negatives {
        match merged.last_mut() {
            Some(last)
                if last.from == constraint.from
                    && last.to == constraint.to
                    && constraint.t_min <= last.t_max + EPSILON =>
            {
                last.t_max = last.t_max.max(constraint.t_max);
            }
            _ => merged.push(constraint),
        }
    }
    merged
}
