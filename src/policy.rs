use ordered_float::OrderedFloat;

/// Fixed-length per-conflict feature record handed to the branching
/// policy. Learned scorers consume exactly this; nothing else about the
/// search state leaks through.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictObservation {
    /// 0 cardinal, 1 semi-cardinal, 2 non-cardinal, 3 unclassified.
    pub cardinal_rank: u8,
    /// Depth of the constraint-tree node being expanded.
    pub depth: usize,
    /// Start time of the earlier move of the conflict.
    pub time_to_conflict: f64,
    /// Replanning cost deltas when each side is constrained; zero when the
    /// conflict was not classified.
    pub overcost_1: f64,
    pub overcost_2: f64,
    pub agent_1: usize,
    pub agent_2: usize,
}

/// Picks which of a node's conflicts to branch on. The search never
/// assumes determinism; it only requires an index into the observation
/// slice (out-of-range answers fall back to the first conflict).
pub trait BranchingPolicy {
    fn select(&mut self, observations: &[ConflictObservation]) -> usize;
}

/// Any black-box scoring function doubles as a policy, which is how a
/// trained model plugs in.
impl<F> BranchingPolicy for F
where
    F: FnMut(&[ConflictObservation]) -> usize,
{
    fn select(&mut self, observations: &[ConflictObservation]) -> usize {
        self(observations)
    }
}

/// Default deterministic policy: cardinal before semi-cardinal before the
/// rest, then earliest conflict, then the agent pair.
#[derive(Debug, Default)]
pub struct HeuristicPolicy;

impl BranchingPolicy for HeuristicPolicy {
    fn select(&mut self, observations: &[ConflictObservation]) -> usize {
        observations
            .iter()
            .enumerate()
            .min_by_key(|(index, observation)| {
                (
                    observation.cardinal_rank,
                    OrderedFloat(observation.time_to_conflict),
                    observation.agent_1,
                    observation.agent_2,
                    *index,
                )
            })
            .map(|(index, _)| index)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(rank: u8, time: f64, agents: (usize, usize)) -> ConflictObservation {
        ConflictObservation {
            cardinal_rank: rank,
            depth: 0,
            time_to_conflict: time,
            overcost_1: 0.0,
            overcost_2: 0.0,
            agent_1: agents.0,
            agent_2: agents.1,
        }
    }

    #[test]
    fn test_cardinal_wins_over_earlier_non_cardinal() {
        let observations = vec![
            observation(2, 0.0, (0, 1)),
            observation(0, 5.0, (1, 2)),
            observation(1, 1.0, (0, 2)),
        ];
        let mut policy = HeuristicPolicy;
        assert_eq!(policy.select(&observations), 1);
    }

    #[test]
    fn test_ties_break_by_time_then_agents() {
        let observations = vec![
            observation(0, 2.0, (0, 3)),
            observation(0, 1.0, (2, 3)),
            observation(0, 1.0, (1, 2)),
        ];
        let mut policy = HeuristicPolicy;
        assert_eq!(policy.select(&observations), 2);
    }

    #[test]
    fn test_closure_acts_as_policy() {
        let observations = vec![observation(3, 0.0, (0, 1)), observation(3, 1.0, (1, 2))];
        let mut scorer = |obs: &[ConflictObservation]| obs.len() - 1;
        assert_eq!(scorer.select(&observations), 1);
    }
}
