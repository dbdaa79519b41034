use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use tracing::debug;

use super::algorithm::{sipp_search, SippResult};
use super::conflict::detect_conflicts;
use super::heuristic::h_value;
use super::symmetry::corridor_split;
use super::Solver;
use crate::common::{
    gather_constraints, path_duration, Agent, CardinalType, Conflict, Constraint, ConstraintList,
    Move, Path, Solution, SolverError, UnsolvedReason, EPSILON,
};
use crate::config::Config;
use crate::map::Roadmap;
use crate::policy::{BranchingPolicy, ConflictObservation, HeuristicPolicy};
use crate::stat::Stats;
use crate::task::validate_instance;

/// Continuous-time conflict-based search. Constraint-tree nodes live in an
/// arena and point at their parent by index; each node stores only the
/// constraints it adds, and paths are shared with the parent by Rc, the
/// replanned agent's slot swapped copy-on-write.
pub struct CCBS {
    agents: Vec<Agent>,
    map: Roadmap,
    config: Config,
    policy: Box<dyn BranchingPolicy>,
    custom_policy: bool,
    stats: Stats,
}

struct HighLevelNode {
    parent: Option<usize>,
    depth: usize,
    new_constraints: ConstraintList,
    paths: Vec<Rc<Path>>,
    cost: f64,
    h: f64,
    conflicts: Vec<Conflict>,
}

/// Open-list entry: f = g + h, then fewer conflicts, then insertion order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct NodeKey {
    f: OrderedFloat<f64>,
    conflicts: usize,
    id: usize,
}

enum Interrupt {
    Deadline,
    Fault(String),
}

impl CCBS {
    pub fn new(agents: Vec<Agent>, map: &Roadmap, config: Config) -> Self {
        CCBS {
            agents,
            map: map.clone(),
            config,
            policy: Box::new(HeuristicPolicy),
            custom_policy: false,
            stats: Stats::default(),
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn BranchingPolicy>) -> Self {
        self.policy = policy;
        self.custom_policy = true;
        self
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Cardinal analysis and symmetry reasoning look at every conflict of
    /// a node; plain expansion needs only the earliest.
    fn need_all_conflicts(&self) -> bool {
        self.config.use_cardinal
            || self.config.hlh_type > 0
            || self.config.use_corridor_symmetry
            || self.config.use_target_symmetry
            || self.custom_policy
    }

    fn classify(&self) -> bool {
        self.config.use_cardinal || self.config.hlh_type > 0
    }

    /// Negative constraint covering a move's unsafe window. A traversal
    /// constraint runs from the move's current start to the first clear
    /// start time: forbidding starts earlier than the current one could
    /// cut solutions in which the opposing move shifts as well. Wait
    /// windows are presence windows and are kept whole. Without target
    /// symmetry an unbounded window (a collision with a parked agent) is
    /// clipped to the current move, which resolves the conflict at hand
    /// but lets it recur further down the tree.
    fn move_constraint(&self, agent: usize, mv: &Move, interval: (f64, f64)) -> Constraint {
        let (mut lo, mut hi) = interval;
        if !mv.is_wait() {
            lo = lo.max(mv.t_start);
        }
        if hi.is_infinite() && !self.config.use_target_symmetry {
            hi = if mv.t_end.is_finite() {
                mv.t_end
            } else {
                lo + self.config.precision
            };
            hi = hi.max(lo + self.config.precision);
        }
        Constraint::negative(agent, mv.from, mv.to, (lo, hi))
    }

    fn observe(conflicts: &[Conflict], depth: usize) -> Vec<ConflictObservation> {
        conflicts
            .iter()
            .map(|conflict| ConflictObservation {
                cardinal_rank: conflict.cardinal_type.rank(),
                depth,
                time_to_conflict: conflict.earliest_start(),
                overcost_1: conflict.overcost_1,
                overcost_2: conflict.overcost_2,
                agent_1: conflict.agent_1,
                agent_2: conflict.agent_2,
            })
            .collect()
    }

    fn unsolved(&mut self, reason: UnsolvedReason, started: Instant) -> Solution {
        debug!("search unresolved: {reason:?}");
        let mut solution = Solution::unsolved(reason);
        solution.time = started.elapsed().as_secs_f64();
        solution.high_level_expanded = self.stats.high_level_expanded;
        solution.low_level_expanded = self.stats.low_level_expanded;
        self.stats.time_seconds = solution.time;
        solution
    }

    /// Replan one side of a conflict under its would-be constraint and
    /// return the cost delta (+inf when infeasible).
    #[allow(clippy::too_many_arguments)]
    fn probe(
        &mut self,
        arena: &[HighLevelNode],
        parent: Option<usize>,
        own: &ConstraintList,
        paths: &[Rc<Path>],
        conflict: &Conflict,
        first_agent: bool,
        deadline: Instant,
    ) -> Result<f64, Interrupt> {
        let (agent_id, mv, interval) = if first_agent {
            (conflict.agent_1, &conflict.move_1, conflict.interval_1)
        } else {
            (conflict.agent_2, &conflict.move_2, conflict.interval_2)
        };

        let mut extra = own.clone();
        extra.push(self.move_constraint(agent_id, mv, interval));
        let Some(gathered) = gather_for(arena, parent, &extra, agent_id) else {
            return Ok(f64::INFINITY);
        };

        let agent = self.agents[agent_id].clone();
        match sipp_search(&self.map, &agent, &gathered, Some(deadline), &mut self.stats) {
            SippResult::Found(path) => {
                Ok((path_duration(&path) - path_duration(&paths[agent_id])).max(0.0))
            }
            SippResult::NoPath => Ok(f64::INFINITY),
            SippResult::Deadline => Err(Interrupt::Deadline),
        }
    }

    /// Fill in cardinality and cost deltas. With prioritized conflicts but
    /// no h computation the scan stops at the first cardinal conflict; the
    /// h-value needs deltas for all of them.
    #[allow(clippy::too_many_arguments)]
    fn classify_conflicts(
        &mut self,
        arena: &[HighLevelNode],
        parent: Option<usize>,
        own: &ConstraintList,
        paths: &[Rc<Path>],
        conflicts: &mut [Conflict],
        deadline: Instant,
    ) -> Result<(), Interrupt> {
        let classify_all = self.config.hlh_type > 0;
        for conflict in conflicts.iter_mut() {
            let delta_1 = self.probe(arena, parent, own, paths, conflict, true, deadline)?;
            let delta_2 = self.probe(arena, parent, own, paths, conflict, false, deadline)?;
            conflict.overcost_1 = delta_1;
            conflict.overcost_2 = delta_2;
            conflict.cardinal_type = match (delta_1 > EPSILON, delta_2 > EPSILON) {
                (true, true) => CardinalType::Cardinal,
                (false, false) => CardinalType::NonCardinal,
                _ => CardinalType::SemiCardinal,
            };
            if !classify_all && conflict.cardinal_type == CardinalType::Cardinal {
                break;
            }
        }
        Ok(())
    }

    /// Build, annotate and enqueue one child. Infeasible children (no path
    /// or contradictory constraints) are dropped silently.
    #[allow(clippy::too_many_arguments)]
    fn create_child(
        &mut self,
        arena: &mut Vec<HighLevelNode>,
        open: &mut BTreeSet<NodeKey>,
        parent_id: usize,
        new_constraints: ConstraintList,
        replan: &[usize],
        deadline: Instant,
    ) -> Result<(), Interrupt> {
        let parent_cost = arena[parent_id].cost;
        let depth = arena[parent_id].depth + 1;
        let mut paths = arena[parent_id].paths.clone();

        for &agent_id in replan {
            let Some(gathered) =
                gather_for(arena.as_slice(), Some(parent_id), &new_constraints, agent_id)
            else {
                return Ok(());
            };
            let agent = self.agents[agent_id].clone();
            match sipp_search(&self.map, &agent, &gathered, Some(deadline), &mut self.stats) {
                SippResult::Found(path) => {
                    debug_assert!(
                        path.iter()
                            .all(|mv| !gathered.iter().any(|constraint| constraint.forbids(mv))),
                        "replanned path violates a constraint of its own node"
                    );
                    paths[agent_id] = Rc::new(path);
                }
                SippResult::NoPath => return Ok(()),
                SippResult::Deadline => return Err(Interrupt::Deadline),
            }
        }

        let cost: f64 = paths.iter().map(|path| path_duration(path)).sum();
        if cost + EPSILON < parent_cost {
            return Err(Interrupt::Fault(format!(
                "child cost {cost} fell below parent cost {parent_cost}"
            )));
        }

        let mut conflicts = detect_conflicts(
            &paths,
            &self.map,
            self.config.agent_size,
            self.config.precision,
            self.need_all_conflicts(),
        );
        if self.classify() {
            self.classify_conflicts(
                arena.as_slice(),
                Some(parent_id),
                &new_constraints,
                &paths,
                &mut conflicts,
                deadline,
            )?;
        }
        let h = h_value(self.config.hlh_type, self.agents.len(), &conflicts);

        let id = arena.len();
        let key = NodeKey {
            f: OrderedFloat(cost + h),
            conflicts: conflicts.len(),
            id,
        };
        debug!(
            "child {id}: cost {cost:.4} h {h:.4} conflicts {} constraints {new_constraints:?}",
            conflicts.len()
        );
        arena.push(HighLevelNode {
            parent: Some(parent_id),
            depth,
            new_constraints,
            paths,
            cost,
            h,
            conflicts,
        });
        open.insert(key);
        Ok(())
    }

    /// Standard split, disjoint split or corridor pair for the chosen
    /// conflict: each entry is (constraints added, agents to replan).
    fn plan_splits(
        &self,
        node: &HighLevelNode,
        conflict: &Conflict,
    ) -> Vec<(ConstraintList, Vec<usize>)> {
        let mut splits = Vec::with_capacity(2);

        if self.config.use_corridor_symmetry {
            let path_1 = node.paths[conflict.agent_1].clone();
            let path_2 = node.paths[conflict.agent_2].clone();
            if let Some(split) = corridor_split(
                conflict,
                &self.agents,
                &[path_1.as_ref(), path_2.as_ref()],
                &self.map,
            ) {
                splits.push((vec![split.constraint_1], vec![conflict.agent_1]));
                splits.push((vec![split.constraint_2], vec![conflict.agent_2]));
                return splits;
            }
        }

        if self.config.use_disjoint_splitting {
            // Fix one participant's traversal; only real moves qualify.
            let fix_first = if !conflict.move_1.is_wait() && conflict.move_1.t_end.is_finite() {
                Some(true)
            } else if !conflict.move_2.is_wait() && conflict.move_2.t_end.is_finite() {
                Some(false)
            } else {
                None
            };
            if let Some(fix_first) = fix_first {
                let (pos_agent, pos_move, pos_interval, neg_agent, neg_move, neg_interval) =
                    if fix_first {
                        (
                            conflict.agent_1,
                            &conflict.move_1,
                            conflict.interval_1,
                            conflict.agent_2,
                            &conflict.move_2,
                            conflict.interval_2,
                        )
                    } else {
                        (
                            conflict.agent_2,
                            &conflict.move_2,
                            conflict.interval_2,
                            conflict.agent_1,
                            &conflict.move_1,
                            conflict.interval_1,
                        )
                    };
                // The fixed move propagates as a negative constraint onto
                // the other participant; the sibling forbids the window.
                splits.push((
                    vec![
                        Constraint::positive(pos_agent, pos_move),
                        self.move_constraint(neg_agent, neg_move, neg_interval),
                    ],
                    vec![neg_agent],
                ));
                splits.push((
                    vec![self.move_constraint(pos_agent, pos_move, pos_interval)],
                    vec![pos_agent],
                ));
                return splits;
            }
        }

        splits.push((
            vec![self.move_constraint(conflict.agent_1, &conflict.move_1, conflict.interval_1)],
            vec![conflict.agent_1],
        ));
        splits.push((
            vec![self.move_constraint(conflict.agent_2, &conflict.move_2, conflict.interval_2)],
            vec![conflict.agent_2],
        ));
        splits
    }
}

fn gather_for(
    arena: &[HighLevelNode],
    parent: Option<usize>,
    extra: &ConstraintList,
    agent: usize,
) -> Option<ConstraintList> {
    let mut lists: Vec<&ConstraintList> = vec![extra];
    let mut cursor = parent;
    while let Some(index) = cursor {
        lists.push(&arena[index].new_constraints);
        cursor = arena[index].parent;
    }
    gather_constraints(lists.into_iter(), agent)
}

impl Solver for CCBS {
    fn solve(&mut self) -> Result<Solution, SolverError> {
        let started = Instant::now();
        validate_instance(&self.map, &self.agents, self.config.agent_size)?;

        if self.config.use_precalculated_heuristic {
            self.map.precompute_heuristics(&self.agents);
        } else {
            self.map.heuristic.clear();
        }

        let deadline = started + Duration::from_secs_f64(self.config.timelimit);

        let mut paths: Vec<Rc<Path>> = Vec::with_capacity(self.agents.len());
        for agent in self.agents.clone() {
            match sipp_search(&self.map, &agent, &Vec::new(), Some(deadline), &mut self.stats) {
                SippResult::Found(path) => paths.push(Rc::new(path)),
                SippResult::NoPath => {
                    return Ok(self.unsolved(UnsolvedReason::Infeasible, started))
                }
                SippResult::Deadline => {
                    return Ok(self.unsolved(UnsolvedReason::Timeout, started))
                }
            }
        }

        let cost: f64 = paths.iter().map(|path| path_duration(path)).sum();
        let mut conflicts = detect_conflicts(
            &paths,
            &self.map,
            self.config.agent_size,
            self.config.precision,
            self.need_all_conflicts(),
        );
        if self.classify() {
            match self.classify_conflicts(&[], None, &Vec::new(), &paths, &mut conflicts, deadline)
            {
                Ok(()) => {}
                Err(Interrupt::Deadline) => {
                    return Ok(self.unsolved(UnsolvedReason::Timeout, started))
                }
                Err(Interrupt::Fault(message)) => {
                    return Err(SolverError::InternalAssertionFailed(message))
                }
            }
        }
        let h = h_value(self.config.hlh_type, self.agents.len(), &conflicts);

        let mut arena: Vec<HighLevelNode> = Vec::new();
        let mut open: BTreeSet<NodeKey> = BTreeSet::new();
        open.insert(NodeKey {
            f: OrderedFloat(cost + h),
            conflicts: conflicts.len(),
            id: 0,
        });
        arena.push(HighLevelNode {
            parent: None,
            depth: 0,
            new_constraints: Vec::new(),
            paths,
            cost,
            h,
            conflicts,
        });

        while let Some(key) = open.pop_first() {
            if Instant::now() > deadline {
                return Ok(self.unsolved(UnsolvedReason::Timeout, started));
            }
            if self.config.max_expansions > 0
                && self.stats.high_level_expanded >= self.config.max_expansions
            {
                return Ok(self.unsolved(UnsolvedReason::StepLimit, started));
            }
            self.stats.high_level_expanded += 1;

            if arena[key.id].conflicts.is_empty() {
                let node = &arena[key.id];
                let elapsed = started.elapsed().as_secs_f64();
                self.stats.flowtime = node.cost;
                self.stats.time_seconds = elapsed;

                let solution = Solution {
                    found: true,
                    flowtime: node.cost,
                    makespan: node
                        .paths
                        .iter()
                        .map(|path| path_duration(path))
                        .fold(0.0, f64::max),
                    time: elapsed,
                    reason: None,
                    high_level_expanded: self.stats.high_level_expanded,
                    low_level_expanded: self.stats.low_level_expanded,
                    paths: node.paths.iter().map(|path| (**path).clone()).collect(),
                };
                if !solution.verify(&self.map, &self.agents, self.config.agent_size) {
                    return Err(SolverError::InternalAssertionFailed(
                        "returned paths violate separation or continuity".to_string(),
                    ));
                }
                self.stats.print();
                solution.log_solution();
                return Ok(solution);
            }

            let (conflict, splits) = {
                let node = &arena[key.id];
                let observations = Self::observe(&node.conflicts, node.depth);
                let mut index = self.policy.select(&observations);
                if index >= node.conflicts.len() {
                    index = 0;
                }
                let conflict = node.conflicts[index].clone();
                let splits = self.plan_splits(node, &conflict);
                (conflict, splits)
            };
            debug!(
                "expand node {} (f {:.4}): split conflict between {} and {}",
                key.id, key.f.0, conflict.agent_1, conflict.agent_2
            );

            for (constraints, replan) in splits {
                match self.create_child(&mut arena, &mut open, key.id, constraints, &replan, deadline)
                {
                    Ok(()) => {}
                    Err(Interrupt::Deadline) => {
                        return Ok(self.unsolved(UnsolvedReason::Timeout, started))
                    }
                    Err(Interrupt::Fault(message)) => {
                        return Err(SolverError::InternalAssertionFailed(message))
                    }
                }
            }
        }

        Ok(self.unsolved(UnsolvedReason::Infeasible, started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .try_init();
    }

    fn config() -> Config {
        Config {
            timelimit: 10.0,
            ..Config::default()
        }
    }

    fn agent(id: usize, start: usize, goal: usize) -> Agent {
        Agent { id, start, goal }
    }

    fn line_map() -> Roadmap {
        Roadmap::new(
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)],
            &[(0, 1), (1, 2)],
        )
        .unwrap()
    }

    /// Line 0-1-2 with a spur 3 hanging off the middle vertex, the
    /// smallest map where opposing agents can actually pass.
    fn spur_map() -> Roadmap {
        Roadmap::new(
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (1.0, 1.0)],
            &[(0, 1), (1, 2), (1, 3)],
        )
        .unwrap()
    }

    fn solve_with(map: &Roadmap, agents: Vec<Agent>, config: Config) -> Solution {
        let mut solver = CCBS::new(agents, map, config);
        solver.solve().expect("well-formed instance")
    }

    #[test]
    fn test_single_agent_shortest_path() {
        init_tracing();
        let map = line_map();
        let solution = solve_with(&map, vec![agent(0, 0, 2)], config());
        assert!(solution.found);
        assert!((solution.flowtime - 2.0).abs() < 1e-6);
        assert!((solution.makespan - 2.0).abs() < 1e-6);
        assert_eq!(solution.high_level_expanded, 1);
    }

    #[test]
    fn test_two_agents_without_interaction() {
        init_tracing();
        // Unit square with the 1-3 diagonal: one agent walks two sides,
        // the other crosses on the diagonal, far enough apart for r=0.15.
        let map = Roadmap::new(
            vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)],
            &[(0, 1), (1, 2), (2, 3), (3, 0), (1, 3)],
        )
        .unwrap();
        let mut cfg = config();
        cfg.agent_size = 0.15;
        let solution = solve_with(&map, vec![agent(0, 0, 2), agent(1, 1, 3)], cfg);
        assert!(solution.found);
        assert!((solution.flowtime - (2.0 + std::f64::consts::SQRT_2)).abs() < 1e-6);
        assert_eq!(solution.high_level_expanded, 1);
        let map_check = solution.verify(
            &map,
            &[agent(0, 0, 2), agent(1, 1, 3)],
            0.15,
        );
        assert!(map_check);
    }

    #[test]
    fn test_opposing_agents_pass_via_spur() {
        init_tracing();
        let map = spur_map();
        let agents = vec![agent(0, 0, 2), agent(1, 2, 0)];
        let mut cfg = config();
        cfg.agent_size = 0.2;
        let solution = solve_with(&map, agents.clone(), cfg);
        assert!(solution.found);
        assert!(solution.verify(&map, &agents, 0.2));
        // Strictly above the sum of single-agent optima (2 + 2): someone
        // waited or detoured.
        assert!(solution.flowtime > 4.0 + 0.3);
        assert!(solution.flowtime < 9.0);
        assert!((solution.flowtime
            - solution
                .paths
                .iter()
                .map(|path| path_duration(path))
                .sum::<f64>())
        .abs()
            < 1e-9);
    }

    #[test]
    fn test_swap_without_detour_times_out() {
        init_tracing();
        // Two vertices, one edge, opposing agents: geometrically hopeless,
        // and CBS cannot exhaust the infinite constraint tree, so the
        // wall clock is what stops it.
        let map = Roadmap::new(vec![(0.0, 0.0), (1.0, 0.0)], &[(0, 1)]).unwrap();
        let mut cfg = config();
        cfg.timelimit = 0.2;
        let solution = solve_with(&map, vec![agent(0, 0, 1), agent(1, 1, 0)], cfg);
        assert!(!solution.found);
        assert_eq!(solution.reason, Some(UnsolvedReason::Timeout));
        assert!(solution.time >= 0.2 - 1e-3);
        assert!(solution.paths.is_empty());
    }

    #[test]
    fn test_unreachable_goal_is_infeasible() {
        init_tracing();
        let map = Roadmap::new(
            vec![(0.0, 0.0), (1.0, 0.0), (5.0, 5.0)],
            &[(0, 1)],
        )
        .unwrap();
        let solution = solve_with(&map, vec![agent(0, 0, 2)], config());
        assert!(!solution.found);
        assert_eq!(solution.reason, Some(UnsolvedReason::Infeasible));
    }

    #[test]
    fn test_coincident_starts_rejected_before_search() {
        init_tracing();
        let map = line_map();
        let mut solver = CCBS::new(vec![agent(0, 0, 2), agent(1, 0, 1)], &map, config());
        assert!(matches!(
            solver.solve(),
            Err(SolverError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_step_limit_reports_unfound() {
        init_tracing();
        let map = spur_map();
        let mut cfg = config();
        cfg.max_expansions = 1;
        let solution = solve_with(&map, vec![agent(0, 0, 2), agent(1, 2, 0)], cfg);
        assert!(!solution.found);
        assert_eq!(solution.reason, Some(UnsolvedReason::StepLimit));
    }

    #[test]
    fn test_determinism_across_runs() {
        init_tracing();
        let map = spur_map();
        let agents = vec![agent(0, 0, 2), agent(1, 2, 0)];
        let first = solve_with(&map, agents.clone(), config());
        let second = solve_with(&map, agents, config());
        assert!(first.found && second.found);
        assert!((first.flowtime - second.flowtime).abs() < 1e-12);
        assert!((first.makespan - second.makespan).abs() < 1e-12);
        assert_eq!(first.high_level_expanded, second.high_level_expanded);
        assert_eq!(first.low_level_expanded, second.low_level_expanded);
    }

    #[test]
    fn test_disjoint_splitting_preserves_flowtime() {
        init_tracing();
        let map = spur_map();
        let agents = vec![agent(0, 0, 2), agent(1, 2, 0)];
        let plain = solve_with(&map, agents.clone(), config());
        let mut cfg = config();
        cfg.use_disjoint_splitting = true;
        let disjoint = solve_with(&map, agents, cfg);
        assert!(plain.found && disjoint.found);
        assert!((plain.flowtime - disjoint.flowtime).abs() < 1e-4);
    }

    #[test]
    fn test_hlh_types_agree_on_flowtime() {
        init_tracing();
        let map = spur_map();
        let agents = vec![agent(0, 0, 2), agent(1, 2, 0)];
        let mut flowtimes = Vec::new();
        for hlh_type in 0..=2 {
            let mut cfg = config();
            cfg.hlh_type = hlh_type;
            let solution = solve_with(&map, agents.clone(), cfg);
            assert!(solution.found, "hlh_type {hlh_type} failed");
            flowtimes.push(solution.flowtime);
        }
        assert!((flowtimes[0] - flowtimes[1]).abs() < 1e-4);
        assert!((flowtimes[0] - flowtimes[2]).abs() < 1e-4);
    }

    /// Corridor with a longer bypass loop; junctions at both corridor
    /// ends. One agent must take the bypass, the corridor itself cannot
    /// be shared by opposing traffic.
    fn corridor_bypass_map() -> Roadmap {
        Roadmap::new(
            vec![
                (0.0, 0.0),  // 0: left junction
                (1.0, 0.0),  // 1
                (2.0, 0.0),  // 2
                (3.0, 0.0),  // 3
                (4.0, 0.0),  // 4: right junction
                (0.0, -1.0), // 5: left spur
                (4.0, -1.0), // 6: right spur
                (0.0, 1.5),  // 7: bypass
                (2.0, 1.5),  // 8: bypass
                (4.0, 1.5),  // 9: bypass
            ],
            &[
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 4),
                (0, 5),
                (4, 6),
                (0, 7),
                (7, 8),
                (8, 9),
                (9, 4),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_corridor_symmetry_same_flowtime_fewer_expansions() {
        init_tracing();
        let map = corridor_bypass_map();
        let agents = vec![agent(0, 0, 4), agent(1, 4, 0)];

        let mut plain_cfg = config();
        plain_cfg.agent_size = 0.3;
        let plain = solve_with(&map, agents.clone(), plain_cfg);

        let mut corridor_cfg = config();
        corridor_cfg.agent_size = 0.3;
        corridor_cfg.use_corridor_symmetry = true;
        let with_corridor = solve_with(&map, agents.clone(), corridor_cfg);

        assert!(plain.found && with_corridor.found);
        assert!(plain.verify(&map, &agents, 0.3));
        assert!(with_corridor.verify(&map, &agents, 0.3));
        // Corridor 4 one way, bypass 7 the other.
        assert!((plain.flowtime - 11.0).abs() < 1e-3);
        assert!((with_corridor.flowtime - plain.flowtime).abs() < 1e-3);
        assert!(with_corridor.high_level_expanded <= plain.high_level_expanded);
    }

    /// Line to A's goal plus a two-edge bypass around it for B, who starts
    /// behind A and ends past A's goal.
    fn target_map() -> Roadmap {
        Roadmap::new(
            vec![
                (-1.0, 0.0), // 0: B start
                (0.0, 0.0),  // 1: A start
                (1.0, 0.0),  // 2
                (2.0, 0.0),  // 3
                (3.0, 0.0),  // 4: A goal
                (4.0, 0.0),  // 5: B goal
                (3.0, 1.0),  // 6: bypass over A's goal
            ],
            &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (3, 6), (6, 5)],
        )
        .unwrap()
    }

    #[test]
    fn test_target_symmetry_same_flowtime() {
        init_tracing();
        let map = target_map();
        let agents = vec![agent(0, 1, 4), agent(1, 0, 5)];

        let mut plain_cfg = config();
        plain_cfg.agent_size = 0.3;
        let plain = solve_with(&map, agents.clone(), plain_cfg);

        let mut target_cfg = config();
        target_cfg.agent_size = 0.3;
        target_cfg.use_target_symmetry = true;
        let with_target = solve_with(&map, agents.clone(), target_cfg);

        assert!(plain.found && with_target.found);
        assert!(plain.verify(&map, &agents, 0.3));
        assert!(with_target.verify(&map, &agents, 0.3));
        assert!((with_target.flowtime - plain.flowtime).abs() < 1e-3);
        assert!(with_target.high_level_expanded <= plain.high_level_expanded);
        // B ends past A's arrival through the bypass.
        assert!(plain.makespan >= 3.0 + std::f64::consts::SQRT_2 - 1e-6);
    }

    #[test]
    fn test_custom_policy_is_consulted() {
        init_tracing();
        let map = spur_map();
        let agents = vec![agent(0, 0, 2), agent(1, 2, 0)];
        let scorer = |observations: &[ConflictObservation]| -> usize {
            observations.len().saturating_sub(1)
        };
        let mut solver =
            CCBS::new(agents.clone(), &map, config()).with_policy(Box::new(scorer));
        let solution = solver.solve().expect("well-formed instance");
        assert!(solution.found);
        assert!(solution.verify(&map, &agents, config().agent_size));
    }

    #[test]
    fn test_flowtime_never_below_independent_optimum() {
        init_tracing();
        let map = spur_map();
        let solution = solve_with(&map, vec![agent(0, 0, 2), agent(1, 2, 0)], config());
        assert!(solution.found);
        assert!(solution.flowtime >= 4.0 - 1e-9);
    }
}
