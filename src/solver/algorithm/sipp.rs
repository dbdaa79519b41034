use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use ordered_float::OrderedFloat;
use tracing::{debug, instrument, trace};

use crate::common::{
    Agent, ConstraintList, ConstraintTable, Move, Path, SafeInterval, SippNode, EPSILON,
};
use crate::map::Roadmap;
use crate::stat::Stats;

pub(crate) enum SippResult {
    Found(Path),
    NoPath,
    Deadline,
}

type StateKey = (usize, usize);
/// child -> (parent state, departure, arrival, parent arrival)
type Trace = HashMap<StateKey, (StateKey, f64, f64, f64)>;

/// Safe-interval path planning: time-optimal single-agent search under a
/// constraint set. States are (vertex, safe-interval); waiting inside an
/// interval is implicit and materialized during reconstruction.
///
/// Mandated moves split the problem into segments: reach the landmark's
/// tail vertex in time to start it, execute it, continue from its head.
/// Earliest-arrival dominance is sound inside a segment, which is exactly
/// why the split is done this way.
#[instrument(skip_all, name = "sipp", fields(agent = agent.id, start = agent.start, goal = agent.goal), level = "debug")]
pub(crate) fn sipp_search(
    map: &Roadmap,
    agent: &Agent,
    constraints: &ConstraintList,
    deadline: Option<Instant>,
    stats: &mut Stats,
) -> SippResult {
    debug!("constraints: {constraints:?}");

    let table = ConstraintTable::build(constraints);

    let mut path: Path = Vec::new();
    let mut vertex = agent.start;
    let mut time = 0.0;

    for landmark in table.landmarks() {
        let segment = match segment_search(
            map,
            &table,
            agent,
            vertex,
            time,
            landmark.from,
            Some(landmark.t_min),
            deadline,
            stats,
        ) {
            SippResult::Found(segment) => segment,
            other => return other,
        };
        path.extend(segment);
        let at_tail = path.last().map_or(time, |mv| mv.t_end);
        if landmark.t_min > at_tail + EPSILON {
            path.push(Move::new(landmark.from, landmark.from, at_tail, landmark.t_min));
        }
        path.push(Move::new(
            landmark.from,
            landmark.to,
            landmark.t_min,
            landmark.t_max,
        ));
        vertex = landmark.to;
        time = landmark.t_max;
    }

    match segment_search(map, &table, agent, vertex, time, agent.goal, None, deadline, stats) {
        SippResult::Found(segment) => {
            path.extend(segment);
            if path.is_empty() {
                // start == goal with nothing to do
                path.push(Move::new(agent.start, agent.start, 0.0, 0.0));
            }
            SippResult::Found(path)
        }
        other => other,
    }
}

/// One landmark-free leg: from `start` occupied since `from_time` to
/// `target`. With a deadline T the leg must arrive by T and be able to
/// stay put until T; without one the agent parks, so the goal interval
/// must extend to +inf.
#[allow(clippy::too_many_arguments)]
fn segment_search(
    map: &Roadmap,
    table: &ConstraintTable,
    agent: &Agent,
    start: usize,
    from_time: f64,
    target: usize,
    arrive_by: Option<f64>,
    deadline: Option<Instant>,
    stats: &mut Stats,
) -> SippResult {
    let mut intervals: HashMap<usize, Vec<SafeInterval>> = HashMap::new();
    let intervals_of = |vertex: usize, cache: &mut HashMap<usize, Vec<SafeInterval>>| {
        cache
            .entry(vertex)
            .or_insert_with(|| table.safe_intervals(vertex))
            .clone()
    };

    // The target heuristic: the per-goal Dijkstra table for the final leg,
    // the straight-line lower bound for intermediate ones.
    let h_of = |vertex: usize| -> f64 {
        if target == agent.goal {
            map.goal_heuristic(agent, vertex)
        } else {
            map.euclidean(vertex, target)
        }
    };
    if h_of(start).is_infinite() {
        return SippResult::NoPath;
    }

    let start_intervals = intervals_of(start, &mut intervals);
    let Some(start_index) = start_intervals
        .iter()
        .position(|window| window.contains(from_time))
    else {
        // Standing at the segment's entry instant is itself unsafe.
        return SippResult::NoPath;
    };

    let mut open_list = BTreeSet::new();
    let mut best_g: HashMap<StateKey, f64> = HashMap::new();
    let mut trace: Trace = HashMap::new();

    open_list.insert(SippNode {
        vertex: start,
        interval: start_index,
        f: OrderedFloat(from_time + h_of(start)),
        g: OrderedFloat(from_time),
    });
    best_g.insert((start, start_index), from_time);

    while let Some(current) = open_list.pop_first() {
        if deadline.is_some_and(|limit| Instant::now() > limit) {
            return SippResult::Deadline;
        }
        trace!("expand node: {current:?}");
        stats.low_level_expanded += 1;

        let arrive = current.g.0;
        let key = (current.vertex, current.interval);
        if best_g.get(&key).is_some_and(|&best| arrive > best + EPSILON) {
            continue; // stale entry
        }

        let current_interval = intervals_of(current.vertex, &mut intervals)[current.interval];
        let at_target = current.vertex == target
            && match arrive_by {
                Some(t) => arrive <= t + EPSILON && current_interval.t_max > t - EPSILON,
                None => current_interval.unbounded(),
            };
        if at_target {
            return SippResult::Found(construct_segment(&trace, key, from_time));
        }

        for &neighbor in map.neighbors(current.vertex) {
            let h = h_of(neighbor);
            if h.is_infinite() {
                continue;
            }
            let dur = map.edge_duration(current.vertex, neighbor);
            let neighbor_intervals = intervals_of(neighbor, &mut intervals);

            for (index, window) in neighbor_intervals.iter().enumerate() {
                // Departure window that lands inside this safe interval
                // while still sitting inside the current one.
                let earliest = arrive.max(window.t_min - dur);
                let latest = current_interval.t_max.min(window.t_max - dur);
                if earliest >= latest - EPSILON {
                    continue;
                }

                let Some(depart) = table.earliest_allowed_start(
                    current.vertex,
                    neighbor,
                    earliest,
                    latest,
                ) else {
                    continue;
                };

                let arrival = depart + dur;
                if arrive_by.is_some_and(|t| arrival + h > t + EPSILON) {
                    continue; // cannot make the landmark from there
                }

                let state = (neighbor, index);
                if best_g
                    .get(&state)
                    .is_some_and(|&best| arrival >= best - EPSILON)
                {
                    continue;
                }
                best_g.insert(state, arrival);
                trace.insert(state, (key, depart, arrival, arrive));
                open_list.insert(SippNode {
                    vertex: neighbor,
                    interval: index,
                    f: OrderedFloat(arrival + h),
                    g: OrderedFloat(arrival),
                });
            }
        }
        trace!("open list {open_list:?}");
    }

    debug!("cannot find path segment to {target}");
    SippResult::NoPath
}

fn construct_segment(trace: &Trace, goal_key: StateKey, from_time: f64) -> Path {
    let mut moves: Vec<Move> = Vec::new();
    let mut current = goal_key;

    while let Some(&((parent_vertex, parent_interval), depart, arrival, parent_arrive)) =
        trace.get(&current)
    {
        moves.push(Move::new(parent_vertex, current.0, depart, arrival));
        if depart > parent_arrive + EPSILON {
            moves.push(Move::new(parent_vertex, parent_vertex, parent_arrive, depart));
        }
        current = (parent_vertex, parent_interval);
    }
    moves.reverse();
    debug_assert!(moves
        .first()
        .is_none_or(|first| first.t_start >= from_time - EPSILON));
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{path_duration, Constraint};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init();
    }

    fn line_map() -> Roadmap {
        Roadmap::new(
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)],
            &[(0, 1), (1, 2)],
        )
        .unwrap()
    }

    fn line_agent() -> Agent {
        Agent {
            id: 0,
            start: 0,
            goal: 2,
        }
    }

    fn solve(map: &Roadmap, agent: &Agent, constraints: ConstraintList) -> SippResult {
        let mut stats = Stats::default();
        sipp_search(map, agent, &constraints, None, &mut stats)
    }

    fn found(result: SippResult) -> Path {
        match result {
            SippResult::Found(path) => path,
            SippResult::NoPath => panic!("expected a path, got NoPath"),
            SippResult::Deadline => panic!("expected a path, got Deadline"),
        }
    }

    #[test]
    fn test_unconstrained_shortest_path() {
        init_tracing();
        let map = line_map();
        let path = found(solve(&map, &line_agent(), Vec::new()));
        assert_eq!(path.len(), 2);
        assert!((path_duration(&path) - 2.0).abs() < 1e-6);
        assert_eq!(path[0].from, 0);
        assert_eq!(path[1].to, 2);
    }

    #[test]
    fn test_blocked_edge_start_inserts_wait() {
        init_tracing();
        let map = line_map();
        let constraints = vec![Constraint::negative(0, 0, 1, (0.0, 1.0))];
        let path = found(solve(&map, &line_agent(), constraints));
        // Departure delayed to t=1: wait, then two traversals.
        assert!((path_duration(&path) - 3.0).abs() < 1e-6);
        assert!(path[0].is_wait());
        assert!((path[0].t_end - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unsafe_vertex_window_delays_arrival() {
        init_tracing();
        let map = line_map();
        // Vertex 1 may not be occupied during [0.5, 1.5).
        let constraints = vec![Constraint::negative(0, 1, 1, (0.5, 1.5))];
        let path = found(solve(&map, &line_agent(), constraints));
        assert!((path_duration(&path) - 2.5).abs() < 1e-6);
        let through = path.iter().find(|mv| mv.to == 1 && !mv.is_wait()).unwrap();
        assert!(through.t_end > 1.5 - EPSILON);
    }

    #[test]
    fn test_unsafe_goal_window_forces_late_park() {
        init_tracing();
        let map = line_map();
        // The goal is unavailable during [2.5, 3.5); parking before that
        // window would be interrupted, so the agent arrives after it.
        let constraints = vec![Constraint::negative(0, 2, 2, (2.5, 3.5))];
        let path = found(solve(&map, &line_agent(), constraints));
        assert!(path_duration(&path) >= 3.5 - 1e-6);
    }

    #[test]
    fn test_landmark_pins_departure_time() {
        init_tracing();
        let map = line_map();
        let mandated = Move::new(1, 2, 2.0, 3.0);
        let constraints = vec![Constraint::positive(0, &mandated)];
        let path = found(solve(&map, &line_agent(), constraints));
        assert!((path_duration(&path) - 3.0).abs() < 1e-6);
        let last = path.last().unwrap();
        assert_eq!((last.from, last.to), (1, 2));
        assert!((last.t_start - 2.0).abs() < 1e-6);
        // The slack before the mandated start shows up as a wait.
        assert!(path.iter().any(|mv| mv.is_wait()));
    }

    #[test]
    fn test_unreachable_landmark_is_no_path() {
        init_tracing();
        let map = line_map();
        // Tail vertex cannot be reached by its start time.
        let mandated = Move::new(1, 2, 0.5, 1.5);
        let constraints = vec![Constraint::positive(0, &mandated)];
        assert!(matches!(
            solve(&map, &line_agent(), constraints),
            SippResult::NoPath
        ));
    }

    #[test]
    fn test_fully_blocked_edge_is_no_path() {
        init_tracing();
        let map = line_map();
        let constraints = vec![Constraint::negative(0, 0, 1, (0.0, f64::INFINITY))];
        assert!(matches!(
            solve(&map, &line_agent(), constraints),
            SippResult::NoPath
        ));
    }

    #[test]
    fn test_start_equals_goal() {
        init_tracing();
        let map = line_map();
        let agent = Agent {
            id: 0,
            start: 1,
            goal: 1,
        };
        let path = found(solve(&map, &agent, Vec::new()));
        assert_eq!(path.len(), 1);
        assert!((path_duration(&path) - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_expired_deadline_reports_deadline() {
        init_tracing();
        let map = line_map();
        let mut stats = Stats::default();
        let deadline = Some(Instant::now() - std::time::Duration::from_millis(1));
        assert!(matches!(
            sipp_search(&map, &line_agent(), &Vec::new(), deadline, &mut stats),
            SippResult::Deadline
        ));
    }

    #[test]
    fn test_expansion_counter_increases() {
        init_tracing();
        let map = line_map();
        let mut stats = Stats::default();
        let result = sipp_search(&map, &line_agent(), &Vec::new(), None, &mut stats);
        assert!(matches!(result, SippResult::Found(_)));
        assert!(stats.low_level_expanded >= 3);
    }
}
