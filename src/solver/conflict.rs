use std::rc::Rc;

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::common::{with_goal_dwell, CardinalType, Conflict, Path};
use crate::geometry;
use crate::map::Roadmap;

/// Pairwise geometric conflicts between the given timed paths, each agent
/// extended with its infinite goal dwell. Returns every conflict ordered by
/// the start of the earlier participating move (ties by agent pair), or
/// only the earliest one when `find_all` is false.
pub(crate) fn detect_conflicts(
    paths: &[Rc<Path>],
    map: &Roadmap,
    radius: f64,
    precision: f64,
    find_all: bool,
) -> Vec<Conflict> {
    let extended: Vec<Vec<crate::common::Move>> =
        paths.iter().map(|path| with_goal_dwell(path)).collect();

    let mut conflicts = Vec::new();
    for i in 0..extended.len() {
        for j in (i + 1)..extended.len() {
            for move_i in &extended[i] {
                for move_j in &extended[j] {
                    // Half-open windows that never overlap cannot interact.
                    if move_i.t_end <= move_j.t_start || move_j.t_end <= move_i.t_start {
                        continue;
                    }
                    if !geometry::moves_collide(move_i, move_j, map, radius) {
                        continue;
                    }
                    let interval_1 = geometry::collision_interval(
                        move_j,
                        move_i.from,
                        move_i.to,
                        map,
                        radius,
                        precision,
                        move_i.t_start,
                    );
                    let interval_2 = geometry::collision_interval(
                        move_i,
                        move_j.from,
                        move_j.to,
                        map,
                        radius,
                        precision,
                        move_j.t_start,
                    );
                    conflicts.push(Conflict {
                        agent_1: i,
                        agent_2: j,
                        move_1: move_i.clone(),
                        move_2: move_j.clone(),
                        interval_1,
                        interval_2,
                        cardinal_type: CardinalType::Unknown,
                        overcost_1: 0.0,
                        overcost_2: 0.0,
                    });
                }
            }
        }
    }

    conflicts.sort_by_key(|conflict| {
        (
            OrderedFloat(conflict.earliest_start()),
            conflict.agent_1,
            conflict.agent_2,
            OrderedFloat(conflict.move_1.t_start),
            OrderedFloat(conflict.move_2.t_start),
        )
    });

    if !find_all {
        conflicts.truncate(1);
    }
    debug!("detected conflicts: {conflicts:?}");
    conflicts
}
