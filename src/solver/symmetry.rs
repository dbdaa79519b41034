use tracing::debug;

use crate::common::{path_duration, Agent, Conflict, Constraint, Path, EPSILON};
use crate::map::Roadmap;

/// Corridor reasoning after the rectangle/corridor symmetry breakers of
/// CBS: when two agents traverse a chain of pass-through vertices in
/// opposite directions, a single-move constraint only nudges the loser one
/// step and the same head-on meeting reappears all along the chain.
/// Instead each child holds one agent away from its corridor exit until
/// the other could have cleared the whole chain.
///
/// With e1/e2 the exits and t1/t2 each agent's shortest-path arrival at its
/// own exit ignoring all constraints, any collision-free pair of chain
/// traversals has agent 1 reach e1 no earlier than t2 + L or agent 2 reach
/// e2 no earlier than t1 + L (L = chain length): opposing occupancies of a
/// chain must be disjoint in time, since both centers follow one polyline.
/// An agent may instead reach its exit around the chain, so each hold is
/// capped by the agent's earliest bypass arrival. The two vertex-hold
/// constraints below are then exhaustive, and using lower bounds only
/// widens what each child admits.
pub(crate) struct CorridorSplit {
    pub(crate) constraint_1: Constraint,
    pub(crate) constraint_2: Constraint,
}

pub(crate) fn corridor_split(
    conflict: &Conflict,
    agents: &[Agent],
    paths: &[&Path],
    map: &Roadmap,
) -> Option<CorridorSplit> {
    if conflict.move_1.is_wait() || conflict.move_2.is_wait() {
        return None;
    }

    let chain = corridor_chain(map, conflict.move_1.from, conflict.move_1.to)?;
    if chain.len() < 3 {
        return None;
    }
    // A pass-through endpoint means the walk stopped on a cycle, where
    // opposing traffic can go around and the disjointness argument fails.
    if map.degree(chain[0]) == 2 || map.degree(*chain.last().unwrap()) == 2 {
        return None;
    }

    let index_of = |vertex: usize| chain.iter().position(|&v| v == vertex);
    let from_2 = index_of(conflict.move_2.from)?;
    let to_2 = index_of(conflict.move_2.to)?;
    // move_1 runs with increasing chain index by construction; opposing
    // means move_2 runs against it.
    if to_2 >= from_2 {
        return None;
    }

    let exit_1 = *chain.last().unwrap();
    let exit_2 = chain[0];
    let agent_1 = &agents[conflict.agent_1];
    let agent_2 = &agents[conflict.agent_2];
    // Goals inside the corridor interior break the clear-the-chain
    // argument, and an agent already standing on its exit has nothing to
    // hold; leave those to the standard split.
    let interior = &chain[1..chain.len() - 1];
    if interior.contains(&agent_1.goal)
        || interior.contains(&agent_2.goal)
        || exit_1 == agent_1.start
        || exit_2 == agent_2.start
    {
        return None;
    }

    let length: f64 = chain
        .windows(2)
        .map(|pair| map.edge_duration(pair[0], pair[1]))
        .sum();

    // An agent reaching its exit before the other can have cleared the
    // chain must have used the chain itself, so a bypass arrival caps the
    // hold: reaching the exit around the corridor is always legitimate.
    let t1 = map.distances_from(exit_1)[agent_1.start];
    let t2 = map.distances_from(exit_2)[agent_2.start];
    let bypass_1 = map.distances_avoiding(exit_1, interior)[agent_1.start];
    let bypass_2 = map.distances_avoiding(exit_2, interior)[agent_2.start];
    let hold_1 = (t2 + length).min(bypass_1);
    let hold_2 = (t1 + length).min(bypass_2);

    // Both children must invalidate the current paths, otherwise the
    // split makes no progress and the plain constraint is the right tool.
    if arrival_at(paths[0], exit_1)? >= hold_1 - EPSILON
        || arrival_at(paths[1], exit_2)? >= hold_2 - EPSILON
    {
        return None;
    }

    debug!(
        "corridor {:?} between agents {} and {}: holds {:.3}/{:.3}",
        chain, conflict.agent_1, conflict.agent_2, hold_1, hold_2
    );
    Some(CorridorSplit {
        constraint_1: Constraint::negative(conflict.agent_1, exit_1, exit_1, (0.0, hold_1)),
        constraint_2: Constraint::negative(conflict.agent_2, exit_2, exit_2, (0.0, hold_2)),
    })
}

/// Maximal chain of degree-2 interior vertices containing the directed
/// edge (from, to), ordered in the edge's direction. Endpoints are the
/// first vertices of other degree (or dead ends).
fn corridor_chain(map: &Roadmap, from: usize, to: usize) -> Option<Vec<usize>> {
    if !map.has_edge(from, to) {
        return None;
    }
    let mut chain = vec![from, to];
    extend(map, &mut chain);
    chain.reverse();
    extend(map, &mut chain);
    chain.reverse();
    Some(chain)
}

fn extend(map: &Roadmap, chain: &mut Vec<usize>) {
    loop {
        let last = *chain.last().unwrap();
        let prev = chain[chain.len() - 2];
        if map.degree(last) != 2 {
            break;
        }
        let next = *map
            .neighbors(last)
            .iter()
            .find(|&&candidate| candidate != prev)
            .unwrap();
        if chain.contains(&next) {
            break; // cycle
        }
        chain.push(next);
    }
}

/// First time the path reaches the vertex; None if it never does.
fn arrival_at(path: &Path, vertex: usize) -> Option<f64> {
    if path.first().is_some_and(|mv| mv.from == vertex) {
        return Some(0.0);
    }
    path.iter()
        .find(|mv| mv.to == vertex && !mv.is_wait())
        .map(|mv| mv.t_end)
        .or_else(|| {
            // Parked there from the start of the dwell.
            path.last()
                .filter(|mv| mv.to == vertex)
                .map(|_| path_duration(path))
        })
}
