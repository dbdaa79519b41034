use ordered_float::OrderedFloat;

use crate::common::{CardinalType, Conflict, EPSILON};

/// Admissible lower bound on the extra cost any descendant pays to clear
/// the node's cardinal conflicts.
///
/// Every cardinal conflict (a, b) costs at least min(delta_a, delta_b) in
/// whichever child resolves it, so a weighted edge per conflict over the
/// agent set bounds the total from below:
///   - type 0: no bound,
///   - type 1: the LP relaxation  min sum x_i  s.t.  x_a + x_b >= w_ab,
///     solved through its dual (fractional matching) with a dense simplex,
///   - type 2: greedy matching over the same edges.
pub(crate) fn h_value(hlh_type: u8, num_agents: usize, conflicts: &[Conflict]) -> f64 {
    if hlh_type == 0 {
        return 0.0;
    }

    let edges: Vec<(usize, usize, f64)> = conflicts
        .iter()
        .filter(|conflict| conflict.cardinal_type == CardinalType::Cardinal)
        .map(|conflict| {
            (
                conflict.agent_1,
                conflict.agent_2,
                conflict.overcost_1.min(conflict.overcost_2),
            )
        })
        .filter(|&(_, _, weight)| weight > EPSILON)
        .collect();

    if edges.is_empty() {
        return 0.0;
    }
    if let Some(&(_, _, weight)) = edges.iter().find(|(_, _, w)| w.is_infinite()) {
        // Unresolvable pair: every descendant is at least this bad.
        return weight;
    }

    match hlh_type {
        1 => lp_relaxation(num_agents, &edges),
        _ => greedy_matching(&edges),
    }
}

/// Take the heaviest remaining conflict, drop everything incident to its
/// agents, repeat. A matching, hence a valid lower bound.
fn greedy_matching(edges: &[(usize, usize, f64)]) -> f64 {
    let mut ordered: Vec<&(usize, usize, f64)> = edges.iter().collect();
    ordered.sort_by_key(|&&(a, b, w)| (std::cmp::Reverse(OrderedFloat(w)), a, b));

    let mut used: Vec<usize> = Vec::new();
    let mut total = 0.0;
    for &&(a, b, weight) in &ordered {
        if used.contains(&a) || used.contains(&b) {
            continue;
        }
        used.push(a);
        used.push(b);
        total += weight;
    }
    total
}

/// Optimum of  max sum w_e y_e  s.t.  sum_{e incident to a} y_e <= 1,
/// y >= 0, the dual of the fractional covering LP above, so the two
/// optima coincide.
fn lp_relaxation(num_agents: usize, edges: &[(usize, usize, f64)]) -> f64 {
    let objective: Vec<f64> = edges.iter().map(|&(_, _, w)| w).collect();
    let mut rows = vec![vec![0.0; edges.len()]; num_agents];
    for (column, &(a, b, _)) in edges.iter().enumerate() {
        rows[a][column] = 1.0;
        rows[b][column] = 1.0;
    }
    simplex_max(&objective, &rows, &vec![1.0; num_agents])
}

/// Dense tableau simplex for  max c.y  s.t.  A y <= b, y >= 0  with b >= 0.
/// Bland's rule keeps it from cycling; problem sizes here are tiny.
fn simplex_max(c: &[f64], a: &[Vec<f64>], b: &[f64]) -> f64 {
    let num_rows = a.len();
    let num_cols = c.len();

    // Tableau: one row per constraint plus the objective row; columns are
    // the structural variables, the slacks and the right-hand side.
    let width = num_cols + num_rows + 1;
    let mut tableau = vec![vec![0.0; width]; num_rows + 1];
    for row in 0..num_rows {
        tableau[row][..num_cols].copy_from_slice(&a[row]);
        tableau[row][num_cols + row] = 1.0;
        tableau[row][width - 1] = b[row];
    }
    for column in 0..num_cols {
        tableau[num_rows][column] = -c[column];
    }

    loop {
        // Entering column: first with a negative objective coefficient.
        let Some(pivot_col) = (0..width - 1)
            .find(|&column| tableau[num_rows][column] < -EPSILON)
        else {
            break;
        };

        // Leaving row: tightest positive ratio, first on ties.
        let mut pivot_row = None;
        let mut best_ratio = f64::INFINITY;
        for row in 0..num_rows {
            let coefficient = tableau[row][pivot_col];
            if coefficient > EPSILON {
                let ratio = tableau[row][width - 1] / coefficient;
                if ratio + EPSILON < best_ratio {
                    best_ratio = ratio;
                    pivot_row = Some(row);
                }
            }
        }
        let Some(pivot_row) = pivot_row else {
            break; // unbounded; cannot happen with b >= 0 and bounded duals
        };

        let pivot = tableau[pivot_row][pivot_col];
        for value in tableau[pivot_row].iter_mut() {
            *value /= pivot;
        }
        for row in 0..=num_rows {
            if row == pivot_row {
                continue;
            }
            let factor = tableau[row][pivot_col];
            if factor.abs() > EPSILON {
                for column in 0..width {
                    tableau[row][column] -= factor * tableau[pivot_row][column];
                }
            }
        }
    }

    tableau[num_rows][width - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Move;

    fn cardinal(a: usize, b: usize, delta_a: f64, delta_b: f64) -> Conflict {
        Conflict {
            agent_1: a,
            agent_2: b,
            move_1: Move::new(0, 1, 0.0, 1.0),
            move_2: Move::new(1, 0, 0.0, 1.0),
            interval_1: (0.0, 1.0),
            interval_2: (0.0, 1.0),
            cardinal_type: CardinalType::Cardinal,
            overcost_1: delta_a,
            overcost_2: delta_b,
        }
    }

    #[test]
    fn test_type_zero_is_zero() {
        let conflicts = vec![cardinal(0, 1, 2.0, 3.0)];
        assert_eq!(h_value(0, 2, &conflicts), 0.0);
    }

    #[test]
    fn test_non_cardinal_conflicts_contribute_nothing() {
        let mut conflict = cardinal(0, 1, 0.0, 0.0);
        conflict.cardinal_type = CardinalType::NonCardinal;
        assert_eq!(h_value(2, 2, &[conflict]), 0.0);
    }

    #[test]
    fn test_single_conflict_bounds_by_cheaper_side() {
        let conflicts = vec![cardinal(0, 1, 2.0, 3.0)];
        assert!((h_value(2, 2, &conflicts) - 2.0).abs() < 1e-9);
        assert!((h_value(1, 2, &conflicts) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_greedy_keeps_disjoint_pairs() {
        let conflicts = vec![
            cardinal(0, 1, 1.0, 2.0),
            cardinal(2, 3, 4.0, 5.0),
            cardinal(1, 2, 10.0, 10.0),
        ];
        // Greedy grabs (1,2)=10 and then nothing else fits.
        assert!((h_value(2, 4, &conflicts) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_lp_beats_greedy_on_a_triangle() {
        // Triangle of unit-weight conflicts: any matching takes one edge,
        // the fractional optimum takes half of each.
        let conflicts = vec![
            cardinal(0, 1, 1.0, 1.0),
            cardinal(1, 2, 1.0, 1.0),
            cardinal(0, 2, 1.0, 1.0),
        ];
        assert!((h_value(2, 3, &conflicts) - 1.0).abs() < 1e-9);
        assert!((h_value(1, 3, &conflicts) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_infinite_pair_dominates() {
        let conflicts = vec![cardinal(0, 1, f64::INFINITY, f64::INFINITY)];
        assert!(h_value(2, 2, &conflicts).is_infinite());
    }
}
