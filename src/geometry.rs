//! Exact collision tests between disks of a shared radius sliding along
//! roadmap edges at unit speed. All windows are half-open at the upper
//! end; a zero-measure touch is not a collision.

use crate::common::{Move, EPSILON};
use crate::map::Roadmap;

fn velocity(mv: &Move, map: &Roadmap) -> (f64, f64) {
    if mv.is_wait() {
        return (0.0, 0.0);
    }
    let (fx, fy) = map.coord(mv.from);
    let (tx, ty) = map.coord(mv.to);
    let dur = mv.duration();
    ((tx - fx) / dur, (ty - fy) / dur)
}

fn position(mv: &Move, map: &Roadmap, t: f64) -> (f64, f64) {
    let (fx, fy) = map.coord(mv.from);
    let (vx, vy) = velocity(mv, map);
    (fx + vx * (t - mv.t_start), fy + vy * (t - mv.t_start))
}

/// Squared closest distance between the two moving centers over the shared
/// half-open window, or +inf when the windows do not overlap.
fn min_distance_sq(a: &Move, b: &Move, map: &Roadmap) -> f64 {
    let lo = a.t_start.max(b.t_start);
    let hi = a.t_end.min(b.t_end);
    if hi - lo <= EPSILON {
        return f64::INFINITY;
    }

    let (ax, ay) = position(a, map, lo);
    let (bx, by) = position(b, map, lo);
    let (avx, avy) = velocity(a, map);
    let (bvx, bvy) = velocity(b, map);

    let dx = ax - bx;
    let dy = ay - by;
    let dvx = avx - bvx;
    let dvy = avy - bvy;

    let speed_sq = dvx * dvx + dvy * dvy;
    if speed_sq < EPSILON {
        // Fixed relative offset across the whole window.
        return dx * dx + dy * dy;
    }

    // Quadratic |d + v*tau|^2, minimized at tau = -(d.v)/|v|^2 clamped
    // into the window.
    let tau = (-(dx * dvx + dy * dvy) / speed_sq).clamp(0.0, hi - lo);
    let cx = dx + dvx * tau;
    let cy = dy + dvy * tau;
    cx * cx + cy * cy
}

/// Do the two agents' disks overlap at any instant both moves are active?
pub fn moves_collide(a: &Move, b: &Move, map: &Roadmap, radius: f64) -> bool {
    let threshold = 4.0 * radius * radius;
    min_distance_sq(a, b, map) + EPSILON < threshold
}

/// Times during which a disk parked at `vertex` overlaps the disk executing
/// `fixed`, clipped to the move's own window. Analytic: the squared
/// center distance is quadratic in t.
pub fn vertex_unsafe_interval(
    fixed: &Move,
    vertex: usize,
    map: &Roadmap,
    radius: f64,
) -> Option<(f64, f64)> {
    let threshold = 4.0 * radius * radius;
    let (qx, qy) = map.coord(vertex);
    let (px, py) = map.coord(fixed.from);
    let (vx, vy) = velocity(fixed, map);

    let dx = px - qx;
    let dy = py - qy;
    let speed_sq = vx * vx + vy * vy;

    if speed_sq < EPSILON {
        if dx * dx + dy * dy + EPSILON < threshold {
            return Some((fixed.t_start, fixed.t_end));
        }
        return None;
    }

    // |d + v*tau|^2 = threshold
    let half_b = dx * vx + dy * vy;
    let c = dx * dx + dy * dy - threshold;
    let disc = half_b * half_b - speed_sq * c;
    if disc <= EPSILON {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let tau_1 = (-half_b - sqrt_disc) / speed_sq;
    let tau_2 = (-half_b + sqrt_disc) / speed_sq;

    let lo = (fixed.t_start + tau_1).max(fixed.t_start);
    let hi = (fixed.t_start + tau_2).min(fixed.t_end);
    if hi - lo <= EPSILON {
        return None;
    }
    Some((lo, hi))
}

/// Parameter range [tau_1, tau_2] of the directed edge (from, to) within
/// 2r of the point, measured in traversal time from the edge start.
fn edge_proximity_range(
    from: usize,
    to: usize,
    point: (f64, f64),
    map: &Roadmap,
    radius: f64,
) -> Option<(f64, f64)> {
    let probe = Move::new(from, to, 0.0, map.edge_duration(from, to));
    let threshold = 4.0 * radius * radius;
    let (px, py) = map.coord(from);
    let (vx, vy) = velocity(&probe, map);
    let dx = px - point.0;
    let dy = py - point.1;
    let speed_sq = vx * vx + vy * vy;
    let half_b = dx * vx + dy * vy;
    let c = dx * dx + dy * dy - threshold;
    let disc = half_b * half_b - speed_sq * c;
    if disc <= EPSILON {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let tau_1 = ((-half_b - sqrt_disc) / speed_sq).max(0.0);
    let tau_2 = ((-half_b + sqrt_disc) / speed_sq).min(probe.t_end);
    if tau_2 - tau_1 <= EPSILON {
        return None;
    }
    Some((tau_1, tau_2))
}

/// Maximal half-open interval of start times for the template move
/// (from, to) that still collide with `fixed`. `hit_start` must be a start
/// time known to collide. Endpoints are located by bisection to
/// `precision`, rounded outward so the interval covers every colliding
/// start.
pub fn collision_interval(
    fixed: &Move,
    from: usize,
    to: usize,
    map: &Roadmap,
    radius: f64,
    precision: f64,
    hit_start: f64,
) -> (f64, f64) {
    let dur = if from == to {
        0.0
    } else {
        map.edge_duration(from, to)
    };

    if fixed.t_end.is_infinite() {
        // The fixed agent dwells forever; once the template's swept segment
        // dips inside the parked disk after the dwell begins, every later
        // start collides too.
        let anchor = position(fixed, map, fixed.t_start);
        if from == to {
            return (fixed.t_start, f64::INFINITY);
        }
        let (_, tau_2) =
            edge_proximity_range(from, to, anchor, map, radius).unwrap_or((0.0, dur));
        return ((fixed.t_start - tau_2).max(0.0), f64::INFINITY);
    }

    if from == to {
        // Waiting template: the unsafe window is the span of times during
        // which merely being at the vertex collides.
        return vertex_unsafe_interval(fixed, from, map, radius)
            .unwrap_or((hit_start, hit_start + precision));
    }

    let collides_at = |start: f64| -> bool {
        let candidate = Move::new(from, to, start, start + dur);
        moves_collide(fixed, &candidate, map, radius)
    };

    // No temporal overlap at either bracket, hence no collision there.
    let mut left_out = (fixed.t_start - dur).min(hit_start);
    let mut left_in = hit_start;
    while left_in - left_out > precision {
        let mid = 0.5 * (left_out + left_in);
        if collides_at(mid) {
            left_in = mid;
        } else {
            left_out = mid;
        }
    }

    let mut right_in = hit_start;
    let mut right_out = fixed.t_end.max(hit_start);
    while right_out - right_in > precision {
        let mid = 0.5 * (right_in + right_out);
        if collides_at(mid) {
            right_in = mid;
        } else {
            right_out = mid;
        }
    }

    (left_out.max(0.0), right_out)
}
