//! Planar polygon predicates for region validation and clipping.
//!
//! A ring is a slice of `[x, y]` vertices whose last vertex repeats the
//! first. All predicates here expect rings in that closed form.

/// Return a copy of `ring` with the closing vertex appended when the input
/// leaves the closure implicit.
pub fn close_ring(ring: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut closed = ring.to_vec();
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first != last {
            closed.push(*first);
        }
    }
    closed
}

/// Signed area via the shoelace formula. Positive for counter-clockwise
/// rings, zero for degenerate ones.
pub fn signed_area(ring: &[[f64; 2]]) -> f64 {
    if ring.len() < 4 {
        return 0.0;
    }
    let mut sum = 0.0;
    for pair in ring.windows(2) {
        sum += pair[0][0] * pair[1][1] - pair[1][0] * pair[0][1];
    }
    sum / 2.0
}

fn orientation(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn on_segment(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
    p[0] >= a[0].min(b[0])
        && p[0] <= a[0].max(b[0])
        && p[1] >= a[1].min(b[1])
        && p[1] <= a[1].max(b[1])
}

/// Proper or improper intersection of segments `ab` and `cd`.
pub fn segments_intersect(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);

    if (o1 > 0.0) != (o2 > 0.0) && (o3 > 0.0) != (o4 > 0.0) && o1 != 0.0 && o2 != 0.0 {
        return true;
    }

    // Collinear overlap cases
    (o1 == 0.0 && on_segment(a, b, c))
        || (o2 == 0.0 && on_segment(a, b, d))
        || (o3 == 0.0 && on_segment(c, d, a))
        || (o4 == 0.0 && on_segment(c, d, b))
}

/// Check a closed ring for self-intersection by testing every pair of
/// non-adjacent edges. O(n^2), fine for the hand-drawn regions this tool
/// works with.
pub fn is_self_intersecting(ring: &[[f64; 2]]) -> bool {
    let n = ring.len().saturating_sub(1); // edge count
    if n < 3 {
        return false;
    }
    for i in 0..n {
        for j in (i + 1)..n {
            // Skip edges sharing a vertex, including the first/last pair.
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            if segments_intersect(ring[i], ring[i + 1], ring[j], ring[j + 1]) {
                return true;
            }
        }
    }
    false
}

/// Ray-casting point-in-polygon test against a closed ring.
pub fn point_in_ring(x: f64, y: f64, ring: &[[f64; 2]]) -> bool {
    if ring.len() < 4 {
        return false;
    }
    let mut inside = false;
    for pair in ring.windows(2) {
        let [x1, y1] = pair[0];
        let [x2, y2] = pair[1];
        if (y1 > y) != (y2 > y) {
            let x_cross = x1 + (y - y1) / (y2 - y1) * (x2 - x1);
            if x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}
