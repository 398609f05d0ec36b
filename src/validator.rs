use crate::geometry::{
    BoundingBox, LINEAR_EPSILON, Point, Polygon, line_intersection_param, point_on_segment,
    segment_distance, segments_cross,
};
use crate::piece::FabricSheet;

/// True when the polygons share a region of positive area.
///
/// Polygons that only touch (shared edge, shared vertex, an edge resting on
/// a vertex) do not overlap, so pieces may be packed flush. Works for
/// concave simple polygons.
pub fn overlaps(a: &Polygon, b: &Polygon) -> bool {
    let (bbox_a, bbox_b) = (a.bbox(), b.bbox());
    if !bbox_a.overlaps(&bbox_b) {
        return false;
    }

    let window = intersection(&bbox_a, &bbox_b);
    let edges_a: Vec<(Point, Point)> = a.edges().filter(|e| touches_window(e, &window)).collect();
    let edges_b: Vec<(Point, Point)> = b.edges().filter(|e| touches_window(e, &window)).collect();

    for &(a1, a2) in &edges_a {
        for &(b1, b2) in &edges_b {
            if segments_cross(a1, a2, b1, b2) {
                return true;
            }
        }
    }

    // No proper crossing: the polygons are disjoint, touch, or one
    // boundary runs through the other's interior without crossing it.
    boundary_enters(&edges_a, b)
        || boundary_enters(&edges_b, a)
        || interior_sample_hits(a, b)
        || interior_sample_hits(b, a)
}

/// True when every vertex lies inside `[0, width] x [0, height]`.
pub fn within_bounds(poly: &Polygon, sheet: &FabricSheet) -> bool {
    let bbox = poly.bbox();
    bbox.min_x >= -LINEAR_EPSILON
        && bbox.min_y >= -LINEAR_EPSILON
        && bbox.max_x <= sheet.width + LINEAR_EPSILON
        && bbox.max_y <= sheet.height + LINEAR_EPSILON
}

/// True when the polygons do not overlap and their boundaries stay at
/// least `spacing` apart. A spacing of zero allows touching.
pub fn keeps_clearance(a: &Polygon, b: &Polygon, spacing: f64) -> bool {
    if spacing <= 0.0 {
        return !overlaps(a, b);
    }
    let reach = spacing - LINEAR_EPSILON;
    let grown = BoundingBox {
        min_x: a.bbox().min_x - reach,
        min_y: a.bbox().min_y - reach,
        max_x: a.bbox().max_x + reach,
        max_y: a.bbox().max_y + reach,
    };
    if !grown.overlaps(&b.bbox()) {
        return true;
    }
    if overlaps(a, b) {
        return false;
    }
    a.edges()
        .all(|(p, q)| b.edges().all(|(r, s)| segment_distance(p, q, r, s) >= reach))
}

/// A candidate position is valid when it lies on the sheet and keeps
/// `spacing` clear of every placed polygon.
pub fn fits<'a>(
    candidate: &Polygon,
    sheet: &FabricSheet,
    placed: impl IntoIterator<Item = &'a Polygon>,
    spacing: f64,
) -> bool {
    within_bounds(candidate, sheet)
        && placed
            .into_iter()
            .all(|p| keeps_clearance(candidate, p, spacing))
}

fn intersection(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
    BoundingBox {
        min_x: a.min_x.max(b.min_x) - LINEAR_EPSILON,
        min_y: a.min_y.max(b.min_y) - LINEAR_EPSILON,
        max_x: a.max_x.min(b.max_x) + LINEAR_EPSILON,
        max_y: a.max_y.min(b.max_y) + LINEAR_EPSILON,
    }
}

fn touches_window(&(p, q): &(Point, Point), window: &BoundingBox) -> bool {
    p.x.max(q.x) >= window.min_x
        && p.x.min(q.x) <= window.max_x
        && p.y.max(q.y) >= window.min_y
        && p.y.min(q.y) <= window.max_y
}

/// Splits every edge at the points where it meets `other`'s boundary and
/// checks whether any resulting piece runs strictly inside `other`.
fn boundary_enters(edges: &[(Point, Point)], other: &Polygon) -> bool {
    for &(p, q) in edges {
        let (dx, dy) = (q.x - p.x, q.y - p.y);
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            continue;
        }

        let mut cuts = vec![0.0, 1.0];
        for (r, s) in other.edges() {
            if let Some(t) = line_intersection_param(p, q, r, s)
                && t > 0.0
                && t < 1.0
                && point_on_segment(Point::new(p.x + dx * t, p.y + dy * t), r, s)
            {
                cuts.push(t);
            }
        }
        for &v in other.points() {
            if point_on_segment(v, p, q) {
                let t = ((v.x - p.x) * dx + (v.y - p.y) * dy) / len_sq;
                cuts.push(t.clamp(0.0, 1.0));
            }
        }
        cuts.sort_by(f64::total_cmp);

        for w in cuts.windows(2) {
            if w[1] - w[0] <= f64::EPSILON {
                continue;
            }
            let t = 0.5 * (w[0] + w[1]);
            if other.contains_strictly(Point::new(p.x + dx * t, p.y + dy * t)) {
                return true;
            }
        }
    }
    false
}

/// Samples a point just inside `a` next to the middle of each of its edges.
/// Catches coincident outlines, where neither boundary enters the other.
fn interior_sample_hits(a: &Polygon, b: &Polygon) -> bool {
    let inward = if a.signed_area() >= 0.0 { 1.0 } else { -1.0 };
    for (p, q) in a.edges() {
        let (dx, dy) = (q.x - p.x, q.y - p.y);
        let len = dx.hypot(dy);
        if len == 0.0 {
            continue;
        }
        let depth = (len * 1e-3).clamp(10.0 * LINEAR_EPSILON, 1e-2);
        let sample = Point::new(
            0.5 * (p.x + q.x) - inward * dy / len * depth,
            0.5 * (p.y + q.y) + inward * dx / len * depth,
        );
        if b.contains_strictly(sample) && a.contains_strictly(sample) {
            return true;
        }
    }
    false
}
