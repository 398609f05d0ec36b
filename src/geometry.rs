use serde::{Deserialize, Serialize};

/// Distance below which two geometric features are considered touching.
pub const LINEAR_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn approx_eq(&self, other: Point) -> bool {
        self.distance(other) <= LINEAR_EPSILON
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn of(points: &[Point]) -> Self {
        let mut bbox = Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for p in points {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        bbox
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// True only when the boxes share a region of positive area. Boxes that
    /// merely touch along an edge or at a corner do not overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x - LINEAR_EPSILON
            && other.min_x < self.max_x - LINEAR_EPSILON
            && self.min_y < other.max_y - LINEAR_EPSILON
            && other.min_y < self.max_y - LINEAR_EPSILON
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }
}

/// Closed polygon given by its vertices; the closing edge from the last
/// vertex back to the first is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
    bbox: BoundingBox,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        let bbox = BoundingBox::of(&points);
        Self { points, bbox }
    }

    pub fn rectangle(width: f64, height: f64) -> Self {
        Self::new(vec![
            Point::new(0.0, 0.0),
            Point::new(width, 0.0),
            Point::new(width, height),
            Point::new(0.0, height),
        ])
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    // https://en.wikipedia.org/wiki/Shoelace_formula
    // counterclockwise = positive, clockwise = negative
    pub fn signed_area(&self) -> f64 {
        let sigma: f64 = self.edges().map(|(a, b)| a.x * b.y - b.x * a.y).sum();
        0.5 * sigma
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn centroid(&self) -> Point {
        let area = self.signed_area();
        if area.abs() <= f64::EPSILON {
            let n = self.points.len().max(1) as f64;
            let (sx, sy) = self
                .points
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            return Point::new(sx / n, sy / n);
        }

        let (mut c_x, mut c_y) = (0.0, 0.0);
        for (a, b) in self.edges() {
            let cross = a.x * b.y - b.x * a.y;
            c_x += (a.x + b.x) * cross;
            c_y += (a.y + b.y) * cross;
        }
        Point::new(c_x / (6.0 * area), c_y / (6.0 * area))
    }

    /// Rotates counterclockwise by `degrees` about the polygon's centroid.
    pub fn rotated(&self, degrees: f64) -> Polygon {
        self.rotated_about(degrees, self.centroid())
    }

    pub fn rotated_about(&self, degrees: f64, pivot: Point) -> Polygon {
        if normalize_degrees(degrees) == 0.0 {
            return self.clone();
        }
        let (sin, cos) = sin_cos_degrees(degrees);
        let points = self
            .points
            .iter()
            .map(|p| {
                let (dx, dy) = (p.x - pivot.x, p.y - pivot.y);
                Point::new(pivot.x + dx * cos - dy * sin, pivot.y + dx * sin + dy * cos)
            })
            .collect();
        Polygon::new(points)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Polygon {
        Polygon {
            points: self.points.iter().map(|p| p.translated(dx, dy)).collect(),
            bbox: self.bbox.translated(dx, dy),
        }
    }

    pub fn counterclockwise(mut self) -> Polygon {
        if self.signed_area() < 0.0 {
            self.points.reverse();
        }
        self
    }

    pub fn on_boundary(&self, p: Point) -> bool {
        self.edges().any(|(a, b)| point_on_segment(p, a, b))
    }

    /// Point strictly inside; points on the boundary are outside.
    pub fn contains_strictly(&self, p: Point) -> bool {
        if p.x <= self.bbox.min_x
            || p.x >= self.bbox.max_x
            || p.y <= self.bbox.min_y
            || p.y >= self.bbox.max_y
            || self.on_boundary(p)
        {
            return false;
        }

        // crossing number of a ray shot in +x direction
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Returns the first pair of edges (by index) that intersect although
    /// they should not, or `None` for a simple polygon.
    ///
    /// Adjacent edges may only share their common vertex; non-adjacent edges
    /// may not touch at all.
    pub fn find_self_intersection(&self) -> Option<(usize, usize)> {
        let n = self.points.len();
        let edge = |i: usize| (self.points[i], self.points[(i + 1) % n]);

        for i in 0..n {
            let (a1, a2) = edge(i);
            for j in (i + 1)..n {
                let (b1, b2) = edge(j);
                let adjacent = j == i + 1 || (i == 0 && j == n - 1);
                if adjacent {
                    // a spike folds an edge back onto its neighbour
                    let (shared, far_a, far_b) = if j == i + 1 { (a2, a1, b2) } else { (a1, a2, b1) };
                    if point_on_segment(far_b, shared, far_a) || point_on_segment(far_a, shared, far_b)
                    {
                        return Some((i, j));
                    }
                } else if segments_touch(a1, a2, b1, b2) {
                    return Some((i, j));
                }
            }
        }
        None
    }
}

/// Sine and cosine of an angle in degrees, exact for quarter turns so that
/// axis-aligned rotations do not drift off the grid.
pub fn sin_cos_degrees(degrees: f64) -> (f64, f64) {
    let normalized = normalize_degrees(degrees);
    if normalized == 0.0 {
        (0.0, 1.0)
    } else if normalized == 90.0 {
        (1.0, 0.0)
    } else if normalized == 180.0 {
        (0.0, -1.0)
    } else if normalized == 270.0 {
        (-1.0, 0.0)
    } else {
        normalized.to_radians().sin_cos()
    }
}

pub fn normalize_degrees(degrees: f64) -> f64 {
    let r = degrees.rem_euclid(360.0);
    if r >= 360.0 { 0.0 } else { r }
}

/// Signed distance of `p` from the directed line through `a` and `b`;
/// positive on the left.
pub fn signed_distance(a: Point, b: Point, p: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return a.distance(p);
    }
    (dx * (p.y - a.y) - dy * (p.x - a.x)) / len
}

pub fn point_on_segment(p: Point, a: Point, b: Point) -> bool {
    if p.approx_eq(a) || p.approx_eq(b) {
        return true;
    }
    if signed_distance(a, b, p).abs() > LINEAR_EPSILON {
        return false;
    }
    p.x >= a.x.min(b.x) - LINEAR_EPSILON
        && p.x <= a.x.max(b.x) + LINEAR_EPSILON
        && p.y >= a.y.min(b.y) - LINEAR_EPSILON
        && p.y <= a.y.max(b.y) + LINEAR_EPSILON
}

pub fn segments_cross(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = signed_distance(a1, a2, b1);
    let d2 = signed_distance(a1, a2, b2);
    let d3 = signed_distance(b1, b2, a1);
    let d4 = signed_distance(b1, b2, a2);
    strictly_opposite(d1, d2) && strictly_opposite(d3, d4)
}

/// Segments share at least one point, including endpoints and collinear overlap.
pub fn segments_touch(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    segments_cross(a1, a2, b1, b2)
        || point_on_segment(b1, a1, a2)
        || point_on_segment(b2, a1, a2)
        || point_on_segment(a1, b1, b2)
        || point_on_segment(a2, b1, b2)
}

pub fn line_intersection_param(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<f64> {
    let (rx, ry) = (a2.x - a1.x, a2.y - a1.y);
    let (sx, sy) = (b2.x - b1.x, b2.y - b1.y);
    let denom = rx * sy - ry * sx;
    if denom.abs() <= f64::EPSILON * (rx.hypot(ry) * sx.hypot(sy)).max(1.0) {
        return None;
    }
    Some(((b1.x - a1.x) * sy - (b1.y - a1.y) * sx) / denom)
}

pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + dx * t, a.y + dy * t))
}

/// Shortest distance between two segments; zero when they touch.
pub fn segment_distance(a1: Point, a2: Point, b1: Point, b2: Point) -> f64 {
    if segments_touch(a1, a2, b1, b2) {
        return 0.0;
    }
    point_segment_distance(a1, b1, b2)
        .min(point_segment_distance(a2, b1, b2))
        .min(point_segment_distance(b1, a1, a2))
        .min(point_segment_distance(b2, a1, a2))
}

fn strictly_opposite(a: f64, b: f64) -> bool {
    (a > LINEAR_EPSILON && b < -LINEAR_EPSILON) || (a < -LINEAR_EPSILON && b > LINEAR_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Polygon {
        Polygon::rectangle(size, size)
    }

    fn assert_same_outline(a: &Polygon, b: &Polygon) {
        assert_eq!(a.len(), b.len());
        for (p, q) in a.points().iter().zip(b.points()) {
            assert!(p.distance(*q) < 1e-9, "{p} != {q}");
        }
    }

    #[test]
    fn test_segment_distance() {
        let (a1, a2) = (Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert_eq!(segment_distance(a1, a2, Point::new(2.0, 3.0), Point::new(8.0, 3.0)), 3.0);
        assert_eq!(segment_distance(a1, a2, Point::new(13.0, 4.0), Point::new(20.0, 4.0)), 5.0);
        assert_eq!(segment_distance(a1, a2, Point::new(5.0, -1.0), Point::new(5.0, 1.0)), 0.0);
        assert_eq!(segment_distance(a1, a2, Point::new(10.0, 0.0), Point::new(10.0, 5.0)), 0.0);
    }

    #[test]
    fn test_shoelace_area_and_orientation() {
        let sq = square(10.0);
        assert_eq!(sq.signed_area(), 100.0);

        let cw = Polygon::new(sq.points().iter().rev().copied().collect());
        assert_eq!(cw.signed_area(), -100.0);
        assert_eq!(cw.area(), 100.0);
        assert_eq!(cw.counterclockwise().signed_area(), 100.0);
    }

    #[test]
    fn test_centroid_of_l_shape() {
        // 20x10 strip with a 10x10 block on its left end
        let l = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 20.0),
            Point::new(0.0, 20.0),
        ]);
        let c = l.centroid();
        let expected = 25.0 / 3.0;
        assert!((c.x - expected).abs() < 1e-9);
        assert!((c.y - expected).abs() < 1e-9);
    }

    #[test]
    fn test_quarter_turns_are_exact() {
        let rect = Polygon::rectangle(40.0, 20.0);
        let turned = rect.rotated(90.0);
        let bbox = turned.bbox();
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.height(), 40.0);
        assert!(turned.centroid().distance(rect.centroid()) < 1e-9);
    }

    #[test]
    fn test_rotate_round_trip_reproduces_outline() {
        let tri = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 5.0),
            Point::new(12.0, 22.0),
        ]);
        assert_same_outline(&tri.rotated(90.0).rotated(270.0), &tri);
        assert_same_outline(&tri.rotated(33.0).rotated(-33.0), &tri);
    }

    #[test]
    fn test_rotation_leaves_source_untouched() {
        let rect = Polygon::rectangle(40.0, 20.0);
        let before = rect.clone();
        let _ = rect.rotated(45.0);
        assert_eq!(rect, before);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(450.0), 90.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
    }

    #[test]
    fn test_contains_strictly_excludes_boundary() {
        let sq = square(10.0);
        assert!(sq.contains_strictly(Point::new(5.0, 5.0)));
        assert!(!sq.contains_strictly(Point::new(0.0, 5.0)));
        assert!(!sq.contains_strictly(Point::new(10.0, 10.0)));
        assert!(!sq.contains_strictly(Point::new(15.0, 5.0)));
    }

    #[test]
    fn test_contains_strictly_concave() {
        let u = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(30.0, 30.0),
            Point::new(20.0, 30.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 30.0),
            Point::new(0.0, 30.0),
        ]);
        assert!(!u.contains_strictly(Point::new(15.0, 20.0)));
        assert!(u.contains_strictly(Point::new(5.0, 20.0)));
        assert!(u.contains_strictly(Point::new(15.0, 5.0)));
    }

    #[test]
    fn test_self_intersection_detected() {
        let bowtie = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ]);
        assert!(bowtie.find_self_intersection().is_some());
        assert!(square(10.0).find_self_intersection().is_none());
    }

    #[test]
    fn test_segments_cross_vs_touch() {
        let (a1, a2) = (Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!(segments_cross(a1, a2, Point::new(5.0, -5.0), Point::new(5.0, 5.0)));
        // T-junction touches but does not cross
        assert!(!segments_cross(a1, a2, Point::new(5.0, 0.0), Point::new(5.0, 5.0)));
        assert!(segments_touch(a1, a2, Point::new(5.0, 0.0), Point::new(5.0, 5.0)));
        // collinear overlap
        assert!(segments_touch(a1, a2, Point::new(8.0, 0.0), Point::new(20.0, 0.0)));
        assert!(!segments_touch(a1, a2, Point::new(11.0, 0.0), Point::new(20.0, 0.0)));
    }

    #[test]
    fn test_bbox_touching_is_not_overlap() {
        let a = square(10.0).bbox();
        let b = a.translated(10.0, 0.0);
        let c = a.translated(9.0, 9.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }
}
