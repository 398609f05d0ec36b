use crate::geometry::{LINEAR_EPSILON, Point, Polygon};
use crate::piece::{FabricSheet, Orientation, PatternPiece};
use crate::validator;

/// Passes of the down/left gravity slide after a piece is accepted.
const SETTLE_PASSES: usize = 8;

/// One copy of a piece; `piece` indexes the piece list of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PieceInstance {
    pub piece: usize,
    pub instance: usize,
}

#[derive(Debug, Clone)]
pub struct PlacedInstance {
    pub instance: PieceInstance,
    pub rotation: f64,
    pub translation: Point,
    pub polygon: Polygon,
}

/// Outcome of one placement pass. Instances that found no position are kept
/// in `unplaced`; the pass never aborts because of them.
#[derive(Debug, Clone, Default)]
pub struct Nest {
    pub placed: Vec<PlacedInstance>,
    pub unplaced: Vec<PieceInstance>,
    pub placed_area: f64,
}

impl Nest {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn utilization(&self, sheet: &FabricSheet) -> f64 {
        (self.placed_area / sheet.area()).clamp(0.0, 1.0)
    }
}

/// Deterministic bottom-left-fill placer.
///
/// Holds the rotated shapes of every piece for the duration of one run so
/// that candidate evaluations never recompute them. Shared immutably by all
/// evaluations of a generation.
pub struct Placer<'a> {
    sheet: FabricSheet,
    pieces: &'a [PatternPiece],
    orientations: Vec<Vec<Orientation>>,
    // rotation indices per piece, smallest bounding box first
    priority: Vec<Vec<usize>>,
    min_step: f64,
    spacing: f64,
}

impl<'a> Placer<'a> {
    pub fn new(sheet: FabricSheet, pieces: &'a [PatternPiece]) -> Self {
        let orientations: Vec<Vec<Orientation>> =
            pieces.iter().map(PatternPiece::orientations).collect();
        let priority = orientations
            .iter()
            .map(|options| {
                let mut idx: Vec<usize> = (0..options.len()).collect();
                idx.sort_by(|&a, &b| {
                    let area = |o: &Orientation| o.shape.bbox().area();
                    area(&options[a]).total_cmp(&area(&options[b]))
                });
                idx
            })
            .collect();

        Self {
            sheet,
            pieces,
            orientations,
            priority,
            min_step: (sheet.width.min(sheet.height) * 1e-3).max(LINEAR_EPSILON),
            spacing: 0.0,
        }
    }

    /// Minimum gap kept between placed pieces.
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing.max(0.0);
        self
    }

    pub fn sheet(&self) -> &FabricSheet {
        &self.sheet
    }

    pub fn pieces(&self) -> &'a [PatternPiece] {
        self.pieces
    }

    /// Every required instance, piece by piece in input order.
    pub fn instances(&self) -> Vec<PieceInstance> {
        self.pieces
            .iter()
            .enumerate()
            .flat_map(|(piece, p)| {
                (0..p.quantity() as usize).map(move |instance| PieceInstance { piece, instance })
            })
            .collect()
    }

    pub fn rotation_count(&self, piece: usize) -> usize {
        self.orientations[piece].len()
    }

    /// Places `order` one instance at a time. `rotations[i]` is the rotation
    /// index tried first for `order[i]`; the piece's remaining rotations
    /// follow, smallest bounding box first.
    pub fn place(&self, order: &[PieceInstance], rotations: &[usize]) -> Nest {
        debug_assert_eq!(order.len(), rotations.len());

        let mut nest = Nest::default();
        let mut anchors: Vec<Point> = vec![Point::new(0.0, 0.0)];

        for (&instance, &preferred) in order.iter().zip(rotations) {
            let options = &self.orientations[instance.piece];
            let preferred = preferred % options.len();
            let tries = std::iter::once(preferred).chain(
                self.priority[instance.piece]
                    .iter()
                    .copied()
                    .filter(|&r| r != preferred),
            );

            let found = tries.map(|r| &options[r]).find_map(|orientation| {
                self.lowest_anchor(orientation, &anchors, &nest.placed)
                    .map(|anchor| (orientation, self.settle(orientation, anchor, &nest.placed)))
            });

            match found {
                Some((orientation, pos)) => {
                    let polygon = orientation.shape.translated(pos.x, pos.y);
                    let bbox = polygon.bbox();
                    let (right, top) = (bbox.max_x + self.spacing, bbox.max_y + self.spacing);
                    for anchor in [
                        Point::new(right, bbox.min_y),
                        Point::new(bbox.min_x, top),
                        Point::new(right, 0.0),
                        Point::new(0.0, top),
                    ] {
                        push_anchor(&mut anchors, anchor, &self.sheet);
                    }
                    nest.placed_area += self.pieces[instance.piece].area();
                    nest.placed.push(PlacedInstance {
                        instance,
                        rotation: orientation.rotation,
                        translation: Point::new(pos.x + orientation.shift.x, pos.y + orientation.shift.y),
                        polygon,
                    });
                }
                None => nest.unplaced.push(instance),
            }
        }

        nest
    }

    /// First anchor, lowest then leftmost, where the shape fits.
    fn lowest_anchor(
        &self,
        orientation: &Orientation,
        anchors: &[Point],
        placed: &[PlacedInstance],
    ) -> Option<Point> {
        if orientation.width() > self.sheet.width + LINEAR_EPSILON
            || orientation.height() > self.sheet.height + LINEAR_EPSILON
        {
            return None;
        }
        anchors
            .iter()
            .copied()
            .find(|&anchor| self.is_free(orientation, anchor, placed))
    }

    fn is_free(&self, orientation: &Orientation, at: Point, placed: &[PlacedInstance]) -> bool {
        if at.x + orientation.width() > self.sheet.width + LINEAR_EPSILON
            || at.y + orientation.height() > self.sheet.height + LINEAR_EPSILON
        {
            return false;
        }
        let candidate = orientation.shape.translated(at.x, at.y);
        validator::fits(
            &candidate,
            &self.sheet,
            placed.iter().map(|p| &p.polygon),
            self.spacing,
        )
    }

    /// Slides an accepted shape down, then left, while it stays valid.
    fn settle(&self, orientation: &Orientation, mut pos: Point, placed: &[PlacedInstance]) -> Point {
        for _ in 0..SETTLE_PASSES {
            let room = pos.y;
            let moved_down =
                self.slide(orientation, &mut pos, placed, |p, d| Point::new(p.x, p.y - d), room);
            let room = pos.x;
            let moved_left =
                self.slide(orientation, &mut pos, placed, |p, d| Point::new(p.x - d, p.y), room);
            if !moved_down && !moved_left {
                break;
            }
        }
        pos
    }

    // Tries the full distance to the sheet edge first, then halves it.
    fn slide(
        &self,
        orientation: &Orientation,
        pos: &mut Point,
        placed: &[PlacedInstance],
        shift: impl Fn(Point, f64) -> Point,
        room: f64,
    ) -> bool {
        let mut step = room;
        while step >= self.min_step {
            let candidate = shift(*pos, step);
            if self.is_free(orientation, candidate, placed) {
                *pos = candidate;
                return true;
            }
            step *= 0.5;
        }
        false
    }
}

// Anchors stay sorted lowest-then-leftmost and free of near duplicates.
fn push_anchor(anchors: &mut Vec<Point>, anchor: Point, sheet: &FabricSheet) {
    if anchor.x >= sheet.width - LINEAR_EPSILON || anchor.y >= sheet.height - LINEAR_EPSILON {
        return;
    }
    if anchors.iter().any(|a| a.distance(anchor) <= LINEAR_EPSILON) {
        return;
    }
    let idx = anchors.partition_point(|a| {
        a.y.total_cmp(&anchor.y)
            .then(a.x.total_cmp(&anchor.x))
            .is_lt()
    });
    anchors.insert(idx, anchor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{overlaps, within_bounds};

    fn square(id: &str, size: f64, qty: u32) -> PatternPiece {
        PatternPiece::rectangle(id, size, size)
            .unwrap()
            .with_quantity(qty)
            .unwrap()
    }

    fn run(sheet: FabricSheet, pieces: &[PatternPiece]) -> Nest {
        let placer = Placer::new(sheet, pieces);
        let order = placer.instances();
        let rotations = vec![0; order.len()];
        placer.place(&order, &rotations)
    }

    /// Every placed polygon lies on the sheet, overlaps no other one and
    /// matches its recorded rotation and translation.
    fn assert_nest_valid(nest: &Nest, sheet: &FabricSheet, pieces: &[PatternPiece]) {
        for (i, a) in nest.placed.iter().enumerate() {
            assert!(within_bounds(&a.polygon, sheet), "piece {i} leaves the sheet");
            let rebuilt = pieces[a.instance.piece].placed(a.rotation, a.translation);
            for (p, q) in rebuilt.points().iter().zip(a.polygon.points()) {
                assert!(p.distance(*q) < 1e-6, "piece {i}: {p} != {q}");
            }
            for (j, b) in nest.placed.iter().enumerate().skip(i + 1) {
                assert!(!overlaps(&a.polygon, &b.polygon), "piece {i} overlaps piece {j}");
            }
        }
    }

    #[test]
    fn test_two_squares_side_by_side() {
        let sheet = FabricSheet::new(100.0, 100.0).unwrap();
        let pieces = vec![square("sq", 40.0, 2)];
        let nest = run(sheet, &pieces);
        assert!(nest.is_complete());
        assert_nest_valid(&nest, &sheet, &pieces);
        assert!((nest.utilization(&sheet) - 0.32).abs() < 1e-9);
        assert_eq!(nest.placed[0].polygon.bbox().min_x, 0.0);
        assert_eq!(nest.placed[1].polygon.bbox().min_x, 40.0);
        assert_eq!(nest.placed[1].polygon.bbox().min_y, 0.0);
    }

    #[test]
    fn test_spacing_between_squares() {
        let sheet = FabricSheet::new(100.0, 100.0).unwrap();
        let pieces = vec![square("sq", 40.0, 4)];
        let placer = Placer::new(sheet, &pieces).with_spacing(5.0);
        let order = placer.instances();
        let nest = placer.place(&order, &vec![0; order.len()]);

        assert!(nest.is_complete());
        assert_nest_valid(&nest, &sheet, &pieces);
        assert_eq!(nest.placed[1].polygon.bbox().min_x, 45.0);
        for (i, a) in nest.placed.iter().enumerate() {
            for b in nest.placed.iter().skip(i + 1) {
                assert!(validator::keeps_clearance(&a.polygon, &b.polygon, 5.0 - 1e-6));
            }
        }
    }

    #[test]
    fn test_piece_too_large() {
        let sheet = FabricSheet::new(10.0, 10.0).unwrap();
        let pieces = vec![square("big", 20.0, 1)];
        let nest = run(sheet, &pieces);
        assert!(nest.placed.is_empty());
        assert_eq!(nest.unplaced, vec![PieceInstance { piece: 0, instance: 0 }]);
        assert_eq!(nest.utilization(&sheet), 0.0);
    }

    #[test]
    fn test_exact_tiling() {
        let sheet = FabricSheet::new(100.0, 100.0).unwrap();
        let pieces = vec![square("q", 50.0, 4)];
        let nest = run(sheet, &pieces);
        assert!(nest.is_complete());
        assert_nest_valid(&nest, &sheet, &pieces);
        assert_eq!(nest.utilization(&sheet), 1.0);
    }

    #[test]
    fn test_continues_after_unplaceable_piece() {
        let sheet = FabricSheet::new(50.0, 50.0).unwrap();
        let pieces = vec![square("huge", 60.0, 1), square("small", 10.0, 3)];
        let nest = run(sheet, &pieces);
        assert_eq!(nest.unplaced.len(), 1);
        assert_eq!(nest.unplaced[0].piece, 0);
        assert_eq!(nest.placed.len(), 3);
        assert_nest_valid(&nest, &sheet, &pieces);
    }

    #[test]
    fn test_falls_back_to_other_rotation() {
        // only fits when turned a quarter
        let sheet = FabricSheet::new(100.0, 50.0).unwrap();
        let pieces = vec![
            PatternPiece::rectangle("long", 50.0, 100.0)
                .unwrap()
                .with_rotations(vec![0.0, 90.0])
                .unwrap(),
        ];
        let nest = run(sheet, &pieces);
        assert!(nest.is_complete());
        assert_eq!(nest.placed[0].rotation, 90.0);
        assert_nest_valid(&nest, &sheet, &pieces);
    }

    #[test]
    fn test_preferred_rotation_tried_first() {
        let sheet = FabricSheet::new(200.0, 200.0).unwrap();
        let pieces = vec![PatternPiece::rectangle("p", 40.0, 20.0).unwrap()];
        let placer = Placer::new(sheet, &pieces);
        let order = placer.instances();
        let nest = placer.place(&order, &[3]);
        assert_eq!(nest.placed[0].rotation, 270.0);
        assert_nest_valid(&nest, &sheet, &pieces);
    }

    #[test]
    fn test_gravity_settles_into_concave_space() {
        // the square cannot sit right of the triangle, so it starts on top
        // of its bounding box and slides down onto the hypotenuse
        let sheet = FabricSheet::new(45.0, 100.0).unwrap();
        let tri = PatternPiece::new(
            "tri",
            vec![Point::new(0.0, 0.0), Point::new(40.0, 0.0), Point::new(40.0, 40.0)],
        )
        .unwrap()
        .with_rotations(vec![0.0])
        .unwrap();
        let sq = PatternPiece::rectangle("sq", 10.0, 10.0)
            .unwrap()
            .with_rotations(vec![0.0])
            .unwrap();
        let pieces = vec![tri, sq];
        let nest = run(sheet, &pieces);

        assert!(nest.is_complete());
        assert_nest_valid(&nest, &sheet, &pieces);
        let settled = nest.placed[1].translation;
        assert!(settled.x.abs() < 1e-9);
        assert!((settled.y - 10.0).abs() < 1e-6, "square rests at y={}", settled.y);
    }

    #[test]
    fn test_mixed_sizes_layout_valid() {
        let sheet = FabricSheet::new(300.0, 600.0).unwrap();
        let pieces = vec![
            PatternPiece::rectangle("front", 50.77, 51.28).unwrap().with_quantity(6).unwrap(),
            PatternPiece::rectangle("back", 50.77, 51.28).unwrap().with_quantity(6).unwrap(),
            PatternPiece::rectangle("sleeve", 23.98, 42.45).unwrap().with_quantity(12).unwrap(),
        ];
        let nest = run(sheet, &pieces);
        assert!(nest.is_complete());
        assert_nest_valid(&nest, &sheet, &pieces);
    }

    #[test]
    fn test_placement_is_deterministic() {
        let sheet = FabricSheet::new(120.0, 80.0).unwrap();
        let pieces = vec![
            PatternPiece::new(
                "collar",
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(26.0, 0.0),
                    Point::new(26.0, 29.0),
                    Point::new(13.0, 35.0),
                    Point::new(0.0, 29.0),
                ],
            )
            .unwrap()
            .with_quantity(4)
            .unwrap(),
            square("cuff", 15.0, 3),
        ];
        let placer = Placer::new(sheet, &pieces);
        let mut order = placer.instances();
        order.reverse();
        let rotations: Vec<usize> = (0..order.len()).map(|i| i % 4).collect();

        let first = placer.place(&order, &rotations);
        let second = placer.place(&order, &rotations);
        assert_eq!(first.placed.len(), second.placed.len());
        for (a, b) in first.placed.iter().zip(&second.placed) {
            assert_eq!(a.instance, b.instance);
            assert_eq!(a.rotation.to_bits(), b.rotation.to_bits());
            assert_eq!(a.translation.x.to_bits(), b.translation.x.to_bits());
            assert_eq!(a.translation.y.to_bits(), b.translation.y.to_bits());
        }
        assert_nest_valid(&first, &sheet, &pieces);
    }
}
