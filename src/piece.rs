use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, InvalidRequestError};
use crate::geometry::{BoundingBox, LINEAR_EPSILON, Point, Polygon, normalize_degrees};

/// Quarter turns, used when a piece does not state its own rotations.
pub const DEFAULT_ROTATIONS: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

/// Rectangular fabric with its origin at (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FabricSheet {
    pub width: f64,
    pub height: f64,
}

impl FabricSheet {
    pub fn new(width: f64, height: f64) -> Result<Self, InvalidRequestError> {
        let sheet = Self { width, height };
        sheet.validate()?;
        Ok(sheet)
    }

    pub fn validate(&self) -> Result<(), InvalidRequestError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(())
        } else {
            Err(InvalidRequestError::InvalidSheet {
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl std::fmt::Display for FabricSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternPiece {
    id: String,
    outline: Polygon,
    rotations: Vec<f64>,
    quantity: u32,
}

impl PatternPiece {
    /// A trailing vertex equal to the first one is dropped, as are repeated
    /// consecutive vertices. Clockwise outlines are reversed.
    pub fn new(id: impl Into<String>, points: Vec<Point>) -> Result<Self, GeometryError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GeometryError::EmptyId);
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(GeometryError::NonFiniteCoordinate { piece_id: id });
        }

        let mut cleaned: Vec<Point> = Vec::with_capacity(points.len());
        for p in points {
            if cleaned.last().is_none_or(|last| last.distance(p) > LINEAR_EPSILON) {
                cleaned.push(p);
            }
        }
        while cleaned.len() > 1 && cleaned[0].distance(cleaned[cleaned.len() - 1]) <= LINEAR_EPSILON {
            cleaned.pop();
        }

        if cleaned.len() < 3 {
            return Err(GeometryError::TooFewVertices {
                piece_id: id,
                count: cleaned.len(),
            });
        }

        let outline = Polygon::new(cleaned);
        if outline.area() <= LINEAR_EPSILON {
            return Err(GeometryError::ZeroArea { piece_id: id });
        }
        if let Some((first_edge, second_edge)) = outline.find_self_intersection() {
            return Err(GeometryError::SelfIntersecting {
                piece_id: id,
                first_edge,
                second_edge,
            });
        }

        Ok(Self {
            id,
            outline: outline.counterclockwise(),
            rotations: DEFAULT_ROTATIONS.to_vec(),
            quantity: 1,
        })
    }

    pub fn rectangle(id: impl Into<String>, width: f64, height: f64) -> Result<Self, GeometryError> {
        let id = id.into();
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(GeometryError::InvalidRectangle {
                piece_id: id,
                width,
                height,
            });
        }
        Self::new(id, Polygon::rectangle(width, height).points().to_vec())
    }

    /// Replaces the allowed rotations (degrees, counterclockwise). Angles are
    /// normalised into `[0, 360)` and duplicates dropped, keeping the first
    /// occurrence.
    pub fn with_rotations(mut self, rotations: Vec<f64>) -> Result<Self, GeometryError> {
        if rotations.iter().any(|r| !r.is_finite()) {
            return Err(GeometryError::InvalidRotation { piece_id: self.id });
        }
        let mut unique: Vec<f64> = Vec::with_capacity(rotations.len());
        for r in rotations.into_iter().map(normalize_degrees) {
            if !unique.iter().any(|u| (u - r).abs() < 1e-9) {
                unique.push(r);
            }
        }
        if unique.is_empty() {
            return Err(GeometryError::NoRotations { piece_id: self.id });
        }
        self.rotations = unique;
        Ok(self)
    }

    pub fn with_quantity(mut self, quantity: u32) -> Result<Self, GeometryError> {
        if quantity == 0 {
            return Err(GeometryError::ZeroQuantity { piece_id: self.id });
        }
        self.quantity = quantity;
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn outline(&self) -> &Polygon {
        &self.outline
    }

    pub fn rotations(&self) -> &[f64] {
        &self.rotations
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn area(&self) -> f64 {
        self.outline.area()
    }

    pub fn rotate(&self, rotation: f64) -> Polygon {
        self.outline.rotated(rotation)
    }

    pub fn bounding_box(&self, rotation: f64) -> BoundingBox {
        self.rotate(rotation).bbox()
    }

    /// Outline as it lies on the fabric for a given rotation and translation.
    pub fn placed(&self, rotation: f64, translation: Point) -> Polygon {
        self.rotate(rotation).translated(translation.x, translation.y)
    }

    pub fn orientations(&self) -> Vec<Orientation> {
        self.rotations
            .iter()
            .map(|&rotation| Orientation::new(&self.outline, rotation))
            .collect()
    }
}

/// A piece rotated and shifted so that its bounding box starts at the origin.
///
/// Dropping the shape at an anchor `a` corresponds to the translation
/// `a + shift` of the rotated outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Orientation {
    pub rotation: f64,
    pub shape: Polygon,
    pub shift: Point,
}

impl Orientation {
    fn new(outline: &Polygon, rotation: f64) -> Self {
        let rotated = outline.rotated(rotation);
        let bbox = rotated.bbox();
        Self {
            rotation,
            shape: rotated.translated(-bbox.min_x, -bbox.min_y),
            shift: Point::new(-bbox.min_x, -bbox.min_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.shape.bbox().width()
    }

    pub fn height(&self) -> f64 {
        self.shape.bbox().height()
    }
}

/// `steps` rotations evenly spaced around the full circle, for pieces that
/// may be cut at any angle.
pub fn evenly_spaced_rotations(steps: usize) -> Vec<f64> {
    let steps = steps.max(1);
    (0..steps).map(|i| 360.0 * i as f64 / steps as f64).collect()
}
