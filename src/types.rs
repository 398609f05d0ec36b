use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;

use crate::geometry::{Point, Polygon};
use crate::piece::PatternPiece;

/// Where one piece instance lies on the fabric: the outline is rotated about
/// its centroid, then moved by `translation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub piece_id: String,
    pub instance_index: usize,
    pub translation: Point,
    pub rotation: f64,
    /// The cut outline in fabric coordinates.
    pub outline: Vec<Point>,
    pub centroid: Point,
}

impl Placement {
    pub fn polygon(&self, piece: &PatternPiece) -> Polygon {
        piece.placed(self.rotation, self.translation)
    }
}

/// Placements in the order the placer accepted them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub placements: Vec<Placement>,
}

impl Layout {
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnplacedPiece {
    pub piece_id: String,
    pub instance_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    GenerationLimit,
    TimeLimit,
    Plateau,
    PerfectFit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::GenerationLimit => "generation limit",
            StopReason::TimeLimit => "time limit",
            StopReason::Plateau => "plateau",
            StopReason::PerfectFit => "perfect fit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchStats {
    /// Generations evolved after the initial population.
    pub generations: usize,
    pub evaluations: usize,
    /// Generation in which the returned layout was first found.
    pub best_generation: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub stop_reason: StopReason,
    /// Best fitness after each generation.
    pub history: Vec<f64>,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackingResult {
    pub layout: Layout,
    pub utilization: f64,
    pub unplaced: Vec<UnplacedPiece>,
    pub stats: SearchStats,
}

impl PackingResult {
    /// Ids of pieces with at least one instance left off the fabric.
    pub fn unplaced_pieces(&self) -> BTreeSet<&str> {
        self.unplaced.iter().map(|u| u.piece_id.as_str()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

impl std::fmt::Display for PackingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} placed, {} unplaced, {:.1}% utilization ({} after {} generations)",
            self.layout.len(),
            self.unplaced.len(),
            self.utilization * 100.0,
            self.stats.stop_reason,
            self.stats.generations,
        )
    }
}
