use serde::{Deserialize, Serialize};

use crate::config::PackingConfig;
use crate::error::{GeometryError, RequestError};
use crate::geometry::Point;
use crate::piece::{FabricSheet, PatternPiece};
use crate::rules::PatternRuleLookup;
use crate::solver;
use crate::types::{PackingResult, SearchStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceSpec {
    pub piece_id: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
    pub outline: OutlineSpec,
    /// Allowed rotations in degrees; quarter turns when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotations: Option<Vec<f64>>,
}

fn default_qty() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum OutlineSpec {
    Polygon { points: Vec<[f64; 2]> },
    Rect { width: f64, height: f64 },
}

impl PieceSpec {
    pub fn to_piece(&self) -> Result<PatternPiece, GeometryError> {
        let piece = match &self.outline {
            OutlineSpec::Polygon { points } => PatternPiece::new(
                self.piece_id.clone(),
                points.iter().map(|&[x, y]| Point::new(x, y)).collect(),
            )?,
            OutlineSpec::Rect { width, height } => {
                PatternPiece::rectangle(self.piece_id.clone(), *width, *height)?
            }
        };
        let piece = piece.with_quantity(self.qty)?;
        match &self.rotations {
            Some(rotations) => piece.with_rotations(rotations.clone()),
            None => Ok(piece),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRef {
    pub sleeves: String,
    pub neckline: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackRequest {
    /// Key under which the server keeps the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric_id: Option<String>,
    pub fabric: FabricSheet,
    #[serde(default)]
    pub pieces: Vec<PieceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<DesignRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PackingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementView {
    pub piece_id: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    /// Placed outline, ready to cut.
    pub points: Vec<[f64; 2]>,
    pub centroid: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackResponse {
    pub ok: bool,
    pub utilization: f64,
    pub placements: Vec<PlacementView>,
    pub unplaced: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsView {
    pub generations: usize,
    pub evaluations: usize,
    pub elapsed_ms: u64,
    pub stop_reason: String,
}

impl From<&SearchStats> for StatsView {
    fn from(stats: &SearchStats) -> Self {
        Self {
            generations: stats.generations,
            evaluations: stats.evaluations,
            elapsed_ms: stats.elapsed.as_millis() as u64,
            stop_reason: stats.stop_reason.to_string(),
        }
    }
}

impl PackResponse {
    pub fn failure(err: &RequestError) -> Self {
        Self {
            ok: false,
            utilization: 0.0,
            placements: Vec::new(),
            unplaced: Vec::new(),
            error: Some(err.to_string()),
            stats: None,
        }
    }
}

impl From<&PackingResult> for PackResponse {
    fn from(result: &PackingResult) -> Self {
        Self {
            ok: true,
            utilization: result.utilization,
            placements: result
                .layout
                .placements
                .iter()
                .map(|p| PlacementView {
                    piece_id: p.piece_id.clone(),
                    x: p.translation.x,
                    y: p.translation.y,
                    rotation: p.rotation,
                    points: p.outline.iter().map(|pt| [pt.x, pt.y]).collect(),
                    centroid: [p.centroid.x, p.centroid.y],
                })
                .collect(),
            unplaced: result
                .unplaced_pieces()
                .into_iter()
                .map(str::to_string)
                .collect(),
            error: None,
            stats: Some(StatsView::from(&result.stats)),
        }
    }
}

/// Pieces listed in the request, or those of the referenced design when the
/// request lists none. A known design without the requested size resolves
/// to no pieces.
pub fn resolve_pieces<L: PatternRuleLookup + ?Sized>(
    request: &PackRequest,
    rules: &L,
) -> Result<Vec<PatternPiece>, RequestError> {
    if !request.pieces.is_empty() {
        return request
            .pieces
            .iter()
            .map(|spec| spec.to_piece().map_err(RequestError::from))
            .collect();
    }
    let Some(design) = &request.design else {
        return Ok(Vec::new());
    };
    match rules.lookup(&design.sleeves, &design.neckline, &design.size) {
        Some(pattern) => Ok(pattern.pieces.clone()),
        None if rules.has_design(&design.sleeves, &design.neckline) => Ok(Vec::new()),
        None => Err(RequestError::PatternNotFound {
            sleeves: design.sleeves.clone(),
            neckline: design.neckline.clone(),
            size: design.size.clone(),
        }),
    }
}

pub fn handle<L: PatternRuleLookup + ?Sized>(
    request: &PackRequest,
    rules: &L,
) -> Result<PackingResult, RequestError> {
    let pieces = resolve_pieces(request, rules)?;
    let config = request.config.clone().unwrap_or_default();
    Ok(solver::pack(request.fabric, &pieces, &config)?)
}

/// [`handle`], with failures folded into an `ok: false` response.
pub fn respond<L: PatternRuleLookup + ?Sized>(request: &PackRequest, rules: &L) -> PackResponse {
    match handle(request, rules) {
        Ok(result) => PackResponse::from(&result),
        Err(err) => PackResponse::failure(&err),
    }
}
