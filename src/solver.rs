use std::collections::HashSet;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::config::PackingConfig;
use crate::error::{InvalidRequestError, PackError};
use crate::genetic::GeneticSearch;
use crate::piece::{FabricSheet, PatternPiece};
use crate::placer::Placer;
use crate::types::{Layout, PackingResult, Placement, UnplacedPiece};

/// Packs `pieces` onto `sheet` and returns the best layout found.
///
/// Uses `config.seed` when set, otherwise a generator seeded from the OS.
pub fn pack(
    sheet: FabricSheet,
    pieces: &[PatternPiece],
    config: &PackingConfig,
) -> Result<PackingResult, PackError> {
    let mut rng = match config.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };
    pack_with_rng(sheet, pieces, config, &mut rng)
}

/// Same as [`pack`] with the caller's generator. Every run owns its
/// population; nothing is shared between concurrent calls.
pub fn pack_with_rng<R: Rng + ?Sized>(
    sheet: FabricSheet,
    pieces: &[PatternPiece],
    config: &PackingConfig,
    rng: &mut R,
) -> Result<PackingResult, PackError> {
    validate_request(&sheet, pieces, config)?;

    let placer = Placer::new(sheet, pieces).with_spacing(config.spacing);
    let search = GeneticSearch::new(&placer, config);
    let outcome = search.run(rng);

    let layout = Layout {
        placements: outcome
            .nest
            .placed
            .iter()
            .map(|p| Placement {
                piece_id: pieces[p.instance.piece].id().to_string(),
                instance_index: p.instance.instance,
                translation: p.translation,
                rotation: p.rotation,
                outline: p.polygon.points().to_vec(),
                centroid: p.polygon.centroid(),
            })
            .collect(),
    };
    let mut unplaced: Vec<UnplacedPiece> = outcome
        .nest
        .unplaced
        .iter()
        .map(|i| UnplacedPiece {
            piece_id: pieces[i.piece].id().to_string(),
            instance_index: i.instance,
        })
        .collect();
    unplaced.sort();

    let result = PackingResult {
        layout,
        utilization: outcome.nest.utilization(&sheet),
        unplaced,
        stats: outcome.stats,
    };

    info!(
        sheet = %sheet,
        instances = search.instance_count(),
        placed = result.layout.len(),
        utilization = result.utilization,
        generations = result.stats.generations,
        stop_reason = %result.stats.stop_reason,
        elapsed_ms = result.stats.elapsed.as_millis() as u64,
        "packing finished"
    );
    if !result.is_complete() {
        warn!(
            unplaced = ?result.unplaced_pieces(),
            "some pieces did not fit on the fabric"
        );
    }

    Ok(result)
}

fn validate_request(
    sheet: &FabricSheet,
    pieces: &[PatternPiece],
    config: &PackingConfig,
) -> Result<(), InvalidRequestError> {
    if pieces.is_empty() {
        return Err(InvalidRequestError::EmptyPieceList);
    }
    sheet.validate()?;
    let mut seen = HashSet::new();
    for piece in pieces {
        if !seen.insert(piece.id()) {
            return Err(InvalidRequestError::DuplicatePieceId(piece.id().to_string()));
        }
    }
    config.validate()
}
