//! # Content Resolution
//!
//! Picks the catalog entry nearest to a tile's noise point, one layer at a
//! time: terrain, then structure, then population.
//!
//! Later layers get an exclusion bias from earlier ones: fewer structures on
//! water, fewer people where nothing is built.
//!
//! Each layer draws its substate from its own stream, keyed off the tile's
//! stream by layer. A layer's substate never depends on which variants the
//! other layers resolved to.

use crate::catalog::Layer;
use crate::content::{ContentLayer, Population, Structure, StructureKind, Terrain, TerrainKind};
use crate::noise::NoisePoint;
use crate::random::{mix, SeededRandomStream};

/// Salt separating layer stream keys from other keyed derivations.
const LAYER_STREAM_SALT: u64 = 0x6C61_7965_725F_7331;

/// Structure exclusion bias over [`TerrainKind::Ocean`].
pub const OCEAN_STRUCTURE_BIAS: f64 = 0.1;
/// Structure exclusion bias over [`TerrainKind::Shore`].
pub const SHORE_STRUCTURE_BIAS: f64 = 0.05;
/// Population exclusion bias where the structure is [`StructureKind::None`].
pub const UNSETTLED_POPULATION_BIAS: f64 = 0.1;

/// Exclusion bias applied to the structure layer.
#[must_use]
pub const fn structure_bias(terrain: TerrainKind) -> f64 {
    match terrain {
        TerrainKind::Ocean => OCEAN_STRUCTURE_BIAS,
        TerrainKind::Shore => SHORE_STRUCTURE_BIAS,
        TerrainKind::Field | TerrainKind::Mountain => 0.0,
    }
}

/// Exclusion bias applied to the population layer.
#[must_use]
pub const fn population_bias(structure: StructureKind) -> f64 {
    match structure {
        StructureKind::None => UNSETTLED_POPULATION_BIAS,
        StructureKind::Village | StructureKind::Kingdom | StructureKind::BanditCamp => 0.0,
    }
}

/// Variant id of the entry nearest to `point`, or the layer's fallback if
/// none is within `DIFFERENCE_LIMIT - exclusion_bias`.
///
/// Ties go to the entry declared first.
#[must_use]
pub fn nearest_kind<L: ContentLayer>(point: &NoisePoint, exclusion_bias: f64) -> L::Kind {
    let mut best: Option<(L::Kind, f64)> = None;
    for entry in L::catalog() {
        let distance = entry.distance(point);
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((entry.kind, distance));
        }
    }

    match (best, L::DIFFERENCE_LIMIT) {
        (Some((kind, distance)), None) if distance.is_finite() => kind,
        (Some((kind, distance)), Some(limit)) if distance <= limit - exclusion_bias => kind,
        _ => L::FALLBACK,
    }
}

/// Stream the substate of `layer` is drawn from.
#[must_use]
pub fn layer_stream(tile_stream: &SeededRandomStream, layer: Layer) -> SeededRandomStream {
    tile_stream.derive_keyed(mix(LAYER_STREAM_SALT, layer as u64))
}

/// Resolves one layer and draws its substate from the layer's stream.
#[must_use]
pub fn resolve<L: ContentLayer>(
    tile_stream: &SeededRandomStream,
    point: &NoisePoint,
    exclusion_bias: f64,
) -> L {
    let kind = nearest_kind::<L>(point, exclusion_bias);
    L::generate(kind, &mut layer_stream(tile_stream, L::LAYER))
}

/// Resolved content of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileContent {
    /// Terrain layer.
    pub terrain: Terrain,
    /// Structure layer.
    pub structure: Structure,
    /// Population layer.
    pub population: Population,
}

/// Resolves every layer that is missing, keeping the ones given.
///
/// Present layers still feed the exclusion bias of later layers. A missing
/// layer comes out exactly as [`resolve_tile`] would have made it, given the
/// same earlier layers.
#[must_use]
pub fn resolve_missing(
    stream: &SeededRandomStream,
    point: &NoisePoint,
    terrain: Option<Terrain>,
    structure: Option<Structure>,
    population: Option<Population>,
) -> TileContent {
    let terrain = terrain.unwrap_or_else(|| resolve(stream, point, 0.0));
    let structure =
        structure.unwrap_or_else(|| resolve(stream, point, structure_bias(terrain.kind())));
    let population =
        population.unwrap_or_else(|| resolve(stream, point, population_bias(structure.kind())));
    TileContent {
        terrain,
        structure,
        population,
    }
}

/// Resolves all three layers.
#[must_use]
pub fn resolve_tile(stream: &SeededRandomStream, point: &NoisePoint) -> TileContent {
    resolve_missing(stream, point, None, None, None)
}
