//! # Chunk System
//!
//! The world is split into fixed-size square chunks of lazily generated tiles.
//!
//! ## Coordinates
//!
//! A tile's absolute position is `chunk * CHUNK_SIZE + relative`. Negative
//! positions use floor division, so tile `-1` belongs to chunk `-1`.
//!
//! ## Storage
//!
//! Chunks are saved as JSON records:
//!
//! ```text
//! { "position_x": 1, "position_y": -2, "tiles": [ { ...tile... }, ... ] }
//! ```

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};
use wanderer_persistence::fields::{optional, required};
use wanderer_persistence::{
    JsonConvert, JsonObject, Migration, ParseReport, PersistError, PersistResult,
};

use crate::noise::{NoiseAxis, NoiseField};
use crate::random::SeededRandomStream;
use crate::registry::RandomRegistry;
use crate::tile::{Tile, TileContext};

/// Chunk width and height in tiles.
pub const CHUNK_SIZE: i64 = 16;

/// Tiles in a full chunk.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const TILES_PER_CHUNK: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not tiles).
    pub x: i64,
    /// Y coordinate (in chunks, not tiles).
    pub y: i64,
}

impl ChunkCoord {
    /// Smallest coordinate on either axis whose tiles have `i64` positions.
    pub const MIN: i64 = i64::MIN.div_euclid(CHUNK_SIZE);
    /// Largest coordinate on either axis whose tiles have `i64` positions.
    pub const MAX: i64 = i64::MAX.div_euclid(CHUNK_SIZE);

    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Chunk holding the tile at absolute position `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn from_tile_pos(x: i64, y: i64) -> Self {
        Self {
            x: x.div_euclid(CHUNK_SIZE),
            y: y.div_euclid(CHUNK_SIZE),
        }
    }

    /// Returns true if every tile of this chunk has an `i64` position.
    #[inline]
    #[must_use]
    pub const fn is_addressable(self) -> bool {
        Self::MIN <= self.x && self.x <= Self::MAX && Self::MIN <= self.y && self.y <= Self::MAX
    }

    /// Absolute position of the chunk's `(0, 0)` tile.
    ///
    /// Saturates for coordinates that are not [addressable](Self::is_addressable).
    #[inline]
    #[must_use]
    pub const fn origin(self) -> (i64, i64) {
        (
            self.x.saturating_mul(CHUNK_SIZE),
            self.y.saturating_mul(CHUNK_SIZE),
        )
    }
}

/// Splits an absolute tile position into its chunk and relative position.
#[inline]
#[must_use]
pub const fn split_tile_pos(x: i64, y: i64) -> (ChunkCoord, (i64, i64)) {
    (
        ChunkCoord::from_tile_pos(x, y),
        (x.rem_euclid(CHUNK_SIZE), y.rem_euclid(CHUNK_SIZE)),
    )
}

/// A square of tiles with its own random stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    coord: ChunkCoord,
    stream: SeededRandomStream,
    tiles: BTreeMap<(i64, i64), Tile>,
}

impl Chunk {
    /// Creates an empty chunk. Its stream comes from the registry.
    #[must_use]
    pub fn new(coord: ChunkCoord, registry: &RandomRegistry) -> Self {
        debug!("creating chunk ({}, {})", coord.x, coord.y);
        Self {
            coord,
            stream: registry.chunk_stream(coord),
            tiles: BTreeMap::new(),
        }
    }

    /// Grid coordinate.
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// The chunk's private stream.
    #[must_use]
    pub fn stream(&self) -> &SeededRandomStream {
        &self.stream
    }

    /// Context for generating or rebuilding this chunk's tiles.
    #[must_use]
    pub fn tile_context<'a>(&'a self, noise_fields: &'a [NoiseField; NoiseAxis::COUNT]) -> TileContext<'a> {
        TileContext {
            chunk_stream: &self.stream,
            chunk_origin: self.coord.origin(),
            noise_fields,
        }
    }

    /// Tile at `relative_position`, if it has been generated or loaded.
    #[must_use]
    pub fn tile(&self, relative_position: (i64, i64)) -> Option<&Tile> {
        self.tiles.get(&relative_position)
    }

    /// Mutable tile at `relative_position`, if it has been generated or loaded.
    pub fn tile_mut(&mut self, relative_position: (i64, i64)) -> Option<&mut Tile> {
        self.tiles.get_mut(&relative_position)
    }

    /// Realized tiles, ordered by relative position.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Number of realized tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns true if no tile has been realized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Returns true if every tile has been realized.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tiles.len() >= TILES_PER_CHUNK
    }

    /// Returns the tile at `relative_position`, generating it if needed.
    ///
    /// `relative_position` must be inside the chunk.
    pub fn get_or_generate_tile(
        &mut self,
        relative_position: (i64, i64),
        noise_fields: &[NoiseField; NoiseAxis::COUNT],
    ) -> &mut Tile {
        debug_assert!(
            (0..CHUNK_SIZE).contains(&relative_position.0)
                && (0..CHUNK_SIZE).contains(&relative_position.1),
            "tile {relative_position:?} is outside the chunk"
        );
        let context = TileContext {
            chunk_stream: &self.stream,
            chunk_origin: self.coord.origin(),
            noise_fields,
        };
        self.tiles
            .entry(relative_position)
            .or_insert_with(|| Tile::generate(relative_position, &context))
    }

    /// Generates every missing tile. Returns how many were generated.
    pub fn fill(&mut self, noise_fields: &[NoiseField; NoiseAxis::COUNT]) -> usize {
        let before = self.tiles.len();
        for x in 0..CHUNK_SIZE {
            for y in 0..CHUNK_SIZE {
                self.get_or_generate_tile((x, y), noise_fields);
            }
        }
        self.tiles.len() - before
    }

    /// Absolute min and max corners of the realized tiles.
    #[must_use]
    pub fn tile_bounds(&self) -> Option<((i64, i64), (i64, i64))> {
        let (ox, oy) = self.coord.origin();
        self.tiles.keys().fold(None, |bounds, &(x, y)| {
            let (ax, ay) = (ox.saturating_add(x), oy.saturating_add(y));
            Some(match bounds {
                None => ((ax, ay), (ax, ay)),
                Some(((min_x, min_y), (max_x, max_y))) => (
                    (min_x.min(ax), min_y.min(ay)),
                    (max_x.max(ax), max_y.max(ay)),
                ),
            })
        })
    }
}

mod keys {
    pub const POSITION_X: &str = "position_x";
    pub const POSITION_Y: &str = "position_y";
    pub const TILES: &str = "tiles";
}

impl Chunk {
    /// Position recorded in a chunk save record.
    ///
    /// # Errors
    ///
    /// Fails if a position field is missing or the chunk is not
    /// [addressable](ChunkCoord::is_addressable).
    pub fn stored_coord(record: &JsonObject) -> PersistResult<ChunkCoord> {
        let x: i64 = required(record, Self::TYPE_NAME, keys::POSITION_X)?;
        let y: i64 = required(record, Self::TYPE_NAME, keys::POSITION_Y)?;
        for (field, value) in [(keys::POSITION_X, x), (keys::POSITION_Y, y)] {
            if !(ChunkCoord::MIN..=ChunkCoord::MAX).contains(&value) {
                return Err(PersistError::OutOfRange {
                    type_name: Self::TYPE_NAME,
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(ChunkCoord::new(x, y))
    }
}

impl JsonConvert for Chunk {
    type Context<'a> = &'a RandomRegistry;

    const TYPE_NAME: &'static str = "Chunk";

    fn to_json(&self) -> JsonObject {
        let tiles = self
            .tiles
            .values()
            .map(|tile| Value::Object(tile.to_json()))
            .collect::<Vec<_>>();

        let mut record = JsonObject::new();
        record.insert(keys::POSITION_X.into(), self.coord.x.into());
        record.insert(keys::POSITION_Y.into(), self.coord.y.into());
        record.insert(keys::TILES.into(), Value::Array(tiles));
        record
    }

    fn from_json_without_correction(
        record: &JsonObject,
        registry: &RandomRegistry,
        migration: Migration<'_>,
        report: &mut ParseReport,
    ) -> PersistResult<Self> {
        let coord = Self::stored_coord(record)?;
        let (x, y) = (coord.x, coord.y);
        let mut chunk = Self::new(coord, registry);

        let tile_records: Vec<Value> =
            optional(record, Self::TYPE_NAME, keys::TILES, report).unwrap_or_default();

        let mut tiles = BTreeMap::new();
        for tile_record in tile_records {
            let Value::Object(tile_record) = tile_record else {
                warn!("{} parse error: tile record in chunk ({x}, {y}) is not an object, skipping", Self::TYPE_NAME);
                continue;
            };
            let context = chunk.tile_context(registry.noise_fields());
            match Tile::from_json(tile_record, context, migration) {
                Ok(parsed) => {
                    report.merge(parsed.report);
                    let position = parsed.value.relative_position();
                    if tiles.insert(position, parsed.value).is_some() {
                        warn!("duplicate tile {position:?} in chunk ({x}, {y}), keeping the last one");
                    }
                }
                Err(e) => warn!("skipping tile in chunk ({x}, {y}): {e}"),
            }
        }
        chunk.tiles = tiles;
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoiseSettings;
    use serde_json::json;
    use wanderer_persistence::fields::into_object;
    use wanderer_persistence::{JsonCorrecter, SaveVersion};

    fn registry() -> RandomRegistry {
        RandomRegistry::from_seed(42, &NoiseSettings::default())
    }

    fn load(record: Value, registry: &RandomRegistry) -> PersistResult<Chunk> {
        let correcter = JsonCorrecter::new(SaveVersion::parse("2.4").unwrap());
        let migration = Migration::new(&correcter, correcter.current()).unwrap();
        Chunk::from_json(into_object(record, "Chunk").unwrap(), registry, migration)
            .map(|parsed| parsed.value)
    }

    #[test]
    fn test_chunk_coord_from_tile() {
        assert_eq!(ChunkCoord::from_tile_pos(0, 0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_tile_pos(15, 15), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_tile_pos(16, 0), ChunkCoord::new(1, 0));
        assert_eq!(ChunkCoord::from_tile_pos(-1, -1), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_tile_pos(-16, -16), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_tile_pos(-17, -17), ChunkCoord::new(-2, -2));
    }

    #[test]
    fn test_split_tile_pos() {
        assert_eq!(split_tile_pos(16, 0), (ChunkCoord::new(1, 0), (0, 0)));
        assert_eq!(split_tile_pos(-1, 33), (ChunkCoord::new(-1, 2), (15, 1)));
        let (coord, (rx, ry)) = split_tile_pos(-40, 7);
        let (ox, oy) = coord.origin();
        assert_eq!((ox + rx, oy + ry), (-40, 7));
    }

    #[test]
    fn test_chunk_generation_determinism() {
        let registry = registry();
        let mut a = Chunk::new(ChunkCoord::new(5, 10), &registry);
        let mut b = Chunk::new(ChunkCoord::new(5, 10), &registry);

        assert_eq!(a.fill(registry.noise_fields()), TILES_PER_CHUNK);
        b.fill(registry.noise_fields());
        assert_eq!(a, b);
    }

    #[test]
    fn test_generation_order_does_not_matter() {
        let registry = registry();
        let fields = registry.noise_fields();
        let mut forward = Chunk::new(ChunkCoord::new(-2, 3), &registry);
        let mut backward = Chunk::new(ChunkCoord::new(-2, 3), &registry);

        forward.fill(fields);
        for x in (0..CHUNK_SIZE).rev() {
            for y in (0..CHUNK_SIZE).rev() {
                backward.get_or_generate_tile((x, y), fields);
            }
        }
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_fill_is_idempotent() {
        let registry = registry();
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), &registry);
        chunk.get_or_generate_tile((3, 3), registry.noise_fields()).visit();

        assert_eq!(chunk.fill(registry.noise_fields()), TILES_PER_CHUNK - 1);
        assert_eq!(chunk.fill(registry.noise_fields()), 0);
        assert!(chunk.is_full());
        // The visited tile was not regenerated.
        assert_eq!(chunk.tile((3, 3)).map(Tile::visited), Some(1));
    }

    #[test]
    fn test_tile_bounds() {
        let registry = registry();
        let mut chunk = Chunk::new(ChunkCoord::new(-1, 2), &registry);
        assert_eq!(chunk.tile_bounds(), None);

        chunk.get_or_generate_tile((0, 5), registry.noise_fields());
        chunk.get_or_generate_tile((15, 1), registry.noise_fields());
        assert_eq!(chunk.tile_bounds(), Some(((-16, 33), (-1, 37))));
    }

    #[test]
    fn test_json_round_trip() {
        let registry = registry();
        let mut chunk = Chunk::new(ChunkCoord::new(7, -7), &registry);
        chunk.get_or_generate_tile((1, 2), registry.noise_fields()).visit();
        chunk.get_or_generate_tile((9, 9), registry.noise_fields());

        let restored = load(Value::Object(chunk.to_json()), &registry).unwrap();
        assert_eq!(restored, chunk);
    }

    #[test]
    fn test_broken_tiles_are_skipped() {
        let registry = registry();
        let record = json!({
            "position_x": 0,
            "position_y": 1,
            "tiles": [
                { "relative_position_x": 2, "relative_position_y": 2, "visited": 4 },
                { "relative_position_x": 3 },
                "not a tile",
            ],
        });

        let chunk = load(record, &registry).unwrap();

        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk.tile((2, 2)).map(Tile::visited), Some(4));
    }

    #[test]
    fn test_extreme_coords_stay_in_range() {
        let (coord, relative) = split_tile_pos(i64::MAX, i64::MIN);
        assert_eq!(coord, ChunkCoord::new(ChunkCoord::MAX, ChunkCoord::MIN));
        assert!(coord.is_addressable());
        let (ox, oy) = coord.origin();
        assert_eq!((ox + relative.0, oy + relative.1), (i64::MAX, i64::MIN));

        assert!(!ChunkCoord::new(ChunkCoord::MAX + 1, 0).is_addressable());
        assert_eq!(ChunkCoord::new(i64::MAX, i64::MIN).origin(), (i64::MAX, i64::MIN));
    }

    #[test]
    fn test_unaddressable_position_fails() {
        let registry = registry();
        let record = json!({
            "position_x": i64::MAX,
            "position_y": 0,
            "tiles": [ { "relative_position_x": 1, "relative_position_y": 1 } ],
        });

        assert!(matches!(
            load(record, &registry),
            Err(PersistError::OutOfRange { field: "position_x", .. })
        ));
    }

    #[test]
    fn test_missing_position_fails() {
        let registry = registry();
        assert!(load(json!({ "position_x": 0, "tiles": [] }), &registry).is_err());
    }
}
