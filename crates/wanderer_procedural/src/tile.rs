//! # Tiles
//!
//! One cell of a chunk: three content layers and a visit counter.
//!
//! A tile is created once, either generated from noise or rebuilt from a save
//! record, and lives as long as its chunk. [`Tile::visit`] is the only way to
//! change it afterwards.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use wanderer_persistence::fields::{optional, optional_object, required};
use wanderer_persistence::{
    remap_keys_if_exist, JsonConvert, JsonObject, Migration, ParseReport, PersistResult,
    VersionCorrector,
};

use crate::catalog::Layer;
use crate::chunk::CHUNK_SIZE;
use crate::content::{ContentLayer, Population, Structure, Terrain, VisitContext, VisitEvent};
use crate::noise::{NoiseAxis, NoiseField, NoisePoint};
use crate::random::{mix, SeededRandomStream};
use crate::resolver::{self, TileContent};

/// Salt separating tile stream keys from other keyed derivations.
const TILE_STREAM_SALT: u64 = 0x7469_6C65_5F73_7431;

/// Stream of the tile at `relative_position`, keyed off its chunk's stream.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn tile_stream(chunk_stream: &SeededRandomStream, relative_position: (i64, i64)) -> SeededRandomStream {
    let (x, y) = relative_position;
    chunk_stream.derive_keyed(mix(mix(TILE_STREAM_SALT, x as u64), y as u64))
}

/// Everything needed to generate or rebuild a tile of one chunk.
#[derive(Clone, Copy, Debug)]
pub struct TileContext<'a> {
    /// The owning chunk's private stream.
    pub chunk_stream: &'a SeededRandomStream,
    /// Absolute position of the chunk's `(0, 0)` tile.
    pub chunk_origin: (i64, i64),
    /// Noise fields, in [`NoiseAxis::ALL`] order.
    pub noise_fields: &'a [NoiseField; NoiseAxis::COUNT],
}

impl TileContext<'_> {
    /// Absolute position of a tile of this chunk.
    #[must_use]
    pub fn absolute(&self, relative_position: (i64, i64)) -> (i64, i64) {
        (
            self.chunk_origin.0.saturating_add(relative_position.0),
            self.chunk_origin.1.saturating_add(relative_position.1),
        )
    }

    fn noise_point(&self, relative_position: (i64, i64)) -> NoisePoint {
        let (x, y) = self.absolute(relative_position);
        NoisePoint::sample(self.noise_fields, x, y)
    }
}

/// A tile of a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    relative_position: (i64, i64),
    visited: u32,
    terrain: Terrain,
    structure: Structure,
    population: Population,
}

impl Tile {
    /// Generates the tile at `relative_position` from noise.
    #[must_use]
    pub fn generate(relative_position: (i64, i64), context: &TileContext<'_>) -> Self {
        let content = Self::resolve(relative_position, context, None, None, None);
        Self::with_content(relative_position, 0, content)
    }

    fn resolve(
        relative_position: (i64, i64),
        context: &TileContext<'_>,
        terrain: Option<Terrain>,
        structure: Option<Structure>,
        population: Option<Population>,
    ) -> TileContent {
        let stream = tile_stream(context.chunk_stream, relative_position);
        let point = context.noise_point(relative_position);
        resolver::resolve_missing(&stream, &point, terrain, structure, population)
    }

    fn with_content(relative_position: (i64, i64), visited: u32, content: TileContent) -> Self {
        Self {
            relative_position,
            visited,
            terrain: content.terrain,
            structure: content.structure,
            population: content.population,
        }
    }

    /// Position inside the chunk, each axis in `0..CHUNK_SIZE`.
    #[must_use]
    pub fn relative_position(&self) -> (i64, i64) {
        self.relative_position
    }

    /// How many times the tile has been visited.
    #[must_use]
    pub fn visited(&self) -> u32 {
        self.visited
    }

    /// Terrain layer.
    #[must_use]
    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    /// Structure layer.
    #[must_use]
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Population layer.
    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Snapshot handed to visit hooks.
    #[must_use]
    pub fn visit_context(&self) -> VisitContext {
        VisitContext {
            relative_position: self.relative_position,
            visited: self.visited,
            terrain: self.terrain.kind(),
            structure: self.structure.kind(),
            population: self.population.kind(),
        }
    }

    /// Records a visit and runs every layer's visit hook, terrain first.
    ///
    /// Returns the events the hooks emitted.
    pub fn visit(&mut self) -> Vec<VisitEvent> {
        self.visited = self.visited.saturating_add(1);
        let context = self.visit_context();
        [
            self.terrain.visit(&context),
            self.structure.visit(&context),
            self.population.visit(&context),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

mod keys {
    pub const RELATIVE_POSITION_X: &str = "relative_position_x";
    pub const RELATIVE_POSITION_Y: &str = "relative_position_y";
    pub const VISITED: &str = "visited";
}

fn snake_case_position(record: &mut JsonObject) {
    remap_keys_if_exist(
        record,
        &[
            ("xPos", keys::RELATIVE_POSITION_X),
            ("yPos", keys::RELATIVE_POSITION_Y),
        ],
    );
}

const TILE_CORRECTORS: &[VersionCorrector] = &[VersionCorrector::new("2.2", snake_case_position)];

fn layer_json<L: Serialize>(layer: &L) -> Value {
    serde_json::to_value(layer).unwrap_or(Value::Null)
}

/// Parses one layer, or `None` if it has to be regenerated.
fn parse_layer<L: ContentLayer>(record: &JsonObject, report: &mut ParseReport) -> Option<L> {
    let field = L::LAYER.name();
    let layer_record = optional_object(record, Tile::TYPE_NAME, field, report)?;
    match serde_json::from_value::<L>(Value::Object(layer_record.clone())) {
        Ok(layer) => Some(layer),
        Err(e) => {
            report.defaulted(Tile::TYPE_NAME, field, &format!("is invalid ({e})"));
            None
        }
    }
}

/// Wraps a relative coordinate into `0..CHUNK_SIZE`.
fn normalize_axis(value: i64, field: &str) -> i64 {
    let wrapped = value.rem_euclid(CHUNK_SIZE);
    if wrapped != value {
        warn!("{} parse error: {field} {value} is outside the chunk, using {wrapped}", Tile::TYPE_NAME);
    }
    wrapped
}

impl JsonConvert for Tile {
    type Context<'a> = TileContext<'a>;

    const TYPE_NAME: &'static str = "Tile";

    fn correctors() -> &'static [VersionCorrector] {
        TILE_CORRECTORS
    }

    fn to_json(&self) -> JsonObject {
        let mut record = JsonObject::new();
        record.insert(keys::RELATIVE_POSITION_X.into(), self.relative_position.0.into());
        record.insert(keys::RELATIVE_POSITION_Y.into(), self.relative_position.1.into());
        record.insert(keys::VISITED.into(), self.visited.into());
        record.insert(Layer::Terrain.name().into(), layer_json(&self.terrain));
        record.insert(Layer::Structure.name().into(), layer_json(&self.structure));
        record.insert(Layer::Population.name().into(), layer_json(&self.population));
        record
    }

    fn from_json_without_correction(
        record: &JsonObject,
        context: TileContext<'_>,
        _migration: Migration<'_>,
        report: &mut ParseReport,
    ) -> PersistResult<Self> {
        let x: i64 = required(record, Self::TYPE_NAME, keys::RELATIVE_POSITION_X)?;
        let y: i64 = required(record, Self::TYPE_NAME, keys::RELATIVE_POSITION_Y)?;
        let relative_position = (
            normalize_axis(x, keys::RELATIVE_POSITION_X),
            normalize_axis(y, keys::RELATIVE_POSITION_Y),
        );

        let visited = optional(record, Self::TYPE_NAME, keys::VISITED, report).unwrap_or(0);
        let terrain = parse_layer::<Terrain>(record, report);
        let structure = parse_layer::<Structure>(record, report);
        let population = parse_layer::<Population>(record, report);

        let content = match (terrain, structure, population) {
            (Some(terrain), Some(structure), Some(population)) => TileContent {
                terrain,
                structure,
                population,
            },
            (terrain, structure, population) => {
                let (ax, ay) = context.absolute(relative_position);
                warn!("regenerating missing content layers of tile ({ax}, {ay})");
                Self::resolve(relative_position, &context, terrain, structure, population)
            }
        };
        Ok(Self::with_content(relative_position, visited, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoiseSettings;
    use crate::content::StructureKind;
    use serde_json::json;
    use wanderer_persistence::fields::into_object;
    use wanderer_persistence::{JsonCorrecter, PersistError, SaveVersion};

    struct Fixture {
        stream: SeededRandomStream,
        fields: [NoiseField; NoiseAxis::COUNT],
    }

    impl Fixture {
        fn new() -> Self {
            let settings = NoiseSettings::default();
            Self {
                stream: SeededRandomStream::from_seed(8),
                fields: NoiseAxis::ALL.map(|axis| NoiseField::new(axis.index() as u64 + 100, &settings)),
            }
        }

        fn context(&self) -> TileContext<'_> {
            TileContext {
                chunk_stream: &self.stream,
                chunk_origin: (32, -16),
                noise_fields: &self.fields,
            }
        }
    }

    fn correcter() -> JsonCorrecter {
        JsonCorrecter::new(SaveVersion::parse("2.4").unwrap())
    }

    fn parse(record: serde_json::Value, version: &str, fixture: &Fixture) -> PersistResult<Tile> {
        let correcter = correcter();
        let version = SaveVersion::parse(version).unwrap();
        let migration = Migration::new(&correcter, &version).unwrap();
        Tile::from_json(into_object(record, "Tile").unwrap(), fixture.context(), migration)
            .map(|parsed| parsed.value)
    }

    #[test]
    fn test_generation_is_deterministic() {
        let fixture = Fixture::new();
        for x in 0..CHUNK_SIZE {
            let a = Tile::generate((x, 3), &fixture.context());
            let b = Tile::generate((x, 3), &fixture.context());
            assert_eq!(a, b);
            assert_eq!(a.visited(), 0);
        }
    }

    #[test]
    fn test_visit_counts_and_runs_hooks() {
        let fixture = Fixture::new();
        let mut tile = Tile::generate((1, 1), &fixture.context());
        tile.structure = Structure::Kingdom {
            population: 5_000,
            visitors: 0,
        };

        tile.visit();
        let events = tile.visit();

        assert_eq!(tile.visited(), 2);
        assert!(events.contains(&VisitEvent::SettlementEntered {
            kind: StructureKind::Kingdom,
            population: 5_000,
            visitors: 2,
        }));
        // Generated content is otherwise untouched.
        assert_eq!(tile.structure().kind(), StructureKind::Kingdom);
    }

    #[test]
    fn test_json_round_trip() {
        let fixture = Fixture::new();
        let mut tile = Tile::generate((4, 9), &fixture.context());
        tile.visit();

        let restored = parse(Value::Object(tile.to_json()), "2.4", &fixture).unwrap();
        assert_eq!(restored, tile);
    }

    #[test]
    fn test_legacy_position_keys() {
        let fixture = Fixture::new();
        let mut record = into_object(json!({ "xPos": 3, "yPos": -2 }), "Tile").unwrap();
        let correcter = correcter();
        let version = SaveVersion::parse("2.1.1").unwrap();
        Migration::new(&correcter, &version)
            .unwrap()
            .correct("Tile", &mut record, Tile::correctors())
            .unwrap();

        assert_eq!(
            Value::Object(record.clone()),
            json!({ "relative_position_x": 3, "relative_position_y": -2 })
        );

        // -2 wraps into the chunk.
        let tile = parse(json!({ "xPos": 3, "yPos": -2 }), "2.1.1", &fixture).unwrap();
        assert_eq!(tile.relative_position(), (3, CHUNK_SIZE - 2));
    }

    #[test]
    fn test_missing_position_fails() {
        let fixture = Fixture::new();
        let result = parse(json!({ "relative_position_x": 1, "visited": 2 }), "2.4", &fixture);
        assert!(matches!(
            result,
            Err(PersistError::MissingRequiredField { field: "relative_position_y", .. })
        ));
    }

    #[test]
    fn test_missing_layers_regenerate_from_noise() {
        let fixture = Fixture::new();
        let generated = Tile::generate((5, 6), &fixture.context());

        let tile = parse(
            json!({ "relative_position_x": 5, "relative_position_y": 6, "visited": 3 }),
            "2.4",
            &fixture,
        )
        .unwrap();

        assert_eq!(tile.visited(), 3);
        assert_eq!(tile, Tile { visited: 3, ..generated });
    }

    #[test]
    fn test_unknown_subtype_regenerates_only_that_layer() {
        let fixture = Fixture::new();
        let generated = Tile::generate((2, 2), &fixture.context());
        let mut record = generated.to_json();
        record.insert("structure".into(), json!({ "type": "lighthouse" }));
        let kept_population = record["population"].clone();

        let correcter = correcter();
        let migration = Migration::new(&correcter, correcter.current()).unwrap();
        let parsed = Tile::from_json(record, fixture.context(), migration).unwrap();

        assert!(!parsed.is_clean());
        assert_eq!(
            serde_json::to_value(parsed.value.population()).unwrap(),
            kept_population
        );
        // The regenerated layer draws from its own stream, as it did originally.
        assert_eq!(parsed.value, generated);
    }

    #[test]
    fn test_missing_visited_defaults_to_zero() {
        let fixture = Fixture::new();
        let mut record = Tile::generate((0, 0), &fixture.context()).to_json();
        record.remove("visited");

        let correcter = correcter();
        let migration = Migration::new(&correcter, correcter.current()).unwrap();
        let parsed = Tile::from_json(record, fixture.context(), migration).unwrap();

        assert_eq!(parsed.value.visited(), 0);
        assert_eq!(parsed.report.defaulted_fields(), &["Tile.visited".to_owned()]);
    }
}
