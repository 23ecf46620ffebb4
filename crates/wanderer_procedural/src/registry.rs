//! # Random Registry
//!
//! Every random source a world depends on, in one explicit context object.
//!
//! ## Initialization Order
//!
//! 1. `main` (given, or fresh)
//! 2. `world`, then `misc`: given, or derived from `main` in that order
//! 3. missing noise axis seeds, drawn from `world` in [`NoiseAxis::ALL`] order
//! 4. a missing chunk seed modifier, `world.next_f64()`
//!
//! Noise fields are rebuilt as soon as the seeds are known. The registry is
//! owned by [`World`](crate::World); replacing it needs `&mut World`, so no
//! generation can run while it happens.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};
use wanderer_persistence::fields::{optional_from_str, optional_object, parse_from_str};
use wanderer_persistence::{
    remap_keys_if_exist, JsonConvert, JsonObject, Migration, ParseReport, Parsed, PersistResult,
    VersionCorrector,
};

use crate::chunk::ChunkCoord;
use crate::config::NoiseSettings;
use crate::noise::{NoiseAxis, NoiseField, NoisePoint};
use crate::random::{mix, SeededRandomStream};

/// Salt separating chunk stream keys from other keyed derivations.
const CHUNK_STREAM_SALT: u64 = 0x6368_756E_6B5F_7331;

/// Partial registry state; every `None` is derived during initialization.
#[derive(Clone, Debug, Default)]
pub struct RegistryInit {
    /// Root stream.
    pub main: Option<SeededRandomStream>,
    /// World generation stream.
    pub world: Option<SeededRandomStream>,
    /// Stream for everything that is not world generation.
    pub misc: Option<SeededRandomStream>,
    /// Known noise seeds; may be partial.
    pub noise_seeds: Option<BTreeMap<NoiseAxis, u64>>,
    /// Chunk seed modifier.
    pub chunk_seed_modifier: Option<f64>,
}

/// The world's random streams, noise seeds and noise fields.
#[derive(Clone, Debug)]
pub struct RandomRegistry {
    main: SeededRandomStream,
    world: SeededRandomStream,
    misc: SeededRandomStream,
    noise_seeds: [u64; NoiseAxis::COUNT],
    chunk_seed_modifier: f64,
    noise_settings: NoiseSettings,
    noise_fields: [NoiseField; NoiseAxis::COUNT],
}

impl RandomRegistry {
    /// Builds a registry, deriving whatever `init` leaves out.
    #[must_use]
    pub fn initialize(init: RegistryInit, settings: &NoiseSettings) -> Self {
        let mut main = init.main.unwrap_or_else(SeededRandomStream::fresh);
        let mut world = init.world.unwrap_or_else(|| main.derive_child());
        let misc = init.misc.unwrap_or_else(|| main.derive_child());

        let mut partial = init.noise_seeds.unwrap_or_default();
        let noise_seeds = Self::recalculate_axis_seeds(&mut partial, &mut world);
        let chunk_seed_modifier = init
            .chunk_seed_modifier
            .unwrap_or_else(|| world.next_f64());

        debug!("random registry initialized (chunk seed modifier {chunk_seed_modifier})");
        Self {
            main,
            world,
            misc,
            noise_seeds,
            chunk_seed_modifier,
            noise_settings: settings.clone(),
            noise_fields: Self::build_fields(&noise_seeds, settings),
        }
    }

    /// Builds a registry whose `main` stream is seeded with `seed`.
    #[must_use]
    pub fn from_seed(seed: u64, settings: &NoiseSettings) -> Self {
        Self::initialize(
            RegistryInit {
                main: Some(SeededRandomStream::from_seed(seed)),
                ..RegistryInit::default()
            },
            settings,
        )
    }

    /// Builds a registry from a fresh, unpredictable seed.
    #[must_use]
    pub fn fresh(settings: &NoiseSettings) -> Self {
        Self::initialize(RegistryInit::default(), settings)
    }

    /// Fills every axis missing from `partial` with a seed drawn from `parent`,
    /// in [`NoiseAxis::ALL`] order. Present axes are left untouched and do not
    /// consume `parent`.
    pub fn recalculate_axis_seeds(
        partial: &mut BTreeMap<NoiseAxis, u64>,
        parent: &mut SeededRandomStream,
    ) -> [u64; NoiseAxis::COUNT] {
        for axis in NoiseAxis::ALL {
            partial.entry(axis).or_insert_with(|| parent.next_u64());
        }
        NoiseAxis::ALL.map(|axis| partial.get(&axis).copied().unwrap_or_default())
    }

    fn build_fields(
        seeds: &[u64; NoiseAxis::COUNT],
        settings: &NoiseSettings,
    ) -> [NoiseField; NoiseAxis::COUNT] {
        NoiseAxis::ALL.map(|axis| NoiseField::new(seeds[axis.index()], settings))
    }

    /// Root stream.
    #[must_use]
    pub fn main(&self) -> &SeededRandomStream {
        &self.main
    }

    /// World generation stream.
    #[must_use]
    pub fn world(&self) -> &SeededRandomStream {
        &self.world
    }

    /// Misc stream.
    #[must_use]
    pub fn misc(&self) -> &SeededRandomStream {
        &self.misc
    }

    /// Misc stream, for callers outside world generation.
    pub fn misc_mut(&mut self) -> &mut SeededRandomStream {
        &mut self.misc
    }

    /// Seed of one axis.
    #[must_use]
    pub fn noise_seed(&self, axis: NoiseAxis) -> u64 {
        self.noise_seeds[axis.index()]
    }

    /// Seeds of every axis, in [`NoiseAxis::ALL`] order.
    #[must_use]
    pub fn noise_seeds(&self) -> &[u64; NoiseAxis::COUNT] {
        &self.noise_seeds
    }

    /// Modifier mixed into every chunk stream.
    #[must_use]
    pub fn chunk_seed_modifier(&self) -> f64 {
        self.chunk_seed_modifier
    }

    /// Settings the noise fields were built with.
    #[must_use]
    pub fn noise_settings(&self) -> &NoiseSettings {
        &self.noise_settings
    }

    /// Noise fields, in [`NoiseAxis::ALL`] order.
    #[must_use]
    pub fn noise_fields(&self) -> &[NoiseField; NoiseAxis::COUNT] {
        &self.noise_fields
    }

    /// Noise point of the tile at absolute position `(x, y)`.
    #[must_use]
    pub fn noise_point(&self, x: i64, y: i64) -> NoisePoint {
        NoisePoint::sample(&self.noise_fields, x, y)
    }

    /// Private stream of the chunk at `coord`.
    ///
    /// A pure function of the world stream, `coord` and the chunk seed modifier.
    #[must_use]
    pub fn chunk_stream(&self, coord: ChunkCoord) -> SeededRandomStream {
        #[allow(clippy::cast_sign_loss)]
        let key = mix(
            mix(mix(CHUNK_STREAM_SALT, coord.x as u64), coord.y as u64),
            self.chunk_seed_modifier.to_bits(),
        );
        self.world.derive_keyed(key)
    }

    /// Rebuilds a registry from a save record, re-initializing from scratch if
    /// the record is not a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error only if the save version is unsupported.
    pub fn load(
        record: Value,
        settings: &NoiseSettings,
        migration: Migration<'_>,
    ) -> PersistResult<Parsed<Self>> {
        match record {
            Value::Object(record) => Self::from_json(record, settings, migration),
            _ => {
                let mut report = ParseReport::default();
                report.defaulted(Self::TYPE_NAME, "record", "is not an object");
                Ok(Parsed {
                    value: Self::fresh(settings),
                    report,
                })
            }
        }
    }
}

mod keys {
    pub const MAIN_RANDOM: &str = "main_random";
    pub const WORLD_RANDOM: &str = "world_random";
    pub const MISC_RANDOM: &str = "misc_random";
    pub const NOISE_SEEDS: &str = "tile_type_noise_seeds";
    pub const CHUNK_SEED_MODIFIER: &str = "chunk_seed_modifier";
}

fn snake_case_keys(record: &mut JsonObject) {
    remap_keys_if_exist(
        record,
        &[
            ("mainRandom", keys::MAIN_RANDOM),
            ("worldRandom", keys::WORLD_RANDOM),
            ("miscRandom", keys::MISC_RANDOM),
            ("tileTypeNoiseSeeds", keys::NOISE_SEEDS),
            ("chunkSeedModifier", keys::CHUNK_SEED_MODIFIER),
        ],
    );
}

const REGISTRY_CORRECTORS: &[VersionCorrector] = &[VersionCorrector::new("2.0.2", snake_case_keys)];

fn parse_noise_seeds(
    record: &JsonObject,
    report: &mut ParseReport,
) -> Option<BTreeMap<NoiseAxis, u64>> {
    let type_name = RandomRegistry::TYPE_NAME;
    let seeds_record = optional_object(record, type_name, keys::NOISE_SEEDS, report)?;

    let mut seeds = BTreeMap::new();
    for (key, value) in seeds_record {
        match (key.parse::<NoiseAxis>(), parse_from_str::<u64>(value)) {
            (Ok(axis), Some(seed)) => {
                seeds.insert(axis, seed);
            }
            _ => warn!("{type_name} parse error: noise seed `{key}` is incorrect"),
        }
    }
    if seeds.len() < NoiseAxis::COUNT {
        report.defaulted(type_name, keys::NOISE_SEEDS, "is incomplete");
    }
    Some(seeds)
}

impl JsonConvert for RandomRegistry {
    type Context<'a> = &'a NoiseSettings;

    const TYPE_NAME: &'static str = "RandomRegistry";

    fn correctors() -> &'static [VersionCorrector] {
        REGISTRY_CORRECTORS
    }

    fn to_json(&self) -> JsonObject {
        let seeds: JsonObject = NoiseAxis::ALL
            .into_iter()
            .map(|axis| {
                (
                    axis.name().to_owned(),
                    Value::String(self.noise_seed(axis).to_string()),
                )
            })
            .collect();

        let mut record = JsonObject::new();
        record.insert(keys::MAIN_RANDOM.into(), self.main.to_string().into());
        record.insert(keys::WORLD_RANDOM.into(), self.world.to_string().into());
        record.insert(keys::MISC_RANDOM.into(), self.misc.to_string().into());
        record.insert(keys::NOISE_SEEDS.into(), Value::Object(seeds));
        record.insert(
            keys::CHUNK_SEED_MODIFIER.into(),
            self.chunk_seed_modifier.to_string().into(),
        );
        record
    }

    fn from_json_without_correction(
        record: &JsonObject,
        settings: &NoiseSettings,
        _migration: Migration<'_>,
        report: &mut ParseReport,
    ) -> PersistResult<Self> {
        let type_name = Self::TYPE_NAME;
        let init = RegistryInit {
            main: optional_from_str(record, type_name, keys::MAIN_RANDOM, report),
            world: optional_from_str(record, type_name, keys::WORLD_RANDOM, report),
            misc: optional_from_str(record, type_name, keys::MISC_RANDOM, report),
            noise_seeds: parse_noise_seeds(record, report),
            chunk_seed_modifier: optional_from_str(
                record,
                type_name,
                keys::CHUNK_SEED_MODIFIER,
                report,
            ),
        };
        Ok(Self::initialize(init, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wanderer_persistence::{JsonCorrecter, SaveVersion};

    fn settings() -> NoiseSettings {
        NoiseSettings::default()
    }

    fn correcter() -> JsonCorrecter {
        JsonCorrecter::new(SaveVersion::parse("2.4").unwrap())
    }

    #[test]
    fn test_same_seed_same_registry() {
        let a = RandomRegistry::from_seed(42, &settings());
        let b = RandomRegistry::from_seed(42, &settings());

        assert_eq!(a.world(), b.world());
        assert_eq!(a.misc(), b.misc());
        assert_eq!(a.noise_seeds(), b.noise_seeds());
        assert_eq!(a.chunk_seed_modifier(), b.chunk_seed_modifier());
        assert_eq!(a.noise_point(10, -3), b.noise_point(10, -3));
    }

    #[test]
    fn test_derivation_order() {
        let mut main = SeededRandomStream::from_seed(42);
        let mut world = main.derive_child();
        let misc = main.derive_child();
        let seeds = NoiseAxis::ALL.map(|_| world.next_u64());
        let modifier = world.next_f64();

        let registry = RandomRegistry::from_seed(42, &settings());

        assert_eq!(registry.main(), &main);
        assert_eq!(registry.world(), &world);
        assert_eq!(registry.misc(), &misc);
        assert_eq!(registry.noise_seeds(), &seeds);
        assert_eq!(registry.chunk_seed_modifier(), modifier);
    }

    #[test]
    fn test_every_axis_has_a_seed() {
        let mut partial = BTreeMap::from([(NoiseAxis::Humidity, 7)]);
        let mut parent = SeededRandomStream::from_seed(1);
        let mut expected_parent = parent.clone();

        let seeds = RandomRegistry::recalculate_axis_seeds(&mut partial, &mut parent);

        assert_eq!(partial.len(), NoiseAxis::COUNT);
        assert_eq!(seeds[NoiseAxis::Humidity.index()], 7);
        // Height and Temperature come first, then Hostility and Population.
        assert_eq!(seeds[NoiseAxis::Height.index()], expected_parent.next_u64());
        assert_eq!(seeds[NoiseAxis::Temperature.index()], expected_parent.next_u64());
        assert_eq!(seeds[NoiseAxis::Hostility.index()], expected_parent.next_u64());
        assert_eq!(seeds[NoiseAxis::Population.index()], expected_parent.next_u64());
        assert_eq!(parent, expected_parent);
    }

    #[test]
    fn test_chunk_streams_are_pure() {
        let registry = RandomRegistry::from_seed(42, &settings());
        let mut a = registry.chunk_stream(ChunkCoord::new(3, -4));
        let mut b = registry.chunk_stream(ChunkCoord::new(3, -4));
        let mut c = registry.chunk_stream(ChunkCoord::new(-4, 3));

        let first = a.next_u64();
        assert_eq!(first, b.next_u64());
        assert_ne!(first, c.next_u64());
    }

    #[test]
    fn test_json_round_trip() {
        let registry = RandomRegistry::from_seed(99, &settings());
        let correcter = correcter();
        let migration = Migration::new(&correcter, correcter.current()).unwrap();

        let parsed = RandomRegistry::from_json(registry.to_json(), &settings(), migration).unwrap();

        assert!(parsed.is_clean());
        let restored = parsed.value;
        assert_eq!(restored.main(), registry.main());
        assert_eq!(restored.world(), registry.world());
        assert_eq!(restored.misc(), registry.misc());
        assert_eq!(restored.noise_seeds(), registry.noise_seeds());
        assert_eq!(restored.chunk_seed_modifier(), registry.chunk_seed_modifier());
    }

    #[test]
    fn test_legacy_camel_case_record() {
        let registry = RandomRegistry::from_seed(5, &settings());
        let mut legacy = JsonObject::new();
        for (new_key, old_key) in [
            (keys::MAIN_RANDOM, "mainRandom"),
            (keys::WORLD_RANDOM, "worldRandom"),
            (keys::MISC_RANDOM, "miscRandom"),
            (keys::NOISE_SEEDS, "tileTypeNoiseSeeds"),
            (keys::CHUNK_SEED_MODIFIER, "chunkSeedModifier"),
        ] {
            legacy.insert(old_key.into(), registry.to_json()[new_key].clone());
        }

        let correcter = correcter();
        let version = SaveVersion::parse("2.0.1").unwrap();
        let migration = Migration::new(&correcter, &version).unwrap();
        let parsed = RandomRegistry::from_json(legacy, &settings(), migration).unwrap();

        assert!(parsed.is_clean());
        assert_eq!(parsed.value.world(), registry.world());
        assert_eq!(parsed.value.noise_seeds(), registry.noise_seeds());
    }

    #[test]
    fn test_uppercase_axis_names_and_numeric_seeds() {
        let record = json!({
            "tile_type_noise_seeds": {
                "HEIGHT": 1, "TEMPERATURE": "2", "HUMIDITY": 3, "HOSTILITY": "4", "POPULATION": 5
            }
        });
        let correcter = correcter();
        let migration = Migration::new(&correcter, correcter.current()).unwrap();
        let parsed = RandomRegistry::load(record, &settings(), migration).unwrap();

        assert_eq!(parsed.value.noise_seeds(), &[1, 2, 3, 4, 5]);
        // The streams and modifier were missing and got derived.
        assert!(!parsed.is_clean());
    }

    #[test]
    fn test_partial_seeds_are_completed() {
        let record = json!({ "tile_type_noise_seeds": { "height": "11", "bogus": "12" } });
        let correcter = correcter();
        let migration = Migration::new(&correcter, correcter.current()).unwrap();
        let parsed = RandomRegistry::load(record, &settings(), migration).unwrap();

        let registry = parsed.value;
        assert_eq!(registry.noise_seed(NoiseAxis::Height), 11);
        for axis in NoiseAxis::ALL {
            assert_eq!(registry.noise_fields()[axis.index()].seed(), registry.noise_seed(axis));
        }
        assert!(parsed
            .report
            .defaulted_fields()
            .contains(&"RandomRegistry.tile_type_noise_seeds".to_owned()));
    }

    #[test]
    fn test_partial_initialize_builds_every_field() {
        let init = RegistryInit {
            main: Some(SeededRandomStream::from_seed(3)),
            noise_seeds: Some(BTreeMap::from([(NoiseAxis::Hostility, 99)])),
            ..RegistryInit::default()
        };

        let registry = RandomRegistry::initialize(init, &settings());

        assert_eq!(registry.noise_seed(NoiseAxis::Hostility), 99);
        for axis in NoiseAxis::ALL {
            assert_eq!(registry.noise_fields()[axis.index()].seed(), registry.noise_seed(axis));
        }
        let mut seeds = registry.noise_seeds().to_vec();
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), NoiseAxis::COUNT);
    }

    #[test]
    fn test_non_object_record_reinitializes() {
        let correcter = correcter();
        let migration = Migration::new(&correcter, correcter.current()).unwrap();
        let parsed = RandomRegistry::load(json!("garbage"), &settings(), migration).unwrap();

        assert!(!parsed.is_clean());
    }
}
