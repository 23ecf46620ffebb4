//! # Infinite Walk Integration Test
//!
//! Walks across a world, saves it, loads it back and checks nothing changed.

use std::ops::ControlFlow;
use std::path::PathBuf;

use serde_json::{json, Value};
use wanderer_persistence::{ChunkStore, DirectoryStore, MemoryStore, SaveVersion};
use wanderer_procedural::world::no_progress;
use wanderer_procedural::{
    ChunkCoord, NoiseAxis, RandomRegistry, Tile, World, WorldConfig, CHUNK_SIZE,
    CURRENT_SAVE_VERSION, TILES_PER_CHUNK,
};

fn version(text: &str) -> SaveVersion {
    SaveVersion::parse(text).unwrap()
}

/// Scratch directory removed on drop.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("wanderer_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&path);
        Self(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Test: the same seed gives the same tiles, whatever order they are walked in.
#[test]
fn test_walk_is_reproducible() {
    let mut forward = World::from_seed(42, WorldConfig::default());
    let mut backward = World::from_seed(42, WorldConfig::default());

    let path: Vec<(i64, i64)> = (0..2_000).map(|step| (step - 1_000, (step * 7) % 300 - 150)).collect();

    let walked: Vec<Tile> = path
        .iter()
        .map(|&(x, y)| forward.get_or_generate_tile(x, y).clone())
        .collect();
    for (&(x, y), tile) in path.iter().zip(&walked).rev() {
        assert_eq!(backward.get_or_generate_tile(x, y), tile, "mismatch at ({x}, {y})");
    }
}

/// Test: different seeds give different worlds.
#[test]
fn test_seeds_differ() {
    let mut a = World::from_seed(1, WorldConfig::default());
    let mut b = World::from_seed(2, WorldConfig::default());
    a.get_or_create_chunk(ChunkCoord::new(0, 0));
    b.get_or_create_chunk(ChunkCoord::new(0, 0));
    a.fill_all_chunks(no_progress);
    b.fill_all_chunks(no_progress);

    assert_ne!(a.chunk(ChunkCoord::new(0, 0)), b.chunk(ChunkCoord::new(0, 0)));
}

/// Test: every noise axis gets a seed and its own field.
#[test]
fn test_axis_completeness() {
    let world = World::from_seed(42, WorldConfig::default());
    let registry = world.registry();

    for axis in NoiseAxis::ALL {
        assert_eq!(registry.noise_fields()[axis.index()].seed(), registry.noise_seed(axis));
    }
    let mut seeds = registry.noise_seeds().to_vec();
    seeds.sort_unstable();
    seeds.dedup();
    assert_eq!(seeds.len(), NoiseAxis::COUNT);
}

/// Test: a whole region survives a trip through a save directory.
#[test]
fn test_directory_round_trip() {
    let scratch = ScratchDir::new("round_trip");
    let mut config = WorldConfig::default();
    config.bulk.workers = 3;

    let mut original = World::from_seed(42, config.clone());
    original.get_or_create_chunk(ChunkCoord::new(-2, -1));
    original.get_or_create_chunk(ChunkCoord::new(1, 2));
    assert!(original.make_rectangle(no_progress).is_complete());
    assert!(original.fill_all_chunks(no_progress).is_complete());
    for step in 0..CHUNK_SIZE * 3 {
        original.visit_tile(step - CHUNK_SIZE * 2, step / 2);
    }

    let store = DirectoryStore::create(&scratch.0, version(CURRENT_SAVE_VERSION)).unwrap();
    assert_eq!(original.save_all_chunks(&store).unwrap(), 16);
    let registry_record = Value::Object(original.registry_record());

    let store = DirectoryStore::open(&scratch.0).unwrap();
    let mut restored = World::new(RandomRegistry::fresh(&config.noise), config);
    let report = restored
        .load_registry(registry_record, store.save_version())
        .unwrap();
    assert!(report.is_clean());

    let outcome = restored
        .load_all_chunks_from_storage(&store, no_progress)
        .unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.completed, 16);
    assert_eq!(restored.tile_count(), 16 * TILES_PER_CHUNK);
    assert!(original.chunks().eq(restored.chunks()));
    assert_eq!(original.tile_bounds(), restored.tile_bounds());

    // Tiles not in the save regenerate exactly as the original world would.
    assert_eq!(
        restored.get_or_generate_tile(500, -500),
        original.get_or_generate_tile(500, -500)
    );
}

/// Test: a save written before snake_case field names still loads.
#[test]
fn test_legacy_save_migrates() {
    let reference = World::from_seed(7, WorldConfig::default());

    let mut legacy_registry = reference.registry_record();
    for (new, old) in [
        ("main_random", "mainRandom"),
        ("world_random", "worldRandom"),
        ("misc_random", "miscRandom"),
        ("tile_type_noise_seeds", "tileTypeNoiseSeeds"),
        ("chunk_seed_modifier", "chunkSeedModifier"),
    ] {
        let value = legacy_registry.remove(new).unwrap();
        legacy_registry.insert(old.into(), value);
    }

    let store = MemoryStore::new(version("2.0.1"));
    let chunk = json!({
        "position_x": 0,
        "position_y": 0,
        "tiles": [ { "xPos": 3, "yPos": 5, "visited": 2 } ],
    });
    store
        .write_chunk(0, 0, &serde_json::to_vec(&chunk).unwrap())
        .unwrap();

    let mut world = World::from_seed(99, WorldConfig::default());
    let report = world
        .load_registry(Value::Object(legacy_registry), store.save_version())
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(world.registry_record(), reference.registry_record());

    let outcome = world
        .load_all_chunks_from_storage(&store, no_progress)
        .unwrap();
    assert_eq!(outcome.completed, 1);

    let tile = world.tile(3, 5).unwrap();
    assert_eq!(tile.visited(), 2);

    // Missing layers regenerate from the tile's own stream.
    let mut fresh = World::from_seed(7, WorldConfig::default());
    let generated = fresh.get_or_generate_tile(3, 5);
    assert_eq!(tile.terrain(), generated.terrain());
    assert_eq!(tile.structure(), generated.structure());
    assert_eq!(tile.population(), generated.population());
}

/// Test: loading can be stopped between chunks and resumed.
#[test]
fn test_load_resumes_after_cancel() {
    let store = MemoryStore::new(version(CURRENT_SAVE_VERSION));
    let mut original = World::from_seed(3, WorldConfig::default());
    for x in 0..6 {
        original.get_or_generate_tile(x * CHUNK_SIZE, 0);
    }
    original.save_all_chunks(&store).unwrap();

    let mut world = World::new(original.registry().clone(), WorldConfig::default());
    let outcome = world
        .load_all_chunks_from_storage(&store, |progress| {
            if progress.done == 4 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    assert!(outcome.cancelled);
    assert_eq!(world.chunk_count(), 4);

    let resumed = world
        .load_all_chunks_from_storage(&store, no_progress)
        .unwrap();
    assert_eq!(resumed.total, 2);
    assert!(original.chunks().eq(world.chunks()));
}
