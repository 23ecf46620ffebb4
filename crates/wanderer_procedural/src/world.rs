//! # World
//!
//! A sparse map of loaded chunks plus the registry they are generated from.
//!
//! ## Bulk Operations
//!
//! [`World::make_rectangle`], [`World::fill_all_chunks`] and
//! [`World::load_all_chunks_from_storage`] can run for a long time. They report
//! every finished chunk to a progress callback, which may stop the operation by
//! returning [`ControlFlow::Break`]. Stopping only happens between chunks and
//! every operation picks up where it left off when called again.
//!
//! ## Determinism
//!
//! A chunk's stream is a pure function of the world stream, its coordinate and
//! the chunk seed modifier, and each tile's stream is keyed off its chunk's.
//! Load order, fill order and worker count never change what a tile holds.

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::thread;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};
use wanderer_persistence::fields::into_object;
use wanderer_persistence::{
    ChunkStore, JsonConvert, JsonCorrecter, JsonObject, Migration, ParseReport, PersistError,
    SaveVersion,
};

use crate::chunk::{split_tile_pos, Chunk, ChunkCoord};
use crate::config::WorldConfig;
use crate::content::VisitEvent;
use crate::error::{WorldError, WorldResult};
use crate::noise::{NoiseAxis, NoiseField};
use crate::registry::{RandomRegistry, RegistryInit};
use crate::tile::Tile;

/// Schema version written by this program.
pub const CURRENT_SAVE_VERSION: &str = "2.4";

/// Correcter upgrading records to [`CURRENT_SAVE_VERSION`].
///
/// # Errors
///
/// Never fails in practice; the constant is a valid version.
pub fn save_correcter() -> WorldResult<JsonCorrecter> {
    Ok(JsonCorrecter::new(SaveVersion::parse(CURRENT_SAVE_VERSION)?))
}

/// One finished step of a bulk operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Chunks handled so far.
    pub done: usize,
    /// Chunks the operation set out to handle.
    pub total: usize,
    /// The chunk that just finished.
    pub coord: ChunkCoord,
}

/// Result of a bulk operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Chunks handled successfully.
    pub completed: usize,
    /// Chunks that were skipped because of an error.
    pub failed: usize,
    /// Chunks the operation set out to handle.
    pub total: usize,
    /// True if the progress callback stopped the operation early.
    pub cancelled: bool,
}

impl BulkOutcome {
    /// Returns true if every chunk was handled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.completed + self.failed == self.total
    }
}

/// Progress callback that never stops the operation.
pub fn no_progress(_: Progress) -> ControlFlow<()> {
    ControlFlow::Continue(())
}

/// Loaded chunks and the random state they come from.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    registry: RandomRegistry,
    chunks: BTreeMap<ChunkCoord, Chunk>,
}

impl World {
    /// Creates an empty world around an existing registry.
    #[must_use]
    pub fn new(registry: RandomRegistry, config: WorldConfig) -> Self {
        Self {
            config,
            registry,
            chunks: BTreeMap::new(),
        }
    }

    /// Creates an empty world whose registry is initialized from `seed`.
    #[must_use]
    pub fn from_seed(seed: u64, config: WorldConfig) -> Self {
        let registry = RandomRegistry::from_seed(seed, &config.noise);
        Self::new(registry, config)
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The registry every chunk is generated from.
    #[must_use]
    pub fn registry(&self) -> &RandomRegistry {
        &self.registry
    }

    /// Re-initializes the registry from partial state.
    ///
    /// Loaded chunks were generated from the old registry and are dropped.
    pub fn reinitialize(&mut self, init: RegistryInit) {
        let registry = RandomRegistry::initialize(init, &self.config.noise);
        self.replace_registry(registry);
    }

    /// Replaces the registry, dropping every loaded chunk.
    pub fn replace_registry(&mut self, registry: RandomRegistry) {
        if !self.chunks.is_empty() {
            info!("registry replaced, dropping {} loaded chunks", self.chunks.len());
        }
        self.registry = registry;
        self.chunks.clear();
    }

    /// Loaded chunk at `coord`.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Loaded chunks in coordinate order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Number of loaded chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of realized tiles across every loaded chunk.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.chunks.values().map(Chunk::len).sum()
    }

    /// Returns the chunk at `coord`, creating an empty one if needed.
    pub fn get_or_create_chunk(&mut self, coord: ChunkCoord) -> &mut Chunk {
        let registry = &self.registry;
        self.chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(coord, registry))
    }

    /// Realized tile at absolute position `(x, y)`.
    #[must_use]
    pub fn tile(&self, x: i64, y: i64) -> Option<&Tile> {
        let (coord, relative) = split_tile_pos(x, y);
        self.chunks.get(&coord)?.tile(relative)
    }

    /// Returns the tile at absolute position `(x, y)`, generating its chunk
    /// and the tile itself if needed.
    pub fn get_or_generate_tile(&mut self, x: i64, y: i64) -> &mut Tile {
        let (coord, relative) = split_tile_pos(x, y);
        let registry = &self.registry;
        self.chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(coord, registry))
            .get_or_generate_tile(relative, registry.noise_fields())
    }

    /// Visits the tile at absolute position `(x, y)`, generating it if needed.
    pub fn visit_tile(&mut self, x: i64, y: i64) -> Vec<VisitEvent> {
        self.get_or_generate_tile(x, y).visit()
    }

    /// Absolute min and max corners over every realized tile.
    #[must_use]
    pub fn tile_bounds(&self) -> Option<((i64, i64), (i64, i64))> {
        self.chunks
            .values()
            .filter_map(Chunk::tile_bounds)
            .reduce(|(min_a, max_a), (min_b, max_b)| {
                (
                    (min_a.0.min(min_b.0), min_a.1.min(min_b.1)),
                    (max_a.0.max(max_b.0), max_a.1.max(max_b.1)),
                )
            })
    }

    /// Generates every missing tile of every loaded chunk.
    ///
    /// With `bulk.workers > 1` chunks are filled on that many scoped threads;
    /// the resulting tiles are the same as a sequential fill.
    pub fn fill_all_chunks<F>(&mut self, on_progress: F) -> BulkOutcome
    where
        F: FnMut(Progress) -> ControlFlow<()> + Send,
    {
        let fields = self.registry.noise_fields();
        let pending: Vec<&mut Chunk> = self
            .chunks
            .values_mut()
            .filter(|chunk| !chunk.is_full())
            .collect();
        let workers = self.config.bulk.workers.max(1).min(pending.len().max(1));

        let outcome = if workers == 1 {
            fill_sequential(pending, fields, on_progress)
        } else {
            fill_parallel(pending, fields, workers, on_progress)
        };
        info!(
            "filled {}/{} chunks{}",
            outcome.completed,
            outcome.total,
            if outcome.cancelled { " (cancelled)" } else { "" }
        );
        outcome
    }

    /// Creates every missing chunk inside the bounding box of the loaded
    /// chunks, so the loaded area becomes a rectangle.
    ///
    /// New chunks start empty; [`World::fill_all_chunks`] generates their tiles.
    pub fn make_rectangle<F>(&mut self, mut on_progress: F) -> BulkOutcome
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        let Some((min, max)) = self.chunk_bounds() else {
            return BulkOutcome::default();
        };

        let missing: Vec<ChunkCoord> = (min.x..=max.x)
            .flat_map(|x| (min.y..=max.y).map(move |y| ChunkCoord::new(x, y)))
            .filter(|coord| !self.chunks.contains_key(coord))
            .collect();

        let mut outcome = BulkOutcome {
            total: missing.len(),
            ..BulkOutcome::default()
        };
        for coord in missing {
            self.chunks.insert(coord, Chunk::new(coord, &self.registry));
            outcome.completed += 1;

            let progress = Progress {
                done: outcome.completed,
                total: outcome.total,
                coord,
            };
            if on_progress(progress).is_break() {
                outcome.cancelled = true;
                break;
            }
        }

        info!(
            "rectangle ({}, {})..=({}, {}): created {}/{} chunks",
            min.x, min.y, max.x, max.y, outcome.completed, outcome.total
        );
        outcome
    }

    /// Loads every stored chunk that is not loaded yet.
    ///
    /// Chunks that fail to load are logged and skipped; loaded chunks are never
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot list its chunks or the save
    /// version is unsupported.
    pub fn load_all_chunks_from_storage<F>(
        &mut self,
        store: &dyn ChunkStore,
        mut on_progress: F,
    ) -> WorldResult<BulkOutcome>
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        let correcter = save_correcter()?;
        let migration = Migration::new(&correcter, store.save_version())?;

        let pending: Vec<ChunkCoord> = store
            .chunk_keys()?
            .into_iter()
            .map(|(x, y)| ChunkCoord::new(x, y))
            .filter(|coord| !self.chunks.contains_key(coord))
            .collect();

        let mut outcome = BulkOutcome {
            total: pending.len(),
            ..BulkOutcome::default()
        };
        for coord in pending {
            match self.read_chunk(store, coord, migration) {
                Ok(Some((chunk, _))) => {
                    self.chunks.insert(coord, chunk);
                    outcome.completed += 1;
                }
                Ok(None) => {
                    warn!("chunk ({}, {}) vanished from storage, skipping", coord.x, coord.y);
                    outcome.failed += 1;
                }
                Err(e) => {
                    warn!("skipping chunk ({}, {}): {e}", coord.x, coord.y);
                    outcome.failed += 1;
                }
            }

            let progress = Progress {
                done: outcome.completed + outcome.failed,
                total: outcome.total,
                coord,
            };
            if on_progress(progress).is_break() {
                outcome.cancelled = true;
                break;
            }
        }

        info!(
            "loaded {}/{} stored chunks ({} failed)",
            outcome.completed, outcome.total, outcome.failed
        );
        Ok(outcome)
    }

    /// Loads one stored chunk, replacing the loaded one if any.
    ///
    /// Returns `Ok(None)` if the chunk was never stored, otherwise the fields
    /// that fell back to defaults. On error the world is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be read or parsed, or its record
    /// claims a different position.
    pub fn load_chunk(
        &mut self,
        store: &dyn ChunkStore,
        coord: ChunkCoord,
    ) -> WorldResult<Option<ParseReport>> {
        let correcter = save_correcter()?;
        let migration = Migration::new(&correcter, store.save_version())?;

        let Some((chunk, report)) = self.read_chunk(store, coord, migration)? else {
            return Ok(None);
        };
        if self.chunks.insert(coord, chunk).is_some() {
            debug!("reloaded chunk ({}, {}) from storage", coord.x, coord.y);
        }
        Ok(Some(report))
    }

    /// Writes one loaded chunk. Returns false if it is not loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot write it.
    pub fn save_chunk(&self, store: &dyn ChunkStore, coord: ChunkCoord) -> WorldResult<bool> {
        let Some(chunk) = self.chunks.get(&coord) else {
            return Ok(false);
        };
        write_chunk(store, chunk)?;
        Ok(true)
    }

    /// Writes every loaded chunk. Returns how many were written.
    ///
    /// # Errors
    ///
    /// Stops at the first chunk the store cannot write.
    pub fn save_all_chunks(&self, store: &dyn ChunkStore) -> WorldResult<usize> {
        for chunk in self.chunks.values() {
            write_chunk(store, chunk)?;
        }
        info!("saved {} chunks", self.chunks.len());
        Ok(self.chunks.len())
    }

    /// Registry save record.
    #[must_use]
    pub fn registry_record(&self) -> JsonObject {
        self.registry.to_json()
    }

    /// Replaces the registry with one rebuilt from a save record written with
    /// `file_version`, dropping every loaded chunk.
    ///
    /// Returns the fields that fell back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `file_version` is newer than
    /// [`CURRENT_SAVE_VERSION`]. The world is left unchanged.
    pub fn load_registry(
        &mut self,
        record: Value,
        file_version: &SaveVersion,
    ) -> WorldResult<ParseReport> {
        let correcter = save_correcter()?;
        let migration = Migration::new(&correcter, file_version)?;
        let parsed = RandomRegistry::load(record, &self.config.noise, migration)?;
        self.replace_registry(parsed.value);
        Ok(parsed.report)
    }

    fn read_chunk(
        &self,
        store: &dyn ChunkStore,
        coord: ChunkCoord,
        migration: Migration<'_>,
    ) -> WorldResult<Option<(Chunk, ParseReport)>> {
        let Some(bytes) = store.read_chunk(coord.x, coord.y)? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_slice(&bytes).map_err(PersistError::from)?;
        let record = into_object(value, Chunk::TYPE_NAME)?;

        let found = Chunk::stored_coord(&record)?;
        if found != coord {
            return Err(WorldError::ChunkPositionMismatch {
                key_x: coord.x,
                key_y: coord.y,
                found_x: found.x,
                found_y: found.y,
            });
        }
        let parsed = Chunk::from_json(record, &self.registry, migration)?;
        Ok(Some((parsed.value, parsed.report)))
    }

    fn chunk_bounds(&self) -> Option<(ChunkCoord, ChunkCoord)> {
        self.chunks.keys().fold(None, |bounds, &coord| {
            Some(match bounds {
                None => (coord, coord),
                Some((min, max)) => (
                    ChunkCoord::new(min.x.min(coord.x), min.y.min(coord.y)),
                    ChunkCoord::new(max.x.max(coord.x), max.y.max(coord.y)),
                ),
            })
        })
    }
}

fn write_chunk(store: &dyn ChunkStore, chunk: &Chunk) -> WorldResult<()> {
    let coord = chunk.coord();
    let bytes = serde_json::to_vec(&Value::Object(chunk.to_json())).map_err(PersistError::from)?;
    store.write_chunk(coord.x, coord.y, &bytes)?;
    Ok(())
}

fn fill_sequential<F>(
    pending: Vec<&mut Chunk>,
    fields: &[NoiseField; NoiseAxis::COUNT],
    mut on_progress: F,
) -> BulkOutcome
where
    F: FnMut(Progress) -> ControlFlow<()>,
{
    let mut outcome = BulkOutcome {
        total: pending.len(),
        ..BulkOutcome::default()
    };
    for chunk in pending {
        chunk.fill(fields);
        outcome.completed += 1;

        let progress = Progress {
            done: outcome.completed,
            total: outcome.total,
            coord: chunk.coord(),
        };
        if on_progress(progress).is_break() {
            outcome.cancelled = true;
            break;
        }
    }
    outcome
}

/// Work shared by the fill threads.
struct FillQueue<'c, F> {
    pending: std::vec::IntoIter<&'c mut Chunk>,
    done: usize,
    cancelled: bool,
    on_progress: F,
}

fn fill_parallel<F>(
    pending: Vec<&mut Chunk>,
    fields: &[NoiseField; NoiseAxis::COUNT],
    workers: usize,
    on_progress: F,
) -> BulkOutcome
where
    F: FnMut(Progress) -> ControlFlow<()> + Send,
{
    let total = pending.len();
    let queue = Mutex::new(FillQueue {
        pending: pending.into_iter(),
        done: 0,
        cancelled: false,
        on_progress,
    });
    debug!("filling {total} chunks on {workers} threads");

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let mut state = queue.lock();
                let next = if state.cancelled {
                    None
                } else {
                    state.pending.next()
                };
                drop(state);
                let Some(chunk) = next else {
                    break;
                };

                chunk.fill(fields);

                let mut state = queue.lock();
                state.done += 1;
                // Chunks still in flight after a stop are counted but not reported.
                if state.cancelled {
                    continue;
                }
                let progress = Progress {
                    done: state.done,
                    total,
                    coord: chunk.coord(),
                };
                if (state.on_progress)(progress).is_break() {
                    state.cancelled = true;
                }
            });
        }
    });

    let state = queue.into_inner();
    BulkOutcome {
        completed: state.done,
        failed: 0,
        total,
        cancelled: state.cancelled,
    }
}
