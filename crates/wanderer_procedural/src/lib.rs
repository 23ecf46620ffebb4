//! # Wanderer Procedural Generation
//!
//! Deterministic, infinite 2D tile worlds generated lazily from noise.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: the same registry state always produces the same world
//! 2. **Lazy**: tiles are generated the first time they are asked for
//! 3. **Order independent**: chunk and tile streams are keyed derivations, so
//!    generation order and worker count never change a tile
//! 4. **Forgiving loads**: old or damaged save records are corrected, defaulted
//!    or regenerated, never fatal for the rest of the world
//!
//! ## Core Components
//!
//! - `SeededRandomStream`: splittable, serializable ChaCha stream
//! - `RandomRegistry`: main/world/misc streams, noise seeds, chunk seed modifier
//! - `NoiseField`: layered Perlin noise, one per `NoiseAxis`
//! - `resolver`: nearest catalog entry per content layer
//! - `Tile`, `Chunk`, `World`: the lazily realized map
//!
//! ## Example
//!
//! ```rust,ignore
//! use wanderer_procedural::{World, WorldConfig};
//!
//! let mut world = World::from_seed(42, WorldConfig::default());
//! let events = world.visit_tile(0, 0);
//!
//! // Generate everything between the chunks touched so far
//! world.make_rectangle(wanderer_procedural::world::no_progress);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod chunk;
pub mod config;
pub mod content;
pub mod error;
pub mod noise;
pub mod random;
pub mod registry;
pub mod resolver;
pub mod tile;
pub mod world;

pub use catalog::{AxisTarget, CatalogEntry, Layer};
pub use chunk::{Chunk, ChunkCoord, CHUNK_SIZE, TILES_PER_CHUNK};
pub use config::{BulkSettings, NoiseSettings, Octave, WorldConfig};
pub use content::{
    ContentLayer, Population, PopulationKind, Structure, StructureKind, Terrain, TerrainKind,
    VisitContext, VisitEvent,
};
pub use error::{ConfigError, WorldError, WorldResult};
pub use noise::{NoiseAxis, NoiseField, NoisePoint};
pub use random::SeededRandomStream;
pub use registry::{RandomRegistry, RegistryInit};
pub use tile::Tile;
pub use world::{BulkOutcome, Progress, World, CURRENT_SAVE_VERSION};
