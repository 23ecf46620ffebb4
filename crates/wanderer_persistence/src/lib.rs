//! # Wanderer Persistence
//!
//! Save-file plumbing for the Wanderer world core.
//!
//! ## Design Principles
//!
//! 1. **Correct, then parse**: raw JSON records are upgraded to the current
//!    schema by an ordered list of correctors before any structural parsing
//! 2. **Required vs optional**: identity fields abort reconstruction, everything
//!    else falls back to a default and logs a warning
//! 3. **Storage is bytes**: stores move opaque chunk blobs, they never look inside
//!
//! ## Example
//!
//! ```rust,ignore
//! use wanderer_persistence::{JsonCorrecter, Migration, SaveVersion};
//!
//! let correcter = JsonCorrecter::new(SaveVersion::parse("2.4")?);
//! let file_version = SaveVersion::parse("2.1.1")?;
//! let migration = Migration::new(&correcter, &file_version)?;
//!
//! let tile = Tile::from_json(record, context, migration)?;
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod correction;
pub mod error;
pub mod fields;
pub mod store;
pub mod version;

pub use correction::{remap_keys_if_exist, JsonCorrecter, Migration, VersionCorrector};
pub use error::{PersistError, PersistResult};
pub use fields::{JsonConvert, JsonObject, ParseReport, Parsed};
pub use store::{ChunkStore, DirectoryStore, MemoryStore};
pub use version::SaveVersion;
