//! # Chunk Stores
//!
//! Byte-level storage for serialized chunks, keyed by chunk position.
//!
//! Stores never look inside a blob. The world layer hands them UTF-8 JSON and
//! gets the same bytes back.
//!
//! ## Layout of a [`DirectoryStore`]
//!
//! ```text
//! <root>/
//!   save_version          "2.4"
//!   chunk_0_0.chunk       lz4 (size-prepended) JSON
//!   chunk_-1_3.chunk
//!   chunk_2_2.chunk.tmp   write in progress, renamed over chunk_2_2.chunk
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{PersistError, PersistResult};
use crate::version::SaveVersion;

/// Name of the file holding a directory save's schema version.
pub const VERSION_FILE: &str = "save_version";

const CHUNK_PREFIX: &str = "chunk_";
const CHUNK_SUFFIX: &str = ".chunk";
const TMP_SUFFIX: &str = "chunk.tmp";

/// Storage for serialized chunks.
pub trait ChunkStore: Send + Sync {
    /// Schema version the stored chunks were written with.
    fn save_version(&self) -> &SaveVersion;

    /// Every stored chunk position, in ascending `(x, y)` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be listed.
    fn chunk_keys(&self) -> PersistResult<Vec<(i64, i64)>>;

    /// Reads one chunk blob. `Ok(None)` means the chunk was never stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read or decoded.
    fn read_chunk(&self, x: i64, y: i64) -> PersistResult<Option<Vec<u8>>>;

    /// Writes one chunk blob, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn write_chunk(&self, x: i64, y: i64, data: &[u8]) -> PersistResult<()>;
}

/// Chunks stored as lz4-compressed files in one directory.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    version: SaveVersion,
}

impl DirectoryStore {
    /// Creates (or reuses) a save directory stamped with `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or version file cannot be written.
    pub fn create(root: impl Into<PathBuf>, version: SaveVersion) -> PersistResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        fs::write(root.join(VERSION_FILE), version.as_str())?;
        debug!("created chunk store at {root:?} (version {version})");
        Ok(Self { root, version })
    }

    /// Opens an existing save directory, reading its version file.
    ///
    /// # Errors
    ///
    /// Returns an error if the version file is missing or unparseable.
    pub fn open(root: impl Into<PathBuf>) -> PersistResult<Self> {
        let root = root.into();
        let text = fs::read_to_string(root.join(VERSION_FILE))?;
        let version = SaveVersion::parse(&text)?;
        debug!("opened chunk store at {root:?} (version {version})");
        Ok(Self { root, version })
    }

    /// The save directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding chunk `(x, y)`.
    #[must_use]
    pub fn chunk_path(&self, x: i64, y: i64) -> PathBuf {
        self.root.join(format!("{CHUNK_PREFIX}{x}_{y}{CHUNK_SUFFIX}"))
    }
}

/// Parses `chunk_<x>_<y>.chunk` back into a position.
fn parse_chunk_file_name(name: &str) -> Option<(i64, i64)> {
    let inner = name.strip_prefix(CHUNK_PREFIX)?.strip_suffix(CHUNK_SUFFIX)?;
    let (x, y) = inner.split_once('_')?;
    Some((x.parse().ok()?, y.parse().ok()?))
}

impl ChunkStore for DirectoryStore {
    fn save_version(&self) -> &SaveVersion {
        &self.version
    }

    fn chunk_keys(&self) -> PersistResult<Vec<(i64, i64)>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.ends_with(CHUNK_SUFFIX) {
                continue;
            }
            match parse_chunk_file_name(name) {
                Some(key) => keys.push(key),
                None => warn!("ignoring unrecognized chunk file {name}"),
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }

    fn read_chunk(&self, x: i64, y: i64) -> PersistResult<Option<Vec<u8>>> {
        let path = self.chunk_path(x, y);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let data = decompress_size_prepended(&compressed).map_err(|e| PersistError::CorruptChunk {
            path,
            reason: e.to_string(),
        })?;
        Ok(Some(data))
    }

    fn write_chunk(&self, x: i64, y: i64, data: &[u8]) -> PersistResult<()> {
        let path = self.chunk_path(x, y);
        let tmp_path = path.with_extension(TMP_SUFFIX);
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&compress_prepend_size(data))?;
            file.sync_all()?;
        }
        // The previous blob stays intact until the new one is complete.
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// Chunks kept in memory. Useful for tests and tools.
#[derive(Debug)]
pub struct MemoryStore {
    version: SaveVersion,
    chunks: RwLock<BTreeMap<(i64, i64), Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store stamped with `version`.
    #[must_use]
    pub fn new(version: SaveVersion) -> Self {
        Self {
            version,
            chunks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}

impl ChunkStore for MemoryStore {
    fn save_version(&self) -> &SaveVersion {
        &self.version
    }

    fn chunk_keys(&self) -> PersistResult<Vec<(i64, i64)>> {
        Ok(self.chunks.read().keys().copied().collect())
    }

    fn read_chunk(&self, x: i64, y: i64) -> PersistResult<Option<Vec<u8>>> {
        Ok(self.chunks.read().get(&(x, y)).cloned())
    }

    fn write_chunk(&self, x: i64, y: i64, data: &[u8]) -> PersistResult<()> {
        self.chunks.write().insert((x, y), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "wanderer_store_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        root
    }

    fn version() -> SaveVersion {
        SaveVersion::parse("2.4").unwrap()
    }

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(parse_chunk_file_name("chunk_0_0.chunk"), Some((0, 0)));
        assert_eq!(parse_chunk_file_name("chunk_-1_16.chunk"), Some((-1, 16)));
        assert_eq!(parse_chunk_file_name("chunk_-3_-7.chunk"), Some((-3, -7)));
        assert_eq!(parse_chunk_file_name("chunk_a_0.chunk"), None);
        assert_eq!(parse_chunk_file_name("save_version"), None);
    }

    #[test]
    fn test_directory_store_round_trip() {
        let root = temp_root("round_trip");
        let store = DirectoryStore::create(&root, version()).unwrap();

        let payload = br#"{"position_x":-1,"position_y":2,"tiles":[]}"#;
        store.write_chunk(-1, 2, payload).unwrap();
        store.write_chunk(0, 0, b"{}").unwrap();

        assert_eq!(store.read_chunk(-1, 2).unwrap().as_deref(), Some(&payload[..]));
        assert_eq!(store.read_chunk(5, 5).unwrap(), None);
        assert_eq!(store.chunk_keys().unwrap(), vec![(-1, 2), (0, 0)]);

        let reopened = DirectoryStore::open(&root).unwrap();
        assert_eq!(reopened.save_version(), &version());
        assert_eq!(reopened.chunk_keys().unwrap().len(), 2);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_rewrite_leaves_no_temp_files() {
        let root = temp_root("rewrite");
        let store = DirectoryStore::create(&root, version()).unwrap();
        store.write_chunk(2, 3, b"first").unwrap();
        store.write_chunk(2, 3, b"second").unwrap();

        assert_eq!(fs::read_dir(&root).unwrap().count(), 2);
        assert_eq!(store.read_chunk(2, 3).unwrap(), Some(b"second".to_vec()));

        // A write that died before its rename leaves only the temp file behind.
        fs::write(store.chunk_path(2, 3).with_extension(TMP_SUFFIX), b"partial").unwrap();
        assert_eq!(store.read_chunk(2, 3).unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.chunk_keys().unwrap(), vec![(2, 3)]);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_corrupt_chunk_is_reported() {
        let root = temp_root("corrupt");
        let store = DirectoryStore::create(&root, version()).unwrap();
        fs::write(store.chunk_path(1, 1), [10, 0, 0, 0, 0xF0]).unwrap();

        let result = store.read_chunk(1, 1);
        assert!(matches!(result, Err(PersistError::CorruptChunk { .. })));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_open_without_version_fails() {
        let root = temp_root("no_version");
        fs::create_dir_all(&root).unwrap();

        assert!(matches!(DirectoryStore::open(&root), Err(PersistError::Io(_))));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new(version());
        assert!(store.is_empty());

        store.write_chunk(3, -4, b"abc").unwrap();
        store.write_chunk(3, -4, b"def").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.read_chunk(3, -4).unwrap(), Some(b"def".to_vec()));
        assert_eq!(store.chunk_keys().unwrap(), vec![(3, -4)]);
    }
}
