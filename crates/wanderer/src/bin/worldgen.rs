//! # Wanderer World Generator
//!
//! Headless driver for the world core.
//!
//! ```bash
//! # Generate a 5x5 chunk world around the origin from seed 42
//! worldgen generate ./save 42 2
//!
//! # Load it back (running save correctors) and report its content
//! RUST_LOG=debug worldgen inspect ./save
//!
//! # Use custom noise settings
//! worldgen --config world.toml generate ./save
//! ```

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wanderer_persistence::{ChunkStore, DirectoryStore, PersistError, SaveVersion};
use wanderer_procedural::{
    ChunkCoord, ContentLayer, Progress, RandomRegistry, World, WorldConfig, WorldError,
    CURRENT_SAVE_VERSION,
};

/// Registry record, next to the chunk files.
const RANDOM_STATES_FILE: &str = "random_states.json";

/// Default half-width of the generated square, in chunks.
const DEFAULT_RADIUS: i64 = 2;

/// Log a progress line every this many chunks.
const PROGRESS_EVERY: usize = 16;

const USAGE: &str = "usage: worldgen [--config <file>] generate <dir> [seed] [radius]\n       \
                     worldgen [--config <file>] inspect <dir>";

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}\n{}", USAGE)]
    Usage(String),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("cannot access {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

enum Command {
    Generate {
        dir: PathBuf,
        seed: Option<u64>,
        radius: i64,
    },
    Inspect {
        dir: PathBuf,
    },
}

struct Args {
    config: Option<PathBuf>,
    command: Command,
}

fn parse_number<T: std::str::FromStr>(name: &str, text: Option<String>) -> Result<Option<T>, CliError> {
    text.map(|text| {
        text.parse()
            .map_err(|_| CliError::Usage(format!("invalid {name} `{text}`")))
    })
    .transpose()
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, CliError> {
    let mut config = None;
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args
                .next()
                .ok_or_else(|| CliError::Usage("--config needs a file".into()))?;
            config = Some(PathBuf::from(path));
        } else {
            positional.push(arg);
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("generate") => {
            let dir = positional
                .next()
                .ok_or_else(|| CliError::Usage("missing save directory".into()))?;
            let seed = parse_number("seed", positional.next())?;
            let radius = parse_number("radius", positional.next())?.unwrap_or(DEFAULT_RADIUS);
            if radius < 0 {
                return Err(CliError::Usage(format!("radius must not be negative, got {radius}")));
            }
            Command::Generate {
                dir: dir.into(),
                seed,
                radius,
            }
        }
        Some("inspect") => {
            let dir = positional
                .next()
                .ok_or_else(|| CliError::Usage("missing save directory".into()))?;
            Command::Inspect { dir: dir.into() }
        }
        Some(other) => return Err(CliError::Usage(format!("unknown command `{other}`"))),
        None => return Err(CliError::Usage("missing command".into())),
    };
    if let Some(extra) = positional.next() {
        return Err(CliError::Usage(format!("unexpected argument `{extra}`")));
    }

    Ok(Args { config, command })
}

fn log_progress(label: &'static str) -> impl FnMut(Progress) -> ControlFlow<()> + Send {
    move |progress| {
        if progress.done % PROGRESS_EVERY == 0 || progress.done == progress.total {
            info!("{label}: {}/{}", progress.done, progress.total);
        }
        ControlFlow::Continue(())
    }
}

fn generate(config: WorldConfig, dir: &Path, seed: Option<u64>, radius: i64) -> Result<(), CliError> {
    let mut world = match seed {
        Some(seed) => World::from_seed(seed, config),
        None => {
            let registry = RandomRegistry::fresh(&config.noise);
            World::new(registry, config)
        }
    };

    world.get_or_create_chunk(ChunkCoord::new(-radius, -radius));
    world.get_or_create_chunk(ChunkCoord::new(radius, radius));
    world.make_rectangle(log_progress("rectangle"));
    world.fill_all_chunks(log_progress("fill"));

    let store = DirectoryStore::create(dir, SaveVersion::parse(CURRENT_SAVE_VERSION)?)?;
    world.save_all_chunks(&store)?;

    let path = dir.join(RANDOM_STATES_FILE);
    let text = serde_json::to_string_pretty(&world.registry_record()).map_err(|source| {
        CliError::Json {
            path: path.clone(),
            source,
        }
    })?;
    std::fs::write(&path, text).map_err(|source| CliError::Io { path, source })?;

    info!(
        "generated {} chunks ({} tiles) in {dir:?}",
        world.chunk_count(),
        world.tile_count()
    );
    Ok(())
}

fn count_kinds<'w, L, I>(layers: I) -> BTreeMap<String, usize>
where
    L: ContentLayer + 'w,
    I: Iterator<Item = &'w L>,
{
    let mut counts = BTreeMap::new();
    for layer in layers {
        *counts.entry(layer.kind().to_string()).or_insert(0) += 1;
    }
    counts
}

fn inspect(config: WorldConfig, dir: &Path) -> Result<(), CliError> {
    let store = DirectoryStore::open(dir)?;
    info!("save version {}", store.save_version());

    let path = dir.join(RANDOM_STATES_FILE);
    let text = std::fs::read_to_string(&path).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })?;
    let record = serde_json::from_str(&text).map_err(|source| CliError::Json { path, source })?;

    let registry = RandomRegistry::fresh(&config.noise);
    let mut world = World::new(registry, config);
    let report = world.load_registry(record, store.save_version())?;
    for field in report.defaulted_fields() {
        warn!("registry field {field} fell back to its default");
    }

    let outcome = world.load_all_chunks_from_storage(&store, log_progress("load"))?;
    info!(
        "loaded {} chunks, {} failed, {} tiles",
        outcome.completed,
        outcome.failed,
        world.tile_count()
    );

    let tiles = || world.chunks().flat_map(|chunk| chunk.tiles());
    let layers = [
        ("terrain", count_kinds(tiles().map(|tile| tile.terrain()))),
        ("structure", count_kinds(tiles().map(|tile| tile.structure()))),
        ("population", count_kinds(tiles().map(|tile| tile.population()))),
    ];
    for (layer, counts) in layers {
        for (kind, count) in counts {
            info!("{layer:>10} {kind:<12} {count}");
        }
    }

    if let Some((min, max)) = world.tile_bounds() {
        info!("tile bounds {min:?}..={max:?}");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let result = parse_args(std::env::args().skip(1)).and_then(|args| {
        let config = match args.config {
            Some(path) => WorldConfig::load(path).map_err(WorldError::from)?,
            None => WorldConfig::default(),
        };
        match args.command {
            Command::Generate { dir, seed, radius } => generate(config, &dir, seed, radius),
            Command::Inspect { dir } => inspect(config, &dir),
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
