//! # Layered Perlin Noise
//!
//! One continuous 2D noise field per tile noise axis.
//!
//! ## Determinism Guarantee
//!
//! A [`NoiseField`] is a pure function of its axis seed and the
//! [`NoiseSettings`]; sampling never mutates it.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{NoiseSettings, Octave};

/// A tile property driven by its own noise field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoiseAxis {
    /// Land height; drives terrain.
    Height,
    /// Climate temperature.
    Temperature,
    /// Climate humidity.
    Humidity,
    /// Danger level.
    Hostility,
    /// Settlement density.
    Population,
}

impl NoiseAxis {
    /// Every axis, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Height,
        Self::Temperature,
        Self::Humidity,
        Self::Hostility,
        Self::Population,
    ];

    /// Number of axes.
    pub const COUNT: usize = Self::ALL.len();

    /// Position in [`Self::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Height => 0,
            Self::Temperature => 1,
            Self::Humidity => 2,
            Self::Hostility => 3,
            Self::Population => 4,
        }
    }

    /// Lowercase name used in save records.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Height => "height",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Hostility => "hostility",
            Self::Population => "population",
        }
    }

    /// Offset added to every raw sample of this axis before clamping.
    #[must_use]
    pub const fn shift(self) -> f64 {
        match self {
            Self::Height | Self::Temperature | Self::Humidity => 0.0,
            Self::Hostility => -0.05,
            Self::Population => 0.05,
        }
    }
}

impl fmt::Display for NoiseAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown noise axis name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown noise axis `{0}`")]
pub struct UnknownAxis(pub String);

impl FromStr for NoiseAxis {
    type Err = UnknownAxis;

    /// Case-insensitive, so legacy `HEIGHT` keys parse too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|axis| axis.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownAxis(s.to_owned()))
    }
}

/// Shuffled lattice hashes plus a sampling offset.
#[derive(Clone)]
struct PermutationTable {
    /// 256 entries, doubled to avoid index wrapping.
    perm: [u8; 512],
    /// Moves lattice points off integer sample coordinates.
    offset: (f64, f64),
}

impl PermutationTable {
    fn new(rng: &mut ChaCha8Rng) -> Self {
        let offset = (rng.gen::<f64>() * 256.0, rng.gen::<f64>() * 256.0);

        let mut perm = [0u8; 512];
        for i in 0..=u8::MAX {
            perm[usize::from(i)] = i;
        }
        // Fisher-Yates
        for i in (1..256).rev() {
            let j = rng.gen_range(0..=i);
            perm.swap(i, j);
        }
        perm.copy_within(0..256, 256);

        Self { perm, offset }
    }

    #[inline]
    fn get(&self, index: usize) -> usize {
        usize::from(self.perm[index & 511])
    }
}

/// Single-octave improved Perlin noise.
#[derive(Clone)]
pub struct PerlinNoise {
    table: PermutationTable,
}

impl PerlinNoise {
    /// Builds a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self {
            table: PermutationTable::new(&mut rng),
        }
    }

    /// Samples at `(x, y)`.
    ///
    /// # Returns
    ///
    /// A value in the range [-1, 1].
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let x = x + self.table.offset.0;
        let y = y + self.table.offset.1;

        let x_floor = x.floor();
        let y_floor = y.floor();
        let xf = x - x_floor;
        let yf = y - y_floor;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (xi, yi) = (
            (x_floor as i64 & 255) as usize,
            (y_floor as i64 & 255) as usize,
        );

        let a = self.table.get(xi) + yi;
        let b = self.table.get(xi + 1) + yi;

        let u = fade(xf);
        let v = fade(yf);

        let bottom = lerp(
            u,
            grad(self.table.get(a), xf, yf),
            grad(self.table.get(b), xf - 1.0, yf),
        );
        let top = lerp(
            u,
            grad(self.table.get(a + 1), xf, yf - 1.0),
            grad(self.table.get(b + 1), xf - 1.0, yf - 1.0),
        );
        lerp(v, bottom, top).clamp(-1.0, 1.0)
    }
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Dot product with one of eight gradient directions.
#[inline]
fn grad(hash: usize, x: f64, y: f64) -> f64 {
    match hash & 7 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x,
        5 => -x,
        6 => y,
        _ => -y,
    }
}

/// Layered Perlin noise for one axis.
///
/// # Example
///
/// ```rust,ignore
/// let field = NoiseField::new(axis_seed, &NoiseSettings::default());
/// let value = field.sample(12.0, -40.0);
/// assert!((0.0..=1.0).contains(&value));
/// ```
#[derive(Clone)]
pub struct NoiseField {
    seed: u64,
    perlin: PerlinNoise,
    octaves: Vec<Octave>,
    inverse_resolution: f64,
    weight_sum: f64,
}

impl NoiseField {
    /// Builds the field for `seed`.
    #[must_use]
    pub fn new(seed: u64, settings: &NoiseSettings) -> Self {
        let weight_sum: f64 = settings.octaves.iter().map(|o| o.weight).sum();
        Self {
            seed,
            perlin: PerlinNoise::new(seed),
            octaves: settings.octaves.clone(),
            inverse_resolution: 1.0 / settings.resolution,
            weight_sum,
        }
    }

    /// The seed the field was built from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Samples at tile coordinates `(x, y)`.
    ///
    /// # Returns
    ///
    /// The weighted mean of every octave, mapped to [0, 1].
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        if self.weight_sum <= 0.0 {
            return 0.5;
        }
        let x = x * self.inverse_resolution;
        let y = y * self.inverse_resolution;

        let total: f64 = self
            .octaves
            .iter()
            .map(|octave| {
                octave.weight * self.perlin.sample(x * octave.frequency, y * octave.frequency)
            })
            .sum();

        ((total / self.weight_sum + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

impl fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseField")
            .field("seed", &self.seed)
            .field("octaves", &self.octaves)
            .finish_non_exhaustive()
    }
}

/// One value in [0, 1] per [`NoiseAxis`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NoisePoint([f64; NoiseAxis::COUNT]);

impl NoisePoint {
    /// Creates a point from values in [`NoiseAxis::ALL`] order.
    #[must_use]
    pub const fn new(values: [f64; NoiseAxis::COUNT]) -> Self {
        Self(values)
    }

    /// Samples every field at an absolute tile position and applies the
    /// per-axis shift.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(fields: &[NoiseField; NoiseAxis::COUNT], x: i64, y: i64) -> Self {
        let (x, y) = (x as f64, y as f64);
        Self(NoiseAxis::ALL.map(|axis| {
            (fields[axis.index()].sample(x, y) + axis.shift()).clamp(0.0, 1.0)
        }))
    }

    /// Value along `axis`.
    #[inline]
    #[must_use]
    pub fn get(&self, axis: NoiseAxis) -> f64 {
        self.0[axis.index()]
    }
}
