//! # Seeded Random Streams
//!
//! Splittable, serializable pseudo-random streams built on ChaCha8.
//!
//! ## Determinism Guarantee
//!
//! A stream's output depends only on its state. Two ways to get a child:
//!
//! - [`SeededRandomStream::derive_child`] consumes parent output, so the same
//!   parent state and call order give the same child.
//! - [`SeededRandomStream::derive_keyed`] is a pure function of the parent's
//!   seed, stream id and a key. It does not advance the parent, which makes
//!   chunk and tile streams independent of generation order.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Mixes `value` into `hash`.
///
/// FNV-style multiply-xorshift; cheap, and good enough to decorrelate keys
/// that differ in a single bit.
#[inline]
#[must_use]
pub const fn mix(hash: u64, value: u64) -> u64 {
    let mut hash = hash ^ value;
    hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
    hash ^= hash >> 32;
    hash
}

/// A deterministic, splittable random stream.
#[derive(Clone, PartialEq, Eq)]
pub struct SeededRandomStream {
    rng: ChaCha8Rng,
}

impl SeededRandomStream {
    /// Creates a stream from a 64-bit seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a stream seeded from the operating system's entropy source.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Next 64 random bits.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Next double in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Next integer in `[low, high]`.
    #[inline]
    pub fn next_in_range(&mut self, low: u32, high: u32) -> u32 {
        self.rng.gen_range(low..=high)
    }

    /// Derives an independent child from this stream's output.
    ///
    /// Advances `self`.
    #[must_use]
    pub fn derive_child(&mut self) -> Self {
        let mut seed = [0u8; 32];
        self.rng.fill_bytes(&mut seed);
        Self {
            rng: ChaCha8Rng::from_seed(seed),
        }
    }

    /// Derives a child identified by `key` without advancing `self`.
    ///
    /// The child depends only on this stream's seed, its stream id and `key`.
    #[must_use]
    pub fn derive_keyed(&self, key: u64) -> Self {
        let mut rng = self.rng.clone();
        rng.set_stream(mix(self.rng.get_stream(), key));
        rng.set_word_pos(0);
        Self { rng }
    }

    /// Mutable access to the underlying generator, for `rand` APIs.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

impl RngCore for SeededRandomStream {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

impl fmt::Debug for SeededRandomStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SeededRandomStream")
            .field(&self.to_string())
            .finish()
    }
}

/// Serialized form: `<seed as 64 hex digits>-<stream id hex>-<word position hex>`.
impl fmt::Display for SeededRandomStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.rng.get_seed() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "-{:x}-{:x}", self.rng.get_stream(), self.rng.get_word_pos())
    }
}

/// A random stream state string could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid random stream state `{0}`")]
pub struct ParseStreamError(String);

impl FromStr for SeededRandomStream {
    type Err = ParseStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseStreamError(s.to_owned());

        let mut parts = s.trim().split('-');
        let (Some(seed_hex), Some(stream_hex), Some(pos_hex), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if seed_hex.len() != 64 || !seed_hex.is_ascii() {
            return Err(invalid());
        }
        let mut seed = [0u8; 32];
        for (i, byte) in seed.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&seed_hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        let stream = u64::from_str_radix(stream_hex, 16).map_err(|_| invalid())?;
        let word_pos = u128::from_str_radix(pos_hex, 16).map_err(|_| invalid())?;

        let mut rng = ChaCha8Rng::from_seed(seed);
        rng.set_stream(stream);
        rng.set_word_pos(word_pos);
        Ok(Self { rng })
    }
}
