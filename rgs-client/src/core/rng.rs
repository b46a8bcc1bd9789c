//! Provably Fair Random Number Generator
//!
//! HMAC-SHA256 keyed by the server seed, over the message
//! `"{client_seed}:{nonce}:{index}"`. The 32-byte digests for index
//! 0, 1, 2, ... are consumed as one continuous byte stream.
//!
//! Anyone holding the revealed server seed can regenerate the exact stream,
//! so every draw made during a round is reproducible.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// HMAC-SHA256 as used for round randomness.
pub type HmacSha256 = Hmac<Sha256>;

/// Bytes produced by one HMAC block.
const BLOCK_LEN: usize = 32;

/// RNG construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("server seed cannot key HMAC-SHA256")]
pub struct InvalidSeedKey;

/// Deterministic byte-stream RNG for one round.
///
/// # Example
///
/// ```
/// use rgs_client::core::rng::ProvablyFairRng;
///
/// let mut a = ProvablyFairRng::new("server", "client", 7).unwrap();
/// let mut b = ProvablyFairRng::new("server", "client", 7).unwrap();
/// assert_eq!(a.random_int(1000), b.random_int(1000));
/// ```
#[derive(Clone)]
pub struct ProvablyFairRng {
    keyed: HmacSha256,
    client_seed: String,
    nonce: u64,
    block: [u8; BLOCK_LEN],
    block_index: u64,
    byte_index: usize,
}

impl std::fmt::Debug for ProvablyFairRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvablyFairRng")
            .field("client_seed", &self.client_seed)
            .field("nonce", &self.nonce)
            .field("block_index", &self.block_index)
            .field("byte_index", &self.byte_index)
            .finish_non_exhaustive()
    }
}

impl ProvablyFairRng {
    /// Create the stream for `(server_seed, client_seed, nonce)`.
    pub fn new(server_seed: &str, client_seed: &str, nonce: u64) -> Result<Self, InvalidSeedKey> {
        let keyed = HmacSha256::new_from_slice(server_seed.as_bytes()).map_err(|_| InvalidSeedKey)?;
        let mut rng = Self {
            keyed,
            client_seed: client_seed.to_string(),
            nonce,
            block: [0; BLOCK_LEN],
            block_index: 0,
            byte_index: 0,
        };
        rng.block = rng.compute_block(0);
        Ok(rng)
    }

    /// Nonce this stream was created for.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    fn compute_block(&self, index: u64) -> [u8; BLOCK_LEN] {
        let mut mac = self.keyed.clone();
        mac.update(format!("{}:{}:{}", self.client_seed, self.nonce, index).as_bytes());
        mac.finalize().into_bytes().into()
    }

    /// Fill `out` with the next bytes of the stream.
    pub fn fill_bytes(&mut self, out: &mut [u8]) {
        let mut written = 0;
        while written < out.len() {
            if self.byte_index >= BLOCK_LEN {
                self.block_index += 1;
                self.block = self.compute_block(self.block_index);
                self.byte_index = 0;
            }
            let take = (BLOCK_LEN - self.byte_index).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.block[self.byte_index..self.byte_index + take]);
            self.byte_index += take;
            written += take;
        }
    }

    /// Uniform integer in `[0, max)` by masked rejection sampling.
    ///
    /// Reads `ceil(bits(max) / 8)` big-endian bytes per attempt and masks to
    /// `bits(max)` bits. Returns 0 when `max == 0`.
    pub fn random_int(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        let bits = 64 - max.leading_zeros();
        let byte_len = bits.div_ceil(8) as usize;
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };

        let mut buf = [0u8; 8];
        loop {
            self.fill_bytes(&mut buf[8 - byte_len..]);
            let value = u64::from_be_bytes(buf) & mask;
            if value < max {
                return value;
            }
        }
    }

    /// Uniform float in `[0, 1)` from 4 big-endian bytes.
    pub fn random_float(&mut self) -> f64 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_be_bytes(buf) as f64 / 4_294_967_296.0
    }

    /// Pick an index given cumulative weights (last entry is the total).
    pub fn weighted_choice(&mut self, cumulative: &[u64]) -> usize {
        let Some(&total) = cumulative.last() else {
            return 0;
        };
        let target = self.random_int(total);
        cumulative
            .iter()
            .position(|&sum| target < sum)
            .unwrap_or(cumulative.len() - 1)
    }

    /// Pick `count` distinct indices from `0..len` (partial Fisher-Yates).
    pub fn sample_indices(&mut self, len: usize, count: usize) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..len).collect();
        let count = count.min(len);
        for i in 0..count {
            let j = i + self.random_int((len - i) as u64) as usize;
            pool.swap(i, j);
        }
        pool.truncate(count);
        pool
    }
}

/// Build cumulative weights from raw weights.
pub fn cumulative_weights(weights: &[u64]) -> Vec<u64> {
    weights
        .iter()
        .scan(0u64, |sum, &w| {
            *sum += w;
            Some(*sum)
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
