//! Seed Commitments and Digests
//!
//! Provides the SHA-256 helpers behind the provably fair scheme:
//! - Server seed commitment (`sha256(seed)` as lowercase hex)
//! - Domain-separated digests for outcome fingerprints and request dedup
//! - Fresh server seed generation

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Hash output type (256 bits / 32 bytes)
pub type Digest32 = [u8; 32];

/// Domain separator for served outcome fingerprints.
pub const OUTCOME_DOMAIN: &[u8] = b"RGS_OUTCOME_V1";

/// Domain separator for idempotent request fingerprints.
pub const REQUEST_DOMAIN: &[u8] = b"RGS_REQUEST_V1";

/// Commitment published before play: lowercase hex `sha256(server_seed)`.
pub fn hash_server_seed(server_seed: &str) -> String {
    hex::encode(hash_bytes(server_seed.as_bytes()))
}

/// Generate a new 32-byte server seed, hex encoded (64 chars).
pub fn generate_server_seed() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compute a simple hash of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

/// Fingerprint of any serializable value (canonical serde_json bytes).
///
/// Returns `None` only if the value cannot be serialized.
pub fn fingerprint<T: serde::Serialize>(domain: &[u8], value: &T) -> Option<Digest32> {
    serde_json::to_vec(value)
        .ok()
        .map(|bytes| hash_with_domain(domain, &bytes))
}

/// Check a revealed seed against a hex commitment.
pub fn matches_commitment(server_seed: &str, commitment_hex: &str) -> bool {
    hash_server_seed(server_seed).eq_ignore_ascii_case(commitment_hex.trim())
}

// =============================================================================
// TESTS
// =============================================================================
