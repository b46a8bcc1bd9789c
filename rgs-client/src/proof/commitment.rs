//! Seed Commitment Protocol
//!
//! The RGS publishes `sha256(server_seed)` before any round is played under
//! that seed, and reveals the seed itself only on rotation. The client keeps
//! the commitment it was shown and checks the reveal against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::hash::{hash_server_seed, matches_commitment};
use crate::error::RgsError;

/// Commitment published before play.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedCommitment {
    /// Lowercase hex `sha256(server_seed)`.
    pub server_seed_hash: String,
    /// When the client first saw it.
    pub received_at: DateTime<Utc>,
}

impl SeedCommitment {
    /// Record a commitment received now.
    pub fn new(server_seed_hash: impl Into<String>) -> Self {
        Self {
            server_seed_hash: server_seed_hash.into(),
            received_at: Utc::now(),
        }
    }

    /// Whether `server_seed` opens this commitment.
    pub fn opens_with(&self, server_seed: &str) -> bool {
        matches_commitment(server_seed, &self.server_seed_hash)
    }
}

/// Seed revealed on rotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReveal {
    /// Revealed server seed.
    pub server_seed: String,
    /// Commitment the server claims the seed was published under.
    pub previous_server_seed_hash: String,
    /// Commitment to the next seed.
    pub next_server_seed_hash: String,
}

impl SeedReveal {
    /// Verify the reveal against the commitment the client was shown.
    pub fn verify(&self, commitment: &SeedCommitment) -> Result<(), CommitmentError> {
        // 1. The server must be talking about the commitment we hold
        if !self
            .previous_server_seed_hash
            .eq_ignore_ascii_case(&commitment.server_seed_hash)
        {
            return Err(CommitmentError::CommitmentMismatch {
                held: commitment.server_seed_hash.clone(),
                claimed: self.previous_server_seed_hash.clone(),
            });
        }

        // 2. The revealed seed must open it
        if !commitment.opens_with(&self.server_seed) {
            return Err(CommitmentError::SeedMismatch {
                expected: commitment.server_seed_hash.clone(),
                computed: hash_server_seed(&self.server_seed),
            });
        }

        Ok(())
    }
}

/// Errors that can occur during reveal verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitmentError {
    /// Hash of the revealed seed differs from the commitment.
    #[error("revealed seed hashes to {computed}, commitment was {expected}")]
    SeedMismatch {
        /// Commitment held by the client.
        expected: String,
        /// Hash of the revealed seed.
        computed: String,
    },

    /// Server refers to a different commitment than the one held.
    #[error("server revealed the seed for commitment {claimed}, client holds {held}")]
    CommitmentMismatch {
        /// Commitment held by the client.
        held: String,
        /// Commitment named by the server.
        claimed: String,
    },
}

impl From<CommitmentError> for RgsError {
    fn from(err: CommitmentError) -> Self {
        RgsError::FairnessVerificationMismatch(err.to_string())
    }
}
