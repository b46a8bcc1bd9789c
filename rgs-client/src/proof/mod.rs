//! Provably Fair Proofs
//!
//! Commit-reveal checks and outcome recomputation:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF SYSTEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  commitment.rs - Seed commitment and reveal check           │
//! │  verify.rs     - Round recomputation and rotation audit     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod verify;

pub use commitment::{CommitmentError, SeedCommitment, SeedReveal};
pub use verify::{
    audit_rotation, compare_outcomes, detail_digest, outcome_digest, recompute_record,
    verify_round, AuditReport, Mismatch, Recomputed, RoundCheck, ServedRound,
};
