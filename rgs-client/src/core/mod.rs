//! Core deterministic primitives.
//!
//! Money, hashing and randomness shared by the engine, the transports and
//! the verification helper. Nothing here touches the network.

pub mod money;
pub mod hash;
pub mod rng;

// Re-export core types
pub use money::{Amount, PayoutMultiplier, MONETARY_SCALE, to_fixed, from_fixed, format_amount, MoneyError};
pub use hash::{hash_server_seed, generate_server_seed, matches_commitment};
pub use rng::{ProvablyFairRng, InvalidSeedKey};
