//! # RGS Client
//!
//! Session and round lifecycle client for a Stake Engine style Remote Game
//! Server, with provably fair verification.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RGS CLIENT                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── money.rs    - 10^6 fixed-point amounts, pay multipliers │
//! │  ├── hash.rs     - SHA-256 seed commitments                  │
//! │  └── rng.rs      - HMAC-SHA256 provably fair RNG             │
//! │                                                              │
//! │  game/           - Outcome engine (deterministic)            │
//! │  ├── symbols.rs  - Symbols, reel weights, paytable           │
//! │  ├── grid.rs     - Clusters, spot multipliers, tumbles       │
//! │  ├── events.rs   - Visible round events                      │
//! │  ├── jackpot.rs  - Jackpot tiers                             │
//! │  ├── bonus.rs    - Bonus catalog, activated features         │
//! │  └── spin.rs     - Round engine                              │
//! │                                                              │
//! │  network/        - RGS transports (non-deterministic)        │
//! │  ├── protocol.rs - Wire messages                             │
//! │  ├── transport.rs- Transport trait, backend dispatch         │
//! │  ├── http.rs     - reqwest transport                         │
//! │  ├── local.rs    - In-process RGS (demo mode, tests)         │
//! │  └── client.rs   - Timeout and retry policy                  │
//! │                                                              │
//! │  session/        - Session Manager                           │
//! │  round/          - Round Executor                            │
//! │  proof/          - Commit-reveal checks, recomputation       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Round Guarantees
//!
//! - One round in flight per session
//! - Events acknowledged strictly in order, starting at 0
//! - Wins credited only by `end_round`, after every event is acknowledged
//! - Keyed mutations are retried with the same idempotency key
//!
//! Outcomes are a pure function of `(server_seed, client_seed, nonce)`
//! and the round inputs, so any round can be recomputed once its server
//! seed is revealed.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod network;
pub mod proof;
pub mod round;
pub mod session;

// Re-export commonly used types
pub use config::{ClientConfig, RetryPolicy};
pub use crate::core::money::{from_fixed, to_fixed, Amount, PayoutMultiplier, MONETARY_SCALE};
pub use error::{ErrorCode, Result, RgsError};
pub use proof::verify::verify_round;
pub use round::{PendingOutcome, RoundExecutor, RoundPhase, RoundRequest, VisibleState};
pub use session::{BetConfig, Session, SessionManager, SessionMode};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
