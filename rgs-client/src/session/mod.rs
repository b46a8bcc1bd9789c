//! Sessions
//!
//! Session identity, balance cache and seed commitment, plus the manager
//! that creates and rotates them.

pub mod bet;
pub mod manager;
pub mod state;

pub use bet::BetConfig;
pub use manager::{SeedRotation, SessionManager};
pub use state::{Session, SessionMode, SessionStats};
