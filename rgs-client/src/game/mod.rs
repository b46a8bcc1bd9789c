//! Game Math Module
//!
//! Deterministic outcome engine for the 5x6 cluster-pays grid. Used by the
//! local RGS to serve rounds and by the fairness helper to recompute them.
//!
//! ## Module Structure
//!
//! - `symbols`: Symbols, reel weights, paytable
//! - `grid`: Clusters, spot multipliers, explosions, gravity, refill
//! - `events`: Visible round events
//! - `jackpot`: Jackpot tiers and rolls
//! - `bonus`: Bonus catalog and activated features
//! - `spin`: Round engine

pub mod symbols;
pub mod grid;
pub mod events;
pub mod jackpot;
pub mod bonus;
pub mod spin;

// Re-export key types
pub use symbols::Symbol;
pub use grid::{Grid, MultiplierGrid, GRID_ROWS, GRID_COLS};
pub use events::{RoundEvent, Position};
pub use jackpot::JackpotTier;
pub use bonus::{BonusOption, FeatureActivated, FeatureDetail, FeatureEffect, NextRoundFeature, BONUS_OPTIONS};
pub use spin::{run_spin, run_bonus_trigger_spin, ModifierFlags, RoundMode, SpinOutcome, SpinParams};
