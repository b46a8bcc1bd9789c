//! Round Events
//!
//! The ordered, closed set of visible state changes a round produces.
//! Consumers play them back one at a time and acknowledge each index.
//! Serialized as `{"type": "...", ...camelCase payload}`.

use serde::{Deserialize, Serialize};

use crate::core::money::{Amount, PayoutMultiplier};
use crate::game::jackpot::JackpotTier;
use crate::game::symbols::Symbol;

/// Grid cell as `(row, col)`, serialized as `[row, col]`.
pub type Position = (usize, usize);

/// One symbol falling during gravity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Origin cell.
    pub from: Position,
    /// Destination cell.
    pub to: Position,
    /// Symbol moved.
    pub symbol: Symbol,
}

/// One refilled cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillCell {
    /// Cell filled.
    pub position: Position,
    /// New symbol.
    pub symbol: Symbol,
}

/// Multiplier change on one cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellChange {
    /// Cell affected.
    pub position: Position,
    /// Multiplier before.
    pub old_multiplier: u32,
    /// Multiplier after.
    pub new_multiplier: u32,
}

/// A visible state change inside a round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    /// Initial grid, row-major.
    Reveal {
        /// Symbol rows.
        symbols: Vec<Vec<Symbol>>,
    },

    /// Bonus wilds dropped onto the grid before evaluation.
    #[serde(rename_all = "camelCase")]
    WolfBurst {
        /// Cells turned wild.
        wild_positions: Vec<Position>,
    },

    /// Scatters awarded free spins.
    #[serde(rename_all = "camelCase")]
    FreeSpinsTrigger {
        /// Scatters on the grid.
        scatter_count: u32,
        /// Scatter cells.
        positions: Vec<Position>,
        /// Spins awarded.
        free_spins_awarded: u32,
        /// Awarded during free spins.
        is_retrigger: bool,
    },

    /// A paying cluster.
    #[serde(rename_all = "camelCase")]
    Win {
        /// Cluster index within the round.
        cluster_id: u32,
        /// Paying symbol.
        symbol: Symbol,
        /// Cluster cells.
        positions: Vec<Position>,
        /// Cluster size.
        size: u32,
        /// Paytable entry.
        base_pay: PayoutMultiplier,
        /// Highest spot multiplier in the cluster.
        multiplier: u32,
        /// `base_pay * multiplier`.
        pay: PayoutMultiplier,
        /// Amount credited for this cluster.
        amount: Amount,
    },

    /// A spot multiplier grew.
    MultiplierUpgrade {
        /// Cell.
        position: Position,
        /// New value.
        value: u32,
    },

    /// A removed wild multiplied its 3x3 area.
    #[serde(rename_all = "camelCase")]
    WildExplosion {
        /// Wild cell.
        wild_position: Position,
        /// Changed cells.
        cells: Vec<CellChange>,
        /// Factor applied.
        explosion_factor: u32,
        /// Largest resulting multiplier.
        max_new_multiplier: u32,
    },

    /// Gravity pass.
    Tumble {
        /// Symbols moved.
        movements: Vec<Movement>,
    },

    /// Refill pass.
    Fill {
        /// Cells filled.
        fills: Vec<FillCell>,
    },

    /// Jackpot hit.
    JackpotWin {
        /// Tier hit.
        tier: JackpotTier,
        /// Amount credited.
        amount: Amount,
    },

    /// Round total hit the win cap; `amount` is the (negative) correction.
    WinCapped {
        /// Cap as a multiple of the wager.
        cap: PayoutMultiplier,
        /// Correction applied to reach the cap.
        amount: Amount,
    },
}

impl RoundEvent {
    /// Balance delta revealed by this event.
    pub fn win_delta(&self) -> Amount {
        match self {
            RoundEvent::Win { amount, .. }
            | RoundEvent::JackpotWin { amount, .. }
            | RoundEvent::WinCapped { amount, .. } => *amount,
            _ => 0,
        }
    }

    /// Wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            RoundEvent::Reveal { .. } => "reveal",
            RoundEvent::WolfBurst { .. } => "wolf_burst",
            RoundEvent::FreeSpinsTrigger { .. } => "free_spins_trigger",
            RoundEvent::Win { .. } => "win",
            RoundEvent::MultiplierUpgrade { .. } => "multiplier_upgrade",
            RoundEvent::WildExplosion { .. } => "wild_explosion",
            RoundEvent::Tumble { .. } => "tumble",
            RoundEvent::Fill { .. } => "fill",
            RoundEvent::JackpotWin { .. } => "jackpot_win",
            RoundEvent::WinCapped { .. } => "win_capped",
        }
    }
}

/// Sum of every event's win delta.
pub fn total_win(events: &[RoundEvent]) -> Amount {
    events.iter().map(RoundEvent::win_delta).sum()
}
