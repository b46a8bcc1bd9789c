//! Symbols, Reel Weights and Paytable
//!
//! All math constants for the 5x6 cluster-pays grid. Pays are stored in
//! hundredths of the wager so payouts stay integer end to end.

use serde::{Deserialize, Serialize};

use crate::core::money::PayoutMultiplier;
use crate::core::rng::ProvablyFairRng;

/// Grid symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    /// Wild, substitutes for any regular symbol.
    #[serde(rename = "WD")]
    Wild,
    /// Scatter, triggers free spins and never clusters.
    #[serde(rename = "SC")]
    Scatter,
    /// Red wolf (top pay).
    #[serde(rename = "WR")]
    WolfRed,
    /// Black wolf.
    #[serde(rename = "WB")]
    WolfBlack,
    /// Purple wolf.
    #[serde(rename = "WP")]
    WolfPurple,
    /// Gray wolf.
    #[serde(rename = "WG")]
    WolfGray,
    /// Green wolf.
    #[serde(rename = "W6")]
    WolfGreen,
    /// Spirit wolf.
    #[serde(rename = "WS")]
    WolfSpirit,
    /// White wolf.
    #[serde(rename = "HC")]
    WolfWhite,
    /// Snake wolf.
    #[serde(rename = "HS")]
    WolfSnake,
    /// Street wolf.
    #[serde(rename = "HW")]
    WolfStreet,
    /// Blue wolf (lowest pay).
    #[serde(rename = "HK")]
    WolfBlue,
}

/// Reel order used by every weight table.
pub const ALL_SYMBOLS: [Symbol; 12] = [
    Symbol::Wild,
    Symbol::Scatter,
    Symbol::WolfRed,
    Symbol::WolfBlack,
    Symbol::WolfPurple,
    Symbol::WolfGray,
    Symbol::WolfGreen,
    Symbol::WolfSpirit,
    Symbol::WolfWhite,
    Symbol::WolfSnake,
    Symbol::WolfStreet,
    Symbol::WolfBlue,
];

/// Base game spawn weights (aligned with `ALL_SYMBOLS`).
pub const BASE_WEIGHTS: [u64; 12] = [3, 2, 8, 10, 12, 16, 19, 22, 26, 29, 33, 36];

/// Free spin spawn weights: more wilds, scatters stay for retriggers.
pub const FREE_SPIN_WEIGHTS: [u64; 12] = [5, 3, 8, 10, 12, 16, 19, 22, 26, 29, 33, 36];

/// Scatter weight factor while the scatter boost is on.
pub const SCATTER_BOOST_FACTOR: u64 = 3;

/// Wild weight factor while the wild boost is on.
pub const WILD_BOOST_FACTOR: u64 = 5;

/// Smallest paying cluster.
pub const MIN_CLUSTER_SIZE: usize = 4;

/// Clusters above this size pay as this size.
pub const MAX_PAY_SIZE: usize = 15;

const PAY_TOP: [u64; 12] = [78, 125, 204, 329, 549, 815, 1254, 2038, 3293, 5018, 8154, 12544];
const PAY_BLACK: [u64; 12] = [63, 102, 165, 282, 470, 721, 1098, 1803, 2822, 4390, 7213, 10976];
const PAY_PURPLE: [u64; 12] = [50, 84, 141, 251, 416, 666, 1004, 1646, 2634, 4140, 6664, 10035];
const PAY_GRAY: [u64; 12] = [34, 58, 94, 165, 267, 423, 666, 1145, 1725, 2822, 4704, 7213];
const PAY_GREEN: [u64; 12] = [31, 52, 84, 141, 235, 376, 580, 1004, 1505, 2509, 4140, 6272];
const PAY_SPIRIT: [u64; 12] = [25, 42, 73, 120, 201, 321, 502, 847, 1333, 2148, 3450, 5331];
const PAY_WHITE: [u64; 12] = [13, 19, 34, 57, 94, 157, 235, 384, 612, 1004, 1631, 2509];
const PAY_SNAKE: [u64; 12] = [10, 16, 26, 47, 78, 125, 191, 329, 517, 847, 1348, 2038];
const PAY_LOW: [u64; 12] = [8, 13, 21, 31, 57, 91, 138, 235, 392, 627, 1004, 1505];

impl Symbol {
    /// Two-letter wire code.
    pub fn code(self) -> &'static str {
        match self {
            Symbol::Wild => "WD",
            Symbol::Scatter => "SC",
            Symbol::WolfRed => "WR",
            Symbol::WolfBlack => "WB",
            Symbol::WolfPurple => "WP",
            Symbol::WolfGray => "WG",
            Symbol::WolfGreen => "W6",
            Symbol::WolfSpirit => "WS",
            Symbol::WolfWhite => "HC",
            Symbol::WolfSnake => "HS",
            Symbol::WolfStreet => "HW",
            Symbol::WolfBlue => "HK",
        }
    }

    /// Wild or scatter.
    pub fn is_special(self) -> bool {
        matches!(self, Symbol::Wild | Symbol::Scatter)
    }

    fn pay_row(self) -> Option<&'static [u64; 12]> {
        match self {
            Symbol::Scatter => None,
            Symbol::Wild | Symbol::WolfRed => Some(&PAY_TOP),
            Symbol::WolfBlack => Some(&PAY_BLACK),
            Symbol::WolfPurple => Some(&PAY_PURPLE),
            Symbol::WolfGray => Some(&PAY_GRAY),
            Symbol::WolfGreen => Some(&PAY_GREEN),
            Symbol::WolfSpirit => Some(&PAY_SPIRIT),
            Symbol::WolfWhite => Some(&PAY_WHITE),
            Symbol::WolfSnake => Some(&PAY_SNAKE),
            Symbol::WolfStreet | Symbol::WolfBlue => Some(&PAY_LOW),
        }
    }
}

/// Base pay for a cluster of `size` symbols, before spot multipliers.
pub fn cluster_pay(symbol: Symbol, size: usize) -> PayoutMultiplier {
    if size < MIN_CLUSTER_SIZE {
        return PayoutMultiplier::ZERO;
    }
    let index = size.min(MAX_PAY_SIZE) - MIN_CLUSTER_SIZE;
    symbol
        .pay_row()
        .map(|row| PayoutMultiplier(row[index]))
        .unwrap_or(PayoutMultiplier::ZERO)
}

/// Which weight table to draw from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReelProfile {
    /// Free spin weights.
    pub free_spin: bool,
    /// Triple scatter weight.
    pub scatter_boost: bool,
    /// Quintuple wild weight.
    pub wild_boost: bool,
}

impl ReelProfile {
    /// Cumulative weights for this profile.
    pub fn cumulative(&self) -> Vec<u64> {
        let mut weights = if self.free_spin { FREE_SPIN_WEIGHTS } else { BASE_WEIGHTS };
        if !self.free_spin {
            if self.scatter_boost {
                weights[1] *= SCATTER_BOOST_FACTOR;
            }
            if self.wild_boost {
                weights[0] *= WILD_BOOST_FACTOR;
            }
        }
        crate::core::rng::cumulative_weights(&weights)
    }
}

/// Draw one symbol.
pub fn draw_symbol(rng: &mut ProvablyFairRng, cumulative: &[u64]) -> Symbol {
    ALL_SYMBOLS[rng.weighted_choice(cumulative).min(ALL_SYMBOLS.len() - 1)]
}

// =============================================================================
// TESTS
// =============================================================================
