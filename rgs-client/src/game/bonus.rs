//! Bonus Buys and Activated Features
//!
//! A purchase returns a `FeatureActivated` tag from a closed set. The tag
//! alone fixes the deterministic effects (free spin count, starting
//! multiplier grid); the few features with drawn content (wild cells,
//! multiplier spots) carry it in a `FeatureDetail` derived from the
//! purchase nonce, so it is reproducible from the revealed seed.

use serde::{Deserialize, Serialize};

use crate::core::money::{Amount, PayoutMultiplier};
use crate::core::rng::ProvablyFairRng;
use crate::game::events::Position;
use crate::game::grid::{all_positions, uniform_multipliers, MultiplierGrid, INITIAL_MULTIPLIER};

/// Free spins granted by `free_spins`.
pub const FREE_SPINS_STANDARD: u32 = 8;

/// Free spins granted by `free_spins_enhanced`.
pub const FREE_SPINS_ENHANCED: u32 = 12;

/// Spot value on every cell for `free_spins_enhanced`.
pub const ENHANCED_START_MULTIPLIER: u32 = 2;

/// Feature switched on by a purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureActivated {
    /// 8 free spins.
    FreeSpins,
    /// 12 free spins, every spot at x2.
    FreeSpinsEnhanced,
    /// 3-6 wilds dropped on the next base round.
    WolfBurst,
    /// 5-8 wilds guaranteed on the next base round.
    WildBoost,
    /// 5 spots pre-set to x4/x8/x16 on the next base round.
    MultiplierStart,
    /// Jackpot chances raised on the next base round.
    JackpotBoost,
}

/// Drawn content for features that need it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDetail {
    /// Cells turned wild.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wild_positions: Vec<Position>,
    /// Starting spot multipliers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipliers: Option<MultiplierGrid>,
}

/// Modifier armed for the next base round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextRoundFeature {
    /// Cells forced to wild after the reveal.
    #[serde(default)]
    pub wild_positions: Vec<Position>,
    /// Starting spot multipliers.
    #[serde(default)]
    pub multipliers: Option<MultiplierGrid>,
    /// Raised jackpot chances.
    #[serde(default)]
    pub jackpot_boost: bool,
}

/// What the client must apply for a feature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeatureEffect {
    /// Enter free spins now.
    FreeSpins {
        /// Spins granted.
        count: u32,
        /// Starting spot grid, if preset.
        multipliers: Option<MultiplierGrid>,
    },
    /// Arm a modifier for the next base round.
    NextRound(NextRoundFeature),
}

impl FeatureActivated {
    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureActivated::FreeSpins => "free_spins",
            FeatureActivated::FreeSpinsEnhanced => "free_spins_enhanced",
            FeatureActivated::WolfBurst => "wolf_burst",
            FeatureActivated::WildBoost => "wild_boost",
            FeatureActivated::MultiplierStart => "multiplier_start",
            FeatureActivated::JackpotBoost => "jackpot_boost",
        }
    }

    /// Draw the content this feature needs. Consumes randomness only for
    /// features with drawn content.
    pub fn derive_detail(self, rng: &mut ProvablyFairRng) -> FeatureDetail {
        match self {
            FeatureActivated::WolfBurst => FeatureDetail {
                wild_positions: draw_cells(rng, 3, 6),
                multipliers: None,
            },
            FeatureActivated::WildBoost => FeatureDetail {
                wild_positions: draw_cells(rng, 5, 8),
                multipliers: None,
            },
            FeatureActivated::MultiplierStart => {
                let mut grid = uniform_multipliers(INITIAL_MULTIPLIER);
                for (row, col) in draw_cells(rng, 5, 5) {
                    grid[row][col] = [4, 8, 16][rng.random_int(3) as usize];
                }
                FeatureDetail { wild_positions: Vec::new(), multipliers: Some(grid) }
            }
            _ => FeatureDetail::default(),
        }
    }

    /// Effects as signalled. Free spin features ignore `detail`.
    pub fn effect(self, detail: &FeatureDetail) -> FeatureEffect {
        match self {
            FeatureActivated::FreeSpins => FeatureEffect::FreeSpins {
                count: FREE_SPINS_STANDARD,
                multipliers: None,
            },
            FeatureActivated::FreeSpinsEnhanced => FeatureEffect::FreeSpins {
                count: FREE_SPINS_ENHANCED,
                multipliers: Some(uniform_multipliers(ENHANCED_START_MULTIPLIER)),
            },
            FeatureActivated::WolfBurst | FeatureActivated::WildBoost => {
                FeatureEffect::NextRound(NextRoundFeature {
                    wild_positions: detail.wild_positions.clone(),
                    ..Default::default()
                })
            }
            FeatureActivated::MultiplierStart => FeatureEffect::NextRound(NextRoundFeature {
                multipliers: detail.multipliers,
                ..Default::default()
            }),
            FeatureActivated::JackpotBoost => FeatureEffect::NextRound(NextRoundFeature {
                jackpot_boost: true,
                ..Default::default()
            }),
        }
    }
}

fn draw_cells(rng: &mut ProvablyFairRng, min: usize, max: usize) -> Vec<Position> {
    let cells: Vec<Position> = all_positions().collect();
    let count = min + rng.random_int((max - min + 1) as u64) as usize;
    rng.sample_indices(cells.len(), count)
        .into_iter()
        .map(|i| cells[i])
        .collect()
}

// =============================================================================
// CATALOG
// =============================================================================

/// A purchasable bonus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BonusOption {
    /// Wire id.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// Cost as a whole multiple of the wager.
    pub cost_factor: u64,
    /// Volatility label.
    pub volatility: &'static str,
    /// Feature switched on.
    pub feature: FeatureActivated,
}

impl BonusOption {
    /// Price at `wager`.
    pub fn cost(&self, wager: Amount) -> Amount {
        PayoutMultiplier::from_whole(self.cost_factor).apply(wager)
    }

    /// Free spins a trigger spin for this option awards, with scatters shown.
    pub fn trigger(&self) -> Option<(u32, u32)> {
        match self.feature {
            FeatureActivated::FreeSpins => Some((3, FREE_SPINS_STANDARD)),
            FeatureActivated::FreeSpinsEnhanced => Some((4, FREE_SPINS_ENHANCED)),
            _ => None,
        }
    }
}

/// Every purchasable bonus.
pub const BONUS_OPTIONS: [BonusOption; 6] = [
    BonusOption {
        id: "free_spins_8",
        name: "Buy Free Spins",
        description: "Instantly trigger 8 Free Spins",
        cost_factor: 100,
        volatility: "high",
        feature: FeatureActivated::FreeSpins,
    },
    BonusOption {
        id: "free_spins_12",
        name: "Buy Super Free Spins",
        description: "Instantly trigger 12 Free Spins with x2 starting multiplier",
        cost_factor: 200,
        volatility: "extreme",
        feature: FeatureActivated::FreeSpinsEnhanced,
    },
    BonusOption {
        id: "wolf_burst",
        name: "Wolf Burst",
        description: "Wolf mascot blows 3-6 WILDs onto the grid",
        cost_factor: 10,
        volatility: "medium",
        feature: FeatureActivated::WolfBurst,
    },
    BonusOption {
        id: "wild_grid",
        name: "Wild Boost",
        description: "Guaranteed 5-8 Wilds on first spin",
        cost_factor: 10,
        volatility: "medium",
        feature: FeatureActivated::WildBoost,
    },
    BonusOption {
        id: "max_multi_start",
        name: "Multiplier Madness",
        description: "Start with random x4-x16 multipliers on 5 positions",
        cost_factor: 20,
        volatility: "high",
        feature: FeatureActivated::MultiplierStart,
    },
    BonusOption {
        id: "jackpot_chance",
        name: "Jackpot Hunt",
        description: "100x higher chance to hit jackpot this spin",
        cost_factor: 5,
        volatility: "extreme",
        feature: FeatureActivated::JackpotBoost,
    },
];

/// Look up a bonus by wire id.
pub fn find_bonus(id: &str) -> Option<&'static BonusOption> {
    BONUS_OPTIONS.iter().find(|b| b.id == id)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhanced_free_spins_effect_is_fixed() {
        let effect = FeatureActivated::FreeSpinsEnhanced.effect(&FeatureDetail::default());
        match effect {
            FeatureEffect::FreeSpins { count, multipliers: Some(grid) } => {
                assert_eq!(count, 12);
                assert!(grid.iter().flatten().all(|&m| m == 2));
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_standard_free_spins_effect() {
        assert_eq!(
            FeatureActivated::FreeSpins.effect(&FeatureDetail::default()),
            FeatureEffect::FreeSpins { count: 8, multipliers: None }
        );
    }

    #[test]
    fn test_feature_tags() {
        let json = serde_json::to_string(&FeatureActivated::FreeSpinsEnhanced).unwrap();
        assert_eq!(json, "\"free_spins_enhanced\"");
        for option in BONUS_OPTIONS {
            let tag = serde_json::to_value(option.feature).unwrap();
            assert_eq!(tag, option.feature.as_str());
        }
    }

    #[test]
    fn test_catalog_lookup_and_cost() {
        let option = find_bonus("free_spins_12").unwrap();
        assert_eq!(option.cost(1_000_000), 200_000_000);
        assert_eq!(option.trigger(), Some((4, 12)));
        assert!(find_bonus("jackpot_chance").unwrap().trigger().is_none());
        assert!(find_bonus("nope").is_none());
    }

    #[test]
    fn test_wolf_burst_detail_is_deterministic() {
        let draw = || {
            let mut rng = ProvablyFairRng::new("seed", "client", 9).unwrap();
            FeatureActivated::WolfBurst.derive_detail(&mut rng)
        };
        let detail = draw();
        assert_eq!(detail, draw());
        assert!((3..=6).contains(&detail.wild_positions.len()));
    }

    #[test]
    fn test_multiplier_start_detail() {
        let mut rng = ProvablyFairRng::new("seed", "client", 1).unwrap();
        let detail = FeatureActivated::MultiplierStart.derive_detail(&mut rng);
        let grid = detail.multipliers.unwrap();
        let boosted: Vec<u32> = grid.iter().flatten().copied().filter(|&m| m > 1).collect();
        assert_eq!(boosted.len(), 5);
        assert!(boosted.iter().all(|m| [4, 8, 16].contains(m)));
    }
}
