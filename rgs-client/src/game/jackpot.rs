//! Jackpot Tiers
//!
//! Four fixed tiers rolled once per base-game round, highest first. A tier
//! is only rolled when the wager reaches its minimum.

use serde::{Deserialize, Serialize};

use crate::core::money::{Amount, PayoutMultiplier, MONETARY_SCALE};
use crate::core::rng::ProvablyFairRng;

/// Engine minimum bet (0.10) that jackpot eligibility and pays scale from.
pub const JACKPOT_BASE_BET: Amount = 100_000;

/// Chance factor while a jackpot boost is armed.
pub const JACKPOT_BOOST_FACTOR: f64 = 100.0;

/// Jackpot tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JackpotTier {
    /// Smallest tier.
    Mini,
    /// Second tier.
    Minor,
    /// Third tier.
    Major,
    /// Top tier.
    Grand,
}

/// Static tier configuration.
#[derive(Clone, Copy, Debug)]
pub struct TierConfig {
    /// Tier id.
    pub tier: JackpotTier,
    /// Display name.
    pub name: &'static str,
    /// Seed amount in whole currency units at the base bet.
    pub seed_units: i64,
    /// Chance per eligible round.
    pub chance: f64,
    /// Minimum wager as a multiple of `JACKPOT_BASE_BET`.
    pub min_bet_factor: i64,
}

/// Tiers in roll order.
pub const JACKPOT_TIERS: [TierConfig; 4] = [
    TierConfig { tier: JackpotTier::Grand, name: "Grand", seed_units: 10_000, chance: 0.000_000_05, min_bet_factor: 10 },
    TierConfig { tier: JackpotTier::Major, name: "Major", seed_units: 1_000, chance: 0.000_000_5, min_bet_factor: 5 },
    TierConfig { tier: JackpotTier::Minor, name: "Minor", seed_units: 200, chance: 0.000_002, min_bet_factor: 2 },
    TierConfig { tier: JackpotTier::Mini, name: "Mini", seed_units: 50, chance: 0.000_01, min_bet_factor: 1 },
];

impl TierConfig {
    /// Minimum eligible wager.
    pub fn min_bet(&self) -> Amount {
        self.min_bet_factor * JACKPOT_BASE_BET
    }

    /// Seed amount in fixed-point.
    pub fn seed_amount(&self) -> Amount {
        self.seed_units * MONETARY_SCALE
    }

    /// Pay as a multiple of the wager (seed scaled by wager / base bet).
    pub fn pay(&self) -> PayoutMultiplier {
        PayoutMultiplier((self.seed_amount() * 100 / JACKPOT_BASE_BET) as u64)
    }
}

/// A hit jackpot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JackpotHit {
    /// Tier hit.
    pub tier: JackpotTier,
    /// Pay relative to the wager.
    pub pay: PayoutMultiplier,
    /// Amount credited.
    pub amount: Amount,
}

/// Roll every eligible tier, highest first. One roll is consumed per
/// eligible tier until a hit.
pub fn roll_jackpot(rng: &mut ProvablyFairRng, wager: Amount, boosted: bool) -> Option<JackpotHit> {
    let factor = if boosted { JACKPOT_BOOST_FACTOR } else { 1.0 };
    for config in JACKPOT_TIERS.iter() {
        if wager < config.min_bet() {
            continue;
        }
        if rng.random_float() < config.chance * factor {
            let pay = config.pay();
            return Some(JackpotHit { tier: config.tier, pay, amount: pay.apply(wager) });
        }
    }
    None
}
