//! Round Outcome Engine
//!
//! `run_spin` turns `(server_seed, client_seed, nonce, wager, ...)` into the
//! complete ordered event list of one round. It is pure: the same inputs
//! always produce the same outcome, which is what lets a revealed seed audit
//! every round played under it.
//!
//! ## Round order
//!
//! 1. Draw and reveal the grid (bonus wilds and spots applied after reveal)
//! 2. Scatter check (trigger in base game, retrigger in free spins)
//! 3. Tumble loop until no cluster pays
//! 4. Jackpot roll (base game only)
//! 5. Win cap, free spin bookkeeping

use serde::{Deserialize, Serialize};

use crate::core::money::{Amount, PayoutMultiplier};
use crate::core::rng::{InvalidSeedKey, ProvablyFairRng};
use crate::game::bonus::NextRoundFeature;
use crate::game::events::{total_win, Position, RoundEvent};
use crate::game::grid::{Grid, MultiplierGrid, INITIAL_MULTIPLIER};
use crate::game::jackpot::{roll_jackpot, JackpotTier};
use crate::game::symbols::{draw_symbol, ReelProfile, Symbol};

/// Maximum total win as a multiple of the wager.
pub const MAX_WIN: PayoutMultiplier = PayoutMultiplier::from_whole(40_000);

/// Upper bound on tumble steps per round.
pub const MAX_TUMBLES: u32 = 100;

/// Base game scatter awards for 3, 4, 5, 6+ scatters.
pub const SCATTER_FREE_SPINS: [u32; 4] = [8, 12, 15, 20];

/// Free spin retrigger awards for 3, 4, 5, 6+ scatters (2 pays as 3).
pub const SCATTER_RETRIGGER: [u32; 4] = [5, 8, 10, 12];

/// Round mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundMode {
    /// Paid base game round.
    #[default]
    Base,
    /// Free spin round; nothing is debited.
    FreeSpin,
}

/// Probability boost toggles. Each scales the effective (debited) wager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierFlags {
    /// Triple scatter weight, wager x2.
    pub scatter_boost: bool,
    /// Quintuple wild weight, wager x5.
    pub wild_boost: bool,
}

impl ModifierFlags {
    /// Wager factor: 1, 2, 5, or 10 with both.
    pub fn wager_factor(&self) -> i64 {
        match (self.scatter_boost, self.wild_boost) {
            (false, false) => 1,
            (true, false) => 2,
            (false, true) => 5,
            (true, true) => 10,
        }
    }

    /// Any boost on.
    pub fn any(&self) -> bool {
        self.scatter_boost || self.wild_boost
    }
}

/// Everything a round outcome depends on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinParams {
    /// Server seed (secret until rotation).
    pub server_seed: String,
    /// Client seed.
    pub client_seed: String,
    /// Nonce at play time.
    pub nonce: u64,
    /// Base wager that pays scale from.
    pub wager: Amount,
    /// Base or free spin.
    pub mode: RoundMode,
    /// Boost toggles (base game only).
    pub modifiers: ModifierFlags,
    /// Free spins left before this round.
    pub free_spins_remaining: u32,
    /// Spot multipliers carried between free spins.
    pub carried_multipliers: Option<MultiplierGrid>,
    /// Purchased modifier for this round.
    pub feature: Option<NextRoundFeature>,
}

impl SpinParams {
    /// Base round with no modifiers.
    pub fn base(server_seed: &str, client_seed: &str, nonce: u64, wager: Amount) -> Self {
        Self {
            server_seed: server_seed.to_string(),
            client_seed: client_seed.to_string(),
            nonce,
            wager,
            mode: RoundMode::Base,
            modifiers: ModifierFlags::default(),
            free_spins_remaining: 0,
            carried_multipliers: None,
            feature: None,
        }
    }
}

/// Complete outcome of one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinOutcome {
    /// Ordered events.
    pub events: Vec<RoundEvent>,
    /// Total pay relative to the base wager.
    pub payout_multiplier: PayoutMultiplier,
    /// Amount credited (sum of event win deltas).
    pub total_win: Amount,
    /// Tumble steps.
    pub tumble_count: u32,
    /// Highest spot multiplier seen.
    pub max_multiplier: u32,
    /// Free spins awarded this round.
    pub free_spins_triggered: u32,
    /// Free spins left after this round.
    pub free_spins_remaining: u32,
    /// This round was a free spin.
    pub is_free_spin: bool,
    /// Spot multipliers at the end of the round.
    pub final_multipliers: MultiplierGrid,
    /// Jackpot tier hit.
    pub jackpot: Option<JackpotTier>,
}

/// Play one round.
pub fn run_spin(params: &SpinParams) -> Result<SpinOutcome, InvalidSeedKey> {
    let mut rng = ProvablyFairRng::new(&params.server_seed, &params.client_seed, params.nonce)?;
    let free_spin = params.mode == RoundMode::FreeSpin;

    let reveal_profile = ReelProfile {
        free_spin,
        scatter_boost: params.modifiers.scatter_boost,
        wild_boost: params.modifiers.wild_boost,
    };
    let mut grid = Grid::generate(&mut rng, &reveal_profile.cumulative());
    if let Some(carried) = params.carried_multipliers {
        grid.set_multipliers(carried);
    }

    let mut events = vec![RoundEvent::Reveal { symbols: grid.symbol_rows() }];

    let feature = params.feature.clone().unwrap_or_default();
    if !feature.wild_positions.is_empty() {
        for &pos in &feature.wild_positions {
            grid.set_symbol(pos, Symbol::Wild);
        }
        events.push(RoundEvent::WolfBurst { wild_positions: feature.wild_positions.clone() });
    }
    if let Some(start) = feature.multipliers {
        grid.set_multipliers(start);
    }

    // Scatters
    let scatters = grid.scatter_positions();
    let free_spins_triggered = scatter_award(scatters.len(), free_spin);
    if free_spins_triggered > 0 {
        events.push(RoundEvent::FreeSpinsTrigger {
            scatter_count: scatters.len() as u32,
            positions: scatters,
            free_spins_awarded: free_spins_triggered,
            is_retrigger: free_spin,
        });
    }

    // Tumbles
    let fill_profile = ReelProfile { free_spin, ..Default::default() }.cumulative();
    let mut payout = PayoutMultiplier::ZERO;
    let mut tumble_count = 0;
    let mut max_multiplier = INITIAL_MULTIPLIER;

    while tumble_count < MAX_TUMBLES {
        let clusters = grid.find_clusters();
        if clusters.is_empty() {
            break;
        }
        tumble_count += 1;

        let mut winning: Vec<Position> = Vec::new();
        for cluster in clusters {
            max_multiplier = max_multiplier.max(cluster.multiplier);
            let pay = cluster.pay();
            payout += pay;
            events.push(RoundEvent::Win {
                cluster_id: cluster.id,
                symbol: cluster.symbol,
                size: cluster.positions.len() as u32,
                base_pay: cluster.base_pay,
                multiplier: cluster.multiplier,
                pay,
                amount: pay.apply(params.wager),
                positions: cluster.positions.clone(),
            });
            winning.extend(cluster.positions);
        }

        for (position, value) in grid.upgrade_multipliers(&winning) {
            max_multiplier = max_multiplier.max(value);
            events.push(RoundEvent::MultiplierUpgrade { position, value });
        }

        let wilds = grid.remove(&winning);
        for explosion in grid.explode_wilds(&wilds) {
            let max_new_multiplier = explosion.max_new_multiplier();
            max_multiplier = max_multiplier.max(max_new_multiplier);
            events.push(RoundEvent::WildExplosion {
                wild_position: explosion.wild_position,
                cells: explosion.cells,
                explosion_factor: crate::game::grid::WILD_EXPLOSION_FACTOR,
                max_new_multiplier,
            });
        }

        let movements = grid.apply_gravity();
        if !movements.is_empty() {
            events.push(RoundEvent::Tumble { movements });
        }
        let fills = grid.fill(&mut rng, &fill_profile);
        if !fills.is_empty() {
            events.push(RoundEvent::Fill { fills });
        }
    }

    // Jackpot
    let mut jackpot = None;
    if !free_spin {
        if let Some(hit) = roll_jackpot(&mut rng, params.wager, feature.jackpot_boost) {
            payout += hit.pay;
            jackpot = Some(hit.tier);
            events.push(RoundEvent::JackpotWin { tier: hit.tier, amount: hit.amount });
        }
    }

    // Cap
    let mut won = total_win(&events);
    if payout > MAX_WIN {
        let capped = MAX_WIN.apply(params.wager);
        events.push(RoundEvent::WinCapped { cap: MAX_WIN, amount: capped - won });
        payout = MAX_WIN;
        won = capped;
    }

    let mut free_spins_remaining = if free_spin {
        params.free_spins_remaining.saturating_sub(1)
    } else {
        0
    };
    free_spins_remaining += free_spins_triggered;

    Ok(SpinOutcome {
        events,
        payout_multiplier: payout,
        total_win: won,
        tumble_count,
        max_multiplier,
        free_spins_triggered,
        free_spins_remaining,
        is_free_spin: free_spin,
        final_multipliers: *grid.multipliers(),
        jackpot,
    })
}

/// Free spins awarded for `count` scatters.
pub fn scatter_award(count: usize, free_spin: bool) -> u32 {
    let (threshold, table) = if free_spin { (2, &SCATTER_RETRIGGER) } else { (3, &SCATTER_FREE_SPINS) };
    if count < threshold {
        return 0;
    }
    table[count.clamp(3, 6) - 3]
}

/// Trigger spin for a free spin purchase: exactly `scatter_count` scatters
/// land, nothing pays, and `free_spins` are reported as triggered. The
/// award is not applied here.
pub fn run_bonus_trigger_spin(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    scatter_count: usize,
    free_spins: u32,
) -> Result<SpinOutcome, InvalidSeedKey> {
    let mut rng = ProvablyFairRng::new(server_seed, client_seed, nonce)?;
    let cumulative = ReelProfile::default().cumulative();
    let mut grid = Grid::generate(&mut rng, &cumulative);

    // No stray scatters: redraw them from a table without scatter weight.
    let mut no_scatter = crate::game::symbols::BASE_WEIGHTS;
    no_scatter[1] = 0;
    let no_scatter = crate::core::rng::cumulative_weights(&no_scatter);
    for pos in grid.scatter_positions() {
        grid.set_symbol(pos, draw_symbol(&mut rng, &no_scatter));
    }

    let cells: Vec<Position> = crate::game::grid::all_positions().collect();
    let mut picked: Vec<Position> = rng
        .sample_indices(cells.len(), scatter_count)
        .into_iter()
        .map(|i| cells[i])
        .collect();
    picked.sort_unstable();
    for &pos in &picked {
        grid.set_symbol(pos, Symbol::Scatter);
    }

    let events = vec![
        RoundEvent::Reveal { symbols: grid.symbol_rows() },
        RoundEvent::FreeSpinsTrigger {
            scatter_count: picked.len() as u32,
            positions: picked,
            free_spins_awarded: free_spins,
            is_retrigger: false,
        },
    ];

    Ok(SpinOutcome {
        events,
        payout_multiplier: PayoutMultiplier::ZERO,
        total_win: 0,
        tumble_count: 0,
        max_multiplier: INITIAL_MULTIPLIER,
        free_spins_triggered: free_spins,
        free_spins_remaining: 0,
        is_free_spin: false,
        final_multipliers: *grid.multipliers(),
        jackpot: None,
    })
}

// =============================================================================
// TESTS
// =============================================================================
