//! Pending Outcomes
//!
//! A round arrives complete but is revealed one acknowledged event at a
//! time. `PendingOutcome` holds what the server returned; `VisibleState` is
//! what a consumer may show, advanced only by `apply`.

use crate::core::money::Amount;
use crate::error::{Result, RgsError};
use crate::game::events::RoundEvent;
use crate::game::grid::{uniform_multipliers, MultiplierGrid, INITIAL_MULTIPLIER};
use crate::game::jackpot::JackpotTier;
use crate::game::spin::SpinOutcome;
use crate::network::protocol::{AckStatus, RoundResponse, TriggerSpinResponse};
use crate::proof::verify::{outcome_digest, ServedRound};

/// Which call opened the round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundKind {
    /// Base or free spin round.
    Spin,
    /// Bonus trigger spin; its award waits for activation.
    TriggerSpin,
}

/// Outcome received but not yet revealed.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingOutcome {
    /// Round identifier.
    pub round_id: String,
    /// Which call opened the round.
    pub kind: RoundKind,
    /// Nonce the round was played at.
    pub nonce: u64,
    /// Client seed sent.
    pub client_seed: String,
    /// Wager pays scale from.
    pub wager: Amount,
    /// Amount debited on submit.
    pub debited: Amount,
    /// Server balance right after the debit.
    pub balance_after_debit: Amount,
    /// Spot grid before the first event.
    pub starting_multipliers: MultiplierGrid,
    /// Full outcome.
    pub outcome: SpinOutcome,
}

impl PendingOutcome {
    pub(crate) fn from_round(
        response: RoundResponse,
        client_seed: &str,
        starting_multipliers: MultiplierGrid,
    ) -> Self {
        Self {
            round_id: response.round_id,
            kind: RoundKind::Spin,
            nonce: response.nonce,
            client_seed: client_seed.to_string(),
            wager: response.wager,
            debited: response.debited,
            balance_after_debit: response.balance,
            starting_multipliers,
            outcome: response.outcome,
        }
    }

    pub(crate) fn from_trigger(response: TriggerSpinResponse, client_seed: &str, wager: Amount) -> Self {
        Self {
            round_id: response.round_id,
            kind: RoundKind::TriggerSpin,
            nonce: response.nonce,
            client_seed: client_seed.to_string(),
            wager,
            debited: response.cost,
            balance_after_debit: response.balance,
            starting_multipliers: uniform_multipliers(INITIAL_MULTIPLIER),
            outcome: response.outcome,
        }
    }

    /// Number of events to acknowledge.
    pub fn event_count(&self) -> u32 {
        self.outcome.events.len() as u32
    }

    /// Event at `index`.
    pub fn event(&self, index: u32) -> Option<&RoundEvent> {
        self.outcome.events.get(index as usize)
    }

    /// Tumble steps. Safe to show before playback.
    pub fn tumble_count(&self) -> u32 {
        self.outcome.tumble_count
    }

    /// Highest spot multiplier. Safe to show before playback.
    pub fn max_multiplier(&self) -> u32 {
        self.outcome.max_multiplier
    }

    /// Entry for the client-side audit log.
    pub(crate) fn served(&self) -> ServedRound {
        ServedRound {
            round_id: self.round_id.clone(),
            nonce: self.nonce,
            client_seed: self.client_seed.clone(),
            wager: self.wager,
            outcome_digest: outcome_digest(&self.outcome.events),
            payout_multiplier: self.outcome.payout_multiplier,
            total_win: self.outcome.total_win,
        }
    }
}

/// One event the server accepted as played.
#[derive(Clone, Debug, PartialEq)]
pub struct AckedEvent {
    /// Event index.
    pub index: u32,
    /// The event.
    pub event: RoundEvent,
    /// Whether more events remain.
    pub status: AckStatus,
}

/// What a consumer may display during playback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleState {
    /// Balance shown.
    pub balance: Amount,
    /// Win shown for this round.
    pub round_win: Amount,
    /// Spot grid shown.
    pub multipliers: MultiplierGrid,
    /// Free spins revealed so far.
    pub free_spins_awarded: u32,
    /// Jackpot revealed, if any.
    pub jackpot: Option<JackpotTier>,
    kind: RoundKind,
    applied: u32,
}

impl VisibleState {
    /// State before the first event: the debit shows, nothing else does.
    pub fn begin(outcome: &PendingOutcome) -> Self {
        Self {
            balance: outcome.balance_after_debit,
            round_win: 0,
            multipliers: outcome.starting_multipliers,
            free_spins_awarded: 0,
            jackpot: None,
            kind: outcome.kind,
            applied: 0,
        }
    }

    /// Events applied so far.
    pub fn applied(&self) -> u32 {
        self.applied
    }

    /// Apply one acknowledged event. Events must arrive in index order.
    pub fn apply(&mut self, acked: &AckedEvent) -> Result<()> {
        if acked.index != self.applied {
            return Err(RgsError::OutOfOrderAcknowledgement(format!(
                "applying event {} but {} is next",
                acked.index, self.applied
            )));
        }

        let delta = acked.event.win_delta();
        self.balance += delta;
        self.round_win += delta;

        match &acked.event {
            RoundEvent::MultiplierUpgrade { position: (row, col), value } => {
                self.multipliers[*row][*col] = *value;
            }
            RoundEvent::WildExplosion { cells, .. } => {
                for cell in cells {
                    let (row, col) = cell.position;
                    self.multipliers[row][col] = cell.new_multiplier;
                }
            }
            RoundEvent::FreeSpinsTrigger { free_spins_awarded, .. } if self.kind == RoundKind::Spin => {
                self.free_spins_awarded += free_spins_awarded;
            }
            RoundEvent::JackpotWin { tier, .. } => self.jackpot = Some(*tier),
            _ => {}
        }

        self.applied += 1;
        Ok(())
    }
}
