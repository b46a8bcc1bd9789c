//! Round Lifecycle
//!
//! ```text
//!   Idle ──submit──▶ Submitted ──response──▶ OutcomeReceived
//!    ▲                   │ (transport failure: keep key, resume)
//!    │                   ▼
//!    └──end_round── Acknowledged ◀──last ack── OutcomeReceived
//! ```
//!
//! One round per session at a time. Events are acknowledged strictly in
//! order and the win is credited only by `end_round`.

pub mod executor;
pub mod outcome;

pub use executor::{BonusPurchase, Resumed, RoundExecutor, RoundSettlement, TriggerSpin};
pub use outcome::{AckedEvent, PendingOutcome, RoundKind, VisibleState};

use crate::core::money::Amount;
use crate::game::spin::{ModifierFlags, RoundMode};
use crate::network::protocol::{BonusRequest, SubmitRoundRequest};

/// Inputs the player chooses for a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundRequest {
    /// Base wager (fixed-point).
    pub wager: Amount,
    /// Client seed.
    pub client_seed: String,
    /// Boost toggles.
    pub modifiers: ModifierFlags,
    /// Base or free spin.
    pub mode: RoundMode,
}

impl RoundRequest {
    /// Plain base round.
    pub fn base(wager: Amount, client_seed: impl Into<String>) -> Self {
        Self {
            wager,
            client_seed: client_seed.into(),
            modifiers: ModifierFlags::default(),
            mode: RoundMode::Base,
        }
    }

    /// Free spin round. The server plays it at the wager that won the spins.
    pub fn free_spin(wager: Amount, client_seed: impl Into<String>) -> Self {
        Self {
            mode: RoundMode::FreeSpin,
            ..Self::base(wager, client_seed)
        }
    }

    /// With boost toggles.
    pub fn with_modifiers(mut self, modifiers: ModifierFlags) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Keyed request whose response never arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingSubmission {
    /// Base or free spin round.
    Round(SubmitRoundRequest),
    /// Bonus purchase.
    Purchase(BonusRequest),
    /// Bonus trigger spin.
    TriggerSpin(BonusRequest),
}

impl PendingSubmission {
    /// Idempotency key that will be replayed.
    pub fn idempotency_key(&self) -> &str {
        match self {
            PendingSubmission::Round(request) => &request.idempotency_key,
            PendingSubmission::Purchase(request) | PendingSubmission::TriggerSpin(request) => {
                &request.idempotency_key
            }
        }
    }
}

/// Where the session's current round stands.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RoundPhase {
    /// No round in flight.
    #[default]
    Idle,
    /// Request sent, response lost; resume with the same key.
    Submitted(PendingSubmission),
    /// Outcome held; `acknowledged` events played so far.
    OutcomeReceived {
        /// The outcome.
        outcome: Box<PendingOutcome>,
        /// Events acknowledged.
        acknowledged: u32,
    },
    /// Every event acknowledged; waiting for `end_round`.
    Acknowledged {
        /// The outcome.
        outcome: Box<PendingOutcome>,
    },
}

impl RoundPhase {
    /// No round in flight.
    pub fn is_idle(&self) -> bool {
        matches!(self, RoundPhase::Idle)
    }

    /// Outcome of the round in flight.
    pub fn outcome(&self) -> Option<&PendingOutcome> {
        match self {
            RoundPhase::OutcomeReceived { outcome, .. } | RoundPhase::Acknowledged { outcome } => Some(&**outcome),
            _ => None,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            RoundPhase::Idle => "idle",
            RoundPhase::Submitted(_) => "submitted",
            RoundPhase::OutcomeReceived { .. } => "outcome_received",
            RoundPhase::Acknowledged { .. } => "acknowledged",
        }
    }
}
