//! Session State
//!
//! Client-side view of one RGS session. Owned by the caller and lent to a
//! `RoundExecutor` for the duration of each operation; nothing is global.

use tracing::warn;

use crate::core::money::Amount;
use crate::game::bonus::{FeatureActivated, NextRoundFeature};
use crate::game::grid::MultiplierGrid;
use crate::network::client::RgsClient;
use crate::network::protocol::SessionSnapshot;
use crate::proof::commitment::SeedCommitment;
use crate::proof::verify::ServedRound;
use crate::round::RoundPhase;
use crate::session::bet::BetConfig;

/// Whether a session is backed by a real wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    /// Live RGS session.
    Live,
    /// Non-persistent demo session. Balances are play money.
    Demo,
}

/// Running totals for the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Rounds ended.
    pub rounds_played: u64,
    /// Tumble steps across all rounds.
    pub total_tumbles: u64,
    /// Highest spot multiplier seen.
    pub max_multiplier: u32,
    /// Amount debited.
    pub total_debited: Amount,
    /// Amount credited.
    pub total_credited: Amount,
}

/// One RGS session.
#[derive(Clone, Debug)]
pub struct Session {
    /// Opaque session token.
    pub id: String,
    /// Live or demo.
    pub mode: SessionMode,
    /// Last authoritative balance.
    pub balance: Amount,
    /// Commitment to the server seed in use.
    pub commitment: SeedCommitment,
    /// Nonce the next round will use.
    pub nonce: u64,
    /// Wager limits.
    pub bet_config: BetConfig,
    /// Free spins left.
    pub free_spins_remaining: u32,
    /// Spot grid carried into the next free spin.
    pub multipliers: Option<MultiplierGrid>,
    /// Feature armed for the next base round.
    pub armed_feature: Option<FeatureActivated>,
    /// Content of the armed feature.
    pub armed_detail: Option<NextRoundFeature>,
    /// Free spins won by a trigger spin, awaiting activation.
    pub pending_free_spins: Option<u32>,
    /// Running totals.
    pub stats: SessionStats,
    pub(crate) phase: RoundPhase,
    pub(crate) served: Vec<ServedRound>,
    pub(crate) fairness_violation: Option<String>,
    pub(crate) client: RgsClient,
}

impl Session {
    pub(crate) fn from_snapshot(snapshot: SessionSnapshot, mode: SessionMode, client: RgsClient) -> Self {
        let mut session = Self {
            id: snapshot.session_id.clone(),
            mode,
            balance: 0,
            commitment: SeedCommitment::new(snapshot.server_seed_hash.clone()),
            nonce: 0,
            bet_config: snapshot.bet_config.clone(),
            free_spins_remaining: 0,
            multipliers: None,
            armed_feature: None,
            armed_detail: None,
            pending_free_spins: None,
            stats: SessionStats::default(),
            phase: RoundPhase::Idle,
            served: Vec::new(),
            fairness_violation: None,
            client,
        };
        session.reconcile(snapshot);
        session
    }

    /// Adopt the server's view. A changed commitment outside a rotation is
    /// logged; rounds served under the old one stay in the audit log.
    pub(crate) fn reconcile(&mut self, snapshot: SessionSnapshot) {
        if !snapshot
            .server_seed_hash
            .eq_ignore_ascii_case(&self.commitment.server_seed_hash)
        {
            warn!(
                "Session {} commitment changed outside rotation: {} -> {}",
                self.id, self.commitment.server_seed_hash, snapshot.server_seed_hash
            );
            self.commitment = SeedCommitment::new(snapshot.server_seed_hash);
        }
        if snapshot.armed_detail.is_some() {
            self.armed_detail = snapshot.armed_detail;
        } else if snapshot.armed_feature != self.armed_feature {
            self.armed_detail = None;
        }
        self.balance = snapshot.balance;
        self.nonce = snapshot.nonce;
        self.bet_config = snapshot.bet_config;
        self.free_spins_remaining = snapshot.free_spins_remaining;
        self.multipliers = snapshot.multipliers;
        self.armed_feature = snapshot.armed_feature;
        self.pending_free_spins = snapshot.pending_free_spins;
    }

    /// Whether this is a demo session.
    pub fn is_demo(&self) -> bool {
        self.mode == SessionMode::Demo
    }

    /// Current round phase.
    pub fn phase(&self) -> &RoundPhase {
        &self.phase
    }

    /// No round in flight.
    pub fn is_idle(&self) -> bool {
        self.phase.is_idle()
    }

    /// Rounds served under the current commitment.
    pub fn served_rounds(&self) -> &[ServedRound] {
        &self.served
    }

    /// Set once a reveal or audit failed. The session's history under the
    /// failed seed cannot be trusted.
    pub fn fairness_violation(&self) -> Option<&str> {
        self.fairness_violation.as_deref()
    }

    /// Client this session talks through.
    pub fn client(&self) -> &RgsClient {
        &self.client
    }
}
