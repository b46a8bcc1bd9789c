//! In-Process RGS
//!
//! `LocalRgs` serves the full wire contract from memory using the game
//! engine. It backs demo sessions, and tests drive it directly, with fault
//! injection standing in for a flaky network.
//!
//! Server-side rules enforced here:
//! - one open round per session; it closes only after every event is
//!   acknowledged in order and `end-round` is called
//! - wagers are debited on submit, wins credited on `end-round`
//! - keyed mutations, seed rotation included, are answered from a cache on replay
//! - a trigger spin's award stays pending until explicitly activated

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::hash::{fingerprint, generate_server_seed, hash_server_seed, Digest32, REQUEST_DOMAIN};
use crate::core::money::{format_amount, Amount, PayoutMultiplier, MONETARY_SCALE};
use crate::core::rng::ProvablyFairRng;
use crate::error::{Result, RgsError};
use crate::game::bonus::{find_bonus, FeatureActivated, FeatureEffect, NextRoundFeature, BONUS_OPTIONS};
use crate::game::grid::{MultiplierGrid, GRID_COLS, GRID_ROWS};
use crate::game::jackpot::JACKPOT_TIERS;
use crate::game::spin::{run_bonus_trigger_spin, run_spin, ModifierFlags, RoundMode, SpinOutcome, SpinParams};
use crate::game::symbols::{cluster_pay, ALL_SYMBOLS, MAX_PAY_SIZE, MIN_CLUSTER_SIZE};
use crate::network::protocol::{
    AckStatus, AcknowledgeEventRequest, AcknowledgeEventResponse, ActivateFreeSpinsResponse,
    BalanceResponse, BetHistoryRequest, BetHistoryResponse, BonusOptionInfo, BonusOptionsResponse,
    BonusRequest, BuyBonusResponse, EndRoundResponse, GameInfoResponse, JackpotInfoResponse,
    JackpotTierInfo, RotateSeedRequest, RotateSeedResponse, RoundInputs, RoundRecord, RoundResponse,
    SessionRequest, SessionSnapshot, SubmitRoundRequest, SymbolPays, TriggerSpinResponse,
};
use crate::network::transport::RgsTransport;
use crate::proof::verify::{detail_digest, outcome_digest};
use crate::session::bet::BetConfig;

/// Keyed responses remembered per session.
pub const IDEMPOTENCY_CACHE_SIZE: usize = 256;

/// Settled bets kept per session for the history endpoint.
pub const BET_LOG_SIZE: usize = 1_000;

/// Name served by `game/info`.
pub const GAME_NAME: &str = "LES WOLFS 86";

/// Configuration for a local RGS.
#[derive(Clone, Debug)]
pub struct LocalRgsConfig {
    /// Balance of new sessions.
    pub initial_balance: Amount,
    /// Wager limits of new sessions.
    pub bet_config: BetConfig,
    /// Sessions are flagged as demo.
    pub demo: bool,
}

impl Default for LocalRgsConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1_000 * MONETARY_SCALE,
            bet_config: BetConfig::default(),
            demo: false,
        }
    }
}

// =============================================================================
// FAULT INJECTION
// =============================================================================

#[derive(Debug, Default)]
struct Faults {
    offline: AtomicBool,
    catalog_offline: AtomicBool,
    fail_next: AtomicU32,
    drop_next_response: AtomicBool,
    corrupt_next_reveal: AtomicBool,
}

// =============================================================================
// SERVER SESSION
// =============================================================================

#[derive(Debug)]
struct OpenRound {
    round_id: String,
    event_count: u32,
    next_ack: u32,
    win: Amount,
}

#[derive(Debug)]
struct PendingAward {
    count: u32,
    multipliers: Option<MultiplierGrid>,
    wager: Amount,
}

#[derive(Debug)]
enum Cached {
    Round(RoundResponse),
    Purchase(BuyBonusResponse),
    Trigger(TriggerSpinResponse),
    Rotation(RotateSeedResponse),
}

#[derive(Debug)]
struct ServerSession {
    id: String,
    balance: Amount,
    server_seed: String,
    server_seed_hash: String,
    nonce: u64,
    bet_config: BetConfig,
    free_spins_remaining: u32,
    free_spin_wager: Amount,
    multipliers: Option<MultiplierGrid>,
    armed: Option<(FeatureActivated, NextRoundFeature)>,
    pending_award: Option<PendingAward>,
    open_round: Option<OpenRound>,
    history: Vec<RoundRecord>,
    bet_log: VecDeque<RoundRecord>,
    total_bets: usize,
    responses: BTreeMap<String, (Digest32, Cached)>,
    response_order: VecDeque<String>,
    demo: bool,
}

impl ServerSession {
    fn new(config: &LocalRgsConfig) -> Self {
        let server_seed = generate_server_seed();
        Self {
            id: Uuid::new_v4().to_string(),
            balance: config.initial_balance,
            server_seed_hash: hash_server_seed(&server_seed),
            server_seed,
            nonce: 0,
            bet_config: config.bet_config.clone(),
            free_spins_remaining: 0,
            free_spin_wager: 0,
            multipliers: None,
            armed: None,
            pending_award: None,
            open_round: None,
            history: Vec::new(),
            bet_log: VecDeque::new(),
            total_bets: 0,
            responses: BTreeMap::new(),
            response_order: VecDeque::new(),
            demo: config.demo,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            balance: self.balance,
            server_seed_hash: self.server_seed_hash.clone(),
            nonce: self.nonce,
            bet_config: self.bet_config.clone(),
            free_spins_remaining: self.free_spins_remaining,
            multipliers: self.multipliers,
            armed_feature: self.armed.as_ref().map(|(feature, _)| *feature),
            armed_detail: self.armed.as_ref().map(|(_, detail)| detail.clone()),
            pending_free_spins: self.pending_award.as_ref().map(|award| award.count),
            active_round_id: self.open_round.as_ref().map(|r| r.round_id.clone()),
            acknowledged_events: self.open_round.as_ref().map(|r| r.next_ack),
            demo: self.demo,
        }
    }

    /// Cached response for `key`, if the request matches the first use.
    fn replay(&self, key: &str, request_fingerprint: &Digest32) -> Result<Option<&Cached>> {
        match self.responses.get(key) {
            None => Ok(None),
            Some((seen, cached)) if seen == request_fingerprint => Ok(Some(cached)),
            Some(_) => Err(RgsError::InvalidRequest(format!(
                "idempotency key {} was already used for a different request",
                key
            ))),
        }
    }

    fn remember(&mut self, key: &str, request_fingerprint: Digest32, response: Cached) {
        if self.response_order.len() >= IDEMPOTENCY_CACHE_SIZE {
            if let Some(oldest) = self.response_order.pop_front() {
                self.responses.remove(&oldest);
            }
        }
        self.response_order.push_back(key.to_string());
        self.responses.insert(key.to_string(), (request_fingerprint, response));
    }

    fn ensure_no_open_round(&self) -> Result<()> {
        match &self.open_round {
            Some(round) => Err(RgsError::RoundInProgress(format!(
                "round {} has {} of {} events acknowledged",
                round.round_id, round.next_ack, round.event_count
            ))),
            None => Ok(()),
        }
    }

    fn ensure_no_bonus_state(&self) -> Result<()> {
        if self.free_spins_remaining > 0 {
            return Err(RgsError::InvalidRequest(format!(
                "{} free spins must be played first",
                self.free_spins_remaining
            )));
        }
        if self.pending_award.is_some() {
            return Err(RgsError::InvalidRequest("a free spin award is awaiting activation".to_string()));
        }
        Ok(())
    }

    fn debit(&mut self, amount: Amount) -> Result<()> {
        if amount > self.balance {
            return Err(RgsError::InsufficientBalance(format!(
                "balance {} does not cover {}",
                format_amount(self.balance),
                format_amount(amount)
            )));
        }
        self.balance -= amount;
        Ok(())
    }

    fn open(&mut self, round_id: &str, outcome: &SpinOutcome) {
        self.open_round = Some(OpenRound {
            round_id: round_id.to_string(),
            event_count: outcome.events.len() as u32,
            next_ack: 0,
            win: outcome.total_win,
        });
    }

    fn record(&mut self, round_id: &str, client_seed: &str, wager: Amount, inputs: RoundInputs, outcome: Option<&SpinOutcome>) {
        let (payout_multiplier, total_win, event_count, digest) = match (outcome, &inputs) {
            (Some(o), _) => (o.payout_multiplier, o.total_win, o.events.len(), outcome_digest(&o.events)),
            (None, RoundInputs::Purchase { detail, .. }) => (Default::default(), 0, 0, detail_digest(detail)),
            (None, _) => (Default::default(), 0, 0, outcome_digest(&[])),
        };
        let record = RoundRecord {
            round_id: round_id.to_string(),
            nonce: self.nonce,
            client_seed: client_seed.to_string(),
            wager,
            inputs,
            payout_multiplier,
            total_win,
            event_count,
            outcome_digest: digest,
            played_at: Utc::now(),
        };
        if self.bet_log.len() >= BET_LOG_SIZE {
            self.bet_log.pop_front();
        }
        self.bet_log.push_back(record.clone());
        self.total_bets += 1;
        self.history.push(record);
    }
}

// =============================================================================
// LOCAL RGS
// =============================================================================

/// In-memory RGS.
pub struct LocalRgs {
    config: LocalRgsConfig,
    sessions: RwLock<BTreeMap<String, Arc<RwLock<ServerSession>>>>,
    faults: Faults,
}

impl std::fmt::Debug for LocalRgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRgs")
            .field("config", &self.config)
            .field("faults", &self.faults)
            .finish_non_exhaustive()
    }
}

impl Default for LocalRgs {
    fn default() -> Self {
        Self::new(LocalRgsConfig::default())
    }
}

impl LocalRgs {
    /// Create a local RGS.
    pub fn new(config: LocalRgsConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(BTreeMap::new()),
            faults: Faults::default(),
        }
    }

    /// Demo RGS: default bet limits, sessions flagged non-persistent.
    pub fn demo(initial_balance: Amount) -> Self {
        Self::new(LocalRgsConfig {
            initial_balance,
            bet_config: BetConfig::default(),
            demo: true,
        })
    }

    /// Whether sessions from this RGS are demo sessions.
    pub fn is_demo(&self) -> bool {
        self.config.demo
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Overwrite a session balance.
    pub async fn set_balance(&self, session_id: &str, balance: Amount) -> Result<()> {
        let session = self.session(session_id).await?;
        session.write().await.balance = balance;
        Ok(())
    }

    /// Make every call fail as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.faults.offline.store(offline, Ordering::SeqCst);
    }

    /// Make only the bonus catalog and jackpot endpoints fail.
    pub fn set_catalog_offline(&self, offline: bool) {
        self.faults.catalog_offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `count` calls before they reach any session.
    pub fn fail_next_calls(&self, count: u32) {
        self.faults.fail_next.store(count, Ordering::SeqCst);
    }

    /// Commit the next call but lose its response.
    pub fn drop_next_response(&self) {
        self.faults.drop_next_response.store(true, Ordering::SeqCst);
    }

    /// Reveal a wrong seed on the next rotation.
    pub fn corrupt_next_reveal(&self) {
        self.faults.corrupt_next_reveal.store(true, Ordering::SeqCst);
    }

    async fn session(&self, id: &str) -> Result<Arc<RwLock<ServerSession>>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RgsError::SessionNotFound(format!("unknown session {}", id)))
    }

    fn check_faults(&self, op: &str) -> Result<()> {
        if self.faults.offline.load(Ordering::SeqCst) {
            return Err(RgsError::Network(format!("RGS unreachable ({})", op)));
        }
        let injected = self
            .faults
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(RgsError::Network(format!("injected failure on {}", op)));
        }
        Ok(())
    }

    fn deliver<T>(&self, op: &str, response: T) -> Result<T> {
        if self.faults.drop_next_response.swap(false, Ordering::SeqCst) {
            warn!("Dropping committed {} response", op);
            return Err(RgsError::Network(format!("connection reset after {}", op)));
        }
        Ok(response)
    }
}

fn request_fingerprint<T: serde::Serialize>(op: &str, request: &T) -> Digest32 {
    fingerprint(REQUEST_DOMAIN, &(op, request)).unwrap_or_default()
}

impl RgsTransport for LocalRgs {
    async fn create_session(&self) -> Result<SessionSnapshot> {
        self.check_faults("create_session")?;
        let session = ServerSession::new(&self.config);
        let snapshot = session.snapshot();
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), Arc::new(RwLock::new(session)));
        info!("Created {} session {}", if self.config.demo { "demo" } else { "local" }, snapshot.session_id);
        Ok(snapshot)
    }

    async fn get_session(&self, request: &SessionRequest) -> Result<SessionSnapshot> {
        self.check_faults("get_session")?;
        let session = self.session(&request.session_id).await?;
        let snapshot = session.read().await.snapshot();
        Ok(snapshot)
    }

    async fn balance(&self, request: &SessionRequest) -> Result<BalanceResponse> {
        self.check_faults("balance")?;
        let session = self.session(&request.session_id).await?;
        let session = session.read().await;
        Ok(BalanceResponse {
            balance: session.balance,
            currency: session.bet_config.currency.clone(),
        })
    }

    async fn submit_round(&self, request: &SubmitRoundRequest) -> Result<RoundResponse> {
        self.check_faults("submit_round")?;
        let session = self.session(&request.session_id).await?;
        let mut session = session.write().await;

        let request_fp = request_fingerprint("submit_round", request);
        if let Some(cached) = session.replay(&request.idempotency_key, &request_fp)? {
            return match cached {
                Cached::Round(response) => {
                    debug!("Replaying round {} for key {}", response.round_id, request.idempotency_key);
                    self.deliver("submit_round", response.clone())
                }
                _ => Err(RgsError::InvalidRequest("idempotency key belongs to another operation".to_string())),
            };
        }
        session.ensure_no_open_round()?;

        let (wager, debit, params) = match request.mode {
            RoundMode::FreeSpin => {
                if session.free_spins_remaining == 0 {
                    return Err(RgsError::InvalidRequest("no free spins remaining".to_string()));
                }
                let wager = session.free_spin_wager;
                let params = SpinParams {
                    server_seed: session.server_seed.clone(),
                    client_seed: request.client_seed.clone(),
                    nonce: session.nonce,
                    wager,
                    mode: RoundMode::FreeSpin,
                    modifiers: ModifierFlags::default(),
                    free_spins_remaining: session.free_spins_remaining,
                    carried_multipliers: session.multipliers,
                    feature: None,
                };
                (wager, 0, params)
            }
            RoundMode::Base => {
                session.ensure_no_bonus_state()?;
                session.bet_config.validate(request.wager)?;
                let debit = request.wager * request.modifier_flags.wager_factor();
                let params = SpinParams {
                    server_seed: session.server_seed.clone(),
                    client_seed: request.client_seed.clone(),
                    nonce: session.nonce,
                    wager: request.wager,
                    mode: RoundMode::Base,
                    modifiers: request.modifier_flags,
                    free_spins_remaining: 0,
                    carried_multipliers: None,
                    feature: session.armed.as_ref().map(|(_, feature)| feature.clone()),
                };
                (request.wager, debit, params)
            }
        };

        let outcome = run_spin(&params)?;
        session.debit(debit)?;

        let round_id = Uuid::new_v4().to_string();
        #[cfg(feature = "debug-tracing")]
        for (index, event) in outcome.events.iter().enumerate() {
            tracing::trace!("round {} event {} {}", round_id, index, event.kind());
        }

        // Free spin bookkeeping is settled at play time.
        match request.mode {
            RoundMode::FreeSpin => {
                session.free_spins_remaining = outcome.free_spins_remaining;
                session.multipliers = (outcome.free_spins_remaining > 0).then_some(outcome.final_multipliers);
            }
            RoundMode::Base => {
                session.armed = None;
                if outcome.free_spins_triggered > 0 {
                    session.free_spins_remaining = outcome.free_spins_triggered;
                    session.free_spin_wager = wager;
                    session.multipliers = None;
                }
            }
        }

        let inputs = RoundInputs::Spin {
            mode: params.mode,
            modifiers: params.modifiers,
            free_spins_remaining: params.free_spins_remaining,
            carried_multipliers: params.carried_multipliers,
            feature: params.feature.clone(),
        };
        session.record(&round_id, &request.client_seed, wager, inputs, Some(&outcome));
        session.open(&round_id, &outcome);

        let response = RoundResponse {
            round_id,
            balance: session.balance,
            debited: debit,
            wager,
            nonce: session.nonce,
            server_seed_hash: session.server_seed_hash.clone(),
            outcome,
        };
        session.nonce += 1;
        session.remember(&request.idempotency_key, request_fp, Cached::Round(response.clone()));

        debug!(
            "Round {} nonce {} debited {} pays {}",
            response.round_id,
            response.nonce,
            format_amount(debit),
            response.outcome.payout_multiplier
        );
        self.deliver("submit_round", response)
    }

    async fn acknowledge_event(&self, request: &AcknowledgeEventRequest) -> Result<AcknowledgeEventResponse> {
        self.check_faults("acknowledge_event")?;
        let session = self.session(&request.session_id).await?;
        let mut session = session.write().await;

        let round = session.open_round.as_mut().ok_or_else(|| {
            RgsError::OutOfOrderAcknowledgement(format!("event {} acknowledged with no open round", request.event_index))
        })?;
        if request.event_index != round.next_ack {
            return Err(RgsError::OutOfOrderAcknowledgement(format!(
                "expected event {}, got {}",
                round.next_ack, request.event_index
            )));
        }
        round.next_ack += 1;
        let status = if round.next_ack == round.event_count {
            AckStatus::Complete
        } else {
            AckStatus::Acknowledged
        };
        self.deliver("acknowledge_event", AcknowledgeEventResponse { status, event_index: request.event_index })
    }

    async fn end_round(&self, request: &SessionRequest) -> Result<EndRoundResponse> {
        self.check_faults("end_round")?;
        let session = self.session(&request.session_id).await?;
        let mut session = session.write().await;

        let Some(round) = session.open_round.as_ref() else {
            return Ok(EndRoundResponse {
                balance: session.balance,
                round_id: None,
                credited: 0,
                free_spins_remaining: session.free_spins_remaining,
            });
        };
        if round.next_ack < round.event_count {
            return Err(RgsError::EventsPending(format!(
                "round {} has {} unacknowledged events",
                round.round_id,
                round.event_count - round.next_ack
            )));
        }

        let win = round.win;
        let round_id = round.round_id.clone();
        session.open_round = None;
        session.balance += win;
        debug!("Round {} ended, credited {}", round_id, format_amount(win));

        let response = EndRoundResponse {
            balance: session.balance,
            round_id: Some(round_id),
            credited: win,
            free_spins_remaining: session.free_spins_remaining,
        };
        self.deliver("end_round", response)
    }

    async fn rotate_seed(&self, request: &RotateSeedRequest) -> Result<RotateSeedResponse> {
        self.check_faults("rotate_seed")?;
        let session = self.session(&request.session_id).await?;
        let mut session = session.write().await;

        let request_fp = request_fingerprint("rotate_seed", request);
        if let Some(cached) = session.replay(&request.idempotency_key, &request_fp)? {
            return match cached {
                Cached::Rotation(response) => {
                    debug!("Replaying seed reveal for key {}", request.idempotency_key);
                    self.deliver("rotate_seed", response.clone())
                }
                _ => Err(RgsError::InvalidRequest("idempotency key belongs to another operation".to_string())),
            };
        }
        session.ensure_no_open_round()?;

        let mut revealed = std::mem::replace(&mut session.server_seed, generate_server_seed());
        let previous_hash = std::mem::take(&mut session.server_seed_hash);
        session.server_seed_hash = hash_server_seed(&session.server_seed);
        session.nonce = 0;
        let rounds = std::mem::take(&mut session.history);

        if self.faults.corrupt_next_reveal.swap(false, Ordering::SeqCst) {
            warn!("Corrupting revealed seed for session {}", session.id);
            revealed = generate_server_seed();
        }

        let response = RotateSeedResponse {
            revealed_server_seed: revealed,
            previous_server_seed_hash: previous_hash,
            new_server_seed_hash: session.server_seed_hash.clone(),
            rounds,
        };
        session.remember(&request.idempotency_key, request_fp, Cached::Rotation(response.clone()));

        info!("Rotated seed for session {} after {} rounds", session.id, response.rounds.len());
        self.deliver("rotate_seed", response)
    }

    async fn buy_bonus(&self, request: &BonusRequest) -> Result<BuyBonusResponse> {
        self.check_faults("buy_bonus")?;
        let session = self.session(&request.session_id).await?;
        let mut session = session.write().await;

        let request_fp = request_fingerprint("buy_bonus", request);
        if let Some(cached) = session.replay(&request.idempotency_key, &request_fp)? {
            return match cached {
                Cached::Purchase(response) => self.deliver("buy_bonus", response.clone()),
                _ => Err(RgsError::InvalidRequest("idempotency key belongs to another operation".to_string())),
            };
        }
        session.ensure_no_open_round()?;

        let option = find_bonus(&request.bonus_id)
            .ok_or_else(|| RgsError::BonusNotFound(request.bonus_id.clone()))?;
        session.ensure_no_bonus_state()?;
        if let Some((armed, _)) = &session.armed {
            return Err(RgsError::InvalidRequest(format!(
                "{} is already armed for the next round",
                armed.as_str()
            )));
        }
        session.bet_config.validate(request.wager)?;

        let cost = option.cost(request.wager);
        let mut rng = ProvablyFairRng::new(&session.server_seed, &request.client_seed, session.nonce)?;
        let detail = option.feature.derive_detail(&mut rng);
        session.debit(cost)?;

        match option.feature.effect(&detail) {
            FeatureEffect::FreeSpins { count, multipliers } => {
                session.free_spins_remaining = count;
                session.free_spin_wager = request.wager;
                session.multipliers = multipliers;
            }
            FeatureEffect::NextRound(feature) => {
                session.armed = Some((option.feature, feature));
            }
        }

        let round_id = Uuid::new_v4().to_string();
        let inputs = RoundInputs::Purchase { feature: option.feature, detail: detail.clone() };
        session.record(&round_id, &request.client_seed, request.wager, inputs, None);

        let response = BuyBonusResponse {
            round_id,
            balance: session.balance,
            cost,
            nonce: session.nonce,
            feature_activated: option.feature,
            feature_detail: detail,
        };
        session.nonce += 1;
        session.remember(&request.idempotency_key, request_fp, Cached::Purchase(response.clone()));

        info!("Session {} bought {} for {}", session.id, option.id, format_amount(cost));
        self.deliver("buy_bonus", response)
    }

    async fn bonus_trigger_spin(&self, request: &BonusRequest) -> Result<TriggerSpinResponse> {
        self.check_faults("bonus_trigger_spin")?;
        let session = self.session(&request.session_id).await?;
        let mut session = session.write().await;

        let request_fp = request_fingerprint("bonus_trigger_spin", request);
        if let Some(cached) = session.replay(&request.idempotency_key, &request_fp)? {
            return match cached {
                Cached::Trigger(response) => self.deliver("bonus_trigger_spin", response.clone()),
                _ => Err(RgsError::InvalidRequest("idempotency key belongs to another operation".to_string())),
            };
        }
        session.ensure_no_open_round()?;

        let option = find_bonus(&request.bonus_id)
            .ok_or_else(|| RgsError::BonusNotFound(request.bonus_id.clone()))?;
        let (scatter_count, free_spins) = option.trigger().ok_or_else(|| {
            RgsError::InvalidRequest(format!("bonus {} has no trigger spin", option.id))
        })?;
        session.ensure_no_bonus_state()?;
        session.bet_config.validate(request.wager)?;

        let cost = option.cost(request.wager);
        let outcome = run_bonus_trigger_spin(
            &session.server_seed,
            &request.client_seed,
            session.nonce,
            scatter_count as usize,
            free_spins,
        )?;
        session.debit(cost)?;

        let multipliers = match option.feature.effect(&Default::default()) {
            FeatureEffect::FreeSpins { multipliers, .. } => multipliers,
            FeatureEffect::NextRound(_) => None,
        };
        session.pending_award = Some(PendingAward { count: free_spins, multipliers, wager: request.wager });

        let round_id = Uuid::new_v4().to_string();
        let inputs = RoundInputs::TriggerSpin { scatter_count, free_spins };
        session.record(&round_id, &request.client_seed, request.wager, inputs, Some(&outcome));
        session.open(&round_id, &outcome);

        let response = TriggerSpinResponse {
            round_id,
            balance: session.balance,
            cost,
            nonce: session.nonce,
            scatter_count,
            server_seed_hash: session.server_seed_hash.clone(),
            outcome,
        };
        session.nonce += 1;
        session.remember(&request.idempotency_key, request_fp, Cached::Trigger(response.clone()));

        info!(
            "Session {} trigger spin {} landed {} scatters, {} free spins pending",
            session.id, option.id, scatter_count, free_spins
        );
        self.deliver("bonus_trigger_spin", response)
    }

    async fn activate_free_spins(&self, request: &SessionRequest) -> Result<ActivateFreeSpinsResponse> {
        self.check_faults("activate_free_spins")?;
        let session = self.session(&request.session_id).await?;
        let mut session = session.write().await;
        session.ensure_no_open_round()?;

        let award = session
            .pending_award
            .take()
            .ok_or_else(|| RgsError::InvalidRequest("no free spin award is pending".to_string()))?;
        session.free_spins_remaining = award.count;
        session.free_spin_wager = award.wager;
        session.multipliers = award.multipliers;

        info!("Session {} activated {} free spins", session.id, award.count);
        Ok(ActivateFreeSpinsResponse {
            free_spins_remaining: session.free_spins_remaining,
            multipliers: session.multipliers,
            balance: session.balance,
        })
    }

    async fn bonus_options(&self) -> Result<BonusOptionsResponse> {
        self.check_faults("bonus_options")?;
        if self.faults.catalog_offline.load(Ordering::SeqCst) {
            return Err(RgsError::Network("bonus catalog unavailable".to_string()));
        }
        Ok(BonusOptionsResponse {
            options: BONUS_OPTIONS.iter().map(BonusOptionInfo::from).collect(),
        })
    }

    async fn jackpot_info(&self) -> Result<JackpotInfoResponse> {
        self.check_faults("jackpot_info")?;
        if self.faults.catalog_offline.load(Ordering::SeqCst) {
            return Err(RgsError::Network("jackpot service unavailable".to_string()));
        }
        Ok(JackpotInfoResponse {
            tiers: JACKPOT_TIERS.iter().map(JackpotTierInfo::from).collect(),
        })
    }

    async fn bet_history(&self, request: &BetHistoryRequest) -> Result<BetHistoryResponse> {
        self.check_faults("bet_history")?;
        let session = self.session(&request.session_id).await?;
        let session = session.read().await;
        Ok(BetHistoryResponse {
            session_id: session.id.clone(),
            total_bets: session.total_bets,
            history: session.bet_log.iter().rev().take(request.limit).cloned().collect(),
        })
    }

    async fn game_info(&self) -> Result<GameInfoResponse> {
        self.check_faults("game_info")?;
        if self.faults.catalog_offline.load(Ordering::SeqCst) {
            return Err(RgsError::Network("game catalog unavailable".to_string()));
        }
        let paytable = ALL_SYMBOLS
            .iter()
            .filter(|symbol| cluster_pay(**symbol, MIN_CLUSTER_SIZE) > PayoutMultiplier::ZERO)
            .map(|symbol| SymbolPays {
                symbol: symbol.code().to_string(),
                pays: (MIN_CLUSTER_SIZE..=MAX_PAY_SIZE)
                    .map(|size| (size, cluster_pay(*symbol, size)))
                    .collect(),
            })
            .collect();
        Ok(GameInfoResponse {
            name: GAME_NAME.to_string(),
            version: crate::VERSION.to_string(),
            grid_rows: GRID_ROWS,
            grid_cols: GRID_COLS,
            min_cluster_size: MIN_CLUSTER_SIZE,
            bet_config: self.config.bet_config.clone(),
            paytable,
            bonus_options: BONUS_OPTIONS.iter().map(BonusOptionInfo::from).collect(),
            jackpot_tiers: JACKPOT_TIERS.iter().map(JackpotTierInfo::from).collect(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(session_id: &str, key: &str) -> SubmitRoundRequest {
        SubmitRoundRequest {
            session_id: session_id.to_string(),
            wager: MONETARY_SCALE,
            client_seed: "client".to_string(),
            mode: RoundMode::Base,
            modifier_flags: ModifierFlags::default(),
            idempotency_key: key.to_string(),
        }
    }

    fn session_request(session_id: &str) -> SessionRequest {
        SessionRequest { session_id: session_id.to_string() }
    }

    fn rotate(session_id: &str, key: &str) -> RotateSeedRequest {
        RotateSeedRequest { session_id: session_id.to_string(), idempotency_key: key.to_string() }
    }

    async fn finish(rgs: &LocalRgs, session_id: &str, events: usize) {
        for index in 0..events {
            rgs.acknowledge_event(&AcknowledgeEventRequest {
                session_id: session_id.to_string(),
                event_index: index as u32,
            })
            .await
            .unwrap();
        }
        rgs.end_round(&session_request(session_id)).await.unwrap();
    }

    #[tokio::test]
    async fn test_debit_on_submit_credit_on_end() {
        let rgs = LocalRgs::default();
        let snapshot = rgs.create_session().await.unwrap();
        let response = rgs.submit_round(&submit(&snapshot.session_id, "k1")).await.unwrap();
        assert_eq!(response.balance, snapshot.balance - MONETARY_SCALE);
        assert_eq!(response.nonce, 0);

        finish(&rgs, &snapshot.session_id, response.outcome.events.len()).await;
        let balance = rgs.balance(&session_request(&snapshot.session_id)).await.unwrap();
        assert_eq!(balance.balance, response.balance + response.outcome.total_win);
    }

    #[tokio::test]
    async fn test_replay_returns_cached_response() {
        let rgs = LocalRgs::default();
        let snapshot = rgs.create_session().await.unwrap();
        let request = submit(&snapshot.session_id, "same-key");
        let first = rgs.submit_round(&request).await.unwrap();
        let second = rgs.submit_round(&request).await.unwrap();
        assert_eq!(first, second);

        let mut changed = request.clone();
        changed.wager = 2 * MONETARY_SCALE;
        assert!(matches!(rgs.submit_round(&changed).await, Err(RgsError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_second_round_rejected_while_open() {
        let rgs = LocalRgs::default();
        let snapshot = rgs.create_session().await.unwrap();
        rgs.submit_round(&submit(&snapshot.session_id, "a")).await.unwrap();
        let err = rgs.submit_round(&submit(&snapshot.session_id, "b")).await.unwrap_err();
        assert!(matches!(err, RgsError::RoundInProgress(_)));
        let err = rgs.end_round(&session_request(&snapshot.session_id)).await.unwrap_err();
        assert!(matches!(err, RgsError::EventsPending(_)));
    }

    #[tokio::test]
    async fn test_rotation_reveals_and_resets_nonce() {
        let rgs = LocalRgs::default();
        let snapshot = rgs.create_session().await.unwrap();
        let response = rgs.submit_round(&submit(&snapshot.session_id, "r")).await.unwrap();
        finish(&rgs, &snapshot.session_id, response.outcome.events.len()).await;

        let rotated = rgs.rotate_seed(&rotate(&snapshot.session_id, "rot")).await.unwrap();
        assert_eq!(hash_server_seed(&rotated.revealed_server_seed), snapshot.server_seed_hash);
        assert_eq!(rotated.previous_server_seed_hash, snapshot.server_seed_hash);
        assert_eq!(rotated.rounds.len(), 1);

        let after = rgs.get_session(&session_request(&snapshot.session_id)).await.unwrap();
        assert_eq!(after.nonce, 0);
        assert_eq!(after.server_seed_hash, rotated.new_server_seed_hash);
    }

    #[tokio::test]
    async fn test_rotation_replay_returns_first_reveal() {
        let rgs = LocalRgs::default();
        let snapshot = rgs.create_session().await.unwrap();

        rgs.drop_next_response();
        assert!(rgs.rotate_seed(&rotate(&snapshot.session_id, "rot")).await.unwrap_err().is_retryable());
        let replayed = rgs.rotate_seed(&rotate(&snapshot.session_id, "rot")).await.unwrap();
        assert_eq!(replayed.previous_server_seed_hash, snapshot.server_seed_hash);

        let after = rgs.get_session(&session_request(&snapshot.session_id)).await.unwrap();
        assert_eq!(after.server_seed_hash, replayed.new_server_seed_hash);
    }

    #[tokio::test]
    async fn test_snapshot_reports_ack_progress() {
        let rgs = LocalRgs::default();
        let snapshot = rgs.create_session().await.unwrap();
        assert_eq!(snapshot.acknowledged_events, None);

        let response = rgs.submit_round(&submit(&snapshot.session_id, "k")).await.unwrap();
        rgs.drop_next_response();
        let ack = AcknowledgeEventRequest { session_id: snapshot.session_id.clone(), event_index: 0 };
        assert!(rgs.acknowledge_event(&ack).await.unwrap_err().is_retryable());

        let open = rgs.get_session(&session_request(&snapshot.session_id)).await.unwrap();
        assert_eq!(open.active_round_id.as_deref(), Some(response.round_id.as_str()));
        assert_eq!(open.acknowledged_events, Some(1));
    }

    #[tokio::test]
    async fn test_bet_history_newest_first_across_rotation() {
        let rgs = LocalRgs::default();
        let snapshot = rgs.create_session().await.unwrap();
        let mut round_ids = Vec::new();
        for key in ["a", "b", "c"] {
            let response = rgs.submit_round(&submit(&snapshot.session_id, key)).await.unwrap();
            finish(&rgs, &snapshot.session_id, response.outcome.events.len()).await;
            round_ids.push(response.round_id);
            if key == "b" {
                rgs.rotate_seed(&rotate(&snapshot.session_id, "rot")).await.unwrap();
            }
        }

        let request = BetHistoryRequest { session_id: snapshot.session_id.clone(), limit: 2 };
        let page = rgs.bet_history(&request).await.unwrap();
        assert_eq!(page.total_bets, 3);
        let ids: Vec<_> = page.history.iter().map(|r| r.round_id.clone()).collect();
        assert_eq!(ids, vec![round_ids[2].clone(), round_ids[1].clone()]);
    }

    #[tokio::test]
    async fn test_game_info_paytable() {
        let rgs = LocalRgs::default();
        let info = rgs.game_info().await.unwrap();
        assert_eq!((info.grid_rows, info.grid_cols), (GRID_ROWS, GRID_COLS));
        assert_eq!(info.paytable.len(), ALL_SYMBOLS.len() - 1);
        assert!(info.paytable.iter().all(|entry| entry.symbol != "SC"));
        assert!(info
            .paytable
            .iter()
            .all(|entry| entry.pays.len() == MAX_PAY_SIZE - MIN_CLUSTER_SIZE + 1));
        assert_eq!(info.bonus_options.len(), BONUS_OPTIONS.len());

        rgs.set_catalog_offline(true);
        assert!(rgs.game_info().await.is_err());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let rgs = LocalRgs::default();
        rgs.fail_next_calls(1);
        assert!(rgs.create_session().await.unwrap_err().is_retryable());
        assert!(rgs.create_session().await.is_ok());

        rgs.set_catalog_offline(true);
        assert!(rgs.bonus_options().await.is_err());
        assert!(rgs.create_session().await.is_ok());

        let err = rgs.get_session(&session_request("missing")).await.unwrap_err();
        assert!(err.is_terminal());
    }
}
