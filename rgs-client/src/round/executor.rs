//! Round Executor
//!
//! Drives one round at a time on a borrowed `Session`. The outcome arrives
//! in one response; the executor keeps it pending, relays acknowledgements
//! in order, and settles the balance only when the round ends.

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::money::{format_amount, Amount};
use crate::error::{Result, RgsError};
use crate::game::bonus::{FeatureActivated, FeatureEffect};
use crate::game::events::RoundEvent;
use crate::game::grid::{uniform_multipliers, MultiplierGrid, INITIAL_MULTIPLIER};
use crate::game::spin::RoundMode;
use crate::network::protocol::{AckStatus, BonusRequest, BuyBonusResponse, SessionSnapshot, SubmitRoundRequest};
use crate::proof::verify::{detail_digest, ServedRound};
use crate::round::outcome::{AckedEvent, PendingOutcome, RoundKind};
use crate::round::{PendingSubmission, RoundPhase, RoundRequest};
use crate::session::state::Session;

/// A completed bonus purchase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BonusPurchase {
    /// Purchase identifier.
    pub round_id: String,
    /// Feature switched on.
    pub feature: FeatureActivated,
    /// What was applied to the session.
    pub effect: FeatureEffect,
    /// Price paid.
    pub cost: Amount,
    /// Balance after the purchase.
    pub balance: Amount,
}

/// A trigger spin awaiting playback. Its free spins are not active yet.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerSpin {
    /// Scatters forced onto the grid.
    pub scatter_count: u32,
    /// Free spins that activation will grant.
    pub free_spins_triggered: u32,
    /// Price paid.
    pub cost: Amount,
    /// Round to play back and end.
    pub outcome: PendingOutcome,
}

/// Result of `end_round`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundSettlement {
    /// Round closed; `None` when nothing was open.
    pub round_id: Option<String>,
    /// Win credited.
    pub credited: Amount,
    /// Authoritative balance.
    pub balance: Amount,
    /// Free spins left.
    pub free_spins_remaining: u32,
}

/// Response to a resumed submission.
#[derive(Clone, Debug, PartialEq)]
pub enum Resumed {
    /// Round outcome.
    Round(PendingOutcome),
    /// Bonus purchase.
    Purchase(BonusPurchase),
    /// Trigger spin.
    TriggerSpin(TriggerSpin),
}

/// Round state machine over one session.
#[derive(Debug)]
pub struct RoundExecutor<'s> {
    session: &'s mut Session,
}

impl<'s> RoundExecutor<'s> {
    /// Executor for `session`.
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// The session.
    pub fn session(&self) -> &Session {
        &*self.session
    }

    /// Current phase.
    pub fn phase(&self) -> &RoundPhase {
        &self.session.phase
    }

    fn ensure_idle(&self) -> Result<()> {
        match &self.session.phase {
            RoundPhase::Idle => Ok(()),
            RoundPhase::Submitted(pending) => Err(RgsError::RoundInProgress(format!(
                "request {} has no response yet; resume it first",
                pending.idempotency_key()
            ))),
            phase => Err(RgsError::RoundInProgress(format!(
                "round {} is {}",
                phase.outcome().map(|o| o.round_id.as_str()).unwrap_or_default(),
                phase.name()
            ))),
        }
    }

    fn ensure_base_game(&self) -> Result<()> {
        if self.session.free_spins_remaining > 0 {
            return Err(RgsError::InvalidRequest(format!(
                "{} free spins must be played first",
                self.session.free_spins_remaining
            )));
        }
        if let Some(count) = self.session.pending_free_spins {
            return Err(RgsError::InvalidRequest(format!(
                "{} free spins are awaiting activation",
                count
            )));
        }
        Ok(())
    }

    fn ensure_covers(&self, amount: Amount) -> Result<()> {
        if amount > self.session.balance {
            return Err(RgsError::InsufficientBalance(format!(
                "balance {} does not cover {}",
                format_amount(self.session.balance),
                format_amount(amount)
            )));
        }
        Ok(())
    }

    fn starting_multipliers(&self, mode: RoundMode) -> MultiplierGrid {
        let preset = match mode {
            RoundMode::FreeSpin => self.session.multipliers,
            RoundMode::Base => self.session.armed_detail.as_ref().and_then(|f| f.multipliers),
        };
        preset.unwrap_or_else(|| uniform_multipliers(INITIAL_MULTIPLIER))
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Submit a round. The wager is debited; nothing is credited until
    /// `end_round`.
    ///
    /// A round served under a commitment the session does not hold is
    /// still held for playback, since the server has it open; the mismatch
    /// is returned and recorded on the session.
    pub async fn submit_round(&mut self, request: RoundRequest) -> Result<PendingOutcome> {
        self.ensure_idle()?;
        match request.mode {
            RoundMode::FreeSpin => {
                if self.session.free_spins_remaining == 0 {
                    return Err(RgsError::InvalidRequest("no free spins remaining".to_string()));
                }
            }
            RoundMode::Base => {
                self.ensure_base_game()?;
                self.session.bet_config.validate(request.wager)?;
                self.ensure_covers(request.wager * request.modifiers.wager_factor())?;
            }
        }

        let submit = SubmitRoundRequest {
            session_id: self.session.id.clone(),
            wager: request.wager,
            client_seed: request.client_seed,
            mode: request.mode,
            modifier_flags: request.modifiers,
            idempotency_key: Uuid::new_v4().to_string(),
        };
        self.send_round(submit).await
    }

    /// Replay a submission whose response was lost, with the same key.
    pub async fn resume_submit(&mut self) -> Result<Resumed> {
        let pending = match &self.session.phase {
            RoundPhase::Submitted(pending) => pending.clone(),
            _ => return Err(RgsError::InvalidRequest("no submission to resume".to_string())),
        };
        info!("Session {} resuming request {}", self.session.id, pending.idempotency_key());
        match pending {
            PendingSubmission::Round(request) => self.send_round(request).await.map(Resumed::Round),
            PendingSubmission::Purchase(request) => self.send_purchase(request).await.map(Resumed::Purchase),
            PendingSubmission::TriggerSpin(request) => self.send_trigger(request).await.map(Resumed::TriggerSpin),
        }
    }

    async fn send_round(&mut self, request: SubmitRoundRequest) -> Result<PendingOutcome> {
        let starting = self.starting_multipliers(request.mode);
        let response = match self.session.client.submit_round(&request).await {
            Ok(response) => response,
            Err(err) => return Err(self.submission_failed(PendingSubmission::Round(request), err)),
        };

        let served_under = response.server_seed_hash.clone();
        let pending = self.receive(PendingOutcome::from_round(response, &request.client_seed, starting));
        if request.mode == RoundMode::Base {
            self.session.armed_feature = None;
            self.session.armed_detail = None;
        }
        self.check_commitment(&pending.round_id, &served_under)?;
        Ok(pending)
    }

    fn check_commitment(&mut self, round_id: &str, served_under: &str) -> Result<()> {
        if served_under.eq_ignore_ascii_case(&self.session.commitment.server_seed_hash) {
            return Ok(());
        }
        let message = format!(
            "round {} was played under commitment {}, session holds {}",
            round_id, served_under, self.session.commitment.server_seed_hash
        );
        error!("Session {}: {}", self.session.id, message);
        self.session.fairness_violation = Some(message.clone());
        Err(RgsError::FairnessVerificationMismatch(message))
    }

    fn submission_failed(&mut self, pending: PendingSubmission, err: RgsError) -> RgsError {
        if err.is_retryable() {
            warn!(
                "Session {} request {} failed in transit: {}",
                self.session.id,
                pending.idempotency_key(),
                err
            );
            self.session.phase = RoundPhase::Submitted(pending);
        } else {
            self.session.phase = RoundPhase::Idle;
        }
        err
    }

    /// Hold a received outcome and log it for audit.
    fn receive(&mut self, pending: PendingOutcome) -> PendingOutcome {
        if pending.nonce != self.session.nonce {
            warn!(
                "Session {} expected nonce {}, server used {}",
                self.session.id, self.session.nonce, pending.nonce
            );
        }
        self.session.nonce = pending.nonce + 1;
        self.session.balance = pending.balance_after_debit;

        let stats = &mut self.session.stats;
        stats.total_debited += pending.debited;
        stats.total_tumbles += u64::from(pending.tumble_count());
        stats.max_multiplier = stats.max_multiplier.max(pending.max_multiplier());

        self.session.served.push(pending.served());
        debug!(
            "Session {} round {} nonce {} holds {} events",
            self.session.id,
            pending.round_id,
            pending.nonce,
            pending.event_count()
        );

        self.session.phase = if pending.event_count() == 0 {
            RoundPhase::Acknowledged { outcome: Box::new(pending.clone()) }
        } else {
            RoundPhase::OutcomeReceived { outcome: Box::new(pending.clone()), acknowledged: 0 }
        };
        pending
    }

    // =========================================================================
    // PLAYBACK
    // =========================================================================

    /// Acknowledge event `index` as played. Indices start at 0 and must be
    /// consecutive.
    ///
    /// When the server rejects the order, the round is resynced from the
    /// server's progress. An ack the server had already counted (its reply
    /// was lost) then succeeds; otherwise the rejection is returned and
    /// playback continues from the server's next event.
    pub async fn acknowledge_event(&mut self, index: u32) -> Result<AckedEvent> {
        let (event, event_count) = match &self.session.phase {
            RoundPhase::OutcomeReceived { outcome, acknowledged } => {
                if index != *acknowledged {
                    return Err(RgsError::OutOfOrderAcknowledgement(format!(
                        "expected event {}, got {}",
                        acknowledged, index
                    )));
                }
                let event = outcome.event(index).cloned().ok_or_else(|| {
                    RgsError::OutOfOrderAcknowledgement(format!("round has no event {}", index))
                })?;
                (event, outcome.event_count())
            }
            RoundPhase::Acknowledged { .. } => {
                return Err(RgsError::OutOfOrderAcknowledgement(format!(
                    "event {} acknowledged after the last event",
                    index
                )))
            }
            _ => {
                return Err(RgsError::OutOfOrderAcknowledgement(format!(
                    "event {} acknowledged with no outcome",
                    index
                )))
            }
        };

        let response = match self.session.client.acknowledge_event(&self.session.id, index).await {
            Ok(response) => response,
            Err(err) if err.is_protocol_violation() => {
                warn!("Session {} ack {} rejected: {}", self.session.id, index, err);
                return self.resync_acknowledgement(index, event, event_count, err).await;
            }
            Err(err) => return Err(err),
        };
        if response.event_index != index {
            let err = RgsError::Protocol(format!(
                "acknowledged event {} but server confirmed {}",
                index, response.event_index
            ));
            error!("Session {}: {}", self.session.id, err);
            self.abort_round().await?;
            return Err(err);
        }

        let phase = std::mem::take(&mut self.session.phase);
        self.session.phase = match phase {
            RoundPhase::OutcomeReceived { outcome, .. } if index + 1 == event_count => {
                RoundPhase::Acknowledged { outcome }
            }
            RoundPhase::OutcomeReceived { outcome, .. } => {
                RoundPhase::OutcomeReceived { outcome, acknowledged: index + 1 }
            }
            other => other,
        };

        Ok(AckedEvent { index, event, status: response.status })
    }

    async fn resync_acknowledgement(
        &mut self,
        index: u32,
        event: RoundEvent,
        event_count: u32,
        rejection: RgsError,
    ) -> Result<AckedEvent> {
        let snapshot = self.session.client.get_session(&self.session.id).await?;
        let Some(acknowledged) = self.server_progress(&snapshot) else {
            error!(
                "Session {} round is no longer open server-side, dropping it",
                self.session.id
            );
            self.session.phase = RoundPhase::Idle;
            self.session.reconcile(snapshot);
            return Err(rejection);
        };

        self.resume_at(acknowledged);
        if acknowledged == index + 1 {
            info!("Session {} event {} was already acknowledged", self.session.id, index);
            let status = if acknowledged >= event_count {
                AckStatus::Complete
            } else {
                AckStatus::Acknowledged
            };
            return Ok(AckedEvent { index, event, status });
        }
        warn!(
            "Session {} resuming playback at event {} of {}",
            self.session.id, acknowledged, event_count
        );
        Err(rejection)
    }

    /// Events the server has counted for the round held here, if it still
    /// has that round open.
    fn server_progress(&self, snapshot: &SessionSnapshot) -> Option<u32> {
        let held = self.session.phase.outcome()?;
        match (&snapshot.active_round_id, snapshot.acknowledged_events) {
            (Some(round_id), Some(acknowledged)) if *round_id == held.round_id => Some(acknowledged),
            _ => None,
        }
    }

    fn resume_at(&mut self, acknowledged: u32) {
        let phase = std::mem::take(&mut self.session.phase);
        self.session.phase = match phase {
            RoundPhase::OutcomeReceived { outcome, .. } | RoundPhase::Acknowledged { outcome } => {
                if acknowledged >= outcome.event_count() {
                    RoundPhase::Acknowledged { outcome }
                } else {
                    RoundPhase::OutcomeReceived { outcome, acknowledged }
                }
            }
            other => other,
        };
    }

    /// Close the round and credit its win. With no round open this only
    /// refreshes the balance.
    pub async fn end_round(&mut self) -> Result<RoundSettlement> {
        match &self.session.phase {
            RoundPhase::OutcomeReceived { outcome, acknowledged } => {
                return Err(RgsError::EventsPending(format!(
                    "{} of {} events acknowledged",
                    acknowledged,
                    outcome.event_count()
                )))
            }
            RoundPhase::Submitted(pending) => {
                return Err(RgsError::RoundInProgress(format!(
                    "request {} has no response yet",
                    pending.idempotency_key()
                )))
            }
            RoundPhase::Idle | RoundPhase::Acknowledged { .. } => {}
        }

        let response = self.session.client.end_round(&self.session.id).await?;
        let settled = match std::mem::take(&mut self.session.phase) {
            RoundPhase::Acknowledged { outcome } => Some(*outcome),
            _ => None,
        };

        self.session.balance = response.balance;
        self.session.free_spins_remaining = response.free_spins_remaining;
        let (round_id, credited) = match (&settled, response.round_id) {
            // A retried call whose first reply was lost finds nothing open.
            (Some(outcome), None) => {
                info!(
                    "Session {} round {} was already closed, settling from the held outcome",
                    self.session.id, outcome.round_id
                );
                (Some(outcome.round_id.clone()), outcome.outcome.total_win)
            }
            (_, round_id) => (round_id, response.credited),
        };
        if let Some(outcome) = &settled {
            self.settle(outcome);
            if credited != outcome.outcome.total_win {
                warn!(
                    "Session {} round {} credited {}, outcome pays {}",
                    self.session.id,
                    outcome.round_id,
                    format_amount(credited),
                    format_amount(outcome.outcome.total_win)
                );
            }
        }

        Ok(RoundSettlement {
            round_id,
            credited,
            balance: response.balance,
            free_spins_remaining: response.free_spins_remaining,
        })
    }

    fn settle(&mut self, outcome: &PendingOutcome) {
        let session = &mut *self.session;
        session.stats.rounds_played += 1;
        session.stats.total_credited += outcome.outcome.total_win;

        match outcome.kind {
            RoundKind::TriggerSpin => {
                session.pending_free_spins = Some(outcome.outcome.free_spins_triggered);
            }
            RoundKind::Spin if outcome.outcome.is_free_spin => {
                session.multipliers =
                    (session.free_spins_remaining > 0).then_some(outcome.outcome.final_multipliers);
            }
            RoundKind::Spin if outcome.outcome.free_spins_triggered > 0 => {
                session.multipliers = None;
            }
            RoundKind::Spin => {}
        }
        debug!(
            "Session {} settled round {}, {} free spins left",
            session.id, outcome.round_id, session.free_spins_remaining
        );
    }

    /// Resync the round in flight with the server. A round the server
    /// still holds open resumes at the server's acknowledgement progress;
    /// anything else is dropped. The phase is untouched if the server
    /// cannot be reached.
    pub async fn abort_round(&mut self) -> Result<()> {
        warn!("Session {} aborting round ({})", self.session.id, self.session.phase.name());
        let snapshot = self.session.client.get_session(&self.session.id).await?;

        match self.server_progress(&snapshot) {
            Some(acknowledged) => {
                warn!(
                    "Session {} round is still open server-side, resuming at event {}",
                    self.session.id, acknowledged
                );
                self.resume_at(acknowledged);
            }
            None => {
                if let Some(round_id) = &snapshot.active_round_id {
                    warn!("Session {} round {} is still open server-side", self.session.id, round_id);
                }
                self.session.phase = RoundPhase::Idle;
            }
        }
        self.session.reconcile(snapshot);
        Ok(())
    }

    // =========================================================================
    // BONUS
    // =========================================================================

    fn bonus_request(&self, bonus_id: &str, wager: Amount, client_seed: &str) -> Result<BonusRequest> {
        self.ensure_idle()?;
        self.ensure_base_game()?;
        self.session.bet_config.validate(wager)?;
        Ok(BonusRequest {
            session_id: self.session.id.clone(),
            bonus_id: bonus_id.to_string(),
            client_seed: client_seed.to_string(),
            wager,
            idempotency_key: Uuid::new_v4().to_string(),
        })
    }

    /// Purchase a bonus and apply its effect as signalled.
    pub async fn buy_bonus(&mut self, bonus_id: &str, wager: Amount, client_seed: &str) -> Result<BonusPurchase> {
        let request = self.bonus_request(bonus_id, wager, client_seed)?;
        if let Some(armed) = self.session.armed_feature {
            return Err(RgsError::InvalidRequest(format!(
                "{} is already armed for the next round",
                armed.as_str()
            )));
        }
        self.send_purchase(request).await
    }

    async fn send_purchase(&mut self, request: BonusRequest) -> Result<BonusPurchase> {
        match self.session.client.buy_bonus(&request).await {
            Ok(response) => Ok(self.apply_purchase(response, &request)),
            Err(err) => Err(self.submission_failed(PendingSubmission::Purchase(request), err)),
        }
    }

    fn apply_purchase(&mut self, response: BuyBonusResponse, request: &BonusRequest) -> BonusPurchase {
        let session = &mut *self.session;
        session.phase = RoundPhase::Idle;
        session.balance = response.balance;
        session.nonce = response.nonce + 1;
        session.stats.total_debited += response.cost;
        session.served.push(ServedRound {
            round_id: response.round_id.clone(),
            nonce: response.nonce,
            client_seed: request.client_seed.clone(),
            wager: request.wager,
            outcome_digest: detail_digest(&response.feature_detail),
            payout_multiplier: Default::default(),
            total_win: 0,
        });

        let effect = response.feature_activated.effect(&response.feature_detail);
        match &effect {
            FeatureEffect::FreeSpins { count, multipliers } => {
                session.free_spins_remaining = *count;
                session.multipliers = *multipliers;
            }
            FeatureEffect::NextRound(feature) => {
                session.armed_feature = Some(response.feature_activated);
                session.armed_detail = Some(feature.clone());
            }
        }
        info!(
            "Session {} bought {} for {}",
            session.id,
            response.feature_activated.as_str(),
            format_amount(response.cost)
        );

        BonusPurchase {
            round_id: response.round_id,
            feature: response.feature_activated,
            effect,
            cost: response.cost,
            balance: response.balance,
        }
    }

    /// Play a bonus trigger spin. The free spin counter does not change
    /// until `activate_free_spins`. A commitment mismatch is handled as in
    /// `submit_round`.
    pub async fn bonus_trigger_spin(&mut self, bonus_id: &str, wager: Amount, client_seed: &str) -> Result<TriggerSpin> {
        let request = self.bonus_request(bonus_id, wager, client_seed)?;
        self.send_trigger(request).await
    }

    async fn send_trigger(&mut self, request: BonusRequest) -> Result<TriggerSpin> {
        let response = match self.session.client.bonus_trigger_spin(&request).await {
            Ok(response) => response,
            Err(err) => return Err(self.submission_failed(PendingSubmission::TriggerSpin(request), err)),
        };
        let scatter_count = response.scatter_count;
        let cost = response.cost;
        let served_under = response.server_seed_hash.clone();
        let outcome = self.receive(PendingOutcome::from_trigger(response, &request.client_seed, request.wager));
        self.check_commitment(&outcome.round_id, &served_under)?;
        Ok(TriggerSpin {
            scatter_count,
            free_spins_triggered: outcome.outcome.free_spins_triggered,
            cost,
            outcome,
        })
    }

    /// Confirm a pending free spin award. Returns the free spins now
    /// available.
    pub async fn activate_free_spins(&mut self) -> Result<u32> {
        self.ensure_idle()?;
        let response = self.session.client.activate_free_spins(&self.session.id).await?;
        self.session.free_spins_remaining = response.free_spins_remaining;
        self.session.multipliers = response.multipliers;
        self.session.balance = response.balance;
        self.session.pending_free_spins = None;
        info!(
            "Session {} activated {} free spins",
            self.session.id, response.free_spins_remaining
        );
        Ok(response.free_spins_remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::{ClientConfig, RetryPolicy};
    use crate::core::money::MONETARY_SCALE;
    use crate::network::local::LocalRgs;
    use crate::network::protocol::{AcknowledgeEventRequest, SessionRequest};
    use crate::network::transport::{Backend, RgsTransport};
    use crate::proof::commitment::SeedCommitment;
    use crate::session::manager::SessionManager;

    async fn setup() -> (Arc<LocalRgs>, Session) {
        let rgs = Arc::new(LocalRgs::default());
        let config = ClientConfig::default().with_retry_policy(RetryPolicy {
            initial_backoff: Duration::ZERO,
            ..Default::default()
        });
        let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), config);
        let session = manager.create_session().await.unwrap();
        (rgs, session)
    }

    async fn play_out(executor: &mut RoundExecutor<'_>, events: u32) -> RoundSettlement {
        for index in 0..events {
            executor.acknowledge_event(index).await.unwrap();
        }
        executor.end_round().await.unwrap()
    }

    #[tokio::test]
    async fn test_win_credited_only_on_end() {
        let (_rgs, mut session) = setup().await;
        let start = session.balance;
        let mut executor = RoundExecutor::new(&mut session);

        let outcome = executor.submit_round(RoundRequest::base(MONETARY_SCALE, "seed")).await.unwrap();
        assert_eq!(executor.session().balance, start - MONETARY_SCALE);

        let settlement = play_out(&mut executor, outcome.event_count()).await;
        assert_eq!(settlement.credited, outcome.outcome.total_win);
        assert_eq!(settlement.balance, start - MONETARY_SCALE + outcome.outcome.total_win);
        assert!(executor.phase().is_idle());
        assert_eq!(session.served_rounds().len(), 1);
        assert_eq!(session.nonce, 1);
    }

    #[tokio::test]
    async fn test_local_out_of_order_ack_keeps_round() {
        let (_rgs, mut session) = setup().await;
        let mut executor = RoundExecutor::new(&mut session);
        let outcome = executor.submit_round(RoundRequest::base(MONETARY_SCALE, "seed")).await.unwrap();

        let err = executor.acknowledge_event(1).await.unwrap_err();
        assert!(matches!(err, RgsError::OutOfOrderAcknowledgement(_)));
        play_out(&mut executor, outcome.event_count()).await;
    }

    fn acknowledged(phase: &RoundPhase) -> Option<u32> {
        match phase {
            RoundPhase::OutcomeReceived { acknowledged, .. } => Some(*acknowledged),
            RoundPhase::Acknowledged { outcome } => Some(outcome.event_count()),
            _ => None,
        }
    }

    /// Plays rounds until one has at least `events` events, leaving it open.
    async fn open_round_with(executor: &mut RoundExecutor<'_>, events: u32) -> PendingOutcome {
        for attempt in 0..200 {
            let outcome = executor
                .submit_round(RoundRequest::base(MONETARY_SCALE, format!("seed-{}", attempt)))
                .await
                .unwrap();
            if outcome.event_count() >= events {
                return outcome;
            }
            play_out(executor, outcome.event_count()).await;
            while executor.session().free_spins_remaining > 0 {
                let free_spin = executor
                    .submit_round(RoundRequest::free_spin(MONETARY_SCALE, "free"))
                    .await
                    .unwrap();
                play_out(executor, free_spin.event_count()).await;
            }
        }
        panic!("no round with {} events", events);
    }

    async fn server_ack(rgs: &LocalRgs, session_id: &str, index: u32) {
        rgs.acknowledge_event(&AcknowledgeEventRequest { session_id: session_id.to_string(), event_index: index })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ack_already_counted_by_server_succeeds() {
        let (rgs, mut session) = setup().await;
        let session_id = session.id.clone();
        let mut executor = RoundExecutor::new(&mut session);
        let outcome = open_round_with(&mut executor, 2).await;

        // Event 0 was counted server-side but its reply never arrived.
        server_ack(&rgs, &session_id, 0).await;

        let acked = executor.acknowledge_event(0).await.unwrap();
        assert_eq!(acked.index, 0);
        assert_eq!(acked.status, AckStatus::Acknowledged);
        assert_eq!(acknowledged(executor.phase()), Some(1));

        for index in 1..outcome.event_count() {
            executor.acknowledge_event(index).await.unwrap();
        }
        let settlement = executor.end_round().await.unwrap();
        assert_eq!(settlement.round_id.as_deref(), Some(outcome.round_id.as_str()));
        assert_eq!(settlement.credited, outcome.outcome.total_win);
    }

    #[tokio::test]
    async fn test_rejected_ack_resumes_at_server_progress() {
        let (rgs, mut session) = setup().await;
        let session_id = session.id.clone();
        let mut executor = RoundExecutor::new(&mut session);
        let outcome = open_round_with(&mut executor, 3).await;

        server_ack(&rgs, &session_id, 0).await;
        server_ack(&rgs, &session_id, 1).await;

        let err = executor.acknowledge_event(0).await.unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(acknowledged(executor.phase()), Some(2));

        for index in 2..outcome.event_count() {
            executor.acknowledge_event(index).await.unwrap();
        }
        executor.end_round().await.unwrap();
        assert!(executor.phase().is_idle());
    }

    #[tokio::test]
    async fn test_ack_for_round_closed_elsewhere_drops_it() {
        let (rgs, mut session) = setup().await;
        let session_id = session.id.clone();
        let mut executor = RoundExecutor::new(&mut session);
        let outcome = executor.submit_round(RoundRequest::base(MONETARY_SCALE, "seed")).await.unwrap();

        for index in 0..outcome.event_count() {
            server_ack(&rgs, &session_id, index).await;
        }
        let request = SessionRequest { session_id: session_id.clone() };
        rgs.end_round(&request).await.unwrap();

        let err = executor.acknowledge_event(0).await.unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(executor.phase().is_idle());

        let snapshot = rgs.get_session(&request).await.unwrap();
        assert!(snapshot.active_round_id.is_none());
        assert_eq!(executor.session().balance, snapshot.balance);
    }

    #[tokio::test]
    async fn test_abort_keeps_round_the_server_holds_open() {
        let (rgs, mut session) = setup().await;
        let session_id = session.id.clone();
        let mut executor = RoundExecutor::new(&mut session);
        let outcome = open_round_with(&mut executor, 2).await;
        executor.acknowledge_event(0).await.unwrap();

        rgs.fail_next_calls(1);
        executor.session.client = executor.session.client.clone().with_retry_policy(RetryPolicy::none());
        assert!(executor.abort_round().await.unwrap_err().is_retryable());
        assert_eq!(acknowledged(executor.phase()), Some(1));

        executor.abort_round().await.unwrap();
        assert_eq!(acknowledged(executor.phase()), Some(1));
        assert_eq!(executor.phase().outcome().map(|o| o.round_id.clone()), Some(outcome.round_id.clone()));

        for index in 1..outcome.event_count() {
            executor.acknowledge_event(index).await.unwrap();
        }
        executor.end_round().await.unwrap();
        let snapshot = rgs.get_session(&SessionRequest { session_id }).await.unwrap();
        assert!(snapshot.active_round_id.is_none());
    }

    #[tokio::test]
    async fn test_trigger_spin_under_unknown_commitment() {
        let (_rgs, mut session) = setup().await;
        session.commitment = SeedCommitment::new("00".repeat(32));
        let mut executor = RoundExecutor::new(&mut session);

        let err = executor.bonus_trigger_spin("free_spins_8", MONETARY_SCALE, "seed").await.unwrap_err();
        assert!(matches!(err, RgsError::FairnessVerificationMismatch(_)));
        assert!(executor.session().fairness_violation().is_some());

        // The server holds the round open, so it is still played out.
        let events = executor.phase().outcome().map(|o| o.event_count()).unwrap();
        play_out(&mut executor, events).await;
        assert_eq!(session.pending_free_spins, Some(8));
    }

    #[tokio::test]
    async fn test_invalid_wager_rejected_before_sending() {
        let (_rgs, mut session) = setup().await;
        let mut executor = RoundExecutor::new(&mut session);
        let err = executor.submit_round(RoundRequest::base(MONETARY_SCALE / 100, "seed")).await.unwrap_err();
        assert!(matches!(err, RgsError::InvalidWager(_)));
        assert!(executor.phase().is_idle());
        assert!(session.served_rounds().is_empty());
    }

    #[tokio::test]
    async fn test_server_side_insufficient_balance() {
        let (rgs, mut session) = setup().await;
        rgs.set_balance(&session.id, 0).await.unwrap();
        let mut executor = RoundExecutor::new(&mut session);
        let err = executor.submit_round(RoundRequest::base(MONETARY_SCALE, "seed")).await.unwrap_err();
        assert!(matches!(err, RgsError::InsufficientBalance(_)));
        assert!(executor.phase().is_idle());
    }

    #[tokio::test]
    async fn test_free_spin_needs_free_spins() {
        let (_rgs, mut session) = setup().await;
        let mut executor = RoundExecutor::new(&mut session);
        let err = executor.submit_round(RoundRequest::free_spin(MONETARY_SCALE, "seed")).await.unwrap_err();
        assert!(matches!(err, RgsError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_lost_response_resumes_with_same_key() {
        let (rgs, mut session) = setup().await;
        session.client = session.client.clone().with_retry_policy(RetryPolicy::none());
        let start = session.balance;
        let mut executor = RoundExecutor::new(&mut session);

        rgs.drop_next_response();
        let err = executor.submit_round(RoundRequest::base(MONETARY_SCALE, "seed")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(executor.phase(), RoundPhase::Submitted(_)));
        assert!(matches!(
            executor.submit_round(RoundRequest::base(MONETARY_SCALE, "seed")).await,
            Err(RgsError::RoundInProgress(_))
        ));

        let Resumed::Round(outcome) = executor.resume_submit().await.unwrap() else {
            panic!("expected a round");
        };
        assert_eq!(executor.session().balance, start - MONETARY_SCALE);
        assert_eq!(outcome.nonce, 0);
        play_out(&mut executor, outcome.event_count()).await;
    }

    #[tokio::test]
    async fn test_standard_purchase_grants_free_spins() {
        let (_rgs, mut session) = setup().await;
        let mut executor = RoundExecutor::new(&mut session);
        let purchase = executor.buy_bonus("free_spins_8", MONETARY_SCALE, "seed").await.unwrap();
        assert_eq!(purchase.feature, FeatureActivated::FreeSpins);
        assert_eq!(purchase.cost, 100 * MONETARY_SCALE);
        assert_eq!(session.free_spins_remaining, 8);
        assert!(session.multipliers.is_none());
        assert_eq!(session.nonce, 1);
    }

    #[tokio::test]
    async fn test_armed_feature_consumed_by_next_round() {
        let (_rgs, mut session) = setup().await;
        let mut executor = RoundExecutor::new(&mut session);
        executor.buy_bonus("jackpot_chance", MONETARY_SCALE, "seed").await.unwrap();
        assert_eq!(executor.session().armed_feature, Some(FeatureActivated::JackpotBoost));

        let err = executor.buy_bonus("wolf_burst", MONETARY_SCALE, "seed").await.unwrap_err();
        assert!(matches!(err, RgsError::InvalidRequest(_)));

        let outcome = executor.submit_round(RoundRequest::base(MONETARY_SCALE, "seed")).await.unwrap();
        play_out(&mut executor, outcome.event_count()).await;
        assert!(session.armed_feature.is_none());
    }
}
