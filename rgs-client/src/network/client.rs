//! RGS Client
//!
//! Wraps a `Backend` with a per-call timeout and the retry policy. Calls
//! are classified before they are sent:
//!
//! - idempotent calls (reads, session creation, `end-round`) retry freely
//! - keyed mutations retry with the same idempotency key
//! - everything else is attempted once

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{Result, RgsError};
use crate::network::protocol::{
    AcknowledgeEventRequest, AcknowledgeEventResponse, ActivateFreeSpinsResponse, BalanceResponse,
    BetHistoryRequest, BetHistoryResponse, BonusOptionsResponse, BonusRequest, BuyBonusResponse,
    EndRoundResponse, GameInfoResponse, JackpotInfoResponse, RotateSeedRequest, RotateSeedResponse,
    RoundResponse, SessionRequest, SessionSnapshot, SubmitRoundRequest, TriggerSpinResponse,
};
use crate::network::transport::{Backend, RgsTransport};

/// How a call may be retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// Safe to repeat.
    Idempotent,
    /// Mutation deduplicated server-side by its key.
    Keyed,
    /// Mutation without deduplication.
    Unsafe,
}

/// Transport handle with timeout and retry applied.
#[derive(Clone, Debug)]
pub struct RgsClient {
    backend: Backend,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl RgsClient {
    /// Create a client from configuration.
    pub fn new(backend: Backend, config: &ClientConfig) -> Self {
        Self {
            backend,
            request_timeout: config.request_timeout,
            retry: config.retry,
        }
    }

    /// Underlying backend.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Current retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns a new client with the provided retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn call<T, F, Fut>(&self, op: &'static str, kind: CallKind, make_request: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self
            .retry
            .attempts_for(kind != CallKind::Idempotent, kind == CallKind::Keyed);

        let mut attempt = 0usize;
        let mut backoff = self.retry.initial_backoff;
        loop {
            attempt += 1;
            let result = match timeout(self.request_timeout, make_request()).await {
                Ok(result) => result,
                Err(elapsed) => Err(RgsError::from(elapsed)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!("{} attempt {}/{} failed: {}", op, attempt, max_attempts, err);
                }
                Err(err) => return Err(err),
            }

            if backoff > Duration::ZERO {
                sleep(backoff).await;
                backoff = self.retry.next_backoff(backoff);
            }
        }
    }

    /// Allocate a session.
    pub async fn create_session(&self) -> Result<SessionSnapshot> {
        self.call("create_session", CallKind::Idempotent, move || self.backend.create_session())
            .await
    }

    /// Server view of a session.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let request = &SessionRequest { session_id: session_id.to_string() };
        self.call("get_session", CallKind::Idempotent, move || self.backend.get_session(request))
            .await
    }

    /// Authoritative balance.
    pub async fn balance(&self, session_id: &str) -> Result<BalanceResponse> {
        let request = &SessionRequest { session_id: session_id.to_string() };
        self.call("balance", CallKind::Idempotent, move || self.backend.balance(request))
            .await
    }

    /// Submit a round; retried with the same key.
    pub async fn submit_round(&self, request: &SubmitRoundRequest) -> Result<RoundResponse> {
        self.call("submit_round", CallKind::Keyed, move || self.backend.submit_round(request))
            .await
    }

    /// Acknowledge one event; never retried.
    pub async fn acknowledge_event(&self, session_id: &str, event_index: u32) -> Result<AcknowledgeEventResponse> {
        let request = &AcknowledgeEventRequest { session_id: session_id.to_string(), event_index };
        self.call("acknowledge_event", CallKind::Unsafe, move || self.backend.acknowledge_event(request))
            .await
    }

    /// Close the open round.
    pub async fn end_round(&self, session_id: &str) -> Result<EndRoundResponse> {
        let request = &SessionRequest { session_id: session_id.to_string() };
        self.call("end_round", CallKind::Idempotent, move || self.backend.end_round(request))
            .await
    }

    /// Rotate the server seed; retried with the same key.
    pub async fn rotate_seed(&self, request: &RotateSeedRequest) -> Result<RotateSeedResponse> {
        self.call("rotate_seed", CallKind::Keyed, move || self.backend.rotate_seed(request))
            .await
    }

    /// Purchase a bonus; retried with the same key.
    pub async fn buy_bonus(&self, request: &BonusRequest) -> Result<BuyBonusResponse> {
        self.call("buy_bonus", CallKind::Keyed, move || self.backend.buy_bonus(request))
            .await
    }

    /// Play a trigger spin; retried with the same key.
    pub async fn bonus_trigger_spin(&self, request: &BonusRequest) -> Result<TriggerSpinResponse> {
        self.call("bonus_trigger_spin", CallKind::Keyed, move || self.backend.bonus_trigger_spin(request))
            .await
    }

    /// Confirm a pending free spin award; never retried.
    pub async fn activate_free_spins(&self, session_id: &str) -> Result<ActivateFreeSpinsResponse> {
        let request = &SessionRequest { session_id: session_id.to_string() };
        self.call("activate_free_spins", CallKind::Unsafe, move || {
            self.backend.activate_free_spins(request)
        })
        .await
    }

    /// Bonus catalog.
    pub async fn bonus_options(&self) -> Result<BonusOptionsResponse> {
        self.call("bonus_options", CallKind::Idempotent, move || self.backend.bonus_options())
            .await
    }

    /// Jackpot tiers.
    pub async fn jackpot_info(&self) -> Result<JackpotInfoResponse> {
        self.call("jackpot_info", CallKind::Idempotent, move || self.backend.jackpot_info())
            .await
    }

    /// Most recent settled bets, newest first.
    pub async fn bet_history(&self, session_id: &str, limit: usize) -> Result<BetHistoryResponse> {
        let request = &BetHistoryRequest { session_id: session_id.to_string(), limit };
        self.call("bet_history", CallKind::Idempotent, move || self.backend.bet_history(request))
            .await
    }

    /// Grid, paytable and catalogs.
    pub async fn game_info(&self) -> Result<GameInfoResponse> {
        self.call("game_info", CallKind::Idempotent, move || self.backend.game_info())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::network::local::LocalRgs;

    fn client(rgs: &Arc<LocalRgs>, max_attempts: usize) -> RgsClient {
        let config = ClientConfig::default().with_retry_policy(RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            ..Default::default()
        });
        RgsClient::new(Backend::Local(rgs.clone()), &config)
    }

    #[tokio::test]
    async fn test_reads_are_retried() {
        let rgs = Arc::new(LocalRgs::default());
        let client = client(&rgs, 3);
        rgs.fail_next_calls(2);
        assert!(client.create_session().await.is_ok());
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let rgs = Arc::new(LocalRgs::default());
        let client = client(&rgs, 2);
        rgs.fail_next_calls(2);
        let err = client.create_session().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unsafe_calls_are_not_retried() {
        let rgs = Arc::new(LocalRgs::default());
        let client = client(&rgs, 5);
        let session = client.create_session().await.unwrap();
        rgs.fail_next_calls(1);
        assert!(client.activate_free_spins(&session.session_id).await.unwrap_err().is_retryable());
        // Reaches the server now, which has no award to activate.
        let err = client.activate_free_spins(&session.session_id).await.unwrap_err();
        assert!(matches!(err, RgsError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_lost_rotation_reply_is_replayed() {
        let rgs = Arc::new(LocalRgs::default());
        let client = client(&rgs, 3);
        let session = client.create_session().await.unwrap();
        let request = RotateSeedRequest {
            session_id: session.session_id.clone(),
            idempotency_key: "rotation-1".to_string(),
        };

        rgs.drop_next_response();
        let rotated = client.rotate_seed(&request).await.unwrap();
        assert_eq!(rotated.previous_server_seed_hash, session.server_seed_hash);
        let after = client.get_session(&session.session_id).await.unwrap();
        assert_eq!(after.server_seed_hash, rotated.new_server_seed_hash);
    }

    #[tokio::test]
    async fn test_bet_history_is_retried() {
        let rgs = Arc::new(LocalRgs::default());
        let client = client(&rgs, 3);
        let session = client.create_session().await.unwrap();
        rgs.fail_next_calls(2);
        let page = client.bet_history(&session.session_id, 10).await.unwrap();
        assert_eq!(page.total_bets, 0);
        assert!(page.history.is_empty());
    }
}
