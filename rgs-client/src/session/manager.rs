//! Session Manager
//!
//! Creates sessions, reconciles them with the server, and rotates seeds.
//! When the primary RGS cannot create a session and fallback is enabled,
//! the manager hands out a demo session backed by an in-process RGS.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::core::money::{format_amount, Amount};
use crate::error::{Result, RgsError};
use crate::network::client::RgsClient;
use crate::network::http::HttpTransport;
use crate::network::local::LocalRgs;
use crate::network::protocol::{
    BetHistoryResponse, BonusOptionInfo, GameInfoResponse, JackpotTierInfo, RotateSeedRequest, RoundRecord,
};
use crate::network::transport::Backend;
use crate::proof::commitment::{SeedCommitment, SeedReveal};
use crate::proof::verify::{audit_rotation, AuditReport};
use crate::session::state::{Session, SessionMode};

/// Bets returned by `bet_history` when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Result of a verified seed rotation.
#[derive(Clone, Debug)]
pub struct SeedRotation {
    /// Seed used until now.
    pub revealed_server_seed: String,
    /// Commitment it was checked against.
    pub previous_commitment: SeedCommitment,
    /// Commitment to the new seed.
    pub new_server_seed_hash: String,
    /// Rounds the server disclosed.
    pub rounds: Vec<RoundRecord>,
    /// Per-round audit.
    pub report: AuditReport,
}

/// Creates and maintains sessions.
#[derive(Debug)]
pub struct SessionManager {
    primary: Option<RgsClient>,
    demo: RgsClient,
    config: ClientConfig,
}

impl SessionManager {
    /// Manager for `config`: HTTP when a base URL is set, demo otherwise.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let primary = match &config.base_url {
            Some(url) => {
                let transport = HttpTransport::new(url, config.request_timeout)?;
                Some(RgsClient::new(transport.into(), &config))
            }
            None => None,
        };
        Ok(Self::build(primary, config))
    }

    /// Manager over an explicit primary backend.
    pub fn with_backend(backend: Backend, config: ClientConfig) -> Self {
        let primary = RgsClient::new(backend, &config);
        Self::build(Some(primary), config)
    }

    fn build(primary: Option<RgsClient>, config: ClientConfig) -> Self {
        let demo_rgs = Arc::new(LocalRgs::demo(config.demo_balance));
        let demo = RgsClient::new(Backend::Local(demo_rgs), &config);
        Self { primary, demo, config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Allocate a new session.
    pub async fn create_session(&self) -> Result<Session> {
        let Some(primary) = &self.primary else {
            info!("No RGS configured, playing in demo mode");
            return self.create_demo_session().await;
        };

        match primary.create_session().await {
            Ok(snapshot) => {
                let mode = if snapshot.demo { SessionMode::Demo } else { SessionMode::Live };
                info!(
                    "Session {} created on {} RGS, balance {}",
                    snapshot.session_id,
                    primary.backend().label(),
                    format_amount(snapshot.balance)
                );
                Ok(Session::from_snapshot(snapshot, mode, primary.clone()))
            }
            Err(err) if self.config.demo_fallback => {
                warn!("Session creation failed ({}), falling back to a demo session", err);
                self.create_demo_session().await
            }
            Err(err) => Err(RgsError::SessionCreation(err.to_string())),
        }
    }

    async fn create_demo_session(&self) -> Result<Session> {
        let snapshot = self
            .demo
            .create_session()
            .await
            .map_err(|err| RgsError::SessionCreation(err.to_string()))?;
        warn!(
            "Session {} is a DEMO session, balance {} is not persisted",
            snapshot.session_id,
            format_amount(snapshot.balance)
        );
        Ok(Session::from_snapshot(snapshot, SessionMode::Demo, self.demo.clone()))
    }

    /// Re-fetch balance, commitment and nonce.
    pub async fn refresh_session(&self, session: &mut Session) -> Result<()> {
        let snapshot = session.client.get_session(&session.id).await?;
        if session.is_idle() {
            if let Some(round_id) = &snapshot.active_round_id {
                warn!("Session {} has round {} open server-side", session.id, round_id);
            }
        }
        session.reconcile(snapshot);
        Ok(())
    }

    /// Re-fetch only the balance.
    pub async fn refresh_balance(&self, session: &mut Session) -> Result<Amount> {
        let response = session.client.balance(&session.id).await?;
        session.balance = response.balance;
        Ok(response.balance)
    }

    /// Reveal the current seed, verify it and every round played under it,
    /// and move to the new commitment.
    ///
    /// The session moves to the new commitment even when verification
    /// fails; the failure is returned and recorded on the session. If the
    /// reply is lost for good, the session is resynced so later rounds are
    /// checked against whichever commitment the server now holds.
    pub async fn rotate_seed(&self, session: &mut Session) -> Result<SeedRotation> {
        if !session.is_idle() {
            return Err(RgsError::RoundInProgress(format!(
                "cannot rotate the seed while a round is {}",
                session.phase.name()
            )));
        }

        let request = RotateSeedRequest {
            session_id: session.id.clone(),
            idempotency_key: Uuid::new_v4().to_string(),
        };
        let response = match session.client.rotate_seed(&request).await {
            Ok(response) => response,
            Err(err) if err.is_retryable() => {
                warn!("Session {} seed rotation failed in transit: {}", session.id, err);
                self.resync_commitment(session).await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let reveal = SeedReveal {
            server_seed: response.revealed_server_seed,
            previous_server_seed_hash: response.previous_server_seed_hash,
            next_server_seed_hash: response.new_server_seed_hash,
        };

        let previous_commitment = std::mem::replace(
            &mut session.commitment,
            SeedCommitment::new(reveal.next_server_seed_hash.clone()),
        );
        let served = std::mem::take(&mut session.served);
        session.nonce = 0;

        let report = audit_rotation(&previous_commitment, &reveal, &served, &response.rounds);
        match report.into_result() {
            Ok(report) => {
                info!(
                    "Session {} rotated seed, {} rounds verified",
                    session.id,
                    report.rounds.len()
                );
                Ok(SeedRotation {
                    revealed_server_seed: reveal.server_seed,
                    previous_commitment,
                    new_server_seed_hash: reveal.next_server_seed_hash,
                    rounds: response.rounds,
                    report,
                })
            }
            Err(err) => {
                error!("Session {} FAILED fairness verification: {}", session.id, err);
                session.fairness_violation = Some(err.message());
                Err(err)
            }
        }
    }

    async fn resync_commitment(&self, session: &mut Session) {
        let snapshot = match session.client.get_session(&session.id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Session {} could not be resynced: {}", session.id, err);
                return;
            }
        };
        if !snapshot
            .server_seed_hash
            .eq_ignore_ascii_case(&session.commitment.server_seed_hash)
        {
            error!(
                "Session {} seed was rotated but the reveal was lost, {} rounds cannot be verified",
                session.id,
                session.served.len()
            );
            session.commitment = SeedCommitment::new(snapshot.server_seed_hash.clone());
            session.served.clear();
        }
        session.reconcile(snapshot);
    }

    /// Most recent settled bets, newest first, across seed rotations.
    pub async fn bet_history(&self, session: &Session, limit: usize) -> Result<BetHistoryResponse> {
        session.client.bet_history(&session.id, limit).await
    }

    /// Grid, paytable and catalogs, or `None` when they cannot be fetched.
    pub async fn game_info(&self, session: &Session) -> Option<GameInfoResponse> {
        match session.client.game_info().await {
            Ok(info) => Some(info),
            Err(err) => {
                warn!("Game info unavailable: {}", err);
                None
            }
        }
    }

    /// Bonus catalog, or `None` when it cannot be fetched.
    pub async fn bonus_options(&self, session: &Session) -> Option<Vec<BonusOptionInfo>> {
        match session.client.bonus_options().await {
            Ok(response) => Some(response.options),
            Err(err) => {
                warn!("Bonus options unavailable: {}", err);
                None
            }
        }
    }

    /// Jackpot tiers, or `None` when they cannot be fetched.
    pub async fn jackpot_info(&self, session: &Session) -> Option<Vec<JackpotTierInfo>> {
        match session.client.jackpot_info().await {
            Ok(response) => Some(response.tiers),
            Err(err) => {
                warn!("Jackpot info unavailable: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::RetryPolicy;
    use crate::core::money::MONETARY_SCALE;
    use crate::round::{RoundExecutor, RoundRequest};

    fn config() -> ClientConfig {
        ClientConfig::default().with_retry_policy(RetryPolicy {
            initial_backoff: Duration::ZERO,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_live_session_from_primary() {
        let rgs = Arc::new(LocalRgs::default());
        let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), config());
        let session = manager.create_session().await.unwrap();
        assert_eq!(session.mode, SessionMode::Live);
        assert_eq!(session.nonce, 0);
        assert_eq!(rgs.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_no_fallback_reports_creation_error() {
        let rgs = Arc::new(LocalRgs::default());
        rgs.set_offline(true);
        let mut config = config();
        config.demo_fallback = false;
        let manager = SessionManager::with_backend(Backend::Local(rgs), config);
        let err = manager.create_session().await.unwrap_err();
        assert!(matches!(err, RgsError::SessionCreation(_)));
    }

    #[tokio::test]
    async fn test_no_base_url_plays_demo() {
        let manager = SessionManager::new(config()).unwrap();
        let session = manager.create_session().await.unwrap();
        assert!(session.is_demo());
        assert_eq!(session.balance, manager.config().demo_balance);
    }

    #[tokio::test]
    async fn test_refresh_balance() {
        let rgs = Arc::new(LocalRgs::default());
        let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), config());
        let mut session = manager.create_session().await.unwrap();
        rgs.set_balance(&session.id, 42).await.unwrap();
        assert_eq!(manager.refresh_balance(&mut session).await.unwrap(), 42);
        assert_eq!(session.balance, 42);
    }

    #[tokio::test]
    async fn test_rotation_without_rounds_verifies() {
        let manager = SessionManager::new(config()).unwrap();
        let mut session = manager.create_session().await.unwrap();
        let before = session.commitment.server_seed_hash.clone();

        let rotation = manager.rotate_seed(&mut session).await.unwrap();
        assert!(rotation.report.is_valid());
        assert_eq!(rotation.previous_commitment.server_seed_hash, before);
        assert_eq!(session.commitment.server_seed_hash, rotation.new_server_seed_hash);
        assert!(session.fairness_violation().is_none());
    }

    #[tokio::test]
    async fn test_lost_rotation_reply_resyncs_commitment() {
        let rgs = Arc::new(LocalRgs::default());
        let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), config());
        let mut session = manager.create_session().await.unwrap();
        session.client = session.client.clone().with_retry_policy(RetryPolicy::none());
        let before = session.commitment.server_seed_hash.clone();

        rgs.drop_next_response();
        assert!(manager.rotate_seed(&mut session).await.unwrap_err().is_retryable());
        assert_ne!(session.commitment.server_seed_hash, before);
        assert!(session.served_rounds().is_empty());
        assert!(session.fairness_violation().is_none());

        let mut executor = RoundExecutor::new(&mut session);
        let outcome = executor.submit_round(RoundRequest::base(MONETARY_SCALE, "after")).await.unwrap();
        assert_eq!(outcome.nonce, 0);
        assert!(session.fairness_violation().is_none());
    }

    #[tokio::test]
    async fn test_lost_rotation_reply_retried_with_same_key() {
        let rgs = Arc::new(LocalRgs::default());
        let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), config());
        let mut session = manager.create_session().await.unwrap();
        let mut executor = RoundExecutor::new(&mut session);
        let outcome = executor.submit_round(RoundRequest::base(MONETARY_SCALE, "before")).await.unwrap();
        for index in 0..outcome.event_count() {
            executor.acknowledge_event(index).await.unwrap();
        }
        executor.end_round().await.unwrap();

        rgs.drop_next_response();
        let rotation = manager.rotate_seed(&mut session).await.unwrap();
        assert!(rotation.report.is_valid());
        assert_eq!(rotation.rounds.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_restores_armed_detail() {
        let rgs = Arc::new(LocalRgs::default());
        let manager = SessionManager::with_backend(Backend::Local(rgs), config());
        let mut session = manager.create_session().await.unwrap();
        RoundExecutor::new(&mut session)
            .buy_bonus("max_multi_start", MONETARY_SCALE, "seed")
            .await
            .unwrap();
        let bought = session.armed_detail.clone();
        assert!(bought.as_ref().is_some_and(|f| f.multipliers.is_some()));

        session.armed_detail = None;
        manager.refresh_session(&mut session).await.unwrap();
        assert_eq!(session.armed_detail, bought);
    }

    #[tokio::test]
    async fn test_bet_history_and_game_info() {
        let rgs = Arc::new(LocalRgs::default());
        let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), config());
        let mut session = manager.create_session().await.unwrap();
        RoundExecutor::new(&mut session)
            .buy_bonus("jackpot_chance", MONETARY_SCALE, "seed")
            .await
            .unwrap();

        let page = manager.bet_history(&session, DEFAULT_HISTORY_LIMIT).await.unwrap();
        assert_eq!(page.session_id, session.id);
        assert_eq!(page.total_bets, 1);
        assert_eq!(page.history[0].nonce, 0);

        let info = manager.game_info(&session).await.unwrap();
        assert_eq!(info.min_cluster_size, 4);
        rgs.set_catalog_offline(true);
        assert!(manager.game_info(&session).await.is_none());
    }
}
