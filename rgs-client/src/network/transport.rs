//! RGS Transport
//!
//! One trait for every RGS endpoint, implemented by the HTTP transport and
//! by the in-process `LocalRgs`. `Backend` picks one at runtime so a
//! session can fall back to demo play without changing the caller's type.

use std::sync::Arc;

use crate::error::Result;
use crate::network::http::HttpTransport;
use crate::network::local::LocalRgs;
use crate::network::protocol::{
    AcknowledgeEventRequest, AcknowledgeEventResponse, ActivateFreeSpinsResponse, BalanceResponse,
    BetHistoryRequest, BetHistoryResponse, BonusOptionsResponse, BonusRequest, BuyBonusResponse,
    EndRoundResponse, GameInfoResponse, JackpotInfoResponse, RotateSeedRequest, RotateSeedResponse,
    RoundResponse, SessionRequest, SessionSnapshot, SubmitRoundRequest, TriggerSpinResponse,
};

/// Endpoints of a Stake Engine style RGS.
#[allow(async_fn_in_trait)]
pub trait RgsTransport {
    /// Allocate a session.
    async fn create_session(&self) -> Result<SessionSnapshot>;

    /// Current server view of a session.
    async fn get_session(&self, request: &SessionRequest) -> Result<SessionSnapshot>;

    /// Authoritative balance.
    async fn balance(&self, request: &SessionRequest) -> Result<BalanceResponse>;

    /// Debit and play a round.
    async fn submit_round(&self, request: &SubmitRoundRequest) -> Result<RoundResponse>;

    /// Acknowledge one event of the open round.
    async fn acknowledge_event(&self, request: &AcknowledgeEventRequest) -> Result<AcknowledgeEventResponse>;

    /// Close the open round and credit its win.
    async fn end_round(&self, request: &SessionRequest) -> Result<EndRoundResponse>;

    /// Reveal the current server seed and commit to a new one.
    async fn rotate_seed(&self, request: &RotateSeedRequest) -> Result<RotateSeedResponse>;

    /// Purchase a bonus feature.
    async fn buy_bonus(&self, request: &BonusRequest) -> Result<BuyBonusResponse>;

    /// Play a bonus trigger spin; the award stays pending.
    async fn bonus_trigger_spin(&self, request: &BonusRequest) -> Result<TriggerSpinResponse>;

    /// Confirm a pending free spin award.
    async fn activate_free_spins(&self, request: &SessionRequest) -> Result<ActivateFreeSpinsResponse>;

    /// Bonus catalog.
    async fn bonus_options(&self) -> Result<BonusOptionsResponse>;

    /// Jackpot tiers.
    async fn jackpot_info(&self) -> Result<JackpotInfoResponse>;

    /// Most recent settled bets, newest first.
    async fn bet_history(&self, request: &BetHistoryRequest) -> Result<BetHistoryResponse>;

    /// Grid, paytable and catalogs.
    async fn game_info(&self) -> Result<GameInfoResponse>;
}

/// Runtime choice of transport.
#[derive(Clone, Debug)]
pub enum Backend {
    /// Remote RGS over HTTP.
    Http(HttpTransport),
    /// In-process RGS.
    Local(Arc<LocalRgs>),
}

impl Backend {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Backend::Http(_) => "http",
            Backend::Local(rgs) if rgs.is_demo() => "demo",
            Backend::Local(_) => "local",
        }
    }
}

impl From<HttpTransport> for Backend {
    fn from(transport: HttpTransport) -> Self {
        Backend::Http(transport)
    }
}

impl From<Arc<LocalRgs>> for Backend {
    fn from(rgs: Arc<LocalRgs>) -> Self {
        Backend::Local(rgs)
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Backend::Http(transport) => transport.$method($($arg),*).await,
            Backend::Local(rgs) => rgs.$method($($arg),*).await,
        }
    };
}

impl RgsTransport for Backend {
    async fn create_session(&self) -> Result<SessionSnapshot> {
        dispatch!(self, create_session)
    }

    async fn get_session(&self, request: &SessionRequest) -> Result<SessionSnapshot> {
        dispatch!(self, get_session, request)
    }

    async fn balance(&self, request: &SessionRequest) -> Result<BalanceResponse> {
        dispatch!(self, balance, request)
    }

    async fn submit_round(&self, request: &SubmitRoundRequest) -> Result<RoundResponse> {
        dispatch!(self, submit_round, request)
    }

    async fn acknowledge_event(&self, request: &AcknowledgeEventRequest) -> Result<AcknowledgeEventResponse> {
        dispatch!(self, acknowledge_event, request)
    }

    async fn end_round(&self, request: &SessionRequest) -> Result<EndRoundResponse> {
        dispatch!(self, end_round, request)
    }

    async fn rotate_seed(&self, request: &RotateSeedRequest) -> Result<RotateSeedResponse> {
        dispatch!(self, rotate_seed, request)
    }

    async fn buy_bonus(&self, request: &BonusRequest) -> Result<BuyBonusResponse> {
        dispatch!(self, buy_bonus, request)
    }

    async fn bonus_trigger_spin(&self, request: &BonusRequest) -> Result<TriggerSpinResponse> {
        dispatch!(self, bonus_trigger_spin, request)
    }

    async fn activate_free_spins(&self, request: &SessionRequest) -> Result<ActivateFreeSpinsResponse> {
        dispatch!(self, activate_free_spins, request)
    }

    async fn bonus_options(&self) -> Result<BonusOptionsResponse> {
        dispatch!(self, bonus_options)
    }

    async fn jackpot_info(&self) -> Result<JackpotInfoResponse> {
        dispatch!(self, jackpot_info)
    }

    async fn bet_history(&self, request: &BetHistoryRequest) -> Result<BetHistoryResponse> {
        dispatch!(self, bet_history, request)
    }

    async fn game_info(&self) -> Result<GameInfoResponse> {
        dispatch!(self, game_info)
    }
}
