//! Protocol Messages
//!
//! Wire format for client-RGS communication. Every body is camelCase JSON;
//! money is always a fixed-point integer at 10^6 scale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::money::{Amount, PayoutMultiplier};
use crate::game::bonus::{BonusOption, FeatureActivated, FeatureDetail, NextRoundFeature};
use crate::game::grid::MultiplierGrid;
use crate::game::jackpot::{JackpotTier, TierConfig};
use crate::game::spin::{ModifierFlags, RoundMode, SpinOutcome};
use crate::session::bet::BetConfig;

// =============================================================================
// CLIENT -> RGS REQUESTS
// =============================================================================

/// Request addressed to a session only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Session identifier.
    pub session_id: String,
}

/// Submit a paid or free spin round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRoundRequest {
    /// Session identifier.
    pub session_id: String,
    /// Base wager (fixed-point).
    pub wager: Amount,
    /// Client seed for this round.
    pub client_seed: String,
    /// Base or free spin.
    pub mode: RoundMode,
    /// Probability boosts.
    pub modifier_flags: ModifierFlags,
    /// Deduplication token; a replay returns the first response.
    pub idempotency_key: String,
}

/// Acknowledge one played event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeEventRequest {
    /// Session identifier.
    pub session_id: String,
    /// Index of the event just played.
    pub event_index: u32,
}

/// Purchase a bonus, or play its trigger spin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusRequest {
    /// Session identifier.
    pub session_id: String,
    /// Catalog id.
    pub bonus_id: String,
    /// Client seed.
    pub client_seed: String,
    /// Wager the price is computed from.
    pub wager: Amount,
    /// Deduplication token.
    pub idempotency_key: String,
}

/// Reveal the current server seed and commit to a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateSeedRequest {
    /// Session identifier.
    pub session_id: String,
    /// Deduplication token; a replay returns the first reveal.
    pub idempotency_key: String,
}

/// Page of the session's settled bets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetHistoryRequest {
    /// Session identifier.
    pub session_id: String,
    /// Most recent entries to return.
    pub limit: usize,
}

// =============================================================================
// RGS -> CLIENT RESPONSES
// =============================================================================

/// Session state as the server sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: String,
    /// Authoritative balance.
    pub balance: Amount,
    /// Commitment to the current server seed.
    pub server_seed_hash: String,
    /// Next nonce to be used.
    pub nonce: u64,
    /// Wager limits.
    pub bet_config: BetConfig,
    /// Free spins left.
    #[serde(default)]
    pub free_spins_remaining: u32,
    /// Spot multipliers carried into the next free spin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipliers: Option<MultiplierGrid>,
    /// Feature armed for the next base round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed_feature: Option<FeatureActivated>,
    /// Content drawn for the armed feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed_detail: Option<NextRoundFeature>,
    /// Free spins won by a trigger spin, awaiting activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_free_spins: Option<u32>,
    /// Round still open server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_round_id: Option<String>,
    /// Events of the open round the server has accepted as played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_events: Option<u32>,
    /// Non-persistent demo session.
    #[serde(default)]
    pub demo: bool,
}

/// Balance lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Authoritative balance.
    pub balance: Amount,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// Outcome of a submitted round.
///
/// `balance` is taken after the debit only; wins are credited by
/// `end-round` once every event has been acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResponse {
    /// Round identifier.
    pub round_id: String,
    /// Balance after the debit.
    pub balance: Amount,
    /// Amount debited (effective wager, zero for free spins).
    pub debited: Amount,
    /// Wager the round pays from.
    pub wager: Amount,
    /// Nonce used.
    pub nonce: u64,
    /// Commitment the round was played under.
    pub server_seed_hash: String,
    /// Events and aggregates.
    #[serde(flatten)]
    pub outcome: SpinOutcome,
}

/// Acknowledgement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// Accepted; more events remain.
    Acknowledged,
    /// Accepted; it was the last event.
    Complete,
}

/// Reply to an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeEventResponse {
    /// Acknowledgement state.
    pub status: AckStatus,
    /// Index accepted.
    pub event_index: u32,
}

/// Reply to `end-round`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndRoundResponse {
    /// Balance after the win is credited.
    pub balance: Amount,
    /// Round closed by this call; `None` if nothing was open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<String>,
    /// Win credited by this call.
    #[serde(default)]
    pub credited: Amount,
    /// Free spins left.
    #[serde(default)]
    pub free_spins_remaining: u32,
}

/// Reply to seed rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateSeedResponse {
    /// Server seed used until now.
    pub revealed_server_seed: String,
    /// Commitment the revealed seed was published under.
    pub previous_server_seed_hash: String,
    /// Commitment to the new server seed.
    pub new_server_seed_hash: String,
    /// Rounds played under the revealed seed, oldest first.
    #[serde(default)]
    pub rounds: Vec<RoundRecord>,
}

/// Reply to a bonus purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyBonusResponse {
    /// Purchase identifier.
    pub round_id: String,
    /// Balance after the purchase.
    pub balance: Amount,
    /// Price paid.
    pub cost: Amount,
    /// Nonce the feature content was drawn from.
    pub nonce: u64,
    /// Feature switched on.
    pub feature_activated: FeatureActivated,
    /// Drawn feature content, empty for fixed features.
    #[serde(default)]
    pub feature_detail: FeatureDetail,
}

/// Reply to a trigger spin. The award is pending until activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSpinResponse {
    /// Round identifier.
    pub round_id: String,
    /// Balance after the price is debited.
    pub balance: Amount,
    /// Price paid.
    pub cost: Amount,
    /// Nonce used.
    pub nonce: u64,
    /// Scatters that landed.
    pub scatter_count: u32,
    /// Commitment the spin was played under.
    pub server_seed_hash: String,
    /// Events and aggregates; `freeSpinsTriggered` is the pending award.
    #[serde(flatten)]
    pub outcome: SpinOutcome,
}

/// Reply to free spin activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateFreeSpinsResponse {
    /// Free spins now available.
    pub free_spins_remaining: u32,
    /// Starting spot grid, if preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipliers: Option<MultiplierGrid>,
    /// Balance (unchanged by activation).
    pub balance: Amount,
}

/// One catalog entry as served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusOptionInfo {
    /// Catalog id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Price as a multiple of the wager.
    pub cost_multiplier: u64,
    /// Volatility label.
    pub volatility: String,
    /// Feature switched on.
    pub feature: FeatureActivated,
}

impl From<&BonusOption> for BonusOptionInfo {
    fn from(option: &BonusOption) -> Self {
        Self {
            id: option.id.to_string(),
            name: option.name.to_string(),
            description: option.description.to_string(),
            cost_multiplier: option.cost_factor,
            volatility: option.volatility.to_string(),
            feature: option.feature,
        }
    }
}

/// Bonus catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusOptionsResponse {
    /// Purchasable bonuses.
    pub options: Vec<BonusOptionInfo>,
}

/// One jackpot tier as served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JackpotTierInfo {
    /// Tier id.
    pub tier: JackpotTier,
    /// Display name.
    pub name: String,
    /// Seed amount at the base bet.
    pub amount: Amount,
    /// Chance per eligible round.
    pub chance: f64,
    /// Minimum eligible wager.
    pub min_bet: Amount,
}

impl From<&TierConfig> for JackpotTierInfo {
    fn from(config: &TierConfig) -> Self {
        Self {
            tier: config.tier,
            name: config.name.to_string(),
            amount: config.seed_amount(),
            chance: config.chance,
            min_bet: config.min_bet(),
        }
    }
}

/// Jackpot tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JackpotInfoResponse {
    /// Tiers, highest first.
    pub tiers: Vec<JackpotTierInfo>,
}

/// Settled bets, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetHistoryResponse {
    /// Session identifier.
    pub session_id: String,
    /// Bets placed over the session's life, including those not returned.
    pub total_bets: usize,
    /// Most recent bets.
    pub history: Vec<RoundRecord>,
}

/// Pays of one symbol by cluster size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPays {
    /// Wire code.
    pub symbol: String,
    /// `(cluster size, pay)` from the smallest paying cluster up.
    pub pays: Vec<(usize, PayoutMultiplier)>,
}

/// Static game description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfoResponse {
    /// Game name.
    pub name: String,
    /// Server version.
    pub version: String,
    /// Grid rows.
    pub grid_rows: usize,
    /// Grid columns.
    pub grid_cols: usize,
    /// Smallest paying cluster.
    pub min_cluster_size: usize,
    /// Default wager limits.
    pub bet_config: BetConfig,
    /// Paytable.
    pub paytable: Vec<SymbolPays>,
    /// Purchasable bonuses.
    pub bonus_options: Vec<BonusOptionInfo>,
    /// Jackpot tiers, highest first.
    pub jackpot_tiers: Vec<JackpotTierInfo>,
}

/// Error status object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireStatus {
    /// Wire code (`ERR_*`).
    pub code: String,
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Status object.
    pub status: WireStatus,
}

// =============================================================================
// AUDIT RECORDS
// =============================================================================

/// Inputs a played round depended on besides seeds, nonce and wager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundInputs {
    /// A paid or free spin.
    #[serde(rename_all = "camelCase")]
    Spin {
        /// Base or free spin.
        mode: RoundMode,
        /// Boosts.
        modifiers: ModifierFlags,
        /// Free spins left before the round.
        free_spins_remaining: u32,
        /// Spot multipliers carried in.
        carried_multipliers: Option<MultiplierGrid>,
        /// Purchased feature applied to the round.
        feature: Option<NextRoundFeature>,
    },
    /// A bonus trigger spin.
    #[serde(rename_all = "camelCase")]
    TriggerSpin {
        /// Scatters forced onto the grid.
        scatter_count: u32,
        /// Award reported.
        free_spins: u32,
    },
    /// A bonus purchase.
    #[serde(rename_all = "camelCase")]
    Purchase {
        /// Feature bought.
        feature: FeatureActivated,
        /// Content drawn for it.
        detail: FeatureDetail,
    },
}

/// Played round as disclosed after rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    /// Round identifier.
    pub round_id: String,
    /// Nonce used.
    pub nonce: u64,
    /// Client seed used.
    pub client_seed: String,
    /// Wager the round paid from.
    pub wager: Amount,
    /// Remaining inputs.
    pub inputs: RoundInputs,
    /// Pay served.
    pub payout_multiplier: PayoutMultiplier,
    /// Win served.
    pub total_win: Amount,
    /// Number of events served.
    pub event_count: usize,
    /// Hex fingerprint of the served events.
    pub outcome_digest: String,
    /// When the round was played.
    pub played_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::spin::{run_spin, SpinParams};

    #[test]
    fn test_submit_request_wire_names() {
        let request = SubmitRoundRequest {
            session_id: "s".into(),
            wager: 100,
            client_seed: "c".into(),
            mode: RoundMode::Base,
            modifier_flags: ModifierFlags::default(),
            idempotency_key: "k".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["sessionId"], "s");
        assert_eq!(json["wager"], 100);
        assert_eq!(json["mode"], "base");
        assert_eq!(json["modifierFlags"]["scatterBoost"], false);
        assert_eq!(json["idempotencyKey"], "k");
    }

    #[test]
    fn test_round_response_is_flat() {
        let outcome = run_spin(&SpinParams::base("s", "c", 0, 100)).unwrap();
        let response = RoundResponse {
            round_id: "r".into(),
            balance: 900,
            debited: 100,
            wager: 100,
            nonce: 0,
            server_seed_hash: "h".into(),
            outcome,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["events"].is_array());
        assert!(json["tumbleCount"].is_u64());
        assert!(json["isFreeSpin"].is_boolean());
        let back: RoundResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_error_body_shape() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"status":{"code":"ERR_IPB","message":"Insufficient balance"}}"#).unwrap();
        assert_eq!(body.status.code, "ERR_IPB");
        assert_eq!(body.status.message.as_deref(), Some("Insufficient balance"));
    }

    #[test]
    fn test_round_inputs_tagged() {
        let inputs = RoundInputs::TriggerSpin { scatter_count: 3, free_spins: 8 };
        let json = serde_json::to_value(&inputs).unwrap();
        assert_eq!(json["kind"], "trigger_spin");
        assert_eq!(json["scatterCount"], 3);
    }
}
