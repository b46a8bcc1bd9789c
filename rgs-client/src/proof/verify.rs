//! Verification API
//!
//! Recompute rounds from a revealed server seed and compare them with what
//! was served. Everything here is pure; it runs on audit, never per round.

use crate::core::hash::{fingerprint, OUTCOME_DOMAIN};
use crate::core::money::{format_amount, Amount, PayoutMultiplier};
use crate::core::rng::{InvalidSeedKey, ProvablyFairRng};
use crate::game::bonus::FeatureDetail;
use crate::game::events::RoundEvent;
use crate::game::spin::{run_bonus_trigger_spin, run_spin, SpinOutcome, SpinParams};
use crate::network::protocol::{RoundInputs, RoundRecord};
use crate::proof::commitment::{CommitmentError, SeedCommitment, SeedReveal};
use crate::error::RgsError;

/// Hex fingerprint of an event list.
pub fn outcome_digest(events: &[RoundEvent]) -> String {
    fingerprint(OUTCOME_DOMAIN, &events).map(hex::encode).unwrap_or_default()
}

/// Hex fingerprint of purchased feature content.
pub fn detail_digest(detail: &FeatureDetail) -> String {
    fingerprint(OUTCOME_DOMAIN, detail).map(hex::encode).unwrap_or_default()
}

/// Recompute a plain base round.
///
/// Stateless: same inputs, same outcome. Compare the result with the
/// served outcome using [`compare_outcomes`].
pub fn verify_round(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    wager: Amount,
) -> Result<SpinOutcome, InvalidSeedKey> {
    run_spin(&SpinParams::base(server_seed, client_seed, nonce, wager))
}

/// A divergence between served and recomputed data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
    /// Round the client was served is missing from the disclosure.
    #[error("round {0} was served but not disclosed")]
    Undisclosed(String),

    /// A value differs.
    #[error("{field}: served {served}, recomputed {computed}")]
    Field {
        /// Which value.
        field: &'static str,
        /// Value served or disclosed.
        served: String,
        /// Value recomputed.
        computed: String,
    },

    /// Inputs could not be replayed.
    #[error("cannot recompute: {0}")]
    Recompute(String),
}

fn field<T: PartialEq + ToString>(out: &mut Vec<Mismatch>, name: &'static str, served: T, computed: T) {
    if served != computed {
        out.push(Mismatch::Field {
            field: name,
            served: served.to_string(),
            computed: computed.to_string(),
        });
    }
}

/// Compare a served outcome with a recomputed one.
pub fn compare_outcomes(served: &SpinOutcome, computed: &SpinOutcome) -> Vec<Mismatch> {
    let mut out = Vec::new();
    field(&mut out, "events", outcome_digest(&served.events), outcome_digest(&computed.events));
    field(&mut out, "payoutMultiplier", served.payout_multiplier, computed.payout_multiplier);
    field(&mut out, "totalWin", served.total_win, computed.total_win);
    field(&mut out, "tumbleCount", served.tumble_count, computed.tumble_count);
    field(&mut out, "maxMultiplier", served.max_multiplier, computed.max_multiplier);
    field(&mut out, "freeSpinsRemaining", served.free_spins_remaining, computed.free_spins_remaining);
    field(&mut out, "isFreeSpin", served.is_free_spin, computed.is_free_spin);
    out
}

// =============================================================================
// ROTATION AUDIT
// =============================================================================

/// What the client was served for one round, logged at play time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServedRound {
    /// Round identifier.
    pub round_id: String,
    /// Nonce reported.
    pub nonce: u64,
    /// Client seed sent.
    pub client_seed: String,
    /// Wager the round paid from.
    pub wager: Amount,
    /// Fingerprint of the events (or feature content) served.
    pub outcome_digest: String,
    /// Pay served.
    pub payout_multiplier: PayoutMultiplier,
    /// Win served.
    pub total_win: Amount,
}

/// Values recomputed from a disclosed record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recomputed {
    /// Fingerprint of the recomputed events or feature content.
    pub outcome_digest: String,
    /// Recomputed pay.
    pub payout_multiplier: PayoutMultiplier,
    /// Recomputed win.
    pub total_win: Amount,
    /// Recomputed event count.
    pub event_count: usize,
}

/// Replay a disclosed record under the revealed seed.
pub fn recompute_record(server_seed: &str, record: &RoundRecord) -> Result<Recomputed, InvalidSeedKey> {
    let outcome = match &record.inputs {
        RoundInputs::Spin {
            mode,
            modifiers,
            free_spins_remaining,
            carried_multipliers,
            feature,
        } => run_spin(&SpinParams {
            server_seed: server_seed.to_string(),
            client_seed: record.client_seed.clone(),
            nonce: record.nonce,
            wager: record.wager,
            mode: *mode,
            modifiers: *modifiers,
            free_spins_remaining: *free_spins_remaining,
            carried_multipliers: *carried_multipliers,
            feature: feature.clone(),
        })?,
        RoundInputs::TriggerSpin { scatter_count, free_spins } => run_bonus_trigger_spin(
            server_seed,
            &record.client_seed,
            record.nonce,
            *scatter_count as usize,
            *free_spins,
        )?,
        RoundInputs::Purchase { feature, .. } => {
            let mut rng = ProvablyFairRng::new(server_seed, &record.client_seed, record.nonce)?;
            let detail = feature.derive_detail(&mut rng);
            return Ok(Recomputed {
                outcome_digest: detail_digest(&detail),
                payout_multiplier: PayoutMultiplier::ZERO,
                total_win: 0,
                event_count: 0,
            });
        }
    };
    Ok(Recomputed {
        outcome_digest: outcome_digest(&outcome.events),
        payout_multiplier: outcome.payout_multiplier,
        total_win: outcome.total_win,
        event_count: outcome.events.len(),
    })
}

/// Result of checking one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundCheck {
    /// Round identifier.
    pub round_id: String,
    /// Nonce the round was played at.
    pub nonce: u64,
    /// Divergences found.
    pub mismatches: Vec<Mismatch>,
}

impl RoundCheck {
    /// No divergence.
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Result of auditing a rotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    /// Reveal check against the held commitment.
    pub commitment: Result<(), CommitmentError>,
    /// One entry per disclosed or served round.
    pub rounds: Vec<RoundCheck>,
}

impl AuditReport {
    /// Reveal opens the commitment and every round matches.
    pub fn is_valid(&self) -> bool {
        self.commitment.is_ok() && self.rounds.iter().all(RoundCheck::is_valid)
    }

    /// Rounds with divergences.
    pub fn failures(&self) -> impl Iterator<Item = &RoundCheck> {
        self.rounds.iter().filter(|check| !check.is_valid())
    }

    /// Turn a failed audit into a trust-critical error.
    pub fn into_result(self) -> Result<AuditReport, RgsError> {
        if let Err(err) = &self.commitment {
            return Err(err.clone().into());
        }
        let failed: Vec<String> = self
            .failures()
            .map(|check| {
                let reasons: Vec<String> = check.mismatches.iter().map(|m| m.to_string()).collect();
                format!("round {} (nonce {}): {}", check.round_id, check.nonce, reasons.join("; "))
            })
            .collect();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(RgsError::FairnessVerificationMismatch(failed.join(" | ")))
        }
    }
}

/// Audit every round played under a revealed seed.
///
/// Each disclosed record is replayed and must reproduce its own digest,
/// pay and win. Each round the client logged must be disclosed with the
/// same nonce, client seed, wager and digest as served.
pub fn audit_rotation(
    commitment: &SeedCommitment,
    reveal: &SeedReveal,
    served: &[ServedRound],
    records: &[RoundRecord],
) -> AuditReport {
    let commitment_check = reveal.verify(commitment);
    let mut rounds = Vec::with_capacity(records.len().max(served.len()));

    for record in records {
        let mut mismatches = Vec::new();
        if commitment_check.is_ok() {
            match recompute_record(&reveal.server_seed, record) {
                Ok(computed) => {
                    field(&mut mismatches, "outcomeDigest", record.outcome_digest.clone(), computed.outcome_digest);
                    field(&mut mismatches, "payoutMultiplier", record.payout_multiplier, computed.payout_multiplier);
                    field(&mut mismatches, "totalWin", format_amount(record.total_win), format_amount(computed.total_win));
                    field(&mut mismatches, "eventCount", record.event_count, computed.event_count);
                }
                Err(err) => mismatches.push(Mismatch::Recompute(err.to_string())),
            }
        }
        if let Some(seen) = served.iter().find(|s| s.round_id == record.round_id) {
            field(&mut mismatches, "nonce", seen.nonce, record.nonce);
            field(&mut mismatches, "clientSeed", seen.client_seed.clone(), record.client_seed.clone());
            field(&mut mismatches, "wager", format_amount(seen.wager), format_amount(record.wager));
            field(&mut mismatches, "servedDigest", seen.outcome_digest.clone(), record.outcome_digest.clone());
            field(&mut mismatches, "servedPayout", seen.payout_multiplier, record.payout_multiplier);
        }
        rounds.push(RoundCheck {
            round_id: record.round_id.clone(),
            nonce: record.nonce,
            mismatches,
        });
    }

    for seen in served {
        if !records.iter().any(|r| r.round_id == seen.round_id) {
            rounds.push(RoundCheck {
                round_id: seen.round_id.clone(),
                nonce: seen.nonce,
                mismatches: vec![Mismatch::Undisclosed(seen.round_id.clone())],
            });
        }
    }

    AuditReport { commitment: commitment_check, rounds }
}

// =============================================================================
// TESTS
// =============================================================================
