//! Bet Configuration
//!
//! Wager limits served with the session. Validation happens client-side
//! before submission and again on the server.

use serde::{Deserialize, Serialize};

use crate::core::money::{format_amount, Amount, MONETARY_SCALE};
use crate::error::{Result, RgsError};

/// Wager limits for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetConfig {
    /// Smallest wager.
    pub min_bet: Amount,
    /// Largest wager.
    pub max_bet: Amount,
    /// Wagers must be multiples of this.
    pub step_bet: Amount,
    /// Wager preselected by the UI.
    pub default_bet: Amount,
    /// Quick-pick levels.
    #[serde(default)]
    pub bet_levels: Vec<Amount>,
    /// ISO 4217 currency code.
    pub currency: String,
}

impl Default for BetConfig {
    fn default() -> Self {
        let m = MONETARY_SCALE;
        Self {
            min_bet: m / 10,
            max_bet: 100 * m,
            step_bet: m / 10,
            default_bet: m,
            bet_levels: vec![
                m / 10,
                m / 5,
                m / 2,
                m,
                2 * m,
                5 * m,
                10 * m,
                20 * m,
                50 * m,
                100 * m,
            ],
            currency: "USD".to_string(),
        }
    }
}

impl BetConfig {
    /// Limits with no quick-pick levels.
    pub fn new(min_bet: Amount, max_bet: Amount, step_bet: Amount) -> Self {
        Self {
            min_bet,
            max_bet,
            step_bet,
            default_bet: min_bet,
            bet_levels: Vec::new(),
            currency: "USD".to_string(),
        }
    }

    /// Check `wager` against min, max and step.
    pub fn validate(&self, wager: Amount) -> Result<()> {
        if wager < self.min_bet {
            return Err(RgsError::InvalidWager(format!(
                "wager {} is below the minimum {}",
                format_amount(wager),
                format_amount(self.min_bet)
            )));
        }
        if wager > self.max_bet {
            return Err(RgsError::InvalidWager(format!(
                "wager {} is above the maximum {}",
                format_amount(wager),
                format_amount(self.max_bet)
            )));
        }
        if self.step_bet > 0 && wager % self.step_bet != 0 {
            return Err(RgsError::InvalidWager(format!(
                "wager {} is not a multiple of the step {}",
                format_amount(wager),
                format_amount(self.step_bet)
            )));
        }
        Ok(())
    }

    /// Whether `wager` passes `validate`.
    pub fn accepts(&self, wager: Amount) -> bool {
        self.validate(wager).is_ok()
    }
}
