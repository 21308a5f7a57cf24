//! Player economy: balance, rolls budget and the last cycle's result

use serde::{Deserialize, Serialize};

use crate::config::{DiceConfig, PayoutApplication};
use crate::error::{DiceError, DiceResult};
use crate::payout::CycleOutcome;

/// Balance, rolls and last-outcome bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Economy {
    balance: i64,
    rolls_left: u32,
    rolls_per_reset: u32,
    reset_rolls_on_payout: bool,
    application: PayoutApplication,
    guard_reapply: bool,
    last_faces: Vec<u8>,
    last_sum: i64,
    last_payout: i64,
    /// Portion of `last_payout` not yet credited
    unapplied_payout: i64,
}

impl Economy {
    pub fn new(config: &DiceConfig) -> Self {
        Self {
            balance: config.starting_balance,
            rolls_left: config.starting_rolls,
            rolls_per_reset: config.rolls_per_reset,
            reset_rolls_on_payout: config.reset_rolls_on_payout,
            application: config.payout.application,
            guard_reapply: config.payout.guard_reapply,
            last_faces: vec![0; config.capacity],
            last_sum: 0,
            last_payout: 0,
            unapplied_payout: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BALANCE
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Signed manual adjustment
    pub fn deposit(&mut self, amount: i64) -> i64 {
        self.balance = self.balance.saturating_add(amount);
        self.balance
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        self.balance >= cost
    }

    /// Deduct `cost`, or fail without touching the balance
    pub fn try_debit(&mut self, cost: i64) -> DiceResult<i64> {
        if !self.can_afford(cost) {
            return Err(DiceError::InsufficientFunds {
                cost,
                balance: self.balance,
            });
        }
        self.balance -= cost;
        Ok(self.balance)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROLLS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn rolls_left(&self) -> u32 {
        self.rolls_left
    }

    pub fn rolls_per_reset(&self) -> u32 {
        self.rolls_per_reset
    }

    pub fn can_roll(&self) -> bool {
        self.rolls_left > 0
    }

    /// Spend one roll
    pub fn consume_roll(&mut self) -> DiceResult<u32> {
        if self.rolls_left == 0 {
            return Err(DiceError::NoRollsLeft);
        }
        self.rolls_left -= 1;
        Ok(self.rolls_left)
    }

    pub fn add_rolls(&mut self, amount: u32) -> DiceResult<u32> {
        if amount == 0 {
            return Err(DiceError::InvalidAmount);
        }
        self.rolls_left = self.rolls_left.saturating_add(amount);
        Ok(self.rolls_left)
    }

    /// Rolls needed to get back up to `rolls_per_reset`
    pub fn refill_shortfall(&self) -> u32 {
        self.rolls_per_reset.saturating_sub(self.rolls_left)
    }

    /// Buy a permanent +1 to `rolls_per_reset`
    pub fn try_purchase_extra_roll(&mut self, cost: i64) -> DiceResult<u32> {
        if cost < 0 {
            return Err(DiceError::InvalidAmount);
        }
        self.try_debit(cost)?;
        self.rolls_per_reset = self.rolls_per_reset.saturating_add(1);
        Ok(self.rolls_per_reset)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PAYOUTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Store a completed cycle. Returns the amount credited (auto mode only).
    pub fn record_outcome(&mut self, outcome: &CycleOutcome) -> i64 {
        self.last_faces = outcome.faces();
        self.last_sum = outcome.sum;
        self.last_payout = outcome.payout;
        self.unapplied_payout = outcome.payout;

        match self.application {
            PayoutApplication::Auto => {
                self.balance = self.balance.saturating_add(outcome.payout);
                self.unapplied_payout = 0;
                outcome.payout
            }
            PayoutApplication::Manual => 0,
        }
    }

    /// Credit the last payout. Returns `(credited, refilled_rolls)`.
    ///
    /// With `guard_reapply`, only the not-yet-credited part is added, so
    /// repeated calls credit 0.
    pub fn apply_last_payout(&mut self) -> (i64, Option<u32>) {
        let credited = if self.guard_reapply {
            std::mem::take(&mut self.unapplied_payout)
        } else {
            self.last_payout
        };
        self.balance = self.balance.saturating_add(credited);

        if !self.reset_rolls_on_payout {
            return (credited, None);
        }
        self.rolls_left = self.rolls_per_reset;
        (credited, Some(self.rolls_left))
    }

    pub fn application(&self) -> PayoutApplication {
        self.application
    }

    pub fn last_faces(&self) -> &[u8] {
        &self.last_faces
    }

    pub fn last_sum(&self) -> i64 {
        self.last_sum
    }

    pub fn last_payout(&self) -> i64 {
        self.last_payout
    }

    pub fn unapplied_payout(&self) -> i64 {
        self.unapplied_payout
    }

    /// Forget the last cycle
    pub fn clear_last(&mut self) {
        self.last_faces.iter_mut().for_each(|f| *f = 0);
        self.last_sum = 0;
        self.last_payout = 0;
        self.unapplied_payout = 0;
    }
}
