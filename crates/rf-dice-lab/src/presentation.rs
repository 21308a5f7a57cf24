//! Shop view model and an event-driven presenter
//!
//! [`ShopView`] is rebuilt from a session on demand. [`ShopPresenter`] is a
//! [`DiceObserver`] that keeps the cheap parts (balance, rolls, result line)
//! current between rebuilds and flags when a rebuild is due.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::PayoutApplication;
use crate::events::{DiceEvent, DiceObserver};
use crate::session::DiceSession;

/// Labels and button states for the shop panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopView {
    pub money_label: String,
    pub rolls_label: String,
    /// `None` once every slot is unlocked
    pub buy_die_label: Option<String>,
    pub upgrade_label: String,
    pub can_roll: bool,
    pub can_apply_payout: bool,
    pub can_buy_die: bool,
    pub can_upgrade: bool,
}

impl ShopView {
    /// Build the view; `upgrade_index` is the die the upgrade button targets
    pub fn from_session(session: &DiceSession, upgrade_index: usize) -> Self {
        let balance = session.balance();
        let idle = !session.is_rolling();

        let unlock_cost = session.has_inactive_slot().then(|| session.next_unlock_cost());
        let upgrade_cost = session.next_upgrade_cost();
        let upgradable = session
            .dice()
            .get(upgrade_index)
            .is_some_and(|d| !d.is_upgraded());

        let manual = session.config().payout.application == PayoutApplication::Manual;

        Self {
            money_label: format!("Money: {balance}"),
            rolls_label: format!("Rolls: {}", session.rolls_left()),
            buy_die_label: unlock_cost.map(|cost| format!("Buy Die: {cost}")),
            upgrade_label: format!("Upgrade (die {upgrade_index}): {upgrade_cost}"),
            can_roll: idle && session.can_roll() && session.active_dice_count() > 0,
            can_apply_payout: manual && session.unapplied_payout() > 0,
            can_buy_die: idle && unlock_cost.is_some_and(|cost| balance >= cost),
            can_upgrade: upgradable && balance >= upgrade_cost,
        }
    }
}

/// State tracked by [`ShopPresenter`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenterState {
    pub balance: i64,
    pub rolls_left: u32,
    pub result_line: Option<String>,
    pub rolling: bool,
    /// Set whenever the shop labels may be stale
    pub dirty: bool,
}

/// Observer half of the shop panel; clone it to read from the host side
#[derive(Debug, Clone, Default)]
pub struct ShopPresenter {
    state: Arc<Mutex<PresenterState>>,
}

impl ShopPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the session's current values
    pub fn for_session(session: &DiceSession) -> Self {
        let presenter = Self::new();
        {
            let mut state = presenter.state.lock();
            state.balance = session.balance();
            state.rolls_left = session.rolls_left();
            state.rolling = session.is_rolling();
            state.dirty = true;
        }
        presenter
    }

    pub fn state(&self) -> PresenterState {
        self.state.lock().clone()
    }

    /// Returns whether a refresh was due, and clears the flag
    pub fn take_dirty(&self) -> bool {
        std::mem::take(&mut self.state.lock().dirty)
    }
}

impl DiceObserver for ShopPresenter {
    fn on_event(&mut self, event: &DiceEvent) {
        let mut state = self.state.lock();
        match event {
            DiceEvent::CycleStarted { .. } => {
                state.rolling = true;
                state.result_line = None;
            }
            DiceEvent::DieSettled { .. } => return,
            DiceEvent::PayoutComputed { sum, payout, .. } => {
                state.rolling = false;
                state.result_line = Some(format!("Sum: {sum}  Payout: {payout}"));
            }
            DiceEvent::CycleAborted { .. } => state.rolling = false,
            DiceEvent::RollsChanged { rolls_left } => state.rolls_left = *rolls_left,
            DiceEvent::BalanceChanged { balance } => state.balance = *balance,
            DiceEvent::DieUnlocked { .. } | DiceEvent::DieUpgraded { .. } => {}
        }
        state.dirty = true;
    }
}
