//! Dice Session: roll cycles, payouts and purchases behind one context object

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::{DiceConfig, Pose};
use crate::cycle::{CycleId, RollCycle, SettleOutcome};
use crate::die::{Die, DieId};
use crate::economy::Economy;
use crate::error::{ConfigError, DiceError, DiceResult};
use crate::events::{DiceEvent, DiceObserver, EventHub, SubscriptionId};
use crate::payout::{CycleOutcome, SlotResult};

/// Successful unlock purchase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnlockReceipt {
    pub die: DieId,
    pub cost: i64,
    pub pose: Pose,
    pub balance: i64,
}

/// Successful upgrade purchase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpgradeReceipt {
    pub die: DieId,
    pub cost: i64,
    pub multiplier: f64,
    pub balance: i64,
}

/// Per-die view for presentation and export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieSnapshot {
    pub id: DieId,
    pub active: bool,
    pub upgraded: bool,
    pub multiplier: f64,
    pub face: u8,
    pub settling: bool,
    pub pose: Pose,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub balance: i64,
    pub rolls_left: u32,
    pub rolls_per_reset: u32,
    pub rolling: bool,
    pub cycle: CycleId,
    pub active_dice: usize,
    pub upgraded_dice: usize,
    pub next_unlock_cost: Option<i64>,
    pub next_upgrade_cost: i64,
    pub last_faces: Vec<u8>,
    pub last_sum: i64,
    pub last_payout: i64,
    pub unapplied_payout: i64,
    pub dice: Vec<DieSnapshot>,
}

/// Session statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    pub total_payout: i64,
    pub total_spent: i64,
    pub best_payout: i64,
    pub dice_unlocked: u64,
    pub dice_upgraded: u64,
}

impl SessionStats {
    /// Average payout per completed cycle
    pub fn mean_payout(&self) -> f64 {
        if self.cycles_completed > 0 {
            self.total_payout as f64 / self.cycles_completed as f64
        } else {
            0.0
        }
    }
}

/// Dice Session
///
/// Owns the dice, the roll cycle, the economy and the event hub. Not
/// thread-safe: every mutation goes through `&mut self`, so settle reports
/// and purchases are serialized by construction. See
/// [`SessionRunner`](crate::runtime::SessionRunner) for driving a session
/// from other threads.
#[derive(Debug)]
pub struct DiceSession {
    config: DiceConfig,
    dice: Vec<Die>,
    cycle: RollCycle,
    economy: Economy,
    events: EventHub,
    rng: ChaCha8Rng,
    stats: SessionStats,
}

impl DiceSession {
    /// Create a session with an entropy-seeded RNG
    pub fn new(config: DiceConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, ChaCha8Rng::from_os_rng())
    }

    /// Create a reproducible session
    pub fn with_seed(config: DiceConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(config: DiceConfig, rng: ChaCha8Rng) -> Result<Self, ConfigError> {
        config.validate()?;

        let dice = (0..config.capacity)
            .map(|i| {
                let mut die = Die::new(DieId(i));
                die.place(config.spawn.pose_for(i));
                if i < config.starting_active {
                    die.set_active(true);
                }
                die
            })
            .collect();

        log::debug!(
            "DiceSession '{}': {} of {} dice active, {} rolls",
            config.name,
            config.starting_active,
            config.capacity,
            config.starting_rolls
        );

        Ok(Self {
            economy: Economy::new(&config),
            config,
            dice,
            cycle: RollCycle::new(),
            events: EventHub::new(),
            rng,
            stats: SessionStats::default(),
        })
    }

    /// Reseed the RNG for reproducible rolls
    pub fn seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OBSERVERS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn subscribe(&mut self, observer: impl DiceObserver + 'static) -> SubscriptionId {
        self.events.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROLL CYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Spend a roll and start every active die
    pub fn roll_all(&mut self) -> DiceResult<CycleId> {
        if self.cycle.is_in_flight() {
            log::debug!("roll_all ignored: already rolling");
            return Err(DiceError::Busy);
        }
        if !self.economy.can_roll() {
            log::debug!("roll_all ignored: no rolls left");
            return Err(DiceError::NoRollsLeft);
        }
        if self.active_dice_count() == 0 {
            log::debug!("roll_all ignored: no active dice");
            return Err(DiceError::DegenerateCycle);
        }

        let cycle = self.cycle.begin()?;
        let rolls_left = self.economy.consume_roll()?;
        self.events.emit(DiceEvent::RollsChanged { rolls_left });
        self.events.emit(DiceEvent::CycleStarted { cycle });

        let profile = self.config.settle;
        for die in self.dice.iter_mut().filter(|d| d.is_active()) {
            // no die can still be settling once a cycle has closed
            if let Err(err) = die.roll(&mut self.rng, &profile) {
                log::warn!("die {} did not roll: {}", die.id(), err);
            }
        }
        Ok(cycle)
    }

    /// Advance all settle timers by `dt_ms`; returns the outcome if the cycle completed
    pub fn tick(&mut self, dt_ms: u64) -> Option<CycleOutcome> {
        let settled: Vec<(DieId, u8)> = self
            .dice
            .iter_mut()
            .filter(|d| d.is_active())
            .filter_map(|d| d.tick(dt_ms).map(|face| (d.id(), face)))
            .collect();

        let mut completed = None;
        for (die, face) in settled {
            log::debug!("die {} settled on {}", die, face);
            self.events.emit(DiceEvent::DieSettled { die, face });
            if let SettleOutcome::Completed(outcome) = self.accept_report(die, face) {
                completed = Some(outcome);
            }
        }
        completed
    }

    /// Tick in check-interval steps until the open cycle closes
    pub fn settle_pending(&mut self) -> Option<CycleOutcome> {
        let step = self.config.settle.check_interval_ms;
        for _ in 0..self.config.settle.max_checks() {
            if !self.cycle.is_in_flight() {
                break;
            }
            if let Some(outcome) = self.tick(step) {
                return Some(outcome);
            }
        }
        None
    }

    /// Record a face reported by an external settle source
    pub fn report_settle(&mut self, die: DieId, face: u8) -> SettleOutcome {
        if !(1..=6).contains(&face) {
            log::debug!("settle report from {} with impossible face {}", die, face);
            return SettleOutcome::Ignored;
        }
        let Some(target) = self.dice.get_mut(die.0) else {
            log::debug!("settle report from unknown die {}", die);
            return SettleOutcome::Ignored;
        };
        if self.cycle.is_in_flight() && target.is_active() {
            target.settle_with(face);
            self.events.emit(DiceEvent::DieSettled { die, face });
        }
        self.accept_report(die, face)
    }

    fn accept_report(&mut self, die: DieId, face: u8) -> SettleOutcome {
        if !self.cycle.is_in_flight() {
            log::debug!("settle report from {} outside a cycle", die);
            return SettleOutcome::Ignored;
        }

        if self.active_dice_count() > 0 && !self.dice.get(die.0).is_some_and(Die::is_active) {
            log::debug!("settle report from inactive die {}", die);
            return SettleOutcome::Ignored;
        }

        self.cycle.record(die, face);
        self.check_completion()
    }

    /// Complete, abort or keep waiting, based on the reports held so far
    fn check_completion(&mut self) -> SettleOutcome {
        let active = self.active_dice_count();
        if active == 0 {
            let cycle = self.cycle.current();
            log::warn!("{}: no active dice left, aborting", cycle);
            self.abort_cycle();
            return SettleOutcome::Aborted;
        }

        if !self.cycle.is_complete(active) {
            return SettleOutcome::Recorded {
                pending: active.saturating_sub(self.cycle.reported()),
            };
        }

        SettleOutcome::Completed(self.complete_cycle())
    }

    fn abort_cycle(&mut self) {
        let cycle = self.cycle.current();
        self.cycle.close();
        self.stats.cycles_aborted += 1;
        self.events.emit(DiceEvent::CycleAborted { cycle });
    }

    fn complete_cycle(&mut self) -> CycleOutcome {
        let slots = self
            .dice
            .iter()
            .map(|d| {
                if !d.is_active() {
                    return SlotResult::inactive();
                }
                let face = self.cycle.face_of(d.id()).unwrap_or(0);
                let multiplier = d.is_upgraded().then(|| d.upgrade_multiplier());
                SlotResult::active(face, multiplier)
            })
            .collect();

        let outcome = CycleOutcome::evaluate(self.cycle.current(), slots, &self.config.payout.mode);
        log::info!("All dice stopped: {}", outcome);

        let credited = self.economy.record_outcome(&outcome);
        self.stats.cycles_completed += 1;
        self.stats.total_payout = self.stats.total_payout.saturating_add(outcome.payout);
        self.stats.best_payout = self.stats.best_payout.max(outcome.payout);

        self.events.emit(DiceEvent::PayoutComputed {
            cycle: outcome.cycle,
            payout: outcome.payout,
            sum: outcome.sum,
        });
        if credited != 0 {
            self.events.emit(DiceEvent::BalanceChanged {
                balance: self.economy.balance(),
            });
        }

        self.cycle.close();
        outcome
    }

    /// Reset every die, drop any in-flight cycle, and refill rolls to `rolls_per_reset`
    pub fn soft_reset(&mut self) {
        let cancelled = self
            .dice
            .iter_mut()
            .map(|d| d.reset_to_start())
            .filter(|&c| c)
            .count();
        if self.cycle.is_in_flight() {
            log::debug!("soft reset dropped {} ({} dice cancelled)", self.cycle.current(), cancelled);
            self.abort_cycle();
        }

        self.events.emit(DiceEvent::RollsChanged {
            rolls_left: self.economy.rolls_left(),
        });
        // a zero shortfall is rejected, so a full budget emits nothing more
        if let Ok(rolls_left) = self.economy.add_rolls(self.economy.refill_shortfall()) {
            self.events.emit(DiceEvent::RollsChanged { rolls_left });
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ECONOMY
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn add_rolls(&mut self, amount: u32) -> DiceResult<u32> {
        let rolls_left = self.economy.add_rolls(amount)?;
        self.events.emit(DiceEvent::RollsChanged { rolls_left });
        Ok(rolls_left)
    }

    /// Credit the last payout; returns the amount credited
    pub fn apply_last_payout(&mut self) -> i64 {
        let (credited, refilled) = self.economy.apply_last_payout();
        log::debug!("applied payout {}", credited);
        self.events.emit(DiceEvent::BalanceChanged {
            balance: self.economy.balance(),
        });
        if let Some(rolls_left) = refilled {
            self.events.emit(DiceEvent::RollsChanged { rolls_left });
        }
        credited
    }

    /// Signed manual balance adjustment
    pub fn deposit(&mut self, amount: i64) -> i64 {
        let balance = self.economy.deposit(amount);
        self.events.emit(DiceEvent::BalanceChanged { balance });
        balance
    }

    /// Raise `rolls_per_reset` by one for `cost`
    pub fn try_purchase_extra_roll(&mut self, cost: i64) -> DiceResult<u32> {
        let per_reset = self.economy.try_purchase_extra_roll(cost)?;
        self.stats.total_spent += cost;
        self.events.emit(DiceEvent::BalanceChanged {
            balance: self.economy.balance(),
        });
        Ok(per_reset)
    }

    /// Forget the last outcome and any partial reports
    pub fn clear_last(&mut self) {
        self.economy.clear_last();
        if self.cycle.is_in_flight() {
            self.cycle.clear_reports();
            log::debug!("cleared reports of {}", self.cycle.current());
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROGRESSION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Cost of the next unlock, keyed by the current active count
    pub fn next_unlock_cost(&self) -> i64 {
        self.config.unlock.cost_at(self.active_dice_count())
    }

    pub fn try_unlock_next_die(&mut self) -> DiceResult<UnlockReceipt> {
        if self.cycle.is_in_flight() {
            return Err(DiceError::Busy);
        }
        let index = self
            .dice
            .iter()
            .position(|d| !d.is_active())
            .ok_or(DiceError::NoInactiveSlot)?;
        let cost = self.next_unlock_cost();
        let balance = self.economy.try_debit(cost)?;

        let pose = self.config.spawn.pose_for(index);
        let die = &mut self.dice[index];
        die.place(pose);
        die.set_active(true);
        die.reset_to_start();

        let id = die.id();
        self.stats.total_spent += cost;
        self.stats.dice_unlocked += 1;
        log::info!("Unlocked die {} for {} (balance {})", id, cost, balance);

        self.events.emit(DiceEvent::DieUnlocked { die: id, cost });
        self.events.emit(DiceEvent::BalanceChanged { balance });

        Ok(UnlockReceipt {
            die: id,
            cost,
            pose,
            balance,
        })
    }

    /// Take a die out of play.
    ///
    /// Its report, if any, is dropped and an in-flight cycle is re-checked
    /// at once: it completes if every remaining die has reported, and aborts
    /// if no active die is left. Returns `Ignored` when no cycle is in flight.
    pub fn deactivate_die(&mut self, index: usize) -> DiceResult<SettleOutcome> {
        let die = self.dice.get_mut(index).ok_or(DiceError::InvalidIndex(index))?;
        let id = die.id();
        if !die.is_active() {
            return Err(DiceError::Inactive(id));
        }
        die.reset_to_start();
        die.set_active(false);
        log::debug!("deactivated die {}", id);

        if !self.cycle.is_in_flight() {
            return Ok(SettleOutcome::Ignored);
        }
        self.cycle.forget(id);
        Ok(self.check_completion())
    }

    /// Cost of the next upgrade, keyed by the global upgraded count
    pub fn next_upgrade_cost(&self) -> i64 {
        self.config.upgrade.cost.cost_at(self.upgraded_count())
    }

    /// Upgrade cost for a die; identical for every valid index
    pub fn upgrade_cost(&self, index: usize) -> DiceResult<i64> {
        if index >= self.dice.len() {
            return Err(DiceError::InvalidIndex(index));
        }
        Ok(self.next_upgrade_cost())
    }

    pub fn try_upgrade_die(&mut self, index: usize) -> DiceResult<UpgradeReceipt> {
        let cost = self.upgrade_cost(index)?;
        let id = DieId(index);
        if self.dice[index].is_upgraded() {
            return Err(DiceError::AlreadyUpgraded(id));
        }
        let balance = self.economy.try_debit(cost)?;

        let multiplier = self.config.upgrade.default_multiplier;
        self.dice[index].upgrade(multiplier)?;

        self.stats.total_spent += cost;
        self.stats.dice_upgraded += 1;
        log::info!("Upgraded die {} to x{} for {}", id, multiplier, cost);

        self.events.emit(DiceEvent::DieUpgraded {
            die: id,
            cost,
            multiplier,
        });
        self.events.emit(DiceEvent::BalanceChanged { balance });

        Ok(UpgradeReceipt {
            die: id,
            cost,
            multiplier,
            balance,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &DiceConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn dice(&self) -> &[Die] {
        &self.dice
    }

    pub fn rolls_left(&self) -> u32 {
        self.economy.rolls_left()
    }

    pub fn can_roll(&self) -> bool {
        self.economy.can_roll()
    }

    pub fn is_rolling(&self) -> bool {
        self.cycle.is_in_flight()
    }

    pub fn last_faces(&self) -> Vec<u8> {
        self.economy.last_faces().to_vec()
    }

    pub fn last_sum(&self) -> i64 {
        self.economy.last_sum()
    }

    pub fn last_payout(&self) -> i64 {
        self.economy.last_payout()
    }

    pub fn unapplied_payout(&self) -> i64 {
        self.economy.unapplied_payout()
    }

    pub fn rolls_per_reset(&self) -> u32 {
        self.economy.rolls_per_reset()
    }

    pub fn balance(&self) -> i64 {
        self.economy.balance()
    }

    pub fn active_dice_count(&self) -> usize {
        self.dice.iter().filter(|d| d.is_active()).count()
    }

    pub fn upgraded_count(&self) -> usize {
        self.dice.iter().filter(|d| d.is_upgraded()).count()
    }

    pub fn has_inactive_slot(&self) -> bool {
        self.dice.iter().any(|d| !d.is_active())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            balance: self.balance(),
            rolls_left: self.rolls_left(),
            rolls_per_reset: self.rolls_per_reset(),
            rolling: self.is_rolling(),
            cycle: self.cycle.current(),
            active_dice: self.active_dice_count(),
            upgraded_dice: self.upgraded_count(),
            next_unlock_cost: self.has_inactive_slot().then(|| self.next_unlock_cost()),
            next_upgrade_cost: self.next_upgrade_cost(),
            last_faces: self.last_faces(),
            last_sum: self.last_sum(),
            last_payout: self.last_payout(),
            unapplied_payout: self.unapplied_payout(),
            dice: self
                .dice
                .iter()
                .map(|d| DieSnapshot {
                    id: d.id(),
                    active: d.is_active(),
                    upgraded: d.is_upgraded(),
                    multiplier: d.effective_multiplier(),
                    face: d.face(),
                    settling: d.is_settling(),
                    pose: d.pose(),
                })
                .collect(),
        }
    }
}
