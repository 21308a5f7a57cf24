//! A single die: settle timer, resting face and upgrade state

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{Pose, SettleProfile};
use crate::error::{DiceError, DiceResult};

/// Stable index of a die within the session (0..capacity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DieId(pub usize);

impl fmt::Display for DieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Precomputed result of one roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlePlan {
    /// Local axis that ends up pointing up (index into the face map)
    pub resting_axis: usize,
    /// Face shown when the die comes to rest
    pub face: u8,
    /// Time until the die is still (ms)
    pub settle_after_ms: u64,
}

impl SettlePlan {
    /// Draw a uniformly random resting orientation and settle time
    pub fn draw(rng: &mut impl Rng, profile: &SettleProfile) -> Self {
        let resting_axis = rng.random_range(0..profile.face_map.len());
        let settle_after_ms = rng.random_range(profile.min_settle_ms..=profile.max_settle_ms);
        Self {
            resting_axis,
            face: profile.face_map[resting_axis],
            settle_after_ms,
        }
    }
}

/// Die lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieState {
    /// Ready to roll (face 0) or resting on a settled face
    Idle,
    /// Rolling until the plan's settle time has elapsed
    Settling {
        plan: SettlePlan,
        elapsed_ms: u64,
        check_timer_ms: u64,
    },
}

/// One die on the table
#[derive(Debug, Clone)]
pub struct Die {
    id: DieId,
    active: bool,
    activated_once: bool,
    upgraded: bool,
    upgrade_multiplier: f64,
    face: u8,
    pose: Pose,
    check_interval_ms: u64,
    state: DieState,
}

impl Die {
    /// Create an inactive, idle die
    pub fn new(id: DieId) -> Self {
        Self {
            id,
            active: false,
            activated_once: false,
            upgraded: false,
            upgrade_multiplier: 1.0,
            face: 0,
            pose: Pose::default(),
            check_interval_ms: 0,
            state: DieState::Idle,
        }
    }

    pub fn id(&self) -> DieId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_upgraded(&self) -> bool {
        self.upgraded
    }

    /// 1.0 until upgraded
    pub fn upgrade_multiplier(&self) -> f64 {
        self.upgrade_multiplier
    }

    /// Settled face, 0 while unsettled
    pub fn face(&self) -> u8 {
        self.face
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn state(&self) -> DieState {
        self.state
    }

    pub fn is_settling(&self) -> bool {
        matches!(self.state, DieState::Settling { .. })
    }

    /// Set the start pose that `reset_to_start` returns to
    pub fn place(&mut self, pose: Pose) {
        self.pose = pose;
    }

    /// Toggle participation in roll cycles.
    /// The first activation resets the die at its start pose.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if active && !self.activated_once {
            self.activated_once = true;
            self.reset_to_start();
        }
    }

    /// Start rolling
    pub fn roll(&mut self, rng: &mut impl Rng, profile: &SettleProfile) -> DiceResult<SettlePlan> {
        if !self.active {
            return Err(DiceError::Inactive(self.id));
        }
        if self.is_settling() {
            return Err(DiceError::Busy);
        }
        let plan = SettlePlan::draw(rng, profile);
        self.face = 0;
        self.check_interval_ms = profile.check_interval_ms.max(1);
        self.state = DieState::Settling {
            plan,
            elapsed_ms: 0,
            check_timer_ms: self.check_interval_ms,
        };
        Ok(plan)
    }

    /// Advance the settle timer. Returns the face exactly once, when the die comes to rest.
    pub fn tick(&mut self, dt_ms: u64) -> Option<u8> {
        let DieState::Settling {
            plan,
            elapsed_ms,
            check_timer_ms,
        } = &mut self.state
        else {
            return None;
        };

        *elapsed_ms = elapsed_ms.saturating_add(dt_ms);

        // stillness is only sampled every check interval
        if *check_timer_ms > dt_ms {
            *check_timer_ms -= dt_ms;
            return None;
        }
        *check_timer_ms = self.check_interval_ms;

        if *elapsed_ms < plan.settle_after_ms {
            return None;
        }

        let face = plan.face;
        self.face = face;
        self.state = DieState::Idle;
        Some(face)
    }

    /// Settle immediately on a face reported by an external source
    pub fn settle_with(&mut self, face: u8) {
        self.face = face;
        self.state = DieState::Idle;
    }

    /// Cancel any roll and return to the start pose with face 0.
    /// Returns whether an in-flight roll was cancelled. No settle is reported.
    pub fn reset_to_start(&mut self) -> bool {
        let cancelled = self.is_settling();
        self.state = DieState::Idle;
        self.face = 0;
        cancelled
    }

    /// One-way upgrade
    pub fn upgrade(&mut self, multiplier: f64) -> DiceResult<()> {
        if self.upgraded {
            return Err(DiceError::AlreadyUpgraded(self.id));
        }
        self.upgraded = true;
        self.upgrade_multiplier = multiplier;
        Ok(())
    }

    /// Multiplier applied to this die's contribution
    pub fn effective_multiplier(&self) -> f64 {
        if self.upgraded {
            self.upgrade_multiplier
        } else {
            1.0
        }
    }
}
