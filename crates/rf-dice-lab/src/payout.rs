//! Cycle evaluation: sum and payout of settled faces

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PayoutMode;
use crate::cycle::CycleId;

/// One die slot as it stood when the cycle completed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotResult {
    /// Settled face (0 for inactive slots)
    pub face: u8,
    pub active: bool,
    /// Upgrade multiplier, if the die was upgraded
    pub multiplier: Option<f64>,
}

impl SlotResult {
    pub fn inactive() -> Self {
        Self {
            face: 0,
            active: false,
            multiplier: None,
        }
    }

    pub fn active(face: u8, multiplier: Option<f64>) -> Self {
        Self {
            face,
            active: true,
            multiplier,
        }
    }

    fn factor(&self) -> f64 {
        self.multiplier.unwrap_or(1.0)
    }
}

/// Round half away from zero
pub fn scaled(value: i64, multiplier: f64) -> i64 {
    (value as f64 * multiplier).round() as i64
}

/// Result of a completed roll cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub cycle: CycleId,
    /// One entry per die slot, in slot order
    pub slots: Vec<SlotResult>,
    pub sum: i64,
    pub payout: i64,
}

impl CycleOutcome {
    /// Score the slots under a payout mode
    pub fn evaluate(cycle: CycleId, slots: Vec<SlotResult>, mode: &PayoutMode) -> Self {
        let sum = slots
            .iter()
            .filter(|s| s.active)
            .map(|s| scaled(i64::from(s.face), s.factor()))
            .fold(0i64, i64::saturating_add);

        // payouts saturate at the i64 bounds
        let payout = match mode {
            PayoutMode::PerFace { table } => slots
                .iter()
                .filter(|s| s.active && s.face > 0)
                .filter_map(|s| table.get(s.face as usize).map(|&pay| scaled(pay, s.factor())))
                .fold(0i64, i64::saturating_add),
            PayoutMode::SumMultiplier { multiplier } => sum.saturating_mul(*multiplier),
        };

        Self {
            cycle,
            slots,
            sum,
            payout,
        }
    }

    /// Faces in slot order, 0 for inactive slots
    pub fn faces(&self) -> Vec<u8> {
        self.slots.iter().map(|s| s.face).collect()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .slots
            .iter()
            .filter(|s| s.active)
            .map(|s| match s.multiplier {
                Some(m) => format!("{}x{}", s.face, m),
                None => s.face.to_string(),
            })
            .collect();
        write!(
            f,
            "Sum: {}  ({})  Payout: {}",
            self.sum,
            parts.join(", "),
            self.payout
        )
    }
}
