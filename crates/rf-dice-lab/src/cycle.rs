//! Roll cycle bookkeeping: which dice have reported this cycle

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::die::DieId;
use crate::error::{DiceError, DiceResult};
use crate::payout::CycleOutcome;

/// Monotonic roll cycle number (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct CycleId(pub u64);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle-{:06}", self.0)
    }
}

/// What happened to a settle report
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// Recorded; still waiting on `pending` dice
    Recorded { pending: usize },
    /// Last report of the cycle; payout computed
    Completed(CycleOutcome),
    /// No active dice remain; cycle dropped without payout
    Aborted,
    /// No cycle in flight, or the die is not active
    Ignored,
}

/// Per-cycle report set with the single-flight guard
#[derive(Debug, Default)]
pub struct RollCycle {
    current: CycleId,
    in_flight: bool,
    reports: BTreeMap<DieId, u8>,
}

impl RollCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new cycle
    pub fn begin(&mut self) -> DiceResult<CycleId> {
        if self.in_flight {
            return Err(DiceError::Busy);
        }
        self.current = CycleId(self.current.0 + 1);
        self.in_flight = true;
        self.reports.clear();
        Ok(self.current)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Id of the open cycle, or of the last one opened
    pub fn current(&self) -> CycleId {
        self.current
    }

    /// Record a face; a die reporting twice overwrites its earlier face
    pub fn record(&mut self, die: DieId, face: u8) -> bool {
        if !self.in_flight {
            return false;
        }
        self.reports.insert(die, face);
        true
    }

    pub fn reported(&self) -> usize {
        self.reports.len()
    }

    pub fn face_of(&self, die: DieId) -> Option<u8> {
        self.reports.get(&die).copied()
    }

    pub fn is_complete(&self, active_count: usize) -> bool {
        self.in_flight && self.reports.len() == active_count
    }

    /// Drop one die's report, if it has one
    pub fn forget(&mut self, die: DieId) -> bool {
        self.reports.remove(&die).is_some()
    }

    /// Drop reports but keep the cycle open
    pub fn clear_reports(&mut self) {
        self.reports.clear();
    }

    /// Close the cycle (completed or aborted) so a new one may begin
    pub fn close(&mut self) {
        self.in_flight = false;
        self.reports.clear();
    }
}
