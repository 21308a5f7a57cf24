//! # rf-dice-lab: Dice roll economy engine for FluxForge Studio
//!
//! Headless engine for the dice lab minigame: dice settle on random faces,
//! each roll cycle is aggregated into a sum and a payout, and the payout
//! feeds a small progression economy (rolls budget, die unlocks, upgrades).
//!
//! ## Features
//!
//! - **Roll Cycles**: One cycle in flight at a time, completed when every active die reports
//! - **Payout Modes**: Per-face payout table or flat sum multiplier
//! - **Progression**: Exponential unlock and upgrade cost curves
//! - **Observers**: Explicit event subscriptions for presentation layers
//! - **Runner**: Single-consumer session thread for concurrent hosts
//!
//! ## Architecture
//!
//! ```text
//! DiceSession
//!     │
//!     ├── Vec<Die>      (settle timers, upgrade state)
//!     ├── RollCycle     (report set, in-flight guard)
//!     ├── Economy       (balance, rolls, last outcome)
//!     └── EventHub      (DiceObserver subscriptions)
//!           │
//!           v
//!     CycleOutcome → DiceEvent::PayoutComputed
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rf_dice_lab::{DiceConfig, DiceSession};
//!
//! let mut session = DiceSession::with_seed(DiceConfig::classic(), 7)?;
//! session.roll_all()?;
//! if let Some(outcome) = session.settle_pending() {
//!     println!("{outcome}");
//! }
//! session.apply_last_payout();
//! ```

pub mod config;
pub mod cycle;
pub mod die;
pub mod economy;
pub mod error;
pub mod events;
pub mod payout;
pub mod presentation;
pub mod runtime;
pub mod session;

pub use config::*;
pub use cycle::{CycleId, RollCycle, SettleOutcome};
pub use die::*;
pub use economy::Economy;
pub use error::*;
pub use events::*;
pub use payout::*;
pub use presentation::*;
pub use runtime::{RunnerError, RunnerHandle, SessionRunner};
pub use session::*;
