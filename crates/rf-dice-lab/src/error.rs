//! Error types for the dice lab

use thiserror::Error;

use crate::die::DieId;

/// Domain failures reported by dice, cycles and purchases
///
/// All variants are expected, recoverable conditions. They are returned to
/// the caller and never leave partial state behind.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceError {
    #[error("a roll cycle is already in flight")]
    Busy,

    #[error("no rolls left")]
    NoRollsLeft,

    #[error("insufficient funds: cost {cost}, balance {balance}")]
    InsufficientFunds { cost: i64, balance: i64 },

    #[error("invalid die index: {0}")]
    InvalidIndex(usize),

    #[error("die {0} is already upgraded")]
    AlreadyUpgraded(DieId),

    #[error("no inactive die slot left to unlock")]
    NoInactiveSlot,

    #[error("no active dice to roll")]
    DegenerateCycle,

    #[error("die {0} is not active")]
    Inactive(DieId),

    #[error("amount must be positive")]
    InvalidAmount,
}

/// Result type alias
pub type DiceResult<T> = Result<T, DiceError>;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}
