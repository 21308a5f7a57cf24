//! Dice lab configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default orientation → face mapping.
/// Order: +up, -up, +forward, -forward, +right, -right
pub const DEFAULT_FACE_MAP: [u8; 6] = [1, 6, 2, 5, 3, 4];

/// Exponential cost curve: `ceil(base × scale ^ n)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostCurve {
    /// Cost of the first purchase
    pub base: i64,
    /// Growth factor per already-owned item
    pub scale: f64,
}

impl CostCurve {
    pub fn new(base: i64, scale: f64) -> Self {
        Self { base, scale }
    }

    /// Cost when `owned` items have already been bought
    pub fn cost_at(&self, owned: usize) -> i64 {
        let exponent = i32::try_from(owned).unwrap_or(i32::MAX);
        // `as` saturates on overflow
        (self.base as f64 * self.scale.powi(exponent)).ceil() as i64
    }
}

/// How a completed cycle's payout is computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutMode {
    /// Sum of `table[face] × multiplier` over active dice.
    /// Index 0 is unused; faces outside the table pay nothing.
    PerFace { table: Vec<i64> },
    /// `sum × multiplier`
    SumMultiplier { multiplier: i64 },
}

impl PayoutMode {
    /// Identity per-face table (`table[i] = i`)
    pub fn identity() -> Self {
        PayoutMode::PerFace {
            table: vec![0, 1, 2, 3, 4, 5, 6],
        }
    }
}

impl Default for PayoutMode {
    fn default() -> Self {
        Self::identity()
    }
}

/// When payouts reach the balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutApplication {
    /// Caller applies the last payout explicitly
    #[default]
    Manual,
    /// Payout is credited as soon as the cycle completes
    Auto,
}

/// Payout rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRules {
    #[serde(default)]
    pub mode: PayoutMode,
    #[serde(default)]
    pub application: PayoutApplication,
    /// Only credit a cycle's payout once, however often it is applied
    #[serde(default = "default_true")]
    pub guard_reapply: bool,
}

impl Default for PayoutRules {
    fn default() -> Self {
        Self {
            mode: PayoutMode::default(),
            application: PayoutApplication::Manual,
            guard_reapply: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Upgrade pricing and strength
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpgradeRules {
    /// Cost curve keyed by the global upgraded count
    pub cost: CostCurve,
    /// Multiplier given to a die when it is upgraded
    pub default_multiplier: f64,
}

impl Default for UpgradeRules {
    fn default() -> Self {
        Self {
            cost: CostCurve::new(20, 1.5),
            default_multiplier: 2.0,
        }
    }
}

/// Position + orientation (unit quaternion, `[x, y, z, w]`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f32; 3],
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl Pose {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            rotation: identity_rotation(),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at([0.0; 3])
    }
}

/// Where dice are placed when activated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnLayout {
    /// Explicit poses, one per die index (reused modulo length when short)
    #[serde(default)]
    pub points: Vec<Pose>,
    /// Horizontal spacing of the fallback row
    pub spacing: f32,
    /// Table origin
    pub origin: [f32; 3],
    /// Offset of die 0 from the origin in the fallback row
    pub default_offset: [f32; 3],
}

impl SpawnLayout {
    /// Pose for the die at `index`
    pub fn pose_for(&self, index: usize) -> Pose {
        if let Some(point) = self.points.get(index) {
            return *point;
        }
        if !self.points.is_empty() {
            return self.points[index % self.points.len()];
        }
        let x = index as f32 * self.spacing;
        Pose::at([
            self.origin[0] + self.default_offset[0] + x,
            self.origin[1] + self.default_offset[1],
            self.origin[2] + self.default_offset[2],
        ])
    }
}

impl Default for SpawnLayout {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            spacing: 1.5,
            origin: [0.0; 3],
            default_offset: [0.0, 1.0, 0.0],
        }
    }
}

/// Settle timing for a rolling die
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettleProfile {
    /// How often a rolling die checks whether it has come to rest (ms)
    pub check_interval_ms: u64,
    /// Shortest possible roll (ms)
    pub min_settle_ms: u64,
    /// Longest possible roll (ms)
    pub max_settle_ms: u64,
    /// Resting axis → face value
    #[serde(default = "default_face_map")]
    pub face_map: [u8; 6],
}

fn default_face_map() -> [u8; 6] {
    DEFAULT_FACE_MAP
}

impl SettleProfile {
    /// Tabletop timing
    pub fn normal() -> Self {
        Self {
            check_interval_ms: 200,
            min_settle_ms: 600,
            max_settle_ms: 2000,
            face_map: DEFAULT_FACE_MAP,
        }
    }

    /// Dice settle on the first check
    pub fn instant() -> Self {
        Self {
            check_interval_ms: 1,
            min_settle_ms: 0,
            max_settle_ms: 0,
            face_map: DEFAULT_FACE_MAP,
        }
    }

    /// Upper bound on checks needed before any roll settles
    pub fn max_checks(&self) -> u64 {
        self.max_settle_ms / self.check_interval_ms.max(1) + 2
    }
}

impl Default for SettleProfile {
    fn default() -> Self {
        Self::normal()
    }
}

/// Complete dice lab configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceConfig {
    /// Preset name
    pub name: String,
    /// Maximum number of dice ever purchasable
    pub capacity: usize,
    /// Dice active at session start (lowest indices)
    pub starting_active: usize,
    pub starting_balance: i64,
    pub starting_rolls: u32,
    /// Roll count restored by soft reset / payout reset
    pub rolls_per_reset: u32,
    /// Applying a payout restores `rolls_per_reset` rolls
    #[serde(default)]
    pub reset_rolls_on_payout: bool,
    #[serde(default)]
    pub payout: PayoutRules,
    pub unlock: CostCurve,
    #[serde(default)]
    pub upgrade: UpgradeRules,
    #[serde(default)]
    pub spawn: SpawnLayout,
    #[serde(default)]
    pub settle: SettleProfile,
}

impl Default for DiceConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl DiceConfig {
    /// Default tabletop setup: one die, three rolls, identity payouts
    pub fn classic() -> Self {
        Self {
            name: "Classic".into(),
            capacity: 5,
            starting_active: 1,
            starting_balance: 0,
            starting_rolls: 3,
            rolls_per_reset: 3,
            reset_rolls_on_payout: false,
            payout: PayoutRules::default(),
            unlock: CostCurve::new(10, 1.5),
            upgrade: UpgradeRules::default(),
            spawn: SpawnLayout::default(),
            settle: SettleProfile::normal(),
        }
    }

    /// Payout is the roll sum times a flat multiplier
    pub fn sum_multiplier(multiplier: i64) -> Self {
        Self {
            name: format!("Sum x{multiplier}"),
            payout: PayoutRules {
                mode: PayoutMode::SumMultiplier { multiplier },
                ..PayoutRules::default()
            },
            ..Self::classic()
        }
    }

    /// Instant settling and auto-applied payouts, for tests and demos
    pub fn studio() -> Self {
        Self {
            name: "Studio".into(),
            payout: PayoutRules {
                application: PayoutApplication::Auto,
                ..PayoutRules::default()
            },
            settle: SettleProfile::instant(),
            ..Self::classic()
        }
    }

    /// Bigger table, steeper curves, rolls refilled on every payout
    pub fn high_roller() -> Self {
        Self {
            name: "High Roller".into(),
            capacity: 8,
            starting_active: 2,
            starting_balance: 50,
            starting_rolls: 5,
            rolls_per_reset: 5,
            reset_rolls_on_payout: true,
            payout: PayoutRules {
                mode: PayoutMode::PerFace {
                    table: vec![0, 1, 2, 4, 6, 10, 15],
                },
                ..PayoutRules::default()
            },
            unlock: CostCurve::new(25, 1.8),
            upgrade: UpgradeRules {
                cost: CostCurve::new(40, 2.0),
                default_multiplier: 3.0,
            },
            ..Self::classic()
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "classic" => Some(Self::classic()),
            "studio" => Some(Self::studio()),
            "high_roller" | "high-roller" => Some(Self::high_roller()),
            "sum" => Some(Self::sum_multiplier(1)),
            _ => None,
        }
    }

    /// Reject configurations the session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.capacity == 0 {
            return invalid("capacity must be at least 1".into());
        }
        if self.starting_active > self.capacity {
            return invalid(format!(
                "starting_active ({}) exceeds capacity ({})",
                self.starting_active, self.capacity
            ));
        }
        for (label, curve) in [("unlock", &self.unlock), ("upgrade", &self.upgrade.cost)] {
            if curve.base < 0 {
                return invalid(format!("{label} base cost must not be negative"));
            }
            if !curve.scale.is_finite() || curve.scale <= 0.0 {
                return invalid(format!("{label} cost scale must be finite and positive"));
            }
        }
        if !self.upgrade.default_multiplier.is_finite() || self.upgrade.default_multiplier < 1.0 {
            return invalid("upgrade multiplier must be at least 1.0".into());
        }
        if let PayoutMode::PerFace { table } = &self.payout.mode {
            if table.is_empty() {
                return invalid("per-face payout table is empty".into());
            }
        }
        let mut faces = self.settle.face_map;
        faces.sort_unstable();
        if faces != [1, 2, 3, 4, 5, 6] {
            return invalid(format!(
                "face map {:?} is not a permutation of 1..=6",
                self.settle.face_map
            ));
        }
        if self.settle.check_interval_ms == 0 {
            return invalid("settle check interval must be positive".into());
        }
        if self.settle.min_settle_ms > self.settle.max_settle_ms {
            return invalid("min_settle_ms exceeds max_settle_ms".into());
        }
        Ok(())
    }

    /// Parse JSON and validate
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML and validate
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }
}
