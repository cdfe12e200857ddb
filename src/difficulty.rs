use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Practical bounds for the open interval (0, 360) the target arc must fit in.
pub const MIN_ARC_WIDTH_DEG: f64 = 1.0;
pub const MAX_ARC_WIDTH_DEG: f64 = 359.0;

/// Named difficulty preset.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    Medium,
    Hard,
}

impl Level {
    pub fn arc_width_deg(self) -> f64 {
        match self {
            Level::Easy => 50.0,
            Level::Medium => 40.0,
            Level::Hard => 25.0,
        }
    }

    pub fn speed_multiplier(self) -> f64 {
        match self {
            Level::Easy => 1.0,
            Level::Medium => 1.5,
            Level::Hard => 1.75,
        }
    }

    /// Case-insensitive lookup; `None` for names outside the preset table.
    pub fn from_name(name: &str) -> Option<Level> {
        match name.to_lowercase().as_str() {
            "easy" => Some(Level::Easy),
            "medium" => Some(Level::Medium),
            "hard" => Some(Level::Hard),
            _ => None,
        }
    }
}

/// Wire shape of one difficulty entry: a preset name or a custom shape.
///
/// Resolved exactly once by [`resolve`]; nothing downstream branches on the
/// raw shape again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Difficulty {
    Named(String),
    Custom {
        #[serde(rename = "areaSize")]
        area_size: f64,
        #[serde(rename = "speedMultiplier")]
        speed_multiplier: f64,
    },
}

impl Difficulty {
    pub fn named(level: Level) -> Difficulty {
        Difficulty::Named(level.to_string())
    }
}

/// Label a resolved stage carries into attempt records and the UI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StageLabel {
    Easy,
    Medium,
    Hard,
    Custom,
}

impl From<Level> for StageLabel {
    fn from(level: Level) -> Self {
        match level {
            Level::Easy => StageLabel::Easy,
            Level::Medium => StageLabel::Medium,
            Level::Hard => StageLabel::Hard,
        }
    }
}

/// Concrete geometry/speed for one stage of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStage {
    pub arc_width_deg: f64,
    pub speed_multiplier: f64,
    pub label: StageLabel,
}

impl ResolvedStage {
    pub fn from_level(level: Level) -> ResolvedStage {
        ResolvedStage {
            arc_width_deg: level.arc_width_deg(),
            speed_multiplier: level.speed_multiplier(),
            label: level.into(),
        }
    }
}

/// Why a difficulty entry cannot be turned into a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedStage {
    /// `areaSize` is NaN or infinite.
    NonFiniteArcWidth,
    /// `speedMultiplier` is NaN, infinite, zero, or negative.
    UnusableSpeed,
}

impl std::fmt::Display for MalformedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedStage::NonFiniteArcWidth => write!(f, "arc width is not a finite number"),
            MalformedStage::UnusableSpeed => {
                write!(f, "speed multiplier must be a finite positive number")
            }
        }
    }
}

/// Normalize one raw difficulty entry into a concrete stage.
///
/// Unknown preset names fail closed to medium rather than rejecting the
/// session. A finite custom arc width outside (0, 360) is clamped to the
/// nearest bound; a non-finite width or unusable speed is malformed.
pub fn resolve(entry: &Difficulty) -> Result<ResolvedStage, MalformedStage> {
    match entry {
        Difficulty::Named(name) => {
            let level = Level::from_name(name).unwrap_or(Level::Medium);
            Ok(ResolvedStage::from_level(level))
        }
        Difficulty::Custom {
            area_size,
            speed_multiplier,
        } => {
            if !area_size.is_finite() {
                return Err(MalformedStage::NonFiniteArcWidth);
            }
            if !speed_multiplier.is_finite() || *speed_multiplier <= 0.0 {
                return Err(MalformedStage::UnusableSpeed);
            }
            Ok(ResolvedStage {
                arc_width_deg: area_size.clamp(MIN_ARC_WIDTH_DEG, MAX_ARC_WIDTH_DEG),
                speed_multiplier: *speed_multiplier,
                label: StageLabel::Custom,
            })
        }
    }
}
