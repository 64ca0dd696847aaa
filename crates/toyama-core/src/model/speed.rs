// ── Fan speed domain ──

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::CoreError;

/// The five speeds a fan dimmer understands.
///
/// Callers think in abstract levels (0, 25, 50, 75, 100); the dimmer
/// expects its own command values (0, 35, 50, 55, 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FanSpeed {
    Off,
    Low,
    Medium,
    High,
    Full,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 5] = [
        FanSpeed::Off,
        FanSpeed::Low,
        FanSpeed::Medium,
        FanSpeed::High,
        FanSpeed::Full,
    ];

    /// Abstract level exposed to callers.
    pub const fn level(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 25,
            Self::Medium => 50,
            Self::High => 75,
            Self::Full => 100,
        }
    }

    /// Command value sent to the dimmer.
    pub const fn raw_state(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::Low => 35,
            Self::Medium => 50,
            Self::High => 55,
            Self::Full => 100,
        }
    }

    pub fn from_level(level: i32) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|s| i32::from(s.level()) == level)
            .ok_or(CoreError::InvalidSpeedLevel { level })
    }

    /// Whether `state` is a value a fan dimmer accepts.
    pub fn is_valid_raw_state(state: i32) -> bool {
        Self::ALL.iter().any(|s| s.raw_state() == state)
    }

    /// Closest speed to a reported dimmer state.
    ///
    /// Exact for the five command values; anything else snaps to the
    /// nearest one (ties go to the slower speed).
    pub fn from_raw_state(state: i32) -> Self {
        Self::ALL
            .into_iter()
            .min_by_key(|s| (i64::from(s.raw_state()) - i64::from(state)).abs())
            .unwrap_or(Self::Off)
    }
}

impl TryFrom<i32> for FanSpeed {
    type Error = CoreError;

    fn try_from(level: i32) -> Result<Self, Self::Error> {
        Self::from_level(level)
    }
}
