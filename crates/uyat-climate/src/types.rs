//! Climate state vocabulary, published state and control request

use serde::{Deserialize, Serialize};
use std::fmt;
use uyat_core::EntityKind;
use uyat_state_bus::EntityState;

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateMode {
    Off,
    HeatCool,
    Heat,
    Cool,
    Dry,
    FanOnly,
}

/// What the appliance is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateAction {
    /// Off, or state unknown
    Off,
    Idle,
    Heating,
    Cooling,
    Drying,
    Fan,
}

/// Named operating preset, by priority (boost wins)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimatePreset {
    None,
    Boost,
    Eco,
    Sleep,
}

/// Louver swing, combined from the two axis switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingMode {
    Off,
    Both,
    Vertical,
    Horizontal,
}

impl SwingMode {
    /// Combine the vertical and horizontal axis states
    pub fn from_axes(vertical: bool, horizontal: bool) -> Self {
        match (vertical, horizontal) {
            (true, true) => Self::Both,
            (true, false) => Self::Vertical,
            (false, true) => Self::Horizontal,
            (false, false) => Self::Off,
        }
    }

    /// Axis states as `(vertical, horizontal)`
    pub fn axes(&self) -> (bool, bool) {
        match self {
            Self::Both => (true, true),
            Self::Vertical => (true, false),
            Self::Horizontal => (false, true),
            Self::Off => (false, false),
        }
    }
}

/// Named fan speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    Low,
    Medium,
    Middle,
    High,
    Auto,
}

macro_rules! display_via_debug {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    )*};
}

display_via_debug!(ClimateMode, ClimateAction, ClimatePreset, SwingMode, FanMode);

/// The aggregate state a climate publishes after every recompute
///
/// Temperatures are `None` while unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    pub mode: ClimateMode,
    pub action: ClimateAction,
    pub target_temperature: Option<f32>,
    pub current_temperature: Option<f32>,
    pub preset: ClimatePreset,
    pub swing_mode: SwingMode,
    pub fan_mode: Option<FanMode>,
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            mode: ClimateMode::Off,
            action: ClimateAction::Off,
            target_temperature: None,
            current_temperature: None,
            preset: ClimatePreset::None,
            swing_mode: SwingMode::Off,
            fan_mode: None,
        }
    }
}

impl EntityState for ClimateState {
    fn kind() -> EntityKind {
        EntityKind::Climate
    }
}

/// Sparse control request; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ClimateMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<ClimatePreset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swing_mode: Option<SwingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_mode: Option<FanMode>,
}

/// Capabilities derived from the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateTraits {
    pub supported_modes: Vec<ClimateMode>,
    pub supported_presets: Vec<ClimatePreset>,
    pub supported_swing_modes: Vec<SwingMode>,
    pub supported_fan_modes: Vec<FanMode>,
    pub supports_current_temperature: bool,
    pub supports_action: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_swing_axes() {
        for mode in [SwingMode::Off, SwingMode::Both, SwingMode::Vertical, SwingMode::Horizontal] {
            let (v, h) = mode.axes();
            assert_eq!(SwingMode::from_axes(v, h), mode);
        }
    }

    #[test]
    fn test_sparse_call() {
        let call: ClimateCall = serde_json::from_value(json!({"mode": "heat_cool"})).unwrap();
        assert_eq!(call.mode, Some(ClimateMode::HeatCool));
        assert_eq!(call.target_temperature, None);

        let empty: ClimateCall = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, ClimateCall::default());
    }

    #[test]
    fn test_state_serializes_unknown_temperature_as_null() {
        let value = serde_json::to_value(ClimateState::default()).unwrap();
        assert_eq!(value["current_temperature"], json!(null));
        assert_eq!(value["mode"], json!("off"));
    }
}
