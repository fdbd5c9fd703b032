//! Climate wiring: which features are present and how they map to datapoints
//!
//! Every optional feature is an `Option`; the recompute handles each
//! combination explicitly.

use crate::{ClimateAction, ClimateMode, FanMode};
use uyat_core::{MatchingDatapoint, RetryConfig};

/// An on/off datapoint
#[derive(Debug, Clone)]
pub struct SwitchFeature {
    pub datapoint: MatchingDatapoint,
    pub inverted: bool,
    pub retry: RetryConfig,
}

impl SwitchFeature {
    pub fn new(datapoint: MatchingDatapoint) -> Self {
        Self {
            datapoint,
            inverted: false,
            retry: RetryConfig::default(),
        }
    }
}

/// MCU active-state codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveStateMapping {
    pub heating_value: Option<u32>,
    pub cooling_value: Option<u32>,
    pub drying_value: Option<u32>,
    pub fanonly_value: Option<u32>,
}

impl ActiveStateMapping {
    /// Mode and action for a reported code; first configured match wins
    pub fn lookup(&self, code: u32) -> Option<(ClimateMode, ClimateAction)> {
        [
            (self.heating_value, ClimateMode::Heat, ClimateAction::Heating),
            (self.cooling_value, ClimateMode::Cool, ClimateAction::Cooling),
            (self.drying_value, ClimateMode::Dry, ClimateAction::Drying),
            (self.fanonly_value, ClimateMode::FanOnly, ClimateAction::Fan),
        ]
        .into_iter()
        .find(|(value, _, _)| *value == Some(code))
        .map(|(_, mode, action)| (mode, action))
    }

    /// Code to write for a requested mode
    pub fn code_for(&self, mode: ClimateMode) -> Option<u32> {
        match mode {
            ClimateMode::Heat => self.heating_value,
            ClimateMode::Cool => self.cooling_value,
            ClimateMode::Dry => self.drying_value,
            ClimateMode::FanOnly => self.fanonly_value,
            ClimateMode::Off | ClimateMode::HeatCool => None,
        }
    }
}

/// Active-state datapoint
#[derive(Debug, Clone)]
pub struct ActiveStateFeature {
    pub datapoint: MatchingDatapoint,
    pub mapping: ActiveStateMapping,
    pub retry: RetryConfig,
}

/// A linearly scaled temperature datapoint
#[derive(Debug, Clone)]
pub struct TemperatureDatapoint {
    pub datapoint: MatchingDatapoint,
    pub offset: f32,
    pub multiplier: f32,
}

impl TemperatureDatapoint {
    pub fn new(datapoint: MatchingDatapoint) -> Self {
        Self {
            datapoint,
            offset: 0.0,
            multiplier: 1.0,
        }
    }
}

/// Target and current temperature with the hysteresis fallback settings
#[derive(Debug, Clone)]
pub struct TemperatureFeature {
    pub target: TemperatureDatapoint,
    pub current: Option<TemperatureDatapoint>,
    pub hysteresis: f32,
    /// Both datapoints carry °F
    pub reports_fahrenheit: bool,
    pub retry: RetryConfig,
}

impl TemperatureFeature {
    pub fn new(target: TemperatureDatapoint) -> Self {
        Self {
            target,
            current: None,
            hysteresis: 1.0,
            reports_fahrenheit: false,
            retry: RetryConfig::default(),
        }
    }
}

/// One preset switch
#[derive(Debug, Clone)]
pub struct PresetFeature {
    pub switch: SwitchFeature,
    /// Fixed target temperature while the preset is active (eco and sleep only)
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct PresetsFeature {
    pub boost: Option<PresetFeature>,
    pub eco: Option<PresetFeature>,
    pub sleep: Option<PresetFeature>,
}

#[derive(Debug, Clone, Default)]
pub struct SwingFeature {
    pub vertical: Option<SwitchFeature>,
    pub horizontal: Option<SwitchFeature>,
}

/// Fan speed codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanSpeedMapping {
    pub auto_value: Option<u32>,
    pub low_value: Option<u32>,
    pub medium_value: Option<u32>,
    pub middle_value: Option<u32>,
    pub high_value: Option<u32>,
}

impl FanSpeedMapping {
    /// Fan mode for a reported code
    pub fn lookup(&self, code: u32) -> Option<FanMode> {
        [
            (self.auto_value, FanMode::Auto),
            (self.high_value, FanMode::High),
            (self.medium_value, FanMode::Medium),
            (self.middle_value, FanMode::Middle),
            (self.low_value, FanMode::Low),
        ]
        .into_iter()
        .find(|(value, _)| *value == Some(code))
        .map(|(_, mode)| mode)
    }

    pub fn code_for(&self, mode: FanMode) -> Option<u32> {
        match mode {
            FanMode::Auto => self.auto_value,
            FanMode::Low => self.low_value,
            FanMode::Medium => self.medium_value,
            FanMode::Middle => self.middle_value,
            FanMode::High => self.high_value,
        }
    }

    /// Configured modes, slowest first
    pub fn supported(&self) -> Vec<FanMode> {
        [FanMode::Low, FanMode::Medium, FanMode::Middle, FanMode::High, FanMode::Auto]
            .into_iter()
            .filter(|mode| self.code_for(*mode).is_some())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FanSpeedFeature {
    pub datapoint: MatchingDatapoint,
    pub mapping: FanSpeedMapping,
    pub retry: RetryConfig,
}

/// Full climate wiring
#[derive(Debug, Clone, Default)]
pub struct ClimateConfig {
    pub supports_heat: bool,
    pub supports_cool: bool,
    pub switch: Option<SwitchFeature>,
    pub active_state: Option<ActiveStateFeature>,
    pub temperatures: Option<TemperatureFeature>,
    pub presets: PresetsFeature,
    pub swing: SwingFeature,
    pub fan_speed: Option<FanSpeedFeature>,
}
