//! Climate composite state machine for the uyat bridge
//!
//! A climate reconciles several independent evidence sources into one
//! `{mode, action}` pair:
//! - a power switch datapoint
//! - heating/cooling sensing pins
//! - an MCU active-state code
//! - a target/current temperature pair with hysteresis
//!
//! Presets, swing and fan speed are resolved alongside. Every accepted input
//! recomputes the whole state and publishes it.

mod climate;
mod config;
mod pins;
mod types;

pub use climate::Climate;
pub use config::{
    ActiveStateFeature, ActiveStateMapping, ClimateConfig, FanSpeedFeature, FanSpeedMapping,
    PresetFeature, PresetsFeature, SwingFeature, SwitchFeature, TemperatureDatapoint,
    TemperatureFeature,
};
pub use pins::{DigitalInput, SimulatedPin, StatePins};
pub use types::{
    ClimateAction, ClimateCall, ClimateMode, ClimatePreset, ClimateState, ClimateTraits, FanMode,
    SwingMode,
};
