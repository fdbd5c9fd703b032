//! YAML device configuration for the uyat bridge
//!
//! This crate turns a device file into ready-to-host entities:
//!
//! - Datapoints are a bare number or `{ number, type }`; each feature
//!   restricts the types it accepts
//! - `retries:` blocks configure acknowledgement retries per write
//! - Climate state pins come from a host-provided [`PinFactory`]
//!
//! # Example
//!
//! ```ignore
//! use uyat_config::{load_config, SimulatedPinFactory};
//!
//! let config = load_config("device.yaml")?;
//! let entities = config.build(&SimulatedPinFactory::new())?;
//! for entity in entities {
//!     handler.add_entity(entity)?;
//! }
//! ```

mod climate;
mod datapoint;
mod device;
mod entities;
mod error;
mod light;
mod pins;

pub use climate::{
    ActiveStateEntry, ClimateEntry, ClimateFanSpeedEntry, PresetEntry, PresetsEntry,
    StatePinsEntry, SwingEntry, TemperatureDpEntry, TemperaturesEntry,
};
pub use datapoint::{DatapointRef, DpTypeHint, RetriesConfig, SwitchEntry, SwitchRef};
pub use device::{load_config, load_config_str, DeviceConfig, HandlerSettings};
pub use entities::{
    FanEntry, FanSpeedEntry, NumberEntry, SelectEntry, SensorEntry, SwitchEntityEntry,
    TextSensorEntry, VapSensorEntry,
};
pub use error::{ConfigError, ConfigResult};
pub use light::{
    ColorEntry, ColorTemperature, DimmerEntry, LightEntry, LightType, WhiteTemperatureEntry,
};
pub use pins::{PinFactory, SimulatedPinFactory};
