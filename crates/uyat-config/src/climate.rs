//! `climate:` entries

use crate::datapoint::{DatapointRef, RetriesConfig, SwitchEntry, SwitchRef, CODE_DP, NUMBER_DP};
use crate::error::{ConfigError, ConfigResult};
use crate::pins::PinFactory;
use serde::{Deserialize, Serialize};
use uyat_climate::{
    ActiveStateFeature, ActiveStateMapping, Climate, ClimateConfig, FanSpeedFeature,
    FanSpeedMapping, PresetFeature, PresetsFeature, StatePins, SwingFeature, TemperatureDatapoint,
    TemperatureFeature,
};
use uyat_core::EntityId;

fn default_multiplier() -> f32 {
    1.0
}

fn default_hysteresis() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStateEntry {
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub heating_value: Option<u32>,
    #[serde(default)]
    pub cooling_value: Option<u32>,
    #[serde(default)]
    pub drying_value: Option<u32>,
    #[serde(default)]
    pub fanonly_value: Option<u32>,
    #[serde(default)]
    pub retries: RetriesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePinsEntry {
    #[serde(default)]
    pub heating: Option<u8>,
    #[serde(default)]
    pub cooling: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureDpEntry {
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub offset: f32,
    #[serde(default = "default_multiplier")]
    pub multiplier: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperaturesEntry {
    pub target: TemperatureDpEntry,
    #[serde(default)]
    pub current: Option<TemperatureDpEntry>,
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f32,
    #[serde(default)]
    pub reports_fahrenheit: bool,
    #[serde(default)]
    pub retries: RetriesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub inverted: bool,
    /// Fixed target while active; eco and sleep only
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub retries: RetriesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetsEntry {
    #[serde(default)]
    pub boost: Option<PresetEntry>,
    #[serde(default)]
    pub eco: Option<PresetEntry>,
    #[serde(default)]
    pub sleep: Option<PresetEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingEntry {
    #[serde(default)]
    pub vertical: Option<SwitchRef>,
    #[serde(default)]
    pub horizontal: Option<SwitchRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimateFanSpeedEntry {
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub auto_value: Option<u32>,
    #[serde(default)]
    pub low_value: Option<u32>,
    #[serde(default)]
    pub medium_value: Option<u32>,
    #[serde(default)]
    pub middle_value: Option<u32>,
    #[serde(default)]
    pub high_value: Option<u32>,
    #[serde(default)]
    pub retries: RetriesConfig,
}

/// One climate entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateEntry {
    pub id: String,
    #[serde(default)]
    pub supports_heat: bool,
    #[serde(default)]
    pub supports_cool: bool,
    #[serde(default)]
    pub switch: Option<SwitchRef>,
    #[serde(default)]
    pub active_state: Option<ActiveStateEntry>,
    #[serde(default)]
    pub state_pins: StatePinsEntry,
    #[serde(default)]
    pub temperatures: Option<TemperaturesEntry>,
    #[serde(default)]
    pub presets: PresetsEntry,
    #[serde(default)]
    pub swing: SwingEntry,
    #[serde(default)]
    pub fan_speed: Option<ClimateFanSpeedEntry>,
}

impl TemperatureDpEntry {
    fn build(&self, key: &str) -> ConfigResult<TemperatureDatapoint> {
        if self.multiplier == 0.0 || !self.multiplier.is_finite() {
            return Err(ConfigError::invalid(format!("{key}.multiplier"), "must be finite and non-zero"));
        }
        Ok(TemperatureDatapoint {
            datapoint: self.datapoint.matcher(&format!("{key}.datapoint"), &NUMBER_DP)?,
            offset: self.offset,
            multiplier: self.multiplier,
        })
    }
}

impl PresetEntry {
    fn build(&self, key: &str, allows_temperature: bool) -> ConfigResult<PresetFeature> {
        if self.temperature.is_some() && !allows_temperature {
            return Err(ConfigError::invalid(
                format!("{key}.temperature"),
                "only eco and sleep presets have a temperature",
            ));
        }
        let switch = SwitchRef::Full(SwitchEntry {
            datapoint: self.datapoint.clone(),
            inverted: self.inverted,
            retries: self.retries,
        });
        Ok(PresetFeature {
            switch: switch.feature(key)?,
            temperature: self.temperature,
        })
    }
}

impl ClimateEntry {
    /// Cross-field checks
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.supports_heat && !self.supports_cool {
            return Err(ConfigError::validation(format!(
                "climate '{}' must support heating or cooling",
                self.id
            )));
        }
        if let Some(temperatures) = &self.temperatures {
            if temperatures.hysteresis.is_nan() || temperatures.hysteresis < 0.0 {
                return Err(ConfigError::invalid(
                    format!("climate.{}.temperatures.hysteresis", self.id),
                    "must not be negative",
                ));
            }
        }
        Ok(())
    }

    /// The climate's feature wiring
    pub fn climate_config(&self) -> ConfigResult<ClimateConfig> {
        let key = format!("climate.{}", self.id);

        let switch = self
            .switch
            .as_ref()
            .map(|s| s.feature(&format!("{key}.switch")))
            .transpose()?;

        let active_state = self
            .active_state
            .as_ref()
            .map(|a| -> ConfigResult<ActiveStateFeature> {
                let key = format!("{key}.active_state");
                Ok(ActiveStateFeature {
                    datapoint: a.datapoint.matcher(&format!("{key}.datapoint"), &CODE_DP)?,
                    mapping: ActiveStateMapping {
                        heating_value: a.heating_value,
                        cooling_value: a.cooling_value,
                        drying_value: a.drying_value,
                        fanonly_value: a.fanonly_value,
                    },
                    retry: a.retries.to_retry(&format!("{key}.retries"))?,
                })
            })
            .transpose()?;

        let temperatures = self
            .temperatures
            .as_ref()
            .map(|t| -> ConfigResult<TemperatureFeature> {
                let key = format!("{key}.temperatures");
                Ok(TemperatureFeature {
                    target: t.target.build(&format!("{key}.target"))?,
                    current: t
                        .current
                        .as_ref()
                        .map(|c| c.build(&format!("{key}.current")))
                        .transpose()?,
                    hysteresis: t.hysteresis,
                    reports_fahrenheit: t.reports_fahrenheit,
                    retry: t.retries.to_retry(&format!("{key}.retries"))?,
                })
            })
            .transpose()?;

        let preset = |p: &Option<PresetEntry>, name: &str, allows_temperature: bool| {
            p.as_ref()
                .map(|p| p.build(&format!("{key}.presets.{name}"), allows_temperature))
                .transpose()
        };
        let presets = PresetsFeature {
            boost: preset(&self.presets.boost, "boost", false)?,
            eco: preset(&self.presets.eco, "eco", true)?,
            sleep: preset(&self.presets.sleep, "sleep", true)?,
        };

        let axis = |s: &Option<SwitchRef>, name: &str| {
            s.as_ref()
                .map(|s| s.feature(&format!("{key}.swing.{name}")))
                .transpose()
        };
        let swing = SwingFeature {
            vertical: axis(&self.swing.vertical, "vertical")?,
            horizontal: axis(&self.swing.horizontal, "horizontal")?,
        };

        let fan_speed = self
            .fan_speed
            .as_ref()
            .map(|f| -> ConfigResult<FanSpeedFeature> {
                let key = format!("{key}.fan_speed");
                Ok(FanSpeedFeature {
                    datapoint: f.datapoint.matcher(&format!("{key}.datapoint"), &CODE_DP)?,
                    mapping: FanSpeedMapping {
                        auto_value: f.auto_value,
                        low_value: f.low_value,
                        medium_value: f.medium_value,
                        middle_value: f.middle_value,
                        high_value: f.high_value,
                    },
                    retry: f.retries.to_retry(&format!("{key}.retries"))?,
                })
            })
            .transpose()?;

        Ok(ClimateConfig {
            supports_heat: self.supports_heat,
            supports_cool: self.supports_cool,
            switch,
            active_state,
            temperatures,
            presets,
            swing,
            fan_speed,
        })
    }

    pub(crate) fn build(&self, id: EntityId, pins: &dyn PinFactory) -> ConfigResult<Climate> {
        self.validate()?;
        let config = self.climate_config()?;
        let pins = StatePins {
            heating: self.state_pins.heating.map(|p| pins.input_pin(p)),
            cooling: self.state_pins.cooling.map(|p| pins.input_pin(p)),
        };
        Ok(Climate::new(id, config, pins))
    }
}
