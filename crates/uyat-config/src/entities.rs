//! Entries for the thin entities: switch, number, sensor, text sensor,
//! VAP sensor, fan and select

use crate::datapoint::{
    DatapointRef, RetriesConfig, SwitchEntry, SwitchRef, CODE_DP, NUMBER_DP, SENSOR_DP, TEXT_DP,
    VAP_DP,
};
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uyat_adapters::{DpNumber, DpSensor, DpTextSensor, DpVap};
use uyat_core::{DatapointType, EntityId};
use uyat_entities::{Fan, FanSpeed, Number, Select, Sensor, Switch, TextSensor, VapMeasure, VapSensor};

/// Largest sensor decimal shift
const MAX_SENSOR_SCALE: u8 = 6;

fn default_multiplier() -> f32 {
    1.0
}

fn check_multiplier(key: &str, multiplier: f32) -> ConfigResult<()> {
    if multiplier == 0.0 || !multiplier.is_finite() {
        return Err(ConfigError::invalid(format!("{key}.multiplier"), "must be finite and non-zero"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchEntityEntry {
    pub id: String,
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub retries: RetriesConfig,
}

impl SwitchEntityEntry {
    pub(crate) fn build(&self, id: EntityId) -> ConfigResult<Switch> {
        let switch = SwitchRef::Full(SwitchEntry {
            datapoint: self.datapoint.clone(),
            inverted: self.inverted,
            retries: self.retries,
        });
        Ok(Switch::new(id, switch.adapter(&format!("switch.{}", self.id))?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberEntry {
    pub id: String,
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub offset: f32,
    #[serde(default = "default_multiplier")]
    pub multiplier: f32,
    #[serde(default)]
    pub retries: RetriesConfig,
}

impl NumberEntry {
    pub(crate) fn build(&self, id: EntityId) -> ConfigResult<Number> {
        let key = format!("number.{}", self.id);
        check_multiplier(&key, self.multiplier)?;
        let number = DpNumber::new(
            self.datapoint.matcher(&format!("{key}.datapoint"), &NUMBER_DP)?,
            self.offset,
            self.multiplier,
            self.retries.to_retry(&format!("{key}.retries"))?,
        );
        Ok(Number::new(id, number))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub id: String,
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub offset: i32,
    /// Decimal shift, 0-6
    #[serde(default)]
    pub scale: u8,
}

impl SensorEntry {
    pub(crate) fn build(&self, id: EntityId) -> ConfigResult<Sensor> {
        let key = format!("sensor.{}", self.id);
        if self.scale > MAX_SENSOR_SCALE {
            return Err(ConfigError::invalid(
                format!("{key}.scale"),
                format!("must be between 0 and {MAX_SENSOR_SCALE}"),
            ));
        }
        let matcher = self.datapoint.matcher(&format!("{key}.datapoint"), &SENSOR_DP)?;
        Ok(Sensor::new(id, DpSensor::new(matcher, self.offset, self.scale)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSensorEntry {
    pub id: String,
    pub datapoint: DatapointRef,
    /// Payload is base64 text
    #[serde(default)]
    pub base64: bool,
    /// Render the bytes as hex pairs
    #[serde(default)]
    pub hex: bool,
}

impl TextSensorEntry {
    pub(crate) fn build(&self, id: EntityId) -> ConfigResult<TextSensor> {
        let key = format!("text_sensor.{}.datapoint", self.id);
        let matcher = self.datapoint.matcher(&key, &TEXT_DP)?;
        Ok(TextSensor::new(id, DpTextSensor::new(matcher, self.base64, self.hex)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapSensorEntry {
    pub id: String,
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub measure: VapMeasure,
}

impl VapSensorEntry {
    pub(crate) fn build(&self, id: EntityId) -> ConfigResult<VapSensor> {
        let key = format!("vap_sensor.{}.datapoint", self.id);
        let matcher = self.datapoint.matcher(&key, &VAP_DP)?;
        Ok(VapSensor::new(id, DpVap::new(matcher), self.measure))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanSpeedEntry {
    pub datapoint: DatapointRef,
    pub min_value: u32,
    pub max_value: u32,
    #[serde(default)]
    pub retries: RetriesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanEntry {
    pub id: String,
    #[serde(default)]
    pub switch: Option<SwitchRef>,
    #[serde(default)]
    pub speed: Option<FanSpeedEntry>,
    #[serde(default)]
    pub oscillation: Option<SwitchRef>,
    #[serde(default)]
    pub direction: Option<SwitchRef>,
}

impl FanEntry {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.switch.is_none() && self.speed.is_none() {
            return Err(ConfigError::validation(format!(
                "fan '{}' needs a speed or a switch",
                self.id
            )));
        }
        if let Some(speed) = &self.speed {
            if speed.min_value > speed.max_value {
                return Err(ConfigError::validation(format!(
                    "fan '{}': min_value {} exceeds max_value {}",
                    self.id, speed.min_value, speed.max_value
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn build(&self, id: EntityId) -> ConfigResult<Fan> {
        self.validate()?;
        let key = format!("fan.{}", self.id);
        let mut fan = Fan::new(id);
        if let Some(switch) = &self.switch {
            fan = fan.with_switch(switch.adapter(&format!("{key}.switch"))?);
        }
        if let Some(speed) = &self.speed {
            let number = DpNumber::plain(
                speed.datapoint.matcher(&format!("{key}.speed.datapoint"), &NUMBER_DP)?,
                speed.retries.to_retry(&format!("{key}.speed.retries"))?,
            );
            fan = fan.with_speed(FanSpeed::new(number, speed.min_value, speed.max_value));
        }
        if let Some(oscillation) = &self.oscillation {
            fan = fan.with_oscillation(oscillation.adapter(&format!("{key}.oscillation"))?);
        }
        if let Some(direction) = &self.direction {
            fan = fan.with_direction(direction.adapter(&format!("{key}.direction"))?);
        }
        Ok(fan)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectEntry {
    pub id: String,
    pub datapoint: DatapointRef,
    /// Device code to option name
    pub options: BTreeMap<u32, String>,
    #[serde(default)]
    pub optimistic: bool,
    #[serde(default)]
    pub retries: RetriesConfig,
}

impl SelectEntry {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.options.is_empty() {
            return Err(ConfigError::validation(format!(
                "select '{}' has no options",
                self.id
            )));
        }
        let mut seen = HashSet::new();
        for option in self.options.values() {
            if !seen.insert(option.as_str()) {
                return Err(ConfigError::validation(format!(
                    "select '{}': option '{}' is mapped to more than one code",
                    self.id, option
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn build(&self, id: EntityId) -> ConfigResult<Select> {
        self.validate()?;
        let key = format!("select.{}", self.id);
        let matcher = self.datapoint.matcher(&format!("{key}.datapoint"), &CODE_DP)?;
        if matcher.single_type() == Some(DatapointType::Enum) {
            if let Some(code) = self.options.keys().find(|code| **code > u32::from(u8::MAX)) {
                return Err(ConfigError::invalid(
                    format!("{key}.options"),
                    format!("code {code} does not fit an enum datapoint"),
                ));
            }
        }
        let number = DpNumber::plain(matcher, self.retries.to_retry(&format!("{key}.retries"))?);
        let options = self
            .options
            .iter()
            .map(|(code, option)| (*code, option.clone()))
            .collect();
        Ok(Select::new(id, number, options).with_optimistic(self.optimistic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uyat_core::EntityKind;

    fn parse<T: serde::de::DeserializeOwned>(yaml: &str) -> T {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_fan_needs_speed_or_switch() {
        let fan: FanEntry = parse("{ id: ceiling, oscillation: 5 }");
        assert!(matches!(fan.validate(), Err(ConfigError::ValidationFailed { .. })));

        let fan: FanEntry = parse("{ id: ceiling, switch: 1 }");
        fan.validate().unwrap();
    }

    #[test]
    fn test_fan_speed_range() {
        let fan: FanEntry =
            parse("{ id: ceiling, speed: { datapoint: 3, min_value: 4, max_value: 1 } }");
        assert!(matches!(fan.validate(), Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn test_select_options() {
        let select: SelectEntry =
            parse("{ id: program, datapoint: 7, options: { 0: eco, 1: comfort } }");
        select.validate().unwrap();
        assert_eq!(select.options[&1], "comfort");

        let dup: SelectEntry = parse("{ id: program, datapoint: 7, options: { 0: eco, 1: eco } }");
        assert!(matches!(dup.validate(), Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn test_select_enum_code_range() {
        let select: SelectEntry = parse("{ id: program, datapoint: 7, options: { 300: eco } }");
        let id = EntityId::new(EntityKind::Select, "program").unwrap();
        assert!(matches!(select.build(id.clone()), Err(ConfigError::InvalidValue { .. })));

        let uint: SelectEntry =
            parse("{ id: program, datapoint: { number: 7, type: uint }, options: { 300: eco } }");
        assert!(uint.build(id).is_ok());
    }

    #[test]
    fn test_sensor_scale_limit() {
        let sensor: SensorEntry = parse("{ id: power, datapoint: 3, scale: 7 }");
        let id = EntityId::new(EntityKind::Sensor, "power").unwrap();
        assert!(matches!(sensor.build(id), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_text_sensor_rejects_numeric_type() {
        let text: TextSensorEntry = parse("{ id: info, datapoint: { number: 4, type: uint } }");
        let id = EntityId::new(EntityKind::TextSensor, "info").unwrap();
        assert!(matches!(text.build(id), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_vap_measure_default() {
        let vap: VapSensorEntry = parse("{ id: voltage, datapoint: 5 }");
        assert_eq!(vap.measure, VapMeasure::Voltage);
        let power: VapSensorEntry = parse("{ id: power, datapoint: 5, measure: power }");
        assert_eq!(power.measure, VapMeasure::Power);
    }
}
