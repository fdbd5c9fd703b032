//! The device file: handler settings plus one list per entity kind

use crate::climate::ClimateEntry;
use crate::entities::{
    FanEntry, NumberEntry, SelectEntry, SensorEntry, SwitchEntityEntry, TextSensorEntry,
    VapSensorEntry,
};
use crate::error::{ConfigError, ConfigResult};
use crate::light::LightEntry;
use crate::pins::PinFactory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uyat_core::{EntityId, EntityKind};
use uyat_dispatch::{Entity, HandlerConfig, DEFAULT_POLL_INTERVAL_MS};

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// `handler:` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSettings {
    /// Cooperative loop tick for polled inputs
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// A whole device: every entity hosted on one MCU link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub handler: HandlerSettings,
    #[serde(default)]
    pub climate: Vec<ClimateEntry>,
    #[serde(default)]
    pub switch: Vec<SwitchEntityEntry>,
    #[serde(default)]
    pub number: Vec<NumberEntry>,
    #[serde(default)]
    pub sensor: Vec<SensorEntry>,
    #[serde(default)]
    pub text_sensor: Vec<TextSensorEntry>,
    #[serde(default)]
    pub vap_sensor: Vec<VapSensorEntry>,
    #[serde(default)]
    pub fan: Vec<FanEntry>,
    #[serde(default)]
    pub select: Vec<SelectEntry>,
    #[serde(default)]
    pub light: Vec<LightEntry>,
}

/// Load, parse and validate a device file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<DeviceConfig> {
    let path = path.as_ref();
    debug!("Loading device config: {:?}", path);
    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&content, path)
}

/// Parse and validate a device configuration held in memory
pub fn load_config_str(content: &str) -> ConfigResult<DeviceConfig> {
    parse(content, Path::new("<string>"))
}

fn parse(content: &str, path: &Path) -> ConfigResult<DeviceConfig> {
    let config: DeviceConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: PathBuf::from(path),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

impl DeviceConfig {
    /// Configured `(kind, id)` pairs, in build order
    fn entity_keys(&self) -> Vec<(EntityKind, &str)> {
        let mut keys = Vec::new();
        keys.extend(self.climate.iter().map(|e| (EntityKind::Climate, e.id.as_str())));
        keys.extend(self.switch.iter().map(|e| (EntityKind::Switch, e.id.as_str())));
        keys.extend(self.number.iter().map(|e| (EntityKind::Number, e.id.as_str())));
        keys.extend(self.sensor.iter().map(|e| (EntityKind::Sensor, e.id.as_str())));
        keys.extend(self.text_sensor.iter().map(|e| (EntityKind::TextSensor, e.id.as_str())));
        keys.extend(self.vap_sensor.iter().map(|e| (EntityKind::Sensor, e.id.as_str())));
        keys.extend(self.fan.iter().map(|e| (EntityKind::Fan, e.id.as_str())));
        keys.extend(self.select.iter().map(|e| (EntityKind::Select, e.id.as_str())));
        keys.extend(self.light.iter().map(|e| (EntityKind::Light, e.id.as_str())));
        keys
    }

    /// Number of configured entities
    pub fn entity_count(&self) -> usize {
        self.entity_keys().len()
    }

    /// Check ids and every cross-field rule
    pub fn validate(&self) -> ConfigResult<()> {
        if self.handler.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("handler.poll_interval_ms", "must be positive"));
        }

        let mut seen = HashSet::new();
        for (kind, id) in self.entity_keys() {
            EntityId::new(kind, id).map_err(|source| ConfigError::InvalidEntityId {
                kind,
                id: id.to_string(),
                source,
            })?;
            if !seen.insert((kind, id)) {
                return Err(ConfigError::DuplicateEntity {
                    kind,
                    id: id.to_string(),
                });
            }
        }

        for climate in &self.climate {
            climate.validate()?;
        }
        for fan in &self.fan {
            fan.validate()?;
        }
        for select in &self.select {
            select.validate()?;
        }
        for light in &self.light {
            light.validate()?;
        }
        Ok(())
    }

    /// Settings for the datapoint handler
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            poll_interval: Duration::from_millis(self.handler.poll_interval_ms),
        }
    }

    /// Construct every configured entity, ready to be added to a handler
    pub fn build(&self, pins: &dyn PinFactory) -> ConfigResult<Vec<Box<dyn Entity>>> {
        self.validate()?;

        let entity_id = |kind: EntityKind, id: &str| {
            EntityId::new(kind, id).map_err(|source| ConfigError::InvalidEntityId {
                kind,
                id: id.to_string(),
                source,
            })
        };

        let mut entities: Vec<Box<dyn Entity>> = Vec::with_capacity(self.entity_count());
        for e in &self.climate {
            entities.push(Box::new(e.build(entity_id(EntityKind::Climate, &e.id)?, pins)?));
        }
        for e in &self.switch {
            entities.push(Box::new(e.build(entity_id(EntityKind::Switch, &e.id)?)?));
        }
        for e in &self.number {
            entities.push(Box::new(e.build(entity_id(EntityKind::Number, &e.id)?)?));
        }
        for e in &self.sensor {
            entities.push(Box::new(e.build(entity_id(EntityKind::Sensor, &e.id)?)?));
        }
        for e in &self.text_sensor {
            entities.push(Box::new(e.build(entity_id(EntityKind::TextSensor, &e.id)?)?));
        }
        for e in &self.vap_sensor {
            entities.push(Box::new(e.build(entity_id(EntityKind::Sensor, &e.id)?)?));
        }
        for e in &self.fan {
            entities.push(Box::new(e.build(entity_id(EntityKind::Fan, &e.id)?)?));
        }
        for e in &self.select {
            entities.push(Box::new(e.build(entity_id(EntityKind::Select, &e.id)?)?));
        }
        for e in &self.light {
            entities.push(Box::new(e.build(entity_id(EntityKind::Light, &e.id)?)?));
        }

        info!("Built {} entities from device config", entities.len());
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = load_config_str("{}").unwrap();
        assert_eq!(config.entity_count(), 0);
        assert_eq!(config.handler_config().poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_duplicate_id_within_kind() {
        let err = load_config_str(
            "switch: [ { id: relay, datapoint: 1 }, { id: relay, datapoint: 2 } ]",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateEntity { kind: EntityKind::Switch, ref id } if id == "relay"
        ));
    }

    #[test]
    fn test_same_id_across_kinds() {
        load_config_str("switch: [ { id: pump, datapoint: 1 } ]\nsensor: [ { id: pump, datapoint: 2 } ]")
            .unwrap();
    }

    #[test]
    fn test_vap_and_sensor_share_kind() {
        let err = load_config_str(
            "sensor: [ { id: power, datapoint: 2 } ]\nvap_sensor: [ { id: power, datapoint: 5 } ]",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateEntity { kind: EntityKind::Sensor, .. }));
    }

    #[test]
    fn test_invalid_entity_id() {
        let err = load_config_str("switch: [ { id: Relay-1, datapoint: 1 } ]").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEntityId { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = load_config_str("switch: [ { id: relay } ]").unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml { .. }));
    }

    #[test]
    fn test_zero_poll_interval() {
        let err = load_config_str("handler: { poll_interval_ms: 0 }").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
