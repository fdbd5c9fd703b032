//! `light:` entries

use crate::datapoint::{DatapointRef, RetriesConfig, SwitchRef, COLOR_DP, NUMBER_DP};
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use uyat_adapters::{ColorEncoding, DpColor, DpDimmer, DpNumber};
use uyat_core::EntityId;
use uyat_entities::{Light, WhiteTemperature};

fn default_max_value() -> u32 {
    255
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    Binary,
    Dimmer,
    Ct,
    Rgb,
    Rgbct,
}

impl LightType {
    /// Sections the type needs: dimmer, white temperature, color
    fn sections(self) -> (bool, bool, bool) {
        match self {
            Self::Binary => (false, false, false),
            Self::Dimmer => (true, false, false),
            Self::Ct => (true, true, false),
            Self::Rgb => (false, false, true),
            Self::Rgbct => (true, true, true),
        }
    }
}

/// Mireds, or a string such as `6500K` or `153 mireds`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorTemperature {
    Mireds(f32),
    Text(String),
}

impl ColorTemperature {
    pub fn mireds(&self, key: &str) -> ConfigResult<f32> {
        let mireds = match self {
            Self::Mireds(mireds) => *mireds,
            Self::Text(text) => {
                let text = text.trim();
                let (number, kelvin) = if let Some(n) = text.strip_suffix("mireds") {
                    (n, false)
                } else if let Some(n) = text.strip_suffix('K') {
                    (n, true)
                } else {
                    (text, false)
                };
                let value: f32 = number
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::invalid(key, format!("cannot read color temperature '{text}'")))?;
                if kelvin && value > 0.0 {
                    1_000_000.0 / value
                } else {
                    value
                }
            }
        };
        if !mireds.is_finite() || mireds <= 0.0 {
            return Err(ConfigError::invalid(key, "must be a positive temperature"));
        }
        Ok(mireds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimmerEntry {
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub min_value: u32,
    #[serde(default = "default_max_value")]
    pub max_value: u32,
    #[serde(default)]
    pub inverted: bool,
    /// Datapoint the device keeps its dimmer floor in
    #[serde(default)]
    pub min_value_datapoint: Option<DatapointRef>,
    #[serde(default)]
    pub retries: RetriesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteTemperatureEntry {
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub min_value: u32,
    #[serde(default = "default_max_value")]
    pub max_value: u32,
    #[serde(default)]
    pub inverted: bool,
    pub cold_white_color_temperature: ColorTemperature,
    pub warm_white_color_temperature: ColorTemperature,
    #[serde(default)]
    pub retries: RetriesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorEntry {
    pub datapoint: DatapointRef,
    #[serde(rename = "type")]
    pub encoding: ColorEncoding,
    #[serde(default)]
    pub retries: RetriesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub light_type: LightType,
    pub switch: SwitchRef,
    #[serde(default)]
    pub dimmer: Option<DimmerEntry>,
    #[serde(default)]
    pub white_temperature: Option<WhiteTemperatureEntry>,
    #[serde(default)]
    pub color: Option<ColorEntry>,
    /// Color and white are never on together
    #[serde(default)]
    pub color_interlock: bool,
}

fn check_range(id: &str, section: &str, min_value: u32, max_value: u32) -> ConfigResult<()> {
    if min_value >= max_value {
        return Err(ConfigError::validation(format!(
            "light '{id}': {section} min_value {min_value} must be below max_value {max_value}"
        )));
    }
    Ok(())
}

impl LightEntry {
    pub fn validate(&self) -> ConfigResult<()> {
        let (dimmer, white, color) = self.light_type.sections();
        for (name, needed, present) in [
            ("dimmer", dimmer, self.dimmer.is_some()),
            ("white_temperature", white, self.white_temperature.is_some()),
            ("color", color, self.color.is_some()),
        ] {
            if needed != present {
                return Err(ConfigError::validation(format!(
                    "light '{}' of type {:?}: {} section {}",
                    self.id,
                    self.light_type,
                    name,
                    if needed { "is required" } else { "is not allowed" }
                )));
            }
        }
        if self.color_interlock && self.light_type != LightType::Rgbct {
            return Err(ConfigError::validation(format!(
                "light '{}': color_interlock needs an rgbct light",
                self.id
            )));
        }

        if let Some(dimmer) = &self.dimmer {
            check_range(&self.id, "dimmer", dimmer.min_value, dimmer.max_value)?;
        }
        if let Some(white) = &self.white_temperature {
            check_range(&self.id, "white_temperature", white.min_value, white.max_value)?;
            let key = format!("light.{}.white_temperature", self.id);
            let cold = white
                .cold_white_color_temperature
                .mireds(&format!("{key}.cold_white_color_temperature"))?;
            let warm = white
                .warm_white_color_temperature
                .mireds(&format!("{key}.warm_white_color_temperature"))?;
            if cold >= warm {
                return Err(ConfigError::validation(format!(
                    "light '{}': cold white ({cold} mireds) must be colder than warm white ({warm} mireds)",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn build(&self, id: EntityId) -> ConfigResult<Light> {
        self.validate()?;
        let key = format!("light.{}", self.id);
        let mut light = Light::new(id, self.switch.adapter(&format!("{key}.switch"))?);

        if let Some(dimmer) = &self.dimmer {
            let dimmer_key = format!("{key}.dimmer");
            light = light.with_dimmer(DpDimmer::new(
                dimmer.datapoint.matcher(&format!("{dimmer_key}.datapoint"), &NUMBER_DP)?,
                dimmer.min_value,
                dimmer.max_value,
                dimmer.inverted,
                dimmer.retries.to_retry(&format!("{dimmer_key}.retries"))?,
            ));
            if let Some(floor) = &dimmer.min_value_datapoint {
                let number = DpNumber::plain(
                    floor.matcher(&format!("{dimmer_key}.min_value_datapoint"), &NUMBER_DP)?,
                    dimmer.retries.to_retry(&format!("{dimmer_key}.retries"))?,
                );
                light = light.with_min_value_datapoint(number, dimmer.min_value);
            }
        }

        if let Some(white) = &self.white_temperature {
            let white_key = format!("{key}.white_temperature");
            let dimmer = DpDimmer::new(
                white.datapoint.matcher(&format!("{white_key}.datapoint"), &NUMBER_DP)?,
                white.min_value,
                white.max_value,
                white.inverted,
                white.retries.to_retry(&format!("{white_key}.retries"))?,
            );
            let cold = white
                .cold_white_color_temperature
                .mireds(&format!("{white_key}.cold_white_color_temperature"))?;
            let warm = white
                .warm_white_color_temperature
                .mireds(&format!("{white_key}.warm_white_color_temperature"))?;
            light = light.with_white_temperature(WhiteTemperature::new(dimmer, cold, warm));
        }

        if let Some(color) = &self.color {
            let color_key = format!("{key}.color");
            light = light.with_color(DpColor::new(
                color.datapoint.matcher(&format!("{color_key}.datapoint"), &COLOR_DP)?,
                color.encoding,
                color.retries.to_retry(&format!("{color_key}.retries"))?,
            ));
        }

        Ok(light.with_color_interlock(self.color_interlock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uyat_core::EntityKind;
    use uyat_entities::ColorMode;

    fn parse(yaml: &str) -> LightEntry {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn light_id() -> EntityId {
        EntityId::new(EntityKind::Light, "desk").unwrap()
    }

    #[test]
    fn test_color_temperature_forms() {
        let key = "light.desk";
        assert_eq!(ColorTemperature::Mireds(153.0).mireds(key).unwrap(), 153.0);
        assert_eq!(ColorTemperature::Text("5000K".into()).mireds(key).unwrap(), 200.0);
        assert_eq!(ColorTemperature::Text("250 mireds".into()).mireds(key).unwrap(), 250.0);
        assert!(ColorTemperature::Text("warm".into()).mireds(key).is_err());
        assert!(ColorTemperature::Mireds(0.0).mireds(key).is_err());
    }

    #[test]
    fn test_sections_follow_type() {
        let dimmer = parse("{ id: desk, type: dimmer, switch: 20, dimmer: { datapoint: 22 } }");
        dimmer.validate().unwrap();
        assert_eq!(dimmer.dimmer.as_ref().map(|d| d.max_value), Some(255));

        let missing = parse("{ id: desk, type: ct, switch: 20, dimmer: { datapoint: 22 } }");
        assert!(matches!(missing.validate(), Err(ConfigError::ValidationFailed { .. })));

        let extra = parse("{ id: desk, type: binary, switch: 20, dimmer: { datapoint: 22 } }");
        assert!(matches!(extra.validate(), Err(ConfigError::ValidationFailed { .. })));

        let interlock = parse(
            "{ id: desk, type: rgb, switch: 20, color: { datapoint: 24, type: rgb }, color_interlock: true }",
        );
        assert!(matches!(interlock.validate(), Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn test_ranges_checked() {
        let flat = parse(
            "{ id: desk, type: dimmer, switch: 20, dimmer: { datapoint: 22, min_value: 10, max_value: 10 } }",
        );
        assert!(matches!(flat.validate(), Err(ConfigError::ValidationFailed { .. })));

        let swapped = parse(
            "{ id: desk, type: ct, switch: 20, dimmer: { datapoint: 22 },
               white_temperature: { datapoint: 23, cold_white_color_temperature: 2700K,
                                    warm_white_color_temperature: 6500K } }",
        );
        assert!(matches!(swapped.validate(), Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn test_color_datapoint_must_be_string() {
        let raw = parse(
            "{ id: desk, type: rgb, switch: 20, color: { datapoint: { number: 24, type: raw }, type: hsv } }",
        );
        assert!(matches!(raw.build(light_id()), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_build_rgbct() {
        let entry = parse(
            "{ id: desk, type: rgbct, switch: 20, color_interlock: true,
               dimmer: { datapoint: 22, min_value: 10, max_value: 1000, min_value_datapoint: 26 },
               white_temperature: { datapoint: 23, max_value: 1000,
                                    cold_white_color_temperature: 6500K,
                                    warm_white_color_temperature: 2700K },
               color: { datapoint: 24, type: RGBHSV } }",
        );
        assert_eq!(entry.color.as_ref().map(|c| c.encoding), Some(ColorEncoding::RgbHsv));

        let light = entry.build(light_id()).unwrap();
        let traits = light.traits();
        assert_eq!(traits.color_modes, vec![ColorMode::Rgb, ColorMode::ColorTemperature]);
        assert!((traits.min_mireds.unwrap() - 153.846).abs() < 1e-2);
        assert!((traits.max_mireds.unwrap() - 370.370).abs() < 1e-2);
    }
}
