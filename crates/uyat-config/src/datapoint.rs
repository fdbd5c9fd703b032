//! Datapoint references, per-feature type rules and retry settings

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uyat_adapters::DpSwitch;
use uyat_climate::SwitchFeature;
use uyat_core::{
    DatapointType, MatchingDatapoint, RetryConfig, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_TIMEOUT_MS,
};

/// Wire type named in a datapoint reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpTypeHint {
    /// Learn the type from the first received value
    Detect,
    Bool,
    Uint,
    Enum,
    Raw,
    String,
    Bitmap8,
    Bitmap16,
    Bitmap32,
}

impl DpTypeHint {
    /// The wire type, `None` for `detect`
    pub fn datapoint_type(&self) -> Option<DatapointType> {
        match self {
            Self::Detect => None,
            Self::Bool => Some(DatapointType::Boolean),
            Self::Uint => Some(DatapointType::Integer),
            Self::Enum => Some(DatapointType::Enum),
            Self::Raw => Some(DatapointType::Raw),
            Self::String => Some(DatapointType::String),
            Self::Bitmap8 => Some(DatapointType::Bitmask8),
            Self::Bitmap16 => Some(DatapointType::Bitmask16),
            Self::Bitmap32 => Some(DatapointType::Bitmask32),
        }
    }
}

/// Which types a feature accepts, and what a bare number means
pub(crate) struct DpRule {
    /// Types matched when the reference gives no type
    defaults: &'static [DatapointType],
    allowed: &'static [DpTypeHint],
}

pub(crate) const SWITCH_DP: DpRule = DpRule {
    defaults: &[DatapointType::Boolean],
    allowed: &[DpTypeHint::Detect, DpTypeHint::Bool, DpTypeHint::Uint, DpTypeHint::Enum],
};

pub(crate) const NUMBER_DP: DpRule = DpRule {
    defaults: &[DatapointType::Integer],
    allowed: &[DpTypeHint::Detect, DpTypeHint::Uint, DpTypeHint::Enum],
};

/// Code datapoints: active state, climate fan speed, select
pub(crate) const CODE_DP: DpRule = DpRule {
    defaults: &[DatapointType::Enum],
    allowed: &[DpTypeHint::Detect, DpTypeHint::Uint, DpTypeHint::Enum],
};

/// A bare sensor number accepts every numeric type
pub(crate) const SENSOR_DP: DpRule = DpRule {
    defaults: &[
        DatapointType::Boolean,
        DatapointType::Integer,
        DatapointType::Enum,
        DatapointType::Bitmask8,
        DatapointType::Bitmask16,
        DatapointType::Bitmask32,
    ],
    allowed: &[
        DpTypeHint::Detect,
        DpTypeHint::Bool,
        DpTypeHint::Uint,
        DpTypeHint::Enum,
        DpTypeHint::Bitmap8,
        DpTypeHint::Bitmap16,
        DpTypeHint::Bitmap32,
    ],
};

pub(crate) const TEXT_DP: DpRule = DpRule {
    defaults: &[DatapointType::String],
    allowed: &[DpTypeHint::Raw, DpTypeHint::String],
};

/// Light color strings
pub(crate) const COLOR_DP: DpRule = DpRule {
    defaults: &[DatapointType::String],
    allowed: &[DpTypeHint::String],
};

pub(crate) const VAP_DP: DpRule = DpRule {
    defaults: &[DatapointType::Raw],
    allowed: &[DpTypeHint::Raw],
};

/// A datapoint, as a bare number or `{ number, type }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatapointRef {
    Number(u8),
    Typed {
        number: u8,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        hint: Option<DpTypeHint>,
    },
}

impl DatapointRef {
    pub fn number(&self) -> u8 {
        match self {
            Self::Number(number) | Self::Typed { number, .. } => *number,
        }
    }

    pub fn hint(&self) -> Option<DpTypeHint> {
        match self {
            Self::Number(_) => None,
            Self::Typed { hint, .. } => *hint,
        }
    }

    pub(crate) fn matcher(&self, key: &str, rule: &DpRule) -> ConfigResult<MatchingDatapoint> {
        let number = self.number();
        let Some(hint) = self.hint() else {
            return Ok(MatchingDatapoint::with_types(number, rule.defaults.iter().copied()));
        };
        if !rule.allowed.contains(&hint) {
            return Err(ConfigError::invalid(
                key,
                format!("datapoint type {:?} is not allowed here", hint),
            ));
        }
        Ok(MatchingDatapoint::with_types(number, hint.datapoint_type()))
    }
}

/// `retries:` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetriesConfig {
    pub enabled: bool,
    /// Resends per write, 1-255
    pub count: u8,
    pub timeout_ms: u64,
}

impl Default for RetriesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            count: DEFAULT_RETRY_COUNT,
            timeout_ms: DEFAULT_RETRY_TIMEOUT_MS,
        }
    }
}

impl RetriesConfig {
    pub(crate) fn to_retry(self, key: &str) -> ConfigResult<RetryConfig> {
        if self.count == 0 {
            return Err(ConfigError::invalid(format!("{key}.count"), "must be between 1 and 255"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid(format!("{key}.timeout_ms"), "must be positive"));
        }
        Ok(RetryConfig {
            enabled: self.enabled,
            count: self.count,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

/// An on/off datapoint with its switch options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchEntry {
    pub datapoint: DatapointRef,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub retries: RetriesConfig,
}

/// A switch given in full or as just its datapoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SwitchRef {
    Full(SwitchEntry),
    Bare(DatapointRef),
}

impl SwitchRef {
    pub fn entry(&self) -> SwitchEntry {
        match self {
            Self::Full(entry) => entry.clone(),
            Self::Bare(datapoint) => SwitchEntry {
                datapoint: datapoint.clone(),
                inverted: false,
                retries: RetriesConfig::default(),
            },
        }
    }

    pub(crate) fn feature(&self, key: &str) -> ConfigResult<SwitchFeature> {
        let entry = self.entry();
        Ok(SwitchFeature {
            datapoint: entry.datapoint.matcher(&format!("{key}.datapoint"), &SWITCH_DP)?,
            inverted: entry.inverted,
            retry: entry.retries.to_retry(&format!("{key}.retries"))?,
        })
    }

    pub(crate) fn adapter(&self, key: &str) -> ConfigResult<DpSwitch> {
        let feature = self.feature(key)?;
        Ok(DpSwitch::new(feature.datapoint, feature.inverted, feature.retry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uyat_core::TypeResolution;

    fn parse<T: serde::de::DeserializeOwned>(yaml: &str) -> T {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_bare_and_typed_reference() {
        let bare: DatapointRef = parse("7");
        assert_eq!(bare, DatapointRef::Number(7));

        let typed: DatapointRef = parse("{ number: 7, type: bitmap16 }");
        assert_eq!(typed.number(), 7);
        assert_eq!(typed.hint(), Some(DpTypeHint::Bitmap16));
    }

    #[test]
    fn test_matcher_defaults() {
        let m = DatapointRef::Number(1).matcher("k", &SWITCH_DP).unwrap();
        assert_eq!(m.single_type(), Some(DatapointType::Boolean));

        let m = DatapointRef::Number(3).matcher("k", &SENSOR_DP).unwrap();
        assert!(matches!(m.resolution(), TypeResolution::Multiple(types) if types.len() == 6));

        let detect: DatapointRef = parse("{ number: 2, type: detect }");
        let m = detect.matcher("k", &NUMBER_DP).unwrap();
        assert_eq!(m.resolution(), &TypeResolution::Unresolved);
    }

    #[test]
    fn test_disallowed_type() {
        let raw: DatapointRef = parse("{ number: 2, type: raw }");
        let err = raw.matcher("number.level.datapoint", &NUMBER_DP).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "number.level.datapoint"));
    }

    #[test]
    fn test_retries() {
        let retries: RetriesConfig = parse("{ enabled: true }");
        let retry = retries.to_retry("r").unwrap();
        assert!(retry.is_active());
        assert_eq!(retry.count, 3);
        assert_eq!(retry.timeout, Duration::from_millis(300));

        let zero: RetriesConfig = parse("{ enabled: true, count: 0 }");
        assert!(zero.to_retry("r").is_err());
    }

    #[test]
    fn test_switch_ref_forms() {
        let bare: SwitchRef = parse("8");
        assert_eq!(bare.entry().datapoint, DatapointRef::Number(8));
        assert!(!bare.entry().inverted);

        let typed: SwitchRef = parse("{ number: 8, type: enum }");
        assert_eq!(typed.entry().datapoint.hint(), Some(DpTypeHint::Enum));

        let full: SwitchRef = parse("{ datapoint: 1, inverted: true, retries: { enabled: true } }");
        let feature = full.feature("s").unwrap();
        assert!(feature.inverted);
        assert!(feature.retry.enabled);
    }
}
