//! Datapoint value model exchanged with the appliance MCU

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire type of a datapoint value
///
/// The type is part of a datapoint's identity: a matcher resolved to one type
/// never accepts values of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatapointType {
    Boolean,
    Integer,
    Enum,
    Raw,
    String,
    Bitmask8,
    Bitmask16,
    Bitmask32,
}

impl DatapointType {
    /// Upper-case name used in log lines and config dumps
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Enum => "ENUM",
            Self::Raw => "RAW",
            Self::String => "STRING",
            Self::Bitmask8 => "BITMASK8",
            Self::Bitmask16 => "BITMASK16",
            Self::Bitmask32 => "BITMASK32",
        }
    }

    /// Whether the type carries a single unsigned number
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Raw | Self::String)
    }
}

impl fmt::Display for DatapointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded datapoint value
///
/// Exactly one variant is active; [`DatapointValue::datapoint_type`] reports
/// which wire type it was carried as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DatapointValue {
    Bool(bool),
    UInt(u32),
    Enum(u8),
    Raw(Vec<u8>),
    String(String),
    Bitmask8(u8),
    Bitmask16(u16),
    Bitmask32(u32),
}

impl DatapointValue {
    /// Wire type of this value
    pub fn datapoint_type(&self) -> DatapointType {
        match self {
            Self::Bool(_) => DatapointType::Boolean,
            Self::UInt(_) => DatapointType::Integer,
            Self::Enum(_) => DatapointType::Enum,
            Self::Raw(_) => DatapointType::Raw,
            Self::String(_) => DatapointType::String,
            Self::Bitmask8(_) => DatapointType::Bitmask8,
            Self::Bitmask16(_) => DatapointType::Bitmask16,
            Self::Bitmask32(_) => DatapointType::Bitmask32,
        }
    }

    /// The value widened to `u32`, for every single-number variant
    ///
    /// Booleans read as 0/1. Returns `None` for raw and string payloads.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Bool(v) => Some(u32::from(*v)),
            Self::UInt(v) => Some(*v),
            Self::Enum(v) => Some(u32::from(*v)),
            Self::Bitmask8(v) => Some(u32::from(*v)),
            Self::Bitmask16(v) => Some(u32::from(*v)),
            Self::Bitmask32(v) => Some(*v),
            Self::Raw(_) | Self::String(_) => None,
        }
    }
}

impl fmt::Display for DatapointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", if *v { "ON" } else { "OFF" }),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Enum(v) => write!(f, "{}", v),
            Self::Raw(v) => write!(f, "0x{}", hex::encode_upper(v)),
            Self::String(v) => write!(f, "\"{}\"", v),
            Self::Bitmask8(v) => write!(f, "{:#04x}", v),
            Self::Bitmask16(v) => write!(f, "{:#06x}", v),
            Self::Bitmask32(v) => write!(f, "{:#010x}", v),
        }
    }
}

/// A numbered datapoint value, as received from or sent to the MCU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatapointRecord {
    /// Datapoint number (0-255)
    pub number: u8,
    /// The typed value
    pub value: DatapointValue,
}

impl DatapointRecord {
    /// Create a new record
    pub fn new(number: u8, value: DatapointValue) -> Self {
        Self { number, value }
    }

    /// Wire type of the carried value
    pub fn datapoint_type(&self) -> DatapointType {
        self.value.datapoint_type()
    }
}

impl fmt::Display for DatapointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Datapoint {}: {} ({})",
            self.number,
            self.value.datapoint_type(),
            self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_reports_wire_type() {
        assert_eq!(DatapointValue::Bool(true).datapoint_type(), DatapointType::Boolean);
        assert_eq!(DatapointValue::UInt(7).datapoint_type(), DatapointType::Integer);
        assert_eq!(DatapointValue::Enum(2).datapoint_type(), DatapointType::Enum);
        assert_eq!(DatapointValue::Raw(vec![1]).datapoint_type(), DatapointType::Raw);
        assert_eq!(
            DatapointValue::String("x".into()).datapoint_type(),
            DatapointType::String
        );
        assert_eq!(DatapointValue::Bitmask16(1).datapoint_type(), DatapointType::Bitmask16);
    }

    #[test]
    fn test_as_u32_widens_numeric_variants() {
        assert_eq!(DatapointValue::Bool(true).as_u32(), Some(1));
        assert_eq!(DatapointValue::Enum(3).as_u32(), Some(3));
        assert_eq!(DatapointValue::Bitmask32(0xdead_beef).as_u32(), Some(0xdead_beef));
        assert_eq!(DatapointValue::Raw(vec![1, 2]).as_u32(), None);
        assert_eq!(DatapointValue::String("1".into()).as_u32(), None);
    }

    #[test]
    fn test_record_display() {
        let record = DatapointRecord::new(5, DatapointValue::Raw(vec![0x0a, 0xff]));
        assert_eq!(record.to_string(), "Datapoint 5: RAW (0x0AFF)");

        let record = DatapointRecord::new(1, DatapointValue::Bool(false));
        assert_eq!(record.to_string(), "Datapoint 1: BOOLEAN (OFF)");
    }

    #[test]
    fn test_value_serde_shape() {
        let json = serde_json::to_value(DatapointValue::Enum(2)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "enum", "value": 2}));

        let back: DatapointValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, DatapointValue::Enum(2));
    }
}
