//! Text reading from a raw or string datapoint

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use tracing::{trace, warn};
use uyat_core::{DatapointError, DatapointRecord, DatapointValue, MatchingDatapoint};
use uyat_dispatch::ListenerRegistry;

/// Byte count above which the hex form carries its length
const HEX_LENGTH_SUFFIX_ABOVE: usize = 4;

/// Uppercase byte pairs joined by `.`, e.g. `0A.FF.10.00.01 (5)`
fn format_hex_pretty(bytes: &[u8]) -> String {
    let pairs: Vec<String> = bytes.iter().map(|b| hex::encode_upper([*b])).collect();
    let mut text = pairs.join(".");
    if bytes.len() > HEX_LENGTH_SUFFIX_ABOVE {
        text.push_str(&format!(" ({})", bytes.len()));
    }
    text
}

/// Adapter for a text reading
///
/// The payload optionally goes through a base64 unwrap and then optionally
/// through hex formatting, in that order.
#[derive(Debug, Clone)]
pub struct DpTextSensor {
    matcher: MatchingDatapoint,
    base64_encoded: bool,
    as_hex: bool,
    last: Option<String>,
}

impl DpTextSensor {
    pub fn new(matcher: MatchingDatapoint, base64_encoded: bool, as_hex: bool) -> Self {
        Self {
            matcher,
            base64_encoded,
            as_hex,
            last: None,
        }
    }

    /// Register the datapoint with the handler
    pub fn init(&mut self, registry: &mut dyn ListenerRegistry) {
        registry.register_listener(self.matcher.number);
    }

    pub fn number(&self) -> u8 {
        self.matcher.number
    }

    /// Process an inbound record, returning the decoded text
    pub fn handle(&mut self, record: &DatapointRecord) -> Option<String> {
        if record.number != self.matcher.number {
            return None;
        }
        trace!("{} processing as text sensor", record);

        match self.decode(record) {
            Ok(text) => {
                self.last = Some(text.clone());
                Some(text)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    pub fn last_value(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn matcher(&self) -> &MatchingDatapoint {
        &self.matcher
    }

    fn decode(&mut self, record: &DatapointRecord) -> Result<String, DatapointError> {
        let observed = record.datapoint_type();
        self.matcher.check(observed)?;

        let payload: &[u8] = match &record.value {
            DatapointValue::Raw(bytes) => bytes,
            DatapointValue::String(text) => text.as_bytes(),
            _ => {
                return Err(DatapointError::UnsupportedType {
                    number: record.number,
                    observed,
                })
            }
        };
        self.matcher.resolve(observed);
        self.format(record.number, payload)
    }

    fn format(&self, number: u8, payload: &[u8]) -> Result<String, DatapointError> {
        if payload.is_empty() {
            return Ok(String::new());
        }

        let unwrapped;
        let bytes = if self.base64_encoded {
            unwrapped = STANDARD.decode(payload).map_err(|e| DatapointError::Decode {
                number,
                reason: format!("invalid base64: {}", e),
            })?;
            unwrapped.as_slice()
        } else {
            payload
        };

        if self.as_hex {
            Ok(format_hex_pretty(bytes))
        } else {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl fmt::Display for DpTextSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.base64_encoded {
            f.write_str("Base64 ")?;
        }
        if self.as_hex {
            f.write_str("Hex ")?;
        }
        write!(f, "{}", self.matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uyat_core::DatapointType;

    fn raw(number: u8, bytes: &[u8]) -> DatapointRecord {
        DatapointRecord::new(number, DatapointValue::Raw(bytes.to_vec()))
    }

    #[test]
    fn test_hex_pretty() {
        assert_eq!(format_hex_pretty(&[0x0a, 0xff]), "0A.FF");
        assert_eq!(format_hex_pretty(&[1, 2, 3, 4]), "01.02.03.04");
        assert_eq!(format_hex_pretty(&[1, 2, 3, 4, 5]), "01.02.03.04.05 (5)");
    }

    #[test]
    fn test_plain_string() {
        let mut sensor = DpTextSensor::new(MatchingDatapoint::single(4, DatapointType::String), false, false);
        let record = DatapointRecord::new(4, DatapointValue::String("v1.2".into()));

        assert_eq!(sensor.handle(&record).as_deref(), Some("v1.2"));
        assert_eq!(sensor.last_value(), Some("v1.2"));
    }

    #[test]
    fn test_raw_as_hex() {
        let mut sensor = DpTextSensor::new(MatchingDatapoint::single(4, DatapointType::Raw), false, true);

        assert_eq!(sensor.handle(&raw(4, &[0xde, 0xad])).as_deref(), Some("DE.AD"));
    }

    #[test]
    fn test_base64_then_hex() {
        let mut sensor = DpTextSensor::new(MatchingDatapoint::single(4, DatapointType::String), true, true);
        let record = DatapointRecord::new(4, DatapointValue::String("AQIDBAU=".into()));

        assert_eq!(sensor.handle(&record).as_deref(), Some("01.02.03.04.05 (5)"));
        assert_eq!(sensor.to_string(), "Base64 Hex Datapoint 4: STRING");
    }

    #[test]
    fn test_base64_text() {
        let mut sensor = DpTextSensor::new(MatchingDatapoint::single(4, DatapointType::Raw), true, false);

        assert_eq!(sensor.handle(&raw(4, b"aGVsbG8=")).as_deref(), Some("hello"));
    }

    #[test]
    fn test_bad_base64_keeps_last() {
        let mut sensor = DpTextSensor::new(MatchingDatapoint::single(4, DatapointType::Raw), true, false);
        sensor.handle(&raw(4, b"aGVsbG8="));

        assert_eq!(sensor.handle(&raw(4, b"not base64!")), None);
        assert_eq!(sensor.last_value(), Some("hello"));
    }

    #[test]
    fn test_empty_payload() {
        let mut sensor = DpTextSensor::new(MatchingDatapoint::single(4, DatapointType::Raw), true, true);

        assert_eq!(sensor.handle(&raw(4, &[])).as_deref(), Some(""));
    }

    #[test]
    fn test_numeric_value_rejected() {
        let mut sensor = DpTextSensor::new(MatchingDatapoint::unresolved(4), false, false);

        assert_eq!(sensor.handle(&DatapointRecord::new(4, DatapointValue::UInt(1))), None);
        assert!(!sensor.matcher().allows_single_type());
    }
}
