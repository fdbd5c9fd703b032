//! Voltage / amperage / power triple packed into a raw datapoint

use std::fmt;
use tracing::{trace, warn};
use uyat_core::{DatapointError, DatapointRecord, DatapointValue, MatchingDatapoint};
use uyat_dispatch::ListenerRegistry;

const VAP_PAYLOAD_LEN: usize = 8;

/// Decoded VAP payload, in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VapValue {
    pub voltage: u32,
    pub amperage: u32,
    pub power: u32,
}

impl VapValue {
    /// Decode the 8-byte payload: big-endian u16 at offsets 0, 3 and 6
    pub fn decode(number: u8, payload: &[u8]) -> Result<Self, DatapointError> {
        if payload.len() != VAP_PAYLOAD_LEN {
            return Err(DatapointError::Decode {
                number,
                reason: format!(
                    "VAP payload must be {} bytes, got {}",
                    VAP_PAYLOAD_LEN,
                    payload.len()
                ),
            });
        }
        let field = |at: usize| u32::from(u16::from_be_bytes([payload[at], payload[at + 1]]));
        Ok(Self {
            voltage: field(0),
            amperage: field(3),
            power: field(6),
        })
    }
}

impl fmt::Display for VapValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V: {}, A: {}, P: {}", self.voltage, self.amperage, self.power)
    }
}

/// Adapter for a raw VAP datapoint
#[derive(Debug, Clone)]
pub struct DpVap {
    matcher: MatchingDatapoint,
    last: Option<VapValue>,
}

impl DpVap {
    pub fn new(matcher: MatchingDatapoint) -> Self {
        Self { matcher, last: None }
    }

    /// Register the datapoint with the handler
    pub fn init(&mut self, registry: &mut dyn ListenerRegistry) {
        registry.register_listener(self.matcher.number);
    }

    pub fn number(&self) -> u8 {
        self.matcher.number
    }

    /// Process an inbound record, returning the decoded triple
    pub fn handle(&mut self, record: &DatapointRecord) -> Option<VapValue> {
        if record.number != self.matcher.number {
            return None;
        }
        trace!("{} processing as VAP", record);

        match self.decode(record) {
            Ok(value) => {
                self.last = Some(value);
                Some(value)
            }
            Err(e) => {
                warn!("Failed to decode VAP: {}", e);
                None
            }
        }
    }

    pub fn last_received_value(&self) -> Option<VapValue> {
        self.last
    }

    pub fn matcher(&self) -> &MatchingDatapoint {
        &self.matcher
    }

    fn decode(&mut self, record: &DatapointRecord) -> Result<VapValue, DatapointError> {
        let observed = record.datapoint_type();
        self.matcher.check(observed)?;

        let DatapointValue::Raw(payload) = &record.value else {
            return Err(DatapointError::UnsupportedType {
                number: record.number,
                observed,
            });
        };
        let value = VapValue::decode(record.number, payload)?;
        self.matcher.resolve(observed);
        Ok(value)
    }
}

impl fmt::Display for DpVap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uyat_core::DatapointType;

    #[test]
    fn test_decode_fixed_offsets() {
        let payload = [0x08, 0xfc, 0xaa, 0x00, 0x7b, 0xbb, 0x01, 0x2c];

        let value = VapValue::decode(5, &payload).unwrap();

        assert_eq!(
            value,
            VapValue {
                voltage: 2300,
                amperage: 123,
                power: 300,
            }
        );
        assert_eq!(value.to_string(), "V: 2300, A: 123, P: 300");
    }

    #[test]
    fn test_wrong_length_is_decode_failure() {
        let mut vap = DpVap::new(MatchingDatapoint::single(5, DatapointType::Raw));
        let good = DatapointRecord::new(5, DatapointValue::Raw(vec![0, 1, 0, 0, 2, 0, 0, 3]));
        vap.handle(&good);

        for len in [0usize, 7, 9] {
            let record = DatapointRecord::new(5, DatapointValue::Raw(vec![0; len]));
            assert_eq!(vap.handle(&record), None);
        }
        assert_eq!(
            vap.last_received_value(),
            Some(VapValue {
                voltage: 1,
                amperage: 2,
                power: 3,
            })
        );
    }

    #[test]
    fn test_non_raw_rejected() {
        let mut vap = DpVap::new(MatchingDatapoint::single(5, DatapointType::Raw));

        assert_eq!(vap.handle(&DatapointRecord::new(5, DatapointValue::UInt(1))), None);
        assert_eq!(vap.to_string(), "Datapoint 5: RAW");
    }
}
