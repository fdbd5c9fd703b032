//! Read-only numeric reading

use std::fmt;
use tracing::{trace, warn};
use uyat_core::{DatapointError, DatapointRecord, MatchingDatapoint};
use uyat_dispatch::ListenerRegistry;

/// Decimal shift for a `scale` of 0..=6; anything else is no shift
fn scale_to_multiplier(scale: u8) -> f32 {
    match scale {
        0..=6 => 10f32.powi(-i32::from(scale)),
        _ => 1.0,
    }
}

/// Adapter for a read-only numeric reading
///
/// Accepts bool, uint, enum and bitmask values:
/// `value = (raw + offset) * 10^-scale`.
#[derive(Debug, Clone)]
pub struct DpSensor {
    matcher: MatchingDatapoint,
    offset: i32,
    multiplier: f32,
    last: Option<f32>,
}

impl DpSensor {
    pub fn new(matcher: MatchingDatapoint, offset: i32, scale: u8) -> Self {
        Self {
            matcher,
            offset,
            multiplier: scale_to_multiplier(scale),
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

    /// Process an inbound record, returning the scaled reading
    pub fn handle(&mut self, record: &DatapointRecord) -> Option<f32> {
        if record.number != self.matcher.number {
            return None;
        }
        trace!("{} processing as sensor", record);

        match self.decode(record) {
            Ok(raw) => {
                let value = (raw as f32 + self.offset as f32) * self.multiplier;
                self.last = Some(value);
                Some(value)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    pub fn last_value(&self) -> Option<f32> {
        self.last
    }

    pub fn matcher(&self) -> &MatchingDatapoint {
        &self.matcher
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    fn decode(&mut self, record: &DatapointRecord) -> Result<u32, DatapointError> {
        let observed = record.datapoint_type();
        self.matcher.check(observed)?;

        // Raw and string payloads have no numeric reading
        let raw = record.value.as_u32().ok_or(DatapointError::UnsupportedType {
            number: record.number,
            observed,
        })?;
        self.matcher.resolve(observed);
        Ok(raw)
    }
}

impl fmt::Display for DpSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, offset={}, multiplier={:.2}",
            self.matcher, self.offset, self.multiplier
        )
    }
}
