//! Numeric value carried by a uint or enum datapoint

use crate::retry::{DatapointRetry, RetryStep};
use std::fmt;
use tracing::{debug, error, trace, warn};
use uyat_core::{
    DatapointError, DatapointRecord, DatapointType, DatapointValue, MatchingDatapoint, RetryConfig,
};
use uyat_dispatch::{DatapointSink, ListenerRegistry};

/// Adapter for a linearly scaled numeric value
///
/// Inbound: `value = (raw + offset) * multiplier`. Outbound applies the
/// inverse and rounds to the nearest wire integer.
#[derive(Debug, Clone)]
pub struct DpNumber {
    matcher: MatchingDatapoint,
    offset: f32,
    multiplier: f32,
    retry: DatapointRetry,
    bound: bool,
    last_received: Option<f32>,
    last_received_raw: Option<u32>,
    last_set: Option<f32>,
    last_set_raw: Option<u32>,
}

impl DpNumber {
    pub fn new(matcher: MatchingDatapoint, offset: f32, multiplier: f32, retry: RetryConfig) -> Self {
        Self {
            retry: DatapointRetry::new(matcher.number, retry),
            matcher,
            offset,
            multiplier,
            bound: false,
            last_received: None,
            last_received_raw: None,
            last_set: None,
            last_set_raw: None,
        }
    }

    /// Identity transform
    pub fn plain(matcher: MatchingDatapoint, retry: RetryConfig) -> Self {
        Self::new(matcher, 0.0, 1.0, retry)
    }

    /// Register the datapoint with the handler
    pub fn init(&mut self, registry: &mut dyn ListenerRegistry) {
        registry.register_listener(self.matcher.number);
        self.bound = true;
    }

    pub fn number(&self) -> u8 {
        self.matcher.number
    }

    /// Process an inbound record, returning the transformed value
    pub fn handle(&mut self, record: &DatapointRecord, sink: &mut dyn DatapointSink) -> Option<f32> {
        if record.number != self.matcher.number {
            return None;
        }
        trace!("{} processing as number", record);

        let raw = match self.decode(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{}", e);
                return None;
            }
        };
        let value = self.to_value(raw);
        self.last_received_raw = Some(raw);
        self.last_received = Some(value);

        if self.last_set_raw == Some(raw) && self.retry.is_armed() {
            debug!(dp = self.matcher.number, "MCU confirmed value, canceling retry");
            self.retry.cancel(sink);
        }
        Some(value)
    }

    /// Write a new value
    pub fn set_value(&mut self, value: f32, sink: &mut dyn DatapointSink) {
        self.send_value(value, false, sink);
    }

    /// Write a raw wire code, bypassing the transform
    pub fn set_raw(&mut self, raw: u32, sink: &mut dyn DatapointSink) {
        self.send_value(self.to_value(raw), false, sink);
    }

    /// Retry timer hook; returns whether the timer belonged to this adapter
    pub fn on_retry_timeout(&mut self, number: u8, sink: &mut dyn DatapointSink) -> bool {
        if number != self.matcher.number {
            return false;
        }
        if self.retry.on_timeout(sink) == RetryStep::Resend {
            match self.last_set {
                Some(value) => self.send_value(value, true, sink),
                None => error!(dp = number, "Retry timeout: no value to resend"),
            }
        }
        true
    }

    pub fn last_received_value(&self) -> Option<f32> {
        self.last_received
    }

    /// Last received wire value, before the transform
    pub fn last_received_raw(&self) -> Option<u32> {
        self.last_received_raw
    }

    pub fn last_set_value(&self) -> Option<f32> {
        self.last_set
    }

    pub fn matcher(&self) -> &MatchingDatapoint {
        &self.matcher
    }

    pub fn retry(&self) -> &DatapointRetry {
        &self.retry
    }

    /// Wire value for `value` under the inverse transform
    pub fn to_raw(&self, value: f32) -> Option<u32> {
        let raw = (value / self.multiplier - self.offset).round();
        // u32::MAX as f32 rounds up to 2^32, so compare in f64
        if !raw.is_finite() || raw < 0.0 || f64::from(raw) > f64::from(u32::MAX) {
            return None;
        }
        Some(raw as u32)
    }

    fn to_value(&self, raw: u32) -> f32 {
        (raw as f32 + self.offset) * self.multiplier
    }

    fn send_value(&mut self, value: f32, already_in_retry_sequence: bool, sink: &mut dyn DatapointSink) {
        if !self.bound {
            error!("{}", DatapointError::Unbound { number: self.matcher.number });
            return;
        }
        let Some(datapoint_type) = self.matcher.single_type() else {
            warn!("Cannot set value, datapoint type not yet known for {}", self.matcher);
            return;
        };

        let (raw, encoded) = match self.encode(value, datapoint_type) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };

        self.last_set = Some(value);
        self.last_set_raw = Some(raw);
        sink.send(DatapointRecord::new(self.matcher.number, encoded), already_in_retry_sequence);

        let value_changed = self.last_received_raw != Some(raw);
        self.retry
            .schedule_if_needed(sink, already_in_retry_sequence, value_changed);
    }

    fn encode(
        &self,
        value: f32,
        datapoint_type: DatapointType,
    ) -> Result<(u32, DatapointValue), DatapointError> {
        let encode_error = || DatapointError::Encode {
            number: self.matcher.number,
            value: value.to_string(),
            datapoint_type,
        };

        let raw = self.to_raw(value).ok_or_else(encode_error)?;
        let encoded = match datapoint_type {
            DatapointType::Integer => DatapointValue::UInt(raw),
            DatapointType::Enum => DatapointValue::Enum(u8::try_from(raw).map_err(|_| encode_error())?),
            _ => return Err(encode_error()),
        };
        Ok((raw, encoded))
    }

    fn decode(&mut self, record: &DatapointRecord) -> Result<u32, DatapointError> {
        let observed = record.datapoint_type();
        self.matcher.check(observed)?;

        let raw = match &record.value {
            DatapointValue::UInt(v) => *v,
            DatapointValue::Enum(v) => u32::from(*v),
            _ => {
                return Err(DatapointError::UnsupportedType {
                    number: record.number,
                    observed,
                })
            }
        };
        self.matcher.resolve(observed);
        Ok(raw)
    }
}

impl fmt::Display for DpNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, offset={}, multiplier={:.2}",
            self.matcher, self.offset, self.multiplier
        )
    }
}
