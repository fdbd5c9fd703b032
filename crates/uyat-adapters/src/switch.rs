//! On/off value carried by a bool, uint or enum datapoint

use crate::retry::{DatapointRetry, RetryStep};
use std::fmt;
use tracing::{debug, error, trace, warn};
use uyat_core::{
    DatapointError, DatapointRecord, DatapointType, DatapointValue, MatchingDatapoint, RetryConfig,
};
use uyat_dispatch::{DatapointSink, ListenerRegistry};

/// Adapter for a logical on/off value
///
/// Accepts bool, uint and enum wire values (non-zero is on) and writes back
/// in whatever type the datapoint resolved to. With `inverted`, the logical
/// value is the negation of the wire value in both directions.
#[derive(Debug, Clone)]
pub struct DpSwitch {
    matcher: MatchingDatapoint,
    inverted: bool,
    retry: DatapointRetry,
    bound: bool,
    last_received: Option<bool>,
    last_set: Option<bool>,
}

impl DpSwitch {
    pub fn new(matcher: MatchingDatapoint, inverted: bool, retry: RetryConfig) -> Self {
        Self {
            retry: DatapointRetry::new(matcher.number, retry),
            matcher,
            inverted,
            bound: false,
            last_received: None,
            last_set: None,
        }
    }

    /// Register the datapoint with the handler
    pub fn init(&mut self, registry: &mut dyn ListenerRegistry) {
        registry.register_listener(self.matcher.number);
        self.bound = true;
    }

    pub fn number(&self) -> u8 {
        self.matcher.number
    }

    /// Process an inbound record
    ///
    /// Returns the logical value when the record was accepted. Records for
    /// other datapoints are ignored.
    pub fn handle(&mut self, record: &DatapointRecord, sink: &mut dyn DatapointSink) -> Option<bool> {
        if record.number != self.matcher.number {
            return None;
        }
        trace!("{} processing as switch", record);

        let value = match self.decode(record) {
            Ok(value) => value,
            Err(e) => {
                warn!("{}", e);
                return None;
            }
        };
        self.last_received = Some(value);

        if self.last_set == Some(value) && self.retry.is_armed() {
            debug!(dp = self.matcher.number, "MCU confirmed value, canceling retry");
            self.retry.cancel(sink);
        }
        Some(value)
    }

    /// Write a new logical value
    pub fn set_value(&mut self, value: bool, sink: &mut dyn DatapointSink) {
        self.send_value(value, false, sink);
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

    pub fn last_received_value(&self) -> Option<bool> {
        self.last_received
    }

    pub fn last_set_value(&self) -> Option<bool> {
        self.last_set
    }

    pub fn matcher(&self) -> &MatchingDatapoint {
        &self.matcher
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn retry(&self) -> &DatapointRetry {
        &self.retry
    }

    fn send_value(&mut self, value: bool, already_in_retry_sequence: bool, sink: &mut dyn DatapointSink) {
        if !self.bound {
            error!("{}", DatapointError::Unbound { number: self.matcher.number });
            return;
        }
        let Some(datapoint_type) = self.matcher.single_type() else {
            warn!("Cannot set value, datapoint type not yet known for {}", self.matcher);
            return;
        };

        let wire = self.invert(value);
        let encoded = match datapoint_type {
            DatapointType::Boolean => DatapointValue::Bool(wire),
            DatapointType::Integer => DatapointValue::UInt(u32::from(wire)),
            DatapointType::Enum => DatapointValue::Enum(u8::from(wire)),
            other => {
                error!(
                    "{}",
                    DatapointError::Encode {
                        number: self.matcher.number,
                        value: value.to_string(),
                        datapoint_type: other,
                    }
                );
                return;
            }
        };

        self.last_set = Some(value);
        sink.send(DatapointRecord::new(self.matcher.number, encoded), already_in_retry_sequence);

        let value_changed = self.last_received != Some(value);
        self.retry
            .schedule_if_needed(sink, already_in_retry_sequence, value_changed);
    }

    fn decode(&mut self, record: &DatapointRecord) -> Result<bool, DatapointError> {
        let observed = record.datapoint_type();
        self.matcher.check(observed)?;

        let wire = match &record.value {
            DatapointValue::Bool(v) => *v,
            DatapointValue::UInt(v) => *v != 0,
            DatapointValue::Enum(v) => *v != 0,
            _ => {
                return Err(DatapointError::UnsupportedType {
                    number: record.number,
                    observed,
                })
            }
        };
        self.matcher.resolve(observed);
        Ok(self.invert(wire))
    }

    fn invert(&self, value: bool) -> bool {
        value != self.inverted
    }
}

impl fmt::Display for DpSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            f.write_str("Inverted ")?;
        }
        write!(f, "{}", self.matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use std::time::Duration;

    fn bound(mut switch: DpSwitch) -> (DpSwitch, RecordingSink) {
        let mut sink = RecordingSink::default();
        switch.init(&mut sink);
        (switch, sink)
    }

    fn retrying(matcher: MatchingDatapoint) -> DpSwitch {
        DpSwitch::new(matcher, false, RetryConfig::enabled(3, Duration::from_millis(300)))
    }

    #[test]
    fn test_resolves_on_first_value() {
        let (mut switch, mut sink) = bound(retrying(MatchingDatapoint::unresolved(1)));
        assert_eq!(sink.registered, vec![1]);

        let value = switch.handle(&DatapointRecord::new(1, DatapointValue::Enum(2)), &mut sink);
        assert_eq!(value, Some(true));
        assert_eq!(switch.matcher().single_type(), Some(DatapointType::Enum));

        let mismatch = switch.handle(&DatapointRecord::new(1, DatapointValue::Bool(false)), &mut sink);
        assert_eq!(mismatch, None);
        assert_eq!(switch.last_received_value(), Some(true));
    }

    #[test]
    fn test_unsupported_type_does_not_resolve() {
        let (mut switch, mut sink) = bound(retrying(MatchingDatapoint::unresolved(1)));

        let value = switch.handle(&DatapointRecord::new(1, DatapointValue::Raw(vec![1])), &mut sink);

        assert_eq!(value, None);
        assert!(!switch.matcher().allows_single_type());
    }

    #[test]
    fn test_ignores_other_datapoints() {
        let (mut switch, mut sink) = bound(retrying(MatchingDatapoint::unresolved(1)));

        assert_eq!(switch.handle(&DatapointRecord::new(2, DatapointValue::Bool(true)), &mut sink), None);
        assert_eq!(switch.last_received_value(), None);
    }

    #[test]
    fn test_inverted_both_ways() {
        let (mut switch, mut sink) = bound(DpSwitch::new(
            MatchingDatapoint::single(3, DatapointType::Integer),
            true,
            RetryConfig::disabled(),
        ));

        assert_eq!(switch.handle(&DatapointRecord::new(3, DatapointValue::UInt(0)), &mut sink), Some(true));

        switch.set_value(false, &mut sink);
        assert_eq!(sink.records(), vec![DatapointRecord::new(3, DatapointValue::UInt(1))]);
        assert_eq!(switch.last_set_value(), Some(false));
        assert_eq!(switch.to_string(), "Inverted Datapoint 3: INTEGER");
    }

    #[test]
    fn test_encodes_resolved_type() {
        let (mut switch, mut sink) = bound(DpSwitch::new(
            MatchingDatapoint::single(5, DatapointType::Enum),
            false,
            RetryConfig::disabled(),
        ));

        switch.set_value(true, &mut sink);

        assert_eq!(sink.records(), vec![DatapointRecord::new(5, DatapointValue::Enum(1))]);
    }

    #[test]
    fn test_unbound_write_is_noop() {
        let mut switch = retrying(MatchingDatapoint::single(1, DatapointType::Boolean));
        let mut sink = RecordingSink::default();

        switch.set_value(true, &mut sink);

        assert!(sink.sent.is_empty());
        assert_eq!(switch.last_set_value(), None);
    }

    #[test]
    fn test_unresolved_write_is_noop() {
        let (mut switch, mut sink) = bound(retrying(MatchingDatapoint::unresolved(1)));

        switch.set_value(true, &mut sink);

        assert!(sink.sent.is_empty());
        assert!(sink.scheduled.is_empty());
        assert_eq!(switch.last_set_value(), None);
    }

    #[test]
    fn test_ack_cancels_retry() {
        let (mut switch, mut sink) = bound(retrying(MatchingDatapoint::single(1, DatapointType::Boolean)));

        switch.set_value(true, &mut sink);
        assert_eq!(sink.scheduled.len(), 1);

        // A different value is new MCU truth but not an acknowledgement
        switch.handle(&DatapointRecord::new(1, DatapointValue::Bool(false)), &mut sink);
        assert!(sink.canceled.is_empty());
        assert!(switch.retry().is_armed());

        switch.handle(&DatapointRecord::new(1, DatapointValue::Bool(true)), &mut sink);
        assert_eq!(sink.canceled, vec![1]);
        assert!(!switch.retry().is_armed());
    }

    #[test]
    fn test_unchanged_write_not_retried() {
        let (mut switch, mut sink) = bound(retrying(MatchingDatapoint::single(1, DatapointType::Boolean)));
        switch.handle(&DatapointRecord::new(1, DatapointValue::Bool(true)), &mut sink);

        switch.set_value(true, &mut sink);
        switch.set_value(true, &mut sink);

        assert_eq!(sink.sent.len(), 2);
        assert!(sink.scheduled.is_empty());
    }

    #[test]
    fn test_resend_on_timeout_until_exhausted() {
        let (mut switch, mut sink) = bound(retrying(MatchingDatapoint::single(1, DatapointType::Boolean)));
        switch.set_value(true, &mut sink);

        for _ in 0..5 {
            assert!(switch.on_retry_timeout(1, &mut sink));
        }
        assert!(!switch.on_retry_timeout(2, &mut sink));

        let resends: Vec<bool> = sink.sent.iter().map(|(_, resend)| *resend).collect();
        assert_eq!(resends, vec![false, true, true, true]);
        // Resends never re-arm the timer
        assert_eq!(sink.scheduled.len(), 1);
        assert_eq!(sink.canceled, vec![1]);
    }
}
