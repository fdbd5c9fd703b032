//! Level in `0.0..=1.0` carried over a bounded uint or enum range

use crate::number::DpNumber;
use std::fmt;
use tracing::warn;
use uyat_core::{DatapointRecord, MatchingDatapoint, RetryConfig};
use uyat_dispatch::{DatapointSink, ListenerRegistry};

/// Adapter mapping a level onto the wire codes `min_value..=max_value`
///
/// Level `0.0` is `min_value` and `1.0` is `max_value`; with `inverted`
/// the range is walked from the top instead. Codes reported outside the
/// range are clamped into it.
#[derive(Debug, Clone)]
pub struct DpDimmer {
    number: DpNumber,
    min_value: u32,
    max_value: u32,
    inverted: bool,
}

impl DpDimmer {
    /// `min_value` must be below `max_value`
    pub fn new(
        matcher: MatchingDatapoint,
        min_value: u32,
        max_value: u32,
        inverted: bool,
        retry: RetryConfig,
    ) -> Self {
        Self {
            number: DpNumber::plain(matcher, retry),
            min_value,
            max_value,
            inverted,
        }
    }

    pub fn init(&mut self, registry: &mut dyn ListenerRegistry) {
        self.number.init(registry);
    }

    pub fn number(&self) -> u8 {
        self.number.number()
    }

    /// Process an inbound record, returning the level
    pub fn handle(&mut self, record: &DatapointRecord, sink: &mut dyn DatapointSink) -> Option<f32> {
        self.number.handle(record, sink)?;
        self.number.last_received_raw().map(|code| self.level_for(code))
    }

    /// Write a level; values outside `0.0..=1.0` are clamped
    pub fn set_level(&mut self, level: f32, sink: &mut dyn DatapointSink) {
        if level.is_nan() {
            warn!(dp = self.number(), "Ignoring NaN level");
            return;
        }
        let code = self.code_for(level);
        self.number.set_raw(code, sink);
    }

    pub fn on_retry_timeout(&mut self, number: u8, sink: &mut dyn DatapointSink) -> bool {
        self.number.on_retry_timeout(number, sink)
    }

    /// Level from the last accepted record
    pub fn last_received_level(&self) -> Option<f32> {
        self.number.last_received_raw().map(|code| self.level_for(code))
    }

    pub fn matcher(&self) -> &MatchingDatapoint {
        self.number.matcher()
    }

    pub fn level_for(&self, code: u32) -> f32 {
        let span = self.max_value.saturating_sub(self.min_value);
        if span == 0 {
            return 1.0;
        }
        let steps = code.clamp(self.min_value, self.max_value) - self.min_value;
        let steps = if self.inverted { span - steps } else { steps };
        (f64::from(steps) / f64::from(span)) as f32
    }

    pub fn code_for(&self, level: f32) -> u32 {
        let span = self.max_value.saturating_sub(self.min_value);
        let level = f64::from(level.clamp(0.0, 1.0));
        let steps = (level * f64::from(span)).round() as u32;
        let steps = if self.inverted { span - steps } else { steps };
        self.min_value + steps
    }
}

impl fmt::Display for DpDimmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            f.write_str("Inverted ")?;
        }
        write!(
            f,
            "{} range {}..={}",
            self.number.matcher(),
            self.min_value,
            self.max_value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use uyat_core::{DatapointType, DatapointValue};

    fn dimmer(min: u32, max: u32, inverted: bool) -> (DpDimmer, RecordingSink) {
        let mut sink = RecordingSink::default();
        let mut dimmer = DpDimmer::new(
            MatchingDatapoint::single(3, DatapointType::Integer),
            min,
            max,
            inverted,
            RetryConfig::disabled(),
        );
        dimmer.init(&mut sink);
        (dimmer, sink)
    }

    #[test]
    fn test_level_maps_onto_range() {
        let (mut dimmer, mut sink) = dimmer(10, 1000, false);
        assert_eq!(dimmer.code_for(0.0), 10);
        assert_eq!(dimmer.code_for(1.0), 1000);
        assert_eq!(dimmer.code_for(0.5), 505);

        dimmer.set_level(0.5, &mut sink);
        assert_eq!(sink.records(), vec![DatapointRecord::new(3, DatapointValue::UInt(505))]);

        let level = dimmer.handle(&DatapointRecord::new(3, DatapointValue::UInt(1000)), &mut sink);
        assert_eq!(level, Some(1.0));
    }

    #[test]
    fn test_inverted_range() {
        let (mut dimmer, mut sink) = dimmer(0, 255, true);
        assert_eq!(dimmer.code_for(1.0), 0);
        assert_eq!(dimmer.code_for(0.0), 255);
        assert_eq!(
            dimmer.handle(&DatapointRecord::new(3, DatapointValue::UInt(0)), &mut sink),
            Some(1.0)
        );
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let (mut dimmer, mut sink) = dimmer(10, 110, false);
        assert_eq!(
            dimmer.handle(&DatapointRecord::new(3, DatapointValue::UInt(2)), &mut sink),
            Some(0.0)
        );
        assert_eq!(dimmer.code_for(1.5), 110);
        assert_eq!(dimmer.code_for(-0.5), 10);

        dimmer.set_level(f32::NAN, &mut sink);
        assert!(sink.sent.is_empty());
    }
}
