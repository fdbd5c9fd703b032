//! Test doubles for the handler surfaces

use std::time::Duration;
use uyat_core::DatapointRecord;
use uyat_dispatch::{DatapointSink, ListenerRegistry};

/// Records everything an adapter asks of the handler
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub sent: Vec<(DatapointRecord, bool)>,
    pub scheduled: Vec<(u8, Duration)>,
    pub canceled: Vec<u8>,
    pub registered: Vec<u8>,
}

impl RecordingSink {
    /// Values sent, without the retry flag
    pub fn records(&self) -> Vec<DatapointRecord> {
        self.sent.iter().map(|(r, _)| r.clone()).collect()
    }
}

impl DatapointSink for RecordingSink {
    fn send(&mut self, record: DatapointRecord, already_in_retry_sequence: bool) {
        self.sent.push((record, already_in_retry_sequence));
    }

    fn schedule_retry_timeout(&mut self, number: u8, timeout: Duration) {
        self.scheduled.push((number, timeout));
    }

    fn cancel_retry_timeout(&mut self, number: u8) {
        self.canceled.push(number);
    }
}

impl ListenerRegistry for RecordingSink {
    fn register_listener(&mut self, number: u8) {
        self.registered.push(number);
    }
}
