//! Outbound interface to the serial transport

use tokio::sync::mpsc;
use tracing::warn;
use uyat_core::DatapointRecord;

/// Sink for outbound datapoint records
///
/// Sending is fire-and-forget: delivery is only ever inferred from the next
/// inbound record carrying the sent value.
pub trait Transport: Send {
    fn send(&mut self, record: &DatapointRecord);
}

/// Transport that forwards records into a channel drained by the framing layer
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<DatapointRecord>,
}

impl ChannelTransport {
    /// Create a transport and the receiver the framing layer reads from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DatapointRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wrap an existing sender
    pub fn from_sender(tx: mpsc::UnboundedSender<DatapointRecord>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, record: &DatapointRecord) {
        if self.tx.send(record.clone()).is_err() {
            warn!("Transport closed, dropping outbound {}", record);
        }
    }
}
