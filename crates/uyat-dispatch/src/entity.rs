//! The entity side of the handler: listener binding, sinks, control calls

use crate::{DispatchError, RetryTimers, Transport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};
use uyat_core::{DatapointRecord, EntityId};
use uyat_state_bus::{EntityState, StateBus};

/// Identifies a hosted entity inside the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) usize);

impl ListenerId {
    /// Position of the entity in registration order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Binding surface: adapters register the datapoint numbers they listen to
pub trait ListenerRegistry {
    fn register_listener(&mut self, number: u8);
}

/// Handler surface an adapter writes through
pub trait DatapointSink {
    /// Forward a record to the transport
    ///
    /// `already_in_retry_sequence` marks resends issued from a retry timer.
    fn send(&mut self, record: DatapointRecord, already_in_retry_sequence: bool);

    /// Arm the retry timer for `number`, replacing any existing one
    fn schedule_retry_timeout(&mut self, number: u8, timeout: Duration);

    /// Cancel the retry timer for `number`
    fn cancel_retry_timeout(&mut self, number: u8);
}

/// A control request from the host framework
///
/// `data` is a sparse object: entities deserialize it into their call type,
/// where every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCall {
    /// Target entity
    pub entity_id: EntityId,
    /// Requested field changes
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ControlCall {
    /// Create a control call from raw data
    pub fn new(entity_id: EntityId, data: serde_json::Value) -> Self {
        Self { entity_id, data }
    }

    /// Create a control call from a typed request
    pub fn typed<T: Serialize>(entity_id: EntityId, request: &T) -> Result<Self, DispatchError> {
        let data = serde_json::to_value(request).map_err(|e| DispatchError::InvalidControl {
            entity_id: entity_id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { entity_id, data })
    }

    /// Deserialize the data into the entity's call type
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        serde_json::from_value(self.data.clone()).map_err(|e| DispatchError::InvalidControl {
            entity_id: self.entity_id.clone(),
            reason: e.to_string(),
        })
    }
}

/// An entity hosted by the handler
///
/// The handler owns every entity; adapters inside an entity are plain values
/// and report accepted values back to it by return value.
pub trait Entity: Send {
    /// The entity's id
    fn entity_id(&self) -> &EntityId;

    /// Bind adapters: register every datapoint number the entity listens to
    fn setup(&mut self, registry: &mut dyn ListenerRegistry);

    /// A record arrived for one of the registered numbers
    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>);

    /// The retry timer armed by this entity for `number` fired
    fn on_retry_timeout(&mut self, number: u8, ctx: &mut EntityContext<'_>);

    /// A control request targeting this entity
    fn control(&mut self, call: &ControlCall, ctx: &mut EntityContext<'_>)
        -> Result<(), DispatchError>;

    /// Cooperative loop hook for polled inputs
    fn poll(&mut self, _ctx: &mut EntityContext<'_>) {}

    /// Log the entity's configuration
    fn dump_config(&self) {}
}

/// Binds an entity's adapters to datapoint numbers
pub(crate) struct Registrar<'a> {
    pub(crate) listener: ListenerId,
    pub(crate) listeners: &'a mut BTreeMap<u8, Vec<ListenerId>>,
}

impl ListenerRegistry for Registrar<'_> {
    fn register_listener(&mut self, number: u8) {
        let entry = self.listeners.entry(number).or_default();
        // An entity is called once per record even if several of its
        // adapters share the number
        if entry.last() != Some(&self.listener) {
            entry.push(self.listener);
        }
        trace!(dp = number, listener = self.listener.0, "Registered datapoint listener");
    }
}

/// What an entity sees of the handler while it is being called
pub struct EntityContext<'a> {
    pub(crate) listener: ListenerId,
    pub(crate) transport: &'a mut dyn Transport,
    pub(crate) timers: &'a mut RetryTimers,
    pub(crate) bus: &'a StateBus,
    pub(crate) now: Instant,
}

impl EntityContext<'_> {
    /// Publish the entity's full state to the host framework
    pub fn publish<T: EntityState + Serialize>(&self, entity_id: &EntityId, state: &T) {
        self.bus.publish(entity_id, state);
    }

    /// Time the current call started
    pub fn now(&self) -> Instant {
        self.now
    }

    /// The entity being called
    pub fn listener(&self) -> ListenerId {
        self.listener
    }
}

impl DatapointSink for EntityContext<'_> {
    fn send(&mut self, record: DatapointRecord, already_in_retry_sequence: bool) {
        debug!(
            resend = already_in_retry_sequence,
            "Sending {}", record
        );
        self.transport.send(&record);
    }

    fn schedule_retry_timeout(&mut self, number: u8, timeout: Duration) {
        self.timers.schedule(number, self.listener, timeout, self.now);
    }

    fn cancel_retry_timeout(&mut self, number: u8) {
        self.timers.cancel(number);
    }
}
