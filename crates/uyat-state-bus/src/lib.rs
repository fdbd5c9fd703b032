//! Typed publish/subscribe of entity states
//!
//! This crate provides the StateBus, the sink through which hosted entities
//! publish their state to the host framework. Subscribers can follow one
//! entity kind, all kinds, or a typed stream that deserializes the state for
//! them. The last published state of every entity is also kept for queries.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};
use uyat_core::{EntityId, EntityKind};

/// Default channel capacity for state subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Trait for typed entity states
///
/// Implement this for every state struct an entity publishes.
pub trait EntityState: Clone + Send + Sync + 'static {
    /// The entity kind that publishes this state
    fn kind() -> EntityKind;
}

/// One published entity state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// The entity that published
    pub entity_id: EntityId,
    /// Serialized state
    pub state: serde_json::Value,
    /// When the state was published
    pub published_at: DateTime<Utc>,
    /// Bus-wide publish counter, strictly increasing
    pub sequence: u64,
}

impl StateUpdate {
    /// Deserialize the carried state
    pub fn parse<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.state.clone()).ok()
    }
}

/// The bus entities publish their state to
pub struct StateBus {
    /// Map of entity kinds to their broadcast senders
    senders: DashMap<EntityKind, broadcast::Sender<StateUpdate>>,
    /// Sender for subscribers to every kind
    match_all_sender: broadcast::Sender<StateUpdate>,
    /// Last state published by each entity
    last: DashMap<EntityId, StateUpdate>,
    /// Counter for sequence numbers
    next_sequence: AtomicU64,
    /// Channel capacity
    capacity: usize,
}

impl StateBus {
    /// Create a new state bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new state bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            senders: DashMap::new(),
            match_all_sender,
            last: DashMap::new(),
            next_sequence: AtomicU64::new(1),
            capacity,
        }
    }

    /// Subscribe to states published by entities of one kind
    pub fn subscribe(&self, kind: EntityKind) -> broadcast::Receiver<StateUpdate> {
        trace!(kind = %kind, "Subscribing to entity kind");
        self.senders
            .entry(kind)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to a typed state stream
    pub fn subscribe_typed<T: EntityState + DeserializeOwned>(&self) -> TypedStateReceiver<T> {
        TypedStateReceiver::new(self.subscribe(T::kind()))
    }

    /// Subscribe to every published state
    pub fn subscribe_all(&self) -> broadcast::Receiver<StateUpdate> {
        self.match_all_sender.subscribe()
    }

    /// Publish an entity's full state
    ///
    /// Publishing is unconditional: the same state published twice reaches
    /// subscribers twice.
    pub fn publish<T: EntityState + Serialize>(&self, entity_id: &EntityId, state: &T) {
        if T::kind() != entity_id.kind() {
            warn!(
                entity_id = %entity_id,
                "Publishing {} state for a {} entity",
                T::kind(),
                entity_id.kind()
            );
        }

        match serde_json::to_value(state) {
            Ok(value) => self.publish_value(entity_id, value),
            Err(e) => warn!(entity_id = %entity_id, "Failed to serialize state: {}", e),
        }
    }

    /// Publish an already serialized state
    pub fn publish_value(&self, entity_id: &EntityId, state: serde_json::Value) {
        let update = StateUpdate {
            entity_id: entity_id.clone(),
            state,
            published_at: Utc::now(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
        };
        debug!(entity_id = %entity_id, state = %update.state, "Publishing state");

        self.last.insert(entity_id.clone(), update.clone());

        if let Some(sender) = self.senders.get(&entity_id.kind()) {
            // Ignore send errors - they just mean no active receivers
            let _ = sender.send(update.clone());
        }
        let _ = self.match_all_sender.send(update);
    }

    /// Last state published by an entity
    pub fn last(&self, entity_id: &EntityId) -> Option<StateUpdate> {
        self.last.get(entity_id).map(|u| u.clone())
    }

    /// Last state published by an entity, deserialized
    pub fn last_typed<T: DeserializeOwned>(&self, entity_id: &EntityId) -> Option<T> {
        self.last(entity_id).and_then(|u| u.parse())
    }

    /// Number of entities that have published at least once
    pub fn entity_count(&self) -> usize {
        self.last.len()
    }
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed states
pub struct TypedStateReceiver<T> {
    rx: broadcast::Receiver<StateUpdate>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EntityState + DeserializeOwned> TypedStateReceiver<T> {
    fn new(rx: broadcast::Receiver<StateUpdate>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next state that deserializes as `T`
    pub async fn recv(&mut self) -> Result<(EntityId, T), broadcast::error::RecvError> {
        loop {
            let update = self.rx.recv().await?;
            if let Some(state) = update.parse::<T>() {
                return Ok((update.entity_id, state));
            }
        }
    }

    /// Receive without waiting
    pub fn try_recv(&mut self) -> Result<(EntityId, T), broadcast::error::TryRecvError> {
        loop {
            let update = self.rx.try_recv()?;
            if let Some(state) = update.parse::<T>() {
                return Ok((update.entity_id, state));
            }
        }
    }
}

/// Thread-safe wrapper for StateBus
pub type SharedStateBus = Arc<StateBus>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OnOff {
        state: bool,
    }

    impl EntityState for OnOff {
        fn kind() -> EntityKind {
            EntityKind::Switch
        }
    }

    fn switch_id(name: &str) -> EntityId {
        EntityId::new(EntityKind::Switch, name).unwrap()
    }

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = StateBus::new();
        let mut rx = bus.subscribe(EntityKind::Switch);

        bus.publish(&switch_id("relay"), &OnOff { state: true });

        let update = rx.recv().await.unwrap();
        assert_eq!(update.entity_id.to_string(), "switch.relay");
        assert_eq!(update.state["state"], true);
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = StateBus::new();
        let mut rx = bus.subscribe_typed::<OnOff>();

        bus.publish(&switch_id("relay"), &OnOff { state: false });

        let (id, state) = rx.recv().await.unwrap();
        assert_eq!(id, switch_id("relay"));
        assert_eq!(state, OnOff { state: false });
    }

    #[tokio::test]
    async fn test_match_all_subscription() {
        let bus = StateBus::new();
        let mut rx = bus.subscribe_all();

        bus.publish(&switch_id("a"), &OnOff { state: true });
        bus.publish_value(
            &EntityId::new(EntityKind::Sensor, "b").unwrap(),
            serde_json::json!({"value": 1.5}),
        );

        assert_eq!(rx.recv().await.unwrap().entity_id.to_string(), "switch.a");
        assert_eq!(rx.recv().await.unwrap().entity_id.to_string(), "sensor.b");
    }

    #[test]
    fn test_no_cross_kind_pollution() {
        let bus = StateBus::new();
        let mut rx_sensor = bus.subscribe(EntityKind::Sensor);

        bus.publish(&switch_id("relay"), &OnOff { state: true });

        assert!(rx_sensor.try_recv().is_err());
    }

    #[test]
    fn test_last_state_and_repeated_publish() {
        let bus = StateBus::new();
        let id = switch_id("relay");
        assert!(bus.last(&id).is_none());

        bus.publish(&id, &OnOff { state: true });
        let first = bus.last(&id).unwrap();
        bus.publish(&id, &OnOff { state: true });
        let second = bus.last(&id).unwrap();

        assert_eq!(first.state, second.state);
        assert!(second.sequence > first.sequence);
        assert_eq!(bus.last_typed::<OnOff>(&id), Some(OnOff { state: true }));
        assert_eq!(bus.entity_count(), 1);
    }
}
