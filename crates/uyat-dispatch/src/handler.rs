//! The datapoint handler: routing, timers and the cooperative run loop

use crate::entity::Registrar;
use crate::{
    ControlCall, DispatchError, Entity, EntityContext, ListenerId, RetryTimers, Transport,
    DEFAULT_POLL_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};
use uyat_core::{DatapointRecord, EntityId};
use uyat_state_bus::StateBus;

/// Handler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Tick of the cooperative loop that polls entity inputs
    pub poll_interval: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Routes datapoint records between the transport and the hosted entities
///
/// The DatapointHandler is responsible for:
/// - Owning the hosted entities and their listener registrations
/// - Dispatching inbound records to listeners in registration order
/// - Forwarding outbound records to the transport
/// - Firing retry timers back into the entity that armed them
/// - Routing control calls from the host framework
pub struct DatapointHandler {
    /// Hosted entities, indexed by ListenerId
    entities: Vec<Box<dyn Entity>>,
    /// Entity lookup for control calls
    index: HashMap<EntityId, ListenerId>,
    /// Listeners per datapoint number, in registration order
    listeners: BTreeMap<u8, Vec<ListenerId>>,
    /// Retry timers keyed by datapoint number
    timers: RetryTimers,
    /// Outbound transport
    transport: Box<dyn Transport>,
    /// Publish sink towards the host framework
    bus: Arc<StateBus>,
    config: HandlerConfig,
}

impl DatapointHandler {
    /// Create a handler with default settings
    pub fn new(transport: impl Transport + 'static, bus: Arc<StateBus>) -> Self {
        Self::with_config(transport, bus, HandlerConfig::default())
    }

    /// Create a handler with explicit settings
    pub fn with_config(
        transport: impl Transport + 'static,
        bus: Arc<StateBus>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            entities: Vec::new(),
            index: HashMap::new(),
            listeners: BTreeMap::new(),
            timers: RetryTimers::new(),
            transport: Box::new(transport),
            bus,
            config,
        }
    }

    /// Host an entity: run its setup so its adapters bind to their datapoints
    #[instrument(skip(self, entity), fields(entity_id = %entity.entity_id()))]
    pub fn add_entity(&mut self, mut entity: Box<dyn Entity>) -> Result<ListenerId, DispatchError> {
        let entity_id = entity.entity_id().clone();
        if self.index.contains_key(&entity_id) {
            return Err(DispatchError::DuplicateEntity(entity_id));
        }

        let listener = ListenerId(self.entities.len());
        let mut registrar = Registrar {
            listener,
            listeners: &mut self.listeners,
        };
        entity.setup(&mut registrar);
        entity.dump_config();

        debug!(listener = listener.0, "Entity added");
        self.index.insert(entity_id, listener);
        self.entities.push(entity);
        Ok(listener)
    }

    /// Route one inbound record to every listener registered for its number
    #[instrument(skip(self, record), fields(dp = record.number))]
    pub fn dispatch(&mut self, record: &DatapointRecord) {
        let Some(listeners) = self.listeners.get(&record.number) else {
            debug!("No listener for {}, dropping", record);
            return;
        };
        trace!(listeners = listeners.len(), "Dispatching {}", record);

        let now = Instant::now();
        for listener in listeners {
            let Some(entity) = self.entities.get_mut(listener.0) else {
                continue;
            };
            let mut ctx = EntityContext {
                listener: *listener,
                transport: self.transport.as_mut(),
                timers: &mut self.timers,
                bus: &self.bus,
                now,
            };
            entity.on_datapoint(record, &mut ctx);
        }
    }

    /// Route a control call to its entity
    #[instrument(skip(self, call), fields(entity_id = %call.entity_id))]
    pub fn control(&mut self, call: ControlCall) -> Result<(), DispatchError> {
        let listener = *self
            .index
            .get(&call.entity_id)
            .ok_or_else(|| DispatchError::UnknownEntity(call.entity_id.clone()))?;
        let entity = self
            .entities
            .get_mut(listener.0)
            .ok_or_else(|| DispatchError::UnknownEntity(call.entity_id.clone()))?;

        debug!(data = %call.data, "Control call");
        let mut ctx = EntityContext {
            listener,
            transport: self.transport.as_mut(),
            timers: &mut self.timers,
            bus: &self.bus,
            now: Instant::now(),
        };
        entity.control(&call, &mut ctx)
    }

    /// Fire every retry timer due at `now`
    ///
    /// A timer canceled or replaced by an earlier callback in the same pass
    /// does not fire.
    pub fn poll_timers(&mut self, now: Instant) {
        for due in self.timers.take_due(now) {
            if !self.timers.is_current(due.number, due.generation) {
                trace!(dp = due.number, "Dropping stale retry timer");
                continue;
            }
            let Some(entity) = self.entities.get_mut(due.owner.0) else {
                self.timers.cancel(due.number);
                continue;
            };
            let mut ctx = EntityContext {
                listener: due.owner,
                transport: self.transport.as_mut(),
                timers: &mut self.timers,
                bus: &self.bus,
                now,
            };
            entity.on_retry_timeout(due.number, &mut ctx);
        }
    }

    /// Run every entity's loop hook once
    pub fn poll_entities(&mut self) {
        let now = Instant::now();
        for (i, entity) in self.entities.iter_mut().enumerate() {
            let mut ctx = EntityContext {
                listener: ListenerId(i),
                transport: self.transport.as_mut(),
                timers: &mut self.timers,
                bus: &self.bus,
                now,
            };
            entity.poll(&mut ctx);
        }
    }

    /// Run the cooperative loop until the inbound stream closes
    ///
    /// Inbound records, control calls, retry deadlines and the poll tick are
    /// all handled on this one task. Returns the handler so callers can
    /// inspect it after shutdown.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<DatapointRecord>,
        mut controls: mpsc::Receiver<ControlCall>,
    ) -> Self {
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut controls_open = true;

        info!(entities = self.entities.len(), "Datapoint handler running");

        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                record = inbound.recv() => match record {
                    Some(record) => self.dispatch(&record),
                    None => {
                        info!("Inbound datapoint stream closed, stopping handler");
                        break;
                    }
                },
                call = controls.recv(), if controls_open => match call {
                    Some(call) => {
                        if let Err(e) = self.control(call) {
                            warn!("Control call failed: {}", e);
                        }
                    }
                    None => controls_open = false,
                },
                _ = sleep_until(deadline) => self.poll_timers(Instant::now()),
                _ = poll.tick() => self.poll_entities(),
            }
        }

        self
    }

    /// Listeners registered for `number`, in delivery order
    pub fn listeners_for(&self, number: u8) -> &[ListenerId] {
        self.listeners
            .get(&number)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    /// Whether a retry timer is armed for `number`
    pub fn retry_pending(&self, number: u8) -> bool {
        self.timers.is_armed(number)
    }

    /// Earliest pending retry deadline
    pub fn next_retry_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Ids of hosted entities, in registration order
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.entity_id().clone()).collect()
    }

    /// The publish sink
    pub fn bus(&self) -> &Arc<StateBus> {
        &self.bus
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
