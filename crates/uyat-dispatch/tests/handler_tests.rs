//! Integration tests for the datapoint handler

use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uyat_core::{DatapointRecord, DatapointValue, EntityId, EntityKind};
use uyat_dispatch::{
    ChannelTransport, ControlCall, DatapointHandler, DatapointSink, DispatchError, Entity,
    EntityContext, ListenerRegistry,
};
use uyat_state_bus::StateBus;

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Deserialize)]
struct RecorderCall {
    value: Option<u32>,
}

/// Entity that records everything the handler does to it
struct Recorder {
    id: EntityId,
    numbers: Vec<u8>,
    timeout: Duration,
    pending: Option<u32>,
    log: Log,
}

impl Recorder {
    fn boxed(name: &str, numbers: &[u8], log: &Log) -> Box<dyn Entity> {
        Box::new(Self {
            id: EntityId::new(EntityKind::Number, name).unwrap(),
            numbers: numbers.to_vec(),
            timeout: Duration::from_millis(100),
            pending: None,
            log: log.clone(),
        })
    }

    fn note(&self, what: String) {
        self.log.lock().unwrap().push(what);
    }
}

impl Entity for Recorder {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        for number in &self.numbers {
            registry.register_listener(*number);
        }
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        self.note(format!("{}:dp{}", self.id.object_id(), record.number));
        if let (Some(pending), Some(got)) = (self.pending, record.value.as_u32()) {
            if pending == got {
                self.pending = None;
                ctx.cancel_retry_timeout(record.number);
            }
        }
    }

    fn on_retry_timeout(&mut self, number: u8, ctx: &mut EntityContext<'_>) {
        self.note(format!("{}:timeout{}", self.id.object_id(), number));
        if let Some(pending) = self.pending {
            ctx.send(DatapointRecord::new(number, DatapointValue::UInt(pending)), true);
        }
    }

    fn control(
        &mut self,
        call: &ControlCall,
        ctx: &mut EntityContext<'_>,
    ) -> Result<(), DispatchError> {
        let call: RecorderCall = call.parse()?;
        if let Some(value) = call.value {
            let number = self.numbers[0];
            self.pending = Some(value);
            ctx.send(DatapointRecord::new(number, DatapointValue::UInt(value)), false);
            ctx.schedule_retry_timeout(number, self.timeout);
        }
        Ok(())
    }
}

fn setup() -> (
    DatapointHandler,
    mpsc::UnboundedReceiver<DatapointRecord>,
    Log,
) {
    let (transport, outbound) = ChannelTransport::new();
    let handler = DatapointHandler::new(transport, Arc::new(StateBus::new()));
    (handler, outbound, Log::default())
}

fn number_id(name: &str) -> EntityId {
    EntityId::new(EntityKind::Number, name).unwrap()
}

#[test]
fn test_dispatch_in_registration_order() {
    let (mut handler, _outbound, log) = setup();
    handler.add_entity(Recorder::boxed("first", &[5], &log)).unwrap();
    handler.add_entity(Recorder::boxed("second", &[5, 6], &log)).unwrap();

    handler.dispatch(&DatapointRecord::new(5, DatapointValue::UInt(1)));
    handler.dispatch(&DatapointRecord::new(6, DatapointValue::UInt(1)));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["first:dp5", "second:dp5", "second:dp6"]
    );
    assert_eq!(handler.listeners_for(5).len(), 2);
    assert_eq!(handler.listeners_for(6).len(), 1);
}

#[test]
fn test_unlistened_record_is_dropped() {
    let (mut handler, _outbound, log) = setup();
    handler.add_entity(Recorder::boxed("only", &[1], &log)).unwrap();

    handler.dispatch(&DatapointRecord::new(42, DatapointValue::Bool(true)));

    assert!(log.lock().unwrap().is_empty());
    assert!(handler.listeners_for(42).is_empty());
}

#[test]
fn test_duplicate_entity_rejected() {
    let (mut handler, _outbound, log) = setup();
    handler.add_entity(Recorder::boxed("dup", &[1], &log)).unwrap();

    let result = handler.add_entity(Recorder::boxed("dup", &[2], &log));

    assert_eq!(result, Err(DispatchError::DuplicateEntity(number_id("dup"))));
    assert!(handler.listeners_for(2).is_empty());
    assert_eq!(handler.entity_ids(), vec![number_id("dup")]);
}

#[test]
fn test_control_unknown_entity() {
    let (mut handler, _outbound, _log) = setup();

    let result = handler.control(ControlCall::new(number_id("ghost"), json!({"value": 1})));

    assert_eq!(result, Err(DispatchError::UnknownEntity(number_id("ghost"))));
}

#[test]
fn test_control_invalid_data() {
    let (mut handler, mut outbound, log) = setup();
    handler.add_entity(Recorder::boxed("dimmer", &[3], &log)).unwrap();

    let result = handler.control(ControlCall::new(number_id("dimmer"), json!({"value": "x"})));

    assert!(matches!(result, Err(DispatchError::InvalidControl { .. })));
    assert!(outbound.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_retry_timer_fires_until_acknowledged() {
    let (mut handler, mut outbound, log) = setup();
    handler.add_entity(Recorder::boxed("dimmer", &[3], &log)).unwrap();

    handler
        .control(ControlCall::new(number_id("dimmer"), json!({"value": 7})))
        .unwrap();
    assert_eq!(
        outbound.try_recv().unwrap(),
        DatapointRecord::new(3, DatapointValue::UInt(7))
    );
    assert!(handler.retry_pending(3));

    tokio::time::advance(Duration::from_millis(99)).await;
    handler.poll_timers(Instant::now());
    assert!(outbound.try_recv().is_err());

    tokio::time::advance(Duration::from_millis(1)).await;
    handler.poll_timers(Instant::now());
    assert_eq!(
        outbound.try_recv().unwrap(),
        DatapointRecord::new(3, DatapointValue::UInt(7))
    );

    // The device reports the written value: the timer goes away
    handler.dispatch(&DatapointRecord::new(3, DatapointValue::UInt(7)));
    assert!(!handler.retry_pending(3));
    assert_eq!(handler.next_retry_deadline(), None);

    tokio::time::advance(Duration::from_millis(500)).await;
    handler.poll_timers(Instant::now());
    assert!(outbound.try_recv().is_err());
    assert_eq!(
        *log.lock().unwrap(),
        vec!["dimmer:timeout3", "dimmer:dp3"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reschedule_replaces_timer() {
    let (mut handler, mut outbound, log) = setup();
    handler.add_entity(Recorder::boxed("dimmer", &[3], &log)).unwrap();
    let call = |v: u32| ControlCall::new(number_id("dimmer"), json!({ "value": v }));

    handler.control(call(1)).unwrap();
    tokio::time::advance(Duration::from_millis(60)).await;
    handler.control(call(2)).unwrap();
    while outbound.try_recv().is_ok() {}

    // The first timer's deadline has passed but it was replaced
    tokio::time::advance(Duration::from_millis(60)).await;
    handler.poll_timers(Instant::now());
    assert!(outbound.try_recv().is_err());

    tokio::time::advance(Duration::from_millis(40)).await;
    handler.poll_timers(Instant::now());
    assert_eq!(
        outbound.try_recv().unwrap(),
        DatapointRecord::new(3, DatapointValue::UInt(2))
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_until_inbound_closes() {
    let (transport, mut outbound) = ChannelTransport::new();
    let mut handler = DatapointHandler::new(transport, Arc::new(StateBus::new()));
    let log = Log::default();
    handler.add_entity(Recorder::boxed("dimmer", &[9], &log)).unwrap();

    let (inbound_tx, inbound_rx) = mpsc::channel(16);
    let (control_tx, control_rx) = mpsc::channel(16);
    let task = tokio::spawn(handler.run(inbound_rx, control_rx));

    control_tx
        .send(ControlCall::new(number_id("dimmer"), json!({"value": 4})))
        .await
        .unwrap();
    assert_eq!(
        outbound.recv().await.unwrap(),
        DatapointRecord::new(9, DatapointValue::UInt(4))
    );

    // No acknowledgement yet: the run loop fires the retry timer itself
    assert_eq!(
        outbound.recv().await.unwrap(),
        DatapointRecord::new(9, DatapointValue::UInt(4))
    );

    inbound_tx
        .send(DatapointRecord::new(9, DatapointValue::UInt(4)))
        .await
        .unwrap();
    drop(inbound_tx);

    let handler = task.await.unwrap();
    assert!(!handler.retry_pending(9));
    assert!(log.lock().unwrap().contains(&"dimmer:dp9".to_string()));
}
