//! Device files loaded from disk, built and hosted by a handler

use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use uyat_climate::{ClimateAction, ClimateMode, ClimateState};
use uyat_config::{load_config, ConfigError, SimulatedPinFactory};
use uyat_core::{DatapointRecord, DatapointValue, EntityId, EntityKind};
use uyat_dispatch::{ChannelTransport, ControlCall, DatapointHandler};
use uyat_entities::{FanState, LightState, NumberState, SensorState, SwitchState};
use uyat_state_bus::StateBus;

const DEVICE_YAML: &str = r#"
handler:
  poll_interval_ms: 20
climate:
  - id: living_room
    supports_heat: true
    supports_cool: true
    switch: { datapoint: 1, inverted: false, retries: { enabled: true, count: 3, timeout_ms: 300 } }
    active_state: { datapoint: 4, heating_value: 1, cooling_value: 2, drying_value: 3, fanonly_value: 4 }
    state_pins: { heating: 12, cooling: 13 }
    temperatures:
      target: { datapoint: 2, offset: 0, multiplier: 1.0 }
      current: { datapoint: 3, multiplier: 0.1 }
      hysteresis: 1.0
      reports_fahrenheit: false
    presets:
      boost: { datapoint: 5 }
      eco: { datapoint: 6, temperature: 18 }
      sleep: { datapoint: 7, temperature: 16 }
    swing: { vertical: 8, horizontal: 9 }
    fan_speed: { datapoint: 10, low_value: 0, medium_value: 1, high_value: 2, auto_value: 3 }
switch:   [ { id: relay, datapoint: 1, inverted: false } ]
number:   [ { id: level, datapoint: { number: 2, type: uint }, offset: 0, multiplier: 1.0 } ]
sensor:   [ { id: power, datapoint: 3, offset: 0, scale: 1 } ]
text_sensor: [ { id: info, datapoint: { number: 4, type: raw }, base64: false, hex: true } ]
vap_sensor:  [ { id: voltage, datapoint: 5, measure: voltage } ]
fan:      [ { id: ceiling, switch: 1, speed: { datapoint: 3, min_value: 1, max_value: 4 }, oscillation: 5, direction: 6 } ]
select:   [ { id: program, datapoint: { number: 7, type: enum }, options: { 0: eco, 1: comfort } } ]
"#;

fn write_device(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("device.yaml");
    fs::write(&path, content).unwrap();
    path
}

fn id(kind: EntityKind, object_id: &str) -> EntityId {
    EntityId::new(kind, object_id).unwrap()
}

#[test]
fn test_load_full_device() {
    let dir = TempDir::new().unwrap();
    let config = load_config(write_device(&dir, DEVICE_YAML)).unwrap();

    assert_eq!(config.entity_count(), 8);
    assert_eq!(config.handler.poll_interval_ms, 20);
    assert_eq!(config.climate[0].state_pins.heating, Some(12));
    assert_eq!(config.select[0].options.len(), 2);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = load_config(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_disallowed_type_in_file() {
    let dir = TempDir::new().unwrap();
    let path = write_device(
        &dir,
        "vap_sensor: [ { id: voltage, datapoint: { number: 5, type: uint } } ]",
    );

    let config = load_config(path).unwrap();
    let err = config.build(&SimulatedPinFactory::new()).err().unwrap();

    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "vap_sensor.voltage.datapoint"));
}

#[test]
fn test_built_entities_run_in_handler() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = TempDir::new().unwrap();
    let config = load_config(write_device(&dir, DEVICE_YAML)).unwrap();
    let pins = SimulatedPinFactory::new();
    let entities = config.build(&pins).unwrap();
    assert_eq!(pins.len(), 2);

    let (transport, mut outbound) = ChannelTransport::new();
    let bus = Arc::new(StateBus::new());
    let mut handler = DatapointHandler::with_config(transport, bus.clone(), config.handler_config());
    for entity in entities {
        handler.add_entity(entity).unwrap();
    }
    assert_eq!(handler.listeners_for(1).len(), 3);

    handler.dispatch(&DatapointRecord::new(1, DatapointValue::Bool(true)));
    handler.dispatch(&DatapointRecord::new(2, DatapointValue::UInt(22)));
    handler.dispatch(&DatapointRecord::new(3, DatapointValue::UInt(215)));

    let relay: SwitchState = bus.last_typed(&id(EntityKind::Switch, "relay")).unwrap();
    assert!(relay.state);
    let level: NumberState = bus.last_typed(&id(EntityKind::Number, "level")).unwrap();
    assert_eq!(level.value, 22.0);
    let power: SensorState = bus.last_typed(&id(EntityKind::Sensor, "power")).unwrap();
    assert!((power.value - 21.5).abs() < 1e-4);
    let fan: FanState = bus.last_typed(&id(EntityKind::Fan, "ceiling")).unwrap();
    assert!(fan.state);

    let living_room = id(EntityKind::Climate, "living_room");
    let climate: ClimateState = bus.last_typed(&living_room).unwrap();
    assert_eq!(climate.mode, ClimateMode::HeatCool);
    assert_eq!(climate.target_temperature, Some(22.0));
    assert_eq!(climate.action, ClimateAction::Idle);

    pins.pin(12).set(true);
    handler.poll_entities();
    let climate: ClimateState = bus.last_typed(&living_room).unwrap();
    assert_eq!(climate.mode, ClimateMode::Heat);
    assert_eq!(climate.action, ClimateAction::Heating);

    handler
        .control(ControlCall::new(
            id(EntityKind::Select, "program"),
            json!({"option": "comfort"}),
        ))
        .unwrap();
    assert_eq!(
        outbound.try_recv().unwrap(),
        DatapointRecord::new(7, DatapointValue::Enum(1))
    );
}

#[test]
fn test_light_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_device(
        &dir,
        r#"
light:
  - id: desk
    type: ct
    switch: 20
    dimmer: { datapoint: 22, min_value: 10, max_value: 1000 }
    white_temperature:
      datapoint: 23
      max_value: 1000
      cold_white_color_temperature: 153 mireds
      warm_white_color_temperature: 500 mireds
"#,
    );
    let config = load_config(path).unwrap();
    assert_eq!(config.entity_count(), 1);

    let (transport, mut outbound) = ChannelTransport::new();
    let bus = Arc::new(StateBus::new());
    let mut handler = DatapointHandler::with_config(transport, bus.clone(), config.handler_config());
    for entity in config.build(&SimulatedPinFactory::new()).unwrap() {
        handler.add_entity(entity).unwrap();
    }

    let desk = id(EntityKind::Light, "desk");
    handler.dispatch(&DatapointRecord::new(20, DatapointValue::Bool(true)));
    handler.dispatch(&DatapointRecord::new(23, DatapointValue::UInt(1000)));
    let light: LightState = bus.last_typed(&desk).unwrap();
    assert!(light.state);
    assert_eq!(light.color_temperature, Some(500.0));

    handler
        .control(ControlCall::new(desk, json!({"brightness": 0.5})))
        .unwrap();
    assert_eq!(
        outbound.try_recv().unwrap(),
        DatapointRecord::new(22, DatapointValue::UInt(505))
    );
}

#[test]
fn test_light_missing_section_rejected() {
    let err = uyat_config::load_config_str("light: [ { id: desk, type: rgb, switch: 20 } ]").unwrap_err();
    assert!(matches!(err, ConfigError::ValidationFailed { .. }));
}
