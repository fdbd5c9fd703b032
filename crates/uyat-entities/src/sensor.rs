//! Read-only numeric entities: plain sensor and VAP field sensor

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};
use uyat_adapters::{DpSensor, DpVap, VapValue};
use uyat_core::{DatapointRecord, EntityId, EntityKind};
use uyat_dispatch::{ControlCall, DispatchError, Entity, EntityContext, ListenerRegistry};
use uyat_state_bus::EntityState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub value: f32,
}

impl EntityState for SensorState {
    fn kind() -> EntityKind {
        EntityKind::Sensor
    }
}

pub struct Sensor {
    id: EntityId,
    sensor: DpSensor,
}

impl Sensor {
    pub fn new(id: EntityId, sensor: DpSensor) -> Self {
        Self { id, sensor }
    }

    pub fn value(&self) -> Option<f32> {
        self.sensor.last_value()
    }
}

impl Entity for Sensor {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        self.sensor.init(registry);
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        if let Some(value) = self.sensor.handle(record) {
            ctx.publish(&self.id, &SensorState { value });
        }
    }

    fn on_retry_timeout(&mut self, _number: u8, _ctx: &mut EntityContext<'_>) {}

    fn control(&mut self, call: &ControlCall, _ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        Err(crate::read_only(call))
    }

    fn dump_config(&self) {
        info!("Uyat Sensor '{}': {}", self.id, self.sensor);
    }
}

/// Which field of a VAP payload a sensor reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VapMeasure {
    #[default]
    Voltage,
    Amperage,
    Power,
}

impl VapMeasure {
    pub fn select(&self, value: &VapValue) -> u32 {
        match self {
            Self::Voltage => value.voltage,
            Self::Amperage => value.amperage,
            Self::Power => value.power,
        }
    }
}

impl fmt::Display for VapMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Voltage => "voltage",
            Self::Amperage => "amperage",
            Self::Power => "power",
        })
    }
}

/// Sensor reporting one field of a VAP datapoint
///
/// Several of these may share one datapoint, one per field.
pub struct VapSensor {
    id: EntityId,
    vap: DpVap,
    measure: VapMeasure,
}

impl VapSensor {
    pub fn new(id: EntityId, vap: DpVap, measure: VapMeasure) -> Self {
        Self { id, vap, measure }
    }

    pub fn measure(&self) -> VapMeasure {
        self.measure
    }
}

impl Entity for VapSensor {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        self.vap.init(registry);
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        if let Some(vap) = self.vap.handle(record) {
            debug!(entity_id = %self.id, "MCU reported {}", vap);
            let value = self.measure.select(&vap) as f32;
            ctx.publish(&self.id, &SensorState { value });
        }
    }

    fn on_retry_timeout(&mut self, _number: u8, _ctx: &mut EntityContext<'_>) {}

    fn control(&mut self, call: &ControlCall, _ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        Err(crate::read_only(call))
    }

    fn dump_config(&self) {
        info!("Uyat VAP Sensor '{}' ({}): {}", self.id, self.measure, self.vap);
    }
}
