//! Thin entities for the uyat bridge
//!
//! Each entity wraps one or a few adapters and forwards accepted values to
//! the state bus. Writes only go out through the adapters; published state
//! always reflects what the MCU last reported.

mod fan;
mod light;
mod number;
mod select;
mod sensor;
mod switch;
mod text_sensor;

pub use fan::{Fan, FanCall, FanDirection, FanSpeed, FanState, FanTraits};
pub use light::{ColorMode, Light, LightCall, LightState, LightTraits, WhiteTemperature};
pub use number::{Number, NumberCall, NumberState};
pub use select::{Select, SelectCall, SelectState};
pub use sensor::{Sensor, SensorState, VapMeasure, VapSensor};
pub use switch::{Switch, SwitchCall, SwitchState};
pub use text_sensor::{TextSensor, TextSensorState};

use tracing::warn;
use uyat_dispatch::{ControlCall, DispatchError};

/// Control calls on entities that only report
pub(crate) fn read_only(call: &ControlCall) -> DispatchError {
    warn!(entity_id = %call.entity_id, "Control call on a read-only entity");
    DispatchError::InvalidControl {
        entity_id: call.entity_id.clone(),
        reason: "entity is read-only".to_string(),
    }
}
