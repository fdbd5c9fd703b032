//! Fan entity: power, speed levels, oscillation and direction
//!
//! Every feature is optional, but a fan has at least a switch or a speed.
//! Speed codes `min_value..=max_value` map to levels `1..=N`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uyat_adapters::{DpNumber, DpSwitch};
use uyat_core::{DatapointRecord, EntityId, EntityKind};
use uyat_dispatch::{ControlCall, DispatchError, Entity, EntityContext, ListenerRegistry};
use uyat_state_bus::EntityState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanDirection {
    #[default]
    Forward,
    Reverse,
}

impl FanDirection {
    fn from_switch(reverse: bool) -> Self {
        if reverse {
            Self::Reverse
        } else {
            Self::Forward
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanState {
    pub state: bool,
    /// Speed level, `1..=speed_count`
    pub speed: Option<u32>,
    pub oscillating: bool,
    pub direction: FanDirection,
}

impl EntityState for FanState {
    fn kind() -> EntityKind {
        EntityKind::Fan
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oscillating: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<FanDirection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanTraits {
    pub speed_count: u32,
    pub supports_oscillation: bool,
    pub supports_direction: bool,
}

/// Speed datapoint and its code range
#[derive(Debug, Clone)]
pub struct FanSpeed {
    number: DpNumber,
    min_value: u32,
    max_value: u32,
}

impl FanSpeed {
    /// `min_value` must not exceed `max_value`
    pub fn new(number: DpNumber, min_value: u32, max_value: u32) -> Self {
        Self {
            number,
            min_value,
            max_value,
        }
    }

    /// Saturates at `u32::MAX` for the full code range
    pub fn speed_count(&self) -> u32 {
        self.max_value.saturating_sub(self.min_value).saturating_add(1)
    }

    /// Level for a wire code, `None` outside the range or past the last level
    pub fn level_for(&self, code: u32) -> Option<u32> {
        if !(self.min_value..=self.max_value).contains(&code) {
            return None;
        }
        (code - self.min_value).checked_add(1)
    }

    /// Wire code for a level, `None` outside `1..=speed_count`
    pub fn code_for(&self, level: u32) -> Option<u32> {
        (1..=self.speed_count())
            .contains(&level)
            .then(|| level - 1 + self.min_value)
    }
}

pub struct Fan {
    id: EntityId,
    switch: Option<DpSwitch>,
    speed: Option<FanSpeed>,
    oscillation: Option<DpSwitch>,
    direction: Option<DpSwitch>,
    /// Last level mapped from an in-range code
    level: Option<u32>,
}

impl Fan {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            switch: None,
            speed: None,
            oscillation: None,
            direction: None,
            level: None,
        }
    }

    pub fn with_switch(mut self, switch: DpSwitch) -> Self {
        self.switch = Some(switch);
        self
    }

    pub fn with_speed(mut self, speed: FanSpeed) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_oscillation(mut self, oscillation: DpSwitch) -> Self {
        self.oscillation = Some(oscillation);
        self
    }

    pub fn with_direction(mut self, direction: DpSwitch) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn traits(&self) -> FanTraits {
        FanTraits {
            speed_count: self.speed.as_ref().map_or(0, FanSpeed::speed_count),
            supports_oscillation: self.oscillation.is_some(),
            supports_direction: self.direction.is_some(),
        }
    }

    /// State assembled from the last reported values
    ///
    /// Without a switch the fan counts as on once a speed level is known.
    pub fn state(&self) -> FanState {
        let reported = |s: &Option<DpSwitch>| {
            s.as_ref()
                .and_then(DpSwitch::last_received_value)
                .unwrap_or(false)
        };
        let state = match &self.switch {
            Some(switch) => switch.last_received_value().unwrap_or(false),
            None => self.level.is_some(),
        };
        FanState {
            state,
            speed: self.level,
            oscillating: reported(&self.oscillation),
            direction: FanDirection::from_switch(reported(&self.direction)),
        }
    }

    fn switches_mut(&mut self) -> impl Iterator<Item = &mut DpSwitch> {
        [&mut self.switch, &mut self.oscillation, &mut self.direction]
            .into_iter()
            .flatten()
    }

    fn set_switch(
        id: &EntityId,
        name: &str,
        switch: &mut Option<DpSwitch>,
        value: bool,
        ctx: &mut EntityContext<'_>,
    ) {
        match switch {
            Some(switch) => switch.set_value(value, ctx),
            None => warn!(entity_id = %id, "Fan {} datapoint not configured", name),
        }
    }
}

impl Entity for Fan {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        for switch in self.switches_mut() {
            switch.init(registry);
        }
        if let Some(speed) = &mut self.speed {
            speed.number.init(registry);
        }
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        let mut accepted = false;
        for switch in self.switches_mut() {
            accepted |= switch.handle(record, ctx).is_some();
        }
        if let Some(speed) = &mut self.speed {
            if speed.number.handle(record, ctx).is_some() {
                accepted = true;
                let code = speed.number.last_received_raw();
                match code.and_then(|c| speed.level_for(c)) {
                    Some(level) => self.level = Some(level),
                    None => warn!(entity_id = %self.id, "Fan speed code {:?} out of range", code),
                }
            }
        }

        if accepted {
            let state = self.state();
            debug!(entity_id = %self.id, ?state, "Fan state");
            ctx.publish(&self.id, &state);
        }
    }

    fn on_retry_timeout(&mut self, number: u8, ctx: &mut EntityContext<'_>) {
        for switch in self.switches_mut() {
            if switch.on_retry_timeout(number, ctx) {
                return;
            }
        }
        if let Some(speed) = &mut self.speed {
            speed.number.on_retry_timeout(number, ctx);
        }
    }

    fn control(&mut self, call: &ControlCall, ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        let call: FanCall = call.parse()?;

        if let Some(state) = call.state {
            Self::set_switch(&self.id, "switch", &mut self.switch, state, ctx);
        }
        if let Some(level) = call.speed {
            match &mut self.speed {
                Some(speed) => match speed.code_for(level) {
                    Some(code) => speed.number.set_raw(code, ctx),
                    None => warn!(
                        entity_id = %self.id,
                        "Speed {} outside 1..={}", level, speed.speed_count()
                    ),
                },
                None => warn!(entity_id = %self.id, "Fan speed datapoint not configured"),
            }
        }
        if let Some(oscillating) = call.oscillating {
            Self::set_switch(&self.id, "oscillation", &mut self.oscillation, oscillating, ctx);
        }
        if let Some(direction) = call.direction {
            let reverse = direction == FanDirection::Reverse;
            Self::set_switch(&self.id, "direction", &mut self.direction, reverse, ctx);
        }
        Ok(())
    }

    fn dump_config(&self) {
        info!("Uyat Fan '{}'", self.id);
        if let Some(switch) = &self.switch {
            info!("  Switch is {}", switch);
        }
        if let Some(speed) = &self.speed {
            info!(
                "  Speed is {}, {} levels from {}",
                speed.number,
                speed.speed_count(),
                speed.min_value
            );
        }
        if let Some(oscillation) = &self.oscillation {
            info!("  Oscillation is {}", oscillation);
        }
        if let Some(direction) = &self.direction {
            info!("  Direction is {}", direction);
        }
    }
}
