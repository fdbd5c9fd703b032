//! The climate entity

use crate::config::{ActiveStateMapping, ClimateConfig, FanSpeedMapping, PresetFeature, SwitchFeature};
use crate::pins::{StatePin, StatePins};
use crate::{
    ClimateAction, ClimateCall, ClimateMode, ClimatePreset, ClimateState, ClimateTraits, FanMode,
    SwingMode,
};
use tracing::{debug, info, trace, warn};
use uyat_adapters::{DpNumber, DpSwitch};
use uyat_core::{DatapointRecord, EntityId, RetryConfig};
use uyat_dispatch::{
    ControlCall, DatapointSink, DispatchError, Entity, EntityContext, ListenerRegistry,
};

/// `None` and NaN both mean "not known"
fn known(value: Option<f32>) -> Option<f32> {
    value.filter(|v| !v.is_nan())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

fn axis_level(axis: &Option<DpSwitch>) -> bool {
    axis.as_ref()
        .and_then(|s| s.last_received_value())
        .unwrap_or(false)
}

// =============================================================================
// Feature state
// =============================================================================

struct ActiveState {
    number: DpNumber,
    mapping: ActiveStateMapping,
}

impl ActiveState {
    fn reading(&self) -> Option<(ClimateMode, ClimateAction)> {
        self.number
            .last_received_raw()
            .and_then(|code| self.mapping.lookup(code))
    }
}

struct Temperatures {
    target: DpNumber,
    current: Option<DpNumber>,
    hysteresis: f32,
    reports_fahrenheit: bool,
}

impl Temperatures {
    fn to_celsius(&self, value: f32) -> f32 {
        if self.reports_fahrenheit {
            (value - 32.0) * 5.0 / 9.0
        } else {
            value
        }
    }

    fn from_celsius(&self, value: f32) -> f32 {
        if self.reports_fahrenheit {
            value * 9.0 / 5.0 + 32.0
        } else {
            value
        }
    }

    fn manual_target(&self) -> Option<f32> {
        self.target.last_received_value().map(|v| self.to_celsius(v))
    }

    fn current(&self) -> Option<f32> {
        self.current
            .as_ref()
            .and_then(|c| c.last_received_value())
            .map(|v| self.to_celsius(v))
    }
}

struct Preset {
    switch: DpSwitch,
    temperature: Option<f32>,
}

impl Preset {
    fn is_on(&self) -> bool {
        self.switch.last_received_value().unwrap_or(false)
    }
}

#[derive(Default)]
struct Presets {
    boost: Option<Preset>,
    eco: Option<Preset>,
    sleep: Option<Preset>,
}

impl Presets {
    fn slots(&self) -> [(ClimatePreset, &Option<Preset>); 3] {
        [
            (ClimatePreset::Boost, &self.boost),
            (ClimatePreset::Eco, &self.eco),
            (ClimatePreset::Sleep, &self.sleep),
        ]
    }

    fn slots_mut(&mut self) -> [(ClimatePreset, &mut Option<Preset>); 3] {
        [
            (ClimatePreset::Boost, &mut self.boost),
            (ClimatePreset::Eco, &mut self.eco),
            (ClimatePreset::Sleep, &mut self.sleep),
        ]
    }

    /// Highest-priority preset whose switch reads on
    fn active(&self) -> ClimatePreset {
        self.slots()
            .into_iter()
            .find(|(_, preset)| preset.as_ref().is_some_and(Preset::is_on))
            .map(|(kind, _)| kind)
            .unwrap_or(ClimatePreset::None)
    }

    /// Fixed target temperature of the active preset; boost has none
    fn active_temperature(&self) -> Option<f32> {
        let preset = match self.active() {
            ClimatePreset::Eco => self.eco.as_ref(),
            ClimatePreset::Sleep => self.sleep.as_ref(),
            ClimatePreset::Boost | ClimatePreset::None => None,
        };
        preset.and_then(|p| p.temperature)
    }

    fn supported(&self) -> Vec<ClimatePreset> {
        self.slots()
            .into_iter()
            .filter(|(_, preset)| preset.is_some())
            .map(|(kind, _)| kind)
            .collect()
    }
}

struct FanSpeed {
    number: DpNumber,
    mapping: FanSpeedMapping,
}

// =============================================================================
// Climate
// =============================================================================

/// Climate composite state machine
///
/// Owns one adapter per configured feature. Every accepted input triggers a
/// full recompute of the aggregate state followed by a publish.
pub struct Climate {
    id: EntityId,
    supports_heat: bool,
    supports_cool: bool,
    switch: Option<DpSwitch>,
    active_state: Option<ActiveState>,
    heating_pin: Option<StatePin>,
    cooling_pin: Option<StatePin>,
    temperatures: Option<Temperatures>,
    presets: Presets,
    swing_vertical: Option<DpSwitch>,
    swing_horizontal: Option<DpSwitch>,
    fan_speed: Option<FanSpeed>,
    /// Last mapped fan code; unmapped codes leave it alone
    fan_mode: Option<FanMode>,
    state: ClimateState,
}

impl Climate {
    pub fn new(id: EntityId, config: ClimateConfig, pins: StatePins) -> Self {
        let switch = |f: SwitchFeature| DpSwitch::new(f.datapoint, f.inverted, f.retry);
        let preset = |p: PresetFeature| Preset {
            temperature: p.temperature,
            switch: switch(p.switch),
        };

        let temperatures = config.temperatures.map(|t| Temperatures {
            target: DpNumber::new(t.target.datapoint, t.target.offset, t.target.multiplier, t.retry),
            current: t
                .current
                .map(|c| DpNumber::new(c.datapoint, c.offset, c.multiplier, RetryConfig::disabled())),
            hysteresis: t.hysteresis,
            reports_fahrenheit: t.reports_fahrenheit,
        });

        Self {
            id,
            supports_heat: config.supports_heat,
            supports_cool: config.supports_cool,
            switch: config.switch.map(switch),
            active_state: config.active_state.map(|a| ActiveState {
                number: DpNumber::plain(a.datapoint, a.retry),
                mapping: a.mapping,
            }),
            heating_pin: pins.heating.map(|p| StatePin::new("Heating", p)),
            cooling_pin: pins.cooling.map(|p| StatePin::new("Cooling", p)),
            temperatures,
            presets: Presets {
                boost: config.presets.boost.map(preset),
                eco: config.presets.eco.map(preset),
                sleep: config.presets.sleep.map(preset),
            },
            swing_vertical: config.swing.vertical.map(switch),
            swing_horizontal: config.swing.horizontal.map(switch),
            fan_speed: config.fan_speed.map(|f| FanSpeed {
                number: DpNumber::plain(f.datapoint, f.retry),
                mapping: f.mapping,
            }),
            fan_mode: None,
            state: ClimateState::default(),
        }
    }

    /// Last computed aggregate state
    pub fn state(&self) -> &ClimateState {
        &self.state
    }

    /// Capabilities derived from the configured features
    pub fn traits(&self) -> ClimateTraits {
        let mut supported_modes = vec![ClimateMode::Off];
        if self.supports_heat && self.supports_cool {
            supported_modes.push(ClimateMode::HeatCool);
        }
        if self.supports_heat {
            supported_modes.push(ClimateMode::Heat);
        }
        if self.supports_cool {
            supported_modes.push(ClimateMode::Cool);
        }
        if let Some(active) = &self.active_state {
            if active.mapping.drying_value.is_some() {
                supported_modes.push(ClimateMode::Dry);
            }
            if active.mapping.fanonly_value.is_some() {
                supported_modes.push(ClimateMode::FanOnly);
            }
        }

        let mut supported_presets = self.presets.supported();
        if !supported_presets.is_empty() {
            supported_presets.push(ClimatePreset::None);
        }

        let mut supported_swing_modes = Vec::new();
        match (self.swing_vertical.is_some(), self.swing_horizontal.is_some()) {
            (true, true) => supported_swing_modes.extend([
                SwingMode::Off,
                SwingMode::Both,
                SwingMode::Vertical,
                SwingMode::Horizontal,
            ]),
            (true, false) => supported_swing_modes.extend([SwingMode::Off, SwingMode::Vertical]),
            (false, true) => supported_swing_modes.extend([SwingMode::Off, SwingMode::Horizontal]),
            (false, false) => {}
        }

        ClimateTraits {
            supported_modes,
            supported_presets,
            supported_swing_modes,
            supported_fan_modes: self
                .fan_speed
                .as_ref()
                .map(|f| f.mapping.supported())
                .unwrap_or_default(),
            supports_current_temperature: self
                .temperatures
                .as_ref()
                .is_some_and(|t| t.current.is_some()),
            supports_action: true,
        }
    }

    // -------------------------------------------------------------------------
    // Recompute
    // -------------------------------------------------------------------------

    /// Mode implied by the power switch alone
    fn powered_mode(&self) -> ClimateMode {
        match (self.supports_heat, self.supports_cool) {
            (true, true) => ClimateMode::HeatCool,
            (true, false) => ClimateMode::Heat,
            (false, true) => ClimateMode::Cool,
            (false, false) => ClimateMode::Off,
        }
    }

    fn compute_state(&self) -> ClimateState {
        let preset = self.presets.active();
        let manual = self.temperatures.as_ref().and_then(Temperatures::manual_target);
        let target_temperature = known(self.presets.active_temperature().or(manual));
        let current_temperature = known(self.temperatures.as_ref().and_then(Temperatures::current));
        let (mode, action) = self.compute_mode_action(target_temperature, current_temperature);

        ClimateState {
            mode,
            action,
            target_temperature,
            current_temperature,
            preset,
            swing_mode: SwingMode::from_axes(
                axis_level(&self.swing_vertical),
                axis_level(&self.swing_horizontal),
            ),
            fan_mode: self.fan_mode,
        }
    }

    fn compute_mode_action(
        &self,
        target: Option<f32>,
        current: Option<f32>,
    ) -> (ClimateMode, ClimateAction) {
        // No switch datapoint means always powered
        let powered = self
            .switch
            .as_ref()
            .map_or(true, |s| s.last_received_value().unwrap_or(false));
        if !powered {
            return (ClimateMode::Off, ClimateAction::Off);
        }

        let mut mode = self.powered_mode();
        let mut action = ClimateAction::Idle;

        if self.heating_pin.is_some() || self.cooling_pin.is_some() {
            let level = |pin: &Option<StatePin>| pin.as_ref().is_some_and(StatePin::level);
            if level(&self.heating_pin) {
                action = ClimateAction::Heating;
                mode = ClimateMode::Heat;
            } else if level(&self.cooling_pin) {
                action = ClimateAction::Cooling;
                mode = ClimateMode::Cool;
            }
            // The active state may refine the mode, never the action
            if let Some((reported_mode, _)) = self.active_state.as_ref().and_then(ActiveState::reading) {
                mode = reported_mode;
            }
        } else if let Some(active) = &self.active_state {
            if let Some((reported_mode, reported_action)) = active.reading() {
                mode = reported_mode;
                action = reported_action;
            }
        } else if let (Some(temperatures), Some(target), Some(current)) =
            (&self.temperatures, target, current)
        {
            let diff = target - current;
            if diff.abs() >= temperatures.hysteresis {
                if self.supports_heat && diff > 0.0 {
                    action = ClimateAction::Heating;
                    mode = ClimateMode::Heat;
                } else if self.supports_cool && diff < 0.0 {
                    action = ClimateAction::Cooling;
                    mode = ClimateMode::Cool;
                }
            }
        }

        // Missing temperatures count as unknown, configured or not
        if target.is_none() || current.is_none() || mode == ClimateMode::Off {
            action = ClimateAction::Off;
        }

        (mode, action)
    }

    fn recompute_and_publish(&mut self, ctx: &mut EntityContext<'_>) {
        self.state = self.compute_state();
        trace!(
            entity_id = %self.id,
            "Recomputed: mode={} action={} preset={} swing={}",
            self.state.mode,
            self.state.action,
            self.state.preset,
            self.state.swing_mode
        );
        ctx.publish(&self.id, &self.state);
    }

    /// Every switch adapter, in registration order
    fn switches_mut(&mut self) -> Vec<&mut DpSwitch> {
        let mut switches: Vec<&mut DpSwitch> = Vec::new();
        switches.extend(self.switch.as_mut());
        for (_, preset) in self.presets.slots_mut() {
            switches.extend(preset.as_mut().map(|p| &mut p.switch));
        }
        switches.extend(self.swing_vertical.as_mut());
        switches.extend(self.swing_horizontal.as_mut());
        switches
    }

    /// Every number adapter, in registration order
    fn numbers_mut(&mut self) -> Vec<&mut DpNumber> {
        let mut numbers: Vec<&mut DpNumber> = Vec::new();
        numbers.extend(self.active_state.as_mut().map(|a| &mut a.number));
        if let Some(temperatures) = self.temperatures.as_mut() {
            numbers.push(&mut temperatures.target);
            numbers.extend(temperatures.current.as_mut());
        }
        numbers.extend(self.fan_speed.as_mut().map(|f| &mut f.number));
        numbers
    }

    // -------------------------------------------------------------------------
    // Control
    // -------------------------------------------------------------------------

    fn control_mode(&mut self, mode: ClimateMode, sink: &mut dyn DatapointSink) {
        let power = mode != ClimateMode::Off;
        match &mut self.switch {
            Some(switch) => {
                debug!("Setting switch: {}", on_off(power));
                switch.set_value(power, sink);
            }
            None if !power => warn!(entity_id = %self.id, "Switch datapoint not configured, cannot turn off"),
            None => {}
        }

        if matches!(mode, ClimateMode::Off | ClimateMode::HeatCool) {
            return;
        }
        match &mut self.active_state {
            Some(active) => match active.mapping.code_for(mode) {
                Some(code) => active.number.set_raw(code, sink),
                None => warn!(entity_id = %self.id, "No active state code for mode {}", mode),
            },
            None if matches!(mode, ClimateMode::Dry | ClimateMode::FanOnly) => {
                warn!(entity_id = %self.id, "Active state datapoint not configured, cannot set mode {}", mode)
            }
            None => debug!("Active state datapoint not configured"),
        }
    }

    fn control_swing(&mut self, swing_mode: SwingMode, sink: &mut dyn DatapointSink) {
        let (vertical, horizontal) = swing_mode.axes();
        let axes = [
            ("vertical", &mut self.swing_vertical, vertical),
            ("horizontal", &mut self.swing_horizontal, horizontal),
        ];
        for (name, axis, wanted) in axes {
            match axis {
                Some(switch) => {
                    if switch.last_received_value().unwrap_or(false) != wanted {
                        debug!("Setting {} swing: {}", name, on_off(wanted));
                        switch.set_value(wanted, sink);
                    }
                }
                None if wanted => warn!(entity_id = %self.id, "Swing {} datapoint not configured", name),
                None => {}
            }
        }
    }

    fn control_fan_mode(&mut self, fan_mode: FanMode, sink: &mut dyn DatapointSink) {
        let Some(fan) = &mut self.fan_speed else {
            warn!(entity_id = %self.id, "Fan speed datapoint not configured");
            return;
        };
        match fan.mapping.code_for(fan_mode) {
            Some(code) => {
                debug!("Setting fan speed: {} ({})", fan_mode, code);
                fan.number.set_raw(code, sink);
            }
            None => warn!(entity_id = %self.id, "No fan speed code configured for {}", fan_mode),
        }
    }

    fn control_target_temperature(&mut self, celsius: f32, sink: &mut dyn DatapointSink) {
        let Some(temperatures) = &mut self.temperatures else {
            warn!(entity_id = %self.id, "Target temperature datapoint not configured");
            return;
        };
        let value = temperatures.from_celsius(celsius);
        debug!("Setting target temperature: {:.1}", value);
        temperatures.target.set_value(value, sink);
    }

    fn control_preset(&mut self, requested: ClimatePreset, sink: &mut dyn DatapointSink) {
        if requested != ClimatePreset::None && !self.presets.supported().contains(&requested) {
            warn!(entity_id = %self.id, "Preset {} not configured", requested);
            return;
        }
        debug!("Applying preset: {}", requested);
        for (kind, preset) in self.presets.slots_mut() {
            if let Some(preset) = preset {
                preset.switch.set_value(kind == requested, sink);
            }
        }
    }
}

impl Entity for Climate {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        for switch in self.switches_mut() {
            switch.init(registry);
        }
        for number in self.numbers_mut() {
            number.init(registry);
        }
        for pin in [&mut self.heating_pin, &mut self.cooling_pin].into_iter().flatten() {
            pin.setup();
        }
        self.state = self.compute_state();
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        let mut accepted = false;
        for switch in self.switches_mut() {
            accepted |= switch.handle(record, ctx).is_some();
        }
        if let Some(active) = &mut self.active_state {
            accepted |= active.number.handle(record, ctx).is_some();
        }
        if let Some(temperatures) = &mut self.temperatures {
            accepted |= temperatures.target.handle(record, ctx).is_some();
            if let Some(current) = &mut temperatures.current {
                accepted |= current.handle(record, ctx).is_some();
            }
        }
        if let Some(fan) = &mut self.fan_speed {
            if fan.number.handle(record, ctx).is_some() {
                accepted = true;
                let code = fan.number.last_received_raw();
                match code.and_then(|c| fan.mapping.lookup(c)) {
                    Some(mode) => self.fan_mode = Some(mode),
                    None => warn!(entity_id = %self.id, "Unknown fan speed code {:?}", code),
                }
            }
        }

        if accepted {
            self.recompute_and_publish(ctx);
        }
    }

    fn on_retry_timeout(&mut self, number: u8, ctx: &mut EntityContext<'_>) {
        for switch in self.switches_mut() {
            if switch.on_retry_timeout(number, ctx) {
                return;
            }
        }
        for dp in self.numbers_mut() {
            if dp.on_retry_timeout(number, ctx) {
                return;
            }
        }
        debug!(dp = number, "Retry timeout for a datapoint this climate does not write");
    }

    fn control(&mut self, call: &ControlCall, ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        let call: ClimateCall = call.parse()?;
        trace!(entity_id = %self.id, ?call, "Climate control");

        if let Some(mode) = call.mode {
            self.control_mode(mode, ctx);
        }
        if let Some(swing_mode) = call.swing_mode {
            self.control_swing(swing_mode, ctx);
        }
        if let Some(fan_mode) = call.fan_mode {
            self.control_fan_mode(fan_mode, ctx);
        }
        if let Some(target) = call.target_temperature {
            self.control_target_temperature(target, ctx);
        }
        if let Some(preset) = call.preset {
            self.control_preset(preset, ctx);
        }
        Ok(())
    }

    fn poll(&mut self, ctx: &mut EntityContext<'_>) {
        let mut changed = false;
        for pin in [&mut self.heating_pin, &mut self.cooling_pin].into_iter().flatten() {
            changed |= pin.poll();
        }
        if changed {
            self.recompute_and_publish(ctx);
        }
    }

    fn dump_config(&self) {
        info!("Uyat Climate '{}'", self.id);
        if let Some(switch) = &self.switch {
            info!("  Switch is {}", switch);
        }
        if let Some(active) = &self.active_state {
            info!("  Active state is {}", active.number);
        }
        if let Some(temperatures) = &self.temperatures {
            info!("  Target Temperature is {}", temperatures.target);
            if let Some(current) = &temperatures.current {
                info!("  Current Temperature is {}", current);
            }
        }
        if let Some(pin) = &self.heating_pin {
            info!("  Heating State Pin: {}", pin.describe());
        }
        if let Some(pin) = &self.cooling_pin {
            info!("  Cooling State Pin: {}", pin.describe());
        }
        for (kind, preset) in self.presets.slots() {
            if let Some(preset) = preset {
                info!("  {} is {}", kind, preset.switch);
            }
        }
        if let Some(vertical) = &self.swing_vertical {
            info!("  Swing Vertical is {}", vertical);
        }
        if let Some(horizontal) = &self.swing_horizontal {
            info!("  Swing Horizontal is {}", horizontal);
        }
        if let Some(fan) = &self.fan_speed {
            info!("  Fan Speed is {}", fan.number);
        }
    }
}
