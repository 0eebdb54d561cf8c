use embedded_hal::digital::OutputPin;

use climasync_api::ActuatorState;

use crate::{Error, Result};

/// Heater and dehumidifier relays driven from the automation state.
pub struct RelayBank<Pin>
where
    Pin: OutputPin,
{
    heater_pin: Pin,
    dehumidifier_pin: Pin,
    active_low: bool,
    applied: Option<ActuatorState>,
}

impl<Pin> RelayBank<Pin>
where
    Pin: OutputPin,
{
    pub fn new(heater_pin: Pin, dehumidifier_pin: Pin, active_low: bool) -> Self {
        Self {
            heater_pin,
            dehumidifier_pin,
            active_low,
            applied: None,
        }
    }

    /// Drives both relays; pins are only touched when their state changes.
    pub fn apply(&mut self, state: &ActuatorState) -> Result<()> {
        let previous = self.applied;

        if previous.map(|p| p.heater_on) != Some(state.heater_on) {
            Self::drive(&mut self.heater_pin, state.heater_on, self.active_low)?;
        }
        if previous.map(|p| p.dehumidifier_on) != Some(state.dehumidifier_on) {
            Self::drive(&mut self.dehumidifier_pin, state.dehumidifier_on, self.active_low)?;
        }

        self.applied = Some(*state);
        Ok(())
    }

    /// Switches both relays off, e.g. at boot.
    pub fn release(&mut self) -> Result<()> {
        self.applied = None;
        self.apply(&ActuatorState::default())
    }

    pub fn applied(&self) -> Option<ActuatorState> {
        self.applied
    }

    fn drive(pin: &mut Pin, on: bool, active_low: bool) -> Result<()> {
        let high = on != active_low;
        let result = if high { pin.set_high() } else { pin.set_low() };
        result.map_err(|_| Error::RelayError)
    }
}
