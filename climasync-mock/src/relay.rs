use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};

/// Relay output that only exists in the simulated room.
pub struct SimulatedRelay {
    name: &'static str,
    state: Rc<Cell<bool>>,
}

impl SimulatedRelay {
    pub fn new(name: &'static str, state: Rc<Cell<bool>>) -> Self {
        Self { name, state }
    }

    fn set(&mut self, on: bool) {
        if self.state.replace(on) != on {
            tracing::info!("{} relay {}", self.name, if on { "ON" } else { "OFF" });
        }
    }
}

impl ErrorType for SimulatedRelay {
    type Error = Infallible;
}

impl OutputPin for SimulatedRelay {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}
