use climasync_api::{ActuatorState, Centi, SensorSnapshot, Setpoints};

/// Which side of the dead-band switches an actuator on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// On below `setpoint - hysteresis`, off above `setpoint + hysteresis` (heater)
    OnBelow,
    /// On above `setpoint + hysteresis`, off below `setpoint - hysteresis` (dehumidifier)
    OnAbove,
}

/// One step of a two-point controller. Boundaries are strict: a value exactly
/// on the band edge holds the current state.
pub fn switch(
    on: bool,
    value: Centi,
    setpoint: Centi,
    hysteresis: Centi,
    polarity: Polarity,
) -> bool {
    let value = value.raw() as i32;
    let low = setpoint.raw() as i32 - hysteresis.raw() as i32;
    let high = setpoint.raw() as i32 + hysteresis.raw() as i32;

    match (polarity, on) {
        (Polarity::OnBelow, false) => value < low,
        (Polarity::OnBelow, true) => value <= high,
        (Polarity::OnAbove, false) => value > high,
        (Polarity::OnAbove, true) => value >= low,
    }
}

#[derive(Debug, Clone)]
pub struct AutomationController {
    setpoints: Setpoints,
    state: ActuatorState,
}

impl AutomationController {
    pub fn new(setpoints: Setpoints) -> Self {
        Self {
            setpoints,
            state: ActuatorState::default(),
        }
    }

    /// Evaluates both actuators against `snapshot`; at most one transition each.
    pub fn update(&mut self, snapshot: &SensorSnapshot) -> ActuatorState {
        let sp = &self.setpoints;

        let heater_on = switch(
            self.state.heater_on,
            snapshot.temperature,
            sp.temperature,
            sp.temperature_hysteresis,
            Polarity::OnBelow,
        );
        let dehumidifier_on = switch(
            self.state.dehumidifier_on,
            snapshot.humidity,
            sp.humidity,
            sp.humidity_hysteresis,
            Polarity::OnAbove,
        );

        if heater_on != self.state.heater_on {
            log::info!("Heater {}", if heater_on { "ON" } else { "OFF" });
        }
        if dehumidifier_on != self.state.dehumidifier_on {
            log::info!("Dehumidifier {}", if dehumidifier_on { "ON" } else { "OFF" });
        }

        self.state = ActuatorState {
            heater_on,
            dehumidifier_on,
        };
        self.state
    }

    /// Replaces both targets at once. Actuators are not re-evaluated until the
    /// next `update`; the caller is responsible for persisting the result.
    pub fn set_setpoints(&mut self, temperature: Centi, humidity: Centi) -> Setpoints {
        self.setpoints = self.setpoints.with_targets(temperature, humidity);
        self.setpoints
    }

    pub fn setpoints(&self) -> &Setpoints {
        &self.setpoints
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(temperature: i16, humidity: i16) -> SensorSnapshot {
        SensorSnapshot::new(Centi(temperature), Centi(humidity), 0, 0)
    }

    #[test]
    fn test_heater_switches_strictly_below_band() {
        let mut controller = AutomationController::new(Setpoints::default());

        assert!(!controller.update(&snapshot(2400, 5000)).heater_on);
        assert!(controller.update(&snapshot(2399, 5000)).heater_on);

        // holds inside the band and on its upper edge
        assert!(controller.update(&snapshot(2500, 5000)).heater_on);
        assert!(controller.update(&snapshot(2600, 5000)).heater_on);
        assert!(!controller.update(&snapshot(2601, 5000)).heater_on);
    }

    #[test]
    fn test_dehumidifier_switches_above_band() {
        let mut controller = AutomationController::new(Setpoints::default());

        assert!(!controller.update(&snapshot(2500, 5200)).dehumidifier_on);
        assert!(controller.update(&snapshot(2500, 5201)).dehumidifier_on);
        assert!(controller.update(&snapshot(2500, 4800)).dehumidifier_on);
        assert!(!controller.update(&snapshot(2500, 4799)).dehumidifier_on);
    }

    #[test]
    fn test_set_setpoints_does_not_reevaluate() {
        let mut controller = AutomationController::new(Setpoints::default());
        controller.update(&snapshot(2450, 5000));
        assert!(!controller.state().heater_on);

        let updated = controller.set_setpoints(Centi(3000), Centi(4000));
        assert_eq!(updated.temperature, Centi(3000));
        assert_eq!(updated.humidity, Centi(4000));
        assert_eq!(updated.temperature_hysteresis, Centi(100));
        assert!(!controller.state().heater_on);

        assert!(controller.update(&snapshot(2450, 5000)).heater_on);
    }

    #[test]
    fn test_same_setpoints_twice_no_extra_transition() {
        let mut controller = AutomationController::new(Setpoints::default());
        let reading = snapshot(2300, 6000);

        controller.set_setpoints(Centi(2500), Centi(5000));
        let first = controller.update(&reading);
        controller.set_setpoints(Centi(2500), Centi(5000));
        let second = controller.update(&reading);

        assert_eq!(first, second);
        assert!(first.heater_on && first.dehumidifier_on);
    }

    #[test]
    fn test_switch_extreme_values() {
        assert!(switch(
            false,
            Centi(i16::MIN),
            Centi(0),
            Centi(i16::MAX),
            Polarity::OnBelow
        ));
        assert!(switch(true, Centi(i16::MAX), Centi(i16::MAX), Centi(1), Polarity::OnAbove));
    }
}
