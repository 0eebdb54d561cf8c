use std::cell::Cell;
use std::f64::consts::PI;
use std::rc::Rc;
use std::time::{Duration, Instant};

use climasync_embedded::SensorSource;
use rand::Rng;
use rand::rngs::ThreadRng;

pub fn simulation_lux(day_fraction: f64) -> f64 {
    let radians = day_fraction * 2.0 * PI;

    const MAX_SUNLIGHT_LUX: f64 = 500.0;
    const MAX_MOONLIGHT_LUX: f64 = 5.0;

    const SUNRISE_START: f64 = 0.23;
    const SUNRISE_END: f64 = 0.25;
    const SUNSET_START: f64 = 0.73;
    const SUNSET_END: f64 = 0.75;

    if (SUNRISE_START..=SUNSET_END).contains(&day_fraction) {
        if day_fraction <= SUNRISE_END {
            let sunrise = (day_fraction - SUNRISE_START) / (SUNRISE_END - SUNRISE_START) * PI / 2.0;
            sunrise.sin() * MAX_SUNLIGHT_LUX
        } else if day_fraction >= SUNSET_START {
            let sunset = (day_fraction - SUNSET_START) / (SUNSET_END - SUNSET_START) * PI / 2.0;
            sunset.cos() * MAX_SUNLIGHT_LUX
        } else {
            MAX_SUNLIGHT_LUX
        }
    } else {
        // moonlight peaks at midnight
        (radians + PI).cos().max(0.0) * (MAX_MOONLIGHT_LUX - 0.01) + 0.01
    }
}

/// Outdoor-driven room temperature in °C, coolest before dawn.
pub fn simulated_temperature(day_fraction: f64) -> f64 {
    let radians = (day_fraction - 0.25) * 2.0 * PI;
    20.0 + radians.sin() * 4.0
}

pub fn simulated_humidity(day_fraction: f64) -> f64 {
    let radians = day_fraction * 2.0 * PI;

    if (0.3..=0.7).contains(&day_fraction) {
        radians.sin().max(0.0) * 25.0 + 45.0
    } else {
        radians.cos().max(0.0) * 15.0 + 50.0
    }
}

fn to_centi(value: f64) -> i16 {
    (value * 100.0).round() as i16
}

/// Simulated sensor front-end that reacts to its own relays.
pub struct SimulatedRoom {
    origin: Instant,
    day_length: Duration,
    heater: Rc<Cell<bool>>,
    dehumidifier: Rc<Cell<bool>>,
    heat: f64,
    dryness: f64,
    rng: ThreadRng,
}

impl SimulatedRoom {
    pub fn new(day_length: Duration, heater: Rc<Cell<bool>>, dehumidifier: Rc<Cell<bool>>) -> Self {
        Self {
            origin: Instant::now(),
            day_length,
            heater,
            dehumidifier,
            heat: 0.0,
            dryness: 0.0,
            rng: rand::rng(),
        }
    }

    fn day_fraction(&self) -> f64 {
        let day = self.day_length.as_secs_f64();
        (self.origin.elapsed().as_secs_f64() % day) / day
    }
}

impl SensorSource for SimulatedRoom {
    fn read_temperature(&mut self) -> i16 {
        self.heat = if self.heater.get() {
            (self.heat + 0.5).min(10.0)
        } else {
            (self.heat - 0.2).max(0.0)
        };

        let noise = self.rng.random_range(-0.1..0.1);
        to_centi(simulated_temperature(self.day_fraction()) + self.heat + noise)
    }

    fn read_humidity(&mut self) -> i16 {
        self.dryness = if self.dehumidifier.get() {
            (self.dryness + 1.0).min(30.0)
        } else {
            (self.dryness - 0.5).max(0.0)
        };

        let noise = self.rng.random_range(-0.5..0.5);
        to_centi((simulated_humidity(self.day_fraction()) - self.dryness + noise).clamp(0.0, 100.0))
    }

    fn read_lux(&mut self) -> u16 {
        simulation_lux(self.day_fraction()).round() as u16
    }
}
