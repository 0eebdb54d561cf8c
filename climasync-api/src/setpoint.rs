use crate::frame::SetpointFields;
use crate::models::Centi;

/// Accepted range for remotely supplied setpoints, in centi-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetpointLimits {
    pub temperature_min: Centi,
    pub temperature_max: Centi,
    pub humidity_min: Centi,
    pub humidity_max: Centi,
}

impl Default for SetpointLimits {
    fn default() -> Self {
        Self {
            temperature_min: Centi(0),
            temperature_max: Centi(5000),
            humidity_min: Centi(0),
            humidity_max: Centi(10000),
        }
    }
}

impl SetpointLimits {
    /// Converts and range-checks a complete pair.
    pub fn validate(&self, temperature: f64, humidity: f64) -> Option<(Centi, Centi)> {
        Some((self.temperature(temperature)?, self.humidity(humidity)?))
    }

    pub fn temperature(&self, value: f64) -> Option<Centi> {
        Centi::from_f64(value)
            .filter(|v| *v >= self.temperature_min && *v <= self.temperature_max)
    }

    pub fn humidity(&self, value: f64) -> Option<Centi> {
        Centi::from_f64(value).filter(|v| *v >= self.humidity_min && *v <= self.humidity_max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Accumulation {
    /// Still waiting for the other half
    Partial,
    Complete { temperature: Centi, humidity: Centi },
    /// Both halves arrived but the pair is out of range; nothing was applied
    Rejected { temperature: f64, humidity: f64 },
}

/// Collects setpoint halves until both are present.
#[derive(Debug, Clone, Default)]
pub struct SetpointAccumulator {
    temperature: Option<f64>,
    humidity: Option<f64>,
    limits: SetpointLimits,
}

impl SetpointAccumulator {
    pub fn new(limits: SetpointLimits) -> Self {
        Self {
            temperature: None,
            humidity: None,
            limits,
        }
    }

    pub fn accept(&mut self, fields: SetpointFields) -> Accumulation {
        if let Some(temperature) = fields.temperature {
            self.temperature = Some(temperature);
        }
        if let Some(humidity) = fields.humidity {
            self.humidity = Some(humidity);
        }

        let (Some(temperature), Some(humidity)) = (self.temperature, self.humidity) else {
            return Accumulation::Partial;
        };
        self.clear();

        match self.limits.validate(temperature, humidity) {
            Some((temperature, humidity)) => Accumulation::Complete {
                temperature,
                humidity,
            },
            None => Accumulation::Rejected {
                temperature,
                humidity,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none()
    }

    pub fn clear(&mut self) {
        self.temperature = None;
        self.humidity = None;
    }
}
