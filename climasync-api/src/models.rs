use core::fmt;

use alloc::string::String;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point value in hundredths (centidegrees, centipercent).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Centi(pub i16);

impl Centi {
    pub const fn new(value: i16) -> Self {
        Self(value)
    }

    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Converts a decimal reading, rounding to the nearest hundredth.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }

        let scaled = libm::round(value * 100.0);
        if scaled < i16::MIN as f64 || scaled > i16::MAX as f64 {
            return None;
        }

        Some(Self(scaled as i16))
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Centi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0 as i32;
        let sign = if value < 0 { "-" } else { "" };
        let magnitude = value.abs();
        write!(f, "{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}

impl Serialize for Centi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Centi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Self::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom("value out of centi-unit range"))
    }
}

/// Which end of the link a node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sensor node behind the AT modem; initiates the handshake.
    Station,
    /// TCP server node; answers every readiness declaration.
    Hub,
}

impl Role {
    pub fn peer(self) -> Self {
        match self {
            Role::Station => Role::Hub,
            Role::Hub => Role::Station,
        }
    }

    /// Readiness tag carried after `HANDSHAKE:` on the wire.
    pub fn ready_tag(self) -> &'static str {
        match self {
            Role::Station => "ARDUINO_READY",
            Role::Hub => "ESP32_READY",
        }
    }

    pub fn from_ready_tag(tag: &str) -> Option<Self> {
        match tag {
            "ARDUINO_READY" => Some(Role::Station),
            "ESP32_READY" => Some(Role::Hub),
            _ => None,
        }
    }

    /// Whether this role replies to a peer declaration it did not ask for.
    pub fn answers_peer(self) -> bool {
        matches!(self, Role::Hub)
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Station => "station",
            Role::Hub => "hub",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSnapshot {
    pub temperature: Centi,
    pub humidity: Centi,
    pub lux: u16,
    /// Milliseconds on the producing node's monotonic clock.
    pub taken_at: u64,
}

impl SensorSnapshot {
    pub fn new(temperature: Centi, humidity: Centi, lux: u16, taken_at: u64) -> Self {
        Self {
            temperature,
            humidity,
            lux,
            taken_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setpoints {
    pub temperature: Centi,
    pub humidity: Centi,
    pub temperature_hysteresis: Centi,
    pub humidity_hysteresis: Centi,
}

impl Default for Setpoints {
    fn default() -> Self {
        Self {
            temperature: Centi(2500),
            humidity: Centi(5000),
            temperature_hysteresis: Centi(100),
            humidity_hysteresis: Centi(200),
        }
    }
}

impl Setpoints {
    /// Returns a copy with both targets replaced together.
    pub fn with_targets(self, temperature: Centi, humidity: Centi) -> Self {
        Self {
            temperature,
            humidity,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub heater_on: bool,
    pub dehumidifier_on: bool,
}

/// Body of a `DATA:` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPayload {
    pub temperature: Centi,
    pub humidity: Centi,
    pub lux: u16,
    pub heater: bool,
    pub dehumidifier: bool,
}

impl DataPayload {
    pub fn new(snapshot: &SensorSnapshot, actuators: &ActuatorState) -> Self {
        Self {
            temperature: snapshot.temperature,
            humidity: snapshot.humidity,
            lux: snapshot.lux,
            heater: actuators.heater_on,
            dehumidifier: actuators.dehumidifier_on,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn actuators(&self) -> ActuatorState {
        ActuatorState {
            heater_on: self.heater,
            dehumidifier_on: self.dehumidifier,
        }
    }
}
