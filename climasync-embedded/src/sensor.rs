use climasync_api::{Centi, SensorSnapshot};

/// Synchronous environmental sensor front-end. Always returns a value.
pub trait SensorSource {
    /// Temperature in centidegrees Celsius.
    fn read_temperature(&mut self) -> i16;

    /// Relative humidity in centipercent.
    fn read_humidity(&mut self) -> i16;

    fn read_lux(&mut self) -> u16;

    fn snapshot(&mut self, taken_at: u64) -> SensorSnapshot {
        SensorSnapshot::new(
            Centi(self.read_temperature()),
            Centi(self.read_humidity()),
            self.read_lux(),
            taken_at,
        )
    }
}
