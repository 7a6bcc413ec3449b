use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Calculation convention: method name and madhab (affects Asr).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convention {
    pub method: String,
    pub madhab: String,
}

impl Default for Convention {
    fn default() -> Self {
        Self {
            method: "MuslimWorldLeague".to_string(),
            madhab: "Hanafi".to_string(),
        }
    }
}

/// Raw output of an ephemeris computation for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct EphemerisTimes {
    pub fajr: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub zuhr: DateTime<Utc>,
    pub asr: DateTime<Utc>,
    pub maghrib: DateTime<Utc>,
    pub isha: DateTime<Utc>,
    pub qibla_bearing: f64,
}

/// Turns coordinates and a date into the day's prayer instants.
pub trait EphemerisProvider: Send + Sync {
    fn compute(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        convention: &Convention,
    ) -> Result<EphemerisTimes>;
}

/// Source of the user's position. Permission denied maps to
/// `EngineError::LocationUnavailable`.
pub trait LocationProvider: Send + Sync {
    fn locate(&self) -> Result<Coordinates>;
}

/// Location taken from the config file; absent coordinates mean no fix.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    coordinates: Option<Coordinates>,
}

impl ConfiguredLocation {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        let coordinates = match (latitude, longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        };
        Self { coordinates }
    }
}

impl LocationProvider for ConfiguredLocation {
    fn locate(&self) -> Result<Coordinates> {
        let coords = self.coordinates.ok_or_else(|| {
            EngineError::LocationUnavailable("no coordinates configured; run `setup`".to_string())
        })?;
        if !(-90.0..=90.0).contains(&coords.latitude)
            || !(-180.0..=180.0).contains(&coords.longitude)
        {
            return Err(EngineError::LocationUnavailable(format!(
                "coordinates out of range: {}, {}",
                coords.latitude, coords.longitude
            )));
        }
        Ok(coords)
    }
}
