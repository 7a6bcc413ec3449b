use chrono::NaiveDate;
use log::debug;
use salah::prelude::*;

use crate::error::{EngineError, Result};
use crate::prayer_times::provider::{Convention, Coordinates as Position, EphemerisProvider, EphemerisTimes};

const KAABA_LATITUDE: f64 = 21.4225;
const KAABA_LONGITUDE: f64 = 39.8262;

/// Offline ephemeris backed by the `salah` crate.
#[derive(Debug, Clone, Default)]
pub struct SalahEphemeris;

impl SalahEphemeris {
    pub fn new() -> Self {
        Self
    }
}

impl EphemerisProvider for SalahEphemeris {
    fn compute(
        &self,
        position: Position,
        date: NaiveDate,
        convention: &Convention,
    ) -> Result<EphemerisTimes> {
        let coords = Coordinates::new(position.latitude, position.longitude);
        let method = parse_method(&convention.method)?;
        let madhab = parse_madhab(&convention.madhab)?;
        let params = Configuration::with(method, madhab);

        let times = PrayerSchedule::new()
            .on(date)
            .for_location(coords)
            .with_configuration(params)
            .calculate()
            .map_err(|e| EngineError::EphemerisFailure(e.to_string()))?;

        debug!(
            "Computed prayer times for {} at ({:.4}, {:.4})",
            date, position.latitude, position.longitude
        );

        Ok(EphemerisTimes {
            fajr: times.time(Prayer::Fajr),
            sunrise: times.time(Prayer::Sunrise),
            zuhr: times.time(Prayer::Dhuhr),
            asr: times.time(Prayer::Asr),
            maghrib: times.time(Prayer::Maghrib),
            isha: times.time(Prayer::Isha),
            qibla_bearing: qibla_bearing(position),
        })
    }
}

/// Initial great-circle bearing from `from` to the Kaaba, in degrees [0, 360).
pub fn qibla_bearing(from: Position) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = KAABA_LATITUDE.to_radians();
    let delta = (KAABA_LONGITUDE - from.longitude).to_radians();

    let y = delta.sin();
    let x = phi1.cos() * phi2.tan() - phi1.sin() * delta.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

pub fn parse_method(s: &str) -> Result<Method> {
    match s {
        "MuslimWorldLeague" => Ok(Method::MuslimWorldLeague),
        "Egyptian" => Ok(Method::Egyptian),
        "Karachi" => Ok(Method::Karachi),
        "UmmAlQura" => Ok(Method::UmmAlQura),
        "Dubai" => Ok(Method::Dubai),
        "MoonsightingCommittee" => Ok(Method::MoonsightingCommittee),
        "NorthAmerica" => Ok(Method::NorthAmerica),
        "Kuwait" => Ok(Method::Kuwait),
        "Qatar" => Ok(Method::Qatar),
        "Singapore" => Ok(Method::Singapore),
        "Tehran" => Ok(Method::Tehran),
        "Turkey" => Ok(Method::Turkey),
        "Other" => Ok(Method::Other),
        _ => Err(EngineError::InvalidInput(format!(
            "Unknown calculation method: '{}'",
            s
        ))),
    }
}

pub fn parse_madhab(s: &str) -> Result<Madhab> {
    match s {
        "Hanafi" => Ok(Madhab::Hanafi),
        "Shafi" | "Shafi'i" => Ok(Madhab::Shafi),
        _ => Err(EngineError::InvalidInput(format!("Unknown madhab: '{}'", s))),
    }
}

pub const CALC_METHODS: &[&str] = &[
    "MuslimWorldLeague",
    "Egyptian",
    "Karachi",
    "UmmAlQura",
    "Dubai",
    "MoonsightingCommittee",
    "NorthAmerica",
    "Kuwait",
    "Qatar",
    "Singapore",
    "Tehran",
    "Turkey",
    "Other",
];
