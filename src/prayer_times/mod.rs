pub mod cache;
pub mod calculator;
pub mod classifier;
pub mod provider;

pub use cache::{MidnightRefresh, ScheduleCache};
pub use calculator::SalahEphemeris;
pub use classifier::{classify, classify_in_schedule, next_boundary};
pub use provider::{
    ConfiguredLocation, Convention, Coordinates, EphemerisProvider, EphemerisTimes,
    LocationProvider,
};
