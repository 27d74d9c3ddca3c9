//! External inputs of the pipeline: sun rise/set times and hourly weather.

pub mod cache;
pub mod suntimes;
pub mod weather;

pub use cache::TtlCache;
pub use suntimes::{Observer, SpaSunTimes, SunTimesProvider, SunTimesRecord, SunTimesTable};
pub use weather::{
    plan_weather_request, OpenMeteoClient, RawWeatherTable, WeatherDataProvider,
    WeatherRequestPlan, WeatherSource, WeatherWindow, WEATHER_VARIABLES,
};
