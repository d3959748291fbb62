//! Core library for `mapweather`.
//!
//! This crate defines:
//! - The location authorization flow and its runtime driver
//! - The OpenWeather client behind the `WeatherClient` trait
//! - Concurrent loading of items returned by the photo picker
//! - Configuration and shared domain models
//!
//! Platform pieces (OS location service, settings link, picker, rendering)
//! are traits; `mapweather-cli` provides console implementations.

pub mod config;
pub mod driver;
pub mod error;
pub mod flow;
pub mod location;
pub mod model;
pub mod photos;
pub mod presenter;
pub mod provider;

pub use config::{Config, OpenWeatherConfig, PickerConfig};
pub use driver::{FlowDriver, FlowEvents, FlowHandle, flow_channel};
pub use error::{ImageLoadError, LocationError, NetworkError};
pub use flow::{AuthorizationCheck, Command, FlowEvent, LocationAuthorizationFlow, RequestId};
pub use location::{LocationService, SettingsLink, SimulatedLocation, SimulationScript, SimulationStats};
pub use model::{
    AuthorizationState, Coordinate, CoordinateSource, FALLBACK_COORDINATE, WeatherReading, WeatherUpdate,
};
pub use presenter::Presenter;
pub use provider::{WeatherClient, client_from_config, openweather::OpenWeatherClient};
