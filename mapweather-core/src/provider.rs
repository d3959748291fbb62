use crate::{Config, Coordinate, NetworkError, WeatherReading, provider::openweather::OpenWeatherClient};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Fetches current conditions for a coordinate.
///
/// The flow only talks to this trait, so tests can swap in a fake.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    async fn fetch_weather(&self, coordinate: Coordinate) -> Result<WeatherReading, NetworkError>;
}

/// Construct the OpenWeather client from config.
pub fn client_from_config(config: &Config) -> anyhow::Result<OpenWeatherClient> {
    let api_key = config.api_key()?;

    let client = match config.base_url() {
        Some(base_url) => OpenWeatherClient::with_base_url(api_key, base_url.to_owned()),
        None => OpenWeatherClient::new(api_key),
    };

    Ok(client)
}
