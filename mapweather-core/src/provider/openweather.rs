use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{Coordinate, NetworkError, WeatherReading};

use super::WeatherClient;

/// OpenWeather current-weather endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Unit system requested from OpenWeather; temperatures in °C, wind in m/s.
pub const UNITS: &str = "metric";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: Client::new(),
        }
    }

    fn request(&self, coordinate: Coordinate) -> RequestBuilder {
        self.http.get(&self.base_url).query(&[
            ("lat", coordinate.latitude.to_string().as_str()),
            ("lon", coordinate.longitude.to_string().as_str()),
            ("appid", self.api_key.as_str()),
            ("units", UNITS),
        ])
    }

    /// The exact URL `fetch_weather` sends for `coordinate`.
    pub fn request_url(&self, coordinate: Coordinate) -> Result<Url, NetworkError> {
        let request = self.request(coordinate).build()?;
        Ok(request.url().clone())
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f32,
    temp_min: f32,
    temp_max: f32,
    humidity: i32,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f32,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    wind: OwWind,
}

impl From<OwCurrentResponse> for WeatherReading {
    fn from(parsed: OwCurrentResponse) -> Self {
        WeatherReading {
            temperature: parsed.main.temp,
            temp_min: parsed.main.temp_min,
            temp_max: parsed.main.temp_max,
            humidity: parsed.main.humidity,
            wind_speed: parsed.wind.speed,
        }
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn fetch_weather(&self, coordinate: Coordinate) -> Result<WeatherReading, NetworkError> {
        let request = self.request(coordinate).build()?;
        debug!(url = %request.url().path(), %coordinate, "requesting current weather");

        let res = self.http.execute(request).await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;
        let reading = WeatherReading::from(parsed);

        info!(%coordinate, temperature = reading.temperature, "weather fetched");
        Ok(reading)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
