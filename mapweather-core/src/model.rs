use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default location used whenever the device location is unavailable.
pub const FALLBACK_COORDINATE: Coordinate = Coordinate { latitude: 37.654218, longitude: 127.049952 };

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        FALLBACK_COORDINATE
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Where the flow's current coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSource {
    Live,
    Fallback,
}

/// Location permission level as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationState {
    Undetermined,
    Restricted,
    Denied,
    AuthorizedAlways,
    AuthorizedWhenInUse,
    Unknown,
}

impl AuthorizationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationState::Undetermined => "undetermined",
            AuthorizationState::Restricted => "restricted",
            AuthorizationState::Denied => "denied",
            AuthorizationState::AuthorizedAlways => "always",
            AuthorizationState::AuthorizedWhenInUse => "when-in-use",
            AuthorizationState::Unknown => "unknown",
        }
    }

    pub const fn all() -> &'static [AuthorizationState] {
        &[
            AuthorizationState::Undetermined,
            AuthorizationState::Restricted,
            AuthorizationState::Denied,
            AuthorizationState::AuthorizedAlways,
            AuthorizationState::AuthorizedWhenInUse,
            AuthorizationState::Unknown,
        ]
    }

    /// Foreground use treats both authorized levels the same.
    pub fn is_authorized(&self) -> bool {
        matches!(
            self,
            AuthorizationState::AuthorizedAlways | AuthorizationState::AuthorizedWhenInUse
        )
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AuthorizationState {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "undetermined" | "not-determined" => Ok(AuthorizationState::Undetermined),
            "restricted" => Ok(AuthorizationState::Restricted),
            "denied" => Ok(AuthorizationState::Denied),
            "always" | "authorized-always" => Ok(AuthorizationState::AuthorizedAlways),
            "when-in-use" | "authorized-when-in-use" => Ok(AuthorizationState::AuthorizedWhenInUse),
            "unknown" => Ok(AuthorizationState::Unknown),
            _ => Err(anyhow::anyhow!(
                "Unknown authorization state '{value}'. \
                 Supported: undetermined, restricted, denied, always, when-in-use, unknown."
            )),
        }
    }
}

/// Current conditions decoded from one weather response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature: f32,
    pub temp_min: f32,
    pub temp_max: f32,
    pub humidity: i32,
    pub wind_speed: f32,
}

/// A reading ready for display, tagged with where and when it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherUpdate {
    pub reading: WeatherReading,
    pub coordinate: Coordinate,
    pub received_at: DateTime<Utc>,
}
