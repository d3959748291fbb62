use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use mapweather_core::{
    Coordinate, CoordinateSource, FlowHandle, LocationError, NetworkError, Presenter, SettingsLink,
    WeatherReading, WeatherUpdate,
    photos::{PhotoPicker, PickedItem, PickerRequest},
};

pub fn format_reading(reading: &WeatherReading) -> String {
    format!(
        "{:.1}°C (min {:.1}°C / max {:.1}°C), humidity {}%, wind {:.1} m/s",
        reading.temperature, reading.temp_min, reading.temp_max, reading.humidity, reading.wind_speed,
    )
}

fn settings_message(reason: LocationError) -> &'static str {
    match reason {
        LocationError::ServicesDisabled => {
            "Location services are off. Turn them on in Settings > Privacy > Location Services."
        }
        _ => "This app may not use your location. Allow it in Settings to see local weather.",
    }
}

/// Prints what the map screen would render.
///
/// Ends the session once there is nothing left to wait for.
pub struct ConsolePresenter {
    handle: FlowHandle,
    refresh_pending: bool,
    accept_settings: bool,
}

impl ConsolePresenter {
    pub fn new(handle: FlowHandle, refresh_once: bool, accept_settings: bool) -> Self {
        Self { handle, refresh_pending: refresh_once, accept_settings }
    }

    fn finish(&self) {
        self.handle.shutdown();
    }
}

impl Presenter for ConsolePresenter {
    fn show_coordinate(&mut self, coordinate: Coordinate, source: CoordinateSource) {
        match source {
            CoordinateSource::Live => println!("Current location: {coordinate}"),
            CoordinateSource::Fallback => println!("Default location: {coordinate}"),
        }
    }

    fn show_weather(&mut self, update: &WeatherUpdate) {
        println!(
            "[{}] {} at {}",
            update.received_at.with_timezone(&Local).format("%H:%M:%S"),
            format_reading(&update.reading),
            update.coordinate,
        );

        if self.refresh_pending {
            self.refresh_pending = false;
            println!("Refreshing...");
            self.handle.refresh();
        } else {
            self.finish();
        }
    }

    fn prompt_settings(&mut self, reason: LocationError) -> bool {
        println!("{}", settings_message(reason));
        self.accept_settings
    }

    fn location_unavailable(&mut self, reason: LocationError) {
        println!("Location unavailable: {reason}");
        self.finish();
    }

    fn weather_failed(&mut self, error: &NetworkError) {
        println!("Could not load weather: {error}");
        self.finish();
    }
}

/// Settings deep link; a console has nowhere to go.
pub struct ConsoleSettings;

impl SettingsLink for ConsoleSettings {
    fn open_settings(&self) {
        println!("Opening system settings for mapweather.");
    }
}

/// Treats paths from the command line as the picker's selection.
pub struct PathPicker {
    paths: Vec<PathBuf>,
}

impl PathPicker {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl PhotoPicker for PathPicker {
    async fn pick(&self, _request: PickerRequest) -> Vec<PickedItem> {
        self.paths.iter().cloned().map(PickedItem::File).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_is_formatted_with_units() {
        let reading = WeatherReading {
            temperature: 3.46,
            temp_min: 1.0,
            temp_max: 5.0,
            humidity: 48,
            wind_speed: 2.6,
        };
        assert_eq!(
            format_reading(&reading),
            "3.5°C (min 1.0°C / max 5.0°C), humidity 48%, wind 2.6 m/s"
        );
    }

    #[test]
    fn services_disabled_message_points_to_privacy_settings() {
        assert!(settings_message(LocationError::ServicesDisabled).contains("Location Services"));
        assert!(settings_message(LocationError::PermissionDenied).contains("Allow it in Settings"));
    }
}
