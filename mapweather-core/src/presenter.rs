use crate::{
    error::{LocationError, NetworkError},
    model::{Coordinate, CoordinateSource, WeatherUpdate},
};

/// Rendering side of the app: map, weather text, alerts.
///
/// Every method is called from the interactive task, one at a time.
pub trait Presenter: Send + 'static {
    /// Center the map on `coordinate` and drop an annotation there.
    fn show_coordinate(&mut self, coordinate: Coordinate, source: CoordinateSource);

    /// Replace the displayed weather text.
    fn show_weather(&mut self, update: &WeatherUpdate);

    /// Offer a "go to Settings" prompt. Returns `true` if the user accepted.
    fn prompt_settings(&mut self, reason: LocationError) -> bool;

    /// Location cannot be obtained and there is nothing the user can do about it here.
    fn location_unavailable(&mut self, reason: LocationError);

    /// A weather fetch failed; the previous text stays on screen.
    fn weather_failed(&mut self, error: &NetworkError);
}
