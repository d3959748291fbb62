//! Location authorization and weather refresh state machine.
//!
//! [`LocationAuthorizationFlow::handle`] is a pure transition function: it
//! consumes one [`FlowEvent`], updates the flow's own state and returns the
//! [`Command`]s the caller must carry out. It never performs I/O, so every
//! transition can be exercised directly. The
//! [`FlowDriver`](crate::driver::FlowDriver) runs the commands and feeds
//! their results back as events.

use tracing::{debug, info, warn};

use crate::{
    error::{LocationError, NetworkError},
    model::{AuthorizationState, Coordinate, CoordinateSource, WeatherUpdate},
};

/// Identity of one issued weather fetch. Later requests compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Outcome of querying the OS location subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationCheck {
    /// Location services are off device-wide; per-app status was not queried.
    ServicesDisabled,
    Status(AuthorizationState),
}

/// Inbound events, from the UI, the OS, or completed background work.
#[derive(Debug)]
pub enum FlowEvent {
    /// The screen asks for the initial authorization check.
    CheckRequested,
    /// Result of an authorization check run off the interactive task.
    AuthorizationResolved(AuthorizationCheck),
    /// The OS reports that the app's authorization changed.
    AuthorizationChanged,
    /// The OS delivered a location update.
    CoordinateReceived(Coordinate),
    /// Manual refresh for the last known coordinate.
    RefreshRequested,
    /// "Current location" action: obtain a fresh live coordinate.
    LocateRequested,
    /// A weather fetch finished.
    WeatherFetched {
        request: RequestId,
        result: Result<WeatherUpdate, NetworkError>,
    },
    /// Stop the driver loop.
    Shutdown,
}

/// Outbound effects for the driver to perform.
#[derive(Debug)]
pub enum Command {
    /// Run the services-enabled and authorization queries off the interactive task.
    CheckAuthorization,
    RequestPermission,
    StartUpdates,
    StopUpdates,
    /// Center the map on `coordinate` and annotate it.
    ShowCoordinate {
        coordinate: Coordinate,
        source: CoordinateSource,
    },
    FetchWeather {
        request: RequestId,
        coordinate: Coordinate,
    },
    ShowWeather(WeatherUpdate),
    /// Offer to open the system settings.
    PromptSettings(LocationError),
    ReportLocationError(LocationError),
    ReportNetworkError {
        request: RequestId,
        error: NetworkError,
    },
}

#[derive(Debug)]
pub struct LocationAuthorizationFlow {
    fallback: Coordinate,
    authorization: Option<AuthorizationState>,
    updating: bool,
    // Updates were already started for the current grant.
    grant_served: bool,
    coordinate: Option<(Coordinate, CoordinateSource)>,
    next_request: u64,
    displayed: Option<RequestId>,
    weather: Option<WeatherUpdate>,
}

impl Default for LocationAuthorizationFlow {
    fn default() -> Self {
        Self::new(crate::model::FALLBACK_COORDINATE)
    }
}

impl LocationAuthorizationFlow {
    pub fn new(fallback: Coordinate) -> Self {
        Self {
            fallback,
            authorization: None,
            updating: false,
            grant_served: false,
            coordinate: None,
            next_request: 1,
            displayed: None,
            weather: None,
        }
    }

    /// Last authorization state observed, if any check has completed.
    pub fn authorization(&self) -> Option<AuthorizationState> {
        self.authorization
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate.map(|(c, _)| c)
    }

    pub fn coordinate_source(&self) -> Option<CoordinateSource> {
        self.coordinate.map(|(_, s)| s)
    }

    /// The weather currently on display.
    pub fn weather(&self) -> Option<&WeatherUpdate> {
        self.weather.as_ref()
    }

    pub fn handle(&mut self, event: FlowEvent) -> Vec<Command> {
        debug!(?event, "flow event");

        match event {
            FlowEvent::CheckRequested | FlowEvent::AuthorizationChanged => {
                vec![Command::CheckAuthorization]
            }
            FlowEvent::LocateRequested => {
                self.grant_served = false;
                vec![Command::CheckAuthorization]
            }
            FlowEvent::AuthorizationResolved(check) => self.on_authorization(check),
            FlowEvent::CoordinateReceived(coordinate) => self.on_coordinate(coordinate),
            FlowEvent::RefreshRequested => self.on_refresh(),
            FlowEvent::WeatherFetched { request, result } => self.on_weather(request, result),
            FlowEvent::Shutdown => Vec::new(),
        }
    }

    fn on_authorization(&mut self, check: AuthorizationCheck) -> Vec<Command> {
        let state = match check {
            AuthorizationCheck::Status(state) => state,
            AuthorizationCheck::ServicesDisabled => {
                warn!("location services disabled, using fallback coordinate");
                return self.fall_back(LocationError::ServicesDisabled);
            }
        };

        self.authorization = Some(state);

        match state {
            AuthorizationState::Undetermined => {
                let mut commands = Vec::new();
                self.grant_served = false;
                self.stop_if_updating(&mut commands);
                commands.push(Command::RequestPermission);
                commands
            }
            AuthorizationState::Denied => {
                warn!("location permission denied, using fallback coordinate");
                self.fall_back(LocationError::PermissionDenied)
            }
            AuthorizationState::Restricted => self.unavailable(LocationError::PermissionRestricted),
            AuthorizationState::Unknown => self.unavailable(LocationError::UnknownAuthorization),
            AuthorizationState::AuthorizedAlways | AuthorizationState::AuthorizedWhenInUse => {
                if self.updating {
                    debug!(%state, "location updates already running");
                    self.grant_served = true;
                    return Vec::new();
                }
                if self.grant_served {
                    debug!(%state, "updates already requested for this grant");
                    return Vec::new();
                }
                self.grant_served = true;
                self.updating = true;
                vec![Command::StartUpdates]
            }
        }
    }

    fn on_coordinate(&mut self, coordinate: Coordinate) -> Vec<Command> {
        if !self.updating {
            debug!(%coordinate, "dropping location update without an active subscription");
            return Vec::new();
        }
        if !coordinate.is_finite() {
            warn!(%coordinate, "ignoring non-finite location update");
            return Vec::new();
        }

        info!(%coordinate, "live coordinate obtained");
        self.updating = false;
        self.coordinate = Some((coordinate, CoordinateSource::Live));

        vec![
            Command::StopUpdates,
            Command::ShowCoordinate { coordinate, source: CoordinateSource::Live },
            self.issue_fetch(coordinate),
        ]
    }

    fn on_refresh(&mut self) -> Vec<Command> {
        match self.coordinate() {
            Some(coordinate) => vec![self.issue_fetch(coordinate)],
            None => {
                debug!("refresh requested before any coordinate was obtained");
                Vec::new()
            }
        }
    }

    fn on_weather(
        &mut self,
        request: RequestId,
        result: Result<WeatherUpdate, NetworkError>,
    ) -> Vec<Command> {
        match result {
            Ok(update) => {
                if self.displayed.is_some_and(|shown| request <= shown) {
                    debug!(request = request.get(), "discarding stale weather response");
                    return Vec::new();
                }
                self.displayed = Some(request);
                self.weather = Some(update.clone());
                vec![Command::ShowWeather(update)]
            }
            Err(error) => {
                if self.displayed.is_some_and(|shown| request <= shown) {
                    debug!(request = request.get(), %error, "discarding stale weather failure");
                    return Vec::new();
                }
                warn!(request = request.get(), %error, "weather fetch failed");
                vec![Command::ReportNetworkError { request, error }]
            }
        }
    }

    fn fall_back(&mut self, reason: LocationError) -> Vec<Command> {
        let mut commands = Vec::new();
        self.grant_served = false;
        self.stop_if_updating(&mut commands);

        let coordinate = self.fallback;
        self.coordinate = Some((coordinate, CoordinateSource::Fallback));

        commands.push(Command::PromptSettings(reason));
        commands.push(Command::ShowCoordinate { coordinate, source: CoordinateSource::Fallback });
        commands.push(self.issue_fetch(coordinate));
        commands
    }

    fn unavailable(&mut self, reason: LocationError) -> Vec<Command> {
        warn!(%reason, "location unavailable");
        let mut commands = Vec::new();
        self.grant_served = false;
        self.stop_if_updating(&mut commands);
        commands.push(Command::ReportLocationError(reason));
        commands
    }

    fn stop_if_updating(&mut self, commands: &mut Vec<Command>) {
        if self.updating {
            self.updating = false;
            commands.push(Command::StopUpdates);
        }
    }

    fn issue_fetch(&mut self, coordinate: Coordinate) -> Command {
        let request = RequestId(self.next_request);
        self.next_request += 1;
        Command::FetchWeather { request, coordinate }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FALLBACK_COORDINATE, WeatherReading};
    use chrono::Utc;

    fn resolved(state: AuthorizationState) -> FlowEvent {
        FlowEvent::AuthorizationResolved(AuthorizationCheck::Status(state))
    }

    fn fetches(commands: &[Command]) -> Vec<(RequestId, Coordinate)> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::FetchWeather { request, coordinate } => Some((*request, *coordinate)),
                _ => None,
            })
            .collect()
    }

    fn count(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
        commands.iter().filter(|c| pred(*c)).count()
    }

    fn update(temperature: f32, coordinate: Coordinate) -> WeatherUpdate {
        WeatherUpdate {
            reading: WeatherReading {
                temperature,
                temp_min: temperature - 1.0,
                temp_max: temperature + 1.0,
                humidity: 50,
                wind_speed: 1.5,
            },
            coordinate,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn check_request_asks_for_authorization_check() {
        let mut flow = LocationAuthorizationFlow::default();
        let commands = flow.handle(FlowEvent::CheckRequested);
        assert!(matches!(commands.as_slice(), [Command::CheckAuthorization]));
    }

    #[test]
    fn undetermined_requests_permission() {
        let mut flow = LocationAuthorizationFlow::default();
        let commands = flow.handle(resolved(AuthorizationState::Undetermined));

        assert!(matches!(commands.as_slice(), [Command::RequestPermission]));
        assert_eq!(flow.authorization(), Some(AuthorizationState::Undetermined));
        assert!(!flow.is_updating());
    }

    #[test]
    fn denied_uses_fallback_and_never_starts_updates() {
        let mut flow = LocationAuthorizationFlow::default();
        let commands = flow.handle(resolved(AuthorizationState::Denied));

        assert_eq!(count(&commands, |c| matches!(c, Command::StartUpdates)), 0);
        assert_eq!(
            count(&commands, |c| matches!(c, Command::PromptSettings(LocationError::PermissionDenied))),
            1
        );
        assert_eq!(fetches(&commands).len(), 1);
        assert_eq!(fetches(&commands)[0].1, Coordinate::new(37.654218, 127.049952));
        assert_eq!(flow.coordinate(), Some(FALLBACK_COORDINATE));
        assert_eq!(flow.coordinate_source(), Some(CoordinateSource::Fallback));
        assert!(!flow.is_updating());
    }

    #[test]
    fn denied_uses_configured_fallback() {
        let fallback = Coordinate::new(48.8566, 2.3522);
        let mut flow = LocationAuthorizationFlow::new(fallback);
        let commands = flow.handle(resolved(AuthorizationState::Denied));

        assert_eq!(fetches(&commands)[0].1, fallback);
    }

    #[test]
    fn services_disabled_short_circuits_to_settings() {
        let mut flow = LocationAuthorizationFlow::default();
        let commands =
            flow.handle(FlowEvent::AuthorizationResolved(AuthorizationCheck::ServicesDisabled));

        assert_eq!(count(&commands, |c| matches!(c, Command::StartUpdates)), 0);
        assert_eq!(
            count(&commands, |c| matches!(c, Command::PromptSettings(LocationError::ServicesDisabled))),
            1
        );
        assert_eq!(fetches(&commands)[0].1, FALLBACK_COORDINATE);
        // Per-app status was not consulted.
        assert_eq!(flow.authorization(), None);
    }

    #[test]
    fn restricted_reports_and_does_nothing_else() {
        let mut flow = LocationAuthorizationFlow::default();
        let commands = flow.handle(resolved(AuthorizationState::Restricted));

        assert!(matches!(
            commands.as_slice(),
            [Command::ReportLocationError(LocationError::PermissionRestricted)]
        ));
        assert_eq!(flow.coordinate(), None);
    }

    #[test]
    fn unknown_is_treated_like_restricted() {
        let mut flow = LocationAuthorizationFlow::default();
        let commands = flow.handle(resolved(AuthorizationState::Unknown));

        assert!(matches!(
            commands.as_slice(),
            [Command::ReportLocationError(LocationError::UnknownAuthorization)]
        ));
    }

    #[test]
    fn authorized_states_start_updates() {
        for state in [AuthorizationState::AuthorizedWhenInUse, AuthorizationState::AuthorizedAlways] {
            let mut flow = LocationAuthorizationFlow::default();
            let commands = flow.handle(resolved(state));

            assert!(matches!(commands.as_slice(), [Command::StartUpdates]), "state {state}");
            assert!(flow.is_updating());
        }
    }

    #[test]
    fn updates_requested_at_most_once_per_grant() {
        let mut flow = LocationAuthorizationFlow::default();
        flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));
        flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(1.0, 2.0)));

        let again = flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));
        assert!(again.is_empty());
        assert!(!flow.is_updating());

        // Revoking and granting again is a new grant.
        flow.handle(resolved(AuthorizationState::Denied));
        let regranted = flow.handle(resolved(AuthorizationState::AuthorizedAlways));
        assert!(matches!(regranted.as_slice(), [Command::StartUpdates]));
    }

    #[test]
    fn first_coordinate_stops_updates_and_fetches() {
        let mut flow = LocationAuthorizationFlow::default();
        flow.handle(resolved(AuthorizationState::AuthorizedAlways));

        let commands = flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(35.1, 129.0)));

        assert!(matches!(commands.first(), Some(Command::StopUpdates)));
        assert_eq!(fetches(&commands).len(), 1);
        assert_eq!(fetches(&commands)[0].1, Coordinate::new(35.1, 129.0));
        assert_eq!(flow.coordinate_source(), Some(CoordinateSource::Live));
        assert!(!flow.is_updating());
    }

    #[test]
    fn stray_coordinates_after_stop_are_dropped() {
        let mut flow = LocationAuthorizationFlow::default();
        flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));
        flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(1.0, 1.0)));

        let late = flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(2.0, 2.0)));
        assert!(late.is_empty());
        assert_eq!(flow.coordinate(), Some(Coordinate::new(1.0, 1.0)));
    }

    #[test]
    fn non_finite_coordinate_keeps_waiting() {
        let mut flow = LocationAuthorizationFlow::default();
        flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));

        let commands = flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(f64::NAN, 1.0)));
        assert!(commands.is_empty());
        assert!(flow.is_updating());
    }

    #[test]
    fn revoking_while_updating_stops_updates() {
        let mut flow = LocationAuthorizationFlow::default();
        flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));

        let commands = flow.handle(resolved(AuthorizationState::Restricted));
        assert!(matches!(commands.first(), Some(Command::StopUpdates)));
        assert!(!flow.is_updating());
    }

    #[test]
    fn refresh_refetches_same_coordinate_without_touching_subscription() {
        let mut flow = LocationAuthorizationFlow::default();
        flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));
        let first = flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(37.0, 127.0)));
        let (first_id, _) = fetches(&first)[0];

        let commands = flow.handle(FlowEvent::RefreshRequested);

        assert_eq!(commands.len(), 1);
        let (id, coordinate) = fetches(&commands)[0];
        assert_eq!(coordinate, Coordinate::new(37.0, 127.0));
        assert!(id > first_id);
        assert_eq!(flow.authorization(), Some(AuthorizationState::AuthorizedWhenInUse));
        assert!(!flow.is_updating());
    }

    #[test]
    fn locate_while_updating_does_not_restart_updates() {
        let mut flow = LocationAuthorizationFlow::default();
        let mut all = flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));
        all.extend(flow.handle(FlowEvent::LocateRequested));
        all.extend(flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse)));

        assert_eq!(count(&all, |c| matches!(c, Command::StartUpdates)), 1);
        assert!(flow.is_updating());

        let commands = flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(3.0, 4.0)));
        assert_eq!(fetches(&commands).len(), 1);
        assert!(flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse)).is_empty());
    }

    #[test]
    fn permission_reset_while_updating_stops_updates() {
        let mut flow = LocationAuthorizationFlow::default();
        flow.handle(resolved(AuthorizationState::AuthorizedAlways));

        let commands = flow.handle(resolved(AuthorizationState::Undetermined));
        assert!(matches!(commands.as_slice(), [Command::StopUpdates, Command::RequestPermission]));
        assert!(!flow.is_updating());
    }

    #[test]
    fn refresh_without_coordinate_is_a_no_op() {
        let mut flow = LocationAuthorizationFlow::default();
        assert!(flow.handle(FlowEvent::RefreshRequested).is_empty());
    }

    #[test]
    fn authorization_changed_reruns_check() {
        let mut flow = LocationAuthorizationFlow::default();
        let commands = flow.handle(FlowEvent::AuthorizationChanged);
        assert!(matches!(commands.as_slice(), [Command::CheckAuthorization]));
    }

    #[test]
    fn locate_requests_a_fresh_coordinate_within_the_same_grant() {
        let mut flow = LocationAuthorizationFlow::default();
        flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));
        flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(1.0, 1.0)));

        let commands = flow.handle(FlowEvent::LocateRequested);
        assert!(matches!(commands.as_slice(), [Command::CheckAuthorization]));

        let commands = flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse));
        assert!(matches!(commands.as_slice(), [Command::StartUpdates]));
    }

    #[test]
    fn grant_scenario_issues_exactly_one_fetch() {
        let mut flow = LocationAuthorizationFlow::default();
        let mut all = Vec::new();

        all.extend(flow.handle(FlowEvent::CheckRequested));
        all.extend(flow.handle(resolved(AuthorizationState::Undetermined)));
        all.extend(flow.handle(FlowEvent::AuthorizationChanged));
        all.extend(flow.handle(resolved(AuthorizationState::AuthorizedWhenInUse)));
        all.extend(flow.handle(FlowEvent::CoordinateReceived(Coordinate::new(37.0, 127.0))));

        let fetched = fetches(&all);
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].1, Coordinate::new(37.0, 127.0));
        assert_eq!(count(&all, |c| matches!(c, Command::StartUpdates)), 1);
        assert_eq!(count(&all, |c| matches!(c, Command::StopUpdates)), 1);
        assert!(!flow.is_updating());
    }

    #[test]
    fn newer_response_wins_over_late_older_one() {
        let mut flow = LocationAuthorizationFlow::default();
        let c = flow.handle(resolved(AuthorizationState::Denied));
        let (older, coordinate) = fetches(&c)[0];
        let (newer, _) = fetches(&flow.handle(FlowEvent::RefreshRequested))[0];

        let shown = flow.handle(FlowEvent::WeatherFetched {
            request: newer,
            result: Ok(update(20.0, coordinate)),
        });
        assert!(matches!(shown.as_slice(), [Command::ShowWeather(_)]));

        let stale = flow.handle(FlowEvent::WeatherFetched {
            request: older,
            result: Ok(update(10.0, coordinate)),
        });
        assert!(stale.is_empty());
        assert_eq!(flow.weather().map(|w| w.reading.temperature), Some(20.0));
    }

    #[test]
    fn failure_of_older_request_after_newer_display_is_dropped() {
        let mut flow = LocationAuthorizationFlow::default();
        let c = flow.handle(resolved(AuthorizationState::Denied));
        let (older, coordinate) = fetches(&c)[0];
        let (newer, _) = fetches(&flow.handle(FlowEvent::RefreshRequested))[0];

        flow.handle(FlowEvent::WeatherFetched { request: newer, result: Ok(update(12.0, coordinate)) });
        let late = flow.handle(FlowEvent::WeatherFetched {
            request: older,
            result: Err(NetworkError::Status { status: 502, body: String::new() }),
        });

        assert!(late.is_empty());
        assert_eq!(flow.weather().map(|w| w.reading.temperature), Some(12.0));
    }

    #[test]
    fn failed_fetch_keeps_previous_weather() {
        let mut flow = LocationAuthorizationFlow::default();
        let c = flow.handle(resolved(AuthorizationState::Denied));
        let (first, coordinate) = fetches(&c)[0];
        flow.handle(FlowEvent::WeatherFetched { request: first, result: Ok(update(5.0, coordinate)) });

        let (second, _) = fetches(&flow.handle(FlowEvent::RefreshRequested))[0];
        let commands = flow.handle(FlowEvent::WeatherFetched {
            request: second,
            result: Err(NetworkError::Status { status: 500, body: String::new() }),
        });

        assert!(matches!(commands.as_slice(), [Command::ReportNetworkError { .. }]));
        assert_eq!(flow.weather().map(|w| w.reading.temperature), Some(5.0));
    }
}
