//! Runtime for [`LocationAuthorizationFlow`].
//!
//! The driver is the interactive task: it receives [`FlowEvent`]s from a
//! channel, lets the flow decide what to do and performs the resulting
//! [`Command`]s. Blocking authorization queries go to `spawn_blocking`,
//! weather fetches to `tokio::spawn`; both report back through the same
//! channel, so flow state and presenter are only ever touched here.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    flow::{AuthorizationCheck, Command, FlowEvent, LocationAuthorizationFlow},
    location::{LocationService, SettingsLink},
    model::{Coordinate, WeatherUpdate},
    presenter::Presenter,
    provider::WeatherClient,
};

/// Sending side of the flow's event channel.
///
/// Cheap to clone; give one to the UI and one to the OS glue.
#[derive(Debug, Clone)]
pub struct FlowHandle {
    tx: mpsc::UnboundedSender<FlowEvent>,
}

impl FlowHandle {
    /// Returns `false` once the driver has stopped.
    pub fn send(&self, event: FlowEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn check_authorization(&self) -> bool {
        self.send(FlowEvent::CheckRequested)
    }

    pub fn authorization_changed(&self) -> bool {
        self.send(FlowEvent::AuthorizationChanged)
    }

    pub fn coordinate_received(&self, coordinate: Coordinate) -> bool {
        self.send(FlowEvent::CoordinateReceived(coordinate))
    }

    pub fn refresh(&self) -> bool {
        self.send(FlowEvent::RefreshRequested)
    }

    pub fn locate(&self) -> bool {
        self.send(FlowEvent::LocateRequested)
    }

    pub fn shutdown(&self) -> bool {
        self.send(FlowEvent::Shutdown)
    }
}

/// Receiving side of the flow's event channel, consumed by [`FlowDriver::new`].
#[derive(Debug)]
pub struct FlowEvents {
    tx: mpsc::UnboundedSender<FlowEvent>,
    rx: mpsc::UnboundedReceiver<FlowEvent>,
}

impl FlowEvents {
    #[cfg(test)]
    pub(crate) fn into_receiver(self) -> mpsc::UnboundedReceiver<FlowEvent> {
        self.rx
    }
}

/// Create the event channel before the collaborators that need a handle.
pub fn flow_channel() -> (FlowHandle, FlowEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FlowHandle { tx: tx.clone() }, FlowEvents { tx, rx })
}

pub struct FlowDriver<P> {
    flow: LocationAuthorizationFlow,
    events: FlowEvents,
    location: Arc<dyn LocationService>,
    settings: Arc<dyn SettingsLink>,
    client: Arc<dyn WeatherClient>,
    presenter: P,
}

impl<P: Presenter> FlowDriver<P> {
    pub fn new(
        flow: LocationAuthorizationFlow,
        events: FlowEvents,
        location: Arc<dyn LocationService>,
        settings: Arc<dyn SettingsLink>,
        client: Arc<dyn WeatherClient>,
        presenter: P,
    ) -> Self {
        Self { flow, events, location, settings, client, presenter }
    }

    /// Process events until [`FlowEvent::Shutdown`] arrives.
    ///
    /// Returns the final flow state and the presenter.
    pub async fn run(mut self) -> (LocationAuthorizationFlow, P) {
        info!("flow driver started");

        while let Some(event) = self.events.rx.recv().await {
            if matches!(event, FlowEvent::Shutdown) {
                break;
            }
            for command in self.flow.handle(event) {
                self.execute(command);
            }
        }

        info!("flow driver stopped");
        (self.flow, self.presenter)
    }

    fn execute(&mut self, command: Command) {
        debug!(?command, "executing");

        match command {
            Command::CheckAuthorization => {
                let location = Arc::clone(&self.location);
                let tx = self.events.tx.clone();
                tokio::task::spawn_blocking(move || {
                    let check = if location.services_enabled() {
                        AuthorizationCheck::Status(location.authorization_state())
                    } else {
                        AuthorizationCheck::ServicesDisabled
                    };
                    tx.send(FlowEvent::AuthorizationResolved(check)).ok();
                });
            }
            Command::RequestPermission => self.location.request_permission(),
            Command::StartUpdates => self.location.start_updates(),
            Command::StopUpdates => self.location.stop_updates(),
            Command::ShowCoordinate { coordinate, source } => {
                self.presenter.show_coordinate(coordinate, source)
            }
            Command::FetchWeather { request, coordinate } => {
                let client = Arc::clone(&self.client);
                let tx = self.events.tx.clone();
                tokio::spawn(async move {
                    let result = client.fetch_weather(coordinate).await.map(|reading| {
                        WeatherUpdate { reading, coordinate, received_at: Utc::now() }
                    });
                    tx.send(FlowEvent::WeatherFetched { request, result }).ok();
                });
            }
            Command::ShowWeather(update) => self.presenter.show_weather(&update),
            Command::PromptSettings(reason) => {
                if self.presenter.prompt_settings(reason) {
                    self.settings.open_settings();
                }
            }
            Command::ReportLocationError(reason) => self.presenter.location_unavailable(reason),
            Command::ReportNetworkError { error, .. } => self.presenter.weather_failed(&error),
        }
    }
}
