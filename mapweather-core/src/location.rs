//! Seams to the OS location service and the system settings screen.
//!
//! Callbacks from the OS (authorization changed, coordinate delivered) are
//! not part of these traits; the platform glue forwards them as
//! [`FlowEvent`](crate::flow::FlowEvent)s through a
//! [`FlowHandle`](crate::driver::FlowHandle).

use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    driver::FlowHandle,
    flow::FlowEvent,
    model::{AuthorizationState, Coordinate},
};

/// Queries and actions offered by the OS location subsystem.
///
/// `services_enabled` and `authorization_state` may block and are only
/// called from a blocking worker. The other methods are fire-and-forget.
pub trait LocationService: Send + Sync + 'static {
    /// Whether location services are turned on device-wide.
    fn services_enabled(&self) -> bool;

    /// Per-app authorization.
    fn authorization_state(&self) -> AuthorizationState;

    /// Ask the OS to show the permission dialog.
    fn request_permission(&self);

    fn start_updates(&self);

    fn stop_updates(&self);
}

/// Deep link into this app's page of the system settings.
pub trait SettingsLink: Send + Sync + 'static {
    fn open_settings(&self);
}

/// What a [`SimulatedLocation`] device reports and how its user behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationScript {
    pub services_enabled: bool,
    /// Authorization before the permission dialog is ever shown.
    pub initial: AuthorizationState,
    /// What the user picks in the permission dialog. `Undetermined` means the
    /// dialog is dismissed and the OS never calls back.
    pub grant: AuthorizationState,
    /// Position reported once updates start. `None` never gets a fix.
    pub fix: Option<Coordinate>,
}

/// Call counters, for checking what the flow asked of the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub permission_requests: usize,
    pub update_starts: usize,
    pub update_stops: usize,
}

#[derive(Debug)]
struct SimState {
    authorization: AuthorizationState,
    updating: bool,
    stats: SimulationStats,
}

/// In-process stand-in for the OS location service.
///
/// Callbacks the real OS would deliver (permission dialog answered, first
/// fix) are pushed through the attached [`FlowHandle`].
#[derive(Debug)]
pub struct SimulatedLocation {
    script: SimulationScript,
    state: Mutex<SimState>,
    events: OnceLock<FlowHandle>,
}

impl SimulatedLocation {
    pub fn new(script: SimulationScript) -> Self {
        Self {
            script,
            state: Mutex::new(SimState {
                authorization: script.initial,
                updating: false,
                stats: SimulationStats::default(),
            }),
            events: OnceLock::new(),
        }
    }

    /// Connect OS callbacks to a flow. Only the first handle is kept.
    pub fn attach(&self, handle: FlowHandle) {
        if self.events.set(handle).is_err() {
            warn!("simulated location already attached to a flow");
        }
    }

    pub fn stats(&self) -> SimulationStats {
        self.state.lock().stats
    }

    pub fn is_updating(&self) -> bool {
        self.state.lock().updating
    }

    fn emit(&self, event: FlowEvent) {
        match self.events.get() {
            Some(handle) => {
                handle.send(event);
            }
            None => debug!(?event, "simulated location not attached, dropping callback"),
        }
    }
}

impl LocationService for SimulatedLocation {
    fn services_enabled(&self) -> bool {
        self.script.services_enabled
    }

    fn authorization_state(&self) -> AuthorizationState {
        self.state.lock().authorization
    }

    fn request_permission(&self) {
        let answered = {
            let mut state = self.state.lock();
            state.stats.permission_requests += 1;
            if state.authorization != AuthorizationState::Undetermined
                || self.script.grant == AuthorizationState::Undetermined
            {
                false
            } else {
                state.authorization = self.script.grant;
                true
            }
        };

        if answered {
            info!(grant = %self.script.grant, "simulated permission dialog answered");
            self.emit(FlowEvent::AuthorizationChanged);
        }
    }

    fn start_updates(&self) {
        {
            let mut state = self.state.lock();
            state.stats.update_starts += 1;
            state.updating = true;
        }

        if let Some(fix) = self.script.fix {
            self.emit(FlowEvent::CoordinateReceived(fix));
        }
    }

    fn stop_updates(&self) {
        let mut state = self.state.lock();
        state.stats.update_stops += 1;
        state.updating = false;
    }
}
