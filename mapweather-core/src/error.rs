use std::path::PathBuf;

/// Why the live device location is not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied for this app")]
    PermissionDenied,
    #[error("Location access is restricted on this device")]
    PermissionRestricted,
    #[error("Location services are disabled on this device")]
    ServicesDisabled,
    #[error("Location authorization state is unknown")]
    UnknownAuthorization,
}

impl LocationError {
    /// Whether the user can fix this from the system settings.
    pub fn is_recoverable_in_settings(&self) -> bool {
        matches!(self, LocationError::PermissionDenied | LocationError::ServicesDisabled)
    }
}

/// Failure of a single weather request.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Failed to reach the weather service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Weather request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse weather response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure to load one picked item.
#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a supported image")]
    UnsupportedFormat(String),
    #[error("Failed to decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Decoding {0} did not finish")]
    Interrupted(String),
}
