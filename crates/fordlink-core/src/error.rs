// ── Core error types ──
//
// Domain-level outcomes for engine consumers. Transport detail stays
// in `fordlink_api::Error`; the `From` impl classifies it here. Note
// that `CommandInProgress` is an expected concurrency-control outcome,
// not a fault -- schedulers skip the cycle, bridging layers retry
// later.

use thiserror::Error;

/// Unified error type for the engine crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Another command cycle is active for this vehicle. Not queued,
    /// not retried internally -- re-issue later.
    #[error("Command already in progress for vehicle {vehicle_id}")]
    CommandInProgress { vehicle_id: String },

    #[error("Vehicle not tracked: {identifier}")]
    VehicleNotFound { identifier: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot reach vehicle service: {message}")]
    ConnectionFailed { message: String },

    #[error("Vehicle service error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },
}

impl CoreError {
    /// True for the single-flight rejection -- callers that hit this
    /// skip the cycle silently instead of surfacing an error.
    pub fn is_already_in_progress(&self) -> bool {
        matches!(self, Self::CommandInProgress { .. })
    }
}

impl From<fordlink_api::Error> for CoreError {
    fn from(err: fordlink_api::Error) -> Self {
        match err {
            fordlink_api::Error::Authentication { message } => {
                Self::AuthenticationFailed { message }
            }
            fordlink_api::Error::TokenExpired => Self::AuthenticationFailed {
                message: "access token expired".into(),
            },
            fordlink_api::Error::Transport(e) => Self::ConnectionFailed {
                message: e.to_string(),
            },
            fordlink_api::Error::InvalidUrl(e) => Self::ConnectionFailed {
                message: e.to_string(),
            },
            fordlink_api::Error::Api { message, status } => Self::Api {
                message,
                status: Some(status),
            },
            fordlink_api::Error::Deserialization { message, .. } => Self::Api {
                message: format!("unexpected response shape: {message}"),
                status: None,
            },
        }
    }
}
