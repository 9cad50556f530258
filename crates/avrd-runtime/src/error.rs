//! Error type for container runtime operations.

/// Errors that can occur while talking to the container runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Could not establish a client against the runtime socket.
    #[error("failed to connect to container runtime: {0}")]
    Connect(#[source] bollard::errors::Error),

    /// The named or identified container does not exist.
    #[error("container not found: {0}")]
    NotFound(String),

    /// A container exists but its image reference could not be determined.
    #[error("container image not available: {0}")]
    MissingImage(String),

    /// Any other runtime API failure, including image pull errors.
    #[error("container runtime error: {0}")]
    Api(#[from] bollard::errors::Error),
}

impl RuntimeError {
    /// True when the error is a missing container rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Whether a bollard error is the daemon's 404 response.
pub(crate) fn is_missing(error: &bollard::errors::Error) -> bool {
    matches!(
        error,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Whether a bollard error is a harmless already-in-that-state response
/// (304 "not modified" or 409 "conflict") seen when start/stop races a
/// state change.
pub(crate) fn is_state_race(error: &bollard::errors::Error) -> bool {
    matches!(
        error,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304 | 409,
            ..
        }
    )
}
