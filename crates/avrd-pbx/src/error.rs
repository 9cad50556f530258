//! Error type for PBX configuration operations.

/// Errors that can occur while writing config files or talking to ARI.
#[derive(Debug, thiserror::Error)]
pub enum PbxError {
    /// Reading or writing a configuration file failed.
    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    /// A value destined for a config file failed character validation.
    #[error("invalid {field}: {value:?}")]
    InvalidValue {
        /// Which field was rejected.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// The ARI request could not be built or sent.
    #[error("ari request failed: {0}")]
    Ari(#[from] reqwest::Error),

    /// ARI answered with a non-success status.
    #[error("ari reload of {module} returned {status}")]
    AriStatus {
        module: String,
        status: reqwest::StatusCode,
    },
}
