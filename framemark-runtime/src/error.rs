use thiserror::Error;

/// Errors that stop a suite before or outside a measurement session.
///
/// Terminations that happen *inside* an immersive session (early end, entry
/// timeout, view-count violations) are not represented here: the driver
/// degrades those into abort records so partial data survives. See
/// [`crate::record::AbortCode`].
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The configuration cannot describe a runnable suite.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The active backend does not match the configured execution order.
    #[error("execution-order violation: {0}")]
    OrderViolation(String),

    /// The device fingerprint no longer matches the pinned identity for a
    /// comparison group.
    #[error("device identity mismatch for group '{group}': pinned '{pinned}', observed '{observed}'")]
    IdentityMismatch {
        group: String,
        pinned: String,
        observed: String,
    },

    /// The environment refused to grant an immersive session.
    #[error("immersive session acquisition failed: {0}")]
    SessionAcquisition(String),

    /// The identity store could not be read or written.
    #[error("identity store failure: {0}")]
    Store(#[source] std::io::Error),

    /// The record sink rejected a flush.
    #[error("record sink failure: {0}")]
    Sink(#[source] std::io::Error),

    /// The asset source could not produce the requested mesh.
    #[error("asset source failure for '{url}': {source}")]
    Asset {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized for flushing.
    #[error("record serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn order_violation(msg: impl Into<String>) -> Self {
        Self::OrderViolation(msg.into())
    }

    pub fn session_acquisition(msg: impl Into<String>) -> Self {
        Self::SessionAcquisition(msg.into())
    }
}
