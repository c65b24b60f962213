//! Error taxonomy shared by the client layers.
//!
//! Transport errors travel unchanged up to the catalog and the session
//! orchestrator; the orchestrator folds them into terminal session states so
//! callers above it only ever see a [`SessionError`], never a raw transport
//! failure.

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16 },
    #[error("malformed response body: {0}")]
    Decode(String),
    #[error("invalid request url '{0}'")]
    InvalidUrl(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("rescan rejected by server: {message}")]
    ScanRejected { message: String },
}

/// Why a playback session ended without reaching `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("stream creation failed")]
    CreationFailed,
    #[error("stream error: {message}")]
    Preparation { message: String },
    #[error("stream preparation taking longer than expected")]
    PreparationTimeout,
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("HLS is not supported by any available playback backend")]
    Capability,
    #[error("playback backend: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for PlayerError {
    fn from(e: anyhow::Error) -> Self {
        Self::Backend(e.to_string())
    }
}
