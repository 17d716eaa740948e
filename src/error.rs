use thiserror::Error;

/// failure reported by one of the remote collaborators
#[derive(Debug, Error)]
pub enum ServiceError {
    /// the request was abandoned through its cancellation token
    #[error("request cancelled")]
    Cancelled,
    /// the server answered with a non-success status, body not inspected
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ServiceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Cancelled)
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ServiceError::Status(status.as_u16())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

/// failure of a staging, name-check or upload action
#[derive(Debug, Error)]
pub enum UploadError {
    /// the active knowledge base changed while the action was in flight
    #[error("knowledge base switched during upload")]
    ScopeSwitched,
    #[error("knowledge base {0} is not ready for uploads")]
    NotReady(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl UploadError {
    /// errors that belong to an abandoned attempt and are never shown to the user
    pub fn is_silent(&self) -> bool {
        match self {
            UploadError::ScopeSwitched => true,
            UploadError::Service(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
