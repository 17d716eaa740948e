//! Remote collaborators of the upload widget.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::models::{Readiness, StagedFile};

/// resolves whether a knowledge base can take uploads
#[async_trait]
pub trait CollectionResolver: Send + Sync {
    /// implementations should give up with [`ServiceError::Cancelled`] once `cancel` fires
    async fn resolve(&self, scope: &str, cancel: CancellationToken) -> Result<Readiness, ServiceError>;
}

/// tells whether a knowledge base name is already taken
#[async_trait]
pub trait NameChecker: Send + Sync {
    async fn name_exists(&self, name: &str) -> Result<bool, ServiceError>;
}

/// sends one file to a knowledge base
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// returns the server's parsed json body on success
    async fn upload(&self, file: &StagedFile, target: &str) -> Result<serde_json::Value, ServiceError>;
}
