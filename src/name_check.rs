use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::UploadError;
use crate::services::NameChecker;

/// answer of a name-existence check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStatus {
    Available,
    Taken,
    /// scope or mode changed while the check was running, result dropped
    Stale,
}

/// name-existence check guarded by a relevance epoch
///
/// Every scope change, mode change and stop bumps the epoch. A check that
/// started under an older epoch reports [`NameStatus::Stale`] whatever the
/// service said. A failing service is treated as "name does not exist".
#[derive(Clone)]
pub struct NameAvailability {
    checker: Arc<dyn NameChecker>,
    epoch: Arc<AtomicU64>,
}

impl NameAvailability {
    pub fn new(checker: Arc<dyn NameChecker>) -> Self {
        Self {
            checker,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// drop the relevance of every check currently in flight
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn check(&self, name: &str) -> Result<NameStatus, UploadError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UploadError::MissingField("knowledge base name"));
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        tracing::debug!("Checking whether knowledge base name '{}' exists", name);

        // fail open: a broken check must not block creation
        let exists = match self.checker.name_exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!("Name check for '{}' failed, treating as available: {}", name, e);
                false
            }
        };

        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!("Discarding stale name check result for '{}'", name);
            return Ok(NameStatus::Stale);
        }

        Ok(if exists { NameStatus::Taken } else { NameStatus::Available })
    }
}
