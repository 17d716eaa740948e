use std::sync::Arc;

use crate::error::UploadError;
use crate::models::{FileStatus, StagedFile, UploadResult, UploadSummary, UploadTarget};
use crate::notify::{Notifier, RefreshBus};
use crate::scope::ActiveScopeGuard;
use crate::services::UploadTransport;

/// generic message for failed uploads, the root cause goes to the log
pub const UPLOAD_FAILED: &str = "File upload failed, please try again later";

/// upload transport adapter bound to an [`ActiveScopeGuard`]
#[derive(Clone)]
pub struct Uploader {
    guard: ActiveScopeGuard,
    transport: Arc<dyn UploadTransport>,
    notifier: Arc<dyn Notifier>,
    refresh: RefreshBus,
}

impl Uploader {
    pub fn new(guard: ActiveScopeGuard, transport: Arc<dyn UploadTransport>, refresh: RefreshBus) -> Self {
        let notifier = guard.notifier();
        Self {
            guard,
            transport,
            notifier,
            refresh,
        }
    }

    /// upload one file, checking the bound scope before and after the call
    pub async fn submit(&self, target: &UploadTarget, file: &StagedFile) -> Result<serde_json::Value, UploadError> {
        let creating = target.is_creating();
        let scope = target.effective_scope();

        if scope.trim().is_empty() {
            let err = UploadError::MissingField("knowledge base name");
            self.notifier.error(&err.to_string());
            return Err(err);
        }

        // a stopped guard is bound to nothing
        let ticket = match self.guard.bound_ticket() {
            Some(ticket) => ticket,
            None if creating => self.guard.ticket(),
            None => {
                tracing::debug!("Refusing upload of {} to '{}', guard is stopped", file.name, scope);
                return Err(UploadError::ScopeSwitched);
            }
        };
        if !creating && ticket.scope != scope {
            tracing::debug!("Refusing upload of {} to '{}', bound to '{}'", file.name, scope, ticket.scope);
            return Err(UploadError::ScopeSwitched);
        }

        tracing::debug!("Uploading {} ({} bytes) to '{}'", file.name, file.size(), scope);
        let result = self.transport.upload(file, scope).await;

        // the scope may have moved while the request was in flight
        let still_bound = creating || self.guard.is_current(&ticket);

        match result {
            Ok(response) if still_bound => {
                tracing::info!("✅ Uploaded {} to '{}'", file.name, scope);
                self.refresh.notify(true);
                Ok(response)
            }
            Ok(_) => {
                tracing::debug!("Upload of {} finished after '{}' was abandoned", file.name, scope);
                Err(UploadError::ScopeSwitched)
            }
            Err(e) if still_bound => {
                if e.is_cancelled() {
                    tracing::debug!("Upload of {} cancelled", file.name);
                } else {
                    tracing::error!("Failed to upload {} to '{}': {}", file.name, scope, e);
                    self.notifier.error(UPLOAD_FAILED);
                }
                Err(UploadError::Service(e))
            }
            Err(e) => {
                tracing::debug!("Suppressing upload error for abandoned '{}': {}", scope, e);
                Err(UploadError::ScopeSwitched)
            }
        }
    }

    /// upload every pending entry of the list, one at a time
    pub async fn upload_pending(&self, target: &UploadTarget) -> Result<UploadSummary, UploadError> {
        let origin = target.effective_scope().to_string();
        let mut summary = UploadSummary {
            target: origin.clone(),
            ..Default::default()
        };

        if origin.trim().is_empty() {
            let err = UploadError::MissingField("knowledge base name");
            self.notifier.error(&err.to_string());
            return Err(err);
        }

        if !target.is_creating() && !self.guard.is_ready() {
            let err = UploadError::NotReady(origin);
            self.notifier.error(&err.to_string());
            return Err(err);
        }

        let ticket = self.guard.ticket();
        let mut batch = Vec::new();
        let marked = self.guard.modify_entries(&origin, |entries| {
            entries
                .iter()
                .cloned()
                .map(|e| {
                    if e.status == FileStatus::Pending {
                        batch.push((e.uid, e.name.clone(), e.file.clone()));
                        e.with_status(FileStatus::Uploading)
                    } else {
                        e
                    }
                })
                .collect()
        });

        if !marked {
            summary.aborted = true;
            return Ok(summary);
        }

        summary.total = batch.len();
        tracing::info!("📤 Uploading {} files to '{}'", summary.total, origin);

        for (uid, name, file) in batch {
            if !target.is_creating() && !self.guard.is_current(&ticket) {
                summary.aborted = true;
                break;
            }

            let Some(file) = file else {
                // rows without a raw file cannot be sent
                self.guard.set_status(&origin, uid, FileStatus::Failed);
                summary.failed += 1;
                summary.results.push(UploadResult {
                    filename: name,
                    success: false,
                    error: Some("no file data".to_string()),
                    response: None,
                });
                continue;
            };

            match self.submit(target, &file).await {
                Ok(response) => {
                    self.guard.set_status(&origin, uid, FileStatus::Done);
                    summary.successful += 1;
                    summary.results.push(UploadResult {
                        filename: name,
                        success: true,
                        error: None,
                        response: Some(response),
                    });
                }
                Err(e) if e.is_silent() && !self.guard.is_current(&ticket) => {
                    tracing::debug!("Stopping batch for '{}': {}", origin, e);
                    summary.aborted = true;
                    break;
                }
                Err(e) => {
                    self.guard.set_status(&origin, uid, FileStatus::Failed);
                    summary.failed += 1;
                    summary.results.push(UploadResult {
                        filename: name,
                        success: false,
                        error: Some(e.to_string()),
                        response: None,
                    });
                }
            }
        }

        if summary.aborted {
            tracing::warn!("Upload batch for '{}' abandoned after a knowledge base switch", origin);
        } else {
            tracing::info!(
                "📦 Upload batch completed: {}/{} successful",
                summary.successful,
                summary.total
            );
            if summary.successful > 0 {
                self.notifier.success(&format!(
                    "Uploaded {} of {} files to '{}'",
                    summary.successful, summary.total, origin
                ));
            }
        }
        Ok(summary)
    }
}
