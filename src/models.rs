use bytes::Bytes;
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

// upload lifecycle of a single list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Uploading,
    Done,
    Failed,
}

// raw file handed to the widget by the user
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    /// declared media type, absent when the source did not provide one
    pub media_type: Option<String>,
    pub data: Bytes,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, media_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.map(str::to_string),
            data: data.into(),
        }
    }

    /// read a file from disk, the media type is left for the suffix fallback
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        tracing::trace!("Read {} bytes from {:?}", data.len(), path);
        Ok(Self {
            name,
            media_type: None,
            data: Bytes::from(data),
        })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

// one row of the widget's visible file list
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub uid: Uuid,
    pub name: String,
    pub status: FileStatus,
    /// the raw file, absent for rows that only mirror server state
    pub file: Option<StagedFile>,
}

impl FileEntry {
    pub fn pending(file: StagedFile) -> Self {
        Self {
            uid: Uuid::new_v4(),
            name: file.name.clone(),
            status: FileStatus::Pending,
            file: Some(file),
        }
    }

    pub fn with_status(mut self, status: FileStatus) -> Self {
        self.status = status;
        self
    }
}

/// answer of the collection-info service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
}

/// where an upload goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// an existing knowledge base selected from the outside
    Existing(String),
    /// a knowledge base that is still being named by the user
    Creating(String),
}

impl UploadTarget {
    pub fn new(scope: &str, creating: bool) -> Self {
        if creating {
            UploadTarget::Creating(scope.to_string())
        } else {
            UploadTarget::Existing(scope.to_string())
        }
    }

    /// collection name the upload is sent to
    pub fn effective_scope(&self) -> &str {
        match self {
            UploadTarget::Existing(s) | UploadTarget::Creating(s) => s,
        }
    }

    pub fn is_creating(&self) -> bool {
        matches!(self, UploadTarget::Creating(_))
    }
}

// per-file result of an upload batch
#[derive(Serialize, Debug, Clone)]
pub struct UploadResult {
    pub filename: String,
    pub success: bool,
    pub error: Option<String>,
    pub response: Option<serde_json::Value>,
}

// outcome of an upload batch
#[derive(Serialize, Debug, Clone, Default)]
pub struct UploadSummary {
    pub target: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// the batch stopped because the knowledge base changed
    pub aborted: bool,
    pub results: Vec<UploadResult>,
}
