//! Pre-flight gate for files entering the upload list.
//!
//! A file is accepted when its declared media type is one of the supported
//! document types. When the media type is missing or not one of those, the
//! filename suffix decides.

use crate::models::StagedFile;

/// media types accepted for knowledge base ingestion
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/markdown",
    "text/x-markdown",
    "text/plain",
    "text/csv",
];

/// filename suffixes accepted when the media type does not decide
pub const ACCEPTED_SUFFIXES: &[&str] = &[
    ".pdf", ".docx", ".pptx", ".xlsx", ".md", ".markdown", ".txt", ".csv",
];

// strip parameters such as `; charset=utf-8` and normalize case
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_accepted_media_type(media_type: &str) -> bool {
    let essence = essence(media_type);
    ACCEPTED_MEDIA_TYPES.iter().any(|t| *t == essence)
}

pub fn has_accepted_suffix(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    ACCEPTED_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// decide whether a file may enter the upload list
pub fn is_accepted(name: &str, media_type: Option<&str>) -> bool {
    match media_type.filter(|t| !t.trim().is_empty()) {
        Some(t) if is_accepted_media_type(t) => true,
        _ => has_accepted_suffix(name),
    }
}

pub fn is_accepted_file(file: &StagedFile) -> bool {
    is_accepted(&file.name, file.media_type.as_deref())
}
