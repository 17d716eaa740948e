mod common;

use common::harness;
use kb_upload_guard::file_types::{has_accepted_suffix, is_accepted, is_accepted_media_type};
use kb_upload_guard::models::StagedFile;

#[test]
fn test_accepted_media_types() {
    assert!(is_accepted_media_type("text/csv"));
    assert!(is_accepted_media_type("application/pdf"));
    assert!(is_accepted_media_type("TEXT/PLAIN; charset=utf-8"));
    assert!(is_accepted_media_type(
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    ));
    assert!(!is_accepted_media_type("image/png"));
    assert!(!is_accepted_media_type("application/msword"));
}

#[test]
fn test_suffix_fallback() {
    assert!(has_accepted_suffix("notes.md"));
    assert!(has_accepted_suffix("README.MARKDOWN"));
    assert!(has_accepted_suffix("slides.pptx"));
    assert!(!has_accepted_suffix("photo.png"));
    assert!(!has_accepted_suffix("archive.md.zip"));
}

#[test]
fn test_is_accepted() {
    // declared media type decides first
    assert!(is_accepted("data.bin", Some("text/csv")));

    // empty or unknown media type falls back to the suffix
    assert!(is_accepted("notes.md", Some("")));
    assert!(is_accepted("notes.md", None));
    assert!(is_accepted("sheet.xlsx", Some("application/octet-stream")));

    assert!(!is_accepted("photo.png", Some("image/png")));
    assert!(!is_accepted("noext", None));
}

#[tokio::test]
async fn test_rejected_file_notifies_once() {
    let h = harness();
    h.guard.on_scope_change("", false);

    let files = vec![
        StagedFile::new("photo.png", Some("image/png"), b"\x89PNG".to_vec()),
        StagedFile::new("table.csv", Some("text/csv"), b"a,b\n1,2".to_vec()),
        StagedFile::new("notes.md", Some(""), b"# hi".to_vec()),
    ];

    assert_eq!(h.guard.stage_files("", files), 2);
    assert_eq!(h.notifier.errors(), 1);

    let names: Vec<String> = h.guard.entries().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["table.csv".to_string(), "notes.md".to_string()]);
}

#[tokio::test]
async fn test_from_path_uses_suffix() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("report.pdf");
    std::fs::write(&path, b"%PDF-1.4").unwrap();

    let file = StagedFile::from_path(&path).await.unwrap();
    assert_eq!(file.name, "report.pdf");
    assert_eq!(file.media_type, None);
    assert_eq!(file.size(), 8);
    assert!(kb_upload_guard::file_types::is_accepted_file(&file));
}
