use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use recipebot_bulk::write_artifact;
use recipebot_core::{Conversation, InputRecord, Message, RecordId, RunResult, RunStatus};
use recipebot_viewer::{create_viewer, resolve_artifact, viewer_path, ViewerError};

fn conversation(id: &str, query: &str, reply: &str) -> RunResult {
    RunResult::new(
        &InputRecord::new(id, query),
        Conversation::from_messages(vec![
            Message::system("prompt"),
            Message::user(query),
            Message::assistant(reply),
        ]),
        RunStatus::Ok,
    )
}

fn pages(html: &str) -> Vec<&str> {
    html.split(r#"<section class="page""#).skip(1).collect()
}

#[test]
fn three_rows_render_three_isolated_pages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = dir.path().join("results_20260101_120000.csv");
    let results = vec![
        conversation("1", "salmon", "grilled salmon reply"),
        conversation("2", "banana bread", "banana bread reply"),
        RunResult::worker_failure(RecordId::from("3"), "tacos".to_string(), "worker panicked"),
    ];
    write_artifact(&artifact, &results).expect("artifact");

    let output = create_viewer(&artifact).expect("viewer").expect("document written");
    assert_eq!(output, dir.path().join("viewer_results_20260101_120000.html"));

    let html = fs::read_to_string(&output).expect("read viewer");
    let pages = pages(&html);
    assert_eq!(pages.len(), 3);

    assert!(pages[0].contains("Conversation ID: 1"));
    assert!(pages[0].contains("grilled salmon reply"));
    assert!(!pages[0].contains("banana bread reply"));

    assert!(pages[1].contains("Conversation ID: 2"));
    assert!(pages[1].contains("banana bread reply"));
    assert!(!pages[1].contains("grilled salmon reply"));

    assert!(pages[2].contains("Conversation ID: 3"));
    assert!(pages[2].contains(r#"<div class="message system">"#));
    assert!(pages[2].contains("Exception during processing: worker panicked"));

    for number in 1..=3 {
        assert!(html.contains(&format!(r##"href="#page-{number}""##)));
    }
}

#[test]
fn message_content_is_escaped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = dir.path().join("results_20260101_120001.csv");
    let hostile = conversation("x", "<b>bold</b> query", "<script>alert(1)</script> & more");
    write_artifact(&artifact, &[hostile]).expect("artifact");

    let output = create_viewer(&artifact).expect("viewer").expect("document written");
    let html = fs::read_to_string(output).expect("read viewer");

    assert!(!html.contains("<script>alert(1)"));
    assert!(!html.contains("<b>bold</b>"));
    assert!(html.contains("&lt;script&gt;alert(1)"));
    assert!(html.contains("&amp; more"));
}

#[test]
fn empty_artifact_writes_no_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = dir.path().join("results_20260101_120002.csv");
    write_artifact(&artifact, &[]).expect("artifact");

    assert!(create_viewer(&artifact).expect("viewer").is_none());
    assert!(!viewer_path(&artifact).exists());
}

fn touch(path: &Path, modified: SystemTime) {
    write_artifact(path, &[conversation("1", "q", "a")]).expect("artifact");
    File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(modified))
        .expect("set mtime");
}

#[test]
fn latest_artifact_is_chosen_by_modification_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let now = SystemTime::now();
    let older = dir.path().join("results_20991231_235959.csv");
    let newer = dir.path().join("results_20000101_000000.csv");
    touch(&older, now - Duration::from_secs(3_600));
    touch(&newer, now);
    fs::write(dir.path().join("notes.csv"), "id,query\n").expect("unrelated file");

    let chosen = resolve_artifact(None, dir.path()).expect("latest");
    assert_eq!(chosen, newer);
}

#[test]
fn explicit_path_must_exist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("results_missing.csv");
    let error = resolve_artifact(Some(&missing), dir.path()).expect_err("missing artifact");
    assert!(matches!(error, ViewerError::NotFound(_)));
}

#[test]
fn empty_results_dir_has_no_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let error = resolve_artifact(None, dir.path()).expect_err("nothing to view");
    assert!(matches!(error, ViewerError::NoArtifacts(_)));
}
