use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn readium(state_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("readium").unwrap();
    cmd.arg("--state-dir").arg(state_dir);
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn status(state_dir: &Path) -> Value {
    let output = readium(state_dir).arg("status").output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn open(state_dir: &Path, pdf: &Path, pages: u32) -> String {
    let output = readium(state_dir)
        .arg("open")
        .arg(pdf)
        .arg("--pages")
        .arg(pages.to_string())
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

#[test]
fn open_persists_session_between_runs() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state");
    let pdf = dir.path().join("paper.pdf");
    fs::write(&pdf, b"%PDF-1.7").unwrap();

    let id = open(&state, &pdf, 8);
    let report = status(&state);
    assert_eq!(report["activeDocumentId"], id.as_str());
    assert_eq!(report["pageCount"], 8);
    assert_eq!(report["pageOrder"].as_array().unwrap().len(), 8);

    let recent = readium(&state).arg("recent").output().unwrap();
    assert!(String::from_utf8(recent.stdout).unwrap().starts_with("paper.pdf\t"));
}

#[test]
fn applied_commands_survive_restart() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state");
    let script = dir.path().join("commands.json");
    fs::write(
        &script,
        r##"[
            {"type":"openSession","id":"doc-a"},
            {"type":"setNumPages","numPages":5},
            {"type":"initializePageOrder","numPages":5},
            {"type":"addAnnotation","annotation":{"type":"highlight","pageNumber":1,"color":"#ff0"}},
            {"type":"openSession","id":"doc-b"},
            {"type":"addAnnotation","annotation":{"type":"text","pageNumber":1,"color":"#000"}},
            {"type":"closeSession","id":"doc-b"},
            {"type":"removePage","index":2},
            {"type":"reorderPages","order":[1,1,2,4]}
        ]"##,
    )
    .unwrap();

    readium(&state).arg("apply").arg(&script).assert().success();

    let report = status(&state);
    assert_eq!(report["activeDocumentId"], "doc-a");
    assert_eq!(report["annotations"], 1);
    assert_eq!(report["pageOrder"], serde_json::json!([1, 2, 4, 5]));
    assert_eq!(report["canUndo"], true);
}

#[test]
fn export_then_import_into_another_session() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state");
    let first = dir.path().join("first.pdf");
    let second = dir.path().join("second.pdf");
    fs::write(&first, b"%PDF-1.7").unwrap();
    fs::write(&second, b"%PDF-1.7").unwrap();
    let script = dir.path().join("annotate.json");
    fs::write(
        &script,
        r##"[
            {"type":"addAnnotation","annotation":{"type":"comment","pageNumber":2,"color":"#000","content":"check"}},
            {"type":"addBookmark","pageNumber":3,"title":"Results"}
        ]"##,
    )
    .unwrap();
    let export = dir.path().join("notes.json");

    open(&state, &first, 4);
    readium(&state).arg("apply").arg(&script).assert().success();
    readium(&state)
        .arg("export")
        .arg("--output")
        .arg(&export)
        .assert()
        .success();

    open(&state, &second, 4);
    assert_eq!(status(&state)["annotations"], 0);
    readium(&state).arg("import").arg(&export).assert().success();

    let report = status(&state);
    assert_eq!(report["annotations"], 1);
    assert_eq!(report["bookmarks"], 1);
    assert_eq!(report["openDocuments"].as_array().unwrap().len(), 2);
}

#[test]
fn malformed_import_fails_without_changes() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state");
    let pdf = dir.path().join("paper.pdf");
    fs::write(&pdf, b"%PDF-1.7").unwrap();
    let bad = dir.path().join("bad.json");
    fs::write(&bad, "{\"bookmarks\": []}").unwrap();

    open(&state, &pdf, 2);
    readium(&state).arg("import").arg(&bad).assert().failure();
    assert_eq!(status(&state)["annotations"], 0);
}

#[test]
fn switching_to_unknown_session_fails() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state");
    readium(&state).arg("switch").arg("nope").assert().failure();
    readium(&state).arg("close").arg("nope").assert().success();
}
