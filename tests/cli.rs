#![cfg(feature = "cli")]

mod common;

use std::process::Command;

use common::*;

const BIN: &str = env!("CARGO_BIN_EXE_docx-merge");

#[test]
fn list_fields_needs_no_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("letter.docx");
    std::fs::write(&template, Fixture::new(p(&r("Hi {{name}} from {{city}}"))).bytes()).unwrap();

    let out = Command::new(BIN).arg("--list-fields").arg(&template).output().unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "name\ncity\n");
}

#[test]
fn missing_data_file_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("letter.docx");
    std::fs::write(&template, Fixture::new(p(&r("Hi {{name}}"))).bytes()).unwrap();

    let out = Command::new(BIN).arg(&template).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("required"));
    assert!(!dir.path().join("letter_merged.docx").exists());
}

#[test]
fn separate_mode_writes_named_files() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("letter.docx");
    let data = dir.path().join("people.csv");
    std::fs::write(&template, Fixture::new(p(&r("Hi {{name}}"))).bytes()).unwrap();
    std::fs::write(&data, "name\nAda\nada\n").unwrap();

    let out_dir = dir.path().join("out");
    let out = Command::new(BIN)
        .arg(&template)
        .arg(&data)
        .args(["--mode", "separate", "--output"])
        .arg(&out_dir)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out_dir.join("Ada.docx").is_file());
    assert!(out_dir.join("ada_1.docx").is_file());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("2 documents written"));
}
