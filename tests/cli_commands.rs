#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

fn config_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.toml");
    (dir, path)
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect()
}

#[test]
fn list_prints_signatures() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("sombra-procs")
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8 stdout");
    assert!(text.contains(
        "example.procedure(required_arg :: ANY, optional_arg = null :: ANY?)"
    ));
    assert!(text.contains("example.write_procedure("));
    assert!(text.contains("example.messages_to_queries (transformation)"));
}

#[test]
fn call_prints_one_json_line_per_record() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("sombra-procs")
        .arg("--config")
        .arg(&config)
        .args(["call", "procedure", "1", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(
        json_lines(&output),
        vec![json!({ "args": [1, 2], "result": "Hello World!" })]
    );
}

#[test]
fn write_procedure_returns_the_created_vertex() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("sombra-procs")
        .arg("--config")
        .arg(&config)
        .args(["call", "write_procedure", "\"x\""])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["result"]["properties"], json!({ "required_arg": "x" }));
    assert!(lines[0]["result"]["vertex"].is_u64());
}

#[test]
fn read_only_config_rejects_writes() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "[host]\nread_only = true\n").expect("write config");

    let output = cargo_bin_cmd!("sombra-procs")
        .arg("--config")
        .arg(&config)
        .args(["call", "write_procedure", "\"x\""])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("ImmutableError"), "stderr: {stderr}");
}

#[test]
fn walk_follows_the_seeded_chain() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("sombra-procs")
        .arg("--config")
        .arg(&config)
        .args(["call", "--vertices", "3", "walk", "{\"vertex\": 0}"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(
        json_lines(&output),
        vec![json!({ "path": { "vertices": [0, 1, 2], "edges": [0, 1] } })]
    );
}

#[test]
fn unknown_procedure_fails_with_a_code() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("sombra-procs")
        .arg("--config")
        .arg(&config)
        .args(["call", "nowhere"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("InvalidArgumentError"), "stderr: {stderr}");
}

#[test]
fn plain_payloads_pass_through() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("sombra-procs")
        .arg("--config")
        .arg(&config)
        .args(["transform", "messages_to_queries", "--message", "t:hello"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&output);
    assert_eq!(lines[0]["parameters"]["payload"], json!("hello"));
    assert_eq!(lines[0]["parameters"]["topic"], json!("t"));
}

#[test]
fn transform_decodes_hex_payloads() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("sombra-procs")
        .arg("--config")
        .arg(&config)
        .args([
            "transform",
            "messages_to_queries",
            "--message",
            "orders:68656c6c6f",
            "--message",
            "orders:6869",
            "--hex",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["parameters"]["payload"], json!("hello"));
    assert_eq!(lines[1]["parameters"]["payload"], json!("hi"));
    assert_eq!(lines[1]["parameters"]["topic"], json!("orders"));
    assert!(lines[0]["query"].as_str().unwrap_or_default().starts_with("CREATE"));
}
