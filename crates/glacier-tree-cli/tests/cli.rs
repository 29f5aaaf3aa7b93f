use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn glacier_tree() -> Command {
    let mut cmd = Command::cargo_bin("glacier-tree").unwrap();
    cmd.env_remove("GLACIER_TREE_CONFIG").env_remove("RUST_LOG");
    cmd
}

const SCENARIO: &str = r#"
[config]
single_root = true

[[step]]
op = "create_root"
name = "world"

[[step]]
op = "watch"
label = "all"
view = "all"

[[step]]
op = "add_child"
parent = "world"
name = "level"

[[step]]
op = "create_root"
name = "second"

[[step]]
op = "reparent"
node = "world"
to = "level"
"#;

#[test]
fn run_prints_steps_and_tree() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("scenario.toml");
    fs::write(&file, SCENARIO).unwrap();

    glacier_tree()
        .arg("run")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("[3] add_child level under world ... accepted"))
        .stdout(predicate::str::contains("all: +level"))
        .stdout(predicate::str::contains("rejected: tree allows a single root"))
        .stdout(predicate::str::contains("rejected: target is a descendant of the node"))
        .stdout(predicate::str::contains("world (root)"))
        .stdout(predicate::str::contains("level (leaf)"));
}

#[test]
fn run_strict_fails_on_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("scenario.toml");
    fs::write(&file, SCENARIO).unwrap();

    glacier_tree()
        .args(["run", "--strict"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 step(s) rejected"));
}

#[test]
fn run_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("scenario.toml");
    fs::write(&file, SCENARIO).unwrap();

    let output = glacier_tree()
        .args(["--format", "json", "run"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["steps"].as_array().unwrap().len(), 5);
    assert_eq!(report["steps"][3]["outcome"]["status"], "rejected");
    assert_eq!(report["tree"][0]["name"], "world");
}

#[test]
fn run_unknown_node_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("scenario.toml");
    fs::write(
        &file,
        "[[step]]\nop = \"delete\"\nnode = \"ghost\"\n",
    )
    .unwrap();

    glacier_tree()
        .arg("run")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown node 'ghost'"));
}

#[test]
fn config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.toml");

    glacier_tree()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    glacier_tree()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    glacier_tree()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("single_root = false"));
}

#[test]
fn completions_generate() {
    glacier_tree()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("glacier-tree"));
}
