// CLI behaviour of the process-engine binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const EXPENSE_DEFINITION: &str = r#"{
  "nodes": [
    {"id": "start", "kind": "start", "label": "Start", "sort": 1},
    {"id": "submit", "kind": "userTask", "label": "Submit", "sort": "2",
     "assignment": {"method": "person", "value": [1]}},
    {"id": "gw", "clazz": "exclusiveGateway", "label": "Amount", "sort": 3, "isHideNode": true},
    {"id": "manager", "kind": "userTask", "label": "Manager", "sort": 4,
     "assignment": {"method": "role", "value": [10]}},
    {"id": "clerk", "kind": "userTask", "label": "Clerk", "sort": 4},
    {"id": "end", "kind": "end", "label": "Done", "sort": 5}
  ],
  "edges": [
    {"id": "e0", "source": "start", "target": "submit", "sort": 1},
    {"id": "e1", "source": "submit", "target": "gw", "sort": 1},
    {"id": "e2", "source": "gw", "target": "manager", "sort": 1, "conditionExpression": "{{amount}} &gt; 100"},
    {"id": "e3", "source": "gw", "target": "clerk", "sort": 2, "conditionExpression": "{{amount}} &lt;= 100"},
    {"id": "e4", "source": "manager", "target": "end", "sort": 1},
    {"id": "e5", "source": "clerk", "target": "end", "sort": 1}
  ]
}"#;

fn write_definition(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("definition.json");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

fn engine_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("process-engine").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_validate_reports_shape() {
    let (dir, path) = write_definition(EXPENSE_DEFINITION);

    engine_cmd(&dir)
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Definition is valid"))
        .stdout(predicate::str::contains("Nodes: 6"))
        .stdout(predicate::str::contains("Edges: 6"))
        .stdout(predicate::str::contains("Paths: 2"));
}

#[test]
fn test_validate_rejects_dangling_edge() {
    let (dir, path) = write_definition(
        r#"{"nodes": [{"id": "start", "kind": "start"}],
            "edges": [{"id": "e1", "source": "start", "target": "ghost"}]}"#,
    );

    engine_cmd(&dir)
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_validate_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    engine_cmd(&dir)
        .args(["validate", "nowhere.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read definition"));
}

#[test]
fn test_paths_lists_every_branch() {
    let (dir, path) = write_definition(EXPENSE_DEFINITION);

    engine_cmd(&dir)
        .arg("paths")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("start -> submit -> gw -> manager -> end"))
        .stdout(predicate::str::contains("start -> submit -> gw -> clerk -> end"))
        .stdout(predicate::str::contains("2 path(s)"));
}

#[test]
fn test_chain_marks_positions() {
    let (dir, path) = write_definition(EXPENSE_DEFINITION);

    engine_cmd(&dir)
        .arg("chain")
        .arg(&path)
        .args(["--current", "manager"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x]   2 submit Submit (obligatory)"))
        .stdout(predicate::str::contains("[>]   4 manager Manager"))
        .stdout(predicate::str::contains("[ ]   5 end Done (obligatory)"))
        .stdout(predicate::str::contains("gw").not());
}

#[test]
fn test_chain_json_output() {
    let (dir, path) = write_definition(EXPENSE_DEFINITION);

    let output = engine_cmd(&dir)
        .arg("chain")
        .arg(&path)
        .args(["--current", "clerk", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let chain: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let nodes = chain.as_array().unwrap();
    assert_eq!(nodes.len(), 5);
    assert_eq!(nodes[3]["id"], "clerk");
    assert_eq!(nodes[3]["status"], "Current");
    assert_eq!(nodes[3]["nodeKind"], "userTask");
}

#[test]
fn test_chain_unknown_current_node() {
    let (dir, path) = write_definition(EXPENSE_DEFINITION);

    engine_cmd(&dir)
        .arg("chain")
        .arg(&path)
        .args(["--current", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_eval_guard_markup() {
    let dir = tempfile::tempdir().unwrap();

    engine_cmd(&dir)
        .args(["eval", "{{amount}} &gt; 100 && approved", "--var", "amount=250", "--var", "approved=true"])
        .assert()
        .success()
        .stdout(predicate::str::diff("true\n"));

    engine_cmd(&dir)
        .args(["eval", "dept == 'sales'", "--var", "dept=finance"])
        .assert()
        .success()
        .stdout(predicate::str::diff("false\n"));
}

#[test]
fn test_eval_reports_unknown_variable() {
    let dir = tempfile::tempdir().unwrap();

    engine_cmd(&dir)
        .args(["eval", "{{amount}} > 1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("amount > 1"))
        .stderr(predicate::str::contains("unknown variable"));
}

#[test]
fn test_eval_rejects_malformed_binding() {
    let dir = tempfile::tempdir().unwrap();

    engine_cmd(&dir)
        .args(["eval", "true", "--var", "oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=VALUE"));
}

#[test]
fn test_paths_reports_cycle() {
    let (dir, path) = write_definition(
        r#"{"nodes": [{"id": "s", "kind": "start"}, {"id": "a", "kind": "userTask"}],
            "edges": [{"id": "e1", "source": "s", "target": "a"}, {"id": "e2", "source": "a", "target": "s"}]}"#,
    );

    engine_cmd(&dir)
        .arg("paths")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle detected"));
}

#[test]
fn test_config_file_switches_to_json_logs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("process-engine.toml"),
        "[observability]\njson_logs = true\n",
    )
    .unwrap();

    engine_cmd(&dir)
        .args(["eval", "missing == 1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"level\":\"ERROR\""))
        .stderr(predicate::str::contains("Guard evaluation failed"));
}
