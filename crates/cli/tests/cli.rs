use assert_cmd::Command;
use predicates::prelude::*;

fn dispatch(store: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("dispatch").expect("binary builds");
    cmd.arg("--store").arg(store);
    cmd
}

fn initiate_request(store: &std::path::Path) -> String {
    let output = dispatch(store)
        .args([
            "--output",
            "json",
            "initiate",
            "technical_service",
            "--client",
            "client-100",
            "--description",
            "no internet since morning",
        ])
        .output()
        .expect("initiate runs");
    assert!(output.status.success(), "initiate failed: {output:?}");
    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json response");
    response["request_id"].as_str().expect("request id").to_string()
}

#[test]
fn definitions_lists_all_workflows() {
    let dir = tempfile::tempdir().unwrap();
    dispatch(&dir.path().join("store.json"))
        .arg("definitions")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("connection_request")
                .and(predicate::str::contains("technical_service"))
                .and(predicate::str::contains("call_center_direct")),
        );
}

#[test]
fn initiate_show_transition_history_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let id = initiate_request(&store);

    dispatch(&store)
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("controller"));

    dispatch(&store)
        .args([
            "transition",
            &id,
            "assign_to_technician",
            "--role",
            "controller",
            "--actor",
            "staff-7",
            "--technician",
            "42",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("technician"));

    dispatch(&store)
        .args(["history", &id])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("create")
                .and(predicate::str::contains("assign_to_technician"))
                .and(predicate::str::contains("2 transitions")),
        );
}

#[test]
fn wrong_role_is_a_friendly_denial() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let id = initiate_request(&store);

    dispatch(&store)
        .args([
            "transition",
            &id,
            "assign_to_technician",
            "--role",
            "manager",
            "--actor",
            "staff-1",
            "--technician",
            "42",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not allowed"));
}

#[test]
fn missing_required_data_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let id = initiate_request(&store);

    dispatch(&store)
        .args([
            "transition",
            &id,
            "assign_to_technician",
            "--role",
            "controller",
            "--actor",
            "staff-7",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("technician_id"));
}

#[test]
fn complete_after_walk_records_rating() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let id = initiate_request(&store);

    dispatch(&store)
        .args([
            "transition",
            &id,
            "assign_to_technician",
            "--role",
            "controller",
            "--actor",
            "staff-7",
            "--technician",
            "42",
        ])
        .assert()
        .success();
    dispatch(&store)
        .args([
            "transition",
            &id,
            "resolve_issue",
            "--role",
            "technician",
            "--actor",
            "staff-42",
        ])
        .assert()
        .success();
    dispatch(&store)
        .args([
            "complete",
            &id,
            "--rating",
            "5",
            "--actor",
            "client-100",
        ])
        .assert()
        .success();

    dispatch(&store)
        .args(["--output", "json", "show", &id])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"completed\"")
                .and(predicate::str::contains("\"completion_rating\": 5")),
        );
}

#[test]
fn recover_force_completes_a_stuck_request() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let id = initiate_request(&store);

    dispatch(&store)
        .args(["recovery-options", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("force_transition"));

    dispatch(&store)
        .args([
            "recover",
            &id,
            "force_complete",
            "--admin",
            "admin-1",
            "--rating",
            "3",
        ])
        .assert()
        .success();

    dispatch(&store)
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn conformance_suite_passes_on_memory_backend() {
    let dir = tempfile::tempdir().unwrap();
    dispatch(&dir.path().join("store.json"))
        .arg("conformance")
        .assert()
        .success()
        .stdout(predicate::str::contains("(0 failed)"));
}

#[test]
fn unknown_workflow_kind_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    dispatch(&dir.path().join("store.json"))
        .args(["initiate", "billing_dispute", "--client", "client-1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown workflow type"));
}
