use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn herald(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_herald"))
        .args(args)
        .env("HOME", home)
        .env("HERALD_SOCKET", home.join("absent.sock"))
        .env_remove("HERALD_SESSION_ID")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run herald")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn list_without_service_shows_local_banners() {
    let home = TempDir::new().unwrap();
    let output = herald(home.path(), &["list", "--json"]);
    assert!(output.status.success());

    let snapshot: Value = serde_json::from_slice(&output.stdout).expect("list --json prints JSON");
    let banners = snapshot["banners"].as_array().unwrap();
    assert_eq!(banners.len(), 1);
    assert_eq!(banners[0]["id"], "herald-socket-missing");
    assert_eq!(banners[0]["type"], "warning");
    assert_eq!(snapshot["loading"], false);
}

#[test]
fn permanent_dismissal_persists_between_runs() {
    let home = TempDir::new().unwrap();

    let output = herald(home.path(), &["dismiss", "herald-socket-missing", "--permanent"]);
    assert!(output.status.success());

    let status = stdout(&herald(home.path(), &["status"]));
    assert!(status.contains("Permanent dismissals: herald-socket-missing"));
    assert!(status.contains("Service: unavailable"));

    let list = herald(home.path(), &["list", "--json"]);
    let snapshot: Value = serde_json::from_slice(&list.stdout).unwrap();
    assert!(snapshot["banners"].as_array().unwrap().is_empty());
    assert_eq!(snapshot["has_dismissed_banners"], true);

    assert!(herald(home.path(), &["undismiss"]).status.success());
    let status = stdout(&herald(home.path(), &["status"]));
    assert!(status.contains("Permanent dismissals: none"));
}

#[test]
fn session_dismissal_requires_a_session() {
    let home = TempDir::new().unwrap();
    let output = herald(home.path(), &["dismiss", "anything"]);
    assert!(!output.status.success());

    let output = Command::new(env!("CARGO_BIN_EXE_herald"))
        .args(["dismiss", "anything"])
        .env("HOME", home.path())
        .env("HERALD_SESSION_ID", "term/1")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(home
        .path()
        .join(".herald/sessions/term_1/dismissed_banners.json")
        .exists());
}

fn herald_in_session(home: &Path, session: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_herald"))
        .args(args)
        .env("HOME", home)
        .env("HERALD_SOCKET", home.join("absent.sock"))
        .env("HERALD_SESSION_ID", session)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run herald")
}

#[test]
fn end_session_forgets_session_dismissals_only() {
    let home = TempDir::new().unwrap();
    let scope = home.path().join(".herald/sessions/tty-4");

    assert!(herald_in_session(home.path(), "tty-4", &["dismiss", "herald-socket-missing"])
        .status
        .success());
    assert!(herald_in_session(home.path(), "tty-4", &["dismiss", "kept", "--permanent"])
        .status
        .success());
    assert!(scope.exists());

    let output = herald_in_session(home.path(), "tty-4", &["end-session"]);
    assert!(output.status.success());
    assert!(!scope.exists());

    let status = stdout(&herald_in_session(home.path(), "tty-4", &["status"]));
    assert!(status.contains("Session dismissals: none"));
    assert!(status.contains("Permanent dismissals: kept"));

    let list = herald_in_session(home.path(), "tty-4", &["list", "--json"]);
    let snapshot: Value = serde_json::from_slice(&list.stdout).unwrap();
    assert_eq!(snapshot["banners"][0]["id"], "herald-socket-missing");
}

#[test]
fn end_session_requires_a_session() {
    let home = TempDir::new().unwrap();
    assert!(!herald(home.path(), &["end-session"]).status.success());
}

#[test]
fn corrupt_config_warning_reaches_the_log() {
    let home = TempDir::new().unwrap();
    let root = home.path().join(".herald");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("config.json"), "{ nope").unwrap();

    let output = herald(home.path(), &["list", "--json"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Ignoring malformed herald config"));
}
