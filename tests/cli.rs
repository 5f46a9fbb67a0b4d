//! Command line tests for the funban binary.
//!
//! Only commands that need no server are exercised here; the network paths
//! are covered by the api and session tests.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// funban with an isolated credential directory and no inherited overrides.
fn funban(state_dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("funban");
    cmd.env("FUNBAN_STATE_DIR", state_dir.path())
        .env_remove("FUNBAN_API_URL")
        .env_remove("FUNBAN_WS_URL")
        .env_remove("FUNBAN_LOG")
        .env_remove("FUNBAN_PASSWORD");
    cmd
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_funban_help() {
        let dir = TempDir::new().unwrap();
        funban(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("kanban"))
            .stdout(predicate::str::contains("login"))
            .stdout(predicate::str::contains("history"));
    }

    #[test]
    fn test_funban_version() {
        let dir = TempDir::new().unwrap();
        funban(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("funban"));
    }

    #[test]
    fn test_note_help_lists_subcommands() {
        let dir = TempDir::new().unwrap();
        funban(&dir)
            .args(["note", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("before"))
            .stdout(predicate::str::contains("clone"));
    }

    #[test]
    fn test_invalid_state_is_rejected() {
        let dir = TempDir::new().unwrap();
        funban(&dir)
            .args(["note", "last", "3", "someday"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Config
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("funban.toml");

        funban(&dir)
            .args(["config", "init", "--path"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("api_url"));
        assert!(content.contains("[sync]"));
    }

    #[test]
    fn test_config_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("funban.toml");
        fs::write(&path, "[server]\napi_url = \"http://example.test\"\n").unwrap();

        funban(&dir)
            .args(["config", "init", "--path"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("http://example.test"));
    }

    #[test]
    fn test_config_show_uses_file_and_flags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("funban.toml");
        fs::write(
            &path,
            "[server]\napi_url = \"http://board.test\"\n\n[sync]\nreconnect_delay_ms = 250\n",
        )
        .unwrap();

        funban(&dir)
            .arg("--config")
            .arg(&path)
            .args(["--ws-url", "wss://board.test/ws", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("http://board.test"))
            .stdout(predicate::str::contains("wss://board.test/ws"))
            .stdout(predicate::str::contains("reconnect_delay_ms = 250"))
            .stdout(predicate::str::contains("not signed in"));
    }

    #[test]
    fn test_config_show_rejects_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("funban.toml");
        fs::write(&path, "[server\n").unwrap();

        funban(&dir)
            .arg("--config")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Credentials
// =============================================================================

mod credentials {
    use super::*;

    fn write_config(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("funban.toml");
        fs::write(&path, "[server]\napi_url = \"http://127.0.0.1:9\"\n").unwrap();
        path
    }

    #[test]
    fn test_logout_without_session() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        funban(&dir)
            .arg("--config")
            .arg(&config)
            .arg("logout")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not signed in."));
    }

    #[test]
    fn test_logout_removes_stored_token() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        let session = dir.path().join("session.json");
        fs::write(&session, r#"{"token": "abc", "email": "ann@example.com"}"#).unwrap();

        funban(&dir)
            .arg("--config")
            .arg(&config)
            .arg("logout")
            .assert()
            .success()
            .stdout(predicate::str::contains("Signed out."));

        assert!(!session.exists());
    }

    #[test]
    fn test_history_requires_login() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        funban(&dir)
            .arg("--config")
            .arg(&config)
            .args(["history", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("funban login"));
    }
}
