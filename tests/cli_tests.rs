//! CLI tests for the `prodyo` binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// `prodyo` running inside `dir` with no `PRODYO_*` overrides leaking in.
fn prodyo(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("prodyo");
    cmd.current_dir(dir.path());
    for key in [
        "PRODYO_HOST",
        "PRODYO_PORT",
        "PRODYO_DB_PATH",
        "PRODYO_SESSION_TTL_HOURS",
        "PRODYO_BCRYPT_COST",
        "PRODYO_LOG_FORMAT",
        "PRODYO_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_prodyo_help() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("init-db"));
    }

    #[test]
    fn test_prodyo_version() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir).arg("deploy").assert().failure();
    }
}

mod config_commands {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 8080"))
            .stdout(predicate::str::contains("prodyo config init"));
    }

    #[test]
    fn test_config_show_applies_env_override() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir)
            .env("PRODYO_PORT", "9191")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 9191"));
    }

    #[test]
    fn test_config_init_then_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created prodyo.toml"));

        let content = fs::read_to_string(dir.path().join("prodyo.toml")).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("[auth]"));

        prodyo(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("prodyo.toml"),
            "[auth]\nsession_ttl_hours = 0\n",
        )
        .unwrap();
        prodyo(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("session_ttl_hours"));
    }

    #[test]
    fn test_config_validate_without_file() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_custom_config_path() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir)
            .args(["--config", "etc/prodyo.toml", "config", "init"])
            .assert()
            .success();
        assert!(dir.path().join("etc/prodyo.toml").exists());
    }

    #[test]
    fn test_malformed_config_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("prodyo.toml"), "[server\nport = ").unwrap();
        prodyo(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse prodyo.toml"));
    }
}

mod init_db {
    use super::*;

    #[test]
    fn test_init_db_creates_file() {
        let dir = TempDir::new().unwrap();
        prodyo(&dir)
            .args(["init-db", "--db-path", "data/prodyo.db"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Database initialized"));
        assert!(dir.path().join("data/prodyo.db").exists());
    }

    #[test]
    fn test_init_db_uses_configured_path() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("prodyo.toml"),
            "[database]\npath = \"store/app.db\"\n",
        )
        .unwrap();
        prodyo(&dir).arg("init-db").assert().success();
        assert!(dir.path().join("store/app.db").exists());
    }
}
