use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "SHELLGATE_LOG_LEVEL",
    "SHELLGATE_LOG_FORMAT",
    "SHELLGATE_DEFAULT_TIMEOUT_MS",
    "SHELLGATE_SHELL_MODE",
    "SHELLGATE_SHELL",
    "SHELLGATE_WATCHDOG_SECS",
    "RUST_LOG",
];

/// Binary pointed at a config with a small, fixed whitelist
fn shellgate(dir: &TempDir) -> Command {
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        r#"
[logging]
level = "warn"

[whitelist]
include_platform_defaults = false

[[whitelist.entries]]
command = "echo"
security_level = "safe"

[[whitelist.entries]]
command = "mkdir"
security_level = "requires_approval"

[[whitelist.entries]]
command = "rm"
security_level = "forbidden"

[[whitelist.entries]]
command = "build"
security_level = "safe"
allowed_args = ["--version"]
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("shellgate").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("shellgate").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shellgate 0.1.0"));
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("shellgate").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Gate command execution behind a whitelist and approval queue",
        ));
}

#[test]
fn test_cli_exec_missing_command() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .arg("exec")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "required arguments were not provided",
        ));
}

#[cfg(unix)]
#[test]
fn test_cli_exec_safe_command() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .args(["exec", "echo", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "ok""#))
        .stdout(predicate::str::contains(r#""stdout": "hello\n""#));
}

#[test]
fn test_cli_exec_unlisted_command() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .args(["exec", "nc", "-l", "4444"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not_whitelisted"))
        .stderr(predicate::str::contains("Command not whitelisted: nc"));
}

#[test]
fn test_cli_exec_forbidden_command() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .args(["exec", "/bin/rm", "-rf", "/tmp/never"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("forbidden"));
}

#[test]
fn test_cli_exec_requires_approval() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("never-created");
    shellgate(&dir)
        .args(["exec", "mkdir"])
        .arg(&target)
        .assert()
        .failure()
        .stdout(predicate::str::contains("pending").not())
        .stderr(predicate::str::contains("Command requires approval: mkdir"))
        .stderr(predicate::str::contains("shellgate serve"));
    assert!(!target.exists());
}

#[test]
fn test_cli_exec_escalated_arguments_are_refused() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .args(["exec", "build", "--bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Command requires approval: build"));
}

#[test]
fn test_cli_ignores_unknown_env_log_level() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .env("SHELLGATE_LOG_LEVEL", "loud")
        .env("SHELLGATE_LOG_FORMAT", "fancy")
        .arg("whitelist")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""command": "echo""#));
}

#[test]
fn test_cli_classify_escalates() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .args(["classify", "build", "--bogus"])
        .assert()
        .success()
        .stdout(predicate::str::contains("requires_approval"));
}

#[test]
fn test_cli_whitelist() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .arg("whitelist")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""command": "mkdir""#))
        .stdout(predicate::str::contains(r#""securityLevel": "forbidden""#));
}

#[test]
fn test_cli_platform() {
    let dir = TempDir::new().unwrap();
    shellgate(&dir)
        .arg("platform")
        .assert()
        .success()
        .stdout(predicate::str::contains("suggestedShells"))
        .stdout(predicate::str::contains("helpMessage"));
}

#[test]
fn test_cli_invalid_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[logging]\nlevel = \"loud\"\n").unwrap();

    let mut cmd = Command::cargo_bin("shellgate").unwrap();
    cmd.env_remove("SHELLGATE_LOG_LEVEL")
        .arg("--config")
        .arg(config)
        .arg("whitelist")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid log level"));
}

#[test]
fn test_cli_serve_json_lines() {
    let dir = TempDir::new().unwrap();
    let input = concat!(
        r#"{"request_id": 1, "op": "execute_command", "command": "mkdir", "args": ["x"]}"#,
        "\n",
        r#"{"request_id": 2, "op": "execute_command", "command": "rm", "args": ["x"]}"#,
        "\n",
        r#"{"request_id": 3, "op": "get_pending_commands"}"#,
        "\n",
    );

    shellgate(&dir)
        .arg("serve")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"pending""#))
        .stdout(predicate::str::contains(r#""kind":"forbidden""#))
        .stdout(predicate::str::contains(r#""request_id":3"#));
}
