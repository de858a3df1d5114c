use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp config");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp config");
    file
}

const TWO_POOLS: &str = r#"
[defaults]
retry_attempts = 50
retry_delay_ms = 2
reconnect_attempts = 2
reconnect_delay_ms = 0

[[pools]]
name = "primary"
capacity = 2

[[pools]]
name = "replica"
capacity = 1
retry_delay_ms = 5
"#;

fn respool() -> Command {
    Command::cargo_bin("respool").unwrap()
}

#[test]
fn test_check_prints_resolved_pools() {
    let config = config_file(TWO_POOLS);

    respool()
        .args(["check", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "primary: capacity=2 retry=50x2ms reconnect=2x0ms",
        ))
        .stdout(predicate::str::contains("replica: capacity=1 retry=50x5ms"))
        .stdout(predicate::str::contains("Configuration OK: 2 pool(s)"));
}

#[test]
fn test_check_rejects_duplicate_names() {
    let config = config_file(
        r#"
[[pools]]
name = "db"
capacity = 1

[[pools]]
name = "db"
capacity = 2
"#,
    );

    respool()
        .args(["check", "--config"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("defined more than once"));
}

#[test]
fn test_check_rejects_zero_capacity() {
    let config = config_file(
        r#"
[[pools]]
name = "db"
capacity = 0
"#,
    );

    respool()
        .args(["check", "--config"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("positive capacity"));
}

#[test]
fn test_check_missing_file() {
    respool()
        .args(["check", "--config", "/nonexistent/respool.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid pool configuration"));
}

#[test]
fn test_simulate_text_report() {
    let config = config_file(TWO_POOLS);

    respool()
        .args(["simulate", "--workers", "3", "--iterations", "5", "--hold-ms", "0"])
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Simulated 3 worker(s) x 5 iteration(s) over primary,replica",
        ))
        .stdout(predicate::str::contains("succeeded:           15"))
        .stdout(predicate::str::contains("other errors:        0"))
        .stdout(predicate::str::contains("util"));
}

#[test]
fn test_simulate_json_report() {
    let config = config_file(TWO_POOLS);

    let output = respool()
        .args(["simulate", "--workers", "2", "--iterations", "4", "--json"])
        .args(["--pools", "replica"])
        .arg("--config")
        .arg(config.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["succeeded"], 8);
    assert_eq!(report["pools"], serde_json::json!(["replica"]));

    let stats = report["stats"].as_array().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0]["acquired"], 0);
    assert_eq!(stats[1]["name"], "replica");
    assert_eq!(stats[1]["acquired"], 8);
    assert_eq!(stats[1]["borrowed"], 0);
}

#[test]
fn test_simulate_counts_factory_failures() {
    let config = config_file(
        r#"
[[pools]]
name = "flaky"
capacity = 1
reconnect_attempts = 1
reconnect_delay_ms = 0
"#,
    );

    let output = respool()
        .args(["simulate", "--workers", "1", "--iterations", "4", "--hold-ms", "0"])
        .args(["--fail-every", "1", "--json"])
        .arg("--config")
        .arg(config.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["succeeded"], 0);
    assert_eq!(report["connection_failures"], 4);
    assert_eq!(report["other_errors"], 0);
    assert_eq!(report["stats"][0]["idle"], 1);
}

#[test]
fn test_simulate_unknown_pool() {
    let config = config_file(TWO_POOLS);

    respool()
        .args(["simulate", "--pools", "primary,ghost"])
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("pool 'ghost' is not defined"));
}

#[test]
fn test_invalid_log_level() {
    let config = config_file(TWO_POOLS);

    respool()
        .args(["--log-level", "loud", "check", "--config"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level"));
}
