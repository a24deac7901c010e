//! `spool config-hash` end-to-end through the built binary.
//!
//! Mirrors the teacher CLI's assert_cmd-based integration tests
//! (`mqk-cli/tests/scenario_cli_*`), adapted to a subcommand that needs no
//! daemon or external store: `config-hash` only touches the filesystem, so
//! unlike the teacher's DB-backed scenarios this one never needs a skip
//! guard.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;

fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn prints_config_hash_and_canonical_json() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_fixture(
        &dir,
        "base.yaml",
        r#"
store:
  id: "spool-tracker-main"
  credential_env: "SPOOL_STORE_API_KEY"
locks:
  backend_url: "https://locks.internal/v1"
"#,
    );

    let mut cmd = assert_cmd::Command::cargo_bin("spool").unwrap();
    cmd.arg("config-hash").arg(&base);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("spool-tracker-main"));
}

#[test]
fn same_content_different_key_order_yields_same_hash() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_fixture(
        &dir,
        "a.yaml",
        r#"
store:
  id: "X"
  credential_env: "Y"
locks:
  backend_url: "Z"
"#,
    );
    let b = write_fixture(
        &dir,
        "b.yaml",
        r#"
locks:
  backend_url: "Z"
store:
  credential_env: "Y"
  id: "X"
"#,
    );

    let run = |path: &std::path::Path| -> String {
        let out = assert_cmd::Command::cargo_bin("spool")
            .unwrap()
            .arg("config-hash")
            .arg(path)
            .output()
            .unwrap();
        assert!(out.status.success());
        String::from_utf8(out.stdout).unwrap()
    };

    let hash_line = |s: &str| s.lines().find(|l| l.starts_with("config_hash=")).unwrap().to_string();
    assert_eq!(hash_line(&run(&a)), hash_line(&run(&b)));
}

#[test]
fn missing_config_file_fails_with_nonzero_exit() {
    let mut cmd = assert_cmd::Command::cargo_bin("spool").unwrap();
    cmd.arg("config-hash").arg("/nonexistent/path/does-not-exist.yaml");
    cmd.assert().failure();
}
