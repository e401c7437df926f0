// Process-level behaviour of the binary: exit statuses on help and on
// startup failures.

use std::process::{Command, Output};

const CREDENTIAL_VARS: [&str; 6] = [
    "EDGEGRID_HOST",
    "EDGEGRID_CLIENT_TOKEN",
    "EDGEGRID_CLIENT_SECRET",
    "EDGEGRID_ACCESS_TOKEN",
    "EDGEGRID_ACCOUNT_KEY",
    "EDGEGRID_MAX_BODY",
];

fn run(args: &[&str]) -> Output {
    let workdir = tempfile::tempdir().unwrap();
    let missing = workdir.path().join("absent.edgerc");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_edgegrid-proxy"));
    cmd.current_dir(workdir.path())
        .arg("--file")
        .arg(&missing)
        .args(args);
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    // startup errors are reported through the error log
    cmd.env_remove("RUST_LOG");
    cmd.output().unwrap()
}

#[test]
fn test_help_exits_zero() {
    let output = run(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--tls-crt"));
}

#[test]
fn test_incomplete_credentials_exit_nonzero() {
    let output = run(&["--host", "akab-host.luna.akamaiapis.net", "--addr", "127.0.0.1:0"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("incomplete credentials"), "stderr: {stderr}");
}

#[test]
fn test_bad_tls_material_exit_nonzero() {
    let output = run(&[
        "--addr",
        "127.0.0.1:0",
        "--host",
        "akab-host.luna.akamaiapis.net",
        "--client-token",
        "ct",
        "--client-secret",
        "cs",
        "--access-token",
        "at",
        "--tls-crt",
        "/nonexistent/cert.pem",
        "--tls-key",
        "/nonexistent/key.pem",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to start listener"), "stderr: {stderr}");
}

#[test]
fn test_secrets_not_logged() {
    let output = run(&[
        "--addr",
        "127.0.0.1:0",
        "--host",
        "akab-host.luna.akamaiapis.net",
        "--client-token",
        "akab-very-identifiable-client-token",
        "--client-secret",
        "do-not-print-this-secret",
        "--access-token",
        "akab-do-not-print-access",
        "--tls-crt",
        "/nonexistent/cert.pem",
        "--tls-key",
        "/nonexistent/key.pem",
    ]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("do-not-print-this-secret"));
    assert!(!stderr.contains("akab-do-not-print-access"));
    assert!(!stderr.contains("akab-very-identifiable-client-token"));
}

#[test]
fn test_usage_error_exits_two() {
    let output = run(&["--definitely-not-a-flag"]);
    assert_eq!(output.status.code(), Some(2));
}
