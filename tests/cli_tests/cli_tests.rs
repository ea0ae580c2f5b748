//! Tests for the etcdxtl binary
//!
//! These tests verify:
//! - Fatal errors exit non-zero and write nothing
//! - A documented invocation succeeds and writes its file
//! - Per-record failures do not change the exit status

#[path = "../common/mod.rs"]
mod common;

use std::process::{Command, Output};

use common::{configmap, Fixture, Write};
use etcdxtl::bolt::DbBuilder;

// =============================================================================
// Helper Functions
// =============================================================================

fn etcdxtl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_etcdxtl"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

fn dump_kv(fixture: &Fixture, extra: &[&str]) -> Output {
    let db_path = fixture.db_path.to_str().unwrap();
    let out_dir = fixture.out_dir.to_str().unwrap();
    let mut args = vec!["dump-kv", "--db-path", db_path, "--output-dir", out_dir];
    args.extend_from_slice(extra);
    etcdxtl(&args)
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn app_config() -> Fixture {
    Fixture::new(&[
        Write::put(10, "/registry/configmaps/default/app-config", configmap("app-config", "1")),
        Write::put(12, "/registry/configmaps/default/app-config", configmap("app-config", "2")),
    ])
}

// =============================================================================
// Exit Status Tests
// =============================================================================

#[test]
fn test_missing_key_exits_non_zero() {
    let fixture = app_config();
    let output = dump_kv(&fixture, &[]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("key must not be empty"), "{}", stderr(&output));
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_missing_db_path_exits_non_zero() {
    let output = etcdxtl(&["dump-kv", "--key", "/registry/configmaps/"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("db-path must not be empty"), "{}", stderr(&output));
}

#[test]
fn test_missing_bucket_exits_non_zero() {
    let mut builder = DbBuilder::new();
    builder.create_bucket(b"meta");
    let fixture = Fixture::from_builder(&builder);

    let output = dump_kv(&fixture, &["--key", "/registry/", "--prefix"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("got nil bucket for key"), "{}", stderr(&output));
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_zero_lock_timeout_exits_non_zero() {
    let fixture = app_config();
    let output = dump_kv(
        &fixture,
        &["--key", "/registry/configmaps/default/app-config", "--lock-timeout-ms", "0"],
    );

    assert!(!output.status.success());
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_unknown_out_format_exits_non_zero() {
    let fixture = app_config();
    let output = dump_kv(
        &fixture,
        &["--key", "/registry/configmaps/default/app-config", "--out", "xml"],
    );

    assert!(!output.status.success());
    assert!(fixture.output_files().is_empty());
}

// =============================================================================
// Success Tests
// =============================================================================

#[test]
fn test_documented_history_example_succeeds() {
    let fixture = app_config();
    let output = dump_kv(
        &fixture,
        &["--key", "/registry/configmaps/default/app-config", "--history"],
    );

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        fixture.output_files(),
        vec![
            "registry-configmaps-default-app-config-10",
            "registry-configmaps-default-app-config-12",
        ]
    );
    assert!(stderr(&output).contains("dump kv with flag: "), "{}", stderr(&output));
}

#[test]
fn test_record_failures_keep_exit_status_zero() {
    let fixture = Fixture::new(&[
        Write::put(3, "/registry/configmaps/default/app-config", b"garbage".to_vec()),
    ]);
    let output = dump_kv(
        &fixture,
        &["--key", "/registry/configmaps/default/", "--prefix", "--out", "json"],
    );

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("try next revision"), "{}", stderr(&output));
    assert!(fixture.output_files().is_empty());
}
