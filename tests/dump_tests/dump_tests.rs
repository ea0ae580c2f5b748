//! Tests for the dump-kv scan
//!
//! These tests verify:
//! - Exact and prefix matching, with and without history
//! - Early termination of exact scans
//! - Fatal errors leave no output behind
//! - Damaged records and undecodable payloads do not abort the scan
//! - Deletions, output formats and reruns

#[path = "../common/mod.rs"]
mod common;

use common::{configmap, Fixture, Write};
use etcdxtl::bolt::DbBuilder;
use etcdxtl::config::OutputFormat;
use etcdxtl::mvcc::Revision;
use etcdxtl::{Config, DumpError, Dumper, Registry};

// =============================================================================
// Helper Functions
// =============================================================================

/// /a/x written at 3 and 5, /a/y at 4
fn three_writes() -> Fixture {
    Fixture::new(&[
        Write::put(3, "/a/x", configmap("x", "old")),
        Write::put(4, "/a/y", configmap("y", "only")),
        Write::put(5, "/a/x", configmap("x", "new")),
    ])
}

// =============================================================================
// Matching Tests
// =============================================================================

#[test]
fn test_exact_latest_only() {
    let fixture = three_writes();
    let summary = fixture.dump("/a/x", false, false).unwrap();

    assert_eq!(fixture.output_files(), vec!["a-x-5"]);
    assert!(fixture.read_output("a-x-5").contains("value: new"));
    // The newest entry matches, so nothing older is visited.
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.matched, 1);
}

#[test]
fn test_exact_with_history() {
    let fixture = three_writes();
    let summary = fixture.dump("/a/x", false, true).unwrap();

    assert_eq!(fixture.output_files(), vec!["a-x-3", "a-x-5"]);
    assert!(fixture.read_output("a-x-3").contains("value: old"));
    assert_eq!(summary.scanned, 3);
    assert_eq!(
        summary.files,
        vec![fixture.out_dir.join("a-x-5"), fixture.out_dir.join("a-x-3")]
    );
}

#[test]
fn test_prefix_latest_per_key() {
    let fixture = three_writes();
    let summary = fixture.dump("/a", true, false).unwrap();

    assert_eq!(fixture.output_files(), vec!["a-x-5", "a-y-4"]);
    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.emitted(), 2);
}

#[test]
fn test_prefix_with_history() {
    let fixture = three_writes();
    fixture.dump("/a/", true, true).unwrap();

    assert_eq!(fixture.output_files(), vec!["a-x-3", "a-x-5", "a-y-4"]);
}

#[test]
fn test_exact_does_not_match_prefix() {
    let fixture = three_writes();
    let summary = fixture.dump("/a", false, true).unwrap();

    assert!(fixture.output_files().is_empty());
    assert_eq!(summary.matched, 0);
    assert_eq!(summary.scanned, 3);
}

#[test]
fn test_absent_key_writes_nothing() {
    let fixture = three_writes();
    let summary = fixture.dump("/b", true, false).unwrap();

    assert!(fixture.output_files().is_empty());
    assert_eq!(summary.emitted(), 0);
}

#[test]
fn test_empty_bucket() {
    let fixture = Fixture::new(&[]);
    let summary = fixture.dump("/a", true, true).unwrap();
    assert_eq!(summary.scanned, 0);
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_latest_version_is_the_larger_revision_across_a_deep_tree() {
    // Interleave 40 keys over 200 revisions; the fixture caps pages at
    // 4 entries so the walk crosses many leaves.
    let writes: Vec<Write> = (1..=200)
        .map(|rev| {
            let key = format!("/registry/configmaps/default/cm{}", rev % 40);
            Write::put(rev, &key, configmap("cm", &rev.to_string()))
        })
        .collect();
    let fixture = Fixture::new(&writes);

    fixture
        .dump("/registry/configmaps/default/", true, false)
        .unwrap();

    let files = fixture.output_files();
    assert_eq!(files.len(), 40);
    assert!(files.contains(&"registry-configmaps-default-cm0-200".to_string()));
    assert!(files.contains(&"registry-configmaps-default-cm1-161".to_string()));
    assert!(fixture
        .read_output("registry-configmaps-default-cm1-161")
        .contains("161"));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_missing_bucket_is_fatal_and_writes_nothing() {
    let mut builder = DbBuilder::new();
    builder.create_bucket(b"meta");
    let fixture = Fixture::from_builder(&builder);

    let err = fixture.dump("/a", true, true).unwrap_err();
    assert!(matches!(err, DumpError::MissingBucket { .. }));
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_unopenable_file_is_fatal() {
    let fixture = three_writes();
    let mut config = fixture.config("/a/x");
    config.db_path = fixture.temp.path().join("absent");

    let err = fixture.run(config).unwrap_err();
    assert!(matches!(err, DumpError::Open { .. }));
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_invalid_config_is_rejected_before_opening() {
    let registry = Registry::new();
    let err = Dumper::new(Config::default(), &registry).err().unwrap();
    assert!(matches!(err, DumpError::Config(_)));
}

#[test]
fn test_damaged_record_is_skipped() {
    let mut builder = DbBuilder::new().max_elements_per_page(4);
    for write in [
        Write::put(3, "/a/x", configmap("x", "old")),
        Write::put(5, "/a/x", configmap("x", "new")),
    ] {
        builder.put(b"key", &write.revision.to_bytes(), &write.record());
    }
    // Newest entry is not a KeyValue at all.
    builder.put(b"key", &Revision::new(6, 0).to_bytes(), &[0xff, 0xff, 0xff]);
    let fixture = Fixture::from_builder(&builder);

    let summary = fixture.dump("/a/x", false, false).unwrap();
    assert_eq!(summary.malformed, 1);
    assert_eq!(fixture.output_files(), vec!["a-x-5"]);
}

#[test]
fn test_undecodable_payload_is_logged_and_scan_continues() {
    let fixture = Fixture::new(&[
        Write::put(3, "/a/x", configmap("x", "old")),
        Write::put(4, "/a/y", b"\x00\x01not an object".to_vec()),
        Write::put(5, "/a/x", configmap("x", "new")),
    ]);

    let summary = fixture.dump("/a", true, false).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(fixture.output_files(), vec!["a-x-5"]);
}

#[test]
fn test_exact_scan_stops_even_when_the_latest_version_fails() {
    let fixture = Fixture::new(&[
        Write::put(3, "/a/x", configmap("x", "old")),
        Write::put(5, "/a/x", b"garbage".to_vec()),
    ]);

    let summary = fixture.dump("/a/x", false, false).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.scanned, 1);
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_strict_encode_failure_is_per_record() {
    let bogus = serde_json::to_vec(&serde_json::json!({
        "kind": "ConfigMap",
        "apiVersion": "v1",
        "metadata": {"name": "x"},
        "unexpected": 1,
    }))
    .unwrap();
    let fixture = Fixture::new(&[
        Write::put(3, "/a/x", configmap("x", "old")),
        Write::put(5, "/a/x", bogus),
    ]);

    let summary = fixture.dump("/a/x", false, true).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(fixture.output_files(), vec!["a-x-3"]);
}

#[test]
fn test_missing_output_directory_fails_each_record() {
    let fixture = three_writes();
    let mut config = fixture.config("/a");
    config.prefix = true;
    config.output_dir = fixture.temp.path().join("absent");

    let summary = fixture.run(config).unwrap();
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.emitted(), 0);
}

// =============================================================================
// Deletion Tests
// =============================================================================

#[test]
fn test_deleted_key_writes_nothing_for_latest() {
    let fixture = Fixture::new(&[
        Write::put(3, "/a/x", configmap("x", "old")),
        Write::delete(4, "/a/x"),
    ]);

    let summary = fixture.dump("/a/x", false, false).unwrap();
    assert_eq!(summary.deleted, 1);
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_deleted_key_history_keeps_older_versions() {
    let fixture = Fixture::new(&[
        Write::put(3, "/a/x", configmap("x", "old")),
        Write::delete(4, "/a/x"),
        Write::put(6, "/a/y", configmap("y", "y")),
    ]);

    let summary = fixture.dump("/a/", true, true).unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(fixture.output_files(), vec!["a-x-3", "a-y-6"]);
}

// =============================================================================
// Output Tests
// =============================================================================

#[test]
fn test_yaml_output() {
    let fixture = three_writes();
    fixture.dump_as("/a/y", OutputFormat::Yaml).unwrap();

    let text = fixture.read_output("a-y-4");
    assert!(text.starts_with("kind: ConfigMap\napiVersion: v1\n"), "{}", text);
    assert!(text.contains("metadata:\n  name: y\n  namespace: default\n"));
}

#[test]
fn test_json_output() {
    let fixture = three_writes();
    fixture.dump_as("/a/y", OutputFormat::Json).unwrap();

    let text = fixture.read_output("a-y-4");
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["kind"], "ConfigMap");
    assert_eq!(value["data"]["value"], "only");
    assert!(text.ends_with('\n'));
}

#[test]
fn test_rerun_overwrites_with_identical_output() {
    let fixture = three_writes();
    fixture.dump("/a", true, true).unwrap();
    let first: Vec<String> = fixture
        .output_files()
        .iter()
        .map(|name| fixture.read_output(name))
        .collect();

    fixture.dump("/a", true, true).unwrap();
    let second: Vec<String> = fixture
        .output_files()
        .iter()
        .map(|name| fixture.read_output(name))
        .collect();

    assert_eq!(first, second);
    assert_eq!(fixture.output_files().len(), 3);
}

#[test]
fn test_same_key_in_two_formats_overwrites() {
    let fixture = three_writes();
    fixture.dump_as("/a/x", OutputFormat::Yaml).unwrap();
    fixture.dump_as("/a/x", OutputFormat::Json).unwrap();

    assert_eq!(fixture.output_files(), vec!["a-x-5"]);
    assert!(fixture.read_output("a-x-5").starts_with('{'));
}

#[test]
fn test_dump_does_not_modify_the_page_file() {
    let fixture = three_writes();
    let before = std::fs::read(&fixture.db_path).unwrap();
    fixture.dump("/a", true, true).unwrap();
    assert_eq!(std::fs::read(&fixture.db_path).unwrap(), before);
}

// =============================================================================
// Kind Coverage Tests
// =============================================================================

#[test]
fn test_unregistered_kind_is_skipped_next_to_registered_ones() {
    let pod = serde_json::to_vec(&serde_json::json!({
        "kind": "Pod",
        "apiVersion": "v1",
        "metadata": {"name": "web", "namespace": "default"},
    }))
    .unwrap();
    let fixture = Fixture::new(&[
        Write::put(10, "/registry/configmaps/default/app-config", configmap("app-config", "1")),
        Write::put(11, "/registry/pods/default/web", pod),
    ]);

    let summary = fixture.dump("/registry/", true, false).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(
        fixture.output_files(),
        vec!["registry-configmaps-default-app-config-10"]
    );
}
