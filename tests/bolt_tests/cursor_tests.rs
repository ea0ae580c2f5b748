//! Tests for the bbolt reader
//!
//! These tests verify:
//! - Forward and reverse cursor walks over multi-level trees
//! - Seeking within and past a bucket
//! - Inline buckets and empty buckets
//! - Bucket lookup
//! - Branch pages that point back up the tree are reported as corrupt

use std::fs;
use std::path::Path;
use std::time::Duration;

use etcdxtl::bolt::{Db, DbBuilder};
use etcdxtl::DumpError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn key(i: usize) -> Vec<u8> {
    format!("key{:04}", i).into_bytes()
}

fn value(i: usize) -> Vec<u8> {
    format!("value{}", i).into_bytes()
}

fn write_db(builder: &DbBuilder) -> (TempDir, Db) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    builder.write(&path).unwrap();
    let db = Db::open(&path, Duration::from_secs(1)).unwrap();
    (temp, db)
}

/// Point one child of every branch page back at the page itself
///
/// `pick` chooses the element index from the page's element count.
fn loop_branch_pages(path: &Path, pick: impl Fn(usize) -> usize) {
    const PAGE_SIZE: usize = 4096;
    let mut bytes = fs::read(path).unwrap();
    for id in 3..bytes.len() / PAGE_SIZE {
        let page = &mut bytes[id * PAGE_SIZE..(id + 1) * PAGE_SIZE];
        let flags = u16::from_le_bytes([page[8], page[9]]);
        let count = u16::from_le_bytes([page[10], page[11]]) as usize;
        if flags != 0x01 || count == 0 {
            continue;
        }
        let elem = 16 + pick(count) * 16;
        page[elem + 8..elem + 16].copy_from_slice(&(id as u64).to_le_bytes());
    }
    fs::write(path, bytes).unwrap();
}

fn write_looped(pick: impl Fn(usize) -> usize) -> (TempDir, Db) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    numbered(32, 2).write(&path).unwrap();
    loop_branch_pages(&path, pick);
    let db = Db::open(&path, Duration::from_secs(1)).unwrap();
    (temp, db)
}

fn numbered(count: usize, fanout: usize) -> DbBuilder {
    let mut builder = DbBuilder::new().max_elements_per_page(fanout);
    builder.create_bucket(b"key");
    for i in 0..count {
        builder.put(b"key", &key(i), &value(i));
    }
    builder
}

// =============================================================================
// Walk Tests
// =============================================================================

#[test]
fn test_reverse_walk_visits_every_key_newest_first() {
    // 3 entries per page with 100 keys gives a 5-level tree.
    let (_temp, db) = write_db(&numbered(100, 3));
    let tx = db.begin();
    let bucket = tx.bucket(b"key").unwrap();

    let mut cursor = bucket.cursor();
    let mut seen = Vec::new();
    let mut item = cursor.last().unwrap();
    while let Some((k, v)) = item {
        assert_eq!(v, Some(value(99 - seen.len())));
        seen.push(k);
        item = cursor.prev().unwrap();
    }

    let expected: Vec<Vec<u8>> = (0..100).rev().map(key).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_forward_walk_visits_every_key_in_order() {
    let (_temp, db) = write_db(&numbered(50, 4));
    let tx = db.begin();
    let mut cursor = tx.bucket(b"key").unwrap().cursor();

    let mut seen = Vec::new();
    let mut item = cursor.first().unwrap();
    while let Some((k, _)) = item {
        seen.push(k);
        item = cursor.next().unwrap();
    }

    assert_eq!(seen, (0..50).map(key).collect::<Vec<_>>());
}

#[test]
fn test_walk_stays_exhausted_at_edges() {
    let (_temp, db) = write_db(&numbered(10, 2));
    let tx = db.begin();
    let mut cursor = tx.bucket(b"key").unwrap().cursor();

    assert_eq!(cursor.first().unwrap().map(|(k, _)| k), Some(key(0)));
    assert_eq!(cursor.prev().unwrap(), None);

    assert_eq!(cursor.last().unwrap().map(|(k, _)| k), Some(key(9)));
    assert_eq!(cursor.next().unwrap(), None);
}

#[test]
fn test_direction_change_mid_walk() {
    let (_temp, db) = write_db(&numbered(20, 3));
    let tx = db.begin();
    let mut cursor = tx.bucket(b"key").unwrap().cursor();

    cursor.last().unwrap();
    cursor.prev().unwrap();
    let (k, _) = cursor.prev().unwrap().unwrap();
    assert_eq!(k, key(17));
    let (k, _) = cursor.next().unwrap().unwrap();
    assert_eq!(k, key(18));
}

#[test]
fn test_seek() {
    let (_temp, db) = write_db(&numbered(30, 3));
    let tx = db.begin();
    let mut cursor = tx.bucket(b"key").unwrap().cursor();

    let (k, v) = cursor.seek(&key(12)).unwrap().unwrap();
    assert_eq!(k, key(12));
    assert_eq!(v, Some(value(12)));

    // Between two keys lands on the next one.
    let (k, _) = cursor.seek(b"key0012x").unwrap().unwrap();
    assert_eq!(k, key(13));

    // Before the first key.
    let (k, _) = cursor.seek(b"a").unwrap().unwrap();
    assert_eq!(k, key(0));

    // Past the last key.
    assert_eq!(cursor.seek(b"zzz").unwrap(), None);
}

#[test]
fn test_large_values_span_overflow_pages() {
    let big = vec![0xabu8; 10_000];
    let mut builder = DbBuilder::new();
    builder.put(b"key", b"big", &big);
    builder.put(b"key", b"small", b"x");
    let (_temp, db) = write_db(&builder);

    let tx = db.begin();
    let bucket = tx.bucket(b"key").unwrap();
    assert_eq!(bucket.get(b"big").unwrap(), Some(big));
    assert_eq!(bucket.get(b"small").unwrap(), Some(b"x".to_vec()));
    assert_eq!(bucket.get(b"missing").unwrap(), None);
}

// =============================================================================
// Bucket Tests
// =============================================================================

#[test]
fn test_empty_bucket() {
    let mut builder = DbBuilder::new();
    builder.create_bucket(b"key");
    let (_temp, db) = write_db(&builder);

    let tx = db.begin();
    let mut cursor = tx.bucket(b"key").unwrap().cursor();
    assert_eq!(cursor.last().unwrap(), None);
    assert_eq!(cursor.first().unwrap(), None);
}

#[test]
fn test_inline_bucket() {
    let mut builder = DbBuilder::new();
    builder.inline_bucket(b"meta");
    builder.put(b"meta", b"a", b"1");
    builder.put(b"meta", b"b", b"2");
    let (_temp, db) = write_db(&builder);

    let tx = db.begin();
    let bucket = tx.bucket(b"meta").unwrap();
    assert!(bucket.is_inline());

    let mut cursor = bucket.cursor();
    assert_eq!(
        cursor.last().unwrap(),
        Some((b"b".to_vec(), Some(b"2".to_vec())))
    );
    assert_eq!(
        cursor.prev().unwrap(),
        Some((b"a".to_vec(), Some(b"1".to_vec())))
    );
    assert_eq!(cursor.prev().unwrap(), None);
}

#[test]
fn test_bucket_names_and_missing_bucket() {
    let mut builder = DbBuilder::new();
    builder.create_bucket(b"key");
    builder.create_bucket(b"meta");
    builder.create_bucket(b"lease");
    let (_temp, db) = write_db(&builder);

    let tx = db.begin();
    assert_eq!(
        tx.bucket_names().unwrap(),
        vec![b"key".to_vec(), b"lease".to_vec(), b"meta".to_vec()]
    );

    let err = tx.bucket(b"members").unwrap_err();
    assert!(matches!(err, DumpError::MissingBucket { .. }));
    assert!(err.is_fatal());
    assert!(err.to_string().starts_with("got nil bucket for members"));
}

#[test]
fn test_buckets_show_as_valueless_entries_in_root() {
    let mut builder = DbBuilder::new();
    builder.create_bucket(b"key");
    let (_temp, db) = write_db(&builder);

    let tx = db.begin();
    let mut cursor = tx.root().cursor();
    assert_eq!(cursor.first().unwrap(), Some((b"key".to_vec(), None)));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_self_referencing_branch_is_corrupt_walking_back() {
    let (_temp, db) = write_looped(|count| count - 1);
    let tx = db.begin();
    let mut cursor = tx.bucket(b"key").unwrap().cursor();

    let err = cursor.last().unwrap_err();
    assert!(matches!(err, DumpError::Corrupt(_)), "{}", err);
    assert!(err.to_string().contains("revisited while descending"), "{}", err);
}

#[test]
fn test_self_referencing_branch_is_corrupt_walking_forward() {
    let (_temp, db) = write_looped(|_| 0);
    let tx = db.begin();
    let bucket = tx.bucket(b"key").unwrap();

    assert!(matches!(
        bucket.cursor().first().unwrap_err(),
        DumpError::Corrupt(_)
    ));
    assert!(matches!(
        bucket.cursor().seek(&key(0)).unwrap_err(),
        DumpError::Corrupt(_)
    ));
}
