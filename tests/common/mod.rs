//! Shared fixtures for integration tests
//!
//! Builds small etcd-shaped page files: a `key` bucket whose entries are
//! revision keys mapping to `mvccpb.KeyValue` records.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use etcdxtl::bolt::DbBuilder;
use etcdxtl::config::{Config, OutputFormat, DEFAULT_BUCKET};
use etcdxtl::mvcc::{KeyValue, Revision};
use etcdxtl::{DumpSummary, Dumper, Registry};
use prost::Message;
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Records
// =============================================================================

/// One write to put into the fixture
pub struct Write {
    pub revision: Revision,
    pub key: String,
    pub payload: Vec<u8>,
}

impl Write {
    pub fn put(main: i64, key: &str, payload: Vec<u8>) -> Self {
        Self {
            revision: Revision::new(main, 0),
            key: key.to_string(),
            payload,
        }
    }

    pub fn delete(main: i64, key: &str) -> Self {
        Self {
            revision: Revision::tombstone(main, 0),
            key: key.to_string(),
            payload: Vec::new(),
        }
    }

    /// Encoded `KeyValue` for this write
    pub fn record(&self) -> Vec<u8> {
        KeyValue {
            key: self.key.as_bytes().to_vec(),
            create_revision: self.revision.main,
            mod_revision: self.revision.main,
            version: 1,
            value: self.payload.clone(),
            lease: 0,
        }
        .encode_to_vec()
    }
}

/// JSON-encoded ConfigMap named after the last segment of `key`
pub fn configmap(name: &str, value: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "kind": "ConfigMap",
        "apiVersion": "v1",
        "metadata": {"name": name, "namespace": "default"},
        "data": {"value": value},
    }))
    .unwrap()
}

// =============================================================================
// Fixture
// =============================================================================

/// A page file plus an output directory, both removed on drop
pub struct Fixture {
    pub temp: TempDir,
    pub db_path: PathBuf,
    pub out_dir: PathBuf,
}

impl Fixture {
    pub fn new(writes: &[Write]) -> Self {
        let mut builder = DbBuilder::new().max_elements_per_page(4);
        builder.create_bucket(DEFAULT_BUCKET.as_bytes());
        for write in writes {
            builder.put(
                DEFAULT_BUCKET.as_bytes(),
                &write.revision.to_bytes(),
                &write.record(),
            );
        }
        Self::from_builder(&builder)
    }

    pub fn from_builder(builder: &DbBuilder) -> Self {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("db");
        let out_dir = temp.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        builder.write(&db_path).unwrap();
        Self {
            temp,
            db_path,
            out_dir,
        }
    }

    pub fn config(&self, key: &str) -> Config {
        Config::builder()
            .db_path(&self.db_path)
            .key(key)
            .output_dir(&self.out_dir)
            .lock_timeout_ms(500)
            .build()
    }

    pub fn dump(&self, key: &str, prefix: bool, history: bool) -> etcdxtl::Result<DumpSummary> {
        let mut config = self.config(key);
        config.prefix = prefix;
        config.history = history;
        self.run(config)
    }

    pub fn dump_as(&self, key: &str, format: OutputFormat) -> etcdxtl::Result<DumpSummary> {
        let mut config = self.config(key);
        config.out_format = format;
        self.run(config)
    }

    pub fn run(&self, config: Config) -> etcdxtl::Result<DumpSummary> {
        let registry = Registry::with_builtin_kinds();
        Dumper::new(config, &registry)?.run()
    }

    /// Names of the files in the output directory, sorted
    pub fn output_files(&self) -> Vec<String> {
        list_files(&self.out_dir)
    }

    pub fn read_output(&self, name: &str) -> String {
        fs::read_to_string(self.out_dir.join(name)).unwrap()
    }
}

pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
