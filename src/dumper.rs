//! Dumper
//!
//! Drives one dump invocation: a single reverse walk over the record bucket
//! inside one read-only transaction.
//!
//! ## Responsibilities
//! - Open the page file and resolve the record bucket (fatal on failure)
//! - Decode each raw entry into a versioned record (skip damaged ones)
//! - Ask the [`Matcher`] which versions to dump
//! - Decode, re-encode and persist each chosen version (log failures)

use std::ops::ControlFlow;
use std::path::PathBuf;

use crate::bolt::Db;
use crate::codec::{PayloadCodec, Registry};
use crate::config::Config;
use crate::error::{DumpError, Result};
use crate::matcher::{Decision, Matcher, ScanMode};
use crate::mvcc::{decode_record, VersionedRecord};
use crate::sink::FileSink;

/// Counters for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DumpSummary {
    /// Bucket entries visited
    pub scanned: u64,
    /// Entries whose value did not decode as a record
    pub malformed: u64,
    /// Versions selected by the matcher
    pub matched: u64,
    /// Versions selected that are deletions (nothing written)
    pub deleted: u64,
    /// Versions that failed to decode, encode or persist
    pub failed: u64,
    /// Files written, in the order they were written
    pub files: Vec<PathBuf>,
}

impl DumpSummary {
    pub fn emitted(&self) -> usize {
        self.files.len()
    }
}

/// One configured dump
pub struct Dumper<'r> {
    config: Config,
    codec: PayloadCodec<'r>,
    sink: FileSink,
}

impl<'r> Dumper<'r> {
    /// Validate the config and bind the codec to `registry`
    pub fn new(config: Config, registry: &'r Registry) -> Result<Self> {
        config.validate()?;
        let sink = FileSink::new(&config.output_dir);
        Ok(Self {
            config,
            codec: PayloadCodec::new(registry),
            sink,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the scan
    ///
    /// Steps:
    /// 1. Open the file (bounded lock wait) and begin the read transaction
    /// 2. Resolve the record bucket
    /// 3. Walk from the last entry backwards, dumping what the matcher picks
    ///
    /// The file is closed on every exit path when `db` goes out of scope.
    pub fn run(&self) -> Result<DumpSummary> {
        let db = Db::open(&self.config.db_path, self.config.lock_timeout())?;
        let tx = db.begin();
        let bucket = tx.bucket(self.config.bucket.as_bytes())?;

        let mode = if self.config.prefix {
            ScanMode::Prefix
        } else {
            ScanMode::Exact
        };
        let mut matcher = Matcher::new(self.config.key.as_bytes(), mode, self.config.history);
        let mut summary = DumpSummary::default();

        tracing::debug!(txid = tx.id(), ?mode, history = self.config.history, "starting reverse scan");

        let mut cursor = bucket.cursor();
        let mut item = cursor.last()?;
        while let Some((raw_key, raw_value)) = item {
            summary.scanned += 1;
            // Nested buckets carry no value and are not records.
            if let Some(raw_value) = raw_value {
                if self.visit(&raw_key, &raw_value, &mut matcher, &mut summary).is_break() {
                    break;
                }
            }
            item = cursor.prev()?;
        }

        tracing::info!(
            scanned = summary.scanned,
            malformed = summary.malformed,
            matched = summary.matched,
            emitted = summary.emitted(),
            deleted = summary.deleted,
            failed = summary.failed,
            "dump finished"
        );
        Ok(summary)
    }

    fn visit(
        &self,
        raw_key: &[u8],
        raw_value: &[u8],
        matcher: &mut Matcher,
        summary: &mut DumpSummary,
    ) -> ControlFlow<()> {
        let record = match decode_record(raw_key, raw_value) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("failed to unmarshal kv, err: {}", e);
                summary.malformed += 1;
                return ControlFlow::Continue(());
            }
        };

        let decision = matcher.observe(&record.key);
        if decision.should_emit() {
            summary.matched += 1;
            self.emit(&record, summary);
        }
        match decision {
            Decision::EmitAndStop => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }

    fn emit(&self, record: &VersionedRecord, summary: &mut DumpSummary) {
        if record.is_tombstone() {
            tracing::info!(
                key = %record.key_lossy(),
                revision = ?record.revision,
                "key deleted at this revision, nothing to persist"
            );
            summary.deleted += 1;
            return;
        }

        match self.decode_and_persist(record) {
            Ok(path) => summary.files.push(path),
            Err(e) => {
                tracing::error!("{}, try next revision", e);
                summary.failed += 1;
            }
        }
    }

    /// Decode, re-encode and write one version
    pub fn decode_and_persist(&self, record: &VersionedRecord) -> Result<PathBuf> {
        let wrap = |source: DumpError| DumpError::Record {
            key: record.key_lossy(),
            revision: record.mod_revision,
            source: Box::new(source),
        };

        let object = self.codec.decode(&record.payload).map_err(wrap)?;
        tracing::debug!(
            kind = %object.kind(),
            name = object.name().unwrap_or_default(),
            namespace = object.namespace().unwrap_or_default(),
            "decoded object"
        );
        let text = self
            .codec
            .encode(&object, self.config.out_format)
            .map_err(wrap)?;
        self.sink
            .persist(&record.key, &text, record.mod_revision)
            .map_err(wrap)
    }
}
