//! MVCC records
//!
//! etcd stores every write as its own entry in the `key` bucket. The bucket
//! key is the write's revision, the value is an `mvccpb.KeyValue` protobuf:
//!
//! ```text
//! bucket key:   main: u64 (BE) | '_' | sub: u64 (BE) [ | 't' ]
//! bucket value: KeyValue { key=1, create_revision=2, mod_revision=3,
//!                          version=4, value=5, lease=6 }
//! ```
//!
//! Because revisions are big-endian, walking the bucket backwards visits
//! writes newest first, so the first record seen for a logical key is its
//! latest version.

use prost::Message;

use crate::error::{DumpError, Result};

/// Length of a revision bucket key without the tombstone marker
pub const REVISION_KEY_LEN: usize = 17;

const SEPARATOR: u8 = b'_';
const TOMBSTONE_MARKER: u8 = b't';

/// mvccpb.KeyValue as persisted by etcd
#[derive(Clone, PartialEq, Message)]
pub struct KeyValue {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(int64, tag = "2")]
    pub create_revision: i64,
    #[prost(int64, tag = "3")]
    pub mod_revision: i64,
    #[prost(int64, tag = "4")]
    pub version: i64,
    #[prost(bytes = "vec", tag = "5")]
    pub value: Vec<u8>,
    #[prost(int64, tag = "6")]
    pub lease: i64,
}

// =============================================================================
// Revision Keys
// =============================================================================

/// Bucket key of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Revision {
    pub main: i64,
    pub sub: i64,
    /// The write deleted its key
    pub tombstone: bool,
}

impl Revision {
    pub fn new(main: i64, sub: i64) -> Self {
        Self {
            main,
            sub,
            tombstone: false,
        }
    }

    pub fn tombstone(main: i64, sub: i64) -> Self {
        Self {
            main,
            sub,
            tombstone: true,
        }
    }

    /// Encode as a bucket key
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(REVISION_KEY_LEN + 1);
        buf.extend_from_slice(&self.main.to_be_bytes());
        buf.push(SEPARATOR);
        buf.extend_from_slice(&self.sub.to_be_bytes());
        if self.tombstone {
            buf.push(TOMBSTONE_MARKER);
        }
        buf
    }

    /// Parse a bucket key
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let tombstone = match raw.len() {
            REVISION_KEY_LEN => false,
            n if n == REVISION_KEY_LEN + 1 && raw[REVISION_KEY_LEN] == TOMBSTONE_MARKER => true,
            n => {
                return Err(DumpError::MalformedRecord(format!(
                    "revision key of {} bytes",
                    n
                )))
            }
        };
        if raw[8] != SEPARATOR {
            return Err(DumpError::MalformedRecord(format!(
                "revision key separator is {:#04x}",
                raw[8]
            )));
        }
        let main = i64::from_be_bytes(raw[0..8].try_into().unwrap_or_default());
        let sub = i64::from_be_bytes(raw[9..17].try_into().unwrap_or_default());
        Ok(Self {
            main,
            sub,
            tombstone,
        })
    }
}

// =============================================================================
// Versioned Records
// =============================================================================

/// One version of one logical key, as read from the bucket
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord {
    /// Bucket key, if it parsed as a revision
    pub revision: Option<Revision>,
    /// Logical key, e.g. `/registry/configmaps/default/app`
    pub key: Vec<u8>,
    /// Serialized object
    pub payload: Vec<u8>,
    pub create_revision: i64,
    /// Globally monotonic; larger is later regardless of key
    pub mod_revision: i64,
    pub version: i64,
    pub lease: i64,
}

impl VersionedRecord {
    /// Whether this version records a deletion
    pub fn is_tombstone(&self) -> bool {
        self.revision.is_some_and(|r| r.tombstone)
    }

    /// Key rendered for logs and file names
    pub fn key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// Decode one raw cursor entry
///
/// A bucket key that is not a revision is tolerated (logged at debug) since
/// only the value carries what the dump needs. A value that does not decode
/// as `KeyValue` is a [`DumpError::MalformedRecord`].
pub fn decode_record(raw_key: &[u8], raw_value: &[u8]) -> Result<VersionedRecord> {
    let kv = KeyValue::decode(raw_value).map_err(|e| {
        DumpError::MalformedRecord(format!(
            "failed to unmarshal kv ({} bytes): {}",
            raw_value.len(),
            e
        ))
    })?;

    let revision = match Revision::from_bytes(raw_key) {
        Ok(rev) => Some(rev),
        Err(e) => {
            tracing::debug!(error = %e, "bucket key is not a revision");
            None
        }
    };

    if kv.key.is_empty() {
        return Err(DumpError::MalformedRecord(format!(
            "kv at {:?} has an empty key",
            revision
        )));
    }

    Ok(VersionedRecord {
        revision,
        key: kv.key,
        payload: kv.value,
        create_revision: kv.create_revision,
        mod_revision: kv.mod_revision,
        version: kv.version,
        lease: kv.lease,
    })
}
