//! Bolt Module
//!
//! Read-only access to bbolt page files, the storage format etcd keeps its
//! key space in.
//!
//! ## Responsibilities
//! - Open a page file with a bounded wait for the advisory lock
//! - Pick the newest valid meta page
//! - Resolve named buckets (including inline buckets)
//! - Walk a bucket's B+tree forwards or backwards with a cursor
//!
//! Nothing in here ever writes to the opened file. [`DbBuilder`] writes brand
//! new single-transaction files and exists for fixtures and benchmarks.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Page 0: meta  │ Page 1: meta  │ Page 2..: freelist/branch/leaf│
//! └──────────────────────────────────────────────────────────────┘
//!
//! Page header (16 bytes)
//!   id: u64 | flags: u16 | count: u16 | overflow: u32
//!
//! Meta (64 bytes, after the page header)
//!   magic: u32 | version: u32 | page_size: u32 | flags: u32
//!   root: u64 | sequence: u64 | freelist: u64 | pgid: u64
//!   txid: u64 | checksum: u64 (FNV-1a over the preceding 56 bytes)
//!
//! Branch element (16 bytes)        Leaf element (16 bytes)
//!   pos: u32 | ksize: u32            flags: u32 | pos: u32
//!   pgid: u64                        ksize: u32 | vsize: u32
//!
//! `pos` is relative to the element's own offset. All integers are
//! little-endian. A page spans (overflow + 1) * page_size bytes.
//! ```

mod builder;
mod bucket;
mod cursor;
mod db;
mod lock;
mod meta;
mod page;

pub use builder::DbBuilder;
pub use bucket::Bucket;
pub use cursor::{Cursor, Item};
pub use db::{Db, Tx};

// =============================================================================
// Shared Constants (used by reader, cursor and builder)
// =============================================================================

/// Page identifier
pub type Pgid = u64;

/// Magic number identifying a bbolt file
pub(crate) const MAGIC: u32 = 0xED0C_DAED;

/// Data file format version
pub(crate) const VERSION: u32 = 2;

/// Page size assumed when meta page 0 cannot be trusted
pub(crate) const DEFAULT_PAGE_SIZE: usize = 4096;

pub(crate) const PAGE_HEADER_SIZE: usize = 16;
pub(crate) const ELEMENT_SIZE: usize = 16;

pub(crate) const BRANCH_PAGE_FLAG: u16 = 0x01;
pub(crate) const LEAF_PAGE_FLAG: u16 = 0x02;
pub(crate) const META_PAGE_FLAG: u16 = 0x04;
pub(crate) const FREELIST_PAGE_FLAG: u16 = 0x10;

/// Leaf element flag marking a nested bucket
pub(crate) const BUCKET_LEAF_FLAG: u32 = 0x01;

/// Bucket value header: root: u64 | sequence: u64
pub(crate) const BUCKET_HEADER_SIZE: usize = 16;

/// 64-bit FNV-1a, the checksum bbolt stores in its meta pages
pub(crate) fn fnv64a(data: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    data.iter()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}
