//! Buckets
//!
//! A bucket is a B+tree rooted either at a page of its own or, for small
//! buckets, at a page embedded inline in the parent's leaf value.

use crate::error::{DumpError, Result};

use super::cursor::Cursor;
use super::db::Db;
use super::page::{le_u64, Page};
use super::{Pgid, BUCKET_HEADER_SIZE, BUCKET_LEAF_FLAG};

/// Where a bucket's tree starts
#[derive(Debug, Clone)]
pub(crate) enum Root {
    Page(Pgid),
    Inline(Page),
}

/// A named bucket inside a read-only transaction
#[derive(Debug, Clone)]
pub struct Bucket<'db> {
    db: &'db Db,
    root: Root,
}

impl<'db> Bucket<'db> {
    pub(crate) fn new(db: &'db Db, root: Root) -> Self {
        Self { db, root }
    }

    /// Parse a nested bucket from its leaf value
    fn from_value(db: &'db Db, value: &[u8]) -> Result<Self> {
        let root = le_u64(value, 0)?;
        if root != 0 {
            return Ok(Self::new(db, Root::Page(root)));
        }
        let inline = value.get(BUCKET_HEADER_SIZE..).ok_or_else(|| {
            DumpError::Corrupt("inline bucket value shorter than its header".to_string())
        })?;
        let page = Page::from_bytes(inline.to_vec())?;
        page.ensure_node()?;
        Ok(Self::new(db, Root::Inline(page)))
    }

    /// Whether the bucket is stored inline in its parent
    pub fn is_inline(&self) -> bool {
        matches!(self.root, Root::Inline(_))
    }

    /// Cursor over the bucket's entries
    pub fn cursor(&self) -> Cursor<'db> {
        Cursor::new(self.db, self.root.clone())
    }

    /// Look up a nested bucket by name
    ///
    /// Returns `Ok(None)` if there is no entry with that name, or if the
    /// entry is a plain key/value pair rather than a bucket.
    pub fn bucket(&self, name: &[u8]) -> Result<Option<Bucket<'db>>> {
        let mut cursor = self.cursor();
        match cursor.seek_raw(name)? {
            Some((key, value, flags)) if key == name && flags & BUCKET_LEAF_FLAG != 0 => {
                Ok(Some(Self::from_value(self.db, &value)?))
            }
            _ => Ok(None),
        }
    }

    /// Value stored under `key`, if any
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut cursor = self.cursor();
        match cursor.seek_raw(key)? {
            Some((found, value, flags)) if found == key && flags & BUCKET_LEAF_FLAG == 0 => {
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }
}
