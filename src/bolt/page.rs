//! Page decoding
//!
//! A page is held as an owned byte buffer covering the page header and all
//! of its overflow pages. Element accessors bounds-check every offset so a
//! damaged file surfaces as [`DumpError::Corrupt`] instead of a panic.

use crate::error::{DumpError, Result};

use super::{
    Pgid, BRANCH_PAGE_FLAG, ELEMENT_SIZE, FREELIST_PAGE_FLAG, LEAF_PAGE_FLAG, META_PAGE_FLAG,
    PAGE_HEADER_SIZE,
};

/// Leaf element: one key/value pair (or nested bucket) on a leaf page
#[derive(Debug, Clone, Copy)]
pub(crate) struct LeafElement<'a> {
    pub flags: u32,
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Branch element: separator key and child page id
#[derive(Debug, Clone, Copy)]
pub(crate) struct BranchElement<'a> {
    pub key: &'a [u8],
    pub pgid: Pgid,
}

#[derive(Debug, Clone)]
pub(crate) struct Page {
    id: Pgid,
    flags: u16,
    count: u16,
    overflow: u32,
    data: Vec<u8>,
}

impl Page {
    /// Parse a page from its raw bytes (header included)
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() < PAGE_HEADER_SIZE {
            return Err(DumpError::Corrupt(format!(
                "page buffer too short: {} bytes",
                data.len()
            )));
        }
        let id = le_u64(&data, 0)?;
        let flags = le_u16(&data, 8)?;
        let count = le_u16(&data, 10)?;
        let overflow = le_u32(&data, 12)?;
        Ok(Self {
            id,
            flags,
            count,
            overflow,
            data,
        })
    }

    pub fn id(&self) -> Pgid {
        self.id
    }

    pub fn overflow(&self) -> u32 {
        self.overflow
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn is_leaf(&self) -> bool {
        self.flags & LEAF_PAGE_FLAG != 0
    }

    pub fn is_branch(&self) -> bool {
        self.flags & BRANCH_PAGE_FLAG != 0
    }

    /// Human-readable page type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self.flags {
            f if f & BRANCH_PAGE_FLAG != 0 => "branch",
            f if f & LEAF_PAGE_FLAG != 0 => "leaf",
            f if f & META_PAGE_FLAG != 0 => "meta",
            f if f & FREELIST_PAGE_FLAG != 0 => "freelist",
            _ => "unknown",
        }
    }

    /// Fail unless this page can appear inside a B+tree
    pub fn ensure_node(&self) -> Result<()> {
        if self.is_leaf() || self.is_branch() {
            Ok(())
        } else {
            Err(DumpError::Corrupt(format!(
                "page {} is a {} page (flags {:#06x}), expected branch or leaf",
                self.id,
                self.type_name(),
                self.flags
            )))
        }
    }

    pub fn leaf_element(&self, index: usize) -> Result<LeafElement<'_>> {
        let offset = self.element_offset(index)?;
        let flags = le_u32(&self.data, offset)?;
        let pos = le_u32(&self.data, offset + 4)? as usize;
        let ksize = le_u32(&self.data, offset + 8)? as usize;
        let vsize = le_u32(&self.data, offset + 12)? as usize;

        let key_start = offset + pos;
        let key = self.slice(key_start, ksize)?;
        let value = self.slice(key_start + ksize, vsize)?;
        Ok(LeafElement { flags, key, value })
    }

    pub fn branch_element(&self, index: usize) -> Result<BranchElement<'_>> {
        let offset = self.element_offset(index)?;
        let pos = le_u32(&self.data, offset)? as usize;
        let ksize = le_u32(&self.data, offset + 4)? as usize;
        let pgid = le_u64(&self.data, offset + 8)?;

        let key = self.slice(offset + pos, ksize)?;
        Ok(BranchElement { key, pgid })
    }

    /// Key of element `index`, whatever the page type
    pub fn key_at(&self, index: usize) -> Result<&[u8]> {
        if self.is_leaf() {
            Ok(self.leaf_element(index)?.key)
        } else {
            Ok(self.branch_element(index)?.key)
        }
    }

    fn element_offset(&self, index: usize) -> Result<usize> {
        if index >= self.count() {
            return Err(DumpError::Corrupt(format!(
                "element {} out of range on page {} ({} elements)",
                index,
                self.id,
                self.count()
            )));
        }
        Ok(PAGE_HEADER_SIZE + index * ELEMENT_SIZE)
    }

    fn slice(&self, start: usize, len: usize) -> Result<&[u8]> {
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| {
                DumpError::Corrupt(format!(
                    "element data [{}, +{}) exceeds page {} ({} bytes)",
                    start,
                    len,
                    self.id,
                    self.data.len()
                ))
            })
    }
}

// =============================================================================
// Little-endian helpers
// =============================================================================

pub(crate) fn le_u16(buf: &[u8], offset: usize) -> Result<u16> {
    fixed::<2>(buf, offset).map(u16::from_le_bytes)
}

pub(crate) fn le_u32(buf: &[u8], offset: usize) -> Result<u32> {
    fixed::<4>(buf, offset).map(u32::from_le_bytes)
}

pub(crate) fn le_u64(buf: &[u8], offset: usize) -> Result<u64> {
    fixed::<8>(buf, offset).map(u64::from_le_bytes)
}

fn fixed<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    buf.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            DumpError::Corrupt(format!(
                "read of {} bytes at offset {} past end of {}-byte buffer",
                N,
                offset,
                buf.len()
            ))
        })
}
