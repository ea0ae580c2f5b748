//! Meta page
//!
//! bbolt keeps two meta pages and alternates between them on commit; the
//! reader trusts the valid one with the higher transaction id.

use crate::error::{DumpError, Result};

use super::page::{le_u32, le_u64};
use super::{fnv64a, Pgid, MAGIC, VERSION};

/// Offset of the checksum inside the meta struct
const CHECKSUM_OFFSET: usize = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Meta {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub flags: u32,
    /// Root page of the top-level bucket
    pub root: Pgid,
    pub sequence: u64,
    pub freelist: Pgid,
    /// High water mark: first page id past the end of the file
    pub pgid: Pgid,
    pub txid: u64,
    pub checksum: u64,
}

impl Meta {
    pub const SIZE: usize = 64;

    /// Decode and validate the meta struct at the start of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let meta = Self {
            magic: le_u32(buf, 0)?,
            version: le_u32(buf, 4)?,
            page_size: le_u32(buf, 8)?,
            flags: le_u32(buf, 12)?,
            root: le_u64(buf, 16)?,
            sequence: le_u64(buf, 24)?,
            freelist: le_u64(buf, 32)?,
            pgid: le_u64(buf, 40)?,
            txid: le_u64(buf, 48)?,
            checksum: le_u64(buf, CHECKSUM_OFFSET)?,
        };

        if meta.magic != MAGIC {
            return Err(DumpError::Corrupt(format!(
                "invalid magic {:#010x}",
                meta.magic
            )));
        }
        if meta.version != VERSION {
            return Err(DumpError::Corrupt(format!(
                "unsupported version {}",
                meta.version
            )));
        }
        let expected = fnv64a(&buf[..CHECKSUM_OFFSET]);
        if meta.checksum != expected {
            return Err(DumpError::Corrupt(format!(
                "meta checksum mismatch: stored {:#018x}, computed {:#018x}",
                meta.checksum, expected
            )));
        }
        if meta.page_size < 512 || !meta.page_size.is_power_of_two() {
            return Err(DumpError::Corrupt(format!(
                "implausible page size {}",
                meta.page_size
            )));
        }
        Ok(meta)
    }

    /// Serialize, recomputing the checksum
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.page_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.flags.to_le_bytes());
        buf[16..24].copy_from_slice(&self.root.to_le_bytes());
        buf[24..32].copy_from_slice(&self.sequence.to_le_bytes());
        buf[32..40].copy_from_slice(&self.freelist.to_le_bytes());
        buf[40..48].copy_from_slice(&self.pgid.to_le_bytes());
        buf[48..56].copy_from_slice(&self.txid.to_le_bytes());
        let checksum = fnv64a(&buf[..CHECKSUM_OFFSET]);
        buf[56..64].copy_from_slice(&checksum.to_le_bytes());
        buf
    }
}
