//! Page file builder
//!
//! Writes a fresh bbolt file in a single pass, as if one transaction had
//! created every bucket and key. Used to produce fixtures for tests and
//! benchmarks; it never touches an existing file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{DumpError, Result};

use super::meta::Meta;
use super::{
    Pgid, BRANCH_PAGE_FLAG, BUCKET_LEAF_FLAG, DEFAULT_PAGE_SIZE, ELEMENT_SIZE, FREELIST_PAGE_FLAG,
    LEAF_PAGE_FLAG, MAGIC, META_PAGE_FLAG, PAGE_HEADER_SIZE, VERSION,
};

/// First page id available for data (0, 1 = meta, 2 = freelist)
const FIRST_DATA_PAGE: Pgid = 3;
const FREELIST_PAGE: Pgid = 2;

#[derive(Debug, Default)]
struct BucketSpec {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    inline: bool,
}

/// Builder for bbolt files with top-level buckets of plain key/value pairs
#[derive(Debug)]
pub struct DbBuilder {
    page_size: usize,
    max_elements_per_page: usize,
    buckets: BTreeMap<Vec<u8>, BucketSpec>,
}

impl Default for DbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DbBuilder {
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_elements_per_page: 64,
            buckets: BTreeMap::new(),
        }
    }

    /// Page size of the written file (power of two, at least 512)
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Cap on elements per branch/leaf page; small values force deep trees
    pub fn max_elements_per_page(mut self, count: usize) -> Self {
        self.max_elements_per_page = count.max(2);
        self
    }

    /// Create an empty bucket (no-op if it exists)
    pub fn create_bucket(&mut self, name: &[u8]) -> &mut Self {
        self.buckets.entry(name.to_vec()).or_default();
        self
    }

    /// Store the bucket inline in the root leaf instead of on its own pages
    pub fn inline_bucket(&mut self, name: &[u8]) -> &mut Self {
        self.buckets.entry(name.to_vec()).or_default().inline = true;
        self
    }

    /// Insert a key/value pair into `bucket`, creating the bucket if needed
    pub fn put(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> &mut Self {
        self.buckets
            .entry(bucket.to_vec())
            .or_default()
            .entries
            .insert(key.to_vec(), value.to_vec());
        self
    }

    /// Write the file, replacing anything at `path`
    pub fn write(&self, path: &Path) -> Result<()> {
        if self.page_size < 512 || !self.page_size.is_power_of_two() {
            return Err(DumpError::Config(format!(
                "invalid page size {}",
                self.page_size
            )));
        }

        let mut pages = PageAllocator::new(self.page_size);

        // Named buckets first: their root ids go into the root leaf values.
        let mut root_elements = Vec::with_capacity(self.buckets.len());
        for (name, spec) in &self.buckets {
            let elements: Vec<LeafInput> = spec
                .entries
                .iter()
                .map(|(k, v)| LeafInput {
                    flags: 0,
                    key: k.clone(),
                    value: v.clone(),
                })
                .collect();

            let mut value = Vec::new();
            if spec.inline {
                value.extend_from_slice(&0u64.to_le_bytes());
                value.extend_from_slice(&0u64.to_le_bytes());
                value.extend_from_slice(&encode_leaf(0, &elements, 0));
            } else {
                let root = self.write_tree(&mut pages, &elements);
                value.extend_from_slice(&root.to_le_bytes());
                value.extend_from_slice(&0u64.to_le_bytes());
            }
            root_elements.push(LeafInput {
                flags: BUCKET_LEAF_FLAG,
                key: name.clone(),
                value,
            });
        }
        let root = self.write_tree(&mut pages, &root_elements);

        let high_water = pages.next_id;
        let mut file = vec![0u8; high_water as usize * self.page_size];

        for txid in 0..2u64 {
            let meta = Meta {
                magic: MAGIC,
                version: VERSION,
                page_size: self.page_size as u32,
                flags: 0,
                root,
                sequence: 0,
                freelist: FREELIST_PAGE,
                pgid: high_water,
                txid,
                checksum: 0,
            };
            let mut page = page_header(txid, META_PAGE_FLAG, 0, 0);
            page.extend_from_slice(&meta.encode());
            place(&mut file, self.page_size, txid, &page);
        }
        place(
            &mut file,
            self.page_size,
            FREELIST_PAGE,
            &page_header(FREELIST_PAGE, FREELIST_PAGE_FLAG, 0, 0),
        );
        for (id, bytes) in &pages.pages {
            place(&mut file, self.page_size, *id, bytes);
        }

        fs::write(path, file)?;
        Ok(())
    }

    /// Write a B+tree over sorted leaf elements and return its root page id
    fn write_tree(&self, pages: &mut PageAllocator, elements: &[LeafInput]) -> Pgid {
        let page_size = pages.page_size;
        if elements.is_empty() {
            return pages.alloc_with(|id| encode_leaf(id, &[], page_size));
        }

        let mut level: Vec<(Vec<u8>, Pgid)> = elements
            .chunks(self.max_elements_per_page)
            .map(|chunk| {
                let id = pages.alloc_with(|id| encode_leaf(id, chunk, page_size));
                (chunk[0].key.clone(), id)
            })
            .collect();

        while level.len() > 1 {
            level = level
                .chunks(self.max_elements_per_page)
                .map(|chunk| {
                    let id = pages.alloc_with(|id| encode_branch(id, chunk, page_size));
                    (chunk[0].0.clone(), id)
                })
                .collect();
        }
        level[0].1
    }
}

#[derive(Debug, Clone)]
struct LeafInput {
    flags: u32,
    key: Vec<u8>,
    value: Vec<u8>,
}

/// Hands out consecutive page ids, accounting for overflow pages
struct PageAllocator {
    page_size: usize,
    next_id: Pgid,
    pages: Vec<(Pgid, Vec<u8>)>,
}

impl PageAllocator {
    fn new(page_size: usize) -> Self {
        Self {
            page_size,
            next_id: FIRST_DATA_PAGE,
            pages: Vec::new(),
        }
    }

    fn alloc_with(&mut self, encode: impl FnOnce(Pgid) -> Vec<u8>) -> Pgid {
        let id = self.next_id;
        let bytes = encode(id);
        let span = bytes.len().div_ceil(self.page_size).max(1);
        self.next_id += span as u64;
        self.pages.push((id, bytes));
        id
    }
}

// =============================================================================
// Page Encoding
// =============================================================================

fn page_header(id: Pgid, flags: u16, count: usize, overflow: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PAGE_HEADER_SIZE);
    buf.extend_from_slice(&id.to_le_bytes());
    buf.extend_from_slice(&flags.to_le_bytes());
    buf.extend_from_slice(&(count as u16).to_le_bytes());
    buf.extend_from_slice(&overflow.to_le_bytes());
    buf
}

/// Overflow count for a page of `len` bytes; 0 for inline pages
fn overflow_for(len: usize, page_size: usize) -> u32 {
    if page_size == 0 {
        return 0;
    }
    (len.div_ceil(page_size).max(1) - 1) as u32
}

fn encode_leaf(id: Pgid, elements: &[LeafInput], page_size: usize) -> Vec<u8> {
    let data_len: usize = elements.iter().map(|e| e.key.len() + e.value.len()).sum();
    let total = PAGE_HEADER_SIZE + elements.len() * ELEMENT_SIZE + data_len;

    let mut buf = page_header(
        id,
        LEAF_PAGE_FLAG,
        elements.len(),
        overflow_for(total, page_size),
    );
    let mut data = Vec::with_capacity(data_len);
    let data_start = PAGE_HEADER_SIZE + elements.len() * ELEMENT_SIZE;
    for (i, elem) in elements.iter().enumerate() {
        let pos = data_start + data.len() - (PAGE_HEADER_SIZE + i * ELEMENT_SIZE);
        buf.extend_from_slice(&elem.flags.to_le_bytes());
        buf.extend_from_slice(&(pos as u32).to_le_bytes());
        buf.extend_from_slice(&(elem.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(elem.value.len() as u32).to_le_bytes());
        data.extend_from_slice(&elem.key);
        data.extend_from_slice(&elem.value);
    }
    buf.extend_from_slice(&data);
    buf
}

fn encode_branch(id: Pgid, children: &[(Vec<u8>, Pgid)], page_size: usize) -> Vec<u8> {
    let data_len: usize = children.iter().map(|(k, _)| k.len()).sum();
    let total = PAGE_HEADER_SIZE + children.len() * ELEMENT_SIZE + data_len;

    let mut buf = page_header(
        id,
        BRANCH_PAGE_FLAG,
        children.len(),
        overflow_for(total, page_size),
    );
    let mut data = Vec::with_capacity(data_len);
    let data_start = PAGE_HEADER_SIZE + children.len() * ELEMENT_SIZE;
    for (i, (key, child)) in children.iter().enumerate() {
        let pos = data_start + data.len() - (PAGE_HEADER_SIZE + i * ELEMENT_SIZE);
        buf.extend_from_slice(&(pos as u32).to_le_bytes());
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&child.to_le_bytes());
        data.extend_from_slice(key);
    }
    buf.extend_from_slice(&data);
    buf
}

fn place(file: &mut [u8], page_size: usize, id: Pgid, bytes: &[u8]) {
    let offset = id as usize * page_size;
    file[offset..offset + bytes.len()].copy_from_slice(bytes);
}
