//! Database handle and read-only transaction

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DumpError, Result};

use super::bucket::{Bucket, Root};
use super::lock;
use super::meta::Meta;
use super::page::Page;
use super::{Pgid, DEFAULT_PAGE_SIZE, PAGE_HEADER_SIZE};

/// A bbolt file opened read-only.
///
/// Pages are read on demand with positioned reads; nothing is cached and
/// nothing is ever written back. Dropping the handle closes the file, which
/// also releases the shared lock.
#[derive(Debug)]
pub struct Db {
    path: PathBuf,
    file: File,
    /// File length at open; no page may extend past it
    file_len: u64,
    page_size: usize,
    meta: Meta,
}

impl Db {
    /// Open a page file
    ///
    /// Steps:
    /// 1. Open the file read-only
    /// 2. Take a shared advisory lock, waiting up to `lock_timeout`
    /// 3. Load both meta pages and keep the newest valid one
    pub fn open(path: &Path, lock_timeout: Duration) -> Result<Self> {
        let open_err = |reason: String| DumpError::Open {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| open_err(e.to_string()))?;
        let metadata = file.metadata().map_err(|e| open_err(e.to_string()))?;
        if !metadata.is_file() {
            return Err(open_err("not a regular file".to_string()));
        }

        lock::lock_shared(&file, path, lock_timeout)?;

        let (page_size, meta) =
            Self::load_meta(&file).map_err(|e| open_err(format!("invalid database: {}", e)))?;

        tracing::debug!(
            path = %path.display(),
            page_size,
            txid = meta.txid,
            root = meta.root,
            high_water = meta.pgid,
            "opened bolt db"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            file_len: metadata.len(),
            page_size,
            meta,
        })
    }

    /// Path the database was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Begin the read-only transaction
    pub fn begin(&self) -> Tx<'_> {
        Tx {
            db: self,
            meta: self.meta,
        }
    }

    /// Read page `id` including its overflow pages
    pub(crate) fn read_page(&self, id: Pgid) -> Result<Page> {
        if id < 2 || id >= self.meta.pgid {
            return Err(DumpError::Corrupt(format!(
                "page id {} outside data range [2, {})",
                id, self.meta.pgid
            )));
        }

        let page_size = self.page_size as u64;
        let offset = self.page_range(id, 1, page_size)?;
        let mut header = [0u8; PAGE_HEADER_SIZE];
        read_exact_at(&self.file, &mut header, offset)?;
        let header = Page::from_bytes(header.to_vec())?;

        if header.id() != id {
            return Err(DumpError::Corrupt(format!(
                "page {} carries id {}",
                id,
                header.id()
            )));
        }
        let span = 1 + u64::from(header.overflow());
        if id.checked_add(span).map_or(true, |end| end > self.meta.pgid) {
            return Err(DumpError::Corrupt(format!(
                "page {} overflows {} pages past high water mark {}",
                id,
                header.overflow(),
                self.meta.pgid
            )));
        }
        self.page_range(id, span, page_size)?;

        let mut data = vec![0u8; span as usize * self.page_size];
        read_exact_at(&self.file, &mut data, offset)?;
        Page::from_bytes(data)
    }

    /// Byte offset of `span` pages starting at `id`, checked against the file
    fn page_range(&self, id: Pgid, span: u64, page_size: u64) -> Result<u64> {
        let offset = id.checked_mul(page_size);
        let end = id
            .checked_add(span)
            .and_then(|last| last.checked_mul(page_size));
        match (offset, end) {
            (Some(offset), Some(end)) if end <= self.file_len => Ok(offset),
            _ => Err(DumpError::Corrupt(format!(
                "page {} (+{} overflow) lies past the end of the {} byte file",
                id,
                span - 1,
                self.file_len
            ))),
        }
    }

    /// Choose between the two meta pages
    fn load_meta(file: &File) -> Result<(usize, Meta)> {
        let mut buf = [0u8; PAGE_HEADER_SIZE + Meta::SIZE];

        read_exact_at(file, &mut buf, 0)?;
        let meta0 = Meta::decode(&buf[PAGE_HEADER_SIZE..]);

        let page_size = match &meta0 {
            Ok(meta) => meta.page_size as usize,
            Err(_) => DEFAULT_PAGE_SIZE,
        };
        let meta1 = match read_exact_at(file, &mut buf, page_size as u64) {
            Ok(()) => Meta::decode(&buf[PAGE_HEADER_SIZE..]),
            Err(e) => Err(e),
        };

        let meta = match (meta0, meta1) {
            (Ok(a), Ok(b)) => {
                if b.txid > a.txid {
                    b
                } else {
                    a
                }
            }
            (Ok(a), Err(e)) => {
                tracing::warn!(error = %e, "meta page 1 invalid, using meta page 0");
                a
            }
            (Err(e), Ok(b)) => {
                tracing::warn!(error = %e, "meta page 0 invalid, using meta page 1");
                b
            }
            (Err(e0), Err(e1)) => {
                return Err(DumpError::Corrupt(format!(
                    "both meta pages invalid: {}; {}",
                    e0, e1
                )))
            }
        };
        Ok((meta.page_size as usize, meta))
    }
}

/// Read-only transaction over one consistent meta snapshot
pub struct Tx<'db> {
    db: &'db Db,
    meta: Meta,
}

impl<'db> Tx<'db> {
    /// Transaction id of the snapshot
    pub fn id(&self) -> u64 {
        self.meta.txid
    }

    /// The top-level bucket holding all named buckets
    pub fn root(&self) -> Bucket<'db> {
        Bucket::new(self.db, Root::Page(self.meta.root))
    }

    /// Look up a top-level bucket by name
    pub fn bucket(&self, name: &[u8]) -> Result<Bucket<'db>> {
        self.root().bucket(name)?.ok_or_else(|| DumpError::MissingBucket {
            bucket: String::from_utf8_lossy(name).into_owned(),
            path: self.db.path.clone(),
        })
    }

    /// Names of all top-level buckets
    pub fn bucket_names(&self) -> Result<Vec<Vec<u8>>> {
        let mut names = Vec::new();
        let mut cursor = self.root().cursor();
        let mut item = cursor.first()?;
        while let Some((key, value)) = item {
            if value.is_none() {
                names.push(key);
            }
            item = cursor.next()?;
        }
        Ok(names)
    }
}

// =============================================================================
// Positioned reads
// =============================================================================

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, offset).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => DumpError::Corrupt(format!(
            "file truncated: {} bytes at offset {} not available",
            buf.len(),
            offset
        )),
        _ => DumpError::Io(e),
    })
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(DumpError::Corrupt(format!(
                    "file truncated at offset {}",
                    offset
                )))
            }
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(DumpError::Io(e)),
        }
    }
    Ok(())
}
