//! Persistence Sink
//!
//! Writes each dumped version to `<output_dir>/<sanitized-key>-<revision>`.
//! An existing file with the same name is overwritten without warning.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Separator in etcd keys
const KEY_SEPARATOR: char = '/';

/// Writes dumped objects into one directory
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name for one version of `key`
    ///
    /// Drops a single leading `/`, turns the remaining ones into `-` and
    /// appends the revision: `/registry/pods/default/web` at revision 12
    /// becomes `registry-pods-default-web-12`.
    pub fn file_name(key: &[u8], revision: i64) -> String {
        let key = String::from_utf8_lossy(key);
        let trimmed = key.strip_prefix(KEY_SEPARATOR).unwrap_or(&*key);
        format!("{}-{}", trimmed.replace(KEY_SEPARATOR, "-"), revision)
    }

    /// Full path for one version of `key`
    pub fn path_for(&self, key: &[u8], revision: i64) -> PathBuf {
        self.output_dir.join(Self::file_name(key, revision))
    }

    /// Write `text` for `key` at `revision`, returning the written path
    pub fn persist(&self, key: &[u8], text: &str, revision: i64) -> Result<PathBuf> {
        let path = self.path_for(key, revision);
        tracing::info!("persist key: {}", path.display());

        let mut file = File::create(&path)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(path)
    }
}
