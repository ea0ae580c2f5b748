//! Key Matcher / History Filter
//!
//! Decides, record by record during the reverse walk, whether a version
//! should be dumped. It relies on the walk meeting each key's newest version
//! first (see [`crate::mvcc`]).

use std::collections::HashSet;

/// How the target key is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Key must equal the target
    Exact,
    /// Key must start with the target
    Prefix,
}

/// What to do with the record just observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not a match (or an older version nobody asked for)
    Skip,
    /// Dump it and keep scanning
    Emit { latest: bool },
    /// Dump it, then end the scan
    EmitAndStop,
}

impl Decision {
    pub fn should_emit(&self) -> bool {
        !matches!(self, Decision::Skip)
    }
}

/// Matching policy plus the per-scan `seen` set
#[derive(Debug)]
pub struct Matcher {
    target: Vec<u8>,
    mode: ScanMode,
    include_history: bool,
    seen: HashSet<Vec<u8>>,
}

impl Matcher {
    pub fn new(target: impl Into<Vec<u8>>, mode: ScanMode, include_history: bool) -> Self {
        Self {
            target: target.into(),
            mode,
            include_history,
            seen: HashSet::new(),
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Keys that have yielded their latest version so far
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn matches(&self, key: &[u8]) -> bool {
        match self.mode {
            ScanMode::Exact => key == self.target.as_slice(),
            ScanMode::Prefix => key.starts_with(&self.target),
        }
    }

    /// Observe the next record's key in reverse-walk order
    pub fn observe(&mut self, key: &[u8]) -> Decision {
        if !self.matches(key) {
            return Decision::Skip;
        }

        match self.mode {
            ScanMode::Exact => {
                let latest = self.seen.insert(key.to_vec());
                if self.include_history {
                    Decision::Emit { latest }
                } else {
                    Decision::EmitAndStop
                }
            }
            ScanMode::Prefix => {
                if self.seen.insert(key.to_vec()) {
                    Decision::Emit { latest: true }
                } else if self.include_history {
                    Decision::Emit { latest: false }
                } else {
                    Decision::Skip
                }
            }
        }
    }
}
