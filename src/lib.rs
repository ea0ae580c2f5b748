//! # etcdxtl
//!
//! Offline inspection of etcd data files:
//! - Reads the bbolt page file directly, no running etcd needed
//! - Dumps the latest version of a key, or of every key under a prefix
//! - Optionally dumps every historical version still in the file
//! - Re-encodes stored Kubernetes objects as YAML or JSON
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CLI (dump-kv)                            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Config
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Dumper                                 │
//! │            (one reverse cursor walk per run)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!    ┌──────────┬───────┴────┬──────────────┬──────────────┐
//!    ▼          ▼            ▼              ▼              ▼
//! ┌──────┐  ┌──────┐    ┌─────────┐    ┌─────────┐    ┌────────┐
//! │ Bolt │─►│ MVCC │───►│ Matcher │───►│  Codec  │───►│  Sink  │
//! │cursor│  │record│    │(history)│    │(registry│    │ (files)│
//! └──────┘  └──────┘    └─────────┘    └─────────┘    └────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod bolt;
pub mod mvcc;
pub mod matcher;
pub mod codec;
pub mod sink;
pub mod dumper;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DumpError, Result};
pub use config::{Config, OutputFormat};
pub use codec::Registry;
pub use dumper::{DumpSummary, Dumper};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of etcdxtl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
