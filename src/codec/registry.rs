//! Type registry
//!
//! Maps `(apiVersion, kind)` to the schema used to decode and validate an
//! object. Built once at startup and handed to the codec by reference.

use std::collections::HashMap;
use std::fmt;

use super::builtin;
use super::schema::MessageSchema;

/// apiVersion plus kind, e.g. `coordination.k8s.io/v1, Kind=Lease`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKind {
    pub api_version: String,
    pub kind: String,
}

impl ObjectKind {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// API group; empty for the core group
    pub fn group(&self) -> &str {
        self.api_version
            .rsplit_once('/')
            .map(|(group, _)| group)
            .unwrap_or("")
    }

    pub fn version(&self) -> &str {
        self.api_version
            .rsplit_once('/')
            .map(|(_, version)| version)
            .unwrap_or(&self.api_version)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version, self.kind)
    }
}

/// Known object kinds
#[derive(Debug, Default)]
pub struct Registry {
    kinds: HashMap<ObjectKind, &'static MessageSchema>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in kinds
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        builtin::install(&mut registry);
        registry
    }

    /// Register a kind, replacing any previous schema for it
    pub fn register(
        &mut self,
        api_version: &str,
        kind: &str,
        schema: &'static MessageSchema,
    ) -> &mut Self {
        self.kinds.insert(ObjectKind::new(api_version, kind), schema);
        self
    }

    pub fn lookup(&self, kind: &ObjectKind) -> Option<&'static MessageSchema> {
        self.kinds.get(kind).copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Registered kinds, sorted for stable output
    pub fn kinds(&self) -> Vec<&ObjectKind> {
        let mut kinds: Vec<_> = self.kinds.keys().collect();
        kinds.sort_by(|a, b| (&a.api_version, &a.kind).cmp(&(&b.api_version, &b.kind)));
        kinds
    }
}
