//! Payload Codec
//!
//! Turns the opaque value of a record into a structured object and writes
//! it back out as JSON or YAML.
//!
//! ## Responsibilities
//! - Recognise the storage encoding (JSON document or protobuf envelope)
//! - Resolve the object's kind through the [`Registry`]
//! - Decode protobuf bodies against the kind's schema
//! - Strictly validate the object before encoding it
//!
//! ## Flow
//! ```text
//!   payload ──► sniff ──┬─► JSON ─────────────────┐
//!                       └─► k8s\0 + Unknown ──► raw body ──► schema decode ─┐
//!                                                 │                         │
//!                                                 ▼                         ▼
//!                                         Object { kind, content } ──► validate ──► json/yaml
//! ```

mod builtin;
mod proto;
mod registry;
mod schema;

use serde_json::{Map, Value};

use crate::config::OutputFormat;
use crate::error::{DumpError, Result};

pub use builtin::{CONFIG_MAP, LEASE, NAMESPACE, OBJECT_META, SECRET, SERVICE_ACCOUNT};
pub use proto::{TypeMeta, Unknown, PROTOBUF_MAGIC};
pub use registry::{ObjectKind, Registry};
pub use schema::{Field, FieldType, MessageSchema};

/// Content type of protobuf bodies inside the envelope
const PROTOBUF_CONTENT_TYPE: &str = "application/vnd.kubernetes.protobuf";
const JSON_CONTENT_TYPE: &str = "application/json";

/// A decoded object: its kind plus the full JSON content
///
/// `content` always starts with `kind` and `apiVersion`.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    kind: ObjectKind,
    content: Map<String, Value>,
}

impl Object {
    fn new(kind: ObjectKind, body: Map<String, Value>) -> Self {
        let mut content = Map::with_capacity(body.len() + 2);
        content.insert("kind".to_string(), Value::from(kind.kind.clone()));
        content.insert(
            "apiVersion".to_string(),
            Value::from(kind.api_version.clone()),
        );
        for (name, value) in body {
            if name != "kind" && name != "apiVersion" {
                content.insert(name, value);
            }
        }
        Self { kind, content }
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn content(&self) -> &Map<String, Value> {
        &self.content
    }

    /// `metadata.name`, if present
    pub fn name(&self) -> Option<&str> {
        self.metadata_str("name")
    }

    /// `metadata.namespace`, if present
    pub fn namespace(&self) -> Option<&str> {
        self.metadata_str("namespace")
    }

    fn metadata_str(&self, field: &str) -> Option<&str> {
        self.content.get("metadata")?.get(field)?.as_str()
    }
}

/// Decoder/encoder bound to one registry
#[derive(Debug, Clone, Copy)]
pub struct PayloadCodec<'r> {
    registry: &'r Registry,
}

impl<'r> PayloadCodec<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Decode a stored payload
    pub fn decode(&self, payload: &[u8]) -> Result<Object> {
        let fail = |reason: String| DumpError::Decode {
            len: payload.len(),
            reason,
        };

        if payload.starts_with(PROTOBUF_MAGIC) {
            self.decode_protobuf(payload).map_err(fail)
        } else if looks_like_json(payload) {
            self.decode_json(payload).map_err(fail)
        } else {
            Err(fail("unrecognized payload encoding".to_string()))
        }
    }

    /// Validate `object` against its schema and render it
    pub fn encode(&self, object: &Object, format: OutputFormat) -> Result<String> {
        let schema = self
            .registry
            .lookup(&object.kind)
            .ok_or_else(|| DumpError::Encode(self.unregistered(&object.kind)))?;

        let mut body = object.content.clone();
        body.remove("kind");
        body.remove("apiVersion");
        schema::validate_object(schema, &body, "")
            .map_err(|e| DumpError::Encode(format!("{}: {}", object.kind, e)))?;

        match format {
            OutputFormat::Json => {
                let mut text = serde_json::to_string(&object.content)
                    .map_err(|e| DumpError::Encode(e.to_string()))?;
                text.push('\n');
                Ok(text)
            }
            OutputFormat::Yaml => serde_yaml::to_string(&object.content)
                .map_err(|e| DumpError::Encode(e.to_string())),
        }
    }

    fn decode_json(&self, payload: &[u8]) -> std::result::Result<Object, String> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| format!("invalid JSON: {}", e))?;
        let Value::Object(map) = value else {
            return Err("JSON payload is not an object".to_string());
        };

        let field = |name: &str| {
            map.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| format!("JSON object has no {:?}", name))
        };
        let kind = ObjectKind::new(field("apiVersion")?, field("kind")?);
        self.schema_for(&kind)?;
        Ok(Object::new(kind, map))
    }

    fn decode_protobuf(&self, payload: &[u8]) -> std::result::Result<Object, String> {
        let unknown = Unknown::from_payload(payload)?;
        let type_meta = unknown.type_meta.unwrap_or_default();
        if type_meta.kind.is_empty() {
            return Err("protobuf envelope has no kind".to_string());
        }
        if !unknown.content_encoding.is_empty() {
            return Err(format!(
                "unsupported content encoding {:?}",
                unknown.content_encoding
            ));
        }

        let kind = ObjectKind::new(type_meta.api_version, type_meta.kind);
        let schema = self.schema_for(&kind)?;

        let body = match unknown.content_type.as_str() {
            "" | PROTOBUF_CONTENT_TYPE => proto::decode_message(schema, &unknown.raw)
                .map_err(|e| format!("{}: {}", kind, e))?,
            JSON_CONTENT_TYPE => match serde_json::from_slice(&unknown.raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err("embedded JSON is not an object".to_string()),
                Err(e) => return Err(format!("embedded JSON: {}", e)),
            },
            other => return Err(format!("unsupported content type {:?}", other)),
        };
        Ok(Object::new(kind, body))
    }

    fn schema_for(&self, kind: &ObjectKind) -> std::result::Result<&'static MessageSchema, String> {
        self.registry
            .lookup(kind)
            .ok_or_else(|| self.unregistered(kind))
    }

    fn unregistered(&self, kind: &ObjectKind) -> String {
        let known: Vec<String> = self.registry.kinds().iter().map(|k| k.to_string()).collect();
        let known = if known.is_empty() {
            "none".to_string()
        } else {
            known.join("; ")
        };
        format!("no kind {} is registered (supported: {})", kind, known)
    }
}

fn looks_like_json(payload: &[u8]) -> bool {
    payload
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}
