//! Message schemas
//!
//! A schema lists a message's fields with their JSON name, protobuf tag and
//! type. The same description drives protobuf decoding (see
//! [`super::proto`]) and strict validation of JSON objects before they are
//! re-encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};

/// Field value types, named after their Kubernetes API counterparts
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    String,
    Bool,
    Int32,
    Int64,
    /// Protobuf `bytes`, base64 in JSON
    Bytes,
    /// metav1.Time, RFC 3339 with second precision
    Time,
    /// metav1.MicroTime, RFC 3339 with microsecond precision
    MicroTime,
    /// metav1.FieldsV1: a message whose field 1 holds raw JSON
    RawJson,
    /// map<string, string>
    StringMap,
    /// map<string, bytes>, base64 values in JSON
    BytesMap,
    Message(&'static MessageSchema),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub tag: u32,
    pub ty: FieldType,
    pub repeated: bool,
}

impl Field {
    pub const fn new(name: &'static str, tag: u32, ty: FieldType) -> Self {
        Self {
            name,
            tag,
            ty,
            repeated: false,
        }
    }

    pub const fn repeated(name: &'static str, tag: u32, ty: FieldType) -> Self {
        Self {
            name,
            tag,
            ty,
            repeated: true,
        }
    }
}

#[derive(Debug)]
pub struct MessageSchema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl MessageSchema {
    pub fn field_by_tag(&self, tag: u32) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reorder `map` to follow the schema's field order
    pub(crate) fn ordered(&self, mut map: Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::with_capacity(map.len());
        for field in self.fields {
            if let Some(value) = map.remove(field.name) {
                out.insert(field.name.to_string(), value);
            }
        }
        out.extend(map);
        out
    }
}

// =============================================================================
// Strict Validation
// =============================================================================

/// Check every field of `object` against `schema`
///
/// Unknown fields and values of the wrong JSON shape are errors; `null` is
/// accepted anywhere, as the API server writes it for unset pointers.
pub fn validate_object(
    schema: &MessageSchema,
    object: &Map<String, Value>,
    path: &str,
) -> Result<(), String> {
    for (name, value) in object {
        let field_path = join(path, name);
        let field = schema
            .field_by_name(name)
            .ok_or_else(|| format!("unknown field {:?} in {}", field_path, schema.name))?;

        if field.repeated {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        validate_value(field.ty, item, &format!("{}[{}]", field_path, i))?;
                    }
                }
                other => return Err(mismatch(&field_path, "array", other)),
            }
        } else {
            validate_value(field.ty, value, &field_path)?;
        }
    }
    Ok(())
}

fn validate_value(ty: FieldType, value: &Value, path: &str) -> Result<(), String> {
    if value.is_null() {
        return Ok(());
    }
    match ty {
        FieldType::String => expect(value.is_string(), path, "string", value),
        FieldType::Bool => expect(value.is_boolean(), path, "boolean", value),
        FieldType::Int32 => match value.as_i64() {
            Some(n) if i32::try_from(n).is_ok() => Ok(()),
            _ => Err(mismatch(path, "int32", value)),
        },
        FieldType::Int64 => expect(value.as_i64().is_some(), path, "int64", value),
        FieldType::Bytes => validate_base64(value, path),
        FieldType::Time | FieldType::MicroTime => match value.as_str() {
            Some(s) if chrono::DateTime::parse_from_rfc3339(s).is_ok() => Ok(()),
            _ => Err(mismatch(path, "RFC 3339 timestamp", value)),
        },
        FieldType::RawJson => Ok(()),
        FieldType::StringMap => {
            let map = value.as_object().ok_or_else(|| mismatch(path, "object", value))?;
            for (k, v) in map {
                expect(v.is_string(), &join(path, k), "string", v)?;
            }
            Ok(())
        }
        FieldType::BytesMap => {
            let map = value.as_object().ok_or_else(|| mismatch(path, "object", value))?;
            for (k, v) in map {
                validate_base64(v, &join(path, k))?;
            }
            Ok(())
        }
        FieldType::Message(schema) => {
            let map = value.as_object().ok_or_else(|| mismatch(path, "object", value))?;
            validate_object(schema, map, path)
        }
    }
}

fn validate_base64(value: &Value, path: &str) -> Result<(), String> {
    match value.as_str() {
        Some(s) if STANDARD.decode(s).is_ok() => Ok(()),
        _ => Err(mismatch(path, "base64 string", value)),
    }
}

fn expect(ok: bool, path: &str, wanted: &str, value: &Value) -> Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(mismatch(path, wanted, value))
    }
}

fn mismatch(path: &str, wanted: &str, value: &Value) -> String {
    let found = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("field {:?}: expected {}, found {}", path, wanted, found)
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}
