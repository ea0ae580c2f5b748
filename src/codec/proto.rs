//! Kubernetes protobuf payloads
//!
//! Objects stored as protobuf start with a 4-byte magic followed by a
//! `runtime.Unknown` envelope:
//!
//! ```text
//! ┌───────────────┬──────────────────────────────────────────────┐
//! │ "k8s\0" (4)   │ Unknown { typeMeta=1 { apiVersion=1, kind=2 },│
//! │               │           raw=2, contentEncoding=3,           │
//! │               │           contentType=4 }                     │
//! └───────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! `raw` is the object body, decoded here against its registered
//! [`MessageSchema`] into a JSON object.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Buf;
use chrono::{DateTime, SecondsFormat};
use prost::encoding::{decode_key, decode_varint, WireType};
use prost::Message;
use serde_json::{Map, Value};

use super::schema::{Field, FieldType, MessageSchema};

/// Prefix of every protobuf-encoded object
pub const PROTOBUF_MAGIC: &[u8; 4] = b"k8s\x00";

/// runtime.TypeMeta
#[derive(Clone, PartialEq, Message)]
pub struct TypeMeta {
    #[prost(string, tag = "1")]
    pub api_version: String,
    #[prost(string, tag = "2")]
    pub kind: String,
}

/// runtime.Unknown, the envelope around protobuf object bodies
#[derive(Clone, PartialEq, Message)]
pub struct Unknown {
    #[prost(message, optional, tag = "1")]
    pub type_meta: Option<TypeMeta>,
    #[prost(bytes = "vec", tag = "2")]
    pub raw: Vec<u8>,
    #[prost(string, tag = "3")]
    pub content_encoding: String,
    #[prost(string, tag = "4")]
    pub content_type: String,
}

impl Unknown {
    /// Strip the magic and decode the envelope
    pub fn from_payload(payload: &[u8]) -> Result<Self, String> {
        let body = payload
            .strip_prefix(PROTOBUF_MAGIC.as_slice())
            .ok_or_else(|| "missing protobuf magic".to_string())?;
        Unknown::decode(body).map_err(|e| format!("invalid protobuf envelope: {}", e))
    }

    /// Envelope bytes with the magic prepended
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = PROTOBUF_MAGIC.to_vec();
        out.extend_from_slice(&self.encode_to_vec());
        out
    }
}

// =============================================================================
// Schema-driven Decoding
// =============================================================================

/// Decode a protobuf message body into a JSON object
///
/// Unknown tags and wire types that disagree with the schema are errors.
pub fn decode_message(schema: &MessageSchema, mut buf: &[u8]) -> Result<Map<String, Value>, String> {
    let mut out = Map::new();

    while buf.has_remaining() {
        let (tag, wire_type) =
            decode_key(&mut buf).map_err(|e| format!("{}: {}", schema.name, e))?;
        let field = schema
            .field_by_tag(tag)
            .ok_or_else(|| format!("unknown field tag {} in {}", tag, schema.name))?;
        let value = decode_field(schema, field, wire_type, &mut buf)?;

        match field.ty {
            FieldType::StringMap | FieldType::BytesMap => {
                let entry = out
                    .entry(field.name)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let (Value::Object(map), Value::Object(new)) = (entry, value) {
                    map.extend(new);
                }
            }
            _ if field.repeated => {
                let entry = out
                    .entry(field.name)
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = entry {
                    items.push(value);
                }
            }
            _ => {
                out.insert(field.name.to_string(), value);
            }
        }
    }

    Ok(schema.ordered(out))
}

fn decode_field(
    schema: &MessageSchema,
    field: &Field,
    wire_type: WireType,
    buf: &mut &[u8],
) -> Result<Value, String> {
    let context = |e: String| format!("{}.{}: {}", schema.name, field.name, e);

    match field.ty {
        FieldType::Bool | FieldType::Int32 | FieldType::Int64 => {
            expect_wire(wire_type, WireType::Varint).map_err(context)?;
            let raw = decode_varint(buf).map_err(|e| context(e.to_string()))?;
            Ok(match field.ty {
                FieldType::Bool => Value::Bool(raw != 0),
                FieldType::Int32 => Value::from(raw as i32),
                _ => Value::from(raw as i64),
            })
        }
        _ => {
            expect_wire(wire_type, WireType::LengthDelimited).map_err(context)?;
            let body = take_delimited(buf).map_err(context)?;
            decode_delimited(field.ty, body).map_err(context)
        }
    }
}

fn decode_delimited(ty: FieldType, body: &[u8]) -> Result<Value, String> {
    match ty {
        FieldType::String => utf8(body).map(Value::from),
        FieldType::Bytes => Ok(Value::from(STANDARD.encode(body))),
        FieldType::Time => timestamp(body, SecondsFormat::Secs),
        FieldType::MicroTime => timestamp(body, SecondsFormat::Micros),
        FieldType::RawJson => {
            let raw = single_bytes_field(body)?;
            serde_json::from_slice(raw).map_err(|e| format!("embedded JSON: {}", e))
        }
        FieldType::StringMap => {
            let (key, value) = map_entry(body)?;
            let mut map = Map::new();
            map.insert(key, Value::from(utf8(value)?));
            Ok(Value::Object(map))
        }
        FieldType::BytesMap => {
            let (key, value) = map_entry(body)?;
            let mut map = Map::new();
            map.insert(key, Value::from(STANDARD.encode(value)));
            Ok(Value::Object(map))
        }
        FieldType::Message(schema) => decode_message(schema, body).map(Value::Object),
        FieldType::Bool | FieldType::Int32 | FieldType::Int64 => {
            Err("scalar field is not length-delimited".to_string())
        }
    }
}

/// google.protobuf.Timestamp-shaped message: seconds=1, nanos=2
fn timestamp(mut body: &[u8], format: SecondsFormat) -> Result<Value, String> {
    let (mut seconds, mut nanos) = (0i64, 0i32);
    while body.has_remaining() {
        let (tag, wire_type) = decode_key(&mut body).map_err(|e| e.to_string())?;
        expect_wire(wire_type, WireType::Varint)?;
        let raw = decode_varint(&mut body).map_err(|e| e.to_string())?;
        match tag {
            1 => seconds = raw as i64,
            2 => nanos = raw as i32,
            other => return Err(format!("unknown timestamp field tag {}", other)),
        }
    }
    let nanos = u32::try_from(nanos).map_err(|_| format!("negative nanos {}", nanos))?;
    DateTime::from_timestamp(seconds, nanos)
        .map(|t| Value::from(t.to_rfc3339_opts(format, true)))
        .ok_or_else(|| format!("timestamp {}s {}ns out of range", seconds, nanos))
}

/// Map entry message: key=1 (string), value=2
fn map_entry(mut body: &[u8]) -> Result<(String, &[u8]), String> {
    let (mut key, mut value): (&[u8], &[u8]) = (&[], &[]);
    while body.has_remaining() {
        let (tag, wire_type) = decode_key(&mut body).map_err(|e| e.to_string())?;
        expect_wire(wire_type, WireType::LengthDelimited)?;
        let chunk = take_delimited(&mut body)?;
        match tag {
            1 => key = chunk,
            2 => value = chunk,
            other => return Err(format!("unknown map entry field tag {}", other)),
        }
    }
    Ok((utf8(key)?, value))
}

/// Message with a single `bytes` field numbered 1
fn single_bytes_field(mut body: &[u8]) -> Result<&[u8], String> {
    let mut raw: &[u8] = &[];
    while body.has_remaining() {
        let (tag, wire_type) = decode_key(&mut body).map_err(|e| e.to_string())?;
        expect_wire(wire_type, WireType::LengthDelimited)?;
        let chunk = take_delimited(&mut body)?;
        if tag != 1 {
            return Err(format!("unknown field tag {}", tag));
        }
        raw = chunk;
    }
    Ok(raw)
}

fn take_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], String> {
    let len = decode_varint(buf).map_err(|e| e.to_string())?;
    let len = usize::try_from(len).map_err(|_| format!("length {} overflows", len))?;
    if len > buf.len() {
        return Err(format!(
            "length {} exceeds remaining {} bytes",
            len,
            buf.len()
        ));
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn expect_wire(found: WireType, wanted: WireType) -> Result<(), String> {
    if found == wanted {
        Ok(())
    } else {
        Err(format!("wire type {:?}, expected {:?}", found, wanted))
    }
}

fn utf8(bytes: &[u8]) -> Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| format!("{} bytes of invalid UTF-8", bytes.len()))
}
