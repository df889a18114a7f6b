//! Generic recursive-descent decoder driven by the schema catalog.
//!
//! `decode` walks a buffer as a sequence of (field number, wire kind)
//! tags. Field numbers the catalog does not model are consumed
//! wire-kind-aware and dropped; this is the normal case for an
//! undocumented format, not an error. Malformed or truncated input
//! never raises past this module: decoding stops at the first bad byte
//! and the record parsed so far is returned, so a mangled tail costs
//! only itself, not the whole event.

use crate::schema::{FieldDef, FieldKind, MessageDef, SchemaCatalog, WireKind};
use bytes::Buf;
use std::collections::HashMap;
use tracing::trace;

/// Error type for decoder operations.
///
/// Bad bytes are not an error (see module docs); only asking for a
/// schema the catalog does not declare is, since that is a programming
/// mistake rather than wire noise.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Requested schema name is not in the catalog.
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),
}

/// One decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string.
    Str(String),
    /// Unsigned varint.
    U64(u64),
    /// Normalized 64-bit integer.
    I64(i64),
    /// Nested message.
    Record(Record),
    /// Repeated field, in arrival order.
    List(Vec<Value>),
}

impl Value {
    /// View as a string, if this value is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// View as an unsigned integer, if this value is one.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a signed 64-bit integer. Unsigned varints narrow
    /// losslessly where possible.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            Self::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// View as a nested record, if this value is one.
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }
}

/// A decoded message: named field values keyed by the schema's field
/// names. Fields absent from the wire are simply absent here.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: &'static str,
    fields: HashMap<&'static str, Value>,
}

impl Record {
    /// Create an empty record for the given schema name.
    #[must_use]
    pub fn new(schema: &'static str) -> Self {
        Self {
            schema,
            fields: HashMap::new(),
        }
    }

    /// Schema name this record was decoded with.
    #[must_use]
    pub fn schema(&self) -> &'static str {
        self.schema
    }

    /// True when no known field was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set a scalar field (last-write-wins).
    pub fn insert(&mut self, name: &'static str, value: Value) {
        self.fields.insert(name, value);
    }

    /// Raw field access.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String field accessor.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Unsigned varint field accessor.
    #[must_use]
    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    /// 64-bit integer field accessor.
    #[must_use]
    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Nested message field accessor.
    #[must_use]
    pub fn record_field(&self, name: &str) -> Option<&Record> {
        self.get(name).and_then(Value::as_record)
    }

    /// Repeated field accessor. A scalar value decoded into a repeated
    /// slot is exposed as a one-element slice; absent fields are empty.
    #[must_use]
    pub fn repeated(&self, name: &str) -> &[Value] {
        match self.get(name) {
            Some(Value::List(values)) => values,
            Some(single) => std::slice::from_ref(single),
            None => &[],
        }
    }
}

/// Decode `bytes` using the named schema.
///
/// # Errors
///
/// Returns an error only when `schema` is not declared in the catalog.
pub fn decode(catalog: &SchemaCatalog, schema: &str, bytes: &[u8]) -> Result<Record, DecodeError> {
    let def = catalog
        .get(schema)
        .ok_or_else(|| DecodeError::UnknownSchema(schema.to_string()))?;
    Ok(decode_message(catalog, def, bytes))
}

/// Decode only the first `len` bytes of `bytes` using the named schema.
///
/// Used when a transport hands over a buffer with trailing padding or
/// an explicit payload length. A `len` past the end of the buffer is
/// clamped.
///
/// # Errors
///
/// Returns an error only when `schema` is not declared in the catalog.
pub fn decode_prefix(
    catalog: &SchemaCatalog,
    schema: &str,
    bytes: &[u8],
    len: usize,
) -> Result<Record, DecodeError> {
    let bounded = bytes.get(..len).unwrap_or(bytes);
    decode(catalog, schema, bounded)
}

fn decode_message(catalog: &SchemaCatalog, def: &MessageDef, bytes: &[u8]) -> Record {
    let mut record = Record::new(def.name);
    let mut cursor = Cursor::new(bytes);

    while !cursor.is_at_end() {
        let Some(tag) = cursor.read_varint() else {
            trace!(target: "wire.decode", schema = def.name, "truncated tag, stopping");
            break;
        };
        let number = u32::try_from(tag >> 3).unwrap_or(u32::MAX);
        let Some(wire) = WireKind::from_tag_bits(tag & 0x7) else {
            trace!(target: "wire.decode", schema = def.name, field = number, "invalid wire kind, stopping");
            break;
        };

        let ok = match def.field(number) {
            Some(field) => decode_field(catalog, &mut record, field, wire, &mut cursor),
            None => {
                trace!(target: "wire.decode", schema = def.name, field = number, "skipping unmodeled field");
                skip_field(&mut cursor, wire)
            }
        };
        if !ok {
            trace!(target: "wire.decode", schema = def.name, field = number, "truncated field, stopping");
            break;
        }
    }

    record
}

/// Decode one known field. Returns false on truncation, which ends the
/// enclosing message.
fn decode_field(
    catalog: &SchemaCatalog,
    record: &mut Record,
    field: &FieldDef,
    wire: WireKind,
    cursor: &mut Cursor<'_>,
) -> bool {
    let value = match (field.kind, wire) {
        (FieldKind::String, WireKind::LengthDelimited) => {
            let Some(data) = cursor.read_length_delimited() else {
                return false;
            };
            Value::Str(String::from_utf8_lossy(data).into_owned())
        }
        (FieldKind::Varint, WireKind::Varint) => {
            let Some(v) = cursor.read_varint() else {
                return false;
            };
            Value::U64(v)
        }
        // A declared 64-bit integer arrives either as a varint or as a
        // fixed 8-byte register pair; both normalize to i64.
        (FieldKind::Int64, WireKind::Varint) => {
            let Some(v) = cursor.read_varint() else {
                return false;
            };
            Value::I64(i64::from_le_bytes(v.to_le_bytes()))
        }
        (FieldKind::Int64, WireKind::Fixed64) => {
            let Some(v) = cursor.read_fixed64() else {
                return false;
            };
            Value::I64(i64::from_le_bytes(v.to_le_bytes()))
        }
        (FieldKind::Message(nested_name), WireKind::LengthDelimited) => {
            let Some(data) = cursor.read_length_delimited() else {
                return false;
            };
            match catalog.get(nested_name) {
                Some(nested) => Value::Record(decode_message(catalog, nested, data)),
                None => {
                    trace!(target: "wire.decode", schema = nested_name, "nested schema not declared, dropping");
                    return true;
                }
            }
        }
        // Observed wire kind disagrees with the declared one. Our
        // reconstruction of this field is wrong or the format moved;
        // consume it like an unmodeled field.
        (_, _) => {
            trace!(
                target: "wire.decode",
                field = field.name,
                wire = ?wire,
                "wire kind mismatch, skipping"
            );
            return skip_field(cursor, wire);
        }
    };

    store(record, field, value);
    true
}

fn store(record: &mut Record, field: &FieldDef, value: Value) {
    if field.repeated {
        match record
            .fields
            .entry(field.name)
            .or_insert_with(|| Value::List(Vec::new()))
        {
            Value::List(values) => values.push(value),
            other => *other = Value::List(vec![value]),
        }
    } else {
        record.fields.insert(field.name, value);
    }
}

/// Consume an unmodeled field's payload according to its wire kind.
/// Returns false on truncation.
fn skip_field(cursor: &mut Cursor<'_>, wire: WireKind) -> bool {
    match wire {
        WireKind::Varint => cursor.read_varint().is_some(),
        WireKind::Fixed64 => cursor.advance(8),
        WireKind::Fixed32 => cursor.advance(4),
        WireKind::LengthDelimited => cursor.read_length_delimited().is_some(),
        WireKind::GroupStart => skip_group(cursor),
        // A stray end-group has no matching start; treat as malformed.
        WireKind::GroupEnd => false,
    }
}

/// Skip to the end-group tag matching an already-consumed start-group.
fn skip_group(cursor: &mut Cursor<'_>) -> bool {
    loop {
        let Some(tag) = cursor.read_varint() else {
            return false;
        };
        let Some(wire) = WireKind::from_tag_bits(tag & 0x7) else {
            return false;
        };
        match wire {
            WireKind::GroupEnd => return true,
            other => {
                if !skip_field(cursor, other) {
                    return false;
                }
            }
        }
    }
}

/// Read cursor over one message's bytes, driven by [`bytes::Buf`].
/// Every read is preceded by a `remaining` check so truncation always
/// surfaces as `None`, never a panic.
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_at_end(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Read a base-128 varint, up to 10 bytes.
    fn read_varint(&mut self) -> Option<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            if !self.buf.has_remaining() {
                return None;
            }
            let byte = self.buf.get_u8();
            if shift < 64 {
                value |= u64::from(byte & 0x7f) << shift;
            }
            if byte & 0x80 == 0 {
                return Some(value);
            }
            shift += 7;
            if shift >= 70 {
                // Over-long varint, not a valid encoding.
                return None;
            }
        }
    }

    /// Borrow the next `len` bytes. The slice outlives the cursor since
    /// nested messages decode recursively from it.
    fn read_slice(&mut self, len: usize) -> Option<&'a [u8]> {
        let remaining: &'a [u8] = self.buf;
        let slice = remaining.get(..len)?;
        self.buf.advance(len);
        Some(slice)
    }

    fn read_length_delimited(&mut self) -> Option<&'a [u8]> {
        let len = usize::try_from(self.read_varint()?).ok()?;
        self.read_slice(len)
    }

    fn read_fixed64(&mut self) -> Option<u64> {
        if self.buf.remaining() < 8 {
            return None;
        }
        Some(self.buf.get_u64_le())
    }

    fn advance(&mut self, len: usize) -> bool {
        if self.buf.remaining() < len {
            return false;
        }
        self.buf.advance(len);
        true
    }
}
