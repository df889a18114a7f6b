//! Hand-rolled encoder for the tag/field wire format.
//!
//! Mirrors the encoding the conferencing service uses on its signaling
//! channels: varint tags of (field number << 3 | wire kind), base-128
//! varints, little-endian fixed fields, and varint-length-prefixed
//! strings and nested messages.

use bytes::{BufMut, BytesMut};

const WIRE_VARINT: u32 = 0;
const WIRE_FIXED64: u32 = 1;
const WIRE_LENGTH_DELIMITED: u32 = 2;
const WIRE_GROUP_START: u32 = 3;
const WIRE_GROUP_END: u32 = 4;
const WIRE_FIXED32: u32 = 5;

/// Builder for one encoded message.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    buf: BytesMut,
}

impl MessageBuilder {
    /// Create an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a varint field.
    #[must_use]
    pub fn varint(mut self, field: u32, value: u64) -> Self {
        self.put_tag(field, WIRE_VARINT);
        self.put_varint(value);
        self
    }

    /// Append a fixed 8-byte little-endian field.
    #[must_use]
    pub fn fixed64(mut self, field: u32, value: u64) -> Self {
        self.put_tag(field, WIRE_FIXED64);
        self.buf.put_u64_le(value);
        self
    }

    /// Append a fixed 4-byte little-endian field.
    #[must_use]
    pub fn fixed32(mut self, field: u32, value: u32) -> Self {
        self.put_tag(field, WIRE_FIXED32);
        self.buf.put_u32_le(value);
        self
    }

    /// Append a UTF-8 string field.
    #[must_use]
    pub fn string(mut self, field: u32, value: &str) -> Self {
        self.put_tag(field, WIRE_LENGTH_DELIMITED);
        self.put_varint(value.len() as u64);
        self.buf.put_slice(value.as_bytes());
        self
    }

    /// Append a length-delimited field with raw bytes.
    #[must_use]
    pub fn bytes_field(mut self, field: u32, raw: &[u8]) -> Self {
        self.put_tag(field, WIRE_LENGTH_DELIMITED);
        self.put_varint(raw.len() as u64);
        self.buf.put_slice(raw);
        self
    }

    /// Append a nested message field.
    #[must_use]
    pub fn message(self, field: u32, inner: MessageBuilder) -> Self {
        let encoded = inner.build();
        self.bytes_field(field, &encoded)
    }

    /// Append a deprecated group field wrapping the inner message's
    /// fields between start-group and end-group tags.
    #[must_use]
    pub fn group(mut self, field: u32, inner: MessageBuilder) -> Self {
        self.put_tag(field, WIRE_GROUP_START);
        self.buf.put_slice(&inner.build());
        self.put_tag(field, WIRE_GROUP_END);
        self
    }

    /// Finish and return the encoded bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.buf.freeze().to_vec()
    }

    fn put_tag(&mut self, field: u32, wire: u32) {
        self.put_varint(u64::from(field << 3 | wire));
    }

    fn put_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.put_u8(byte);
                break;
            }
            self.buf.put_u8(byte | 0x80);
        }
    }
}
