//! Wire format decoding for the meeting signaling channels.
//!
//! The conferencing service's signaling and data channels carry a
//! proprietary tag/field binary format with no published schema. Every
//! message shape in this crate is observed-and-inferred: field numbers
//! and kinds were recovered by watching live traffic, and messages
//! routinely carry vendor fields we have never modeled. The decoder is
//! therefore built around two rules:
//!
//! - Unknown field numbers are always skipped, wire-kind-aware, so a
//!   new vendor field never breaks decoding of the fields we do know.
//! - Truncated or malformed input yields whatever was parsed up to the
//!   bad byte instead of an error, so one mangled tail never discards
//!   an entire event.
//!
//! Decoding is driven by the declarative table in [`schema`]; adding a
//! newly discovered field is a data edit, never a decoder change.

#![warn(clippy::pedantic)]

pub mod decoder;
pub mod schema;

pub use decoder::{decode, decode_prefix, DecodeError, Record, Value};
pub use schema::{catalog, FieldDef, FieldKind, MessageDef, SchemaCatalog, WireKind};
