//! Meeting engine error types.
//!
//! Nothing in this taxonomy is fatal to the host: malformed bytes
//! already degrade to partial decodes inside `wire-protocol`, stale
//! caption versions and unknown stream ids are ordinary no-ops, and a
//! record that fails normalization is dropped individually while its
//! batch continues. These types exist so the drop sites can say
//! precisely why.

use thiserror::Error;

/// Why one decoded record could not be normalized into engine state.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Record lacks the field that keys it (e.g. a participant without
    /// a device id). The record is dropped; the batch continues.
    #[error("Record missing identity field: {0}")]
    MissingIdentity(&'static str),

    /// Record carries a value outside the observed domain (e.g. an
    /// output type code that is neither audio nor video).
    #[error("Unrecognized {field} code: {code}")]
    UnrecognizedCode {
        /// Field whose value was out of domain.
        field: &'static str,
        /// The offending code.
        code: u64,
    },

    /// Requested a schema the catalog does not declare.
    #[error(transparent)]
    Decode(#[from] wire_protocol::DecodeError),
}

/// Result type alias using `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;
