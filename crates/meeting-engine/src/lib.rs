//! Meeting-state reconciliation engine.
//!
//! Ingests binary event messages captured from a live conferencing
//! session's signaling and data channels and reconciles the decoded
//! fragments into a consistent, queryable model of participants, their
//! audio/video stream bindings, and closed captions.
//!
//! The wire carries observed-and-inferred message shapes with only
//! add/update semantics: there is no explicit "user left" signal,
//! delivery order is not guaranteed, and captions arrive as duplicate,
//! superseding, or stale versions. The engine therefore produces a
//! best-effort, monotonically-improving snapshot:
//!
//! - A periodic full-roster sync is authoritative and corrects drift
//!   accumulated from incremental delta events.
//! - Device-output bindings are last-write-wins with a freshness stamp,
//!   never deleted.
//! - Captions keep only the strictly highest version per caption id.
//! - Stream attribution answers "which participant produced this
//!   track/packet", and reports ambiguity explicitly instead of
//!   guessing.
//!
//! All state for one meeting lives in a [`MeetingSession`], constructed
//! at session start and dropped at session end; nothing here is a
//! process-lifetime global. Ingestion is single-threaded and
//! synchronous: one message is processed to completion before the next,
//! every public operation returns a value instead of raising, and one
//! bad message never stops ingestion of the ones after it.
//!
//! # Modules
//!
//! - [`participants`] - roster reconciliation and diffing
//! - [`outputs`] - (device, output kind) to stream id registry
//! - [`captions`] - version-resolved caption ledger with replay log
//! - [`attribution`] - track selection and participant attribution
//! - [`session`] - the per-meeting context owning all of the above
//! - [`config`] - session tuning knobs
//! - [`errors`] - error taxonomy for dropped records

pub mod attribution;
pub mod captions;
pub mod config;
pub mod errors;
pub mod outputs;
pub mod participants;
pub mod session;

pub use attribution::{AudioAttribution, StreamAttribution, TrackBinding};
pub use captions::{Caption, CaptionLedger};
pub use config::SessionConfig;
pub use errors::EngineError;
pub use outputs::{DeviceOutput, DeviceOutputRegistry, OutputKind};
pub use participants::{MeetingStatus, Participant, ParticipantDirectory, RosterDiff};
pub use session::{CollectionOutcome, MeetingSession};
