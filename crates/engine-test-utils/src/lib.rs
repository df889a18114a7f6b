//! # Engine Test Utilities
//!
//! Shared test utilities for the wire protocol and the meeting engine.
//!
//! The engine only ever decodes the proprietary wire format, so the
//! encoder lives here, test-side: [`MessageBuilder`] emits raw
//! tag/field buffers byte by byte, and [`fixtures`] assembles them into
//! the payload shapes the engine ingests (roster responses, collection
//! events, caption wrappers).
//!
//! ## Usage
//!
//! ```rust
//! use engine_test_utils::{fixtures, TestUser};
//!
//! let payload = fixtures::roster_payload(&[
//!     TestUser::new("device-1").display_name("Ada").status(1),
//! ]);
//! // feed `payload` to MeetingSession::apply_roster_payload
//! ```

pub mod builder;
pub mod fixtures;

pub use builder::MessageBuilder;
pub use fixtures::{TestCaption, TestOutput, TestUser};
