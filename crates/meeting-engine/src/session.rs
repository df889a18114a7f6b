//! Per-meeting session context.
//!
//! `MeetingSession` exclusively owns the five reconciliation structures
//! and is the only place raw payloads enter the engine. One session is
//! constructed when a meeting capture starts and dropped when it ends,
//! so concurrent sessions (tests, multiple simultaneous meetings) never
//! collide on shared state.
//!
//! Ingestion is synchronous and transactional per message: a payload is
//! decoded fully before any structure is touched, so malformed input
//! leaves prior state untouched and is never partially applied across
//! two structures.

use crate::attribution::{self, AudioAttribution, StreamAttribution, TrackBinding};
use crate::captions::{Caption, CaptionLedger};
use crate::config::SessionConfig;
use crate::outputs::{DeviceOutput, DeviceOutputRegistry, OutputKind};
use crate::participants::{Participant, ParticipantDirectory, RosterDiff};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wire_protocol::{decode, Record, SchemaCatalog, Value};

/// What one collection event changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    /// Roster change from any single-user deltas in the event.
    pub roster_diff: Option<RosterDiff>,
    /// Post-batch device-output snapshot, present whenever the event
    /// carried an output batch (emitted on every batch upsert).
    pub output_snapshot: Option<Vec<DeviceOutput>>,
}

/// All reconciliation state for one meeting.
pub struct MeetingSession {
    catalog: SchemaCatalog,
    participants: ParticipantDirectory,
    outputs: DeviceOutputRegistry,
    captions: CaptionLedger,
    attribution: StreamAttribution,
    chat_fragments_seen: u64,
}

impl Default for MeetingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MeetingSession {
    /// Session with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&SessionConfig::default())
    }

    /// Session with explicit configuration.
    #[must_use]
    pub fn with_config(config: &SessionConfig) -> Self {
        Self {
            catalog: wire_protocol::catalog(),
            participants: ParticipantDirectory::new(),
            outputs: DeviceOutputRegistry::new(),
            captions: CaptionLedger::with_replay_limit(config.caption_replay_limit),
            attribution: StreamAttribution::new(),
            chat_fragments_seen: 0,
        }
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Apply a periodic full-roster payload (`UserInfoListResponse`).
    ///
    /// Returns the roster diff, or `None` for a no-op sync. Records
    /// missing their device id are dropped individually; the batch
    /// continues.
    pub fn apply_roster_payload(&mut self, payload: &[u8]) -> Option<RosterDiff> {
        let record = self.decode_or_warn("UserInfoListResponse", payload)?;
        if record.is_empty() {
            // Garbage input decodes to an empty record; that must not
            // be mistaken for an authoritative empty roster (the
            // service always includes at least the local participant).
            warn!(target: "engine.roster", "empty roster decode, leaving state untouched");
            return None;
        }
        let roster = normalize_users(record.repeated("users"));
        self.participants.apply_full_roster(roster)
    }

    /// Apply a data-channel event payload (`CollectionEvent`).
    ///
    /// An event may carry any combination of single-user deltas, a
    /// device-output batch, and chat fragments; each section is routed
    /// independently. Chat is pass-through logged, deliberately
    /// unmodeled.
    pub fn apply_collection_payload(&mut self, payload: &[u8]) -> CollectionOutcome {
        let mut outcome = CollectionOutcome::default();
        let Some(event) = self.decode_or_warn("CollectionEvent", payload) else {
            return outcome;
        };
        let Some(body) = event.record_field("body") else {
            return outcome;
        };

        if let Some(wrapper) = body.record_field("userDetails") {
            let mut diff = RosterDiff::default();
            for user in normalize_users(wrapper.repeated("users")) {
                if let Some(delta) = self.participants.apply_user_delta(user) {
                    diff.new_participants.extend(delta.new_participants);
                    diff.updated_participants.extend(delta.updated_participants);
                }
            }
            if !diff.is_empty() {
                outcome.roster_diff = Some(diff);
            }
        }

        if let Some(list) = body.record_field("deviceOutputs") {
            let batch: Vec<DeviceOutput> = list
                .repeated("outputs")
                .iter()
                .filter_map(Value::as_record)
                .filter_map(|r| match DeviceOutput::from_record(r) {
                    Ok(output) => Some(output),
                    Err(e) => {
                        warn!(target: "engine.outputs", error = %e, "dropping output record");
                        None
                    }
                })
                .collect();
            outcome.output_snapshot = Some(self.outputs.upsert_batch(batch));
        }

        for chat in body.repeated("chatMessages").iter().filter_map(Value::as_record) {
            self.chat_fragments_seen += 1;
            debug!(
                target: "engine.chat",
                device_id = chat.str_field("deviceId").unwrap_or("<unknown>"),
                message_id = chat.str_field("messageId").unwrap_or("<unknown>"),
                "chat fragment observed (unmodeled)"
            );
        }

        outcome
    }

    /// Apply a caption-channel payload (`CaptionWrapper`).
    ///
    /// Returns the newly applied caption for live transcript streaming,
    /// or `None` when the fragment was stale, duplicate, or malformed.
    pub fn apply_caption_payload(&mut self, payload: &[u8]) -> Option<Caption> {
        let wrapper = self.decode_or_warn("CaptionWrapper", payload)?;
        let record = wrapper.record_field("caption")?;
        let header_timestamp = wrapper.i64_field("timestamp");
        let received_at = chrono::Utc::now().timestamp_millis();

        let caption = match Caption::from_record(record, header_timestamp, received_at) {
            Ok(caption) => caption,
            Err(e) => {
                warn!(target: "engine.captions", error = %e, "dropping caption record");
                return None;
            }
        };

        self.captions.upsert(caption.clone()).then_some(caption)
    }

    /// Record a track-lifecycle arrival.
    pub fn track_started(&mut self, track_id: &str, stream_id: &str, screen_share: bool) {
        self.attribution.track_started(track_id, stream_id, screen_share);
    }

    /// Record an end-of-track signal.
    pub fn track_ended(&mut self, track_id: &str) {
        self.attribution.track_ended(track_id);
    }

    /// Refresh the contributing-source list for a receiver handle.
    pub fn set_contributing_sources(&mut self, receiver: &str, ssrcs: Vec<u32>) {
        self.attribution.set_contributing_sources(receiver, ssrcs);
    }

    // ------------------------------------------------------------------
    // Query surface
    // ------------------------------------------------------------------

    /// Select the single active track (latest screen-share, else latest
    /// camera, else none).
    pub fn select_active_track(&mut self) -> Option<&TrackBinding> {
        self.attribution.select_active_track()
    }

    /// Resolve a raw stream id to the participant producing it.
    #[must_use]
    pub fn resolve_participant_for_stream(&self, stream_id: &str) -> Option<Participant> {
        attribution::resolve_participant_for_stream(stream_id, &self.outputs, &self.participants)
    }

    /// Correlate a receiver's contributing sources to a participant.
    #[must_use]
    pub fn correlate_audio_contributors(&self, receiver: &str) -> AudioAttribution {
        self.attribution
            .correlate_audio_contributors(receiver, &self.outputs, &self.participants)
    }

    /// True iff some enabled output carries this stream id.
    #[must_use]
    pub fn is_stream_active(&self, stream_id: &str) -> bool {
        self.outputs.is_stream_active(stream_id)
    }

    /// Resolve the output entry for a device and kind.
    #[must_use]
    pub fn resolve_output(&self, device_id: &str, kind: OutputKind) -> Option<&DeviceOutput> {
        self.outputs.resolve(device_id, kind)
    }

    /// Read access to the participant directory.
    #[must_use]
    pub fn participants(&self) -> &ParticipantDirectory {
        &self.participants
    }

    /// Read access to the device-output registry.
    #[must_use]
    pub fn outputs(&self) -> &DeviceOutputRegistry {
        &self.outputs
    }

    /// Read access to the caption ledger.
    #[must_use]
    pub fn captions(&self) -> &CaptionLedger {
        &self.captions
    }

    /// How many chat fragments passed through (logged, unmodeled).
    #[must_use]
    pub fn chat_fragments_seen(&self) -> u64 {
        self.chat_fragments_seen
    }

    /// Decode with a catalog schema. The schema names here are static,
    /// so a lookup failure is a bug worth a warning, not a panic.
    fn decode_or_warn(&self, schema: &'static str, payload: &[u8]) -> Option<Record> {
        match decode(&self.catalog, schema, payload) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(target: "engine.session", schema, error = %e, "decode failed");
                None
            }
        }
    }
}

/// Normalize a repeated `UserDetails` list, dropping records without an
/// identity.
fn normalize_users(values: &[Value]) -> Vec<Participant> {
    values
        .iter()
        .filter_map(Value::as_record)
        .filter_map(|r| match Participant::from_record(r) {
            Ok(participant) => Some(participant),
            Err(e) => {
                warn!(target: "engine.roster", error = %e, "dropping participant record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use engine_test_utils::{fixtures, TestCaption, TestOutput, TestUser};

    #[test]
    fn test_roster_payload_produces_diff() {
        let mut session = MeetingSession::new();

        let payload = fixtures::roster_payload(&[
            TestUser::new("d1").display_name("Ada").status(1),
            TestUser::new("d2").status(6),
        ]);
        let diff = session.apply_roster_payload(&payload).unwrap();

        assert_eq!(diff.new_participants.len(), 2);
        assert_eq!(session.participants().in_meeting().len(), 1);
    }

    #[test]
    fn test_malformed_payload_leaves_state_untouched() {
        let mut session = MeetingSession::new();
        let payload = fixtures::roster_payload(&[TestUser::new("d1")]);
        session.apply_roster_payload(&payload);

        assert!(session.apply_roster_payload(&[0xff; 32]).is_none());
        assert_eq!(session.participants().current_snapshot().len(), 1);
    }

    #[test]
    fn test_collection_outputs_round_trip() {
        let mut session = MeetingSession::new();

        let payload =
            fixtures::collection_with_outputs(&[TestOutput::video("d1", "s1")]);
        let outcome = session.apply_collection_payload(&payload);

        let snapshot = outcome.output_snapshot.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(session.is_stream_active("s1"));
        assert_eq!(
            session.resolve_output("d1", OutputKind::Video).unwrap().stream_id,
            "s1"
        );
    }

    #[test]
    fn test_caption_payload_applies_once() {
        let mut session = MeetingSession::new();
        let payload = fixtures::caption_payload(&TestCaption::new("d1", 7, 2, "hello"));

        assert!(session.apply_caption_payload(&payload).is_some());
        // Replay of the same version is a silent no-op.
        assert!(session.apply_caption_payload(&payload).is_none());
        assert_eq!(session.captions().replay_len(), 1);
    }

    #[test]
    fn test_chat_fragments_are_counted_not_modeled() {
        let mut session = MeetingSession::new();
        let payload = fixtures::collection_with_chat("d1", "m1", "hi all");

        let outcome = session.apply_collection_payload(&payload);
        assert_eq!(outcome, CollectionOutcome::default());
        assert_eq!(session.chat_fragments_seen(), 1);
    }

    #[test]
    fn test_session_isolation() {
        let mut a = MeetingSession::new();
        let b = MeetingSession::new();

        let payload = fixtures::roster_payload(&[TestUser::new("d1")]);
        a.apply_roster_payload(&payload);

        assert_eq!(a.participants().current_snapshot().len(), 1);
        assert!(b.participants().current_snapshot().is_empty());
    }
}
