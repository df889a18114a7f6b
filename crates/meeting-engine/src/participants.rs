//! Participant directory: roster reconciliation and diffing.
//!
//! The signaling layer never says "user left". It delivers periodic
//! full-roster snapshots plus low-latency single-user deltas that
//! cannot distinguish join from leave. The directory reconciles both
//! into two maps:
//!
//! - a current snapshot, replaced wholesale on every full-roster sync,
//! - an all-ever-seen superset that is merged into and never deleted
//!   from (a soft-delete log, so attribution can still name a
//!   participant whose streams outlive their roster entry).
//!
//! Removal therefore only ever originates from a full-roster sync;
//! deltas always upsert (optimistic-join heuristic with bounded
//! staleness, corrected by the next sync).

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use wire_protocol::Record;

/// Humanized meeting-presence status, derived from the numeric code the
/// wire carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    /// Status code 1.
    InMeeting,
    /// Status code 3.
    RequestedToJoin,
    /// Status code 6.
    NotInMeeting,
    /// Status code 7.
    RemovedFromMeeting,
    /// Any other code.
    Unknown,
}

impl MeetingStatus {
    /// Map the observed numeric status code.
    #[must_use]
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => Self::InMeeting,
            3 => Self::RequestedToJoin,
            6 => Self::NotInMeeting,
            7 => Self::RemovedFromMeeting,
            _ => Self::Unknown,
        }
    }
}

/// One meeting participant, keyed by device id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier for the participant's client device.
    pub device_id: String,
    /// Short display name, when present.
    pub display_name: Option<String>,
    /// Full name, when present.
    pub full_name: Option<String>,
    /// Profile-picture reference, when present.
    pub profile_picture_url: Option<String>,
    /// Raw numeric status code from the wire.
    pub status_code: u64,
    /// Humanized status derived from `status_code`.
    pub status: MeetingStatus,
    /// Present iff this entry is a screen-share sub-stream owned by the
    /// parent device.
    pub parent_device_id: Option<String>,
}

impl Participant {
    /// Normalize a decoded `UserDetails` record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingIdentity`] when the record lacks a
    /// device id; the caller drops that record and continues its batch.
    pub fn from_record(record: &Record) -> crate::errors::Result<Self> {
        let device_id = record
            .str_field("deviceId")
            .ok_or(EngineError::MissingIdentity("deviceId"))?
            .to_string();
        let status_code = record.u64_field("status").unwrap_or(0);

        Ok(Self {
            device_id,
            display_name: record.str_field("displayName").map(str::to_string),
            full_name: record.str_field("fullName").map(str::to_string),
            profile_picture_url: record.str_field("profilePictureUrl").map(str::to_string),
            status_code,
            status: MeetingStatus::from_code(status_code),
            parent_device_id: record.str_field("parentDeviceId").map(str::to_string),
        })
    }

    /// True when this entry is a screen-share sub-stream rather than a
    /// person.
    #[must_use]
    pub fn is_screen_share(&self) -> bool {
        self.parent_device_id.is_some()
    }
}

/// Three-way roster diff between successive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterDiff {
    /// Device ids not previously present.
    pub new_participants: Vec<Participant>,
    /// Previously present device ids now absent from the snapshot.
    pub removed_participants: Vec<Participant>,
    /// Same device id, changed content.
    pub updated_participants: Vec<Participant>,
}

impl RosterDiff {
    /// True when the sync was a no-op; no notification is emitted then.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_participants.is_empty()
            && self.removed_participants.is_empty()
            && self.updated_participants.is_empty()
    }
}

/// Canonical participant-by-device-id state for one session.
#[derive(Debug, Default)]
pub struct ParticipantDirectory {
    /// Current snapshot, replaced wholesale on each full-roster sync.
    current: HashMap<String, Participant>,
    /// Append-mostly superset of everyone ever seen; never deleted
    /// from, only overwritten.
    all_seen: HashMap<String, Participant>,
}

impl ParticipantDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a full-roster sync.
    ///
    /// Duplicate device ids within one sync are first-occurrence-wins.
    /// Replaces the current snapshot wholesale, merges into the
    /// all-ever-seen superset, and returns the three-way diff against
    /// the previous snapshot, or `None` when nothing changed.
    pub fn apply_full_roster(&mut self, roster: Vec<Participant>) -> Option<RosterDiff> {
        let mut next: HashMap<String, Participant> = HashMap::with_capacity(roster.len());
        let mut diff = RosterDiff::default();

        for participant in roster {
            if next.contains_key(&participant.device_id) {
                debug!(
                    target: "engine.roster",
                    device_id = %participant.device_id,
                    "duplicate device id in sync, keeping first occurrence"
                );
                continue;
            }

            match self.current.get(&participant.device_id) {
                None => diff.new_participants.push(participant.clone()),
                Some(previous) if *previous != participant => {
                    diff.updated_participants.push(participant.clone());
                }
                Some(_) => {}
            }
            next.insert(participant.device_id.clone(), participant);
        }

        let mut removed: Vec<Participant> = self
            .current
            .values()
            .filter(|p| !next.contains_key(&p.device_id))
            .cloned()
            .collect();
        removed.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        diff.removed_participants = removed;

        for participant in next.values() {
            self.all_seen
                .insert(participant.device_id.clone(), participant.clone());
        }
        self.current = next;

        if diff.is_empty() {
            None
        } else {
            debug!(
                target: "engine.roster",
                new = diff.new_participants.len(),
                removed = diff.removed_participants.len(),
                updated = diff.updated_participants.len(),
                "full-roster sync applied"
            );
            Some(diff)
        }
    }

    /// Apply a low-latency single-user delta.
    ///
    /// The event cannot distinguish join from leave, so the policy is
    /// to always upsert into the current roster and let the next
    /// full-roster sync correct any staleness. A delta never produces a
    /// removal.
    pub fn apply_user_delta(&mut self, participant: Participant) -> Option<RosterDiff> {
        let mut diff = RosterDiff::default();

        match self.current.get(&participant.device_id) {
            None => diff.new_participants.push(participant.clone()),
            Some(previous) if *previous != participant => {
                diff.updated_participants.push(participant.clone());
            }
            Some(_) => {}
        }

        self.all_seen
            .insert(participant.device_id.clone(), participant.clone());
        self.current
            .insert(participant.device_id.clone(), participant);

        if diff.is_empty() {
            None
        } else {
            Some(diff)
        }
    }

    /// Look up a participant by device id: the current snapshot first,
    /// falling back to the all-ever-seen superset so streams that
    /// outlive their roster entry still resolve to a name.
    #[must_use]
    pub fn lookup(&self, device_id: &str) -> Option<&Participant> {
        self.current
            .get(device_id)
            .or_else(|| self.all_seen.get(device_id))
    }

    /// Participants in the current snapshot.
    #[must_use]
    pub fn current_snapshot(&self) -> Vec<&Participant> {
        self.current.values().collect()
    }

    /// Participants currently in the meeting (status `in_meeting`).
    #[must_use]
    pub fn in_meeting(&self) -> Vec<&Participant> {
        self.current
            .values()
            .filter(|p| p.status == MeetingStatus::InMeeting)
            .collect()
    }

    /// Screen-share sub-streams in the current snapshot, i.e. who is
    /// presenting right now.
    #[must_use]
    pub fn presenting(&self) -> Vec<&Participant> {
        self.current
            .values()
            .filter(|p| p.is_screen_share())
            .collect()
    }

    /// Everyone ever seen this session.
    #[must_use]
    pub fn all_seen(&self) -> Vec<&Participant> {
        self.all_seen.values().collect()
    }
}
