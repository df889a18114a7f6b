//! Stream attribution: which participant produced this track/packet.
//!
//! Correlates live media track identifiers with stream ids and, for
//! mixed audio, with transport-reported contributing-source (SSRC)
//! identifiers. Attribution is only ever reported when it is
//! unambiguous; zero or multiple candidate participants surface as
//! [`AudioAttribution::Unattributed`], never an arbitrary pick.

use crate::outputs::DeviceOutputRegistry;
use crate::participants::{Participant, ParticipantDirectory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Binding of one live media track to its signaling stream id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackBinding {
    /// Media track identifier from the host runtime.
    pub track_id: String,
    /// First stream id observed for the track.
    pub stream_id: String,
    /// True for screen-share tracks.
    pub screen_share: bool,
    /// When the track arrived, epoch milliseconds.
    pub first_seen_at: i64,
}

/// Outcome of contributing-source correlation for one receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AudioAttribution {
    /// Exactly one participant accounts for the receiver's current
    /// contributing sources.
    Attributed(Participant),
    /// Zero or multiple candidates; attribution is not guessed.
    Unattributed,
}

/// Track bindings and contributing-source caches for one session.
#[derive(Debug, Default)]
pub struct StreamAttribution {
    tracks: HashMap<String, TrackBinding>,
    /// Cached active-track selection; `None` means recompute. Cleared
    /// on every insert/delete so a stale selection is never served
    /// after a track ends.
    active: Option<Option<String>>,
    /// Latest contributing-source list per receiver handle.
    sources: HashMap<String, Vec<u32>>,
}

impl StreamAttribution {
    /// Create an empty attribution table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly arrived track, stamped with the current time.
    pub fn track_started(&mut self, track_id: &str, stream_id: &str, screen_share: bool) {
        self.track_started_at(
            track_id,
            stream_id,
            screen_share,
            chrono::Utc::now().timestamp_millis(),
        );
    }

    /// Record a track with an explicit arrival stamp.
    pub fn track_started_at(
        &mut self,
        track_id: &str,
        stream_id: &str,
        screen_share: bool,
        first_seen_at: i64,
    ) {
        self.tracks.insert(
            track_id.to_string(),
            TrackBinding {
                track_id: track_id.to_string(),
                stream_id: stream_id.to_string(),
                screen_share,
                first_seen_at,
            },
        );
        self.active = None;
    }

    /// Remove a track on its end-of-track signal.
    pub fn track_ended(&mut self, track_id: &str) {
        if self.tracks.remove(track_id).is_some() {
            self.active = None;
        }
    }

    /// Select the single active track: the latest-arrived screen-share
    /// track when any exists, otherwise the latest-arrived camera
    /// track, otherwise none. The selection is cached until the track
    /// set changes.
    pub fn select_active_track(&mut self) -> Option<&TrackBinding> {
        if self.active.is_none() {
            let selected = self.compute_active().map(String::from);
            if let Some(track_id) = &selected {
                debug!(target: "engine.tracks", track_id = %track_id, "active track selected");
            }
            self.active = Some(selected);
        }
        self.active
            .as_ref()
            .and_then(Option::as_ref)
            .and_then(|id| self.tracks.get(id))
    }

    fn compute_active(&self) -> Option<&str> {
        let latest = |screen_share: bool| {
            self.tracks
                .values()
                .filter(|t| t.screen_share == screen_share)
                // Tie-break on track id so equal stamps stay stable.
                .max_by(|a, b| {
                    a.first_seen_at
                        .cmp(&b.first_seen_at)
                        .then_with(|| a.track_id.cmp(&b.track_id))
                })
        };
        latest(true)
            .or_else(|| latest(false))
            .map(|t| t.track_id.as_str())
    }

    /// Replace the contributing-source list for a receiver handle. The
    /// cache has no lifecycle of its own beyond its receiver.
    pub fn set_contributing_sources(&mut self, receiver: &str, ssrcs: Vec<u32>) {
        self.sources.insert(receiver.to_string(), ssrcs);
    }

    /// Drop the cache for a receiver that went away.
    pub fn remove_receiver(&mut self, receiver: &str) {
        self.sources.remove(receiver);
    }

    /// Current contributing sources for a receiver, if any.
    #[must_use]
    pub fn contributing_sources(&self, receiver: &str) -> &[u32] {
        self.sources.get(receiver).map_or(&[], Vec::as_slice)
    }

    /// Map a receiver's contributing sources through stream and device
    /// resolution. Audio stream ids are the decimal rendering of the
    /// transport SSRC, which is how the two layers correlate.
    #[must_use]
    pub fn correlate_audio_contributors(
        &self,
        receiver: &str,
        registry: &DeviceOutputRegistry,
        directory: &ParticipantDirectory,
    ) -> AudioAttribution {
        let mut candidate: Option<Participant> = None;

        for ssrc in self.contributing_sources(receiver) {
            let Some(participant) =
                resolve_participant_for_stream(&ssrc.to_string(), registry, directory)
            else {
                continue;
            };
            match &candidate {
                None => candidate = Some(participant),
                Some(existing) if existing.device_id == participant.device_id => {}
                Some(_) => {
                    debug!(
                        target: "engine.attribution",
                        receiver = %receiver,
                        "multiple candidate participants, reporting unattributed"
                    );
                    return AudioAttribution::Unattributed;
                }
            }
        }

        match candidate {
            Some(participant) => AudioAttribution::Attributed(participant),
            None => AudioAttribution::Unattributed,
        }
    }

    /// Number of live track bindings.
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Resolve a raw stream id to the participant producing it: registry
/// hop to a device id, directory hop to a participant. Absent on any
/// missed hop; never an error.
#[must_use]
pub fn resolve_participant_for_stream(
    stream_id: &str,
    registry: &DeviceOutputRegistry,
    directory: &ParticipantDirectory,
) -> Option<Participant> {
    let device_id = registry.device_for_stream(stream_id)?;
    directory.lookup(device_id).cloned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::outputs::{DeviceOutput, OutputKind};
    use crate::participants::MeetingStatus;

    fn participant(device_id: &str) -> Participant {
        Participant {
            device_id: device_id.to_string(),
            display_name: Some(device_id.to_uppercase()),
            full_name: None,
            profile_picture_url: None,
            status_code: 1,
            status: MeetingStatus::InMeeting,
            parent_device_id: None,
        }
    }

    fn audio_output(device_id: &str, ssrc: u32) -> DeviceOutput {
        DeviceOutput {
            device_id: device_id.to_string(),
            kind: OutputKind::Audio,
            stream_id: ssrc.to_string(),
            disabled: false,
            updated_at: 0,
        }
    }

    #[test]
    fn test_latest_screen_share_beats_any_camera() {
        let mut attribution = StreamAttribution::new();
        attribution.track_started_at("A", "s-a", true, 5);
        attribution.track_started_at("B", "s-b", false, 10);
        attribution.track_started_at("C", "s-c", true, 15);

        let active = attribution.select_active_track().unwrap();
        assert_eq!(active.track_id, "C");
    }

    #[test]
    fn test_camera_fallback_when_no_screen_share() {
        let mut attribution = StreamAttribution::new();
        attribution.track_started_at("A", "s-a", false, 5);
        attribution.track_started_at("B", "s-b", false, 10);

        assert_eq!(attribution.select_active_track().unwrap().track_id, "B");
    }

    #[test]
    fn test_no_tracks_selects_none() {
        let mut attribution = StreamAttribution::new();
        assert!(attribution.select_active_track().is_none());
    }

    #[test]
    fn test_selection_cache_invalidated_on_track_end() {
        let mut attribution = StreamAttribution::new();
        attribution.track_started_at("A", "s-a", true, 5);
        attribution.track_started_at("B", "s-b", false, 10);

        assert_eq!(attribution.select_active_track().unwrap().track_id, "A");

        // The ended screen-share must never be served from the cache.
        attribution.track_ended("A");
        assert_eq!(attribution.select_active_track().unwrap().track_id, "B");

        attribution.track_ended("B");
        assert!(attribution.select_active_track().is_none());
    }

    #[test]
    fn test_resolve_participant_for_stream_hops() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![audio_output("d1", 111)]);
        let mut directory = ParticipantDirectory::new();
        directory.apply_full_roster(vec![participant("d1")]);

        let resolved = resolve_participant_for_stream("111", &registry, &directory).unwrap();
        assert_eq!(resolved.device_id, "d1");

        // Missed registry hop.
        assert!(resolve_participant_for_stream("999", &registry, &directory).is_none());

        // Missed directory hop.
        registry.upsert_batch(vec![audio_output("unknown", 222)]);
        assert!(resolve_participant_for_stream("222", &registry, &directory).is_none());
    }

    #[test]
    fn test_single_contributor_attributes() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![audio_output("d1", 111)]);
        let mut directory = ParticipantDirectory::new();
        directory.apply_full_roster(vec![participant("d1")]);

        let mut attribution = StreamAttribution::new();
        attribution.set_contributing_sources("recv-1", vec![111]);

        let outcome = attribution.correlate_audio_contributors("recv-1", &registry, &directory);
        assert!(
            matches!(outcome, AudioAttribution::Attributed(ref p) if p.device_id == "d1"),
            "got {outcome:?}"
        );
    }

    #[test]
    fn test_two_distinct_participants_is_unattributed() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![audio_output("d1", 111), audio_output("d2", 222)]);
        let mut directory = ParticipantDirectory::new();
        directory.apply_full_roster(vec![participant("d1"), participant("d2")]);

        let mut attribution = StreamAttribution::new();
        attribution.set_contributing_sources("recv-1", vec![111, 222]);

        let outcome = attribution.correlate_audio_contributors("recv-1", &registry, &directory);
        assert_eq!(outcome, AudioAttribution::Unattributed);
    }

    #[test]
    fn test_duplicate_sources_for_one_participant_still_attribute() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![audio_output("d1", 111)]);
        let mut directory = ParticipantDirectory::new();
        directory.apply_full_roster(vec![participant("d1")]);

        let mut attribution = StreamAttribution::new();
        // Same ssrc repeated plus one unresolvable ssrc.
        attribution.set_contributing_sources("recv-1", vec![111, 111, 999]);

        let outcome = attribution.correlate_audio_contributors("recv-1", &registry, &directory);
        assert!(matches!(outcome, AudioAttribution::Attributed(_)));
    }

    #[test]
    fn test_no_sources_is_unattributed() {
        let registry = DeviceOutputRegistry::new();
        let directory = ParticipantDirectory::new();
        let attribution = StreamAttribution::new();

        let outcome = attribution.correlate_audio_contributors("recv-1", &registry, &directory);
        assert_eq!(outcome, AudioAttribution::Unattributed);
    }

    #[test]
    fn test_receiver_refresh_replaces_sources() {
        let mut attribution = StreamAttribution::new();
        attribution.set_contributing_sources("recv-1", vec![1, 2]);
        attribution.set_contributing_sources("recv-1", vec![3]);

        assert_eq!(attribution.contributing_sources("recv-1"), &[3]);

        attribution.remove_receiver("recv-1");
        assert!(attribution.contributing_sources("recv-1").is_empty());
    }
}
