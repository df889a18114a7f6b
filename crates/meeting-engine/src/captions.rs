//! Caption ledger: version-resolved caption fragments plus replay log.
//!
//! The caption channel redelivers utterances as they are refined: the
//! same caption id arrives repeatedly with monotonically increasing
//! versions, and delivery order is not guaranteed, so duplicates and
//! stale versions are the normal case. The ledger applies an update
//! only when its version strictly exceeds the retained one (equal is a
//! no-op, keeping downstream notifications idempotent) and appends
//! every applied update to an ordered replay log. The log is never
//! compacted mid-session; deduplication to highest-version happens only
//! at export time in [`CaptionLedger::transcript`].

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;
use wire_protocol::Record;

/// One caption fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    /// Stable per-utterance identifier.
    pub caption_id: u64,
    /// Device id of the speaker.
    pub device_id: String,
    /// Monotonic version within one caption id.
    pub version: u64,
    /// Caption text as of this version.
    pub text: String,
    /// Language identifier from the wire.
    pub language_id: u64,
    /// Timestamp from the wrapper header, when present.
    pub header_timestamp: Option<i64>,
    /// Local receipt stamp, epoch milliseconds; drives `replay_since`.
    pub received_at: i64,
}

impl Caption {
    /// Normalize a decoded `Caption` record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingIdentity`] when the caption id or
    /// speaker device id is absent.
    pub fn from_record(
        record: &Record,
        header_timestamp: Option<i64>,
        received_at: i64,
    ) -> crate::errors::Result<Self> {
        let caption_id = record
            .u64_field("captionId")
            .ok_or(EngineError::MissingIdentity("captionId"))?;
        let device_id = record
            .str_field("deviceId")
            .ok_or(EngineError::MissingIdentity("deviceId"))?
            .to_string();

        Ok(Self {
            caption_id,
            device_id,
            version: record.u64_field("version").unwrap_or(0),
            text: record.str_field("text").unwrap_or_default().to_string(),
            language_id: record.u64_field("languageId").unwrap_or(0),
            header_timestamp,
            received_at,
        })
    }
}

/// Deduplicating caption store for one session.
#[derive(Debug, Default)]
pub struct CaptionLedger {
    /// Highest version per caption id.
    by_id: HashMap<u64, Caption>,
    /// Applied updates in arrival order.
    replay_log: Vec<Caption>,
    /// Optional cap on the replay log; oldest entries drop first.
    replay_limit: Option<usize>,
}

impl CaptionLedger {
    /// Ledger with an unbounded replay log (the default behavior).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger with an optional replay-log cap.
    #[must_use]
    pub fn with_replay_limit(replay_limit: Option<usize>) -> Self {
        Self {
            replay_limit,
            ..Self::default()
        }
    }

    /// Apply a caption fragment.
    ///
    /// Applies iff no entry exists for the caption id or the new
    /// version strictly exceeds the retained one. Returns whether the
    /// ledger changed; an equal or lower version is a no-op.
    pub fn upsert(&mut self, caption: Caption) -> bool {
        if let Some(existing) = self.by_id.get(&caption.caption_id) {
            if caption.version <= existing.version {
                trace!(
                    target: "engine.captions",
                    caption_id = caption.caption_id,
                    version = caption.version,
                    retained = existing.version,
                    "stale caption version, no-op"
                );
                return false;
            }
        }

        self.replay_log.push(caption.clone());
        if let Some(limit) = self.replay_limit {
            if self.replay_log.len() > limit {
                let excess = self.replay_log.len() - limit;
                self.replay_log.drain(..excess);
            }
        }
        self.by_id.insert(caption.caption_id, caption);
        true
    }

    /// Latest retained version of one caption.
    #[must_use]
    pub fn get(&self, caption_id: u64) -> Option<&Caption> {
        self.by_id.get(&caption_id)
    }

    /// Every retained caption, ordered by caption id.
    #[must_use]
    pub fn all(&self) -> Vec<&Caption> {
        let mut captions: Vec<&Caption> = self.by_id.values().collect();
        captions.sort_by_key(|c| c.caption_id);
        captions
    }

    /// Applied updates received at or after `since` (epoch ms), in
    /// arrival order, superseded versions included.
    #[must_use]
    pub fn replay_since(&self, since: i64) -> Vec<&Caption> {
        self.replay_log
            .iter()
            .filter(|c| c.received_at >= since)
            .collect()
    }

    /// Export-time transcript: first-appearance order from the replay
    /// log, each caption at its highest retained version.
    #[must_use]
    pub fn transcript(&self) -> Vec<&Caption> {
        let mut seen = std::collections::HashSet::new();
        self.replay_log
            .iter()
            .filter(|c| seen.insert(c.caption_id))
            .filter_map(|c| self.by_id.get(&c.caption_id))
            .collect()
    }

    /// Number of applied updates currently in the replay log.
    #[must_use]
    pub fn replay_len(&self) -> usize {
        self.replay_log.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn caption(caption_id: u64, version: u64, text: &str, received_at: i64) -> Caption {
        Caption {
            caption_id,
            device_id: "d1".to_string(),
            version,
            text: text.to_string(),
            language_id: 0,
            header_timestamp: None,
            received_at,
        }
    }

    #[test]
    fn test_first_sighting_applies() {
        let mut ledger = CaptionLedger::new();
        assert!(ledger.upsert(caption(1, 0, "hel", 10)));
        assert_eq!(ledger.get(1).unwrap().text, "hel");
    }

    #[test]
    fn test_higher_version_replaces_in_place() {
        let mut ledger = CaptionLedger::new();
        ledger.upsert(caption(1, 1, "hel", 10));
        assert!(ledger.upsert(caption(1, 2, "hello", 11)));

        assert_eq!(ledger.get(1).unwrap().text, "hello");
        assert_eq!(ledger.all().len(), 1);
    }

    #[test]
    fn test_equal_version_is_idempotent_no_op() {
        let mut ledger = CaptionLedger::new();
        ledger.upsert(caption(1, 2, "hello", 10));

        assert!(!ledger.upsert(caption(1, 2, "hello", 11)));
        assert_eq!(ledger.replay_len(), 1);
    }

    #[test]
    fn test_lower_version_after_higher_is_no_op() {
        let mut ledger = CaptionLedger::new();
        ledger.upsert(caption(1, 3, "hello world", 10));

        assert!(!ledger.upsert(caption(1, 1, "hel", 11)));
        assert_eq!(ledger.get(1).unwrap().version, 3);
        assert_eq!(ledger.replay_len(), 1);
    }

    #[test]
    fn test_replay_log_keeps_superseded_versions() {
        let mut ledger = CaptionLedger::new();
        ledger.upsert(caption(1, 1, "hel", 10));
        ledger.upsert(caption(1, 2, "hello", 20));
        ledger.upsert(caption(2, 1, "next", 30));

        assert_eq!(ledger.replay_len(), 3);
        let since_20: Vec<u64> = ledger.replay_since(20).iter().map(|c| c.version).collect();
        assert_eq!(since_20, vec![2, 1]);
    }

    #[test]
    fn test_transcript_dedups_to_highest_version_in_order() {
        let mut ledger = CaptionLedger::new();
        ledger.upsert(caption(1, 1, "hel", 10));
        ledger.upsert(caption(2, 1, "wor", 20));
        ledger.upsert(caption(1, 2, "hello", 30));
        ledger.upsert(caption(2, 3, "world", 40));

        let transcript: Vec<&str> = ledger.transcript().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(transcript, vec!["hello", "world"]);
    }

    #[test]
    fn test_replay_limit_drops_oldest_first() {
        let mut ledger = CaptionLedger::with_replay_limit(Some(2));
        ledger.upsert(caption(1, 1, "a", 10));
        ledger.upsert(caption(2, 1, "b", 20));
        ledger.upsert(caption(3, 1, "c", 30));

        assert_eq!(ledger.replay_len(), 2);
        let ids: Vec<u64> = ledger.replay_since(0).iter().map(|c| c.caption_id).collect();
        assert_eq!(ids, vec![2, 3]);
        // The keyed map is never pruned.
        assert!(ledger.get(1).is_some());
    }

    #[test]
    fn test_from_record_requires_caption_id_and_speaker() {
        let mut record = Record::new("Caption");
        record.insert("text", wire_protocol::Value::Str("hi".to_string()));

        assert!(matches!(
            Caption::from_record(&record, None, 0),
            Err(EngineError::MissingIdentity("captionId"))
        ));

        record.insert("captionId", wire_protocol::Value::U64(5));
        assert!(matches!(
            Caption::from_record(&record, None, 0),
            Err(EngineError::MissingIdentity("deviceId"))
        ));
    }
}
