//! Device-output registry: (device id, output kind) to stream id.
//!
//! Output bindings arrive in batches on the data channel and are never
//! explicitly removed. The signaling layer is assumed authoritative, so
//! every upsert is unconditional last-write-wins; staleness is inferred
//! from the freshness stamp, not from deletion. This also makes the
//! registry tolerant of out-of-order delivery: replaying a batch is
//! harmless.

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use wire_protocol::Record;

/// Kind of media output a device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Output type code 1.
    Audio,
    /// Output type code 2.
    Video,
}

impl OutputKind {
    /// Map the observed output type code.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Audio),
            2 => Some(Self::Video),
            _ => None,
        }
    }
}

/// Binding of one (device, output kind) pair to a media stream id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOutput {
    /// Device producing the output.
    pub device_id: String,
    /// Audio or video.
    pub kind: OutputKind,
    /// Raw media stream id from the signaling layer.
    pub stream_id: String,
    /// True when the output is currently disabled (muted / camera off).
    pub disabled: bool,
    /// Freshness stamp, epoch milliseconds, set on upsert.
    pub updated_at: i64,
}

impl DeviceOutput {
    /// Normalize a decoded `DeviceOutputInfo` record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingIdentity`] when the device id is
    /// absent, or [`EngineError::UnrecognizedCode`] for an output type
    /// outside {audio, video}; either way the record is dropped and the
    /// batch continues.
    pub fn from_record(record: &Record) -> crate::errors::Result<Self> {
        let device_id = record
            .str_field("deviceId")
            .ok_or(EngineError::MissingIdentity("deviceId"))?
            .to_string();
        let code = record
            .u64_field("outputType")
            .ok_or(EngineError::MissingIdentity("outputType"))?;
        let kind = OutputKind::from_code(code).ok_or(EngineError::UnrecognizedCode {
            field: "outputType",
            code,
        })?;

        Ok(Self {
            device_id,
            kind,
            stream_id: record.str_field("streamId").unwrap_or_default().to_string(),
            disabled: record.u64_field("disabled").unwrap_or(0) != 0,
            updated_at: 0,
        })
    }
}

/// Registry of device outputs for one session.
///
/// Keyed by device id first so `resolve` and the attribution path can
/// query with a borrowed id, no per-lookup allocation.
#[derive(Debug, Default)]
pub struct DeviceOutputRegistry {
    outputs: HashMap<String, HashMap<OutputKind, DeviceOutput>>,
}

impl DeviceOutputRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a batch of outputs, stamping each with the current time,
    /// and return the full post-batch snapshot (emitted to consumers on
    /// every batch).
    pub fn upsert_batch(&mut self, batch: impl IntoIterator<Item = DeviceOutput>) -> Vec<DeviceOutput> {
        let now = chrono::Utc::now().timestamp_millis();
        for mut output in batch {
            output.updated_at = now;
            self.outputs
                .entry(output.device_id.clone())
                .or_default()
                .insert(output.kind, output);
        }
        self.snapshot()
    }

    /// Resolve the output entry for a device and kind.
    #[must_use]
    pub fn resolve(&self, device_id: &str, kind: OutputKind) -> Option<&DeviceOutput> {
        self.outputs.get(device_id).and_then(|kinds| kinds.get(&kind))
    }

    /// True iff some entry carries this stream id and is not disabled.
    /// An unknown stream id is simply inactive, not an error.
    #[must_use]
    pub fn is_stream_active(&self, stream_id: &str) -> bool {
        self.iter_all()
            .any(|o| o.stream_id == stream_id && !o.disabled)
    }

    /// Device id producing the given stream, preferring enabled
    /// entries when a stale disabled binding still carries the id.
    #[must_use]
    pub fn device_for_stream(&self, stream_id: &str) -> Option<&str> {
        let mut fallback = None;
        for output in self.iter_all() {
            if output.stream_id != stream_id {
                continue;
            }
            if !output.disabled {
                return Some(&output.device_id);
            }
            fallback = Some(output.device_id.as_str());
        }
        fallback
    }

    /// Current snapshot, ordered by (device id, kind) for stable
    /// consumer output.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceOutput> {
        let mut entries: Vec<DeviceOutput> = self.iter_all().cloned().collect();
        entries.sort_by(|a, b| a.device_id.cmp(&b.device_id).then(a.kind.cmp(&b.kind)));
        entries
    }

    fn iter_all(&self) -> impl Iterator<Item = &DeviceOutput> {
        self.outputs.values().flat_map(HashMap::values)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn output(device_id: &str, kind: OutputKind, stream_id: &str, disabled: bool) -> DeviceOutput {
        DeviceOutput {
            device_id: device_id.to_string(),
            kind,
            stream_id: stream_id.to_string(),
            disabled,
            updated_at: 0,
        }
    }

    #[test]
    fn test_upsert_then_resolve_round_trip() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![output("d1", OutputKind::Video, "s1", false)]);

        assert!(registry.is_stream_active("s1"));
        let entry = registry.resolve("d1", OutputKind::Video).unwrap();
        assert_eq!(entry.stream_id, "s1");
        assert!(entry.updated_at > 0);
    }

    #[test]
    fn test_unknown_stream_is_inactive_not_an_error() {
        let registry = DeviceOutputRegistry::new();
        assert!(!registry.is_stream_active("nope"));
        assert!(registry.resolve("d1", OutputKind::Audio).is_none());
        assert!(registry.device_for_stream("nope").is_none());
    }

    #[test]
    fn test_disabled_stream_is_not_active() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![output("d1", OutputKind::Audio, "s1", true)]);

        assert!(!registry.is_stream_active("s1"));
        // The binding itself still resolves.
        assert_eq!(registry.device_for_stream("s1"), Some("d1"));
    }

    #[test]
    fn test_upsert_is_last_write_wins() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![output("d1", OutputKind::Video, "s1", false)]);
        registry.upsert_batch(vec![output("d1", OutputKind::Video, "s2", false)]);

        let entry = registry.resolve("d1", OutputKind::Video).unwrap();
        assert_eq!(entry.stream_id, "s2");
        assert!(!registry.is_stream_active("s1"));
    }

    #[test]
    fn test_audio_and_video_are_separate_keys() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![
            output("d1", OutputKind::Audio, "a1", false),
            output("d1", OutputKind::Video, "v1", false),
        ]);

        assert_eq!(
            registry.resolve("d1", OutputKind::Audio).unwrap().stream_id,
            "a1"
        );
        assert_eq!(
            registry.resolve("d1", OutputKind::Video).unwrap().stream_id,
            "v1"
        );
    }

    #[test]
    fn test_same_kind_on_different_devices_stays_isolated() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![
            output("d1", OutputKind::Video, "v1", false),
            output("d2", OutputKind::Video, "v2", false),
        ]);

        assert_eq!(
            registry.resolve("d1", OutputKind::Video).unwrap().stream_id,
            "v1"
        );
        assert_eq!(
            registry.resolve("d2", OutputKind::Video).unwrap().stream_id,
            "v2"
        );
        assert!(registry.resolve("d3", OutputKind::Video).is_none());
    }

    #[test]
    fn test_batch_returns_full_snapshot() {
        let mut registry = DeviceOutputRegistry::new();
        registry.upsert_batch(vec![output("d1", OutputKind::Audio, "a1", false)]);
        let snapshot = registry.upsert_batch(vec![output("d2", OutputKind::Video, "v2", false)]);

        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_from_record_drops_unrecognized_output_type() {
        let mut record = Record::new("DeviceOutputInfo");
        record.insert("deviceId", wire_protocol::Value::Str("d1".to_string()));
        record.insert("outputType", wire_protocol::Value::U64(9));

        let result = DeviceOutput::from_record(&record);
        assert!(matches!(
            result,
            Err(EngineError::UnrecognizedCode { code: 9, .. })
        ));
    }
}
