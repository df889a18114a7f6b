//! Session tuning knobs.

use serde::{Deserialize, Serialize};

/// Configuration for one [`crate::MeetingSession`].
///
/// Defaults match the observed system's behavior; every knob is an
/// explicit, documented deviation from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Optional cap on the caption replay log, in entries. `None` (the
    /// default) keeps every applied caption for the lifetime of the
    /// session so a full transcript stays reconstructable; a limit
    /// drops the oldest entries first. The keyed
    /// highest-version-per-caption map is never pruned either way.
    pub caption_replay_limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keeps_full_replay_log() {
        let config = SessionConfig::default();
        assert!(config.caption_replay_limit.is_none());
    }
}
