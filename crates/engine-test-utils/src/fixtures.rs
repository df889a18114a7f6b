//! Pre-configured payloads matching the observed message shapes.
//!
//! Field numbers here must stay in lockstep with the schema catalog in
//! `wire-protocol`; they encode the same reconstruction of the wire
//! format from the other side.

use crate::builder::MessageBuilder;

/// A participant record for roster payloads.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub device_id: String,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub status: u64,
    pub parent_device_id: Option<String>,
}

impl TestUser {
    /// A user with the given device id, in-meeting by default.
    #[must_use]
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            full_name: None,
            display_name: None,
            profile_picture_url: None,
            status: 1,
            parent_device_id: None,
        }
    }

    #[must_use]
    pub fn full_name(mut self, name: &str) -> Self {
        self.full_name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn profile_picture(mut self, url: &str) -> Self {
        self.profile_picture_url = Some(url.to_string());
        self
    }

    #[must_use]
    pub fn status(mut self, code: u64) -> Self {
        self.status = code;
        self
    }

    /// Mark this entry as a screen-share sub-stream of `parent`.
    #[must_use]
    pub fn parent(mut self, parent: &str) -> Self {
        self.parent_device_id = Some(parent.to_string());
        self
    }

    fn encode(&self) -> MessageBuilder {
        let mut b = MessageBuilder::new().string(1, &self.device_id);
        if let Some(name) = &self.full_name {
            b = b.string(2, name);
        }
        if let Some(url) = &self.profile_picture_url {
            b = b.string(3, url);
        }
        b = b.varint(11, self.status);
        if let Some(parent) = &self.parent_device_id {
            b = b.string(21, parent);
        }
        if let Some(name) = &self.display_name {
            b = b.string(29, name);
        }
        b
    }
}

/// A device-output record for collection events.
#[derive(Debug, Clone)]
pub struct TestOutput {
    pub device_id: String,
    pub stream_id: String,
    /// 1 = audio, 2 = video.
    pub output_type: u64,
    pub disabled: bool,
}

impl TestOutput {
    #[must_use]
    pub fn video(device_id: &str, stream_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            stream_id: stream_id.to_string(),
            output_type: 2,
            disabled: false,
        }
    }

    #[must_use]
    pub fn audio(device_id: &str, stream_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            stream_id: stream_id.to_string(),
            output_type: 1,
            disabled: false,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    fn encode(&self) -> MessageBuilder {
        MessageBuilder::new()
            .string(2, &self.stream_id)
            .string(3, &self.device_id)
            .varint(8, self.output_type)
            .varint(9, u64::from(self.disabled))
    }
}

/// A caption fragment for caption-channel payloads.
#[derive(Debug, Clone)]
pub struct TestCaption {
    pub device_id: String,
    pub caption_id: u64,
    pub version: u64,
    pub text: String,
    pub language_id: u64,
    pub header_timestamp: Option<i64>,
}

impl TestCaption {
    #[must_use]
    pub fn new(device_id: &str, caption_id: u64, version: u64, text: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            caption_id,
            version,
            text: text.to_string(),
            language_id: 0,
            header_timestamp: None,
        }
    }

    #[must_use]
    pub fn language(mut self, language_id: u64) -> Self {
        self.language_id = language_id;
        self
    }

    #[must_use]
    pub fn header_timestamp(mut self, ts: i64) -> Self {
        self.header_timestamp = Some(ts);
        self
    }
}

/// Encode a full-roster `UserInfoListResponse` payload.
#[must_use]
pub fn roster_payload(users: &[TestUser]) -> Vec<u8> {
    let mut b = MessageBuilder::new();
    for user in users {
        b = b.message(2, user.encode());
    }
    b.build()
}

/// Encode a `CollectionEvent` carrying a device-output batch.
#[must_use]
pub fn collection_with_outputs(outputs: &[TestOutput]) -> Vec<u8> {
    let mut list = MessageBuilder::new();
    for output in outputs {
        list = list.message(2, output.encode());
    }
    let body = MessageBuilder::new().message(6, list);
    MessageBuilder::new().message(1, body).build()
}

/// Encode a `CollectionEvent` carrying single-user deltas.
#[must_use]
pub fn collection_with_users(users: &[TestUser]) -> Vec<u8> {
    let mut wrapper = MessageBuilder::new();
    for user in users {
        wrapper = wrapper.message(1, user.encode());
    }
    let body = MessageBuilder::new().message(13, wrapper);
    MessageBuilder::new().message(1, body).build()
}

/// Encode a `CollectionEvent` carrying a chat fragment.
#[must_use]
pub fn collection_with_chat(device_id: &str, message_id: &str, text: &str) -> Vec<u8> {
    let chat = MessageBuilder::new()
        .string(1, device_id)
        .string(2, message_id)
        .varint(3, 1_700_000_000_000)
        .string(5, text);
    let body = MessageBuilder::new().message(4, chat);
    MessageBuilder::new().message(1, body).build()
}

/// Encode a `CaptionWrapper` payload.
#[must_use]
pub fn caption_payload(caption: &TestCaption) -> Vec<u8> {
    let inner = MessageBuilder::new()
        .string(1, &caption.device_id)
        .varint(2, caption.caption_id)
        .varint(3, caption.version)
        .string(6, &caption.text)
        .varint(8, caption.language_id);
    let mut wrapper = MessageBuilder::new();
    if let Some(ts) = caption.header_timestamp {
        wrapper = wrapper.varint(1, u64::from_le_bytes(ts.to_le_bytes()));
    }
    wrapper.message(2, inner).build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_payload_is_nonempty_per_user() {
        assert!(roster_payload(&[]).is_empty());
        assert!(!roster_payload(&[TestUser::new("d1")]).is_empty());
    }

    #[test]
    fn test_caption_payload_carries_optional_header() {
        let without = caption_payload(&TestCaption::new("d1", 1, 1, "hi"));
        let with = caption_payload(&TestCaption::new("d1", 1, 1, "hi").header_timestamp(99));
        assert!(with.len() > without.len());
    }
}
