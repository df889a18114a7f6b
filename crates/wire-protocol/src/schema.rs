//! Declarative schema catalog for the observed message shapes.
//!
//! There is no authoritative schema for this format. Each
//! [`MessageDef`] below is the current best reconstruction of one
//! logical message, and two definitions may share a name while
//! differing only by newly discovered fields; registration keeps the
//! most complete one so the decoder always works from the fullest
//! picture we have.

use std::collections::HashMap;

/// Low-level byte encoding of one field, taken from the tag's low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    /// Base-128 varint, high bit of each byte marks continuation.
    Varint,
    /// 8 bytes, little-endian.
    Fixed64,
    /// Varint length prefix followed by that many bytes.
    LengthDelimited,
    /// Start of a deprecated group; runs to the matching group end.
    GroupStart,
    /// End of a deprecated group.
    GroupEnd,
    /// 4 bytes, little-endian.
    Fixed32,
}

impl WireKind {
    /// Parse the wire kind from the low three bits of a tag.
    #[must_use]
    pub fn from_tag_bits(bits: u64) -> Option<Self> {
        match bits {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::GroupStart),
            4 => Some(Self::GroupEnd),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }
}

/// How a known field decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 string (length-delimited on the wire).
    String,
    /// Unsigned varint.
    Varint,
    /// 64-bit integer. The wire carries these either as a plain varint
    /// or as a fixed 8-byte value; both normalize to `i64`.
    Int64,
    /// Nested message, decoded recursively with the named schema.
    Message(&'static str),
}

/// Declared decoding for one known field number.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Field name used as the record key.
    pub name: &'static str,
    /// Observed field number.
    pub number: u32,
    /// How the field decodes.
    pub kind: FieldKind,
    /// Repeated fields accumulate in arrival order; scalar fields are
    /// last-write-wins.
    pub repeated: bool,
}

/// One named message shape.
#[derive(Debug)]
pub struct MessageDef {
    /// Logical message name, e.g. `"UserDetails"`.
    pub name: &'static str,
    /// Known fields, by observed field number.
    pub fields: &'static [FieldDef],
}

impl MessageDef {
    /// Look up the definition for a field number, if modeled.
    #[must_use]
    pub fn field(&self, number: u32) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.number == number)
    }
}

/// Named message-type definitions resolving the format's ambiguity.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    defs: HashMap<&'static str, &'static MessageDef>,
}

impl SchemaCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message definition.
    ///
    /// When two definitions share a name the one declaring more fields
    /// wins, so a partially reverse-engineered older shape never
    /// shadows a more complete one.
    pub fn register(&mut self, def: &'static MessageDef) {
        match self.defs.get(def.name) {
            Some(existing) if existing.fields.len() >= def.fields.len() => {}
            _ => {
                self.defs.insert(def.name, def);
            }
        }
    }

    /// Look up a message definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static MessageDef> {
        self.defs.get(name).copied()
    }
}

// ---------------------------------------------------------------------------
// Observed message shapes
// ---------------------------------------------------------------------------

/// Periodic full-roster network response.
static USER_INFO_LIST_RESPONSE: MessageDef = MessageDef {
    name: "UserInfoListResponse",
    fields: &[FieldDef {
        name: "users",
        number: 2,
        kind: FieldKind::Message("UserDetails"),
        repeated: true,
    }],
};

/// First reconstruction of the participant record, kept for the
/// catalog's forward-compatibility rule.
static USER_DETAILS_INITIAL: MessageDef = MessageDef {
    name: "UserDetails",
    fields: &[
        FieldDef {
            name: "deviceId",
            number: 1,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "fullName",
            number: 2,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "profilePictureUrl",
            number: 3,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "status",
            number: 11,
            kind: FieldKind::Varint,
            repeated: false,
        },
    ],
};

/// Current participant record. Field 21 is only present when the entry
/// is a screen-share sub-stream owned by the parent device.
static USER_DETAILS: MessageDef = MessageDef {
    name: "UserDetails",
    fields: &[
        FieldDef {
            name: "deviceId",
            number: 1,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "fullName",
            number: 2,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "profilePictureUrl",
            number: 3,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "status",
            number: 11,
            kind: FieldKind::Varint,
            repeated: false,
        },
        FieldDef {
            name: "parentDeviceId",
            number: 21,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "displayName",
            number: 29,
            kind: FieldKind::String,
            repeated: false,
        },
    ],
};

/// Data-channel event envelope.
static COLLECTION_EVENT: MessageDef = MessageDef {
    name: "CollectionEvent",
    fields: &[FieldDef {
        name: "body",
        number: 1,
        kind: FieldKind::Message("EventBody"),
        repeated: false,
    }],
};

/// Body of a data-channel event. Any combination of the wrappers may be
/// present in one event.
static EVENT_BODY: MessageDef = MessageDef {
    name: "EventBody",
    fields: &[
        FieldDef {
            name: "chatMessages",
            number: 4,
            kind: FieldKind::Message("ChatMessage"),
            repeated: true,
        },
        FieldDef {
            name: "deviceOutputs",
            number: 6,
            kind: FieldKind::Message("DeviceOutputInfoList"),
            repeated: false,
        },
        FieldDef {
            name: "userDetails",
            number: 13,
            kind: FieldKind::Message("UserDetailsEvent"),
            repeated: false,
        },
    ],
};

/// Low-latency single-user delta wrapper.
static USER_DETAILS_EVENT: MessageDef = MessageDef {
    name: "UserDetailsEvent",
    fields: &[FieldDef {
        name: "users",
        number: 1,
        kind: FieldKind::Message("UserDetails"),
        repeated: true,
    }],
};

static DEVICE_OUTPUT_INFO_LIST: MessageDef = MessageDef {
    name: "DeviceOutputInfoList",
    fields: &[FieldDef {
        name: "outputs",
        number: 2,
        kind: FieldKind::Message("DeviceOutputInfo"),
        repeated: true,
    }],
};

/// Binding of one (device, output kind) pair to a media stream id.
static DEVICE_OUTPUT_INFO: MessageDef = MessageDef {
    name: "DeviceOutputInfo",
    fields: &[
        FieldDef {
            name: "streamId",
            number: 2,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "deviceId",
            number: 3,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "outputType",
            number: 8,
            kind: FieldKind::Varint,
            repeated: false,
        },
        FieldDef {
            name: "disabled",
            number: 9,
            kind: FieldKind::Varint,
            repeated: false,
        },
    ],
};

/// Chat fragment. Observed but deliberately unmodeled beyond
/// pass-through logging in the engine.
static CHAT_MESSAGE: MessageDef = MessageDef {
    name: "ChatMessage",
    fields: &[
        FieldDef {
            name: "deviceId",
            number: 1,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "messageId",
            number: 2,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "timestamp",
            number: 3,
            kind: FieldKind::Int64,
            repeated: false,
        },
        FieldDef {
            name: "body",
            number: 5,
            kind: FieldKind::String,
            repeated: false,
        },
    ],
};

/// Caption-channel envelope.
static CAPTION_WRAPPER: MessageDef = MessageDef {
    name: "CaptionWrapper",
    fields: &[
        FieldDef {
            name: "timestamp",
            number: 1,
            kind: FieldKind::Int64,
            repeated: false,
        },
        FieldDef {
            name: "caption",
            number: 2,
            kind: FieldKind::Message("Caption"),
            repeated: false,
        },
    ],
};

/// One caption fragment. `captionId` is stable per utterance and
/// `version` is monotonic per caption id.
static CAPTION: MessageDef = MessageDef {
    name: "Caption",
    fields: &[
        FieldDef {
            name: "deviceId",
            number: 1,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "captionId",
            number: 2,
            kind: FieldKind::Varint,
            repeated: false,
        },
        FieldDef {
            name: "version",
            number: 3,
            kind: FieldKind::Varint,
            repeated: false,
        },
        FieldDef {
            name: "text",
            number: 6,
            kind: FieldKind::String,
            repeated: false,
        },
        FieldDef {
            name: "languageId",
            number: 8,
            kind: FieldKind::Varint,
            repeated: false,
        },
    ],
};

static ALL_SCHEMAS: &[&MessageDef] = &[
    &USER_INFO_LIST_RESPONSE,
    &USER_DETAILS_INITIAL,
    &USER_DETAILS,
    &COLLECTION_EVENT,
    &EVENT_BODY,
    &USER_DETAILS_EVENT,
    &DEVICE_OUTPUT_INFO_LIST,
    &DEVICE_OUTPUT_INFO,
    &CHAT_MESSAGE,
    &CAPTION_WRAPPER,
    &CAPTION,
];

/// Build the catalog of every message shape observed on the wire.
#[must_use]
pub fn catalog() -> SchemaCatalog {
    let mut catalog = SchemaCatalog::new();
    for def in ALL_SCHEMAS {
        catalog.register(def);
    }
    catalog
}
