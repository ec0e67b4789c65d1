use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PeerChatError, Result};

/// Tags understood by this version of the protocol
pub const KNOWN_TAGS: [&str; 8] = [
    "message",
    "file-info",
    "file-data",
    "file-complete",
    "typing",
    "read-receipt",
    "ping",
    "pong",
];

/// File metadata repeated inside every `file-data` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Everything that travels over the data channel.
///
/// On the wire this is a JSON object tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Envelope {
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        content: String,
        timestamp: u64,
    },
    FileInfo {
        file_id: String,
        name: String,
        size: u64,
        mime_type: String,
        timestamp: u64,
    },
    FileData {
        file_id: String,
        file_info: FileMeta,
        #[serde(with = "base64_bytes")]
        chunk: Vec<u8>,
    },
    FileComplete {
        file_id: String,
        timestamp: u64,
    },
    Typing {
        is_typing: bool,
    },
    ReadReceipt {
        message_id: String,
    },
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
}

impl Envelope {
    /// Wire tag of this envelope
    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::Message { .. } => "message",
            Envelope::FileInfo { .. } => "file-info",
            Envelope::FileData { .. } => "file-data",
            Envelope::FileComplete { .. } => "file-complete",
            Envelope::Typing { .. } => "typing",
            Envelope::ReadReceipt { .. } => "read-receipt",
            Envelope::Ping { .. } => "ping",
            Envelope::Pong { .. } => "pong",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a received payload.
    ///
    /// Payloads with a tag outside [`KNOWN_TAGS`] decode to
    /// [`Incoming::Unknown`]; a payload that is not a tagged JSON object, or a
    /// known tag with bad fields, is an error.
    pub fn decode(bytes: &[u8]) -> Result<Incoming> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| PeerChatError::InvalidEnvelope(e.to_string()))?;

        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| PeerChatError::InvalidEnvelope("missing \"type\" tag".to_string()))?
            .to_string();

        if !KNOWN_TAGS.contains(&tag.as_str()) {
            warn!("Unknown data type received: {}", tag);
            return Ok(Incoming::Unknown { tag });
        }

        serde_json::from_value(value)
            .map(Incoming::Known)
            .map_err(|e| PeerChatError::InvalidEnvelope(format!("{}: {}", tag, e)))
    }
}

/// A decoded payload from a peer
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Known(Envelope),
    Unknown { tag: String },
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
