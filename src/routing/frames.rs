//! JSON wire frames.
//!
//! Clients send `{"type":"chat","content":"..","recipientId":n}`. The server
//! sends `chat`, `status` and `error` frames, all tagged by `type` and using
//! camelCase keys. Snake-case aliases are accepted when parsing server frames
//! so older clients' fixtures still decode.

use crate::error::ProtocolError;
use crate::state::{Frame, Identity, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Loosely typed inbound frame; classified by [`decode`].
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(rename = "recipientId", default)]
    recipient_id: Option<i64>,
}

/// A chat request as received from a client, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub content: String,
    pub recipient_id: UserId,
}

impl ChatRequest {
    /// Stamp the request with the sending connection's identity and the current time.
    pub fn into_message(self, sender: &Identity) -> ChatMessage {
        ChatMessage {
            sender_id: sender.user_id,
            sender_name: sender.display_name.clone(),
            recipient_id: self.recipient_id,
            content: self.content,
            created_at: Utc::now(),
        }
    }
}

/// Decode one inbound text frame.
///
/// Oversized, malformed, non-chat and invalid chat frames all come back as a
/// [`ProtocolError`]; none of them is fatal to the connection.
pub fn decode(text: &str, max_bytes: usize) -> Result<ChatRequest, ProtocolError> {
    if text.len() > max_bytes {
        return Err(ProtocolError::Oversized {
            size: text.len(),
            max: max_bytes,
        });
    }

    let raw: RawFrame =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    if raw.kind != "chat" {
        return Err(ProtocolError::UnsupportedType(raw.kind));
    }

    let request = ChatRequest {
        content: raw.content.unwrap_or_default(),
        recipient_id: raw.recipient_id.unwrap_or(0),
    };
    validate_chat(&request.content, request.recipient_id)?;
    Ok(request)
}

/// A chat message after enrichment; this is what gets persisted and delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_id: UserId,
    pub sender_name: String,
    pub recipient_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        validate_chat(&self.content, self.recipient_id)
    }

    /// The delivered form, carrying the id assigned by the message store.
    pub fn to_frame(&self, id: i64) -> ServerFrame {
        ServerFrame::Chat(ChatFrame {
            id,
            sender_id: self.sender_id,
            sender_username: self.sender_name.clone(),
            recipient_id: self.recipient_id,
            content: self.content.clone(),
            created_at: self.created_at,
        })
    }
}

fn validate_chat(content: &str, recipient_id: UserId) -> Result<(), ProtocolError> {
    if recipient_id <= 0 {
        return Err(ProtocolError::InvalidRecipient(recipient_id));
    }
    if content.is_empty() {
        return Err(ProtocolError::EmptyContent);
    }
    Ok(())
}

/// Frames sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Chat(ChatFrame),
    Status(StatusFrame),
    Error(ErrorFrame),
}

impl ServerFrame {
    pub fn encode(&self) -> Frame {
        match serde_json::to_string(self) {
            Ok(json) => Frame::from(json),
            Err(e) => {
                tracing::error!(error = %e, frame = ?self, "Failed to serialize server frame");
                Frame::from("")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFrame {
    pub id: i64,
    #[serde(alias = "sender_id")]
    pub sender_id: UserId,
    #[serde(alias = "sender_username")]
    pub sender_username: String,
    #[serde(alias = "recipient_id")]
    pub recipient_id: UserId,
    pub content: String,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Presence transition as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFrame {
    pub user_id: UserId,
    pub nickname: String,
    pub online: bool,
    pub time: DateTime<Utc>,
}

/// Negative acknowledgement for a chat message that was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFrame {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recipient_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
}
