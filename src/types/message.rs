use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::user::FileRef;

/// Number of trailing id characters used as a human-typable reference.
pub const SHORT_ID_LEN: usize = 6;

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique, time-sortable (ULID) message identifier.
    #[serde(rename = "_id")]
    pub id: String,

    /// Channel the message was posted in.
    pub channel: String,

    /// Author's user id.
    pub author: String,

    /// Text content; attachment-only messages have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Attached files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<FileRef>,

    /// Ids of messages this one replies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<String>,

    /// Emoji to the ids of users who reacted with it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, Vec<String>>,
}

impl Message {
    /// Creates a plain text message.
    pub fn new(
        id: impl Into<String>,
        channel: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel: channel.into(),
            author: author.into(),
            content: Some(content.into()),
            attachments: Vec::new(),
            replies: Vec::new(),
            reactions: BTreeMap::new(),
        }
    }

    /// The short id displayed next to the message.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Content, or the empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Returns the trailing [`SHORT_ID_LEN`] characters of an id.
pub fn short_id(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(SHORT_ID_LEN - 1)
        .map(|(index, _)| index)
        .unwrap_or(0);
    &id[start..]
}

/// A reply reference attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRef {
    /// Id of the message being replied to.
    pub id: String,
    /// Whether the author of that message is pinged.
    pub mention: bool,
}

/// Body of an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageDraft {
    /// Text content.
    pub content: String,
    /// Attachment ids returned by the file server.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    /// Messages replied to.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<ReplyRef>,
}

impl MessageDraft {
    /// A plain text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// A reply to `message_id` without mentioning its author.
    pub fn reply(content: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            replies: vec![ReplyRef {
                id: message_id.into(),
                mention: false,
            }],
            ..Self::default()
        }
    }

    /// A message carrying a single attachment.
    pub fn attachment(attachment_id: impl Into<String>) -> Self {
        Self {
            attachments: vec![attachment_id.into()],
            ..Self::default()
        }
    }
}

/// Partial message fields carried by `MessageUpdate`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessagePatch {
    /// New content, if it changed.
    #[serde(default)]
    pub content: Option<String>,
}
