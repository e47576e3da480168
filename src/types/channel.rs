use serde::{Deserialize, Serialize};

/// A Revolt channel: a server text channel or a direct-message style channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Unique channel identifier.
    #[serde(rename = "_id")]
    pub id: String,

    /// Wire channel type (`TextChannel`, `DirectMessage`, `Group`, ...).
    #[serde(default)]
    pub channel_type: String,

    /// Channel name; direct messages have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Owning server, absent for direct-message style channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Participants of server-less channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,
}

impl Channel {
    /// Creates a named text channel in a server.
    pub fn text(id: impl Into<String>, name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel_type: "TextChannel".to_string(),
            name: Some(name.into()),
            server: Some(server.into()),
            recipients: None,
        }
    }

    /// Creates a direct-message channel between the given users.
    pub fn direct(id: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            id: id.into(),
            channel_type: "DirectMessage".to_string(),
            name: None,
            server: None,
            recipients: Some(recipients),
        }
    }

    /// Channel name, or a placeholder for unnamed channels.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("direct message")
    }

    /// Whether messages can be exchanged in this channel.
    pub fn is_textual(&self) -> bool {
        !matches!(self.channel_type.as_str(), "VoiceChannel")
    }
}
