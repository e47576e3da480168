use serde::{Deserialize, Serialize};

/// A Revolt user as carried by the snapshot, events and REST responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    #[serde(rename = "_id")]
    pub id: String,

    /// Account username.
    pub username: String,

    /// Optional display name, preferred over the username when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Present when the account is a bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<BotInformation>,

    /// Whether the user is currently online.
    #[serde(default)]
    pub online: bool,

    /// Custom status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,

    /// Relationship of this user to the session's own account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,

    /// Avatar file, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<FileRef>,
}

impl User {
    /// Creates a plain online-less user with just an id and username.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: None,
            bot: None,
            online: false,
            status: None,
            relationship: None,
            avatar: None,
        }
    }

    /// Whether this account is a bot.
    pub fn is_bot(&self) -> bool {
        self.bot.is_some()
    }

    /// The name shown next to messages.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Status text, if set and non-empty.
    pub fn status_text(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.text.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// Applies a partial update from a `UserUpdate` event.
    pub fn merge(&mut self, patch: UserPatch, clear: &[String]) {
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(display_name) = patch.display_name {
            self.display_name = Some(display_name);
        }
        if let Some(online) = patch.online {
            self.online = online;
        }
        if let Some(status) = patch.status {
            self.status = Some(status);
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = Some(avatar);
        }
        for field in clear {
            match field.as_str() {
                "DisplayName" => self.display_name = None,
                "StatusText" => {
                    if let Some(status) = self.status.as_mut() {
                        status.text = None;
                    }
                }
                "StatusPresence" => {
                    if let Some(status) = self.status.as_mut() {
                        status.presence = None;
                    }
                }
                "Avatar" => self.avatar = None,
                _ => {}
            }
        }
    }
}

/// Bot metadata; only its presence matters to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotInformation {
    /// Owner of the bot account.
    #[serde(default)]
    pub owner: Option<String>,
}

/// A user's custom status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStatus {
    /// Free-form status text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Presence indicator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
}

/// Presence values accepted by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Online,
    Idle,
    Focus,
    Busy,
    Invisible,
}

impl Presence {
    /// Parses a user-typed presence name, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "online" => Some(Presence::Online),
            "idle" => Some(Presence::Idle),
            "focus" => Some(Presence::Focus),
            "busy" => Some(Presence::Busy),
            "invisible" => Some(Presence::Invisible),
            _ => None,
        }
    }
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Presence::Online => "Online",
            Presence::Idle => "Idle",
            Presence::Focus => "Focus",
            Presence::Busy => "Busy",
            Presence::Invisible => "Invisible",
        };
        f.write_str(name)
    }
}

/// Relationship between the session's account and another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    None,
    User,
    Friend,
    Outgoing,
    Incoming,
    Blocked,
    BlockedOther,
}

/// Reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    /// File identifier on the file server.
    #[serde(rename = "_id")]
    pub id: String,
}

/// Partial user fields carried by `UserUpdate`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub avatar: Option<FileRef>,
}

/// A user's profile page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserProfile {
    /// Bio text.
    #[serde(default)]
    pub content: Option<String>,
}
