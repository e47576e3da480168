use serde::{Deserialize, Serialize};

/// Composite identifier of a server membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId {
    /// Server id.
    pub server: String,
    /// User id.
    pub user: String,
}

/// A user's membership in one server: the per-server nickname and roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Server and user this membership ties together.
    #[serde(rename = "_id")]
    pub id: MemberId,

    /// Per-server nickname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    /// Role ids; the first entry is treated as the primary role.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Member {
    /// Creates a membership with no nickname and no roles.
    pub fn new(server: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: MemberId {
                server: server.into(),
                user: user.into(),
            },
            nickname: None,
            roles: Vec::new(),
        }
    }

    /// The primary role id, if any.
    pub fn primary_role(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }

    /// Applies a partial update from a `ServerMemberUpdate` event.
    pub fn merge(&mut self, patch: MemberPatch, clear: &[String]) {
        if let Some(nickname) = patch.nickname {
            self.nickname = Some(nickname);
        }
        if let Some(roles) = patch.roles {
            self.roles = roles;
        }
        for field in clear {
            match field.as_str() {
                "Nickname" => self.nickname = None,
                "Roles" => self.roles.clear(),
                _ => {}
            }
        }
    }
}

/// Partial membership fields carried by `ServerMemberUpdate`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemberPatch {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}
