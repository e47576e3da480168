use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::permissions::PermissionOverride;

/// A Revolt server (guild).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Unique server identifier.
    #[serde(rename = "_id")]
    pub id: String,

    /// Owner's user id.
    #[serde(default)]
    pub owner: String,

    /// Server name.
    pub name: String,

    /// Channel ids in display order.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Optional channel categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,

    /// Roles keyed by role id.
    #[serde(default)]
    pub roles: HashMap<String, Role>,
}

impl Server {
    /// Creates a server with no channels or roles.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: String::new(),
            name: name.into(),
            channels: Vec::new(),
            categories: None,
            roles: HashMap::new(),
        }
    }

    /// Finds a role by name, ignoring case.
    pub fn role_named(&self, name: &str) -> Option<(&str, &Role)> {
        self.roles
            .iter()
            .find(|(_, role)| role.name.eq_ignore_ascii_case(name))
            .map(|(id, role)| (id.as_str(), role))
    }
}

/// A titled group of channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Category identifier.
    #[serde(alias = "_id")]
    pub id: String,
    /// Category title.
    pub title: String,
    /// Channel ids in display order.
    #[serde(default)]
    pub channels: Vec<String>,
}

/// A server role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Role name.
    pub name: String,

    /// Allow/deny permission bits.
    #[serde(default)]
    pub permissions: PermissionOverride,

    /// CSS colour string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,

    /// Whether members are displayed separately.
    #[serde(default)]
    pub hoist: bool,

    /// Ordering rank; lower ranks are higher in the hierarchy.
    #[serde(default)]
    pub rank: i64,
}

impl Role {
    /// Creates a role with no permissions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: PermissionOverride::default(),
            colour: None,
            hoist: false,
            rank: 0,
        }
    }

    /// Applies a partial update from a `ServerRoleUpdate` event.
    pub fn merge(&mut self, patch: RolePatch, clear: &[String]) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(permissions) = patch.permissions {
            self.permissions = permissions;
        }
        if let Some(colour) = patch.colour {
            self.colour = Some(colour);
        }
        if let Some(hoist) = patch.hoist {
            self.hoist = hoist;
        }
        if let Some(rank) = patch.rank {
            self.rank = rank;
        }
        if clear.iter().any(|field| field == "Colour") {
            self.colour = None;
        }
    }
}

/// Partial role fields carried by `ServerRoleUpdate`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RolePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Option<PermissionOverride>,
    #[serde(default)]
    pub colour: Option<String>,
    #[serde(default)]
    pub hoist: Option<bool>,
    #[serde(default)]
    pub rank: Option<i64>,
}

impl RolePatch {
    /// Builds a full role from a patch when the role was not known yet.
    pub fn into_role(self) -> Role {
        let mut role = Role::new(String::new());
        role.merge(self, &[]);
        role
    }
}
