//! In-memory entity cache: the single source of truth for users, servers,
//! channels, roles and server memberships.
//!
//! Entries live for the whole process; lookups return `None` for unknown ids
//! and callers treat that as the normal "unknown" case.

use std::collections::HashMap;

use crate::types::{
    Channel, Member, MemberId, Permissions, ReadyPayload, Relationship, Role, Server, User,
};

/// Name rendered for authors missing from the cache.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Users, servers, channels, roles and memberships keyed by id.
#[derive(Debug, Default)]
pub struct EntityCache {
    users: HashMap<String, User>,
    servers: HashMap<String, Server>,
    channels: HashMap<String, Channel>,
    roles: HashMap<String, Role>,
    members: HashMap<MemberId, Member>,
}

impl EntityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a `Ready` snapshot, flattening every server's roles into the
    /// role cache.
    pub fn load_snapshot(&mut self, snapshot: ReadyPayload) {
        self.insert_users(snapshot.users);
        for server in snapshot.servers {
            self.insert_server(server);
        }
        for channel in snapshot.channels {
            self.insert_channel(channel);
        }
        for member in snapshot.members {
            self.insert_member(member);
        }
    }

    ////////////////////////////////////////// users //////////////////////////////////////////

    /// Inserts or replaces a user; the latest copy wins.
    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Inserts or replaces many users.
    pub fn insert_users(&mut self, users: impl IntoIterator<Item = User>) {
        for user in users {
            self.insert_user(user);
        }
    }

    /// Looks up a user by id.
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    /// Looks up a user for mutation.
    pub fn user_mut(&mut self, id: &str) -> Option<&mut User> {
        self.users.get_mut(id)
    }

    /// Finds a user by username or display name, ignoring case.
    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users
            .values()
            .find(|user| user.username.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.users.values().find(|user| {
                    user.display_name
                        .as_deref()
                        .is_some_and(|display| display.eq_ignore_ascii_case(name))
                })
            })
    }

    /// Name to display for `user_id` inside `server_id`: nickname, then display
    /// name, then username, then [`UNKNOWN_USER`].
    pub fn author_name(&self, user_id: &str, server_id: Option<&str>) -> String {
        if let Some(server_id) = server_id
            && let Some(nickname) = self
                .member(server_id, user_id)
                .and_then(|member| member.nickname.as_deref())
        {
            return nickname.to_string();
        }
        self.user(user_id)
            .map(|user| user.name().to_string())
            .unwrap_or_else(|| UNKNOWN_USER.to_string())
    }

    /// Users the session's account is friends with, sorted by username.
    pub fn friends(&self) -> Vec<&User> {
        let mut friends: Vec<&User> = self
            .users
            .values()
            .filter(|user| user.relationship == Some(Relationship::Friend))
            .collect();
        friends.sort_by(|a, b| a.username.cmp(&b.username));
        friends
    }

    ///////////////////////////////////////// servers /////////////////////////////////////////

    /// Inserts or replaces a server and merges its roles into the flat role cache.
    pub fn insert_server(&mut self, server: Server) {
        for (id, role) in &server.roles {
            self.roles.insert(id.clone(), role.clone());
        }
        self.servers.insert(server.id.clone(), server);
    }

    /// Looks up a server by id.
    pub fn server(&self, id: &str) -> Option<&Server> {
        self.servers.get(id)
    }

    /// Looks up a server for mutation.
    pub fn server_mut(&mut self, id: &str) -> Option<&mut Server> {
        self.servers.get_mut(id)
    }

    /// All servers sorted by name.
    pub fn servers(&self) -> Vec<&Server> {
        let mut servers: Vec<&Server> = self.servers.values().collect();
        servers.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        servers
    }

    /// Records a new or changed role in both the server's map and the flat cache.
    pub fn upsert_role(&mut self, server_id: &str, role_id: &str, role: Role) {
        if let Some(server) = self.servers.get_mut(server_id) {
            server.roles.insert(role_id.to_string(), role.clone());
        }
        self.roles.insert(role_id.to_string(), role);
    }

    /// Looks up a role in the flat cache.
    pub fn role(&self, id: &str) -> Option<&Role> {
        self.roles.get(id)
    }

    /// Role `role_id` as seen through `server_id`'s role map.
    pub fn server_role(&self, server_id: &str, role_id: &str) -> Option<&Role> {
        self.server(server_id)?.roles.get(role_id)
    }

    //////////////////////////////////////// channels /////////////////////////////////////////

    /// Inserts or replaces a channel.
    pub fn insert_channel(&mut self, channel: Channel) {
        self.channels.insert(channel.id.clone(), channel);
    }

    /// Looks up a channel by id.
    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.get(id)
    }

    /// Text channels of a server, in the server's channel order.  Channels the
    /// server does not list are appended sorted by name.
    pub fn server_channels(&self, server_id: &str) -> Vec<&Channel> {
        let mut ordered: Vec<&Channel> = Vec::new();
        if let Some(server) = self.server(server_id) {
            for id in &server.channels {
                if let Some(channel) = self.channel(id)
                    && channel.server.as_deref() == Some(server_id)
                    && channel.is_textual()
                {
                    ordered.push(channel);
                }
            }
        }
        let mut rest: Vec<&Channel> = self
            .channels
            .values()
            .filter(|channel| channel.server.as_deref() == Some(server_id))
            .filter(|channel| channel.is_textual())
            .filter(|channel| !ordered.iter().any(|known| known.id == channel.id))
            .collect();
        rest.sort_by(|a, b| a.display_name().cmp(b.display_name()));
        ordered.extend(rest);
        ordered
    }

    /// Channels without a server (direct messages, groups, saved notes).
    pub fn direct_channels(&self) -> Vec<&Channel> {
        let mut channels: Vec<&Channel> = self
            .channels
            .values()
            .filter(|channel| channel.server.is_none())
            .collect();
        channels.sort_by(|a, b| a.id.cmp(&b.id));
        channels
    }

    ///////////////////////////////////////// members /////////////////////////////////////////

    /// Inserts or replaces a membership.
    pub fn insert_member(&mut self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }

    /// Looks up the membership of `user_id` in `server_id`.
    pub fn member(&self, server_id: &str, user_id: &str) -> Option<&Member> {
        self.members.get(&MemberId {
            server: server_id.to_string(),
            user: user_id.to_string(),
        })
    }

    /// Looks up a membership for mutation, creating an empty one if missing.
    pub fn member_entry(&mut self, server_id: &str, user_id: &str) -> &mut Member {
        let id = MemberId {
            server: server_id.to_string(),
            user: user_id.to_string(),
        };
        self.members
            .entry(id)
            .or_insert_with(|| Member::new(server_id, user_id))
    }

    /// Every known membership of a server.
    pub fn server_members(&self, server_id: &str) -> Vec<&Member> {
        self.members
            .values()
            .filter(|member| member.id.server == server_id)
            .collect()
    }

    /// Whether `user_id` holds `permission` on `server_id`: true iff any of the
    /// member's roles, looked up through the server's role map, allows it.
    /// Channel overrides are not consulted.
    pub fn has_permission(&self, server_id: &str, user_id: &str, permission: Permissions) -> bool {
        let Some(member) = self.member(server_id, user_id) else {
            return false;
        };
        member.roles.iter().any(|role_id| {
            self.server_role(server_id, role_id)
                .is_some_and(|role| role.permissions.allowed().contains(permission))
        })
    }
}
