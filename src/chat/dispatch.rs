//! Handling one line typed in the message loop.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use super::commands::{
    ChatCommand, ConfigAction, FriendsAction, ServerConfigAction, UserConfigAction, help_text,
    parse_command,
};
use super::config::MAX_HISTORY_LIMIT;
use super::deferred::RoleRestore;
use super::session::{Flow, Session, Shutdown};
use crate::client::{ProfilePatch, SelfPatch, muzzle_permissions};
use crate::observability::MESSAGES_SENT;
use crate::types::{MessageDraft, Permissions, Presence, User, UserStatus};

/// Name of the role `/timeout` assigns.
pub const MUZZLED_ROLE: &str = "Muzzled";

/// What the message loop does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Continue,
    Leave,
}

impl Dispatch {
    pub(crate) fn is_leave(self) -> bool {
        self == Dispatch::Leave
    }
}

impl Session {
    /// Runs one input line: a command, a message, or nothing.  Messages are
    /// sent exactly as typed.
    pub(crate) async fn dispatch(&mut self, line: &str) -> Flow<Dispatch> {
        if line.trim().is_empty() {
            return Ok(Dispatch::Continue);
        }
        match parse_command(line) {
            Some(command) => self.run_command(command).await,
            None => {
                self.send_draft(MessageDraft::text(line)).await;
                Ok(Dispatch::Continue)
            }
        }
    }

    async fn run_command(&mut self, command: ChatCommand) -> Flow<Dispatch> {
        match command {
            ChatCommand::Exit => return Err(Shutdown::Exit),
            ChatCommand::Leave => return Ok(Dispatch::Leave),
            ChatCommand::Logout => return Err(self.logout()),
            ChatCommand::Help => self.renderer.print_info(help_text()),
            ChatCommand::Whoami => self.whoami(),
            ChatCommand::Users => self.list_users(),
            ChatCommand::Nick(nickname) => self.set_nickname(nickname).await,
            ChatCommand::Profile(username) => self.show_profile(&username).await,
            ChatCommand::Status { presence, text } => self.set_status(presence, text).await,
            ChatCommand::Upload(path) => self.upload(path).await?,
            ChatCommand::Reply { id, text } => self.reply(&id, text).await,
            ChatCommand::Edit { id, text } => self.edit(&id, &text).await,
            ChatCommand::Delete(id) => self.delete(&id).await,
            ChatCommand::Config(action) => self.configure(action),
            ChatCommand::UserConfig(action) => self.configure_user(action).await,
            ChatCommand::ServerConfig(action) => self.configure_server(action).await,
            ChatCommand::Kick(username) => self.kick(&username).await,
            ChatCommand::Ban { user, reason } => self.ban(&user, reason.as_deref()).await,
            ChatCommand::Timeout { user, minutes } => self.timeout(&user, minutes).await,
            ChatCommand::Friends(action) => self.friends(action).await,
            ChatCommand::Invalid(usage) => self.renderer.print_error(&usage),
        }
        Ok(Dispatch::Continue)
    }

    /// Sends a draft to the active channel and shows it as our own.
    async fn send_draft(&mut self, draft: MessageDraft) {
        let Some(channel_id) = self.state.active_channel.clone() else {
            return;
        };
        let result = self
            .api
            .send_message(&channel_id, &self.state.token, &draft)
            .await;
        let Some(message) = self.soft("send message", result) else {
            return;
        };
        MESSAGES_SENT.click();
        let author = self.state.author_name(&message.author);
        self.renderer.print_message(&author, &message, true);
        self.state.recent.push(message);
    }

    fn logout(&mut self) -> Shutdown {
        self.config.token = None;
        if let Some(store) = &self.store
            && let Err(err) = store.clear_token()
        {
            self.renderer
                .print_error(&format!("Failed to clear the saved token: {err}"));
        }
        self.renderer.print_success("Logged out.");
        Shutdown::Logout
    }

    fn whoami(&mut self) {
        let Some(user) = self.state.self_user() else {
            self.renderer.print_error("Not authenticated yet.");
            return;
        };
        let mut lines = vec![
            format!("Logged in as {} (@{})", user.name(), user.username),
            format!("ID: {}", user.id),
        ];
        lines.extend(status_lines(user));
        self.renderer.print_info(&lines.join("\n"));
    }

    fn list_users(&mut self) {
        let Some(channel) = self.state.channel().cloned() else {
            self.renderer.print_error("No active channel.");
            return;
        };
        let Some(server_id) = channel.server.as_deref() else {
            let names: Vec<String> = channel
                .recipients
                .unwrap_or_default()
                .iter()
                .map(|id| self.state.author_name(id))
                .collect();
            self.renderer.print_heading("Recipients");
            self.renderer.print_info(&names.join(", "));
            return;
        };

        #[derive(Default)]
        struct Group {
            online: Vec<String>,
            offline: Vec<String>,
            bots: Vec<String>,
        }

        let cache = &self.state.cache;
        let mut groups: BTreeMap<(i64, String), Group> = BTreeMap::new();
        for member in cache.server_members(server_id) {
            let key = member
                .primary_role()
                .and_then(|role_id| cache.server_role(server_id, role_id))
                .map(|role| (role.rank, role.name.clone()))
                .unwrap_or_else(|| (i64::MAX, "Members".to_string()));
            let user = cache.user(&member.id.user);
            let name = cache.author_name(&member.id.user, Some(server_id));
            let group = groups.entry(key).or_default();
            match user {
                Some(user) if user.is_bot() => group.bots.push(name),
                Some(user) if user.online => group.online.push(name),
                _ => group.offline.push(name),
            }
        }
        if groups.is_empty() {
            self.renderer.print_info("No members known for this server.");
            return;
        }

        for ((_, title), mut group) in groups {
            self.renderer.print_heading(&title);
            for (label, names) in [
                ("Online", &mut group.online),
                ("Offline", &mut group.offline),
                ("Bots", &mut group.bots),
            ] {
                if names.is_empty() {
                    continue;
                }
                names.sort_by_key(|name| name.to_lowercase());
                self.renderer
                    .print_info(&format!("  {label} ({}): {}", names.len(), names.join(", ")));
            }
        }
    }

    async fn set_nickname(&mut self, nickname: Option<String>) {
        let (Some(server_id), Some(self_id)) =
            (self.state.active_server.clone(), self.state.self_id.clone())
        else {
            self.renderer
                .print_error("Nicknames can only be set in a server channel.");
            return;
        };
        let result = self
            .api
            .set_nickname(&server_id, &self_id, &self.state.token, nickname.as_deref())
            .await;
        if self.soft("set nickname", result).is_none() {
            return;
        }
        let text = match &nickname {
            Some(nickname) => format!("Nickname set to {nickname}."),
            None => "Nickname cleared.".to_string(),
        };
        self.state.cache.member_entry(&server_id, &self_id).nickname = nickname;
        self.renderer.print_success(&text);
    }

    async fn show_profile(&mut self, username: &str) {
        let Some(user_id) = self.lookup_user(username) else {
            return;
        };
        let result = self.api.fetch_user(&user_id, &self.state.token).await;
        let Some(user) = self.soft("fetch user", result) else {
            return;
        };
        let result = self.api.fetch_profile(&user_id, &self.state.token).await;
        let profile = self.soft("fetch profile", result).unwrap_or_default();

        let mut lines = vec![format!("Username: @{}", user.username)];
        if let Some(display_name) = &user.display_name {
            lines.push(format!("Display name: {display_name}"));
        }
        lines.extend(status_lines(&user));
        if user.is_bot() {
            lines.push("Bot: yes".to_string());
        }
        if let Some(bio) = profile.content.as_deref().filter(|bio| !bio.is_empty()) {
            lines.push(format!("Bio: {bio}"));
        }
        if let Some(avatar) = &user.avatar {
            lines.push(format!("Avatar: {}", self.api.avatar_url(&avatar.id)));
        }
        self.renderer.print_heading(user.name());
        self.renderer.print_info(&lines.join("\n"));
        self.state.cache.insert_user(user);
    }

    async fn set_status(&mut self, presence: Presence, text: Option<String>) {
        let patch = SelfPatch {
            status: Some(UserStatus {
                text,
                presence: Some(presence),
            }),
            ..SelfPatch::default()
        };
        if self.update_self(patch).await {
            self.renderer
                .print_success(&format!("Status set to {presence}."));
        }
    }

    async fn update_self(&mut self, patch: SelfPatch) -> bool {
        let result = self.api.update_self(&self.state.token, &patch).await;
        match self.soft("update your account", result) {
            Some(user) => {
                self.state.cache.insert_user(user);
                true
            }
            None => false,
        }
    }

    async fn upload(&mut self, path: Option<String>) -> Flow<()> {
        let path = match path {
            Some(path) => path,
            None => self.read_line("File path: ").await?.trim().to_string(),
        };
        if path.is_empty() {
            self.renderer.print_info("Upload cancelled.");
            return Ok(());
        }
        self.renderer.print_info(&format!("Uploading {path}..."));
        let result = self.api.upload_file(Path::new(&path), &self.state.token).await;
        if let Some(attachment) = self.soft("upload file", result) {
            self.send_draft(MessageDraft::attachment(attachment)).await;
        }
        Ok(())
    }

    /// Full id of a recent message, or an error shown to the user.
    fn resolve_recent(&mut self, id: &str) -> Option<(String, String)> {
        match self.state.recent.resolve(id) {
            Some(message) => Some((message.id.clone(), message.author.clone())),
            None => {
                self.renderer
                    .print_error(&format!("Message {id} not found in recent history."));
                None
            }
        }
    }

    async fn reply(&mut self, id: &str, text: String) {
        if let Some((message_id, _)) = self.resolve_recent(id) {
            self.send_draft(MessageDraft::reply(text, message_id)).await;
        }
    }

    async fn edit(&mut self, id: &str, text: &str) {
        let Some((message_id, author)) = self.resolve_recent(id) else {
            return;
        };
        if !self.state.is_self(&author) {
            self.renderer
                .print_error("You can only edit your own messages.");
            return;
        }
        let Some(channel_id) = self.state.active_channel.clone() else {
            return;
        };
        let result = self
            .api
            .edit_message(&channel_id, &message_id, &self.state.token, text)
            .await;
        if self.soft("edit message", result).is_some() {
            self.renderer.print_success("Message edited.");
        }
    }

    async fn delete(&mut self, id: &str) {
        let Some((message_id, _)) = self.resolve_recent(id) else {
            return;
        };
        let Some(channel_id) = self.state.active_channel.clone() else {
            return;
        };
        let result = self
            .api
            .delete_message(&channel_id, &message_id, &self.state.token)
            .await;
        if self.soft("delete message", result).is_some() {
            self.renderer.print_success("Message deleted.");
        }
    }

    fn configure(&mut self, action: ConfigAction) {
        match action {
            ConfigAction::Show => {
                let mut lines = vec![
                    format!("Color: {}", if self.config.color { "on" } else { "off" }),
                    format!(
                        "History: {} messages (max {MAX_HISTORY_LIMIT})",
                        self.config.history_limit
                    ),
                ];
                if let Some(store) = &self.store {
                    lines.push(format!("File: {}", store.path().display()));
                }
                self.renderer.print_heading("Config");
                self.renderer.print_info(&lines.join("\n"));
                return;
            }
            ConfigAction::Color(color) => {
                self.config.color = color;
                self.renderer.set_color(color);
                self.renderer.print_success(&format!(
                    "Color {}.",
                    if color { "enabled" } else { "disabled" }
                ));
            }
            ConfigAction::History(limit) => {
                self.config.history_limit = limit;
                self.renderer
                    .print_success(&format!("History limit set to {limit}."));
            }
        }
        self.persist_config();
    }

    async fn configure_user(&mut self, action: UserConfigAction) {
        match action {
            UserConfigAction::Show => {
                let Some(self_id) = self.state.self_id.clone() else {
                    self.renderer.print_error("Not authenticated yet.");
                    return;
                };
                let result = self.api.fetch_profile(&self_id, &self.state.token).await;
                let profile = self.soft("fetch profile", result).unwrap_or_default();
                let Some(user) = self.state.self_user() else {
                    return;
                };
                let mut lines = vec![format!(
                    "Display name: {}",
                    user.display_name.as_deref().unwrap_or("(not set)")
                )];
                lines.extend(status_lines(user));
                lines.push(format!(
                    "Bio: {}",
                    profile.content.as_deref().unwrap_or("(not set)")
                ));
                self.renderer.print_heading("Your profile");
                self.renderer.print_info(&lines.join("\n"));
            }
            UserConfigAction::Bio(bio) => {
                let patch = SelfPatch {
                    profile: Some(ProfilePatch { content: Some(bio) }),
                    ..SelfPatch::default()
                };
                if self.update_self(patch).await {
                    self.renderer.print_success("Bio updated.");
                }
            }
            UserConfigAction::DisplayName(name) => {
                let text = format!("Display name set to {name}.");
                let patch = SelfPatch {
                    display_name: Some(name),
                    ..SelfPatch::default()
                };
                if self.update_self(patch).await {
                    self.renderer.print_success(&text);
                }
            }
        }
    }

    async fn configure_server(&mut self, action: ServerConfigAction) {
        let Some(server_id) = self.state.active_server.clone() else {
            self.renderer
                .print_error("This command only works in a server channel.");
            return;
        };
        match action {
            ServerConfigAction::Show => {
                let cache = &self.state.cache;
                let Some(server) = cache.server(&server_id) else {
                    return;
                };
                let mut roles: Vec<_> = server.roles.values().collect();
                roles.sort_by_key(|role| role.rank);
                let roles: Vec<&str> = roles.iter().map(|role| role.name.as_str()).collect();
                let lines = [
                    format!("Name: {}", server.name),
                    format!("ID: {}", server.id),
                    format!("Owner: {}", cache.author_name(&server.owner, Some(&server_id))),
                    format!("Channels: {}", cache.server_channels(&server_id).len()),
                    format!("Members: {}", cache.server_members(&server_id).len()),
                    format!("Roles: {}", roles.join(", ")),
                ];
                let title = server.name.clone();
                self.renderer.print_heading(&title);
                self.renderer.print_info(&lines.join("\n"));
            }
            ServerConfigAction::Name(name) => {
                if !self.holds(&server_id, Permissions::MANAGE_SERVER, "manage this server") {
                    return;
                }
                let result = self
                    .api
                    .rename_server(&server_id, &self.state.token, &name)
                    .await;
                if self.soft("rename server", result).is_none() {
                    return;
                }
                self.renderer
                    .print_success(&format!("Server renamed to {name}."));
                if let Some(server) = self.state.cache.server_mut(&server_id) {
                    server.name = name;
                }
            }
        }
    }

    /// Whether the session's user holds `permission` on `server_id`; prints
    /// the denial otherwise.
    fn holds(&mut self, server_id: &str, permission: Permissions, action: &str) -> bool {
        let allowed = self
            .state
            .self_id
            .as_deref()
            .is_some_and(|self_id| self.state.cache.has_permission(server_id, self_id, permission));
        if !allowed {
            self.renderer
                .print_error(&format!("You do not have permission to {action}."));
        }
        allowed
    }

    /// Id of the user named `username`, or an error shown to the user.
    fn lookup_user(&mut self, username: &str) -> Option<String> {
        let id = self
            .state
            .cache
            .user_by_name(username)
            .map(|user| user.id.clone());
        if id.is_none() {
            self.renderer
                .print_error(&format!("User {username} not found."));
        }
        id
    }

    /// Active server and target user id for a moderation command, after the
    /// permission check.  Issues no requests.
    fn moderation_target(
        &mut self,
        username: &str,
        permission: Permissions,
        action: &str,
    ) -> Option<(String, String)> {
        let Some(server_id) = self.state.active_server.clone() else {
            self.renderer
                .print_error("This command only works in a server channel.");
            return None;
        };
        if !self.holds(&server_id, permission, action) {
            return None;
        }
        let user_id = self.lookup_user(username)?;
        Some((server_id, user_id))
    }

    async fn kick(&mut self, username: &str) {
        let Some((server_id, user_id)) =
            self.moderation_target(username, Permissions::KICK_MEMBERS, "kick members")
        else {
            return;
        };
        let result = self
            .api
            .kick_member(&server_id, &user_id, &self.state.token)
            .await;
        if self.soft("kick member", result).is_some() {
            self.renderer
                .print_success(&format!("{username} has been kicked."));
        }
    }

    async fn ban(&mut self, username: &str, reason: Option<&str>) {
        let Some((server_id, user_id)) =
            self.moderation_target(username, Permissions::BAN_MEMBERS, "ban members")
        else {
            return;
        };
        let result = self
            .api
            .ban_member(&server_id, &user_id, &self.state.token, reason)
            .await;
        if self.soft("ban member", result).is_some() {
            self.renderer
                .print_success(&format!("{username} has been banned."));
        }
    }

    /// Adds the muzzled role to a member and schedules its removal.
    async fn timeout(&mut self, username: &str, minutes: u64) {
        let Some((server_id, user_id)) =
            self.moderation_target(username, Permissions::MANAGE_ROLE, "manage roles")
        else {
            return;
        };
        let Some(role_id) = self.muzzled_role(&server_id).await else {
            return;
        };

        let mut captured = self
            .state
            .cache
            .member(&server_id, &user_id)
            .map(|member| member.roles.clone())
            .unwrap_or_default();
        captured.retain(|id| *id != role_id);
        let mut roles = captured.clone();
        roles.push(role_id);

        let result = self
            .api
            .update_member_roles(&server_id, &user_id, &self.state.token, &roles)
            .await;
        if self.soft("assign the muzzled role", result).is_none() {
            return;
        }
        self.state.cache.member_entry(&server_id, &user_id).roles = roles;
        self.deferred.schedule_role_restore(
            self.api.clone(),
            RoleRestore {
                server_id,
                user_id,
                token: self.state.token.clone(),
                roles: captured,
            },
            Duration::from_secs(minutes.saturating_mul(60)),
        );
        self.renderer.print_success(&format!(
            "{username} has been muzzled for {minutes} minute{}.",
            if minutes == 1 { "" } else { "s" }
        ));
    }

    /// Id of the server's muzzled role, creating it when missing.
    async fn muzzled_role(&mut self, server_id: &str) -> Option<String> {
        if let Some((id, _)) = self
            .state
            .cache
            .server(server_id)
            .and_then(|server| server.role_named(MUZZLED_ROLE))
        {
            return Some(id.to_string());
        }
        let result = self
            .api
            .create_role(server_id, &self.state.token, MUZZLED_ROLE)
            .await;
        let (role_id, mut role) = self.soft("create the muzzled role", result)?;
        let permissions = muzzle_permissions();
        let result = self
            .api
            .set_role_permissions(server_id, &role_id, &self.state.token, permissions)
            .await;
        self.soft("restrict the muzzled role", result)?;
        role.permissions = permissions;
        self.state.cache.upsert_role(server_id, &role_id, role);
        Some(role_id)
    }

    async fn friends(&mut self, action: FriendsAction) {
        match action {
            FriendsAction::List => {
                let friends: Vec<String> = self
                    .state
                    .cache
                    .friends()
                    .into_iter()
                    .map(|user| {
                        let state = if user.online { "online" } else { "offline" };
                        format!("  {} (@{}) - {state}", user.name(), user.username)
                    })
                    .collect();
                self.renderer.print_heading("Friends");
                if friends.is_empty() {
                    self.renderer.print_info("You have no friends added yet.");
                } else {
                    self.renderer.print_info(&friends.join("\n"));
                }
            }
            FriendsAction::Add(username) => {
                let result = self.api.add_friend(&username, &self.state.token).await;
                if self.soft("send friend request", result).is_some() {
                    self.renderer
                        .print_success(&format!("Friend request sent to {username}."));
                }
            }
            FriendsAction::Remove(username) => {
                let Some(user_id) = self.lookup_user(&username) else {
                    return;
                };
                let result = self.api.remove_friend(&user_id, &self.state.token).await;
                if self.soft("remove friend", result).is_none() {
                    return;
                }
                if let Some(user) = self.state.cache.user_mut(&user_id) {
                    user.relationship = None;
                }
                self.renderer
                    .print_success(&format!("{username} removed from friends."));
            }
        }
    }
}

fn status_lines(user: &User) -> Vec<String> {
    let mut lines = Vec::new();
    let presence = user.status.as_ref().and_then(|status| status.presence);
    match presence {
        Some(presence) => lines.push(format!("Presence: {presence}")),
        None if user.online => lines.push("Presence: Online".to_string()),
        None => lines.push("Presence: Offline".to_string()),
    }
    if let Some(text) = user.status_text() {
        lines.push(format!("Status: {text}"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chat::testing::{ApiCall, MockApi, Rendered, RenderLog, harness};
    use crate::types::{Channel, Member, Message, PermissionOverride, Role, Server};

    const MOD_ROLE: &str = "01MODROLE";

    /// A session in #general of Alpha with `bob` as a fellow member.
    fn in_channel(
        api: Arc<MockApi>,
        self_permissions: Permissions,
        input: &[&str],
    ) -> (Session, tokio::sync::mpsc::UnboundedSender<crate::gateway::GatewayEvent>, RenderLog)
    {
        let (mut session, events, output) = harness(api, input);
        let mut server = Server::new("01ALPHA", "Alpha");
        let mut role = Role::new("Mod");
        role.permissions = PermissionOverride::new(self_permissions, Permissions::empty());
        server.roles.insert(MOD_ROLE.to_string(), role);
        let cache = &mut session.state.cache;
        cache.insert_server(server);
        cache.insert_channel(Channel::text("01GENERAL", "general", "01ALPHA"));
        cache.insert_user(User::new("01SELF", "me"));
        cache.insert_user(User::new("01BOB", "bob"));
        let mut me = Member::new("01ALPHA", "01SELF");
        me.roles.push(MOD_ROLE.to_string());
        cache.insert_member(me);
        let mut bob = Member::new("01ALPHA", "01BOB");
        bob.roles.push("01HELPER".to_string());
        cache.insert_member(bob);
        session.state.self_id = Some("01SELF".to_string());
        session.state.active_server = Some("01ALPHA".to_string());
        session.state.active_channel = Some("01GENERAL".to_string());
        (session, events, output)
    }

    fn mutating_calls(api: &MockApi) -> Vec<ApiCall> {
        api.calls()
            .into_iter()
            .filter(|call| !matches!(call, ApiCall::FetchSelf))
            .collect()
    }

    #[tokio::test]
    async fn kick_without_permission_makes_no_requests() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) =
            in_channel(api.clone(), Permissions::SEND_MESSAGE, &[]);
        session.dispatch("/kick bob").await.unwrap();
        assert!(mutating_calls(&api).is_empty());
        assert_eq!(
            output.errors(),
            vec!["You do not have permission to kick members.".to_string()]
        );
    }

    #[tokio::test]
    async fn ownership_grants_nothing() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) = in_channel(api.clone(), Permissions::empty(), &[]);
        if let Some(server) = session.state.cache.server_mut("01ALPHA") {
            server.owner = "01SELF".to_string();
        }
        session.dispatch("/ban bob spamming").await.unwrap();
        assert!(mutating_calls(&api).is_empty());
        assert_eq!(output.errors().len(), 1);
    }

    #[tokio::test]
    async fn kick_with_permission() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) =
            in_channel(api.clone(), Permissions::KICK_MEMBERS, &[]);
        session.dispatch("/kick BOB").await.unwrap();
        assert_eq!(
            mutating_calls(&api),
            vec![ApiCall::Kick {
                server: "01ALPHA".to_string(),
                user: "01BOB".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn timeout_without_manage_role_is_denied() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) =
            in_channel(api.clone(), Permissions::KICK_MEMBERS, &[]);
        session.dispatch("/timeout bob 5").await.unwrap();
        assert!(mutating_calls(&api).is_empty());
        assert_eq!(
            output.errors(),
            vec!["You do not have permission to manage roles.".to_string()]
        );
        assert_eq!(session.deferred.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_creates_role_and_restores_roles_later() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) =
            in_channel(api.clone(), Permissions::MANAGE_ROLE, &[]);
        session.dispatch("/timeout bob 2").await.unwrap();

        let calls = mutating_calls(&api);
        assert_eq!(
            calls,
            vec![
                ApiCall::CreateRole {
                    server: "01ALPHA".to_string(),
                    name: MUZZLED_ROLE.to_string(),
                },
                ApiCall::SetRolePermissions {
                    server: "01ALPHA".to_string(),
                    role: MockApi::CREATED_ROLE.to_string(),
                    permissions: muzzle_permissions(),
                },
                ApiCall::UpdateRoles {
                    server: "01ALPHA".to_string(),
                    user: "01BOB".to_string(),
                    roles: vec!["01HELPER".to_string(), MockApi::CREATED_ROLE.to_string()],
                },
            ]
        );
        assert_eq!(session.deferred.pending(), 1);
        assert!(
            session
                .state
                .cache
                .server("01ALPHA")
                .and_then(|server| server.role_named(MUZZLED_ROLE))
                .is_some()
        );

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert_eq!(mutating_calls(&api).len(), 3);

        tokio::time::sleep(Duration::from_secs(2)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            mutating_calls(&api).last(),
            Some(&ApiCall::UpdateRoles {
                server: "01ALPHA".to_string(),
                user: "01BOB".to_string(),
                roles: vec!["01HELPER".to_string()],
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reuses_existing_role_and_exit_cancels_restore() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) =
            in_channel(api.clone(), Permissions::MANAGE_ROLE, &[]);
        session
            .state
            .cache
            .upsert_role("01ALPHA", "01MUZZLE", Role::new(MUZZLED_ROLE));
        session.dispatch("/timeout bob 1").await.unwrap();
        assert_eq!(mutating_calls(&api).len(), 1);

        session.deferred.abort_all();
        tokio::time::sleep(Duration::from_secs(120)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(mutating_calls(&api).len(), 1);
    }

    #[tokio::test]
    async fn short_ids_resolve_through_recent_messages() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) = in_channel(api.clone(), Permissions::empty(), &[]);
        session
            .state
            .recent
            .push(Message::new("01HZX3ABC123", "01GENERAL", "01SELF", "typo"));

        session.dispatch("/edit abc123 fixed").await.unwrap();
        session.dispatch("/delete zzzzzz").await.unwrap();
        assert_eq!(
            mutating_calls(&api),
            vec![ApiCall::EditMessage {
                channel: "01GENERAL".to_string(),
                message: "01HZX3ABC123".to_string(),
                content: "fixed".to_string(),
            }]
        );
        assert_eq!(
            output.errors(),
            vec!["Message zzzzzz not found in recent history.".to_string()]
        );
    }

    #[tokio::test]
    async fn reply_sends_reference() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) = in_channel(api.clone(), Permissions::empty(), &[]);
        session
            .state
            .recent
            .push(Message::new("01HZX3ABC123", "01GENERAL", "01BOB", "question?"));
        session.dispatch("/reply ABC123 answer").await.unwrap();
        assert_eq!(
            mutating_calls(&api),
            vec![ApiCall::SendMessage {
                channel: "01GENERAL".to_string(),
                draft: MessageDraft::reply("answer", "01HZX3ABC123"),
            }]
        );
    }

    #[tokio::test]
    async fn unknown_commands_are_sent_as_text() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) = in_channel(api.clone(), Permissions::empty(), &[]);
        session.dispatch("/shrug hello").await.unwrap();
        session.dispatch("   ").await.unwrap();
        assert_eq!(
            mutating_calls(&api),
            vec![ApiCall::SendMessage {
                channel: "01GENERAL".to_string(),
                draft: MessageDraft::text("/shrug hello"),
            }]
        );
        assert!(output.errors().is_empty());
    }

    #[tokio::test]
    async fn messages_keep_surrounding_whitespace() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) = in_channel(api.clone(), Permissions::empty(), &[]);
        session.dispatch("    let x = 1;  ").await.unwrap();
        assert_eq!(
            mutating_calls(&api),
            vec![ApiCall::SendMessage {
                channel: "01GENERAL".to_string(),
                draft: MessageDraft::text("    let x = 1;  "),
            }]
        );
    }

    #[tokio::test]
    async fn sent_messages_render_as_own_and_enter_recent() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) = in_channel(api.clone(), Permissions::empty(), &[]);
        assert_eq!(session.dispatch("hi all").await.unwrap(), Dispatch::Continue);
        assert_eq!(session.state.recent.len(), 1);
        assert_eq!(
            output.snapshot(),
            vec![Rendered::Message {
                author: "me".to_string(),
                content: "hi all".to_string(),
                own: true,
            }]
        );
    }

    #[tokio::test]
    async fn failed_send_is_reported_and_not_cached() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")).failing_sends());
        let (mut session, _events, output) = in_channel(api.clone(), Permissions::empty(), &[]);
        session.dispatch("hi all").await.unwrap();
        assert!(session.state.recent.is_empty());
        assert_eq!(output.errors().len(), 1);
    }

    #[tokio::test]
    async fn upload_prompts_for_path() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) =
            in_channel(api.clone(), Permissions::empty(), &["/tmp/cat.png"]);
        session.dispatch("/upload").await.unwrap();
        assert_eq!(
            mutating_calls(&api),
            vec![
                ApiCall::Upload("/tmp/cat.png".to_string()),
                ApiCall::SendMessage {
                    channel: "01GENERAL".to_string(),
                    draft: MessageDraft::attachment(MockApi::UPLOADED_FILE),
                },
            ]
        );
    }

    #[tokio::test]
    async fn leave_and_exit_control_the_loop() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) = in_channel(api, Permissions::empty(), &[]);
        assert_eq!(session.dispatch("/leave").await.unwrap(), Dispatch::Leave);
        assert!(matches!(session.dispatch("/exit").await, Err(Shutdown::Exit)));
    }

    #[tokio::test]
    async fn config_changes_apply_to_the_session() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) = in_channel(api, Permissions::empty(), &[]);
        session.dispatch("/config color off").await.unwrap();
        session.dispatch("/config history 50").await.unwrap();
        assert!(!session.config.color);
        assert_eq!(session.config.history_limit, 50);
    }

    #[tokio::test]
    async fn rename_requires_manage_server() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) =
            in_channel(api.clone(), Permissions::MANAGE_SERVER, &[]);
        session.dispatch("/serverconfig name Beta").await.unwrap();
        assert_eq!(
            session.state.cache.server("01ALPHA").map(|s| s.name.as_str()),
            Some("Beta")
        );
        assert_eq!(
            mutating_calls(&api),
            vec![ApiCall::RenameServer {
                server: "01ALPHA".to_string(),
                name: "Beta".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn users_groups_by_primary_role() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) = in_channel(api, Permissions::empty(), &[]);
        if let Some(me) = session.state.cache.user_mut("01SELF") {
            me.online = true;
        }
        session.dispatch("/users").await.unwrap();
        assert_eq!(
            output.snapshot(),
            vec![
                Rendered::Heading("Mod".to_string()),
                Rendered::Info("  Online (1): me".to_string()),
                Rendered::Heading("Members".to_string()),
                Rendered::Info("  Offline (1): bob".to_string()),
            ]
        );
    }
}
