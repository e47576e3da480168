//! Test doubles for driving a [`Session`] without a network or a terminal.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::input::{InputEvent, InputSource};
use super::render::Renderer;
use super::session::Session;
use crate::client::{ChatApi, MemberList, MessageHistory, SelfPatch};
use crate::error::{Error, Result};
use crate::gateway::{Gateway, GatewayEvent};
use crate::types::{
    Member, Message, MessageDraft, PermissionOverride, Role, User, UserProfile,
};

/// One request made against [`MockApi`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ApiCall {
    Login(String),
    FetchSelf,
    FetchUser(String),
    FetchProfile(String),
    FetchMembers(String),
    FetchMessages { channel: String, limit: usize },
    SendMessage { channel: String, draft: MessageDraft },
    EditMessage { channel: String, message: String, content: String },
    DeleteMessage { channel: String, message: String },
    UpdateSelf(SelfPatch),
    SetNickname { server: String, user: String, nickname: Option<String> },
    UpdateRoles { server: String, user: String, roles: Vec<String> },
    Kick { server: String, user: String },
    Ban { server: String, user: String, reason: Option<String> },
    CreateRole { server: String, name: String },
    SetRolePermissions { server: String, role: String, permissions: PermissionOverride },
    RenameServer { server: String, name: String },
    AddFriend(String),
    RemoveFriend(String),
    Upload(String),
}

/// Records every call and answers from canned data.
pub(crate) struct MockApi {
    pub self_user: User,
    pub members: Vec<Member>,
    pub history: Vec<Message>,
    fail_self: bool,
    fail_sends: bool,
    sent: AtomicU64,
    calls: Mutex<Vec<ApiCall>>,
}

impl MockApi {
    pub const TOKEN: &'static str = "session-token";
    pub const CREATED_ROLE: &'static str = "01NEWROLE";
    pub const UPLOADED_FILE: &'static str = "01UPLOAD";

    pub fn new(self_user: User) -> Self {
        Self {
            self_user,
            members: Vec::new(),
            history: Vec::new(),
            fail_self: false,
            fail_sends: false,
            sent: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_self(mut self) -> Self {
        self.fail_self = true;
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn login(&self, email: &str, password: &str) -> Result<String> {
        self.record(ApiCall::Login(email.to_string()));
        if password == "wrong" {
            return Err(Error::authentication("invalid credentials"));
        }
        Ok(Self::TOKEN.to_string())
    }

    async fn fetch_self(&self, _token: &str) -> Result<User> {
        self.record(ApiCall::FetchSelf);
        if self.fail_self {
            return Err(Error::authentication("session expired"));
        }
        Ok(self.self_user.clone())
    }

    async fn fetch_user(&self, user_id: &str, _token: &str) -> Result<User> {
        self.record(ApiCall::FetchUser(user_id.to_string()));
        Ok(User::new(user_id, user_id.to_lowercase()))
    }

    async fn fetch_profile(&self, user_id: &str, _token: &str) -> Result<UserProfile> {
        self.record(ApiCall::FetchProfile(user_id.to_string()));
        Ok(UserProfile::default())
    }

    async fn fetch_server_members(&self, server_id: &str, _token: &str) -> Result<MemberList> {
        self.record(ApiCall::FetchMembers(server_id.to_string()));
        Ok(MemberList {
            members: self.members.clone(),
            users: Vec::new(),
        })
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        _token: &str,
        limit: usize,
    ) -> Result<MessageHistory> {
        self.record(ApiCall::FetchMessages {
            channel: channel_id.to_string(),
            limit,
        });
        Ok(MessageHistory {
            messages: self.history.clone(),
            ..MessageHistory::default()
        })
    }

    async fn send_message(
        &self,
        channel_id: &str,
        _token: &str,
        draft: &MessageDraft,
    ) -> Result<Message> {
        self.record(ApiCall::SendMessage {
            channel: channel_id.to_string(),
            draft: draft.clone(),
        });
        if self.fail_sends {
            return Err(Error::permission("missing SendMessage"));
        }
        let sequence = self.sent.fetch_add(1, Ordering::Relaxed);
        let mut message = Message::new(
            format!("01SENT{sequence:06}"),
            channel_id,
            self.self_user.id.clone(),
            draft.content.clone(),
        );
        message.replies = draft.replies.iter().map(|reply| reply.id.clone()).collect();
        Ok(message)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        _token: &str,
        content: &str,
    ) -> Result<()> {
        self.record(ApiCall::EditMessage {
            channel: channel_id.to_string(),
            message: message_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str, _token: &str) -> Result<()> {
        self.record(ApiCall::DeleteMessage {
            channel: channel_id.to_string(),
            message: message_id.to_string(),
        });
        Ok(())
    }

    async fn update_self(&self, _token: &str, patch: &SelfPatch) -> Result<User> {
        self.record(ApiCall::UpdateSelf(patch.clone()));
        let mut user = self.self_user.clone();
        if let Some(display_name) = &patch.display_name {
            user.display_name = Some(display_name.clone());
        }
        if let Some(status) = &patch.status {
            user.status = Some(status.clone());
        }
        Ok(user)
    }

    async fn set_nickname(
        &self,
        server_id: &str,
        user_id: &str,
        _token: &str,
        nickname: Option<&str>,
    ) -> Result<()> {
        self.record(ApiCall::SetNickname {
            server: server_id.to_string(),
            user: user_id.to_string(),
            nickname: nickname.map(str::to_string),
        });
        Ok(())
    }

    async fn update_member_roles(
        &self,
        server_id: &str,
        user_id: &str,
        _token: &str,
        roles: &[String],
    ) -> Result<()> {
        self.record(ApiCall::UpdateRoles {
            server: server_id.to_string(),
            user: user_id.to_string(),
            roles: roles.to_vec(),
        });
        Ok(())
    }

    async fn kick_member(&self, server_id: &str, user_id: &str, _token: &str) -> Result<()> {
        self.record(ApiCall::Kick {
            server: server_id.to_string(),
            user: user_id.to_string(),
        });
        Ok(())
    }

    async fn ban_member(
        &self,
        server_id: &str,
        user_id: &str,
        _token: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        self.record(ApiCall::Ban {
            server: server_id.to_string(),
            user: user_id.to_string(),
            reason: reason.map(str::to_string),
        });
        Ok(())
    }

    async fn create_role(&self, server_id: &str, _token: &str, name: &str) -> Result<(String, Role)> {
        self.record(ApiCall::CreateRole {
            server: server_id.to_string(),
            name: name.to_string(),
        });
        Ok((Self::CREATED_ROLE.to_string(), Role::new(name)))
    }

    async fn set_role_permissions(
        &self,
        server_id: &str,
        role_id: &str,
        _token: &str,
        permissions: PermissionOverride,
    ) -> Result<()> {
        self.record(ApiCall::SetRolePermissions {
            server: server_id.to_string(),
            role: role_id.to_string(),
            permissions,
        });
        Ok(())
    }

    async fn rename_server(&self, server_id: &str, _token: &str, name: &str) -> Result<()> {
        self.record(ApiCall::RenameServer {
            server: server_id.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn add_friend(&self, username: &str, _token: &str) -> Result<()> {
        self.record(ApiCall::AddFriend(username.to_string()));
        Ok(())
    }

    async fn remove_friend(&self, user_id: &str, _token: &str) -> Result<()> {
        self.record(ApiCall::RemoveFriend(user_id.to_string()));
        Ok(())
    }

    async fn upload_file(&self, path: &Path, _token: &str) -> Result<String> {
        self.record(ApiCall::Upload(path.display().to_string()));
        Ok(Self::UPLOADED_FILE.to_string())
    }

    fn avatar_url(&self, file_id: &str) -> String {
        format!("https://files.test/avatars/{file_id}")
    }
}

/// One line of renderer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rendered {
    Message { author: String, content: String, own: bool },
    Update(String, String),
    Delete(String),
    Heading(String),
    Info(String),
    Success(String),
    Error(String),
}

/// Shared view of what a [`RecordingRenderer`] printed.
#[derive(Debug, Clone, Default)]
pub(crate) struct RenderLog(Arc<Mutex<Vec<Rendered>>>);

impl RenderLog {
    pub fn snapshot(&self) -> Vec<Rendered> {
        self.0.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|line| match line {
                Rendered::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|line| match line {
                Rendered::Info(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, line: Rendered) {
        self.0.lock().unwrap().push(line);
    }
}

/// Renderer that records instead of printing.
pub(crate) struct RecordingRenderer {
    log: RenderLog,
}

impl Renderer for RecordingRenderer {
    fn print_message(&mut self, author: &str, message: &Message, own: bool) {
        self.log.push(Rendered::Message {
            author: author.to_string(),
            content: message.text().to_string(),
            own,
        });
    }

    fn print_message_update(&mut self, short_id: &str, content: &str) {
        self.log
            .push(Rendered::Update(short_id.to_string(), content.to_string()));
    }

    fn print_message_delete(&mut self, short_id: &str) {
        self.log.push(Rendered::Delete(short_id.to_string()));
    }

    fn print_heading(&mut self, title: &str) {
        self.log.push(Rendered::Heading(title.to_string()));
    }

    fn print_info(&mut self, info: &str) {
        self.log.push(Rendered::Info(info.to_string()));
    }

    fn print_success(&mut self, text: &str) {
        self.log.push(Rendered::Success(text.to_string()));
    }

    fn print_error(&mut self, error: &str) {
        self.log.push(Rendered::Error(error.to_string()));
    }

    fn set_color(&mut self, _: bool) {}
}

/// Input that replays fixed lines, then reports end of input.
pub(crate) struct ScriptedInput {
    lines: VecDeque<String>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedInput {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|line| line.to_string()).collect(),
            prompts: Arc::default(),
        }
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(match self.lines.pop_front() {
            Some(line) => InputEvent::Line(line),
            None => InputEvent::Eof,
        })
    }
}

/// A session over a detached gateway.  The returned sender feeds gateway
/// events; keep it alive or the session sees a disconnect.
pub(crate) fn harness(
    api: Arc<MockApi>,
    input: &[&str],
) -> (Session, mpsc::UnboundedSender<GatewayEvent>, RenderLog) {
    let (gateway, _outbound) = Gateway::detached();
    let (events_tx, events) = mpsc::unbounded_channel();
    let log = RenderLog::default();
    let session = Session::new(
        api,
        gateway,
        events,
        MockApi::TOKEN,
        Box::new(ScriptedInput::new(input)),
        Box::new(RecordingRenderer { log: log.clone() }),
    );
    (session, events_tx, log)
}

/// A `Ready` frame with one server `Alpha` holding `#general`.
pub(crate) fn ready_frame() -> String {
    serde_json::json!({
        "type": "Ready",
        "users": [{ "_id": "01SELF", "username": "me", "online": true }],
        "servers": [{
            "_id": "01ALPHA",
            "owner": "01SELF",
            "name": "Alpha",
            "channels": ["01GENERAL"],
        }],
        "channels": [{
            "_id": "01GENERAL",
            "channel_type": "TextChannel",
            "server": "01ALPHA",
            "name": "general",
        }],
    })
    .to_string()
}
