use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::types::{
    Member, Message, MessageDraft, PermissionOverride, Permissions, Role, User, UserProfile,
    UserStatus,
};

/// Default REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.revolt.chat";
/// Default event (WebSocket) endpoint.
pub const DEFAULT_WS_URL: &str = "wss://ws.revolt.chat";
/// Default file server endpoint.
pub const DEFAULT_AUTUMN_URL: &str = "https://autumn.revolt.chat";

const SESSION_HEADER: &str = "x-session-token";
const FRIENDLY_NAME: &str = "revolt-cli";

/// Server members together with their user records.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemberList {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub users: Vec<User>,
}

/// A page of channel history, newest first as returned by the API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageHistory {
    pub messages: Vec<Message>,
    pub users: Vec<User>,
    pub members: Vec<Member>,
}

/// Changes to the session's own account.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelfPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfilePatch>,
}

/// Profile fields of a [`SelfPatch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The REST surface the session consumes.
///
/// Every method takes the session token explicitly; implementations do not
/// retry and do not time out unless configured to.
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    /// Exchanges credentials for a session token.
    async fn login(&self, email: &str, password: &str) -> Result<String>;

    /// Fetches the account behind `token`.
    async fn fetch_self(&self, token: &str) -> Result<User>;

    /// Fetches a user by id.
    async fn fetch_user(&self, user_id: &str, token: &str) -> Result<User>;

    /// Fetches a user's profile (bio).
    async fn fetch_profile(&self, user_id: &str, token: &str) -> Result<UserProfile>;

    /// Fetches every member of a server.
    async fn fetch_server_members(&self, server_id: &str, token: &str) -> Result<MemberList>;

    /// Fetches the most recent `limit` messages of a channel.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        token: &str,
        limit: usize,
    ) -> Result<MessageHistory>;

    /// Posts a message.
    async fn send_message(
        &self,
        channel_id: &str,
        token: &str,
        draft: &MessageDraft,
    ) -> Result<Message>;

    /// Replaces the content of a message.
    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        token: &str,
        content: &str,
    ) -> Result<()>;

    /// Deletes a message.
    async fn delete_message(&self, channel_id: &str, message_id: &str, token: &str)
    -> Result<()>;

    /// Updates the session's own account.
    async fn update_self(&self, token: &str, patch: &SelfPatch) -> Result<User>;

    /// Sets (or with `None` clears) a member's nickname.
    async fn set_nickname(
        &self,
        server_id: &str,
        user_id: &str,
        token: &str,
        nickname: Option<&str>,
    ) -> Result<()>;

    /// Replaces a member's role list.
    async fn update_member_roles(
        &self,
        server_id: &str,
        user_id: &str,
        token: &str,
        roles: &[String],
    ) -> Result<()>;

    /// Removes a member from a server.
    async fn kick_member(&self, server_id: &str, user_id: &str, token: &str) -> Result<()>;

    /// Bans a user from a server.
    async fn ban_member(
        &self,
        server_id: &str,
        user_id: &str,
        token: &str,
        reason: Option<&str>,
    ) -> Result<()>;

    /// Creates a role and returns its id and initial state.
    async fn create_role(&self, server_id: &str, token: &str, name: &str) -> Result<(String, Role)>;

    /// Sets a role's server-wide allow/deny bits.
    async fn set_role_permissions(
        &self,
        server_id: &str,
        role_id: &str,
        token: &str,
        permissions: PermissionOverride,
    ) -> Result<()>;

    /// Renames a server.
    async fn rename_server(&self, server_id: &str, token: &str, name: &str) -> Result<()>;

    /// Sends a friend request by username.
    async fn add_friend(&self, username: &str, token: &str) -> Result<()>;

    /// Removes a friend.
    async fn remove_friend(&self, user_id: &str, token: &str) -> Result<()>;

    /// Uploads a file and returns its attachment id.
    async fn upload_file(&self, path: &Path, token: &str) -> Result<String>;

    /// Public URL of an avatar file.
    fn avatar_url(&self, file_id: &str) -> String;
}

/// HTTP implementation of [`ChatApi`].
#[derive(Debug, Clone)]
pub struct RevoltClient {
    client: ReqwestClient,
    api_url: String,
    autumn_url: String,
    timeout: Option<Duration>,
}

impl RevoltClient {
    /// Create a client against the public Revolt instance.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None, None)
    }

    /// Create a client with custom endpoints and an optional request timeout.
    pub fn with_options(
        api_url: Option<String>,
        autumn_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_url = normalize_base(api_url.as_deref().unwrap_or(DEFAULT_API_URL))?;
        let autumn_url = normalize_base(autumn_url.as_deref().unwrap_or(DEFAULT_AUTUMN_URL))?;

        let mut builder = ReqwestClient::builder().default_headers(default_headers());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            api_url,
            autumn_url,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn authed(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header(SESSION_HEADER, token)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            match Error::from(e) {
                Error::Timeout { message, .. } => {
                    Error::timeout(message, self.timeout.map(|t| t.as_secs_f64()))
                }
                err => err,
            }
        })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.execute(request).await?;
        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
        let error_type = parsed.as_ref().and_then(|e| e.error_type.clone());
        let message = parsed
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.error_type.clone()))
            .unwrap_or_else(|| body.clone());

        match status_code {
            400 => Error::bad_request(message, None),
            401 => Error::authentication(message),
            403 => Error::permission(message),
            404 => Error::not_found(message, error_type, None),
            429 => Error::rate_limit(message, retry_after),
            _ => Error::api(status_code, error_type, message),
        }
    }
}

#[async_trait::async_trait]
impl ChatApi for RevoltClient {
    async fn login(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct LoginResponse {
            result: String,
            token: Option<String>,
        }

        let request = self.client.post(self.url("/auth/session/login")).json(&json!({
            "email": email,
            "password": password,
            "friendly_name": FRIENDLY_NAME,
        }));
        let response: LoginResponse = self
            .execute_json(request)
            .await
            .map_err(|err| Error::authentication(format!("Login failed: {err}")))?;
        match (response.result.as_str(), response.token) {
            ("Success", Some(token)) => Ok(token),
            ("MFA", _) => Err(Error::authentication(
                "Login failed: multi-factor authentication is not supported",
            )),
            (result, _) => Err(Error::authentication(format!(
                "Login failed: unexpected result {result}"
            ))),
        }
    }

    async fn fetch_self(&self, token: &str) -> Result<User> {
        let request = self.authed(self.client.get(self.url("/users/@me")), token);
        self.execute_json(request).await
    }

    async fn fetch_user(&self, user_id: &str, token: &str) -> Result<User> {
        let request = self.authed(self.client.get(self.url(&format!("/users/{user_id}"))), token);
        self.execute_json(request).await
    }

    async fn fetch_profile(&self, user_id: &str, token: &str) -> Result<UserProfile> {
        let request = self.authed(
            self.client.get(self.url(&format!("/users/{user_id}/profile"))),
            token,
        );
        self.execute_json(request).await
    }

    async fn fetch_server_members(&self, server_id: &str, token: &str) -> Result<MemberList> {
        let request = self.authed(
            self.client.get(self.url(&format!("/servers/{server_id}/members"))),
            token,
        );
        self.execute_json(request).await
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        token: &str,
        limit: usize,
    ) -> Result<MessageHistory> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum HistoryResponse {
            Bundle {
                messages: Vec<Message>,
                #[serde(default)]
                users: Vec<User>,
                #[serde(default)]
                members: Vec<Member>,
            },
            Bare(Vec<Message>),
        }

        let request = self
            .authed(
                self.client
                    .get(self.url(&format!("/channels/{channel_id}/messages"))),
                token,
            )
            .query(&[
                ("limit", limit.to_string()),
                ("include_users", "true".to_string()),
            ]);
        let history = match self.execute_json::<HistoryResponse>(request).await? {
            HistoryResponse::Bundle {
                messages,
                users,
                members,
            } => MessageHistory {
                messages,
                users,
                members,
            },
            HistoryResponse::Bare(messages) => MessageHistory {
                messages,
                ..MessageHistory::default()
            },
        };
        Ok(history)
    }

    async fn send_message(
        &self,
        channel_id: &str,
        token: &str,
        draft: &MessageDraft,
    ) -> Result<Message> {
        let request = self
            .authed(
                self.client
                    .post(self.url(&format!("/channels/{channel_id}/messages"))),
                token,
            )
            .json(draft);
        self.execute_json(request).await
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        token: &str,
        content: &str,
    ) -> Result<()> {
        let request = self
            .authed(
                self.client.patch(
                    self.url(&format!("/channels/{channel_id}/messages/{message_id}")),
                ),
                token,
            )
            .json(&json!({ "content": content }));
        self.execute(request).await.map(|_| ())
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
        token: &str,
    ) -> Result<()> {
        let request = self.authed(
            self.client.delete(
                self.url(&format!("/channels/{channel_id}/messages/{message_id}")),
            ),
            token,
        );
        self.execute(request).await.map(|_| ())
    }

    async fn update_self(&self, token: &str, patch: &SelfPatch) -> Result<User> {
        let request = self
            .authed(self.client.patch(self.url("/users/@me")), token)
            .json(patch);
        self.execute_json(request).await
    }

    async fn set_nickname(
        &self,
        server_id: &str,
        user_id: &str,
        token: &str,
        nickname: Option<&str>,
    ) -> Result<()> {
        let body = match nickname {
            Some(nickname) => json!({ "nickname": nickname }),
            None => json!({ "remove": ["Nickname"] }),
        };
        let request = self
            .authed(
                self.client
                    .patch(self.url(&format!("/servers/{server_id}/members/{user_id}"))),
                token,
            )
            .json(&body);
        self.execute(request).await.map(|_| ())
    }

    async fn update_member_roles(
        &self,
        server_id: &str,
        user_id: &str,
        token: &str,
        roles: &[String],
    ) -> Result<()> {
        let request = self
            .authed(
                self.client
                    .patch(self.url(&format!("/servers/{server_id}/members/{user_id}"))),
                token,
            )
            .json(&json!({ "roles": roles }));
        self.execute(request).await.map(|_| ())
    }

    async fn kick_member(&self, server_id: &str, user_id: &str, token: &str) -> Result<()> {
        let request = self.authed(
            self.client
                .delete(self.url(&format!("/servers/{server_id}/members/{user_id}"))),
            token,
        );
        self.execute(request).await.map(|_| ())
    }

    async fn ban_member(
        &self,
        server_id: &str,
        user_id: &str,
        token: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        let request = self
            .authed(
                self.client
                    .put(self.url(&format!("/servers/{server_id}/bans/{user_id}"))),
                token,
            )
            .json(&json!({ "reason": reason }));
        self.execute(request).await.map(|_| ())
    }

    async fn create_role(&self, server_id: &str, token: &str, name: &str) -> Result<(String, Role)> {
        #[derive(Deserialize)]
        struct NewRole {
            id: String,
            role: Role,
        }

        let request = self
            .authed(
                self.client
                    .post(self.url(&format!("/servers/{server_id}/roles"))),
                token,
            )
            .json(&json!({ "name": name }));
        let created: NewRole = self.execute_json(request).await?;
        Ok((created.id, created.role))
    }

    async fn set_role_permissions(
        &self,
        server_id: &str,
        role_id: &str,
        token: &str,
        permissions: PermissionOverride,
    ) -> Result<()> {
        let request = self
            .authed(
                self.client
                    .put(self.url(&format!("/servers/{server_id}/permissions/{role_id}"))),
                token,
            )
            .json(&json!({
                "permissions": {
                    "allow": permissions.allow,
                    "deny": permissions.deny,
                }
            }));
        self.execute(request).await.map(|_| ())
    }

    async fn rename_server(&self, server_id: &str, token: &str, name: &str) -> Result<()> {
        let request = self
            .authed(
                self.client.patch(self.url(&format!("/servers/{server_id}"))),
                token,
            )
            .json(&json!({ "name": name }));
        self.execute(request).await.map(|_| ())
    }

    async fn add_friend(&self, username: &str, token: &str) -> Result<()> {
        let request = self
            .authed(self.client.post(self.url("/users/friend")), token)
            .json(&json!({ "username": username }));
        self.execute(request).await.map(|_| ())
    }

    async fn remove_friend(&self, user_id: &str, token: &str) -> Result<()> {
        let request = self.authed(
            self.client
                .delete(self.url(&format!("/users/{user_id}/friend"))),
            token,
        );
        self.execute(request).await.map(|_| ())
    }

    async fn upload_file(&self, path: &Path, token: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Uploaded {
            id: String,
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let request = self
            .authed(
                self.client
                    .post(format!("{}/attachments", self.autumn_url)),
                token,
            )
            .multipart(form);
        let uploaded: Uploaded = self.execute_json(request).await?;
        Ok(uploaded.id)
    }

    fn avatar_url(&self, file_id: &str) -> String {
        format!("{}/avatars/{}", self.autumn_url, file_id)
    }
}

/// Headers sent with every request.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static(concat!("revolt-cli/", env!("CARGO_PKG_VERSION"))),
    );
    headers
}

/// Validates a base URL and strips its trailing slash.
fn normalize_base(base: &str) -> Result<String> {
    let parsed = Url::parse(base)?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Deny bits applied to the role `/timeout` creates.
pub fn muzzle_permissions() -> PermissionOverride {
    PermissionOverride::new(
        Permissions::empty(),
        Permissions::SEND_MESSAGE | Permissions::INVITE_OTHERS,
    )
}
