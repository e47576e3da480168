use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::member::{Member, MemberId, MemberPatch};
use super::message::{Message, MessagePatch};
use super::server::{RolePatch, Server};
use super::user::{User, UserPatch};
use crate::error::Result;

/// Frames received over the event connection, discriminated by `type`.
///
/// Frame types the client does not act on decode to [`ServerEvent::Unknown`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The `Authenticate` frame was accepted.
    Authenticated,

    /// Initial snapshot of everything visible to the session.
    Ready(ReadyPayload),

    /// A new message.
    Message(Message),

    /// A message was edited.
    MessageUpdate {
        id: String,
        channel: String,
        #[serde(default)]
        data: MessagePatch,
    },

    /// A message was deleted.
    MessageDelete { id: String, channel: String },

    /// A user started typing.
    BeginTyping {
        #[serde(alias = "id")]
        channel: String,
        user: String,
    },

    /// A user stopped typing.
    EndTyping {
        #[serde(alias = "id")]
        channel: String,
        user: String,
    },

    /// Presence or profile fields of a user changed.
    UserUpdate {
        id: String,
        #[serde(default)]
        data: UserPatch,
        #[serde(default)]
        clear: Vec<String>,
    },

    /// A server membership changed (nickname, roles).
    ServerMemberUpdate {
        id: MemberId,
        #[serde(default)]
        data: MemberPatch,
        #[serde(default)]
        clear: Vec<String>,
    },

    /// A server role was created or changed.
    ServerRoleUpdate {
        id: String,
        role_id: String,
        #[serde(default)]
        data: RolePatch,
        #[serde(default)]
        clear: Vec<String>,
    },

    /// The server rejected the session.
    Error { error: String },

    /// Any frame type the client ignores (`Pong`, `ChannelAck`, ...).
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decodes one raw text frame.
    pub fn decode(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }

    /// The wire name of this event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Authenticated => "Authenticated",
            ServerEvent::Ready(_) => "Ready",
            ServerEvent::Message(_) => "Message",
            ServerEvent::MessageUpdate { .. } => "MessageUpdate",
            ServerEvent::MessageDelete { .. } => "MessageDelete",
            ServerEvent::BeginTyping { .. } => "BeginTyping",
            ServerEvent::EndTyping { .. } => "EndTyping",
            ServerEvent::UserUpdate { .. } => "UserUpdate",
            ServerEvent::ServerMemberUpdate { .. } => "ServerMemberUpdate",
            ServerEvent::ServerRoleUpdate { .. } => "ServerRoleUpdate",
            ServerEvent::Error { .. } => "Error",
            ServerEvent::Unknown => "Unknown",
        }
    }
}

/// Payload of the `Ready` snapshot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReadyPayload {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// Frames sent over the event connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Sent once when the connection opens.
    Authenticate { token: String },
    /// Keepalive.
    Ping { data: u64 },
}

impl ClientFrame {
    /// Encodes the frame as JSON text.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_unit_and_unknown_frames() {
        assert_eq!(
            ServerEvent::decode(r#"{"type":"Authenticated"}"#).unwrap(),
            ServerEvent::Authenticated
        );
        assert_eq!(
            ServerEvent::decode(r#"{"type":"Pong","data":0}"#).unwrap(),
            ServerEvent::Unknown
        );
    }

    #[test]
    fn decodes_message_update_content() {
        let event = ServerEvent::decode(
            r#"{"type":"MessageUpdate","id":"01M","channel":"01C","data":{"content":"edited","edited":"2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        let ServerEvent::MessageUpdate { id, data, .. } = event else {
            panic!("expected MessageUpdate, got {event:?}");
        };
        assert_eq!(id, "01M");
        assert_eq!(data.content.as_deref(), Some("edited"));
    }

    #[test]
    fn typing_accepts_id_alias() {
        let event =
            ServerEvent::decode(r#"{"type":"BeginTyping","id":"01C","user":"01U"}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::BeginTyping {
                channel: "01C".to_string(),
                user: "01U".to_string()
            }
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(ServerEvent::decode("not json").is_err());
        assert!(ServerEvent::decode(r#"{"type":"Message"}"#).is_err());
    }

    #[test]
    fn client_frames_encode_with_type_tag() {
        let auth = ClientFrame::Authenticate {
            token: "tok".to_string(),
        };
        assert_eq!(
            auth.encode().unwrap(),
            r#"{"type":"Authenticate","token":"tok"}"#
        );
        assert_eq!(
            ClientFrame::Ping { data: 0 }.encode().unwrap(),
            r#"{"type":"Ping","data":0}"#
        );
    }
}
