//! Wire and domain types for the Revolt API.

mod channel;
mod event;
mod member;
mod message;
mod permissions;
mod server;
mod user;

pub use channel::Channel;
pub use event::{ClientFrame, ReadyPayload, ServerEvent};
pub use member::{Member, MemberId, MemberPatch};
pub use message::{
    Message, MessageDraft, MessagePatch, ReplyRef, SHORT_ID_LEN, short_id,
};
pub use permissions::{PermissionOverride, Permissions};
pub use server::{Category, Role, RolePatch, Server};
pub use user::{
    BotInformation, FileRef, Presence, Relationship, User, UserPatch, UserProfile, UserStatus,
};
