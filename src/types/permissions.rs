use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Server permission bits, at the positions the Revolt API uses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        const MANAGE_CHANNEL        = 1 << 0;
        const MANAGE_SERVER         = 1 << 1;
        const MANAGE_PERMISSIONS    = 1 << 2;
        const MANAGE_ROLE           = 1 << 3;
        const MANAGE_CUSTOMISATION  = 1 << 4;
        const KICK_MEMBERS          = 1 << 6;
        const BAN_MEMBERS           = 1 << 7;
        const TIMEOUT_MEMBERS       = 1 << 8;
        const ASSIGN_ROLES          = 1 << 9;
        const CHANGE_NICKNAME       = 1 << 10;
        const MANAGE_NICKNAMES      = 1 << 11;
        const CHANGE_AVATAR         = 1 << 12;
        const REMOVE_AVATARS        = 1 << 13;

        const VIEW_CHANNEL          = 1 << 20;
        const READ_MESSAGE_HISTORY  = 1 << 21;
        const SEND_MESSAGE          = 1 << 22;
        const MANAGE_MESSAGES       = 1 << 23;
        const MANAGE_WEBHOOKS       = 1 << 24;
        const INVITE_OTHERS         = 1 << 25;
        const SEND_EMBEDS           = 1 << 26;
        const UPLOAD_FILES          = 1 << 27;
        const MASQUERADE            = 1 << 28;
        const REACT                 = 1 << 29;

        const CONNECT               = 1 << 30;
        const SPEAK                 = 1 << 31;
        const VIDEO                 = 1 << 32;
        const MUTE_MEMBERS          = 1 << 33;
        const DEAFEN_MEMBERS        = 1 << 34;
        const MOVE_MEMBERS          = 1 << 35;
    }
}

/// Allow/deny pair as carried by roles on the wire (`{"a": .., "d": ..}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    /// Allowed bits.
    #[serde(rename = "a", default)]
    pub allow: u64,
    /// Denied bits.
    #[serde(rename = "d", default)]
    pub deny: u64,
}

impl PermissionOverride {
    /// Creates an override from typed bit sets.
    pub fn new(allow: Permissions, deny: Permissions) -> Self {
        Self {
            allow: allow.bits(),
            deny: deny.bits(),
        }
    }

    /// The allowed bits as a typed set; unknown bits are dropped.
    pub fn allowed(&self) -> Permissions {
        Permissions::from_bits_truncate(self.allow)
    }

    /// The denied bits as a typed set; unknown bits are dropped.
    pub fn denied(&self) -> Permissions {
        Permissions::from_bits_truncate(self.deny)
    }
}
