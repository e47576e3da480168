//! The interactive chat client.
//!
//! - [`config`]: command-line flags and the persisted config record
//! - [`session`]: the control loop owning all client state
//! - [`commands`]: slash command parsing
//! - [`render`]: terminal output
//! - [`input`]: line input that can be raced against gateway events
//!
//! The session applies gateway events (`reconcile`), walks the server and
//! channel menus (`select`) and runs typed lines (`dispatch`).

mod commands;
mod config;
mod deferred;
mod dispatch;
mod input;
mod login;
mod recent;
mod reconcile;
mod render;
mod select;
mod session;

#[cfg(test)]
mod testing;

pub use commands::{
    ChatCommand, ConfigAction, FriendsAction, ServerConfigAction, UserConfigAction, help_text,
    parse_command,
};
pub use config::{
    CONFIG_FILE_NAME, CliArgs, CliOptions, Config, ConfigStore, DEFAULT_HISTORY_LIMIT,
    MAX_HISTORY_LIMIT, default_config_path,
};
pub use deferred::{DeferredTasks, RoleRestore};
pub use dispatch::MUZZLED_ROLE;
pub use input::{ConsoleInput, InputEvent, InputSource};
pub use login::authenticate;
pub use recent::{RECENT_CAPACITY, RecentMessages};
pub use render::{Renderer, TerminalRenderer, format_markdown};
pub use session::{INIT_POLL, Phase, Session, SessionState, Shutdown};
