//! Slash command parsing.
//!
//! The command token is the text before the first space, lower-cased; the
//! arguments are the whitespace-split remainder in their original case.
//! Argument validation happens here, so a handler only ever sees well-formed
//! commands and a malformed one becomes [`ChatCommand::Invalid`] carrying the
//! usage line.

use super::config::MAX_HISTORY_LIMIT;
use crate::types::Presence;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Close the connection and quit.
    Exit,

    /// Return to channel selection.
    Leave,

    /// Display help information.
    Help,

    /// Show the session's own account.
    Whoami,

    /// List the users of the active channel.
    Users,

    /// Set the nickname on the active server; `None` clears it.
    Nick(Option<String>),

    /// Show a user's profile.
    Profile(String),

    /// Set presence and optional status text.
    Status {
        presence: Presence,
        text: Option<String>,
    },

    /// Upload a file; prompts for the path when absent.
    Upload(Option<String>),

    /// Reply to a recent message.
    Reply { id: String, text: String },

    /// Edit a recent message.
    Edit { id: String, text: String },

    /// Delete a recent message.
    Delete(String),

    /// Forget the saved token and quit.
    Logout,

    /// Show or change display preferences.
    Config(ConfigAction),

    /// Show or change the account profile.
    UserConfig(UserConfigAction),

    /// Show or change the active server.
    ServerConfig(ServerConfigAction),

    /// Kick a member from the active server.
    Kick(String),

    /// Ban a member from the active server.
    Ban {
        user: String,
        reason: Option<String>,
    },

    /// Mute a member for a number of minutes.
    Timeout { user: String, minutes: u64 },

    /// Manage friends.
    Friends(FriendsAction),

    /// A known command with bad arguments; carries the usage line.
    Invalid(String),
}

/// Sub-actions of `/config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    Show,
    Color(bool),
    History(usize),
}

/// Sub-actions of `/userconfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserConfigAction {
    Show,
    Bio(String),
    DisplayName(String),
}

/// Sub-actions of `/serverconfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerConfigAction {
    Show,
    Name(String),
}

/// Sub-actions of `/friends`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendsAction {
    List,
    Add(String),
    Remove(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input starts with a known `/command`,
/// or `None` if it should be sent as a regular message.  An unrecognized
/// `/word` is ordinary text.
///
/// # Examples
///
/// ```
/// # use revolt_cli::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/leave"), Some(ChatCommand::Leave));
/// assert!(parse_command("/reply ab12cd hi there").is_some());
/// assert!(parse_command("hello everyone").is_none());
/// assert!(parse_command("/shrug hello").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    if !input.starts_with('/') {
        return None;
    }

    let mut words = input.split_whitespace();
    let command = words.next()?.to_lowercase();
    let args: Vec<&str> = words.collect();

    let result = match command.as_str() {
        "/exit" => ChatCommand::Exit,
        "/leave" => ChatCommand::Leave,
        "/help" => ChatCommand::Help,
        "/whoami" => ChatCommand::Whoami,
        "/users" => ChatCommand::Users,
        "/logout" => ChatCommand::Logout,
        "/nick" => ChatCommand::Nick(joined(&args)),
        "/profile" => match args.first() {
            Some(user) => ChatCommand::Profile(user.to_string()),
            None => usage("/profile <username>"),
        },
        "/status" => parse_status(&args),
        "/upload" => ChatCommand::Upload(joined(&args)),
        "/reply" => match parse_id_and_text(&args) {
            Some((id, text)) => ChatCommand::Reply { id, text },
            None => usage("/reply <message_id> <content>"),
        },
        "/edit" => match parse_id_and_text(&args) {
            Some((id, text)) => ChatCommand::Edit { id, text },
            None => usage("/edit <message_id> <new_content>"),
        },
        "/delete" => match args.first() {
            Some(id) => ChatCommand::Delete(id.to_string()),
            None => usage("/delete <message_id>"),
        },
        "/config" => parse_config(&args),
        "/userconfig" => parse_userconfig(&args),
        "/serverconfig" => parse_serverconfig(&args),
        "/kick" => match args.first() {
            Some(user) => ChatCommand::Kick(user.to_string()),
            None => usage("/kick <username>"),
        },
        "/ban" => match args.split_first() {
            Some((user, reason)) => ChatCommand::Ban {
                user: user.to_string(),
                reason: joined(reason),
            },
            None => usage("/ban <username> [reason]"),
        },
        "/timeout" => parse_timeout(&args),
        "/friends" => parse_friends(&args),
        _ => return None,
    };

    Some(result)
}

fn usage(line: &str) -> ChatCommand {
    ChatCommand::Invalid(format!("Usage: {line}"))
}

fn joined(args: &[&str]) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    }
}

fn parse_id_and_text(args: &[&str]) -> Option<(String, String)> {
    let (id, rest) = args.split_first()?;
    let text = joined(rest)?;
    Some((id.to_string(), text))
}

fn parse_status(args: &[&str]) -> ChatCommand {
    let Some((presence, text)) = args.split_first() else {
        return usage("/status <online|idle|busy|invisible|focus> [status message]");
    };
    match Presence::parse(presence) {
        Some(presence) => ChatCommand::Status {
            presence,
            text: joined(text),
        },
        None => ChatCommand::Invalid(
            "Invalid presence. Use one of: online, idle, busy, invisible, focus".to_string(),
        ),
    }
}

fn parse_config(args: &[&str]) -> ChatCommand {
    match args {
        [] => ChatCommand::Config(ConfigAction::Show),
        [key, value] if key.eq_ignore_ascii_case("color") => match parse_on_off(value) {
            Some(on) => ChatCommand::Config(ConfigAction::Color(on)),
            None => usage("/config color on|off"),
        },
        [key, value] if key.eq_ignore_ascii_case("history") => match value.parse::<usize>() {
            Ok(limit) if (1..=MAX_HISTORY_LIMIT).contains(&limit) => {
                ChatCommand::Config(ConfigAction::History(limit))
            }
            _ => usage("/config history <1-100>"),
        },
        _ => usage("/config [color on|off | history <n>]"),
    }
}

fn parse_userconfig(args: &[&str]) -> ChatCommand {
    let Some((key, rest)) = args.split_first() else {
        return ChatCommand::UserConfig(UserConfigAction::Show);
    };
    match (key.to_lowercase().as_str(), joined(rest)) {
        ("bio", Some(bio)) => ChatCommand::UserConfig(UserConfigAction::Bio(bio)),
        ("displayname", Some(name)) => {
            ChatCommand::UserConfig(UserConfigAction::DisplayName(name))
        }
        _ => usage("/userconfig [bio <text> | displayname <name>]"),
    }
}

fn parse_serverconfig(args: &[&str]) -> ChatCommand {
    let Some((key, rest)) = args.split_first() else {
        return ChatCommand::ServerConfig(ServerConfigAction::Show);
    };
    match (key.to_lowercase().as_str(), joined(rest)) {
        ("name", Some(name)) => ChatCommand::ServerConfig(ServerConfigAction::Name(name)),
        _ => usage("/serverconfig [name <new name>]"),
    }
}

fn parse_timeout(args: &[&str]) -> ChatCommand {
    match args {
        [user, minutes] => match minutes.parse::<u64>() {
            Ok(minutes) if minutes > 0 => ChatCommand::Timeout {
                user: user.to_string(),
                minutes,
            },
            _ => ChatCommand::Invalid("/timeout expects a positive number of minutes".to_string()),
        },
        _ => usage("/timeout <username> <minutes>"),
    }
}

fn parse_friends(args: &[&str]) -> ChatCommand {
    let action = args.first().map(|action| action.to_lowercase());
    match (action.as_deref(), args.get(1)) {
        (Some("list"), _) => ChatCommand::Friends(FriendsAction::List),
        (Some("add"), Some(user)) => ChatCommand::Friends(FriendsAction::Add(user.to_string())),
        (Some("remove"), Some(user)) => {
            ChatCommand::Friends(FriendsAction::Remove(user.to_string()))
        }
        (Some("add"), None) => usage("/friends add <username>"),
        (Some("remove"), None) => usage("/friends remove <username>"),
        _ => usage("/friends <list|add|remove> [username]"),
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /help                         Show this help message
  /whoami                       Show your user information
  /users                        List users in the current channel
  /nick [name]                  Set your nickname on this server (no argument clears it)
  /profile <username>           Show a user's profile
  /status <presence> [text]     Set your status (online, idle, busy, invisible, focus)
  /upload [path]                Upload a file to the channel
  /reply <id> <text>            Reply to a message
  /edit <id> <text>             Edit your message
  /delete <id>                  Delete your message
  /friends <list|add|remove>    Manage friends
  /config [color on|off]        Show or change display settings
  /config history <n>           Messages fetched when joining a channel
  /userconfig [bio|displayname] Show or change your profile
  /serverconfig [name <name>]   Show or rename the current server
  /kick <username>              Kick a member
  /ban <username> [reason]      Ban a member
  /timeout <username> <minutes> Temporarily mute a member
  /leave                        Go back to channel selection
  /logout                       Forget the saved token and exit
  /exit                         Exit the application"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_control_commands() {
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Exit));
        assert_eq!(parse_command("  /EXIT  "), Some(ChatCommand::Exit));
        assert_eq!(parse_command("/leave"), Some(ChatCommand::Leave));
        assert_eq!(parse_command("/logout"), Some(ChatCommand::Logout));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
    }

    #[test]
    fn arguments_keep_their_case() {
        assert_eq!(
            parse_command("/REPLY AbC123 Hello   There"),
            Some(ChatCommand::Reply {
                id: "AbC123".to_string(),
                text: "Hello There".to_string()
            })
        );
        assert_eq!(
            parse_command("/nick Captain Crunch"),
            Some(ChatCommand::Nick(Some("Captain Crunch".to_string())))
        );
        assert_eq!(parse_command("/nick"), Some(ChatCommand::Nick(None)));
    }

    #[test]
    fn missing_arguments_yield_usage() {
        for input in ["/reply abc", "/edit", "/delete", "/profile", "/kick", "/timeout bob"] {
            assert!(
                matches!(parse_command(input), Some(ChatCommand::Invalid(msg)) if msg.starts_with("Usage:")),
                "{input}"
            );
        }
    }

    #[test]
    fn parse_status() {
        assert_eq!(
            parse_command("/status busy in a meeting"),
            Some(ChatCommand::Status {
                presence: Presence::Busy,
                text: Some("in a meeting".to_string())
            })
        );
        assert_eq!(
            parse_command("/status Focus"),
            Some(ChatCommand::Status {
                presence: Presence::Focus,
                text: None
            })
        );
        assert!(matches!(
            parse_command("/status away"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("Invalid presence")
        ));
    }

    #[test]
    fn parse_moderation() {
        assert_eq!(
            parse_command("/ban mallory spamming links"),
            Some(ChatCommand::Ban {
                user: "mallory".to_string(),
                reason: Some("spamming links".to_string())
            })
        );
        assert_eq!(
            parse_command("/timeout bob 15"),
            Some(ChatCommand::Timeout {
                user: "bob".to_string(),
                minutes: 15
            })
        );
        assert!(matches!(
            parse_command("/timeout bob 0"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_config_actions() {
        assert_eq!(
            parse_command("/config"),
            Some(ChatCommand::Config(ConfigAction::Show))
        );
        assert_eq!(
            parse_command("/config color off"),
            Some(ChatCommand::Config(ConfigAction::Color(false)))
        );
        assert_eq!(
            parse_command("/config history 50"),
            Some(ChatCommand::Config(ConfigAction::History(50)))
        );
        assert!(matches!(
            parse_command("/config history 500"),
            Some(ChatCommand::Invalid(_))
        ));
        assert_eq!(
            parse_command("/userconfig displayname Dr. Who"),
            Some(ChatCommand::UserConfig(UserConfigAction::DisplayName(
                "Dr. Who".to_string()
            )))
        );
        assert_eq!(
            parse_command("/serverconfig name New Home"),
            Some(ChatCommand::ServerConfig(ServerConfigAction::Name(
                "New Home".to_string()
            )))
        );
    }

    #[test]
    fn parse_friends() {
        assert_eq!(
            parse_command("/friends list"),
            Some(ChatCommand::Friends(FriendsAction::List))
        );
        assert_eq!(
            parse_command("/friends add Bob"),
            Some(ChatCommand::Friends(FriendsAction::Add("Bob".to_string())))
        );
        assert!(matches!(
            parse_command("/friends"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn unknown_and_non_commands() {
        assert_eq!(parse_command("/xyz 1 2"), None);
        assert_eq!(parse_command("hello /exit"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn help_text_lists_commands() {
        let help = help_text();
        for command in ["/exit", "/leave", "/reply", "/timeout", "/friends", "/logout"] {
            assert!(help.contains(command), "{command}");
        }
    }
}
