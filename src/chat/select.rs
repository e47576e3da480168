//! Picking a server and a channel.

use super::session::{Flow, Session, Shutdown};

/// A chosen channel and the server it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Destination {
    /// `None` for direct messages.
    pub server: Option<String>,
    pub channel: String,
}

/// One answer to a numbered menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    Item(usize),
    Back,
    Direct,
}

/// Menu options beyond the numbered items.
#[derive(Debug, Clone, Copy, Default)]
struct Menu {
    back: bool,
    direct: bool,
    default: Option<usize>,
}

impl Session {
    /// Walks the user through server and channel menus.  `None` means they
    /// backed out and the menus should be shown again.
    pub(crate) async fn select_destination(&mut self) -> Flow<Option<Destination>> {
        let servers: Vec<(String, String)> = self
            .state
            .cache
            .servers()
            .into_iter()
            .map(|server| (server.id.clone(), server.name.clone()))
            .collect();
        let has_direct = !self.state.cache.direct_channels().is_empty();

        self.renderer.print_heading("Servers");
        if servers.is_empty() && !has_direct {
            self.renderer
                .print_info("You are not a member of any server. Type /exit to quit.");
        }
        let mut listing: Vec<String> = servers
            .iter()
            .enumerate()
            .map(|(index, (_, name))| format!("  {}) {name}", index + 1))
            .collect();
        if has_direct {
            listing.push("  D) Direct Messages".to_string());
        }
        self.renderer.print_info(&listing.join("\n"));

        let menu = Menu {
            back: false,
            direct: has_direct,
            default: position(
                servers.iter().map(|(id, _)| id.as_str()),
                self.config.last_server_id.as_deref(),
            ),
        };
        match self.pick("server", servers.len(), menu).await? {
            Pick::Item(index) => {
                let server_id = servers[index].0.clone();
                let channel = self.select_channel(&server_id).await?;
                Ok(channel.map(|channel| Destination {
                    server: Some(server_id),
                    channel,
                }))
            }
            Pick::Direct => {
                let channel = self.select_direct().await?;
                Ok(channel.map(|channel| Destination {
                    server: None,
                    channel,
                }))
            }
            Pick::Back => Ok(None),
        }
    }

    /// Fetches the server's members, then lists its text channels by
    /// category, uncategorized first.
    async fn select_channel(&mut self, server_id: &str) -> Flow<Option<String>> {
        self.renderer.print_info("Fetching server members...");
        let result = self
            .api
            .fetch_server_members(server_id, &self.state.token)
            .await;
        if let Some(list) = self.soft("fetch server members", result) {
            self.state.cache.insert_users(list.users);
            for member in list.members {
                self.state.cache.insert_member(member);
            }
        }

        let cache = &self.state.cache;
        let channels: Vec<(String, String)> = cache
            .server_channels(server_id)
            .into_iter()
            .map(|channel| (channel.id.clone(), channel.display_name().to_string()))
            .collect();
        let categories = cache
            .server(server_id)
            .and_then(|server| server.categories.clone())
            .unwrap_or_default();

        let categorized = |id: &str| {
            categories
                .iter()
                .any(|category| category.channels.iter().any(|known| known == id))
        };
        let mut sections: Vec<(Option<String>, Vec<&(String, String)>)> = vec![(
            None,
            channels.iter().filter(|(id, _)| !categorized(id)).collect(),
        )];
        for category in &categories {
            let members = category
                .channels
                .iter()
                .filter_map(|id| channels.iter().find(|(known, _)| known == id))
                .collect();
            sections.push((Some(category.title.clone()), members));
        }

        let mut ordered: Vec<String> = Vec::new();
        let mut listing = Vec::new();
        for (title, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            if let Some(title) = title {
                listing.push(format!("{}:", title.to_uppercase()));
            }
            for (id, name) in entries {
                ordered.push(id.clone());
                listing.push(format!("  {}) #{name}", ordered.len()));
            }
        }

        self.renderer.print_heading("Channels");
        if ordered.is_empty() {
            self.renderer.print_info("This server has no text channels.");
            return Ok(None);
        }
        listing.push("  0) .. Go back".to_string());
        self.renderer.print_info(&listing.join("\n"));

        let menu = Menu {
            back: true,
            direct: false,
            default: position(
                ordered.iter().map(String::as_str),
                self.config.last_channel_id.as_deref(),
            ),
        };
        match self.pick("channel", ordered.len(), menu).await? {
            Pick::Item(index) => Ok(Some(ordered.swap_remove(index))),
            Pick::Back | Pick::Direct => Ok(None),
        }
    }

    async fn select_direct(&mut self) -> Flow<Option<String>> {
        let entries: Vec<(String, String)> = self
            .state
            .cache
            .direct_channels()
            .into_iter()
            .map(|channel| {
                let others: Vec<String> = channel
                    .recipients
                    .iter()
                    .flatten()
                    .filter(|id| !self.state.is_self(id))
                    .map(|id| self.state.cache.author_name(id, None))
                    .collect();
                let name = if others.is_empty() {
                    channel.display_name().to_string()
                } else {
                    others.join(", ")
                };
                (channel.id.clone(), name)
            })
            .collect();

        self.renderer.print_heading("Direct Messages");
        let mut listing: Vec<String> = entries
            .iter()
            .enumerate()
            .map(|(index, (_, name))| format!("  {}) {name}", index + 1))
            .collect();
        listing.push("  0) .. Go back".to_string());
        self.renderer.print_info(&listing.join("\n"));

        let menu = Menu {
            back: true,
            direct: false,
            default: position(
                entries.iter().map(|(id, _)| id.as_str()),
                self.config.last_channel_id.as_deref(),
            ),
        };
        match self.pick("conversation", entries.len(), menu).await? {
            Pick::Item(index) => Ok(Some(entries[index].0.clone())),
            Pick::Back | Pick::Direct => Ok(None),
        }
    }

    /// Prompts until the answer names one of `count` items (or an extra the
    /// menu allows).  An empty answer takes the default.
    async fn pick(&mut self, noun: &str, count: usize, menu: Menu) -> Flow<Pick> {
        let prompt = match menu.default {
            Some(index) => format!("Select a {noun} [{}]: ", index + 1),
            None => format!("Select a {noun}: "),
        };
        loop {
            let line = self.read_line(&prompt).await?;
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("/exit") {
                return Err(Shutdown::Exit);
            }
            if answer.is_empty()
                && let Some(index) = menu.default
            {
                return Ok(Pick::Item(index));
            }
            if menu.direct && answer.eq_ignore_ascii_case("d") {
                return Ok(Pick::Direct);
            }
            match answer.parse::<usize>() {
                Ok(0) if menu.back => return Ok(Pick::Back),
                Ok(number) if (1..=count).contains(&number) => {
                    return Ok(Pick::Item(number - 1));
                }
                _ => self
                    .renderer
                    .print_error("Invalid selection. Please enter a listed number."),
            }
        }
    }
}

fn position<'a>(mut ids: impl Iterator<Item = &'a str>, wanted: Option<&str>) -> Option<usize> {
    let wanted = wanted?;
    ids.position(|id| id == wanted)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chat::testing::{ApiCall, MockApi, harness};
    use crate::types::{Category, Channel, Member, Server, User};

    fn populate(session: &mut Session) {
        let cache = &mut session.state.cache;
        let mut alpha = Server::new("01ALPHA", "Alpha");
        alpha.channels = vec![
            "01RULES".to_string(),
            "01GENERAL".to_string(),
            "01LOBBY".to_string(),
        ];
        alpha.categories = Some(vec![Category {
            id: "01CAT".to_string(),
            title: "Info".to_string(),
            channels: vec!["01RULES".to_string()],
        }]);
        cache.insert_server(alpha);
        cache.insert_server(Server::new("01BETA", "Beta"));
        cache.insert_channel(Channel::text("01RULES", "rules", "01ALPHA"));
        cache.insert_channel(Channel::text("01GENERAL", "general", "01ALPHA"));
        cache.insert_channel(Channel::text("01LOBBY", "lobby", "01ALPHA"));
        cache.insert_channel(Channel::direct(
            "01DM",
            vec!["01SELF".to_string(), "01BOB".to_string()],
        ));
        cache.insert_user(User::new("01BOB", "bob"));
        session.state.self_id = Some("01SELF".to_string());
    }

    #[tokio::test]
    async fn uncategorized_channels_come_first() {
        let mut api = MockApi::new(User::new("01SELF", "me"));
        api.members = vec![Member::new("01ALPHA", "01BOB")];
        let api = Arc::new(api);
        let (mut session, _events, _output) = harness(api.clone(), &["1", "3"]);
        populate(&mut session);
        let destination = session.select_destination().await.unwrap();
        assert_eq!(
            destination,
            Some(Destination {
                server: Some("01ALPHA".to_string()),
                channel: "01RULES".to_string(),
            })
        );
        assert_eq!(api.calls(), vec![ApiCall::FetchMembers("01ALPHA".to_string())]);
        assert!(session.state.cache.member("01ALPHA", "01BOB").is_some());
    }

    #[tokio::test]
    async fn invalid_answers_reprompt_and_zero_goes_back() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) = harness(api, &["7", "abc", "1", "0"]);
        populate(&mut session);
        assert_eq!(session.select_destination().await.unwrap(), None);
        assert_eq!(output.errors().len(), 2);
    }

    #[tokio::test]
    async fn empty_answer_takes_last_destination() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) = harness(api, &["", ""]);
        populate(&mut session);
        session.config.last_server_id = Some("01ALPHA".to_string());
        session.config.last_channel_id = Some("01LOBBY".to_string());
        let destination = session.select_destination().await.unwrap();
        assert_eq!(
            destination.map(|destination| destination.channel),
            Some("01LOBBY".to_string())
        );
    }

    #[tokio::test]
    async fn direct_messages_list_recipients() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, output) = harness(api, &["d", "1"]);
        populate(&mut session);
        let destination = session.select_destination().await.unwrap();
        assert_eq!(
            destination,
            Some(Destination {
                server: None,
                channel: "01DM".to_string(),
            })
        );
        assert!(output.infos().iter().any(|info| info.contains("1) bob")));
    }

    #[tokio::test]
    async fn exit_at_a_menu_ends_the_session() {
        let api = Arc::new(MockApi::new(User::new("01SELF", "me")));
        let (mut session, _events, _output) = harness(api, &["/exit"]);
        populate(&mut session);
        assert!(matches!(
            session.select_destination().await,
            Err(Shutdown::Exit)
        ));
    }
}
