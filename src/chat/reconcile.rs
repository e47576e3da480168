//! Applying inbound gateway events to session state.

use super::session::{Flow, Phase, Session, Shutdown};
use crate::error::Error;
use crate::observability::{EVENT_DECODE_ERRORS, EVENTS_APPLIED};
use crate::types::{Message, ServerEvent, short_id};

impl Session {
    /// Decodes and applies one raw frame.  Frames that do not decode are
    /// logged and dropped.
    pub(crate) async fn apply_frame(&mut self, frame: &str) -> Flow<()> {
        match ServerEvent::decode(frame) {
            Ok(event) => self.apply_event(event).await,
            Err(err) => {
                EVENT_DECODE_ERRORS.click();
                tracing::warn!("dropping undecodable frame: {err}");
                tracing::debug!(frame, "undecodable frame");
                Ok(())
            }
        }
    }

    pub(crate) async fn apply_event(&mut self, event: ServerEvent) -> Flow<()> {
        EVENTS_APPLIED.click();
        tracing::trace!(kind = event.kind(), "applying event");
        match event {
            ServerEvent::Authenticated => self.on_authenticated().await?,
            ServerEvent::Ready(snapshot) => {
                self.state.cache.load_snapshot(snapshot);
                self.renderer.print_success("Ready to chat!");
                if self.state.phase == Phase::Initializing {
                    self.state.phase = Phase::Selection;
                }
            }
            ServerEvent::Message(message) => self.on_message(message),
            ServerEvent::MessageUpdate { id, channel, data } => {
                if self.state.is_active_channel(&channel)
                    && let Some(content) = data.content
                {
                    self.renderer.print_message_update(short_id(&id), &content);
                }
            }
            ServerEvent::MessageDelete { id, channel } => {
                if self.state.is_active_channel(&channel) {
                    self.renderer.print_message_delete(short_id(&id));
                }
            }
            ServerEvent::BeginTyping { channel, user } => {
                if self.state.is_active_channel(&channel) && !self.state.typing.contains(&user) {
                    self.state.typing.push(user);
                }
            }
            ServerEvent::EndTyping { channel, user } => {
                if self.state.is_active_channel(&channel) {
                    self.state.typing.retain(|id| *id != user);
                }
            }
            ServerEvent::UserUpdate { id, data, clear } => {
                if let Some(user) = self.state.cache.user_mut(&id) {
                    user.merge(data, &clear);
                }
            }
            ServerEvent::ServerMemberUpdate { id, data, clear } => {
                self.state
                    .cache
                    .member_entry(&id.server, &id.user)
                    .merge(data, &clear);
            }
            ServerEvent::ServerRoleUpdate {
                id,
                role_id,
                data,
                clear,
            } => {
                let role = match self.state.cache.server_role(&id, &role_id) {
                    Some(existing) => {
                        let mut role = existing.clone();
                        role.merge(data, &clear);
                        role
                    }
                    None => data.into_role(),
                };
                self.state.cache.upsert_role(&id, &role_id, role);
            }
            ServerEvent::Error { error } => {
                self.renderer.print_error(&format!("Server error: {error}"));
                return Err(Shutdown::Failed(Error::gateway(
                    format!("server rejected the session: {error}"),
                    None,
                )));
            }
            ServerEvent::Unknown => {}
        }
        Ok(())
    }

    async fn on_authenticated(&mut self) -> Flow<()> {
        let user = self
            .api
            .fetch_self(&self.state.token)
            .await
            .map_err(|err| {
                self.renderer
                    .print_error(&format!("Failed to fetch your account: {err}"));
                Shutdown::Failed(err)
            })?;
        self.state.self_id = Some(user.id.clone());
        self.state.cache.insert_user(user);
        self.renderer
            .print_success("Successfully authenticated with WebSocket.");
        Ok(())
    }

    fn on_message(&mut self, message: Message) {
        if !self.state.is_active_channel(&message.channel) {
            return;
        }
        let own = self.state.is_self(&message.author);
        if self.state.recent.push(message.clone()) && !own {
            let author = self.state.author_name(&message.author);
            self.renderer.print_message(&author, &message, false);
        }
    }
}
