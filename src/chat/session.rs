//! The session: one control loop that owns every piece of client state.
//!
//! The loop moves through [`Phase::Initializing`], [`Phase::Selection`] and
//! [`Phase::Chatting`].  Every wait for input also drains the gateway event
//! channel, so inbound events are applied, in delivery order, while the user
//! sits at a prompt.  REST calls are awaited directly; events that arrive
//! meanwhile queue up and are applied at the next wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::config::{Config, ConfigStore};
use super::deferred::DeferredTasks;
use super::input::{InputEvent, InputSource};
use super::recent::RecentMessages;
use super::render::Renderer;
use crate::cache::EntityCache;
use crate::client::ChatApi;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, GatewayEvent};
use crate::types::{Channel, Message, User};

/// Poll interval while waiting for the initial snapshot.
pub const INIT_POLL: Duration = Duration::from_millis(200);

/// Where the control loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Connected; waiting for the snapshot.
    Initializing,
    /// Picking a server and channel.
    Selection,
    /// In the message loop of the active channel.
    Chatting,
}

/// Why the session ended.
#[derive(Debug)]
pub enum Shutdown {
    /// `/exit`, end of input or a termination signal.
    Exit,
    /// `/logout`; the saved token has been cleared.
    Logout,
    /// The server closed the connection.
    Disconnected,
    /// A fatal error.
    Failed(Error),
}

impl Shutdown {
    /// Whether the process should exit with success.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Shutdown::Failed(_))
    }
}

/// Control flow inside the session: `Err` unwinds to [`Session::run`].
pub(crate) type Flow<T> = std::result::Result<T, Shutdown>;

/// Mutable client state, apart from the I/O handles.
#[derive(Debug)]
pub struct SessionState {
    pub token: String,
    pub cache: EntityCache,
    pub self_id: Option<String>,
    pub active_server: Option<String>,
    pub active_channel: Option<String>,
    /// Users typing in the active channel, in arrival order.
    pub typing: Vec<String>,
    pub recent: RecentMessages,
    pub phase: Phase,
}

impl SessionState {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            cache: EntityCache::new(),
            self_id: None,
            active_server: None,
            active_channel: None,
            typing: Vec::new(),
            recent: RecentMessages::new(),
            phase: Phase::Initializing,
        }
    }

    /// The session's own user, once authenticated.
    pub fn self_user(&self) -> Option<&User> {
        self.self_id.as_deref().and_then(|id| self.cache.user(id))
    }

    /// The active channel, if one is selected and known.
    pub fn channel(&self) -> Option<&Channel> {
        self.active_channel
            .as_deref()
            .and_then(|id| self.cache.channel(id))
    }

    pub fn is_active_channel(&self, channel_id: &str) -> bool {
        self.active_channel.as_deref() == Some(channel_id)
    }

    pub fn is_self(&self, user_id: &str) -> bool {
        self.self_id.as_deref() == Some(user_id)
    }

    /// Drops the active channel together with everything scoped to it.
    pub fn leave_channel(&mut self) {
        self.active_channel = None;
        self.active_server = None;
        self.typing.clear();
        self.recent.clear();
    }

    /// Name shown for `user_id` in the active server.
    pub fn author_name(&self, user_id: &str) -> String {
        self.cache
            .author_name(user_id, self.active_server.as_deref())
    }
}

/// The interactive session.
pub struct Session {
    pub(crate) api: Arc<dyn ChatApi>,
    pub(crate) gateway: Gateway,
    pub(crate) events: mpsc::UnboundedReceiver<GatewayEvent>,
    pub(crate) signals: Option<mpsc::UnboundedReceiver<()>>,
    pub(crate) input: Box<dyn InputSource>,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) store: Option<ConfigStore>,
    pub(crate) config: Config,
    pub(crate) state: SessionState,
    pub(crate) deferred: DeferredTasks,
}

impl Session {
    /// Creates a session over an open gateway.  Config persistence is off
    /// until [`Session::with_config`] provides a store.
    pub fn new(
        api: Arc<dyn ChatApi>,
        gateway: Gateway,
        events: mpsc::UnboundedReceiver<GatewayEvent>,
        token: impl Into<String>,
        input: Box<dyn InputSource>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            api,
            gateway,
            events,
            signals: None,
            input,
            renderer,
            store: None,
            config: Config::default(),
            state: SessionState::new(token),
            deferred: DeferredTasks::new(),
        }
    }

    /// Sets the persisted config and where to write it back.
    pub fn with_config(mut self, store: ConfigStore, config: Config) -> Self {
        self.store = Some(store);
        self.config = config;
        self
    }

    /// Ends the session (as [`Shutdown::Exit`]) when a unit arrives on `signals`.
    pub fn with_signals(mut self, signals: mpsc::UnboundedReceiver<()>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Runs until the session ends.  Pending deferred tasks are aborted and,
    /// unless the server already closed it, the connection is closed.
    pub async fn run(mut self) -> Shutdown {
        let shutdown = loop {
            if let Err(shutdown) = self.step().await {
                break shutdown;
            }
        };
        self.deferred.abort_all();
        if !matches!(shutdown, Shutdown::Disconnected) {
            self.gateway.close().await;
        }
        tracing::info!(?shutdown, "session ended");
        shutdown
    }

    async fn step(&mut self) -> Flow<()> {
        match self.state.phase {
            Phase::Initializing => self.poll_initializing().await,
            Phase::Selection => self.enter_selection().await,
            Phase::Chatting => self.chat().await,
        }
    }

    async fn poll_initializing(&mut self) -> Flow<()> {
        tokio::select! {
            biased;
            event = self.events.recv() => self.on_gateway_event(event).await,
            _ = next_signal(&mut self.signals) => Err(Shutdown::Exit),
            _ = tokio::time::sleep(INIT_POLL) => Ok(()),
        }
    }

    async fn enter_selection(&mut self) -> Flow<()> {
        self.state.leave_channel();
        if let Some(destination) = self.select_destination().await? {
            self.join_channel(destination.server, destination.channel)
                .await;
        }
        Ok(())
    }

    /// Makes `channel_id` active, loads its history and enters the message loop.
    async fn join_channel(&mut self, server_id: Option<String>, channel_id: String) {
        self.config.last_server_id = server_id.clone();
        self.config.last_channel_id = Some(channel_id.clone());
        self.persist_config();

        self.state.active_server = server_id;
        self.state.active_channel = Some(channel_id.clone());
        let name = self
            .state
            .channel()
            .map(|channel| channel.display_name().to_string())
            .unwrap_or_default();
        self.renderer
            .print_success(&format!("Joining channel: #{name}"));

        let result = self
            .api
            .fetch_messages(&channel_id, &self.state.token, self.config.history_limit)
            .await;
        let history = self.soft("fetch past messages", result).unwrap_or_default();
        self.state.cache.insert_users(history.users);
        for member in history.members {
            self.state.cache.insert_member(member);
        }
        let mut messages = history.messages;
        messages.reverse();
        self.show_history(&messages);
        self.state.recent.replace(messages);
        self.state.phase = Phase::Chatting;
    }

    fn show_history(&mut self, messages: &[Message]) {
        self.renderer.print_heading("Start of messages");
        for message in messages {
            let author = self.state.author_name(&message.author);
            let own = self.state.is_self(&message.author);
            self.renderer.print_message(&author, message, own);
        }
        self.renderer.print_heading("End of past messages");
    }

    async fn chat(&mut self) -> Flow<()> {
        self.renderer
            .print_info("Type /help for commands, /leave to pick another channel.");
        loop {
            let prompt = self.prompt();
            let line = self.read_line(&prompt).await?;
            if self.dispatch(&line).await?.is_leave() {
                self.state.phase = Phase::Selection;
                return Ok(());
            }
        }
    }

    /// `[#channel]> `, with the typing users when there are any.  Built once
    /// per line, so typing changes during the wait show on the next prompt.
    pub(crate) fn prompt(&self) -> String {
        let name = self
            .state
            .channel()
            .map(|channel| channel.display_name().to_string())
            .unwrap_or_default();
        if self.state.typing.is_empty() {
            format!("[#{name}]> ")
        } else {
            let names: Vec<String> = self
                .state
                .typing
                .iter()
                .map(|id| self.state.author_name(id))
                .collect();
            format!("[#{name}] ({} typing)> ", names.join(", "))
        }
    }

    /// Waits for the next input line while applying inbound events.
    pub(crate) async fn read_line(&mut self, prompt: &str) -> Flow<String> {
        loop {
            tokio::select! {
                biased;
                event = self.events.recv() => self.on_gateway_event(event).await?,
                _ = next_signal(&mut self.signals) => return Err(Shutdown::Exit),
                input = self.input.read_line(prompt) => match input {
                    Ok(InputEvent::Line(line)) => return Ok(line),
                    Ok(InputEvent::Interrupted) => {}
                    Ok(InputEvent::Eof) => return Err(Shutdown::Exit),
                    Err(err) => return Err(Shutdown::Failed(err)),
                },
            }
        }
    }

    async fn on_gateway_event(&mut self, event: Option<GatewayEvent>) -> Flow<()> {
        match event {
            Some(GatewayEvent::Frame(frame)) => self.apply_frame(&frame).await,
            Some(GatewayEvent::Closed) | None => {
                self.renderer.print_info("Disconnected from Revolt.");
                Err(Shutdown::Disconnected)
            }
            Some(GatewayEvent::Failed(err)) => {
                self.renderer.print_error(&format!("WebSocket error: {err}"));
                Err(Shutdown::Failed(err))
            }
        }
    }

    /// Reports a failed request and yields `None`; the caller treats that as
    /// nothing to show.
    pub(crate) fn soft<T>(&mut self, action: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(status = err.status_code(), "failed to {action}: {err}");
                self.renderer
                    .print_error(&format!("Failed to {action}: {err}"));
                None
            }
        }
    }

    /// Writes the config back, reporting failures without stopping.
    pub(crate) fn persist_config(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(&self.config) {
            tracing::warn!("failed to save config: {err}");
            self.renderer
                .print_error(&format!("Failed to save config: {err}"));
        }
    }
}

/// Resolves on the next signal.  Never resolves without a signal channel or
/// once every sender is gone.
async fn next_signal(signals: &mut Option<mpsc::UnboundedReceiver<()>>) {
    if let Some(signals) = signals
        && signals.recv().await.is_some()
    {
        return;
    }
    std::future::pending::<()>().await
}
