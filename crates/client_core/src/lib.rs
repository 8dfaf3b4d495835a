use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use shared::{
    domain::{ConversationKey, Message, Profile},
    protocol::ClientCommand,
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod index;
pub mod notifications;
pub mod pagination;
pub mod profiles;
pub mod session;
pub mod store;
pub mod transport;

pub use connection::{CloseReason, ConnectionState};
pub use error::{ClientError, ClientResult};
pub use index::Conversation;
pub use notifications::{Notification, Severity};
pub use transport::{Connector, TransportChannel, TransportEvent, WebSocketConnector};

use connection::{ConnectionManager, Transition};
use dispatcher::{Dispatcher, Effect};
use notifications::DEFAULT_NOTIFICATION_TTL;
use session::SessionState;

pub const DEFAULT_HISTORY_LIMIT: u32 = 1000;
pub const DEFAULT_HISTORY_TABLE: &str = "MessagesLogs";
pub const DEFAULT_PAYMENT_AMOUNT: u64 = 3000;
pub const DEFAULT_PAYMENT_DURATION_DAYS: u32 = 30;
const MINOR_UNITS_PER_MAJOR: u64 = 100;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub server_url: String,
    pub history_limit: u32,
    pub history_table: String,
    pub reconnect_delay: Duration,
    pub notification_ttl: Duration,
    pub reauthenticate_on_reconnect: bool,
    /// Major currency units; converted to minor units on the wire.
    pub default_payment_amount: u64,
    pub default_payment_duration_days: u32,
}

impl ClientSettings {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
            reconnect_delay: connection::DEFAULT_RECONNECT_DELAY,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            reauthenticate_on_reconnect: true,
            default_payment_amount: DEFAULT_PAYMENT_AMOUNT,
            default_payment_duration_days: DEFAULT_PAYMENT_DURATION_DAYS,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Notification(Notification),
    StatusChanged(ConnectionState),
    ConversationsUpdated,
    WindowUpdated,
    ScrollToLatest,
    ProfileUpdated(ConversationKey),
}

/// Selected conversation as the UI renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub key: ConversationKey,
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub is_loading_more: bool,
}

struct ActiveLink {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    pump: JoinHandle<()>,
}

struct ConsoleState {
    session: SessionState,
    connection: ConnectionManager,
    link: Option<ActiveLink>,
    generation: u64,
    reconnect_task: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl ConsoleState {
    fn is_live(&self, generation: u64) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }
}

/// Operator console client: one socket, one session, frames handled one at a time.
pub struct ConsoleClient {
    settings: ClientSettings,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    inner: Mutex<ConsoleState>,
    events: broadcast::Sender<ClientEvent>,
}

impl ConsoleClient {
    pub fn new(settings: ClientSettings) -> Arc<Self> {
        Self::with_connector(settings, Arc::new(WebSocketConnector))
    }

    pub fn with_connector(settings: ClientSettings, connector: Arc<dyn Connector>) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            dispatcher: Dispatcher::new(settings.history_limit, settings.history_table.clone()),
            inner: Mutex::new(ConsoleState {
                session: SessionState::new(),
                connection: ConnectionManager::new(settings.reconnect_delay),
                link: None,
                generation: 0,
                reconnect_task: None,
                shut_down: false,
            }),
            settings,
            connector,
            events,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Opens the socket. Valid from `Disconnected` and `ReconnectPending`.
    pub async fn connect(self: &Arc<Self>) -> ClientResult<()> {
        let generation = {
            let mut guard = self.inner.lock().await;
            if guard.shut_down {
                return Err(ClientError::InvalidState {
                    operation: "connect",
                    state: guard.connection.state(),
                });
            }
            let transition = guard.connection.begin_connect()?;
            self.emit_transition(transition);
            guard.generation += 1;
            guard.generation
        };

        info!(url = %self.settings.server_url, generation, "connecting");
        let result = self.connector.connect(&self.settings.server_url).await;

        let mut guard = self.inner.lock().await;
        if guard.shut_down || guard.generation != generation {
            debug!(generation, "discarding superseded connection attempt");
            return Ok(());
        }

        let TransportChannel { outbound, inbound } = match result {
            Ok(channel) => channel,
            Err(err) => {
                let reason = format!("{err:#}");
                error!(error = %reason, "websocket connect failed");
                if let Some(transition) = guard.connection.transport_failed(&reason) {
                    self.emit_transition(transition);
                }
                return Err(ClientError::Transport(reason));
            }
        };

        let transition = guard.connection.transport_opened()?;
        self.emit_transition(transition);
        let pump = tokio::spawn(pump_frames(Arc::downgrade(self), generation, inbound));
        guard.link = Some(ActiveLink {
            generation,
            outbound,
            pump,
        });

        if self.settings.reauthenticate_on_reconnect {
            if let Some(command) = guard.connection.resume_authentication() {
                info!("re-authenticating after reconnect");
                self.send_locked(&guard, &command);
            }
        }
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<()> {
        let mut guard = self.inner.lock().await;
        let command = guard
            .connection
            .authenticate(username, password)
            .map_err(|err| self.reject(err))?;
        info!(username = username.trim(), "authenticating");
        self.send_locked(&guard, &command);
        Ok(())
    }

    /// Selects a conversation and requests its most recent page.
    pub async fn select_conversation(&self, key: ConversationKey) -> ClientResult<()> {
        let mut guard = self.inner.lock().await;
        self.require_authenticated(&guard)?;
        info!(conversation = %key, "conversation selected");
        let command = guard.session.select(key);
        self.send_locked(&guard, &command);
        self.emit(ClientEvent::WindowUpdated);
        Ok(())
    }

    /// Returns `false` when the intent does not apply (loading, exhausted, nothing loaded).
    pub async fn load_more_history(&self) -> ClientResult<bool> {
        let mut guard = self.inner.lock().await;
        self.require_authenticated(&guard)?;
        let Some(command) = guard.session.load_more() else {
            debug!("load more ignored");
            return Ok(false);
        };
        self.send_locked(&guard, &command);
        self.emit(ClientEvent::WindowUpdated);
        Ok(true)
    }

    pub async fn send_message(&self, key: &ConversationKey, text: &str) -> ClientResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.reject(ClientError::Validation("Message text is empty".into())));
        }
        let guard = self.inner.lock().await;
        self.require_authenticated(&guard)?;
        self.send_locked(
            &guard,
            &ClientCommand::SendMessage {
                phone: key.clone(),
                message: text.to_string(),
            },
        );
        self.notify(Notification::info("Sending message..."));
        Ok(())
    }

    /// `amount` is in major units; `None` falls back to the configured defaults.
    pub async fn send_payment_link(
        &self,
        key: &ConversationKey,
        amount: Option<u64>,
        duration_days: Option<u32>,
    ) -> ClientResult<()> {
        let amount = amount.unwrap_or(self.settings.default_payment_amount);
        let duration_days = duration_days.unwrap_or(self.settings.default_payment_duration_days);
        if amount == 0 {
            return Err(self.reject(ClientError::Validation(
                "Payment amount must be positive".into(),
            )));
        }
        if duration_days == 0 {
            return Err(self.reject(ClientError::Validation(
                "Payment duration must be at least one day".into(),
            )));
        }
        let Some(minor_units) = amount.checked_mul(MINOR_UNITS_PER_MAJOR) else {
            return Err(self.reject(ClientError::Validation("Payment amount is too large".into())));
        };

        let guard = self.inner.lock().await;
        self.require_authenticated(&guard)?;
        self.send_locked(
            &guard,
            &ClientCommand::SendPaymentLink {
                phone: key.clone(),
                amount: minor_units,
                duration: duration_days.to_string(),
            },
        );
        self.notify(Notification::info("Sending payment link..."));
        Ok(())
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.lock().await.connection.state()
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.inner.lock().await.session.index().conversations().to_vec()
    }

    pub async fn search(&self, query: &str) -> Vec<Conversation> {
        let guard = self.inner.lock().await;
        guard.session.search(query).into_iter().cloned().collect()
    }

    pub async fn recent_messages(&self, limit: usize) -> Vec<Message> {
        let guard = self.inner.lock().await;
        guard.session.recent(limit).into_iter().cloned().collect()
    }

    pub async fn selected_window(&self) -> Option<WindowSnapshot> {
        let guard = self.inner.lock().await;
        let window = guard.session.window()?;
        Some(WindowSnapshot {
            key: window.key().clone(),
            messages: window.messages().to_vec(),
            has_more: window.has_more(),
            is_loading_more: window.is_loading_more(),
        })
    }

    pub async fn profile(&self, key: &ConversationKey) -> Option<Profile> {
        self.inner.lock().await.session.profiles().get(key).cloned()
    }

    /// Profile name when cached, otherwise the formatted phone number.
    pub async fn display_name(&self, key: &ConversationKey) -> String {
        let guard = self.inner.lock().await;
        guard
            .session
            .profiles()
            .display_name(key)
            .map(str::to_string)
            .unwrap_or_else(|| key.display_label())
    }

    /// Tears the client down: cancels any pending reconnect and closes the socket.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        guard.shut_down = true;
        if let Some(task) = guard.reconnect_task.take() {
            task.abort();
        }
        if let Some(link) = guard.link.take() {
            link.pump.abort();
        }
        if let Some(transition) = guard.connection.shutdown() {
            self.emit_transition(transition);
        }
        info!("console client shut down");
    }

    async fn handle_frame(&self, generation: u64, text: &str) {
        let mut guard = self.inner.lock().await;
        if !guard.is_live(generation) {
            debug!(generation, "dropping frame from superseded connection");
            return;
        }
        let state = &mut *guard;
        let effects = self
            .dispatcher
            .handle_text(text, &mut state.session, &mut state.connection);
        self.apply_effects(state, effects);
    }

    async fn handle_closed(self: &Arc<Self>, generation: u64, reason: CloseReason) {
        let mut guard = self.inner.lock().await;
        if !guard.is_live(generation) {
            return;
        }
        guard.link = None;
        match &reason {
            CloseReason::Remote => info!(generation, "websocket closed"),
            CloseReason::Error(err) => warn!(generation, error = %err, "websocket failed"),
        }
        let outcome = guard.connection.transport_closed(&reason);
        if let Some(transition) = outcome.transition {
            self.emit_transition(transition);
        }
        if let Some(delay) = outcome.reconnect_after {
            self.schedule_reconnect(&mut guard, delay);
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, state: &mut ConsoleState, delay: Duration) {
        if let Some(previous) = state.reconnect_task.take() {
            previous.abort();
        }
        info!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        let client = Arc::downgrade(self);
        state.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(client) = client.upgrade() {
                client.reconnect_now().await;
            }
        }));
    }

    fn reconnect_now(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            self.inner.lock().await.reconnect_task = None;
            if let Err(err) = self.connect().await {
                warn!(error = %err, "reconnect attempt failed");
            }
        }
        .boxed()
    }

    fn apply_effects(&self, state: &mut ConsoleState, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(command) => self.send_locked(state, &command),
                Effect::Notify(notification) => self.notify(notification),
                Effect::StatusChanged(status) => self.emit(ClientEvent::StatusChanged(status)),
                Effect::CloseTransport => {
                    // Dropping the sender closes the socket; late frames fail `is_live`.
                    if let Some(link) = state.link.take() {
                        debug!(generation = link.generation, "closing transport");
                    }
                }
                Effect::ConversationsChanged => self.emit(ClientEvent::ConversationsUpdated),
                Effect::WindowChanged => self.emit(ClientEvent::WindowUpdated),
                Effect::ScrollToLatest => self.emit(ClientEvent::ScrollToLatest),
                Effect::ProfileUpdated(key) => self.emit(ClientEvent::ProfileUpdated(key)),
            }
        }
    }

    fn send_locked(&self, state: &ConsoleState, command: &ClientCommand) {
        let Some(link) = state.link.as_ref() else {
            warn!(action = command.action(), "no live connection; command dropped");
            return;
        };
        match command.encode() {
            Ok(text) => {
                if link.outbound.send(text).is_err() {
                    warn!(action = command.action(), "websocket writer gone; command dropped");
                } else {
                    debug!(action = command.action(), "command sent");
                }
            }
            Err(err) => error!(action = command.action(), "failed to encode command: {err}"),
        }
    }

    fn require_authenticated(&self, state: &ConsoleState) -> ClientResult<()> {
        if !state.connection.is_connected() {
            return Err(self.reject(ClientError::NotConnected));
        }
        if !state.connection.is_authenticated() {
            return Err(self.reject(ClientError::NotAuthenticated));
        }
        Ok(())
    }

    fn reject(&self, err: ClientError) -> ClientError {
        self.notify(Notification::error(err.user_message()));
        err
    }

    fn emit_transition(&self, transition: Transition) {
        debug!(from = ?transition.from, to = ?transition.to, "connection state changed");
        self.emit(ClientEvent::StatusChanged(transition.to));
        self.notify(transition.notification);
    }

    fn notify(&self, notification: Notification) {
        self.emit(ClientEvent::Notification(
            notification.with_ttl(self.settings.notification_ttl),
        ));
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for ConsoleClient {
    fn drop(&mut self) {
        let state = self.inner.get_mut();
        if let Some(task) = state.reconnect_task.take() {
            task.abort();
        }
        if let Some(link) = state.link.take() {
            link.pump.abort();
        }
    }
}

async fn pump_frames(
    client: Weak<ConsoleClient>,
    generation: u64,
    mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
) {
    let reason = loop {
        let Some(event) = inbound.recv().await else {
            break CloseReason::Remote;
        };
        let Some(client) = client.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Frame(text) => client.handle_frame(generation, &text).await,
            TransportEvent::Closed(reason) => break reason,
        }
    };
    if let Some(client) = client.upgrade() {
        client.handle_closed(generation, reason).await;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
