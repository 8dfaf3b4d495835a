//! Routes decoded server frames into session state and produces follow-up effects.

use std::collections::HashSet;

use shared::{
    domain::{ConversationKey, MessageSource, Profile},
    protocol::{ChatPage, ClientCommand, HistoryChunk, ServerFrame, UserInfo},
};
use tracing::{debug, info, warn};

use crate::{
    connection::{AuthOutcome, ConnectionManager, ConnectionState, Transition},
    error::ClientError,
    notifications::Notification,
    pagination::PageOutcome,
    session::SessionState,
};

/// Side effect requested by frame handling, executed by the runtime after the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(ClientCommand),
    Notify(Notification),
    StatusChanged(ConnectionState),
    CloseTransport,
    ConversationsChanged,
    WindowChanged,
    ScrollToLatest,
    ProfileUpdated(ConversationKey),
}

impl Effect {
    pub fn from_transition(transition: Transition) -> [Self; 2] {
        [
            Self::StatusChanged(transition.to),
            Self::Notify(transition.notification),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    history_limit: u32,
    history_table: String,
}

impl Dispatcher {
    pub fn new(history_limit: u32, history_table: impl Into<String>) -> Self {
        Self {
            history_limit,
            history_table: history_table.into(),
        }
    }

    /// Decodes and dispatches one raw frame. Undecodable frames are logged and dropped.
    pub fn handle_text(
        &self,
        text: &str,
        session: &mut SessionState,
        connection: &mut ConnectionManager,
    ) -> Vec<Effect> {
        match ServerFrame::decode(text) {
            Ok(frame) => self.dispatch(frame, session, connection),
            Err(err) => {
                let action = err.action().unwrap_or("-").to_string();
                let err = ClientError::from(err);
                warn!(error = %err, %action, frame_len = text.len(), "dropping undecodable frame");
                Vec::new()
            }
        }
    }

    pub fn dispatch(
        &self,
        frame: ServerFrame,
        session: &mut SessionState,
        connection: &mut ConnectionManager,
    ) -> Vec<Effect> {
        debug!(action = frame.action(), "dispatching frame");
        match frame {
            ServerFrame::AuthResponse { success, message } => {
                self.on_auth_response(success, message.as_deref(), session, connection)
            }
            ServerFrame::History(chunk) => self.on_history(chunk, session),
            ServerFrame::UserInfo(info) => on_user_info(info, session),
            ServerFrame::ChatPage(page) => on_chat_page(&page, session),
            ServerFrame::PaymentLink { status } => on_payment_link(&status),
            ServerFrame::NewMessage(message) => {
                let selected = session.selected_key().cloned();
                let key = message.conversation_key.clone();
                let source = message.source;
                let (stored, windowed) = session.ingest_push(message);

                let mut effects = Vec::new();
                if stored {
                    effects.push(Effect::ConversationsChanged);
                } else {
                    debug!(conversation = %key, "duplicate push skipped");
                }
                if windowed {
                    effects.push(Effect::WindowChanged);
                    effects.push(Effect::ScrollToLatest);
                }
                if stored && selected.as_ref() != Some(&key) && source == MessageSource::User {
                    effects.push(Effect::Notify(Notification::info(format!(
                        "New message from {}",
                        key.display_label()
                    ))));
                }
                effects
            }
        }
    }

    fn history_request(&self) -> ClientCommand {
        ClientCommand::GetAllMessages {
            limit: self.history_limit,
            table_name: self.history_table.clone(),
        }
    }

    fn on_auth_response(
        &self,
        success: bool,
        message: Option<&str>,
        session: &mut SessionState,
        connection: &mut ConnectionManager,
    ) -> Vec<Effect> {
        match connection.auth_response(success, message) {
            AuthOutcome::Accepted(transition) => {
                info!("authenticated; requesting full history");
                let mut effects = Vec::from(Effect::from_transition(transition));
                let reselect = session.reset_history();
                effects.push(Effect::ConversationsChanged);
                effects.push(Effect::Send(self.history_request()));
                if let Some(page_request) = reselect {
                    effects.push(Effect::WindowChanged);
                    effects.push(Effect::Send(page_request));
                }
                effects
            }
            AuthOutcome::Rejected(transition) => {
                let err = ClientError::Auth(message.unwrap_or("Invalid credentials").to_string());
                warn!(error = %err, "closing transport after rejected authentication");
                let mut effects = Vec::from(Effect::from_transition(transition));
                effects.push(Effect::CloseTransport);
                effects
            }
            AuthOutcome::Unexpected => {
                warn!(state = ?connection.state(), "ignoring auth_response outside handshake");
                Vec::new()
            }
        }
    }

    fn on_history(&self, chunk: HistoryChunk, session: &mut SessionState) -> Vec<Effect> {
        let chunk_index = chunk.chunk_index;
        let total_chunks = chunk.total_chunks;
        let received = chunk.data.len();

        let keys: Vec<ConversationKey> = {
            let mut seen = HashSet::new();
            chunk
                .data
                .iter()
                .map(|message| &message.conversation_key)
                .filter(|key| !key.is_empty() && seen.insert(*key))
                .cloned()
                .collect()
        };

        let inserted = session.ingest_history(chunk);
        match chunk_index {
            Some(index) => info!(
                chunk = index + 1,
                total_chunks = ?total_chunks,
                received,
                inserted,
                "history chunk ingested"
            ),
            None => info!(received, inserted, "full history ingested"),
        }
        info!(profiles = keys.len(), "fetching user info");

        let mut effects = vec![Effect::ConversationsChanged];
        effects.extend(
            keys.into_iter()
                .map(|phone| Effect::Send(ClientCommand::GetUserInfo { phone })),
        );
        effects
    }
}

fn on_user_info(info: UserInfo, session: &mut SessionState) -> Vec<Effect> {
    let Some(key) = info.phone.or_else(|| session.selected_key().cloned()) else {
        warn!("user info without phone and no selected conversation; dropping");
        return Vec::new();
    };
    debug!(conversation = %key, fields = info.fields.len(), "caching profile");
    session.cache_profile(Profile {
        conversation_key: key.clone(),
        fields: info.fields,
    });
    vec![Effect::ProfileUpdated(key)]
}

fn on_chat_page(page: &ChatPage, session: &mut SessionState) -> Vec<Effect> {
    match session.ingest_page(page) {
        PageOutcome::Stale => Vec::new(),
        PageOutcome::Exhausted => {
            debug!(conversation = ?session.selected_key(), "history exhausted");
            vec![Effect::WindowChanged]
        }
        PageOutcome::Merged {
            inserted,
            scroll_to_latest,
        } => {
            debug!(inserted, "page merged into window");
            let mut effects = vec![Effect::WindowChanged, Effect::ConversationsChanged];
            if scroll_to_latest {
                effects.push(Effect::ScrollToLatest);
            }
            effects
        }
    }
}

fn on_payment_link(status: &str) -> Vec<Effect> {
    if status == "success" {
        return vec![Effect::Notify(Notification::success(
            "Payment link sent successfully",
        ))];
    }
    let err = ClientError::CommandRejected {
        command: "send_payment_link",
        reason: status.to_string(),
    };
    warn!(error = %err, "payment link failed");
    vec![Effect::Notify(Notification::error("Failed to send payment link"))]
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
