//! Socket lifecycle state machine.
//!
//! Pure bookkeeping: the runtime owns the actual socket and the reconnect timer and feeds
//! transport events in here. Every state change yields exactly one [`Transition`], which
//! carries the notification to show.

use std::{fmt, time::Duration};

use shared::protocol::ClientCommand;

use crate::{
    error::{ClientError, ClientResult},
    notifications::Notification,
};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    ConnectedUnauthenticated,
    Authenticated,
    /// Dropped after authenticating; a single retry is scheduled.
    ReconnectPending,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::ConnectedUnauthenticated | Self::Authenticated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed or the stream ended.
    Remote,
    Error(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    fn command(&self) -> ClientCommand {
        ClientCommand::Authenticate {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub notification: Notification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted(Transition),
    /// The transport must be closed; no reconnect follows.
    Rejected(Transition),
    /// Reply arrived outside `ConnectedUnauthenticated`.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureOutcome {
    pub transition: Option<Transition>,
    pub reconnect_after: Option<Duration>,
}

#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    reconnect_delay: Duration,
    reconnecting: bool,
    pending_credentials: Option<Credentials>,
    accepted_credentials: Option<Credentials>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ConnectionManager {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_delay,
            reconnecting: false,
            pending_credentials: None,
            accepted_credentials: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == ConnectionState::Authenticated
    }

    /// True while the current connection cycle was started by a scheduled retry.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    pub fn begin_connect(&mut self) -> ClientResult<Transition> {
        let notification = match self.state {
            ConnectionState::Disconnected => {
                self.reconnecting = false;
                Notification::info("Connecting to server...")
            }
            ConnectionState::ReconnectPending => {
                self.reconnecting = true;
                Notification::info("Reconnecting to server...")
            }
            state => {
                return Err(ClientError::InvalidState {
                    operation: "connect",
                    state,
                })
            }
        };
        Ok(self.transition(ConnectionState::Connecting, notification))
    }

    pub fn transport_opened(&mut self) -> ClientResult<Transition> {
        if self.state != ConnectionState::Connecting {
            return Err(ClientError::InvalidState {
                operation: "open transport",
                state: self.state,
            });
        }
        Ok(self.transition(
            ConnectionState::ConnectedUnauthenticated,
            Notification::success("Connected to server"),
        ))
    }

    pub fn transport_failed(&mut self, error: &str) -> Option<Transition> {
        if self.state != ConnectionState::Connecting {
            return None;
        }
        self.reconnecting = false;
        Some(self.transition(
            ConnectionState::Disconnected,
            Notification::error(format!("Failed to connect: {error}")),
        ))
    }

    /// Builds the auth command. Valid only in `ConnectedUnauthenticated`.
    pub fn authenticate(&mut self, username: &str, password: &str) -> ClientResult<ClientCommand> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Please enter username and password".into(),
            ));
        }
        match self.state {
            ConnectionState::ConnectedUnauthenticated => {}
            ConnectionState::Authenticated => {
                return Err(ClientError::InvalidState {
                    operation: "authenticate",
                    state: self.state,
                })
            }
            _ => return Err(ClientError::NotConnected),
        }
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let command = credentials.command();
        self.pending_credentials = Some(credentials);
        Ok(command)
    }

    /// Auth command replaying the last accepted credentials after a reconnect.
    pub fn resume_authentication(&mut self) -> Option<ClientCommand> {
        if !self.reconnecting || self.state != ConnectionState::ConnectedUnauthenticated {
            return None;
        }
        let credentials = self.accepted_credentials.clone()?;
        let command = credentials.command();
        self.pending_credentials = Some(credentials);
        Some(command)
    }

    pub fn auth_response(&mut self, success: bool, message: Option<&str>) -> AuthOutcome {
        if self.state != ConnectionState::ConnectedUnauthenticated {
            return AuthOutcome::Unexpected;
        }
        if success {
            self.accepted_credentials = self.pending_credentials.take();
            return AuthOutcome::Accepted(self.transition(
                ConnectionState::Authenticated,
                Notification::success("Authentication successful"),
            ));
        }

        self.pending_credentials = None;
        self.accepted_credentials = None;
        self.reconnecting = false;
        let reason = message
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or("Invalid credentials");
        AuthOutcome::Rejected(self.transition(
            ConnectionState::Disconnected,
            Notification::error(format!("Authentication failed: {reason}")),
        ))
    }

    /// Handles an unexpected drop. "Was authenticated" is read from the state right now.
    pub fn transport_closed(&mut self, reason: &CloseReason) -> ClosureOutcome {
        let was_authenticated = match self.state {
            ConnectionState::Authenticated => true,
            ConnectionState::Connecting | ConnectionState::ConnectedUnauthenticated => false,
            ConnectionState::Disconnected | ConnectionState::ReconnectPending => {
                return ClosureOutcome {
                    transition: None,
                    reconnect_after: None,
                }
            }
        };

        let notification = match reason {
            CloseReason::Remote => Notification::warning("Disconnected from server"),
            CloseReason::Error(error) => Notification::error(format!("Connection error: {error}")),
        };
        self.pending_credentials = None;

        if was_authenticated {
            ClosureOutcome {
                transition: Some(self.transition(ConnectionState::ReconnectPending, notification)),
                reconnect_after: Some(self.reconnect_delay),
            }
        } else {
            self.reconnecting = false;
            ClosureOutcome {
                transition: Some(self.transition(ConnectionState::Disconnected, notification)),
                reconnect_after: None,
            }
        }
    }

    /// Teardown: no retry may follow.
    pub fn shutdown(&mut self) -> Option<Transition> {
        self.pending_credentials = None;
        self.reconnecting = false;
        if self.state == ConnectionState::Disconnected {
            return None;
        }
        Some(self.transition(
            ConnectionState::Disconnected,
            Notification::warning("Disconnected from server"),
        ))
    }

    fn transition(&mut self, to: ConnectionState, notification: Notification) -> Transition {
        let from = std::mem::replace(&mut self.state, to);
        Transition {
            from,
            to,
            notification,
        }
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
