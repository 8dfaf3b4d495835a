use shared::error::ProtocolError;
use thiserror::Error;

use crate::connection::ConnectionState;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket failed to open or dropped.
    #[error("transport error: {0}")]
    Transport(String),
    /// Server answered `auth_response` with `success: false`.
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("undecodable frame: {0}")]
    Decode(#[from] ProtocolError),
    #[error("{command} rejected by server: {reason}")]
    CommandRejected {
        command: &'static str,
        reason: String,
    },
    #[error("not connected to server")]
    NotConnected,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("{0}")]
    Validation(String),
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },
}

impl ClientError {
    /// Text shown in the notification channel.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConnected => "Not connected to server".to_string(),
            Self::NotAuthenticated => "Please log in first".to_string(),
            Self::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
