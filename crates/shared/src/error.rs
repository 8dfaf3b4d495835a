use thiserror::Error;

/// Why an inbound frame could not be turned into a [`crate::protocol::ServerFrame`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame is not valid json: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("frame is not a json object")]
    NotAnObject,
    #[error("frame has no action discriminator")]
    MissingAction,
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("unknown push `{kind}/{action}`")]
    UnknownPush { kind: String, action: String },
    #[error("malformed `{action}` payload: {source}")]
    InvalidPayload {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::UnknownAction(action) | Self::InvalidPayload { action, .. } => Some(action),
            Self::UnknownPush { action, .. } => Some(action),
            _ => None,
        }
    }
}
