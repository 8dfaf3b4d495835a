use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{ConversationKey, Message, Timestamp},
    error::ProtocolError,
};

/// `type` tag carried by server-initiated pushes.
pub const PUSH_TYPE: &str = "dynamodb_update";
/// Profile field holding the subject's phone number.
pub const PROFILE_PHONE_FIELD: &str = "Please enter your what's app number";

/// Outbound command envelope. Fire-and-forget: the protocol has no correlation ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    Authenticate {
        username: String,
        password: String,
    },
    GetAllMessages {
        limit: u32,
        table_name: String,
    },
    GetUserInfo {
        phone: ConversationKey,
    },
    GetSelectedUserChat {
        phone: ConversationKey,
        timestamp: Timestamp,
    },
    SendMessage {
        phone: ConversationKey,
        message: String,
    },
    SendPaymentLink {
        phone: ConversationKey,
        amount: u64,
        duration: String,
    },
}

impl ClientCommand {
    /// Page request; without a cursor the current time asks for the most recent page.
    pub fn selected_user_chat(phone: ConversationKey, cursor: Option<&Timestamp>) -> Self {
        Self::GetSelectedUserChat {
            phone,
            timestamp: cursor.cloned().unwrap_or_else(Timestamp::now),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::GetAllMessages { .. } => "get_all_messages",
            Self::GetUserInfo { .. } => "get_user_info",
            Self::GetSelectedUserChat { .. } => "get_selected_user_chat",
            Self::SendMessage { .. } => "send_message",
            Self::SendPaymentLink { .. } => "send_payment_link",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Chunk of the bulk history load.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryChunk {
    pub data: Vec<Message>,
    #[serde(default)]
    pub chunk_index: Option<u32>,
    #[serde(default)]
    pub total_chunks: Option<u32>,
}

impl HistoryChunk {
    /// Chunk 0 and the legacy unchunked form both replace the store.
    pub fn replaces_store(&self) -> bool {
        self.chunk_index.map_or(true, |index| index == 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub phone: Option<ConversationKey>,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPage {
    pub phone: Option<ConversationKey>,
    pub data: Vec<Message>,
}

impl ChatPage {
    /// Conversation the page belongs to: the explicit `phone`, else its first message's key.
    pub fn conversation_key(&self) -> Option<&ConversationKey> {
        self.phone
            .as_ref()
            .or_else(|| self.data.first().map(|message| &message.conversation_key))
    }
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    AuthResponse {
        success: bool,
        message: Option<String>,
    },
    History(HistoryChunk),
    UserInfo(UserInfo),
    ChatPage(ChatPage),
    PaymentLink {
        status: String,
    },
    NewMessage(Message),
}

impl ServerFrame {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let action = object
            .get("action")
            .and_then(Value::as_str)
            .map(|action| action.trim().to_string())
            .ok_or(ProtocolError::MissingAction)?;

        if let Some(kind) = object.get("type").and_then(Value::as_str) {
            if kind == PUSH_TYPE {
                if action != "new_message" {
                    return Err(ProtocolError::UnknownPush {
                        kind: kind.to_string(),
                        action,
                    });
                }
                let data = object.remove("data").unwrap_or(Value::Null);
                return payload::<Message>(&action, data).map(Self::NewMessage);
            }
        }

        object.remove("action");
        let body = Value::Object(object);
        match action.as_str() {
            "auth_response" => {
                let wire: AuthResponseWire = payload(&action, body)?;
                Ok(Self::AuthResponse {
                    success: wire.success,
                    message: wire.message,
                })
            }
            "get_data_response" => payload(&action, body).map(Self::History),
            "user_info_response" => {
                let wire: UserInfoWire = payload(&action, body)?;
                Ok(Self::UserInfo(flatten_user_info(wire.data)))
            }
            "selected_user_chat_response" => {
                let wire: ChatPageWire = payload(&action, body)?;
                Ok(Self::ChatPage(ChatPage {
                    phone: wire
                        .phone
                        .filter(|phone| !phone.trim().is_empty())
                        .map(|phone| ConversationKey::canonicalize(&phone)),
                    data: wire.data,
                }))
            }
            "payment_link_response" => {
                let wire: PaymentLinkWire = payload(&action, body)?;
                Ok(Self::PaymentLink {
                    status: wire.status,
                })
            }
            _ => Err(ProtocolError::UnknownAction(action)),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::AuthResponse { .. } => "auth_response",
            Self::History(_) => "get_data_response",
            Self::UserInfo(_) => "user_info_response",
            Self::ChatPage(_) => "selected_user_chat_response",
            Self::PaymentLink { .. } => "payment_link_response",
            Self::NewMessage(_) => "new_message",
        }
    }
}

fn payload<T: DeserializeOwned>(action: &str, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload {
        action: action.to_string(),
        source,
    })
}

fn flatten_user_info(data: Map<String, Value>) -> UserInfo {
    let phone = match data.get(PROFILE_PHONE_FIELD) {
        Some(Value::String(raw)) if !raw.trim().is_empty() => {
            Some(ConversationKey::canonicalize(raw))
        }
        Some(Value::Number(raw)) => Some(ConversationKey::canonicalize(&raw.to_string())),
        _ => None,
    };

    let fields = data
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((name, text)),
            other => Some((name, other.to_string())),
        })
        .collect();

    UserInfo { phone, fields }
}

#[derive(Deserialize)]
struct AuthResponseWire {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct UserInfoWire {
    data: Map<String, Value>,
}

#[derive(Deserialize)]
struct ChatPageWire {
    data: Vec<Message>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Deserialize)]
struct PaymentLinkWire {
    #[serde(default)]
    status: String,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
