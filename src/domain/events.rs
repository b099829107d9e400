use serde_json::{json, Value};
use thiserror::Error;

use super::{
    conversation::ConversationId,
    message::Message,
    presence::{ReadReceipt, TypingIndicator, UserStatus},
};

/// Event kinds listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Connected,
    Disconnected,
    ConnectionConfirmed,
    Error,
    NewMessage,
    MessageSent,
    MessagesRead,
    UserTyping,
    UserStatusChange,
    Notification,
    AdminNotification,
    ReconnectFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        Self::Connected,
        Self::Disconnected,
        Self::ConnectionConfirmed,
        Self::Error,
        Self::NewMessage,
        Self::MessageSent,
        Self::MessagesRead,
        Self::UserTyping,
        Self::UserStatusChange,
        Self::Notification,
        Self::AdminNotification,
        Self::ReconnectFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::ConnectionConfirmed => "connection_confirmed",
            Self::Error => "error",
            Self::NewMessage => "new_message",
            Self::MessageSent => "message_sent",
            Self::MessagesRead => "messages_read",
            Self::UserTyping => "user_typing",
            Self::UserStatusChange => "user_status_change",
            Self::Notification => "notification",
            Self::AdminNotification => "admin_notification",
            Self::ReconnectFailed => "reconnect_failed",
        }
    }
}

/// Error description carried by the `error` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError {
    pub message: String,
}

impl ChannelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Accepts `{"message": "..."}`, a bare string, or anything else
    /// (rendered as JSON).
    pub fn from_payload(payload: &Value) -> Self {
        let message = match payload {
            Value::String(text) => text.clone(),
            Value::Object(map) => match map.get("message") {
                Some(Value::String(text)) => text.clone(),
                _ => payload.to_string(),
            },
            Value::Null => "unknown error".to_owned(),
            other => other.to_string(),
        };

        Self { message }
    }
}

/// An event delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The transport and namespace handshake succeeded.
    Connected { session_id: Option<String> },
    Disconnected { reason: String },
    ConnectionConfirmed(Value),
    Error(ChannelError),
    NewMessage(Message),
    MessageSent(Value),
    MessagesRead(ReadReceipt),
    UserTyping(TypingIndicator),
    UserStatusChange(UserStatus),
    Notification(Value),
    AdminNotification(Value),
    /// Reconnection attempts are exhausted.
    ReconnectFailed,
}

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("malformed `{event}` payload: {source}")]
    Malformed {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::ConnectionConfirmed(_) => EventKind::ConnectionConfirmed,
            Self::Error(_) => EventKind::Error,
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::MessageSent(_) => EventKind::MessageSent,
            Self::MessagesRead(_) => EventKind::MessagesRead,
            Self::UserTyping(_) => EventKind::UserTyping,
            Self::UserStatusChange(_) => EventKind::UserStatusChange,
            Self::Notification(_) => EventKind::Notification,
            Self::AdminNotification(_) => EventKind::AdminNotification,
            Self::ReconnectFailed => EventKind::ReconnectFailed,
        }
    }

    /// Maps a server-pushed Socket.IO event to a typed event.
    ///
    /// Returns `Ok(None)` for event names outside the contract.
    pub fn from_wire(name: &str, payload: Value) -> Result<Option<Self>, EventDecodeError> {
        let event = match name {
            "connection_confirmed" => Self::ConnectionConfirmed(payload),
            "error" => Self::Error(ChannelError::from_payload(&payload)),
            "new_message" => Self::NewMessage(typed("new_message", payload)?),
            "message_sent" => Self::MessageSent(payload),
            "messages_read" => Self::MessagesRead(typed("messages_read", payload)?),
            "user_typing" => Self::UserTyping(typed("user_typing", payload)?),
            "user_status_change" => {
                Self::UserStatusChange(typed("user_status_change", payload)?)
            }
            "notification" => Self::Notification(payload),
            "admin_notification" => Self::AdminNotification(payload),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

fn typed<T>(event: &'static str, payload: Value) -> Result<T, EventDecodeError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(payload).map_err(|source| EventDecodeError::Malformed { event, source })
}

/// A command sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    JoinConversation(ConversationId),
    LeaveConversation(ConversationId),
    SendMessage {
        conversation_id: ConversationId,
        text: String,
    },
    MarkRead(ConversationId),
    Typing {
        conversation_id: ConversationId,
        is_typing: bool,
    },
    OnlineStatus {
        is_online: bool,
    },
}

impl ClientCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinConversation(_) => "join_conversation",
            Self::LeaveConversation(_) => "leave_conversation",
            Self::SendMessage { .. } => "send_message",
            Self::MarkRead(_) => "mark_read",
            Self::Typing { .. } => "typing",
            Self::OnlineStatus { .. } => "online_status",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::JoinConversation(id) | Self::LeaveConversation(id) => {
                json!({ "conversation_id": id.get() })
            }
            Self::SendMessage {
                conversation_id,
                text,
            } => json!({ "inquiry_id": conversation_id.get(), "message": text }),
            Self::MarkRead(id) => json!({ "inquiry_id": id.get() }),
            Self::Typing {
                conversation_id,
                is_typing,
            } => json!({ "inquiry_id": conversation_id.get(), "is_typing": is_typing }),
            Self::OnlineStatus { is_online } => json!({ "is_online": is_online }),
        }
    }
}
