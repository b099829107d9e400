use serde::{Deserialize, Serialize};

use super::conversation::ConversationId;

/// Typing state of one participant in one conversation.
///
/// Never persisted; the next indicator for the same (conversation, user)
/// pair replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingIndicator {
    #[serde(rename = "inquiry_id")]
    pub conversation_id: ConversationId,
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_name: String,
    pub is_typing: bool,
}

/// Presence of a user. Latest wins per `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_name: String,
    pub is_online: bool,
    #[serde(default)]
    pub last_seen: Option<String>,
}

/// Payload of `messages_read`: someone marked a conversation as read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    #[serde(rename = "inquiry_id")]
    pub conversation_id: ConversationId,
    pub read_by: i64,
    #[serde(default)]
    pub read_by_name: Option<String>,
}
