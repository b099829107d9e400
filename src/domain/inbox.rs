use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;

use super::{
    conversation::{Conversation, ConversationId},
    events::ServerEvent,
    message::Message,
    presence::{ReadReceipt, TypingIndicator, UserStatus},
};

/// Client-side cache of conversations, the active thread, typing and
/// presence, rebuilt from pushed events.
///
/// Disposable: `seed` replaces the conversation list with a fresh fetch.
#[derive(Debug, Clone, Default)]
pub struct InboxState {
    own_user_id: Option<i64>,
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    messages: Vec<Message>,
    seen_message_ids: HashSet<i64>,
    typing: BTreeMap<(ConversationId, i64), TypingIndicator>,
    presence: HashMap<i64, UserStatus>,
    last_error: Option<String>,
}

impl InboxState {
    pub fn new(own_user_id: Option<i64>) -> Self {
        Self {
            own_user_id,
            ..Self::default()
        }
    }

    /// Used once the credential, and with it the user id, is known.
    pub fn set_own_user_id(&mut self, own_user_id: i64) {
        self.own_user_id = Some(own_user_id);
    }

    pub fn own_user_id(&self) -> Option<i64> {
        self.own_user_id
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|item| item.id == id)
    }

    pub fn active(&self) -> Option<ConversationId> {
        self.active
    }

    /// Messages of the active conversation, in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations
            .iter()
            .map(|item| item.unread_count)
            .sum()
    }

    pub fn typing_in(&self, id: ConversationId) -> Vec<&TypingIndicator> {
        self.typing
            .range((id, i64::MIN)..=(id, i64::MAX))
            .map(|(_, indicator)| indicator)
            .collect()
    }

    pub fn online_users(&self) -> Vec<&UserStatus> {
        let mut users: Vec<_> = self
            .presence
            .values()
            .filter(|status| status.is_online)
            .collect();
        users.sort_by_key(|status| status.user_id);
        users
    }

    /// Replaces the conversation list with a fresh fetch.
    ///
    /// The active thread survives: its messages are kept, it stays listed
    /// even when the fetch predates it, and it remains read.
    pub fn seed(&mut self, conversations: Vec<Conversation>) {
        let previous = std::mem::replace(&mut self.conversations, conversations);

        if let Some(active) = self.active {
            if self.conversation(active).is_none() {
                let kept = previous
                    .into_iter()
                    .find(|item| item.id == active)
                    .unwrap_or_else(|| Conversation::new(active));
                self.conversations.push(kept);
            }
            self.mark_read(active);
        }
    }

    /// Makes `id` the active conversation (or clears it) and treats it as
    /// read.
    pub fn select(&mut self, id: Option<ConversationId>) {
        if self.active == id {
            return;
        }

        self.active = id;
        self.messages.clear();
        if let Some(id) = id {
            self.ensure_conversation(id);
            self.mark_read(id);
        }
    }

    pub fn mark_read(&mut self, id: ConversationId) {
        if let Some(conversation) = self.conversation_mut(id) {
            conversation.unread_count = 0;
        }

        if self.active == Some(id) {
            let own = self.own_user_id;
            self.messages
                .iter_mut()
                .filter(|message| Some(message.sender_id) != own)
                .for_each(Message::mark_read);
        }
    }

    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Connected { .. } => self.last_error = None,
            ServerEvent::ConnectionConfirmed(payload) => {
                // The server names the authenticated user even for opaque tokens.
                if let Some(user_id) = payload.get("user_id").and_then(Value::as_i64) {
                    self.own_user_id = Some(user_id);
                }
                self.last_error = None;
            }
            ServerEvent::Disconnected { .. } => self.typing.clear(),
            ServerEvent::ReconnectFailed => {
                self.last_error = Some("reconnection failed".to_owned());
            }
            ServerEvent::Error(error) => {
                self.last_error = Some(error.message.clone());
            }
            ServerEvent::NewMessage(message) => self.on_new_message(message),
            ServerEvent::MessagesRead(receipt) => self.on_messages_read(receipt),
            ServerEvent::UserTyping(indicator) => {
                let key = (indicator.conversation_id, indicator.user_id);
                if indicator.is_typing {
                    self.typing.insert(key, indicator.clone());
                } else {
                    self.typing.remove(&key);
                }
            }
            ServerEvent::UserStatusChange(status) => {
                self.presence.insert(status.user_id, status.clone());
            }
            ServerEvent::MessageSent(_)
            | ServerEvent::Notification(_)
            | ServerEvent::AdminNotification(_) => {}
        }
    }

    fn on_new_message(&mut self, message: &Message) {
        if !self.seen_message_ids.insert(message.id) {
            tracing::debug!(message_id = message.id, "duplicate message delivery ignored");
            return;
        }

        let id = message.conversation_id;
        let is_inbound = Some(message.sender_id) != self.own_user_id;
        let is_active = self.active == Some(id);

        self.typing.remove(&(id, message.sender_id));

        let conversation = self.ensure_conversation(id);
        if conversation.product_name.is_empty() {
            conversation.product_name = message.product_name.clone();
        }
        if conversation.buyer_name.is_empty() {
            conversation.buyer_name = message.buyer_name.clone();
        }
        if conversation.producer_name.is_empty() {
            conversation.producer_name = message.producer_name.clone();
        }
        conversation.last_message = Some(message.text.clone());
        conversation.last_message_time = Some(message.created_at.clone());
        if is_inbound && !is_active {
            conversation.unread_count = conversation.unread_count.saturating_add(1);
        }

        if is_active {
            self.messages.push(message.clone());
        }
    }

    fn on_messages_read(&mut self, receipt: &ReadReceipt) {
        let id = receipt.conversation_id;
        if Some(receipt.read_by) == self.own_user_id {
            if let Some(conversation) = self.conversation_mut(id) {
                conversation.unread_count = 0;
            }
            return;
        }

        if self.active == Some(id) {
            let own = self.own_user_id;
            self.messages
                .iter_mut()
                .filter(|message| own.is_some() && Some(message.sender_id) == own)
                .for_each(Message::mark_read);
        }
    }

    fn conversation_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|item| item.id == id)
    }

    fn ensure_conversation(&mut self, id: ConversationId) -> &mut Conversation {
        let index = match self.conversations.iter().position(|item| item.id == id) {
            Some(index) => index,
            None => {
                self.conversations.push(Conversation::new(id));
                self.conversations.len() - 1
            }
        };

        &mut self.conversations[index]
    }
}
