//! One interactive chat session: a realtime client and the inbox it feeds.

use std::{
    cell::{Ref, RefCell},
    collections::VecDeque,
    rc::Rc,
    time::Instant,
};

use thiserror::Error;

use crate::{
    domain::{
        connection_state::ConnectionState,
        conversation::{Conversation, ConversationId},
        events::{EventKind, ServerEvent},
        inbox::InboxState,
    },
    infra::credentials::Credential,
    realtime::{
        client::{ConnectOutcome, RealtimeClient},
        listeners::ListenerId,
        transport::{Connector, TransportEvent},
    },
    usecases::send_message::{send_message, SendMessageCommand, SendMessageError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Join(ConversationId),
    Leave,
    Send(String),
    MarkRead,
    Typing(bool),
    Online(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatCommandError {
    #[error("no active conversation; use /join ID first")]
    NoActiveConversation,
    #[error(transparent)]
    Send(#[from] SendMessageError),
}

pub struct ChatSession<C: Connector> {
    client: RealtimeClient<C>,
    inbox: Rc<RefCell<InboxState>>,
    feed: Rc<RefCell<VecDeque<ServerEvent>>>,
    subscriptions: Vec<(EventKind, ListenerId)>,
}

impl<C: Connector> ChatSession<C> {
    /// Subscribes the inbox and the event feed to every event kind.
    pub fn new(mut client: RealtimeClient<C>) -> Self {
        let inbox = Rc::new(RefCell::new(InboxState::new(client.current_user_id())));
        let feed = Rc::new(RefCell::new(VecDeque::new()));

        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let inbox = Rc::clone(&inbox);
                let feed = Rc::clone(&feed);
                let id = client.on(kind, move |event| {
                    inbox.try_borrow_mut()?.apply(event);
                    feed.try_borrow_mut()?.push_back(event.clone());
                    Ok(())
                });
                (kind, id)
            })
            .collect();

        Self {
            client,
            inbox,
            feed,
            subscriptions,
        }
    }

    pub fn start(&mut self, credential: Option<Credential>) -> ConnectOutcome {
        let outcome = self.client.connect(credential);
        if let Some(user_id) = self.client.current_user_id() {
            self.inbox.borrow_mut().set_own_user_id(user_id);
        }
        outcome
    }

    /// Disconnects, then detaches the inbox and feed from the client. The
    /// final `disconnected` event is still recorded.
    pub fn shutdown(&mut self) {
        self.client.disconnect();
        for (kind, id) in self.subscriptions.drain(..) {
            self.client.off(kind, Some(id));
        }
    }

    /// Replaces the conversation list with one fetched from the backend.
    pub fn seed(&mut self, conversations: Vec<Conversation>) {
        self.inbox.borrow_mut().seed(conversations);
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.client.session_id()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.client.reconnect_attempts()
    }

    pub fn retry_deadline(&self) -> Option<Instant> {
        self.client.retry_deadline()
    }

    pub fn inbox(&self) -> Ref<'_, InboxState> {
        self.inbox.borrow()
    }

    pub fn active(&self) -> Option<ConversationId> {
        self.inbox.borrow().active()
    }

    /// Events delivered since the last call, in delivery order.
    pub fn drain_feed(&mut self) -> Vec<ServerEvent> {
        self.feed.borrow_mut().drain(..).collect()
    }

    /// Feeds a transport event to the client. Server-side rooms do not
    /// survive a reconnect, so the active conversation is joined again once
    /// the connection is confirmed.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let was_connected = self.client.is_connected();
        self.client.handle_transport_event(event);

        if !was_connected && self.client.is_connected() {
            if let Some(active) = self.active() {
                tracing::debug!(conversation_id = active.get(), "rejoining active conversation");
                self.client.join_conversation(active);
            }
        }
    }

    pub fn poll_retry(&mut self, now: Instant) -> bool {
        self.client.poll_retry(now)
    }

    pub fn execute(&mut self, command: ChatCommand) -> Result<(), ChatCommandError> {
        match command {
            ChatCommand::Join(id) => {
                if let Some(previous) = self.active().filter(|previous| *previous != id) {
                    self.client.leave_conversation(previous);
                }
                self.inbox.borrow_mut().select(Some(id));
                self.client.join_conversation(id);
                self.client.mark_messages_read(id);
            }
            ChatCommand::Leave => {
                let id = self.require_active()?;
                self.client.leave_conversation(id);
                self.inbox.borrow_mut().select(None);
            }
            ChatCommand::Send(text) => {
                let conversation_id = self.require_active()?;
                send_message(
                    &mut self.client,
                    SendMessageCommand {
                        conversation_id,
                        text,
                    },
                )?;
            }
            ChatCommand::MarkRead => {
                let id = self.require_active()?;
                self.client.mark_messages_read(id);
                self.inbox.borrow_mut().mark_read(id);
            }
            ChatCommand::Typing(is_typing) => {
                let id = self.require_active()?;
                self.client.set_typing(id, is_typing);
            }
            ChatCommand::Online(is_online) => self.client.update_online_status(is_online),
        }

        Ok(())
    }

    fn require_active(&self) -> Result<ConversationId, ChatCommandError> {
        self.active().ok_or(ChatCommandError::NoActiveConversation)
    }
}
