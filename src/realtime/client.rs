//! Realtime messaging client: one link, one state machine, one listener
//! registry per instance.
//!
//! The client never blocks and never spawns. The owner feeds it transport
//! events through `handle_transport_event` and drives reconnects by calling
//! `poll_retry` once `retry_deadline` has passed.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::{
    domain::{
        connection_state::ConnectionState,
        conversation::ConversationId,
        events::{ChannelError, ClientCommand, EventKind, ServerEvent},
    },
    infra::{config::ReconnectConfig, contracts::CredentialProvider, credentials::Credential},
    realtime::{
        listeners::{ListenerId, ListenerRegistry, ListenerResult},
        transport::{
            Connector, DisconnectReason, Link, LinkGeneration, TransportError, TransportEvent,
            TransportEventKind,
        },
    },
};

const CONNECT_MISSING_CREDENTIAL: &str = "REALTIME_CONNECT_MISSING_CREDENTIAL";
const CREDENTIAL_PERSIST_FAILED: &str = "REALTIME_CREDENTIAL_PERSIST_FAILED";
const CREDENTIAL_LOAD_FAILED: &str = "REALTIME_CREDENTIAL_LOAD_FAILED";
const LINK_OPEN_FAILED: &str = "REALTIME_LINK_OPEN_FAILED";
const CONNECT_REJECTED: &str = "REALTIME_CONNECT_REJECTED";
const RECONNECT_EXHAUSTED: &str = "REALTIME_RECONNECT_EXHAUSTED";
const EVENT_DECODE_FAILED: &str = "REALTIME_EVENT_DECODE_FAILED";
const COMMAND_SEND_FAILED: &str = "REALTIME_COMMAND_SEND_FAILED";

/// Fixed-delay, bounded reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_millis(1_000),
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Already connected; nothing was opened.
    AlreadyConnected,
    /// A new link is being opened.
    Started,
    /// Neither the caller nor the credential store had a credential.
    MissingCredential,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected to the messaging server")]
    NotConnected,
    #[error("message text is empty")]
    EmptyMessage,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct RealtimeClient<C: Connector> {
    connector: C,
    credentials: Box<dyn CredentialProvider>,
    policy: ReconnectPolicy,
    state: ConnectionState,
    credential: Option<Credential>,
    link: Option<C::Link>,
    generation: LinkGeneration,
    transport_open: bool,
    session_id: Option<String>,
    attempts: u32,
    retry_deadline: Option<Instant>,
    listeners: ListenerRegistry,
}

impl<C: Connector> RealtimeClient<C> {
    pub fn new<P>(connector: C, credentials: P, policy: ReconnectPolicy) -> Self
    where
        P: CredentialProvider + 'static,
    {
        Self {
            connector,
            credentials: Box::new(credentials),
            policy,
            state: ConnectionState::Disconnected,
            credential: None,
            link: None,
            generation: 0,
            transport_open: false,
            session_id: None,
            attempts: 0,
            retry_deadline: None,
            listeners: ListenerRegistry::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Socket.IO session id of the live link.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts
    }

    /// When the next reconnect attempt is due, if one is scheduled.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_deadline
    }

    /// User id carried by the current credential, when it is a JWT.
    pub fn current_user_id(&self) -> Option<i64> {
        self.credential.as_ref().and_then(Credential::user_id)
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&ServerEvent) -> ListenerResult + 'static,
    {
        self.listeners.on(kind, listener)
    }

    pub fn off(&mut self, kind: EventKind, id: Option<ListenerId>) -> usize {
        self.listeners.off(kind, id)
    }

    /// Opens a link unless already connected.
    ///
    /// A supplied credential replaces the remembered one and is persisted;
    /// otherwise the credential store is consulted.
    pub fn connect(&mut self, credential: Option<Credential>) -> ConnectOutcome {
        if let Some(credential) = credential {
            if let Err(error) = self.credentials.set_credential(&credential) {
                tracing::warn!(
                    code = CREDENTIAL_PERSIST_FAILED,
                    error = %error,
                    "failed to persist credential; continuing with in-memory copy"
                );
            }
            self.credential = Some(credential);
        }

        if self.credential.is_none() {
            match self.credentials.credential() {
                Ok(stored) => self.credential = stored,
                Err(error) => tracing::warn!(
                    code = CREDENTIAL_LOAD_FAILED,
                    error = %error,
                    "failed to load stored credential"
                ),
            }
        }

        let Some(credential) = self.credential.clone() else {
            tracing::error!(
                code = CONNECT_MISSING_CREDENTIAL,
                "no credential available for realtime connection"
            );
            return ConnectOutcome::MissingCredential;
        };

        if self.state.is_connected() {
            tracing::debug!("realtime client already connected");
            return ConnectOutcome::AlreadyConnected;
        }

        self.teardown_link();
        self.attempts = 0;
        self.retry_deadline = None;
        self.state = ConnectionState::Connecting;
        tracing::info!("realtime client connecting");
        self.open_link(&credential);

        ConnectOutcome::Started
    }

    /// Closes the link and cancels any pending reconnect. Safe in any state.
    pub fn disconnect(&mut self) {
        let was_open = self.transport_open;
        let previous = self.state;

        self.teardown_link();
        self.retry_deadline = None;
        self.attempts = 0;
        self.state = ConnectionState::Disconnected;

        tracing::info!(previous = previous.as_label(), "realtime client disconnected");

        if was_open {
            self.dispatch(&ServerEvent::Disconnected {
                reason: DisconnectReason::ClientDisconnect.as_str().to_owned(),
            });
        }
    }

    pub fn join_conversation(&mut self, id: ConversationId) {
        self.emit_if_connected(ClientCommand::JoinConversation(id));
    }

    pub fn leave_conversation(&mut self, id: ConversationId) {
        self.emit_if_connected(ClientCommand::LeaveConversation(id));
    }

    /// Submits a message. Acceptance is reported later via `message_sent`
    /// or `error`.
    pub fn send_message(&mut self, id: ConversationId, text: &str) -> Result<(), ClientError> {
        if !self.state.is_connected() {
            tracing::error!(
                conversation_id = id.get(),
                state = self.state.as_label(),
                "cannot send message while not connected"
            );
            return Err(ClientError::NotConnected);
        }

        if text.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        self.emit(ClientCommand::SendMessage {
            conversation_id: id,
            text: text.to_owned(),
        })
    }

    pub fn mark_messages_read(&mut self, id: ConversationId) {
        self.emit_if_connected(ClientCommand::MarkRead(id));
    }

    /// Not debounced here; callers decide how often to report typing.
    pub fn set_typing(&mut self, id: ConversationId, is_typing: bool) {
        self.emit_if_connected(ClientCommand::Typing {
            conversation_id: id,
            is_typing,
        });
    }

    pub fn update_online_status(&mut self, is_online: bool) {
        self.emit_if_connected(ClientCommand::OnlineStatus { is_online });
    }

    /// Feeds one transport event into the state machine and fans the
    /// resulting application events out to listeners.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.link.is_none() || event.generation != self.generation {
            tracing::debug!(
                generation = event.generation,
                current = self.generation,
                "dropping event from stale link"
            );
            return;
        }

        match event.kind {
            TransportEventKind::Opened { session_id } => {
                self.transport_open = true;
                self.session_id = session_id.clone();
                tracing::info!(session_id = ?session_id, "realtime transport connected");
                self.dispatch(&ServerEvent::Connected { session_id });
            }
            TransportEventKind::Event { name, payload } => {
                match ServerEvent::from_wire(&name, payload) {
                    Ok(Some(server_event)) => {
                        if matches!(server_event, ServerEvent::ConnectionConfirmed(_)) {
                            self.on_confirmed();
                        }
                        self.dispatch(&server_event);
                    }
                    Ok(None) => tracing::debug!(event = %name, "ignoring unknown server event"),
                    Err(error) => {
                        tracing::warn!(
                            code = EVENT_DECODE_FAILED,
                            event = %name,
                            error = %error,
                            "failed to decode server event"
                        );
                        self.dispatch(&ServerEvent::Error(ChannelError::new(error.to_string())));
                    }
                }
            }
            TransportEventKind::Rejected { payload } => {
                let error = ChannelError::from_payload(&payload);
                tracing::warn!(
                    code = CONNECT_REJECTED,
                    reason = %error.message,
                    "server rejected realtime connection"
                );
                self.teardown_link();
                self.retry_deadline = None;
                self.state = ConnectionState::Failed;
                self.dispatch(&ServerEvent::Error(error));
            }
            TransportEventKind::Closed(reason) => self.on_link_lost(reason),
        }
    }

    /// Starts the scheduled reconnect attempt if it is due at `now`.
    /// Returns whether an attempt was started.
    pub fn poll_retry(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.retry_deadline else {
            return false;
        };
        if now < deadline || !matches!(self.state, ConnectionState::Reconnecting { .. }) {
            return false;
        }
        self.retry_deadline = None;

        let Some(credential) = self.credential.clone() else {
            self.state = ConnectionState::Failed;
            self.dispatch(&ServerEvent::ReconnectFailed);
            return false;
        };

        self.attempts += 1;
        self.state = ConnectionState::Reconnecting {
            attempt: self.attempts,
        };
        tracing::info!(
            attempt = self.attempts,
            max_attempts = self.policy.max_attempts,
            "realtime reconnect attempt"
        );
        self.open_link(&credential);

        true
    }

    fn on_confirmed(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.retry_deadline = None;
        tracing::info!(session_id = ?self.session_id, "realtime connection confirmed");
    }

    fn on_link_lost(&mut self, reason: DisconnectReason) {
        let was_open = self.transport_open;
        self.teardown_link();

        let mut exhausted = false;
        if !reason.allows_reconnect() {
            self.retry_deadline = None;
            self.state = ConnectionState::Disconnected;
        } else if self.policy.max_attempts == 0
            || (matches!(self.state, ConnectionState::Reconnecting { .. })
                && self.attempts >= self.policy.max_attempts)
        {
            exhausted = true;
        } else if self.state.is_active() {
            self.schedule_retry();
        }

        tracing::warn!(
            reason = %reason,
            state = self.state.as_label(),
            attempts = self.attempts,
            "realtime link lost"
        );

        if was_open {
            self.dispatch(&ServerEvent::Disconnected {
                reason: reason.as_str().to_owned(),
            });
        }

        if exhausted {
            self.retry_deadline = None;
            self.state = ConnectionState::Failed;
            tracing::error!(
                code = RECONNECT_EXHAUSTED,
                attempts = self.attempts,
                "realtime reconnection failed"
            );
            self.dispatch(&ServerEvent::ReconnectFailed);
        }
    }

    fn schedule_retry(&mut self) {
        self.state = ConnectionState::Reconnecting {
            attempt: self.attempts,
        };
        self.retry_deadline = Some(Instant::now() + self.policy.retry_delay);
    }

    fn open_link(&mut self, credential: &Credential) {
        self.generation += 1;
        self.transport_open = false;
        self.session_id = None;

        match self.connector.open(self.generation, credential) {
            Ok(link) => self.link = Some(link),
            Err(error) => {
                tracing::warn!(
                    code = LINK_OPEN_FAILED,
                    generation = self.generation,
                    error = %error,
                    "failed to open realtime link"
                );
                self.on_link_lost(DisconnectReason::HandshakeFailed(error.to_string()));
            }
        }
    }

    fn teardown_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.transport_open = false;
        self.session_id = None;
    }

    fn emit_if_connected(&mut self, command: ClientCommand) {
        if !self.state.is_connected() {
            tracing::debug!(
                command = command.event_name(),
                state = self.state.as_label(),
                "command ignored while not connected"
            );
            return;
        }

        if let Err(error) = self.emit(command) {
            tracing::warn!(code = COMMAND_SEND_FAILED, error = %error, "failed to send command");
        }
    }

    fn emit(&mut self, command: ClientCommand) -> Result<(), ClientError> {
        let link = self.link.as_mut().ok_or(ClientError::NotConnected)?;
        tracing::debug!(command = command.event_name(), "sending command");
        link.send(&command)?;
        Ok(())
    }

    fn dispatch(&mut self, event: &ServerEvent) {
        let report = self.listeners.dispatch(event);
        tracing::trace!(
            event = event.kind().as_str(),
            delivered = report.delivered,
            failed = report.failed,
            "event dispatched"
        );
    }

    #[cfg(test)]
    fn has_link(&self) -> bool {
        self.link.is_some()
    }
}

impl<C: Connector> std::fmt::Debug for RealtimeClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("session_id", &self.session_id)
            .field("attempts", &self.attempts)
            .field("listeners", &self.listeners)
            .finish()
    }
}
