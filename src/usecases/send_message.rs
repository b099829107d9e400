//! Sending a chat message into a conversation.
//!
//! Acceptance is asynchronous: a successful call only means the message was
//! handed to the live link. The server answers with `message_sent` or
//! `error`.

use thiserror::Error;

use crate::{
    domain::conversation::ConversationId,
    realtime::{
        client::{ClientError, RealtimeClient},
        transport::Connector,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub conversation_id: ConversationId,
    pub text: String,
}

/// Failures reported by the sending side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageSourceError {
    NotConnected,
    EmptyMessage,
    LinkClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("not connected to the messaging server; message not sent")]
    NotConnected,
    #[error("connection dropped while sending; message not sent")]
    LinkUnavailable,
}

pub trait MessageSender {
    fn send_message(
        &mut self,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<(), SendMessageSourceError>;
}

impl<C: Connector> MessageSender for RealtimeClient<C> {
    fn send_message(
        &mut self,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<(), SendMessageSourceError> {
        RealtimeClient::send_message(self, conversation_id, text).map_err(|error| match error {
            ClientError::NotConnected => SendMessageSourceError::NotConnected,
            ClientError::EmptyMessage => SendMessageSourceError::EmptyMessage,
            ClientError::Transport(_) => SendMessageSourceError::LinkClosed,
        })
    }
}

/// Trims the text and hands it to the sender.
pub fn send_message(
    sender: &mut dyn MessageSender,
    command: SendMessageCommand,
) -> Result<(), SendMessageError> {
    let text = command.text.trim();
    if text.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    sender
        .send_message(command.conversation_id, text)
        .map_err(map_source_error)
}

fn map_source_error(error: SendMessageSourceError) -> SendMessageError {
    match error {
        SendMessageSourceError::NotConnected => SendMessageError::NotConnected,
        SendMessageSourceError::EmptyMessage => SendMessageError::EmptyMessage,
        SendMessageSourceError::LinkClosed => SendMessageError::LinkUnavailable,
    }
}
