//! Seam between the client state machine and the wire.
//!
//! A `Connector` opens links; each link reports back through
//! generation-tagged `TransportEvent`s so the client can drop events from
//! links it already tore down.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::{domain::events::ClientCommand, infra::credentials::Credential};

/// Monotonic identifier of one opened link within a client.
pub type LinkGeneration = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client closed the link itself.
    ClientDisconnect,
    /// The server disconnected the namespace. Not retried.
    ServerDisconnect,
    TransportClose,
    TransportError(String),
    PingTimeout,
    HandshakeFailed(String),
}

impl DisconnectReason {
    /// Socket.IO style reason string handed to `disconnected` listeners.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientDisconnect => "io client disconnect",
            Self::ServerDisconnect => "io server disconnect",
            Self::TransportClose => "transport close",
            Self::TransportError(_) => "transport error",
            Self::PingTimeout => "ping timeout",
            Self::HandshakeFailed(_) => "handshake failed",
        }
    }

    pub fn allows_reconnect(&self) -> bool {
        !matches!(self, Self::ClientDisconnect | Self::ServerDisconnect)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportError(details) | Self::HandshakeFailed(details) => {
                write!(f, "{}: {}", self.as_str(), details)
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// Namespace connect acknowledged by the server.
    Opened { session_id: Option<String> },
    /// A server-pushed event.
    Event { name: String, payload: Value },
    /// The server refused the namespace connect (bad credential).
    Rejected { payload: Value },
    /// The link is gone. Always the last event of a link.
    Closed(DisconnectReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub generation: LinkGeneration,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(generation: LinkGeneration, kind: TransportEventKind) -> Self {
        Self { generation, kind }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link is closed")]
    LinkClosed,
    #[error("invalid server url `{url}`: {details}")]
    InvalidUrl { url: String, details: String },
    #[error("no async runtime available to drive the link")]
    NoRuntime,
}

pub trait Connector {
    type Link: Link;

    /// Starts opening a link. Progress is reported asynchronously through
    /// `TransportEvent`s carrying `generation`.
    fn open(
        &mut self,
        generation: LinkGeneration,
        credential: &Credential,
    ) -> Result<Self::Link, TransportError>;
}

pub trait Link {
    fn send(&mut self, command: &ClientCommand) -> Result<(), TransportError>;
    /// Releases the link. Must be idempotent.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_client_and_server_disconnects_suppress_reconnect() {
        assert!(!DisconnectReason::ClientDisconnect.allows_reconnect());
        assert!(!DisconnectReason::ServerDisconnect.allows_reconnect());
        assert!(DisconnectReason::TransportClose.allows_reconnect());
        assert!(DisconnectReason::PingTimeout.allows_reconnect());
        assert!(DisconnectReason::HandshakeFailed("timeout".to_owned()).allows_reconnect());
    }

    #[test]
    fn display_includes_details() {
        assert_eq!(
            DisconnectReason::TransportError("connection reset".to_owned()).to_string(),
            "transport error: connection reset"
        );
        assert_eq!(DisconnectReason::PingTimeout.to_string(), "ping timeout");
    }
}
