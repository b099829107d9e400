/// Lifecycle of a realtime client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No active link. Initial state, and the state after `disconnect()`.
    #[default]
    Disconnected,
    /// A link is being opened by an explicit `connect()`.
    Connecting,
    /// Transport handshake done and `connection_confirmed` received.
    Connected,
    /// The link dropped unexpectedly and automatic retries are running.
    Reconnecting {
        /// Number of reconnect attempts started so far.
        attempt: u32,
    },
    /// Retries exhausted or credential rejected. Needs a new `connect()`.
    Failed,
}

impl ConnectionState {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Reconnecting { .. } => "RECONNECTING",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// True while a link is expected to exist or be in the making.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Reconnecting { .. }
        )
    }
}
