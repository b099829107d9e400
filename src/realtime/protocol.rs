//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! One WebSocket text frame carries one Engine.IO packet. Engine.IO
//! `message` packets (`4`) wrap a Socket.IO packet, so an event on the
//! default namespace looks like `42["new_message",{...}]`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const ENGINE_IO_VERSION: &str = "4";
pub const DEFAULT_NAMESPACE: &str = "/";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine.io packet type `{0}`")]
    UnknownEngineType(char),
    #[error("unknown socket.io packet type `{0}`")]
    UnknownSocketType(char),
    #[error("binary socket.io packets are not supported")]
    BinaryUnsupported,
    #[error("malformed {what}: {details}")]
    Malformed { what: &'static str, details: String },
    #[error("invalid json in packet: {0}")]
    Json(#[from] serde_json::Error),
}

/// Body of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// Longest silence tolerated before the link is considered dead.
    pub fn heartbeat_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        payload: Value,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        data: Value,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
}

impl SocketPacket {
    pub fn connect(auth: Value) -> Self {
        Self::Connect {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            data: Some(auth),
        }
    }

    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            ack_id: None,
            name: name.into(),
            payload,
        }
    }

    pub fn disconnect() -> Self {
        Self::Disconnect {
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }

    /// Empty acknowledgement for a server event that asked for one.
    pub fn ack(ack_id: u64) -> Self {
        Self::Ack {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            ack_id,
            data: Value::Null,
        }
    }

    fn type_digit(&self) -> char {
        match self {
            Self::Connect { .. } => '0',
            Self::Disconnect { .. } => '1',
            Self::Event { .. } => '2',
            Self::Ack { .. } => '3',
            Self::ConnectError { .. } => '4',
        }
    }

    fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    fn encode_into(&self, out: &mut String) {
        out.push(self.type_digit());

        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }

        match self {
            Self::Connect { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
            Self::Disconnect { .. } => {}
            Self::Event {
                ack_id,
                name,
                payload,
                ..
            } => {
                if let Some(ack_id) = ack_id {
                    out.push_str(&ack_id.to_string());
                }
                let mut args = vec![Value::String(name.clone())];
                if !payload.is_null() {
                    args.push(payload.clone());
                }
                out.push_str(&Value::Array(args).to_string());
            }
            Self::Ack { ack_id, data, .. } => {
                out.push_str(&ack_id.to_string());
                let args = if data.is_null() {
                    Vec::new()
                } else {
                    vec![data.clone()]
                };
                out.push_str(&Value::Array(args).to_string());
            }
            Self::ConnectError { data, .. } => out.push_str(&data.to_string()),
        }
    }

    fn decode(body: &str) -> Result<Self, ProtocolError> {
        let mut chars = body.chars();
        let kind = chars.next().ok_or(ProtocolError::Malformed {
            what: "socket.io packet",
            details: "missing packet type".to_owned(),
        })?;
        let rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::BinaryUnsupported);
        }

        let (namespace, rest) = split_namespace(rest);
        let (ack_id, data) = split_ack_id(rest);

        match kind {
            '0' => Ok(Self::Connect {
                namespace,
                data: parse_optional_json(data)?,
            }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let (name, payload) = parse_event_args(data)?;
                Ok(Self::Event {
                    namespace,
                    ack_id,
                    name,
                    payload,
                })
            }
            '3' => {
                let ack_id = ack_id.ok_or(ProtocolError::Malformed {
                    what: "ack packet",
                    details: "missing ack id".to_owned(),
                })?;
                let data = match parse_optional_json(data)? {
                    Some(Value::Array(items)) => items.into_iter().next().unwrap_or(Value::Null),
                    Some(other) => other,
                    None => Value::Null,
                };
                Ok(Self::Ack {
                    namespace,
                    ack_id,
                    data,
                })
            }
            '4' => Ok(Self::ConnectError {
                namespace,
                data: parse_optional_json(data)?.unwrap_or(Value::Null),
            }),
            other => Err(ProtocolError::UnknownSocketType(other)),
        }
    }
}

impl EnginePacket {
    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => {
                let body = serde_json::to_string(handshake).unwrap_or_else(|_| "{}".to_owned());
                format!("0{body}")
            }
            Self::Close => "1".to_owned(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(packet) => {
                let mut out = String::from("4");
                packet.encode_into(&mut out);
                out
            }
            Self::Upgrade => "5".to_owned(),
            Self::Noop => "6".to_owned(),
        }
    }

    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let body = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(body)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(body.to_owned())),
            '3' => Ok(Self::Pong(body.to_owned())),
            '4' => Ok(Self::Message(SocketPacket::decode(body)?)),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(ProtocolError::UnknownEngineType(other)),
        }
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_owned(), rest);
    }

    match rest.find(',') {
        Some(comma) => (rest[..comma].to_owned(), &rest[comma + 1..]),
        None => (rest.to_owned(), ""),
    }
}

fn split_ack_id(rest: &str) -> (Option<u64>, &str) {
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return (None, rest);
    }

    match rest[..digits].parse() {
        Ok(ack_id) => (Some(ack_id), &rest[digits..]),
        Err(_) => (None, rest),
    }
}

fn parse_optional_json(data: &str) -> Result<Option<Value>, ProtocolError> {
    if data.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(data)?))
}

fn parse_event_args(data: &str) -> Result<(String, Value), ProtocolError> {
    let Some(Value::Array(mut args)) = parse_optional_json(data)? else {
        return Err(ProtocolError::Malformed {
            what: "event packet",
            details: "arguments must be a json array".to_owned(),
        });
    };

    if args.is_empty() {
        return Err(ProtocolError::Malformed {
            what: "event packet",
            details: "missing event name".to_owned(),
        });
    }

    let Value::String(name) = args.remove(0) else {
        return Err(ProtocolError::Malformed {
            what: "event packet",
            details: "event name must be a string".to_owned(),
        });
    };

    let payload = if args.is_empty() {
        Value::Null
    } else {
        args.remove(0)
    };

    Ok((name, payload))
}
