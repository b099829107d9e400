//! Socket.IO over a raw WebSocket.
//!
//! Each opened link is one tokio task owning the socket. The task reports
//! back through the shared event channel and takes outbound frames from a
//! per-link channel, so the client itself never awaits.

use std::time::Duration;

use futures_util::{
    stream::{SplitSink, SplitStream},
    Sink, SinkExt, Stream, StreamExt,
};
use serde_json::{json, Value};
use tokio::{
    net::TcpStream,
    runtime::Handle,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::Instant,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::{
    domain::events::ClientCommand,
    infra::credentials::Credential,
    realtime::{
        protocol::{
            EnginePacket, OpenHandshake, SocketPacket, DEFAULT_NAMESPACE, ENGINE_IO_VERSION,
        },
        transport::{
            Connector, DisconnectReason, Link, LinkGeneration, TransportError, TransportEvent,
            TransportEventKind,
        },
    },
};

const FRAME_DECODE_FAILED: &str = "REALTIME_FRAME_DECODE_FAILED";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds the Socket.IO WebSocket endpoint for an `http(s)`/`ws(s)` server URL.
pub fn socket_endpoint(server_url: &str) -> Result<Url, TransportError> {
    let invalid = |details: &str| TransportError::InvalidUrl {
        url: server_url.to_owned(),
        details: details.to_owned(),
    };

    let mut url = Url::parse(server_url).map_err(|error| invalid(&error.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid("scheme must be http, https, ws or wss")),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid("scheme cannot be converted"))?;

    let base = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{base}/socket.io/"));
    url.set_query(Some(&format!(
        "EIO={ENGINE_IO_VERSION}&transport=websocket"
    )));
    url.set_fragment(None);

    Ok(url)
}

#[derive(Debug)]
pub struct WsConnector {
    endpoint: Url,
    handshake_timeout: Duration,
    runtime: Handle,
    events: UnboundedSender<TransportEvent>,
}

impl WsConnector {
    /// Must be called from within a tokio runtime; links are spawned on it.
    pub fn new(
        server_url: &str,
        handshake_timeout: Duration,
        events: UnboundedSender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        let endpoint = socket_endpoint(server_url)?;
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        Ok(Self {
            endpoint,
            handshake_timeout,
            runtime,
            events,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Connector for WsConnector {
    type Link = WsLink;

    fn open(
        &mut self,
        generation: LinkGeneration,
        credential: &Credential,
    ) -> Result<Self::Link, TransportError> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = Session {
            endpoint: self.endpoint.clone(),
            token: credential.expose().to_owned(),
            handshake_timeout: self.handshake_timeout,
            generation,
            events: self.events.clone(),
        };

        tracing::debug!(generation, endpoint = %self.endpoint, "spawning realtime link");
        self.runtime.spawn(session.run(outbound_rx));

        Ok(WsLink {
            outbound: Some(outbound_tx),
        })
    }
}

#[derive(Debug)]
enum Outbound {
    Frame(String),
    Close,
}

#[derive(Debug)]
pub struct WsLink {
    outbound: Option<UnboundedSender<Outbound>>,
}

impl Link for WsLink {
    fn send(&mut self, command: &ClientCommand) -> Result<(), TransportError> {
        let frame = EnginePacket::Message(SocketPacket::event(
            command.event_name(),
            command.payload(),
        ))
        .encode();

        self.outbound
            .as_ref()
            .ok_or(TransportError::LinkClosed)?
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::LinkClosed)
    }

    fn close(&mut self) {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Outbound::Close);
        }
    }
}

impl Drop for WsLink {
    fn drop(&mut self) {
        self.close();
    }
}

struct Session {
    endpoint: Url,
    token: String,
    handshake_timeout: Duration,
    generation: LinkGeneration,
    events: UnboundedSender<TransportEvent>,
}

impl Session {
    async fn run(self, mut outbound: UnboundedReceiver<Outbound>) {
        let reason = self.drive(&mut outbound).await;
        tracing::debug!(generation = self.generation, reason = %reason, "realtime link closed");
        self.emit(TransportEventKind::Closed(reason));
    }

    async fn drive(&self, outbound: &mut UnboundedReceiver<Outbound>) -> DisconnectReason {
        let connecting = tokio::time::timeout(self.handshake_timeout, self.handshake());
        let (mut sink, mut stream, open) = tokio::select! {
            result = connecting => match result {
                Ok(Ok(established)) => established,
                Ok(Err(reason)) => return reason,
                Err(_) => {
                    return DisconnectReason::HandshakeFailed(format!(
                        "no answer within {} ms",
                        self.handshake_timeout.as_millis()
                    ))
                }
            },
            // Nothing but a close can be queued before the namespace is joined.
            _ = outbound.recv() => return DisconnectReason::ClientDisconnect,
        };

        let window = open.heartbeat_window();
        let mut deadline = Instant::now() + window;

        loop {
            tokio::select! {
                command = outbound.recv() => match command {
                    Some(Outbound::Frame(frame)) => {
                        if let Err(error) = sink.send(Message::Text(frame)).await {
                            return DisconnectReason::TransportError(error.to_string());
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let goodbye = EnginePacket::Message(SocketPacket::disconnect()).encode();
                        let _ = sink.send(Message::Text(goodbye)).await;
                        let _ = sink.close().await;
                        return DisconnectReason::ClientDisconnect;
                    }
                },
                packet = next_packet(&mut stream) => {
                    let packet = match packet {
                        Ok(packet) => packet,
                        Err(reason) => return reason,
                    };
                    deadline = Instant::now() + window;

                    match packet {
                        EnginePacket::Ping(data) => {
                            if let Err(reason) = send_packet(&mut sink, &EnginePacket::Pong(data)).await {
                                return reason;
                            }
                        }
                        EnginePacket::Message(SocketPacket::Event {
                            namespace,
                            ack_id,
                            name,
                            payload,
                        }) if namespace == DEFAULT_NAMESPACE => {
                            if let Some(ack_id) = ack_id {
                                let ack = EnginePacket::Message(SocketPacket::ack(ack_id));
                                if let Err(reason) = send_packet(&mut sink, &ack).await {
                                    return reason;
                                }
                            }
                            self.emit(TransportEventKind::Event { name, payload });
                        }
                        EnginePacket::Message(SocketPacket::Disconnect { namespace })
                            if namespace == DEFAULT_NAMESPACE =>
                        {
                            return DisconnectReason::ServerDisconnect;
                        }
                        EnginePacket::Message(SocketPacket::ConnectError { namespace, data })
                            if namespace == DEFAULT_NAMESPACE =>
                        {
                            self.emit(TransportEventKind::Rejected { payload: data });
                            return DisconnectReason::HandshakeFailed("connect error".to_owned());
                        }
                        EnginePacket::Close => return DisconnectReason::TransportClose,
                        other => tracing::trace!(packet = ?other, "ignoring packet"),
                    }
                },
                _ = tokio::time::sleep_until(deadline) => return DisconnectReason::PingTimeout,
            }
        }
    }

    /// Opens the socket, reads the Engine.IO open packet and joins the
    /// default namespace with the credential.
    ///
    /// Events pushed before the namespace ack are held back and delivered
    /// right after `Opened` (or before `Rejected`), keeping server order.
    async fn handshake(
        &self,
    ) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>, OpenHandshake), DisconnectReason>
    {
        let (socket, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|error| DisconnectReason::HandshakeFailed(error.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let open = loop {
            match next_packet(&mut stream).await? {
                EnginePacket::Open(open) => break open,
                other => tracing::trace!(packet = ?other, "ignoring packet before open"),
            }
        };
        tracing::debug!(
            generation = self.generation,
            engine_sid = %open.sid,
            ping_interval_ms = open.ping_interval,
            "engine.io session opened"
        );

        let auth = json!({ "token": self.token });
        send_packet(&mut sink, &EnginePacket::Message(SocketPacket::connect(auth))).await?;

        let mut early = Vec::new();
        loop {
            match next_packet(&mut stream).await? {
                EnginePacket::Message(SocketPacket::Connect { namespace, data })
                    if namespace == DEFAULT_NAMESPACE =>
                {
                    let session_id = data
                        .as_ref()
                        .and_then(|data| data.get("sid"))
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                        .or_else(|| Some(open.sid.clone()));
                    self.emit(TransportEventKind::Opened { session_id });
                    early.drain(..).for_each(|kind| self.emit(kind));
                    return Ok((sink, stream, open));
                }
                EnginePacket::Message(SocketPacket::ConnectError { namespace, data })
                    if namespace == DEFAULT_NAMESPACE =>
                {
                    early.drain(..).for_each(|kind| self.emit(kind));
                    self.emit(TransportEventKind::Rejected { payload: data });
                    return Err(DisconnectReason::HandshakeFailed(
                        "namespace connect rejected".to_owned(),
                    ));
                }
                EnginePacket::Message(SocketPacket::Event {
                    namespace,
                    ack_id,
                    name,
                    payload,
                }) if namespace == DEFAULT_NAMESPACE => {
                    if let Some(ack_id) = ack_id {
                        send_packet(&mut sink, &EnginePacket::Message(SocketPacket::ack(ack_id)))
                            .await?;
                    }
                    early.push(TransportEventKind::Event { name, payload });
                }
                EnginePacket::Ping(data) => {
                    send_packet(&mut sink, &EnginePacket::Pong(data)).await?;
                }
                EnginePacket::Close => return Err(DisconnectReason::TransportClose),
                other => tracing::trace!(packet = ?other, "ignoring packet during handshake"),
            }
        }
    }

    fn emit(&self, kind: TransportEventKind) {
        if self
            .events
            .send(TransportEvent::new(self.generation, kind))
            .is_err()
        {
            tracing::debug!(generation = self.generation, "event receiver dropped");
        }
    }
}

async fn next_packet<S>(stream: &mut S) -> Result<EnginePacket, DisconnectReason>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match EnginePacket::decode(&text) {
                Ok(packet) => return Ok(packet),
                Err(error) => tracing::warn!(
                    code = FRAME_DECODE_FAILED,
                    error = %error,
                    "skipping undecodable frame"
                ),
            },
            Some(Ok(Message::Close(_))) | None => return Err(DisconnectReason::TransportClose),
            Some(Ok(_)) => {}
            Some(Err(error)) => return Err(DisconnectReason::TransportError(error.to_string())),
        }
    }
}

async fn send_packet<S>(sink: &mut S, packet: &EnginePacket) -> Result<(), DisconnectReason>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    sink.send(Message::Text(packet.encode()))
        .await
        .map_err(|error| DisconnectReason::TransportError(error.to_string()))
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use tokio::net::TcpListener;
    use tokio_tungstenite::{accept_async, WebSocketStream};

    use super::*;
    use crate::domain::conversation::ConversationId;

    type ServerSocket = WebSocketStream<TcpStream>;

    const OPEN: &str =
        r#"0{"sid":"engine-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    async fn serve_once<F, Fut>(script: F) -> String
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let socket = accept_async(tcp).await.expect("websocket accept");
            script(socket).await;
        });
        format!("http://{addr}")
    }

    async fn read_text(socket: &mut ServerSocket) -> String {
        loop {
            match socket.next().await.expect("frame").expect("frame ok") {
                Message::Text(text) => return text,
                _ => continue,
            }
        }
    }

    async fn write_text(socket: &mut ServerSocket, text: &str) {
        socket
            .send(Message::Text(text.to_owned()))
            .await
            .expect("server send");
    }

    async fn next_event(events: &mut UnboundedReceiver<TransportEvent>) -> TransportEventKind {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");
        assert_eq!(event.generation, 7);
        event.kind
    }

    fn connector(url: &str) -> (WsConnector, UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector =
            WsConnector::new(url, Duration::from_secs(5), tx).expect("connector must build");
        (connector, rx)
    }

    fn credential() -> Credential {
        Credential::new("tok-123").expect("non-empty")
    }

    #[test]
    fn endpoint_maps_http_schemes_to_websocket() {
        assert_eq!(
            socket_endpoint("http://localhost:5000").expect("valid").as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_endpoint("https://api.example.com/").expect("valid").as_str(),
            "wss://api.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_endpoint("ws://10.0.0.2:8080/rt").expect("valid").as_str(),
            "ws://10.0.0.2:8080/rt/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn endpoint_rejects_unsupported_urls() {
        assert!(matches!(
            socket_endpoint("ftp://example.com"),
            Err(TransportError::InvalidUrl { .. })
        ));
        assert!(matches!(
            socket_endpoint("not a url"),
            Err(TransportError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn connector_requires_a_runtime() {
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(matches!(
            WsConnector::new("http://localhost:5000", Duration::from_secs(1), tx),
            Err(TransportError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn handshake_events_commands_and_server_disconnect() {
        let url = serve_once(|mut socket| async move {
            write_text(&mut socket, OPEN).await;

            let connect = read_text(&mut socket).await;
            assert_eq!(
                EnginePacket::decode(&connect).expect("connect packet"),
                EnginePacket::Message(SocketPacket::connect(json!({"token": "tok-123"})))
            );

            write_text(&mut socket, r#"42["connection_confirmed",{"status":"ok"}]"#).await;
            write_text(&mut socket, r#"40{"sid":"socket-1"}"#).await;

            let join = read_text(&mut socket).await;
            assert_eq!(
                EnginePacket::decode(&join).expect("event packet"),
                EnginePacket::Message(SocketPacket::event(
                    "join_conversation",
                    json!({"conversation_id": 42})
                ))
            );

            write_text(&mut socket, "2").await;
            assert_eq!(read_text(&mut socket).await, "3");

            write_text(&mut socket, "41").await;
        })
        .await;

        let (mut connector, mut events) = connector(&url);
        let mut link = connector.open(7, &credential()).expect("open");

        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Opened {
                session_id: Some("socket-1".to_owned())
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Event {
                name: "connection_confirmed".to_owned(),
                payload: json!({"status": "ok"}),
            }
        );

        let id = ConversationId::new(42).expect("positive");
        link.send(&ClientCommand::JoinConversation(id))
            .expect("queue join");

        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Closed(DisconnectReason::ServerDisconnect)
        );
    }

    #[tokio::test]
    async fn rejected_connect_reports_error_then_rejection() {
        let url = serve_once(|mut socket| async move {
            write_text(&mut socket, OPEN).await;
            let _ = read_text(&mut socket).await;
            write_text(&mut socket, r#"42["error",{"message":"Invalid token"}]"#).await;
            write_text(&mut socket, r#"44{"message":"Connection rejected by server"}"#).await;
        })
        .await;

        let (mut connector, mut events) = connector(&url);
        let _link = connector.open(7, &credential()).expect("open");

        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Event {
                name: "error".to_owned(),
                payload: json!({"message": "Invalid token"}),
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Rejected {
                payload: json!({"message": "Connection rejected by server"})
            }
        );
        assert!(matches!(
            next_event(&mut events).await,
            TransportEventKind::Closed(DisconnectReason::HandshakeFailed(_))
        ));
    }

    #[tokio::test]
    async fn silent_server_trips_the_heartbeat_window() {
        let url = serve_once(|mut socket| async move {
            write_text(
                &mut socket,
                r#"0{"sid":"engine-1","upgrades":[],"pingInterval":50,"pingTimeout":50}"#,
            )
            .await;
            let _ = read_text(&mut socket).await;
            write_text(&mut socket, "40").await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        })
        .await;

        let (mut connector, mut events) = connector(&url);
        let _link = connector.open(7, &credential()).expect("open");

        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Opened {
                session_id: Some("engine-1".to_owned())
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Closed(DisconnectReason::PingTimeout)
        );
    }

    #[tokio::test]
    async fn close_sends_namespace_disconnect() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let url = serve_once(move |mut socket| async move {
            write_text(&mut socket, OPEN).await;
            let _ = read_text(&mut socket).await;
            write_text(&mut socket, r#"40{"sid":"socket-1"}"#).await;
            let goodbye = read_text(&mut socket).await;
            let _ = seen_tx.send(goodbye);
        })
        .await;

        let (mut connector, mut events) = connector(&url);
        let mut link = connector.open(7, &credential()).expect("open");
        assert!(matches!(
            next_event(&mut events).await,
            TransportEventKind::Opened { .. }
        ));

        link.close();

        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Closed(DisconnectReason::ClientDisconnect)
        );
        let goodbye = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .expect("server saw goodbye")
            .expect("goodbye frame");
        assert_eq!(goodbye, "41");
        assert!(matches!(
            link.send(&ClientCommand::OnlineStatus { is_online: true }),
            Err(TransportError::LinkClosed)
        ));
    }

    #[tokio::test]
    async fn unreachable_server_fails_the_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let (mut connector, mut events) = connector(&format!("http://{addr}"));
        let _link = connector.open(7, &credential()).expect("open");

        assert!(matches!(
            next_event(&mut events).await,
            TransportEventKind::Closed(DisconnectReason::HandshakeFailed(_))
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out_the_handshake() {
        let url = serve_once(|socket| async move {
            let _socket = socket;
            tokio::time::sleep(Duration::from_secs(2)).await;
        })
        .await;

        let (tx, mut events) = mpsc::unbounded_channel();
        let mut connector =
            WsConnector::new(&url, Duration::from_millis(100), tx).expect("connector must build");
        let _link = connector.open(7, &credential()).expect("open");

        match next_event(&mut events).await {
            TransportEventKind::Closed(DisconnectReason::HandshakeFailed(detail)) => {
                assert!(detail.contains("no answer within 100 ms"), "{detail}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn acks_requested_events_and_skips_foreign_namespaces() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let url = serve_once(move |mut socket| async move {
            write_text(&mut socket, OPEN).await;
            let _ = read_text(&mut socket).await;
            write_text(&mut socket, r#"40{"sid":"socket-1"}"#).await;
            write_text(&mut socket, r#"42/admin,["notification",{"title":"admin"}]"#).await;
            write_text(&mut socket, r#"4212["notification",{"title":"x"}]"#).await;
            let ack = read_text(&mut socket).await;
            let _ = seen_tx.send(ack);
            write_text(&mut socket, "41").await;
        })
        .await;

        let (mut connector, mut events) = connector(&url);
        let _link = connector.open(7, &credential()).expect("open");

        assert!(matches!(
            next_event(&mut events).await,
            TransportEventKind::Opened { .. }
        ));
        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Event {
                name: "notification".to_owned(),
                payload: json!({"title": "x"}),
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEventKind::Closed(DisconnectReason::ServerDisconnect)
        );

        let ack = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .expect("server saw ack")
            .expect("ack frame");
        assert_eq!(ack, "4312[]");
    }
}
