use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::common::{ClientEvent, ServerEvent};
use crate::error::{ChatError, ChatResult};

use super::protocol::{self, Frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Where and how to open the realtime channel.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub socket_url: String,
    pub token: Option<String>,
    pub buffer: usize,
}

/// The single realtime connection of an authenticated session.
///
/// Dropping the handle stops the background task; `disconnect` does the same
/// but says goodbye to the server first.
pub struct ConnectionHandle {
    user_id: String,
    outgoing: mpsc::Sender<ClientEvent>,
    incoming: mpsc::Receiver<ServerEvent>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn emit(&self, event: ClientEvent) -> ChatResult<()> {
        self.outgoing
            .send(event)
            .await
            .map_err(|_| ChatError::Closed)
    }

    /// Next pushed event; `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.incoming.recv().await
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Server side of an in-memory connection.
pub struct ServerEnd {
    pub events: mpsc::Sender<ServerEvent>,
    pub emitted: mpsc::Receiver<ClientEvent>,
}

/// Connection backed by channels instead of a socket. The `join` announcement
/// is queued exactly like `connect` sends it.
pub fn in_memory(user_id: &str, buffer: usize) -> (ConnectionHandle, ServerEnd) {
    let (outgoing_tx, outgoing_rx) = mpsc::channel(buffer.max(1));
    let (incoming_tx, incoming_rx) = mpsc::channel(buffer.max(1));

    if let Err(err) = outgoing_tx.try_send(ClientEvent::Join(user_id.to_string())) {
        log::warn!("Failed to queue join for {user_id}: {err}");
    }

    let handle = ConnectionHandle {
        user_id: user_id.to_string(),
        outgoing: outgoing_tx,
        incoming: incoming_rx,
        task: None,
    };
    let server = ServerEnd {
        events: incoming_tx,
        emitted: outgoing_rx,
    };
    (handle, server)
}

pub fn socket_endpoint(socket_url: &str) -> ChatResult<Url> {
    let mut url = Url::parse(socket_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChatError::Transport(format!(
                "unsupported socket scheme `{other}`"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ChatError::Transport(format!("cannot use scheme {scheme}")))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

/// Open the realtime channel and announce `user_id`.
pub async fn connect(config: &TransportConfig, user_id: &str) -> ChatResult<ConnectionHandle> {
    let endpoint = socket_endpoint(&config.socket_url)?;
    log::info!("Connecting realtime channel to {endpoint}");

    let (mut stream, _) = connect_async(endpoint.as_str()).await?;
    handshake(&mut stream, config.token.as_deref()).await?;

    stream
        .send(WsMessage::Text(
            protocol::encode_event(&ClientEvent::Join(user_id.to_string())).into(),
        ))
        .await?;
    log::info!("Joined realtime channel as {user_id}");

    let (outgoing_tx, outgoing_rx) = mpsc::channel(config.buffer.max(1));
    let (incoming_tx, incoming_rx) = mpsc::channel(config.buffer.max(1));
    let task = tokio::spawn(pump(stream, outgoing_rx, incoming_tx));

    Ok(ConnectionHandle {
        user_id: user_id.to_string(),
        outgoing: outgoing_tx,
        incoming: incoming_rx,
        task: Some(task),
    })
}

/// Close the connection and wait for the background task to finish.
pub async fn disconnect(mut handle: ConnectionHandle) {
    let user_id = handle.user_id.clone();
    let task = handle.task.take();
    drop(handle);

    if let Some(task) = task {
        if let Err(err) = task.await {
            log::debug!("Realtime task for {user_id} ended abnormally: {err}");
        }
    }
    log::info!("Realtime channel for {user_id} closed");
}

async fn handshake(stream: &mut WsStream, token: Option<&str>) -> ChatResult<()> {
    let mut connect_sent = false;

    while let Some(message) = stream.next().await {
        let text = match message? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        match protocol::decode(&text)? {
            Frame::Open(handshake) => {
                log::debug!(
                    "Engine session {} (ping every {} ms)",
                    handshake.sid,
                    handshake.ping_interval
                );
                stream
                    .send(WsMessage::Text(protocol::encode_connect(token).into()))
                    .await?;
                connect_sent = true;
            }
            Frame::Ping => stream.send(WsMessage::Text(protocol::PONG.into())).await?,
            Frame::Connected if connect_sent => return Ok(()),
            Frame::ConnectError(reason) => return Err(ChatError::Forbidden(reason)),
            other => log::debug!("Ignoring frame during handshake: {other:?}"),
        }
    }

    Err(ChatError::Transport(
        "connection closed during handshake".to_string(),
    ))
}

/// How the reading half stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// The server closed the socket or the stream failed.
    Closed,
    /// The handle went away; the writer still says goodbye.
    Abandoned,
}

/// Drive both directions of the socket.
///
/// Reading and writing are polled side by side, so a full `incoming` queue
/// never holds back frames the session is waiting to emit.
async fn pump(
    stream: WsStream,
    outgoing: mpsc::Receiver<ClientEvent>,
    incoming: mpsc::Sender<ServerEvent>,
) {
    let (sink, source) = stream.split();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let writer = write_frames(sink, outgoing, control_rx);
    tokio::pin!(writer);

    tokio::select! {
        _ = &mut writer => {}
        ended = read_frames(source, incoming, control_tx) => {
            if ended == ReadEnd::Abandoned {
                writer.await;
            }
        }
    }
}

async fn write_frames(
    mut sink: WsSink,
    mut outgoing: mpsc::Receiver<ClientEvent>,
    mut control: mpsc::UnboundedReceiver<&'static str>,
) {
    loop {
        let frame = tokio::select! {
            event = outgoing.recv() => match event {
                Some(event) => protocol::encode_event(&event),
                None => {
                    // Handle dropped: leave the namespace and close the socket.
                    let goodbye = WsMessage::Text(protocol::DISCONNECT.into());
                    if let Err(err) = sink.send(goodbye).await {
                        log::debug!("Failed to send disconnect packet: {err}");
                    }
                    if let Err(err) = sink.close().await {
                        log::debug!("Failed to close websocket: {err}");
                    }
                    return;
                }
            },
            Some(frame) = control.recv() => frame.to_string(),
        };

        if let Err(err) = sink.send(WsMessage::Text(frame)).await {
            log::warn!("Failed to write to realtime channel: {err}");
            return;
        }
    }
}

async fn read_frames(
    mut source: WsSource,
    incoming: mpsc::Sender<ServerEvent>,
    control: mpsc::UnboundedSender<&'static str>,
) -> ReadEnd {
    while let Some(message) = source.next().await {
        let text = match message {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                log::warn!("Realtime channel error: {err}");
                return ReadEnd::Closed;
            }
        };

        match protocol::decode(&text) {
            Ok(Frame::Ping) => {
                if control.send(protocol::PONG).is_err() {
                    return ReadEnd::Closed;
                }
            }
            Ok(Frame::Event(event)) => {
                if incoming.send(event).await.is_err() {
                    return ReadEnd::Abandoned;
                }
            }
            Ok(Frame::Close) | Ok(Frame::Disconnected) => {
                log::warn!("Server ended the realtime session");
                return ReadEnd::Closed;
            }
            Ok(Frame::Unhandled(what)) => log::debug!("Skipping {what}"),
            Ok(other) => log::debug!("Ignoring frame {other:?}"),
            Err(err) => log::warn!("Dropping malformed frame: {err}"),
        }
    }

    log::warn!("Realtime channel closed by server");
    ReadEnd::Closed
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    use super::*;

    pub(crate) type ServerSocket = WebSocketStream<TcpStream>;

    /// Local socket server; the task yields the first accepted connection.
    pub(crate) async fn listen() -> (String, JoinHandle<ServerSocket>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let accepted = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            accept_async(tcp).await.unwrap()
        });
        (url, accepted)
    }

    pub(crate) async fn next_text(socket: &mut ServerSocket) -> Option<String> {
        while let Some(message) = socket.next().await {
            match message.ok()? {
                WsMessage::Text(text) => return Some(text),
                WsMessage::Close(_) => return None,
                _ => continue,
            }
        }
        None
    }

    /// Server side of the open handshake. Returns the client's CONNECT packet.
    pub(crate) async fn accept_session(socket: &mut ServerSocket) -> String {
        socket
            .send(WsMessage::Text(
                r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#.into(),
            ))
            .await
            .unwrap();
        let connect = next_text(socket).await.unwrap();
        socket
            .send(WsMessage::Text(r#"40{"sid":"n1"}"#.into()))
            .await
            .unwrap();
        connect
    }

    fn config(socket_url: &str, token: Option<&str>, buffer: usize) -> TransportConfig {
        TransportConfig {
            socket_url: socket_url.to_string(),
            token: token.map(str::to_string),
            buffer,
        }
    }

    async fn connected(
        token: Option<&str>,
        buffer: usize,
    ) -> (ConnectionHandle, ServerSocket, String) {
        let (url, accepted) = listen().await;
        let config = config(&url, token, buffer);
        let connecting = tokio::spawn(async move { connect(&config, "u1").await });

        let mut socket = accepted.await.unwrap();
        let connect_packet = accept_session(&mut socket).await;
        let handle = match connecting.await.unwrap() {
            Ok(handle) => handle,
            Err(err) => panic!("connect failed: {err}"),
        };
        assert_eq!(next_text(&mut socket).await.as_deref(), Some(r#"42["join","u1"]"#));
        (handle, socket, connect_packet)
    }

    #[test]
    fn builds_socket_endpoint_from_http_base() {
        let url = socket_endpoint("https://hotel.example.com/api").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://hotel.example.com/socket.io/?EIO=4&transport=websocket"
        );

        let url = socket_endpoint("http://localhost:5000").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert!(socket_endpoint("ftp://nope").is_err());
    }

    #[tokio::test]
    async fn handshake_carries_token_and_announces_user() {
        let (handle, _socket, connect_packet) = connected(Some("secret"), 8).await;
        assert_eq!(connect_packet, r#"40{"token":"secret"}"#);
        assert_eq!(handle.user_id(), "u1");

        let (_handle, _socket, connect_packet) = connected(None, 8).await;
        assert_eq!(connect_packet, "40");
    }

    #[tokio::test]
    async fn answers_pings_and_relays_both_ways() {
        let (mut handle, mut socket, _) = connected(None, 8).await;

        socket.send(WsMessage::Text("2".into())).await.unwrap();
        assert_eq!(next_text(&mut socket).await.as_deref(), Some("3"));

        socket
            .send(WsMessage::Text(r#"42["onlineUsers",["u1","u2"]]"#.into()))
            .await
            .unwrap();
        assert_eq!(
            handle.next_event().await,
            Some(ServerEvent::OnlineUsers(vec!["u1".into(), "u2".into()]))
        );

        handle
            .emit(ClientEvent::MarkAsRead {
                receiver_id: "u1".into(),
                sender_id: "u2".into(),
            })
            .await
            .unwrap();
        let frame = next_text(&mut socket).await.unwrap();
        assert!(frame.starts_with(r#"42["markAsRead""#), "got {frame}");

        disconnect(handle).await;
        assert_eq!(next_text(&mut socket).await.as_deref(), Some(protocol::DISCONNECT));
        assert_eq!(next_text(&mut socket).await, None);
    }

    #[tokio::test]
    async fn connect_error_is_forbidden() {
        let (url, accepted) = listen().await;
        let config = config(&url, Some("expired"), 8);
        let connecting = tokio::spawn(async move { connect(&config, "u1").await });

        let mut socket = accepted.await.unwrap();
        socket
            .send(WsMessage::Text(r#"0{"sid":"s1","pingInterval":25000}"#.into()))
            .await
            .unwrap();
        assert!(next_text(&mut socket).await.unwrap().starts_with("40"));
        socket
            .send(WsMessage::Text(r#"44{"message":"invalid token"}"#.into()))
            .await
            .unwrap();

        match connecting.await.unwrap() {
            Err(ChatError::Forbidden(reason)) => assert_eq!(reason, "invalid token"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("connect succeeded after a connect error"),
        }
    }

    #[tokio::test]
    async fn server_close_ends_event_stream() {
        let (mut handle, mut socket, _) = connected(None, 8).await;
        socket.close(None).await.unwrap();

        let ended = timeout(Duration::from_secs(2), handle.next_event()).await;
        assert_eq!(ended.unwrap(), None);
    }

    #[tokio::test]
    async fn unread_events_do_not_hold_back_emits() {
        let (handle, mut socket, _) = connected(None, 1).await;

        for _ in 0..50 {
            socket
                .send(WsMessage::Text(r#"42["onlineUsers",["u2"]]"#.into()))
                .await
                .unwrap();
        }

        // Nobody reads events; emits must still reach the server.
        let emits = async {
            for _ in 0..20 {
                handle
                    .emit(ClientEvent::MarkAsRead {
                        receiver_id: "u1".into(),
                        sender_id: "u2".into(),
                    })
                    .await
                    .unwrap();
            }
        };
        let received = async {
            let mut count = 0;
            while count < 20 {
                let frame = next_text(&mut socket).await.unwrap();
                if frame.starts_with(r#"42["markAsRead""#) {
                    count += 1;
                }
            }
            count
        };

        let (_, count) = timeout(Duration::from_secs(5), async { tokio::join!(emits, received) })
            .await
            .expect("emits stalled behind unread events");
        assert_eq!(count, 20);
    }

    #[tokio::test]
    async fn in_memory_handle_announces_and_relays() {
        let (mut handle, mut server) = in_memory("u1", 8);
        assert_eq!(
            server.emitted.recv().await,
            Some(ClientEvent::Join("u1".into()))
        );

        handle
            .emit(ClientEvent::MarkAsRead {
                receiver_id: "u1".into(),
                sender_id: "u2".into(),
            })
            .await
            .unwrap();
        assert!(matches!(
            server.emitted.recv().await,
            Some(ClientEvent::MarkAsRead { .. })
        ));

        server
            .events
            .send(ServerEvent::OnlineUsers(vec!["u1".into()]))
            .await
            .unwrap();
        assert_eq!(
            handle.next_event().await,
            Some(ServerEvent::OnlineUsers(vec!["u1".into()]))
        );

        drop(server);
        assert_eq!(handle.next_event().await, None);
        assert!(handle.emit(ClientEvent::Join("u1".into())).await.is_err());
    }
}
