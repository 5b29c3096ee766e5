//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The HTTP side of the upgrade is handled here rather than inside
//! tungstenite's handshake, whose request callback is synchronous. The
//! request head is parsed with `httparse`, the caller decides, and only an
//! accepted peer is answered with `101` and wrapped in a
//! [`WebSocketStream`](tokio_tungstenite::WebSocketStream).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role, WebSocketConfig};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{
    CloseReason, Connection, ConnectionId, Handshake, Received, Transport,
    TransportError, Upgrade,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Largest request head accepted before the peer is dropped.
const MAX_REQUEST_HEAD: usize = 8 * 1024;
const MAX_HEADERS: usize = 32;

const UNAUTHORIZED: &[u8] =
    b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
const BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::Bind {
                addr: addr.to_owned(),
                source,
            }
        })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Upgrade = WebSocketUpgrade;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Upgrade, Self::Error> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer_addr, "accepted TCP connection");
        Ok(WebSocketUpgrade {
            id,
            peer_addr,
            stream,
            buf: Vec::new(),
            head_len: 0,
            accept_key: None,
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// An accepted TCP peer that has not been upgraded yet.
pub struct WebSocketUpgrade {
    id: ConnectionId,
    peer_addr: SocketAddr,
    stream: TcpStream,
    /// Everything read so far. Bytes past `head_len` already belong to the
    /// WebSocket stream.
    buf: Vec<u8>,
    head_len: usize,
    accept_key: Option<String>,
}

/// The parts of an upgrade request the server cares about.
struct RequestHead {
    len: usize,
    key: String,
    authorization: Option<String>,
}

impl WebSocketUpgrade {
    fn failed(&self, reason: impl Into<String>) -> TransportError {
        TransportError::Upgrade {
            peer: self.peer_addr,
            reason: reason.into(),
        }
    }

    /// Tries to parse a complete request head out of `buf`.
    fn parse_head(buf: &[u8]) -> Result<Option<RequestHead>, String> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut request = httparse::Request::new(&mut headers);
        let len = match request.parse(buf) {
            Ok(httparse::Status::Complete(len)) => len,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(e) => return Err(e.to_string()),
        };

        if request.method != Some("GET") {
            return Err("upgrade must be a GET".into());
        }
        let header = |name: &str| {
            request
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .and_then(|h| std::str::from_utf8(h.value).ok())
                .map(str::trim)
        };

        if !header("upgrade").is_some_and(|v| v.eq_ignore_ascii_case("websocket")) {
            return Err("missing `upgrade: websocket`".into());
        }
        if header("sec-websocket-version") != Some("13") {
            return Err("unsupported websocket version".into());
        }
        let key = header("sec-websocket-key")
            .ok_or("missing sec-websocket-key")?
            .to_owned();
        let authorization = header("authorization").map(str::to_owned);

        Ok(Some(RequestHead {
            len,
            key,
            authorization,
        }))
    }

    async fn answer(&mut self, response: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(response)
            .await
            .map_err(|e| self.failed(e.to_string()))?;
        // The peer may already be gone; the answer was written.
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

impl Upgrade for WebSocketUpgrade {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    async fn read_request(&mut self) -> Result<Handshake, Self::Error> {
        let mut chunk = [0u8; 1024];
        let head = loop {
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(|e| self.failed(e.to_string()))?;
            if n == 0 {
                return Err(self.failed("peer closed before the request was complete"));
            }
            self.buf.extend_from_slice(&chunk[..n]);

            match Self::parse_head(&self.buf) {
                Ok(Some(head)) => break head,
                Ok(None) if self.buf.len() < MAX_REQUEST_HEAD => continue,
                Ok(None) => {
                    self.answer(BAD_REQUEST).await?;
                    return Err(self.failed("request head too large"));
                }
                Err(reason) => {
                    self.answer(BAD_REQUEST).await?;
                    return Err(self.failed(reason));
                }
            }
        };

        self.head_len = head.len;
        self.accept_key = Some(derive_accept_key(head.key.as_bytes()));
        Ok(Handshake {
            peer_addr: self.peer_addr,
            authorization: head.authorization,
        })
    }

    async fn accept(
        mut self,
        max_message_size: usize,
    ) -> Result<Self::Connection, Self::Error> {
        let Some(accept_key) = self.accept_key.take() else {
            return Err(self.failed("accepted before the request was read"));
        };
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Accept: {accept_key}\r\n\r\n"
        );
        self.stream
            .write_all(response.as_bytes())
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        let config = WebSocketConfig::default()
            .max_message_size(Some(max_message_size))
            .max_frame_size(Some(max_message_size));
        let leftover = self.buf.split_off(self.head_len);
        let ws = WebSocketStream::from_partially_read(
            self.stream,
            leftover,
            Role::Server,
            Some(config),
        )
        .await;
        tracing::debug!(id = %self.id, peer_addr = %self.peer_addr, "upgraded to WebSocket");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id: self.id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    async fn refuse(mut self) -> Result<(), Self::Error> {
        tracing::debug!(id = %self.id, peer_addr = %self.peer_addr, "upgrade refused");
        self.answer(UNAUTHORIZED).await
    }
}

/// A single WebSocket connection with independently locked read and write
/// halves.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.write(Message::Binary(data.to_vec().into())).await
    }

    async fn recv(&self) -> Result<Option<Received>, Self::Error> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Received::Data(data.into())));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Received::Data(
                        text.as_bytes().to_vec(),
                    )));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    return Ok(Some(Received::Heartbeat));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(WsError::Capacity(CapacityError::MessageTooLong {
                    size,
                    ..
                }))) => {
                    return Ok(Some(Received::Oversized(size)));
                }
                Some(Err(e)) => {
                    return Err(TransportError::Receive(e.to_string()));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.write(Message::Ping(Vec::new().into())).await
    }

    async fn close(&self, reason: CloseReason) -> Result<(), Self::Error> {
        let frame = match reason {
            CloseReason::Normal => None,
            CloseReason::TooLarge => Some(CloseFrame {
                code: CloseCode::Size,
                reason: "message too large".to_owned().into(),
            }),
        };
        self.write(Message::Close(frame)).await
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
