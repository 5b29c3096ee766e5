//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real WebSocket listener and a `tokio-tungstenite`
//! client to verify that bytes, heartbeats, refusals, and handshake
//! metadata actually cross the network.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use hearth_transport::{
        CloseReason, Connection, Handshake, Received, Transport, Upgrade,
        WebSocketConnection, WebSocketTransport,
    };
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    const LIMIT: usize = 512;

    /// Connects a client, optionally presenting an `authorization` header.
    async fn try_connect(
        addr: &str,
        auth: Option<&str>,
    ) -> Result<ClientWs, WsError> {
        let mut request = format!("ws://{addr}/ws")
            .into_client_request()
            .expect("valid request");
        if let Some(auth) = auth {
            request.headers_mut().insert(
                "authorization",
                HeaderValue::from_str(auth).expect("valid header"),
            );
        }
        tokio_tungstenite::connect_async(request)
            .await
            .map(|(ws, _)| ws)
    }

    async fn connect_client(addr: &str, auth: Option<&str>) -> ClientWs {
        try_connect(addr, auth).await.expect("client should connect")
    }

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    /// Accepts one peer on a background task and upgrades it unconditionally.
    fn serve_one(
        mut transport: WebSocketTransport,
        max_message_size: usize,
    ) -> JoinHandle<(WebSocketConnection, Handshake)> {
        tokio::spawn(async move {
            let mut upgrade = transport.accept().await.expect("should accept");
            let handshake = upgrade.read_request().await.expect("valid request");
            let conn = upgrade
                .accept(max_message_size)
                .await
                .expect("should upgrade");
            (conn, handshake)
        })
    }

    async fn pair(max_message_size: usize) -> (WebSocketConnection, ClientWs) {
        let (transport, addr) = bind().await;
        let server = serve_one(transport, max_message_size);
        let client = connect_client(&addr, None).await;
        let (conn, _) = server.await.expect("task should complete");
        (conn, client)
    }

    // =====================================================================
    // Upgrade
    // =====================================================================

    #[tokio::test]
    async fn test_read_request_captures_authorization_header() {
        let (transport, addr) = bind().await;
        let server = serve_one(transport, LIMIT);

        let _client = connect_client(&addr, Some("7:secret")).await;
        let (conn, handshake) = server.await.expect("task should complete");

        assert!(conn.id().into_inner() > 0);
        assert_eq!(handshake.authorization.as_deref(), Some("7:secret"));
    }

    #[tokio::test]
    async fn test_read_request_without_header_reports_none() {
        let (transport, addr) = bind().await;
        let server = serve_one(transport, LIMIT);

        let _client = connect_client(&addr, None).await;
        let (_conn, handshake) = server.await.expect("task should complete");

        assert!(handshake.authorization.is_none());
    }

    #[tokio::test]
    async fn test_refuse_answers_401_before_upgrade() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            let mut upgrade = transport.accept().await.expect("should accept");
            let handshake = upgrade.read_request().await.expect("valid request");
            upgrade.refuse().await.expect("refuse");
            handshake
        });

        let result = try_connect(&addr, Some("1:wrong")).await;
        match result {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            }
            Err(other) => panic!("expected an HTTP refusal, got {other:?}"),
            Ok(_) => panic!("upgrade should have been refused"),
        }
        let handshake = server.await.expect("task should complete");
        assert_eq!(handshake.authorization.as_deref(), Some("1:wrong"));
    }

    #[tokio::test]
    async fn test_read_request_rejects_plain_http() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            let mut upgrade = transport.accept().await.expect("should accept");
            upgrade.read_request().await
        });

        let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();

        assert!(response.starts_with(b"HTTP/1.1 400"));
        assert!(server.await.unwrap().is_err());
    }

    // =====================================================================
    // Connection
    // =====================================================================

    #[tokio::test]
    async fn test_send_and_receive_binary() {
        let (conn, mut client) = pair(LIMIT).await;

        conn.send(b"hello from server").await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .expect("client send");
        let received = conn.recv().await.expect("recv");
        assert_eq!(
            received,
            Some(Received::Data(b"hello from client".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_ping_is_answered_with_heartbeat() {
        let (conn, mut client) = pair(LIMIT).await;

        conn.ping().await.expect("ping");
        let msg = client.next().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Ping(_)));

        // Writing flushes the queued pong alongside this payload.
        client
            .send(Message::Binary(b"ack".to_vec().into()))
            .await
            .expect("client send");

        let mut seen = Vec::new();
        for _ in 0..2 {
            let item = tokio::time::timeout(Duration::from_secs(2), conn.recv())
                .await
                .expect("recv should not time out")
                .expect("recv")
                .expect("connection open");
            seen.push(item);
        }
        assert!(seen.contains(&Received::Heartbeat));
        assert!(seen.contains(&Received::Data(b"ack".to_vec())));
    }

    #[tokio::test]
    async fn test_client_close_yields_none() {
        let (conn, mut client) = pair(LIMIT).await;

        client.close(None).await.expect("client close");
        let received = conn.recv().await.expect("recv");
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn test_oversized_message_is_refused_while_reading() {
        let (conn, mut client) = pair(16).await;

        client
            .send(Message::Binary(vec![7u8; 4096].into()))
            .await
            .expect("client send");

        let received = tokio::time::timeout(Duration::from_secs(2), conn.recv())
            .await
            .expect("recv should not time out")
            .expect("recv");
        assert_eq!(received, Some(Received::Oversized(4096)));

        conn.close(CloseReason::TooLarge).await.expect("close");
        match client.next().await.unwrap().unwrap() {
            Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Size),
            other => panic!("expected a size close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_normal_close_has_no_code() {
        let (conn, mut client) = pair(LIMIT).await;

        conn.close(CloseReason::Normal).await.expect("close");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg, Message::Close(None));
    }
}
