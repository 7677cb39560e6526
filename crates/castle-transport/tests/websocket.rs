//! Integration tests for the WebSocket transport: a real listener, a
//! real client, real bytes over loopback.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use castle_transport::{Connection, Transport, WebSocketTransport};
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    /// Binds on an ephemeral port, accepts one connection, and returns
    /// both ends.
    async fn pair() -> (castle_transport::WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let client = connect_client(&addr).await;
        let conn = server.await.expect("accept task should finish");
        (conn, client)
    }

    #[tokio::test]
    async fn test_client_to_server_binary() {
        let (conn, mut client) = pair().await;

        client
            .send(Message::Binary(b"hello".to_vec().into()))
            .await
            .unwrap();

        let received = conn.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some(b"hello".as_slice()));
    }

    #[tokio::test]
    async fn test_text_frames_arrive_as_bytes() {
        let (conn, mut client) = pair().await;

        client
            .send(Message::Text("{\"type\":\"ping\"}".into()))
            .await
            .unwrap();

        let received = conn.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some(b"{\"type\":\"ping\"}".as_slice()));
    }

    #[tokio::test]
    async fn test_server_to_client_binary() {
        let (conn, mut client) = pair().await;

        conn.send(b"broadcast").await.unwrap();

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"broadcast");
    }

    #[tokio::test]
    async fn test_send_while_recv_is_pending() {
        // The whole point of the split halves: a push must go out even
        // though another task is parked inside recv().
        let (conn, mut client) = pair().await;
        let conn = Arc::new(conn);

        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        // Let the reader take the source lock first.
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), conn.send(b"push"))
            .await
            .expect("send must not wait for recv")
            .unwrap();

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"push");

        client
            .send(Message::Binary(b"reply".to_vec().into()))
            .await
            .unwrap();
        let received = reader.await.unwrap().unwrap();
        assert_eq!(received.as_deref(), Some(b"reply".as_slice()));
    }

    #[tokio::test]
    async fn test_client_close_yields_none() {
        let (conn, mut client) = pair().await;

        client.close(None).await.unwrap();

        let received = conn.recv().await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (a, _ca) = pair().await;
        let (b, _cb) = pair().await;
        assert_ne!(a.id(), b.id());
    }
}
