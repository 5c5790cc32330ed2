//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use shard_proxy::config::ProxyConfig;
use shard_proxy::net::PairingTracker;
use shard_proxy::{HttpServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the mock WebSocket backend observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Connected { path: String, protocol: Option<String> },
    Frame(usize),
    Closed(Option<u16>),
}

pub struct WsBackend {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<BackendEvent>,
    pub accepts: Arc<AtomicUsize>,
}

impl WsBackend {
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub async fn next_event(&mut self) -> BackendEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("no backend event within timeout")
            .expect("backend event channel closed")
    }
}

type BackendState = (mpsc::UnboundedSender<BackendEvent>, Arc<AtomicUsize>);

/// Start a WebSocket backend that echoes binary frames.
///
/// A frame reading `close-me` makes it close with code 1000 instead.
pub async fn start_ws_backend() -> WsBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let accepts = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route("/{*path}", get(ws_handler))
        .with_state((tx, Arc::clone(&accepts)));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    WsBackend {
        addr,
        events: rx,
        accepts,
    }
}

async fn ws_handler(
    State((events, accepts)): State<BackendState>,
    uri: Uri,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    accepts.fetch_add(1, Ordering::SeqCst);
    let protocol = headers
        .get("sec-websocket-protocol")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let path = uri.path().to_string();

    ws.protocols(["binary"])
        .on_upgrade(move |socket| echo(socket, path, protocol, events))
}

async fn echo(
    mut socket: WebSocket,
    path: String,
    protocol: Option<String>,
    events: mpsc::UnboundedSender<BackendEvent>,
) {
    let _ = events.send(BackendEvent::Connected { path, protocol });

    let mut close_code = None;
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Binary(data) => {
                let _ = events.send(BackendEvent::Frame(data.len()));
                let reply = if &data[..] == b"close-me" {
                    Message::Close(Some(CloseFrame {
                        code: 1000,
                        reason: "bye".into(),
                    }))
                } else {
                    Message::Binary(data)
                };
                if socket.send(reply).await.is_err() {
                    break;
                }
            }
            Message::Close(frame) => {
                close_code = frame.map(|f| f.code);
                break;
            }
            _ => {}
        }
    }
    let _ = events.send(BackendEvent::Closed(close_code));
}

/// Start an HTTP backend that answers every request with its request line
/// followed by the request body.
pub async fn start_http_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Some((head, body)) = read_request(&mut socket).await else {
                    return;
                };
                let request_line = head.lines().next().unwrap_or_default().to_string();
                let payload = format!("{}\n{}", request_line, body);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-Backend: mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

async fn read_request(socket: &mut TcpStream) -> Option<(String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some((head, body))
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Default configuration pointed at local backends.
///
/// `/tg/wss/2/apiws` renders to `ws://<ws>/kws2/apiws` and
/// `/tg/http/2/apiw1` to `http://<http>/s2/apiw1`.
pub fn proxy_config(ws_backend: SocketAddr, http_backend: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.routes.socket.host_template = format!("ws://{}/kws{{shard}}", ws_backend);
    config.routes.http.host_template = format!("http://{}/s{{shard}}", http_backend);
    config.timeouts.connect_secs = 2;
    config.timeouts.drain_secs = 1;
    config
}

pub struct ProxyHandle {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub pairings: PairingTracker,
    pub task: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

/// Run the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> ProxyHandle {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, shutdown.clone()).unwrap();
    let pairings = server.pairings().clone();
    let (_updates_tx, updates) = mpsc::unbounded_channel();
    let task = tokio::spawn(server.run(listener, updates));

    ProxyHandle {
        addr,
        shutdown,
        pairings,
        task,
    }
}

/// Open a client session through the proxy, requesting the `binary` subprotocol.
pub async fn ws_connect(
    proxy: SocketAddr,
    path: &str,
) -> Result<(WsClient, tungstenite::handshake::client::Response), tungstenite::Error> {
    let mut request = format!("ws://{}{}", proxy, path).into_client_request()?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("binary"));
    tokio_tungstenite::connect_async(request).await
}

/// Status of a refused upgrade.
pub async fn refused_status(proxy: SocketAddr, path: &str) -> u16 {
    match ws_connect(proxy, path).await {
        Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
        Err(e) => panic!("expected an HTTP refusal, got {}", e),
        Ok(_) => panic!("upgrade unexpectedly succeeded"),
    }
}

/// Send `head` as a raw HTTP/1.1 request and return the response status line.
pub async fn raw_status_line(proxy: SocketAddr, head: &str) -> String {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(head.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !buf.windows(2).any(|w| w == b"\r\n") {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .expect("no response within timeout");

    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Next data frame from the proxy.
pub async fn recv_frame(client: &mut WsClient) -> Vec<u8> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no frame within timeout");
        match message {
            Some(Ok(tungstenite::Message::Binary(data))) => return data.to_vec(),
            Some(Ok(tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_))) => continue,
            other => panic!("expected a binary frame, got {:?}", other),
        }
    }
}

/// Wait for the proxy's close frame; returns its code.
pub async fn recv_close(client: &mut WsClient) -> Option<u16> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no close within timeout");
        match message {
            Some(Ok(tungstenite::Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            Some(Ok(tungstenite::Message::Binary(_))) => panic!("frame relayed after close"),
            Some(Ok(_)) => continue,
            other => panic!("stream ended without a close frame: {:?}", other),
        }
    }
}
