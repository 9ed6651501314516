//! Shared utilities for integration tests: raw-TCP mock origins and a relay launcher.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use live_relay::config::RelayConfig;
use live_relay::http::HttpServer;
use live_relay::lifecycle::Shutdown;
use live_relay::realtime::BroadcastHub;
use live_relay::render::{BrowserEngine, RenderOrchestrator};

/// Request line and headers as seen by a mock origin.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What a mock origin answers.
pub enum Reply {
    Full {
        status: u16,
        content_type: &'static str,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    /// Chunked body; the second chunk is held until `release` is notified.
    Chunked {
        content_type: &'static str,
        first: Vec<u8>,
        second: Vec<u8>,
        release: Arc<Notify>,
    },
}

impl Reply {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Reply::Full {
            status: 200,
            content_type,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a response header to a `Full` reply.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Reply::Full { headers, .. } = &mut self {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }
}

pub struct MockOrigin {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockOrigin {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn last_request(&self, path: &str) -> Option<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.path == path)
            .cloned()
    }
}

/// Start a mock origin answering every request through `handler`.
pub async fn start_origin<F>(handler: F) -> MockOrigin
where
    F: Fn(&RecordedRequest) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = requests.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let handler = handler.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut reader = BufReader::new(read);
                let Some(request) = read_request_head(&mut reader).await else {
                    return;
                };
                recorded.lock().unwrap().push(request.clone());

                match handler(&request) {
                    Reply::Full {
                        status,
                        content_type,
                        headers,
                        body,
                    } => {
                        let extra: String = headers
                            .iter()
                            .map(|(name, value)| format!("{}: {}\r\n", name, value))
                            .collect();
                        let head = format!(
                            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n",
                            status,
                            reason(status),
                            content_type,
                            extra,
                            body.len()
                        );
                        let _ = write.write_all(head.as_bytes()).await;
                        let _ = write.write_all(&body).await;
                    }
                    Reply::Chunked {
                        content_type,
                        first,
                        second,
                        release,
                    } => {
                        let head = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                            content_type
                        );
                        let _ = write.write_all(head.as_bytes()).await;
                        let _ = write_chunk(&mut write, &first).await;
                        let _ = write.flush().await;
                        release.notified().await;
                        let _ = write_chunk(&mut write, &second).await;
                        let _ = write.write_all(b"0\r\n\r\n").await;
                    }
                }
                let _ = write.shutdown().await;
            });
        }
    });

    MockOrigin { addr, requests }
}

async fn read_request_head<R>(reader: &mut BufReader<R>) -> Option<RecordedRequest>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Some(RecordedRequest {
        method,
        path,
        headers,
    })
}

async fn write_chunk<W>(write: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    write.write_all(format!("{:x}\r\n", data.len()).as_bytes()).await?;
    write.write_all(data).await?;
    write.write_all(b"\r\n").await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Address on which nothing is listening.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Relay config pointed at `origin`, with no render routes and no metrics exporter.
pub fn test_config(origin: &str) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.origin.base_url = origin.to_string();
    config.origin.transformable_prefix = "/cookieclicker/".into();
    config.render.routes.clear();
    config.observability.metrics_enabled = false;
    config.timeouts.origin_secs = 5;
    config
}

pub struct RunningRelay {
    pub addr: SocketAddr,
    pub render: Arc<RenderOrchestrator>,
    pub hub: BroadcastHub,
    pub shutdown: Shutdown,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for RunningRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    launch(HttpServer::new(config).unwrap()).await
}

pub async fn start_relay_with_engine(
    config: RelayConfig,
    engine: Arc<dyn BrowserEngine>,
) -> RunningRelay {
    launch(HttpServer::with_engine(config, engine).unwrap()).await
}

async fn launch(server: HttpServer) -> RunningRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let render = server.render();
    let hub = server.hub();

    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningRelay {
        addr,
        render,
        hub,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap()
}
