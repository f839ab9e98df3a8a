//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use edge_proxy::config::{HealthCheckConfig, PoolConfig, ProxyConfig, RouteConfig};
use edge_proxy::health::HealthState;
use edge_proxy::{EdgeServer, Entrypoints, Registry, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Read until the end of the request head. Returns the head as text.
async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn respond(socket: &mut TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a programmable mock backend. The closure sees the request head and
/// returns the status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let (status, body) = f(head).await;
                respond(&mut socket, status, &body).await;
            });
        }
    });

    addr
}

/// Start a mock backend that answers every request with 200 and `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Start a mock backend that returns the request head it received as the body.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|head| async move { (200, head) }).await
}

/// Start a mock backend that waits `delay` before answering with `body`.
pub async fn start_slow_backend(delay: Duration, body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, body.to_string())
    })
    .await
}

/// Start a backend that sends its headers and half of a 10-byte body, then
/// stalls for `stall` before sending the rest.
pub async fn start_stalling_backend(stall: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(b"hello").await;
                let _ = socket.flush().await;
                tokio::time::sleep(stall).await;
                let _ = socket.write_all(b"world").await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// A pool without health checks: its instances are routable immediately.
pub fn pool(id: &str, instances: &[SocketAddr]) -> PoolConfig {
    PoolConfig {
        id: id.into(),
        instances: instances.iter().map(|a| a.to_string()).collect(),
        balancer: Default::default(),
        health_check: HealthCheckConfig {
            enabled: false,
            ..Default::default()
        },
        depends_on: vec![],
    }
}

pub fn route(name: &str, hosts: &[&str], path_prefixes: &[&str], pool: &str) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        hosts: hosts.iter().map(|s| s.to_string()).collect(),
        path_prefixes: path_prefixes.iter().map(|s| s.to_string()).collect(),
        entrypoint: Default::default(),
        pool: pool.into(),
    }
}

/// A config listening on ephemeral ports with metrics off.
pub fn base_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.admin.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config.shutdown.grace_secs = 1;
    config
}

/// A running proxy.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    pub registry: Arc<Registry>,
    pub updates: mpsc::UnboundedSender<ProxyConfig>,
    pub shutdown: Shutdown,
    pub task: tokio::task::JoinHandle<()>,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig) -> Self {
        let entrypoints = Entrypoints::bind(&config).await.unwrap();
        let addr = entrypoints.http_addr().unwrap();
        let admin_addr = entrypoints.admin_addr();

        let server = EdgeServer::new(config).unwrap();
        let registry = server.registry().clone();
        let (updates, config_updates) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();

        let task = tokio::spawn(async move {
            let _ = server.run(entrypoints, config_updates, server_shutdown).await;
        });

        Self {
            addr,
            admin_addr,
            registry,
            updates,
            shutdown,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!("http://{}{}", self.admin_addr.unwrap(), path)
    }

    pub fn health_of(&self, pool: &str, address: SocketAddr) -> Option<HealthState> {
        let table = self.registry.snapshot();
        let instance = table.pool(pool)?.find(&address.to_string())?;
        Some(instance.health())
    }

    pub fn active_requests(&self, pool: &str, address: SocketAddr) -> Option<usize> {
        let table = self.registry.snapshot();
        let instance = table.pool(pool)?.find(&address.to_string())?;
        Some(instance.active_requests())
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.task).await;
    }
}

/// A client that opens a fresh connection per request.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `condition` every 50ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
