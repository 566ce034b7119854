#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;

/// Canned response: status and a body of `len` ASCII bytes, sent after `delay_ms`.
#[derive(Clone, Copy, Debug)]
pub struct Canned {
    pub status: u16,
    pub len: usize,
    pub delay_ms: u64,
}

pub const fn canned(status: u16, len: usize) -> Canned {
    Canned {
        status,
        len,
        delay_ms: 0,
    }
}

/// Like [`canned`], but the stub holds the request for `delay_ms` first.
pub const fn delayed(status: u16, len: usize, delay_ms: u64) -> Canned {
    Canned {
        status,
        len,
        delay_ms,
    }
}

#[derive(Clone)]
struct StubState {
    routes: Arc<HashMap<String, Canned>>,
    fallback: Canned,
    hits: Arc<Mutex<Vec<String>>>,
}

/// In-process HTTP target answering from a fixed route table.
pub struct StubTarget {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl StubTarget {
    /// Every request path seen so far, in arrival order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self, path: &str) -> usize {
        self.hits().iter().filter(|p| p.as_str() == path).count()
    }
}

async fn answer(State(state): State<StubState>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    state.hits.lock().unwrap().push(path.clone());
    let c = state.routes.get(&path).copied().unwrap_or(state.fallback);
    if c.delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(c.delay_ms)).await;
    }
    let status = StatusCode::from_u16(c.status).unwrap();
    (status, "x".repeat(c.len)).into_response()
}

/// Spawn a stub on an ephemeral port. `routes` maps exact paths to responses;
/// anything else gets `fallback`.
pub async fn spawn_stub(routes: &[(&str, Canned)], fallback: Canned) -> StubTarget {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        routes: Arc::new(
            routes
                .iter()
                .map(|(p, c)| (p.to_string(), *c))
                .collect(),
        ),
        fallback,
        hits: hits.clone(),
    };
    let app = Router::new().fallback(answer).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    StubTarget {
        base_url: format!("http://{addr}/"),
        hits,
    }
}

/// Spawn a stub whose routes may redirect.
pub async fn spawn_redirect_stub() -> String {
    async fn old() -> Response {
        (StatusCode::FOUND, [(header::LOCATION, "/new")], "").into_response()
    }
    async fn new() -> &'static str {
        "arrived"
    }
    let app = Router::new()
        .route("/old", axum::routing::get(old))
        .route("/new", axum::routing::get(new));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

/// Raw TCP target that answers once with `body` and no Content-Length,
/// delimiting the body by closing the connection.
pub async fn spawn_unsized_body(body: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\n";
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(body.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    format!("http://{addr}/")
}

/// Address with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

/// HTTPS target presenting a self-signed certificate for `localhost`.
/// Every completed handshake gets `200 ok`.
pub async fn spawn_tls_stub() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let cert = include_bytes!("../fixtures/self_signed.crt");
    let key = include_bytes!("../fixtures/self_signed.key");
    let identity = native_tls::Identity::from_pkcs8(cert, key).unwrap();
    let acceptor = tokio_native_tls::TlsAcceptor::from(native_tls::TlsAcceptor::new(identity).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // Clients that reject the certificate abort the handshake here.
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = tls.read(&mut buf).await;
                let _ = tls
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                    .await;
                let _ = tls.shutdown().await;
            });
        }
    });
    format!("https://{addr}/")
}
