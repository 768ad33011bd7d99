//! An in-process stand-in for the booking backend, served over real HTTP/1.1.

use core::convert::Infallible;
use core::time::Duration;
use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Clone, Debug)]
struct Reply {
    status: StatusCode,
    body: String,
    delay: Duration,
}

/// A request the backend received.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

#[derive(Default)]
struct State {
    replies: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl State {
    /// Replies are consumed in order, the last one is repeated.
    fn next_reply(&self, method: &Method, path: &str) -> Option<Reply> {
        let mut replies = lock(&self.replies);
        let queue = replies.get_mut(&(method.clone(), path.to_owned()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

async fn handle(state: Arc<State>, request: Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!("failed to read request body: {err}");
            Bytes::new()
        }
    };
    let path = parts.uri.path().to_owned();
    debug!(method = %parts.method, %path, "mock backend request");
    let reply = state.next_reply(&parts.method, &path);
    lock(&state.requests).push(RecordedRequest {
        method: parts.method,
        path,
        headers: parts.headers,
        body,
    });

    let reply = reply.unwrap_or_else(|| Reply {
        status: StatusCode::NOT_FOUND,
        body: r#"{"message":"no such route"}"#.to_owned(),
        delay: Duration::ZERO,
    });
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let mut response = Response::new(Full::new(Bytes::from(reply.body)));
    *response.status_mut() = reply.status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/json"));
    response
}

/// Serves queued JSON replies on a random local port until dropped.
pub struct MockBackend {
    address: SocketAddr,
    state: Arc<State>,
    server: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).await?;
        let address = listener.local_addr()?;
        let state = Arc::new(State::default());

        let server_state = Arc::clone(&state);
        let server = tokio::spawn(async move {
            loop {
                let socket = match listener.accept().await {
                    Ok((socket, _)) => socket,
                    Err(err) => {
                        error!("failed to accept connection: {err}");
                        break;
                    }
                };
                let state = Arc::clone(&server_state);
                tokio::spawn(async move {
                    let service = service_fn(move |request: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, Infallible>(handle(state, request).await) }
                    });
                    if let Err(err) = http1::Builder::new()
                        .serve_connection(TokioIo::new(socket), service)
                        .await
                    {
                        error!("failed to serve connection: {err:#}");
                    }
                });
            }
        });
        debug!(%address, "mock backend listening");
        Ok(Self {
            address,
            state,
            server,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn respond(&self, method: Method, path: &str, status: StatusCode, body: impl Into<String>) {
        self.respond_after(method, path, status, body, Duration::ZERO);
    }

    /// Like [`Self::respond`] but the reply is held back for `delay`.
    pub fn respond_after(
        &self,
        method: Method,
        path: &str,
        status: StatusCode,
        body: impl Into<String>,
        delay: Duration,
    ) {
        lock(&self.state.replies)
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(Reply {
                status,
                body: body.into(),
                delay,
            });
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}
