pub mod error;

use core::future::Future;
use core::time::Duration;
use std::sync::Arc;

use bytes::Bytes;
pub use error::HttpError;
use http_body_util::{BodyExt as _, Full};
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST};
pub use hyper::{Method, StatusCode};
use hyper::{Request, Uri};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

const IDEMPOTENCY_KEY: &str = "idempotency-key";

/// A request against the booking backend, relative to the configured base url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub bearer_token: Option<String>,
    pub idempotency_key: Option<String>,
    pub body: Option<Bytes>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            bearer_token: None,
            idempotency_key: None,
            body: None,
        }
    }

    /// `body` must already be serialized JSON.
    pub fn post_json(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            bearer_token: None,
            idempotency_key: None,
            body: Some(body.into()),
        }
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Anything that can carry an [`ApiRequest`] to the backend.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, HttpError>> + Send;
}

#[derive(Debug, Clone)]
struct BaseUrl {
    host: String,
    port: u16,
    authority: String,
    path_prefix: String,
    tls: bool,
}

impl BaseUrl {
    fn parse(input: &str) -> Result<Self, HttpError> {
        let uri: Uri = input.parse()?;
        let tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            _ => return Err(HttpError::UnsupportedBaseUrl(input.to_owned())),
        };
        let Some(authority) = uri.authority() else {
            return Err(HttpError::UnsupportedBaseUrl(input.to_owned()));
        };
        Ok(Self {
            host: authority.host().to_owned(),
            port: authority.port_u16().unwrap_or(if tls { 443 } else { 80 }),
            authority: authority.as_str().to_owned(),
            path_prefix: uri.path().trim_end_matches('/').to_owned(),
            tls,
        })
    }
}

/// HTTP/1.1 client with one connection per request, like a browser `fetch` without keep-alive.
#[derive(Clone)]
pub struct HttpClient {
    base: BaseUrl,
    timeout: Duration,
    tls: Option<TlsConnector>,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpError> {
        let base = BaseUrl::parse(base_url)?;
        let tls = base.tls.then(|| {
            let mut root_cert_store = RootCertStore::empty();
            root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let config = ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth();
            TlsConnector::from(Arc::new(config))
        });
        Ok(Self { base, timeout, tls })
    }

    fn build_request(&self, request: ApiRequest) -> Result<Request<Full<Bytes>>, HttpError> {
        let path = if request.path.starts_with('/') {
            format!("{}{}", self.base.path_prefix, request.path)
        } else {
            format!("{}/{}", self.base.path_prefix, request.path)
        };
        let mut builder = Request::builder()
            .method(request.method)
            .uri(path)
            .header(HOST, self.base.authority.as_str())
            .header(ACCEPT, "application/json");
        if let Some(token) = request.bearer_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(key) = request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY, key);
        }
        let body = match request.body {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                body
            }
            None => Bytes::new(),
        };
        Ok(builder.body(Full::new(body))?)
    }

    async fn send_without_timeout(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let request = self.build_request(request)?;
        debug!(method = %request.method(), uri = %request.uri(), "sending request");

        let addr = format!("{}:{}", self.base.host, self.base.port);
        let stream = TcpStream::connect(addr).await?;

        let response = match &self.tls {
            Some(connector) => {
                let server_name = ServerName::try_from(self.base.host.clone())
                    .map_err(|_| HttpError::InvalidServerName(self.base.host.clone()))?;
                let stream = connector.connect(server_name, stream).await?;
                exchange(stream, request).await?
            }
            None => exchange(stream, request).await?,
        };
        debug!(status = %response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }
}

async fn exchange<IO>(stream: IO, request: Request<Full<Bytes>>) -> Result<ApiResponse, HttpError>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::task::spawn(async move {
        if let Err(error) = conn.await {
            trace!("connection closed with {error}");
        }
    });

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok(ApiResponse { status, body })
}

impl Transport for HttpClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        tokio::time::timeout(self.timeout, self.send_without_timeout(request))
            .await
            .map_err(|_| HttpError::Timeout(self.timeout))?
    }
}
