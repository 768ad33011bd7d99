use core::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("hyper {0}")]
    Hyper(#[from] hyper::Error),
    #[error("hyper http {0}")]
    HyperHttp(#[from] hyper::http::Error),
    #[error("io {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base url {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),
    #[error("base url {0} needs an http or https scheme and a host")]
    UnsupportedBaseUrl(String),
    #[error("invalid tls server name {0}")]
    InvalidServerName(String),
    #[error("request did not finish within {0:?}")]
    Timeout(Duration),
}
