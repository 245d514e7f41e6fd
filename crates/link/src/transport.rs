use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::handshake::HandshakeRequest;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid uri: {0}")]
    InvalidUri(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Request/response channel used for the initial announcement
#[async_trait::async_trait]
pub trait HandshakeChannel: Send + Sync {
    /// Send `request` to `url` and return the raw response body
    async fn announce(&self, url: &Url, request: &HandshakeRequest)
        -> Result<Bytes, TransportError>;
}

/// Opens the long lived stream once the broker has accepted the link
#[async_trait::async_trait]
pub trait StreamConnector: Send + Sync {
    type Stream: Send;

    async fn connect(&self, uri: &Url) -> Result<Self::Stream, TransportError>;
}

/// [`HandshakeChannel`] over HTTP POST
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: Client,
}

impl HttpChannel {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HandshakeChannel for HttpChannel {
    async fn announce(
        &self,
        url: &Url,
        request: &HandshakeRequest,
    ) -> Result<Bytes, TransportError> {
        let response = self.client.post(url.clone()).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status, response.text().await?));
        }
        Ok(response.bytes().await?)
    }
}

/// [`StreamConnector`] for `ws://` and `wss://` URIs
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait::async_trait]
impl StreamConnector for WsConnector {
    type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn connect(&self, uri: &Url) -> Result<Self::Stream, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(uri.as_str()).await?;
        tracing::debug!(status = %response.status(), "websocket upgrade accepted");
        Ok(stream)
    }
}

/// Map an HTTP(S) URL onto the matching websocket scheme
pub fn websocket_url(mut url: Url) -> Result<Url, TransportError> {
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidUri(format!(
                "cannot open a stream over {:?}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidUri(format!("cannot switch {} to {}", url, scheme)))?;
    Ok(url)
}
