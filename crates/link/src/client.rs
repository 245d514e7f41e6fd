use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, Span};
use url::Url;

use common::crypto::{hash_salt, hash_token, shared_secret, PrivateKey, PublicKey};

use crate::codec::Codec;
use crate::config::LinkConfig;
use crate::error::ConnError;
use crate::handshake::{HandshakeRequest, HandshakeResponse};
use crate::transport::{
    websocket_url, HandshakeChannel, HttpChannel, StreamConnector, TransportError, WsConnector,
};

/// Where a connection attempt currently stands
///
/// ```text
/// Idle -> AnnouncementSent -> AwaitingUpgrade -> Connected
///   \___________\__________________\______________> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    AnnouncementSent,
    AwaitingUpgrade,
    Connected,
    Failed,
}

/// Broker assigned details of an established session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// Path the broker mounted this link at
    pub path: String,
    pub version: String,
    /// Broker's long term key, when it sent a valid one
    pub broker_key: Option<PublicKey>,
}

/// An authenticated stream to the broker
///
/// Produced by [`Negotiator::dial`]. What travels over the stream is up to
/// the caller; the negotiated codec is carried along for it.
#[derive(Debug)]
pub struct Connection<S> {
    ds_id: String,
    is_requester: bool,
    is_responder: bool,
    codec: Arc<dyn Codec>,
    key: Arc<PrivateKey>,
    session: Session,
    stream: S,
}

impl<S> Connection<S> {
    pub fn ds_id(&self) -> &str {
        &self.ds_id
    }

    pub fn is_requester(&self) -> bool {
        self.is_requester
    }

    pub fn is_responder(&self) -> bool {
        self.is_responder
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub fn key(&self) -> &Arc<PrivateKey> {
        &self.key
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_stream(self) -> S {
        self.stream
    }
}

/// Drives one link through the broker handshake
///
/// Each call to [`Negotiator::dial`] runs the full sequence:
///
/// 1. POST the capability announcement to the broker
/// 2. Check the broker's reply: chosen format and ephemeral key
/// 3. Derive the auth token from ECDH with the ephemeral key and the salt
/// 4. Open the stream at the broker's upgrade URI with the token attached
///
/// Nothing is retried and nothing is cached between dials; the ephemeral key
/// and salt are new every attempt. Log output goes to the negotiator's span,
/// which callers can replace with [`Negotiator::with_span`].
///
/// # Examples
///
/// ```ignore
/// let mut negotiator = Negotiator::new(config)?;
/// let connection = negotiator.dial().await?;
/// println!("mounted at {}", connection.session().path);
/// ```
pub struct Negotiator<C = HttpChannel, U = WsConnector> {
    config: LinkConfig,
    channel: C,
    connector: U,
    token_param: Option<String>,
    span: Span,
    state: NegotiationState,
}

impl Negotiator {
    /// Negotiator over HTTP and websockets
    pub fn new(config: LinkConfig) -> Result<Self, ConnError> {
        let channel =
            HttpChannel::new(config.handshake_timeout()).map_err(ConnError::HandshakeRequest)?;
        Ok(Self::with_transports(config, channel, WsConnector))
    }
}

impl<C, U> Negotiator<C, U>
where
    C: HandshakeChannel,
    U: StreamConnector,
{
    pub fn with_transports(config: LinkConfig, channel: C, connector: U) -> Self {
        let token_param = config
            .token()
            .map(|token| format!("{}{}", token, hash_token(config.ds_id(), token)));
        let span = tracing::info_span!("link", ds_id = %config.ds_id());
        Self {
            config,
            channel,
            connector,
            token_param,
            span,
            state: NegotiationState::Idle,
        }
    }

    /// Emit this negotiator's events under `span` instead of the default
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Run the handshake and open the stream
    ///
    /// # Errors
    ///
    /// - [`ConnError::HandshakeRequest`] if the announcement cannot be delivered
    /// - [`ConnError::Protocol`] if the broker's reply is unreadable or picks a
    ///   format that was not offered
    /// - [`ConnError::Key`] if the broker's ephemeral key is not a valid point
    /// - [`ConnError::Upgrade`] if the stream cannot be opened
    ///
    /// Any error leaves the negotiator in [`NegotiationState::Failed`] with no
    /// stream open. So does dropping the returned future before it completes.
    pub async fn dial(&mut self) -> Result<Connection<U::Stream>, ConnError> {
        self.state = NegotiationState::Idle;
        let span = self.span.clone();
        let mut attempt = Attempt(&mut *self);
        let result = attempt.0.negotiate().instrument(span).await;
        drop(attempt);
        if let Err(e) = &result {
            tracing::warn!(parent: &self.span, error = %e, "handshake failed");
        }
        result
    }

    async fn negotiate(&mut self) -> Result<Connection<U::Stream>, ConnError> {
        let request = HandshakeRequest::from_config(&self.config);
        let url = self.handshake_url();
        tracing::debug!(
            broker = %self.config.broker(),
            formats = ?request.formats,
            "sending handshake request"
        );
        let body = bounded(
            self.config.handshake_timeout(),
            self.channel.announce(&url, &request),
        )
        .await
        .map_err(ConnError::HandshakeRequest)?;
        self.state = NegotiationState::AnnouncementSent;

        let response: HandshakeResponse = serde_json::from_slice(&body)
            .map_err(|e| ConnError::Protocol(format!("unreadable handshake response: {}", e)))?;
        tracing::debug!(
            id = %response.id,
            path = %response.path,
            format = %response.format,
            "received handshake response"
        );

        let codec = self.config.codecs().get(&response.format).ok_or_else(|| {
            ConnError::Protocol(format!(
                "broker chose format {:?}, offered {:?}",
                response.format, request.formats
            ))
        })?;
        let temp_key = PublicKey::from_base64(&response.temp_key)?;
        self.state = NegotiationState::AwaitingUpgrade;

        let uri = self
            .upgrade_url(&response, &temp_key, codec.name())
            .map_err(ConnError::Upgrade)?;
        tracing::debug!(host = ?uri.host_str(), path = uri.path(), "opening stream");
        let stream = bounded(self.config.upgrade_timeout(), self.connector.connect(&uri))
            .await
            .map_err(ConnError::Upgrade)?;
        self.state = NegotiationState::Connected;
        tracing::info!(path = %response.path, format = codec.name(), "connected to broker");

        let broker_key = match response.public_key.as_str() {
            "" => None,
            text => match PublicKey::from_base64(text) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable broker public key");
                    None
                }
            },
        };

        Ok(Connection {
            ds_id: self.config.ds_id().to_string(),
            is_requester: self.config.is_requester(),
            is_responder: self.config.is_responder(),
            codec,
            key: self.config.key().clone(),
            session: Session {
                id: response.id,
                path: response.path,
                version: response.version,
                broker_key,
            },
            stream,
        })
    }

    fn handshake_url(&self) -> Url {
        let mut url = self.config.broker().clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dsId", self.config.ds_id());
            if let Some(token) = &self.token_param {
                query.append_pair("token", token);
            }
        }
        url
    }

    fn upgrade_url(
        &self,
        response: &HandshakeResponse,
        temp_key: &PublicKey,
        format: &str,
    ) -> Result<Url, TransportError> {
        if response.ws_uri.is_empty() {
            return Err(TransportError::InvalidUri(
                "broker did not supply a stream uri".into(),
            ));
        }
        let joined = self
            .config
            .broker()
            .join(&response.ws_uri)
            .map_err(|e| TransportError::InvalidUri(format!("{:?}: {}", response.ws_uri, e)))?;
        let mut url = websocket_url(joined)?;

        let secret = shared_secret(self.config.key(), temp_key);
        let auth = hash_salt(&response.salt, &secret);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("auth", &auth)
                .append_pair("format", format)
                .append_pair("encoder", format)
                .append_pair("dsId", self.config.ds_id());
            if let Some(token) = &self.token_param {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }
}

/// Marks the negotiator failed on drop unless the attempt got to `Connected`
struct Attempt<'a, C, U>(&'a mut Negotiator<C, U>);

impl<C, U> Drop for Attempt<'_, C, U> {
    fn drop(&mut self) {
        if self.0.state != NegotiationState::Connected {
            self.0.state = NegotiationState::Failed;
        }
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}
