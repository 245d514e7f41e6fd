use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use common::crypto::PrivateKey;

use crate::codec::{Codec, CodecRegistry};

/// Length static tokens are cut to before hashing
pub const TOKEN_LENGTH: usize = 16;
/// Handshake protocol version sent in the announcement
pub const PROTOCOL_VERSION: &str = "1.1.2";
/// Default limit for each of the two blocking handshake steps
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no broker address configured")]
    MissingBroker,
    #[error("invalid broker address {url:?}: {source}")]
    InvalidBroker {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported broker scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("no link name configured")]
    MissingName,
    #[error("no identity key configured")]
    MissingKey,
    #[error("no message encodings registered")]
    NoCodecs,
}

/// Validated, immutable connection parameters
///
/// Built once through [`LinkConfig::builder`]; every check happens in
/// [`LinkConfigBuilder::build`] so a `LinkConfig` is always usable.
///
/// # Examples
///
/// ```ignore
/// let config = LinkConfig::builder()
///     .broker("http://localhost:8080/conn")
///     .name("my-link-")
///     .key(Arc::new(key))
///     .responder()
///     .codec(Arc::new(JsonCodec))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct LinkConfig {
    broker: Url,
    name: String,
    ds_id: String,
    key: Arc<PrivateKey>,
    token: Option<String>,
    is_requester: bool,
    is_responder: bool,
    codecs: CodecRegistry,
    link_data: Map<String, Value>,
    handshake_timeout: Duration,
    upgrade_timeout: Duration,
    compression: bool,
}

impl LinkConfig {
    pub fn builder() -> LinkConfigBuilder {
        LinkConfigBuilder::default()
    }

    pub fn broker(&self) -> &Url {
        &self.broker
    }

    /// Link name, used as the dsId prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ds_id(&self) -> &str {
        &self.ds_id
    }

    pub fn key(&self) -> &Arc<PrivateKey> {
        &self.key
    }

    /// Normalized static token, if one is in effect
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_requester(&self) -> bool {
        self.is_requester
    }

    pub fn is_responder(&self) -> bool {
        self.is_responder
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn link_data(&self) -> &Map<String, Value> {
        &self.link_data
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub fn upgrade_timeout(&self) -> Duration {
        self.upgrade_timeout
    }

    pub fn compression(&self) -> bool {
        self.compression
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfigBuilder {
    broker: Option<String>,
    name: Option<String>,
    key: Option<Arc<PrivateKey>>,
    token: Option<String>,
    is_requester: bool,
    is_responder: bool,
    codecs: CodecRegistry,
    link_data: Map<String, Value>,
    handshake_timeout: Duration,
    upgrade_timeout: Duration,
    compression: bool,
}

impl Default for LinkConfigBuilder {
    fn default() -> Self {
        Self {
            broker: None,
            name: None,
            key: None,
            token: None,
            is_requester: false,
            is_responder: false,
            codecs: CodecRegistry::new(),
            link_data: Map::new(),
            handshake_timeout: DEFAULT_TIMEOUT,
            upgrade_timeout: DEFAULT_TIMEOUT,
            compression: true,
        }
    }
}

impl LinkConfigBuilder {
    /// Broker handshake endpoint, e.g. `http://localhost:8080/conn`
    pub fn broker(mut self, url: impl Into<String>) -> Self {
        self.broker = Some(url.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Identity key; the caller keeps its own handle to it
    pub fn key(mut self, key: Arc<PrivateKey>) -> Self {
        self.key = Some(key);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn requester(mut self) -> Self {
        self.is_requester = true;
        self
    }

    pub fn responder(mut self) -> Self {
        self.is_responder = true;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codecs.register(codec);
        self
    }

    pub fn link_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.link_data.insert(key.into(), value);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn upgrade_timeout(mut self, timeout: Duration) -> Self {
        self.upgrade_timeout = timeout;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn build(self) -> Result<LinkConfig, ConfigError> {
        let raw = self
            .broker
            .filter(|b| !b.trim().is_empty())
            .ok_or(ConfigError::MissingBroker)?;
        let broker = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidBroker {
            url: raw.clone(),
            source,
        })?;
        if !matches!(broker.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(broker.scheme().to_string()));
        }

        let name = self
            .name
            .filter(|n| !n.is_empty())
            .ok_or(ConfigError::MissingName)?;
        let key = self.key.ok_or(ConfigError::MissingKey)?;
        if self.codecs.is_empty() {
            return Err(ConfigError::NoCodecs);
        }

        let ds_id = key.ds_id(&name);
        let token = self.token.as_deref().and_then(normalize_token);
        if self.token.is_some() && token.is_none() {
            tracing::warn!(
                "static token shorter than {} characters, token authentication disabled",
                TOKEN_LENGTH
            );
        }

        Ok(LinkConfig {
            broker,
            name,
            ds_id,
            key,
            token,
            is_requester: self.is_requester,
            is_responder: self.is_responder,
            codecs: self.codecs,
            link_data: self.link_data,
            handshake_timeout: self.handshake_timeout,
            upgrade_timeout: self.upgrade_timeout,
            compression: self.compression,
        })
    }
}

/// Cut a static token to [`TOKEN_LENGTH`] characters
///
/// Shorter tokens yield `None`: token authentication is switched off rather
/// than rejected, which existing deployments rely on.
///
/// Length is counted in `char`s, so a cut never splits a UTF-8 sequence.
/// Brokers that count bytes agree on every ASCII token; a non-ASCII token of
/// fewer than 16 characters is disabled here even when it spans 16 bytes.
pub fn normalize_token(token: &str) -> Option<String> {
    if token.chars().count() < TOKEN_LENGTH {
        return None;
    }
    Some(token.chars().take(TOKEN_LENGTH).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{JsonCodec, MsgpackCodec};

    fn key() -> Arc<PrivateKey> {
        Arc::new(PrivateKey::generate().unwrap())
    }

    fn valid() -> LinkConfigBuilder {
        LinkConfig::builder()
            .broker("http://localhost:8080/conn")
            .name("test-")
            .key(key())
            .codec(Arc::new(JsonCodec))
    }

    #[test]
    fn test_build_minimal() {
        let config = valid().build().unwrap();
        assert_eq!(config.broker().as_str(), "http://localhost:8080/conn");
        assert_eq!(config.name(), "test-");
        assert!(!config.is_requester());
        assert!(!config.is_responder());
        assert!(config.token().is_none());
        assert!(config.compression());
        assert_eq!(config.handshake_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.codecs().names(), vec!["json"]);
    }

    #[test]
    fn test_build_all_options() {
        let key = key();
        let config = LinkConfig::builder()
            .responder()
            .requester()
            .name("test-")
            .token("abcdefghijklmnopqrstuvwxyz")
            .broker("https://broker.example.com/conn")
            .key(key.clone())
            .codec(Arc::new(JsonCodec))
            .codec(Arc::new(MsgpackCodec))
            .link_data("zone", Value::from("north"))
            .handshake_timeout(Duration::from_secs(5))
            .upgrade_timeout(Duration::from_secs(7))
            .compression(false)
            .build()
            .unwrap();

        assert!(config.is_requester());
        assert!(config.is_responder());
        assert_eq!(config.token(), Some("abcdefghijklmnop"));
        assert_eq!(config.ds_id(), key.ds_id("test-"));
        assert!(Arc::ptr_eq(config.key(), &key));
        assert_eq!(config.codecs().names(), vec!["json", "msgpack"]);
        assert_eq!(config.link_data()["zone"], "north");
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.upgrade_timeout(), Duration::from_secs(7));
        assert!(!config.compression());
    }

    #[test]
    fn test_missing_broker() {
        let err = LinkConfig::builder()
            .name("test-")
            .key(key())
            .codec(Arc::new(JsonCodec))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingBroker));
    }

    #[test]
    fn test_invalid_broker() {
        let err = valid().broker("not a url").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBroker { .. }));

        let err = valid().broker("ftp://broker/conn").build().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_missing_name() {
        let err = LinkConfig::builder()
            .broker("http://localhost:8080/conn")
            .key(key())
            .codec(Arc::new(JsonCodec))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingName));

        let err = valid().name("").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingName));
    }

    #[test]
    fn test_missing_key() {
        let err = LinkConfig::builder()
            .broker("http://localhost:8080/conn")
            .name("test-")
            .codec(Arc::new(JsonCodec))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey));
    }

    #[test]
    fn test_no_codecs() {
        let err = LinkConfig::builder()
            .broker("http://localhost:8080/conn")
            .name("test-")
            .key(key())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoCodecs));
    }

    #[test]
    fn test_token_normalization() {
        assert_eq!(
            normalize_token("12345678901234567891"),
            Some("1234567890123456".to_string())
        );
        assert_eq!(
            normalize_token("1234567890123456"),
            Some("1234567890123456".to_string())
        );
        assert_eq!(normalize_token("123456789012345"), None);
        assert_eq!(normalize_token(""), None);
    }

    #[test]
    fn test_token_length_counts_characters() {
        // 9 characters, 18 bytes
        assert_eq!(normalize_token("ééééééééé"), None);

        let long = "é".repeat(20);
        let normalized = normalize_token(&long).unwrap();
        assert_eq!(normalized.chars().count(), TOKEN_LENGTH);
        assert_eq!(normalized, "é".repeat(16));
    }

    #[test]
    fn test_short_token_disables_token_auth() {
        let config = valid().token("abc").build().unwrap();
        assert!(config.token().is_none());
    }
}
