use common::crypto::KeyError;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Why a connection attempt stopped short of a live stream
///
/// Configuration errors are caller mistakes; everything else can be retried
/// by dialling again. The negotiator itself never retries.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("handshake request failed: {0}")]
    HandshakeRequest(#[source] TransportError),
    #[error("broker violated the handshake protocol: {0}")]
    Protocol(String),
    #[error("failed to open the streaming connection: {0}")]
    Upgrade(#[source] TransportError),
}
