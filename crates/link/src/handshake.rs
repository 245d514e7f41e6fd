//! Records exchanged with the broker over the handshake request
//!
//! The link POSTs a [`HandshakeRequest`] to the broker's connection endpoint
//! and gets a [`HandshakeResponse`] back. Both are JSON with camelCase keys.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use common::crypto::PublicKey;

use crate::config::{LinkConfig, PROTOCOL_VERSION};

/// Capability announcement sent by the link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    pub public_key: PublicKey,
    pub is_requester: bool,
    pub is_responder: bool,
    pub link_data: Map<String, Value>,
    pub version: String,
    pub formats: Vec<String>,
    pub enable_transport_compression: bool,
    // same flag under the name deployed brokers read
    #[serde(rename = "enableWebSocketCompression")]
    pub enable_websocket_compression: bool,
}

impl HandshakeRequest {
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            public_key: config.key().public().clone(),
            is_requester: config.is_requester(),
            is_responder: config.is_responder(),
            link_data: config.link_data().clone(),
            version: PROTOCOL_VERSION.to_string(),
            formats: config.codecs().names(),
            enable_transport_compression: config.compression(),
            enable_websocket_compression: config.compression(),
        }
    }
}

/// Parameters the broker assigns to this connection attempt
///
/// Everything is optional on the wire and `null` reads as empty; the
/// negotiator decides which missing fields are fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandshakeResponse {
    /// Session id the broker assigned
    #[serde(deserialize_with = "null_as_empty")]
    pub id: String,
    /// Broker's long term public key
    #[serde(deserialize_with = "null_as_empty")]
    pub public_key: String,
    /// Where to open the streaming connection, usually relative to the broker
    #[serde(deserialize_with = "null_as_empty")]
    pub ws_uri: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub http_uri: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub version: String,
    /// Broker's ephemeral public key for this attempt
    #[serde(deserialize_with = "null_as_empty")]
    pub temp_key: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub salt: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub salt_s: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub salt_l: String,
    /// Path the broker mounted the link at
    #[serde(deserialize_with = "null_as_empty")]
    pub path: String,
    /// Encoding the broker chose from the advertised formats
    #[serde(deserialize_with = "null_as_empty")]
    pub format: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
