//! Wire encodings for messages on the upgraded connection
//!
//! The broker picks one of the formats the link advertises during the
//! handshake. Two ship with the crate: `json` (text frames) and `msgpack`
//! (binary frames). Anything implementing [`Codec`] can be registered.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Name of the JSON text encoding
pub const JSON: &str = "json";
/// Name of the MessagePack binary encoding
pub const MSGPACK: &str = "msgpack";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("msgpack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
}

/// Which frame type a codec's output travels in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

/// A named message encoding
pub trait Codec: fmt::Debug + Send + Sync {
    /// Format name as advertised to and chosen by the broker
    fn name(&self) -> &str;

    fn frame_kind(&self) -> FrameKind;

    fn marshal(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        JSON
    }

    fn frame_kind(&self) -> FrameKind {
        FrameKind::Text
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackCodec;

impl Codec for MsgpackCodec {
    fn name(&self) -> &str {
        MSGPACK
    }

    fn frame_kind(&self) -> FrameKind {
        FrameKind::Binary
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        // named so maps keep their keys
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Resolve one of the built in codecs by format name
pub fn by_name(name: &str) -> Option<Arc<dyn Codec>> {
    match name {
        JSON => Some(Arc::new(JsonCodec)),
        MSGPACK => Some(Arc::new(MsgpackCodec)),
        _ => None,
    }
}

/// Ordered set of codecs keyed by name
///
/// Registration order is the order formats are advertised in. Registering a
/// name twice replaces the earlier codec in place.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        match self.codecs.iter_mut().find(|c| c.name() == codec.name()) {
            Some(slot) => *slot = codec,
            None => self.codecs.push(codec),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.iter().find(|c| c.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.codecs.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec_text() {
        let value = json!({"msg": 1, "requests": [{"rid": 1, "method": "list"}]});
        let bytes = JsonCodec.marshal(&value).unwrap();
        assert_eq!(JsonCodec.frame_kind(), FrameKind::Text);
        assert!(std::str::from_utf8(&bytes).is_ok());
        assert_eq!(JsonCodec.unmarshal(&bytes).unwrap(), value);
    }

    #[test]
    fn test_msgpack_codec_keeps_map_keys() {
        let value = json!({"msg": 7, "ack": 3, "path": "/downstream"});
        let bytes = MsgpackCodec.marshal(&value).unwrap();
        assert_eq!(MsgpackCodec.frame_kind(), FrameKind::Binary);
        assert_eq!(MsgpackCodec.unmarshal(&bytes).unwrap(), value);
        // fixmap with three entries
        assert_eq!(bytes[0], 0x83);
    }

    #[test]
    fn test_unmarshal_garbage_fails() {
        assert!(matches!(
            JsonCodec.unmarshal(b"{not json"),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            MsgpackCodec.unmarshal(&[0xc1]),
            Err(CodecError::MsgpackDecode(_))
        ));
    }

    #[test]
    fn test_registry_order_and_replace() {
        let mut registry = CodecRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(MsgpackCodec));
        registry.register(Arc::new(JsonCodec));
        assert_eq!(registry.names(), vec!["msgpack", "json"]);

        registry.register(Arc::new(MsgpackCodec));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["msgpack", "json"]);

        assert_eq!(registry.get(JSON).unwrap().name(), "json");
        assert!(registry.get("cbor").is_none());
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("json").unwrap().name(), JSON);
        assert_eq!(by_name("msgpack").unwrap().name(), MSGPACK);
        assert!(by_name("xml").is_none());
    }
}
