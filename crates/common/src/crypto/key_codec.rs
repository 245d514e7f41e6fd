use rand_core::RngCore;

use super::keys::{KeyError, PrivateKey, PublicKey};

/// Key generation and text encoding for link identities
///
/// There is one production implementation, [`P256Codec`]. The curve is fixed
/// by the key types themselves, so an implementation cannot mix curves.
pub trait KeyCodec: Send + Sync {
    /// Draw a new key pair from `rng`
    fn generate(&self, rng: &mut dyn RngCore) -> Result<PrivateKey, KeyError>;

    /// `base64url(scalar) base64url(point)`
    fn encode(&self, key: &PrivateKey) -> String;

    /// Inverse of [`KeyCodec::encode`], also accepting the scalar alone
    fn decode(&self, text: &str) -> Result<PrivateKey, KeyError>;

    fn encode_public(&self, key: &PublicKey) -> String;

    fn decode_public(&self, text: &str) -> Result<PublicKey, KeyError>;

    /// `base64url(sha256(point))`
    fn hash64(&self, key: &PublicKey) -> String;

    /// `prefix` followed by [`KeyCodec::hash64`]
    fn ds_id(&self, key: &PublicKey, prefix: &str) -> String;

    /// Whether `candidate` ends with the key's [`KeyCodec::hash64`]
    fn verify_ds_id(&self, key: &PublicKey, candidate: &str) -> bool;
}

/// NIST P-256 key codec
#[derive(Debug, Clone, Copy, Default)]
pub struct P256Codec;

impl KeyCodec for P256Codec {
    fn generate(&self, rng: &mut dyn RngCore) -> Result<PrivateKey, KeyError> {
        PrivateKey::generate_with(rng)
    }

    fn encode(&self, key: &PrivateKey) -> String {
        key.to_text()
    }

    fn decode(&self, text: &str) -> Result<PrivateKey, KeyError> {
        PrivateKey::from_text(text)
    }

    fn encode_public(&self, key: &PublicKey) -> String {
        key.to_base64()
    }

    fn decode_public(&self, text: &str) -> Result<PublicKey, KeyError> {
        PublicKey::from_base64(text)
    }

    fn hash64(&self, key: &PublicKey) -> String {
        key.hash64()
    }

    fn ds_id(&self, key: &PublicKey, prefix: &str) -> String {
        key.ds_id(prefix)
    }

    fn verify_ds_id(&self, key: &PublicKey, candidate: &str) -> bool {
        key.verify_ds_id(candidate)
    }
}
