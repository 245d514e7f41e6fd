use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{NonZeroScalar, PublicKey as P256PublicKey, SecretKey as P256SecretKey};
use rand_core::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Size of a P-256 private scalar in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an uncompressed SEC1 P-256 point in bytes (`0x04 || X || Y`)
pub const PUBLIC_KEY_SIZE: usize = 65;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// Errors that can occur while generating, encoding or decoding keys
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("base64url decode error: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("malformed key: {0}")]
    MalformedKey(String),
    #[error("invalid curve point: {0}")]
    InvalidPoint(String),
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}

/// Public half of a link identity
///
/// Always a valid point on P-256; there is no way to construct one that is
/// not. The canonical byte form is the 65 byte uncompressed SEC1 encoding and
/// the canonical text form is that encoding as unpadded base64url.
///
/// # Examples
///
/// ```ignore
/// let key = PrivateKey::generate()?;
/// let text = key.public().to_base64();
/// let recovered = PublicKey::from_base64(&text)?;
/// assert_eq!(key.public(), &recovered);
///
/// // identity string handed to the broker
/// let ds_id = recovered.ds_id("my-link-");
/// assert!(recovered.verify_ds_id(&ds_id));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(P256PublicKey);

impl From<P256PublicKey> for PublicKey {
    fn from(key: P256PublicKey) -> Self {
        PublicKey(key)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl PublicKey {
    /// Parse an uncompressed SEC1 point
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidPoint`] if the input is not 65 bytes, is not
    /// tagged as uncompressed, has a coordinate outside the field, or does not
    /// satisfy the curve equation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(KeyError::InvalidPoint(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        if bytes[0] != UNCOMPRESSED_TAG {
            return Err(KeyError::InvalidPoint(format!(
                "expected uncompressed point tag 0x04, got {:#04x}",
                bytes[0]
            )));
        }
        let key = P256PublicKey::from_sec1_bytes(bytes)
            .map_err(|_| KeyError::InvalidPoint("point is not on the P-256 curve".into()))?;
        Ok(PublicKey(key))
    }

    /// Parse a public key from its unpadded base64url text form
    pub fn from_base64(text: &str) -> Result<Self, KeyError> {
        let bytes = URL_SAFE_NO_PAD.decode(text)?;
        Self::from_bytes(&bytes)
    }

    /// Uncompressed SEC1 encoding of the point
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Unpadded base64url of [`PublicKey::to_bytes`]
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_bytes())
    }

    /// Unpadded base64url of the SHA-256 digest of the encoded point
    pub fn hash64(&self) -> String {
        let digest = Sha256::digest(self.to_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Identity string for this key: `prefix` followed by [`PublicKey::hash64`]
    pub fn ds_id(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.hash64())
    }

    /// Check that `candidate` was derived from this key
    ///
    /// Only the hash suffix is compared. Prefixes are chosen per deployment
    /// and carry no identity.
    pub fn verify_ds_id(&self, candidate: &str) -> bool {
        candidate.ends_with(&self.hash64())
    }

    pub(crate) fn as_p256(&self) -> &P256PublicKey {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base64(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

/// Private half of a link identity
///
/// Holds the P-256 scalar together with the public key derived from it. The
/// public key is never taken from outside input, so the pair is always
/// consistent.
///
/// `Debug` output never includes the scalar.
///
/// # Examples
///
/// ```ignore
/// let key = PrivateKey::generate()?;
/// let text = key.to_text();
/// let recovered = PrivateKey::from_text(&text)?;
/// assert_eq!(key, recovered);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: P256SecretKey,
    public: PublicKey,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public.to_base64())
            .finish_non_exhaustive()
    }
}

impl From<P256SecretKey> for PrivateKey {
    fn from(secret: P256SecretKey) -> Self {
        let public = PublicKey(secret.public_key());
        Self { secret, public }
    }
}

impl PrivateKey {
    /// Generate a new key from the operating system RNG
    pub fn generate() -> Result<Self, KeyError> {
        Self::generate_with(&mut rand_core::OsRng)
    }

    /// Generate a new key from the supplied random source
    ///
    /// Exactly [`PRIVATE_KEY_SIZE`] bytes are drawn; they are not retried.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyGeneration`] if the source fails or yields a
    /// scalar that is zero or not below the curve order.
    pub fn generate_with(rng: &mut dyn RngCore) -> Result<Self, KeyError> {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|e| KeyError::KeyGeneration(e.to_string()))?;
        let secret = P256SecretKey::from_slice(&bytes).map_err(|_| {
            KeyError::KeyGeneration("random source produced an invalid scalar".into())
        })?;
        Ok(secret.into())
    }

    /// Build a key from a big-endian scalar, deriving its public key
    pub fn from_scalar(bytes: &[u8]) -> Result<Self, KeyError> {
        let secret = P256SecretKey::from_slice(bytes).map_err(|_| {
            KeyError::MalformedKey("scalar is not a valid P-256 private key".into())
        })?;
        Ok(secret.into())
    }

    /// Parse the key file text form
    ///
    /// Accepts `base64url(scalar)` alone or `base64url(scalar) base64url(point)`.
    /// Surrounding whitespace is ignored. In the two field form the public key
    /// is still derived from the scalar and must match the supplied one.
    ///
    /// # Errors
    ///
    /// - [`KeyError::Encoding`] if a field is not unpadded base64url
    /// - [`KeyError::MalformedKey`] on any other field count, an invalid scalar
    ///   or a supplied public key that does not belong to the scalar
    /// - [`KeyError::InvalidPoint`] if the supplied public key is not a point
    pub fn from_text(text: &str) -> Result<Self, KeyError> {
        let fields: Vec<&str> = text.trim().split(' ').collect();
        match fields.as_slice() {
            [scalar] => {
                let scalar = URL_SAFE_NO_PAD.decode(scalar)?;
                Self::from_scalar(&scalar)
            }
            [scalar, public] => {
                let scalar = URL_SAFE_NO_PAD.decode(scalar)?;
                let supplied = PublicKey::from_base64(public)?;
                let key = Self::from_scalar(&scalar)?;
                if key.public != supplied {
                    return Err(KeyError::MalformedKey(
                        "public key does not match private scalar".into(),
                    ));
                }
                Ok(key)
            }
            _ => Err(KeyError::MalformedKey(format!(
                "expected 1 or 2 space separated fields, found {}",
                fields.len()
            ))),
        }
    }

    /// Key file text form: `base64url(scalar) base64url(point)`
    pub fn to_text(&self) -> String {
        format!(
            "{} {}",
            URL_SAFE_NO_PAD.encode(self.scalar_bytes()),
            self.public.to_base64()
        )
    }

    /// Big-endian scalar bytes
    pub fn scalar_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        let mut out = [0u8; PRIVATE_KEY_SIZE];
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Identity string of the public half
    pub fn ds_id(&self, prefix: &str) -> String {
        self.public.ds_id(prefix)
    }

    pub(crate) fn scalar(&self) -> NonZeroScalar {
        self.secret.to_nonzero_scalar()
    }
}
