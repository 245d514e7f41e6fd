//! Cryptographic primitives for DSLink connections
//!
//! - **Identity**: a NIST P-256 keypair (`PrivateKey`/`PublicKey`) whose
//!   public half hashes to the link's dsId
//! - **Storage**: the keypair persists as one line of base64url text
//!   (`KeyStore`, default file `.dslink.key`)
//! - **Handshake authentication**: ECDH against the broker's ephemeral key,
//!   salted with the broker's nonce
//!
//! # Key text format
//!
//! ```text
//! base64url(scalar) SP base64url(0x04 || X || Y)
//! ```
//!
//! All base64url here is unpadded. The curve is fixed for the whole crate;
//! the key types cannot represent a point on any other curve.

mod handshake;
mod key_codec;
mod keys;
mod store;

pub use handshake::{hash_salt, hash_token, shared_secret};
pub use key_codec::{KeyCodec, P256Codec};
pub use keys::{KeyError, PrivateKey, PublicKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use store::{load_key, save_key, KeyStore, StoreError, DEFAULT_KEY_FILE};
