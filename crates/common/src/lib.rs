/**
 * Cryptographic types and operations.
 *  - P-256 identity keys and their text form
 *  - Identity key storage
 *  - Handshake shared secrets and auth hashes
 */
pub mod crypto;

pub mod prelude {
    pub use crate::crypto::{KeyCodec, KeyStore, P256Codec, PrivateKey, PublicKey};
}
