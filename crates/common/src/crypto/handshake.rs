//! Handshake authentication
//!
//! The link proves possession of its identity key by answering the broker's
//! challenge:
//!
//! 1. The broker hands out an ephemeral public key and a short salt
//! 2. Both sides run ECDH between their private scalar and the other's public key
//! 3. The link sends `base64url(sha256(salt || secret))` as its `auth` token
//!
//! Static access tokens are authenticated separately with [`hash_token`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::keys::{PrivateKey, PublicKey};

/// ECDH shared secret between a local private key and a peer's public key
///
/// Returns the affine X coordinate of `peer * scalar` as a big-endian
/// magnitude, with leading zero bytes stripped (RFC 5903 keeps X only).
/// The result is the same whichever side computes it.
pub fn shared_secret(key: &PrivateKey, peer: &PublicKey) -> Vec<u8> {
    let shared = p256::ecdh::diffie_hellman(key.scalar(), peer.as_p256().as_affine());
    let x = shared.raw_secret_bytes();
    let start = x.iter().position(|b| *b != 0).unwrap_or(x.len());
    x[start..].to_vec()
}

/// Salted authentication token: `base64url(sha256(salt || secret))`
///
/// The salt comes first. Brokers compute the same digest, so the order is
/// part of the protocol.
pub fn hash_salt(salt: &str, secret: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Static token hash: `base64url(sha256(ds_id || token))`
pub fn hash_token(ds_id: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ds_id.as_bytes());
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod test {
    use super::*;

    const CLIENT_PRIVATE: &str = "M6S41GAL0gH0I97Hhy7A2-icf8dHnxXPmYIRwem03HE";
    const SERVER_PRIVATE: &str = "rL23cF6HxmEoIaR0V2aORlQVq2LLn20FCi4_lNdeRkk";
    const SHARED_SECRET: &str = "116128c016cf380933c4b40ffeee8ef5999167f5c3d49298ba2ebfd0502e74e3";
    const HASHED_AUTH: &str = "V2P1nwhoENIi7SqkNBuRFcoc8daWd_iWYYDh_0Z01rs";

    #[test]
    fn test_shared_secret_known_vector() {
        let client = PrivateKey::from_text(CLIENT_PRIVATE).unwrap();
        let server = PrivateKey::from_text(SERVER_PRIVATE).unwrap();

        let client_side = shared_secret(&client, server.public());
        let server_side = shared_secret(&server, client.public());

        assert_eq!(hex::encode(&client_side), SHARED_SECRET);
        assert_eq!(hex::encode(&server_side), SHARED_SECRET);
    }

    #[test]
    fn test_shared_secret_symmetric_for_generated_keys() {
        for _ in 0..8 {
            let a = PrivateKey::generate().unwrap();
            let b = PrivateKey::generate().unwrap();
            assert_eq!(
                shared_secret(&a, b.public()),
                shared_secret(&b, a.public())
            );
        }
    }

    #[test]
    fn test_hash_salt_known_vector() {
        let client = PrivateKey::from_text(CLIENT_PRIVATE).unwrap();
        let server = PrivateKey::from_text(SERVER_PRIVATE).unwrap();

        let secret = shared_secret(&server, client.public());
        assert_eq!(hash_salt("0000", &secret), HASHED_AUTH);

        let secret = shared_secret(&client, server.public());
        assert_eq!(hash_salt("0000", &secret), HASHED_AUTH);
    }

    #[test]
    fn test_hash_salt_order_matters() {
        let secret = b"0000";
        assert_ne!(hash_salt("abcd", secret), hash_salt("0000", b"abcd"));
    }

    #[test]
    fn test_hash_token_concatenates_ds_id_then_token() {
        let expected = {
            let digest = Sha256::digest(b"link-abc1234567890123456");
            URL_SAFE_NO_PAD.encode(digest)
        };
        assert_eq!(hash_token("link-abc", "1234567890123456"), expected);
        assert_eq!(hash_token("link-abc", "1234567890123456").len(), 43);
    }
}
