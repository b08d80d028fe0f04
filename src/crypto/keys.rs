//! X25519 key types for the handshake.
//!
//! Long-term identity keys live in [`StaticKeypair`]; per-session
//! handshake keys live in [`EphemeralKeypair`]. All Diffie-Hellman
//! operations are checked: a non-contributory exchange (peer sent the
//! identity element or another low-order point) is rejected with
//! [`InvalidPeerKey`] instead of yielding an all-zero secret. Secret key
//! material is zeroized on drop.

use crate::error::InvalidPeerKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of X25519 keys in bytes.
pub const X25519_KEY_SIZE: usize = 32;

/// An X25519 public key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct X25519PublicKey(#[serde(with = "serde_key_bytes")] [u8; X25519_KEY_SIZE]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; X25519_KEY_SIZE] {
        &self.0
    }

    fn to_dalek(&self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519PublicKey({}...)", hex::encode(&self.0[..8]))
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(key: PublicKey) -> Self {
        Self(*key.as_bytes())
    }
}

impl From<[u8; X25519_KEY_SIZE]> for X25519PublicKey {
    fn from(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

/// A shared secret from a checked X25519 exchange, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; X25519_KEY_SIZE]);

impl SharedSecret {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; X25519_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret([REDACTED])")
    }
}

/// Checked DH: reject exchanges where the peer's point contributed
/// nothing (identity element / low-order point).
fn checked_dh(secret: &StaticSecret, their_public: &X25519PublicKey) -> Result<SharedSecret, InvalidPeerKey> {
    let shared = secret.diffie_hellman(&their_public.to_dalek());
    if !shared.was_contributory() {
        return Err(InvalidPeerKey);
    }
    Ok(SharedSecret(*shared.as_bytes()))
}

/// A long-term (static) X25519 key pair: a party's identity key.
#[derive(ZeroizeOnDrop)]
pub struct StaticKeypair {
    #[zeroize(skip)]
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl StaticKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Restore from secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> &X25519PublicKey {
        &self.public
    }

    /// Perform a checked Diffie-Hellman exchange.
    pub fn diffie_hellman(
        &self,
        their_public: &X25519PublicKey,
    ) -> Result<SharedSecret, InvalidPeerKey> {
        checked_dh(&self.secret, their_public)
    }

    /// Export secret key bytes for storage.
    ///
    /// # Security
    /// These bytes must be encrypted before storage.
    pub fn secret_bytes(&self) -> [u8; X25519_KEY_SIZE] {
        self.secret.to_bytes()
    }
}

impl fmt::Debug for StaticKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeypair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// An ephemeral X25519 key pair generated fresh per session.
///
/// The secret half exists only until the 4DH secret has been derived; the
/// session erases it at that point. Uses `StaticSecret` internally because
/// the handshake needs up to three DH operations from the same key, which
/// x25519-dalek's one-shot `EphemeralSecret` cannot do.
#[derive(ZeroizeOnDrop)]
pub struct EphemeralKeypair {
    #[zeroize(skip)]
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl EphemeralKeypair {
    /// Generate a new random ephemeral keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> &X25519PublicKey {
        &self.public
    }

    /// Perform a checked Diffie-Hellman exchange.
    pub fn diffie_hellman(
        &self,
        their_public: &X25519PublicKey,
    ) -> Result<SharedSecret, InvalidPeerKey> {
        checked_dh(&self.secret, their_public)
    }
}

impl fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Serde helper for fixed-size key byte arrays.
mod serde_key_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bytes.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec: Vec<u8> = Vec::deserialize(deserializer)?;
        vec.try_into()
            .map_err(|_| serde::de::Error::custom("invalid key length"))
    }
}
