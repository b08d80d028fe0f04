//! Party identities and the identity store.
//!
//! The identity store is an explicit dependency passed into session
//! construction, not process-wide state: tests and multi-account callers
//! can hold several stores side by side.

use crate::crypto::{StaticKeypair, X25519PublicKey};
use crate::error::InvalidIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A party's stable identity handle.
///
/// The handle participates in the chain-key derivation labels, so both
/// peers must agree on its exact byte representation. Handles are
/// non-empty ASCII; an empty handle would leave a chain key's direction
/// unbound.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from its stable handle.
    ///
    /// Fails with [`InvalidIdentity`] if the handle is empty or contains
    /// non-ASCII characters.
    pub fn new(handle: impl Into<String>) -> Result<Self, InvalidIdentity> {
        let handle = handle.into();
        if handle.is_empty() || !handle.is_ascii() {
            return Err(InvalidIdentity);
        }
        Ok(Self(handle))
    }

    /// The handle as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The handle bytes, as fed into the KDF labels.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A party's own identity: handle plus long-term X25519 key pair.
pub struct IdentityStore {
    identity: Identity,
    keypair: StaticKeypair,
}

impl IdentityStore {
    /// Create a store for the given identity and long-term key pair.
    pub fn new(identity: Identity, keypair: StaticKeypair) -> Self {
        Self { identity, keypair }
    }

    /// This party's identity handle.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// This party's long-term key pair.
    pub fn keypair(&self) -> &StaticKeypair {
        &self.keypair
    }

    /// This party's long-term public key.
    pub fn public_key(&self) -> &X25519PublicKey {
        self.keypair.public_key()
    }
}

impl fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityStore")
            .field("identity", &self.identity)
            .field("keypair", &self.keypair)
            .finish()
    }
}
