//! Cryptographic primitives for the session core.
//!
//! Well-audited building blocks only:
//!
//! - **X25519**: Diffie-Hellman key exchange
//! - **HKDF-SHA256**: all key derivation (chain-key init, ratchet turns,
//!   encryption keys)
//!
//! All secret material is zeroized on drop, and `Debug` output never
//! contains key bytes.

mod kdf;
mod keys;
mod ratchet;

pub use keys::{EphemeralKeypair, SharedSecret, StaticKeypair, X25519PublicKey, X25519_KEY_SIZE};
pub use ratchet::{EncryptionKey, KdfRatchet};

pub(crate) use kdf::{derive_2dh_chain_keys, derive_4dh_chain_keys};

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Derive 32 bytes with HKDF-SHA256.
///
/// The fixed output length is far below the HKDF-SHA256 output bound, so
/// expansion cannot fail.
pub(crate) fn hkdf_derive_32(
    salt: Option<&[u8]>,
    input_key_material: &[u8],
    info: &[u8],
) -> Zeroizing<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(salt, input_key_material);
    let mut output = Zeroizing::new([0u8; 32]);
    if hkdf.expand(info, output.as_mut_slice()).is_err() {
        unreachable!();
    }
    output
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
    bytes
}

/// Constant-time comparison of byte slices.
///
/// Prevents timing attacks when comparing derived keys.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
