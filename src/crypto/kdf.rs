//! Chain-key derivation for the 2DH and 4DH generations.
//!
//! Every domain-separation label used by the protocol lives in this
//! module. The labels bind the protocol version; interoperating with
//! another implementation means replacing this constant block with the
//! authoritative one, bit for bit.
//!
//! Role ordering is explicit: derivation inputs are always arranged
//! initiator-first, and each directional chain key carries the owning
//! (sending) party's identity handle in its info. Both sides therefore
//! compute the same two directional keys and map them into their mirrored
//! my/peer slots.

use super::{hkdf_derive_32, SharedSecret, X25519PublicKey, X25519_KEY_SIZE};
use crate::identity::Identity;
use zeroize::Zeroizing;

/// Info prefix for a 2DH chain key; the owner's identity handle follows.
const CHAIN_2DH_INFO_PREFIX: &[u8] = b"fourdh 2dh chain v1 ";
/// Info prefix for a 4DH chain key; the owner's identity handle follows.
const CHAIN_4DH_INFO_PREFIX: &[u8] = b"fourdh 4dh chain v1 ";
/// Info for advancing a chain key by one turn.
pub(crate) const RATCHET_TURN_INFO: &[u8] = b"fourdh chain turn v1";
/// Info for deriving the per-turn encryption key from a chain key.
pub(crate) const ENCRYPTION_KEY_INFO: &[u8] = b"fourdh message key v1";

/// The two directional chain keys of one generation.
pub(crate) struct DirectionalChainKeys {
    /// Chain for messages sent by the initiator.
    pub(crate) initiator: Zeroizing<[u8; 32]>,
    /// Chain for messages sent by the responder.
    pub(crate) responder: Zeroizing<[u8; 32]>,
}

fn derive_direction(
    salt: Option<&[u8]>,
    input_key_material: &[u8],
    info_prefix: &[u8],
    owner: &Identity,
) -> Zeroizing<[u8; 32]> {
    let mut info = Vec::with_capacity(info_prefix.len() + owner.as_bytes().len());
    info.extend_from_slice(info_prefix);
    info.extend_from_slice(owner.as_bytes());
    hkdf_derive_32(salt, input_key_material, &info)
}

/// Derive the 2DH chain keys.
///
/// Input secret: `DH(initiator ephemeral, responder long-term)`. The salt
/// binds both long-term public keys, initiator-first.
pub(crate) fn derive_2dh_chain_keys(
    dh_ephemeral_static: &SharedSecret,
    initiator_public: &X25519PublicKey,
    responder_public: &X25519PublicKey,
    initiator_identity: &Identity,
    responder_identity: &Identity,
) -> DirectionalChainKeys {
    let mut salt = [0u8; 2 * X25519_KEY_SIZE];
    salt[..X25519_KEY_SIZE].copy_from_slice(initiator_public.as_bytes());
    salt[X25519_KEY_SIZE..].copy_from_slice(responder_public.as_bytes());

    DirectionalChainKeys {
        initiator: derive_direction(
            Some(&salt),
            dh_ephemeral_static.as_bytes(),
            CHAIN_2DH_INFO_PREFIX,
            initiator_identity,
        ),
        responder: derive_direction(
            Some(&salt),
            dh_ephemeral_static.as_bytes(),
            CHAIN_2DH_INFO_PREFIX,
            responder_identity,
        ),
    }
}

/// Derive the 4DH chain keys from the triple-DH secret.
///
/// Input secrets, concatenated initiator-first:
///
/// 1. `DH(initiator ephemeral, responder long-term)`
/// 2. `DH(initiator long-term, responder ephemeral)`
/// 3. `DH(initiator ephemeral, responder ephemeral)`
///
/// Terms 1 and 2 bind both long-term identities into the secret, so 4DH
/// confidentiality also authenticates both parties' identity keys.
pub(crate) fn derive_4dh_chain_keys(
    dh_ephemeral_static: &SharedSecret,
    dh_static_ephemeral: &SharedSecret,
    dh_ephemeral_ephemeral: &SharedSecret,
    initiator_identity: &Identity,
    responder_identity: &Identity,
) -> DirectionalChainKeys {
    let mut combined = Zeroizing::new([0u8; 3 * X25519_KEY_SIZE]);
    combined[..X25519_KEY_SIZE].copy_from_slice(dh_ephemeral_static.as_bytes());
    combined[X25519_KEY_SIZE..2 * X25519_KEY_SIZE].copy_from_slice(dh_static_ephemeral.as_bytes());
    combined[2 * X25519_KEY_SIZE..].copy_from_slice(dh_ephemeral_ephemeral.as_bytes());

    DirectionalChainKeys {
        initiator: derive_direction(
            None,
            combined.as_slice(),
            CHAIN_4DH_INFO_PREFIX,
            initiator_identity,
        ),
        responder: derive_direction(
            None,
            combined.as_slice(),
            CHAIN_4DH_INFO_PREFIX,
            responder_identity,
        ),
    }
}
